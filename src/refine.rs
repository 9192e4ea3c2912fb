//! Structure-aware gap refinement of an aligned batch of dot-bracket strings.
//!
//! After a sequence aligner has placed gaps, helices of different structures
//! are often off by one or two columns against each other. The optimizer
//! looks for *unusual positions* (columns where two structures disagree on
//! the partner by at most `max_diff`, or where equally long blocks start at
//! different offsets) and slides small gap runs to line those helices up.
//!
//! Each step works on an immutable snapshot of the batch:
//!
//! 1. pair maps and blocks are recomputed for every structure;
//! 2. the first unusual position at or after the cursor is picked and the
//!    structures vote on which side of the local block boundary to move;
//! 3. candidate strategies are tried in order: a constant-shift fix that
//!    aligns block starts directly (only on the first two attempts after a
//!    general move), then the general grouped gap slide;
//! 4. a general move is kept when `after * score_tolerance >= before`,
//!    otherwise the batch is left untouched and the cursor advances.
//!
//! The loop stops when no unusual position is left after the cursor, or
//! when `max_iterations` steps have run.
//!
//! ### Example
//! ```rust
//! use rnalign2d::{refine, RefineParams};
//! let batch = ["((((....))))", "((((....))))"];
//! let out = refine(&batch, &RefineParams::default()).unwrap();
//! assert_eq!(out, batch);
//! ```
//!
use std::collections::{BTreeMap, BTreeSet};

use crate::blocks::{structural_blocks, Block};
use crate::brackets::{is_bracket, BracketAlphabet, GAP, STANDARD, UNPAIRED};
use crate::centering::{centre_batch, compact, to_strings};
use crate::common::{check_equal_lengths, Rnalign2dError};
use crate::conservation::{score_by_conservation, window_score};
use crate::pairing::{pair_columns, PairMap};

/// Parameters for [`refine`].
#[derive(Clone, Debug)]
pub struct RefineParams {
    /// Largest partner disagreement (in columns) treated as a misplaced gap.
    pub max_diff: usize,
    /// Centre gaps inside hairpin loops after every round.
    pub center: bool,
    /// Number of optimize/compact/centre rounds.
    pub repeat: usize,
    /// A move is kept when `score_after * score_tolerance >= score_before`.
    pub score_tolerance: f64,
    /// Step budget of one optimizer run.
    pub max_iterations: usize,
    /// Bracket levels accepted in the input.
    pub alphabet: BracketAlphabet,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            max_diff: 5,
            center: true,
            repeat: 1,
            score_tolerance: 1.1,
            max_iterations: 10_000,
            alphabet: STANDARD,
        }
    }
}

/// Counters of one optimizer run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveStats {
    /// Steps taken (including the final one that found nothing to do).
    pub iterations: usize,
    /// General moves kept.
    pub accepted: usize,
    /// General moves scored and discarded.
    pub rejected: usize,
    /// Constant-shift fixes applied.
    pub constant_shifts: usize,
    /// Positions with no usable move.
    pub skipped: usize,
}

/// Result of [`refine_with_report`].
#[derive(Clone, Debug)]
pub struct RefineReport {
    /// Refined batch, all of one width.
    pub structures: Vec<String>,
    /// One entry per round.
    pub rounds: Vec<MoveStats>,
    /// `false` when some round ran out of iterations.
    pub converged: bool,
}

/// A column flagged by disagreement between two structures, with the size
/// of that disagreement in columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnusualPosition {
    /// Column where the disagreement starts.
    pub position: usize,
    /// Partner distance, or start offset for shifted blocks.
    pub length: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Where an unusual position sits relative to a structure's block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BlockVote {
    side: Side,
    gap_inside: bool,
    /// Last column before the next block (or the last column).
    right: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    ConstantShift,
    GroupedSlide,
}

struct Snapshot {
    pairs: Vec<PairMap>,
    blocks: Vec<Vec<Block>>,
    unusual: Vec<UnusualPosition>,
    places: BTreeSet<usize>,
}

impl Snapshot {
    fn new(batch: &[Vec<u8>], params: &RefineParams) -> Self {
        let pairs: Vec<PairMap> = batch.iter().map(|s| pair_columns(s, &params.alphabet)).collect();
        let blocks: Vec<Vec<Block>> = batch.iter().zip(&pairs).map(|(s, p)| structural_blocks(s, p)).collect();
        let unusual = unusual_positions(&pairs, &blocks, params.max_diff);
        let places = unusual.iter().map(|u| u.position).collect();
        Self { pairs, blocks, unusual, places }
    }

    /// Last column of the run of consecutive unusual places starting at `position`.
    fn run_end(&self, position: usize) -> usize {
        let mut end = position;
        while self.places.contains(&(end + 1)) {
            end += 1;
        }
        end
    }
}

/// Unusual positions of a batch, sorted and deduplicated.
///
/// Two kinds are collected for every pair of structures:
/// - a column paired in both whose partners differ by `1..=max_diff`; the
///   leftmost of the column and the two partners is reported;
/// - two blocks of equal span whose heads overlap but start at different
///   columns; every column of the earlier-starting block is reported with the
///   start offset as length.
pub fn unusual_positions(pairs: &[PairMap], blocks: &[Vec<Block>], max_diff: usize) -> Vec<UnusualPosition> {
    let mut found = BTreeSet::new();
    for a in 0..pairs.len() {
        for b in (a + 1)..pairs.len() {
            for (column, p1) in pairs[a].entries() {
                let Some(p2) = pairs[b].partner(column) else { continue };
                let length = p1.abs_diff(p2);
                if length > 0 && length <= max_diff {
                    found.insert(UnusualPosition { position: column.min(p1).min(p2), length });
                }
            }
            let (Some(blocks_a), Some(blocks_b)) = (blocks.get(a), blocks.get(b)) else { continue };
            for b1 in blocks_a {
                for b2 in blocks_b {
                    if b1.start == b2.start || b1.span() != b2.span() || !b1.heads_overlap(b2) {
                        continue;
                    }
                    let lead = if b1.start < b2.start { b1 } else { b2 };
                    let length = b1.start.abs_diff(b2.start);
                    for position in lead.start..=lead.end {
                        found.insert(UnusualPosition { position, length });
                    }
                }
            }
        }
    }
    found.into_iter().collect()
}

/// Majority vote of the structures whose blocks contain `position`.
/// Ties go to the vote seen first.
fn block_vote(batch: &[Vec<u8>], blocks: &[Vec<Block>], position: usize) -> Option<BlockVote> {
    let mut tally: Vec<(BlockVote, usize)> = Vec::new();
    for (s, structure_blocks) in batch.iter().zip(blocks) {
        for (k, block) in structure_blocks.iter().enumerate() {
            let side = if block.start < position && position < block.end {
                Side::Right
            } else if position == block.start {
                Side::Left
            } else {
                continue;
            };
            let gap_inside = s[block.start..block.end].contains(&GAP);
            let right = structure_blocks.get(k + 1).map_or(s.len() - 1, |next| next.start - 1);
            let vote = BlockVote { side, gap_inside, right };
            match tally.iter_mut().find(|(v, _)| *v == vote) {
                Some((_, n)) => *n += 1,
                None => tally.push((vote, 1)),
            }
            break;
        }
    }
    let mut best: Option<(BlockVote, usize)> = None;
    for (vote, n) in tally {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((vote, n));
        }
    }
    best.map(|(vote, _)| vote)
}

/// `s[from..to]` with `to` clamped to the length; empty when `from >= to`.
fn slice(s: &[u8], from: usize, to: usize) -> &[u8] {
    let to = to.min(s.len());
    if from >= to { &[] } else { &s[from..to] }
}

fn gaps(n: usize) -> impl Iterator<Item = u8> {
    std::iter::repeat(GAP).take(n)
}

/// Collect `shifts[i]` gap columns for structure `i` along `seek(i)`, crossing
/// only `.` and `-`. `None` if any structure hits a bracket or runs out of
/// columns.
fn find_gap_columns<I>(batch: &[Vec<u8>], shifts: &[usize], seek: impl Fn(usize) -> I) -> Option<Vec<Vec<usize>>>
where
    I: Iterator<Item = usize>,
{
    let mut found = vec![Vec::new(); batch.len()];
    for (i, s) in batch.iter().enumerate() {
        let wanted = shifts[i];
        if wanted == 0 {
            continue;
        }
        for column in seek(i) {
            match s[column] {
                GAP => {
                    found[i].push(column);
                    if found[i].len() == wanted {
                        break;
                    }
                }
                UNPAIRED => {}
                _ => return None,
            }
        }
        if found[i].len() < wanted {
            return None;
        }
    }
    Some(found)
}

/// Insert `shifts[i]` gaps into structure `i` at the `start..=end` boundary.
///
/// Gaps are taken from beyond the boundary when the path to them is clean
/// (a pure re-slice that keeps the width). Otherwise fresh gaps are inserted
/// at the boundary and on the far side of the region. Of those, the columns
/// that end up all-gap are dropped again; the move fails when that does not
/// bring the batch back to its width. All-gap columns already in the input
/// are never dropped here.
fn move_structures(
    batch: &[Vec<u8>],
    start: usize,
    end: usize,
    side: Side,
    width_step: usize,
    shifts: &[usize],
) -> Result<Vec<Vec<u8>>, Rnalign2dError> {
    let width = batch.first().map_or(0, Vec::len);
    let moved: Option<Vec<Vec<u8>>> = match side {
        Side::Left => {
            find_gap_columns(batch, shifts, |_| end + 1..width).map(|found| {
                batch
                    .iter()
                    .zip(&found)
                    .zip(shifts)
                    .map(|((s, taken), &k)| {
                        let mut out = Vec::with_capacity(s.len());
                        out.extend_from_slice(slice(s, 0, start));
                        out.extend(gaps(k));
                        out.extend(s.iter().enumerate().skip(start).filter(|(c, _)| !taken.contains(c)).map(|(_, &b)| b));
                        out
                    })
                    .collect()
            })
        }
        Side::Right => {
            // a gap taken at or after `end + 1 + k` would be emitted twice
            let from = (start + width_step).saturating_sub(1).min(width.saturating_sub(1));
            find_gap_columns(batch, shifts, |i| (1..=from.min(end + shifts[i])).rev()).map(|found| {
                batch
                    .iter()
                    .zip(found)
                    .zip(shifts)
                    .map(|((s, mut taken), &k)| {
                        taken.sort_unstable();
                        let cut = end + 1 + k;
                        let mut out = Vec::with_capacity(s.len());
                        let mut next = 0;
                        for column in taken {
                            out.extend_from_slice(slice(s, next, column));
                            next = column + 1;
                        }
                        out.extend_from_slice(slice(s, next, cut));
                        out.extend(gaps(k));
                        out.extend_from_slice(slice(s, cut, s.len()));
                        out
                    })
                    .collect()
            })
        }
    };

    let candidate = moved.unwrap_or_else(|| {
        let tail = end + 1 + width_step;
        let mut inserted = BTreeSet::new();
        let widened: Vec<Vec<u8>> = batch
            .iter()
            .zip(shifts)
            .map(|(s, &k)| {
                let rest = width_step.saturating_sub(k);
                let (near, far) = match side {
                    Side::Left => (k, rest),
                    Side::Right => (rest, k),
                };
                let head = slice(s, 0, start);
                let middle = slice(s, start, tail);
                let at_far = head.len() + near + middle.len();
                inserted.extend(head.len()..head.len() + near);
                inserted.extend(at_far..at_far + far);

                let mut out = Vec::with_capacity(s.len() + near + far);
                out.extend_from_slice(head);
                out.extend(gaps(near));
                out.extend_from_slice(middle);
                out.extend(gaps(far));
                out.extend_from_slice(slice(s, tail, s.len()));
                out
            })
            .collect();
        let dropped: BTreeSet<usize> =
            inserted.into_iter().filter(|&c| widened.iter().all(|t| t.get(c) == Some(&GAP))).collect();
        widened
            .into_iter()
            .map(|t| t.into_iter().enumerate().filter(|(c, _)| !dropped.contains(c)).map(|(_, b)| b).collect())
            .collect()
    });
    verify_move(batch, &candidate)?;
    Ok(candidate)
}

/// A move may only shift gaps: the batch width and the order of non-gap
/// symbols stay unchanged.
fn verify_move(before: &[Vec<u8>], after: &[Vec<u8>]) -> Result<(), Rnalign2dError> {
    let expected = before.first().map_or(0, Vec::len);
    for (index, t) in after.iter().enumerate() {
        if t.len() != expected {
            return Err(Rnalign2dError::LengthMismatch { index, expected, found: t.len() });
        }
    }
    for (s, t) in before.iter().zip(after) {
        let kept = s.iter().filter(|&&b| b != GAP);
        if !kept.eq(t.iter().filter(|&&b| b != GAP)) {
            let column = s.iter().zip(t).position(|(x, y)| x != y).unwrap_or(0);
            return Err(Rnalign2dError::MalformedStructure { column, reason: "gap move reordered structure symbols" });
        }
    }
    Ok(())
}

/// Constant-shift fix: when every structure has a block of the same span
/// covering `anchor` but the blocks start at different columns, pad each
/// structure so all of them start where the latest one does.
fn align_block_starts(batch: &[Vec<u8>], snap: &Snapshot, anchor: usize, start: usize, end: usize) -> Option<Vec<Vec<u8>>> {
    let mut span = 0usize;
    let mut same_span = true;
    let mut starts = Vec::with_capacity(batch.len());
    for structure_blocks in &snap.blocks {
        for block in structure_blocks.iter().filter(|b| b.covers(anchor)) {
            starts.push(block.start);
            if span == 0 {
                span = block.span();
            } else if span != block.span() {
                same_span = false;
            }
        }
    }
    let first = *starts.iter().min()?;
    let last = *starts.iter().max()?;
    if !same_span || first == last || starts.len() != batch.len() {
        return None;
    }
    let shifts: Vec<usize> = starts.iter().map(|&s| last - s).collect();
    match move_structures(batch, start, end, Side::Left, last - first, &shifts) {
        Ok(moved) => Some(moved),
        Err(e) => {
            log::debug!("constant shift at {start} discarded: {e}");
            None
        }
    }
}

fn constant_shift(batch: &[Vec<u8>], snap: &Snapshot, unusual: UnusualPosition) -> Option<Vec<Vec<u8>>> {
    let position = unusual.position;
    let end = snap.run_end(position);
    let mut counter_end: Option<usize> = None;
    for (s, p) in batch.iter().zip(&snap.pairs) {
        if is_bracket(s[position]) && is_bracket(s[end]) {
            if let Some(q) = p.partner(end) {
                counter_end = Some(counter_end.map_or(q, |c| c.min(q)));
            }
        }
    }
    [Some(position), counter_end]
        .into_iter()
        .flatten()
        .find_map(|anchor| align_block_starts(batch, snap, anchor + unusual.length, position, end))
}

/// Columns paired with the `position..=end` run, as `(first, last)`.
fn counter_region(batch: &[Vec<u8>], pairs: &[PairMap], position: usize, end: usize) -> Option<(usize, usize)> {
    let mut first: Option<usize> = None;
    let mut last: Option<usize> = None;
    let lower = |acc: &mut Option<usize>, q: Option<usize>| {
        if let Some(q) = q {
            *acc = Some(acc.map_or(q, |a| a.min(q)));
        }
    };
    for (s, p) in batch.iter().zip(pairs) {
        if is_bracket(s[position]) {
            lower(&mut first, p.partner(position));
            let mut k = end;
            while k > position && !is_bracket(s[k]) {
                k -= 1;
            }
            lower(&mut last, p.partner(k));
        }
        if is_bracket(s[end]) {
            lower(&mut last, p.partner(end));
            let mut k = position;
            while k < end && !is_bracket(s[k]) {
                k += 1;
            }
            lower(&mut first, p.partner(k));
        }
    }
    match (last, first) {
        (Some(lo), Some(hi)) if lo <= hi => Some((lo, hi)),
        _ => None,
    }
}

/// General fix: group structures by where the position's partner lies and
/// shift each group by its distance to the outermost group.
fn grouped_slide(batch: &[Vec<u8>], snap: &Snapshot, position: usize, side: Side, radius: usize) -> Option<Vec<Vec<u8>>> {
    let end = snap.run_end(position);
    let (mut start_at, mut end_at, mut side) = (position, end, side);

    // move on the partner side when that side is the less conserved one
    if let Some((lo, hi)) = counter_region(batch, &snap.pairs, position, end) {
        let here = window_score(batch, position, end + 1).unwrap_or(0.0);
        let there = window_score(batch, lo, hi + 1).unwrap_or(0.0);
        if here > there {
            start_at = lo;
            end_at = hi;
            side = side.flip();
        }
    }

    let mut groups: BTreeMap<isize, Vec<usize>> = BTreeMap::new();
    let mut orphans = Vec::new();
    for (i, p) in snap.pairs.iter().enumerate() {
        if let Some(q) = p.partner(position) {
            groups.entry(q as isize).or_default().push(i);
            continue;
        }
        let mut key = None;
        for d in 1..=radius {
            if let Some(q) = p.partner(position + d) {
                key = Some(q as isize + d as isize);
                break;
            }
            if let Some(q) = position.checked_sub(d).and_then(|c| p.partner(c)) {
                key = Some(q as isize - d as isize);
                break;
            }
        }
        match key {
            Some(k) => groups.entry(k).or_default().push(i),
            None => orphans.push(i),
        }
    }

    let mut keys: Vec<isize> = groups.keys().copied().collect();
    if side == Side::Left {
        keys.reverse();
    }
    let lead = *keys.first()?;
    if let Some(members) = groups.get_mut(&lead) {
        members.extend(orphans);
    }

    let mut shifts = vec![0usize; batch.len()];
    for key in &keys {
        let distance = lead.abs_diff(*key);
        let shift = if distance <= radius { distance } else { 0 };
        for &i in &groups[key] {
            shifts[i] = shift;
        }
    }
    let width_step = keys.last().map_or(0, |k| lead.abs_diff(*k)).min(radius);

    log::trace!("slide {side:?} at {start_at}..={end_at}: groups {keys:?}, shifts {shifts:?}");
    match move_structures(batch, start_at, end_at, side, width_step, &shifts) {
        Ok(moved) => Some(moved),
        Err(e) => {
            log::debug!("gap slide at {start_at} discarded: {e}");
            None
        }
    }
}

enum Step {
    Done,
    Moved { batch: Vec<Vec<u8>>, strategy: Strategy, offset: usize },
    Rejected { offset: usize },
    Skipped { offset: usize },
}

/// Run the optimizer to a fixed point (or the iteration cap).
///
/// Returns the batch, its counters and whether a fixed point was reached.
pub(crate) fn optimize(mut batch: Vec<Vec<u8>>, params: &RefineParams) -> (Vec<Vec<u8>>, MoveStats, bool) {
    let mut stats = MoveStats::default();
    let mut offset = 0usize;
    // attempts since the last general move; the constant shift is only tried on the first two
    let mut attempts = 0usize;

    loop {
        if stats.iterations >= params.max_iterations {
            log::warn!("gap optimizer stopped after {} iterations", stats.iterations);
            return (batch, stats, false);
        }
        stats.iterations += 1;

        let step = next_step(&batch, params, offset, &mut attempts);
        match step {
            Step::Done => {
                log::debug!("gap optimizer settled: {stats:?}");
                return (batch, stats, true);
            }
            Step::Moved { batch: next, strategy, offset: o } => {
                match strategy {
                    Strategy::ConstantShift => stats.constant_shifts += 1,
                    Strategy::GroupedSlide => stats.accepted += 1,
                }
                batch = next;
                offset = o;
            }
            Step::Rejected { offset: o } => {
                stats.rejected += 1;
                offset = o;
            }
            Step::Skipped { offset: o } => {
                stats.skipped += 1;
                offset = o;
            }
        }
    }
}

fn next_step(batch: &[Vec<u8>], params: &RefineParams, offset: usize, attempts: &mut usize) -> Step {
    let snap = Snapshot::new(batch, params);
    let target = snap
        .unusual
        .iter()
        .filter(|u| u.position >= offset)
        .find_map(|u| block_vote(batch, &snap.blocks, u.position).map(|v| (*u, v)));
    let Some((unusual, vote)) = target else { return Step::Done };
    let position = unusual.position;
    let radius = unusual.length.min(params.max_diff);
    let advance = vote.right.max(position + 1);

    *attempts += 1;
    for strategy in [Strategy::ConstantShift, Strategy::GroupedSlide] {
        match strategy {
            Strategy::ConstantShift => {
                if *attempts > 2 {
                    continue;
                }
                if let Some(next) = constant_shift(batch, &snap, unusual) {
                    log::debug!("constant shift at column {position}");
                    return Step::Moved { batch: next, strategy, offset };
                }
            }
            Strategy::GroupedSlide => {
                *attempts = 0;
                let Some(candidate) = grouped_slide(batch, &snap, position, vote.side, radius) else {
                    log::trace!("no gap move for column {position}");
                    return Step::Skipped { offset: position + 1 };
                };
                let before = score_by_conservation(batch);
                let after = score_by_conservation(&candidate);
                if after * params.score_tolerance >= before {
                    log::debug!("gap move at column {position} kept ({before:.3} -> {after:.3})");
                    return Step::Moved { batch: candidate, strategy, offset: advance };
                }
                log::debug!("gap move at column {position} rejected ({before:.3} -> {after:.3})");
                return Step::Rejected { offset: advance };
            }
        }
    }
    Step::Skipped { offset: position + 1 }
}

fn prepare<S: AsRef<str>>(structures: &[S], params: &RefineParams) -> Result<Vec<Vec<u8>>, Rnalign2dError> {
    for s in structures {
        params.alphabet.validate(s.as_ref())?;
    }
    let batch: Vec<Vec<u8>> = structures.iter().map(|s| s.as_ref().as_bytes().to_vec()).collect();
    check_equal_lengths(&batch)?;
    Ok(batch)
}

/// Run only the gap optimizer (no compaction or centering).
pub fn optimize_gaps<S: AsRef<str>>(structures: &[S], params: &RefineParams) -> Result<RefineReport, Rnalign2dError> {
    let batch = prepare(structures, params)?;
    if batch.is_empty() {
        return Ok(RefineReport { structures: Vec::new(), rounds: Vec::new(), converged: true });
    }
    let (batch, stats, converged) = optimize(batch, params);
    Ok(RefineReport { structures: to_strings(batch), rounds: vec![stats], converged })
}

/// Refine a batch and report per-round statistics.
///
/// Every round runs the optimizer to its fixed point, removes all-gap
/// columns and, with `center`, centres hairpin-loop gaps.
pub fn refine_with_report<S: AsRef<str>>(structures: &[S], params: &RefineParams) -> Result<RefineReport, Rnalign2dError> {
    let mut batch = prepare(structures, params)?;
    if batch.is_empty() {
        return Ok(RefineReport { structures: Vec::new(), rounds: Vec::new(), converged: true });
    }
    let mut rounds = Vec::with_capacity(params.repeat);
    let mut converged = true;
    for round in 0..params.repeat {
        let (moved, stats, settled) = optimize(batch, params);
        log::debug!("round {}: {stats:?}", round + 1);
        converged &= settled;
        rounds.push(stats);
        batch = compact(&moved);
        if params.center {
            batch = centre_batch(&batch);
        }
    }
    Ok(RefineReport { structures: to_strings(batch), rounds, converged })
}

/// Refine a batch of equal-width dot-bracket structures.
///
/// Fails with [`Rnalign2dError::RefinementIncomplete`] when a round hits
/// `max_iterations`; use [`refine_with_report`] to keep the partial result.
pub fn refine<S: AsRef<str>>(structures: &[S], params: &RefineParams) -> Result<Vec<String>, Rnalign2dError> {
    let report = refine_with_report(structures, params)?;
    if !report.converged {
        let iterations = report.rounds.iter().map(|r| r.iterations).sum();
        return Err(Rnalign2dError::RefinementIncomplete { iterations });
    }
    Ok(report.structures)
}
