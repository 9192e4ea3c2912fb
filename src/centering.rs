//! Column compaction and loop-gap centering.
//!
//! - `remove_gaps_same_place`: drop columns that are `-` in every structure.
//! - `move_gaps_to_loop_centre`: inside each hairpin loop (the free span between
//!   a block ending in `(` and a block starting with `)`), gather the gaps in
//!   the middle of the loop.
//!
//! ### Example
//! ```rust
//! use rnalign2d::{move_gaps_to_loop_centre, remove_gaps_same_place};
//! assert_eq!(remove_gaps_same_place(&["(-.)", "(-.)"]), vec!["(.)", "(.)"]);
//! let out = move_gaps_to_loop_centre(&["((--...))", "((.....))"]);
//! assert_eq!(out, vec!["((..--.))", "((.....))"]);
//! ```
//!
use crate::blocks::{structural_blocks, Block};
use crate::brackets::{is_free, GAP, STANDARD, UNPAIRED};
use crate::pairing::pair_columns;

/// Remove every column that is a gap in all structures.
pub fn remove_gaps_same_place<S: AsRef<[u8]>>(structures: &[S]) -> Vec<String> {
    to_strings(compact(structures))
}

/// Centre the gaps of every hairpin loop, then drop all-gap columns.
pub fn move_gaps_to_loop_centre<S: AsRef<str>>(structures: &[S]) -> Vec<String> {
    let batch: Vec<Vec<u8>> = structures.iter().map(|s| s.as_ref().as_bytes().to_vec()).collect();
    to_strings(centre_batch(&batch))
}

pub(crate) fn compact<S: AsRef<[u8]>>(structures: &[S]) -> Vec<Vec<u8>> {
    let cols = structures.iter().map(|s| s.as_ref().len()).max().unwrap_or(0);
    let keep: Vec<usize> = (0..cols)
        .filter(|&c| !structures.iter().all(|s| s.as_ref().get(c) == Some(&GAP)))
        .collect();
    structures
        .iter()
        .map(|s| {
            let s = s.as_ref();
            keep.iter().filter_map(|&c| s.get(c).copied()).collect()
        })
        .collect()
}

pub(crate) fn centre_batch(batch: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let centred: Vec<Vec<u8>> = batch
        .iter()
        .map(|s| {
            let pairs = pair_columns(s, &STANDARD);
            centre_loops(s, &structural_blocks(s, &pairs))
        })
        .collect();
    compact(&centred)
}

/// Rewrite the free span between consecutive blocks as
/// `ceil(dots/2)` dots, the gaps, then the remaining dots, when the span is
/// closed by `(` on the left and `)` on the right.
pub(crate) fn centre_loops(s: &[u8], blocks: &[Block]) -> Vec<u8> {
    let mut out = s.to_vec();
    for w in blocks.windows(2) {
        let from = w[0].end + 1;
        let to = w[1].start;
        if from >= to || s[from - 1] != b'(' || s.get(to) != Some(&b')') {
            continue;
        }
        let span = &s[from..to];
        if !span.iter().all(|&b| is_free(b)) {
            continue;
        }
        let gaps = span.iter().filter(|&&b| b == GAP).count();
        let dots = span.len() - gaps;
        let lead = dots.div_ceil(2);
        let centred = std::iter::repeat(UNPAIRED)
            .take(lead)
            .chain(std::iter::repeat(GAP).take(gaps))
            .chain(std::iter::repeat(UNPAIRED).take(dots - lead));
        for (slot, b) in out[from..to].iter_mut().zip(centred) {
            *slot = b;
        }
    }
    out
}

pub(crate) fn to_strings(batch: Vec<Vec<u8>>) -> Vec<String> {
    batch.into_iter().map(|s| String::from_utf8_lossy(&s).into_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centre(s: &str) -> String {
        let pairs = pair_columns(s.as_bytes(), &STANDARD);
        let blocks = structural_blocks(s.as_bytes(), &pairs);
        String::from_utf8(centre_loops(s.as_bytes(), &blocks)).unwrap()
    }

    #[test]
    fn drops_shared_gap_columns_only() {
        let out = remove_gaps_same_place(&["(--..)", "(-.-.)", "(-...)"]);
        assert_eq!(out, vec!["(-..)", "(.-.)", "(...)"]);
    }

    #[test]
    fn compaction_is_idempotent() {
        let batch = ["-((-..))-", "-(.-(.))-", "--(-..)--"];
        let once = remove_gaps_same_place(&batch);
        let twice = remove_gaps_same_place(&once);
        assert_eq!(once, twice);
        assert_eq!(once, vec!["((..))", "(.(.))", "-(..)-"]);
        let empty: [&str; 0] = [];
        assert!(remove_gaps_same_place(&empty).is_empty());
    }

    #[test]
    fn gaps_move_to_loop_centre() {
        assert_eq!(centre("((..--.))"), "((..--.))");
        assert_eq!(centre("((--...))"), "((..--.))");
        assert_eq!(centre("((...--))"), "((..--.))");
        assert_eq!(centre("((-.-.))"), "((.--.))");
    }

    #[test]
    fn only_hairpin_loops_are_centred() {
        // the span between `))` and `((` is not a loop interior
        assert_eq!(centre("((--.))--..((..))"), "((.--))--..((..))");
        assert_eq!(centre("((..))-.((..))"), "((..))-.((..))");
    }

    #[test]
    fn centering_compacts_the_batch() {
        let out = move_gaps_to_loop_centre(&["((-...))", "((....))"]);
        assert_eq!(out, vec!["((..-.))", "((....))"]);
        // a loop gap shared by every structure disappears entirely
        let out = move_gaps_to_loop_centre(&["((-..))", "((-..))"]);
        assert_eq!(out, vec!["((..))", "((..))"]);
    }
}
