//! Base-pair maps for dot-bracket structures, including nested pseudoknots.
//!
//! [`structure_to_representation`] matches every closing bracket with the most
//! recent still-open bracket of the same level. [`representation_to_structure`]
//! goes the other way and re-derives the bracket level of every pair purely
//! from which pairs cross which, so a structure whose pairs were shifted by
//! alignment gaps comes back with a consistent pseudoknot notation.
//!
//! ### Example
//! ```rust
//! use rnalign2d::{structure_to_representation, representation_to_structure};
//! let s = "((..[[..))..]]";
//! let pairs = structure_to_representation(s);
//! assert_eq!(pairs.partner(0), Some(9));
//! assert_eq!(pairs.partner(12), Some(5));
//! assert_eq!(representation_to_structure(s, &pairs).unwrap(), s);
//! ```
//!
use std::collections::BTreeMap;

use crate::brackets::{BracketAlphabet, Symbol, GAP, STANDARD, UNPAIRED};
use crate::common::Rnalign2dError;

/// Column -> partner column map of one structure.
///
/// Symmetric by construction: `partner(i) == Some(j)` iff `partner(j) == Some(i)`.
/// Columns are byte offsets; structures are ASCII.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PairMap {
    partners: Vec<Option<usize>>,
}

impl PairMap {
    /// Empty map over `width` columns.
    pub fn new(width: usize) -> Self {
        Self { partners: vec![None; width] }
    }

    /// Build from explicit `(i, j)` pairs. Columns beyond `width` are ignored.
    pub fn from_pairs<I: IntoIterator<Item = (usize, usize)>>(width: usize, pairs: I) -> Self {
        let mut map = Self::new(width);
        for (i, j) in pairs {
            if i < width && j < width && i != j {
                map.partners[i] = Some(j);
                map.partners[j] = Some(i);
            }
        }
        map
    }

    /// Partner of `column`, if it is paired.
    pub fn partner(&self, column: usize) -> Option<usize> {
        self.partners.get(column).copied().flatten()
    }

    /// Is `column` paired?
    pub fn is_paired(&self, column: usize) -> bool {
        self.partner(column).is_some()
    }

    /// Number of base pairs.
    pub fn pair_count(&self) -> usize {
        self.partners.iter().flatten().count() / 2
    }

    /// `(column, partner)` for every paired column, left to right.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.partners.iter().enumerate().filter_map(|(i, p)| p.map(|j| (i, j)))
    }

    /// Every pair once, as `(open, close)` with `open < close`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries().filter(|&(i, j)| i < j)
    }

    /// Ordered map view (both directions).
    pub fn to_map(&self) -> BTreeMap<usize, usize> {
        self.entries().collect()
    }
}

/// Pair up the brackets of `structure` using the full bracket table.
///
/// Closing brackets with no open partner of their level are left unpaired.
pub fn structure_to_representation(structure: &str) -> PairMap {
    pair_columns(structure.as_bytes(), &STANDARD)
}

pub(crate) fn pair_columns(structure: &[u8], alphabet: &BracketAlphabet) -> PairMap {
    let mut map = PairMap::new(structure.len());
    let mut open: Vec<Vec<usize>> = vec![Vec::new(); alphabet.levels()];
    for (column, &b) in structure.iter().enumerate() {
        match alphabet.classify(b) {
            Some(Symbol::Open(level)) => open[level].push(column),
            Some(Symbol::Close(level)) => {
                if let Some(start) = open[level].pop() {
                    map.partners[start] = Some(column);
                    map.partners[column] = Some(start);
                }
            }
            _ => {}
        }
    }
    map
}

/// Rebuild `structure` with bracket levels derived from pair crossings.
///
/// `.` and `-` columns are copied. Fails with
/// [`Rnalign2dError::MalformedStructure`] when a bracket has no partner in
/// `pairs`, or when crossing pairs need more levels than the table holds.
pub fn representation_to_structure(structure: &str, pairs: &PairMap) -> Result<String, Rnalign2dError> {
    let bytes = relevel(structure.as_bytes(), pairs, &STANDARD)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub(crate) fn relevel(structure: &[u8], pairs: &PairMap, alphabet: &BracketAlphabet) -> Result<Vec<u8>, Rnalign2dError> {
    // open[l]: closing columns of the still-open pairs of level l, innermost last
    let mut open: Vec<Vec<usize>> = Vec::new();
    let mut opened_at: Vec<Option<usize>> = vec![None; structure.len()];
    let mut out = Vec::with_capacity(structure.len());

    for (column, &b) in structure.iter().enumerate() {
        match alphabet.classify(b) {
            Some(Symbol::Unpaired) => out.push(UNPAIRED),
            Some(Symbol::Gap) => out.push(GAP),
            Some(Symbol::Open(_)) => {
                let close = pairs.partner(column).filter(|&c| c > column).ok_or(
                    Rnalign2dError::MalformedStructure { column, reason: "opening bracket without a partner" },
                )?;
                // lowest level this pair nests into without crossing
                let level = open
                    .iter()
                    .position(|stack| stack.last().map_or(true, |&c| c > close))
                    .unwrap_or(open.len());
                let symbol = alphabet.opening(level).ok_or(
                    Rnalign2dError::MalformedStructure { column, reason: "pseudoknot depth exceeds the bracket alphabet" },
                )?;
                if level == open.len() {
                    open.push(Vec::new());
                }
                open[level].push(close);
                opened_at[column] = Some(level);
                out.push(symbol);
            }
            Some(Symbol::Close(_)) => {
                let start = pairs.partner(column).filter(|&o| o < column).ok_or(
                    Rnalign2dError::MalformedStructure { column, reason: "closing bracket without a partner" },
                )?;
                let level = opened_at[start].ok_or(
                    Rnalign2dError::MalformedStructure { column, reason: "closing bracket of an unlevelled pair" },
                )?;
                open[level].pop();
                let symbol = alphabet.closing(level).ok_or(
                    Rnalign2dError::MalformedStructure { column, reason: "closing bracket of an unlevelled pair" },
                )?;
                out.push(symbol);
            }
            None => return Err(Rnalign2dError::InvalidSymbol { column, symbol: b as char }),
        }
    }
    Ok(out)
}

/// Re-level a structure that uses pseudoknot brackets; plain `()` structures
/// are returned unchanged.
pub fn fix_pseudoknots(structure: &str) -> Result<String, Rnalign2dError> {
    STANDARD.validate(structure)?;
    let knotted = structure
        .bytes()
        .any(|b| matches!(STANDARD.classify(b), Some(Symbol::Open(l)) | Some(Symbol::Close(l)) if l > 0));
    if !knotted {
        return Ok(structure.to_string());
    }
    representation_to_structure(structure, &structure_to_representation(structure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Random nested structure with gaps, using `(` `)` only.
    fn random_nested(rng: &mut StdRng, len: usize) -> String {
        let mut out = Vec::with_capacity(len);
        let mut depth = 0usize;
        for i in 0..len {
            let remaining = len - i;
            let r: f64 = rng.gen();
            if depth > 0 && (remaining <= depth || r < 0.3) {
                out.push(b')');
                depth -= 1;
            } else if remaining > depth + 1 && r < 0.6 {
                out.push(b'(');
                depth += 1;
            } else if r < 0.8 {
                out.push(b'.');
            } else {
                out.push(b'-');
            }
        }
        String::from_utf8(out).unwrap()
    }

    /// Random pairing written with random bracket levels (may cross).
    fn random_knotted(rng: &mut StdRng, len: usize) -> String {
        let mut s = vec![b'.'; len];
        let mut free: Vec<usize> = (0..len).collect();
        let n_pairs = rng.gen_range(0..=len / 3);
        for _ in 0..n_pairs {
            if free.len() < 2 { break; }
            let a = free.swap_remove(rng.gen_range(0..free.len()));
            let b = free.swap_remove(rng.gen_range(0..free.len()));
            let (i, j) = (a.min(b), a.max(b));
            let level = rng.gen_range(0..4);
            s[i] = crate::brackets::LEVELS[level].0;
            s[j] = crate::brackets::LEVELS[level].1;
        }
        String::from_utf8(s).unwrap()
    }

    #[test]
    fn simple_hairpin_pairs() {
        let pairs = structure_to_representation(".(((.)))");
        let expected: BTreeMap<usize, usize> =
            [(1, 7), (2, 6), (3, 5), (7, 1), (6, 2), (5, 3)].into_iter().collect();
        assert_eq!(pairs.to_map(), expected);
        assert_eq!(pairs.partner(0), None);
        assert_eq!(pairs.partner(4), None);
        assert_eq!(pairs.pair_count(), 3);
        assert_eq!(pairs.pairs().collect::<Vec<_>>(), vec![(1, 7), (2, 6), (3, 5)]);
    }

    #[test]
    fn levels_are_matched_independently() {
        let pairs = structure_to_representation("(<[)>]Aa{}");
        assert_eq!(pairs.partner(0), Some(3));
        assert_eq!(pairs.partner(1), Some(4));
        assert_eq!(pairs.partner(2), Some(5));
        assert_eq!(pairs.partner(6), Some(7));
        assert_eq!(pairs.partner(8), Some(9));
    }

    #[test]
    fn unmatched_brackets_are_skipped() {
        let pairs = structure_to_representation(")(.)(");
        assert_eq!(pairs.partner(0), None);
        assert_eq!(pairs.partner(1), Some(3));
        assert_eq!(pairs.partner(4), None);
    }

    #[test]
    fn pseudoknot_round_trip() {
        for s in ["((..[[..))..]]", "((--..))", "(([[..))]]..{{..}}", "..((..[[..))..{{..]]..}}"] {
            let pairs = structure_to_representation(s);
            let rebuilt = representation_to_structure(s, &pairs).unwrap();
            assert_eq!(structure_to_representation(&rebuilt), pairs, "{s}");
        }
        assert_eq!(
            representation_to_structure("((..[[..))..]]", &structure_to_representation("((..[[..))..]]")).unwrap(),
            "((..[[..))..]]"
        );
    }

    #[test]
    fn crossing_pairs_get_new_level() {
        // written with one level but the pair map says the pairs cross
        let pairs = PairMap::from_pairs(6, [(0, 3), (1, 4), (2, 5)]);
        let out = representation_to_structure("((()))", &pairs).unwrap();
        assert_eq!(out, "([{)]}");
    }

    #[test]
    fn redundant_knot_level_is_lowered() {
        // `[]` pairs that do not cross anything become `()`
        assert_eq!(fix_pseudoknots("((..))[[..]]").unwrap(), "((..))((..))");
        assert_eq!(fix_pseudoknots("(..)").unwrap(), "(..)");
        assert_eq!(fix_pseudoknots("((..[[..))-.]]").unwrap(), "((..[[..))-.]]");
    }

    #[test]
    fn malformed_input() {
        let pairs = structure_to_representation("((.)");
        let err = representation_to_structure("((.)", &pairs).unwrap_err();
        assert_eq!(err, Rnalign2dError::MalformedStructure { column: 0, reason: "opening bracket without a partner" });
        assert!(matches!(representation_to_structure("(.#)", &structure_to_representation("(.#)")),
            Err(Rnalign2dError::InvalidSymbol { column: 2, symbol: '#' })));
        assert!(fix_pseudoknots("(%)").is_err());
    }

    #[test]
    fn nested_structures_round_trip_exactly() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let len = rng.gen_range(1..60);
            let s = random_nested(&mut rng, len);
            let pairs = structure_to_representation(&s);
            assert_eq!(representation_to_structure(&s, &pairs).unwrap(), s);
        }
    }

    #[test]
    fn pair_map_is_an_involution() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let len = rng.gen_range(1..80);
            let s = random_knotted(&mut rng, len);
            let pairs = structure_to_representation(&s);
            for (i, j) in pairs.entries() {
                assert_ne!(i, j);
                assert_eq!(pairs.partner(j), Some(i), "{s}");
            }
            // topology survives re-levelling
            let rebuilt = representation_to_structure(&s, &pairs).unwrap();
            assert_eq!(rebuilt.len(), s.len());
            assert_eq!(structure_to_representation(&rebuilt), pairs, "{s} -> {rebuilt}");
        }
    }
}
