//! Structural blocks: maximal runs of paired columns that move together.
//!
//! A block grows while the next column carries the same bracket and its
//! partner carries the same bracket as the current column's partner. One
//! mismatching column is tolerated when the column after it satisfies the
//! same test, so a single bulge or gap inside a helix does not split it.
//!
//! ### Example
//! ```rust
//! use rnalign2d::{find_structural_blocks, structure_to_representation, Block};
//! let s = "((((..))))";
//! let blocks = find_structural_blocks(s, &structure_to_representation(s));
//! assert_eq!(blocks, vec![Block { start: 0, end: 3 }, Block { start: 6, end: 9 }]);
//! ```
//!
use crate::brackets::is_bracket;
use crate::pairing::PairMap;

/// A run of co-moving paired columns. `end` is the last column of the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block {
    pub start: usize,
    pub end: usize,
}

impl Block {
    /// `end - start`; zero for a single-column block.
    pub fn span(&self) -> usize { self.end - self.start }

    /// `start <= column <= end`.
    pub fn covers(&self, column: usize) -> bool {
        self.start <= column && column <= self.end
    }

    /// Does the half-open head `start..end` of `self` share a column with that of `other`?
    pub fn heads_overlap(&self, other: &Block) -> bool {
        self.span() > 0 && other.span() > 0 && self.start < other.end && other.start < self.end
    }
}

/// Partition the paired columns of `structure` into blocks, left to right.
///
/// Brackets that have no partner in `pairs` never start or extend a block.
pub fn find_structural_blocks(structure: &str, pairs: &PairMap) -> Vec<Block> {
    structural_blocks(structure.as_bytes(), pairs)
}

pub(crate) fn structural_blocks(s: &[u8], pairs: &PairMap) -> Vec<Block> {
    let n = s.len();
    let paired = |i: usize| is_bracket(s[i]) && pairs.is_paired(i);
    let co_moving = |i: usize, j: usize| -> bool {
        if j >= n || s[i] != s[j] {
            return false;
        }
        match (pairs.partner(i), pairs.partner(j)) {
            (Some(a), Some(b)) => s[a] == s[b],
            _ => false,
        }
    };

    let mut blocks = Vec::new();
    let mut open: Option<usize> = None;
    for i in 0..n {
        if !paired(i) { continue; }
        match open {
            None => {
                if i + 1 < n && s[i] == s[i + 1] && paired(i + 1) {
                    open = Some(i);
                } else {
                    blocks.push(Block { start: i, end: i });
                }
            }
            Some(start) => {
                if co_moving(i, i + 1) || co_moving(i, i + 2) {
                    continue;
                }
                blocks.push(Block { start, end: i });
                open = None;
            }
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::structure_to_representation;

    fn blocks(s: &str) -> Vec<(usize, usize)> {
        find_structural_blocks(s, &structure_to_representation(s)).into_iter().map(|b| (b.start, b.end)).collect()
    }

    #[test]
    fn hairpin_has_two_blocks() {
        assert_eq!(blocks("((((....))))"), vec![(0, 3), (8, 11)]);
        assert_eq!(blocks("..(((...)))."), vec![(2, 4), (8, 10)]);
    }

    #[test]
    fn single_columns() {
        assert_eq!(blocks("(.)"), vec![(0, 0), (2, 2)]);
        assert_eq!(blocks("()()"), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn single_bulge_is_tolerated() {
        assert_eq!(blocks("((.((....))))"), vec![(0, 4), (9, 12)]);
        assert_eq!(blocks("((-((....))))"), vec![(0, 4), (9, 12)]);
    }

    #[test]
    fn two_column_interruption_splits() {
        assert_eq!(blocks("((..((....))))"), vec![(0, 1), (4, 5), (10, 13)]);
    }

    #[test]
    fn helices_split_on_unpaired_runs() {
        assert_eq!(blocks("((..))((..))"), vec![(0, 1), (4, 5), (6, 7), (10, 11)]);
        // one opening run closes in two places
        assert_eq!(blocks("((((..))..))"), vec![(0, 3), (6, 7), (10, 11)]);
    }

    #[test]
    fn pseudoknot_levels_are_separate_blocks() {
        assert_eq!(blocks("((..[[..))..]]"), vec![(0, 1), (4, 5), (8, 9), (12, 13)]);
    }

    #[test]
    fn unmatched_brackets_are_ignored() {
        assert_eq!(blocks(")((..))"), vec![(1, 2), (5, 6)]);
        assert!(blocks("((((").is_empty());
    }

    #[test]
    fn block_helpers() {
        let a = Block { start: 2, end: 5 };
        assert_eq!(a.span(), 3);
        assert!(a.covers(5) && !a.covers(6));
        assert!(a.heads_overlap(&Block { start: 4, end: 7 }));
        assert!(!a.heads_overlap(&Block { start: 5, end: 8 }));
        assert!(!Block { start: 3, end: 3 }.heads_overlap(&a));
    }
}
