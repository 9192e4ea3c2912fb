//! Column conservation of an aligned batch of structures.
//!
//! Every column scores the sum of squared symbol counts, so a column where
//! all `n` structures agree scores `n²` and an even split scores less. The
//! batch score is the mean over columns. The value is only meaningful when
//! comparing two versions of the same batch.
//!
//! ### Example
//! ```rust
//! use rnalign2d::{structure_conservation, score_by_conservation};
//! let batch = ["((..))", "((-.))", "(....)"];
//! assert_eq!(structure_conservation(&batch), vec![9, 5, 5, 9, 5, 9]);
//! assert!((score_by_conservation(&batch) - 7.0).abs() < 1e-9);
//! ```
//!

/// Score and symbol diversity of one column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnScore {
    /// 0-based column.
    pub column: usize,
    /// Number of distinct symbols in the column.
    pub distinct: usize,
    /// Sum of squared symbol counts.
    pub score: usize,
}

/// Per-column scores. The width is that of the first structure; shorter
/// structures simply do not contribute to the missing columns.
pub fn conservation_profile<S: AsRef<[u8]>>(structures: &[S]) -> Vec<ColumnScore> {
    let cols = structures.first().map_or(0, |s| s.as_ref().len());
    column_scores(structures, 0, cols)
}

fn column_scores<S: AsRef<[u8]>>(structures: &[S], from: usize, to: usize) -> Vec<ColumnScore> {
    let mut out = Vec::with_capacity(to.saturating_sub(from));
    for c in from..to {
        let mut counts = [0usize; 256];
        for s in structures {
            if let Some(&b) = s.as_ref().get(c) {
                counts[b as usize] += 1;
            }
        }
        let distinct = counts.iter().filter(|&&n| n > 0).count();
        let score = counts.iter().map(|&n| n * n).sum();
        out.push(ColumnScore { column: c, distinct, score });
    }
    out
}

/// Sum of squared symbol counts for every column.
pub fn structure_conservation<S: AsRef<[u8]>>(structures: &[S]) -> Vec<usize> {
    conservation_profile(structures).into_iter().map(|c| c.score).collect()
}

/// Mean column score; `0.0` for an empty batch or zero-width structures.
pub fn score_by_conservation<S: AsRef<[u8]>>(structures: &[S]) -> f64 {
    let cols = structures.first().map_or(0, |s| s.as_ref().len());
    window_score(structures, 0, cols).unwrap_or(0.0)
}

/// Mean score over columns `from..to`, clamped to the batch width.
/// `None` when the window is empty.
pub(crate) fn window_score<S: AsRef<[u8]>>(structures: &[S], from: usize, to: usize) -> Option<f64> {
    let cols = structures.first().map_or(0, |s| s.as_ref().len());
    let to = to.min(cols);
    if structures.is_empty() || from >= to {
        return None;
    }
    let scores = column_scores(structures, from, to);
    let total: usize = scores.iter().map(|c| c.score).sum();
    Some(total as f64 / scores.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_conserved_columns_score_n_squared() {
        let batch = ["((..))", "((..))", "((..))", "((..))"];
        assert_eq!(structure_conservation(&batch), vec![16; 6]);
        assert_eq!(score_by_conservation(&batch), 16.0);
    }

    #[test]
    fn majority_beats_even_split() {
        let majority = ["(", "(", "(", "."];
        let split = ["(", "(", ".", "."];
        assert!(score_by_conservation(&majority) > score_by_conservation(&split));
        assert_eq!(structure_conservation(&majority), vec![10]);
        assert_eq!(structure_conservation(&split), vec![8]);
    }

    #[test]
    fn empty_inputs() {
        let empty: [&str; 0] = [];
        assert!(structure_conservation(&empty).is_empty());
        assert_eq!(score_by_conservation(&empty), 0.0);
        assert_eq!(score_by_conservation(&["", ""]), 0.0);
    }

    #[test]
    fn profile_counts_distinct_symbols() {
        let p = conservation_profile(&["(-.", "(..", "[.."]);
        assert_eq!(p[0], ColumnScore { column: 0, distinct: 2, score: 5 });
        assert_eq!(p[1], ColumnScore { column: 1, distinct: 2, score: 5 });
        assert_eq!(p[2], ColumnScore { column: 2, distinct: 1, score: 9 });
    }

    #[test]
    fn windows() {
        let batch = ["((..))", "(-..-)"];
        assert_eq!(window_score(&batch, 0, 1), Some(4.0));
        assert_eq!(window_score(&batch, 0, 2), Some(3.0));
        assert_eq!(window_score(&batch, 4, 100), Some(3.0));
        assert_eq!(window_score(&batch, 3, 3), None);
        assert_eq!(window_score(&batch, 9, 12), None);
    }
}
