//! Consensus secondary structure of an aligned batch.
//!
//! - `consensus_structure`: column-wise majority with a support threshold.
//!
//! A column emits the first symbol, in alphabet order (every level's
//! opening then closing bracket, then `.`, then `-`), carried by at least
//! `ceil(n * threshold)` structures. A bracket only survives when as many
//! structures also pair the column with the same partner column; otherwise
//! the column becomes `.`.
//!
//! ### Example
//! ```rust
//! use rnalign2d::{consensus_structure, ConsensusParams};
//! let batch = ["((..))", "((..))", "(....)"];
//! assert_eq!(consensus_structure(&batch, &ConsensusParams::default()).unwrap(), "((..))");
//! ```
//!
use crate::brackets::{BracketAlphabet, GAP, STANDARD, UNPAIRED};
use crate::common::{check_equal_lengths, Rnalign2dError};
use crate::pairing::{pair_columns, PairMap};

/// Parameters for [`consensus_structure`].
#[derive(Clone, Debug)]
pub struct ConsensusParams {
    /// Fraction of structures (0.0..=1.0) that must carry a symbol.
    pub threshold: f64,
    pub alphabet: BracketAlphabet,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self { threshold: 0.5, alphabet: STANDARD }
    }
}

/// Majority consensus of equal-width structures. An empty batch gives `""`.
pub fn consensus_structure<S: AsRef<str>>(structures: &[S], params: &ConsensusParams) -> Result<String, Rnalign2dError> {
    for s in structures {
        params.alphabet.validate(s.as_ref())?;
    }
    let rows: Vec<&[u8]> = structures.iter().map(|s| s.as_ref().as_bytes()).collect();
    check_equal_lengths(&rows)?;
    let Some(first) = rows.first() else { return Ok(String::new()) };

    let n = rows.len();
    let minimum = ((n as f64 * params.threshold).ceil() as usize).clamp(1, n);
    let pairs: Vec<PairMap> = rows.iter().map(|r| pair_columns(r, &params.alphabet)).collect();
    let candidates = candidate_order(&params.alphabet);
    log::debug!("consensus of {n} structures, minimum support {minimum}");

    let mut out = String::with_capacity(first.len());
    for c in 0..first.len() {
        let mut counts = [0usize; 256];
        for r in &rows {
            counts[r[c] as usize] += 1;
        }
        let winner = candidates.iter().copied().find(|&b| counts[b as usize] >= minimum);
        let symbol = match winner {
            Some(b) if b == UNPAIRED || b == GAP => b,
            Some(b) if partner_support(&pairs, c) >= minimum => b,
            _ => UNPAIRED,
        };
        out.push(symbol as char);
    }
    Ok(out)
}

fn candidate_order(alphabet: &BracketAlphabet) -> Vec<u8> {
    let mut order = Vec::with_capacity(alphabet.levels() * 2 + 2);
    for level in 0..alphabet.levels() {
        order.extend(alphabet.opening(level));
        order.extend(alphabet.closing(level));
    }
    order.push(UNPAIRED);
    order.push(GAP);
    order
}

/// Largest number of structures pairing `column` with one and the same partner.
fn partner_support(pairs: &[PairMap], column: usize) -> usize {
    let mut partners: Vec<usize> = pairs.iter().filter_map(|p| p.partner(column)).collect();
    partners.sort_unstable();
    let mut best = 0;
    let mut run = 0;
    for (i, p) in partners.iter().enumerate() {
        run = if i > 0 && partners[i - 1] == *p { run + 1 } else { 1 };
        best = best.max(run);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consensus(batch: &[&str]) -> String {
        consensus_structure(batch, &ConsensusParams::default()).unwrap()
    }

    #[test]
    fn majority_per_column() {
        assert_eq!(consensus(&["((..))", "((--))", "((..))"]), "((..))");
        assert_eq!(consensus(&["(.-)", "(--)", "(.-)"]), "(.-)");
    }

    #[test]
    fn brackets_need_a_shared_partner() {
        // every column is `(` or `)` in two of three structures, but the
        // partners differ, so only the outer pair survives
        assert_eq!(consensus(&["(()).", "(.())", "((.))"]), "(...)");
    }

    #[test]
    fn even_split_prefers_brackets() {
        // ceil(4 / 2) = 2 is reached by `(` before `.`
        assert_eq!(consensus(&["(..)", "(..)", "....", "...."]), "(..)");
    }

    #[test]
    fn no_winner_gives_unpaired() {
        let batch = ["(.)", "[.]", "-.-"];
        let strict = ConsensusParams { threshold: 1.0, ..Default::default() };
        assert_eq!(consensus_structure(&batch, &strict).unwrap(), "...");
    }

    #[test]
    fn pseudoknot_levels() {
        assert_eq!(consensus(&["((..[[..))..]]", "((..[[..))..]]"]), "((..[[..))..]]");
    }

    #[test]
    fn empty_and_invalid() {
        let empty: [&str; 0] = [];
        assert_eq!(consensus_structure(&empty, &ConsensusParams::default()).unwrap(), "");
        assert!(matches!(
            consensus_structure(&["(..)", "(.)"], &ConsensusParams::default()),
            Err(Rnalign2dError::LengthMismatch { index: 1, .. })
        ));
        assert!(matches!(
            consensus_structure(&["(..)", "(.?)"], &ConsensusParams::default()),
            Err(Rnalign2dError::InvalidSymbol { column: 2, symbol: '?' })
        ));
    }
}
