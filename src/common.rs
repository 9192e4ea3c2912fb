//! Common helpers shared by the tools: the crate error type, minimal
//! record parsing for `name / sequence / structure` triples, and
//! re-attaching nucleotide letters to a refined (gapped) structure.
//!
//! ## Records
//! The parser is intentionally permissive and suitable for small/medium files
//! and tests. A record starts at a `>` line; every following line is
//! concatenated. When the second half of that text looks like a dot-bracket
//! structure the text is split in two, otherwise the whole text is taken as
//! the sequence and an all-unpaired structure is assumed.
//!
//! ## Examples
//! ```rust
//! use rnalign2d::parse_records;
//! let recs = parse_records(">r1\nGGGAAACCC\n(((...)))\n>r2\nGGAAAUCC\n");
//! assert_eq!(recs.len(), 2);
//! assert_eq!(recs[0].structure, "(((...)))");
//! assert_eq!(recs[1].structure, "........");
//! ```
//!

use crate::brackets::GAP;

/// Errors that can be returned by the algorithms in this crate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Rnalign2dError {
    /// A bracket could not be matched or re-levelled while rebuilding a structure.
    #[error("malformed structure at column {column}: {reason}")]
    MalformedStructure { column: usize, reason: &'static str },
    /// A character outside `. -` and the bracket alphabet.
    #[error("invalid structure symbol {symbol:?} at column {column}")]
    InvalidSymbol { column: usize, symbol: char },
    /// Structures of one aligned batch do not share the same width.
    #[error("structure {index} has length {found}, expected {expected}")]
    LengthMismatch { index: usize, expected: usize, found: usize },
    /// The gap optimizer hit its iteration cap before reaching a fixed point.
    #[error("refinement did not converge within {iterations} iterations")]
    RefinementIncomplete { iterations: usize },
    /// Record input that cannot be framed or re-interleaved.
    #[error("invalid record input: {0}")]
    InvalidRecord(String),
}

/// One `name / sequence / structure` triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureRecord {
    /// Header line, including the leading `>`.
    pub name: String,
    /// Nucleotide sequence (may contain `-` once aligned).
    pub sequence: String,
    /// Dot-bracket structure of the same width as `sequence`.
    pub structure: String,
}

/// Parse records from text.
///
/// Lines starting with `>` start a new record. All other lines are appended
/// to the current record. Text before the first header is ignored.
///
/// ## Panics
/// This function does not panic.
pub fn parse_records(text: &str) -> Vec<StructureRecord> {
    let mut out: Vec<StructureRecord> = vec![];
    let mut name: Option<String> = None;
    let mut body = String::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.starts_with('>') {
            if let Some(prev) = name.take() {
                out.push(split_record(prev, &body));
                body.clear();
            }
            name = Some(line.to_string());
        } else {
            body.push_str(line.trim());
        }
    }
    if let Some(prev) = name {
        out.push(split_record(prev, &body));
    }
    out
}

fn split_record(name: String, body: &str) -> StructureRecord {
    let chars: Vec<char> = body.chars().collect();
    let half = chars.len() / 2;
    let second: &[char] = &chars[half..];
    let structural = second.iter().filter(|c| matches!(c, '.' | '-' | '(' | ')' | '[' | ']')).count();
    if !second.is_empty() && structural * 2 > second.len() {
        StructureRecord {
            name,
            sequence: chars[..half].iter().collect(),
            structure: second.iter().collect(),
        }
    } else {
        // No structure supplied: folding is left to the caller.
        StructureRecord { name, sequence: body.to_string(), structure: ".".repeat(chars.len()) }
    }
}

/// Lay the letters of `sequence` onto the columns of a gapped `structure`.
///
/// Gap columns of the structure become `-`; every other column takes the next
/// letter of `sequence`, skipping any `-` already present in it.
pub fn interleave_sequence(sequence: &str, structure: &str) -> Result<String, Rnalign2dError> {
    let mut letters = sequence.chars().filter(|&c| c != GAP as char);
    let mut out = String::with_capacity(structure.len());
    for (column, s) in structure.chars().enumerate() {
        if s == GAP as char {
            out.push('-');
        } else {
            let letter = letters.next().ok_or_else(|| {
                Rnalign2dError::InvalidRecord(format!("sequence exhausted at structure column {column}"))
            })?;
            out.push(letter);
        }
    }
    Ok(out)
}

/// Render records as `name\nsequence\nstructure\n` blocks.
pub fn format_records(records: &[StructureRecord]) -> String {
    let mut out = String::new();
    for r in records {
        out.push_str(&r.name); out.push('\n');
        out.push_str(&r.sequence); out.push('\n');
        out.push_str(&r.structure); out.push('\n');
    }
    out
}

/// Read one structure per non-empty line.
pub fn parse_raw_structures(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}

/// Check that all structures in a batch share the first structure's width.
pub fn check_equal_lengths<S: AsRef<[u8]>>(batch: &[S]) -> Result<(), Rnalign2dError> {
    let Some(first) = batch.first() else { return Ok(()) };
    let expected = first.as_ref().len();
    for (index, s) in batch.iter().enumerate() {
        let found = s.as_ref().len();
        if found != expected {
            return Err(Rnalign2dError::LengthMismatch { index, expected, found });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_sequence_and_structure() {
        let recs = parse_records(">a desc\nGGG\nAAA\nCCC\n(((\n...\n)))\n");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].name, ">a desc");
        assert_eq!(recs[0].sequence, "GGGAAACCC");
        assert_eq!(recs[0].structure, "(((...)))");
    }

    #[test]
    fn missing_structure_is_all_dots() {
        let recs = parse_records(">x\nACGUACGU\n");
        assert_eq!(recs[0].sequence, "ACGUACGU");
        assert_eq!(recs[0].structure, "........");
    }

    #[test]
    fn gapped_structure_half_is_recognised() {
        let recs = parse_records(">x\nGG-AACC\n((-..))\n");
        assert_eq!(recs[0].sequence, "GG-AACC");
        assert_eq!(recs[0].structure, "((-..))");
    }

    #[test]
    fn interleave_places_letters_at_non_gap_columns() {
        let out = interleave_sequence("GG-AUCC", "((--..))").unwrap();
        assert_eq!(out, "GG--AUCC");
        let out = interleave_sequence("AACCGG", "AA-C-CGG").unwrap();
        assert_eq!(out, "AA-C-CGG");
    }

    #[test]
    fn interleave_reports_short_sequence() {
        let err = interleave_sequence("GG", "(.)").unwrap_err();
        assert!(matches!(err, Rnalign2dError::InvalidRecord(_)));
    }

    #[test]
    fn records_round_trip_through_format() {
        let recs = vec![StructureRecord { name: ">a".into(), sequence: "GA-C".into(), structure: "(.-)".into() }];
        let text = format_records(&recs);
        assert_eq!(text, ">a\nGA-C\n(.-)\n");
        assert_eq!(parse_records(&text), recs);
    }

    #[test]
    fn length_check() {
        assert!(check_equal_lengths(&["..", "()"]).is_ok());
        let empty: [&str; 0] = [];
        assert!(check_equal_lengths(&empty).is_ok());
        assert_eq!(
            check_equal_lengths(&["...", "()"]),
            Err(Rnalign2dError::LengthMismatch { index: 1, expected: 3, found: 2 })
        );
    }
}
