//! Dot-bracket alphabet.
//!
//! Pairing levels are a fixed ordered table of `(open, close)` symbols:
//!
//! ```text
//! level 0  ( )     level 2  { }     level 4  A a   ...
//! level 1  [ ]     level 3  < >     level 29 Z z
//! ```
//!
//! `.` marks an unpaired column and `-` an alignment gap. Nested pseudoknots
//! are written with increasing levels. A [`BracketAlphabet`] restricts how
//! many levels of the table are in use.

use crate::common::Rnalign2dError;

/// Unpaired column.
pub const UNPAIRED: u8 = b'.';
/// Alignment gap column.
pub const GAP: u8 = b'-';
/// Number of levels in the bracket table.
pub const MAX_LEVELS: usize = 30;

const fn level_table() -> [(u8, u8); MAX_LEVELS] {
    let mut table = [(0u8, 0u8); MAX_LEVELS];
    table[0] = (b'(', b')');
    table[1] = (b'[', b']');
    table[2] = (b'{', b'}');
    table[3] = (b'<', b'>');
    let mut i = 0;
    while i < 26 {
        table[4 + i] = (b'A' + i as u8, b'a' + i as u8);
        i += 1;
    }
    table
}

/// `(open, close)` symbol for every level, lowest level first.
pub const LEVELS: [(u8, u8); MAX_LEVELS] = level_table();

/// Classification of one structure column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// `.`
    Unpaired,
    /// `-`
    Gap,
    /// Opening bracket of the given level.
    Open(usize),
    /// Closing bracket of the given level.
    Close(usize),
}

/// The set of bracket levels in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BracketAlphabet {
    levels: usize,
}

impl Default for BracketAlphabet {
    fn default() -> Self { STANDARD }
}

/// All [`MAX_LEVELS`] levels.
pub const STANDARD: BracketAlphabet = BracketAlphabet { levels: MAX_LEVELS };

impl BracketAlphabet {
    /// Alphabet using the first `levels` rows of the table (clamped to `1..=MAX_LEVELS`).
    pub fn with_levels(levels: usize) -> Self {
        Self { levels: levels.clamp(1, MAX_LEVELS) }
    }

    /// Number of usable levels.
    pub fn levels(&self) -> usize { self.levels }

    /// Opening symbol for `level`, if the level is in use.
    pub fn opening(&self, level: usize) -> Option<u8> {
        (level < self.levels).then(|| LEVELS[level].0)
    }

    /// Closing symbol for `level`, if the level is in use.
    pub fn closing(&self, level: usize) -> Option<u8> {
        (level < self.levels).then(|| LEVELS[level].1)
    }

    /// Classify one byte; `None` for symbols outside the alphabet.
    pub fn classify(&self, b: u8) -> Option<Symbol> {
        match b {
            UNPAIRED => Some(Symbol::Unpaired),
            GAP => Some(Symbol::Gap),
            _ => LEVELS[..self.levels].iter().enumerate().find_map(|(level, &(open, close))| {
                if b == open {
                    Some(Symbol::Open(level))
                } else if b == close {
                    Some(Symbol::Close(level))
                } else {
                    None
                }
            }),
        }
    }

    /// Reject any character that is not `.`, `-` or an in-use bracket.
    pub fn validate(&self, structure: &str) -> Result<(), Rnalign2dError> {
        for (column, ch) in structure.chars().enumerate() {
            let known = ch.is_ascii() && self.classify(ch as u8).is_some();
            if !known {
                return Err(Rnalign2dError::InvalidSymbol { column, symbol: ch });
            }
        }
        Ok(())
    }
}

/// `true` for anything other than `.` and `-`.
pub fn is_bracket(b: u8) -> bool {
    b != UNPAIRED && b != GAP
}

/// `true` for `.` and `-`.
pub fn is_free(b: u8) -> bool {
    !is_bracket(b)
}

/// Validate against the full alphabet.
pub fn validate_structure(structure: &str) -> Result<(), Rnalign2dError> {
    STANDARD.validate(structure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_symbols_and_letters() {
        assert_eq!(LEVELS[0], (b'(', b')'));
        assert_eq!(LEVELS[3], (b'<', b'>'));
        assert_eq!(LEVELS[4], (b'A', b'a'));
        assert_eq!(LEVELS[29], (b'Z', b'z'));
    }

    #[test]
    fn classify() {
        assert_eq!(STANDARD.classify(b'.'), Some(Symbol::Unpaired));
        assert_eq!(STANDARD.classify(b'-'), Some(Symbol::Gap));
        assert_eq!(STANDARD.classify(b'['), Some(Symbol::Open(1)));
        assert_eq!(STANDARD.classify(b'b'), Some(Symbol::Close(5)));
        assert_eq!(STANDARD.classify(b'x'), Some(Symbol::Close(27)));
        assert_eq!(STANDARD.classify(b'#'), None);
        assert_eq!(BracketAlphabet::with_levels(2).classify(b'{'), None);
    }

    #[test]
    fn limited_alphabet() {
        let a = BracketAlphabet::with_levels(4);
        assert_eq!(a.levels(), 4);
        assert_eq!(a.opening(3), Some(b'<'));
        assert_eq!(a.opening(4), None);
        assert_eq!(BracketAlphabet::with_levels(0).levels(), 1);
        assert_eq!(BracketAlphabet::with_levels(99).levels(), MAX_LEVELS);
    }

    #[test]
    fn validation() {
        assert!(validate_structure("((.-[))]Aa").is_ok());
        assert_eq!(
            validate_structure("((#))"),
            Err(Rnalign2dError::InvalidSymbol { column: 2, symbol: '#' })
        );
        assert!(validate_structure("(é)").is_err());
    }
}
