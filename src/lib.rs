//! # rnalign2d
//!
//! Structure-aware refinement of aligned RNA secondary structures.
//!
//! A sequence aligner places gaps by sequence alone, so the dot-bracket
//! structures of an alignment often have helices that are one or two
//! columns out of register. This crate shifts those gaps so that paired
//! regions line up across the batch, using column conservation as the
//! objective.
//!
//! ## Dot-bracket alphabet
//! `.` is an unpaired base and `-` an alignment gap. Base pairs use `()`,
//! then `[]`, `{}`, `<>` and `A/a` to `Z/z` for nested pseudoknot levels
//! (see [`brackets`]).
//!
//! ## Pipeline
//! 1. [`structure_to_representation`] turns each structure into a [`PairMap`].
//! 2. [`find_structural_blocks`] cuts every structure into co-moving helix runs.
//! 3. [`refine`] repeatedly finds columns where structures disagree on the
//!    pairing partner and slides gaps while [`score_by_conservation`] does
//!    not drop below the tolerance.
//! 4. [`remove_gaps_same_place`] and [`move_gaps_to_loop_centre`] tidy the
//!    result.
//!
//! ### Example
//! ```
//! use rnalign2d::{refine, RefineParams};
//! let batch = ["((((....))))-", "-((((....))))"];
//! let out = refine(&batch, &RefineParams::default()).unwrap();
//! assert_eq!(out, vec!["((((....))))", "((((....))))"]);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod blocks;
pub mod brackets;
pub mod centering;
pub mod common;
pub mod conservation;
pub mod consensus;
pub mod pairing;
pub mod refine;

pub use blocks::{find_structural_blocks, Block};
pub use brackets::{validate_structure, BracketAlphabet, Symbol, GAP, MAX_LEVELS, UNPAIRED};
pub use centering::{move_gaps_to_loop_centre, remove_gaps_same_place};
pub use common::{
    check_equal_lengths, format_records, interleave_sequence, parse_raw_structures, parse_records, Rnalign2dError,
    StructureRecord,
};
pub use conservation::{conservation_profile, score_by_conservation, structure_conservation, ColumnScore};
pub use consensus::{consensus_structure, ConsensusParams};
pub use pairing::{fix_pseudoknots, representation_to_structure, structure_to_representation, PairMap};
pub use refine::{
    optimize_gaps, refine, refine_with_report, unusual_positions, MoveStats, RefineParams, RefineReport,
    UnusualPosition,
};
