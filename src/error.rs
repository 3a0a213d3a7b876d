//! Core puzzle errors: bad grid parameters and releases of unknown groups.

use crate::grid::GroupId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PuzzleError {
    /// A release named a group that is not in the registry. Nothing was mutated.
    #[error("invalid group id: {0}")]
    InvalidGroupId(GroupId),
    #[error("invalid difficulty {0}: a puzzle needs at least a 2x2 grid")]
    InvalidDifficulty(usize),
    #[error("invalid piece size {width}x{height}: surface too small for this grid")]
    InvalidPieceSize { width: i32, height: i32 },
}
