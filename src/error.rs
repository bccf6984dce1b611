//! Error kinds surfaced by the table.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Rejected constructor parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A cursor observed a structural change it did not make itself.
    #[error("structural modification during traversal (expected mod count {expected}, found {actual})")]
    ConcurrentStructuralChange { expected: u64, actual: u64 },

    /// `Cursor::remove` without a preceding successful `next`.
    #[error("cursor has no current entry to remove")]
    NoCurrentEntry,

    /// Internal consistency check failed. Never expected in correct operation.
    #[error("table invariant violated: {0}")]
    InvariantViolation(String),
}
