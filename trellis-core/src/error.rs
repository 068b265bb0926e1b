//! Error Types
//!
//! Every fallible operation in the runtime returns [`ReactiveError`]. Failures
//! are surfaced to the caller immediately; nothing is retried.

use std::error::Error as StdError;

use thiserror::Error;

use crate::graph::{CellId, ReactionId};

/// Result type for reactive operations.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors raised by the reactive runtime.
#[derive(Error, Debug)]
pub enum ReactiveError {
    /// A top-level reaction wrote a cell it had already read in the same run.
    #[error("infinite loop detected: {reaction} read and wrote {cell} in the same run")]
    InfiniteLoopDetected { cell: CellId, reaction: ReactionId },

    /// A reaction, derivation or selector body failed.
    #[error("computation failed: {0}")]
    Computation(#[source] Box<dyn StdError + 'static>),

    /// A cell was written while its value was still borrowed by
    /// [`Cell::with`](crate::Cell::with) further up the stack.
    #[error("{cell} was written while its value was borrowed")]
    CellBorrowed { cell: CellId },

    /// A flush ran more passes than the configured limit.
    #[error("flush did not settle within {limit} passes")]
    FlushLimitExceeded { limit: usize },

    /// A derived value was read before its computation was supplied.
    #[error("derived value has not been resolved")]
    Unresolved,

    /// A computation was supplied twice for the same derived value.
    #[error("derived value is already resolved")]
    AlreadyResolved,

    /// The handle outlived the runtime that created it.
    #[error("reactive runtime has been dropped")]
    RuntimeDropped,
}

impl ReactiveError {
    /// Wrap a failure raised by user code.
    ///
    /// Accepts any error type as well as plain `&str`/`String` messages.
    pub fn computation(err: impl Into<Box<dyn StdError + 'static>>) -> Self {
        Self::Computation(err.into())
    }

    /// Whether this error came from the self-mutation guard.
    pub fn is_infinite_loop(&self) -> bool {
        matches!(self, Self::InfiniteLoopDetected { .. })
    }
}
