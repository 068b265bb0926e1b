//! Reaction Handles
//!
//! A reaction is a side-effecting computation that re-runs whenever a cell it
//! read changes. [`Runtime::reaction`](super::Runtime::reaction) creates one
//! and returns a [`Reaction`] handle.
//!
//! # How Reactions Work
//!
//! 1. When created, the reaction runs immediately to establish its initial
//!    dependencies (or at the end of the enclosing batch).
//!
//! 2. When any dependency changes, the reaction is queued to re-run.
//!
//! 3. Before re-running, the reaction drops all old dependencies and the
//!    reactions it created, then tracks new ones during execution.
//!
//! # Disposal
//!
//! Dropping a `Reaction` handle does not stop the reaction; call
//! [`Reaction::dispose`]. Disposal is immediate, recursive over the
//! reactions it owns, and idempotent.

use std::fmt;
use std::rc::Weak;

use super::runtime::RuntimeInner;
use crate::graph::ReactionId;

/// Handle to a reaction registered with a runtime.
///
/// # Example
///
/// ```rust
/// use trellis_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.cell(0);
///
/// let reaction = rt.reaction({
///     let count = count.clone();
///     move || {
///         println!("Count is: {}", count.read());
///         Ok(())
///     }
/// })?;
///
/// count.write(5)?; // Prints: "Count is: 5"
/// reaction.dispose();
/// count.write(6)?; // Prints nothing
/// # Ok::<(), trellis_core::ReactiveError>(())
/// ```
#[derive(Clone)]
pub struct Reaction {
    id: ReactionId,
    runtime: Weak<RuntimeInner>,
}

impl Reaction {
    pub(crate) fn new(id: ReactionId, runtime: Weak<RuntimeInner>) -> Self {
        Self { id, runtime }
    }

    /// Get the reaction's handle in the dependency graph.
    pub fn id(&self) -> ReactionId {
        self.id
    }

    /// Dispose of the reaction and every reaction it created.
    ///
    /// After disposal, the reaction will not run again. Calling this more
    /// than once is a no-op.
    pub fn dispose(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.dispose(self.id);
        }
    }

    /// A closure that disposes this reaction when called.
    pub fn disposer(&self) -> impl Fn() + 'static {
        let reaction = self.clone();
        move || reaction.dispose()
    }

    /// Check if the reaction has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.runtime
            .upgrade()
            .map_or(true, |runtime| !runtime.is_live(self.id))
    }

    /// Get the number of times the reaction has run.
    pub fn run_count(&self) -> u64 {
        self.runtime
            .upgrade()
            .map_or(0, |runtime| runtime.run_count(self.id))
    }

    /// Get the number of cells read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map_or(0, |runtime| runtime.source_count(self.id))
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
