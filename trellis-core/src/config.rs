//! Runtime Configuration
//!
//! A [`RuntimeConfig`] is fixed when a [`Runtime`](crate::Runtime) is built.
//! The defaults match the engine's documented behavior: cycles run until they
//! converge, and same-run read+write is rejected.

/// Tunables for a reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Upper bound on passes per flush. `None` leaves cycles unbounded.
    pub max_flush_passes: Option<usize>,

    /// Reject a top-level reaction writing a cell it read in the same run.
    pub detect_self_mutation: bool,
}

impl RuntimeConfig {
    /// Stop a flush with an error once it has run `passes` waves.
    pub fn with_max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = Some(passes);
        self
    }

    /// Turn off the self-mutation guard.
    ///
    /// Same-run writes then re-enqueue the reaction like any other write.
    pub fn without_self_mutation_guard(mut self) -> Self {
        self.detect_self_mutation = false;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: None,
            detect_self_mutation: true,
        }
    }
}
