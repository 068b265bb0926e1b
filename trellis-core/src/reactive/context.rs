//! Reactive Context
//!
//! The reactive context tracks which reaction is currently running.
//! This enables automatic dependency tracking: when a cell is read,
//! the runtime can register the current reaction as a subscriber.
//!
//! # Implementation
//!
//! The current reaction lives in the runtime's scheduler rather than in a
//! thread-local, so every runtime tracks independently. Entering a context
//! swaps the current reaction and remembers the previous one; dropping the
//! guard puts it back. Nested contexts (a reaction created or forced while
//! another runs) therefore unwind in order, including during a panic.

use std::cell::RefCell;

use crate::graph::{ReactionId, UpdateScheduler};

/// Guard that restores the previous reaction when dropped.
pub(crate) struct ReactiveContext<'a> {
    scheduler: &'a RefCell<UpdateScheduler>,
    reaction: Option<ReactionId>,
    previous: Option<ReactionId>,
}

impl<'a> ReactiveContext<'a> {
    /// Enter the tracking scope of `reaction`.
    ///
    /// While the guard is alive, cell reads register `reaction` as a
    /// subscriber and the reaction counts as running.
    pub(crate) fn enter(scheduler: &'a RefCell<UpdateScheduler>, reaction: ReactionId) -> Self {
        let previous = {
            let mut scheduler = scheduler.borrow_mut();
            scheduler.enter_running(reaction);
            scheduler.swap_current(Some(reaction))
        };
        Self {
            scheduler,
            reaction: Some(reaction),
            previous,
        }
    }

    /// Suspend tracking until the guard is dropped.
    pub(crate) fn untracked(scheduler: &'a RefCell<UpdateScheduler>) -> Self {
        let previous = scheduler.borrow_mut().swap_current(None);
        Self {
            scheduler,
            reaction: None,
            previous,
        }
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        let mut scheduler = self.scheduler.borrow_mut();
        let popped = scheduler.swap_current(self.previous);

        // Contexts must unwind in the order they were entered.
        debug_assert_eq!(
            popped, self.reaction,
            "ReactiveContext mismatch: expected {:?}, got {:?}",
            self.reaction, popped
        );

        if let Some(reaction) = self.reaction {
            scheduler.leave_running(reaction);
        }
    }
}
