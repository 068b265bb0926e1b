//! Update Scheduler
//!
//! The scheduler holds the mutable state of one propagation cycle: which
//! reaction is executing, which reactions are waiting to run, whether a flush
//! is in progress, and how deep the current batch is.
//!
//! # Algorithm
//!
//! Writes enqueue subscribers into `pending`, an insertion-ordered set, so a
//! reaction notified twice before the next pass still runs once. A flush then
//! repeatedly takes the whole pending set as one wave:
//!
//! 1. Snapshot `pending` and clear it
//! 2. Run every reaction of the snapshot in insertion order
//! 3. Anything those runs enqueued becomes the next wave
//!
//! Cycles therefore grow the number of waves, never the native stack.

use std::collections::VecDeque;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::ReactionId;

/// One wave of reactions to run.
pub(crate) type Wave = SmallVec<[ReactionId; 8]>;

/// Per-runtime scheduling state.
#[derive(Debug, Default)]
pub(crate) struct UpdateScheduler {
    /// The reaction whose reads are being tracked, if any.
    current: Option<ReactionId>,

    /// Reactions currently on the call stack.
    running: SmallVec<[ReactionId; 8]>,

    /// Reactions notified since the last wave was taken.
    pending: IndexSet<ReactionId>,

    /// Reactions created inside a batch, waiting for their first run.
    deferred: VecDeque<ReactionId>,

    flushing: bool,
    batch_depth: usize,
}

impl UpdateScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn current(&self) -> Option<ReactionId> {
        self.current
    }

    /// Replace the current reaction, returning the previous one.
    pub(crate) fn swap_current(&mut self, reaction: Option<ReactionId>) -> Option<ReactionId> {
        std::mem::replace(&mut self.current, reaction)
    }

    pub(crate) fn is_running(&self, reaction: ReactionId) -> bool {
        self.running.contains(&reaction)
    }

    pub(crate) fn enter_running(&mut self, reaction: ReactionId) {
        self.running.push(reaction);
    }

    pub(crate) fn leave_running(&mut self, reaction: ReactionId) {
        if let Some(index) = self.running.iter().rposition(|r| *r == reaction) {
            self.running.remove(index);
        }
    }

    /// Add reactions to the pending set, keeping first-notification order.
    pub(crate) fn enqueue(&mut self, reactions: impl IntoIterator<Item = ReactionId>) {
        self.pending.extend(reactions);
    }

    /// Take the pending set as the next wave, leaving it empty.
    pub(crate) fn take_wave(&mut self) -> Wave {
        self.pending.drain(..).collect()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Mark a flush as started. Returns `false` if one is already running.
    pub(crate) fn begin_flush(&mut self) -> bool {
        !std::mem::replace(&mut self.flushing, true)
    }

    pub(crate) fn end_flush(&mut self) {
        self.flushing = false;
    }

    pub(crate) fn is_flushing(&self) -> bool {
        self.flushing
    }

    /// Whether a write right now should start a flush.
    pub(crate) fn should_flush(&self) -> bool {
        self.batch_depth == 0 && !self.flushing
    }

    pub(crate) fn enter_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Leave one batch level and return the remaining depth.
    pub(crate) fn exit_batch(&mut self) -> usize {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        self.batch_depth
    }

    pub(crate) fn batch_depth(&self) -> usize {
        self.batch_depth
    }

    pub(crate) fn defer(&mut self, reaction: ReactionId) {
        self.deferred.push_back(reaction);
    }

    pub(crate) fn pop_deferred(&mut self) -> Option<ReactionId> {
        self.deferred.pop_front()
    }

    /// Remove `reaction` from the deferred list. Returns whether it was there.
    pub(crate) fn take_deferred(&mut self, reaction: ReactionId) -> bool {
        let before = self.deferred.len();
        self.deferred.retain(|r| *r != reaction);
        before != self.deferred.len()
    }

    #[cfg(test)]
    pub(crate) fn is_deferred(&self, reaction: ReactionId) -> bool {
        self.deferred.contains(&reaction)
    }

    /// Drop every trace of disposed reactions.
    pub(crate) fn forget(&mut self, reactions: &[ReactionId]) {
        for reaction in reactions {
            self.pending.shift_remove(reaction);
            self.running.retain(|r| *r != *reaction);
        }
        self.deferred.retain(|r| !reactions.contains(r));
    }

    /// Discard queued work after a failure.
    ///
    /// Returns the reactions whose first run will now never happen.
    pub(crate) fn abort(&mut self) -> Vec<ReactionId> {
        self.pending.clear();
        self.deferred.drain(..).collect()
    }
}
