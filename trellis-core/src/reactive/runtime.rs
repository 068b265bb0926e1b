//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells, reactions,
//! derivations and lenses. It owns the dependency graph and the scheduler
//! state, and implements the read/write protocol on top of them.
//!
//! # How It Works
//!
//! 1. When a cell is read while a reaction runs, the runtime records the
//!    edge in both directions.
//!
//! 2. When a cell is written, the runtime first checks the self-mutation
//!    guard, then queues every subscriber of the cell.
//!
//! 3. Unless a batch is open or a flush is already in progress, the write
//!    flushes the queue: waves of reactions run until nothing is pending.
//!
//! 4. Before each run, a reaction loses all its edges and the children it
//!    created last time, then re-tracks whatever it reads.
//!
//! # Ownership
//!
//! A [`Runtime`] is an explicit context object. Everything created through it
//! holds only a weak reference back, so dropping the last `Runtime` handle
//! tears the graph down. Reactions are never collected implicitly: they stay
//! registered until disposed.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::cell::Cell;
use super::context::ReactiveContext;
use super::effect::Reaction;
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{CellId, DependencyGraph, ReactionBody, ReactionId, UpdateScheduler};

/// An isolated reactive context.
///
/// Cloning a `Runtime` clones the handle; all clones share one graph.
///
/// # Example
///
/// ```rust
/// use trellis_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.cell(1);
/// let doubled = rt.derive({
///     let count = count.clone();
///     move || Ok(count.read() * 2)
/// })?;
///
/// count.write(5)?;
/// assert_eq!(doubled.read()?, 10);
/// # Ok::<(), trellis_core::ReactiveError>(())
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Shared state behind a [`Runtime`].
pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    graph: RefCell<DependencyGraph>,
    scheduler: RefCell<UpdateScheduler>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                graph: RefCell::new(DependencyGraph::new()),
                scheduler: RefCell::new(UpdateScheduler::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn inner(&self) -> &RuntimeInner {
        &self.inner
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create a cell compared with same-value equality.
    pub fn cell<T>(&self, initial: T) -> Cell<T>
    where
        T: PartialEq + 'static,
    {
        Cell::with_equality(self, initial, Box::new(super::cell::same_value::<T>))
    }

    /// Create a cell with a custom equality check.
    ///
    /// Writes for which `equality(current, new)` holds are dropped.
    pub fn cell_with<T, E>(&self, initial: T, equality: E) -> Cell<T>
    where
        T: 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        Cell::with_equality(self, initial, Box::new(equality))
    }

    /// Create a reaction.
    ///
    /// The body runs immediately (or at the end of the enclosing batch) and
    /// again whenever a cell it read changes. A reaction created while another
    /// one runs is owned by it and disposed with it.
    ///
    /// If the immediate first run fails, the error is returned. The reaction
    /// stays registered with the reads it made before failing, so a later
    /// change to one of them runs it again.
    pub fn reaction<F>(&self, body: F) -> Result<Reaction>
    where
        F: FnMut() -> Result<()> + 'static,
    {
        let (reaction, first_run) = self.spawn_reaction(body);
        first_run.map(|()| reaction)
    }

    /// Create a reaction, handing back both the handle and the outcome of an
    /// immediate first run.
    pub(crate) fn spawn_reaction<F>(&self, body: F) -> (Reaction, Result<()>)
    where
        F: FnMut() -> Result<()> + 'static,
    {
        let body: ReactionBody = Rc::new(RefCell::new(body));
        let (id, first_run) = self.inner.create_reaction(body);
        (Reaction::new(id, self.downgrade()), first_run)
    }

    /// Run `f` with notifications held back until the outermost batch closes.
    ///
    /// Writes inside the batch are visible immediately. When the outermost
    /// batch completes, reactions created inside it get their first run (in
    /// creation order), then queued notifications are flushed.
    ///
    /// If `f` fails, the error is returned and, once the outermost batch has
    /// unwound, queued notifications and pending creations are discarded.
    /// Writes already applied are kept.
    pub fn batch<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let guard = BatchGuard::enter(&self.inner);
        let value = f()?;
        if guard.commit() > 0 {
            return Ok(value);
        }
        self.inner.settle()?;
        Ok(value)
    }

    /// Run `f` without tracking any reads.
    pub fn untrack<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _context = ReactiveContext::untracked(&self.inner.scheduler);
        f()
    }

    /// Drain the notification queue now.
    ///
    /// No-op inside a batch or while a flush is already running.
    pub fn flush(&self) -> Result<()> {
        if self.is_batching() {
            return Ok(());
        }
        self.inner.flush()
    }

    /// Number of reactions waiting for the next wave.
    pub fn pending_count(&self) -> usize {
        self.inner.scheduler.borrow().pending_len()
    }

    /// Number of live (not disposed) reactions.
    pub fn reaction_count(&self) -> usize {
        self.inner.graph.borrow().reaction_count()
    }

    /// Number of live cells, including the private cells of derivations and lenses.
    pub fn cell_count(&self) -> usize {
        self.inner.graph.borrow().cell_count()
    }

    /// Whether a batch is open.
    pub fn is_batching(&self) -> bool {
        self.inner.scheduler.borrow().batch_depth() > 0
    }

    /// Whether a flush is in progress.
    pub fn is_flushing(&self) -> bool {
        self.inner.scheduler.borrow().is_flushing()
    }

    /// The reaction currently being tracked, if any.
    pub fn current_reaction(&self) -> Option<ReactionId> {
        self.inner.scheduler.borrow().current()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("cell_count", &self.cell_count())
            .field("reaction_count", &self.reaction_count())
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

impl RuntimeInner {
    pub(crate) fn insert_cell(&self) -> CellId {
        self.graph.borrow_mut().insert_cell()
    }

    /// Forget a cell whose last handle was dropped.
    pub(crate) fn release_cell(&self, cell: CellId) {
        match self.graph.try_borrow_mut() {
            Ok(mut graph) => graph.remove_cell(cell),
            Err(_) => debug!(%cell, "graph busy, leaving released cell in place"),
        }
    }

    pub(crate) fn subscriber_count(&self, cell: CellId) -> usize {
        self.graph.borrow().subscriber_count(cell)
    }

    pub(crate) fn is_live(&self, reaction: ReactionId) -> bool {
        self.graph.borrow().contains_reaction(reaction)
    }

    pub(crate) fn run_count(&self, reaction: ReactionId) -> u64 {
        self.graph.borrow().run_count(reaction)
    }

    pub(crate) fn source_count(&self, reaction: ReactionId) -> usize {
        self.graph.borrow().source_count(reaction)
    }

    /// Record a read of `cell` by the current reaction, if there is one.
    pub(crate) fn track(&self, cell: CellId) {
        let current = self.scheduler.borrow().current();
        if let Some(reaction) = current {
            self.graph.borrow_mut().link(cell, reaction);
        }
    }

    /// The self-mutation guard, consulted before a write is stored.
    pub(crate) fn check_write(&self, cell: CellId) -> Result<()> {
        if !self.config.detect_self_mutation {
            return Ok(());
        }
        let Some(reaction) = self.scheduler.borrow().current() else {
            return Ok(());
        };

        let graph = self.graph.borrow();
        if graph.has_read(reaction, cell) && graph.parent(reaction).is_none() {
            warn!(%cell, %reaction, "reaction wrote a cell it read in the same run");
            return Err(ReactiveError::InfiniteLoopDetected { cell, reaction });
        }
        Ok(())
    }

    /// Queue the subscribers of a changed cell and flush if allowed.
    pub(crate) fn notify(&self, cell: CellId) -> Result<()> {
        let subscribers = self.graph.borrow().subscribers(cell);
        if subscribers.is_empty() {
            return Ok(());
        }

        let should_flush = {
            let mut scheduler = self.scheduler.borrow_mut();
            scheduler.enqueue(subscribers);
            scheduler.should_flush()
        };
        if should_flush {
            self.flush()
        } else {
            Ok(())
        }
    }

    pub(crate) fn create_reaction(&self, body: ReactionBody) -> (ReactionId, Result<()>) {
        let parent = self.scheduler.borrow().current();
        let reaction = self.graph.borrow_mut().insert_reaction(body, parent);

        let batching = self.scheduler.borrow().batch_depth() > 0;
        if batching {
            trace!(%reaction, "deferring first run until the batch closes");
            self.scheduler.borrow_mut().defer(reaction);
            return (reaction, Ok(()));
        }

        let first_run = self.run_reaction(reaction);
        if let Err(err) = &first_run {
            debug!(%reaction, error = %err, "first run failed, keeping recorded reads");
        }
        (reaction, first_run)
    }

    /// Run one reaction with full re-tracking.
    pub(crate) fn run_reaction(&self, reaction: ReactionId) -> Result<()> {
        if self.scheduler.borrow().is_running(reaction) {
            trace!(%reaction, "reaction is already running, skipping");
            return Ok(());
        }
        if !self.is_live(reaction) {
            return Ok(());
        }

        // Children belong to the run that created them.
        let children = self.graph.borrow().children(reaction);
        for child in children {
            self.dispose(child);
        }

        let body = {
            let mut graph = self.graph.borrow_mut();
            graph.clear_sources(reaction);
            graph.begin_run(reaction)
        };
        let Some(body) = body else {
            return Ok(());
        };
        let Ok(mut run) = body.try_borrow_mut() else {
            return Ok(());
        };

        trace!(%reaction, "running reaction");
        let _context = ReactiveContext::enter(&self.scheduler, reaction);
        (&mut *run)()
    }

    /// Give a reaction created inside a batch its first run right away.
    pub(crate) fn force(&self, reaction: ReactionId) -> Result<()> {
        let deferred = self.scheduler.borrow_mut().take_deferred(reaction);
        if deferred {
            trace!(%reaction, "forcing deferred first run");
            self.run_reaction(reaction)
        } else {
            Ok(())
        }
    }

    /// Run queued reactions wave by wave until nothing is pending.
    pub(crate) fn flush(&self) -> Result<()> {
        if !self.scheduler.borrow_mut().begin_flush() {
            return Ok(());
        }
        let _flushing = FlushGuard { runtime: self };

        let mut passes = 0usize;
        loop {
            let wave = self.scheduler.borrow_mut().take_wave();
            if wave.is_empty() {
                break;
            }

            passes += 1;
            if let Some(limit) = self.config.max_flush_passes.filter(|limit| passes > *limit) {
                warn!(limit, "flush exceeded its pass limit, discarding queued reactions");
                self.discard_queued();
                return Err(ReactiveError::FlushLimitExceeded { limit });
            }

            trace!(pass = passes, reactions = wave.len(), "flushing wave");
            for reaction in wave {
                if let Err(err) = self.run_reaction(reaction) {
                    debug!(%reaction, error = %err, "reaction failed, aborting flush");
                    self.discard_queued();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Finish the outermost batch: first runs, then the queued notifications.
    fn settle(&self) -> Result<()> {
        // Writes made by first runs are queued behind them, not flushed in between.
        let guard = BatchGuard::enter(self);
        loop {
            let next = self.scheduler.borrow_mut().pop_deferred();
            let Some(reaction) = next else {
                break;
            };
            self.run_reaction(reaction)?;
        }
        guard.commit();

        self.flush()
    }

    /// Drop queued notifications and dispose reactions that never got their
    /// first run.
    fn discard_queued(&self) {
        let discarded = self.scheduler.borrow_mut().abort();
        for reaction in discarded {
            self.dispose(reaction);
        }
    }

    /// Dispose `reaction` and every reaction it owns. Idempotent.
    pub(crate) fn dispose(&self, reaction: ReactionId) {
        let removed = self.graph.borrow_mut().remove_subtree(reaction);
        if removed.is_empty() {
            return;
        }

        let ids: Vec<ReactionId> = removed.iter().map(|(id, _)| *id).collect();
        self.scheduler.borrow_mut().forget(&ids);
        trace!(%reaction, disposed = ids.len(), "disposed reaction subtree");

        // Bodies may own cells that unregister themselves from the graph.
        drop(removed);
    }
}

/// Holds one batch level open; discards queued work if dropped uncommitted
/// at the outermost level.
struct BatchGuard<'a> {
    runtime: &'a RuntimeInner,
    open: bool,
}

impl<'a> BatchGuard<'a> {
    fn enter(runtime: &'a RuntimeInner) -> Self {
        runtime.scheduler.borrow_mut().enter_batch();
        Self {
            runtime,
            open: true,
        }
    }

    /// Close this level normally and return the remaining depth.
    fn commit(mut self) -> usize {
        self.open = false;
        self.runtime.scheduler.borrow_mut().exit_batch()
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        let remaining = self.runtime.scheduler.borrow_mut().exit_batch();
        if remaining == 0 {
            debug!("batch aborted, discarding queued reactions");
            self.runtime.discard_queued();
        }
    }
}

/// Clears the flushing flag when a flush ends, however it ends.
struct FlushGuard<'a> {
    runtime: &'a RuntimeInner,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.runtime.scheduler.borrow_mut().end_flush();
        if std::thread::panicking() {
            self.runtime.discard_queued();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
