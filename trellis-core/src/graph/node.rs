//! Graph Nodes
//!
//! This module defines the handles and node records that live in the
//! dependency graph. Cells and reactions are addressed by integer handles
//! issued by the graph that owns them, so removing an edge never relies on
//! object identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::error::Result;

/// Stable handle of a reactive cell within one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CellId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Stable handle of a reaction within one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactionId(u64);

impl ReactionId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ReactionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ReactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reaction#{}", self.0)
    }
}

/// The re-runnable body of a reaction.
///
/// Shared so the runtime can call it after releasing its borrow of the graph.
pub(crate) type ReactionBody = Rc<RefCell<dyn FnMut() -> Result<()>>>;

/// Graph record of a cell.
#[derive(Debug, Default)]
pub(crate) struct CellNode {
    /// Reactions that read this cell during their last run, in registration order.
    pub(crate) subscribers: IndexSet<ReactionId>,
}

/// Graph record of a reaction.
pub(crate) struct ReactionNode {
    pub(crate) body: ReactionBody,

    /// Cells read during the current (or last) run. Doubles as the list of
    /// subscriber sets this reaction belongs to.
    pub(crate) sources: IndexSet<CellId>,

    /// The reaction that was executing when this one was created.
    pub(crate) parent: Option<ReactionId>,

    /// Reactions created while this one was executing.
    pub(crate) children: IndexSet<ReactionId>,

    pub(crate) run_count: u64,
}

impl ReactionNode {
    pub(crate) fn new(body: ReactionBody, parent: Option<ReactionId>) -> Self {
        Self {
            body,
            sources: IndexSet::new(),
            parent,
            children: IndexSet::new(),
            run_count: 0,
        }
    }
}

impl fmt::Debug for ReactionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionNode")
            .field("sources", &self.sources)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("run_count", &self.run_count)
            .finish()
    }
}
