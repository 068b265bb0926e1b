//! Dependency Graph
//!
//! The bipartite cell↔reaction graph, plus the ownership tree of reactions.
//!
//! Edges are kept in both directions: a cell lists its subscribers and a
//! reaction lists its sources. Both sides use insertion-ordered sets so that
//! notification order follows registration order and removal is by handle.

use std::collections::HashMap;

use super::node::{CellId, CellNode, ReactionBody, ReactionId, ReactionNode};

/// Owner of every cell and reaction record of one runtime.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    cells: HashMap<CellId, CellNode>,
    reactions: HashMap<ReactionId, ReactionNode>,
    next_cell: u64,
    next_reaction: u64,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate a cell record and return its handle.
    pub(crate) fn insert_cell(&mut self) -> CellId {
        let id = CellId::from(self.next_cell);
        self.next_cell += 1;
        self.cells.insert(id, CellNode::default());
        id
    }

    /// Remove a cell record and every edge pointing at it.
    pub(crate) fn remove_cell(&mut self, cell: CellId) {
        if let Some(node) = self.cells.remove(&cell) {
            for reaction in &node.subscribers {
                if let Some(reaction) = self.reactions.get_mut(reaction) {
                    reaction.sources.shift_remove(&cell);
                }
            }
        }
    }

    /// Allocate a reaction record, attaching it to `parent` when given.
    pub(crate) fn insert_reaction(
        &mut self,
        body: ReactionBody,
        parent: Option<ReactionId>,
    ) -> ReactionId {
        let id = ReactionId::from(self.next_reaction);
        self.next_reaction += 1;

        // A parent that is already gone cannot own anything.
        let parent = parent.filter(|p| self.reactions.contains_key(p));
        if let Some(parent) = parent.and_then(|p| self.reactions.get_mut(&p)) {
            parent.children.insert(id);
        }

        self.reactions.insert(id, ReactionNode::new(body, parent));
        id
    }

    pub(crate) fn contains_reaction(&self, reaction: ReactionId) -> bool {
        self.reactions.contains_key(&reaction)
    }

    #[cfg(test)]
    pub(crate) fn contains_cell(&self, cell: CellId) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Record that `reaction` read `cell` during its current run.
    pub(crate) fn link(&mut self, cell: CellId, reaction: ReactionId) {
        let (Some(cell_node), Some(reaction_node)) =
            (self.cells.get_mut(&cell), self.reactions.get_mut(&reaction))
        else {
            return;
        };
        cell_node.subscribers.insert(reaction);
        reaction_node.sources.insert(cell);
    }

    /// Drop every edge of `reaction` and empty its read-set.
    pub(crate) fn clear_sources(&mut self, reaction: ReactionId) {
        let Some(node) = self.reactions.get_mut(&reaction) else {
            return;
        };
        for cell in node.sources.drain(..) {
            if let Some(cell) = self.cells.get_mut(&cell) {
                cell.subscribers.shift_remove(&reaction);
            }
        }
    }

    /// Whether `reaction` has read `cell` during its current run.
    pub(crate) fn has_read(&self, reaction: ReactionId, cell: CellId) -> bool {
        self.reactions
            .get(&reaction)
            .is_some_and(|node| node.sources.contains(&cell))
    }

    pub(crate) fn parent(&self, reaction: ReactionId) -> Option<ReactionId> {
        self.reactions.get(&reaction).and_then(|node| node.parent)
    }

    pub(crate) fn children(&self, reaction: ReactionId) -> Vec<ReactionId> {
        self.reactions
            .get(&reaction)
            .map(|node| node.children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a cell's subscribers, in registration order.
    pub(crate) fn subscribers(&self, cell: CellId) -> Vec<ReactionId> {
        self.cells
            .get(&cell)
            .map(|node| node.subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn subscriber_count(&self, cell: CellId) -> usize {
        self.cells.get(&cell).map_or(0, |node| node.subscribers.len())
    }

    pub(crate) fn source_count(&self, reaction: ReactionId) -> usize {
        self.reactions.get(&reaction).map_or(0, |node| node.sources.len())
    }

    pub(crate) fn run_count(&self, reaction: ReactionId) -> u64 {
        self.reactions.get(&reaction).map_or(0, |node| node.run_count)
    }

    /// Prepare `reaction` for a new run: bump its counter and hand out its body.
    pub(crate) fn begin_run(&mut self, reaction: ReactionId) -> Option<ReactionBody> {
        let node = self.reactions.get_mut(&reaction)?;
        node.run_count += 1;
        Some(node.body.clone())
    }

    /// Detach `root` and its whole subtree from the graph.
    ///
    /// The removed records are returned instead of dropped: their bodies may
    /// own cells whose destructors call back into the graph.
    pub(crate) fn remove_subtree(&mut self, root: ReactionId) -> Vec<(ReactionId, ReactionNode)> {
        let mut removed = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.reactions.remove(&id) else {
                continue;
            };
            for cell in &node.sources {
                if let Some(cell) = self.cells.get_mut(cell) {
                    cell.subscribers.shift_remove(&id);
                }
            }
            stack.extend(node.children.iter().copied());
            removed.push((id, node));
        }

        let parent = removed.first().and_then(|(_, node)| node.parent);
        if let Some(parent) = parent.and_then(|p| self.reactions.get_mut(&p)) {
            parent.children.shift_remove(&root);
        }

        removed
    }

    pub(crate) fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
