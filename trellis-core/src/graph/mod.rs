//! Dependency Graph
//!
//! This module holds the bookkeeping behind the reactive primitives: the
//! bipartite graph of cells and reactions, and the scheduler state that
//! drives propagation through it.
//!
//! # Overview
//!
//! - A cell node lists the reactions that read it during their last run
//! - A reaction node lists the cells it read, its owner, and its children
//! - The scheduler queues reactions whose cells changed and drains them in
//!   waves
//!
//! # Design Decisions
//!
//! 1. Nodes are addressed by integer handles ([`CellId`], [`ReactionId`])
//!    issued by the graph, never by pointer identity.
//!
//! 2. Edges are rebuilt from scratch on every run. Removing all of a
//!    reaction's edges before it runs is what drops branches it stopped
//!    reading.
//!
//! 3. Nothing is collected implicitly. A reaction leaves the graph only
//!    when it is disposed, and a cell only when its last handle is dropped.

mod dependency;
mod node;
mod scheduler;

pub use node::{CellId, ReactionId};

pub(crate) use dependency::DependencyGraph;
pub(crate) use node::ReactionBody;
pub(crate) use scheduler::UpdateScheduler;
