//! Reactive Primitives
//!
//! This module implements the reactive system: cells, reactions, and the
//! derivations, selectors and lenses composed from them. Everything is
//! created through a [`Runtime`], which owns the dependency graph.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a container for mutable state. When a cell is read while a
//! reaction runs, the reaction is registered as a subscriber. When the cell
//! is written with a different value, every subscriber is queued to re-run.
//!
//! ## Reactions
//!
//! A Reaction is a side-effecting computation that re-runs whenever a cell
//! it read changes. Dependencies are re-tracked on every run, so branches a
//! reaction stops reading stop triggering it. Reactions created while another
//! reaction runs are owned by it and disposed with it.
//!
//! ## Batches
//!
//! A batch holds notifications back until its outermost level closes, so a
//! reaction affected by many writes runs once and sees only the final values.
//!
//! ## Derived Values, Selectors and Lenses
//!
//! A [`Derived`] value caches a computation in a private cell. A selector is
//! a derived value narrowed to part of a source. A [`Lens`] is a two-way view
//! onto part of another value. None of them need graph machinery beyond
//! cells and reactions.
//!
//! # Implementation Notes
//!
//! The runtime is single-threaded. Writes flush the queue iteratively, wave
//! by wave, so long chains and cycles do not grow the call stack. A reaction
//! that reads and then writes the same cell in one run is rejected with
//! [`ReactiveError::InfiniteLoopDetected`](crate::ReactiveError::InfiniteLoopDetected).

mod cell;
mod context;
mod effect;
mod lens;
mod memo;
mod runtime;
mod traits;

pub use cell::{same_value, Cell};
pub use effect::Reaction;
pub use lens::Lens;
pub use memo::Derived;
pub use runtime::Runtime;
pub use traits::{Sink, Source};
