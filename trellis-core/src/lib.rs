//! Trellis Core
//!
//! This crate provides a single-threaded reactive runtime. It implements:
//!
//! - Reactive cells with pluggable equality
//! - Reactions with automatic, per-run dependency tracking
//! - Batches that coalesce notifications
//! - Derived values, selectors and lenses built on top of them
//!
//! Propagation is iterative, so deep chains do not grow the stack, and a
//! reaction that writes a cell it just read is rejected instead of looping.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: The runtime and the reactive primitives
//! - `graph`: Dependency graph and scheduler bookkeeping
//! - `error`: Error types shared by every operation
//! - `config`: Runtime configuration
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use trellis_core::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a cell
//! let count = rt.cell(0);
//!
//! // Create a derived value
//! let doubled = rt.derive({
//!     let count = count.clone();
//!     move || Ok(count.read() * 2)
//! })?;
//!
//! // Create a reaction
//! let log = Rc::new(RefCell::new(Vec::new()));
//! rt.reaction({
//!     let (doubled, log) = (doubled.clone(), log.clone());
//!     move || {
//!         log.borrow_mut().push(doubled.read()?);
//!         Ok(())
//!     }
//! })?;
//!
//! // Update the cell; the reaction runs again
//! count.write(5)?;
//! assert_eq!(*log.borrow(), vec![0, 10]);
//! # Ok::<(), trellis_core::ReactiveError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use graph::{CellId, ReactionId};
pub use reactive::{same_value, Cell, Derived, Lens, Reaction, Runtime, Sink, Source};
