//! Read and write access shared by cells, derivations and lenses.
//!
//! Selectors and lenses are generic over these traits, so they can sit on top
//! of a plain [`Cell`](super::Cell), a [`Derived`](super::Derived) value or
//! another [`Lens`](super::Lens).

use crate::error::Result;

/// Something that can be read, with or without dependency tracking.
pub trait Source<T> {
    /// Read the value, subscribing the running reaction (if any).
    fn get(&self) -> Result<T>;

    /// Read the value without subscribing anyone.
    fn get_untracked(&self) -> Result<T>;
}

/// A [`Source`] that can also be written.
pub trait Sink<T>: Source<T> {
    /// Write a new value, notifying subscribers if it changed.
    fn set(&self, value: T) -> Result<()>;
}
