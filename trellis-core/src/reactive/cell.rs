//! Cell Implementation
//!
//! A Cell is the fundamental reactive primitive. It holds a value and
//! tracks which reactions depend on it.
//!
//! # How Cells Work
//!
//! 1. When a cell is read while a reaction runs, the runtime registers that
//!    reaction as a subscriber.
//!
//! 2. When a cell is written with a value its equality check considers
//!    different, every subscriber is queued.
//!
//! 3. Queued reactions re-run when the runtime flushes.
//!
//! # Memory Layout
//!
//! The value lives in the handle (behind `Rc`), not in the runtime. The
//! runtime only keeps a [`CellId`] and the cell's subscriber set. When the
//! last handle is dropped, the cell's graph record is released.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use super::runtime::{Runtime, RuntimeInner};
use super::traits::{Sink, Source};
use crate::error::{ReactiveError, Result};
use crate::graph::CellId;

/// Same-value equality.
///
/// Equal values are the same, and so are two values that are each unequal to
/// themselves. For floats this makes `NaN` equal to `NaN`, so writing `NaN`
/// over `NaN` does not notify anyone.
#[allow(clippy::eq_op)]
pub fn same_value<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b || (a != a && b != b)
}

type Equality<T> = Box<dyn Fn(&T, &T) -> bool>;

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use trellis_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.cell(0);
///
/// // Read the value
/// assert_eq!(count.read(), 0);
///
/// // Update the value (notifies subscribers)
/// count.write(5)?;
/// count.update(|n| n + 1)?;
/// assert_eq!(count.peek(), 6);
/// # Ok::<(), trellis_core::ReactiveError>(())
/// ```
pub struct Cell<T: 'static> {
    inner: Rc<CellInner<T>>,
}

struct CellInner<T> {
    id: CellId,
    value: RefCell<T>,
    equals: Equality<T>,
    runtime: Weak<RuntimeInner>,
}

impl<T: 'static> Cell<T> {
    pub(crate) fn with_equality(runtime: &Runtime, initial: T, equals: Equality<T>) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id: runtime.inner().insert_cell(),
                value: RefCell::new(initial),
                equals,
                runtime: runtime.downgrade(),
            }),
        }
    }

    /// Get the cell's handle in the dependency graph.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get a clone of the current value.
    ///
    /// Inside a running reaction this also subscribes the reaction.
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, tracking the read like [`read`](Self::read).
    ///
    /// The value stays borrowed while `f` runs. Any write to this cell in the
    /// meantime, direct or through reactions that `f` triggers, fails with
    /// [`CellBorrowed`](crate::ReactiveError::CellBorrowed).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&*self.inner.value.borrow())
    }

    /// Get the current value without tracking.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.peek_with(T::clone)
    }

    pub(crate) fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Set a new value and notify subscribers.
    ///
    /// Does nothing when the new value equals the current one. Fails with
    /// [`InfiniteLoopDetected`](crate::ReactiveError::InfiniteLoopDetected),
    /// leaving the value untouched, when a top-level reaction writes a cell it
    /// already read in the same run. Fails with
    /// [`CellBorrowed`](crate::ReactiveError::CellBorrowed) while the value is
    /// borrowed by [`with`](Self::with). Errors raised by reactions that this
    /// write flushes are returned here.
    pub fn write(&self, value: T) -> Result<()> {
        if self.is_same(&value) {
            return Ok(());
        }
        self.ensure_writable()?;

        let Some(runtime) = self.inner.runtime.upgrade() else {
            return self.replace(value);
        };

        runtime.check_write(self.inner.id)?;
        self.replace(value)?;
        runtime.notify(self.inner.id)
    }

    /// Update the value using a function of the current one.
    ///
    /// The current value is read with tracking, so calling this inside a
    /// top-level reaction trips the self-mutation guard.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let next = self.with(f);
        self.write(next)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.subscriber_count(self.inner.id))
    }

    /// Whether `value` equals the current value under this cell's equality.
    pub(crate) fn is_same(&self, value: &T) -> bool {
        (self.inner.equals)(&*self.inner.value.borrow(), value)
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.inner.value.try_borrow_mut() {
            Ok(_) => Ok(()),
            Err(_) => Err(ReactiveError::CellBorrowed { cell: self.inner.id }),
        }
    }

    fn replace(&self, value: T) -> Result<()> {
        // The old value is dropped after the borrow ends; it may own other cells.
        let previous = {
            let mut slot = self
                .inner
                .value
                .try_borrow_mut()
                .map_err(|_| ReactiveError::CellBorrowed { cell: self.inner.id })?;
            std::mem::replace(&mut *slot, value)
        };
        drop(previous);
        Ok(())
    }

    fn track(&self) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(self.inner.id);
        }
    }
}

impl<T> Drop for CellInner<T> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release_cell(self.id);
        }
    }
}

impl<T: 'static> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T: Clone + 'static> Source<T> for Cell<T> {
    fn get(&self) -> Result<T> {
        Ok(self.read())
    }

    fn get_untracked(&self) -> Result<T> {
        Ok(self.peek())
    }
}

impl<T: Clone + 'static> Sink<T> for Cell<T> {
    fn set(&self, value: T) -> Result<()> {
        self.write(value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_read_and_write() {
        let rt = Runtime::new();
        let cell = rt.cell(0);
        assert_eq!(cell.read(), 0);

        cell.write(42).unwrap();
        assert_eq!(cell.read(), 42);
    }

    #[test]
    fn cell_update() {
        let rt = Runtime::new();
        let cell = rt.cell(10);
        cell.update(|v| v + 5).unwrap();
        assert_eq!(cell.read(), 15);
    }

    #[test]
    fn cell_clone_shares_state() {
        let rt = Runtime::new();
        let cell1 = rt.cell(0);
        let cell2 = cell1.clone();

        cell1.write(42).unwrap();
        assert_eq!(cell2.read(), 42);

        cell2.write(100).unwrap();
        assert_eq!(cell1.read(), 100);
        assert_eq!(cell1.id(), cell2.id());
    }

    #[test]
    fn cell_ids_are_unique() {
        let rt = Runtime::new();
        let c1 = rt.cell(0);
        let c2 = rt.cell(0);
        let c3 = rt.cell(0);

        assert_ne!(c1.id(), c2.id());
        assert_ne!(c2.id(), c3.id());
        assert_ne!(c1.id(), c3.id());
    }

    #[test]
    fn same_value_treats_nan_as_equal() {
        assert!(same_value(&f64::NAN, &f64::NAN));
        assert!(same_value(&1.5, &1.5));
        assert!(!same_value(&1.5, &f64::NAN));
        assert!(same_value(&"a", &"a"));
    }

    #[test]
    fn writing_nan_over_nan_does_not_notify() {
        let rt = Runtime::new();
        let cell = rt.cell(f64::NAN);
        let runs = Rc::new(RefCell::new(0));

        rt.reaction({
            let (cell, runs) = (cell.clone(), runs.clone());
            move || {
                cell.read();
                *runs.borrow_mut() += 1;
                Ok(())
            }
        })
        .unwrap();

        cell.write(f64::NAN).unwrap();
        assert_eq!(*runs.borrow(), 1);
    }

    #[test]
    fn custom_equality_gates_writes() {
        let rt = Runtime::new();
        // Case-insensitive strings.
        let cell = rt.cell_with(String::from("hello"), |a: &String, b: &String| {
            a.eq_ignore_ascii_case(b)
        });
        let runs = Rc::new(RefCell::new(0));

        rt.reaction({
            let (cell, runs) = (cell.clone(), runs.clone());
            move || {
                cell.with(|_| ());
                *runs.borrow_mut() += 1;
                Ok(())
            }
        })
        .unwrap();

        cell.write("HELLO".into()).unwrap();
        assert_eq!(cell.peek(), "hello");
        assert_eq!(*runs.borrow(), 1);

        cell.write("world".into()).unwrap();
        assert_eq!(*runs.borrow(), 2);
    }

    #[test]
    fn update_inside_a_reaction_trips_the_guard() {
        let rt = Runtime::new();
        let cell = rt.cell(0);

        let err = rt
            .reaction({
                let cell = cell.clone();
                move || cell.update(|v| v + 1)
            })
            .unwrap_err();

        assert!(matches!(err, ReactiveError::InfiniteLoopDetected { cell: id, .. } if id == cell.id()));
        assert_eq!(cell.peek(), 0);

        // The reaction keeps its read and trips the guard again on the next change.
        assert_eq!(rt.reaction_count(), 1);
        assert_eq!(cell.subscriber_count(), 1);
        assert!(cell.write(5).unwrap_err().is_infinite_loop());
        assert_eq!(cell.peek(), 5);
    }

    #[test]
    fn writing_a_borrowed_cell_through_a_reaction_fails() {
        let rt = Runtime::new();
        let a = rt.cell(0);
        let b = rt.cell(0);

        rt.reaction({
            let (a, b) = (a.clone(), b.clone());
            move || a.write(b.read() + 1)
        })
        .unwrap();
        assert_eq!(a.peek(), 1);

        let err = a.with(|value| b.write(*value + 1)).unwrap_err();
        assert!(matches!(err, ReactiveError::CellBorrowed { cell } if cell == a.id()));
        assert_eq!(a.peek(), 1);
        assert_eq!(b.peek(), 2);

        // Once the borrow ends the same path works again.
        assert_eq!(rt.pending_count(), 0);
        b.write(5).unwrap();
        assert_eq!(a.peek(), 6);
    }

    #[test]
    fn writing_a_cell_inside_its_own_with_fails() {
        let rt = Runtime::new();
        let cell = rt.cell(1);

        let err = cell.with(|value| cell.write(*value + 1)).unwrap_err();
        assert!(matches!(err, ReactiveError::CellBorrowed { .. }));
        assert_eq!(cell.peek(), 1);
    }

    #[test]
    fn dropping_the_last_handle_releases_the_cell() {
        let rt = Runtime::new();
        let before = rt.cell_count();
        {
            let cell = rt.cell(1);
            let _copy = cell.clone();
            assert_eq!(rt.cell_count(), before + 1);
        }
        assert_eq!(rt.cell_count(), before);
    }

    #[test]
    fn debug_output_includes_value() {
        let rt = Runtime::new();
        let cell = rt.cell(7);
        let rendered = format!("{cell:?}");
        assert!(rendered.contains("value: 7"));
        assert!(rendered.contains("subscriber_count: 0"));
    }
}
