//! Derived Values
//!
//! A [`Derived`] value is a computation whose result is kept in a private
//! cell. A reaction recomputes it whenever an input changes, and the cell's
//! equality check stops propagation when the result comes out the same.
//!
//! # How Derivations Work
//!
//! 1. Creating a derivation creates its reaction, which computes the first
//!    value right away (or at the end of the enclosing batch).
//!
//! 2. Reading the derivation reads the private cell, so readers subscribe to
//!    the result, not to the inputs.
//!
//! 3. Reading a derivation whose first run is still deferred by a batch
//!    forces that run first.
//!
//! # Two-Phase Construction
//!
//! Derivations that refer to each other cannot all be created with their
//! computation. [`Derived::unresolved`] makes a placeholder that can be read
//! (yielding [`ReactiveError::Unresolved`]) and later given its computation
//! with [`Derived::resolve`].
//!
//! # Selectors
//!
//! [`Runtime::select`] narrows a source to a projection. Subscribers of the
//! selector only run when the projection changes, and the projection is not
//! recomputed at all while the source value stays the same.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use super::cell::{same_value, Cell};
use super::effect::Reaction;
use super::runtime::{Runtime, RuntimeInner};
use super::traits::Source;
use crate::error::{ReactiveError, Result};

/// A value computed from other reactive values.
///
/// # Example
///
/// ```rust
/// use trellis_core::Runtime;
///
/// let rt = Runtime::new();
/// let first = rt.cell(String::from("Ada"));
/// let last = rt.cell(String::from("Lovelace"));
///
/// let full = rt.derive({
///     let (first, last) = (first.clone(), last.clone());
///     move || Ok(format!("{} {}", first.read(), last.read()))
/// })?;
///
/// assert_eq!(full.read()?, "Ada Lovelace");
/// first.write("Augusta".into())?;
/// assert_eq!(full.read()?, "Augusta Lovelace");
/// # Ok::<(), trellis_core::ReactiveError>(())
/// ```
pub struct Derived<T: 'static> {
    cell: Cell<Option<T>>,
    reaction: Rc<RefCell<Option<Reaction>>>,
    runtime: Weak<RuntimeInner>,
}

impl<T: 'static> Derived<T> {
    /// Create a derivation with no computation yet, compared with
    /// same-value equality.
    pub fn unresolved(runtime: &Runtime) -> Self
    where
        T: PartialEq,
    {
        Self::unresolved_with(runtime, same_value::<T>)
    }

    /// Create a derivation with no computation yet and a custom equality.
    pub fn unresolved_with<E>(runtime: &Runtime, equality: E) -> Self
    where
        E: Fn(&T, &T) -> bool + 'static,
    {
        let cell = runtime.cell_with(None, move |a: &Option<T>, b: &Option<T>| match (a, b) {
            (Some(a), Some(b)) => equality(a, b),
            (None, None) => true,
            _ => false,
        });
        Self {
            cell,
            reaction: Rc::new(RefCell::new(None)),
            runtime: runtime.downgrade(),
        }
    }

    /// Install the computation of an unresolved derivation.
    ///
    /// Fails with [`ReactiveError::AlreadyResolved`] if a computation was
    /// installed before. A failing first computation still counts as
    /// installed: the error is returned and the computation runs again once
    /// an input it read changes.
    pub fn resolve<F>(&self, mut compute: F) -> Result<()>
    where
        F: FnMut() -> Result<T> + 'static,
    {
        if self.reaction.borrow().is_some() {
            return Err(ReactiveError::AlreadyResolved);
        }
        let runtime = self
            .runtime
            .upgrade()
            .map(Runtime::from_inner)
            .ok_or(ReactiveError::RuntimeDropped)?;

        let cell = self.cell.clone();
        let (reaction, first_run) = runtime.spawn_reaction(move || {
            let value = compute()?;
            cell.write(Some(value))
        });
        *self.reaction.borrow_mut() = Some(reaction);
        first_run
    }

    /// Whether a computation has been installed.
    pub fn is_resolved(&self) -> bool {
        self.reaction.borrow().is_some()
    }

    /// The reaction that keeps this value up to date, once resolved.
    pub fn reaction(&self) -> Option<Reaction> {
        self.reaction.borrow().clone()
    }

    /// Get the current value, subscribing the running reaction.
    ///
    /// Fails with [`ReactiveError::Unresolved`] while no value has been
    /// computed yet.
    pub fn read(&self) -> Result<T>
    where
        T: Clone,
    {
        self.read_opt()?.ok_or(ReactiveError::Unresolved)
    }

    /// Like [`read`](Self::read), but yields `None` for an unresolved value.
    pub fn read_opt(&self) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.ensure_computed()?;
        Ok(self.cell.read())
    }

    /// Get the current value without tracking.
    pub fn peek(&self) -> Result<T>
    where
        T: Clone,
    {
        self.ensure_computed()?;
        self.cell.peek().ok_or(ReactiveError::Unresolved)
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        let reaction = self.reaction.borrow().clone();
        if let Some(reaction) = reaction {
            reaction.dispose();
        }
    }

    fn ensure_computed(&self) -> Result<()> {
        if self.cell.peek_with(Option::is_some) {
            return Ok(());
        }
        let reaction = self.reaction.borrow().clone();
        match (reaction, self.runtime.upgrade()) {
            (Some(reaction), Some(runtime)) => runtime.force(reaction.id()),
            _ => Ok(()),
        }
    }
}

impl<T: 'static> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            reaction: Rc::clone(&self.reaction),
            runtime: Weak::clone(&self.runtime),
        }
    }
}

impl<T: Debug + 'static> Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("value", &self.cell.peek_with(|value| format!("{value:?}")))
            .field("reaction", &*self.reaction.borrow())
            .finish()
    }
}

impl<T: Clone + 'static> Source<T> for Derived<T> {
    fn get(&self) -> Result<T> {
        self.read()
    }

    fn get_untracked(&self) -> Result<T> {
        self.peek()
    }
}

impl Runtime {
    /// Create a derivation compared with same-value equality.
    ///
    /// If the first computation fails, the error is returned and nothing is
    /// left registered.
    ///
    /// A derivation created while a reaction runs belongs to that run. When
    /// the reaction runs again the derivation is disposed: it keeps its last
    /// value but stops following its inputs, even if a handle to it is still
    /// held elsewhere.
    pub fn derive<T, F>(&self, compute: F) -> Result<Derived<T>>
    where
        T: PartialEq + 'static,
        F: FnMut() -> Result<T> + 'static,
    {
        self.derive_with(compute, same_value::<T>)
    }

    /// Create a derivation with a custom equality.
    pub fn derive_with<T, F, E>(&self, compute: F, equality: E) -> Result<Derived<T>>
    where
        T: 'static,
        F: FnMut() -> Result<T> + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let derived = Derived::unresolved_with(self, equality);
        if let Err(err) = derived.resolve(compute) {
            derived.dispose();
            return Err(err);
        }
        Ok(derived)
    }

    /// Narrow `source` to the projection `pick`.
    pub fn select<T, R, S, P>(&self, source: S, pick: P) -> Result<Derived<R>>
    where
        T: PartialEq + 'static,
        R: PartialEq + Clone + 'static,
        S: Source<T> + 'static,
        P: FnMut(&T) -> R + 'static,
    {
        self.select_with(source, pick, same_value::<R>)
    }

    /// Narrow `source` to the projection `pick`, comparing projections with
    /// `equality`.
    ///
    /// The source is compared with same-value equality first; `pick` only
    /// runs when the source value actually differs from the last one seen.
    pub fn select_with<T, R, S, P, E>(&self, source: S, mut pick: P, equality: E) -> Result<Derived<R>>
    where
        T: PartialEq + 'static,
        R: Clone + 'static,
        S: Source<T> + 'static,
        P: FnMut(&T) -> R + 'static,
        E: Fn(&R, &R) -> bool + 'static,
    {
        let mut last: Option<(T, R)> = None;
        self.derive_with(
            move || {
                let value = source.get()?;
                if let Some((seen, picked)) = &last {
                    if same_value(seen, &value) {
                        return Ok(picked.clone());
                    }
                }
                let picked = pick(&value);
                last = Some((value, picked.clone()));
                Ok(picked)
            },
            equality,
        )
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Rc<std::cell::Cell<u32>> {
        Rc::new(std::cell::Cell::new(0))
    }

    #[test]
    fn derived_computes_on_creation() {
        let rt = Runtime::new();
        let cell = rt.cell(10);
        let doubled = rt
            .derive({
                let cell = cell.clone();
                move || Ok(cell.read() * 2)
            })
            .unwrap();

        assert_eq!(doubled.read().unwrap(), 20);
        assert!(doubled.is_resolved());
    }

    #[test]
    fn derived_recomputes_once_per_change_not_per_read() {
        let rt = Runtime::new();
        let cell = rt.cell(1);
        let computes = counter();

        let doubled = rt
            .derive({
                let (cell, computes) = (cell.clone(), computes.clone());
                move || {
                    computes.set(computes.get() + 1);
                    Ok(cell.read() * 2)
                }
            })
            .unwrap();

        for _ in 0..5 {
            assert_eq!(doubled.read().unwrap(), 2);
        }
        assert_eq!(computes.get(), 1);

        cell.write(4).unwrap();
        assert_eq!(doubled.read().unwrap(), 8);
        assert_eq!(doubled.peek().unwrap(), 8);
        assert_eq!(computes.get(), 2);
    }

    #[test]
    fn unchanged_result_does_not_notify_readers() {
        let rt = Runtime::new();
        let cell = rt.cell(3);
        let is_odd = rt
            .derive({
                let cell = cell.clone();
                move || Ok(cell.read() % 2 == 1)
            })
            .unwrap();
        let runs = counter();

        rt.reaction({
            let (is_odd, runs) = (is_odd.clone(), runs.clone());
            move || {
                is_odd.read()?;
                runs.set(runs.get() + 1);
                Ok(())
            }
        })
        .unwrap();

        cell.write(5).unwrap();
        cell.write(7).unwrap();
        assert_eq!(runs.get(), 1);

        cell.write(8).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn reading_inside_a_batch_forces_the_first_computation() {
        let rt = Runtime::new();
        let cell = rt.cell(2);

        let squared = rt
            .batch(|| {
                let squared = rt.derive({
                    let cell = cell.clone();
                    move || Ok(cell.read() * cell.read())
                })?;
                assert_eq!(squared.read()?, 4);
                Ok(squared)
            })
            .unwrap();

        let reaction = squared.reaction().unwrap();
        assert_eq!(reaction.run_count(), 1);
        cell.write(3).unwrap();
        assert_eq!(squared.read().unwrap(), 9);
    }

    #[test]
    fn failing_first_computation_is_returned() {
        let rt = Runtime::new();
        let result = rt.derive(|| -> Result<i32> { Err(ReactiveError::computation("boom")) });
        assert!(matches!(result, Err(ReactiveError::Computation(_))));
        assert_eq!(rt.reaction_count(), 0);
    }

    #[test]
    fn unresolved_placeholder_supports_forward_references() {
        let rt = Runtime::new();
        let base = rt.cell(1);
        let total: Derived<i32> = Derived::unresolved(&rt);

        assert!(matches!(total.read(), Err(ReactiveError::Unresolved)));

        let doubled = rt
            .derive({
                let total = total.clone();
                move || Ok(total.read_opt()?.unwrap_or(0) * 2)
            })
            .unwrap();
        assert_eq!(doubled.read().unwrap(), 0);

        total
            .resolve({
                let base = base.clone();
                move || Ok(base.read() + 1)
            })
            .unwrap();
        assert_eq!(doubled.read().unwrap(), 4);

        base.write(9).unwrap();
        assert_eq!(doubled.read().unwrap(), 20);
    }

    #[test]
    fn resolving_twice_fails() {
        let rt = Runtime::new();
        let value: Derived<i32> = Derived::unresolved(&rt);
        value.resolve(|| Ok(1)).unwrap();
        let err = value.resolve(|| Ok(2)).unwrap_err();
        assert!(matches!(err, ReactiveError::AlreadyResolved));
        assert_eq!(value.read().unwrap(), 1);
    }

    #[test]
    fn disposed_derivation_keeps_its_last_value() {
        let rt = Runtime::new();
        let cell = rt.cell(1);
        let plus_one = rt
            .derive({
                let cell = cell.clone();
                move || Ok(cell.read() + 1)
            })
            .unwrap();

        plus_one.dispose();
        cell.write(10).unwrap();
        assert_eq!(plus_one.read().unwrap(), 2);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Profile {
        name: String,
        visits: u32,
    }

    #[test]
    fn selector_only_notifies_when_the_projection_changes() {
        let rt = Runtime::new();
        let profile = rt.cell(Profile {
            name: "ada".into(),
            visits: 0,
        });
        let picks = counter();

        let name = rt
            .select(profile.clone(), {
                let picks = picks.clone();
                move |p: &Profile| {
                    picks.set(picks.get() + 1);
                    p.name.clone()
                }
            })
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        rt.reaction({
            let (name, seen) = (name.clone(), seen.clone());
            move || {
                seen.borrow_mut().push(name.read()?);
                Ok(())
            }
        })
        .unwrap();

        profile.update(|p| Profile { visits: p.visits + 1, ..p.clone() }).unwrap();
        profile.update(|p| Profile { visits: p.visits + 1, ..p.clone() }).unwrap();
        assert_eq!(*seen.borrow(), vec!["ada".to_string()]);
        assert_eq!(picks.get(), 3);

        profile.update(|p| Profile { name: "grace".into(), ..p.clone() }).unwrap();
        assert_eq!(*seen.borrow(), vec!["ada".to_string(), "grace".to_string()]);
    }

    #[test]
    fn selector_skips_the_projection_for_the_same_source_value() {
        let rt = Runtime::new();
        let source = rt.cell_with(1, |_: &i32, _: &i32| false);
        let picks = counter();

        let _narrowed = rt
            .select(source.clone(), {
                let picks = picks.clone();
                move |v: &i32| {
                    picks.set(picks.get() + 1);
                    v * 10
                }
            })
            .unwrap();

        // The cell's own equality lets this write through.
        source.write(1).unwrap();
        assert_eq!(picks.get(), 1);

        source.write(2).unwrap();
        assert_eq!(picks.get(), 2);
    }
}
