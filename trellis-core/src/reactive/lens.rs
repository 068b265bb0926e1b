//! Lenses
//!
//! A [`Lens`] is a cell focused on one part of a larger value. Reading it
//! yields the focused part; writing it rebuilds the source value through a
//! caller-supplied setter and writes that back.
//!
//! Two directions keep the lens and its source in step:
//!
//! - **source → lens**: a sync reaction reads the source and writes
//!   `getter(&source)` into the lens's private focus cell.
//! - **lens → source**: [`Lens::write`] updates the focus cell, then writes
//!   `setter(&source, value)` to the source.
//!
//! A shared `syncing` flag is raised while a lens-initiated write propagates,
//! so the sync reaction does not bounce the value back into the focus cell.
//!
//! The source can be any [`Sink`], including another lens, so lenses compose.

use std::cell::Cell as FlagCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::cell::Cell;
use super::effect::Reaction;
use super::runtime::Runtime;
use super::traits::{Sink, Source};
use crate::error::Result;
use crate::graph::CellId;

type WriteBack<K> = Rc<dyn Fn(K) -> Result<()>>;

/// A two-way view onto part of another reactive value.
///
/// # Example
///
/// ```rust
/// use trellis_core::Runtime;
///
/// #[derive(Clone, PartialEq)]
/// struct Settings {
///     volume: u8,
///     muted: bool,
/// }
///
/// let rt = Runtime::new();
/// let settings = rt.cell(Settings { volume: 3, muted: false });
///
/// let volume = rt.lens(
///     settings.clone(),
///     |s: &Settings| s.volume,
///     |s: &Settings, volume| Settings { volume, ..s.clone() },
/// )?;
///
/// volume.write(7)?;
/// assert_eq!(settings.peek().volume, 7);
///
/// settings.update(|s| Settings { volume: 1, ..s.clone() })?;
/// assert_eq!(volume.read(), 1);
/// # Ok::<(), trellis_core::ReactiveError>(())
/// ```
pub struct Lens<K: 'static> {
    focus: Cell<K>,
    write_back: WriteBack<K>,
    syncing: Rc<FlagCell<bool>>,
    sync: Reaction,
}

impl<K: Clone + 'static> Lens<K> {
    /// Get the focus cell's handle in the dependency graph.
    pub fn id(&self) -> CellId {
        self.focus.id()
    }

    /// Get the focused value, subscribing the running reaction.
    pub fn read(&self) -> K {
        self.focus.read()
    }

    /// Borrow the focused value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&K) -> R) -> R {
        self.focus.with(f)
    }

    /// Get the focused value without tracking.
    pub fn peek(&self) -> K {
        self.focus.peek()
    }

    /// Write a new focused value and propagate it to the source.
    ///
    /// Does nothing when the value equals the current focus.
    pub fn write(&self, value: K) -> Result<()> {
        if self.focus.is_same(&value) {
            return Ok(());
        }
        let _syncing = SyncingGuard::raise(&self.syncing);
        self.focus.write(value.clone())?;
        (self.write_back)(value)
    }

    /// Update the focused value using a function of the current one.
    pub fn update(&self, f: impl FnOnce(&K) -> K) -> Result<()> {
        let next = self.focus.with(f);
        self.write(next)
    }

    /// Stop following the source. Writes still reach the source.
    pub fn dispose(&self) {
        self.sync.dispose();
    }

    /// The reaction that copies source changes into the lens.
    pub fn reaction(&self) -> &Reaction {
        &self.sync
    }
}

impl<K: 'static> Clone for Lens<K> {
    fn clone(&self) -> Self {
        Self {
            focus: self.focus.clone(),
            write_back: Rc::clone(&self.write_back),
            syncing: Rc::clone(&self.syncing),
            sync: self.sync.clone(),
        }
    }
}

impl<K: Debug + 'static> Debug for Lens<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens")
            .field("focus", &self.focus)
            .field("syncing", &self.syncing.get())
            .field("sync", &self.sync)
            .finish()
    }
}

impl<K: Clone + 'static> Source<K> for Lens<K> {
    fn get(&self) -> Result<K> {
        Ok(self.read())
    }

    fn get_untracked(&self) -> Result<K> {
        Ok(self.peek())
    }
}

impl<K: Clone + 'static> Sink<K> for Lens<K> {
    fn set(&self, value: K) -> Result<()> {
        self.write(value)
    }
}

/// Raises the syncing flag and restores the previous state on drop.
struct SyncingGuard<'a> {
    flag: &'a FlagCell<bool>,
    previous: bool,
}

impl<'a> SyncingGuard<'a> {
    fn raise(flag: &'a FlagCell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

impl Runtime {
    /// Focus `source` through `getter`, writing back through `setter`.
    ///
    /// `setter(&current, value)` must return the source value with the
    /// focused part replaced, leaving `current` untouched.
    ///
    /// A lens created while a reaction runs belongs to that run. When the
    /// reaction runs again the lens stops following its source, even if a
    /// handle to it is still held elsewhere. Writes through it still reach
    /// the source.
    pub fn lens<T, K, S, G, W>(&self, source: S, getter: G, setter: W) -> Result<Lens<K>>
    where
        T: 'static,
        K: PartialEq + Clone + 'static,
        S: Sink<T> + 'static,
        G: Fn(&T) -> K + 'static,
        W: Fn(&T, K) -> T + 'static,
    {
        let source = Rc::new(source);
        let getter = Rc::new(getter);
        let focus = self.cell(getter(&source.get_untracked()?));
        let syncing = Rc::new(FlagCell::new(false));

        let (sync, first_run) = self.spawn_reaction({
            let (source, getter, focus, syncing) = (
                Rc::clone(&source),
                Rc::clone(&getter),
                focus.clone(),
                Rc::clone(&syncing),
            );
            move || {
                let value = source.get()?;
                if syncing.get() {
                    return Ok(());
                }
                focus.write(getter(&value))
            }
        });
        if let Err(err) = first_run {
            sync.dispose();
            return Err(err);
        }

        let write_back: WriteBack<K> =
            Rc::new(move |value: K| source.set(setter(&source.get_untracked()?, value)));

        Ok(Lens {
            focus,
            write_back,
            syncing,
            sync,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
