//! A cell holding at most one value, with an explicit presence flag.
//!
//! Both stacks need to tell "this slot holds a value" apart from "this slot
//! is empty" without reserving any value of `T` as a marker. An `Entry`
//! tracks this in an atomic lifecycle word, next to the value:
//!
//! ```text
//!  ┌──────────────────────────────────────────────┬───────┐
//!  │ refs (number of in-flight `get_cloned` calls) │ state │
//!  └──────────────────────────────────────────────┴───────┘
//!                                                   2 bits
//! ```
//!
//! The state moves through `Vacant -> Writing -> Present -> Removing ->
//! Vacant`. Only the thread that owns the entry (the one which won the CAS on
//! the enclosing stack's top pointer or height counter) drives these
//! transitions; readers may only add and remove references while the value is
//! `Present`.
use crate::sync::{
    atomic::{AtomicUsize, Ordering},
    Backoff, UnsafeCell,
};
use crate::Pack;
use std::{fmt, mem::MaybeUninit, ptr};

pub(crate) struct Entry<T> {
    lifecycle: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[repr(usize)]
enum State {
    /// Nothing is stored, and nobody is storing anything.
    Vacant = 0b00,
    /// The owner is writing a value.
    Writing = 0b01,
    /// A value is stored and may be read.
    Present = 0b10,
    /// The owner is waiting for readers to finish so it can move the value
    /// out. No new readers may arrive.
    Removing = 0b11,
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct RefCount(usize);

/// Releases a reader's reference when dropped, even if `clone` panics.
struct ReadGuard<'a> {
    lifecycle: &'a AtomicUsize,
}

impl<T> Entry<T> {
    const VACANT: usize = 0;

    pub(crate) fn new() -> Self {
        Self {
            lifecycle: AtomicUsize::new(Self::VACANT),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns an entry which already holds `value`.
    ///
    /// This is only used for entries which are not yet visible to other
    /// threads.
    pub(crate) fn occupied(value: T) -> Self {
        Self {
            lifecycle: AtomicUsize::new(State::Present.pack(0)),
            value: UnsafeCell::new(MaybeUninit::new(value)),
        }
    }

    #[inline]
    fn state(&self) -> State {
        State::from_packed(self.lifecycle.load(Ordering::Acquire))
    }

    /// Returns `true` if nothing is stored here and no write is in progress.
    #[inline]
    pub(crate) fn is_vacant(&self) -> bool {
        self.state() == State::Vacant
    }

    /// Returns `true` if a fully written value is stored here and is not
    /// being removed.
    #[inline]
    pub(crate) fn is_present(&self) -> bool {
        self.state() == State::Present
    }

    /// Stores `value` in the entry.
    ///
    /// The caller must have exclusive ownership of the entry's next write. If
    /// the previous owner has not finished moving its value out yet, this
    /// waits for it to do so.
    pub(crate) fn put(&self, value: T) {
        let backoff = Backoff::new();
        let writing = State::Writing.pack(0);
        loop {
            match self.lifecycle.compare_exchange(
                Self::VACANT,
                writing,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    test_println!(
                        "-> put: entry still occupied ({:?}); waiting...",
                        State::from_packed(actual)
                    );
                    backoff.snooze();
                }
            }
        }

        self.value.with_mut(|slot| unsafe {
            // Safety: the `Writing` state excludes every other access to the
            // value.
            *slot = MaybeUninit::new(value);
        });
        self.lifecycle
            .store(State::Present.pack(0), Ordering::Release);
        test_println!("-> put: present");
    }

    /// Moves the stored value out of the entry, leaving it vacant.
    ///
    /// The caller must have exclusive ownership of the entry's next removal.
    /// If the value has not been written yet, this waits for the writer; if
    /// readers are cloning the value, this waits for them to finish.
    pub(crate) fn take(&self) -> T {
        let backoff = Backoff::new();
        let mut lifecycle = self.lifecycle.load(Ordering::Acquire);
        loop {
            let state = State::from_packed(lifecycle);
            if state != State::Present {
                test_println!("-> take: entry not present ({:?}); waiting...", state);
                backoff.snooze();
                lifecycle = self.lifecycle.load(Ordering::Acquire);
                continue;
            }

            let removing = State::Removing.pack(lifecycle);
            match self.lifecycle.compare_exchange(
                lifecycle,
                removing,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    lifecycle = removing;
                    break;
                }
                Err(actual) => {
                    test_println!("-> take: retrying; lifecycle={:#x};", actual);
                    lifecycle = actual;
                }
            }
        }

        // Wait for in-flight readers to finish cloning the value.
        while RefCount::from_packed(lifecycle).0 > 0 {
            test_println!(
                "-> take: refs={:?}; spin...",
                RefCount::from_packed(lifecycle)
            );
            backoff.spin();
            lifecycle = self.lifecycle.load(Ordering::Acquire);
        }

        let value = self.value.with_mut(|slot| unsafe {
            // Safety: the entry was `Present`, so the value is initialized,
            // and the `Removing` state with no references excludes every
            // other access to it. The entry is marked vacant below, so the
            // value will not be read or dropped again.
            ptr::read(slot).assume_init()
        });
        self.lifecycle.store(Self::VACANT, Ordering::Release);
        test_println!("-> take: vacant");
        value
    }

    /// Returns a clone of the stored value, or `None` if no value is present.
    pub(crate) fn get_cloned(&self) -> Option<T>
    where
        T: Clone + Sync,
    {
        let mut lifecycle = self.lifecycle.load(Ordering::Acquire);
        loop {
            if State::from_packed(lifecycle) != State::Present {
                return None;
            }

            let refs = RefCount::from_packed(lifecycle);
            match self.lifecycle.compare_exchange(
                lifecycle,
                refs.incr().pack(lifecycle),
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    test_println!("-> get_cloned: retrying; lifecycle={:#x};", actual);
                    lifecycle = actual;
                }
            }
        }

        let _guard = ReadGuard {
            lifecycle: &self.lifecycle,
        };
        let value = self.value.with(|slot| unsafe {
            // Safety: holding a reference keeps the owner from moving the
            // value out until the guard is dropped.
            (*(*slot).as_ptr()).clone()
        });
        Some(value)
    }
}

impl<T> Drop for Entry<T> {
    fn drop(&mut self) {
        if self.state() == State::Present {
            self.value.with_mut(|slot| unsafe {
                // Safety: we have exclusive access, and the value is
                // initialized.
                ptr::drop_in_place((*slot).as_mut_ptr())
            });
        }
    }
}

impl<T> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle.load(Ordering::Relaxed);
        f.debug_struct("Entry")
            .field("lifecycle", &format_args!("{:#x}", lifecycle))
            .field("state", &State::from_packed(lifecycle))
            .field("refs", &RefCount::from_packed(lifecycle))
            .finish()
    }
}

// Readers only ever get `&T` (to clone it), and `get_cloned` requires
// `T: Sync` for that, so sharing an entry only needs `T: Send`.
unsafe impl<T: Send> Send for Entry<T> {}
unsafe impl<T: Send> Sync for Entry<T> {}

// === impl ReadGuard ===

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let prev = self
            .lifecycle
            .fetch_sub(RefCount::ONE.pack(0), Ordering::Release);
        debug_assert!(
            RefCount::from_packed(prev).0 > 0,
            "released a reference to an entry with no references"
        );
        test_println!(
            "-> get_cloned: released; refs={:?}",
            RefCount::from_packed(prev)
        );
    }
}

// === impl State ===

impl Pack for State {
    const LEN: usize = 2;
    const BITS: usize = 0b11;

    type Prev = ();

    fn from_usize(u: usize) -> Self {
        match u {
            0b00 => State::Vacant,
            0b01 => State::Writing,
            0b10 => State::Present,
            0b11 => State::Removing,
            bad => unreachable!("weird entry state {:#b}", bad),
        }
    }

    fn as_usize(&self) -> usize {
        *self as usize
    }
}

// === impl RefCount ===

impl Pack for RefCount {
    const LEN: usize = usize::BITS as usize - State::LEN;
    const BITS: usize = usize::MAX >> State::LEN;

    type Prev = State;

    fn from_usize(value: usize) -> Self {
        debug_assert!(value <= Self::BITS);
        Self(value)
    }

    fn as_usize(&self) -> usize {
        self.0
    }
}

impl RefCount {
    const ONE: Self = Self(1);

    fn incr(self) -> Self {
        debug_assert!(self.0 < Self::BITS, "entry reference count overflowed");
        Self(self.0 + 1)
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.0).finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::{atomic::AtomicUsize as StdAtomicUsize, Arc};

    #[derive(Clone)]
    struct DropCount(Arc<StdAtomicUsize>);

    impl Drop for DropCount {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn new_entry_is_vacant() {
        let entry = Entry::<u32>::new();
        assert!(entry.is_vacant());
        assert!(!entry.is_present());
        assert_eq!(entry.get_cloned(), None);
    }

    #[test]
    fn put_then_take() {
        let entry = Entry::new();
        entry.put(String::from("hello"));
        assert!(entry.is_present());
        assert_eq!(entry.get_cloned().as_deref(), Some("hello"));
        // reading does not remove the value
        assert!(entry.is_present());

        assert_eq!(entry.take(), "hello");
        assert!(entry.is_vacant());
        assert_eq!(entry.get_cloned(), None);

        entry.put(String::from("world"));
        assert_eq!(entry.take(), "world");
    }

    #[test]
    fn stores_absence_values() {
        let entry = Entry::new();
        entry.put(None::<u32>);
        assert!(entry.is_present());
        assert_eq!(entry.get_cloned(), Some(None));
        assert_eq!(entry.take(), None);
        assert!(entry.is_vacant());
    }

    #[test]
    fn references_are_released() {
        let entry = Entry::occupied(7usize);
        for _ in 0..16 {
            assert_eq!(entry.get_cloned(), Some(7));
        }
        let lifecycle = entry.lifecycle.load(Ordering::SeqCst);
        assert_eq!(RefCount::from_packed(lifecycle), RefCount(0));
        assert_eq!(State::from_packed(lifecycle), State::Present);
    }

    #[test]
    fn drops_present_value() {
        let drops = Arc::new(StdAtomicUsize::new(0));
        let entry = Entry::occupied(DropCount(drops.clone()));
        drop(entry);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn does_not_drop_taken_value() {
        let drops = Arc::new(StdAtomicUsize::new(0));
        let entry = Entry::occupied(DropCount(drops.clone()));
        let value = entry.take();
        drop(entry);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(value);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn state_roundtrips() {
        for state in [State::Vacant, State::Writing, State::Present, State::Removing] {
            let packed = RefCount(5).pack(state.pack(0));
            assert_eq!(State::from_packed(packed), state);
            assert_eq!(RefCount::from_packed(packed), RefCount(5));
        }
    }
}
