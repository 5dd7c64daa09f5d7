use crate::{
    cfg::{self, CfgPrivate, DefaultConfig},
    entry::Entry,
    sync::atomic::{AtomicUsize, Ordering},
    Stack,
};
use crossbeam_utils::CachePadded;
use std::{fmt, marker::PhantomData};

/// A bounded lock-free stack backed by a fixed-size array.
///
/// All of the stack's slots are allocated up front, when it is constructed.
/// An atomic *height* counter holds both the number of values in the stack
/// and the index of the next free slot. Pushing or popping claims an index by
/// moving the height with a compare-and-swap, and then fills or empties the
/// slot at that index.
///
/// Because claiming an index and filling or emptying its slot are two
/// separate steps, a push checks that the slot it is about to claim is not
/// still being emptied by an earlier pop (and a pop, that the slot it is
/// about to claim has been filled). If the check fails, the operation gives
/// up instead of waiting: under contention, [`push`] may return `Err` even
/// though the stack is not full, and [`pop`] may return `None` even though it
/// is not empty. Values are never lost or duplicated.
///
/// The default capacity is determined by the [`Config`] type parameter.
///
/// # Examples
///
/// ```
/// use lockfree_stack::ArrayStack;
///
/// let stack = ArrayStack::with_capacity(3);
/// for i in 0..3 {
///     stack.push(i).unwrap();
/// }
/// assert!(stack.is_full());
/// assert_eq!(stack.push(3), Err(3));
///
/// assert_eq!(stack.top(), Some(2));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.len(), 2);
/// ```
///
/// [`push`]: Self::push
/// [`pop`]: Self::pop
/// [`Config`]: crate::Config
pub struct ArrayStack<T, C: cfg::Config = DefaultConfig> {
    height: CachePadded<AtomicUsize>,
    slots: Box<[Entry<T>]>,
    _cfg: PhantomData<fn(C)>,
}

impl<T> ArrayStack<T> {
    /// Returns a new, empty stack with the default capacity (256).
    pub fn new() -> Self {
        Self::new_with_config()
    }

    /// Returns a new, empty stack which can hold `capacity` values.
    ///
    /// If `capacity` is zero, the default capacity (256) is used instead.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_config(capacity)
    }
}

impl<T, C: cfg::Config> ArrayStack<T, C> {
    /// Returns a new, empty stack with the capacity given by
    /// [`C::DEFAULT_CAPACITY`](crate::Config::DEFAULT_CAPACITY).
    pub fn new_with_config() -> Self {
        Self::with_capacity_and_config(C::DEFAULT_CAPACITY)
    }

    /// Returns a new, empty stack which can hold `capacity` values.
    ///
    /// If `capacity` is zero, [`C::DEFAULT_CAPACITY`] is used instead.
    ///
    /// # Panics
    ///
    /// If `capacity` is greater than [`C::MAX_CAPACITY`], or if the
    /// configuration's default capacity is zero.
    ///
    /// [`C::DEFAULT_CAPACITY`]: crate::Config::DEFAULT_CAPACITY
    /// [`C::MAX_CAPACITY`]: crate::Config::MAX_CAPACITY
    pub fn with_capacity_and_config(capacity: usize) -> Self {
        C::validate();
        let capacity = C::normalize(capacity);
        assert!(
            capacity <= C::MAX_CAPACITY,
            "capacity ({}) exceeds the maximum ({})",
            capacity,
            C::MAX_CAPACITY,
        );

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Entry::new);
        test_println!("-> allocated {} slots", capacity);
        Self {
            height: CachePadded::new(AtomicUsize::new(0)),
            slots: slots.into_boxed_slice(),
            _cfg: PhantomData,
        }
    }

    /// Pushes `value` onto the top of the stack.
    ///
    /// If the stack is full, or if the next slot is still being emptied by a
    /// concurrent [`pop`](Self::pop), the value is handed back in the `Err`
    /// variant. The stack does not retry on its own.
    pub fn push(&self, value: T) -> Result<(), T> {
        let capacity = self.slots.len();
        let mut height = self.height.load(Ordering::Acquire);
        loop {
            if height >= capacity {
                test_println!("-> push: full (height={})", height);
                return Err(value);
            }

            let slot = &self.slots[height];
            if !slot.is_vacant() {
                test_println!("-> push: slot {} still occupied; giving up", height);
                return Err(value);
            }

            match self.height.compare_exchange(
                height,
                height + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    slot.put(value);
                    test_println!("-> push: stored at {}", height);
                    return Ok(());
                }
                Err(actual) => {
                    test_println!("-> push: height changed {} -> {}; retrying", height, actual);
                    height = actual;
                }
            }
        }
    }

    /// Removes the value on top of the stack and returns it.
    ///
    /// Returns `None` if the stack is empty, or if the top slot has been
    /// claimed by a concurrent [`push`](Self::push) that has not written its
    /// value yet.
    pub fn pop(&self) -> Option<T> {
        let mut height = self.height.load(Ordering::Acquire);
        loop {
            if height == 0 {
                test_println!("-> pop: empty");
                return None;
            }

            let slot = &self.slots[height - 1];
            if !slot.is_present() {
                test_println!("-> pop: slot {} not yet filled; giving up", height - 1);
                return None;
            }

            match self.height.compare_exchange(
                height,
                height - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    test_println!("-> pop: taking from {}", height - 1);
                    return Some(slot.take());
                }
                Err(actual) => {
                    test_println!("-> pop: height changed {} -> {}; retrying", height, actual);
                    height = actual;
                }
            }
        }
    }

    /// Returns a clone of the value on top of the stack, without removing it.
    ///
    /// Like [`pop`](Self::pop), this may return `None` while the top slot is
    /// being filled.
    pub fn top(&self) -> Option<T>
    where
        T: Clone + Sync,
    {
        let height = self.height.load(Ordering::Acquire);
        if height == 0 {
            return None;
        }
        self.slots[height - 1].get_cloned()
    }

    /// Returns the number of values in the stack.
    pub fn len(&self) -> usize {
        self.height.load(Ordering::Acquire)
    }

    /// Returns `true` if the stack holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the stack holds [`capacity`](Self::capacity) values.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Returns the number of values the stack can hold.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T, C: cfg::Config> Stack<T> for ArrayStack<T, C> {
    #[inline]
    fn push(&self, value: T) -> Result<(), T> {
        ArrayStack::push(self, value)
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        ArrayStack::pop(self)
    }

    #[inline]
    fn top(&self) -> Option<T>
    where
        T: Clone + Sync,
    {
        ArrayStack::top(self)
    }

    #[inline]
    fn len(&self) -> usize {
        ArrayStack::len(self)
    }

    #[inline]
    fn capacity(&self) -> usize {
        ArrayStack::capacity(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        ArrayStack::is_empty(self)
    }

    #[inline]
    fn is_full(&self) -> bool {
        ArrayStack::is_full(self)
    }
}

impl<T> Default for ArrayStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: cfg::Config> fmt::Debug for ArrayStack<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayStack")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("config", &C::debug())
            .finish()
    }
}

unsafe impl<T: Send, C: cfg::Config> Send for ArrayStack<T, C> {}
unsafe impl<T: Send, C: cfg::Config> Sync for ArrayStack<T, C> {}
