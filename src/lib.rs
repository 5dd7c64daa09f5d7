//! Lock-free concurrent stacks.
//!
//! This crate provides two independent lock-free LIFO containers which share
//! a common set of operations, described by the [`Stack`] trait:
//!
//! - [`NodeStack`] is an unbounded [Treiber stack]: a singly-linked chain of
//!   heap-allocated nodes whose top pointer is updated with compare-and-swap.
//!   It never becomes full. Popped nodes are reclaimed with epoch-based
//!   garbage collection, so a node is never freed (or its address reused)
//!   while another thread may still be looking at it.
//! - [`ArrayStack`] is a bounded stack backed by a fixed array of slots, which
//!   is allocated once, when the stack is constructed. An atomic height
//!   counter is the single point of synchronization.
//!
//! Both stacks may store any `T`, including values that themselves represent
//! "nothing", such as `Option::<U>::None`. Whether a slot or node holds a
//! value is tracked by an explicit presence flag rather than by the value
//! itself, so pushing `None` and popping it again returns `Some(None)`, which
//! is never confused with the stack being empty.
//!
//! # Examples
//!
//! ```
//! use lockfree_stack::NodeStack;
//! use std::{sync::Arc, thread};
//!
//! let stack = Arc::new(NodeStack::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         let stack = stack.clone();
//!         thread::spawn(move || {
//!             stack.push(i).unwrap();
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(stack.len(), 4);
//! let mut popped = Vec::new();
//! while let Some(i) = stack.pop() {
//!     popped.push(i);
//! }
//! popped.sort();
//! assert_eq!(popped, vec![0, 1, 2, 3]);
//! ```
//!
//! The bounded stack rejects pushes once it is full, handing the value back:
//!
//! ```
//! use lockfree_stack::ArrayStack;
//!
//! let stack = ArrayStack::with_capacity(2);
//! assert_eq!(stack.push("a"), Ok(()));
//! assert_eq!(stack.push("b"), Ok(()));
//! assert_eq!(stack.push("c"), Err("c"));
//! assert!(stack.is_full());
//!
//! assert_eq!(stack.pop(), Some("b"));
//! assert_eq!(stack.pop(), Some("a"));
//! assert_eq!(stack.pop(), None);
//! ```
//!
//! # Consistency
//!
//! Every push and pop takes effect at a single compare-and-swap, on the top
//! pointer ([`NodeStack`]) or on the height counter ([`ArrayStack`]). Other
//! observations are weaker:
//!
//! - [`NodeStack::len`] is a counter which is updated *after* the top pointer
//!   changes. While operations are in flight it may briefly lag behind (or run
//!   ahead of) the true number of nodes.
//! - [`ArrayStack`] checks whether a slot is occupied before moving the height
//!   counter, and the slot contents are written in a second step. Under
//!   contention, a push may therefore fail even though the stack has room, and
//!   a pop may return `None` even though the stack is not empty. These results
//!   are best-effort; callers which need a value to be stored should retry.
//! - `top` returns a copy of whatever value was on top when it looked, which
//!   may already have been popped by the time the caller inspects it.
//!
//! [Treiber stack]: https://en.wikipedia.org/wiki/Treiber_stack
#[macro_use]
mod macros;

mod array;
pub(crate) mod cfg;
mod entry;
mod node;
pub(crate) mod sync;

pub use self::{
    array::ArrayStack,
    cfg::{Config, DefaultConfig},
    node::NodeStack,
};

/// The operations shared by every stack in this crate.
///
/// This trait exists so that code (such as tests and benchmarks) can be
/// written once and run against any stack implementation, including simple
/// lock-based ones. Each implementor also provides these methods as inherent
/// methods, so the trait does not need to be imported to use a stack.
pub trait Stack<T> {
    /// Pushes `value` onto the top of the stack.
    ///
    /// If the value could not be pushed, it is returned in the `Err` variant.
    fn push(&self, value: T) -> Result<(), T>;

    /// Removes the value on top of the stack and returns it, or returns
    /// `None` if the stack was empty.
    fn pop(&self) -> Option<T>;

    /// Returns a clone of the value on top of the stack, without removing it.
    fn top(&self) -> Option<T>
    where
        T: Clone + Sync;

    /// Returns the number of values currently in the stack.
    fn len(&self) -> usize;

    /// Returns the maximum number of values the stack can hold.
    fn capacity(&self) -> usize;

    /// Returns `true` if the stack holds no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if no more values can be pushed until some are popped.
    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}

pub(crate) trait Pack: Sized {
    const LEN: usize;

    const BITS: usize;
    const SHIFT: usize = Self::Prev::SHIFT + Self::Prev::LEN;
    const MASK: usize = Self::BITS << Self::SHIFT;

    type Prev: Pack;

    fn as_usize(&self) -> usize;
    fn from_usize(val: usize) -> Self;

    #[inline(always)]
    fn pack(&self, to: usize) -> usize {
        let value = self.as_usize();
        debug_assert!(value <= Self::BITS);

        (to & !Self::MASK) | (value << Self::SHIFT)
    }

    #[inline(always)]
    fn from_packed(from: usize) -> Self {
        let value = (from & Self::MASK) >> Self::SHIFT;
        debug_assert!(value <= Self::BITS);
        Self::from_usize(value)
    }
}

impl Pack for () {
    const BITS: usize = 0;
    const LEN: usize = 0;
    const SHIFT: usize = 0;
    const MASK: usize = 0;

    type Prev = ();

    fn as_usize(&self) -> usize {
        unreachable!()
    }
    fn from_usize(_val: usize) -> Self {
        unreachable!()
    }

    fn pack(&self, _to: usize) -> usize {
        unreachable!()
    }

    fn from_packed(_from: usize) -> Self {
        unreachable!()
    }
}
