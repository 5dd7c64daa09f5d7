use crate::{
    entry::Entry,
    sync::atomic::{AtomicIsize, Ordering},
    Stack,
};
use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::CachePadded;
use std::fmt;

/// An unbounded lock-free stack.
///
/// This is a [Treiber stack]: values are stored in a singly-linked list of
/// heap-allocated nodes, and the pointer to the topmost node is the only
/// shared state that is ever modified. Pushing and popping each consist of a
/// compare-and-swap loop on that pointer, which is retried only when another
/// thread changed the top of the stack in the meantime. A `NodeStack` is
/// therefore *lock-free*: some thread always makes progress, although a
/// single thread may have to retry arbitrarily often under contention.
///
/// Popped nodes are reclaimed with [epoch-based garbage collection], so a
/// node's memory is never freed or reused while another thread that loaded
/// a pointer to it before it was popped may still dereference it. This also
/// rules out the [ABA problem] on the top pointer.
///
/// See the [crate-level documentation](crate) for the consistency guarantees
/// of [`len`](Self::len) and [`top`](Self::top).
///
/// # Examples
///
/// ```
/// use lockfree_stack::NodeStack;
///
/// let stack = NodeStack::new();
/// stack.push(1).unwrap();
/// stack.push(2).unwrap();
///
/// assert_eq!(stack.top(), Some(2));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// ```
///
/// [Treiber stack]: https://en.wikipedia.org/wiki/Treiber_stack
/// [epoch-based garbage collection]: crossbeam_epoch
/// [ABA problem]: https://en.wikipedia.org/wiki/ABA_problem
pub struct NodeStack<T> {
    top: CachePadded<Atomic<Node<T>>>,
    // Updated after the top pointer, so it may briefly go negative when a
    // pop's decrement lands before the matching push's increment.
    len: CachePadded<AtomicIsize>,
}

struct Node<T> {
    entry: Entry<T>,
    next: Atomic<Node<T>>,
}

impl<T> NodeStack<T> {
    /// Returns a new, empty stack.
    pub fn new() -> Self {
        Self {
            top: CachePadded::new(Atomic::null()),
            len: CachePadded::new(AtomicIsize::new(0)),
        }
    }

    /// Pushes `value` onto the top of the stack.
    ///
    /// This always succeeds; the `Result` return type matches that of
    /// [`ArrayStack::push`](crate::ArrayStack::push).
    pub fn push(&self, value: T) -> Result<(), T> {
        let mut node = Owned::new(Node {
            entry: Entry::occupied(value),
            next: Atomic::null(),
        });

        let guard = &epoch::pin();
        let mut top = self.top.load(Ordering::Relaxed, guard);
        loop {
            node.next.store(top, Ordering::Relaxed);
            match self.top.compare_exchange(
                top,
                node,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(_) => break,
                // lost the race!
                Err(e) => {
                    test_println!("-> push: top changed; retrying");
                    top = e.current;
                    node = e.new;
                }
            }
        }

        self.len.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Removes the value on top of the stack and returns it, or returns
    /// `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let top = self.top.load(Ordering::Acquire, guard);
            let node = unsafe {
                // Safety: the node cannot be reclaimed while we are pinned.
                top.as_ref()
            }?;
            let next = node.next.load(Ordering::Relaxed, guard);

            if self
                .top
                .compare_exchange(top, next, Ordering::Acquire, Ordering::Relaxed, guard)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Release);
                // The node is ours now. Move the value out so the node no
                // longer owns it, then hand the empty node to the collector.
                let value = node.entry.take();
                unsafe {
                    // Safety: the node has been unlinked, so no thread which
                    // pins after this point can reach it.
                    guard.defer_destroy(top);
                }
                return Some(value);
            }

            test_println!("-> pop: top changed; retrying");
        }
    }

    /// Returns a clone of the value on top of the stack, without removing it.
    ///
    /// The returned value is a snapshot: by the time the caller looks at it,
    /// another thread may already have popped it.
    pub fn top(&self) -> Option<T>
    where
        T: Clone + Sync,
    {
        let guard = &epoch::pin();
        loop {
            let top = self.top.load(Ordering::Acquire, guard);
            let node = unsafe {
                // Safety: the node cannot be reclaimed while we are pinned.
                top.as_ref()
            }?;

            match node.entry.get_cloned() {
                Some(value) => return Some(value),
                // Popped out from under us; look at the new top.
                None => test_println!("-> top: node was popped; retrying"),
            }
        }
    }

    /// Returns the number of values in the stack.
    ///
    /// This count is updated after each push or pop takes effect, so while
    /// other threads are pushing or popping it may be briefly out of date.
    pub fn len(&self) -> usize {
        let len = self.len.load(Ordering::Acquire);
        if len < 0 {
            0
        } else {
            len as usize
        }
    }

    /// Returns `true` if the stack holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Always returns `false`: a `NodeStack` is never full.
    pub fn is_full(&self) -> bool {
        false
    }

    /// Returns `usize::MAX`.
    pub fn capacity(&self) -> usize {
        usize::MAX
    }
}

impl<T> Stack<T> for NodeStack<T> {
    #[inline]
    fn push(&self, value: T) -> Result<(), T> {
        NodeStack::push(self, value)
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        NodeStack::pop(self)
    }

    #[inline]
    fn top(&self) -> Option<T>
    where
        T: Clone + Sync,
    {
        NodeStack::top(self)
    }

    #[inline]
    fn len(&self) -> usize {
        NodeStack::len(self)
    }

    #[inline]
    fn capacity(&self) -> usize {
        NodeStack::capacity(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        NodeStack::is_empty(self)
    }

    #[inline]
    fn is_full(&self) -> bool {
        NodeStack::is_full(self)
    }
}

impl<T> Default for NodeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for NodeStack<T> {
    fn drop(&mut self) {
        unsafe {
            // Safety: we have exclusive access to the stack, so no other
            // thread can be looking at any of its nodes.
            let guard = epoch::unprotected();
            let mut curr = self.top.load(Ordering::Relaxed, guard);
            while let Some(node) = curr.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                // dropping the node drops the value still in its entry
                drop(curr.into_owned());
                curr = next;
            }
        }
    }
}

impl<T> fmt::Debug for NodeStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = &epoch::pin();
        f.debug_struct("NodeStack")
            .field("len", &self.len())
            .field(
                "top",
                &format_args!("{:p}", self.top.load(Ordering::Relaxed, guard).as_raw()),
            )
            .finish()
    }
}

unsafe impl<T: Send> Send for NodeStack<T> {}
unsafe impl<T: Send> Sync for NodeStack<T> {}
