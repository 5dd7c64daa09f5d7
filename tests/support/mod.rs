#![allow(dead_code)]
use lockfree_stack::{ArrayStack, NodeStack, Stack};
use std::sync::{Arc, Mutex};

/// A stack guarded by a single lock, used as a reference implementation.
#[derive(Debug)]
pub struct LockedStack<T> {
    inner: Mutex<Vec<T>>,
    capacity: usize,
}

pub type SharedStack<T> = Arc<dyn Stack<T> + Send + Sync>;

impl<T> LockedStack<T> {
    pub fn new() -> Self {
        Self::bounded(usize::MAX)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            capacity,
        }
    }
}

impl<T> Default for LockedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Stack<T> for LockedStack<T> {
    fn push(&self, value: T) -> Result<(), T> {
        let mut inner = self.inner.lock().unwrap();
        if inner.len() >= self.capacity {
            return Err(value);
        }
        inner.push(value);
        Ok(())
    }

    fn pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop()
    }

    fn top(&self) -> Option<T>
    where
        T: Clone + Sync,
    {
        self.inner.lock().unwrap().last().cloned()
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Returns one of each kind of stack, labeled for assertion messages.
///
/// The bounded stack is created with `capacity`.
pub fn stacks<T>(capacity: usize) -> Vec<(&'static str, SharedStack<T>)>
where
    T: Send + 'static,
{
    vec![
        ("NodeStack", Arc::new(NodeStack::new()) as SharedStack<T>),
        (
            "ArrayStack",
            Arc::new(ArrayStack::with_capacity(capacity)) as SharedStack<T>,
        ),
        ("LockedStack", Arc::new(LockedStack::new()) as SharedStack<T>),
    ]
}
