pub(crate) use self::inner::*;

#[cfg(loom)]
mod inner {
    pub(crate) use loom::cell::UnsafeCell;
    pub(crate) mod atomic {
        pub use loom::sync::atomic::*;
        pub use std::sync::atomic::Ordering;
    }

    /// Loom must be told whenever a thread is waiting on another one, or the
    /// model never explores the schedule where the other thread runs.
    #[derive(Debug, Default)]
    pub(crate) struct Backoff {
        _p: (),
    }

    impl Backoff {
        pub(crate) fn new() -> Self {
            Self { _p: () }
        }

        #[inline(always)]
        pub(crate) fn spin(&self) {
            loom::thread::yield_now();
        }

        #[inline(always)]
        pub(crate) fn snooze(&self) {
            loom::thread::yield_now();
        }
    }
}

#[cfg(not(loom))]
mod inner {
    #![allow(dead_code)]
    pub(crate) use crossbeam_utils::Backoff;
    pub(crate) use std::sync::atomic;

    #[derive(Debug)]
    pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

    impl<T> UnsafeCell<T> {
        pub fn new(data: T) -> UnsafeCell<T> {
            UnsafeCell(std::cell::UnsafeCell::new(data))
        }

        #[inline(always)]
        pub fn with<F, R>(&self, f: F) -> R
        where
            F: FnOnce(*const T) -> R,
        {
            f(self.0.get())
        }

        #[inline(always)]
        pub fn with_mut<F, R>(&self, f: F) -> R
        where
            F: FnOnce(*mut T) -> R,
        {
            f(self.0.get())
        }
    }
}
