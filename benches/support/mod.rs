use std::{
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

/// Runs a set of threads against a shared stack, timing them from the moment
/// they are all released until the last one finishes.
#[derive(Clone)]
pub struct MultithreadedBench<T> {
    start: Arc<Barrier>,
    end: Arc<Barrier>,
    stack: Arc<T>,
}

impl<T: Send + Sync + 'static> MultithreadedBench<T> {
    /// `threads` counts the spawned threads plus the timing thread.
    pub fn with_threads(stack: Arc<T>, threads: usize) -> Self {
        Self {
            start: Arc::new(Barrier::new(threads)),
            end: Arc::new(Barrier::new(threads)),
            stack,
        }
    }

    pub fn thread(&self, f: impl FnOnce(&Barrier, &T) + Send + 'static) -> &Self {
        let start = self.start.clone();
        let end = self.end.clone();
        let stack = self.stack.clone();
        thread::spawn(move || {
            f(&*start, &*stack);
            end.wait();
        });
        self
    }

    pub fn run(&self) -> Duration {
        self.start.wait();
        let t0 = Instant::now();
        self.end.wait();
        t0.elapsed()
    }
}
