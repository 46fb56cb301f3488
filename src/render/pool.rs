//! Bounded worker pool for the compositor's per-station geometry phase.
//!
//! Per-station crop/resize work (§4.5 steps 1-6) is independent across
//! stations, so it runs in a pool capped at `max_concurrent_threads`
//! workers: jobs launch one at a time, and whenever the in-flight set
//! reaches the cap the driver polls for a finished job, joins it, and
//! launches the next. This gives coarse backpressure without a task queue.

use std::thread;

/// Caps concurrent compositor geometry jobs at `capacity`.
pub struct CompositorPool {
    capacity: usize,
}

impl CompositorPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    /// Runs `jobs` to completion, at most `capacity` at a time, preserving
    /// input order in the returned vector. A job that panics is dropped
    /// from the result (its slot is simply absent from what callers see as
    /// "retained"); callers that need every job to have run should check
    /// the returned vector's length against `jobs.len()`.
    pub fn run<T, F>(&self, jobs: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut pending = jobs.into_iter().enumerate();
        let mut in_flight: Vec<(usize, thread::JoinHandle<T>)> = Vec::new();
        let mut results: Vec<Option<T>> = Vec::new();

        while in_flight.len() < self.capacity {
            match pending.next() {
                Some((index, job)) => {
                    results.resize_with(index + 1, || None);
                    in_flight.push((index, thread::spawn(job)));
                }
                None => break,
            }
        }

        while !in_flight.is_empty() {
            let Some(done_pos) = in_flight.iter().position(|(_, h)| h.is_finished()) else {
                thread::yield_now();
                continue;
            };
            let (index, handle) = in_flight.remove(done_pos);
            if let Ok(value) = handle.join() {
                results[index] = Some(value);
            }
            if let Some((next_index, job)) = pending.next() {
                results.resize_with(next_index + 1, || None);
                in_flight.push((next_index, thread::spawn(job)));
            }
        }

        results.into_iter().flatten().collect()
    }
}

impl Default for CompositorPool {
    fn default() -> Self {
        Self::new(7)
    }
}
