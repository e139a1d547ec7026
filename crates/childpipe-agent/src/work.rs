//! Simulated workload and the loop that drives it

use crate::config::{DEFAULT_LIST_SIZE, DEFAULT_SLEEP_MS, DEFAULT_WORK_LOAD};
use crate::counter::SharedCounter;
use crate::shutdown::ShutdownFlag;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// A unit of simulated work.
///
/// Only the cost of a unit matters; its result is discarded.
pub trait Workload {
    /// Perform one unit of work
    fn perform_unit(&mut self);
}

/// Linear membership probe over an ordered sequence
pub struct ListProbe {
    list: Vec<usize>,
    rng: StdRng,
}

impl ListProbe {
    /// Build the sequence `0..list_size`
    pub fn new(list_size: usize) -> Self {
        Self {
            list: (0..list_size).collect(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Length of the probed sequence
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Default for ListProbe {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_SIZE)
    }
}

impl Workload for ListProbe {
    fn perform_unit(&mut self) {
        if self.list.is_empty() {
            return;
        }
        let probe = self.rng.gen_range(0..self.list.len());
        black_box(self.list.contains(&probe));
    }
}

/// Repeats bursts of work until shutdown is requested.
///
/// Each iteration performs `work_load` units, increments the counter
/// once, then sleeps. Shutdown latency is at most one iteration.
pub struct WorkLoop {
    counter: SharedCounter,
    shutdown: ShutdownFlag,
    work_load: usize,
    sleep_interval: Duration,
}

impl WorkLoop {
    /// Create a loop with the default work load and sleep interval
    pub fn new(counter: SharedCounter, shutdown: ShutdownFlag) -> Self {
        Self {
            counter,
            shutdown,
            work_load: DEFAULT_WORK_LOAD,
            sleep_interval: Duration::from_millis(DEFAULT_SLEEP_MS),
        }
    }

    /// Set the number of work units per iteration
    pub fn with_work_load(mut self, work_load: usize) -> Self {
        self.work_load = work_load;
        self
    }

    /// Set the pause after each iteration
    pub fn with_sleep_interval(mut self, sleep_interval: Duration) -> Self {
        self.sleep_interval = sleep_interval;
        self
    }

    /// Run on the calling thread until shutdown, returning the number of
    /// completed iterations
    pub fn run<L>(&self, workload: &mut L) -> u64
    where
        L: Workload + ?Sized,
    {
        debug!(
            "Work loop started: work_load={}, sleep_interval={:?}",
            self.work_load, self.sleep_interval
        );

        let mut iterations = 0u64;
        while !self.shutdown.is_set() {
            self.run_iteration(workload);
            iterations += 1;
        }

        debug!("Work loop observed shutdown after {} iterations", iterations);
        iterations
    }

    /// Perform one burst, record it, then sleep
    pub fn run_iteration<L>(&self, workload: &mut L)
    where
        L: Workload + ?Sized,
    {
        for _ in 0..self.work_load {
            workload.perform_unit();
        }
        self.counter.increment();
        thread::sleep(self.sleep_interval);
    }
}
