//! Target selection
//!
//! A connection starts at a uniformly random target and, on dial failure,
//! walks the pool in order, wrapping around, until every target was tried
//! once.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Picks initial targets for new connections
///
/// The generator is seeded once and shared by every listener of the runtime.
/// Callers on different tasks serialize on the mutex, so concurrent
/// selections never observe a torn or reseeded state.
#[derive(Debug)]
pub struct TargetSelector {
    rng: Mutex<StdRng>,
}

impl TargetSelector {
    /// Selector seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Selector with a fixed seed, for reproducible selection
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniformly random index in `[0, pool_size)`
    ///
    /// `pool_size` must be non-zero; pools are validated at startup.
    pub fn pick_initial(&self, pool_size: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..pool_size)
    }

    /// Index tried after `current` failed
    pub fn pick_next(current: usize, pool_size: usize) -> usize {
        (current + 1) % pool_size
    }

    /// Bounded sequence of indices to dial, starting at `start`
    pub fn retry_sequence(start: usize, pool_size: usize) -> RetrySequence {
        RetrySequence::new(start, pool_size)
    }
}

impl Default for TargetSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Cyclic walk over target indices, yielding each index exactly once
#[derive(Debug, Clone)]
pub struct RetrySequence {
    next: usize,
    pool_size: usize,
    remaining: usize,
}

impl RetrySequence {
    pub fn new(start: usize, pool_size: usize) -> Self {
        Self {
            next: if pool_size == 0 { 0 } else { start % pool_size },
            pool_size,
            remaining: pool_size,
        }
    }
}

impl Iterator for RetrySequence {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }

        let current = self.next;
        self.remaining -= 1;
        self.next = TargetSelector::pick_next(current, self.pool_size);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RetrySequence {}
