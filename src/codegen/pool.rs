// This file is part of gts, a generative testcase toolkit.
// Copyright 2024 gts contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later
//
// gts is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License,
// or (at your option) any later version.
//
// gts is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with gts.  If not, see <http://www.gnu.org/licenses/>.

//! A draw-without-replacement pool of integers
//!
//! Below 70% occupancy, `poprand` draws a candidate directly and retries on
//! collision — cheap while collisions are rare. Above that threshold,
//! collisions dominate, so the pool materializes and shuffles its
//! remaining elements once and serves subsequent draws with `Vec::pop`.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::RngCore;

/// Occupancy above which `poprand` switches from dense random draws to a
/// shuffled remainder list.
const DENSE_DRAW_OCCUPANCY_LIMIT: f64 = 0.7;

/// A finite set of integers in `[lower, upper)`, drawn without replacement.
#[derive(Debug)]
pub struct Pool {
    lower: i64,
    upper: i64,
    taken: HashSet<i64>,
    remainder: Vec<i64>,
    remaining: usize,
}

impl Pool {
    pub fn new(lower: i64, upper: i64) -> Self {
        let capacity = (upper - lower).max(0) as usize;
        Self { lower, upper, taken: HashSet::new(), remainder: Vec::new(), remaining: capacity }
    }

    pub fn capacity(&self) -> usize {
        (self.upper - self.lower).max(0) as usize
    }

    pub fn len(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    pub fn in_bounds(&self, value: i64) -> bool {
        value >= self.lower && value < self.upper
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    /// Draws and removes a random element, or `None` if the pool is empty.
    pub fn poprand(&mut self, rng: &mut dyn RngCore) -> Option<i64> {
        if self.remaining == 0 {
            return None;
        }

        let occupancy = 1.0 - (self.remaining as f64 / self.capacity() as f64);
        if occupancy < DENSE_DRAW_OCCUPANCY_LIMIT {
            loop {
                let span = self.capacity() as u64;
                let candidate = self.lower + (rng.next_u64() % span) as i64;
                if self.taken.insert(candidate) {
                    self.remaining -= 1;
                    return Some(candidate);
                }
            }
        }

        if self.remainder.is_empty() {
            self.remainder = (self.lower..self.upper).filter(|v| !self.taken.contains(v)).collect();
            self.remainder.shuffle(rng);
        }
        let value = self.remainder.pop().expect("remainder non-empty while remaining > 0");
        self.taken.insert(value);
        self.remaining -= 1;
        Some(value)
    }

    /// Removes a specific value from the pool, if present and unused.
    pub fn pop(&mut self, value: i64) {
        if self.in_bounds(value) && self.taken.insert(value) {
            self.remaining -= 1;
            if let Some(pos) = self.remainder.iter().position(|&v| v == value) {
                self.remainder.remove(pos);
            }
        }
    }

    pub fn taken(&self, value: i64) -> bool {
        self.taken.contains(&value)
    }

    /// Restores the pool to `[lower, upper)` with nothing taken.
    pub fn reset(&mut self) {
        self.taken.clear();
        self.remainder.clear();
        self.remaining = self.capacity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn poprand_never_repeats_and_drains_exactly_capacity() {
        let mut pool = Pool::new(0, 64);
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let v = pool.poprand(&mut rng).expect("pool not yet empty");
            assert!(seen.insert(v), "poprand returned {v} twice");
            assert!(pool.in_bounds(v));
        }
        assert!(pool.is_empty());
        assert_eq!(pool.poprand(&mut rng), None);
    }

    #[test]
    fn pop_removes_a_specific_value() {
        let mut pool = Pool::new(0, 8);
        pool.pop(3);
        assert!(pool.taken(3));
        assert_eq!(pool.len(), 7);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..7 {
            let v = pool.poprand(&mut rng).unwrap();
            assert_ne!(v, 3);
        }
        assert!(pool.is_empty());
    }

    #[test]
    fn pop_out_of_bounds_is_a_no_op() {
        let mut pool = Pool::new(0, 4);
        pool.pop(100);
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn reset_restores_full_capacity() {
        let mut pool = Pool::new(0, 4);
        let mut rng = StdRng::seed_from_u64(2);
        pool.poprand(&mut rng);
        pool.poprand(&mut rng);
        pool.reset();
        assert_eq!(pool.len(), 4);
        assert!(!pool.taken(0) && !pool.taken(1) && !pool.taken(2) && !pool.taken(3));
    }

    #[test]
    fn switches_to_shuffled_remainder_above_dense_threshold() {
        // Capacity 10: once 7 are taken, occupancy is 70% and the dense
        // path must no longer run — drains cleanly via the remainder list.
        let mut pool = Pool::new(0, 10);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..7 {
            pool.poprand(&mut rng).unwrap();
        }
        assert_eq!(pool.len(), 3);
        let mut seen = HashSet::new();
        for _ in 0..3 {
            let v = pool.poprand(&mut rng).unwrap();
            assert!(seen.insert(v));
        }
        assert!(pool.is_empty());
    }
}
