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

//! Candidate selection
//!
//! A candidate is a register (or pair of registers) whose observed value
//! distribution over the fuzzed-bit window departs from what uniform
//! sampling would predict — the first, cheap filter before constraint and
//! relation extraction do the more expensive bit-level work.

use std::collections::HashMap;

use crate::codegen::state::RegisterContents;

/// A single-register value whose observed frequency across a class's
/// measurements differs from the uniform expectation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleCandidate {
    pub register: String,
    pub value: u64,
}

/// A pair of register/value observations whose joint frequency differs
/// from the uniform expectation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairCandidate {
    pub register_1: String,
    pub value_1: u64,
    pub register_2: String,
    pub value_2: u64,
}

/// The registers assumed common to every measurement in a class, sorted
/// for deterministic iteration order.
pub fn registers_used(measurements: &[RegisterContents]) -> Vec<String> {
    let mut names: Vec<String> = measurements.first().map(|m| m.0.keys().cloned().collect()).unwrap_or_default();
    names.sort();
    names
}

fn field(value: u64, lo: u32, mask: u64) -> u64 {
    (value >> lo) & mask
}

/// Single-register candidates over the bit window `[lo, hi)`.
pub fn select_single_candidates(measurements: &[RegisterContents], lo: u32, hi: u32) -> Vec<SingleCandidate> {
    let k = hi - lo;
    let mask = if k >= 64 { u64::MAX } else { (1u64 << k) - 1 };
    let registers = registers_used(measurements);
    if registers.is_empty() {
        return Vec::new();
    }
    let expected = expected_single_count(k, registers.len());

    let mut counts: HashMap<(String, u64), u64> = HashMap::new();
    for m in measurements {
        for r in &registers {
            if let Some(v) = m.get(r) {
                *counts.entry((r.clone(), field(v, lo, mask))).or_insert(0) += 1;
            }
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count != expected)
        .map(|((register, value), _)| SingleCandidate { register, value })
        .collect()
}

fn expected_single_count(k: u32, register_count: usize) -> u64 {
    if register_count == 0 {
        return 0;
    }
    1u64 << (k as u64 * (register_count as u64 - 1)).min(63)
}

fn expected_pair_count(k: u32, register_count: usize) -> u64 {
    if register_count < 2 {
        return 0;
    }
    1u64 << (k as u64 * (register_count as u64 - 2)).min(63)
}

/// Register-pair candidates over the bit window `[lo, hi)`.
pub fn select_pair_candidates(measurements: &[RegisterContents], lo: u32, hi: u32) -> Vec<PairCandidate> {
    let k = hi - lo;
    let mask = if k >= 64 { u64::MAX } else { (1u64 << k) - 1 };
    let registers = registers_used(measurements);
    if registers.len() < 2 {
        return Vec::new();
    }
    let expected = expected_pair_count(k, registers.len());

    let mut counts: HashMap<(String, u64, String, u64), u64> = HashMap::new();
    for m in measurements {
        for i in 0..registers.len() {
            for j in (i + 1)..registers.len() {
                let (r1, r2) = (&registers[i], &registers[j]);
                if let (Some(v1), Some(v2)) = (m.get(r1), m.get(r2)) {
                    let key = (r1.clone(), field(v1, lo, mask), r2.clone(), field(v2, lo, mask));
                    *counts.entry(key).or_insert(0) += 1;
                }
            }
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count != expected)
        .map(|((register_1, value_1, register_2, value_2), _)| PairCandidate {
            register_1,
            value_1,
            register_2,
            value_2,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(pairs: &[(&str, u64)]) -> RegisterContents {
        RegisterContents(pairs.iter().map(|(r, v)| (r.to_string(), *v)).collect())
    }

    #[test]
    fn uniform_distribution_yields_no_single_candidates() {
        // Two registers, 1-bit window: all four (r,bit) combinations occur
        // exactly once, matching E1 = 2^(1*(2-1)) = 2.
        let measurements = vec![
            measurement(&[("x0", 0b00), ("x1", 0b01)]),
            measurement(&[("x0", 0b01), ("x1", 0b00)]),
            measurement(&[("x0", 0b00), ("x1", 0b01)]),
            measurement(&[("x0", 0b01), ("x1", 0b00)]),
        ];
        let candidates = select_single_candidates(&measurements, 0, 1);
        assert!(candidates.is_empty());
    }

    #[test]
    fn skewed_distribution_is_flagged_as_a_candidate() {
        let measurements = vec![
            measurement(&[("x0", 0), ("x1", 0)]),
            measurement(&[("x0", 0), ("x1", 0)]),
            measurement(&[("x0", 0), ("x1", 1)]),
            measurement(&[("x0", 0), ("x1", 1)]),
        ];
        let candidates = select_single_candidates(&measurements, 0, 1);
        // x0 is constant zero: observed count 4 != expected 2.
        assert!(candidates.iter().any(|c| c.register == "x0" && c.value == 0));
    }

    #[test]
    fn empty_measurement_set_yields_no_candidates() {
        assert!(select_single_candidates(&[], 0, 4).is_empty());
        assert!(select_pair_candidates(&[], 0, 4).is_empty());
    }
}
