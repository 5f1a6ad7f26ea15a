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

//! Per-bit constraint extraction

use std::collections::HashMap;

use crate::codegen::state::RegisterContents;

use super::candidates::SingleCandidate;

/// A bit of a register that holds a fixed value across every candidate
/// observation for that register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub register: String,
    pub bit: u32,
    pub value: bool,
}

/// For each register appearing among `candidates` and each bit in
/// `[lo, hi)`, emits a constraint if that bit is identical across every
/// candidate value observed for the register.
pub fn extract_constraints(candidates: &[SingleCandidate], lo: u32, hi: u32) -> Vec<Constraint> {
    let mut by_register: HashMap<&str, Vec<u64>> = HashMap::new();
    for c in candidates {
        by_register.entry(c.register.as_str()).or_default().push(c.value);
    }

    let mut out = Vec::new();
    for (register, values) in by_register {
        for bit in lo..hi {
            let mut bits = values.iter().map(|v| (v >> bit) & 1 == 1);
            let Some(first) = bits.next() else { continue };
            if bits.all(|b| b == first) {
                out.push(Constraint { register: register.to_string(), bit, value: first });
            }
        }
    }
    out
}

/// The fraction of `measurements` whose register contents match `c`.
pub fn match_rate(c: &Constraint, measurements: &[RegisterContents]) -> f64 {
    if measurements.is_empty() {
        return 0.0;
    }
    let matches = measurements
        .iter()
        .filter(|m| m.get(&c.register).map(|v| ((v >> c.bit) & 1 == 1) == c.value).unwrap_or(false))
        .count();
    matches as f64 / measurements.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_bit_across_candidates_is_a_constraint() {
        let candidates = vec![
            SingleCandidate { register: "x0".into(), value: 0b101 },
            SingleCandidate { register: "x0".into(), value: 0b001 },
        ];
        let constraints = extract_constraints(&candidates, 0, 3);
        // bit 0 is 1 in both; bits 1,2 differ.
        assert_eq!(constraints, vec![Constraint { register: "x0".into(), bit: 0, value: true }]);
    }

    #[test]
    fn no_candidates_yields_no_constraints() {
        assert!(extract_constraints(&[], 0, 4).is_empty());
    }

    #[test]
    fn match_rate_counts_agreeing_measurements() {
        let constraint = Constraint { register: "x0".into(), bit: 0, value: true };
        let measurements = vec![
            RegisterContents([("x0".to_string(), 1u64)].into_iter().collect()),
            RegisterContents([("x0".to_string(), 0u64)].into_iter().collect()),
        ];
        assert_eq!(match_rate(&constraint, &measurements), 0.5);
    }
}
