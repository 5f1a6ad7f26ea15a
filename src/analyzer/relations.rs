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

//! Linear relation mining over `Z/2^k Z`.
//!
//! Each candidate pair contributes the equation `a*v1 + b ≡ v2 (mod 2^k)`.
//! Two equations with an odd `v1` delta determine `a` via a modular
//! inverse; `b` follows by substitution. A relation is accepted only if
//! every equation in its group agrees with the resulting `(a, b)` — if no
//! pair of equations is both invertible and globally consistent, the
//! group's linear system is unsolvable and is skipped, never guessed.

use std::collections::HashMap;

use super::candidates::PairCandidate;

/// `a*r1 + b ≡ r2 (mod 2^k)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub register_1: String,
    pub register_2: String,
    pub a: u64,
    pub b: u64,
}

/// The multiplicative inverse of odd `a` modulo `2^k`, via Newton's
/// doubling-precision iteration (`x' = x*(2 - a*x)`). Even `a` has no
/// inverse in this ring and returns `None`.
pub fn mod_inverse(a: u64, k: u32) -> Option<u64> {
    if k == 0 {
        return Some(0);
    }
    if a % 2 == 0 {
        return None;
    }
    let modulus: u128 = 1u128 << k;
    let a_mod = (a as u128) % modulus;
    let mut x: u128 = 1 % modulus;
    let mut precision = 1u32;
    while precision < k {
        let product = (a_mod * x) % modulus;
        let two_minus_product = (2 * modulus + 2 - product) % modulus;
        x = (x * two_minus_product) % modulus;
        precision *= 2;
    }
    Some(x as u64)
}

fn sub_mod(x: u128, y: u128, modulus: u128) -> u128 {
    ((x % modulus) + modulus - (y % modulus)) % modulus
}

fn solve_pair_group(equations: &[(u64, u64)], k: u32) -> Option<(u64, u64)> {
    let modulus: u128 = 1u128 << k;
    for i in 0..equations.len() {
        for j in (i + 1)..equations.len() {
            let (v1i, v2i) = equations[i];
            let (v1j, v2j) = equations[j];

            let delta_v1 = sub_mod(v1i as u128, v1j as u128, modulus);
            if delta_v1 % 2 == 0 {
                continue;
            }
            let Some(inv) = mod_inverse(delta_v1 as u64, k) else { continue };

            let delta_v2 = sub_mod(v2i as u128, v2j as u128, modulus);
            let a = (delta_v2 * inv as u128) % modulus;
            let b = sub_mod(v2i as u128, (a * v1i as u128) % modulus, modulus);

            let consistent = equations.iter().all(|&(v1, v2)| {
                let predicted = (a * v1 as u128 + b) % modulus;
                predicted == (v2 as u128) % modulus
            });
            if consistent {
                return Some((a as u64, b as u64));
            }
        }
    }
    None
}

/// Groups candidate pairs by `(r1, r2)` and solves each group's linear
/// system independently. Groups with fewer than 2 equations, or whose
/// system is unsolvable, are skipped.
pub fn extract_relations(candidates: &[PairCandidate], k: u32) -> Vec<Relation> {
    let mut groups: HashMap<(String, String), Vec<(u64, u64)>> = HashMap::new();
    for c in candidates {
        groups.entry((c.register_1.clone(), c.register_2.clone())).or_default().push((c.value_1, c.value_2));
    }

    let mut out = Vec::new();
    for ((register_1, register_2), equations) in groups {
        if equations.len() < 2 {
            continue;
        }
        if let Some((a, b)) = solve_pair_group(&equations, k) {
            out.push(Relation { register_1, register_2, a, b });
        }
    }
    out
}

/// The fraction of `measurements` for which `reg[r2] ≡ a*reg[r1] + b (mod 2^k)`.
pub fn match_rate(r: &Relation, measurements: &[crate::codegen::state::RegisterContents], k: u32) -> f64 {
    if measurements.is_empty() {
        return 0.0;
    }
    let modulus: u128 = 1u128 << k;
    let matches = measurements
        .iter()
        .filter(|m| match (m.get(&r.register_1), m.get(&r.register_2)) {
            (Some(v1), Some(v2)) => {
                let predicted = (r.a as u128 * v1 as u128 + r.b as u128) % modulus;
                predicted == (v2 as u128) % modulus
            }
            _ => false,
        })
        .count();
    matches as f64 / measurements.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_inverse_of_odd_values_round_trips() {
        for a in [1u64, 3, 5, 7, 255] {
            let inv = mod_inverse(a, 8).unwrap();
            assert_eq!((a.wrapping_mul(inv)) % 256, 1);
        }
    }

    #[test]
    fn even_values_have_no_inverse() {
        assert_eq!(mod_inverse(4, 8), None);
    }

    #[test]
    fn extracts_relation_from_consistent_affine_equations() {
        // r2 = 3*r1 + 7 (mod 16)
        let candidates: Vec<PairCandidate> = (0u64..4)
            .map(|v1| PairCandidate {
                register_1: "x0".into(),
                value_1: v1,
                register_2: "x1".into(),
                value_2: (3 * v1 + 7) % 16,
            })
            .collect();
        let relations = extract_relations(&candidates, 4);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].a, 3);
        assert_eq!(relations[0].b, 7);
    }

    #[test]
    fn inconsistent_equations_are_skipped_not_guessed() {
        let candidates = vec![
            PairCandidate { register_1: "x0".into(), value_1: 0, register_2: "x1".into(), value_2: 1 },
            PairCandidate { register_1: "x0".into(), value_1: 2, register_2: "x1".into(), value_2: 1 },
            PairCandidate { register_1: "x0".into(), value_1: 4, register_2: "x1".into(), value_2: 9 },
        ];
        // Every pairwise v1 delta here is even, so no pair is invertible
        // mod 2^4 and the group's system is unsolvable.
        let relations = extract_relations(&candidates, 4);
        assert!(relations.is_empty());
    }

    #[test]
    fn single_equation_group_is_skipped() {
        let candidates =
            vec![PairCandidate { register_1: "x0".into(), value_1: 1, register_2: "x1".into(), value_2: 2 }];
        assert!(extract_relations(&candidates, 4).is_empty());
    }
}
