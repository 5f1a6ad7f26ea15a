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

//! S6 and properties 9/10: analyzer soundness and constraint detection over
//! a synthetic class built directly from [`RegisterContents`], the way a
//! `registers.json` batch would be reconstructed from disk.

use gts::analyzer::analyze_class;
use gts::codegen::RegisterContents;

fn measurement(pairs: &[(&str, u64)]) -> RegisterContents {
    RegisterContents(pairs.iter().map(|(r, v)| (r.to_string(), *v)).collect())
}

/// S6: `k = 7`, `rB = 3*rA + 5 (mod 128)` over 100 measurements, plus an
/// uncorrelated `rC` and a constant `rD` thrown in so the analysis has to
/// tell them apart.
#[test]
fn s6_emits_exactly_the_planted_relation_with_full_match_rate() {
    let measurements: Vec<RegisterContents> = (0u64..100)
        .map(|i| {
            let ra = i % 10;
            let rb = (3 * ra + 5) % 128;
            let rc = (i * 41 + 17) % 128;
            measurement(&[("rA", ra), ("rB", rb), ("rC", rc), ("rD", 42)])
        })
        .collect();

    let analysis = analyze_class("s6", &measurements, 0, 7).unwrap();

    let relation = analysis
        .relations
        .iter()
        .find(|r| r.finding.register_1 == "rA" && r.finding.register_2 == "rB")
        .expect("the planted rA/rB relation must be found");
    assert_eq!(relation.finding.a, 3);
    assert_eq!(relation.finding.b, 5);
    assert_eq!(relation.match_rate, 1.0);

    // No spurious relation should connect the uncorrelated register to
    // either of the planted ones.
    assert!(!analysis.relations.iter().any(|r| {
        [&r.finding.register_1, &r.finding.register_2].into_iter().any(|r| r == "rC")
    }));
}

/// Property 10: a register constant across every measurement yields a
/// constraint for each of its bits, each matching 100% of measurements.
#[test]
fn constant_register_yields_a_constraint_per_bit() {
    let measurements: Vec<RegisterContents> =
        (0u64..20).map(|i| measurement(&[("rA", i), ("rD", 42)])).collect();

    let analysis = analyze_class("constants", &measurements, 0, 7).unwrap();

    // 42 = 0b0101010: bits 1, 3, 5 are set, bits 0, 2, 4, 6 are clear.
    for bit in 0..7u32 {
        let expected = (42u64 >> bit) & 1 == 1;
        let constraint = analysis
            .constraints
            .iter()
            .find(|c| c.finding.register == "rD" && c.finding.bit == bit)
            .unwrap_or_else(|| panic!("missing constraint for rD bit {bit}"));
        assert_eq!(constraint.finding.value, expected);
        assert_eq!(constraint.match_rate, 1.0);
    }
}

#[test]
fn empty_class_is_skipped_silently() {
    assert!(analyze_class("nothing", &[], 0, 7).is_none());
}
