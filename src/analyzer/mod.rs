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

//! Statistical relation mining over a set of classified measurements
//!
//!
//! A "class" groups together every measurement produced from the same
//! expanded experiment (same directive sequence, same placeholder bindings
//! modulo the randomized fields under analysis). For each class this module
//! runs candidate selection, then derives the per-bit constraints and
//! cross-register linear relations those candidates support, attaching a
//! match rate against the full measurement set to each finding.

pub mod candidates;
pub mod constraints;
pub mod measurement;
pub mod relations;

use std::collections::HashMap;

use crate::codegen::state::RegisterContents;

pub use candidates::{select_pair_candidates, select_single_candidates, PairCandidate, SingleCandidate};
pub use constraints::{extract_constraints, Constraint};
pub use measurement::{ClassifiedMeasurement, MapMeasurement};
pub use relations::{extract_relations, mod_inverse, Relation};

/// A constraint or relation together with the fraction of the class's
/// measurements that actually agree with it.
#[derive(Clone, Debug, PartialEq)]
pub struct Scored<T> {
    pub finding: T,
    pub match_rate: f64,
}

/// Everything mined from one class of measurements.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassAnalysis {
    pub class_id: String,
    pub constraints: Vec<Scored<Constraint>>,
    pub relations: Vec<Scored<Relation>>,
}

/// Runs candidate selection, constraint extraction, and relation mining for
/// one class's measurements over the bit window `[lo, hi)`.
///
/// Returns `None` if `measurements` is empty: a class with no observations
/// is skipped silently rather than reported as "no findings".
pub fn analyze_class(class_id: &str, measurements: &[RegisterContents], lo: u32, hi: u32) -> Option<ClassAnalysis> {
    if measurements.is_empty() {
        return None;
    }

    let k = hi - lo;

    let singles = select_single_candidates(measurements, lo, hi);
    let constraints = extract_constraints(&singles, lo, hi)
        .into_iter()
        .map(|c| {
            let match_rate = constraints::match_rate(&c, measurements);
            Scored { finding: c, match_rate }
        })
        .collect();

    let pairs = select_pair_candidates(measurements, lo, hi);
    let relations = extract_relations(&pairs, k)
        .into_iter()
        .map(|r| {
            let match_rate = relations::match_rate(&r, measurements, k);
            Scored { finding: r, match_rate }
        })
        .collect();

    Some(ClassAnalysis { class_id: class_id.to_string(), constraints, relations })
}

/// Runs [`analyze_class`] over every class in `classes`, in ascending
/// class-id order, skipping any class with no measurements.
pub fn analyze_classes(classes: &HashMap<String, Vec<RegisterContents>>, lo: u32, hi: u32) -> Vec<ClassAnalysis> {
    let mut class_ids: Vec<&String> = classes.keys().collect();
    class_ids.sort();

    class_ids
        .into_iter()
        .filter_map(|class_id| analyze_class(class_id, &classes[class_id], lo, hi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(pairs: &[(&str, u64)]) -> RegisterContents {
        RegisterContents(pairs.iter().map(|(r, v)| (r.to_string(), *v)).collect())
    }

    #[test]
    fn empty_class_is_skipped_silently() {
        assert!(analyze_class("c0", &[], 0, 4).is_none());
    }

    #[test]
    fn constant_register_yields_a_fully_matching_constraint() {
        let measurements = vec![
            measurement(&[("x0", 0), ("x1", 5)]),
            measurement(&[("x0", 0), ("x1", 9)]),
            measurement(&[("x0", 0), ("x1", 1)]),
        ];
        let analysis = analyze_class("c0", &measurements, 0, 1).unwrap();
        let bit0 = analysis.constraints.iter().find(|s| s.finding.register == "x0" && s.finding.bit == 0).unwrap();
        assert_eq!(bit0.match_rate, 1.0);
    }

    #[test]
    fn analyze_classes_sorts_by_class_id_and_drops_empty_classes() {
        let mut classes = HashMap::new();
        classes.insert("b".to_string(), vec![measurement(&[("x0", 1)])]);
        classes.insert("a".to_string(), vec![measurement(&[("x0", 2)])]);
        classes.insert("empty".to_string(), Vec::new());

        let results = analyze_classes(&classes, 0, 2);
        let ids: Vec<&str> = results.iter().map(|r| r.class_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
