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

//! The AST expansion algebra: reduces a [`Gts`] to a set of [`Experiment`]s.
//!
//! Composition follows the product-of-sets law: expanding an
//! `Expression[c1, c2, ..., cn]` concatenates the children's expansions
//! pairwise, preserving order (`prod({a,b},{c,d}) = {ac, ad, bc, bd}`).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::RngCore;

use crate::error::{GtsError, GtsResult};

use super::ast::*;

/// A fully-expanded ordered list of directives: no operators, no unresolved
/// variables.
pub type Experiment = Vec<Directive>;

/// Bit widths of the architectural fields an expansion may need to query
/// (currently only the fuzz operators). A non-owning borrow onto whatever
/// target the code generator is configured for — see the code generator's
/// `Target` type for the concrete implementation.
pub trait BitWidths {
    fn offset_width(&self) -> u32;
    fn set_width(&self) -> u32;
}

/// A fixed reference target with the default bit-field layout (offset =
/// bits `[0,6)`, set = bits `[6,13)`), usable standalone or in tests that
/// don't need a full code generator target.
pub struct ReferenceWidths;

impl BitWidths for ReferenceWidths {
    fn offset_width(&self) -> u32 {
        6
    }

    fn set_width(&self) -> u32 {
        7
    }
}

/// Variable scope stack plus the context an expansion needs beyond the AST
/// itself: bit widths (borrowed, never owned, to avoid a cyclic ownership
/// dependency between the target and the expansion state) and a random
/// stream for Wildcard's directive choice, kept independent from any random
/// stream the code generator uses for pool draws or mnemonic selection.
pub struct ExpansionState<'a> {
    scopes: Vec<Vec<(String, i64)>>,
    widths: &'a dyn BitWidths,
    rng: &'a mut dyn RngCore,
}

impl<'a> ExpansionState<'a> {
    pub fn new(widths: &'a dyn BitWidths, rng: &'a mut dyn RngCore) -> Self {
        Self { scopes: vec![Vec::new()], widths, rng }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: &str, value: i64) {
        self.scopes.last_mut().expect("at least one scope always present").push((name.to_string(), value));
    }

    fn lookup(&self, name: &str) -> Option<i64> {
        for scope in self.scopes.iter().rev() {
            for (n, v) in scope.iter().rev() {
                if n == name {
                    return Some(*v);
                }
            }
        }
        None
    }
}

/// Expands an entire GTS, returning `(precondition_experiments, main_experiments)`.
pub fn expand_gts(gts: &Gts, state: &mut ExpansionState) -> GtsResult<(Vec<Experiment>, Vec<Experiment>)> {
    let pre = match &gts.precondition {
        Some(expr) => {
            let expanded = expand_expression(expr, state)?;
            if expanded.len() != 1 {
                return Err(GtsError::Semantic(
                    "a precondition must expand to exactly one experiment; sets of experiments are not supported in preconditions".into(),
                ));
            }
            expanded
        }
        None => Vec::new(),
    };
    let main = expand_expression(&gts.main, state)?;
    if main.is_empty() {
        return Err(GtsError::Semantic("expansion of the main expression yielded no experiments".into()));
    }
    Ok((pre, main))
}

pub fn expand_expression(expr: &Expression, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let mut acc: Vec<Experiment> = vec![Vec::new()];
    for node in expr.nodes() {
        let next = expand_node(node, state)?;
        acc = product(&acc, &next);
    }
    Ok(acc)
}

fn repeat_experiment(e: &Experiment, n: usize) -> Experiment {
    let mut out = Experiment::with_capacity(e.len() * n);
    for _ in 0..n {
        out.extend(e.iter().cloned());
    }
    out
}

fn product(a: &[Experiment], b: &[Experiment]) -> Vec<Experiment> {
    let mut out = Vec::with_capacity(a.len() * b.len().max(1));
    for x in a {
        for y in b {
            let mut combined = x.clone();
            combined.extend(y.iter().cloned());
            out.push(combined);
        }
    }
    out
}

fn expand_node(node: &Node, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    match node {
        Node::Directive(d) => Ok(vec![vec![expand_directive(d, state)?]]),
        Node::Loop(body, spec) => expand_loop(body, spec, state),
        Node::Wildcard(k) => expand_wildcard(*k, state),
        Node::Shuffle(body) => expand_shuffle(body, state),
        Node::Subset(body) => expand_subset(body, state),
        Node::Slide(body, n) => expand_slide(body, *n, state),
        Node::Merge(a, b) => expand_merge(a, b, state),
        Node::Fuzz(body, mode) => expand_fuzz(body, *mode, state),
        Node::Repetition(body, n) => expand_repetition(body, *n, state),
    }
}

fn expand_directive(d: &Directive, state: &mut ExpansionState) -> GtsResult<Directive> {
    let resolve = |expr: &AttrExpr| -> GtsResult<i64> {
        expr.resolve(|name| state.lookup(name))
            .map_err(|name| GtsError::Semantic(format!("undefined variable '{name}'")))
    };

    Ok(match d {
        Directive::Memory(m) => {
            let mut m = m.clone();
            m.set.computed_offset = resolve(&m.set.expr)?;
            m.tag.computed_offset = resolve(&m.tag.expr)?;
            Directive::Memory(m)
        }
        Directive::Arithmetic(a) => {
            let mut a = a.clone();
            a.u.resolved = resolve(&a.u.expr)?;
            a.v.resolved = resolve(&a.v.expr)?;
            Directive::Arithmetic(a)
        }
        Directive::Branch(b) => {
            let mut b = b.clone();
            b.c.resolved = resolve(&b.c.expr)?;
            Directive::Branch(b)
        }
        Directive::StoreCondition(s) => {
            let mut s = s.clone();
            s.c.resolved = resolve(&s.c.expr)?;
            Directive::StoreCondition(s)
        }
        Directive::Nop => Directive::Nop,
    })
}

fn expand_loop(body: &Expression, spec: &LoopSpec, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    match spec {
        LoopSpec::Count(n) => {
            let expanded = expand_expression(body, state)?;
            let n = (*n).max(0) as usize;
            Ok(expanded
                .iter()
                .map(|e| repeat_experiment(e, n))
                .collect())
        }
        LoopSpec::Variable { n, step, var } => {
            if *step <= 0 {
                return Err(GtsError::Semantic("loop step must be positive".into()));
            }
            state.push_scope();
            let mut result = Experiment::new();
            let mut i = 0i64;
            while i < *n {
                state.define(var, i);
                let expanded = expand_expression(body, state)?;
                if expanded.len() != 1 {
                    state.pop_scope();
                    return Err(GtsError::Semantic(
                        "a bound loop iteration must expand to exactly one experiment".into(),
                    ));
                }
                result.extend(expanded.into_iter().next().unwrap());
                i += step;
            }
            state.pop_scope();
            Ok(vec![result])
        }
    }
}

fn expand_wildcard(k: i64, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let k = k.max(0) as usize;
    let mut experiment = Experiment::with_capacity(k);
    for _ in 0..k {
        let directive = if state.rng.next_u32() % 2 == 0 {
            Directive::Arithmetic(Arithmetic::default_attrs())
        } else {
            Directive::Nop
        };
        experiment.push(directive);
    }
    Ok(vec![experiment])
}

fn hash_directive(d: &Directive) -> u64 {
    let mut hasher = DefaultHasher::new();
    d.hash(&mut hasher);
    hasher.finish()
}

/// `hash_list(l) = XOR_i H(i || hash(l[i]))` — a commutative, fast,
/// position-salted fold. Valid for dedup only among experiments of equal
/// length, which always holds for the sets compared here.
fn hash_experiment(experiment: &Experiment) -> u64 {
    let mut acc = 0u64;
    for (i, d) in experiment.iter().enumerate() {
        let mut hasher = DefaultHasher::new();
        i.hash(&mut hasher);
        hash_directive(d).hash(&mut hasher);
        acc ^= hasher.finish();
    }
    acc
}

fn dedup_experiments(experiments: Vec<Experiment>) -> Vec<Experiment> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(experiments.len());
    for e in experiments {
        if seen.insert(hash_experiment(&e)) {
            out.push(e);
        }
    }
    out
}

fn permutations(items: &[Directive]) -> Vec<Experiment> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let chosen = rest.remove(i);
        for mut tail in permutations(&rest) {
            let mut perm = vec![chosen.clone()];
            perm.append(&mut tail);
            out.push(perm);
        }
    }
    out
}

fn expand_shuffle(body: &Expression, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let expanded = expand_expression(body, state)?;
    let mut out = Vec::new();
    for e in expanded {
        out.extend(dedup_experiments(permutations(&e)));
    }
    Ok(out)
}

/// The powerset of `items`, in the order each subset's elements appear in
/// `items`, excluding the empty set and the full set.
fn proper_nonempty_subsets(items: &[Directive]) -> Vec<Experiment> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for mask in 1u32..(1u32 << n) - 1 {
        let mut subset = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if mask & (1 << i) != 0 {
                subset.push(item.clone());
            }
        }
        out.push(subset);
    }
    out
}

fn expand_subset(body: &Expression, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let expanded = expand_expression(body, state)?;
    let mut out = Vec::new();
    for e in expanded {
        out.extend(dedup_experiments(proper_nonempty_subsets(&e)));
    }
    Ok(out)
}

fn expand_slide(body: &Expression, n: i64, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let expanded = expand_expression(body, state)?;
    let n = n.max(0);
    let mut out = Vec::new();
    for e in expanded {
        let has_memory = e.iter().any(|d| matches!(d, Directive::Memory(_)));
        if !has_memory {
            out.push(e);
            continue;
        }
        for i in 0..n {
            let mut copy = e.clone();
            for d in &mut copy {
                if let Directive::Memory(m) = d {
                    m.set.fixed_offset += i;
                }
            }
            out.push(copy);
        }
    }
    Ok(out)
}

fn expand_merge(a: &Expression, b: &Expression, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let ea = expand_expression(a, state)?;
    let eb = expand_expression(b, state)?;
    if ea.len() != 1 || eb.len() != 1 {
        return Err(GtsError::Semantic("merge operands must each expand to a single experiment".into()));
    }
    let left = &ea[0];
    let right = &eb[0];

    let mut combined = left.clone();
    combined.extend(right.iter().cloned());
    let len = combined.len();

    let mut variants = vec![combined.clone()];
    if len < 2 {
        return Ok(variants);
    }

    let mut pivots: Vec<i64> = vec![(left.len() as i64) - 1];

    // The swapped list is threaded through both phases below: each step
    // swaps the *current* pivot set against whatever the previous step
    // produced, never against the original concatenation. Swaps compound.
    let mut variant = combined.clone();

    // Growing phase: evolve the pivot set outward from its seed until it
    // stops introducing previously unseen pivots.
    loop {
        for &p in &pivots {
            if p >= 0 && (p as usize) + 1 < len {
                variant.swap(p as usize, (p + 1) as usize);
            }
        }
        variants.push(variant.clone());

        let mut next: Vec<i64> = Vec::new();
        for &p in &pivots {
            for cand in [p - 1, p + 1] {
                if cand >= 0 && (cand as usize) < len && !next.contains(&cand) {
                    next.push(cand);
                }
            }
        }
        next.sort_unstable();
        next.dedup();

        if next.len() <= pivots.len() {
            break;
        }
        pivots = next;
    }

    // Shrinking phase: drop boundary pivots until exactly one remains.
    while pivots.len() > 1 {
        pivots.sort_unstable();
        pivots.remove(0);

        for &p in &pivots {
            if p >= 0 && (p as usize) + 1 < len {
                variant.swap(p as usize, (p + 1) as usize);
            }
        }
        variants.push(variant.clone());
    }

    Ok(dedup_experiments(variants))
}

fn expand_fuzz(body: &Expression, mode: FuzzMode, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let expanded = expand_expression(body, state)?;
    let k = match mode {
        FuzzMode::Offset => state.widths.offset_width(),
        FuzzMode::CacheLine => state.widths.set_width(),
    };

    let mut out = Vec::new();
    for e in expanded {
        let positions: Vec<usize> =
            e.iter().enumerate().filter(|(_, d)| matches!(d, Directive::Memory(_))).map(|(i, _)| i).collect();
        let m = positions.len() as u32;
        let span = 1u64 << (k as u64 * m as u64);

        for combo in 0..span {
            let mut copy = e.clone();
            for (slot, &pos) in positions.iter().enumerate() {
                let field_value = (combo >> (k as u64 * slot as u64)) & ((1u64 << k) - 1);
                if let Directive::Memory(mem) = &mut copy[pos] {
                    match mode {
                        FuzzMode::Offset => mem.offset = field_value as i64,
                        FuzzMode::CacheLine => mem.set.override_ = Some(field_value as i64),
                    }
                }
            }
            out.push(copy);
        }
    }
    Ok(out)
}

fn expand_repetition(body: &Expression, n: i64, state: &mut ExpansionState) -> GtsResult<Vec<Experiment>> {
    let expanded = expand_expression(body, state)?;
    let n = n.max(0) as usize;
    Ok(expanded.iter().map(|e| repeat_experiment(e, n)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parser::parse;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state(rng: &mut StdRng) -> ExpansionState<'_> {
        ExpansionState::new(&ReferenceWidths, rng)
    }

    #[test]
    fn s1_single_memory_default_offsets() {
        let gts = parse("M").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].len(), 1);
        match &main[0][0] {
            Directive::Memory(m) => {
                assert_eq!(m.set.computed_offset, 0);
                assert_eq!(m.tag.computed_offset, 0);
                assert_eq!(m.offset, 0);
            }
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn s2_loop_count_replicates_in_place() {
        let gts = parse("[M]3").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].len(), 3);
    }

    #[test]
    fn s3_loop_variable_binds_offsets() {
        let gts = parse("[M_s=s1+i]4,1,i").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 1);
        let offsets: Vec<i64> = main[0]
            .iter()
            .map(|d| match d {
                Directive::Memory(m) => m.set.computed_offset,
                _ => panic!("expected memory directive"),
            })
            .collect();
        assert_eq!(offsets, vec![0, 1, 2, 3]);
    }

    #[test]
    fn product_law_concatenates_pairwise() {
        let a = vec![vec![Directive::Nop], vec![Directive::Memory(crate::lang::ast::Memory::default_attrs())]];
        let b = vec![vec![Directive::Nop]];
        let out = product(&a, &b);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 2);
    }

    #[test]
    fn s4_fuzz_offset_cardinality() {
        let gts = parse("<M>@").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 64);
        let mut offsets: Vec<i64> = main
            .iter()
            .map(|e| match &e[0] {
                Directive::Memory(m) => m.offset,
                _ => unreachable!(),
            })
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn s5_fuzz_cacheline_pair_cardinality() {
        let gts = parse("<M M>$").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 1 << 14);

        let mut pairs = std::collections::HashSet::new();
        for e in &main {
            let o0 = match &e[0] {
                Directive::Memory(m) => m.set.override_.unwrap(),
                _ => unreachable!(),
            };
            let o1 = match &e[1] {
                Directive::Memory(m) => m.set.override_.unwrap(),
                _ => unreachable!(),
            };
            pairs.insert((o0, o1));
        }
        assert_eq!(pairs.len(), 128 * 128);
    }

    #[test]
    fn shuffle_dedups_by_structural_hash() {
        let gts = parse("(N N)!").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        // N N has only one distinct permutation.
        assert_eq!(main.len(), 1);
    }

    #[test]
    fn shuffle_of_three_distinct_directives() {
        let gts = parse("(M A B)!").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 6);
        let mut hashes = std::collections::HashSet::new();
        for e in &main {
            assert!(hashes.insert(hash_experiment(e)));
        }
    }

    #[test]
    fn subset_excludes_empty_and_full() {
        let gts = parse("(M A B)S").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), (1 << 3) - 2);
        assert!(main.iter().all(|e| !e.is_empty() && e.len() < 3));
    }

    #[test]
    fn slide_adds_fixed_offset_per_copy() {
        let gts = parse("(M)3").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 3);
        let offsets: Vec<i64> = main
            .iter()
            .map(|e| match &e[0] {
                Directive::Memory(m) => m.set.fixed_offset,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(offsets, vec![0, 1, 2]);
    }

    #[test]
    fn slide_passes_through_without_memory() {
        let gts = parse("(N)3").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].len(), 1);
    }

    #[test]
    fn merge_includes_unchanged_concatenation() {
        let gts = parse("(M:N)+").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert!(main.iter().any(|e| matches!(e[0], Directive::Memory(_)) && matches!(e[1], Directive::Nop)));
        for e in &main {
            assert_eq!(e.len(), 2);
        }
    }

    #[test]
    fn repetition_concatenates_n_copies() {
        let gts = parse("|M|3").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let (_, main) = expand_gts(&gts, &mut st).unwrap();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].len(), 3);
    }

    #[test]
    fn undefined_variable_is_semantic_error() {
        let gts = parse("M_s=s1+i").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut st = state(&mut rng);
        let err = expand_gts(&gts, &mut st).unwrap_err();
        assert!(matches!(err, GtsError::Semantic(_)));
    }
}
