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

//! The code generator: turns an [`Experiment`] into assembly
//! text plus the register-contents JSON the analyzer later consumes.

use std::collections::{HashMap, HashSet};

use rand::RngCore;

use crate::error::{GtsError, GtsResult};
use crate::lang::ast::{Directive, Memory, PlaceholderAttr};
use crate::lang::expand::Experiment;

use super::error::OffsetConflict;
use super::pool::Pool;
use super::state::{DeterministicState, RegisterContents};
use super::target::Target;

/// Which instruction stream a line of emitted text belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Destination {
    Setup,
    Precondition,
    Main,
}

/// The output of generating one experiment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub setup_text: String,
    pub main_text: String,
    pub register_contents: RegisterContents,
}

/// Holds all code generator state across the directives of one experiment,
/// and optionally across several experiments in deterministic mode.
pub struct CodeGenerator<'t, 'r, T: Target> {
    target: &'t T,
    rng: &'r mut dyn RngCore,

    pool_sets: Pool,
    pool_tags: Pool,
    pool_register: Vec<String>,

    table_set_name_to_set_no: HashMap<String, i64>,
    table_tag_name_to_tag_no: HashMap<String, i64>,
    table_operand_name_to_value: HashMap<String, u64>,
    table_condition_name_to_stored_operand_offset: HashMap<String, i64>,
    table_value_to_reg: HashMap<u64, String>,

    store_base_register: String,
    store_base_address: i64,
    store_reserved_sets: HashSet<i64>,
    store_reserved_tags: HashSet<i64>,
    store_next_offset: i64,

    destination: Destination,
    code_setup: Vec<String>,
    code_precondition: Vec<String>,
    code_main: Vec<String>,
}

impl<'t, 'r, T: Target> CodeGenerator<'t, 'r, T> {
    /// Builds a fresh, non-deterministic generator: pools span the full
    /// target layout and a random store base address is drawn immediately.
    pub fn new(target: &'t T, rng: &'r mut dyn RngCore) -> GtsResult<Self> {
        let pool_sets = Pool::new(0, target.no_sets());
        let (tag_lower, tag_upper) = target.tag_pool_bounds();
        let pool_tags = Pool::new(tag_lower, tag_upper);
        let mut pool_register = target.registers();
        pool_register.reverse();

        let mut gen = Self {
            target,
            rng,
            pool_sets,
            pool_tags,
            pool_register,
            table_set_name_to_set_no: HashMap::new(),
            table_tag_name_to_tag_no: HashMap::new(),
            table_operand_name_to_value: HashMap::new(),
            table_condition_name_to_stored_operand_offset: HashMap::new(),
            table_value_to_reg: HashMap::new(),
            store_base_register: target.store_base_register().to_string(),
            store_base_address: 0,
            store_reserved_sets: HashSet::new(),
            store_reserved_tags: HashSet::new(),
            store_next_offset: 0,
            destination: Destination::Main,
            code_setup: Vec::new(),
            code_precondition: Vec::new(),
            code_main: Vec::new(),
        };
        gen.draw_store_base_address()?;
        Ok(gen)
    }

    /// Rebuilds a generator from a previously dumped [`DeterministicState`],
    /// pre-consuming the pools and replaying the zero-init store code so
    /// subsequent experiments produce matching addresses.
    pub fn from_state(target: &'t T, rng: &'r mut dyn RngCore, state: DeterministicState) -> GtsResult<Self> {
        let pool_sets = Pool::new(0, target.no_sets());
        let (tag_lower, tag_upper) = target.tag_pool_bounds();
        let pool_tags = Pool::new(tag_lower, tag_upper);
        let mut pool_register = target.registers();
        pool_register.reverse();

        let mut gen = Self {
            target,
            rng,
            pool_sets,
            pool_tags,
            pool_register,
            table_set_name_to_set_no: state.set_name_to_set_no,
            table_tag_name_to_tag_no: state.tag_name_to_tag_no,
            table_operand_name_to_value: state.operand_name_to_value,
            table_condition_name_to_stored_operand_offset: state.condition_name_to_stored_operand_offset,
            table_value_to_reg: HashMap::new(),
            store_base_register: target.store_base_register().to_string(),
            store_base_address: state.store_base_address,
            store_reserved_sets: HashSet::new(),
            store_reserved_tags: HashSet::new(),
            store_next_offset: 0,
            destination: Destination::Main,
            code_setup: Vec::new(),
            code_precondition: Vec::new(),
            code_main: Vec::new(),
        };

        for &set_no in gen.table_set_name_to_set_no.values() {
            gen.pool_sets.pop(set_no);
        }
        for &tag_no in gen.table_tag_name_to_tag_no.values() {
            gen.pool_tags.pop(tag_no);
        }
        gen.restore_store_base_address()?;
        Ok(gen)
    }

    /// Clears the per-experiment code buffers. Placeholder mapping tables
    /// and pools survive, matching the Python original's
    /// `reset(reset_mappings=False)` used between experiments of a
    /// deterministic run.
    pub fn reset_buffers(&mut self) {
        self.code_setup.clear();
        self.code_precondition.clear();
        self.code_main.clear();
        self.table_value_to_reg.clear();
        self.destination = Destination::Main;
    }

    pub fn set_destination(&mut self, destination: Destination) {
        self.destination = destination;
    }

    /// Snapshots the placeholder mapping tables for deterministic replay.
    pub fn dump_state(&self) -> DeterministicState {
        DeterministicState {
            set_name_to_set_no: self.table_set_name_to_set_no.clone(),
            tag_name_to_tag_no: self.table_tag_name_to_tag_no.clone(),
            operand_name_to_value: self.table_operand_name_to_value.clone(),
            condition_name_to_stored_operand_offset: self.table_condition_name_to_stored_operand_offset.clone(),
            store_base_address: self.store_base_address,
        }
    }

    fn draw_store_base_address(&mut self) -> GtsResult<()> {
        let store_set = self
            .pool_sets
            .poprand(self.rng)
            .ok_or_else(|| GtsError::PoolExhaustion { pool: "set".into(), capacity: self.pool_sets.capacity() })?;
        let store_tag = self
            .pool_tags
            .poprand(self.rng)
            .ok_or_else(|| GtsError::PoolExhaustion { pool: "tag".into(), capacity: self.pool_tags.capacity() })?;
        self.store_reserved_sets.insert(store_set);
        self.store_reserved_tags.insert(store_tag);
        self.store_base_address = (store_set << self.target.shift_set()) | (store_tag << self.target.shift_tag());
        Ok(())
    }

    fn restore_store_base_address(&mut self) -> GtsResult<()> {
        if self.table_condition_name_to_stored_operand_offset.is_empty() {
            return Ok(());
        }
        self.write_setup_store_base_register();
        let offsets: Vec<i64> = self.table_condition_name_to_stored_operand_offset.values().copied().collect();
        for offset in offsets {
            self.write_setup_store_int(offset, 0);
            if offset > self.store_next_offset {
                self.store_next_offset = offset;
            }
        }
        self.store_next_offset += 8;
        Ok(())
    }

    // -- placeholder -> value mapping -----------------------------------

    fn placeholder_to_set(&mut self, name: &str) -> GtsResult<i64> {
        if let Some(&no) = self.table_set_name_to_set_no.get(name) {
            return Ok(no);
        }
        let no = self
            .pool_sets
            .poprand(self.rng)
            .ok_or_else(|| GtsError::PoolExhaustion { pool: "set".into(), capacity: self.pool_sets.capacity() })?;
        self.table_set_name_to_set_no.insert(name.to_string(), no);
        Ok(no)
    }

    fn placeholder_to_tag(&mut self, name: &str) -> GtsResult<i64> {
        if let Some(&no) = self.table_tag_name_to_tag_no.get(name) {
            return Ok(no);
        }
        let no = self
            .pool_tags
            .poprand(self.rng)
            .ok_or_else(|| GtsError::PoolExhaustion { pool: "tag".into(), capacity: self.pool_tags.capacity() })?;
        self.table_tag_name_to_tag_no.insert(name.to_string(), no);
        Ok(no)
    }

    fn placeholder_to_operand_value(&mut self, attr: &PlaceholderAttr) -> u64 {
        let key = attr.placeholder.key();
        if !self.table_operand_name_to_value.contains_key(&key) {
            let value = self.rng.next_u64();
            self.table_operand_name_to_value.insert(key.clone(), value);
        }
        let base = self.table_operand_name_to_value[&key];
        base.wrapping_add(attr.resolved as u64)
    }

    fn placeholder_to_condition_offset(&mut self, name: &str) -> GtsResult<i64> {
        if let Some(&offset) = self.table_condition_name_to_stored_operand_offset.get(name) {
            return Ok(offset);
        }
        let offset = self.assign_stored_value_offset()?;
        self.table_condition_name_to_stored_operand_offset.insert(name.to_string(), offset);
        self.write_setup_store_int(offset, 0);
        Ok(offset)
    }

    fn assign_stored_value_offset(&mut self) -> GtsResult<i64> {
        if self.store_next_offset == 0 {
            self.write_setup_store_base_register();
        }
        let offset = self.store_next_offset;

        let set_no = ((self.store_base_address + offset) & self.set_mask()) >> self.target.shift_set();
        if !self.store_reserved_sets.contains(&set_no) {
            if self.pool_sets.taken(set_no) {
                return Err(OffsetConflict::new("store for branch: set collision with a prior Memory directive").into());
            }
            self.pool_sets.pop(set_no);
            self.store_reserved_sets.insert(set_no);
        }

        let tag_no = ((self.store_base_address + offset) & self.tag_mask()) >> self.target.shift_tag();
        if !self.store_reserved_tags.contains(&tag_no) {
            if self.pool_tags.taken(tag_no) {
                return Err(OffsetConflict::new("store for branch: tag collision with a prior Memory directive").into());
            }
            self.pool_tags.pop(tag_no);
            self.store_reserved_tags.insert(tag_no);
        }

        if offset >= self.target.max_immediate_offset() {
            return Err(GtsError::CodegenOffset("maximum immediate offset exceeded".into()));
        }

        self.store_next_offset += 8;
        Ok(offset)
    }

    fn map_value_to_register(&mut self, value: u64) -> GtsResult<String> {
        if let Some(reg) = self.table_value_to_reg.get(&value) {
            return Ok(reg.clone());
        }
        let reg = self
            .pool_register
            .pop()
            .ok_or_else(|| GtsError::PoolExhaustion { pool: "register".into(), capacity: 0 })?;
        self.table_value_to_reg.insert(value, reg.clone());
        self.write_setup_set_up_register(&reg, value);
        Ok(reg)
    }

    fn set_mask(&self) -> i64 {
        self.target.set_bits().mask() as i64
    }

    fn tag_mask(&self) -> i64 {
        self.target.tag_bits().mask() as i64
    }

    // -- line buffers -----------------------------------------------------

    fn write(&mut self, line: impl Into<String>) {
        let line = format!("\t{}", line.into());
        match self.destination {
            Destination::Setup => self.code_setup.push(line),
            Destination::Precondition => self.code_precondition.push(line),
            Destination::Main => self.code_main.push(line),
        }
    }

    fn write_setup(&mut self, line: impl Into<String>) {
        self.code_setup.push(format!("\t{}", line.into()));
    }

    fn write_setup_set_up_register(&mut self, reg: &str, value: u64) {
        for line in self.target.emit_load_literal(reg, value) {
            self.write_setup(line);
        }
    }

    fn write_setup_store_base_register(&mut self) {
        self.write_setup("// Base address for memory stores");
        let reg = self.store_base_register.clone();
        let addr = self.store_base_address as u64;
        self.write_setup_set_up_register(&reg, addr);
    }

    fn write_setup_store_int(&mut self, offset: i64, value: u64) {
        for line in self.target.emit_store_int(&self.store_base_register.clone(), offset, value) {
            self.write_setup(line);
        }
    }

    // -- directive code generation -----------------------------------------

    pub fn memory_load(&mut self, mem: &Memory) -> GtsResult<()> {
        let set_no = if let Some(override_) = mem.set.override_ {
            let candidate = self.pool_sets.lower() + override_;
            if !self.pool_sets.in_bounds(candidate) {
                return Err(OffsetConflict::new("set override not in bounds").into());
            }
            self.pool_sets.pop(candidate);
            candidate
        } else {
            let base = self.placeholder_to_set(&mem.set.placeholder.key())?;
            let total_offset = mem.set.computed_offset + mem.set.fixed_offset;
            if total_offset != 0 {
                let candidate = base + total_offset;
                if !self.pool_sets.in_bounds(candidate) {
                    return Err(OffsetConflict::new("set offset not in bounds").into());
                }
                self.pool_sets.pop(candidate);
                candidate
            } else {
                base
            }
        };

        let tag_no = {
            let base = self.placeholder_to_tag(&mem.tag.placeholder.key())?;
            if mem.tag.computed_offset != 0 {
                let candidate = base + mem.tag.computed_offset;
                if !self.pool_tags.in_bounds(candidate) {
                    return Err(OffsetConflict::new("tag offset not in bounds").into());
                }
                self.pool_tags.pop(candidate);
                candidate
            } else {
                base
            }
        };

        if mem.offset >= self.target.no_offsets() {
            return Err(GtsError::CodegenOffset("address offset too large".into()));
        }

        let addr: u64 = ((tag_no as u64) << self.target.shift_tag())
            | ((set_no as u64) << self.target.shift_set())
            | ((mem.offset as u64) << self.target.shift_offset());

        let reg = self.map_value_to_register(addr)?;
        let line = self.target.emit_memory_load(&reg);
        self.write(line);
        Ok(())
    }

    pub fn arithmetic(&mut self, u: &PlaceholderAttr, v: &PlaceholderAttr) -> GtsResult<()> {
        let value_u = self.placeholder_to_operand_value(u);
        let value_v = self.placeholder_to_operand_value(v);
        let reg_u = self.map_value_to_register(value_u)?;
        let reg_v = self.map_value_to_register(value_v)?;
        let mnemonic_index = (self.rng.next_u32() % 2) as usize;
        let line = self.target.emit_arithmetic(mnemonic_index, &reg_u, &reg_v);
        self.write(line);
        Ok(())
    }

    pub fn branch(&mut self, c: &PlaceholderAttr, b: bool, d: i64) -> GtsResult<()> {
        let offset = self.placeholder_to_condition_offset(&c.placeholder.key())?;
        let reg = self.store_base_register.clone();
        for line in self.target.emit_branch(&reg, offset, b, d) {
            self.write(line);
        }
        Ok(())
    }

    pub fn store_condition(&mut self, c: &PlaceholderAttr, b: bool) -> GtsResult<()> {
        let offset = self.placeholder_to_condition_offset(&c.placeholder.key())?;
        let value = if b { 0 } else { 1 };
        let reg = self.store_base_register.clone();
        for line in self.target.emit_store_main_int(&reg, offset, value) {
            self.write(line);
        }
        Ok(())
    }

    pub fn nop(&mut self) {
        let line = self.target.emit_nop();
        self.write(line);
    }

    /// Emits one directive to the generator's current destination.
    pub fn directive(&mut self, d: &Directive) -> GtsResult<()> {
        match d {
            Directive::Memory(m) => self.memory_load(m),
            Directive::Arithmetic(a) => self.arithmetic(&a.u, &a.v),
            Directive::Branch(b) => self.branch(&b.c, b.b, b.d),
            Directive::StoreCondition(s) => self.store_condition(&s.c, s.b),
            Directive::Nop => {
                self.nop();
                Ok(())
            }
        }
    }

    /// Generates the full (setup, main, register-contents) triple for one
    /// experiment, preceded by an optional precondition experiment.
    pub fn generate(&mut self, precondition: Option<&Experiment>, main: &Experiment) -> GtsResult<Output> {
        self.reset_buffers();

        self.set_destination(Destination::Precondition);
        if let Some(pre) = precondition {
            for d in pre {
                self.directive(d)?;
            }
        }

        self.set_destination(Destination::Main);
        for d in main {
            self.directive(d)?;
        }

        let setup_text = format!(
            "\t// SETUP\n{}\n\t// PRECONDITION\n{}",
            self.code_setup.join("\n"),
            self.code_precondition.join("\n"),
        );
        let main_text = self.code_main.join("\n");
        let register_contents =
            RegisterContents(self.table_value_to_reg.iter().map(|(&v, r)| (r.clone(), v)).collect());

        Ok(Output { setup_text, main_text, register_contents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ast::{Arithmetic, Memory as MemoryAst, Placeholder, PlaceholderKind};
    use crate::codegen::target::Aarch64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator<'t, 'r>(target: &'t Aarch64, rng: &'r mut StdRng) -> CodeGenerator<'t, 'r, Aarch64> {
        CodeGenerator::new(target, rng).unwrap()
    }

    #[test]
    fn memory_load_emits_ldr_and_setup_register() {
        let target = Aarch64;
        let mut rng = StdRng::seed_from_u64(11);
        let mut gen = generator(&target, &mut rng);

        let mem = MemoryAst::default_attrs();
        let out = gen.generate(None, &vec![Directive::Memory(mem)]).unwrap();

        assert!(out.main_text.contains("ldr x0, ["));
        assert!(out.setup_text.contains("movk"));
        assert_eq!(out.register_contents.0.len(), 1);
    }

    #[test]
    fn arithmetic_reuses_register_for_repeated_operand_value() {
        let target = Aarch64;
        let mut rng = StdRng::seed_from_u64(3);
        let mut gen = generator(&target, &mut rng);

        let same = Placeholder::new(PlaceholderKind::Operand, crate::lang::ast::PlaceholderName::Numbered(1));
        let attr = PlaceholderAttr::new(same, crate::lang::ast::AttrExpr::empty());
        let directive = Directive::Arithmetic(Arithmetic { u: attr.clone(), v: attr });

        let out = gen.generate(None, &vec![directive]).unwrap();
        // u and v resolve to the same operand placeholder, so only one
        // register is reserved even though two operand reads occur.
        assert_eq!(out.register_contents.0.len(), 1);
        assert!(out.main_text.contains("add x0,") || out.main_text.contains("eor x0,"));
    }

    #[test]
    fn distinct_set_placeholders_draw_distinct_sets() {
        let target = Aarch64;
        let mut rng = StdRng::seed_from_u64(9);
        let mut gen = generator(&target, &mut rng);

        let s1 = crate::lang::ast::SetField::new(
            Placeholder::new(PlaceholderKind::Set, crate::lang::ast::PlaceholderName::Numbered(1)),
            crate::lang::ast::AttrExpr::empty(),
        );
        let s2 = crate::lang::ast::SetField::new(
            Placeholder::new(PlaceholderKind::Set, crate::lang::ast::PlaceholderName::Numbered(2)),
            crate::lang::ast::AttrExpr::empty(),
        );
        let tag = crate::lang::ast::TagField::new(
            Placeholder::new(PlaceholderKind::Tag, crate::lang::ast::PlaceholderName::Default),
            crate::lang::ast::AttrExpr::empty(),
        );

        let m1 = MemoryAst { set: s1, tag: tag.clone(), offset: 0 };
        let m2 = MemoryAst { set: s2, tag, offset: 0 };

        gen.generate(None, &vec![Directive::Memory(m1), Directive::Memory(m2)]).unwrap();
        let set1 = gen.table_set_name_to_set_no["s1"];
        let set2 = gen.table_set_name_to_set_no["s2"];
        assert_ne!(set1, set2);
    }

    #[test]
    fn deterministic_state_round_trips_and_preserves_mappings() {
        let target = Aarch64;
        let mut rng = StdRng::seed_from_u64(5);
        let mut gen = generator(&target, &mut rng);
        gen.generate(None, &vec![Directive::Memory(MemoryAst::default_attrs())]).unwrap();
        let state = gen.dump_state();

        let mut rng2 = StdRng::seed_from_u64(99);
        let restored = CodeGenerator::from_state(&target, &mut rng2, state.clone()).unwrap();
        assert_eq!(restored.dump_state(), state);
    }
}
