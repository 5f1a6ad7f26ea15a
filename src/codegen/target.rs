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

//! Architecture-specific parameters and assembly emission.
//!
//! A [`Target`] describes the address bit-field layout, the register pool,
//! and the concrete instruction text for each directive. [`Aarch64`] is the
//! reference target; other architectures would implement the same trait.

use crate::lang::expand::BitWidths;

/// A half-open bit range `[lower, upper)` within an address word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BitRange {
    pub lower: u32,
    pub upper: u32,
}

impl BitRange {
    pub const fn new(lower: u32, upper: u32) -> Self {
        Self { lower, upper }
    }

    pub fn width(&self) -> u32 {
        self.upper - self.lower
    }

    pub fn mask(&self) -> u64 {
        ((1u64 << self.width()) - 1) << self.lower
    }
}

/// The text of one emitted assembly line, already indented.
pub type Line = String;

/// An architecture's address layout, register file, and instruction
/// emission rules.
pub trait Target: BitWidths {
    fn offset_bits(&self) -> BitRange;
    fn set_bits(&self) -> BitRange;
    fn tag_bits(&self) -> BitRange;

    /// Maximum immediate offset usable by a store/load instruction
    /// addressing the store-base register.
    fn max_immediate_offset(&self) -> i64;

    /// General-purpose scratch registers, in pool-pop order (the register
    /// returned first is the last element).
    fn registers(&self) -> Vec<String>;

    /// The register reserved to hold the store base address.
    fn store_base_register(&self) -> &str;

    fn no_sets(&self) -> i64 {
        1i64 << self.set_bits().width()
    }

    fn no_tags(&self) -> i64 {
        1i64 << self.tag_bits().width()
    }

    fn no_offsets(&self) -> i64 {
        1i64 << self.offset_bits().width()
    }

    fn shift_set(&self) -> u32 {
        self.set_bits().lower
    }

    fn shift_tag(&self) -> u32 {
        self.tag_bits().lower
    }

    fn shift_offset(&self) -> u32 {
        self.offset_bits().lower
    }

    /// The subrange of the tag pool reserved by this target (reference
    /// target: `[0x8000_0000 >> shift_tag, 0xC000_0000 >> shift_tag)`).
    fn tag_pool_bounds(&self) -> (i64, i64) {
        let shift = self.shift_tag();
        (0x8000_0000i64 >> shift, 0xC000_0000i64 >> shift)
    }

    /// Emits the `movk`-ladder that materializes a 64-bit literal into
    /// `reg`, prefixed by a hex comment.
    fn emit_load_literal(&self, reg: &str, value: u64) -> Vec<Line>;

    fn emit_memory_load(&self, reg_addr: &str) -> Line;

    /// Chooses and emits an `A` directive's two-operand instruction.
    /// `mnemonic_index` selects from [`Target::arithmetic_mnemonics`] and is
    /// supplied by the caller so mnemonic choice draws from the code
    /// generator's own random stream, not the target's.
    fn emit_arithmetic(&self, mnemonic_index: usize, reg_u: &str, reg_v: &str) -> Line;

    fn arithmetic_mnemonics(&self) -> &'static [&'static str];

    fn emit_nop(&self) -> Line;

    fn emit_branch(&self, store_base_reg: &str, operand_offset: i64, bool_immediate: bool, distance: i64) -> Vec<Line>;

    fn emit_store_int(&self, store_base_reg: &str, offset: i64, value: u64) -> Vec<Line>;

    /// Emits a small-integer store directly in the main instruction stream
    /// (used by `S` directives, which store only `0` or `1`).
    fn emit_store_main_int(&self, store_base_reg: &str, offset: i64, value: i64) -> Vec<Line>;
}

/// The reference target: AArch64.
#[derive(Clone, Copy, Debug, Default)]
pub struct Aarch64;

impl BitWidths for Aarch64 {
    fn offset_width(&self) -> u32 {
        self.offset_bits().width()
    }

    fn set_width(&self) -> u32 {
        self.set_bits().width()
    }
}

impl Target for Aarch64 {
    fn offset_bits(&self) -> BitRange {
        BitRange::new(0, 6)
    }

    fn set_bits(&self) -> BitRange {
        BitRange::new(6, 13)
    }

    fn tag_bits(&self) -> BitRange {
        BitRange::new(13, 32)
    }

    fn max_immediate_offset(&self) -> i64 {
        4096
    }

    fn registers(&self) -> Vec<String> {
        (2..=30).map(|i| format!("x{i}")).collect()
    }

    fn store_base_register(&self) -> &str {
        "x1"
    }

    fn emit_load_literal(&self, reg: &str, value: u64) -> Vec<Line> {
        let mut lines = vec![format!("// {reg} = {value:016x}")];
        for shift in (0..64).step_by(16) {
            let lane = (value >> shift) & 0xffff;
            lines.push(format!("movk {reg}, #0x{lane:04x}, lsl #{shift}"));
        }
        lines
    }

    fn emit_memory_load(&self, reg_addr: &str) -> Line {
        format!("ldr x0, [{reg_addr}]")
    }

    fn emit_arithmetic(&self, mnemonic_index: usize, reg_u: &str, reg_v: &str) -> Line {
        let mnemonic = self.arithmetic_mnemonics()[mnemonic_index % self.arithmetic_mnemonics().len()];
        format!("{mnemonic} x0, {reg_u}, {reg_v}")
    }

    fn arithmetic_mnemonics(&self) -> &'static [&'static str] {
        &["add", "eor"]
    }

    fn emit_nop(&self) -> Line {
        "nop".to_string()
    }

    fn emit_branch(&self, store_base_reg: &str, operand_offset: i64, bool_immediate: bool, distance: i64) -> Vec<Line> {
        vec![
            format!("ldr x0, [{store_base_reg}, #{operand_offset}]"),
            format!("cmp x0, #{}", if bool_immediate { 1 } else { 0 }),
            format!("b.ne 0x{distance:x}"),
        ]
    }

    fn emit_store_int(&self, store_base_reg: &str, offset: i64, value: u64) -> Vec<Line> {
        let mut lines = vec![format!(
            "// MEM[{store_base_reg} + {offset}] =LONG= 0x{value:016x}"
        )];
        lines.extend(self.emit_load_literal("x0", value));
        lines.push(format!("str x0, [{store_base_reg}, #{offset}]"));
        lines.push("mov x0, #0".to_string());
        lines
    }

    fn emit_store_main_int(&self, store_base_reg: &str, offset: i64, value: i64) -> Vec<Line> {
        vec![
            format!("mov x0, #{value}"),
            format!("str x0, [{store_base_reg}, #{offset}]"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aarch64_bit_widths_match_reference_layout() {
        let t = Aarch64;
        assert_eq!(t.offset_width(), 6);
        assert_eq!(t.set_width(), 7);
        assert_eq!(t.tag_bits().width(), 19);
    }

    #[test]
    fn aarch64_pool_sizes() {
        let t = Aarch64;
        assert_eq!(t.no_sets(), 128);
        assert_eq!(t.no_offsets(), 64);
    }

    #[test]
    fn aarch64_tag_pool_bounds_match_reference_window() {
        let t = Aarch64;
        let (lower, upper) = t.tag_pool_bounds();
        assert_eq!(lower, 0x8000_0000i64 >> t.shift_tag());
        assert_eq!(upper, 0xC000_0000i64 >> t.shift_tag());
    }

    #[test]
    fn aarch64_registers_list_is_x2_through_x30() {
        let regs = Aarch64.registers();
        assert_eq!(regs.first().unwrap(), "x2");
        assert_eq!(regs.last().unwrap(), "x30");
        assert_eq!(regs.len(), 29);
    }

    #[test]
    fn aarch64_emit_load_literal_has_four_movk_lines_plus_comment() {
        let lines = Aarch64.emit_load_literal("x5", 0x1122_3344_5566_7788);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("//"));
        assert_eq!(lines[1], "movk x5, #0x7788, lsl #0");
        assert_eq!(lines[4], "movk x5, #0x1122, lsl #48");
    }
}
