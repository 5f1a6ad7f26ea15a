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

//! `gts`: a generative testcase toolkit for micro-architectural tests.
//!
//! A small language describes an experiment (a sequence of memory,
//! arithmetic, branch, and condition-store directives) plus operators that
//! expand one description into many concrete experiments. This crate
//! implements the front end that parses and expands that language, the code
//! generator that lowers expanded experiments to AArch64 assembly, and the
//! analyzer that mines constraints and linear relations out of a batch of
//! executed measurements.

pub mod analyzer;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod error;
pub mod lang;
pub mod message;
pub mod util;

/// The program name used in general-origin diagnostics (see [`message::Origin`]).
pub const PROGRAM_NAME: &str = "gts";
