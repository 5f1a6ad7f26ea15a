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

//! Resource allocation and assembly emission for expanded experiments
//!

pub mod emit;
pub mod error;
pub mod pool;
pub mod state;
pub mod target;

pub use emit::{CodeGenerator, Destination, Output};
pub use error::{CodegenResult, OffsetConflict};
pub use pool::Pool;
pub use state::{DeterministicState, RegisterContents};
pub use target::{Aarch64, Target};
