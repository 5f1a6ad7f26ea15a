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

//! JSON-serializable code generator state

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::GtsResult;

/// The four placeholder mapping tables plus the store base address, as
/// needed to replay a code generator's allocations across experiments.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeterministicState {
    pub set_name_to_set_no: HashMap<String, i64>,
    pub tag_name_to_tag_no: HashMap<String, i64>,
    pub operand_name_to_value: HashMap<String, u64>,
    pub condition_name_to_stored_operand_offset: HashMap<String, i64>,
    pub store_base_address: i64,
}

impl DeterministicState {
    pub fn to_json(&self) -> GtsResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> GtsResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// The final register-name to 64-bit-value mapping for one generated
/// experiment, exposed to the analyzer as `register_contents()`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterContents(pub HashMap<String, u64>);

impl RegisterContents {
    pub fn to_json(&self) -> GtsResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn from_json(text: &str) -> GtsResult<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    pub fn get(&self, register: &str) -> Option<u64> {
        self.0.get(register).copied()
    }
}
