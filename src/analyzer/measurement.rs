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

//! Classified measurements
//!
//! A measurement is an immutable record produced by some upstream executor
//! run; the analyzer only ever reads its final register contents.

use std::fs;
use std::path::Path;

use crate::codegen::state::RegisterContents;
use crate::error::GtsResult;

/// An immutable measurement exposing the final register mapping captured
/// for one executed experiment.
pub trait ClassifiedMeasurement {
    fn register_contents(&self) -> &RegisterContents;
}

/// A measurement backed by an in-memory register map, typically loaded
/// from a `registers.json` artifact written by the code generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapMeasurement {
    contents: RegisterContents,
}

impl MapMeasurement {
    pub fn new(contents: RegisterContents) -> Self {
        Self { contents }
    }

    /// Reads a `registers.json` file as produced by the code generator.
    pub fn from_json_file(path: &Path) -> GtsResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self { contents: RegisterContents::from_json(&text)? })
    }
}

impl ClassifiedMeasurement for MapMeasurement {
    fn register_contents(&self) -> &RegisterContents {
        &self.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn register_contents_exposes_the_stored_map() {
        let mut map = HashMap::new();
        map.insert("x5".to_string(), 0xDEAD_u64);
        let m = MapMeasurement::new(RegisterContents(map));
        assert_eq!(m.register_contents().get("x5"), Some(0xDEAD));
    }
}
