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

//! The code generator's recoverable failure mode.
//!
//! A computed set/tag index that falls outside its pool, or collides with
//! one already taken, does not indicate a malformed testcase — it means
//! this particular draw of random placeholder values was unlucky. The
//! driver retries the whole experiment with fresh randomness, bounded at 3
//! attempts, before giving up and surfacing [`GtsError::CodegenOffset`].

use thiserror::Error;

use crate::error::GtsError;

/// A set/tag offset fell outside its pool or collided with a value already
/// taken by an earlier directive in the same experiment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct OffsetConflict(pub String);

impl OffsetConflict {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<OffsetConflict> for GtsError {
    fn from(e: OffsetConflict) -> Self {
        GtsError::CodegenOffset(e.0)
    }
}

pub type CodegenResult<T> = Result<T, OffsetConflict>;
