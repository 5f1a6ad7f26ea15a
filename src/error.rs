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

//! The core error taxonomy
//!
//! Every kind except [`GtsError::CodegenOffset`] is non-recoverable at the
//! core boundary: the CLI prints it and exits nonzero. `CodegenOffset` is the
//! one kind the driver loop catches and retries (bounded at 3 attempts)
//! before it, too, becomes fatal.

use std::fmt;
use thiserror::Error;

use crate::util::Location;

/// A lexical or syntactic error, carrying the offending token's text and the
/// position at which it occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub text: String,
    pub loc: Location,
}

impl fmt::Display for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} at {}", self.text, self.loc)
    }
}

/// The core error taxonomy.
#[derive(Error, Debug)]
pub enum GtsError {
    /// Raised by the lexer: an unrecognized character.
    #[error("lexical error at {0}: unrecognized character {1:?}")]
    Lexical(Location, char),

    /// Raised by the parser or attribute validator: token mismatch.
    #[error("syntax error at {0}: expected {expected}, found {found}")]
    Syntax {
        expected: String,
        found: TokenInfo,
        #[allow(dead_code)]
        loc: Location,
    },

    /// Raised during expansion: unresolved variable, empty expression,
    /// unsupported merge operands.
    #[error("semantic error: {0}")]
    Semantic(String),

    /// Raised by the code generator: a pool ran out of values.
    #[error("pool exhausted: {pool} (capacity {capacity})")]
    PoolExhaustion { pool: String, capacity: usize },

    /// Raised by the code generator: a computed set/tag index fell outside
    /// its pool or collided with one already taken. Recoverable — the driver
    /// retries with fresh randomness up to 3 times.
    #[error("codegen offset conflict: {0}")]
    CodegenOffset(String),

    /// Raised at the I/O or configuration boundary.
    #[error("{0}")]
    Io(String),

    /// Raised while loading or validating a config file.
    #[error("config error: {0}")]
    Config(String),
}

impl GtsError {
    /// Whether the driver should retry the experiment that raised this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GtsError::CodegenOffset(_))
    }
}

impl From<std::io::Error> for GtsError {
    fn from(e: std::io::Error) -> Self {
        GtsError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for GtsError {
    fn from(e: serde_json::Error) -> Self {
        GtsError::Io(format!("JSON error: {e}"))
    }
}

pub type GtsResult<T> = Result<T, GtsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_only_for_codegen_offset() {
        let recoverable = GtsError::CodegenOffset("set".into());
        let fatal = GtsError::Semantic("bad".into());

        assert!(recoverable.is_recoverable());
        assert!(!fatal.is_recoverable());
    }
}
