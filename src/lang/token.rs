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

//! Lexical tokens.

use std::fmt::{self, Display, Formatter};

use crate::util::Location;

/// The kind of a lexical token
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// `P` — introduces an optional precondition expression.
    PreconditionP,

    /// `(`
    LParen,

    /// `)`
    RParen,

    /// `[`
    LBracket,

    /// `]`
    RBracket,

    /// `<`
    LAngle,

    /// `>`
    RAngle,

    /// `,`
    Comma,

    /// `:`
    Colon,

    /// `_`
    Underscore,

    /// `=`
    Equals,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// A maximal run of decimal digits.
    Digits,

    /// `[A-Za-z][A-Za-z0-9]*`, except the single letter `P` (see
    /// [`TokenKind::PreconditionP`]).
    Identifier,

    /// `#` — wildcard operator.
    WildcardHash,

    /// `!` — shuffle operator.
    ShuffleExcl,

    /// `@` — fuzz-offset operator.
    FuzzOffsetAt,

    /// `$` — fuzz-cache-line operator.
    FuzzClDollar,

    /// `|` — repetition operator (also closes a repetition).
    RepetitionPipe,

    /// End of source.
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        use TokenKind::*;
        let s = match self {
            PreconditionP  => "P",
            LParen         => "(",
            RParen         => ")",
            LBracket       => "[",
            RBracket       => "]",
            LAngle         => "<",
            RAngle         => ">",
            Comma          => ",",
            Colon          => ":",
            Underscore     => "_",
            Equals         => "=",
            Plus           => "+",
            Minus          => "-",
            Digits         => "<digits>",
            Identifier     => "<identifier>",
            WildcardHash   => "#",
            ShuffleExcl    => "!",
            FuzzOffsetAt   => "@",
            FuzzClDollar   => "$",
            RepetitionPipe => "|",
            Eof            => "<eof>",
        };
        f.write_str(s)
    }
}

/// A lexical token: `(kind, value, position)`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,

    /// The verbatim source text of the token.
    pub text: String,

    /// The parsed integer value, present only for [`TokenKind::Digits`].
    pub int_value: Option<i64>,

    /// The position at which the token begins.
    pub loc: Location,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, loc: Location) -> Self {
        Self { kind, text: text.into(), int_value: None, loc }
    }

    pub fn digits(value: i64, text: impl Into<String>, loc: Location) -> Self {
        Self { kind: TokenKind::Digits, text: text.into(), int_value: Some(value), loc }
    }

    pub fn eof(loc: Location) -> Self {
        Self::new(TokenKind::Eof, "", loc)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Digits | TokenKind::Identifier => write!(f, "{}", self.text),
            _ => write!(f, "{}", self.kind),
        }
    }
}
