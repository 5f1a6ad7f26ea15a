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

//! Lexical analyzer.
//!
//! GTS source has a small, flat alphabet, so this lexer dispatches directly
//! on the current character rather than building a transition-table DFA.
//! The external contract is `feed`/`peek`/`consume`/`expect` with bounded
//! lookahead.

use std::collections::VecDeque;

use crate::error::{GtsError, GtsResult, TokenInfo};
use crate::util::Location;

use super::token::{Token, TokenKind};

/// A lexical analyzer with bounded lookahead.
#[derive(Debug)]
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    buffer: VecDeque<Token>,
}

impl Lexer {
    /// Creates a lexer with no input attached.
    pub fn new() -> Self {
        Self {
            chars: Vec::new(),
            pos: 0,
            line: 1,
            column: 1,
            buffer: VecDeque::new(),
        }
    }

    /// Creates a lexer already fed with `text`.
    pub fn from_str(text: &str) -> Self {
        let mut lexer = Self::new();
        lexer.feed(text);
        lexer
    }

    /// Attaches `text` as the input to scan. Resets any prior lookahead.
    pub fn feed(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.pos = 0;
        self.line = 1;
        self.column = 1;
        self.buffer.clear();
    }

    /// Returns the nth upcoming token (0 = next) without consuming it.
    /// Returns the EOF sentinel once input is exhausted.
    pub fn peek(&mut self, n: usize) -> GtsResult<&Token> {
        while self.buffer.len() <= n {
            let tok = self.scan_one()?;
            self.buffer.push_back(tok);
        }
        Ok(&self.buffer[n])
    }

    /// Consumes and returns the next token.
    pub fn consume(&mut self) -> GtsResult<Token> {
        self.peek(0)?;
        Ok(self.buffer.pop_front().expect("peek(0) always fills the buffer"))
    }

    /// Consumes the next token if it matches `kind`, else fails with a
    /// [`GtsError::Syntax`].
    pub fn expect(&mut self, kind: TokenKind) -> GtsResult<Token> {
        if self.peek(0)?.kind == kind {
            self.consume()
        } else {
            let found = self.peek(0)?.clone();
            Err(GtsError::Syntax {
                expected: kind.to_string(),
                found: TokenInfo { text: found.text.clone(), loc: found.loc },
                loc: found.loc,
            })
        }
    }

    fn here(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn scan_one(&mut self) -> GtsResult<Token> {
        self.skip_whitespace();
        let loc = self.here();

        let Some(c) = self.peek_char() else {
            return Ok(Token::eof(loc));
        };

        if c.is_ascii_digit() {
            return Ok(self.scan_digits(loc));
        }
        if c.is_ascii_alphabetic() {
            return Ok(self.scan_identifier(loc));
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '<' => TokenKind::LAngle,
            '>' => TokenKind::RAngle,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '_' => TokenKind::Underscore,
            '=' => TokenKind::Equals,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '#' => TokenKind::WildcardHash,
            '!' => TokenKind::ShuffleExcl,
            '@' => TokenKind::FuzzOffsetAt,
            '$' => TokenKind::FuzzClDollar,
            '|' => TokenKind::RepetitionPipe,
            _ => return Err(GtsError::Lexical(loc, c)),
        };
        self.bump();
        Ok(Token::new(kind, c.to_string(), loc))
    }

    fn scan_digits(&mut self, loc: Location) -> Token {
        let mut text = String::new();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        let value: i64 = text.parse().expect("scanned only ASCII digits");
        Token::digits(value, text, loc)
    }

    fn scan_identifier(&mut self, loc: Location) -> Token {
        let mut text = String::new();
        text.push(self.bump().unwrap());
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric()) {
            text.push(self.bump().unwrap());
        }
        let kind = if text == "P" {
            TokenKind::PreconditionP
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, text, loc)
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    #[test]
    fn lexer_empty() {
        let mut lex = Lexer::from_str("");
        assert_eq!(lex.consume().unwrap().kind, Eof);
    }

    #[test]
    fn lexer_whitespace_ignored() {
        let mut lex = Lexer::from_str("  \t M  ");
        assert_eq!(lex.consume().unwrap().kind, Identifier);
        assert_eq!(lex.consume().unwrap().kind, Eof);
    }

    #[test]
    fn lexer_precondition_p_is_distinct() {
        let mut lex = Lexer::from_str("P M");
        assert_eq!(lex.consume().unwrap().kind, PreconditionP);
        assert_eq!(lex.consume().unwrap().kind, Identifier);
    }

    #[test]
    fn lexer_digits_value() {
        let mut lex = Lexer::from_str("123");
        let tok = lex.consume().unwrap();
        assert_eq!(tok.kind, Digits);
        assert_eq!(tok.int_value, Some(123));
    }

    #[test]
    fn lexer_punctuation() {
        let mut lex = Lexer::from_str("[]()<>,:_=+-#!@$|");
        let mut kinds = Vec::new();
        loop {
            let t = lex.consume().unwrap();
            if t.kind == Eof {
                break;
            }
            kinds.push(t.kind);
        }

        assert_eq!(kinds, vec![
            LBracket, RBracket, LParen, RParen, LAngle, RAngle, Comma, Colon,
            Underscore, Equals, Plus, Minus, WildcardHash, ShuffleExcl,
            FuzzOffsetAt, FuzzClDollar, RepetitionPipe,
        ]);
    }

    #[test]
    fn lexer_unrecognized_char_is_lexical_error() {
        let mut lex = Lexer::from_str("M & N");
        assert_eq!(lex.consume().unwrap().kind, Identifier);
        let err = lex.consume().unwrap_err();
        assert!(matches!(err, GtsError::Lexical(_, '&')));
    }

    #[test]
    fn lexer_peek_does_not_consume() {
        let mut lex = Lexer::from_str("M A");
        assert_eq!(lex.peek(0).unwrap().kind, Identifier);
        assert_eq!(lex.peek(1).unwrap().kind, Identifier);
        assert_eq!(lex.consume().unwrap().kind, Identifier);
        assert_eq!(lex.consume().unwrap().kind, Identifier);
        assert_eq!(lex.consume().unwrap().kind, Eof);
    }

    #[test]
    fn lexer_expect_mismatch_is_syntax_error() {
        let mut lex = Lexer::from_str("M");
        let err = lex.expect(TokenKind::Digits).unwrap_err();
        assert!(matches!(err, GtsError::Syntax { .. }));
    }

    #[test]
    fn lexer_expect_match_consumes() {
        let mut lex = Lexer::from_str("M");
        let tok = lex.expect(TokenKind::Identifier).unwrap();
        assert_eq!(tok.text, "M");
        assert_eq!(lex.consume().unwrap().kind, Eof);
    }

    #[test]
    fn lexer_identifier_with_digits() {
        let mut lex = Lexer::from_str("s1 tDEFAULT");
        let a = lex.consume().unwrap();
        let b = lex.consume().unwrap();
        assert_eq!(a.text, "s1");
        assert_eq!(b.text, "tDEFAULT");
    }
}
