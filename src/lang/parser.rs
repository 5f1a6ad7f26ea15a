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

//! Recursive-descent parser. See [`super::ast`] for the grammar.
//!
//! Parsing is all-or-nothing: the first mismatch raises a
//! [`GtsError::Syntax`] and nothing is recovered.

use crate::error::{GtsError, GtsResult, TokenInfo};
use crate::util::Location;

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};

/// Parses a complete GTS source string.
pub fn parse(text: &str) -> GtsResult<Gts> {
    if text.is_empty() {
        return Err(GtsError::Semantic("GTS source must be non-empty".into()));
    }
    Parser::new(text).parse_gts()
}

struct RawValue {
    head: RawHead,
    terms: Vec<(Sign, AttrTerm)>,
}

enum RawHead {
    Ident(String),
    Digits(i64),
}

pub struct Parser {
    lexer: Lexer,
}

impl Parser {
    pub fn new(text: &str) -> Self {
        Self { lexer: Lexer::from_str(text) }
    }

    pub fn parse_gts(&mut self) -> GtsResult<Gts> {
        let precondition = if self.lexer.peek(0)?.kind == TokenKind::PreconditionP {
            self.lexer.consume()?;
            self.lexer.expect(TokenKind::LParen)?;
            let expr = self.parse_expression()?;
            self.lexer.expect(TokenKind::RParen)?;
            Some(expr)
        } else {
            None
        };

        let main = self.parse_expression()?;
        self.lexer.expect(TokenKind::Eof)?;

        if main.nodes().is_empty() {
            return Err(GtsError::Semantic("main expression must be non-empty".into()));
        }

        Ok(Gts { precondition, main })
    }

    fn parse_expression(&mut self) -> GtsResult<Expression> {
        let mut nodes = Vec::new();
        while self.can_start_node()? {
            nodes.push(self.parse_node()?);
        }
        Ok(Expression::new(nodes))
    }

    /// Whether the upcoming token can begin a directive or operator. A `|`
    /// begins a repetition only when it is not immediately followed by
    /// `DIGITS`; that shape instead closes an enclosing repetition.
    fn can_start_node(&mut self) -> GtsResult<bool> {
        let tok = self.lexer.peek(0)?.clone();
        Ok(match tok.kind {
            TokenKind::Identifier => matches!(tok.text.as_str(), "M" | "A" | "B" | "S" | "N"),
            TokenKind::LBracket | TokenKind::WildcardHash | TokenKind::LParen | TokenKind::LAngle => true,
            TokenKind::RepetitionPipe => !matches!(self.lexer.peek(1)?.kind, TokenKind::Digits),
            _ => false,
        })
    }

    fn parse_node(&mut self) -> GtsResult<Node> {
        let tok = self.lexer.peek(0)?.clone();
        match tok.kind {
            TokenKind::Identifier => self.parse_directive(),
            TokenKind::LBracket => self.parse_loop(),
            TokenKind::WildcardHash => self.parse_wildcard(),
            TokenKind::LParen => self.parse_paren_op(),
            TokenKind::LAngle => self.parse_fuzz(),
            TokenKind::RepetitionPipe => self.parse_repetition(),
            _ => Err(unexpected(&tok, "a directive or operator")),
        }
    }

    // -- directives ----------------------------------------------------

    fn parse_directive(&mut self) -> GtsResult<Node> {
        let tok = self.lexer.consume()?;
        let loc = tok.loc;
        let directive = match tok.text.as_str() {
            "N" => Directive::Nop,
            "M" => Directive::Memory(self.build_memory(loc)?),
            "A" => Directive::Arithmetic(self.build_arithmetic(loc)?),
            "B" => Directive::Branch(self.build_branch(loc)?),
            "S" => Directive::StoreCondition(self.build_store_condition(loc)?),
            _ => return Err(unexpected(&tok, "M, A, B, S, or N")),
        };
        Ok(Node::Directive(directive))
    }

    fn build_memory(&mut self, loc: Location) -> GtsResult<Memory> {
        let mut m = Memory::default_attrs();
        for (name, raw) in self.parse_optional_attrs()? {
            match name.as_str() {
                "s" => {
                    let ph = placeholder_from_head(&raw.head, PlaceholderKind::Set, loc)?;
                    m.set = SetField::new(ph, AttrExpr { terms: raw.terms });
                }
                "t" => {
                    let ph = placeholder_from_head(&raw.head, PlaceholderKind::Tag, loc)?;
                    m.tag = TagField::new(ph, AttrExpr { terms: raw.terms });
                }
                other => return Err(unknown_attr(other, "M", loc)),
            }
        }
        Ok(m)
    }

    fn build_arithmetic(&mut self, loc: Location) -> GtsResult<Arithmetic> {
        let mut a = Arithmetic::default_attrs();
        for (name, raw) in self.parse_optional_attrs()? {
            match name.as_str() {
                "u" => {
                    let ph = placeholder_from_head(&raw.head, PlaceholderKind::Operand, loc)?;
                    a.u = PlaceholderAttr::new(ph, AttrExpr { terms: raw.terms });
                }
                "v" => {
                    let ph = placeholder_from_head(&raw.head, PlaceholderKind::Operand, loc)?;
                    a.v = PlaceholderAttr::new(ph, AttrExpr { terms: raw.terms });
                }
                other => return Err(unknown_attr(other, "A", loc)),
            }
        }
        Ok(a)
    }

    fn build_branch(&mut self, loc: Location) -> GtsResult<Branch> {
        let mut b = Branch::default_attrs();
        for (name, raw) in self.parse_optional_attrs()? {
            match name.as_str() {
                "c" => {
                    let ph = placeholder_from_head(&raw.head, PlaceholderKind::Condition, loc)?;
                    b.c = PlaceholderAttr::new(ph, AttrExpr { terms: raw.terms });
                }
                "b" => {
                    require_no_terms(&raw, loc)?;
                    b.b = bool_from_head(&raw.head, loc)?;
                }
                "d" => {
                    require_no_terms(&raw, loc)?;
                    let d = int_from_head(&raw.head, loc)?;
                    if d % 4 != 0 {
                        return Err(GtsError::Syntax {
                            expected: "a branch distance that is a multiple of 4".into(),
                            found: TokenInfo { text: d.to_string(), loc },
                            loc,
                        });
                    }
                    b.d = d;
                }
                other => return Err(unknown_attr(other, "B", loc)),
            }
        }
        Ok(b)
    }

    fn build_store_condition(&mut self, loc: Location) -> GtsResult<StoreCondition> {
        let mut s = StoreCondition::default_attrs();
        for (name, raw) in self.parse_optional_attrs()? {
            match name.as_str() {
                "c" => {
                    let ph = placeholder_from_head(&raw.head, PlaceholderKind::Condition, loc)?;
                    s.c = PlaceholderAttr::new(ph, AttrExpr { terms: raw.terms });
                }
                "b" => {
                    require_no_terms(&raw, loc)?;
                    s.b = bool_from_head(&raw.head, loc)?;
                }
                other => return Err(unknown_attr(other, "S", loc)),
            }
        }
        Ok(s)
    }

    fn parse_optional_attrs(&mut self) -> GtsResult<Vec<(String, RawValue)>> {
        if self.lexer.peek(0)?.kind != TokenKind::Underscore {
            return Ok(Vec::new());
        }
        self.lexer.consume()?;

        let mut attrs = Vec::new();
        loop {
            let name_tok = self.lexer.expect(TokenKind::Identifier)?;
            self.lexer.expect(TokenKind::Equals)?;
            let value = self.parse_value()?;

            if attrs.iter().any(|(n, _): &(String, RawValue)| n == &name_tok.text) {
                return Err(GtsError::Syntax {
                    expected: "a unique attribute name".into(),
                    found: TokenInfo { text: name_tok.text.clone(), loc: name_tok.loc },
                    loc: name_tok.loc,
                });
            }
            attrs.push((name_tok.text, value));

            if self.lexer.peek(0)?.kind == TokenKind::Comma {
                self.lexer.consume()?;
                continue;
            }
            break;
        }
        Ok(attrs)
    }

    fn parse_value(&mut self) -> GtsResult<RawValue> {
        let head = if self.lexer.peek(0)?.kind == TokenKind::Digits {
            let tok = self.lexer.consume()?;
            RawHead::Digits(tok.int_value.expect("Digits token carries int_value"))
        } else {
            let tok = self.lexer.expect(TokenKind::Identifier)?;
            RawHead::Ident(tok.text)
        };

        let mut terms = Vec::new();
        loop {
            let sign = match self.lexer.peek(0)?.kind {
                TokenKind::Plus => Sign::Plus,
                TokenKind::Minus => Sign::Minus,
                _ => break,
            };
            self.lexer.consume()?;
            let term = if self.lexer.peek(0)?.kind == TokenKind::Digits {
                let tok = self.lexer.consume()?;
                AttrTerm::Int(tok.int_value.expect("Digits token carries int_value"))
            } else {
                let tok = self.lexer.expect(TokenKind::Identifier)?;
                AttrTerm::Ident(tok.text)
            };
            terms.push((sign, term));
        }
        Ok(RawValue { head, terms })
    }

    // -- operators -------------------------------------------------------

    fn parse_loop(&mut self) -> GtsResult<Node> {
        self.lexer.expect(TokenKind::LBracket)?;
        let body = self.parse_expression()?;
        self.lexer.expect(TokenKind::RBracket)?;
        let n_tok = self.lexer.expect(TokenKind::Digits)?;
        let n = n_tok.int_value.expect("Digits token carries int_value");

        let spec = if self.lexer.peek(0)?.kind == TokenKind::Comma {
            self.lexer.consume()?;
            let step_tok = self.lexer.expect(TokenKind::Digits)?;
            self.lexer.expect(TokenKind::Comma)?;
            let var_tok = self.lexer.expect(TokenKind::Identifier)?;
            LoopSpec::Variable {
                n,
                step: step_tok.int_value.expect("Digits token carries int_value"),
                var: var_tok.text,
            }
        } else {
            LoopSpec::Count(n)
        };

        Ok(Node::Loop(Box::new(body), spec))
    }

    fn parse_wildcard(&mut self) -> GtsResult<Node> {
        self.lexer.expect(TokenKind::WildcardHash)?;
        let tok = self.lexer.expect(TokenKind::Digits)?;
        Ok(Node::Wildcard(tok.int_value.expect("Digits token carries int_value")))
    }

    fn parse_paren_op(&mut self) -> GtsResult<Node> {
        self.lexer.expect(TokenKind::LParen)?;
        let first = self.parse_expression()?;
        let second = if self.lexer.peek(0)?.kind == TokenKind::Colon {
            self.lexer.consume()?;
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.lexer.expect(TokenKind::RParen)?;

        let tok = self.lexer.peek(0)?.clone();
        match tok.kind {
            TokenKind::ShuffleExcl => {
                self.lexer.consume()?;
                require_no_second(&second, tok.loc)?;
                Ok(Node::Shuffle(Box::new(first)))
            }
            TokenKind::Identifier if tok.text == "S" => {
                self.lexer.consume()?;
                require_no_second(&second, tok.loc)?;
                Ok(Node::Subset(Box::new(first)))
            }
            TokenKind::Digits => {
                self.lexer.consume()?;
                require_no_second(&second, tok.loc)?;
                Ok(Node::Slide(Box::new(first), tok.int_value.expect("Digits token carries int_value")))
            }
            TokenKind::Plus => {
                self.lexer.consume()?;
                let second = second.ok_or_else(|| GtsError::Syntax {
                    expected: "a second expression before ':' for merge".into(),
                    found: TokenInfo { text: tok.text.clone(), loc: tok.loc },
                    loc: tok.loc,
                })?;
                Ok(Node::Merge(Box::new(first), Box::new(second)))
            }
            _ => Err(unexpected(&tok, "'!', 'S', a digit count, or '+'")),
        }
    }

    fn parse_fuzz(&mut self) -> GtsResult<Node> {
        self.lexer.expect(TokenKind::LAngle)?;
        let body = self.parse_expression()?;
        self.lexer.expect(TokenKind::RAngle)?;

        let tok = self.lexer.peek(0)?.clone();
        let mode = match tok.kind {
            TokenKind::FuzzOffsetAt => FuzzMode::Offset,
            TokenKind::FuzzClDollar => FuzzMode::CacheLine,
            _ => return Err(unexpected(&tok, "'@' or '$'")),
        };
        self.lexer.consume()?;
        Ok(Node::Fuzz(Box::new(body), mode))
    }

    fn parse_repetition(&mut self) -> GtsResult<Node> {
        self.lexer.expect(TokenKind::RepetitionPipe)?;
        let body = self.parse_expression()?;
        self.lexer.expect(TokenKind::RepetitionPipe)?;
        let tok = self.lexer.expect(TokenKind::Digits)?;
        Ok(Node::Repetition(Box::new(body), tok.int_value.expect("Digits token carries int_value")))
    }
}

// -- shared validation helpers -------------------------------------------

fn placeholder_from_head(head: &RawHead, kind: PlaceholderKind, loc: Location) -> GtsResult<Placeholder> {
    let RawHead::Ident(text) = head else {
        return Err(GtsError::Syntax {
            expected: format!("a {:?} placeholder", kind),
            found: TokenInfo { text: "<digits>".into(), loc },
            loc,
        });
    };
    let letter = kind.letter();
    let rest = text.strip_prefix(letter).ok_or_else(|| GtsError::Syntax {
        expected: format!("a placeholder beginning with '{letter}'"),
        found: TokenInfo { text: text.clone(), loc },
        loc,
    })?;

    let name = if rest == "DEFAULT" {
        PlaceholderName::Default
    } else if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
        PlaceholderName::Numbered(rest.parse().expect("validated as all-ASCII-digit"))
    } else {
        return Err(GtsError::Syntax {
            expected: format!("'{letter}DEFAULT' or '{letter}' followed by digits"),
            found: TokenInfo { text: text.clone(), loc },
            loc,
        });
    };
    Ok(Placeholder::new(kind, name))
}

fn bool_from_head(head: &RawHead, loc: Location) -> GtsResult<bool> {
    match head {
        RawHead::Ident(s) if s == "T" => Ok(true),
        RawHead::Ident(s) if s == "F" => Ok(false),
        _ => Err(GtsError::Syntax {
            expected: "'T' or 'F'".into(),
            found: TokenInfo { text: head_text(head), loc },
            loc,
        }),
    }
}

fn int_from_head(head: &RawHead, loc: Location) -> GtsResult<i64> {
    match head {
        RawHead::Digits(n) => Ok(*n),
        _ => Err(GtsError::Syntax {
            expected: "a decimal integer".into(),
            found: TokenInfo { text: head_text(head), loc },
            loc,
        }),
    }
}

fn require_no_terms(raw: &RawValue, loc: Location) -> GtsResult<()> {
    if raw.terms.is_empty() {
        Ok(())
    } else {
        Err(GtsError::Syntax {
            expected: "a bare literal with no arithmetic tail".into(),
            found: TokenInfo { text: head_text(&raw.head), loc },
            loc,
        })
    }
}

fn require_no_second(second: &Option<Expression>, loc: Location) -> GtsResult<()> {
    if second.is_some() {
        Err(GtsError::Syntax {
            expected: "no second ':'-separated expression for this operator".into(),
            found: TokenInfo { text: ":".into(), loc },
            loc,
        })
    } else {
        Ok(())
    }
}

fn head_text(head: &RawHead) -> String {
    match head {
        RawHead::Ident(s) => s.clone(),
        RawHead::Digits(n) => n.to_string(),
    }
}

fn unknown_attr(name: &str, directive: &str, loc: Location) -> GtsError {
    GtsError::Syntax {
        expected: format!("a legal attribute name for {directive}"),
        found: TokenInfo { text: name.into(), loc },
        loc,
    }
}

fn unexpected(tok: &Token, expected: &str) -> GtsError {
    GtsError::Syntax {
        expected: expected.into(),
        found: TokenInfo { text: tok.text.clone(), loc: tok.loc },
        loc: tok.loc,
    }
}
