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

//! Abstract syntax tree for the testcase description language.
//!
//! Grammar (see the parser for the full recursive-descent implementation):
//!
//! ```text
//! gts        := ('P' '(' expression ')')? expression EOF
//! expression := ( directive | operator )*
//! directive  := 'A' attrs? | 'B' attrs? | 'S' attrs? | 'M' attrs? | 'N'
//! attrs      := '_' IDENT '=' value (',' IDENT '=' value)*
//! value      := (IDENT|DIGITS) ( ('+'|'-') (IDENT|DIGITS) )*
//! operator   := loop | wildcard | paren_op | fuzz | repetition
//! loop       := '[' expression ']' DIGITS (',' DIGITS ',' IDENT)?
//! wildcard   := '#' DIGITS
//! paren_op   := '(' expression (':' expression)? ')'
//!               ( '!' | 'S' | DIGITS | '+' )
//! fuzz       := '<' expression '>' ( '@' | '$' )
//! repetition := '|' expression '|' DIGITS
//! ```

use std::fmt::{self, Display, Formatter};

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// The four families of placeholder, selected by the attribute that carries
/// it (`s` → set, `t` → tag, `u`/`v` → operand, `c` → condition).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PlaceholderKind {
    Set,
    Tag,
    Operand,
    Condition,
}

impl PlaceholderKind {
    pub fn letter(self) -> char {
        match self {
            PlaceholderKind::Set => 's',
            PlaceholderKind::Tag => 't',
            PlaceholderKind::Operand => 'o',
            PlaceholderKind::Condition => 'c',
        }
    }
}

/// The name half of a placeholder: either a number or the literal `DEFAULT`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PlaceholderName {
    Numbered(u32),
    Default,
}

impl Display for PlaceholderName {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            PlaceholderName::Numbered(n) => write!(f, "{n}"),
            PlaceholderName::Default => write!(f, "DEFAULT"),
        }
    }
}

/// A symbolic placeholder, e.g. `s1`, `tDEFAULT`, `o3`, `c4`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub name: PlaceholderName,
}

impl Placeholder {
    pub fn new(kind: PlaceholderKind, name: PlaceholderName) -> Self {
        Self { kind, name }
    }

    pub fn default_of(kind: PlaceholderKind) -> Self {
        Self::new(kind, PlaceholderName::Default)
    }

    /// The identity used as a key in the code generator's mapping tables:
    /// distinguishes `s1` from `t1` even though both print a `1`.
    pub fn key(&self) -> String {
        format!("{}{}", self.kind.letter(), self.name)
    }
}

impl Display for Placeholder {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}{}", self.kind.letter(), self.name)
    }
}

// ---------------------------------------------------------------------------
// Attribute arithmetic
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Sign {
    Plus,
    Minus,
}

impl Display for Sign {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Sign::Plus => "+",
            Sign::Minus => "-",
        })
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum AttrTerm {
    Ident(String),
    Int(i64),
}

impl Display for AttrTerm {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            AttrTerm::Ident(s) => f.write_str(s),
            AttrTerm::Int(n) => write!(f, "{n}"),
        }
    }
}

/// The arithmetic tail of an attribute value: zero or more signed terms
/// added to whatever base value the attribute's placeholder resolves to.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct AttrExpr {
    pub terms: Vec<(Sign, AttrTerm)>,
}

impl AttrExpr {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sums the expression, resolving identifiers through `lookup`. Returns
    /// the unresolved identifier's name on failure.
    pub fn resolve(&self, lookup: impl Fn(&str) -> Option<i64>) -> Result<i64, String> {
        let mut sum = 0i64;
        for (sign, term) in &self.terms {
            let value = match term {
                AttrTerm::Int(n) => *n,
                AttrTerm::Ident(name) => {
                    lookup(name).ok_or_else(|| name.clone())?
                }
            };
            sum += match sign {
                Sign::Plus => value,
                Sign::Minus => -value,
            };
        }
        Ok(sum)
    }
}

impl Display for AttrExpr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for (sign, term) in &self.terms {
            write!(f, "{sign}{term}")?;
        }
        Ok(())
    }
}

/// A placeholder paired with its (possibly empty) arithmetic tail, used by
/// the `u`/`v`/`c` attributes. The `M` directive uses the richer
/// [`SetField`]/[`TagField`] instead, because its placeholders additionally
/// carry slide/fuzz mutation state.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PlaceholderAttr {
    pub placeholder: Placeholder,
    pub expr: AttrExpr,
    /// The sum of `expr`, resolved against the enclosing scope during
    /// expansion. `0` until expansion visits this attribute.
    pub resolved: i64,
}

impl PlaceholderAttr {
    pub fn new(placeholder: Placeholder, expr: AttrExpr) -> Self {
        Self { placeholder, expr, resolved: 0 }
    }
}

impl Display for PlaceholderAttr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}{}", self.placeholder, self.expr)
    }
}

// ---------------------------------------------------------------------------
// Directives
// ---------------------------------------------------------------------------

/// The `s` attribute of a memory directive. `computed_offset` is the
/// resolved value of `expr` once expansion enters a concrete scope;
/// `fixed_offset` is added in place by the slide operator; `override_`, if
/// set by the cache-line fuzz operator, replaces both.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SetField {
    pub placeholder: Placeholder,
    pub expr: AttrExpr,
    pub computed_offset: i64,
    pub fixed_offset: i64,
    pub override_: Option<i64>,
}

impl SetField {
    pub fn new(placeholder: Placeholder, expr: AttrExpr) -> Self {
        Self { placeholder, expr, computed_offset: 0, fixed_offset: 0, override_: None }
    }
}

impl Display for SetField {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}{}", self.placeholder, self.expr)
    }
}

/// The `t` attribute of a memory directive.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TagField {
    pub placeholder: Placeholder,
    pub expr: AttrExpr,
    pub computed_offset: i64,
}

impl TagField {
    pub fn new(placeholder: Placeholder, expr: AttrExpr) -> Self {
        Self { placeholder, expr, computed_offset: 0 }
    }
}

impl Display for TagField {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}{}", self.placeholder, self.expr)
    }
}

/// Memory directive `M`: a load whose address is steered by `set`/`tag`
/// placeholders plus a cache-line offset mutated only by the offset-mode
/// fuzz operator.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Memory {
    pub set: SetField,
    pub tag: TagField,
    /// The low, offset-within-cache-line bits of the address; `0` unless
    /// overridden by `<E>@`.
    pub offset: i64,
}

impl Memory {
    pub fn default_attrs() -> Self {
        Self {
            set: SetField::new(Placeholder::default_of(PlaceholderKind::Set), AttrExpr::empty()),
            tag: TagField::new(Placeholder::default_of(PlaceholderKind::Tag), AttrExpr::empty()),
            offset: 0,
        }
    }
}

impl Display for Memory {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "M_s={},t={}", self.set, self.tag)
    }
}

/// Arithmetic directive `A`: combines two operand registers.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Arithmetic {
    pub u: PlaceholderAttr,
    pub v: PlaceholderAttr,
}

impl Arithmetic {
    pub fn default_attrs() -> Self {
        Self {
            u: PlaceholderAttr::new(Placeholder::default_of(PlaceholderKind::Operand), AttrExpr::empty()),
            v: PlaceholderAttr::new(Placeholder::default_of(PlaceholderKind::Operand), AttrExpr::empty()),
        }
    }
}

impl Display for Arithmetic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "A_u={},v={}", self.u, self.v)
    }
}

/// Branch directive `B`: a conditional branch guarded by a stored boolean.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Branch {
    pub c: PlaceholderAttr,
    pub b: bool,
    pub d: i64,
}

impl Branch {
    pub fn default_attrs() -> Self {
        Self {
            c: PlaceholderAttr::new(Placeholder::default_of(PlaceholderKind::Condition), AttrExpr::empty()),
            b: true,
            d: 12,
        }
    }
}

impl Display for Branch {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "B_c={},b={},d={}", self.c, if self.b { "T" } else { "F" }, self.d)
    }
}

/// Store-condition directive `S`: writes a named boolean slot.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StoreCondition {
    pub c: PlaceholderAttr,
    pub b: bool,
}

impl StoreCondition {
    pub fn default_attrs() -> Self {
        Self {
            c: PlaceholderAttr::new(Placeholder::default_of(PlaceholderKind::Condition), AttrExpr::empty()),
            b: true,
        }
    }
}

impl Display for StoreCondition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "S_c={},b={}", self.c, if self.b { "T" } else { "F" })
    }
}

/// A leaf operation: one generated instruction.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Directive {
    Memory(Memory),
    Arithmetic(Arithmetic),
    Branch(Branch),
    StoreCondition(StoreCondition),
    Nop,
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Directive::Memory(m) => m.fmt(f),
            Directive::Arithmetic(a) => a.fmt(f),
            Directive::Branch(b) => b.fmt(f),
            Directive::StoreCondition(s) => s.fmt(f),
            Directive::Nop => f.write_str("N"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// The binding form of a loop operator.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum LoopSpec {
    /// `[E]n` — repeat the body's expansion `n` times with no binding.
    Count(i64),
    /// `[E]n,step,var` — bind `var` to `0, step, 2*step, ...` while it
    /// remains `< n`.
    Variable { n: i64, step: i64, var: String },
}

/// Which bit field a fuzz operator enumerates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FuzzMode {
    /// `<E>@` — the 6-bit cache-line offset.
    Offset,
    /// `<E>$` — the 7-bit set index.
    CacheLine,
}

impl FuzzMode {
    /// Width in bits of the fuzzed field.
    pub fn width(self) -> u32 {
        match self {
            FuzzMode::Offset => 6,
            FuzzMode::CacheLine => 7,
        }
    }
}

/// One element of an [`Expression`]: either a directive or an operator
/// combining a nested sub-expression.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Node {
    Directive(Directive),
    Loop(Box<Expression>, LoopSpec),
    Wildcard(i64),
    Shuffle(Box<Expression>),
    Subset(Box<Expression>),
    Slide(Box<Expression>, i64),
    Merge(Box<Expression>, Box<Expression>),
    Fuzz(Box<Expression>, FuzzMode),
    Repetition(Box<Expression>, i64),
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Node::Directive(d) => d.fmt(f),
            Node::Loop(e, LoopSpec::Count(n)) => write!(f, "[{e}]{n}"),
            Node::Loop(e, LoopSpec::Variable { n, step, var }) => {
                write!(f, "[{e}]{n},{step},{var}")
            }
            Node::Wildcard(k) => write!(f, "#{k}"),
            Node::Shuffle(e) => write!(f, "({e})!"),
            Node::Subset(e) => write!(f, "({e})S"),
            Node::Slide(e, n) => write!(f, "({e}){n}"),
            Node::Merge(a, b) => write!(f, "({a}:{b})+"),
            Node::Fuzz(e, FuzzMode::Offset) => write!(f, "<{e}>@"),
            Node::Fuzz(e, FuzzMode::CacheLine) => write!(f, "<{e}>$"),
            Node::Repetition(e, n) => write!(f, "|{e}|{n}"),
        }
    }
}

/// An ordered sequence of directives and operators.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Expression(pub Vec<Node>);

impl Expression {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self(nodes)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.0
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for node in &self.0 {
            node.fmt(f)?;
        }
        Ok(())
    }
}

/// A complete testcase description: an optional precondition expression
/// plus the mandatory main expression.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Gts {
    pub precondition: Option<Expression>,
    pub main: Expression,
}

impl Display for Gts {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let Some(pre) = &self.precondition {
            write!(f, "P({pre})")?;
        }
        self.main.fmt(f)
    }
}
