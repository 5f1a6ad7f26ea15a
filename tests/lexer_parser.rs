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

//! Property 1: for a closed set of well-formed GTS strings, parsing must
//! succeed and the pretty-printed AST must equal the canonical reference
//! form — and re-parsing that canonical form must reproduce it exactly,
//! so the grammar's `Display` impl really is a fixed point, not merely a
//! plausible-looking string.

use gts::lang::parser::parse;

const SCENARIOS: &[(&str, &str)] = &[
    ("M", "M_s=sDEFAULT,t=tDEFAULT"),
    ("[M]3", "[M_s=sDEFAULT,t=tDEFAULT]3"),
    ("M_s=s1+i", "M_s=s1+i,t=tDEFAULT"),
    ("<M>@", "<M_s=sDEFAULT,t=tDEFAULT>@"),
    ("<M M>$", "<M_s=sDEFAULT,t=tDEFAULT M_s=sDEFAULT,t=tDEFAULT>$"),
    ("(M)!", "(M_s=sDEFAULT,t=tDEFAULT)!"),
    ("(M)S", "(M_s=sDEFAULT,t=tDEFAULT)S"),
    ("(M)3", "(M_s=sDEFAULT,t=tDEFAULT)3"),
    ("(M:N)+", "(M_s=sDEFAULT,t=tDEFAULT:N)+"),
    ("|M|3", "|M_s=sDEFAULT,t=tDEFAULT|3"),
    ("P(N)M", "P(N)M_s=sDEFAULT,t=tDEFAULT"),
    ("A_u=o1,v=o2+3", "A_u=o1,v=o2+3"),
    ("B_d=8", "B_c=cDEFAULT,b=T,d=8"),
];

#[test]
fn canonical_forms_round_trip() {
    for (input, canonical) in SCENARIOS {
        let gts = parse(input).unwrap_or_else(|e| panic!("failed to parse {input:?}: {e}"));
        assert_eq!(&gts.to_string(), canonical, "pretty-print mismatch for input {input:?}");

        let reparsed = parse(canonical).unwrap_or_else(|e| panic!("failed to re-parse canonical {canonical:?}: {e}"));
        assert_eq!(&reparsed.to_string(), canonical, "canonical form {canonical:?} is not a fixed point");
    }
}

#[test]
fn whitespace_between_tokens_is_ignored() {
    let spaced = parse(" M ").unwrap();
    let tight = parse("M").unwrap();
    assert_eq!(spaced.to_string(), tight.to_string());
}

#[test]
fn empty_source_is_rejected() {
    assert!(parse("").is_err());
}
