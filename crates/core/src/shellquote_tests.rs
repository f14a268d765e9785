// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

/// Reverse of POSIX single-quote semantics, used to check the quoting law
/// without spawning a shell. Understands exactly the sequences `sh_quote`
/// emits: quoted spans and the `\'` escape between them.
fn sh_unquote(s: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = s.chars().peekable();
    loop {
        match chars.next() {
            None => return Some(out),
            Some('\'') => {
                // quoted span runs to the next quote
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => out.push(c),
                        None => return None, // unterminated
                    }
                }
            }
            Some('\\') => match chars.next() {
                Some(c) => out.push(c),
                None => return None,
            },
            Some(_) => return None, // bare unquoted text never emitted
        }
    }
}

#[test]
fn plain_text_is_wrapped() {
    assert_eq!(sh_quote("echo hello"), "'echo hello'");
}

#[test]
fn embedded_quote_is_escaped() {
    assert_eq!(sh_quote("it's"), "'it'\\''s'");
}

#[test]
fn empty_string_stays_one_word() {
    assert_eq!(sh_quote(""), "''");
}

#[test]
fn dollar_and_backtick_are_inert() {
    // Inside single quotes these have no meaning; they pass through verbatim.
    assert_eq!(sh_quote("$HOME `id`"), "'$HOME `id`'");
}

proptest! {
    #[test]
    fn quote_then_unquote_is_identity(s in "\\PC*") {
        prop_assert_eq!(sh_unquote(&sh_quote(&s)), Some(s));
    }

    #[test]
    fn nested_quoting_unwraps_twice(s in "[ -~]{0,40}") {
        let once = sh_quote(&s);
        let twice = sh_quote(&once);
        let outer = sh_unquote(&twice);
        prop_assert_eq!(outer.as_deref(), Some(once.as_str()));
        prop_assert_eq!(outer.and_then(|o| sh_unquote(&o)), Some(s));
    }
}
