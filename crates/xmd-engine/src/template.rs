//! `{{name}}` / `${name}` interpolation over already-rendered text (§4.6).
//!
//! This is a separate, much smaller pass than the expression parser: no
//! nesting, no operators, just an identifier between two literal brace
//! sequences.

use xmd_core::Store;

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Scan `text` for occurrences of `open`/`close` wrapping a bare
/// identifier, replacing each with `resolve(name)`. `resolve` returning
/// `None` means "leave the original sequence untouched" (the native
/// `${…}` behavior); returning `Some(String::new())` matches legacy
/// `{{…}}`'s "missing ⇒ empty string".
fn substitute(text: &str, open: &str, close: &str, mut resolve: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text;
    let mut rest = bytes;
    loop {
        match rest.find(open) {
            None => {
                out.push_str(rest);
                break;
            }
            Some(idx) => {
                out.push_str(&rest[..idx]);
                let after_open = &rest[idx + open.len()..];
                match parse_identifier_then(after_open, close) {
                    Some((name, after_close)) => {
                        match resolve(name) {
                            Some(replacement) => out.push_str(&replacement),
                            None => {
                                out.push_str(open);
                                out.push_str(name);
                                out.push_str(close);
                            }
                        }
                        rest = after_close;
                    }
                    None => {
                        // Not a well-formed `open ident close`; emit the
                        // opening sequence literally and keep scanning.
                        out.push_str(open);
                        rest = after_open;
                    }
                }
            }
        }
    }
    out
}

/// If `text` starts with an identifier immediately followed by `close`,
/// return the identifier and the remaining text after `close`.
fn parse_identifier_then<'a>(text: &'a str, close: &str) -> Option<(&'a str, &'a str)> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;
    if !is_ident_start(first) {
        return None;
    }
    let mut end = first.len_utf8();
    for (idx, c) in chars {
        if is_ident_continue(c) {
            end = idx + c.len_utf8();
        } else {
            break;
        }
    }
    let name = &text[..end];
    let remainder = &text[end..];
    let remainder = remainder.strip_prefix(close)?;
    Some((name, remainder))
}

/// Native `${name}` substitution: missing variables keep the literal
/// `${name}` sequence.
pub fn substitute_native(text: &str, store: &Store) -> String {
    substitute(text, "${", "}", |name| store.get(name).map(|v| v.to_display_string()))
}

/// Legacy `{{name}}` substitution: missing variables become the empty
/// string.
pub fn substitute_legacy(text: &str, store: &Store) -> String {
    substitute(text, "{{", "}}", |name| {
        Some(store.get(name).map(|v| v.to_display_string()).unwrap_or_default())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmd_core::Value;

    #[test]
    fn native_round_trip() {
        let mut store = Store::new();
        store.set("k", Value::Number(42.0));
        assert_eq!(substitute_native("v=${k}", &store), "v=42");
    }

    #[test]
    fn native_missing_keeps_literal() {
        let store = Store::new();
        assert_eq!(substitute_native("x=${missing}", &store), "x=${missing}");
    }

    #[test]
    fn legacy_missing_becomes_empty() {
        let store = Store::new();
        assert_eq!(substitute_legacy("Hello {{name}}!", &store), "Hello !");
    }

    #[test]
    fn legacy_round_trip() {
        let mut store = Store::new();
        store.set("name", Value::String("World".to_string()));
        assert_eq!(substitute_legacy("Hello {{name}}!", &store), "Hello World!");
    }

    #[test]
    fn braces_are_balanced_literally_not_nested() {
        let store = Store::new();
        // The first "{{" isn't immediately followed by an identifier (it's
        // followed by another "{"), so it's emitted as literal text; the
        // second "{{x}}" is a well-formed (missing) reference.
        assert_eq!(substitute_legacy("{{{{x}}", &store), "{{");
    }
}
