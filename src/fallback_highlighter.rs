//! Lexical string/comment highlighter (C3), used only to supplement the
//! AST-derived markup stream over regions the parser never classified
//! (mostly disabled preprocessor branches, whose tokens clang never
//! hands us a cursor for).
//!
//! This is a character-stream scanner, not a tokenizer: it only needs to
//! find string and comment *extents*, so it can afford to be much dumber
//! than the real lexer and still never misfire, as long as it tracks
//! enough context (raw-string delimiters, identifier runs) to avoid being
//! fooled by quote characters embedded in identifiers or other literals.

use crate::model::markup::{markup_order_key, Markup};
use crate::model::token_attrs::{TokenAttributes, TokenKind};

/// Scans `src` end to end and returns sorted `litStr`/`cmmt` markups.
pub fn highlight(src: &[u8]) -> Vec<Markup> {
    let mut out = Vec::new();
    let mut i = 0usize;
    let len = src.len();

    while i < len {
        let c = src[i];

        if c == b'/' && i + 1 < len && src[i + 1] == b'/' {
            let start = i;
            i += 2;
            while i < len && src[i] != b'\n' {
                i += 1;
            }
            out.push(mk(start, i, TokenKind::Cmmt));
            continue;
        }

        if c == b'/' && i + 1 < len && src[i + 1] == b'*' {
            let start = i;
            i += 2;
            while i + 1 < len && !(src[i] == b'*' && src[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(len);
            out.push(mk(start, i, TokenKind::Cmmt));
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            let (prefix_end, is_raw) = scan_string_prefix(src, i);
            if prefix_end > i {
                if let Some(end) = scan_string_or_char(src, prefix_end, b'"', is_raw) {
                    out.push(mk(i, end, TokenKind::LitStr));
                    i = end;
                    continue;
                }
            }
            // Not a string-prefixed literal after all: skip the
            // identifier run so embedded quote-like bytes in later
            // characters of the same identifier are never reconsidered.
            let start = i;
            i += 1;
            while i < len && (src[i].is_ascii_alphanumeric() || src[i] == b'_') {
                i += 1;
            }
            let _ = start;
            continue;
        }

        if c == b'"' {
            if let Some(end) = scan_string_or_char(src, i, b'"', false) {
                out.push(mk(i, end, TokenKind::LitStr));
                i = end;
                continue;
            }
        }

        if c == b'\'' {
            if let Some(end) = scan_string_or_char(src, i, b'\'', false) {
                out.push(mk(i, end, TokenKind::LitChr));
                i = end;
                continue;
            }
        }

        i += 1;
    }

    out.sort_by_key(markup_order_key);
    out
}

fn mk(begin: usize, end: usize, kind: TokenKind) -> Markup {
    Markup::new(begin as u32, end as u32, TokenAttributes::new(kind))
}

/// Recognizes the `L`, `U`, `u`, `u8`, `R`, `LR`, `UR`, `uR`, `u8R` prefixes
/// that may precede a string literal's opening quote. Returns the offset
/// just past the prefix and whether it denotes a raw string, or
/// `(start, false)` if no recognized prefix/quote follows at `start`.
fn scan_string_prefix(src: &[u8], start: usize) -> (usize, bool) {
    let rest = &src[start..];
    const PREFIXES: &[(&[u8], bool)] = &[
        (b"u8R", true),
        (b"LR", true),
        (b"UR", true),
        (b"uR", true),
        (b"u8", false),
        (b"R", true),
        (b"L", false),
        (b"U", false),
        (b"u", false),
    ];
    for (prefix, is_raw) in PREFIXES {
        if rest.starts_with(prefix) {
            let after = start + prefix.len();
            if src.get(after) == Some(&b'"') {
                return (after, *is_raw);
            }
        }
    }
    (start, false)
}

/// Scans a quoted literal (or raw string) starting at the opening
/// delimiter `quote_at` (which must hold `quote`), returning the offset
/// just past the closing delimiter, or `None` if it never closes (the
/// scan then falls through and the byte is treated as ordinary text).
fn scan_string_or_char(src: &[u8], quote_at: usize, quote: u8, is_raw: bool) -> Option<usize> {
    if src.get(quote_at) != Some(&quote) {
        return None;
    }

    if is_raw {
        // R"delim( ... )delim"
        let mut i = quote_at + 1;
        let delim_start = i;
        while i < src.len() && src[i] != b'(' {
            i += 1;
        }
        if i >= src.len() {
            return None;
        }
        let delim = &src[delim_start..i];
        let closer: Vec<u8> = std::iter::once(b')')
            .chain(delim.iter().copied())
            .chain(std::iter::once(b'"'))
            .collect();
        i += 1;
        while i + closer.len() <= src.len() {
            if &src[i..i + closer.len()] == closer.as_slice() {
                return Some(i + closer.len());
            }
            i += 1;
        }
        return None;
    }

    let mut i = quote_at + 1;
    while i < src.len() {
        match src[i] {
            b'\\' if i + 1 < src.len() => i += 2,
            b'\n' => return None,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(src: &str, kind: TokenKind) -> Vec<(u32, u32)> {
        highlight(src.as_bytes())
            .into_iter()
            .filter(|m| m.attrs.kind == kind)
            .map(|m| (m.begin_offset, m.end_offset))
            .collect()
    }

    #[test]
    fn line_comment() {
        assert_eq!(spans("int x; // trailing\nint y;", TokenKind::Cmmt), vec![(7, 19)]);
    }

    #[test]
    fn block_comment() {
        assert_eq!(spans("/* a\nb */x", TokenKind::Cmmt), vec![(0, 9)]);
    }

    #[test]
    fn plain_string_literal() {
        assert_eq!(spans(r#"puts("hi");"#, TokenKind::LitStr), vec![(5, 9)]);
    }

    #[test]
    fn prefixed_wide_string() {
        assert_eq!(spans(r#"L"wide""#, TokenKind::LitStr), vec![(0, 7)]);
    }

    #[test]
    fn raw_string_with_delimiter() {
        let src = r#"R"delim(a)b)delim""#;
        assert_eq!(spans(src, TokenKind::LitStr), vec![(0, src.len() as u32)]);
    }

    #[test]
    fn char_literal() {
        assert_eq!(spans("'a'", TokenKind::LitChr), vec![(0, 3)]);
    }

    #[test]
    fn quote_inside_identifier_is_not_a_string() {
        // identifiers never contain quotes, but a string-looking prefix
        // glued to a longer identifier must not be mistaken for one.
        assert!(spans("ランナー", TokenKind::LitStr).is_empty());
        assert!(spans("Rx", TokenKind::LitStr).is_empty());
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        let src = r#""a\"b""#;
        assert_eq!(spans(src, TokenKind::LitStr), vec![(0, src.len() as u32)]);
    }
}
