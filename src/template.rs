//! `@@key@@` substitution engine (A6) — the output template, kept
//! deliberately trivial per §1's scope note.

use std::collections::HashMap;
use std::io::{self, Write};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template references unknown key {0:?}")]
    UnknownKey(String),

    #[error("failed writing rendered output: {0}")]
    Io(#[from] io::Error),
}

enum Chunk {
    Literal(String),
    Key(String),
}

/// A parsed template: alternating literal text and `@@key@@` placeholders,
/// in source order.
pub struct SimpleTemplate {
    chunks: Vec<Chunk>,
}

/// A value to substitute for a key: either a plain string or a callback
/// that streams directly into the output (used for `code`, which can be
/// arbitrarily large).
pub enum Val<'a> {
    Str(String),
    Stream(Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + 'a>),
}

impl SimpleTemplate {
    pub fn new(source: &str) -> Self {
        let mut chunks = Vec::new();
        let mut rest = source;
        while let Some(start) = rest.find("@@") {
            if start > 0 {
                chunks.push(Chunk::Literal(rest[..start].to_string()));
            }
            let after_marker = &rest[start + 2..];
            match after_marker.find("@@") {
                Some(end) => {
                    chunks.push(Chunk::Key(after_marker[..end].to_string()));
                    rest = &after_marker[end + 2..];
                }
                None => {
                    // Unterminated marker: treat the rest as literal text.
                    chunks.push(Chunk::Literal(format!("@@{after_marker}")));
                    rest = "";
                    break;
                }
            }
        }
        if !rest.is_empty() {
            chunks.push(Chunk::Literal(rest.to_string()));
        }
        SimpleTemplate { chunks }
    }

    /// The built-in fallback template used when `-t` is not given.
    pub fn builtin() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }

    /// Renders the template into `out`, substituting each key from
    /// `values`. A key appearing in the template with no matching entry in
    /// `values` is a `TemplateError::UnknownKey`.
    pub fn render<'a>(
        &self,
        mut values: HashMap<&str, Val<'a>>,
        out: &mut dyn Write,
    ) -> Result<(), TemplateError> {
        for chunk in &self.chunks {
            match chunk {
                Chunk::Literal(text) => {
                    out.write_all(text.as_bytes())?;
                }
                Chunk::Key(key) => {
                    let val = values
                        .remove(key.as_str())
                        .ok_or_else(|| TemplateError::UnknownKey(key.clone()))?;
                    match val {
                        Val::Str(s) => out.write_all(s.as_bytes())?,
                        Val::Stream(f) => f(out)?,
                    }
                }
            }
        }
        Ok(())
    }
}

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>@@filename@@</title>
<link rel="stylesheet" href="@@rootpath@@style.css">
</head>
<body>
<pre>@@code@@</pre>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_literal_and_key_chunks_in_order() {
        let t = SimpleTemplate::new("a@@x@@b@@y@@c");
        let mut out = Vec::new();
        let mut values: HashMap<&str, Val> = HashMap::new();
        values.insert("x", Val::Str("1".into()));
        values.insert("y", Val::Str("2".into()));
        t.render(values, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a1b2c");
    }

    #[test]
    fn unknown_key_in_template_errors() {
        let t = SimpleTemplate::new("@@missing@@");
        let mut out = Vec::new();
        let err = t.render(HashMap::new(), &mut out).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownKey(k) if k == "missing"));
    }

    #[test]
    fn stream_values_write_directly() {
        let t = SimpleTemplate::new("<<@@code@@>>");
        let mut out = Vec::new();
        let mut values: HashMap<&str, Val> = HashMap::new();
        values.insert(
            "code",
            Val::Stream(Box::new(|w| w.write_all(b"hello"))),
        );
        t.render(values, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<<hello>>");
    }

    #[test]
    fn builtin_template_parses_without_error() {
        let t = SimpleTemplate::builtin();
        assert!(t.chunks.iter().any(|c| matches!(c, Chunk::Key(k) if k == "code")));
    }
}
