//! Pluggable external-reference resolution (C9): `ExternalRefLinker` and the
//! reference Doxygen tag-file implementation.
//!
//! A linker never mutates shared state of its own; it only inspects a
//! cursor and, optionally, installs a static URL on the markup it is
//! handed. That side-effect-free contract is what lets `MultiTuRegistry`
//! fan a single `&dyn ExternalRefLinker` out across every worker thread
//! without its own locking.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use clang::Entity;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::model::Refd;
use crate::name_resolver::{is_namespace_level_declaration, simple_qualified_name};

/// A pluggable, side-effect-free resolver for symbols declared outside the
/// indexed corpus. Implementations must be safe to call concurrently from
/// every worker thread.
pub trait ExternalRefLinker: Send + Sync {
    /// Inspects `cursor` (the entity a markup would otherwise link to) and
    /// returns a static URL if this resolver knows one, or `None`.
    fn resolve(&self, cursor: &Entity) -> Option<String>;
}

/// Tries each registered linker in turn, returning the first non-`None`
/// resolution wrapped as `Refd::External`, or `Refd::None` if none apply.
pub fn link_external_ref(linkers: &[Box<dyn ExternalRefLinker>], cursor: &Entity) -> Refd {
    for linker in linkers {
        if let Some(url) = linker.resolve(cursor) {
            return Refd::External(url);
        }
    }
    Refd::None
}

/// A Doxygen-style `<tagfile>` XML resolver: maps a namespace-level
/// qualified name to `base_url` + the tag file's recorded URL fragment.
pub struct DoxygenTagResolver {
    base_url: String,
    urls: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoxytagError {
    #[error("cannot read doxygen tag file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed doxygen tag file {path}: {source}")]
    Xml {
        path: std::path::PathBuf,
        #[source]
        source: quick_xml::Error,
    },
}

impl DoxygenTagResolver {
    pub fn load(tagfile: &Path, base_url: &str) -> Result<Self, DoxytagError> {
        let content = fs::read_to_string(tagfile).map_err(|source| DoxytagError::Read {
            path: tagfile.to_path_buf(),
            source,
        })?;

        let mut urls = HashMap::new();
        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(true);

        parse_compounds(&mut reader, tagfile, &mut urls, Vec::new())?;

        Ok(DoxygenTagResolver {
            base_url: base_url.to_string(),
            urls,
        })
    }
}

impl ExternalRefLinker for DoxygenTagResolver {
    fn resolve(&self, cursor: &Entity) -> Option<String> {
        if !is_namespace_level_declaration(*cursor) {
            return None;
        }
        let name = simple_qualified_name(*cursor);
        let suffix = self.urls.get(&name)?;
        Some(format!("{}{}", self.base_url, suffix))
    }
}

/// Recursively walks `<compound>` elements, building qualified names by
/// joining the parent stack with `::` unless the child's own name already
/// contains a colon (nested Doxygen compounds sometimes already spell
/// their own qualification out).
fn parse_compounds(
    reader: &mut Reader<&[u8]>,
    tagfile: &Path,
    urls: &mut HashMap<String, String>,
    parents: Vec<String>,
) -> Result<(), DoxytagError> {
    let err = |source| DoxytagError::Xml {
        path: tagfile.to_path_buf(),
        source,
    };

    let mut name: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut anchorfile: Option<String> = None;
    let mut anchor: Option<String> = None;
    let mut current_tag: Option<String> = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(err)? {
            Event::Eof => break,
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if tag == "compound" {
                    parse_compounds(reader, tagfile, urls, {
                        let mut next = parents.clone();
                        if let Some(n) = &name {
                            next.push(n.clone());
                        }
                        next
                    })?;
                } else {
                    current_tag = Some(tag);
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(err)?.into_owned();
                match current_tag.as_deref() {
                    Some("name") => name = Some(text),
                    Some("filename") => filename = Some(text),
                    Some("anchorfile") => anchorfile = Some(text),
                    Some("anchor") => anchor = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if tag == "compound" {
                    break;
                }
                current_tag = None;
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(own_name) = name {
        let qualified = if own_name.contains("::") || parents.is_empty() {
            own_name
        } else {
            format!("{}::{}", parents.join("::"), own_name)
        };

        let file_part = anchorfile.or(filename);
        if let Some(file_part) = file_part {
            let url = match anchor {
                Some(a) if !a.is_empty() => format!("{file_part}#{a}"),
                _ => file_part,
            };
            if urls.contains_key(&qualified) {
                tracing::warn!(name = %qualified, discarded_url = %url, "duplicate doxygen tag name, keeping first occurrence");
            } else {
                tracing::trace!(name = %qualified, url = %url, "registered doxygen anchor");
                urls.insert(qualified, url);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn write_tagfile(xml: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(xml.as_bytes()).unwrap();
        f
    }

    /// Captures every `WARN`-level event's message while installed, so tests
    /// can assert a diagnostic fired without depending on stderr output.
    struct WarnCapture(Arc<Mutex<Vec<String>>>);

    /// Renders every field of an event (message plus any structured fields
    /// like `name` or `discarded_url`) into one space-joined string.
    struct MessageVisitor(String);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push_str(&format!("{}={:?} ", field.name(), value));
        }
    }

    impl<S> tracing_subscriber::Layer<S> for WarnCapture
    where
        S: tracing::Subscriber,
    {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() != tracing::Level::WARN {
                return;
            }
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }

    #[test]
    fn loads_filename_anchored_compound() {
        let xml = r#"<?xml version="1.0"?>
<tagfile>
  <compound kind="class">
    <name>Widget</name>
    <filename>class_widget.html</filename>
  </compound>
</tagfile>"#;
        let f = write_tagfile(xml);
        let resolver = DoxygenTagResolver::load(f.path(), "https://docs.example.com/").unwrap();
        assert_eq!(
            resolver.urls.get("Widget").unwrap(),
            "class_widget.html"
        );
    }

    #[test]
    fn nested_compounds_join_with_double_colon() {
        let xml = r#"<?xml version="1.0"?>
<tagfile>
  <compound kind="namespace">
    <name>acme</name>
    <filename>namespace_acme.html</filename>
    <compound kind="class">
      <name>Widget</name>
      <anchorfile>class_widget.html</anchorfile>
      <anchor>details</anchor>
    </compound>
  </compound>
</tagfile>"#;
        let f = write_tagfile(xml);
        let resolver = DoxygenTagResolver::load(f.path(), "").unwrap();
        assert_eq!(
            resolver.urls.get("acme::Widget").unwrap(),
            "class_widget.html#details"
        );
    }

    #[test]
    fn duplicate_names_emit_a_warning_diagnostic() {
        use tracing_subscriber::layer::SubscriberExt;

        let captured = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(WarnCapture(captured.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let xml = r#"<?xml version="1.0"?>
<tagfile>
  <compound kind="class">
    <name>Widget</name>
    <filename>first.html</filename>
  </compound>
  <compound kind="class">
    <name>Widget</name>
    <filename>second.html</filename>
  </compound>
</tagfile>"#;
        let f = write_tagfile(xml);
        DoxygenTagResolver::load(f.path(), "").unwrap();

        let warnings = captured.lock().unwrap();
        assert!(warnings.iter().any(|m| m.contains("duplicate") && m.contains("Widget")), "{warnings:?}");
    }

    #[test]
    fn duplicate_names_keep_first_occurrence() {
        let xml = r#"<?xml version="1.0"?>
<tagfile>
  <compound kind="class">
    <name>Widget</name>
    <filename>first.html</filename>
  </compound>
  <compound kind="class">
    <name>Widget</name>
    <filename>second.html</filename>
  </compound>
</tagfile>"#;
        let f = write_tagfile(xml);
        let resolver = DoxygenTagResolver::load(f.path(), "").unwrap();
        assert_eq!(resolver.urls.get("Widget").unwrap(), "first.html");
    }
}
