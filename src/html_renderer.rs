//! Ordered-interval HTML emission (C8): streams a source file's original
//! bytes, interleaving open/close tags for (possibly nested) markup
//! intervals, breaking and re-opening enclosing tags across line
//! boundaries so every line carries its own anchor and every tag nests
//! validly within it.
//!
//! Grounded in the original implementation's `output.cpp`: an explicit
//! stack of "active" tags is walked alongside the sorted markup list,
//! popped and closed whenever the next markup's `beginOffset` reaches
//! their `endOffset`, with a dedicated per-line copy loop that reopens
//! every still-active tag after each newline so nesting stays well-formed
//! across line boundaries.

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use crate::error::{AppError, IoError, RenderError, ResolveError};
use crate::markup_builder;
use crate::model::symbol::FileEntry;
use crate::model::Markup;
use crate::world::{self, MultiTuRegistry};
use crate::{fallback_highlighter, template, utils};

/// A markup with its render-time-resolved href and CSS classes, so the
/// interval walk never has to re-touch the registry once this is built.
struct Resolved {
    begin: u32,
    end: u32,
    classes: String,
    href: Option<String>,
    id: Option<String>,
    id_emitted: Cell<bool>,
}

impl Resolved {
    fn has_tag(&self) -> bool {
        self.href.is_some() || !self.classes.is_empty() || self.id.is_some()
    }

    fn tag_name(&self) -> &'static str {
        if self.href.is_some() {
            "a"
        } else {
            "span"
        }
    }
}

/// Renders one claimed file's markup stream through `tpl` into its output
/// HTML file.
#[tracing::instrument(skip(file_entry, registry, tpl), fields(file = %file_entry.rel_path.display()))]
pub fn render_file(
    file_entry: &FileEntry,
    registry: &MultiTuRegistry,
    tpl: &template::SimpleTemplate,
) -> Result<(), AppError> {
    let src_path = file_entry.input_root.join(&file_entry.rel_path);
    let bytes = fs::read(&src_path).map_err(|source| IoError::Read {
        path: src_path.clone(),
        stage: "render: reopen source",
        source,
    })?;

    let primary = file_entry.markups.take_sorted();
    let supplementary = fallback_highlighter::highlight(&bytes);
    let merged = markup_builder::merge_supplementary(primary, supplementary);

    let output_path = file_entry.output_path();
    let resolved: Vec<Resolved> = merged
        .iter()
        .map(|m| resolve_one(m, registry, &output_path))
        .collect();

    let disabled_lines = disabled_line_ranges(&bytes, &file_entry.disabled_ranges());
    let code = render_body(&bytes, &resolved, &disabled_lines, &src_path)?;

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|source| IoError::Write {
            path: parent.to_path_buf(),
            stage: "render: create output directory",
            source,
        })?;
    }
    let mut out_file = fs::File::create(&output_path).map_err(|source| IoError::Write {
        path: output_path.clone(),
        stage: "render: create output file",
        source,
    })?;

    let depth = file_entry.rel_path.components().count().saturating_sub(1);
    let mut values = HashMap::new();
    values.insert(
        "filename",
        template::Val::Str(file_entry.rel_path.display().to_string()),
    );
    values.insert(
        "rootpath",
        template::Val::Str(utils::rootpath_for_depth(depth)),
    );
    values.insert("code", template::Val::Str(code));

    tpl.render(values, &mut out_file).map_err(|e| match e {
        template::TemplateError::UnknownKey(key) => AppError::Resolve(ResolveError::UnknownKey {
            file: output_path.clone(),
            key,
        }),
        template::TemplateError::Io(source) => AppError::Io(IoError::Write {
            path: output_path,
            stage: "render: write template output",
            source,
        }),
    })?;

    Ok(())
}

fn resolve_one(m: &Markup, registry: &MultiTuRegistry, current_output: &Path) -> Resolved {
    Resolved {
        begin: m.begin_offset,
        end: m.end_offset,
        classes: m.attrs.css_classes(),
        href: world::resolve_href(&m.refd, registry, current_output),
        id: m.file_unique_name.clone(),
        id_emitted: Cell::new(false),
    }
}

/// Converts byte-offset disabled ranges into 1-based (first_line, last_line)
/// pairs so the body-copy loop can open/close `<div class="disabled-code">`
/// at whole-line boundaries.
fn disabled_line_ranges(src: &[u8], ranges: &[(u32, u32)]) -> Vec<(u32, u32)> {
    let mut out: Vec<(u32, u32)> = ranges
        .iter()
        .map(|&(begin, end)| {
            (
                offset_to_line(src, begin),
                offset_to_line(src, end.saturating_sub(1)),
            )
        })
        .collect();
    out.sort_unstable();
    out
}

fn offset_to_line(src: &[u8], offset: u32) -> u32 {
    let offset = (offset as usize).min(src.len());
    1 + src[..offset].iter().filter(|&&b| b == b'\n').count() as u32
}

/// Mutable cursor over the disabled-range list and its currently-open state,
/// threaded through the copy loop.
struct DisabledState<'a> {
    ranges: &'a [(u32, u32)],
    idx: usize,
    open: bool,
}

fn render_body(
    src: &[u8],
    markups: &[Resolved],
    disabled_lines: &[(u32, u32)],
    src_path: &Path,
) -> Result<String, RenderError> {
    let mut out: Vec<u8> = Vec::with_capacity(src.len() + src.len() / 4);
    let mut pos: u32 = 0;
    let mut lineno: u32 = 1;
    let mut active: Vec<usize> = Vec::new();
    let mut disabled = DisabledState {
        ranges: disabled_lines,
        idx: 0,
        open: false,
    };

    maybe_open_disabled(&mut out, &mut disabled, lineno);
    write!(out, "<span id=\"{lineno}L\" class=\"Ln\">").unwrap();

    let mut i = 0;
    while i < markups.len() {
        let begin = markups[i].begin;

        while let Some(&top) = active.last() {
            if markups[top].end <= begin {
                let end = markups[top].end;
                copy_until(
                    src, &mut pos, &mut lineno, end, &mut out, &active, markups, &mut disabled,
                    src_path,
                )?;
                write_end_tag(&mut out, &markups[top]);
                active.pop();
            } else {
                break;
            }
        }

        copy_until(
            src, &mut pos, &mut lineno, begin, &mut out, &active, markups, &mut disabled,
            src_path,
        )?;
        write_begin_tag(&mut out, &markups[i]);
        active.push(i);
        i += 1;
    }

    copy_until(
        src,
        &mut pos,
        &mut lineno,
        src.len() as u32,
        &mut out,
        &active,
        markups,
        &mut disabled,
        src_path,
    )?;
    while let Some(idx) = active.pop() {
        write_end_tag(&mut out, &markups[idx]);
    }
    if disabled.open {
        out.extend_from_slice(b"</div>");
    }
    out.extend_from_slice(b"</span>");

    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn maybe_open_disabled(out: &mut Vec<u8>, disabled: &mut DisabledState, lineno: u32) {
    if !disabled.open {
        if let Some(&(first, _)) = disabled.ranges.get(disabled.idx) {
            if first == lineno {
                out.extend_from_slice(b"<div class=\"disabled-code\">");
                disabled.open = true;
            }
        }
    }
}

fn maybe_close_disabled(out: &mut Vec<u8>, disabled: &mut DisabledState, lineno: u32) {
    if disabled.open {
        if let Some(&(_, last)) = disabled.ranges.get(disabled.idx) {
            if last == lineno {
                out.extend_from_slice(b"</div>");
                disabled.open = false;
                disabled.idx += 1;
            }
        }
    }
}

/// Copies bytes up to (not including) `target`, escaping as it goes.
/// Every newline closes and reopens the current line span, closes/opens
/// the disabled-code div at its boundaries, and reopens every tag still
/// `active` so nesting survives across the line break.
#[allow(clippy::too_many_arguments)]
fn copy_until(
    src: &[u8],
    pos: &mut u32,
    lineno: &mut u32,
    target: u32,
    out: &mut Vec<u8>,
    active: &[usize],
    markups: &[Resolved],
    disabled: &mut DisabledState,
    src_path: &Path,
) -> Result<(), RenderError> {
    if target as usize > src.len() {
        return Err(RenderError::OffsetBeyondEof {
            file: src_path.to_path_buf(),
            offset: target,
            line: *lineno,
        });
    }
    while *pos < target {
        let ch = src[*pos as usize];
        match ch {
            b'\n' => {
                for &idx in active.iter().rev() {
                    write_end_tag(out, &markups[idx]);
                }
                out.extend_from_slice(b"</span>\n");
                maybe_close_disabled(out, disabled, *lineno);
                *lineno += 1;
                maybe_open_disabled(out, disabled, *lineno);
                write!(out, "<span id=\"{lineno}L\" class=\"Ln\">", lineno = *lineno).unwrap();
                for &idx in active {
                    write_begin_tag(out, &markups[idx]);
                }
            }
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'&' => out.extend_from_slice(b"&amp;"),
            b'\r' => {}
            _ => out.push(ch),
        }
        *pos += 1;
    }
    Ok(())
}

fn write_begin_tag(out: &mut Vec<u8>, m: &Resolved) {
    if !m.has_tag() {
        return;
    }
    out.push(b'<');
    out.extend_from_slice(m.tag_name().as_bytes());
    if let Some(href) = &m.href {
        out.extend_from_slice(b" href=\"");
        out.extend_from_slice(escape_attr(href).as_bytes());
        out.push(b'"');
    }
    if !m.id_emitted.get() {
        if let Some(id) = &m.id {
            out.extend_from_slice(b" id=\"");
            out.extend_from_slice(escape_attr(id).as_bytes());
            out.push(b'"');
        }
    }
    if !m.classes.is_empty() {
        out.extend_from_slice(b" class=\"");
        out.extend_from_slice(escape_attr(&m.classes).as_bytes());
        out.push(b'"');
    }
    out.push(b'>');
    m.id_emitted.set(true);
}

fn write_end_tag(out: &mut Vec<u8>, m: &Resolved) {
    if !m.has_tag() {
        return;
    }
    out.extend_from_slice(b"</");
    out.extend_from_slice(m.tag_name().as_bytes());
    out.push(b'>');
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(begin: u32, end: u32, classes: &str) -> Resolved {
        Resolved {
            begin,
            end,
            classes: classes.to_string(),
            href: None,
            id: None,
            id_emitted: Cell::new(false),
        }
    }

    #[test]
    fn escapes_angle_brackets_and_ampersand() {
        let src = b"a < b & c > d";
        let out = render_body(src, &[], &[], Path::new("x")).unwrap();
        assert!(out.contains("a &lt; b &amp; c &gt; d"));
    }

    #[test]
    fn line_anchor_present_for_single_line() {
        let src = b"int x;";
        let out = render_body(src, &[], &[], Path::new("x")).unwrap();
        assert!(out.contains(r#"id="1L""#));
    }

    #[test]
    fn newline_opens_a_fresh_line_anchor() {
        let src = b"a\nb";
        let out = render_body(src, &[], &[], Path::new("x")).unwrap();
        assert!(out.contains(r#"id="1L""#));
        assert!(out.contains(r#"id="2L""#));
    }

    #[test]
    fn markup_spanning_a_newline_reopens_on_next_line_without_duplicate_id() {
        let src = b"ab\ncd";
        let markups = vec![resolved(0, 5, "c")];
        let out = render_body(src, &markups, &[], Path::new("x")).unwrap();
        assert_eq!(out.matches("<span class=\"c\">").count(), 2);
        // Content span closes twice (once per line) + two line spans close.
        assert_eq!(out.matches("</span>").count(), 4);
    }

    #[test]
    fn beyond_eof_offset_is_render_error() {
        let src = b"ab";
        let markups = vec![resolved(0, 10, "c")];
        let err = render_body(src, &markups, &[], Path::new("x")).unwrap_err();
        assert!(matches!(err, RenderError::OffsetBeyondEof { .. }));
    }

    #[test]
    fn disabled_range_wraps_its_line_in_a_div() {
        let src = b"a\nb\nc\n";
        let out = render_body(src, &[], &[(2, 2)], Path::new("x")).unwrap();
        assert!(out.contains(r#"<div class="disabled-code">"#));
        assert!(out.contains("</div>"));
        // The div must close before line 3 opens.
        let div_close = out.find("</div>").unwrap();
        let line3_open = out.find(r#"id="3L""#).unwrap();
        assert!(div_close < line3_open);
    }

    #[test]
    fn adjacent_disjoint_markups_both_render() {
        let src = b"ab";
        let markups = vec![resolved(0, 1, "k"), resolved(1, 2, "p")];
        let out = render_body(src, &markups, &[], Path::new("x")).unwrap();
        assert!(out.contains(r#"<span class="k">a</span><span class="p">b</span>"#));
    }

    #[test]
    fn nested_markup_closes_before_enclosing_one() {
        let src = b"abc";
        let markups = vec![resolved(0, 3, "outer"), resolved(1, 2, "inner")];
        let out = render_body(src, &markups, &[], Path::new("x")).unwrap();
        let close_positions: Vec<usize> = out.match_indices("</span>").map(|(i, _)| i).collect();
        // Three closes in source order: inner, outer, the line-wrapper span.
        assert_eq!(close_positions.len(), 3);
        let outer_open = out.find(r#"class="outer""#).unwrap();
        let inner_open = out.find(r#"class="inner""#).unwrap();
        assert!(outer_open < inner_open);
        assert!(close_positions[0] < close_positions[1]);
    }
}
