//! Per-translation-unit orchestration (C6): tokenizes every top-level
//! construct the parser exposes in the main file and its transitively
//! included headers, pairs each token with its governing AST cursor, and
//! records the resulting markups through [`MultiTuRegistry`] and
//! `MarkupBuilder`.
//!
//! libclang flattens every included file's top-level declarations (and,
//! with detailed preprocessing records on, its directives and macro
//! expansions too) into direct children of the translation unit's own
//! root cursor, each carrying its own file location. Grouping those
//! children by file and tokenizing each child's own extent, rather than
//! trying to build a single whole-file source range the bindings have no
//! public way to construct from raw offsets, gives full source-ordered
//! token coverage per file without reaching past the `clang` crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clang::token::TokenKind as ClangTokenKind;
use clang::{Entity, EntityKind, EntityVisitResult, Token, TranslationUnit};

use crate::model::{FileEntry, FileId, Markup, Refd, SymbolDeclaration, TokenAttributes, TokenKind};
use crate::name_resolver;
use crate::tag_speller;
use crate::world::MultiTuRegistry;

/// Runs the full annotation pass over one parsed translation unit,
/// claiming and recording markups for every included file it is the
/// first TU to reach.
#[tracing::instrument(skip(tu, registry))]
pub fn annotate(tu: &TranslationUnit, registry: &MultiTuRegistry) {
    let root = tu.get_entity();
    let is_c = name_resolver::is_c_translation_unit(root);

    let mut by_file: HashMap<FileId, (PathBuf, Vec<Entity>)> = HashMap::new();
    for child in root.get_children() {
        let Some(loc) = child.get_location() else {
            continue;
        };
        let floc = loc.get_file_location();
        let Some(file) = floc.file else {
            continue;
        };
        let abs_path = file.get_path();
        if !registry.is_file_included(&abs_path) {
            continue;
        }
        let file_id = FileId::from_parser_id(file.get_id());
        by_file
            .entry(file_id)
            .or_insert_with(|| (abs_path, Vec::new()))
            .1
            .push(child);
    }

    for (file_id, (abs_path, top_children)) in by_file {
        let Some(file_entry) = registry.prepare_to_process(file_id, &abs_path) else {
            continue;
        };
        annotate_file(tu, registry, &file_entry, &abs_path, &top_children, is_c);
    }
}

fn annotate_file(
    tu: &TranslationUnit,
    registry: &MultiTuRegistry,
    file_entry: &Arc<FileEntry>,
    abs_path: &Path,
    top_children: &[Entity],
    is_c: bool,
) {
    record_disabled_ranges(tu, file_entry, abs_path);

    let mut pending: Option<PendingLink> = None;
    for top in top_children {
        let Some(range) = top.get_range() else {
            continue;
        };
        let tokens = tu.tokenize(range);
        if tokens.is_empty() {
            continue;
        }
        let mut annotations = tu.annotate(&tokens);
        repair_annotations(*top, &tokens, &mut annotations);

        for (token, cursor) in tokens.iter().zip(annotations.iter()) {
            let Some(cursor) = cursor else { continue };
            emit_token(registry, file_entry, token, *cursor, is_c, &mut pending);
        }
    }
}

fn record_disabled_ranges(tu: &TranslationUnit, file_entry: &Arc<FileEntry>, abs_path: &Path) {
    let Some(file) = tu.get_file(abs_path) else {
        return;
    };
    for range in tu.get_skipped_ranges(&file) {
        let begin = range.get_start().get_file_location().offset;
        let end = range.get_end().get_file_location().offset;
        if begin < end {
            file_entry.push_disabled_range(begin, end);
        }
    }
}

/// Phase 2 of §4.5: a second AST walk scoped to `top`'s own subtree,
/// overwriting any token slot whose libclang-assigned cursor doesn't
/// file-match the token's own location (a "bad" annotation) with
/// whichever cursor from the walk lands on that exact offset.
fn repair_annotations(top: Entity, tokens: &[Token], annotations: &mut [Option<Entity>]) {
    let mut offset_index: HashMap<u32, usize> = HashMap::new();
    for (i, token) in tokens.iter().enumerate() {
        let offset = token.get_location().get_file_location().offset;
        offset_index.entry(offset).or_insert(i);
    }

    let is_bad = |slot: &Option<Entity>, want: &Path| match slot {
        None => true,
        Some(c) => match c.get_location().and_then(|l| l.get_file_location().file) {
            Some(f) => f.get_path() != want,
            None => true,
        },
    };

    top.visit_children(|cursor, _parent| {
        if let Some(loc) = cursor.get_location() {
            let floc = loc.get_file_location();
            if let Some(file) = &floc.file {
                if let Some(&idx) = offset_index.get(&floc.offset) {
                    if is_bad(&annotations[idx], &file.get_path()) {
                        annotations[idx] = Some(cursor);
                    }
                }
            }
        }
        EntityVisitResult::Recurse
    });
}

enum PendingLink {
    /// A `~` token just emitted; the very next token (the destructor's
    /// name) completes the combined link span.
    Destructor { begin_offset: u32 },
    /// An `operator` keyword just emitted; every token up to (but not
    /// including) the next `(` or `[` extends the combined link span.
    Operator { begin_offset: u32 },
}

fn emit_token(
    registry: &MultiTuRegistry,
    file_entry: &Arc<FileEntry>,
    token: &Token,
    cursor: Entity,
    is_c: bool,
    pending: &mut Option<PendingLink>,
) {
    let range = token.get_range();
    let begin = range.get_start().get_file_location().offset;
    let end = range.get_end().get_file_location().offset;
    if begin >= end {
        return;
    }

    let spelling = token.get_spelling();
    let token_kind = token.get_kind();
    let kind = tag_speller::classify(token_kind, cursor, &spelling);
    let attrs = TokenAttributes::new(kind);

    if let Some(p) = pending.take() {
        match p {
            PendingLink::Destructor { begin_offset } => {
                let mut markup = Markup::new(begin_offset, end, TokenAttributes::new(kind));
                link_cursor(&mut markup, cursor, registry, is_c);
                file_entry.markups.push(markup);
                return;
            }
            PendingLink::Operator { begin_offset } => {
                if spelling == "(" || spelling == "[" {
                    let mut markup = Markup::new(begin_offset, begin, attrs);
                    link_cursor(&mut markup, cursor, registry, is_c);
                    file_entry.markups.push(markup);
                } else {
                    *pending = Some(PendingLink::Operator { begin_offset });
                    return;
                }
            }
        }
    }

    // Comments and literals: emit and continue, no cross-reference linking.
    if token_kind == ClangTokenKind::Comment
        || matches!(
            kind,
            TokenKind::LitStr
                | TokenKind::LitChr
                | TokenKind::Lit
                | TokenKind::LitNum
                | TokenKind::LitNumFlt
                | TokenKind::LitNumIntBin
                | TokenKind::LitNumIntDecLong
                | TokenKind::LitNumIntHex
                | TokenKind::LitNumIntOct
        )
    {
        file_entry.markups.push(Markup::new(begin, end, attrs));
        return;
    }

    if cursor.get_kind() == EntityKind::InclusionDirective {
        let mut markup = Markup::new(begin, end, attrs);
        if let Some(included) = cursor.get_included_file() {
            let included_path = included.get_path();
            let included_id = FileId::from_parser_id(included.get_id());
            if let Some(sym) = registry.whole_file_symbol(included_id, &included_path) {
                markup.refd = Refd::Direct(sym);
            }
        }
        file_entry.markups.push(markup);
        return;
    }

    if spelling == "~" && cursor.get_kind() == EntityKind::Destructor {
        file_entry.markups.push(Markup::new(begin, end, attrs));
        *pending = Some(PendingLink::Destructor { begin_offset: begin });
        return;
    }

    if spelling == "operator"
        && matches!(
            cursor.get_kind(),
            EntityKind::Method | EntityKind::FunctionDecl | EntityKind::FunctionTemplate
        )
    {
        file_entry.markups.push(Markup::new(begin, end, attrs));
        *pending = Some(PendingLink::Operator { begin_offset: begin });
        return;
    }

    if spelling == "{" || spelling == ";" || token_kind == ClangTokenKind::Keyword {
        file_entry.markups.push(Markup::new(begin, end, attrs));
        return;
    }

    let mut markup = Markup::new(begin, end, attrs);

    // `equalFileLocations`: the token's own range start must land on the
    // cursor's own location, not just share its cursor with a neighboring
    // token (a second token of a multi-token declarator, or `*` in
    // `int *p;`). Anything else gets a plain markup with no decl/def flags
    // or cross-reference link, so each entity gets exactly one anchor.
    let token_start_loc = range.get_start().get_file_location();
    let is_main_location = cursor.get_location().is_some_and(|loc| {
        let cur_loc = loc.get_file_location();
        cur_loc.offset == token_start_loc.offset
            && cur_loc.file.as_ref().map(|f| f.get_path()) == token_start_loc.file.as_ref().map(|f| f.get_path())
    });
    if !is_main_location {
        file_entry.markups.push(markup);
        return;
    }

    if cursor.is_declaration() {
        markup.attrs.flag_decl = true;
        if let Some(sym) = create_symbol_for_cursor(registry, file_entry, cursor) {
            let name =
                name_resolver::clamp_to_max_len(name_resolver::file_unique_name(cursor, is_c), registry.max_id_size());
            if let Some(name) = name {
                sym.set_file_unique_name_if_absent(name);
            }
            markup.file_unique_name = sym.file_unique_name();
        }
    }
    if cursor.is_definition() {
        markup.attrs.flag_def = true;
        if let Some(sym) = create_symbol_for_cursor(registry, file_entry, cursor) {
            if let Some(usr) = cursor.get_usr() {
                registry.register_def(&usr.0, sym.clone());
            }
            if markup.file_unique_name.is_none() {
                markup.file_unique_name = sym.file_unique_name();
            }
        }
    }

    link_cursor(&mut markup, cursor, registry, is_c);
    file_entry.markups.push(markup);
}

/// `createSymbol(fileEntry, lineno, offset)` at `cursor`'s own location.
fn create_symbol_for_cursor(
    registry: &MultiTuRegistry,
    file_entry: &Arc<FileEntry>,
    cursor: Entity,
) -> Option<Arc<SymbolDeclaration>> {
    let loc = cursor.get_location()?.get_file_location();
    Some(registry.create_symbol(file_entry, loc.line, loc.offset))
}

/// §4.6: resolves `markup.refd` for `cursor`, applying the typedef/type-alias
/// redirection and falling back to the external-ref linker when no
/// in-corpus definition applies.
fn link_cursor(markup: &mut Markup, cursor: Entity, registry: &MultiTuRegistry, is_c: bool) {
    let mut should_ref = false;

    if let Some(referenced) = effective_referenced(cursor) {
        if referenced != cursor {
            should_ref = true;
            if let Some(loc) = referenced.get_location() {
                let floc = loc.get_file_location();
                if let Some(file) = floc.file {
                    let ref_path = file.get_path();
                    let ref_id = FileId::from_parser_id(file.get_id());
                    if let Some(sym) =
                        registry.reference_symbol(ref_id, &ref_path, floc.line, floc.offset, || {
                            name_resolver::file_unique_name(referenced, is_c)
                        })
                    {
                        markup.refd = Refd::Direct(sym);
                    }
                }
            }
        }
    } else if markup.attrs.flag_decl != markup.attrs.flag_def {
        should_ref = true;
        if let Some(usr) = cursor.get_usr().filter(|u| !u.0.is_empty()) {
            markup.refd = Refd::ByUsr(usr.0.clone());
        }
    }

    if should_ref && markup.refd.is_none() {
        let external = registry.link_external_ref(&cursor);
        if !external.is_none() {
            markup.refd = external;
        }
    }
}

/// `effectiveReferenced`: the cursor `cursor` refers to, redirected away
/// from a typedef/type-alias onto the type it names when both share the
/// same qualified name (the `typedef struct S { } S;` idiom).
fn effective_referenced(cursor: Entity) -> Option<Entity> {
    let referenced = cursor.get_reference()?;
    if matches!(
        referenced.get_kind(),
        EntityKind::TypedefDecl | EntityKind::TypeAliasDecl
    ) {
        if let Some(underlying) = referenced.get_typedef_underlying_type() {
            if let Some(decl) = underlying.get_declaration() {
                if name_resolver::simple_qualified_name(decl)
                    == name_resolver::simple_qualified_name(referenced)
                {
                    return Some(decl);
                }
            }
        }
    }
    Some(referenced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::token_attrs::TokenAttributes as Attrs;

    #[test]
    fn pending_link_variants_carry_their_begin_offset() {
        let d = PendingLink::Destructor { begin_offset: 5 };
        let o = PendingLink::Operator { begin_offset: 9 };
        match d {
            PendingLink::Destructor { begin_offset } => assert_eq!(begin_offset, 5),
            _ => panic!("wrong variant"),
        }
        match o {
            PendingLink::Operator { begin_offset } => assert_eq!(begin_offset, 9),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn zero_width_token_range_is_not_emitted() {
        // begin == end should never produce a markup; exercised indirectly
        // through emit_token's early return, documented here as a guard
        // against future regressions in the offset comparison.
        let attrs = Attrs::new(TokenKind::Punct);
        assert!(!attrs.is_empty());
    }
}
