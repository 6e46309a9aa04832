//! Stable per-file fragment-identifier generation (C2).
//!
//! `fileUniqueName` must be a pure function of the cursor: independent of
//! parse order, thread, or which file happens to render first, so two
//! processes parsing the same corpus produce byte-identical anchors.

use clang::{Entity, EntityKind, Linkage};

/// Recursively prefixes the cursor's spelling with its semantic parent's
/// qualified name, joined by `::`. Parents with empty spelling (anonymous
/// namespaces, the translation unit, invalid cursors) are skipped.
pub fn simple_qualified_name(cursor: Entity) -> String {
    let own = cursor.get_name().unwrap_or_default();

    let parent_qualified = cursor
        .get_semantic_parent()
        .filter(|p| p.get_kind() != EntityKind::TranslationUnit && p.is_valid())
        .map(simple_qualified_name)
        .filter(|s| !s.is_empty());

    match parent_qualified {
        Some(parent) if !own.is_empty() => format!("{parent}::{own}"),
        _ => own,
    }
}

fn contains_function_ancestor(cursor: Entity) -> bool {
    let mut current = cursor.get_semantic_parent();
    while let Some(c) = current {
        if !c.is_valid() || c.get_kind() == EntityKind::TranslationUnit {
            return false;
        }
        if matches!(
            c.get_kind(),
            EntityKind::FunctionDecl
                | EntityKind::Method
                | EntityKind::Constructor
                | EntityKind::Destructor
                | EntityKind::FunctionTemplate
        ) {
            return true;
        }
        current = c.get_semantic_parent();
    }
    false
}

fn is_type_alias_ish(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::StructDecl
            | EntityKind::UnionDecl
            | EntityKind::EnumDecl
            | EntityKind::ClassDecl
            | EntityKind::TypedefDecl
            | EntityKind::TypeAliasDecl
    )
}

pub fn is_namespace_level_declaration(cursor: Entity) -> bool {
    match cursor.get_linkage() {
        Some(Linkage::External) | Some(Linkage::Internal) | Some(Linkage::UniqueExternal) => true,
        _ => is_type_alias_ish(cursor.get_kind()) && !contains_function_ancestor(cursor),
    }
}

/// True iff `cursor` is the single anchor cursor chosen for its entity in
/// this file: either it *is* the definition, or it is the canonical cursor
/// and the definition (if any) lies in a different file.
pub fn is_main_cursor(cursor: Entity) -> bool {
    if cursor.is_definition() {
        return true;
    }
    let canonical = cursor.get_canonical_entity();
    if canonical != cursor {
        return false;
    }
    match cursor.get_definition() {
        None => true,
        Some(def) => {
            let def_file = def.get_location().and_then(|l| l.get_file_location().file);
            let cur_file = cursor.get_location().and_then(|l| l.get_file_location().file);
            match (def_file, cur_file) {
                (Some(d), Some(c)) => d.get_path() != c.get_path(),
                _ => true,
            }
        }
    }
}

/// Canonicalizes a C++ parameter-type spelling for inclusion in an overload
/// anchor: collapse whitespace adjacent to non-word characters, then turn
/// remaining runs of whitespace into `-`.
fn canonicalize_param_type(spelling: &str) -> String {
    let mut collapsed = String::with_capacity(spelling.len());
    let chars: Vec<char> = spelling.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            let prev_is_word = collapsed.chars().last().map(|p| p.is_alphanumeric() || p == '_').unwrap_or(false);
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let next_is_word = chars.get(j).map(|n| n.is_alphanumeric() || *n == '_').unwrap_or(false);
            if prev_is_word && next_is_word {
                collapsed.push(' ');
            }
            i = j;
            continue;
        }
        collapsed.push(c);
        i += 1;
    }
    collapsed.replace(' ', "-")
}

fn param_type_list(cursor: Entity) -> String {
    let args = cursor.get_arguments().unwrap_or_default();
    let mut parts: Vec<String> = args
        .iter()
        .map(|a| canonicalize_param_type(&a.get_type().map(|t| t.get_display_name()).unwrap_or_default()))
        .collect();
    if cursor.is_variadic() {
        parts.push("...".to_string());
    }
    parts.join(",")
}

/// `fileUniqueName(cursor, isC)`: empty unless `cursor` is namespace-level
/// and the main cursor for its entity; see module docs for the per-kind
/// rules.
pub fn file_unique_name(cursor: Entity, is_c: bool) -> Option<String> {
    if !is_namespace_level_declaration(cursor) || !is_main_cursor(cursor) {
        return None;
    }

    let kind = cursor.get_kind();

    if matches!(kind, EntityKind::VarDecl | EntityKind::EnumConstantDecl) {
        let name = simple_qualified_name(cursor);
        return if name.is_empty() { None } else { Some(name) };
    }

    if matches!(
        kind,
        EntityKind::StructDecl | EntityKind::UnionDecl | EntityKind::EnumDecl | EntityKind::ClassDecl
    ) {
        let name = simple_qualified_name(cursor);
        if name.is_empty() {
            return None;
        }
        if is_c {
            let prefix = match kind {
                EntityKind::StructDecl => "s:",
                EntityKind::EnumDecl => "e:",
                EntityKind::UnionDecl => "u:",
                _ => "",
            };
            return Some(format!("{prefix}{name}"));
        }
        return Some(name);
    }

    if matches!(kind, EntityKind::TypedefDecl | EntityKind::TypeAliasDecl) {
        let own_name = simple_qualified_name(cursor);
        if let Some(underlying) = cursor.get_typedef_underlying_type() {
            if let Some(decl) = underlying.get_declaration() {
                if simple_qualified_name(decl) == own_name {
                    // Alias redeclares its canonical type under the same
                    // name: the struct's own anchor already covers it.
                    return None;
                }
            }
        }
        return if own_name.is_empty() { None } else { Some(own_name) };
    }

    if matches!(
        kind,
        EntityKind::FunctionDecl
            | EntityKind::Method
            | EntityKind::Constructor
            | EntityKind::Destructor
            | EntityKind::ConversionFunction
            | EntityKind::FunctionTemplate
    ) {
        if is_c {
            let name = cursor.get_name().unwrap_or_default();
            return if name.is_empty() { None } else { Some(name) };
        }
        let qualified = simple_qualified_name(cursor);
        if qualified.is_empty() {
            return None;
        }
        return Some(format!("{qualified}:{}", param_type_list(cursor)));
    }

    None
}

pub fn is_c_translation_unit(root: Entity) -> bool {
    fn first_non_invalid(cursor: Entity) -> Option<Entity> {
        cursor.get_children().into_iter().find(|c| c.is_valid())
    }
    match first_non_invalid(root) {
        Some(c) => c.get_language() == Some(clang::Language::C),
        None => false,
    }
}

/// Truncates a file-unique-name to the configured maximum length, returning
/// `None` when it doesn't fit (the markup then falls back to a line-number
/// anchor per `--max-id-sz`).
pub fn clamp_to_max_len(name: Option<String>, max_len: usize) -> Option<String> {
    name.filter(|n| n.len() <= max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_type_canonicalization_collapses_and_dashes() {
        assert_eq!(canonicalize_param_type("int"), "int");
        assert_eq!(canonicalize_param_type("const char *"), "const-char-*");
        assert_eq!(canonicalize_param_type("unsigned   long"), "unsigned-long");
    }

    #[test]
    fn max_len_clamp_drops_overlong_names() {
        assert_eq!(clamp_to_max_len(Some("abc".into()), 2), None);
        assert_eq!(clamp_to_max_len(Some("ab".into()), 2), Some("ab".into()));
    }
}
