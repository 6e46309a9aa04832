//! `--dump-ast` diagnostic cursor-tree dumper (A7, supplemental).
//!
//! Grounded in the original implementation's standalone `debug.cpp`/
//! `dbgmain.cpp` dumper: one line per cursor, indented by depth, printed to
//! stderr before normal annotation proceeds. Purely diagnostic — it never
//! touches the registry and has no effect on HTML output or exit code.

use clang::{Entity, EntityVisitResult, TranslationUnit};

/// Prints `tu`'s whole cursor tree to stderr, one line per cursor.
pub fn dump(tu: &TranslationUnit) {
    dump_cursor(tu.get_entity(), 0);
}

fn dump_cursor(cursor: Entity, depth: usize) {
    dump_one(cursor, depth);
    cursor.visit_children(|child, _parent| {
        dump_cursor(child, depth + 2);
        EntityVisitResult::Continue
    });
}

fn dump_one(cursor: Entity, depth: usize) {
    let indent = " ".repeat(depth);
    let kind = format!("{:?}", cursor.get_kind());
    let extent = cursor
        .get_range()
        .map(|r| format!("{:?}-{:?}", r.get_start(), r.get_end()))
        .unwrap_or_default();
    let name = cursor.get_name().unwrap_or_default();

    eprint!("{indent}{kind} {extent}");
    if !name.is_empty() {
        eprint!(" D:{name}");
    }
    if let Some(refd) = cursor.get_reference() {
        if refd == cursor {
            eprint!(" (self-ref)");
        } else {
            eprint!(" -> {:?}", refd.get_kind());
        }
    }
    eprintln!();
}
