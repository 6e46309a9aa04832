//! `FileEntry` and `SymbolDeclaration`: long-lived, registry-owned values
//! handed out to callers as `Arc`s so markups and cross-references keep a
//! stable handle to them even as the registry's maps keep growing while
//! other translation units are still being parsed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::markup_builder::MarkupBuilder;
use crate::model::file_id::FileId;

/// Sentinel offset meaning "the file itself" rather than a specific byte.
pub const WHOLE_FILE_OFFSET: u32 = u32::MAX;

/// Per physical file: identity, root pair, claim state, and the growing
/// markup list for that file.
///
/// Shared across threads as `Arc<FileEntry>` once handed out by the
/// registry, so every field that can be written after construction needs
/// its own interior synchronization; `disabled_ranges` is only ever
/// appended to by the single thread that claimed the file, but it is still
/// `Mutex`-guarded for the same reason `MarkupBuilder` is, rather than
/// relying on that invariant to justify unsafe interior mutability.
pub struct FileEntry {
    pub file_id: FileId,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Path relative to `input_root`.
    pub rel_path: PathBuf,
    claimed: AtomicBool,
    pub markups: MarkupBuilder,
    disabled_ranges: Mutex<Vec<(u32, u32)>>,
}

impl FileEntry {
    pub fn new(file_id: FileId, input_root: PathBuf, output_root: PathBuf, rel_path: PathBuf) -> Self {
        FileEntry {
            file_id,
            input_root,
            output_root,
            rel_path,
            claimed: AtomicBool::new(false),
            markups: MarkupBuilder::new(),
            disabled_ranges: Mutex::new(Vec::new()),
        }
    }

    /// Atomic test-and-set; returns `true` for exactly one caller.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn push_disabled_range(&self, begin: u32, end: u32) {
        self.disabled_ranges.lock().push((begin, end));
    }

    pub fn disabled_ranges(&self) -> Vec<(u32, u32)> {
        self.disabled_ranges.lock().clone()
    }

    pub fn output_path(&self) -> PathBuf {
        let mut p = self.output_root.join(&self.rel_path);
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".html");
        p.set_file_name(name);
        p
    }
}

/// A declaration site: which file, which line, and its (possibly
/// not-yet-known) file-unique name. Shared as `Arc<SymbolDeclaration>`;
/// `file_unique_name` may be filled in once, later, by whichever cursor
/// visit turns out to be the main cursor.
pub struct SymbolDeclaration {
    pub file: Arc<FileEntry>,
    pub lineno: u32,
    file_unique_name: Mutex<Option<String>>,
}

impl SymbolDeclaration {
    pub fn new(file: Arc<FileEntry>, lineno: u32) -> Self {
        SymbolDeclaration {
            file,
            lineno,
            file_unique_name: Mutex::new(None),
        }
    }

    pub fn file_unique_name(&self) -> Option<String> {
        self.file_unique_name.lock().clone()
    }

    /// Populates the name on first successful call only; later callers
    /// (e.g. a redeclaration visited after the main cursor) are no-ops.
    pub fn set_file_unique_name_if_absent(&self, name: String) {
        let mut guard = self.file_unique_name.lock();
        if guard.is_none() {
            *guard = Some(name);
        }
    }
}
