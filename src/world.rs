//! `MultiTuRegistry` (C5): the thread-safe, cross-TU coordination point.
//!
//! Every file, symbol, and USR the indexer ever sees funnels through one
//! registry instance shared (as `Arc<MultiTuRegistry>`) across every
//! worker thread. `FileEntry`/`SymbolDeclaration` values are handed out as
//! `Arc`s so a markup recorded while TU #3 is parsing keeps pointing at
//! the same object even after TU #40 registers a later-seen definition
//! for the same entity — see DESIGN.md for why this beats either eager
//! link resolution or a node-based map with raw borrowed references.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cli::RootPair;
use crate::doxytags::{self, ExternalRefLinker};
use crate::model::{FileEntry, FileId, Refd, SymbolDeclaration, WHOLE_FILE_OFFSET};
use crate::utils;

#[derive(Default)]
struct Inner {
    file_by_id: HashMap<FileId, Arc<FileEntry>>,
    symbol_by_key: HashMap<(FileId, u32), Arc<SymbolDeclaration>>,
    usr_defs: HashMap<String, Arc<SymbolDeclaration>>,
}

pub struct MultiTuRegistry {
    roots: Vec<RootPair>,
    root_prefix: PathBuf,
    max_id_size: usize,
    external_linkers: Vec<Box<dyn ExternalRefLinker>>,
    inner: Mutex<Inner>,
}

impl MultiTuRegistry {
    pub fn new(
        roots: Vec<RootPair>,
        max_id_size: usize,
        external_linkers: Vec<Box<dyn ExternalRefLinker>>,
    ) -> Self {
        let canonical_roots: Vec<RootPair> = roots
            .into_iter()
            .map(|r| RootPair {
                input: dunce::canonicalize(&r.input).unwrap_or(r.input),
                output: r.output,
            })
            .collect();
        let root_prefix =
            utils::longest_common_prefix(canonical_roots.iter().map(|r| r.input.as_path()));

        MultiTuRegistry {
            roots: canonical_roots,
            root_prefix,
            max_id_size,
            external_linkers,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Fast early-reject against the cached common prefix, followed by a
    /// proper per-root `starts_with` check.
    pub fn is_file_included(&self, path: &Path) -> bool {
        let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.root_prefix.as_os_str().is_empty() && !canonical.starts_with(&self.root_prefix) {
            return false;
        }
        self.root_for(&canonical).is_some()
    }

    fn root_for(&self, canonical_path: &Path) -> Option<&RootPair> {
        self.roots
            .iter()
            .filter(|r| canonical_path.starts_with(&r.input))
            .max_by_key(|r| r.input.as_os_str().len())
    }

    fn get_or_create_file_entry(&self, file_id: FileId, abs_path: &Path) -> Option<Arc<FileEntry>> {
        let canonical = dunce::canonicalize(abs_path).unwrap_or_else(|_| abs_path.to_path_buf());
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.file_by_id.get(&file_id) {
            return Some(existing.clone());
        }
        let root = self.root_for(&canonical)?;
        let rel_path = utils::relative_to(&canonical, &root.input);
        let entry = Arc::new(FileEntry::new(
            file_id,
            root.input.clone(),
            root.output.clone(),
            rel_path,
        ));
        inner.file_by_id.insert(file_id, entry.clone());
        Some(entry)
    }

    /// Returns a borrow-equivalent `Arc<FileEntry>` only to the first
    /// caller per `FileId` that passes the root filter.
    pub fn prepare_to_process(&self, file_id: FileId, abs_path: &Path) -> Option<Arc<FileEntry>> {
        let entry = self.get_or_create_file_entry(file_id, abs_path)?;
        entry.try_claim().then_some(entry)
    }

    /// Looks up (creating lazily if absent) the symbol at `(file_id,
    /// offset)`. The `name_thunk` is invoked, and its result stored,
    /// only when the symbol is newly created here and the name fits
    /// `max_id_size`.
    pub fn reference_symbol(
        &self,
        file_id: FileId,
        abs_path: &Path,
        lineno: u32,
        offset: u32,
        name_thunk: impl FnOnce() -> Option<String>,
    ) -> Option<Arc<SymbolDeclaration>> {
        let file_entry = self.get_or_create_file_entry(file_id, abs_path)?;
        let key = (file_id, offset);

        let (sym, is_new) = {
            let mut inner = self.inner.lock();
            if let Some(existing) = inner.symbol_by_key.get(&key) {
                (existing.clone(), false)
            } else {
                let sym = Arc::new(SymbolDeclaration::new(file_entry, lineno));
                inner.symbol_by_key.insert(key, sym.clone());
                (sym, true)
            }
        };

        if is_new {
            if let Some(name) = name_thunk() {
                if name.len() <= self.max_id_size {
                    sym.set_file_unique_name_if_absent(name);
                }
            }
        }
        Some(sym)
    }

    /// Forces the symbol at `(file_entry, offset)` to exist, used at a
    /// declaration site so its own `id` attribute can be emitted even
    /// before any reference would have created it.
    pub fn create_symbol(
        &self,
        file_entry: &Arc<FileEntry>,
        lineno: u32,
        offset: u32,
    ) -> Arc<SymbolDeclaration> {
        let key = (file_entry.file_id, offset);
        let mut inner = self.inner.lock();
        inner
            .symbol_by_key
            .entry(key)
            .or_insert_with(|| Arc::new(SymbolDeclaration::new(file_entry.clone(), lineno)))
            .clone()
    }

    /// The symbol representing "the whole file" (used for `#include`
    /// targets): `referenceSymbol(file, 0, UINT_MAX, ...)`.
    pub fn whole_file_symbol(
        &self,
        file_id: FileId,
        abs_path: &Path,
    ) -> Option<Arc<SymbolDeclaration>> {
        self.reference_symbol(file_id, abs_path, 0, WHOLE_FILE_OFFSET, || None)
    }

    /// Records a USR -> definition mapping. Ignored for an empty USR.
    /// Last writer wins across TUs (used only for cross-TU fallback
    /// resolution of markups that couldn't find an in-corpus link at the
    /// time they were produced).
    pub fn register_def(&self, usr: &str, sym: Arc<SymbolDeclaration>) {
        if usr.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.usr_defs.insert(usr.to_string(), sym).is_some() {
            tracing::debug!(usr, "duplicate USR definition registered across TUs");
        }
    }

    /// Render-phase-only lookup: a later TU may have produced the
    /// definition for `usr` after an earlier TU recorded a markup that
    /// could only resolve it indirectly.
    pub fn find_missing_def(&self, usr: &str) -> Option<Arc<SymbolDeclaration>> {
        self.inner.lock().usr_defs.get(usr).cloned()
    }

    pub fn link_external_ref(&self, cursor: &clang::Entity) -> Refd {
        doxytags::link_external_ref(&self.external_linkers, cursor)
    }

    /// The configured cap on a stored `fileUniqueName`, in bytes.
    pub fn max_id_size(&self) -> usize {
        self.max_id_size
    }

    /// All file entries registered so far, for the render phase.
    pub fn all_files(&self) -> Vec<Arc<FileEntry>> {
        self.inner.lock().file_by_id.values().cloned().collect()
    }
}

/// Resolves a deferred `refd` closure to a concrete `href`, or `None` if
/// it ultimately carries no link. `current_output` is the rendering
/// file's own output path, used to compute a relative link.
pub fn resolve_href(
    refd: &Refd,
    registry: &MultiTuRegistry,
    current_output: &Path,
) -> Option<String> {
    match refd {
        Refd::None => None,
        Refd::External(url) => Some(url.clone()),
        Refd::Direct(sym) => Some(href_to_symbol(sym, current_output)),
        Refd::ByUsr(usr) => {
            let sym = registry.find_missing_def(usr)?;
            Some(href_to_symbol(&sym, current_output))
        }
    }
}

fn href_to_symbol(sym: &SymbolDeclaration, current_output: &Path) -> String {
    let target_output = sym.file.output_path();
    let rel = pathdiff(&target_output, current_output);
    match sym.file_unique_name() {
        Some(name) => format!("{rel}#{name}"),
        None => format!("{rel}#{}L", sym.lineno),
    }
}

/// A minimal relative-path diff between two output files so links work
/// regardless of how deep the output tree is nested.
fn pathdiff(target: &Path, from: &Path) -> String {
    let from_dir = from.parent().unwrap_or_else(|| Path::new(""));
    match target.strip_prefix(from_dir) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => target.to_string_lossy().replace('\\', "/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileId;

    fn registry_for(dir: &Path) -> MultiTuRegistry {
        MultiTuRegistry::new(
            vec![RootPair {
                input: dir.to_path_buf(),
                output: dir.to_path_buf(),
            }],
            128,
            Vec::new(),
        )
    }

    #[test]
    fn once_only_claim_under_concurrent_calls() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.c");
        std::fs::write(&file, "").unwrap();
        let registry = Arc::new(registry_for(dir.path()));
        let id = FileId::from_parser_id((1, 2, 3));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let file = file.clone();
                std::thread::spawn(move || registry.prepare_to_process(id, &file).is_some())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn file_outside_roots_is_not_included() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_for(dir.path());
        assert!(!registry.is_file_included(Path::new("/definitely/outside/a.c")));
    }

    #[test]
    fn reference_symbol_only_computes_name_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.c");
        std::fs::write(&file, "").unwrap();
        let registry = registry_for(dir.path());
        let id = FileId::from_parser_id((4, 5, 6));

        let calls = std::cell::Cell::new(0);
        let sym1 = registry
            .reference_symbol(id, &file, 1, 0, || {
                calls.set(calls.get() + 1);
                Some("foo".to_string())
            })
            .unwrap();
        let sym2 = registry
            .reference_symbol(id, &file, 1, 0, || {
                calls.set(calls.get() + 1);
                Some("bar".to_string())
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&sym1, &sym2));
        assert_eq!(sym1.file_unique_name(), Some("foo".to_string()));
    }

    #[test]
    fn overlong_name_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.c");
        std::fs::write(&file, "").unwrap();
        let registry = MultiTuRegistry::new(
            vec![RootPair {
                input: dir.path().to_path_buf(),
                output: dir.path().to_path_buf(),
            }],
            2,
            Vec::new(),
        );
        let id = FileId::from_parser_id((7, 8, 9));
        let sym = registry
            .reference_symbol(id, &file, 1, 0, || Some("too-long".to_string()))
            .unwrap();
        assert_eq!(sym.file_unique_name(), None);
    }

    #[test]
    fn find_missing_def_sees_later_registration() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.c");
        std::fs::write(&file, "").unwrap();
        let registry = registry_for(dir.path());
        let id = FileId::from_parser_id((1, 1, 1));
        assert!(registry.find_missing_def("usr1").is_none());
        let sym = registry
            .reference_symbol(id, &file, 1, 0, || None)
            .unwrap();
        registry.register_def("usr1", sym);
        assert!(registry.find_missing_def("usr1").is_some());
    }
}
