//! Concurrent compilation-command execution with per-command `cwd`
//! serialization (C7).
//!
//! libclang's `CXIndex`/`CXTranslationUnit` creation is not safe to race
//! across threads on its very first use, so the first command is always
//! sequenced on the caller thread before any worker is spawned (mirrors
//! the original implementation's single-threaded startup, generalized
//! here to a real pool). Everything after that runs `N` threads wide,
//! including the caller thread itself as one of the `N` participants.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::compdb::CompileCommand;
use crate::debug_dump;
use crate::error::AppError;
use crate::indexer;
use crate::parser::ParserEnv;
use crate::world::MultiTuRegistry;

struct CwdState {
    current: Option<PathBuf>,
    count: usize,
}

/// Serializes `std::env::set_current_dir` calls across worker threads: the
/// parser library consults the process-wide working directory, so commands
/// that need different directories must never run concurrently, while
/// commands sharing one directory may.
struct CwdController {
    state: Mutex<CwdState>,
    condvar: Condvar,
}

/// Held by a worker for the duration of one command; releases its claim on
/// the shared directory (and wakes any waiter) on drop, including on the
/// unwinding path if `parse` panics.
struct CwdGuard<'a> {
    controller: &'a CwdController,
}

impl CwdController {
    fn new() -> Self {
        CwdController {
            state: Mutex::new(CwdState {
                current: None,
                count: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until `dir` is (or becomes) the process's current directory
    /// and this caller has registered itself as one of its holders, or
    /// until `cancel` is observed set. Checked at loop head and after every
    /// wake so a worker parked here never starts a fresh parse once
    /// cancellation has been requested.
    fn acquire<'a>(&'a self, dir: &Path, cancel: &AtomicBool) -> std::io::Result<Option<CwdGuard<'a>>> {
        let mut state = self.state.lock();
        loop {
            if cancel.load(Ordering::Acquire) {
                return Ok(None);
            }
            if state.current.as_deref() == Some(dir) {
                state.count += 1;
                break;
            }
            if state.count == 0 {
                std::env::set_current_dir(dir)?;
                state.current = Some(dir.to_path_buf());
                state.count = 1;
                break;
            }
            self.condvar.wait(&mut state);
        }
        Ok(Some(CwdGuard { controller: self }))
    }
}

impl Drop for CwdGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.state.lock();
        state.count -= 1;
        if state.count == 0 {
            self.controller.condvar.notify_all();
        }
    }
}

struct Shared<'a> {
    commands: &'a [CompileCommand],
    registry: &'a MultiTuRegistry,
    extra_args: &'a [String],
    dump_ast: bool,
    next_index: AtomicUsize,
    cancel: AtomicBool,
    completed: AtomicUsize,
    cwd: CwdController,
    first_error: Mutex<Option<AppError>>,
}

/// Runs every command in `commands` across `num_threads` workers (the
/// caller thread included), claiming and annotating each command's
/// translation unit through `registry`. Returns the first error
/// encountered by any worker, if any; all other workers stop promptly
/// once an error is recorded.
pub fn run(
    commands: &[CompileCommand],
    registry: &MultiTuRegistry,
    num_threads: usize,
    extra_args: &[String],
    dump_ast: bool,
) -> Result<(), AppError> {
    if commands.is_empty() {
        return Ok(());
    }

    let shared = Arc::new(Shared {
        commands,
        registry,
        extra_args,
        dump_ast,
        next_index: AtomicUsize::new(0),
        cancel: AtomicBool::new(false),
        completed: AtomicUsize::new(0),
        cwd: CwdController::new(),
        first_error: Mutex::new(None),
    });

    // Sequence the very first command on the caller thread before any
    // worker is spawned: the parser library's first `Clang`/`Index`
    // construction races badly if two threads both hit it simultaneously.
    let first_parser_env = ParserEnv::new()?;
    run_one(&shared, 0, &first_parser_env)?;

    if shared.cancel.load(Ordering::Acquire) {
        return Err(shared.first_error.lock().take().unwrap());
    }

    let worker_count = num_threads.max(1).saturating_sub(1);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                let shared = shared.clone();
                scope.spawn(move || worker_loop(&shared))
            })
            .collect();

        worker_loop(&shared);

        for h in handles {
            let _ = h.join();
        }
    });

    match shared.first_error.lock().take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// One `ParserEnv` per worker thread for its entire run, never one per
/// translation unit.
fn worker_loop(shared: &Shared) {
    let parser_env = match ParserEnv::new() {
        Ok(env) => env,
        Err(e) => {
            let mut first = shared.first_error.lock();
            if first.is_none() {
                *first = Some(e.into());
            }
            shared.cancel.store(true, Ordering::Release);
            shared.cwd.condvar.notify_all();
            return;
        }
    };

    loop {
        if shared.cancel.load(Ordering::Acquire) {
            return;
        }
        let idx = shared.next_index.fetch_add(1, Ordering::SeqCst);
        if idx == 0 {
            // Index 0 was already claimed and run synchronously by `run`
            // before any worker started; skip it here.
            continue;
        }
        if idx >= shared.commands.len() {
            return;
        }
        if let Err(e) = run_one(shared, idx, &parser_env) {
            let mut first = shared.first_error.lock();
            if first.is_none() {
                *first = Some(e);
            }
            shared.cancel.store(true, Ordering::Release);
            shared.cwd.condvar.notify_all();
            return;
        }
    }
}

/// Runs command `idx` to completion: skips it cheaply (no directory lock
/// taken) if it names a file outside every configured input root,
/// otherwise claims the shared `cwd`, parses, optionally dumps the AST,
/// and annotates.
fn run_one(shared: &Shared, idx: usize, parser_env: &ParserEnv) -> Result<(), AppError> {
    let cmd = &shared.commands[idx];
    if !shared.registry.is_file_included(&cmd.filename) {
        return Ok(());
    }

    let Some(_cwd_guard) = shared
        .cwd
        .acquire(&cmd.cwd, &shared.cancel)
        .map_err(|e| AppError::Io(crate::error::IoError::Read {
            path: cmd.cwd.clone(),
            stage: "chdir before parse",
            source: e,
        }))?
    else {
        return Ok(());
    };

    let mut full_cmd = cmd.clone();
    full_cmd.argv.extend(shared.extra_args.iter().cloned());

    let tu = parser_env.parse(&full_cmd)?;
    if shared.dump_ast {
        debug_dump::dump(&tu);
    }
    indexer::annotate(&tu, shared.registry);

    let done = shared.completed.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!(
        file = %cmd.filename.display(),
        "parsed {done}/{} translation units",
        shared.commands.len()
    );
    Ok(())
}
