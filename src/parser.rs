//! Thin integration layer around the `clang` crate (libclang bindings):
//! translation-unit parsing and the per-thread state it requires.
//!
//! `clang::Clang` owns the libclang context a `clang::Index` borrows from,
//! so the two can't be stored side by side in an ordinary struct without
//! a self-referential lifetime. Each worker thread instead gets one
//! `ParserEnv` for its entire run (never one per translation unit): the
//! `Clang` handle is leaked once per thread to manufacture the `'static`
//! borrow the `Index` needs, which is the accepted trade for a libclang
//! context that otherwise lives exactly as long as the thread does anyway.

use std::path::{Path, PathBuf};

use clang::{Clang, Index, TranslationUnit};

use crate::compdb::CompileCommand;
use crate::error::ParserError;

pub struct ParserEnv {
    index: Index<'static>,
}

impl ParserEnv {
    pub fn new() -> Result<Self, ParserError> {
        let clang = Clang::new().map_err(|message| ParserError::ParseFailed {
            argv: Vec::new(),
            message,
            code: 1,
        })?;
        let clang: &'static Clang = Box::leak(Box::new(clang));
        Ok(ParserEnv {
            index: Index::new(clang, false, false),
        })
    }

    /// Parses a single translation unit with detailed preprocessing
    /// records, which the annotator needs to walk inclusion directives
    /// and macro-expansion sites.
    #[tracing::instrument(skip(self, cmd), fields(file = %cmd.filename.display()))]
    pub fn parse(&self, cmd: &CompileCommand) -> Result<TranslationUnit<'_>, ParserError> {
        let args = clang_arguments(cmd);
        self.index
            .parser(&cmd.filename)
            .arguments(&args)
            .detailed_preprocessing_record(true)
            .skip_function_bodies(false)
            .parse()
            .map_err(|source| ParserError::ParseFailed {
                argv: cmd.argv.clone(),
                message: source.to_string(),
                code: 1,
            })
    }
}

/// The `clang` crate takes the translation unit's own file path as a
/// separate parameter from its arguments, so the compiler-binary name
/// (argv[0]) and the filename itself (wherever it appears in argv,
/// relative or absolute) are filtered out of the forwarded argument list.
fn clang_arguments(cmd: &CompileCommand) -> Vec<String> {
    cmd.argv
        .iter()
        .skip(1)
        .filter(|arg| !arg_names_file(arg, &cmd.cwd, &cmd.filename))
        .cloned()
        .collect()
}

fn arg_names_file(arg: &str, cwd: &Path, filename: &Path) -> bool {
    let candidate: PathBuf = if Path::new(arg).is_absolute() {
        PathBuf::from(arg)
    } else {
        cwd.join(arg)
    };
    candidate == filename
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiler_name_and_relative_filename_are_filtered() {
        let cmd = CompileCommand {
            argv: vec![
                "clang".to_string(),
                "-c".to_string(),
                "a.c".to_string(),
                "-Wall".to_string(),
            ],
            cwd: PathBuf::from("/proj"),
            filename: PathBuf::from("/proj/a.c"),
        };
        assert_eq!(clang_arguments(&cmd), vec!["-c", "-Wall"]);
    }

    #[test]
    fn absolute_filename_argument_is_filtered() {
        let cmd = CompileCommand {
            argv: vec![
                "clang".to_string(),
                "-c".to_string(),
                "/proj/a.c".to_string(),
            ],
            cwd: PathBuf::from("/proj"),
            filename: PathBuf::from("/proj/a.c"),
        };
        assert_eq!(clang_arguments(&cmd), vec!["-c"]);
    }
}
