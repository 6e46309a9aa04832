//! Error taxonomy for the indexer.
//!
//! Every fallible operation in the crate funnels into [`AppError`], which also
//! carries the exit-code mapping the CLI driver uses.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl AppError {
    /// Maps an error to the process exit code documented for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 1,
            AppError::Parser(ParserError::ParseFailed { code, .. }) => 10 + code,
            AppError::Db(DbError::Load { code, .. }) => 20 + code,
            AppError::Io(_) => 1,
            AppError::Render(_) => 1,
            AppError::Resolve(_) => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no command source given: pass either --cmd or --db")]
    MissingCommand,

    #[error("both --cmd and --db were given; exactly one is allowed")]
    DuplicateCommand,

    #[error("-o must follow an input directory: {0}")]
    DanglingOutputFlag(String),

    #[error("invalid thread count: {0}")]
    InvalidThreadCount(String),

    #[error("--doxytags requires a tag-file path and a base url")]
    MalformedDoxytags,
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to parse translation unit for {argv:?}: {message} (code {code})")]
    ParseFailed {
        argv: Vec<String>,
        message: String,
        code: i32,
    },
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to load compilation database at {path}: {message} (code {code})")]
    Load {
        path: PathBuf,
        message: String,
        code: i32,
    },
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {path} during {stage}: {source}")]
    Read {
        path: PathBuf,
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path} during {stage}: {source}")]
    Write {
        path: PathBuf,
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{file}: markup offset {offset} is beyond end of file at line {line}")]
    OffsetBeyondEof {
        file: PathBuf,
        offset: u32,
        line: u32,
    },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{file}: template references unknown key {key:?}")]
    UnknownKey { file: PathBuf, key: String },
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
