//! Compilation-database loader (A1): reads a `compile_commands.json`-style
//! file into the `(argv, cwd, filename)` triples `WorkerPool` consumes.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DbError;

/// One translation unit's worth of invocation: its full argv (including
/// argv[0]), the directory it should be invoked from, and the source file
/// it compiles.
#[derive(Debug, Clone)]
pub struct CompileCommand {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub filename: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    directory: String,
    file: String,
    command: Option<String>,
    arguments: Option<Vec<String>>,
}

/// Loads every entry of `compile_commands.json` in `db_dir`.
pub fn load(db_dir: &Path) -> Result<Vec<CompileCommand>, DbError> {
    let path = db_dir.join("compile_commands.json");
    let text = std::fs::read_to_string(&path).map_err(|e| DbError::Load {
        path: path.clone(),
        message: e.to_string(),
        code: 1,
    })?;

    let entries: Vec<RawEntry> = serde_json::from_str(&text).map_err(|e| DbError::Load {
        path: path.clone(),
        message: e.to_string(),
        code: 1,
    })?;

    entries
        .into_iter()
        .map(|entry| compile_command_from(entry, &path))
        .collect()
}

/// The source-file extensions recognized when picking the compiled file out
/// of a `--cmd` argv that has no `compile_commands.json` entry to name it.
const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "cxx", "C", "m", "mm", "h", "hpp", "hh",
];

/// Builds a single `CompileCommand` from a `--cmd` argv: the current
/// directory is the invocation's `cwd`, and the source file is the last
/// argument carrying a recognized extension.
pub fn single_command(argv: Vec<String>) -> Result<CompileCommand, DbError> {
    let cwd = std::env::current_dir().map_err(|e| DbError::Load {
        path: PathBuf::from("--cmd"),
        message: format!("cannot determine current directory: {e}"),
        code: 2,
    })?;

    let filename = argv
        .iter()
        .rev()
        .find(|arg| {
            Path::new(arg)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
        })
        .ok_or_else(|| DbError::Load {
            path: PathBuf::from("--cmd"),
            message: format!("no recognized source file in argv {argv:?}"),
            code: 2,
        })?;

    let filename = if Path::new(filename).is_absolute() {
        PathBuf::from(filename)
    } else {
        cwd.join(filename)
    };

    Ok(CompileCommand {
        argv,
        cwd,
        filename,
    })
}

fn compile_command_from(entry: RawEntry, db_path: &Path) -> Result<CompileCommand, DbError> {
    let argv = match (entry.arguments, entry.command) {
        (Some(args), _) => args,
        (None, Some(cmd)) => shell_words::split(&cmd).map_err(|e| DbError::Load {
            path: db_path.to_path_buf(),
            message: format!("cannot tokenize command string {cmd:?}: {e}"),
            code: 2,
        })?,
        (None, None) => {
            return Err(DbError::Load {
                path: db_path.to_path_buf(),
                message: format!(
                    "entry for {:?} has neither \"command\" nor \"arguments\"",
                    entry.file
                ),
                code: 2,
            })
        }
    };

    if entry.directory.is_empty() || entry.file.is_empty() {
        return Err(DbError::Load {
            path: db_path.to_path_buf(),
            message: "entry is missing \"directory\" or \"file\"".to_string(),
            code: 2,
        });
    }

    let cwd = PathBuf::from(&entry.directory);
    let filename = if Path::new(&entry.file).is_absolute() {
        PathBuf::from(&entry.file)
    } else {
        cwd.join(&entry.file)
    };

    Ok(CompileCommand {
        argv,
        cwd,
        filename,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_db(dir: &Path, json: &str) {
        let mut f = std::fs::File::create(dir.join("compile_commands.json")).unwrap();
        f.write_all(json.as_bytes()).unwrap();
    }

    #[test]
    fn loads_command_string_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_db(
            dir.path(),
            r#"[{"directory": "/proj", "command": "clang -c a.c -Wall", "file": "a.c"}]"#,
        );
        let cmds = load(dir.path()).unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].argv, vec!["clang", "-c", "a.c", "-Wall"]);
        assert_eq!(cmds[0].cwd, PathBuf::from("/proj"));
    }

    #[test]
    fn loads_arguments_array_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_db(
            dir.path(),
            r#"[{"directory": "/proj", "arguments": ["clang", "-c", "a.c"], "file": "a.c"}]"#,
        );
        let cmds = load(dir.path()).unwrap();
        assert_eq!(cmds[0].argv, vec!["clang", "-c", "a.c"]);
    }

    #[test]
    fn missing_db_file_is_db_error_code_one() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path()).unwrap_err();
        match err {
            DbError::Load { code, .. } => assert_eq!(code, 1),
        }
    }

    #[test]
    fn entry_missing_command_and_arguments_is_code_two() {
        let dir = tempfile::tempdir().unwrap();
        write_db(dir.path(), r#"[{"directory": "/proj", "file": "a.c"}]"#);
        let err = load(dir.path()).unwrap_err();
        match err {
            DbError::Load { code, .. } => assert_eq!(code, 2),
        }
    }

    #[test]
    fn single_command_picks_last_source_looking_argument() {
        let argv = vec![
            "clang".to_string(),
            "-Iinclude".to_string(),
            "-c".to_string(),
            "foo.cpp".to_string(),
        ];
        let cmd = single_command(argv.clone()).unwrap();
        assert_eq!(cmd.argv, argv);
        assert_eq!(cmd.filename.file_name().unwrap(), "foo.cpp");
    }

    #[test]
    fn single_command_with_no_source_file_is_code_two() {
        let err = single_command(vec!["clang".to_string(), "-Wall".to_string()]).unwrap_err();
        match err {
            DbError::Load { code, .. } => assert_eq!(code, 2),
        }
    }
}
