//! Command-line surface (A2) and resolved run configuration (A3).
//!
//! `clap`'s derive API can express most of §6's grammar directly, but it
//! has no way to say "this `-o` attaches to whichever input directory
//! came immediately before it" — that's positional-attachment semantics,
//! and clap groups all occurrences of a flag into one `Vec` regardless of
//! where they fell relative to positionals. So the root-pair attachment
//! is instead computed by re-walking the raw argument list ourselves,
//! outside of clap's structured parse, the same way the original CLI
//! layer had to.

use std::path::PathBuf;

use clap::Parser;

use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(
    name = "codebrowser",
    about = "Multi-translation-unit C/C++/Objective-C source indexer and cross-reference HTML renderer"
)]
pub struct Cli {
    /// Input directories; each is rendered under its own output root.
    #[arg(value_name = "inputDir")]
    pub input_dirs: Vec<PathBuf>,

    /// Attaches an output directory to the input directory that preceded it.
    #[arg(short = 'o', value_name = "outputDir")]
    output_dirs: Vec<PathBuf>,

    /// Extra argument appended to every command's own clang argv.
    #[arg(short = 'e', value_name = "clangArg")]
    pub extra_args: Vec<String>,

    /// Overrides the built-in HTML template.
    #[arg(short = 't', value_name = "templateFile")]
    pub template: Option<PathBuf>,

    /// Worker thread count; 0 (or unset) uses hardware concurrency.
    #[arg(short = 'j', default_value_t = 0)]
    pub jobs: usize,

    /// Maximum stored length of a file-unique-name before it degrades to a
    /// line-number anchor.
    #[arg(long = "max-id-sz", default_value_t = 128)]
    pub max_id_sz: usize,

    /// Registers an external tag-file resolver: a path and a base URL.
    #[arg(long = "doxytags", num_args = 2, value_names = ["tagfile", "baseUrl"])]
    doxytags: Vec<String>,

    /// Prints each parsed translation unit's cursor tree to stderr.
    #[arg(long)]
    pub dump_ast: bool,

    /// A single clang invocation's argv, consuming the remainder of the
    /// command line.
    #[arg(long = "cmd", num_args = 1.., allow_hyphen_values = true, conflicts_with = "db")]
    cmd: Vec<String>,

    /// A directory containing `compile_commands.json`.
    #[arg(long = "db", conflicts_with = "cmd")]
    db: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RootPair {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub enum CommandSource {
    Explicit(Vec<String>),
    Database(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub roots: Vec<RootPair>,
    pub extra_clang_args: Vec<String>,
    pub template_source: Option<PathBuf>,
    pub num_threads: usize,
    pub max_id_size: usize,
    pub doxytag_resolvers: Vec<(PathBuf, String)>,
    pub command_source: CommandSource,
    pub dump_ast: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let raw: Vec<String> = std::env::args().skip(1).collect();
        let roots = resolve_root_pairs(&raw)?;

        let command_source = match (self.cmd.is_empty(), &self.db) {
            (false, None) => CommandSource::Explicit(self.cmd),
            (true, Some(dir)) => CommandSource::Database(dir.clone()),
            (true, None) => return Err(ConfigError::MissingCommand),
            (false, Some(_)) => return Err(ConfigError::DuplicateCommand),
        };

        let num_threads = if self.jobs == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.jobs
        };

        if self.doxytags.len() % 2 != 0 {
            return Err(ConfigError::MalformedDoxytags);
        }
        let doxytag_resolvers = self
            .doxytags
            .chunks_exact(2)
            .map(|pair| (PathBuf::from(&pair[0]), pair[1].clone()))
            .collect();

        Ok(RunConfig {
            roots,
            extra_clang_args: self.extra_args,
            template_source: self.template,
            num_threads,
            max_id_size: self.max_id_sz,
            doxytag_resolvers,
            command_source,
            dump_ast: self.dump_ast,
        })
    }
}

/// Re-walks the raw argument list to attach each `-o <dir>` to the input
/// directory that most recently preceded it, defaulting unattached input
/// directories to an output root of `.`. Stops at `--cmd`/`--db`, which
/// terminate option parsing per §6.
fn resolve_root_pairs(args: &[String]) -> Result<Vec<RootPair>, ConfigError> {
    let mut roots: Vec<RootPair> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--cmd" | "--db" => break,
            "-o" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| ConfigError::DanglingOutputFlag(args[i].clone()))?;
                match roots.last_mut() {
                    Some(root) => root.output = PathBuf::from(value),
                    None => return Err(ConfigError::DanglingOutputFlag(args[i].clone())),
                }
                i += 2;
            }
            "-e" | "-t" | "-j" | "--max-id-sz" => {
                i += 2;
            }
            "--doxytags" => {
                i += 3;
            }
            "--dump-ast" => {
                i += 1;
            }
            s if s.starts_with('-') => {
                i += 1;
            }
            other => {
                roots.push(RootPair {
                    input: PathBuf::from(other),
                    output: PathBuf::from("."),
                });
                i += 1;
            }
        }
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn unattached_input_dirs_default_output_to_dot() {
        let roots = resolve_root_pairs(&s(&["src", "--cmd", "clang", "-c", "a.c"])).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].input, PathBuf::from("src"));
        assert_eq!(roots[0].output, PathBuf::from("."));
    }

    #[test]
    fn dash_o_attaches_to_preceding_input_dir() {
        let roots = resolve_root_pairs(&s(&["src", "-o", "out", "--db", "."])).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].output, PathBuf::from("out"));
    }

    #[test]
    fn multiple_input_dirs_each_get_their_own_o() {
        let roots = resolve_root_pairs(&s(&[
            "a", "-o", "outa", "b", "-o", "outb", "--db", ".",
        ]))
        .unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].output, PathBuf::from("outa"));
        assert_eq!(roots[1].output, PathBuf::from("outb"));
    }

    #[test]
    fn dangling_o_with_no_preceding_input_dir_errors() {
        let err = resolve_root_pairs(&s(&["-o", "out", "--db", "."])).unwrap_err();
        assert!(matches!(err, ConfigError::DanglingOutputFlag(_)));
    }

    #[test]
    fn skips_flag_values_when_scanning_for_positionals() {
        let roots = resolve_root_pairs(&s(&[
            "-e",
            "-Wall",
            "src",
            "-j",
            "4",
            "--db",
            ".",
        ]))
        .unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].input, PathBuf::from("src"));
    }
}
