//! Application entry point: CLI parsing, registry/resolver setup, the
//! parallel parse pass, and the parallel render pass.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, CommandSource};
use error::AppError;

mod cli;
mod compdb;
mod debug_dump;
mod doxytags;
mod error;
mod fallback_highlighter;
mod html_renderer;
mod indexer;
mod markup_builder;
mod model;
mod name_resolver;
mod parser;
mod tag_speller;
mod template;
mod utils;
mod worker_pool;
mod world;

fn main() {
    setup_tracing();

    if let Err(err) = run() {
        tracing::error!("{err}");
        std::process::exit(err.exit_code());
    }
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "codebrowser=info".into());
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .init();
}

fn run() -> Result<(), AppError> {
    let config = Cli::parse().into_config()?;

    let commands = match &config.command_source {
        CommandSource::Explicit(argv) => vec![compdb::single_command(argv.clone())?],
        CommandSource::Database(dir) => compdb::load(dir)?,
    };

    let mut external_linkers: Vec<Box<dyn doxytags::ExternalRefLinker>> = Vec::new();
    for (tagfile, base_url) in &config.doxytag_resolvers {
        let resolver = doxytags::DoxygenTagResolver::load(tagfile, base_url).map_err(|e| {
            AppError::Io(error::IoError::Read {
                path: tagfile.clone(),
                stage: "loading doxygen tag file",
                source: std::io::Error::other(e),
            })
        })?;
        external_linkers.push(Box::new(resolver));
    }

    let registry = Arc::new(world::MultiTuRegistry::new(
        config.roots.clone(),
        config.max_id_size,
        external_linkers,
    ));

    tracing::info!(
        translation_units = commands.len(),
        threads = config.num_threads,
        "starting parse pass"
    );
    worker_pool::run(
        &commands,
        &registry,
        config.num_threads,
        &config.extra_clang_args,
        config.dump_ast,
    )?;

    let template = match &config.template_source {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| {
                error::IoError::Read {
                    path: path.clone(),
                    stage: "reading template file",
                    source,
                }
            })?;
            template::SimpleTemplate::new(&text)
        }
        None => template::SimpleTemplate::builtin(),
    };

    let files = registry.all_files();
    tracing::info!(files = files.len(), "starting render pass");

    use rayon::prelude::*;
    let first_error = files
        .par_iter()
        .filter_map(|file_entry| {
            html_renderer::render_file(file_entry, &registry, &template).err()
        })
        .find_any(|_| true);

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
