//! Compiler from declarative hierarchical state machine models to executable
//! source and Graphviz diagrams.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use clap_verbosity_flag::WarnLevel;
use tracing_subscriber::EnvFilter;

pub mod commands;

/// Compiles a hierarchical state machine model to a Graphviz diagram and
/// executable source in one or more target languages.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Hsmc {
    /// The path to the state machine document.
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Override the target language declared by the model.
    #[arg(long, value_name = "LANG")]
    pub lang: Option<String>,

    /// The base path for output artifacts; extensions are appended.
    #[arg(short, long, value_name = "BASEPATH", default_value = "./statemachine")]
    pub output: PathBuf,

    /// The verbosity flags.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

/// The entry point of the `hsmc` binary.
pub fn hsmc_main() -> ExitCode {
    let args = Hsmc::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(args.verbosity.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match commands::compile::compile(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                eprintln!("{diagnostic}");
            }
            ExitCode::FAILURE
        }
    }
}
