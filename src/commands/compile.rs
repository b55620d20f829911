//! Implementation of the `compile` command: the full pipeline from input
//! document to written artifacts.
//!
//! The pipeline is strictly staged — read, parse, build, validate, render
//! DOT, run every backend — and only writes files once every stage has
//! succeeded, so a failing compile leaves no partial output behind.

use std::fs;
use std::path::Path;

use hsm_codegen::Artifact;
use hsm_codegen::dot;
use hsm_model::Diagnostic;
use hsm_model::Lang;
use hsm_model::Machine;
use hsm_model::Validator;
use tracing::debug;
use tracing::info;

use crate::Hsmc;

/// Runs the compile pipeline for the given arguments.
///
/// On failure, every collected diagnostic is returned for the caller to
/// report; nothing has been written in that case.
pub fn compile(args: Hsmc) -> Result<(), Vec<Diagnostic>> {
    let source = fs::read_to_string(&args.input).map_err(|e| {
        vec![
            Diagnostic::input(format!("cannot open input file: {e}"))
                .with_path(args.input.display().to_string()),
        ]
    })?;

    debug!(input = %args.input.display(), "loading model");
    let machine = Machine::parse(&source).map_err(|d| vec![d])?;
    Validator::default().validate(&machine)?;

    let langs: Vec<Lang> = match &args.lang {
        Some(name) => vec![name.parse().map_err(|d| vec![d])?],
        None if !machine.langs().is_empty() => machine.langs().to_vec(),
        None => {
            return Err(vec![Diagnostic::input(
                "no target language: the model declares no `lang` and `--lang` was not given",
            )]);
        }
    };

    let base_name = args
        .output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            vec![
                Diagnostic::input("the output base path has no file name")
                    .with_path(args.output.display().to_string()),
            ]
        })?;

    // Generate everything before writing anything.
    let mut artifacts = vec![Artifact {
        file_name: format!("{base_name}.dot"),
        contents: dot::render(&machine),
    }];
    for lang in langs {
        debug!(%lang, "running backend");
        let generated = hsm_codegen::emit(&machine, lang, base_name)
            .map_err(|e| vec![Diagnostic::emission(e.to_string())])?;
        artifacts.extend(generated);
    }

    let dir = args.output.parent().unwrap_or(Path::new("."));
    for artifact in &artifacts {
        let path = if dir.as_os_str().is_empty() {
            Path::new(&artifact.file_name).to_path_buf()
        } else {
            dir.join(&artifact.file_name)
        };
        fs::write(&path, &artifact.contents).map_err(|e| {
            vec![
                Diagnostic::input(format!("cannot write output file: {e}"))
                    .with_path(path.display().to_string()),
            ]
        })?;
        info!(path = %path.display(), "wrote artifact");
    }

    Ok(())
}
