//! The model validation file tests.
//!
//! This test looks for directories in `tests/validation`.
//!
//! Each directory is expected to contain:
//!
//! * `source.yaml` - the test input document to load and validate.
//! * `source.errors` - the expected set of diagnostics, one per line (empty
//!   for documents that are expected to validate).
//!
//! The `source.errors` file may be automatically generated or updated by
//! setting the `BLESS` environment variable when running this test.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use anyhow::Context as _;
use anyhow::bail;
use hsm_model::Machine;
use hsm_model::Validator;
use libtest_mimic::Trial;
use pretty_assertions::StrComparison;

/// Normalizes a result.
fn normalize(s: &str) -> String {
    // Just normalize line endings
    s.replace("\r\n", "\n")
}

/// Find all the tests in the `tests/validation` directory.
fn find_tests() -> Vec<Trial> {
    Path::new("tests")
        .join("validation")
        .read_dir()
        .unwrap()
        .filter_map(|entry| {
            let entry = entry.expect("failed to read directory");
            let path = entry.path();
            if !path.is_dir() {
                return None;
            }

            let test_name = path
                .file_stem()
                .map(OsStr::to_string_lossy)
                .unwrap()
                .into_owned();
            Some(Trial::test(test_name, move || Ok(run_test(&path)?)))
        })
        .collect()
}

/// Compare the result of a test to the expected result.
fn compare_result(path: &Path, result: &str) -> Result<(), anyhow::Error> {
    let result = normalize(result);
    if env::var_os("BLESS").is_some() {
        fs::write(path, &result).context("writing result file")?;
        return Ok(());
    }

    let expected = fs::read_to_string(path)
        .context("reading result file")?
        .replace("\r\n", "\n");

    if expected != result {
        bail!(
            "result from `{path}` is not as expected:\n{diff}",
            path = path.display(),
            diff = StrComparison::new(&expected, &result),
        );
    }

    Ok(())
}

/// Loads and validates a document, collecting every diagnostic.
fn diagnose(source: &str) -> Vec<String> {
    match Machine::parse(source) {
        Ok(machine) => match Validator::default().validate(&machine) {
            Ok(()) => Vec::new(),
            Err(diagnostics) => diagnostics.iter().map(ToString::to_string).collect(),
        },
        Err(diagnostic) => vec![diagnostic.to_string()],
    }
}

/// Run a test.
fn run_test(test: &Path) -> Result<(), anyhow::Error> {
    let path = test.join("source.yaml");
    let source = fs::read_to_string(&path).context("reading source file")?;

    let mut result = String::new();
    for line in diagnose(&source) {
        result.push_str(&line);
        result.push('\n');
    }

    compare_result(&test.join("source.errors"), &result)
}

/// Run all the tests.
fn main() {
    let args = libtest_mimic::Arguments::from_args();
    libtest_mimic::run(&args, find_tests()).exit();
}
