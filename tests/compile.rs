//! End-to-end tests of the compile pipeline.

use std::fs;
use std::path::Path;

use clap::Parser;
use hsmc::Hsmc;
use hsmc::commands::compile::compile;
use pretty_assertions::assert_eq;

/// A multi-target model exercising all three backends.
const MODEL: &str = r#"
lang: [c, rust, python]
initial: a
context:
  - name: counter
    type: int
states:
  a:
    transitions:
      - guard: ctx->counter == 3
        to: b
  b:
    transitions:
      - to: null
"#;

/// Builds arguments as the CLI would.
fn args(input: &Path, base: &Path, extra: &[&str]) -> Hsmc {
    let mut argv = vec![
        "hsmc".to_string(),
        input.display().to_string(),
        "-o".to_string(),
        base.display().to_string(),
    ];
    argv.extend(extra.iter().map(ToString::to_string));
    Hsmc::parse_from(argv)
}

#[test]
fn compile_writes_every_artifact() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let input = dir.path().join("machine.yaml");
    fs::write(&input, MODEL).expect("input should be written");

    let base = dir.path().join("statemachine");
    compile(args(&input, &base, &[])).expect("compile should succeed");

    for ext in ["dot", "c", "h", "rs", "py"] {
        let path = dir.path().join(format!("statemachine.{ext}"));
        assert!(path.is_file(), "missing artifact {path:?}");
    }
}

#[test]
fn recompilation_is_byte_identical() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let input = dir.path().join("machine.yaml");
    fs::write(&input, MODEL).expect("input should be written");

    let base = dir.path().join("statemachine");
    compile(args(&input, &base, &[])).expect("first compile should succeed");
    let first: Vec<(String, Vec<u8>)> = ["dot", "c", "h", "rs", "py"]
        .iter()
        .map(|ext| {
            let path = dir.path().join(format!("statemachine.{ext}"));
            (ext.to_string(), fs::read(&path).expect("artifact should be readable"))
        })
        .collect();

    compile(args(&input, &base, &[])).expect("second compile should succeed");
    for (ext, contents) in first {
        let path = dir.path().join(format!("statemachine.{ext}"));
        assert_eq!(
            fs::read(&path).expect("artifact should be readable"),
            contents,
            "artifact .{ext} changed between identical runs"
        );
    }
}

#[test]
fn lang_flag_overrides_the_model() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let input = dir.path().join("machine.yaml");
    fs::write(&input, "lang: c\ninitial: a\nstates: {a: {}}\n").expect("input should be written");

    let base = dir.path().join("statemachine");
    compile(args(&input, &base, &["--lang", "python"])).expect("compile should succeed");

    assert!(dir.path().join("statemachine.py").is_file());
    assert!(!dir.path().join("statemachine.c").exists());
}

#[test]
fn validation_failure_writes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let input = dir.path().join("machine.yaml");
    fs::write(
        &input,
        "lang: c\ninitial: a\nstates:\n  a:\n    transitions:\n      - to: zzz\n",
    )
    .expect("input should be written");

    let base = dir.path().join("statemachine");
    let diagnostics =
        compile(args(&input, &base, &[])).expect_err("compile should fail validation");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].to_string(),
        "error: validation: /root/a: cannot resolve transition target `zzz`: `zzz` is not a \
         child of `/root`"
    );

    assert!(!dir.path().join("statemachine.dot").exists());
    assert!(!dir.path().join("statemachine.c").exists());
}

#[test]
fn missing_language_is_an_input_error() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let input = dir.path().join("machine.yaml");
    fs::write(&input, "initial: a\nstates: {a: {}}\n").expect("input should be written");

    let base = dir.path().join("statemachine");
    let diagnostics = compile(args(&input, &base, &[])).expect_err("compile should fail");
    assert!(diagnostics[0].to_string().starts_with("error: input: "));
}
