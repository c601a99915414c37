use blockpy_core::cli::Args;
use blockpy_core::codegen::{EmitOptions, TopLevelOrder};
use blockpy_core::{generate_python, generate_python_from_file, run_cli};
use clap::Parser;
use std::ffi::OsStr;
use std::fs;

const DOCUMENT: &str = r#"<xml>
  <variables><variable id="v1">high score</variable></variables>
  <block type="text_print" id="late" x="0" y="200">
    <value name="VALUE"><block type="variables_get" id="g"><field name="VAR" id="v1">high score</field></block></value>
  </block>
  <block type="variables_set" id="early" x="0" y="10">
    <field name="VAR" id="v1">high score</field>
    <value name="VALUE"><block type="math_number" id="n"><field name="NUM">0</field></block></value>
  </block>
</xml>"#;

#[test]
fn writes_python_and_normalized_document() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("program.xml");
    let output = dir.path().join("program.py");
    let normalized = dir.path().join("normalized.xml");
    fs::write(&input, DOCUMENT).unwrap();

    let args = Args::try_parse_from([
        OsStr::new("blockpy"),
        input.as_os_str(),
        output.as_os_str(),
        OsStr::new("--visual-order"),
        OsStr::new("--emit-document"),
        normalized.as_os_str(),
    ])
    .unwrap();
    run_cli(&args).unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "high_score = 0\nprint(high_score)\n"
    );
    let normalized = fs::read_to_string(&normalized).unwrap();
    assert!(normalized.contains(">high_score<"));
    assert!(!normalized.contains("high score"));
}

#[test]
fn insertion_order_is_the_default() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("program.xml");
    fs::write(&input, DOCUMENT).unwrap();
    assert_eq!(
        generate_python_from_file(&input, EmitOptions::default()).unwrap(),
        "print(high_score)\nhigh_score = 0\n"
    );
    let visual = EmitOptions {
        order: TopLevelOrder::Visual,
    };
    assert_eq!(
        generate_python(DOCUMENT, visual).unwrap(),
        "high_score = 0\nprint(high_score)\n"
    );
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let args = Args::try_parse_from([
        OsStr::new("blockpy"),
        dir.path().join("absent.xml").as_os_str(),
    ])
    .unwrap();
    let err = run_cli(&args).unwrap_err();
    assert!(err.to_string().contains("Input file not found"));
}

#[test]
fn malformed_document_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.xml");
    fs::write(&input, "<xml><block type=").unwrap();
    let args = Args::try_parse_from([OsStr::new("blockpy"), input.as_os_str()]).unwrap();
    let err = run_cli(&args).unwrap_err().to_string();
    assert!(err.starts_with("Document error:"));
    assert!(err.contains("broken.xml"));
}
