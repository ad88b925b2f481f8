//! CLI integration tests, running the compiled binary as a subprocess.

use std::fs;
use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const LIBRARY: &str = "\
TY  - JOUR
TI  - Machine learning for systematic reviews
AU  - Smith, John
AU  - Doe, Jane
PY  - 2020
ID  - 1
ER  -

TY  - JOUR
TI  - Machine Learning for Systematic Reviews.
AU  - Smith, J.
AU  - Doe, J.
PY  - 2020
ID  - 2
ER  -

TY  - JOUR
TI  - A survey of protein folding
AU  - Lee, Kim
PY  - 2018
ID  - 3
ER  -
";

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_refdedupe"))
        .args(args)
        .arg("--no-color")
        .env_remove("REFDEDUPE_LOG")
        .output()
        .unwrap()
}

fn temp_file(content: &str, extension: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(extension)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_count() {
    let library = temp_file(LIBRARY, ".ris");
    let output = run(&[library.path().to_str().unwrap(), "-c"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Found 3 references");
}

#[test]
fn test_count_concatenates_files() {
    let first = temp_file(LIBRARY, ".ris");
    let second = temp_file(LIBRARY, ".ris");
    let output = run(&[
        first.path().to_str().unwrap(),
        second.path().to_str().unwrap(),
        "--count",
    ]);
    assert_eq!(stdout(&output).trim(), "Found 6 references");
}

#[test]
fn test_json_is_default_output() {
    let library = temp_file(LIBRARY, ".ris");
    let output = run(&[library.path().to_str().unwrap()]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 3);
    assert!(stdout(&output).contains("\n\t{"));
}

#[test]
fn test_dedupe_remove_count() {
    let library = temp_file(LIBRARY, ".ris");
    let output = run(&[library.path().to_str().unwrap(), "-d", "remove", "-c"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output).trim(),
        "Found 2 references\nFound 1 duplicates"
    );
}

#[test]
fn test_dedupe_mark_to_file() {
    let library = temp_file(LIBRARY, ".ris");
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("marked.xml");
    let output = run(&[
        library.path().to_str().unwrap(),
        "--dedupe",
        "mark",
        "-f",
        target.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let xml = fs::read_to_string(&target).unwrap();
    assert_eq!(xml.matches("<record>").count(), 3);
    assert!(xml.contains("<caption>DUPE OF 1</caption>"));
}

#[test]
fn test_unreadable_file() {
    let output = run(&["does-not-exist.ris"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ERROR File \"does-not-exist.ris\" is not readable"));
}

#[test]
fn test_conflicting_output_modes() {
    let library = temp_file(LIBRARY, ".ris");
    let output = run(&[library.path().to_str().unwrap(), "-c", "-x"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Only one output mode can be used"));
}

#[test]
fn test_unknown_output_file_format() {
    let library = temp_file(LIBRARY, ".ris");
    let output = run(&[library.path().to_str().unwrap(), "-f", "out.docx"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unknown output file format"));
}

#[test]
fn test_invalid_threshold() {
    let library = temp_file(LIBRARY, ".ris");
    let output = run(&[library.path().to_str().unwrap(), "-d", "count", "--threshold", "1.5"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Threshold must be within [0, 1], got 1.5"));
}

#[test]
fn test_single_record_skips_dedupe() {
    let single = "TY  - JOUR\nTI  - Only one\nER  -\n";
    let library = temp_file(single, ".ris");
    let output = run(&[library.path().to_str().unwrap(), "-d", "remove", "-c"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "Found 1 references");
}
