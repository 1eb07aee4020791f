use crate::test_utils::FIB;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn compiles_to_the_requested_target() {
    let temp_dir = TempDir::new().unwrap();
    let input_file = temp_dir.path().join("fib.py");
    let output_file = temp_dir.path().join("fib.c");

    fs::write(&input_file, FIB).unwrap();

    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.arg("compile")
        .arg(&input_file)
        .arg("--target")
        .arg("c")
        .arg("--output")
        .arg(&output_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Compiled"));

    let generated = fs::read_to_string(&output_file).unwrap();
    assert!(generated.contains("int fib(int n)"));
}

#[test]
fn default_output_uses_the_target_extension() {
    let temp_dir = TempDir::new().unwrap();
    let input_file = temp_dir.path().join("fib.py");
    fs::write(&input_file, FIB).unwrap();

    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("compile")
        .arg("fib.py")
        .arg("--target")
        .arg("rust")
        .assert()
        .success();

    assert!(temp_dir.path().join("fib.rs").exists());
}

#[test]
fn rejected_programs_render_diagnostics_and_fail() {
    let temp_dir = TempDir::new().unwrap();
    let input_file = temp_dir.path().join("gen.py");
    fs::write(&input_file, "def f():\n    yield 1\n").unwrap();

    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.arg("compile")
        .arg(&input_file)
        .arg("--no-color")
        .assert()
        .failure()
        .code(65)
        .stderr(predicate::str::contains("error[E1001]"))
        .stderr(predicate::str::contains("yield 1"))
        .stderr(predicate::str::contains("help: return a list"));
}

#[test]
fn missing_inputs_exit_with_noinput() {
    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.arg("compile")
        .arg("no-such-file.py")
        .assert()
        .failure()
        .code(66);
}

#[test]
fn malformed_preferences_are_usage_errors() {
    let temp_dir = TempDir::new().unwrap();
    let input_file = temp_dir.path().join("fib.py");
    fs::write(&input_file, FIB).unwrap();

    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.arg("compile")
        .arg(&input_file)
        .arg("--pref")
        .arg("indent_size")
        .assert()
        .failure()
        .code(64);
}

#[test]
fn preference_overrides_reach_the_backend() {
    let temp_dir = TempDir::new().unwrap();
    let input_file = temp_dir.path().join("fib.py");
    let output_file = temp_dir.path().join("fib.c");
    fs::write(&input_file, FIB).unwrap();

    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.arg("compile")
        .arg(&input_file)
        .arg("--output")
        .arg(&output_file)
        .arg("--pref")
        .arg("brace_style=allman")
        .assert()
        .success();

    let generated = fs::read_to_string(&output_file).unwrap();
    assert!(generated.contains("int fib(int n)\n{"));
}

#[test]
fn build_descriptors_are_written_on_request() {
    let temp_dir = TempDir::new().unwrap();
    let input_file = temp_dir.path().join("fib.py");
    fs::write(&input_file, FIB).unwrap();

    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("compile")
        .arg("fib.py")
        .arg("--target")
        .arg("go")
        .arg("--build-descriptor")
        .assert()
        .success()
        .stdout(predicate::str::contains("go.mod"));

    let descriptor = fs::read_to_string(temp_dir.path().join("go.mod")).unwrap();
    assert!(descriptor.contains("module fib"));
}
