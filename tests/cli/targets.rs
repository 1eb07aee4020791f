use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn lists_every_registered_backend() {
    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.arg("targets")
        .assert()
        .success()
        .stdout(predicate::str::contains("c\n"))
        .stdout(predicate::str::contains("cpp"))
        .stdout(predicate::str::contains("rust"))
        .stdout(predicate::str::contains("go"))
        .stdout(predicate::str::contains("haskell"))
        .stdout(predicate::str::contains("ocaml"));
}

#[test]
fn unknown_targets_fail_with_the_target_list() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let input_file = temp_dir.path().join("x.py");
    std::fs::write(&input_file, "def f() -> int:\n    return 1\n").unwrap();

    let mut cmd = Command::cargo_bin("mgen").unwrap();
    cmd.arg("compile")
        .arg(&input_file)
        .arg("--target")
        .arg("fortran")
        .arg("--no-color")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown target"));
}
