//! Interface to the external build collaborator
//!
//! The pipeline never invokes toolchains itself; phase 7 hands the
//! generated text to a `BuildRunner`. The CLI supplies the
//! process-spawning implementation below; embedders and tests can supply
//! their own.

use mgen_error::{Diagnostic, ErrorCode, MgenError};
use mgen_ir::SourceLocation;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// The external build step: turn a generated source file into an artifact
pub trait BuildRunner {
    /// ### Arguments
    /// * `target` - The backend name ("c", "rust", ...)
    /// * `source_path` - The generated source file on disk
    ///
    /// ### Returns
    /// Path of the built artifact, or a located E5002/E5003 diagnostic
    fn build(&self, target: &str, source_path: &Path) -> Result<PathBuf, Diagnostic>;
}

/// Writes the generated text next to the build directory and runs the
/// collaborator
pub fn run_build(
    runner: &dyn BuildRunner,
    build_dir: &Path,
    module_name: &str,
    extension: &str,
    generated: &str,
    target: &str,
) -> Result<PathBuf, Diagnostic> {
    let source_path = build_dir.join(format!("{}.{}", module_name, extension));
    std::fs::write(&source_path, generated).map_err(|error| {
        Diagnostic::error(
            ErrorCode::BuildFailure,
            format!("cannot write {}: {}", source_path.display(), MgenError::Io(error)),
            SourceLocation::default(),
        )
    })?;
    runner.build(target, &source_path)
}

/// Spawns the conventional toolchain for each target
pub struct CommandBuildRunner {
    /// Kill the child and report E5002 after this long
    pub timeout: Option<Duration>,
}

impl CommandBuildRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        CommandBuildRunner { timeout }
    }

    fn command_for(&self, target: &str, source_path: &Path, output: &Path) -> Option<Command> {
        let mut command = match target {
            "c" => {
                let mut c = Command::new("gcc");
                c.arg("-O2").arg("-o").arg(output).arg(source_path);
                c
            }
            "cpp" => {
                let mut c = Command::new("g++");
                c.arg("-std=c++17").arg("-O2").arg("-o").arg(output).arg(source_path);
                c
            }
            "rust" => {
                let mut c = Command::new("rustc");
                c.arg("-O").arg("-o").arg(output).arg(source_path);
                c
            }
            "go" => {
                let mut c = Command::new("go");
                c.arg("build").arg("-o").arg(output).arg(source_path);
                c
            }
            "haskell" => {
                let mut c = Command::new("ghc");
                c.arg("-O").arg("-o").arg(output).arg(source_path);
                c
            }
            "ocaml" => {
                let mut c = Command::new("ocamlfind");
                c.arg("ocamlopt")
                    .arg("-package")
                    .arg("str")
                    .arg("-linkpkg")
                    .arg("-o")
                    .arg(output)
                    .arg(source_path);
                c
            }
            _ => return None,
        };
        command.current_dir(source_path.parent().unwrap_or_else(|| Path::new(".")));
        Some(command)
    }
}

impl BuildRunner for CommandBuildRunner {
    fn build(&self, target: &str, source_path: &Path) -> Result<PathBuf, Diagnostic> {
        let output = source_path.with_extension("bin");
        let Some(mut command) = self.command_for(target, source_path, &output) else {
            return Err(Diagnostic::error(
                ErrorCode::BuildFailure,
                format!("no build command known for target '{}'", target),
                SourceLocation::default(),
            ));
        };

        let mut child = command.spawn().map_err(|error| {
            Diagnostic::error(
                ErrorCode::BuildFailure,
                format!("cannot start the {} build: {}", target, error),
                SourceLocation::default(),
            )
        })?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        return Ok(output);
                    }
                    return Err(Diagnostic::error(
                        ErrorCode::BuildFailure,
                        format!("the {} build exited with {}", target, status),
                        SourceLocation::default(),
                    ));
                }
                Ok(None) => {
                    if let Some(timeout) = self.timeout {
                        if started.elapsed() > timeout {
                            let _ = child.kill();
                            return Err(Diagnostic::error(
                                ErrorCode::BuildTimeout,
                                format!(
                                    "the {} build exceeded {} seconds",
                                    target,
                                    timeout.as_secs()
                                ),
                                SourceLocation::default(),
                            ));
                        }
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(error) => {
                    return Err(Diagnostic::error(
                        ErrorCode::BuildFailure,
                        format!("cannot wait for the {} build: {}", target, error),
                        SourceLocation::default(),
                    ));
                }
            }
        }
    }
}
