use crate::error::{CliError, CliResult};
use crate::exit;
use clap::{Parser as ClapParser, Subcommand};
use mgen::build::{BuildRunner, CommandBuildRunner};
use mgen::pipeline::{self, CompileOptions};
use colored::Colorize;
use mgen_backend::BackendRegistry;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line interface for the MGen compiler
#[derive(ClapParser)]
#[command(
    version,
    about = "MGen source-to-source compiler",
    long_about = r#"MGen translates a statically-typed subset of a Python-like language
into C, C++, Rust, Go, Haskell or OCaml source code."#,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for the MGen CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Compile a source file to a target language
    Compile {
        /// Input source file
        input: String,

        /// Target language (see `mgen targets`)
        #[arg(short, long, default_value = "c")]
        target: String,

        /// Output file (default: input stem with the target extension)
        #[arg(short, long)]
        output: Option<String>,

        /// Preference override, `key=value` (repeatable)
        #[arg(short, long = "pref")]
        prefs: Vec<String>,

        /// Disable colored diagnostics
        #[arg(long)]
        no_color: bool,

        /// Also write the target's build descriptor next to the output
        #[arg(long)]
        build_descriptor: bool,

        /// Hand the generated source to the external build toolchain
        #[arg(long)]
        build: bool,

        /// Abort the external build after this many seconds
        #[arg(long)]
        build_timeout: Option<u64>,
    },

    /// List the registered target languages
    Targets,
}

/// Runs a parsed CLI invocation
pub fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Some(Commands::Compile {
            input,
            target,
            output,
            prefs,
            no_color,
            build_descriptor,
            build,
            build_timeout,
        }) => compile_file(
            &input,
            &target,
            output,
            &prefs,
            no_color,
            build_descriptor,
            build,
            build_timeout,
        ),
        Some(Commands::Targets) => {
            for name in BackendRegistry::global().list_targets() {
                println!("{}", name);
            }
            Ok(())
        }
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn compile_file(
    input: &str,
    target: &str,
    output: Option<String>,
    prefs: &[String],
    no_color: bool,
    want_build_descriptor: bool,
    build: bool,
    build_timeout: Option<u64>,
) -> CliResult<()> {
    if no_color {
        colored::control::set_override(false);
    }

    let source = fs::read_to_string(input).map_err(|e| CliError::from_read_error(e, input))?;
    let pref_overrides = parse_pref_overrides(prefs)?;

    let runner = build.then(|| CommandBuildRunner::new(build_timeout.map(Duration::from_secs)));
    let output_path = resolve_output_path(input, target, output.as_deref());
    let options = CompileOptions {
        pref_overrides,
        build_runner: runner.as_ref().map(|r| r as &dyn BuildRunner),
        build_dir: output_path.parent().map(Path::to_path_buf),
        want_build_descriptor,
    };

    let result = pipeline::compile_with_options(&source, input, target, &options);

    if !result.diagnostics.is_empty() {
        report_diagnostics(&result, input, &source);
    }
    if !result.success || result.has_errors() {
        return Err(CliError::Generic {
            message: format!("could not compile '{}'", input),
            exit_code: exit::Code::DataErr,
        });
    }

    let generated = result.generated.as_deref().unwrap_or_default();
    let output_display = output_path.display().to_string();
    fs::write(&output_path, generated)
        .map_err(|e| CliError::from_write_error(e, &output_display))?;
    println!("Compiled {} to {}", input, output_display);

    if let Some((name, contents)) = &result.build_descriptor {
        let descriptor_path = output_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(name);
        let descriptor_display = descriptor_path.display().to_string();
        fs::write(&descriptor_path, contents)
            .map_err(|e| CliError::from_write_error(e, &descriptor_display))?;
        println!("Wrote {}", descriptor_display);
    }

    Ok(())
}

/// `key=value` strings into pairs, rejecting malformed ones early
fn parse_pref_overrides(prefs: &[String]) -> CliResult<Vec<(String, String)>> {
    let mut overrides = Vec::new();
    for pref in prefs {
        match pref.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                overrides.push((key.to_string(), value.to_string()));
            }
            _ => {
                return Err(CliError::Generic {
                    message: format!(
                        "malformed preference '{}': expected {}",
                        pref,
                        "key=value".bold()
                    ),
                    exit_code: exit::Code::Usage,
                });
            }
        }
    }
    Ok(overrides)
}

/// The output path: explicit, or input stem plus the target's extension
fn resolve_output_path(input: &str, target: &str, output: Option<&str>) -> PathBuf {
    if let Some(output) = output {
        return PathBuf::from(output);
    }
    let stem = Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    let extension = BackendRegistry::global()
        .entry(target)
        .map(|entry| {
            let prefs = mgen_backend::Preferences::defaults(entry.schema);
            (entry.factory)(prefs).file_extension()
        })
        .unwrap_or("txt");
    PathBuf::from(format!("{}.{}", stem, extension))
}

/// Renders every diagnostic of a result with the shared engine
fn report_diagnostics(result: &pipeline::PipelineResult, input: &str, source: &str) {
    let mut engine = mgen_shared::DiagnosticEngine::new();
    engine.set_file_name(input);
    engine.emit_all(result.diagnostics.iter().cloned());
    engine.report_all(source);
}
