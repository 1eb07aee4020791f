//! The seven-phase compilation pipeline
//!
//! Parsing happens at entry (the module is immutable input to phase 1);
//! then validation, analysis, source optimization, mapping, target
//! optimization, generation and the optional external build run in strict
//! order. Each phase returns a `PhaseResult`; the orchestrator
//! accumulates them into the `PipelineResult` and stops at the first
//! failed phase.

use crate::build::BuildRunner;
use mgen_backend::{Backend, BackendRegistry, Preferences};
use mgen_error::Diagnostic;
use mgen_frontend::analysis::{self, ModuleSummary};
use mgen_frontend::optimize::{self, OptimizeStats};
use mgen_frontend::{inference, parser, validator};
use mgen_ir::ast::Module;
use mgen_ir::query;
use mgen_shared::{CompilationContext, DiagnosticEngine};
use mgen_types::{ScalarType, TargetTypeRegistry, Type};
use std::path::PathBuf;

/// The pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validation,
    Analysis,
    SourceOptimization,
    Mapping,
    TargetOptimization,
    Generation,
    Build,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Validation => "validation",
            Phase::Analysis => "analysis",
            Phase::SourceOptimization => "source-optimization",
            Phase::Mapping => "mapping",
            Phase::TargetOptimization => "target-optimization",
            Phase::Generation => "generation",
            Phase::Build => "build",
        };
        write!(f, "{}", name)
    }
}

/// What one phase produced
#[derive(Debug, Clone, Default)]
pub enum PhaseArtifact {
    #[default]
    None,
    /// Structural summaries from the analysis phase
    Summary(ModuleSummary),
    /// Rewrite counters from an optimization phase
    Rewrites(OptimizeStats),
    /// Peephole rewrite count from the target-optimization phase
    PeepholeCount(usize),
    /// The name mapping table from the mapping phase
    Mapping(MappingTable),
    /// The generated source text
    Source(String),
    /// Path of the built artifact
    Artifact(PathBuf),
}

/// Source-name to target-name resolutions, the mapping-phase artifact
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    /// (source type, concrete target type)
    pub types: Vec<(String, String)>,
    /// (builtin, concrete call prefix)
    pub builtins: Vec<(String, String)>,
}

/// Result of a single phase
#[derive(Debug)]
pub struct PhaseResult {
    pub phase: Phase,
    pub ok: bool,
    pub artifact: PhaseArtifact,
    pub diagnostics: Vec<Diagnostic>,
}

impl PhaseResult {
    fn ok(phase: Phase, artifact: PhaseArtifact) -> Self {
        PhaseResult {
            phase,
            ok: true,
            artifact,
            diagnostics: Vec::new(),
        }
    }

    fn failed(phase: Phase, diagnostics: Vec<Diagnostic>) -> Self {
        PhaseResult {
            phase,
            ok: false,
            artifact: PhaseArtifact::None,
            diagnostics,
        }
    }
}

/// The public result of one compile invocation
#[derive(Debug)]
pub struct PipelineResult {
    /// Whether every executed phase succeeded
    pub success: bool,
    /// Per-phase results, in execution order
    pub phases: Vec<PhaseResult>,
    /// The generated source text, when generation succeeded
    pub generated: Option<String>,
    /// An optional build descriptor file (name, contents)
    pub build_descriptor: Option<(String, String)>,
    /// All diagnostics, ordered by source location
    pub diagnostics: Vec<Diagnostic>,
}

impl PipelineResult {
    /// Whether any error-severity diagnostic is present
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Options beyond the (source, target, preferences) triple
#[derive(Default)]
pub struct CompileOptions<'a> {
    /// `key=value` preference overrides
    pub pref_overrides: Vec<(String, String)>,
    /// When set, phase 7 hands the generated text to this collaborator
    pub build_runner: Option<&'a dyn BuildRunner>,
    /// Directory the build step may write into
    pub build_dir: Option<PathBuf>,
    /// Also produce the backend's build descriptor
    pub want_build_descriptor: bool,
}

/// Compiles source text for a target with default options
///
/// ### Arguments
/// * `source_text` - The program source
/// * `source_filename` - Path used in diagnostics
/// * `target` - A registered target name ("c", "cpp", "rust", ...)
/// * `pref_overrides` - `key=value` preference overrides
pub fn compile(
    source_text: &str,
    source_filename: &str,
    target: &str,
    pref_overrides: &[(String, String)],
) -> PipelineResult {
    let options = CompileOptions {
        pref_overrides: pref_overrides.to_vec(),
        ..CompileOptions::default()
    };
    compile_with_options(source_text, source_filename, target, &options)
}

/// Compiles source text with full control over build and descriptors
pub fn compile_with_options(
    source_text: &str,
    source_filename: &str,
    target: &str,
    options: &CompileOptions,
) -> PipelineResult {
    let mut engine = DiagnosticEngine::new();
    engine.set_file_name(source_filename);
    let mut phases = Vec::new();

    // backend resolution and preference validation come first: malformed
    // values are errors before the pipeline starts
    let registry = BackendRegistry::global();
    let Some(schema) = registry.schema(target) else {
        let error = mgen_error::MgenError::UnknownTarget(target.to_string());
        let diagnostic = Diagnostic::error(
            mgen_error::ErrorCode::CodegenFailure,
            error.to_string(),
            mgen_ir::SourceLocation::default(),
        )
        .with_help(format!(
            "registered targets: {}",
            registry.list_targets().join(", ")
        ));
        engine.emit(diagnostic);
        return finish(false, phases, None, None, engine);
    };
    let prefs = match Preferences::with_overrides(schema, &options.pref_overrides) {
        Ok((prefs, warnings)) => {
            engine.emit_all(warnings);
            prefs
        }
        Err(errors) => {
            engine.emit_all(errors);
            return finish(false, phases, None, None, engine);
        }
    };
    let Some(mut backend) = registry.get_backend(target, prefs) else {
        return finish(false, phases, None, None, engine);
    };

    // parse at pipeline entry; the SourceModule is created here
    #[cfg(feature = "print-tokens")]
    if let Ok(tokens) = mgen_frontend::lexer::tokenize(source_text) {
        mgen_frontend::token_printer::print_tokens(&tokens);
    }
    let mut module = match parser::parse_source(source_text, source_filename) {
        Ok(module) => module,
        Err(errors) => {
            engine.emit_all(errors);
            return finish(false, phases, None, None, engine);
        }
    };
    #[cfg(feature = "print-ast")]
    mgen_ir::ast_printer::print_module(&module);

    // phase 1: validation
    let violations = validator::validate(&module);
    if !violations.is_empty() {
        engine.emit_all(violations.clone());
        phases.push(PhaseResult::failed(Phase::Validation, violations));
        return finish(false, phases, None, None, engine);
    }
    phases.push(PhaseResult::ok(Phase::Validation, PhaseArtifact::None));

    // phase 2: analysis (summaries, record/function/import registration)
    let mut context = CompilationContext::new();
    let mut type_registry = TargetTypeRegistry::new(
        mgen_types::Target::from_name(target).unwrap_or(mgen_types::Target::C),
    );
    let summary = match analysis::analyze(&module, &mut context, &mut type_registry) {
        Ok(summary) => summary,
        Err(errors) => {
            engine.emit_all(errors.clone());
            phases.push(PhaseResult::failed(Phase::Analysis, errors));
            return finish(false, phases, None, None, engine);
        }
    };
    phases.push(PhaseResult::ok(
        Phase::Analysis,
        PhaseArtifact::Summary(summary),
    ));

    // phase 3: source optimization (constant folding, dead branches,
    // docstrings)
    let stats = optimize::optimize(&mut module);
    phases.push(PhaseResult::ok(
        Phase::SourceOptimization,
        PhaseArtifact::Rewrites(stats),
    ));

    // type inference runs between the source rewrites and mapping so the
    // mapping table sees final types
    let inference_errors = inference::infer(&mut module, &mut context, &type_registry);
    if !inference_errors.is_empty() {
        engine.emit_all(inference_errors.clone());
        phases.push(PhaseResult::failed(Phase::Mapping, inference_errors));
        return finish(false, phases, None, None, engine);
    }

    // phase 4: mapping (source names to backend-concrete names)
    let mapping = build_mapping_table(&module, &context, backend.as_ref());
    phases.push(PhaseResult::ok(
        Phase::Mapping,
        PhaseArtifact::Mapping(mapping),
    ));

    // phase 5: target optimization (backend peepholes)
    let rewrites = backend.optimize(&mut module);
    phases.push(PhaseResult::ok(
        Phase::TargetOptimization,
        PhaseArtifact::PeepholeCount(rewrites),
    ));

    // phase 6: generation
    let generated = match backend.emit(&module, &context) {
        Ok(text) => text,
        Err(errors) => {
            engine.emit_all(errors.clone());
            phases.push(PhaseResult::failed(Phase::Generation, errors));
            return finish(false, phases, None, None, engine);
        }
    };
    phases.push(PhaseResult::ok(
        Phase::Generation,
        PhaseArtifact::Source(generated.clone()),
    ));

    let module_name = module_name_of(source_filename);
    let build_descriptor = if options.want_build_descriptor {
        backend.build_descriptor(&module_name)
    } else {
        None
    };

    // phase 7: optional external build
    if let Some(runner) = options.build_runner {
        let build_dir = options
            .build_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        match crate::build::run_build(
            runner,
            &build_dir,
            &module_name,
            backend.file_extension(),
            &generated,
            backend.name(),
        ) {
            Ok(artifact) => {
                phases.push(PhaseResult::ok(Phase::Build, PhaseArtifact::Artifact(artifact)));
            }
            Err(diagnostic) => {
                engine.emit(diagnostic.clone());
                phases.push(PhaseResult::failed(Phase::Build, vec![diagnostic]));
                return finish(false, phases, Some(generated), build_descriptor, engine);
            }
        }
    }

    finish(true, phases, Some(generated), build_descriptor, engine)
}

fn finish(
    success: bool,
    phases: Vec<PhaseResult>,
    generated: Option<String>,
    build_descriptor: Option<(String, String)>,
    engine: DiagnosticEngine,
) -> PipelineResult {
    PipelineResult {
        success,
        phases,
        generated,
        build_descriptor,
        diagnostics: engine.into_sorted(),
    }
}

/// Builds the mapping-phase artifact: every type and builtin the module
/// uses, resolved to the backend's concrete spelling
fn build_mapping_table(
    module: &Module,
    context: &CompilationContext,
    backend: &dyn Backend,
) -> MappingTable {
    let mut table = MappingTable::default();

    let mut record_types = |ty: &Type| {
        let source = ty.to_string();
        if table.types.iter().any(|(existing, _)| existing == &source) {
            return;
        }
        if let Some(concrete) = backend.map_type(ty, context) {
            table.types.push((source, concrete));
        }
    };
    for scalar in ScalarType::variants() {
        record_types(&Type::Scalar(scalar));
    }
    for record in context.records() {
        record_types(&Type::Record(record.name.clone()));
    }
    query::walk_statements(&module.items, &mut |stmt| {
        if let mgen_ir::ast::Statement::Assign(assign) = stmt {
            if assign.ty.is_container() {
                record_types(&assign.ty);
            }
        }
    });

    let mut seen_builtins: Vec<String> = Vec::new();
    query::walk_statements(&module.items, &mut |stmt| {
        query::statement_expressions(stmt, &mut |expr| {
            if let mgen_ir::ast::Expression::Call(call) = expr {
                if !seen_builtins.contains(&call.function) {
                    if let Some(concrete) = backend.map_builtin(&call.function) {
                        seen_builtins.push(call.function.clone());
                        table
                            .builtins
                            .push((call.function.clone(), concrete.to_string()));
                    }
                }
            }
        });
    });

    table
}

/// `examples/fib.py` → `fib`
fn module_name_of(source_filename: &str) -> String {
    std::path::Path::new(source_filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("module")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_come_from_the_stem() {
        assert_eq!(module_name_of("examples/fib.py"), "fib");
        assert_eq!(module_name_of("fib.py"), "fib");
        assert_eq!(module_name_of(""), "module");
    }
}
