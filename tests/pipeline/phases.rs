use crate::test_utils::{FIB, compile_for};
use mgen::{Phase, PhaseArtifact};

#[test]
fn successful_compiles_run_six_phases_in_order() {
    let result = compile_for("c", FIB);
    assert!(result.success);
    let order: Vec<Phase> = result.phases.iter().map(|p| p.phase).collect();
    assert_eq!(
        order,
        vec![
            Phase::Validation,
            Phase::Analysis,
            Phase::SourceOptimization,
            Phase::Mapping,
            Phase::TargetOptimization,
            Phase::Generation,
        ]
    );
    assert!(result.phases.iter().all(|p| p.ok));
}

#[test]
fn validation_failure_stops_the_pipeline() {
    let result = compile_for("c", "def f():\n    yield 1\n");
    assert!(!result.success);
    assert_eq!(result.phases.len(), 1);
    assert_eq!(result.phases[0].phase, Phase::Validation);
    assert!(!result.phases[0].ok);
    assert!(result.generated.is_none());
}

#[test]
fn import_failure_stops_after_analysis() {
    let result = compile_for("c", "import os\n\ndef f() -> int:\n    return 1\n");
    assert!(!result.success);
    let order: Vec<Phase> = result.phases.iter().map(|p| p.phase).collect();
    assert_eq!(order, vec![Phase::Validation, Phase::Analysis]);
    assert!(!result.phases[1].ok);
}

#[test]
fn inference_failure_prevents_generation() {
    let result = compile_for("c", "def f() -> None:\n    xs = []\n");
    assert!(!result.success);
    assert!(result.generated.is_none());
    assert!(
        result
            .phases
            .iter()
            .all(|p| p.phase != Phase::Generation)
    );
}

#[test]
fn source_optimization_reports_its_rewrites() {
    let source = "\"\"\"doc\"\"\"\ndef f() -> int:\n    x = 2 + 3\n    if True:\n        return x\n    return 0\n";
    let result = compile_for("c", source);
    assert!(result.success, "{:?}", result.diagnostics);
    let stats = result
        .phases
        .iter()
        .find_map(|p| match &p.artifact {
            PhaseArtifact::Rewrites(stats) => Some(*stats),
            _ => None,
        })
        .expect("optimization artifact");
    assert_eq!(stats.constants_folded, 1);
    assert_eq!(stats.branches_eliminated, 1);
    assert_eq!(stats.docstrings_stripped, 1);
}

#[test]
fn analysis_summarizes_functions_records_and_imports() {
    let source = "from dataclasses import dataclass\n\n@dataclass\nclass P:\n    x: int\n\ndef f() -> int:\n    return 1\n";
    let result = compile_for("c", source);
    assert!(result.success, "{:?}", result.diagnostics);
    let summary = result
        .phases
        .iter()
        .find_map(|p| match &p.artifact {
            PhaseArtifact::Summary(summary) => Some(summary.clone()),
            _ => None,
        })
        .expect("analysis artifact");
    assert_eq!(summary.functions, vec!["f".to_string()]);
    assert_eq!(summary.records, vec!["P".to_string()]);
    assert_eq!(
        summary.imports,
        vec![("dataclasses".to_string(), "dataclass".to_string())]
    );
}

#[test]
fn mapping_resolves_types_and_builtins() {
    let result = compile_for("rust", FIB);
    assert!(result.success);
    let mapping = result
        .phases
        .iter()
        .find_map(|p| match &p.artifact {
            PhaseArtifact::Mapping(mapping) => Some(mapping.clone()),
            _ => None,
        })
        .expect("mapping artifact");
    assert!(
        mapping
            .types
            .iter()
            .any(|(source, concrete)| source == "int" && concrete == "i64")
    );
    assert!(
        mapping
            .builtins
            .iter()
            .any(|(source, concrete)| source == "print" && concrete == "println!")
    );
}

#[test]
fn target_optimization_counts_peepholes() {
    let source = "def f(a: int, b: int) -> bool:\n    return not a == b\n";
    let result = compile_for("rust", source);
    assert!(result.success, "{:?}", result.diagnostics);
    let count = result
        .phases
        .iter()
        .find_map(|p| match &p.artifact {
            PhaseArtifact::PeepholeCount(count) => Some(*count),
            _ => None,
        })
        .expect("target optimization artifact");
    assert_eq!(count, 1);
    let generated = result.generated.expect("generated");
    assert!(generated.contains("!="), "output:\n{}", generated);
}

#[test]
fn unknown_targets_fail_before_any_phase() {
    let result = compile_for("cobol", FIB);
    assert!(!result.success);
    assert!(result.phases.is_empty());
    let error = &result.diagnostics[0];
    assert!(error.message.contains("unknown target"));
    let help = error.suggestion.as_ref().expect("lists targets");
    assert!(help.message.contains("haskell"));
}

#[test]
fn parse_errors_fail_before_validation() {
    let result = compile_for("c", "def f(:\n");
    assert!(!result.success);
    assert!(result.phases.is_empty());
    assert!(result.diagnostics.iter().any(|d| d.code.is_syntax_error()));
}
