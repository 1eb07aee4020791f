use crate::test_utils::FIB;
use mgen::compile;

fn compile_with(target: &str, prefs: &[(&str, &str)]) -> mgen::PipelineResult {
    let overrides: Vec<(String, String)> = prefs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    compile(FIB, "test.py", target, &overrides)
}

#[test]
fn indent_size_changes_the_output() {
    let narrow = compile_with("c", &[("indent_size", "2")]);
    let wide = compile_with("c", &[("indent_size", "8")]);
    assert!(narrow.success && wide.success);
    assert_ne!(narrow.generated, wide.generated);
    assert!(wide.generated.expect("generated").contains("\n        "));
}

#[test]
fn brace_style_allman_splits_function_heads() {
    let result = compile_with("c", &[("brace_style", "allman")]);
    assert!(result.success);
    let generated = result.generated.expect("generated");
    assert!(
        generated.contains("int fib(int n)\n{"),
        "output:\n{}",
        generated
    );
}

#[test]
fn unknown_keys_warn_but_compile() {
    let result = compile_with("c", &[("tabs_mode", "wide")]);
    assert!(result.success);
    assert!(!result.has_errors());
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| !d.is_error() && d.message.contains("tabs_mode"))
    );
}

#[test]
fn malformed_values_error_before_the_pipeline() {
    let result = compile_with("c", &[("indent_size", "wide")]);
    assert!(!result.success);
    assert!(result.phases.is_empty());
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.is_error() && d.message.contains("expects an integer"))
    );
}

#[test]
fn choice_preferences_are_validated() {
    let result = compile_with("rust", &[("edition", "2015")]);
    assert!(!result.success);
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("must be one of"))
    );
}

#[test]
fn each_backend_accepts_its_documented_keys() {
    for (target, key, value) in [
        ("c", "container_mode", "generated"),
        ("cpp", "cpp_standard", "c++20"),
        ("rust", "clone_strategy", "explicit"),
        ("go", "use_generics", "false"),
        ("haskell", "use_native_comprehensions", "false"),
        ("ocaml", "prefer_immutable", "true"),
    ] {
        let result = compile_with(target, &[(key, value)]);
        assert!(
            result.success,
            "'{}' rejected {}={}: {:?}",
            target, key, value, result.diagnostics
        );
    }
}
