use crate::test_utils::{ALL_TARGETS, FIB, MATMUL, WORD_COUNT, compile_for};

/// Property 3: identical inputs produce byte-identical generated text
#[test]
fn regeneration_is_byte_identical() {
    for target in ALL_TARGETS {
        for source in [FIB, WORD_COUNT] {
            let first = compile_for(target, source);
            let second = compile_for(target, source);
            assert_eq!(
                first.generated, second.generated,
                "output drift for '{}'",
                target
            );
        }
    }
}

/// Property 5: one container implementation per compile, however many
/// bindings share it
#[test]
fn c_containers_are_emitted_once() {
    let source = "def f() -> int:
    xs: list[int] = []
    ys: list[int] = []
    xs.append(1)
    ys.append(2)
    return xs[0] + ys[0]
";
    let result = compile_for("c", source);
    assert!(result.success, "{:?}", result.diagnostics);
    let generated = result.generated.expect("generated");
    assert_eq!(
        generated.matches("void vec_int_push(vec_int* v, int value) {").count(),
        1,
        "output:\n{}",
        generated
    );
}

/// Nested containers pull their dependency exactly once and before the
/// dependent
#[test]
fn c_nested_containers_order_dependencies_first() {
    let result = compile_for("c", MATMUL);
    assert!(result.success, "{:?}", result.diagnostics);
    let generated = result.generated.expect("generated");
    let inner = generated.find("} vec_int;").expect("vec_int emitted");
    let outer = generated.find("} vec_vec_int;").expect("vec_vec_int emitted");
    assert!(inner < outer);
    assert_eq!(generated.matches("} vec_int;").count(), 1);
}

/// Diagnostics are ordered by source location regardless of the phase
/// that produced them
#[test]
fn diagnostics_are_location_ordered() {
    let source = "def a():\n    yield 1\n\ndef b() -> None:\n    del b\n\ndef c():\n    yield 3\n";
    let result = compile_for("c", source);
    assert!(!result.success);
    let lines: Vec<usize> = result.diagnostics.iter().map(|d| d.location.line).collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(lines, sorted);
    assert_eq!(lines.len(), 3);
}

/// Property 6: every diagnostic points into the input
#[test]
fn diagnostics_carry_valid_locations() {
    let source = "def f(x) -> int:\n    return eval(\"x\")\n";
    let result = compile_for("c", source);
    assert!(!result.success);
    let line_count = source.lines().count();
    for diagnostic in &result.diagnostics {
        assert!(diagnostic.location.line >= 1);
        assert!(diagnostic.location.line <= line_count);
        assert!(diagnostic.location.column >= 1);
    }
}
