use crate::ErrorCode;
use crate::test_utils::{
    ALL_TARGETS, COUNTER, FIB, MATMUL, NESTED_BUILD, WORD_COUNT, compile_errors, compile_ok,
};
use rstest::rstest;

#[rstest]
#[case::c("c")]
#[case::cpp("cpp")]
#[case::rust("rust")]
#[case::go("go")]
#[case::haskell("haskell")]
#[case::ocaml("ocaml")]
fn s1_fibonacci_compiles_everywhere(#[case] target: &str) {
    let generated = compile_ok(target, FIB);
    assert!(generated.contains("fib"), "missing fib in {}", target);
    assert!(generated.contains("29"), "missing call site in {}", target);
}

#[rstest]
#[case::c("c")]
#[case::cpp("cpp")]
#[case::rust("rust")]
#[case::go("go")]
#[case::haskell("haskell")]
#[case::ocaml("ocaml")]
fn s2_word_count_compiles_everywhere(#[case] target: &str) {
    let generated = compile_ok(target, WORD_COUNT);
    assert!(generated.contains("the quick brown fox"));
    assert!(generated.contains("counts"));
}

#[rstest]
#[case::c("c", "vec_vec_int")]
#[case::cpp("cpp", "std::vector<std::vector<int>>")]
#[case::rust("rust", "Vec<Vec<i64>>")]
#[case::go("go", "[][]int")]
#[case::ocaml("ocaml", "List.nth")]
fn s3_matrix_multiply_resolves_nested_lists(#[case] target: &str, #[case] marker: &str) {
    let generated = compile_ok(target, MATMUL);
    assert!(
        generated.contains(marker),
        "expected '{}' in {} output:\n{}",
        marker,
        target,
        generated
    );
}

/// The Haskell rendition builds the matrices with comprehensions; loops
/// that only append still lower, but nested comprehensions read better
#[test]
fn s3_matrix_multiply_haskell() {
    let source = "def matmul() -> int:
    a: list = [[i + j for j in range(10)] for i in range(10)]
    b: list = [[i * j for j in range(10)] for i in range(10)]
    c: list = [[sum([a[i][k] * b[k][j] for k in range(10)]) for j in range(10)] for i in range(10)]
    return c[5][5]

def main() -> int:
    return matmul()

if __name__ == \"__main__\":
    main()
";
    let generated = compile_ok("haskell", source);
    assert!(generated.contains("matmul :: Int"), "output:\n{}", generated);
    assert!(generated.contains("sum"), "output:\n{}", generated);
    assert!(generated.contains("| j <-"), "output:\n{}", generated);
}

#[rstest]
#[case::c("c")]
#[case::cpp("cpp")]
#[case::rust("rust")]
#[case::go("go")]
#[case::haskell("haskell")]
#[case::ocaml("ocaml")]
fn s4_counter_compiles_everywhere(#[case] target: &str) {
    let generated = compile_ok(target, COUNTER);
    assert!(generated.contains("Counter") || generated.contains("counter"));
    assert!(generated.contains("bump") || generated.contains("Bump"));
}

/// Property 13: receiver mutability in the Rust backend follows the
/// mutation pre-scan
#[test]
fn s4_rust_receiver_mutability() {
    let generated = compile_ok("rust", COUNTER);
    assert!(
        generated.contains("pub fn bump(&mut self, k: i64)"),
        "output:\n{}",
        generated
    );
    assert!(
        generated.contains("pub fn value(&self)"),
        "output:\n{}",
        generated
    );
}

/// S5: a generator produces exactly one diagnostic, E1001, at the yield
#[test]
fn s5_yield_is_rejected_with_one_diagnostic() {
    let diagnostics = compile_errors("c", "def f():\n    yield 1\n");
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 1, "got {:?}", diagnostics);
    let error = errors[0];
    assert_eq!(error.code, ErrorCode::UnsupportedFeature);
    assert_eq!(error.code.to_string(), "E1001");
    assert_eq!((error.location.line, error.location.column), (2, 5));
    let help = error.suggestion.as_ref().expect("has suggestion");
    assert!(help.message.contains("return a list"));
}

#[rstest]
#[case::c("c", "vec_vec_int")]
#[case::cpp("cpp", "std::vector<std::vector<int>>")]
#[case::rust("rust", "Vec<Vec<i64>>")]
#[case::go("go", "[][]int")]
#[case::haskell("haskell", "[[Int]]")]
#[case::ocaml("ocaml", "int list list")]
fn s6_nested_container_inference(#[case] target: &str, #[case] marker: &str) {
    let generated = compile_ok(target, NESTED_BUILD);
    assert!(
        generated.contains(marker),
        "expected '{}' in {} output:\n{}",
        marker,
        target,
        generated
    );
}

/// Property 1: a validated program either emits non-empty text or fails
/// with located E2xxx/E5xxx errors, for every registered target
#[test]
fn every_target_emits_or_fails_with_located_errors() {
    let sources = [FIB, WORD_COUNT, COUNTER, NESTED_BUILD];
    for target in ALL_TARGETS {
        for source in sources {
            let result = crate::test_utils::compile_for(target, source);
            if result.success {
                assert!(!result.generated.as_deref().unwrap_or_default().is_empty());
            } else {
                assert!(result.diagnostics.iter().any(|d| {
                    d.is_error()
                        && (d.code.is_type_error() || d.code.is_codegen_error())
                        && d.location.line >= 1
                }));
            }
        }
    }
}
