use crate::test_utils::{COUNTER, FIB, STATIC_HELPER, WORD_COUNT, compile_for, compile_ok};

#[test]
fn records_derive_clone_and_take_typed_receivers() {
    let generated = compile_ok("rust", COUNTER);
    assert!(generated.contains("#[derive(Clone, Debug, Default)]"));
    assert!(generated.contains("pub struct Counter {"));
    assert!(generated.contains("pub fn new(n: i64) -> Counter"));
    assert!(generated.contains("pub fn bump(&mut self, k: i64)"));
    assert!(generated.contains("pub fn value(&self) -> i64"));
}

#[test]
fn owned_values_are_cloned_on_reuse() {
    let source = "def greet(name: str) -> str:\n    a: str = name\n    b: str = name\n    return a + b\n";
    let generated = compile_ok("rust", source);
    assert!(generated.contains("name.clone()"), "output:\n{}", generated);
}

#[test]
fn returned_names_move_instead_of_cloning() {
    let source = "def pick(xs: list[int]) -> list[int]:\n    return xs\n";
    let generated = compile_ok("rust", source);
    assert!(generated.contains("return xs;"), "output:\n{}", generated);
}

#[test]
fn collection_imports_appear_only_when_used() {
    let fib = compile_for("rust", FIB).generated.expect("generated");
    assert!(!fib.contains("use std::collections::HashMap;"));

    let counting = compile_ok("rust", WORD_COUNT);
    assert!(counting.contains("use std::collections::HashMap;"));
    assert!(!counting.contains("HashSet"));
}

#[test]
fn dict_stores_become_inserts() {
    let generated = compile_ok("rust", WORD_COUNT);
    assert!(generated.contains("counts.insert("));
    assert!(generated.contains(".cloned().unwrap_or(0)"));
}

#[test]
fn comprehensions_become_iterator_chains() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n) if x > 0]\n    return out\n";
    let generated = compile_ok("rust", source);
    assert!(generated.contains(".filter(|&x| (x > 0))"));
    assert!(generated.contains(".map(|x| (x * 2))"));
    assert!(generated.contains(".collect::<Vec<i64>>()"));
}

#[test]
fn int_main_exits_with_the_returned_code() {
    let generated = compile_ok("rust", WORD_COUNT);
    assert!(generated.contains("fn main() {"));
    assert!(generated.contains("std::process::exit(mgen_main() as i32);"));
}

#[test]
fn the_build_descriptor_is_a_cargo_manifest() {
    let result = mgen::compile_with_options(
        FIB,
        "fib.py",
        "rust",
        &mgen::CompileOptions {
            want_build_descriptor: true,
            ..Default::default()
        },
    );
    assert!(result.success);
    let (name, contents) = result.build_descriptor.expect("descriptor");
    assert_eq!(name, "Cargo.toml");
    assert!(contents.contains("name = \"fib\""));
    assert!(contents.contains("edition = \"2021\""));
}

#[test]
fn floor_division_uses_euclidean_helpers() {
    let source = "def f(a: int, b: int) -> int:\n    return a // b + a % b\n";
    let generated = compile_ok("rust", source);
    assert!(generated.contains(".div_euclid("));
    assert!(generated.contains(".rem_euclid("));
}

/// A @staticmethod becomes an associated function without self
#[test]
fn static_methods_take_no_receiver() {
    let generated = compile_ok("rust", STATIC_HELPER);
    assert!(
        generated.contains("pub fn combine(a: i64, b: i64) -> i64"),
        "output:\n{}",
        generated
    );
    assert!(!generated.contains("combine(&self"));
    assert!(!generated.contains("combine(&mut self"));
    // call sites go through the type, instance methods through the value
    assert!(generated.contains("Calc::combine(1, 2)"));
    assert!(generated.contains("c.shifted(3)"));
}
