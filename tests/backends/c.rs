use crate::ErrorCode;
use crate::test_utils::{
    COUNTER, FIB, STATIC_HELPER, WORD_COUNT, compile_errors, compile_for, compile_ok,
};

#[test]
fn records_emit_struct_and_make_constructor() {
    let generated = compile_ok("c", COUNTER);
    assert!(generated.contains("typedef struct Counter"));
    assert!(generated.contains("Counter make_Counter(int n)"));
    assert!(generated.contains("void Counter_bump(Counter* self, int k)"));
    assert!(generated.contains("int Counter_value(Counter* self)"));
    assert!(generated.contains("Counter_bump(&c, 3);"));
}

/// Property 12: dataclass fields keep declaration order
#[test]
fn dataclass_fields_keep_declaration_order() {
    let source = "@dataclass\nclass P:\n    first: int\n    second: str\n    third: float\n";
    let generated = compile_ok("c", source);
    let first = generated.find("int first;").expect("first field");
    let second = generated.find("char* second;").expect("second field");
    let third = generated.find("double third;").expect("third field");
    assert!(first < second && second < third);
}

#[test]
fn string_keyed_maps_come_from_the_container_engine() {
    let generated = compile_ok("c", WORD_COUNT);
    assert!(generated.contains("} map_str_int;"));
    assert!(generated.contains("map_str_int_insert(&counts"));
    assert!(generated.contains("map_str_int_get(&counts, \"the\")"));
    // string keys are owned: copied on insert, compared by content
    assert!(generated.contains("mgen_strdup(key)"));
    assert!(generated.contains("strcmp(a, b) == 0"));
}

#[test]
fn the_main_guard_becomes_int_main() {
    let generated = compile_ok("c", FIB);
    assert!(generated.contains("int main(void)"));
    assert!(generated.contains("mgen_main();"));
    assert!(generated.contains("printf(\"%d\\n\", fib(29))"));
}

#[test]
fn string_equality_uses_the_helper() {
    let source = "def eq(a: str, b: str) -> bool:\n    return a == b\n";
    let generated = compile_ok("c", source);
    assert!(generated.contains("str_eq(a, b)"));
}

#[test]
fn comprehensions_lower_to_loops() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n) if x > 0]\n    return out\n";
    let generated = compile_ok("c", source);
    assert!(generated.contains("vec_int_push(&_acc0"));
    assert!(generated.contains("if ((x > 0)) {"));
}

#[test]
fn assertions_emit_native_asserts() {
    let source = "def f(x: int) -> int:\n    assert x > 0, \"x must be positive\"\n    return x\n";
    let generated = compile_ok("c", source);
    assert!(generated.contains("assert(((x > 0)) && \"x must be positive\");"));
}

#[test]
fn fstrings_go_through_asprintf() {
    let source = "def show(n: int) -> str:\n    return f\"n is {n}!\"\n";
    let generated = compile_ok("c", source);
    assert!(generated.contains("mgen_asprintf(\"n is %d!\", n)"));
}

#[test]
fn unsupported_dict_methods_are_codegen_failures() {
    let source = "def f() -> int:\n    d: dict[str, int] = {}\n    return d.pop(\"x\")\n";
    let diagnostics = compile_errors("c", source);
    assert!(
        diagnostics
            .iter()
            .any(|d| d.code == ErrorCode::CodegenFailure)
    );
}

#[test]
fn floor_division_uses_the_flooring_helper() {
    let source = "def f(a: int, b: int) -> int:\n    return a // b\n";
    let generated = compile_ok("c", source);
    assert!(generated.contains("mgen_floordiv(a, b)"));
    assert!(generated.contains("static int mgen_floordiv"));
}

#[test]
fn runtime_helpers_appear_only_when_used() {
    let result = compile_for("c", FIB);
    let generated = result.generated.expect("generated");
    assert!(!generated.contains("mgen_str_split"));
    assert!(!generated.contains("mgen_floordiv"));
    assert!(!generated.contains("#include <math.h>"));
}

/// A @staticmethod is a plain namespaced function with no receiver pointer
#[test]
fn static_methods_take_no_receiver() {
    let generated = compile_ok("c", STATIC_HELPER);
    assert!(
        generated.contains("int Calc_combine(int a, int b)"),
        "output:\n{}",
        generated
    );
    assert!(!generated.contains("Calc_combine(Calc*"));
    // the instance method keeps its pointer receiver
    assert!(generated.contains("int Calc_shifted(Calc* self, int k)"));
    // call sites pass no receiver to the static method
    assert!(generated.contains("Calc_combine(1, 2)"));
    assert!(generated.contains("Calc_shifted(&c, 3)"));
}
