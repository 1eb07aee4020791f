use crate::test_utils::{COUNTER, FIB, STATIC_HELPER, WORD_COUNT, compile_for, compile_ok};

#[test]
fn records_export_fields_and_methods() {
    let generated = compile_ok("go", COUNTER);
    assert!(generated.contains("type Counter struct {"));
    assert!(generated.contains("N int"));
    assert!(generated.contains("func NewCounter(n int) Counter"));
    assert!(generated.contains("c.Bump(3)"));
}

/// Mutating methods take pointer receivers, read-only methods take values
#[test]
fn receiver_kinds_follow_the_mutation_scan() {
    let generated = compile_ok("go", COUNTER);
    assert!(
        generated.contains("func (self *Counter) Bump(k int)"),
        "output:\n{}",
        generated
    );
    assert!(
        generated.contains("func (self Counter) Value() int"),
        "output:\n{}",
        generated
    );
}

/// First bindings use `:=`, reassignments use `=`
#[test]
fn short_declarations_track_the_declared_set() {
    let source = "def f() -> int:\n    x = 1\n    x = 2\n    return x\n";
    let generated = compile_ok("go", source);
    assert!(generated.contains("x := 1"));
    assert!(generated.contains("x = 2"));
    assert!(!generated.contains("x := 2"));
}

#[test]
fn list_appends_reassign_the_slice() {
    let source = "def build() -> list[int]:\n    out: list[int] = []\n    out.append(4)\n    return out\n";
    let generated = compile_ok("go", source);
    assert!(generated.contains("out = append(out, 4)"));
}

#[test]
fn dicts_are_native_maps() {
    let generated = compile_ok("go", WORD_COUNT);
    assert!(generated.contains("map[string]int"));
    assert!(generated.contains("counts[w] ="));
}

#[test]
fn generic_helpers_back_comprehensions_by_default() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n) if x > 0]\n    return out\n";
    let generated = compile_ok("go", source);
    assert!(generated.contains("func mgenMap[T any, U any]"));
    assert!(generated.contains("mgenFilter(mgenRange(0, n, 1)"));
}

#[test]
fn loops_replace_helpers_when_generics_are_off() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n) if x > 0]\n    return out\n";
    let overrides = vec![("use_generics".to_string(), "false".to_string())];
    let result = mgen::compile(source, "test.py", "go", &overrides);
    assert!(result.success, "{:?}", result.diagnostics);
    let generated = result.generated.expect("generated");
    assert!(!generated.contains("mgenMap["));
    assert!(generated.contains("acc = append(acc, (x * 2))"));
}

#[test]
fn int_main_exits_through_os() {
    let generated = compile_ok("go", WORD_COUNT);
    assert!(generated.contains("func main() {"));
    assert!(generated.contains("os.Exit(mgenMain())"));
    assert!(generated.contains("\"os\""));
}

#[test]
fn imports_appear_only_when_used() {
    let generated = compile_for("go", FIB).generated.expect("generated");
    assert!(generated.contains("\"fmt\""));
    assert!(!generated.contains("\"strings\""));
    assert!(!generated.contains("\"math\""));
}

/// A @staticmethod becomes a record-prefixed free function
#[test]
fn static_methods_take_no_receiver() {
    let generated = compile_ok("go", STATIC_HELPER);
    assert!(
        generated.contains("func CalcCombine(a int, b int) int {"),
        "output:\n{}",
        generated
    );
    assert!(!generated.contains("func (a Calc) Combine"));
    assert!(!generated.contains("func (a *Calc) Combine"));
    // the instance method keeps its value receiver
    assert!(generated.contains("func (self Calc) Shifted(k int) int {"));
    assert!(generated.contains("CalcCombine(1, 2)"));
}
