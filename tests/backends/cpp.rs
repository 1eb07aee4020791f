use crate::test_utils::{COUNTER, FIB, STATIC_HELPER, WORD_COUNT, compile_ok};

#[test]
fn records_become_classes_with_member_functions() {
    let generated = compile_ok("cpp", COUNTER);
    assert!(generated.contains("class Counter {"));
    assert!(generated.contains("public:"));
    assert!(generated.contains("int n;"));
    assert!(generated.contains("Counter(int n_) : n(n_) {}"));
    assert!(generated.contains("c.bump(3);"));
}

/// Read-only methods are const-qualified, mutators are not
#[test]
fn method_constness_follows_the_mutation_scan() {
    let generated = compile_ok("cpp", COUNTER);
    assert!(generated.contains("int value() const {"), "output:\n{}", generated);
    assert!(generated.contains("void bump(int k) {"), "output:\n{}", generated);
}

#[test]
fn receiver_fields_go_through_this() {
    let generated = compile_ok("cpp", COUNTER);
    assert!(generated.contains("this->n"));
}

#[test]
fn containers_use_the_standard_library() {
    let generated = compile_ok("cpp", WORD_COUNT);
    assert!(generated.contains("#include <map>"));
    assert!(generated.contains("std::map<std::string, int>"));
    assert!(generated.contains("std::vector<std::string>"));
    assert!(generated.contains("counts.at(std::string(\"the\"))"));
}

#[test]
fn nested_containers_nest_templates() {
    let source = "def build() -> list:\n    out: list = []\n    row: list = [1, 2, 3]\n    out.append(row)\n    return out\n";
    let generated = compile_ok("cpp", source);
    assert!(generated.contains("std::vector<std::vector<int>>"));
    assert!(generated.contains("out.push_back(row)"));
}

#[test]
fn comprehensions_become_immediate_lambdas() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n) if x > 0]\n    return out\n";
    let generated = compile_ok("cpp", source);
    assert!(generated.contains("[&]() {"));
    assert!(generated.contains("__acc.push_back((x * 2));"));
    assert!(generated.contains("return __acc;"));
}

#[test]
fn dict_iteration_uses_structured_bindings() {
    let source = "def total(d: dict[str, int]) -> int:
    out = 0
    for k, v in d.items():
        out += v
    return out
";
    let generated = compile_ok("cpp", source);
    assert!(generated.contains("for (const auto& [k, v] : d)"));
}

#[test]
fn main_prints_through_iostream() {
    let generated = compile_ok("cpp", FIB);
    assert!(generated.contains("int main() {"));
    assert!(generated.contains("std::cout << fib(29) << std::endl"));
}

/// A @staticmethod becomes a static member function with no `this`
#[test]
fn static_methods_take_no_receiver() {
    let generated = compile_ok("cpp", STATIC_HELPER);
    assert!(
        generated.contains("static int combine(int a, int b) {"),
        "output:\n{}",
        generated
    );
    // static members are never const-qualified
    assert!(!generated.contains("combine(int a, int b) const"));
    assert!(generated.contains("int shifted(int k) const {"));
}
