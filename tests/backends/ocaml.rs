use crate::test_utils::{COUNTER, FIB, STATIC_HELPER, WORD_COUNT, compile_ok};

#[test]
fn records_use_ocaml_record_syntax() {
    let generated = compile_ok("ocaml", COUNTER);
    assert!(generated.contains("type counter = {"));
    // a mutating method makes the fields mutable
    assert!(generated.contains("mutable n : int;"));
    assert!(generated.contains("let make_counter n = { n }"));
    assert!(generated.contains("counter_bump"));
    assert!(generated.contains("self.n <- (self.n + k)"));
}

#[test]
fn immutable_records_stay_immutable() {
    let source = "@dataclass\nclass Point:\n    x: int\n    y: int\n\n    def total(self) -> int:\n        return self.x + self.y\n";
    let generated = compile_ok("ocaml", source);
    assert!(generated.contains("x : int;"));
    assert!(!generated.contains("mutable x"));
}

/// Reassigned bindings become refs; single-assignment stays a plain let
#[test]
fn mutation_selects_refs() {
    let source = "def f(n: int) -> int:\n    total = 0\n    base = 10\n    while total < n:\n        total += base\n    return total\n";
    let generated = compile_ok("ocaml", source);
    assert!(generated.contains("let total = ref (0) in"));
    assert!(generated.contains("let base = 10 in"));
    assert!(generated.contains("total := (!total + base)"));
    assert!(generated.contains("while (!total < n) do"));
}

#[test]
fn early_returns_become_if_expressions() {
    let generated = compile_ok("ocaml", FIB);
    assert!(generated.contains("let rec fib (n : int) : int ="));
    assert!(generated.contains("if (n > 1) then begin"));
}

#[test]
fn dicts_are_hashtables() {
    let generated = compile_ok("ocaml", WORD_COUNT);
    assert!(generated.contains("Hashtbl.create 16"));
    assert!(generated.contains("Hashtbl.replace counts"));
    assert!(generated.contains("Hashtbl.find"));
}

#[test]
fn list_appends_go_through_refs() {
    let source = "def build() -> list[int]:\n    out: list[int] = []\n    out.append(4)\n    return out\n";
    let generated = compile_ok("ocaml", source);
    assert!(generated.contains("let out = ref ([]) in"));
    assert!(generated.contains("out := !out @ [4]"));
    assert!(generated.contains("!out"));
}

#[test]
fn comprehensions_map_and_filter() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n) if x > 0]\n    return out\n";
    let generated = compile_ok("ocaml", source);
    assert!(generated.contains("List.map (fun x -> (x * 2))"));
    assert!(generated.contains("List.filter (fun x -> (x > 0))"));
    assert!(generated.contains("mgen_range"));
}

#[test]
fn int_main_sets_the_exit_code() {
    let generated = compile_ok("ocaml", WORD_COUNT);
    assert!(generated.contains("let () ="));
    assert!(generated.contains("exit (main ())"));
}

#[test]
fn functions_form_one_recursive_group() {
    let generated = compile_ok("ocaml", WORD_COUNT);
    assert!(generated.contains("let rec count_words"));
    assert!(generated.contains("\nand main"));
}

/// A @staticmethod keeps every parameter's own annotation; no receiver
#[test]
fn static_methods_take_no_receiver() {
    let generated = compile_ok("ocaml", STATIC_HELPER);
    assert!(
        generated.contains("calc_combine (a : int) (b : int) : int ="),
        "output:\n{}",
        generated
    );
    assert!(!generated.contains("calc_combine (a : calc)"));
    // the instance method still takes the record first
    assert!(generated.contains("calc_shifted (self : calc) (k : int) : int ="));
    assert!(generated.contains("calc_combine (1) (2)"));
}
