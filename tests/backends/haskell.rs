use crate::test_utils::{COUNTER, FIB, STATIC_HELPER, WORD_COUNT, compile_for, compile_ok};

#[test]
fn records_use_record_update_for_mutation() {
    let generated = compile_ok("haskell", COUNTER);
    assert!(generated.contains("data Counter = Counter"));
    assert!(generated.contains("counterN :: Int"));
    // the mutating method returns the updated record
    assert!(generated.contains("counterBump :: Counter -> Int -> Counter"));
    assert!(generated.contains("self { counterN = (counterN self + k) }"));
    assert!(generated.contains("counterValue :: Counter -> Int"));
}

/// Rebinding a receiver shadows through fresh versioned names, since
/// Haskell lets are recursive
#[test]
fn receiver_rebinding_is_versioned() {
    let generated = compile_ok("haskell", COUNTER);
    assert!(generated.contains("let c2 = (counterBump (c) (3))"), "output:\n{}", generated);
    assert!(generated.contains("let c3 = (counterBump (c2) (3))"));
    assert!(generated.contains("let c4 = (counterBump (c3) (3))"));
    assert!(generated.contains("(counterValue (c4))"));
}

#[test]
fn pure_functions_emit_as_equations() {
    let generated = compile_ok("haskell", FIB);
    assert!(generated.contains("fib :: Int -> Int"));
    assert!(generated.contains("if (n > 1)"));
}

#[test]
fn the_source_main_is_a_do_block() {
    let generated = compile_ok("haskell", FIB);
    assert!(generated.contains("mgenMain :: IO ()"));
    assert!(generated.contains("mgenMain = do"));
    assert!(generated.contains("putStrLn (show ((fib (29))))"));
    assert!(generated.contains("main = mgenMain"));
}

#[test]
fn int_main_exits_with_its_code() {
    let generated = compile_ok("haskell", WORD_COUNT);
    assert!(generated.contains("mgenMain :: IO Int"));
    assert!(generated.contains("code <- mgenMain"));
    assert!(generated.contains("ExitFailure code"));
}

#[test]
fn dict_loops_lower_to_folds() {
    let generated = compile_ok("haskell", WORD_COUNT);
    assert!(generated.contains("import qualified Data.Map.Strict as Map"));
    assert!(generated.contains("foldl (\\counts w -> Map.insert"));
    assert!(generated.contains("Map.findWithDefault"));
}

#[test]
fn comprehensions_are_native_by_default() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n) if x > 0]\n    return out\n";
    let generated = compile_ok("haskell", source);
    assert!(generated.contains("[(x * 2) | x <- [0 .. (n) - 1], (x > 0)]"));
}

#[test]
fn comprehensions_fall_back_to_map_and_filter() {
    let source = "def evens(n: int) -> list[int]:\n    out: list[int] = [x * 2 for x in range(n)]\n    return out\n";
    let overrides = vec![(
        "use_native_comprehensions".to_string(),
        "false".to_string(),
    )];
    let result = mgen::compile(source, "test.py", "haskell", &overrides);
    assert!(result.success, "{:?}", result.diagnostics);
    let generated = result.generated.expect("generated");
    assert!(generated.contains("map (\\x -> (x * 2))"));
}

#[test]
fn accumulation_loops_become_folds() {
    let source = "def total(n: int) -> int:\n    acc = 0\n    for i in range(n):\n        acc += i\n    return acc\n";
    let generated = compile_ok("haskell", source);
    assert!(
        generated.contains("foldl (\\acc i -> acc + (i)) acc [0 .. (n) - 1]"),
        "output:\n{}",
        generated
    );
}

#[test]
fn imports_appear_only_when_used() {
    let generated = compile_for("haskell", FIB).generated.expect("generated");
    assert!(!generated.contains("Data.Map"));
    assert!(!generated.contains("Data.Set"));
}

/// A @staticmethod is an ordinary equation over its own parameters
#[test]
fn static_methods_take_no_receiver() {
    let generated = compile_ok("haskell", STATIC_HELPER);
    assert!(
        generated.contains("calcCombine :: Int -> Int -> Int"),
        "output:\n{}",
        generated
    );
    assert!(!generated.contains("calcCombine :: Calc"));
    assert!(generated.contains("calcCombine a b = (a + b)"));
    // the instance method still threads the record
    assert!(generated.contains("calcShifted :: Calc -> Int -> Int"));
    assert!(generated.contains("(calcCombine (1) (2))"));
}
