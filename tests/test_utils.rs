use mgen::PipelineResult;
use mgen_error::{Diagnostic, ErrorCode};

/// Every registered target, in registration order
pub const ALL_TARGETS: &[&str] = &["c", "cpp", "rust", "go", "haskell", "ocaml"];

/// Compiles a program for a target with default preferences
pub fn compile_for(target: &str, source: &str) -> PipelineResult {
    mgen::compile(source, "test.py", target, &[])
}

/// Compiles and asserts success, returning the generated text
///
/// ### Arguments
/// * `target` - The backend to compile for
/// * `source` - The program source
pub fn compile_ok(target: &str, source: &str) -> String {
    let result = compile_for(target, source);
    assert!(
        result.success && !result.has_errors(),
        "compilation for '{}' failed: {:?}",
        target,
        result.diagnostics
    );
    let generated = result.generated.expect("generated text");
    assert!(!generated.is_empty(), "empty output for '{}'", target);
    generated
}

/// Compiles expecting failure, returning the diagnostics
pub fn compile_errors(target: &str, source: &str) -> Vec<Diagnostic> {
    let result = compile_for(target, source);
    assert!(
        !result.success || result.has_errors(),
        "expected a failure for '{}', got:\n{}",
        target,
        result.generated.unwrap_or_default()
    );
    result.diagnostics
}

/// Asserts that exactly one error with the given code was produced
pub fn assert_single_error(diagnostics: &[Diagnostic], code: ErrorCode) -> &Diagnostic {
    let errors: Vec<&Diagnostic> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(
        errors.len(),
        1,
        "expected exactly one error, got {:?}",
        diagnostics
    );
    assert_eq!(errors[0].code, code);
    errors[0]
}

// ---- shared scenario sources ----

/// S1: recursion over annotated ints
pub const FIB: &str = "def fib(n: int) -> int:
    if n > 1:
        return fib(n - 1) + fib(n - 2)
    return n

def main() -> None:
    print(fib(29))

if __name__ == \"__main__\":
    main()
";

/// S2: split into a list, count occurrences in a dict
pub const WORD_COUNT: &str = "def count_words() -> int:
    text: str = \"the quick brown fox jumps over the lazy dog the\"
    words: list[str] = text.split()
    counts: dict[str, int] = {}
    for w in words:
        counts[w] = counts.get(w, 0) + 1
    return counts[\"the\"]

def main() -> int:
    return count_words()

if __name__ == \"__main__\":
    main()
";

/// S3: nested containers built through appends, loop form
pub const MATMUL: &str = "def matmul() -> int:
    a: list = []
    b: list = []
    for i in range(10):
        row_a: list = []
        row_b: list = []
        for j in range(10):
            row_a.append(i + j)
            row_b.append(i * j)
        a.append(row_a)
        b.append(row_b)
    c: list = []
    for i in range(10):
        row: list = []
        for j in range(10):
            total = 0
            for k in range(10):
                total += a[i][k] * b[k][j]
            row.append(total)
        c.append(row)
    return c[5][5]

def main() -> int:
    return matmul()

if __name__ == \"__main__\":
    main()
";

/// S4: a record with a mutating and a read-only method
pub const COUNTER: &str = "@dataclass
class Counter:
    n: int

    def bump(self, k: int) -> None:
        self.n += k

    def value(self) -> int:
        return self.n

def use_counter() -> int:
    c = Counter(0)
    c.bump(3)
    c.bump(3)
    c.bump(3)
    return c.value()

def main() -> int:
    return use_counter()

if __name__ == \"__main__\":
    main()
";

/// S6: empty container refined through an append of a container value
pub const NESTED_BUILD: &str = "def build() -> list:
    out: list = []
    row: list = [1, 2, 3]
    out.append(row)
    return out
";

/// A record carrying a @staticmethod alongside an instance method
pub const STATIC_HELPER: &str = "@dataclass
class Calc:
    base: int

    @staticmethod
    def combine(a: int, b: int) -> int:
        return a + b

    def shifted(self, k: int) -> int:
        return self.base + k

def use_calc() -> int:
    c = Calc(10)
    return c.combine(1, 2) + c.shifted(3)

def main() -> int:
    return use_calc()

if __name__ == \"__main__\":
    main()
";
