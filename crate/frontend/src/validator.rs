use mgen_error::{Diagnostic, ErrorCode, default_suggestion};
use mgen_ir::ast::{ClassDef, ComprehensionKind, Expression, FunctionDef, Module, Statement};
use mgen_ir::{SourceLocation, query};

/// Decides whether a module lies within the accepted static subset
///
/// Walks the AST once and returns a diagnostic for every forbidden
/// construct found; the caller treats any error as fatal for the pipeline.
/// Rejected nodes are not recursed into, so one construct produces one
/// diagnostic.
pub fn validate(module: &Module) -> Vec<Diagnostic> {
    let mut validator = Validator::new();
    for item in &module.items {
        validator.check_statement(item, StatementContext::TopLevel);
    }
    validator.diagnostics
}

/// Where a statement appears, for context-dependent rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementContext {
    TopLevel,
    FunctionBody,
    ClassBody,
}

/// Decorators the subset recognizes on functions and classes
const KNOWN_FUNCTION_DECORATORS: &[&str] = &["staticmethod", "classmethod"];
const KNOWN_CLASS_DECORATORS: &[&str] = &["dataclass"];

struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn new() -> Self {
        Validator {
            diagnostics: Vec::new(),
        }
    }

    /// Emits a feature-support rejection with its database suggestion
    fn reject(&mut self, code: ErrorCode, feature: &str, message: String, location: SourceLocation) {
        let mut diagnostic = Diagnostic::error(code, message, location);
        if let Some(suggestion) = default_suggestion(code, feature) {
            diagnostic = diagnostic.with_help(suggestion);
        }
        self.diagnostics.push(diagnostic);
    }

    fn check_statement(&mut self, stmt: &Statement, context: StatementContext) {
        match stmt {
            Statement::Try(s) => self.reject(
                ErrorCode::UnsupportedStatement,
                "try",
                "unsupported feature: exception handling (try/except/finally)".to_string(),
                s.location,
            ),
            Statement::Raise(s) => self.reject(
                ErrorCode::UnsupportedStatement,
                "raise",
                "unsupported feature: raising exceptions".to_string(),
                s.location,
            ),
            Statement::With(s) => self.reject(
                ErrorCode::UnsupportedStatement,
                "with",
                "unsupported feature: context managers (with)".to_string(),
                s.location,
            ),
            Statement::Delete(s) => self.reject(
                ErrorCode::UnsupportedStatement,
                "del",
                "unsupported feature: del".to_string(),
                s.location,
            ),
            Statement::Global(s) => self.reject(
                ErrorCode::UnsupportedStatement,
                "global",
                "unsupported feature: global declarations".to_string(),
                s.location,
            ),
            Statement::Nonlocal(s) => self.reject(
                ErrorCode::UnsupportedStatement,
                "nonlocal",
                "unsupported feature: nonlocal declarations".to_string(),
                s.location,
            ),
            Statement::FunctionDef(def) => self.check_function(def, context),
            Statement::ClassDef(def) => self.check_class(def, context),
            Statement::If(s) => {
                for arm in &s.arms {
                    self.check_expression(&arm.condition, false);
                    for stmt in &arm.body {
                        self.check_statement(stmt, context);
                    }
                }
                for stmt in &s.else_body {
                    self.check_statement(stmt, context);
                }
            }
            Statement::While(s) => {
                self.check_expression(&s.condition, false);
                for stmt in &s.body {
                    self.check_statement(stmt, context);
                }
            }
            Statement::For(s) => {
                self.check_expression(&s.iterable, false);
                for stmt in &s.body {
                    self.check_statement(stmt, context);
                }
            }
            Statement::Assign(s) => {
                self.check_expression(&s.target, false);
                self.check_expression(&s.value, false);
            }
            Statement::AugAssign(s) => {
                self.check_expression(&s.target, false);
                self.check_expression(&s.value, false);
            }
            Statement::Expression(s) => self.check_expression(&s.expression, false),
            Statement::Return(s) => {
                if let Some(value) = &s.value {
                    self.check_expression(value, false);
                }
            }
            Statement::Assert(s) => {
                self.check_expression(&s.condition, false);
                if let Some(message) = &s.message {
                    self.check_expression(message, false);
                }
            }
            Statement::Import(_)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Pass(_) => {}
        }
    }

    fn check_function(&mut self, def: &FunctionDef, context: StatementContext) {
        if context == StatementContext::FunctionBody {
            self.reject(
                ErrorCode::UnsupportedStatement,
                "lambda",
                format!("nested function '{}' is not supported", def.name),
                def.location,
            );
            return;
        }

        let is_method = context == StatementContext::ClassBody;
        for decorator in &def.decorators {
            if decorator == "async" {
                self.reject(
                    ErrorCode::UnsupportedFeature,
                    "async",
                    "unsupported feature: async functions".to_string(),
                    def.location,
                );
            } else if !is_method || !KNOWN_FUNCTION_DECORATORS.contains(&decorator.as_str()) {
                self.reject(
                    ErrorCode::UnsupportedDecorator,
                    decorator,
                    format!("unsupported decorator '@{}'", decorator),
                    def.location,
                );
            }
        }

        let is_static = def.decorators.iter().any(|d| d == "staticmethod");
        for (index, param) in def.parameters.iter().enumerate() {
            if param.name.starts_with('*') {
                self.reject(
                    ErrorCode::UnsupportedFeature,
                    "starargs",
                    "unsupported feature: *args / **kwargs".to_string(),
                    param.location,
                );
                continue;
            }
            if param.has_default {
                self.reject(
                    ErrorCode::UnsupportedFeature,
                    "default",
                    format!("default value on parameter '{}' is not supported", param.name),
                    param.location,
                );
            }
            let is_receiver = is_method && !is_static && index == 0;
            if !is_receiver && param.ty.is_unknown() {
                let diagnostic = Diagnostic::error(
                    ErrorCode::UnannotatedSignature,
                    format!("parameter '{}' has no type annotation", param.name),
                    param.location,
                );
                let diagnostic = match default_suggestion(ErrorCode::UnannotatedSignature, "") {
                    Some(suggestion) => diagnostic.with_help(suggestion),
                    None => diagnostic,
                };
                self.diagnostics.push(diagnostic);
            }
        }

        for stmt in &def.body {
            self.check_statement(stmt, StatementContext::FunctionBody);
        }
    }

    fn check_class(&mut self, def: &ClassDef, context: StatementContext) {
        if context != StatementContext::TopLevel {
            self.reject(
                ErrorCode::UnsupportedStatement,
                "metaclass",
                format!("nested class '{}' is not supported", def.name),
                def.location,
            );
            return;
        }

        for decorator in &def.decorators {
            if !KNOWN_CLASS_DECORATORS.contains(&decorator.as_str()) {
                self.reject(
                    ErrorCode::UnsupportedDecorator,
                    decorator,
                    format!("unsupported decorator '@{}' on class '{}'", decorator, def.name),
                    def.location,
                );
            }
        }

        // single inheritance at most, and only from NamedTuple shorthand
        let real_bases: Vec<&String> = def.bases.iter().filter(|b| *b != "NamedTuple").collect();
        if !real_bases.is_empty() {
            self.reject(
                ErrorCode::UnsupportedFeature,
                "inheritance",
                format!("class '{}' uses inheritance, which is not supported", def.name),
                def.location,
            );
        }

        for stmt in &def.body {
            match stmt {
                Statement::FunctionDef(_) | Statement::Assign(_) | Statement::Pass(_) => {
                    self.check_statement(stmt, StatementContext::ClassBody);
                }
                Statement::Expression(expr_stmt) => {
                    // a docstring line is fine, anything else is not
                    if query::docstring(std::slice::from_ref(stmt)).is_none() {
                        self.reject(
                            ErrorCode::UnsupportedStatement,
                            "metaclass",
                            "only fields and methods are allowed in a class body".to_string(),
                            expr_stmt.location,
                        );
                    }
                }
                other => self.reject(
                    ErrorCode::UnsupportedStatement,
                    "metaclass",
                    "only fields and methods are allowed in a class body".to_string(),
                    other.location(),
                ),
            }
        }
    }

    fn check_expression(&mut self, expr: &Expression, in_comprehension: bool) {
        match expr {
            Expression::Yield(e) => self.reject(
                ErrorCode::UnsupportedFeature,
                "yield",
                "unsupported feature: yield".to_string(),
                e.location,
            ),
            Expression::Await(e) => self.reject(
                ErrorCode::UnsupportedFeature,
                "await",
                "unsupported feature: await".to_string(),
                e.location,
            ),
            Expression::Lambda(e) => {
                let captures = lambda_captures(e);
                if !in_comprehension || e.parameters.len() != 1 || captures {
                    self.reject(
                        ErrorCode::UnsupportedExpression,
                        "lambda",
                        if captures {
                            "unsupported feature: lambda capturing enclosing names".to_string()
                        } else {
                            "unsupported feature: lambda outside a comprehension".to_string()
                        },
                        e.location,
                    );
                } else {
                    self.check_expression(&e.body, in_comprehension);
                }
            }
            Expression::Comprehension(e) => {
                if e.kind == ComprehensionKind::Generator {
                    self.reject(
                        ErrorCode::UnsupportedExpression,
                        "yield",
                        "unsupported feature: generator expressions".to_string(),
                        e.location,
                    );
                    return;
                }
                self.check_expression(&e.element, true);
                if let Some(value) = &e.value {
                    self.check_expression(value, true);
                }
                self.check_expression(&e.iterable, true);
                if let Some(condition) = &e.condition {
                    self.check_expression(condition, true);
                }
            }
            Expression::Call(e) => {
                if matches!(
                    e.function.as_str(),
                    "eval" | "exec" | "isinstance" | "getattr" | "setattr" | "globals" | "locals"
                        | "type"
                ) {
                    let context = match e.function.as_str() {
                        "eval" | "exec" => e.function.as_str(),
                        _ => "isinstance",
                    };
                    self.reject(
                        ErrorCode::UnsupportedExpression,
                        context,
                        format!("unsupported feature: runtime reflection ('{}')", e.function),
                        e.location,
                    );
                    return;
                }
                for arg in &e.arguments {
                    self.check_expression(arg, in_comprehension);
                }
            }
            Expression::MethodCall(e) => {
                self.check_expression(&e.receiver, in_comprehension);
                for arg in &e.arguments {
                    self.check_expression(arg, in_comprehension);
                }
            }
            Expression::Binary(e) => {
                self.check_expression(&e.left, in_comprehension);
                self.check_expression(&e.right, in_comprehension);
            }
            Expression::Unary(e) => self.check_expression(&e.operand, in_comprehension),
            Expression::Comparison(e) => {
                self.check_expression(&e.left, in_comprehension);
                self.check_expression(&e.right, in_comprehension);
            }
            Expression::Bool(e) => {
                self.check_expression(&e.left, in_comprehension);
                self.check_expression(&e.right, in_comprehension);
            }
            Expression::Attribute(e) => self.check_expression(&e.receiver, in_comprehension),
            Expression::Subscript(e) => {
                self.check_expression(&e.receiver, in_comprehension);
                self.check_expression(&e.index, in_comprehension);
            }
            Expression::Slice(e) => {
                self.check_expression(&e.receiver, in_comprehension);
                if let Some(lower) = &e.lower {
                    self.check_expression(lower, in_comprehension);
                }
                if let Some(upper) = &e.upper {
                    self.check_expression(upper, in_comprehension);
                }
            }
            Expression::ListLiteral(e)
            | Expression::SetLiteral(e)
            | Expression::TupleLiteral(e) => {
                for element in &e.elements {
                    self.check_expression(element, in_comprehension);
                }
            }
            Expression::DictLiteral(e) => {
                for (key, value) in &e.entries {
                    self.check_expression(key, in_comprehension);
                    self.check_expression(value, in_comprehension);
                }
            }
            Expression::FormattedString(e) => {
                for part in &e.parts {
                    if let mgen_ir::ast::FStringPart::Expr(inner) = part {
                        self.check_expression(inner, in_comprehension);
                    }
                }
            }
            Expression::Conditional(e) => {
                self.check_expression(&e.then_value, in_comprehension);
                self.check_expression(&e.condition, in_comprehension);
                self.check_expression(&e.else_value, in_comprehension);
            }
            Expression::Literal(_) | Expression::Name(_) => {}
        }
    }
}

/// Whether a lambda body references names other than its own parameters
fn lambda_captures(lambda: &mgen_ir::ast::LambdaExpr) -> bool {
    let mut captures = false;
    query::walk_expression(&lambda.body, &mut |expr| {
        if let Expression::Name(name) = expr {
            if !lambda.parameters.iter().any(|p| p == &name.name) {
                captures = true;
            }
        }
    });
    captures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn validate_source(source: &str) -> Vec<Diagnostic> {
        let module = parse_source(source, "test.py").expect("parses");
        validate(&module)
    }

    #[test]
    fn accepts_the_static_subset() {
        let diagnostics = validate_source(
            "def fib(n: int) -> int:\n    if n > 1:\n        return fib(n - 1) + fib(n - 2)\n    return n\n",
        );
        assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
    }

    #[test]
    fn yield_produces_exactly_one_error() {
        let diagnostics = validate_source("def f():\n    yield 1\n");
        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(diag.code, ErrorCode::UnsupportedFeature);
        assert_eq!(diag.location.line, 2);
        assert_eq!(diag.location.column, 5);
        let help = diag.suggestion.as_ref().expect("has suggestion");
        assert!(help.message.contains("return a list"));
    }

    #[test]
    fn try_except_is_rejected_once() {
        let diagnostics =
            validate_source("try:\n    x = 1\nexcept:\n    x = 2\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, ErrorCode::UnsupportedStatement);
    }

    #[test]
    fn unannotated_parameters_are_rejected() {
        let diagnostics = validate_source("def f(x) -> int:\n    return x\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, ErrorCode::UnannotatedSignature);
    }

    #[test]
    fn method_receiver_needs_no_annotation() {
        let diagnostics = validate_source(
            "class Counter:\n    n: int\n    def value(self) -> int:\n        return self.n\n",
        );
        assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
    }

    #[test]
    fn capturing_lambda_is_rejected() {
        let diagnostics =
            validate_source("def f(xs: list[int], k: int) -> list[int]:\n    return [x + k for x in xs]\n");
        // `x + k` is a plain expression, not a lambda; accepted
        assert!(diagnostics.is_empty());

        let diagnostics = validate_source("g = lambda x: x + 1\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, ErrorCode::UnsupportedExpression);
    }

    #[test]
    fn reflection_builtins_are_rejected() {
        let diagnostics = validate_source("x = eval(\"1 + 1\")\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("reflection"));
    }

    #[test]
    fn multiple_violations_are_all_collected() {
        let diagnostics = validate_source(
            "def f():\n    yield 1\n\ndef g() -> None:\n    del g\n",
        );
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn unknown_decorators_are_rejected() {
        let diagnostics = validate_source("@memoize\ndef f(x: int) -> int:\n    return x\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, ErrorCode::UnsupportedDecorator);
    }

    #[test]
    fn multiple_inheritance_is_rejected() {
        let diagnostics =
            validate_source("class A(B, C):\n    pass\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("inheritance"));
    }

    #[test]
    fn async_def_is_rejected() {
        let diagnostics = validate_source("async def f() -> int:\n    return 1\n");
        assert_eq!(diagnostics.len(), 1);
        let help = diagnostics[0].suggestion.as_ref().expect("has suggestion");
        assert!(help.message.contains("synchronous"));
    }
}
