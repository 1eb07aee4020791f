//! Shared AST queries
//!
//! Walkers and predicates used by the validator, the inference engine, and
//! the backends. Everything here is read-only; rewrites live in the
//! frontend's optimizer.

use crate::ast::{
    ClassDef, ComprehensionKind, Expression, FStringPart, FunctionDef, LiteralValue,
    MethodDescriptor, Module, RecordDescriptor, Statement,
};
use mgen_types::Type;

/// Calls `f` for every statement in `stmts`, recursing into nested bodies
/// (including function and class bodies)
pub fn walk_statements<'a>(stmts: &'a [Statement], f: &mut impl FnMut(&'a Statement)) {
    for stmt in stmts {
        f(stmt);
        match stmt {
            Statement::If(s) => {
                for arm in &s.arms {
                    walk_statements(&arm.body, f);
                }
                walk_statements(&s.else_body, f);
            }
            Statement::While(s) => walk_statements(&s.body, f),
            Statement::For(s) => walk_statements(&s.body, f),
            Statement::FunctionDef(s) => walk_statements(&s.body, f),
            Statement::ClassDef(s) => walk_statements(&s.body, f),
            Statement::Try(s) => walk_statements(&s.body, f),
            Statement::With(s) => walk_statements(&s.body, f),
            _ => {}
        }
    }
}

/// Calls `f` for every expression in `expr`, including `expr` itself
pub fn walk_expression<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a Expression)) {
    f(expr);
    match expr {
        Expression::Literal(_) | Expression::Name(_) => {}
        Expression::Binary(e) => {
            walk_expression(&e.left, f);
            walk_expression(&e.right, f);
        }
        Expression::Unary(e) => walk_expression(&e.operand, f),
        Expression::Comparison(e) => {
            walk_expression(&e.left, f);
            walk_expression(&e.right, f);
        }
        Expression::Bool(e) => {
            walk_expression(&e.left, f);
            walk_expression(&e.right, f);
        }
        Expression::Call(e) => {
            for arg in &e.arguments {
                walk_expression(arg, f);
            }
        }
        Expression::MethodCall(e) => {
            walk_expression(&e.receiver, f);
            for arg in &e.arguments {
                walk_expression(arg, f);
            }
        }
        Expression::Attribute(e) => walk_expression(&e.receiver, f),
        Expression::Subscript(e) => {
            walk_expression(&e.receiver, f);
            walk_expression(&e.index, f);
        }
        Expression::Slice(e) => {
            walk_expression(&e.receiver, f);
            if let Some(lower) = &e.lower {
                walk_expression(lower, f);
            }
            if let Some(upper) = &e.upper {
                walk_expression(upper, f);
            }
        }
        Expression::ListLiteral(e) | Expression::SetLiteral(e) | Expression::TupleLiteral(e) => {
            for element in &e.elements {
                walk_expression(element, f);
            }
        }
        Expression::DictLiteral(e) => {
            for (key, value) in &e.entries {
                walk_expression(key, f);
                walk_expression(value, f);
            }
        }
        Expression::Comprehension(e) => {
            walk_expression(&e.element, f);
            if let Some(value) = &e.value {
                walk_expression(value, f);
            }
            walk_expression(&e.iterable, f);
            if let Some(condition) = &e.condition {
                walk_expression(condition, f);
            }
        }
        Expression::FormattedString(e) => {
            for part in &e.parts {
                if let FStringPart::Expr(inner) = part {
                    walk_expression(inner, f);
                }
            }
        }
        Expression::Conditional(e) => {
            walk_expression(&e.then_value, f);
            walk_expression(&e.condition, f);
            walk_expression(&e.else_value, f);
        }
        Expression::Lambda(e) => walk_expression(&e.body, f),
        Expression::Yield(e) => {
            if let Some(value) = &e.value {
                walk_expression(value, f);
            }
        }
        Expression::Await(e) => walk_expression(&e.value, f),
    }
}

/// Calls `f` for every expression directly contained in `stmt` (without
/// recursing into nested statement bodies)
pub fn statement_expressions<'a>(stmt: &'a Statement, f: &mut impl FnMut(&'a Expression)) {
    match stmt {
        Statement::Assign(s) => {
            walk_expression(&s.target, f);
            walk_expression(&s.value, f);
        }
        Statement::AugAssign(s) => {
            walk_expression(&s.target, f);
            walk_expression(&s.value, f);
        }
        Statement::Expression(s) => walk_expression(&s.expression, f),
        Statement::Return(s) => {
            if let Some(value) = &s.value {
                walk_expression(value, f);
            }
        }
        Statement::If(s) => {
            for arm in &s.arms {
                walk_expression(&arm.condition, f);
            }
        }
        Statement::While(s) => walk_expression(&s.condition, f),
        Statement::For(s) => walk_expression(&s.iterable, f),
        Statement::Assert(s) => {
            walk_expression(&s.condition, f);
            if let Some(message) = &s.message {
                walk_expression(message, f);
            }
        }
        _ => {}
    }
}

/// Top-level function definitions of a module, in source order
pub fn function_defs(module: &Module) -> impl Iterator<Item = &FunctionDef> {
    module.items.iter().filter_map(|item| match item {
        Statement::FunctionDef(def) => Some(def),
        _ => None,
    })
}

/// Top-level class definitions of a module, in source order
pub fn class_defs(module: &Module) -> impl Iterator<Item = &ClassDef> {
    module.items.iter().filter_map(|item| match item {
        Statement::ClassDef(def) => Some(def),
        _ => None,
    })
}

/// Whether any expression in the module is a comprehension
pub fn uses_comprehensions(module: &Module) -> bool {
    let mut found = false;
    walk_statements(&module.items, &mut |stmt| {
        statement_expressions(stmt, &mut |expr| {
            if matches!(expr, Expression::Comprehension(_)) {
                found = true;
            }
        });
    });
    found
}

/// The docstring of a body, when its first statement is a bare string
pub fn docstring(body: &[Statement]) -> Option<&str> {
    match body.first() {
        Some(Statement::Expression(stmt)) => match &stmt.expression {
            Expression::Literal(lit) => match &lit.value {
                LiteralValue::Str(text) => Some(text),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

/// The body of an `if __name__ == "__main__":` guard, when `stmt` is one
pub fn main_guard_body(stmt: &Statement) -> Option<&[Statement]> {
    let Statement::If(if_stmt) = stmt else {
        return None;
    };
    if if_stmt.arms.len() != 1 || !if_stmt.else_body.is_empty() {
        return None;
    }
    let arm = &if_stmt.arms[0];
    let Expression::Comparison(cmp) = &arm.condition else {
        return None;
    };
    if cmp.operator != crate::ast::ComparisonOperator::Eq {
        return None;
    }
    let is_name = cmp.left.as_name() == Some("__name__");
    let is_main = matches!(
        &*cmp.right,
        Expression::Literal(lit)
            if lit.value == LiteralValue::Str("__main__".to_string())
    );
    if is_name && is_main { Some(&arm.body) } else { None }
}

/// Whether a guard body consists solely of a `main()` call
pub fn guard_calls_main(body: &[Statement]) -> bool {
    matches!(
        body,
        [Statement::Expression(stmt)]
            if matches!(
                &stmt.expression,
                Expression::Call(call) if call.function == "main" && call.arguments.is_empty()
            )
    )
}

/// Whether a method name is one of the recognized string methods
pub fn is_string_method(name: &str) -> bool {
    matches!(
        name,
        "split" | "join" | "upper" | "lower" | "strip" | "find" | "replace" | "startswith"
            | "endswith"
    )
}

/// Whether a method name mutates a list receiver
pub fn is_list_mutator(name: &str) -> bool {
    matches!(name, "append" | "insert" | "pop" | "remove" | "extend" | "clear" | "sort")
}

/// Whether a method name mutates a set receiver
pub fn is_set_mutator(name: &str) -> bool {
    matches!(name, "add" | "discard" | "remove" | "clear")
}

/// Whether a method name mutates a dict receiver
pub fn is_dict_mutator(name: &str) -> bool {
    matches!(name, "pop" | "clear" | "update")
}

/// Whether an expression is an access to a field of the receiver parameter
pub fn is_receiver_field(expr: &Expression, receiver: &str) -> bool {
    match expr {
        Expression::Attribute(attr) => attr.receiver.as_name() == Some(receiver),
        _ => false,
    }
}

/// Whether a method body mutates any field of its receiver
///
/// Detects direct field assignment (`self.n = ...`, `self.n += ...`) and
/// mutating container-method calls on a field (`self.items.append(...)`).
pub fn mutates_receiver(body: &[Statement], receiver: &str) -> bool {
    let mut mutated = false;
    walk_statements(body, &mut |stmt| {
        match stmt {
            Statement::Assign(s) => {
                if is_receiver_field(&s.target, receiver) {
                    mutated = true;
                }
                if let Expression::Subscript(sub) = &s.target {
                    if is_receiver_field(&sub.receiver, receiver) {
                        mutated = true;
                    }
                }
            }
            Statement::AugAssign(s) => {
                if is_receiver_field(&s.target, receiver) {
                    mutated = true;
                }
                if let Expression::Subscript(sub) = &s.target {
                    if is_receiver_field(&sub.receiver, receiver) {
                        mutated = true;
                    }
                }
            }
            _ => {}
        }
        statement_expressions(stmt, &mut |expr| {
            if let Expression::MethodCall(call) = expr {
                if is_receiver_field(&call.receiver, receiver)
                    && (is_list_mutator(&call.method)
                        || is_set_mutator(&call.method)
                        || is_dict_mutator(&call.method))
                {
                    mutated = true;
                }
            }
        });
    });
    mutated
}

/// Derives a record summary from a class definition
///
/// Fields come from annotated assignments in the class body (dataclass
/// style) and from `self.field = ...` statements in `__init__`; a field
/// assigned from a parameter takes the parameter's annotation. Methods are
/// every other function in the class body, with the receiver parameter
/// stripped and mutation detected by a body scan.
pub fn extract_record(class_def: &ClassDef) -> RecordDescriptor {
    let is_dataclass = class_def.decorators.iter().any(|d| d == "dataclass");
    let is_namedtuple = class_def.bases.iter().any(|b| b == "NamedTuple");

    let mut fields: Vec<(String, Type)> = Vec::new();
    let mut methods = Vec::new();

    for item in &class_def.body {
        match item {
            // dataclass-style annotated field
            Statement::Assign(assign) => {
                if let (Some(name), Some(annotation)) =
                    (assign.target.as_name(), assign.annotation.as_ref())
                {
                    push_field(&mut fields, name, annotation.clone());
                }
            }
            Statement::Expression(stmt) => {
                // bare annotation lines parse as annotated assigns; a bare
                // docstring is skipped here
                let _ = stmt;
            }
            Statement::FunctionDef(def) => {
                if def.name == "__init__" {
                    collect_init_fields(def, &mut fields);
                } else {
                    methods.push(method_descriptor(def));
                }
            }
            _ => {}
        }
    }

    RecordDescriptor {
        name: class_def.name.clone(),
        fields,
        methods,
        is_dataclass,
        is_namedtuple,
    }
}

fn push_field(fields: &mut Vec<(String, Type)>, name: &str, ty: Type) {
    if !fields.iter().any(|(existing, _)| existing == name) {
        fields.push((name.to_string(), ty));
    }
}

/// Collects `self.field = ...` bindings from a constructor body
fn collect_init_fields(def: &FunctionDef, fields: &mut Vec<(String, Type)>) {
    let receiver = def
        .parameters
        .first()
        .map(|p| p.name.as_str())
        .unwrap_or("self");
    for stmt in &def.body {
        if let Statement::Assign(assign) = stmt {
            if let Expression::Attribute(attr) = &assign.target {
                if attr.receiver.as_name() == Some(receiver) {
                    let ty = assign
                        .annotation
                        .clone()
                        .or_else(|| {
                            // self.x = x picks up the parameter annotation
                            assign.value.as_name().and_then(|value_name| {
                                def.parameters
                                    .iter()
                                    .find(|p| p.name == value_name)
                                    .map(|p| p.ty.clone())
                            })
                        })
                        .unwrap_or(Type::Unknown);
                    push_field(fields, &attr.attribute, ty);
                }
            }
        }
    }
}

fn method_descriptor(def: &FunctionDef) -> MethodDescriptor {
    let is_static = def.decorators.iter().any(|d| d == "staticmethod");
    let receiver = if is_static {
        None
    } else {
        def.parameters.first().map(|p| p.name.clone())
    };
    let parameters = def
        .parameters
        .iter()
        .skip(if is_static { 0 } else { 1 })
        .map(|p| (p.name.clone(), p.ty.clone()))
        .collect();
    let mutates = receiver
        .as_deref()
        .is_some_and(|name| mutates_receiver(&def.body, name));
    MethodDescriptor {
        name: def.name.clone(),
        parameters,
        return_type: def.return_type.clone(),
        mutates_receiver: mutates,
        is_static,
    }
}
