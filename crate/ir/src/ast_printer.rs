//! Debug tree printer for the AST, enabled with the `print-ast` feature

use crate::ast::{Expression, FStringPart, LiteralValue, Module, Statement};

/// Prints a module as an indented tree to stdout
pub fn print_module(module: &Module) {
    println!("Module ({})", module.file_name);
    for item in &module.items {
        print_statement(item, 1);
    }
}

fn pad(indent: usize) -> String {
    "  ".repeat(indent)
}

fn print_statement(stmt: &Statement, indent: usize) {
    let prefix = pad(indent);
    match stmt {
        Statement::Assign(s) => {
            println!("{}Assign (ty: {})", prefix, s.ty);
            print_expression(&s.target, indent + 1);
            print_expression(&s.value, indent + 1);
        }
        Statement::AugAssign(s) => {
            println!("{}AugAssign {}=", prefix, s.operator);
            print_expression(&s.target, indent + 1);
            print_expression(&s.value, indent + 1);
        }
        Statement::Expression(s) => {
            println!("{}ExprStmt", prefix);
            print_expression(&s.expression, indent + 1);
        }
        Statement::Return(s) => {
            println!("{}Return", prefix);
            if let Some(value) = &s.value {
                print_expression(value, indent + 1);
            }
        }
        Statement::If(s) => {
            println!("{}If ({} arms)", prefix, s.arms.len());
            for arm in &s.arms {
                print_expression(&arm.condition, indent + 1);
                for stmt in &arm.body {
                    print_statement(stmt, indent + 2);
                }
            }
            if !s.else_body.is_empty() {
                println!("{}Else", pad(indent + 1));
                for stmt in &s.else_body {
                    print_statement(stmt, indent + 2);
                }
            }
        }
        Statement::While(s) => {
            println!("{}While", prefix);
            print_expression(&s.condition, indent + 1);
            for stmt in &s.body {
                print_statement(stmt, indent + 1);
            }
        }
        Statement::For(s) => {
            println!("{}For {} ", prefix, s.targets.join(", "));
            print_expression(&s.iterable, indent + 1);
            for stmt in &s.body {
                print_statement(stmt, indent + 1);
            }
        }
        Statement::FunctionDef(s) => {
            let params: Vec<String> = s
                .parameters
                .iter()
                .map(|p| format!("{}: {}", p.name, p.ty))
                .collect();
            println!(
                "{}FunctionDef {}({}) -> {}",
                prefix,
                s.name,
                params.join(", "),
                s.return_type
            );
            for stmt in &s.body {
                print_statement(stmt, indent + 1);
            }
        }
        Statement::ClassDef(s) => {
            println!("{}ClassDef {}", prefix, s.name);
            for stmt in &s.body {
                print_statement(stmt, indent + 1);
            }
        }
        Statement::Import(s) => {
            println!("{}Import {} ({})", prefix, s.module, s.members.join(", "));
        }
        Statement::Assert(s) => {
            println!("{}Assert", prefix);
            print_expression(&s.condition, indent + 1);
        }
        other => println!("{}{:?}", prefix, std::mem::discriminant(other)),
    }
}

fn print_expression(expr: &Expression, indent: usize) {
    let prefix = pad(indent);
    match expr {
        Expression::Literal(e) => match &e.value {
            LiteralValue::Int(v) => println!("{}Int {}", prefix, v),
            LiteralValue::Float(v) => println!("{}Float {}", prefix, v),
            LiteralValue::Bool(v) => println!("{}Bool {}", prefix, v),
            LiteralValue::Str(v) => println!("{}Str {:?}", prefix, v),
            LiteralValue::None => println!("{}None", prefix),
        },
        Expression::Name(e) => println!("{}Name {} (ty: {})", prefix, e.name, e.ty),
        Expression::Binary(e) => {
            println!("{}Binary {} (ty: {})", prefix, e.operator, e.ty);
            print_expression(&e.left, indent + 1);
            print_expression(&e.right, indent + 1);
        }
        Expression::Unary(e) => {
            println!("{}Unary {}", prefix, e.operator);
            print_expression(&e.operand, indent + 1);
        }
        Expression::Comparison(e) => {
            println!("{}Comparison {}", prefix, e.operator);
            print_expression(&e.left, indent + 1);
            print_expression(&e.right, indent + 1);
        }
        Expression::Bool(e) => {
            println!("{}Bool {}", prefix, e.operator);
            print_expression(&e.left, indent + 1);
            print_expression(&e.right, indent + 1);
        }
        Expression::Call(e) => {
            println!("{}Call {} (ty: {})", prefix, e.function, e.ty);
            for arg in &e.arguments {
                print_expression(arg, indent + 1);
            }
        }
        Expression::MethodCall(e) => {
            println!("{}MethodCall .{} (ty: {})", prefix, e.method, e.ty);
            print_expression(&e.receiver, indent + 1);
            for arg in &e.arguments {
                print_expression(arg, indent + 1);
            }
        }
        Expression::Attribute(e) => {
            println!("{}Attribute .{} (ty: {})", prefix, e.attribute, e.ty);
            print_expression(&e.receiver, indent + 1);
        }
        Expression::Subscript(e) => {
            println!("{}Subscript (ty: {})", prefix, e.ty);
            print_expression(&e.receiver, indent + 1);
            print_expression(&e.index, indent + 1);
        }
        Expression::ListLiteral(e) => {
            println!("{}ListLiteral (ty: {})", prefix, e.ty);
            for element in &e.elements {
                print_expression(element, indent + 1);
            }
        }
        Expression::DictLiteral(e) => {
            println!("{}DictLiteral (ty: {})", prefix, e.ty);
            for (key, value) in &e.entries {
                print_expression(key, indent + 1);
                print_expression(value, indent + 1);
            }
        }
        Expression::Comprehension(e) => {
            println!("{}Comprehension {:?} over {}", prefix, e.kind, e.variable);
            print_expression(&e.element, indent + 1);
            print_expression(&e.iterable, indent + 1);
        }
        Expression::FormattedString(e) => {
            println!("{}FormattedString", prefix);
            for part in &e.parts {
                match part {
                    FStringPart::Text(text) => println!("{}Text {:?}", pad(indent + 1), text),
                    FStringPart::Expr(inner) => print_expression(inner, indent + 1),
                }
            }
        }
        Expression::Conditional(e) => {
            println!("{}Conditional", prefix);
            print_expression(&e.then_value, indent + 1);
            print_expression(&e.condition, indent + 1);
            print_expression(&e.else_value, indent + 1);
        }
        other => println!("{}{:?} (ty: {})", prefix, std::mem::discriminant(other), other.ty()),
    }
}
