//! Source-level optimization
//!
//! Small, safe rewrites applied before mapping: constant folding of
//! literal arithmetic, elimination of branches behind compile-time
//! constants, and docstring stripping. Rewrites never change observable
//! behavior of a valid program.

use mgen_ir::ast::{
    BinaryOperator, BoolOperator, ComparisonOperator, Expression, FStringPart, LiteralExpr,
    LiteralValue, Module, Statement, UnaryOperator,
};
use mgen_ir::query;

/// Counters describing what the optimizer did, the phase artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub constants_folded: usize,
    pub branches_eliminated: usize,
    pub docstrings_stripped: usize,
}

/// Applies all source-level rewrites to the module in place
pub fn optimize(module: &mut Module) -> OptimizeStats {
    let mut stats = OptimizeStats::default();
    strip_docstrings(&mut module.items, &mut stats);
    optimize_body(&mut module.items, &mut stats);
    stats
}

fn strip_docstrings(body: &mut Vec<Statement>, stats: &mut OptimizeStats) {
    if query::docstring(body).is_some() {
        body.remove(0);
        stats.docstrings_stripped += 1;
    }
}

fn optimize_statement(stmt: &mut Statement, stats: &mut OptimizeStats) {
    match stmt {
        Statement::Assign(s) => {
            fold(&mut s.value, stats);
        }
        Statement::AugAssign(s) => fold(&mut s.value, stats),
        Statement::Expression(s) => fold(&mut s.expression, stats),
        Statement::Return(s) => {
            if let Some(value) = &mut s.value {
                fold(value, stats);
            }
        }
        Statement::While(s) => {
            fold(&mut s.condition, stats);
            optimize_body(&mut s.body, stats);
        }
        Statement::For(s) => {
            fold(&mut s.iterable, stats);
            optimize_body(&mut s.body, stats);
        }
        Statement::Assert(s) => {
            fold(&mut s.condition, stats);
            if let Some(message) = &mut s.message {
                fold(message, stats);
            }
        }
        Statement::FunctionDef(def) => {
            strip_docstrings(&mut def.body, stats);
            optimize_body(&mut def.body, stats);
        }
        Statement::ClassDef(def) => {
            strip_docstrings(&mut def.body, stats);
            optimize_body(&mut def.body, stats);
        }
        _ => {}
    }
}

/// Optimizes a statement list, flattening ifs behind constant conditions
fn optimize_body(body: &mut Vec<Statement>, stats: &mut OptimizeStats) {
    let mut result = Vec::with_capacity(body.len());
    for mut stmt in std::mem::take(body) {
        if let Statement::If(ref mut if_stmt) = stmt {
            for arm in &mut if_stmt.arms {
                fold(&mut arm.condition, stats);
                optimize_body(&mut arm.body, stats);
            }
            optimize_body(&mut if_stmt.else_body, stats);

            // drop arms behind a literal False, inline behind a literal True
            let mut resolved: Option<Vec<Statement>> = None;
            let mut kept_arms = Vec::new();
            for arm in if_stmt.arms.drain(..) {
                match constant_bool(&arm.condition) {
                    Some(false) => {
                        stats.branches_eliminated += 1;
                    }
                    Some(true) if kept_arms.is_empty() => {
                        stats.branches_eliminated += 1;
                        resolved = Some(arm.body);
                        break;
                    }
                    _ => kept_arms.push(arm),
                }
            }

            match resolved {
                Some(mut inlined) => {
                    result.append(&mut inlined);
                    continue;
                }
                None => {
                    if kept_arms.is_empty() {
                        // every arm was statically false
                        result.append(&mut if_stmt.else_body);
                        continue;
                    }
                    if_stmt.arms = kept_arms;
                }
            }
        } else {
            optimize_statement(&mut stmt, stats);
        }
        result.push(stmt);
    }
    *body = result;
}

/// Folds literal subexpressions bottom-up
fn fold(expr: &mut Expression, stats: &mut OptimizeStats) {
    match expr {
        Expression::Binary(e) => {
            fold(&mut e.left, stats);
            fold(&mut e.right, stats);
            if let (Some(left), Some(right)) = (literal_of(&e.left), literal_of(&e.right)) {
                if let Some(folded) = fold_binary(e.operator, left, right) {
                    stats.constants_folded += 1;
                    *expr = Expression::Literal(LiteralExpr {
                        value: folded,
                        ty: mgen_types::Type::Unknown,
                        location: e.location,
                    });
                }
            }
        }
        Expression::Unary(e) => {
            fold(&mut e.operand, stats);
            if let Some(operand) = literal_of(&e.operand) {
                if let Some(folded) = fold_unary(e.operator, operand) {
                    stats.constants_folded += 1;
                    *expr = Expression::Literal(LiteralExpr {
                        value: folded,
                        ty: mgen_types::Type::Unknown,
                        location: e.location,
                    });
                }
            }
        }
        Expression::Bool(e) => {
            fold(&mut e.left, stats);
            fold(&mut e.right, stats);
            if let (Some(LiteralValue::Bool(left)), Some(LiteralValue::Bool(right))) =
                (literal_of(&e.left), literal_of(&e.right))
            {
                let value = match e.operator {
                    BoolOperator::And => *left && *right,
                    BoolOperator::Or => *left || *right,
                };
                stats.constants_folded += 1;
                *expr = Expression::Literal(LiteralExpr {
                    value: LiteralValue::Bool(value),
                    ty: mgen_types::Type::Unknown,
                    location: e.location,
                });
            }
        }
        Expression::Comparison(e) => {
            fold(&mut e.left, stats);
            fold(&mut e.right, stats);
            if let (Some(LiteralValue::Int(left)), Some(LiteralValue::Int(right))) =
                (literal_of(&e.left), literal_of(&e.right))
            {
                let value = match e.operator {
                    ComparisonOperator::Eq => left == right,
                    ComparisonOperator::NotEq => left != right,
                    ComparisonOperator::Lt => left < right,
                    ComparisonOperator::LtEq => left <= right,
                    ComparisonOperator::Gt => left > right,
                    ComparisonOperator::GtEq => left >= right,
                    ComparisonOperator::In | ComparisonOperator::NotIn => return,
                };
                stats.constants_folded += 1;
                *expr = Expression::Literal(LiteralExpr {
                    value: LiteralValue::Bool(value),
                    ty: mgen_types::Type::Unknown,
                    location: e.location,
                });
            }
        }
        Expression::Call(e) => {
            for arg in &mut e.arguments {
                fold(arg, stats);
            }
        }
        Expression::MethodCall(e) => {
            fold(&mut e.receiver, stats);
            for arg in &mut e.arguments {
                fold(arg, stats);
            }
        }
        Expression::Subscript(e) => {
            fold(&mut e.receiver, stats);
            fold(&mut e.index, stats);
        }
        Expression::Slice(e) => {
            fold(&mut e.receiver, stats);
            if let Some(lower) = &mut e.lower {
                fold(lower, stats);
            }
            if let Some(upper) = &mut e.upper {
                fold(upper, stats);
            }
        }
        Expression::ListLiteral(e) | Expression::SetLiteral(e) | Expression::TupleLiteral(e) => {
            for element in &mut e.elements {
                fold(element, stats);
            }
        }
        Expression::DictLiteral(e) => {
            for (key, value) in &mut e.entries {
                fold(key, stats);
                fold(value, stats);
            }
        }
        Expression::Comprehension(e) => {
            fold(&mut e.element, stats);
            if let Some(value) = &mut e.value {
                fold(value, stats);
            }
            fold(&mut e.iterable, stats);
            if let Some(condition) = &mut e.condition {
                fold(condition, stats);
            }
        }
        Expression::FormattedString(e) => {
            for part in &mut e.parts {
                if let FStringPart::Expr(inner) = part {
                    fold(inner, stats);
                }
            }
        }
        Expression::Conditional(e) => {
            fold(&mut e.then_value, stats);
            fold(&mut e.condition, stats);
            fold(&mut e.else_value, stats);
        }
        _ => {}
    }
}

fn literal_of(expr: &Expression) -> Option<&LiteralValue> {
    match expr {
        Expression::Literal(lit) => Some(&lit.value),
        _ => None,
    }
}

fn constant_bool(expr: &Expression) -> Option<bool> {
    match literal_of(expr) {
        Some(LiteralValue::Bool(value)) => Some(*value),
        _ => None,
    }
}

fn fold_binary(
    operator: BinaryOperator,
    left: &LiteralValue,
    right: &LiteralValue,
) -> Option<LiteralValue> {
    match (left, right) {
        (LiteralValue::Int(a), LiteralValue::Int(b)) => fold_int(operator, *a, *b),
        (LiteralValue::Float(a), LiteralValue::Float(b)) => fold_float(operator, *a, *b),
        (LiteralValue::Str(a), LiteralValue::Str(b)) if operator == BinaryOperator::Add => {
            Some(LiteralValue::Str(format!("{}{}", a, b)))
        }
        _ => None,
    }
}

fn fold_int(operator: BinaryOperator, a: i64, b: i64) -> Option<LiteralValue> {
    let value = match operator {
        BinaryOperator::Add => a.checked_add(b)?,
        BinaryOperator::Sub => a.checked_sub(b)?,
        BinaryOperator::Mul => a.checked_mul(b)?,
        // true division of int literals produces a float
        BinaryOperator::Div => {
            if b == 0 {
                return None;
            }
            return Some(LiteralValue::Float(a as f64 / b as f64));
        }
        BinaryOperator::FloorDiv => {
            if b == 0 {
                return None;
            }
            a.div_euclid(b)
        }
        BinaryOperator::Mod => {
            if b == 0 {
                return None;
            }
            a.rem_euclid(b)
        }
        BinaryOperator::Pow => {
            let exp = u32::try_from(b).ok()?;
            a.checked_pow(exp)?
        }
    };
    Some(LiteralValue::Int(value))
}

fn fold_float(operator: BinaryOperator, a: f64, b: f64) -> Option<LiteralValue> {
    let value = match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
        BinaryOperator::Pow => a.powf(b),
        BinaryOperator::FloorDiv | BinaryOperator::Mod => return None,
    };
    Some(LiteralValue::Float(value))
}

fn fold_unary(operator: UnaryOperator, operand: &LiteralValue) -> Option<LiteralValue> {
    match (operator, operand) {
        (UnaryOperator::Neg, LiteralValue::Int(v)) => Some(LiteralValue::Int(v.checked_neg()?)),
        (UnaryOperator::Neg, LiteralValue::Float(v)) => Some(LiteralValue::Float(-v)),
        (UnaryOperator::Pos, LiteralValue::Int(v)) => Some(LiteralValue::Int(*v)),
        (UnaryOperator::Pos, LiteralValue::Float(v)) => Some(LiteralValue::Float(*v)),
        (UnaryOperator::Not, LiteralValue::Bool(v)) => Some(LiteralValue::Bool(!v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn optimize_source(source: &str) -> (Module, OptimizeStats) {
        let mut module = parse_source(source, "test.py").expect("parses");
        let stats = optimize(&mut module);
        (module, stats)
    }

    #[test]
    fn folds_literal_arithmetic() {
        let (module, stats) = optimize_source("x = 2 + 3 * 4\n");
        assert_eq!(stats.constants_folded, 2);
        match &module.items[0] {
            Statement::Assign(assign) => match &assign.value {
                Expression::Literal(lit) => assert_eq!(lit.value, LiteralValue::Int(14)),
                other => panic!("expected literal, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn int_division_folds_to_float() {
        let (module, _) = optimize_source("x = 7 / 2\n");
        match &module.items[0] {
            Statement::Assign(assign) => match &assign.value {
                Expression::Literal(lit) => assert_eq!(lit.value, LiteralValue::Float(3.5)),
                other => panic!("expected literal, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn division_by_zero_is_left_alone() {
        let (module, stats) = optimize_source("x = 1 // 0\n");
        assert_eq!(stats.constants_folded, 0);
        match &module.items[0] {
            Statement::Assign(assign) => {
                assert!(matches!(assign.value, Expression::Binary(_)));
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn dead_branches_are_eliminated() {
        let (module, stats) = optimize_source(
            "def f() -> int:\n    if True:\n        return 1\n    else:\n        return 2\n",
        );
        assert_eq!(stats.branches_eliminated, 1);
        match &module.items[0] {
            Statement::FunctionDef(def) => {
                assert_eq!(def.body.len(), 1);
                assert!(matches!(def.body[0], Statement::Return(_)));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn false_branch_keeps_the_else() {
        let (module, _) = optimize_source(
            "def f() -> int:\n    if False:\n        return 1\n    else:\n        return 2\n",
        );
        match &module.items[0] {
            Statement::FunctionDef(def) => {
                assert_eq!(def.body.len(), 1);
                match &def.body[0] {
                    Statement::Return(ret) => match ret.value.as_ref().unwrap() {
                        Expression::Literal(lit) => {
                            assert_eq!(lit.value, LiteralValue::Int(2))
                        }
                        other => panic!("expected literal, got {:?}", other),
                    },
                    other => panic!("expected return, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn docstrings_are_stripped() {
        let (module, stats) = optimize_source(
            "\"\"\"module doc\"\"\"\ndef f() -> int:\n    \"\"\"fn doc\"\"\"\n    return 1\n",
        );
        assert_eq!(stats.docstrings_stripped, 2);
        match &module.items[0] {
            Statement::FunctionDef(def) => assert_eq!(def.body.len(), 1),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn runtime_expressions_are_untouched() {
        let (module, stats) = optimize_source("x = a + 1\n");
        assert_eq!(stats.constants_folded, 0);
        match &module.items[0] {
            Statement::Assign(assign) => {
                assert!(matches!(assign.value, Expression::Binary(_)));
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }
}
