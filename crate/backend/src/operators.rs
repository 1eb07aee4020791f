//! The shared operator table
//!
//! One table of binary/unary/comparison/augmented operators consumed by
//! every backend. Entries are the C-family spellings the majority of
//! targets share; an operator a target spells differently (power, floor
//! division, `in`, boolean connectives in the functional targets) returns
//! None here and is handled inside that backend's `emit_expression`.

use mgen_ir::ast::{BinaryOperator, BoolOperator, ComparisonOperator, UnaryOperator};

/// The shared infix spelling of a binary operator, if there is one
pub fn binary(op: BinaryOperator) -> Option<&'static str> {
    match op {
        BinaryOperator::Add => Some("+"),
        BinaryOperator::Sub => Some("-"),
        BinaryOperator::Mul => Some("*"),
        BinaryOperator::Div => Some("/"),
        BinaryOperator::Mod => Some("%"),
        // power and floor division have no common spelling
        BinaryOperator::Pow | BinaryOperator::FloorDiv => None,
    }
}

/// The shared spelling of a comparison operator, if there is one
pub fn comparison(op: ComparisonOperator) -> Option<&'static str> {
    match op {
        ComparisonOperator::Eq => Some("=="),
        ComparisonOperator::NotEq => Some("!="),
        ComparisonOperator::Lt => Some("<"),
        ComparisonOperator::LtEq => Some("<="),
        ComparisonOperator::Gt => Some(">"),
        ComparisonOperator::GtEq => Some(">="),
        // membership is container- and target-specific
        ComparisonOperator::In | ComparisonOperator::NotIn => None,
    }
}

/// The C-family spelling of a unary operator
pub fn unary(op: UnaryOperator) -> &'static str {
    match op {
        UnaryOperator::Neg => "-",
        UnaryOperator::Pos => "+",
        UnaryOperator::Not => "!",
    }
}

/// The C-family spelling of a boolean connective
pub fn bool_op(op: BoolOperator) -> &'static str {
    match op {
        BoolOperator::And => "&&",
        BoolOperator::Or => "||",
    }
}

/// The shared spelling of an augmented assignment, if there is one
pub fn augmented(op: BinaryOperator) -> Option<&'static str> {
    match op {
        BinaryOperator::Add => Some("+="),
        BinaryOperator::Sub => Some("-="),
        BinaryOperator::Mul => Some("*="),
        BinaryOperator::Div => Some("/="),
        BinaryOperator::Mod => Some("%="),
        BinaryOperator::Pow | BinaryOperator::FloorDiv => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_BINARY: [BinaryOperator; 7] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::FloorDiv,
        BinaryOperator::Mod,
        BinaryOperator::Pow,
    ];

    const ALL_COMPARISON: [ComparisonOperator; 8] = [
        ComparisonOperator::Eq,
        ComparisonOperator::NotEq,
        ComparisonOperator::Lt,
        ComparisonOperator::LtEq,
        ComparisonOperator::Gt,
        ComparisonOperator::GtEq,
        ComparisonOperator::In,
        ComparisonOperator::NotIn,
    ];

    #[test]
    fn binary_mapping_is_injective() {
        let mut seen = std::collections::HashSet::new();
        for op in ALL_BINARY {
            if let Some(text) = binary(op) {
                assert!(seen.insert(text), "duplicate spelling '{}'", text);
            }
        }
    }

    #[test]
    fn comparison_mapping_is_injective() {
        let mut seen = std::collections::HashSet::new();
        for op in ALL_COMPARISON {
            if let Some(text) = comparison(op) {
                assert!(seen.insert(text), "duplicate spelling '{}'", text);
            }
        }
    }

    #[test]
    fn target_specific_operators_are_left_out() {
        assert_eq!(binary(BinaryOperator::Pow), None);
        assert_eq!(binary(BinaryOperator::FloorDiv), None);
        assert_eq!(comparison(ComparisonOperator::In), None);
    }

    #[test]
    fn augmented_matches_binary() {
        for op in ALL_BINARY {
            match (binary(op), augmented(op)) {
                (Some(plain), Some(aug)) => assert_eq!(format!("{}=", plain), aug),
                (None, None) => {}
                other => panic!("inconsistent table entry: {:?}", other),
            }
        }
    }
}
