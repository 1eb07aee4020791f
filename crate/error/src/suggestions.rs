//! Fixed suggestion database
//!
//! Maps an error code plus a contextual keyword (the rejected feature name,
//! the offending binding, ...) to the `help:` text shown under the
//! diagnostic. Phases ask here first so equivalent rejections always carry
//! the same advice.

use crate::error_codes::ErrorCode;

/// Returns the default suggestion for a diagnostic, if the database has one
///
/// ### Arguments
/// * `code` - The error code being emitted
/// * `context` - A contextual keyword, usually the rejected feature name
pub fn default_suggestion(code: ErrorCode, context: &str) -> Option<String> {
    match code {
        ErrorCode::UnsupportedFeature
        | ErrorCode::UnsupportedStatement
        | ErrorCode::UnsupportedExpression => feature_suggestion(context),
        ErrorCode::UnannotatedSignature => Some(
            "annotate every parameter and the return type: `def f(x: int) -> int:`".to_string(),
        ),
        ErrorCode::MissingAnnotation => {
            Some("add an explicit type annotation: `x: int = ...`".to_string())
        }
        ErrorCode::UnsupportedDecorator => Some(
            "only @dataclass, @staticmethod and @classmethod are recognized".to_string(),
        ),
        ErrorCode::UnknownModule => {
            Some("only typing, dataclasses and collections members can be imported".to_string())
        }
        _ => None,
    }
}

fn feature_suggestion(feature: &str) -> Option<String> {
    let text = match feature {
        "yield" => "return a list; generators are not supported",
        "async" | "await" => "use a synchronous function",
        "with" => "use explicit open/close calls",
        "lambda" => "define a named function",
        "try" | "except" | "finally" | "raise" => {
            "use explicit result values or early returns; exceptions are not supported"
        }
        "del" => "let the value go out of scope instead",
        "global" | "nonlocal" => "pass the value as a parameter and return the new value",
        "eval" | "exec" => "replace runtime evaluation with a compile-time construct",
        "isinstance" | "getattr" => "refactor to explicit tagged variants and dispatch functions",
        "metaclass" => "use a plain class; metaclasses are not supported",
        "inheritance" => "flatten the hierarchy; records do not support multiple bases",
        "starargs" => "declare each parameter explicitly",
        _ => return None,
    };
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yield_suggests_returning_a_list() {
        let text = default_suggestion(ErrorCode::UnsupportedFeature, "yield").unwrap();
        assert!(text.contains("return a list"));
    }

    #[test]
    fn async_and_await_share_advice() {
        assert_eq!(
            default_suggestion(ErrorCode::UnsupportedFeature, "async"),
            default_suggestion(ErrorCode::UnsupportedFeature, "await"),
        );
    }

    #[test]
    fn missing_annotation_suggests_the_syntax() {
        let text = default_suggestion(ErrorCode::MissingAnnotation, "x").unwrap();
        assert!(text.contains("x: int"));
    }

    #[test]
    fn unknown_contexts_have_no_suggestion() {
        assert_eq!(
            default_suggestion(ErrorCode::UnsupportedFeature, "not-a-feature"),
            None
        );
        assert_eq!(default_suggestion(ErrorCode::BuildFailure, "gcc"), None);
    }
}
