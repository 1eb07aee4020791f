use mgen_derive::NumericEnum;

/// Error codes for every diagnostic the compiler can emit
///
/// Codes fall into five bands:
/// - 1000-1099: feature support (constructs outside the static subset)
/// - 2000-2099: type system (mapping, inference, incompatibility)
/// - 3000-3099: syntax and parsing
/// - 4000-4099: import resolution
/// - 5000-5099: code generation and build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, NumericEnum)]
pub enum ErrorCode {
    // Feature support (1000-1099)

    /// A construct outside the accepted static subset
    UnsupportedFeature = 1001,
    /// A statement form outside the subset
    UnsupportedStatement = 1002,
    /// An expression form outside the subset
    UnsupportedExpression = 1003,
    /// An operator outside the subset
    UnsupportedOperator = 1004,
    /// A constant form outside the subset
    UnsupportedConstant = 1005,
    /// A function signature missing parameter or return annotations
    UnannotatedSignature = 1006,
    /// A decorator outside the recognized set
    UnsupportedDecorator = 1007,

    // Type system (2000-2099)

    /// A type could not be mapped to the target
    UnresolvedType = 2001,
    /// A binding needs an explicit type annotation
    MissingAnnotation = 2002,
    /// Two usage sites disagree about a type
    IncompatibleTypes = 2003,
    /// A record name is used but never defined
    UnknownRecord = 2004,
    /// A call does not match the callee's signature
    SignatureMismatch = 2005,

    // Syntax (3000-3099)

    /// General syntax error
    SyntaxError = 3001,
    /// Unexpected token
    UnexpectedToken = 3002,
    /// Inconsistent indentation
    InvalidIndentation = 3003,
    /// Unterminated string literal
    UnterminatedString = 3004,
    /// Malformed number literal
    InvalidNumberLiteral = 3005,
    /// Invalid escape sequence in a string literal
    InvalidEscapeSequence = 3006,

    // Imports (4000-4099)

    /// Import of a module outside the recognized set
    UnknownModule = 4001,
    /// Import of a member the module does not provide
    UnknownImportMember = 4002,

    // Codegen and build (5000-5099)

    /// A construct reached the emitter that it cannot express
    CodegenFailure = 5001,
    /// The external build step timed out
    BuildTimeout = 5002,
    /// The external build step failed
    BuildFailure = 5003,
}

impl ErrorCode {
    /// The numeric code as a u16
    pub fn code(&self) -> u16 {
        self.to_int() as u16
    }

    /// A short description of the error
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UnsupportedFeature => "Unsupported language feature",
            ErrorCode::UnsupportedStatement => "Unsupported statement",
            ErrorCode::UnsupportedExpression => "Unsupported expression",
            ErrorCode::UnsupportedOperator => "Unsupported operator",
            ErrorCode::UnsupportedConstant => "Unsupported constant",
            ErrorCode::UnannotatedSignature => "Missing parameter or return annotation",
            ErrorCode::UnsupportedDecorator => "Unsupported decorator",
            ErrorCode::UnresolvedType => "Type cannot be mapped to the target",
            ErrorCode::MissingAnnotation => "Missing type annotation",
            ErrorCode::IncompatibleTypes => "Incompatible types",
            ErrorCode::UnknownRecord => "Unknown record type",
            ErrorCode::SignatureMismatch => "Call does not match signature",
            ErrorCode::SyntaxError => "Syntax error",
            ErrorCode::UnexpectedToken => "Unexpected token",
            ErrorCode::InvalidIndentation => "Inconsistent indentation",
            ErrorCode::UnterminatedString => "Unterminated string literal",
            ErrorCode::InvalidNumberLiteral => "Invalid number literal",
            ErrorCode::InvalidEscapeSequence => "Invalid escape sequence",
            ErrorCode::UnknownModule => "Unknown module",
            ErrorCode::UnknownImportMember => "Unknown import member",
            ErrorCode::CodegenFailure => "Code generation failure",
            ErrorCode::BuildTimeout => "Build timed out",
            ErrorCode::BuildFailure => "Build failed",
        }
    }

    /// Check if this is a feature-support error (1000-1099)
    pub fn is_feature_error(&self) -> bool {
        (1000..1100).contains(&self.code())
    }

    /// Check if this is a type-system error (2000-2099)
    pub fn is_type_error(&self) -> bool {
        (2000..2100).contains(&self.code())
    }

    /// Check if this is a syntax error (3000-3099)
    pub fn is_syntax_error(&self) -> bool {
        (3000..3100).contains(&self.code())
    }

    /// Check if this is an import error (4000-4099)
    pub fn is_import_error(&self) -> bool {
        (4000..4100).contains(&self.code())
    }

    /// Check if this is a codegen or build error (5000-5099)
    pub fn is_codegen_error(&self) -> bool {
        (5000..5100).contains(&self.code())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_land_in_their_bands() {
        assert!(ErrorCode::UnsupportedFeature.is_feature_error());
        assert!(ErrorCode::MissingAnnotation.is_type_error());
        assert!(ErrorCode::UnexpectedToken.is_syntax_error());
        assert!(ErrorCode::UnknownModule.is_import_error());
        assert!(ErrorCode::BuildTimeout.is_codegen_error());
        assert!(!ErrorCode::BuildTimeout.is_type_error());
    }

    #[test]
    fn display_is_machine_greppable() {
        assert_eq!(ErrorCode::UnsupportedFeature.to_string(), "E1001");
        assert_eq!(ErrorCode::MissingAnnotation.to_string(), "E2002");
        assert_eq!(ErrorCode::CodegenFailure.to_string(), "E5001");
    }

    #[test]
    fn numeric_round_trip() {
        assert_eq!(
            ErrorCode::from_int(2003usize),
            Some(ErrorCode::IncompatibleTypes)
        );
        assert_eq!(ErrorCode::IncompatibleTypes.to_int(), 2003);
        assert_eq!(ErrorCode::from_int(1999usize), None);
    }
}
