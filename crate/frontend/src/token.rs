use mgen_ir::SourceLocation;

/// The kinds of tokens the lexer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals and names
    Identifier,
    IntLiteral,
    FloatLiteral,
    StrLiteral,
    /// A formatted string; the lexeme is the raw body with `{...}` holes
    FStringLiteral,

    // Keywords
    Def,
    Class,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Pass,
    Import,
    From,
    Assert,
    True,
    False,
    None,
    And,
    Or,
    Not,
    Lambda,
    Yield,
    Await,
    Async,
    Try,
    Except,
    Finally,
    Raise,
    With,
    Del,
    Global,
    Nonlocal,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,
    Arrow,
    At,

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    /// Resolves an identifier lexeme to its keyword kind, if it is one
    pub fn keyword(lexeme: &str) -> Option<TokenKind> {
        Some(match lexeme {
            "def" => TokenKind::Def,
            "class" => TokenKind::Class,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "pass" => TokenKind::Pass,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "assert" => TokenKind::Assert,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "lambda" => TokenKind::Lambda,
            "yield" => TokenKind::Yield,
            "await" => TokenKind::Await,
            "async" => TokenKind::Async,
            "try" => TokenKind::Try,
            "except" => TokenKind::Except,
            "finally" => TokenKind::Finally,
            "raise" => TokenKind::Raise,
            "with" => TokenKind::With,
            "del" => TokenKind::Del,
            "global" => TokenKind::Global,
            "nonlocal" => TokenKind::Nonlocal,
            _ => return Option::None,
        })
    }
}

/// One lexed token with its lexeme and source span
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, location: SourceLocation) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            location,
        }
    }
}
