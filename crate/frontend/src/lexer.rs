use crate::token::{Token, TokenKind};
use mgen_error::{Diagnostic, ErrorCode};
use mgen_ir::SourceLocation;

/// Lexer state for tracking position during tokenization
struct LexerState {
    /// Source characters
    chars: Vec<char>,
    /// Current index into `chars`
    pos: usize,
    /// Current line (1-based)
    line: usize,
    /// Current column (1-based)
    column: usize,
    /// Tokens generated so far
    tokens: Vec<Token>,
    /// Errors collected so far
    errors: Vec<Diagnostic>,
    /// Indentation stack; always starts with 0
    indents: Vec<usize>,
    /// Open bracket depth; newlines inside brackets are not significant
    depth: usize,
}

impl LexerState {
    fn new(input: &str) -> Self {
        LexerState {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
            indents: vec![0],
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(c) = c {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn here(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    fn add_token(&mut self, kind: TokenKind, lexeme: impl Into<String>, start: (usize, usize)) {
        let location = SourceLocation::new(start.0, start.1, self.line, self.column);
        self.tokens.push(Token::new(kind, lexeme, location));
    }

    fn error(&mut self, code: ErrorCode, message: String, start: (usize, usize)) {
        let location = SourceLocation::new(start.0, start.1, self.line, self.column);
        self.errors.push(Diagnostic::error(code, message, location));
    }

    /// Whether the rest of the current physical line is blank or a comment
    fn rest_of_line_blank(&self) -> bool {
        let mut i = self.pos;
        while let Some(&c) = self.chars.get(i) {
            match c {
                ' ' | '\r' => i += 1,
                '\n' | '#' => return true,
                _ => return false,
            }
        }
        true
    }

    /// Consumes up to and including the end of the current physical line
    fn skip_to_line_end(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Handles leading whitespace of a logical line, emitting Indent/Dedent
    fn handle_indentation(&mut self) {
        let start = self.here();
        let mut width = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => {
                    width += 1;
                    self.advance();
                }
                '\t' => {
                    self.error(
                        ErrorCode::InvalidIndentation,
                        "tab characters are not allowed in indentation".to_string(),
                        start,
                    );
                    self.advance();
                }
                _ => break,
            }
        }

        // blank and comment-only lines do not affect indentation
        if self.rest_of_line_blank() {
            self.skip_to_line_end();
            return;
        }

        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.add_token(TokenKind::Indent, "", start);
        } else if width < current {
            while self.indents.len() > 1 && *self.indents.last().unwrap_or(&0) > width {
                self.indents.pop();
                self.add_token(TokenKind::Dedent, "", start);
            }
            if *self.indents.last().unwrap_or(&0) != width {
                self.error(
                    ErrorCode::InvalidIndentation,
                    "unindent does not match any outer indentation level".to_string(),
                    start,
                );
                // recover by forcing the current level
                self.indents.push(width);
            }
        }
        self.scan_line();
    }

    /// Scans tokens until the end of the logical line
    fn scan_line(&mut self) {
        let mut emitted = false;
        loop {
            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\r' => {
                    self.advance();
                }
                '#' => {
                    self.skip_to_line_end();
                    if self.depth == 0 {
                        if emitted {
                            self.push_newline();
                        }
                        return;
                    }
                }
                '\n' => {
                    self.advance();
                    if self.depth == 0 {
                        if emitted {
                            self.push_newline();
                        }
                        return;
                    }
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    // explicit line continuation
                    self.advance();
                    self.advance();
                }
                _ => {
                    self.scan_token();
                    emitted = true;
                }
            }
        }
        if emitted {
            self.push_newline();
        }
    }

    fn push_newline(&mut self) {
        let start = self.here();
        self.add_token(TokenKind::Newline, "", start);
    }

    fn scan_token(&mut self) {
        let start = self.here();
        let c = match self.peek() {
            Some(c) => c,
            None => return,
        };

        match c {
            c if c.is_alphabetic() || c == '_' => self.scan_word(start),
            c if c.is_ascii_digit() => self.scan_number(start),
            '"' | '\'' => self.scan_string(start, false),
            '(' => self.single(TokenKind::LeftParen, start, true),
            ')' => self.single_close(TokenKind::RightParen, start),
            '[' => self.single(TokenKind::LeftBracket, start, true),
            ']' => self.single_close(TokenKind::RightBracket, start),
            '{' => self.single(TokenKind::LeftBrace, start, true),
            '}' => self.single_close(TokenKind::RightBrace, start),
            ',' => self.single(TokenKind::Comma, start, false),
            ':' => self.single(TokenKind::Colon, start, false),
            '.' => self.single(TokenKind::Dot, start, false),
            ';' => self.single(TokenKind::Semicolon, start, false),
            '@' => self.single(TokenKind::At, start, false),
            '+' => self.with_assign(TokenKind::Plus, TokenKind::PlusAssign, start),
            '%' => self.with_assign(TokenKind::Percent, TokenKind::PercentAssign, start),
            '-' => {
                self.advance();
                if self.peek() == Some('>') {
                    self.advance();
                    self.add_token(TokenKind::Arrow, "->", start);
                } else if self.peek() == Some('=') {
                    self.advance();
                    self.add_token(TokenKind::MinusAssign, "-=", start);
                } else {
                    self.add_token(TokenKind::Minus, "-", start);
                }
            }
            '*' => {
                self.advance();
                if self.peek() == Some('*') {
                    self.advance();
                    self.add_token(TokenKind::DoubleStar, "**", start);
                } else if self.peek() == Some('=') {
                    self.advance();
                    self.add_token(TokenKind::StarAssign, "*=", start);
                } else {
                    self.add_token(TokenKind::Star, "*", start);
                }
            }
            '/' => {
                self.advance();
                if self.peek() == Some('/') {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.add_token(TokenKind::DoubleSlashAssign, "//=", start);
                    } else {
                        self.add_token(TokenKind::DoubleSlash, "//", start);
                    }
                } else if self.peek() == Some('=') {
                    self.advance();
                    self.add_token(TokenKind::SlashAssign, "/=", start);
                } else {
                    self.add_token(TokenKind::Slash, "/", start);
                }
            }
            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.add_token(TokenKind::Eq, "==", start);
                } else {
                    self.add_token(TokenKind::Assign, "=", start);
                }
            }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.add_token(TokenKind::NotEq, "!=", start);
                } else {
                    self.error(
                        ErrorCode::SyntaxError,
                        "unexpected character '!'".to_string(),
                        start,
                    );
                }
            }
            '<' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.add_token(TokenKind::LtEq, "<=", start);
                } else {
                    self.add_token(TokenKind::Lt, "<", start);
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.add_token(TokenKind::GtEq, ">=", start);
                } else {
                    self.add_token(TokenKind::Gt, ">", start);
                }
            }
            other => {
                self.advance();
                self.error(
                    ErrorCode::SyntaxError,
                    format!("unexpected character '{}'", other),
                    start,
                );
            }
        }
    }

    fn single(&mut self, kind: TokenKind, start: (usize, usize), opens: bool) {
        let c = self.advance().unwrap_or_default();
        if opens {
            self.depth += 1;
        }
        self.add_token(kind, c.to_string(), start);
    }

    fn single_close(&mut self, kind: TokenKind, start: (usize, usize)) {
        let c = self.advance().unwrap_or_default();
        self.depth = self.depth.saturating_sub(1);
        self.add_token(kind, c.to_string(), start);
    }

    fn with_assign(&mut self, plain: TokenKind, assign: TokenKind, start: (usize, usize)) {
        let c = self.advance().unwrap_or_default();
        if self.peek() == Some('=') {
            self.advance();
            self.add_token(assign, format!("{}=", c), start);
        } else {
            self.add_token(plain, c.to_string(), start);
        }
    }

    fn scan_word(&mut self, start: (usize, usize)) {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // f-string prefix directly before a quote
        if (word == "f" || word == "F") && matches!(self.peek(), Some('"') | Some('\'')) {
            self.scan_string(start, true);
            return;
        }

        match TokenKind::keyword(&word) {
            Some(kind) => self.add_token(kind, word, start),
            None => self.add_token(TokenKind::Identifier, word, start),
        }
    }

    fn scan_number(&mut self, start: (usize, usize)) {
        let mut number = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    number.push(c);
                }
                self.advance();
            } else if c == '.' && !is_float && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
            {
                is_float = true;
                number.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek_at(1)
                    .is_some_and(|d| d.is_ascii_digit() || d == '-' || d == '+')
            {
                is_float = true;
                number.push(c);
                self.advance();
                if let Some(sign) = self.peek() {
                    if sign == '-' || sign == '+' {
                        number.push(sign);
                        self.advance();
                    }
                }
            } else {
                break;
            }
        }

        if self.peek().is_some_and(|c| c.is_alphabetic()) {
            self.error(
                ErrorCode::InvalidNumberLiteral,
                format!("invalid number literal '{}'", number),
                start,
            );
        }

        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.add_token(kind, number, start);
    }

    fn scan_string(&mut self, start: (usize, usize), formatted: bool) {
        let quote = match self.advance() {
            Some(q) => q,
            None => return,
        };

        // triple-quoted string
        if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
            self.advance();
            self.advance();
            self.scan_triple_string(start, quote, formatted);
            return;
        }

        let mut value = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\n') | None => {
                    self.error(
                        ErrorCode::UnterminatedString,
                        "unterminated string literal".to_string(),
                        start,
                    );
                    break;
                }
                Some('\\') if !formatted => {
                    self.advance();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some('\'') => value.push('\''),
                        Some('"') => value.push('"'),
                        Some('0') => value.push('\0'),
                        Some(other) => {
                            self.error(
                                ErrorCode::InvalidEscapeSequence,
                                format!("invalid escape sequence '\\{}'", other),
                                start,
                            );
                        }
                        None => break,
                    }
                }
                Some(c) => {
                    // formatted strings keep escapes raw for the parser
                    value.push(c);
                    self.advance();
                }
            }
        }

        let kind = if formatted {
            TokenKind::FStringLiteral
        } else {
            TokenKind::StrLiteral
        };
        self.add_token(kind, value, start);
    }

    fn scan_triple_string(&mut self, start: (usize, usize), quote: char, formatted: bool) {
        let mut value = String::new();
        loop {
            if self.peek() == Some(quote)
                && self.peek_at(1) == Some(quote)
                && self.peek_at(2) == Some(quote)
            {
                self.advance();
                self.advance();
                self.advance();
                break;
            }
            match self.advance() {
                Some(c) => value.push(c),
                None => {
                    self.error(
                        ErrorCode::UnterminatedString,
                        "unterminated triple-quoted string".to_string(),
                        start,
                    );
                    break;
                }
            }
        }
        let kind = if formatted {
            TokenKind::FStringLiteral
        } else {
            TokenKind::StrLiteral
        };
        self.add_token(kind, value, start);
    }

    fn finish(mut self) -> Result<Vec<Token>, Vec<Diagnostic>> {
        let start = self.here();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.add_token(TokenKind::Dedent, "", start);
        }
        self.add_token(TokenKind::Eof, "", start);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }
}

/// Converts source text into a token sequence with layout tokens
///
/// Indentation at the start of each logical line becomes Indent/Dedent
/// pairs; newlines inside brackets are not significant; blank and
/// comment-only lines are skipped entirely.
///
/// ### Arguments
/// * `input` - The source code to tokenize
///
/// ### Returns
/// The token list, or every lexical error found
pub fn tokenize(input: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let mut state = LexerState::new(input);
    while state.peek().is_some() {
        state.handle_indentation();
    }
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("lexes")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_a_function_header() {
        let toks = kinds("def fib(n: int) -> int:\n    return n\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Def,
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::RightParen,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Return,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn blank_lines_do_not_dedent() {
        let toks = kinds("def f() -> int:\n    x = 1\n\n    return x\n");
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 1);
    }

    #[test]
    fn newlines_inside_brackets_are_insignificant() {
        let toks = kinds("x = [1,\n     2,\n     3]\n");
        let newlines = toks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn operators_lex_greedily() {
        let toks = kinds("x //= 2 ** 3\n");
        assert!(toks.contains(&TokenKind::DoubleSlashAssign));
        assert!(toks.contains(&TokenKind::DoubleStar));
    }

    #[test]
    fn fstring_prefix_is_recognized() {
        let tokens = tokenize("s = f\"n is {n}\"\n").expect("lexes");
        let fstring = tokens
            .iter()
            .find(|t| t.kind == TokenKind::FStringLiteral)
            .expect("has fstring");
        assert_eq!(fstring.lexeme, "n is {n}");
    }

    #[test]
    fn string_escapes_are_decoded() {
        let tokens = tokenize("s = \"a\\nb\"\n").expect("lexes");
        let string = tokens
            .iter()
            .find(|t| t.kind == TokenKind::StrLiteral)
            .expect("has string");
        assert_eq!(string.lexeme, "a\nb");
    }

    #[test]
    fn mismatched_indentation_is_an_error() {
        let errors = tokenize("if x:\n        y = 1\n   z = 2\n").unwrap_err();
        assert!(errors
            .iter()
            .any(|d| d.code == ErrorCode::InvalidIndentation));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let errors = tokenize("s = \"oops\n").unwrap_err();
        assert!(errors
            .iter()
            .any(|d| d.code == ErrorCode::UnterminatedString));
    }

    #[test]
    fn comments_are_skipped() {
        let toks = kinds("# leading comment\nx = 1  # trailing\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::IntLiteral,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }
}
