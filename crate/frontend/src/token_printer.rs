//! Debug token-stream printer, enabled with the `print-tokens` feature

use crate::token::{Token, TokenKind};

/// Prints one token per line with its location
pub fn print_tokens(tokens: &[Token]) {
    for token in tokens {
        let lexeme = match token.kind {
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof => {
                String::new()
            }
            _ => format!(" {:?}", token.lexeme),
        };
        println!(
            "{:>4}:{:<3} {:?}{}",
            token.location.line, token.location.column, token.kind, lexeme
        );
    }
}
