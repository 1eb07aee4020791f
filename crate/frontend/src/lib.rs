//! MGen frontend
//!
//! Lexing, parsing, subset validation, structural analysis, source-level
//! optimization and type inference. The frontend turns raw source text
//! into a typed `Module` the backends can emit from, or into a list of
//! located diagnostics explaining why it cannot.

pub mod analysis;
pub mod inference;
pub mod lexer;
pub mod optimize;
pub mod parser;
pub mod token;
#[cfg(feature = "print-tokens")]
pub mod token_printer;
pub mod validator;

pub use token::{Token, TokenKind};
