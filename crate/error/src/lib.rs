//! Error handling for the MGen compiler
//!
//! This crate provides the error codes shared by every phase, the located
//! `Diagnostic` type the pipeline accumulates, and the fixed suggestion
//! database that turns rejections into actionable help lines.

pub mod diagnostic;
pub mod error_codes;
pub mod suggestions;

pub use diagnostic::{Diagnostic, MgenError, Severity, Suggestion};
pub use error_codes::ErrorCode;
pub use suggestions::default_suggestion;
