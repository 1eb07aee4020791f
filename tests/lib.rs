mod backends;
mod cli;
mod pipeline;
pub mod test_utils;

// Re-export ErrorCode for use in tests
pub use mgen_error::ErrorCode;
