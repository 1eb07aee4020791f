//! MGen: a source-to-source compiler for a statically-typed subset of a
//! Python-like language
//!
//! The library entry point is [`compile`]: a pure function from (source
//! text, target name, preferences) to a [`PipelineResult`] carrying the
//! generated target source and ordered diagnostics. Six backends are
//! registered by default: c, cpp, rust, go, haskell, ocaml.

pub mod build;
pub mod pipeline;

pub use build::{BuildRunner, CommandBuildRunner};
pub use pipeline::{
    CompileOptions, MappingTable, Phase, PhaseArtifact, PhaseResult, PipelineResult, compile,
    compile_with_options,
};
