//! MGen backends
//!
//! The abstract `Backend` interface, the registry that maps target names
//! to backend factories, the typed preferences system, the shared
//! operator table, the container code-generation engine for the C target,
//! and the six concrete emitters.

pub mod c;
pub mod containers;
pub mod cpp;
pub mod emitter;
pub mod go;
pub mod haskell;
pub mod ocaml;
pub mod operators;
pub mod preferences;
pub mod registry;
pub mod rust;

use mgen_error::Diagnostic;
use mgen_ir::ast::Module;
use mgen_shared::CompilationContext;
use mgen_types::Type;

pub use preferences::{PrefSpec, PrefValue, Preferences};
pub use registry::BackendRegistry;

/// The builtins the frontend types; a backend whose call fallback sees one
/// of these must fail instead of emitting a call into nothing
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "print"
            | "len"
            | "range"
            | "str"
            | "abs"
            | "min"
            | "max"
            | "sum"
            | "bool"
            | "int"
            | "float"
            | "sorted"
    )
}

/// A concrete target-language emitter
///
/// One instance exists per pipeline invocation; it is created by the
/// registry from the target name and the validated preferences, walks the
/// typed AST once, and is discarded after emission.
pub trait Backend {
    /// The registry key ("c", "cpp", "rust", ...)
    fn name(&self) -> &'static str;

    /// File extension of the generated source
    fn file_extension(&self) -> &'static str;

    /// Resolves a source name (type or builtin) to its concrete spelling
    /// in the target, for the mapping phase
    fn map_type(&self, ty: &Type, context: &CompilationContext) -> Option<String>;

    /// Resolves a builtin function to its concrete call prefix
    fn map_builtin(&self, name: &str) -> Option<&'static str>;

    /// Backend-chosen peephole rewrites on the typed AST
    ///
    /// ### Returns
    /// The number of rewrites applied
    fn optimize(&self, module: &mut Module) -> usize {
        let _ = module;
        0
    }

    /// Emits target source text for the typed module
    ///
    /// ### Returns
    /// The complete single-file program, or every emission failure (each
    /// an E5001 with the offending node's location)
    fn emit(
        &mut self,
        module: &Module,
        context: &CompilationContext,
    ) -> Result<String, Vec<Diagnostic>>;

    /// A minimal build descriptor for targets that idiomatically have one
    ///
    /// ### Returns
    /// (file name, contents), or None when a bare source file suffices
    fn build_descriptor(&self, module_name: &str) -> Option<(String, String)> {
        let _ = module_name;
        None
    }
}
