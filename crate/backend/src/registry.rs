//! Backend registry
//!
//! Maps target names to backend factories and preferences schemas. The
//! default registry is populated once at startup and read-only after;
//! the orchestrator resolves the chosen backend through it at run time.

use crate::preferences::{PrefSpec, Preferences};
use crate::{Backend, c, cpp, go, haskell, ocaml, rust};
use mgen_types::Target;
use std::sync::OnceLock;

type BackendFactory = fn(Preferences) -> Box<dyn Backend>;

/// One registered backend
pub struct BackendEntry {
    pub target: Target,
    pub factory: BackendFactory,
    pub schema: &'static [PrefSpec],
}

/// The plugin registry keyed by target name
pub struct BackendRegistry {
    entries: Vec<BackendEntry>,
}

impl BackendRegistry {
    /// An empty registry, for hosts that bring their own backends
    pub fn new() -> Self {
        BackendRegistry {
            entries: Vec::new(),
        }
    }

    /// The registry with every built-in backend registered
    pub fn with_defaults() -> Self {
        let mut registry = BackendRegistry::new();
        registry.register(Target::C, c::factory, c::SCHEMA);
        registry.register(Target::Cpp, cpp::factory, cpp::SCHEMA);
        registry.register(Target::Rust, rust::factory, rust::SCHEMA);
        registry.register(Target::Go, go::factory, go::SCHEMA);
        registry.register(Target::Haskell, haskell::factory, haskell::SCHEMA);
        registry.register(Target::OCaml, ocaml::factory, ocaml::SCHEMA);
        registry
    }

    /// The process-wide default registry
    pub fn global() -> &'static BackendRegistry {
        static GLOBAL: OnceLock<BackendRegistry> = OnceLock::new();
        GLOBAL.get_or_init(BackendRegistry::with_defaults)
    }

    /// Registers a backend factory for a target
    pub fn register(
        &mut self,
        target: Target,
        factory: BackendFactory,
        schema: &'static [PrefSpec],
    ) {
        self.entries.retain(|entry| entry.target != target);
        self.entries.push(BackendEntry {
            target,
            factory,
            schema,
        });
    }

    /// Looks up a registration by target name
    pub fn entry(&self, name: &str) -> Option<&BackendEntry> {
        let target = Target::from_name(name)?;
        self.entries.iter().find(|entry| entry.target == target)
    }

    /// The preferences schema of a target
    pub fn schema(&self, name: &str) -> Option<&'static [PrefSpec]> {
        self.entry(name).map(|entry| entry.schema)
    }

    /// Instantiates the backend for a target with validated preferences
    pub fn get_backend(&self, name: &str, prefs: Preferences) -> Option<Box<dyn Backend>> {
        self.entry(name).map(|entry| (entry.factory)(prefs))
    }

    /// Registered target names, in registration order
    pub fn list_targets(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.target.name()).collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        BackendRegistry::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_six_targets() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(
            registry.list_targets(),
            vec!["c", "cpp", "rust", "go", "haskell", "ocaml"]
        );
    }

    #[test]
    fn backends_resolve_by_name() {
        let registry = BackendRegistry::with_defaults();
        for name in registry.list_targets() {
            let schema = registry.schema(name).expect("schema");
            let prefs = Preferences::defaults(schema);
            let backend = registry.get_backend(name, prefs).expect("backend");
            assert_eq!(backend.name(), name);
        }
    }

    #[test]
    fn unknown_targets_resolve_to_none() {
        let registry = BackendRegistry::with_defaults();
        assert!(registry.entry("fortran").is_none());
        assert!(registry.schema("basic").is_none());
    }

    #[test]
    fn re_registration_replaces_the_entry() {
        let mut registry = BackendRegistry::with_defaults();
        registry.register(Target::C, c::factory, c::SCHEMA);
        assert_eq!(
            registry.list_targets().iter().filter(|t| **t == "c").count(),
            1
        );
    }
}
