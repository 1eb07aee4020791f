//! Container code generation for the C target
//!
//! Given a parameterized container request (`vec<int>`, `map<str, int>`),
//! the engine renders the family's generic template with the type
//! arguments' descriptors substituted in. Requests are memoized: within
//! one compilation an identical container is emitted exactly once, and
//! dependencies (the inner `vec_int` of a `vec_vec_int`) are emitted
//! before their dependents.

pub mod substitute;
pub mod templates;

use mgen_error::{Diagnostic, ErrorCode};
use mgen_ir::SourceLocation;
use mgen_types::{TargetTypeRegistry, Type, TypeDescriptor};
use substitute::{Substitutions, substitute};

/// The parameterized collection kinds the engine can realize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFamily {
    Vec,
    Map,
    Set,
}

/// Handle to a memoized container request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerId(usize);

#[derive(Debug)]
struct Request {
    family: ContainerFamily,
    args: Vec<Type>,
    suffix: String,
    dependencies: Vec<ContainerId>,
}

/// The memoizing container generator for one compilation
pub struct ContainerEngine<'a> {
    registry: &'a TargetTypeRegistry,
    requests: Vec<Request>,
}

impl<'a> ContainerEngine<'a> {
    pub fn new(registry: &'a TargetTypeRegistry) -> Self {
        ContainerEngine {
            registry,
            requests: Vec::new(),
        }
    }

    /// Requests the container realizing `ty`
    ///
    /// Idempotent: identical requests return the same id. Dependencies
    /// are requested first, so request order is a valid emission order.
    ///
    /// ### Returns
    /// The container id, or an E5001 when a type argument has no
    /// registry entry
    pub fn request(&mut self, ty: &Type, location: SourceLocation) -> Result<ContainerId, Diagnostic> {
        let (family, args) = match ty {
            Type::List(element) => (ContainerFamily::Vec, vec![(**element).clone()]),
            Type::Set(element) => (ContainerFamily::Set, vec![(**element).clone()]),
            Type::Dict(key, value) => (
                ContainerFamily::Map,
                vec![(**key).clone(), (**value).clone()],
            ),
            other => {
                return Err(Diagnostic::error(
                    ErrorCode::CodegenFailure,
                    format!("'{}' is not a generatable container type", other),
                    location,
                ));
            }
        };

        if let Some(existing) = self.find(family, &args) {
            return Ok(existing);
        }

        let mut dependencies = Vec::new();
        for arg in &args {
            if arg.is_container() {
                dependencies.push(self.request(arg, location)?);
            } else if self.registry.descriptor(arg).is_none() {
                return Err(Diagnostic::error(
                    ErrorCode::CodegenFailure,
                    format!("container type argument '{}' is not in the type registry", arg),
                    location,
                ));
            }
        }

        let suffix = ty.suffix();
        self.requests.push(Request {
            family,
            args,
            suffix,
            dependencies,
        });
        Ok(ContainerId(self.requests.len() - 1))
    }

    fn find(&self, family: ContainerFamily, args: &[Type]) -> Option<ContainerId> {
        self.requests
            .iter()
            .position(|r| r.family == family && r.args == args)
            .map(ContainerId)
    }

    /// The containers that must be emitted before this one, in emission
    /// order
    pub fn needed_dependencies(&self, id: ContainerId) -> Vec<ContainerId> {
        let mut ordered = Vec::new();
        self.collect_dependencies(id, &mut ordered);
        ordered
    }

    fn collect_dependencies(&self, id: ContainerId, ordered: &mut Vec<ContainerId>) {
        for dep in &self.requests[id.0].dependencies {
            self.collect_dependencies(*dep, ordered);
            if !ordered.contains(dep) {
                ordered.push(*dep);
            }
        }
    }

    /// The generated type/function-prefix name of a request
    pub fn suffix(&self, id: ContainerId) -> &str {
        &self.requests[id.0].suffix
    }

    /// Whether any container has been requested
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Renders one container's header and source text
    pub fn generate(&self, id: ContainerId) -> (String, String) {
        let request = &self.requests[id.0];
        let mut subs = Substitutions::new();
        subs.set("SUFFIX", &request.suffix);

        let letters: &[&str] = match request.family {
            ContainerFamily::Vec | ContainerFamily::Set => &["T"],
            ContainerFamily::Map => &["K", "V"],
        };
        for (letter, arg) in letters.iter().zip(&request.args) {
            let descriptor = self
                .registry
                .descriptor(arg)
                .unwrap_or_else(|| panic_free_descriptor());
            fill_param(&mut subs, letter, arg, &descriptor);
        }

        let (header, source) = match request.family {
            ContainerFamily::Vec => (templates::VEC_HEADER, templates::VEC_SOURCE),
            ContainerFamily::Map => (templates::MAP_HEADER, templates::MAP_SOURCE),
            ContainerFamily::Set => (templates::SET_HEADER, templates::SET_SOURCE),
        };
        (substitute(header, &subs), substitute(source, &subs))
    }

    /// Renders every requested container, dependencies first
    ///
    /// ### Returns
    /// (all header text, all source text) in deterministic order
    pub fn emit_all(&self) -> (String, String) {
        let mut headers = String::new();
        let mut sources = String::new();
        for index in 0..self.requests.len() {
            let (header, source) = self.generate(ContainerId(index));
            headers.push_str(&header);
            headers.push('\n');
            sources.push_str(&source);
            sources.push('\n');
        }
        (headers, sources)
    }
}

/// Fills the `{{X}}`, `{{X_*}}` values and flags for one type parameter
fn fill_param(subs: &mut Substitutions, letter: &str, arg: &Type, descriptor: &TypeDescriptor) {
    subs.set(letter, &descriptor.target_name);
    subs.set(format!("{}_ZERO", letter), &descriptor.zero_value);
    subs.flag(format!("{}_NEEDS_DROP", letter), descriptor.needs_drop);
    subs.flag(format!("{}_NEEDS_COPY", letter), descriptor.needs_copy);
    subs.flag(format!("{}_PLAIN_COPY", letter), !descriptor.needs_copy);

    let eq_body = if arg.is_container() {
        format!("{}_eq(&a, &b)", arg.suffix())
    } else if descriptor.compares_with_operator() {
        "a == b".to_string()
    } else {
        "strcmp(a, b) == 0".to_string()
    };
    subs.set(format!("{}_EQ_BODY", letter), eq_body);

    let drop_fn = if arg.is_container() {
        format!("{}_drop", arg.suffix())
    } else {
        "free".to_string()
    };
    subs.set(format!("{}_DROP_FN", letter), drop_fn);
    subs.set(format!("{}_COPY_FN", letter), "mgen_strdup");
}

fn panic_free_descriptor() -> TypeDescriptor {
    // requests validate their arguments, so this is unreachable; an inert
    // descriptor keeps generate() total
    TypeDescriptor::value("void*", "opaque", "", "NULL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgen_types::Target;

    fn engine_with(registry: &TargetTypeRegistry) -> ContainerEngine<'_> {
        ContainerEngine::new(registry)
    }

    #[test]
    fn identical_requests_are_memoized() {
        let registry = TargetTypeRegistry::new(Target::C);
        let mut engine = engine_with(&registry);
        let ty = Type::list(Type::int());
        let a = engine.request(&ty, SourceLocation::default()).unwrap();
        let b = engine.request(&ty, SourceLocation::default()).unwrap();
        assert_eq!(a, b);
        let (_, sources) = engine.emit_all();
        assert_eq!(sources.matches("vec_int_push(").count(), 1);
    }

    #[test]
    fn nested_requests_pull_dependencies_first() {
        let registry = TargetTypeRegistry::new(Target::C);
        let mut engine = engine_with(&registry);
        let nested = Type::list(Type::list(Type::int()));
        let id = engine.request(&nested, SourceLocation::default()).unwrap();
        let deps = engine.needed_dependencies(id);
        assert_eq!(deps.len(), 1);
        assert_eq!(engine.suffix(deps[0]), "vec_int");
        assert_eq!(engine.suffix(id), "vec_vec_int");

        let (headers, _) = engine.emit_all();
        let inner = headers.find("} vec_int;").expect("inner emitted");
        let outer = headers.find("} vec_vec_int;").expect("outer emitted");
        assert!(inner < outer, "dependency must come first");
    }

    #[test]
    fn generated_code_has_no_unresolved_placeholders() {
        let registry = TargetTypeRegistry::new(Target::C);
        let mut engine = engine_with(&registry);
        for ty in [
            Type::list(Type::int()),
            Type::list(Type::str()),
            Type::dict(Type::str(), Type::int()),
            Type::set(Type::str()),
            Type::list(Type::list(Type::float())),
        ] {
            engine.request(&ty, SourceLocation::default()).unwrap();
        }
        let (headers, sources) = engine.emit_all();
        assert!(!headers.contains("{{"), "unresolved placeholder in headers");
        assert!(!sources.contains("{{"), "unresolved placeholder in sources");
    }

    #[test]
    fn string_elements_get_owning_code_paths() {
        let registry = TargetTypeRegistry::new(Target::C);
        let mut engine = engine_with(&registry);
        let id = engine
            .request(&Type::list(Type::str()), SourceLocation::default())
            .unwrap();
        let (_, source) = engine.generate(id);
        assert!(source.contains("mgen_strdup(value)"));
        assert!(source.contains("free(v->data[i]);"));
        assert!(source.contains("strcmp(a, b) == 0"));
    }

    #[test]
    fn value_elements_skip_owning_code_paths() {
        let registry = TargetTypeRegistry::new(Target::C);
        let mut engine = engine_with(&registry);
        let id = engine
            .request(&Type::list(Type::int()), SourceLocation::default())
            .unwrap();
        let (_, source) = engine.generate(id);
        assert!(!source.contains("mgen_strdup"));
        assert!(source.contains("v->data[v->len++] = value;"));
        assert!(source.contains("return a == b;"));
    }

    #[test]
    fn string_keyed_maps_use_strcmp_keys() {
        let registry = TargetTypeRegistry::new(Target::C);
        let mut engine = engine_with(&registry);
        let id = engine
            .request(&Type::dict(Type::str(), Type::int()), SourceLocation::default())
            .unwrap();
        let (header, source) = engine.generate(id);
        assert!(header.contains("map_str_int"));
        assert!(source.contains("strcmp(a, b) == 0"));
        assert!(source.contains("mgen_strdup(key)"));
    }

    #[test]
    fn generation_is_byte_identical_across_engines() {
        let registry = TargetTypeRegistry::new(Target::C);
        let ty = Type::dict(Type::str(), Type::list(Type::int()));
        let mut first = engine_with(&registry);
        first.request(&ty, SourceLocation::default()).unwrap();
        let mut second = engine_with(&registry);
        second.request(&ty, SourceLocation::default()).unwrap();
        assert_eq!(first.emit_all(), second.emit_all());
    }

    #[test]
    fn unregistered_arguments_are_a_codegen_failure() {
        let registry = TargetTypeRegistry::new(Target::C);
        let mut engine = engine_with(&registry);
        let err = engine
            .request(
                &Type::list(Type::Record("Ghost".to_string())),
                SourceLocation::default(),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CodegenFailure);
    }
}
