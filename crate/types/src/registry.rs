use crate::descriptor::TypeDescriptor;
use crate::types::{ScalarType, Target, Type};

/// Registry mapping abstract source types to concrete target descriptors
///
/// One registry instance exists per pipeline invocation, bound to a single
/// target. User records are registered during the analysis phase; after
/// that the registry is authoritative: every type an emitter encounters
/// must resolve to a descriptor here.
pub struct TargetTypeRegistry {
    /// The target this registry maps to
    target: Target,
    /// Registered user record names, in declaration order
    records: Vec<String>,
}

impl TargetTypeRegistry {
    /// Creates a registry for the given target with no user records
    pub fn new(target: Target) -> Self {
        TargetTypeRegistry {
            target,
            records: Vec::new(),
        }
    }

    /// The target this registry is bound to
    pub fn target(&self) -> Target {
        self.target
    }

    /// Registers a user record type by name
    ///
    /// ### Arguments
    /// * `name` - The record name as declared in source
    ///
    /// ### Returns
    /// False if the name was already registered
    pub fn register_record(&mut self, name: &str) -> bool {
        if self.has_record(name) {
            return false;
        }
        self.records.push(name.to_string());
        true
    }

    /// Whether a record with this name has been registered
    pub fn has_record(&self, name: &str) -> bool {
        self.records.iter().any(|r| r == name)
    }

    /// Whether a descriptor can be produced for this type
    ///
    /// A type is registered when it carries no `Unknown` component and every
    /// record it mentions has been registered.
    pub fn is_registered(&self, ty: &Type) -> bool {
        self.descriptor(ty).is_some()
    }

    /// Resolves the concrete descriptor for an abstract type
    ///
    /// ### Arguments
    /// * `ty` - The abstract source type to resolve
    ///
    /// ### Returns
    /// The descriptor, or None for unresolved types (`Unknown` components,
    /// unregistered records, empty tuples)
    pub fn descriptor(&self, ty: &Type) -> Option<TypeDescriptor> {
        match ty {
            Type::Scalar(scalar) => Some(self.scalar_descriptor(*scalar)),
            Type::Record(name) => {
                if self.has_record(name) {
                    Some(self.record_descriptor(name))
                } else {
                    None
                }
            }
            Type::List(element) => {
                let inner = self.descriptor(element)?;
                Some(self.list_descriptor(ty, &inner))
            }
            Type::Set(element) => {
                let inner = self.descriptor(element)?;
                Some(self.set_descriptor(ty, &inner))
            }
            Type::Dict(key, value) => {
                let key_desc = self.descriptor(key)?;
                let value_desc = self.descriptor(value)?;
                Some(self.dict_descriptor(ty, &key_desc, &value_desc))
            }
            Type::Tuple(elements) => {
                if elements.is_empty() {
                    return None;
                }
                let inners = elements
                    .iter()
                    .map(|e| self.descriptor(e))
                    .collect::<Option<Vec<_>>>()?;
                Some(self.tuple_descriptor(ty, &inners))
            }
            Type::Unknown => None,
        }
    }

    fn scalar_descriptor(&self, scalar: ScalarType) -> TypeDescriptor {
        match self.target {
            Target::C => match scalar {
                ScalarType::Int => TypeDescriptor::value("int", "int", "%d", "0"),
                ScalarType::Float => TypeDescriptor::value("double", "float", "%g", "0.0"),
                ScalarType::Bool => TypeDescriptor::value("bool", "bool", "%d", "false"),
                ScalarType::Char => TypeDescriptor::value("char", "char", "%c", "'\\0'"),
                ScalarType::NoneType => TypeDescriptor::value("void", "void", "", ""),
                ScalarType::Str => {
                    TypeDescriptor::owned("char*", "str", "%s", "NULL", "str_eq")
                }
            },
            Target::Cpp => match scalar {
                ScalarType::Int => TypeDescriptor::value("int", "int", "%d", "0"),
                ScalarType::Float => TypeDescriptor::value("double", "float", "%f", "0.0"),
                ScalarType::Bool => TypeDescriptor::value("bool", "bool", "%d", "false"),
                ScalarType::Char => TypeDescriptor::value("char", "char", "%c", "'\\0'"),
                ScalarType::NoneType => TypeDescriptor::value("void", "void", "", ""),
                ScalarType::Str => {
                    TypeDescriptor::value("std::string", "str", "%s", "std::string{}")
                }
            },
            Target::Rust => match scalar {
                ScalarType::Int => TypeDescriptor::value("i64", "int", "{}", "0"),
                ScalarType::Float => TypeDescriptor::value("f64", "float", "{}", "0.0"),
                ScalarType::Bool => TypeDescriptor::value("bool", "bool", "{}", "false"),
                ScalarType::Char => TypeDescriptor::value("char", "char", "{}", "'\\0'"),
                ScalarType::NoneType => TypeDescriptor::value("()", "void", "", "()"),
                ScalarType::Str => {
                    let mut desc =
                        TypeDescriptor::value("String", "str", "{}", "String::new()");
                    desc.heap_owned = true;
                    desc
                }
            },
            Target::Go => match scalar {
                ScalarType::Int => TypeDescriptor::value("int", "int", "%d", "0"),
                ScalarType::Float => TypeDescriptor::value("float64", "float", "%g", "0.0"),
                ScalarType::Bool => TypeDescriptor::value("bool", "bool", "%t", "false"),
                ScalarType::Char => TypeDescriptor::value("rune", "char", "%c", "0"),
                ScalarType::NoneType => TypeDescriptor::value("", "void", "", ""),
                ScalarType::Str => TypeDescriptor::value("string", "str", "%s", "\"\""),
            },
            Target::Haskell => match scalar {
                ScalarType::Int => TypeDescriptor::value("Int", "int", "", "0"),
                ScalarType::Float => TypeDescriptor::value("Double", "float", "", "0.0"),
                ScalarType::Bool => TypeDescriptor::value("Bool", "bool", "", "False"),
                ScalarType::Char => TypeDescriptor::value("Char", "char", "", "' '"),
                ScalarType::NoneType => TypeDescriptor::value("()", "void", "", "()"),
                ScalarType::Str => TypeDescriptor::value("String", "str", "", "\"\""),
            },
            Target::OCaml => match scalar {
                ScalarType::Int => TypeDescriptor::value("int", "int", "%d", "0"),
                ScalarType::Float => TypeDescriptor::value("float", "float", "%f", "0."),
                ScalarType::Bool => TypeDescriptor::value("bool", "bool", "%b", "false"),
                ScalarType::Char => TypeDescriptor::value("char", "char", "%c", "' '"),
                ScalarType::NoneType => TypeDescriptor::value("unit", "void", "", "()"),
                ScalarType::Str => TypeDescriptor::value("string", "str", "%s", "\"\""),
            },
        }
    }

    fn record_descriptor(&self, name: &str) -> TypeDescriptor {
        let suffix = name.to_lowercase();
        let target_name = match self.target {
            // OCaml type names are lowercase
            Target::OCaml => suffix.clone(),
            _ => name.to_string(),
        };
        let zero_value = match self.target {
            Target::C => format!("({}){{0}}", name),
            Target::Cpp | Target::Go => format!("{}{{}}", target_name),
            Target::Rust => format!("{}::default()", name),
            Target::Haskell | Target::OCaml => String::new(),
        };
        let equality = match self.target {
            Target::C => format!("{}_eq", name),
            _ => "==".to_string(),
        };
        TypeDescriptor {
            target_name,
            suffix,
            heap_owned: matches!(self.target, Target::C | Target::Rust),
            needs_drop: self.target == Target::C,
            needs_copy: false,
            format_spec: "",
            zero_value,
            equality,
        }
    }

    fn list_descriptor(&self, ty: &Type, element: &TypeDescriptor) -> TypeDescriptor {
        let suffix = ty.suffix();
        let target_name = match self.target {
            Target::C => suffix.clone(),
            Target::Cpp => format!("std::vector<{}>", element.target_name),
            Target::Rust => format!("Vec<{}>", element.target_name),
            Target::Go => format!("[]{}", element.target_name),
            Target::Haskell => format!("[{}]", element.target_name),
            Target::OCaml => format!("{} list", element.target_name),
        };
        self.container_descriptor(target_name, suffix)
    }

    fn set_descriptor(&self, ty: &Type, element: &TypeDescriptor) -> TypeDescriptor {
        let suffix = ty.suffix();
        let target_name = match self.target {
            Target::C => suffix.clone(),
            Target::Cpp => format!("std::set<{}>", element.target_name),
            Target::Rust => format!("HashSet<{}>", element.target_name),
            Target::Go => format!("map[{}]bool", element.target_name),
            Target::Haskell => format!("Set.Set {}", wrap_spaced(&element.target_name)),
            Target::OCaml => format!("({}, unit) Hashtbl.t", element.target_name),
        };
        self.container_descriptor(target_name, suffix)
    }

    fn dict_descriptor(
        &self,
        ty: &Type,
        key: &TypeDescriptor,
        value: &TypeDescriptor,
    ) -> TypeDescriptor {
        let suffix = ty.suffix();
        let target_name = match self.target {
            Target::C => suffix.clone(),
            Target::Cpp => format!("std::map<{}, {}>", key.target_name, value.target_name),
            Target::Rust => format!("HashMap<{}, {}>", key.target_name, value.target_name),
            Target::Go => format!("map[{}]{}", key.target_name, value.target_name),
            Target::Haskell => format!(
                "Map.Map {} {}",
                wrap_spaced(&key.target_name),
                wrap_spaced(&value.target_name)
            ),
            Target::OCaml => format!(
                "({}, {}) Hashtbl.t",
                key.target_name, value.target_name
            ),
        };
        self.container_descriptor(target_name, suffix)
    }

    fn tuple_descriptor(&self, ty: &Type, elements: &[TypeDescriptor]) -> TypeDescriptor {
        let suffix = ty.suffix();
        let names: Vec<&str> = elements.iter().map(|e| e.target_name.as_str()).collect();
        let target_name = match self.target {
            // C and Go have no structural tuples; the emitters declare a
            // struct under the mangled name
            Target::C | Target::Go => {
                let mut mangled = suffix.clone();
                if self.target == Target::Go {
                    mangled = capitalize(&mangled);
                }
                mangled
            }
            Target::Cpp => format!("std::tuple<{}>", names.join(", ")),
            Target::Rust | Target::Haskell => format!("({})", names.join(", ")),
            Target::OCaml => names.join(" * "),
        };
        self.container_descriptor(target_name, suffix)
    }

    fn container_descriptor(&self, target_name: String, suffix: String) -> TypeDescriptor {
        let zero_value = match self.target {
            Target::C => format!("({}){{0}}", target_name),
            Target::Cpp => "{}".to_string(),
            Target::Rust => format!("{}::new()", strip_generics(&target_name)),
            Target::Go => format!("{}{{}}", target_name),
            Target::Haskell => String::new(),
            Target::OCaml => String::new(),
        };
        let equality = match self.target {
            Target::C => format!("{}_eq", suffix),
            _ => "==".to_string(),
        };
        TypeDescriptor {
            target_name,
            suffix,
            heap_owned: true,
            needs_drop: self.target == Target::C,
            needs_copy: false,
            format_spec: "",
            zero_value,
            equality,
        }
    }
}

/// Parenthesize a Haskell type application when it contains spaces
fn wrap_spaced(name: &str) -> String {
    if name.contains(' ') {
        format!("({})", name)
    } else {
        name.to_string()
    }
}

/// `Vec<i64>` → `Vec`, for `::new()` construction
fn strip_generics(name: &str) -> &str {
    name.split('<').next().unwrap_or(name)
}

/// `tuple2_int_str` → `Tuple2_int_str`
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_strings_are_heap_owned() {
        let registry = TargetTypeRegistry::new(Target::C);
        let desc = registry.descriptor(&Type::str()).unwrap();
        assert_eq!(desc.target_name, "char*");
        assert!(desc.heap_owned);
        assert!(desc.needs_drop);
        assert!(desc.needs_copy);
        assert_eq!(desc.equality, "str_eq");
    }

    #[test]
    fn c_containers_use_suffix_names() {
        let registry = TargetTypeRegistry::new(Target::C);
        let desc = registry
            .descriptor(&Type::dict(Type::str(), Type::int()))
            .unwrap();
        assert_eq!(desc.target_name, "map_str_int");
        assert_eq!(desc.suffix, "map_str_int");
    }

    #[test]
    fn cpp_containers_nest_templates() {
        let registry = TargetTypeRegistry::new(Target::Cpp);
        let desc = registry
            .descriptor(&Type::list(Type::list(Type::int())))
            .unwrap();
        assert_eq!(desc.target_name, "std::vector<std::vector<int>>");
    }

    #[test]
    fn rust_zero_values_construct_empty_containers() {
        let registry = TargetTypeRegistry::new(Target::Rust);
        let desc = registry.descriptor(&Type::list(Type::int())).unwrap();
        assert_eq!(desc.target_name, "Vec<i64>");
        assert_eq!(desc.zero_value, "Vec::new()");
    }

    #[test]
    fn haskell_type_applications_parenthesize() {
        let registry = TargetTypeRegistry::new(Target::Haskell);
        let desc = registry
            .descriptor(&Type::dict(Type::str(), Type::list(Type::int())))
            .unwrap();
        assert_eq!(desc.target_name, "Map.Map String [Int]");
    }

    #[test]
    fn unknown_components_have_no_descriptor() {
        let registry = TargetTypeRegistry::new(Target::C);
        assert!(registry.descriptor(&Type::Unknown).is_none());
        assert!(registry.descriptor(&Type::list(Type::Unknown)).is_none());
    }

    #[test]
    fn records_require_registration() {
        let mut registry = TargetTypeRegistry::new(Target::Rust);
        let counter = Type::Record("Counter".to_string());
        assert!(registry.descriptor(&counter).is_none());
        assert!(registry.register_record("Counter"));
        assert!(!registry.register_record("Counter"));
        let desc = registry.descriptor(&counter).unwrap();
        assert_eq!(desc.target_name, "Counter");
    }

    #[test]
    fn go_maps_realize_sets() {
        let registry = TargetTypeRegistry::new(Target::Go);
        let desc = registry.descriptor(&Type::set(Type::str())).unwrap();
        assert_eq!(desc.target_name, "map[string]bool");
    }
}
