use mgen_derive::NamedEnum;
use std::fmt::Display;

// Type name constants as they appear in source annotations
pub const TYPE_NAME_INT: &str = ScalarType::Int.name();
pub const TYPE_NAME_FLOAT: &str = ScalarType::Float.name();
pub const TYPE_NAME_BOOL: &str = ScalarType::Bool.name();
pub const TYPE_NAME_STR: &str = ScalarType::Str.name();
pub const TYPE_NAME_CHAR: &str = ScalarType::Char.name();
pub const TYPE_NAME_NONE: &str = ScalarType::NoneType.name();

/// The compilation targets a backend can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, NamedEnum)]
pub enum Target {
    /// C11 with generated containers
    C,
    /// C++17/20 with standard-library containers
    Cpp,
    /// Rust 2018/2021
    Rust,
    /// Go with runtime helpers
    Go,
    /// Haskell (GHC)
    Haskell,
    /// OCaml
    #[name = "ocaml"]
    OCaml,
}

/// Scalar types of the source subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, NamedEnum)]
pub enum ScalarType {
    /// Arbitrary-width source integer, lowered to the target's wide int
    Int,
    /// Source float, lowered to the target's double-precision float
    Float,
    /// Boolean type
    Bool,
    /// String type
    Str,
    /// Single character
    Char,
    /// The `None` type, lowered to the target's unit/void
    #[name = "None"]
    NoneType,
}

/// An abstract source type as written in (or inferred from) the source
///
/// Containers are structural so descriptors can be derived for arbitrary
/// nestings; `Unknown` marks a type the inference engine has not resolved
/// yet. A module that still carries `Unknown` after inference is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A scalar (int, float, bool, str, char, None)
    Scalar(ScalarType),
    /// `list[T]`
    List(Box<Type>),
    /// `dict[K, V]`
    Dict(Box<Type>, Box<Type>),
    /// `set[T]`
    Set(Box<Type>),
    /// `tuple[T, ...]`
    Tuple(Vec<Type>),
    /// A user-defined record, by name
    Record(String),
    /// Not yet inferred
    Unknown,
}

impl Type {
    /// Shorthand for `Type::Scalar(ScalarType::Int)`
    pub fn int() -> Self {
        Type::Scalar(ScalarType::Int)
    }

    /// Shorthand for `Type::Scalar(ScalarType::Float)`
    pub fn float() -> Self {
        Type::Scalar(ScalarType::Float)
    }

    /// Shorthand for `Type::Scalar(ScalarType::Bool)`
    pub fn bool() -> Self {
        Type::Scalar(ScalarType::Bool)
    }

    /// Shorthand for `Type::Scalar(ScalarType::Str)`
    pub fn str() -> Self {
        Type::Scalar(ScalarType::Str)
    }

    /// Shorthand for `Type::Scalar(ScalarType::Char)`
    pub fn char() -> Self {
        Type::Scalar(ScalarType::Char)
    }

    /// Shorthand for `Type::Scalar(ScalarType::NoneType)`
    pub fn none() -> Self {
        Type::Scalar(ScalarType::NoneType)
    }

    /// A `list[T]` with the given element type
    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    /// A `dict[K, V]` with the given key and value types
    pub fn dict(key: Type, value: Type) -> Self {
        Type::Dict(Box::new(key), Box::new(value))
    }

    /// A `set[T]` with the given element type
    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    /// Whether this type is the `Unknown` marker itself
    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Whether this type or any of its type arguments is `Unknown`
    ///
    /// ### Returns
    /// True if inference still has work to do on this type
    pub fn contains_unknown(&self) -> bool {
        match self {
            Type::Unknown => true,
            Type::Scalar(_) | Type::Record(_) => false,
            Type::List(t) | Type::Set(t) => t.contains_unknown(),
            Type::Dict(k, v) => k.contains_unknown() || v.contains_unknown(),
            Type::Tuple(ts) => ts.iter().any(Type::contains_unknown),
        }
    }

    /// Whether this is one of the parameterized container types
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Type::List(_) | Type::Dict(_, _) | Type::Set(_) | Type::Tuple(_)
        )
    }

    /// Whether this is a numeric scalar (int or float)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Scalar(ScalarType::Int) | Type::Scalar(ScalarType::Float)
        )
    }

    /// The element type of a list or set, if this is one
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::List(t) | Type::Set(t) => Some(t),
            _ => None,
        }
    }

    /// Container nesting depth: scalars are 0, `list[int]` is 1,
    /// `list[list[int]]` is 2
    pub fn container_depth(&self) -> usize {
        match self {
            Type::List(t) | Type::Set(t) => 1 + t.container_depth(),
            Type::Dict(k, v) => 1 + k.container_depth().max(v.container_depth()),
            Type::Tuple(ts) => {
                1 + ts
                    .iter()
                    .map(Type::container_depth)
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Mangling suffix used both as the generated container type name and
    /// as the function-name prefix in the C backend
    ///
    /// `list[int]` becomes `vec_int`, `dict[str, int]` becomes
    /// `map_str_int`, `list[list[int]]` becomes `vec_vec_int`.
    pub fn suffix(&self) -> String {
        match self {
            Type::Scalar(ScalarType::NoneType) => "void".to_string(),
            Type::Scalar(s) => s.name().to_string(),
            Type::List(t) => format!("vec_{}", t.suffix()),
            Type::Dict(k, v) => format!("map_{}_{}", k.suffix(), v.suffix()),
            Type::Set(t) => format!("set_{}", t.suffix()),
            Type::Tuple(ts) => {
                let parts: Vec<String> = ts.iter().map(Type::suffix).collect();
                format!("tuple{}_{}", ts.len(), parts.join("_"))
            }
            Type::Record(name) => name.to_lowercase(),
            Type::Unknown => "unknown".to_string(),
        }
    }

    /// Parse an annotation head (`int`, `str`, a record name) into a type
    ///
    /// Parameterized annotations are assembled by the parser; this resolves
    /// the non-parameterized names only.
    pub fn from_annotation_name(name: &str) -> Option<Type> {
        if let Some(scalar) = ScalarType::from_name(name) {
            return Some(Type::Scalar(scalar));
        }
        match name {
            // bare container annotations carry unknown parameters
            "list" => Some(Type::List(Box::new(Type::Unknown))),
            "dict" => Some(Type::Dict(
                Box::new(Type::Unknown),
                Box::new(Type::Unknown),
            )),
            "set" => Some(Type::Set(Box::new(Type::Unknown))),
            "tuple" => Some(Type::Tuple(Vec::new())),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Scalar(s) => write!(f, "{}", s.name()),
            Type::List(t) => write!(f, "list[{}]", t),
            Type::Dict(k, v) => write!(f, "dict[{}, {}]", k, v),
            Type::Set(t) => write!(f, "set[{}]", t),
            Type::Tuple(ts) => {
                let parts: Vec<String> = ts.iter().map(|t| t.to_string()).collect();
                write!(f, "tuple[{}]", parts.join(", "))
            }
            Type::Record(name) => write!(f, "{}", name),
            Type::Unknown => write!(f, "<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_mangles_nested_containers() {
        assert_eq!(Type::list(Type::int()).suffix(), "vec_int");
        assert_eq!(Type::dict(Type::str(), Type::int()).suffix(), "map_str_int");
        assert_eq!(Type::list(Type::list(Type::int())).suffix(), "vec_vec_int");
        assert_eq!(Type::set(Type::str()).suffix(), "set_str");
    }

    #[test]
    fn container_depth_counts_nesting() {
        assert_eq!(Type::int().container_depth(), 0);
        assert_eq!(Type::list(Type::int()).container_depth(), 1);
        assert_eq!(Type::list(Type::list(Type::int())).container_depth(), 2);
        assert_eq!(
            Type::dict(Type::str(), Type::list(Type::int())).container_depth(),
            2
        );
    }

    #[test]
    fn contains_unknown_looks_through_parameters() {
        assert!(Type::Unknown.contains_unknown());
        assert!(Type::list(Type::Unknown).contains_unknown());
        assert!(Type::dict(Type::str(), Type::Unknown).contains_unknown());
        assert!(!Type::list(Type::int()).contains_unknown());
    }

    #[test]
    fn display_renders_source_syntax() {
        assert_eq!(Type::list(Type::int()).to_string(), "list[int]");
        assert_eq!(
            Type::dict(Type::str(), Type::int()).to_string(),
            "dict[str, int]"
        );
        assert_eq!(Type::Record("Counter".to_string()).to_string(), "Counter");
    }

    #[test]
    fn scalar_names_round_trip() {
        for scalar in ScalarType::variants() {
            assert_eq!(ScalarType::from_name(scalar.name()), Some(scalar));
        }
    }

    #[test]
    fn target_names_resolve() {
        assert_eq!(Target::from_name("c"), Some(Target::C));
        assert_eq!(Target::from_name("cpp"), Some(Target::Cpp));
        assert_eq!(Target::from_name("ocaml"), Some(Target::OCaml));
        assert_eq!(Target::from_name("cobol"), None);
    }
}
