/// Concrete target-language traits of one abstract source type
///
/// A descriptor is everything an emitter needs to know about a type in its
/// target: how it is spelled, how generated helper functions for it are
/// mangled, whether values own heap memory, how they are printed, what the
/// default value literal is, and how two values are compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// The concrete type name in the target language (`char*`,
    /// `std::vector<int>`, `Vec<i64>`, `[]int`, ...)
    pub target_name: String,
    /// Suffix used for function-name mangling (`int`, `vec_int`,
    /// `map_str_int`)
    pub suffix: String,
    /// Whether values of this type own heap memory
    pub heap_owned: bool,
    /// Whether a destructor call is required when a value goes out of scope
    pub needs_drop: bool,
    /// Whether inserting a value into a container must copy it (`strdup`
    /// for C strings)
    pub needs_copy: bool,
    /// printf-style format specifier, for targets that print through one
    pub format_spec: &'static str,
    /// The zero/default value literal in the target language
    pub zero_value: String,
    /// Equality form: an operator (`==`) or the name of a helper predicate
    /// (`str_eq`, `vec_int_eq`)
    pub equality: String,
}

impl TypeDescriptor {
    /// A plain value type: stack-allocated, compared with `==`
    pub fn value(target_name: &str, suffix: &str, format_spec: &'static str, zero: &str) -> Self {
        TypeDescriptor {
            target_name: target_name.to_string(),
            suffix: suffix.to_string(),
            heap_owned: false,
            needs_drop: false,
            needs_copy: false,
            format_spec,
            zero_value: zero.to_string(),
            equality: "==".to_string(),
        }
    }

    /// A heap-owning type that must be dropped and copied on insert
    pub fn owned(
        target_name: &str,
        suffix: &str,
        format_spec: &'static str,
        zero: &str,
        equality: &str,
    ) -> Self {
        TypeDescriptor {
            target_name: target_name.to_string(),
            suffix: suffix.to_string(),
            heap_owned: true,
            needs_drop: true,
            needs_copy: true,
            format_spec,
            zero_value: zero.to_string(),
            equality: equality.to_string(),
        }
    }

    /// Whether the equality form is an infix operator rather than a helper
    pub fn compares_with_operator(&self) -> bool {
        self.equality == "=="
    }
}
