use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Expr, ExprLit, Lit, Meta, MetaNameValue, Variant, parse_macro_input};

/// Derive macro that generates `name()`, `from_name()` and `variants()` methods
/// for fieldless enums based on `#[name = "..."]` attributes on the variants.
///
/// ### Example
/// ```
/// use mgen_derive::NamedEnum;
///
/// #[derive(Debug, PartialEq, NamedEnum)]
/// enum Target {
///  #[name = "c++"]
///  Cpp,
///  Rust, // Implicit name: "rust"
/// }
///
/// assert_eq!(Target::Cpp.name(), "c++");
/// assert_eq!(Target::from_name("rust"), Some(Target::Rust));
/// assert_eq!(Target::variants().len(), 2);
/// ```
#[proc_macro_derive(NamedEnum, attributes(name))]
pub fn derive_named_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = &input.ident;

    let variants = if let Data::Enum(data_enum) = &input.data {
        &data_enum.variants
    } else {
        panic!("NamedEnum can only be derived for enums");
    };
    let variant_mappings = variants
        .iter()
        .map(|variant| {
            let variant_name = &variant.ident;
            let string_name = extract_name_attribute(variant)
                .unwrap_or_else(|| variant_name.to_string().to_lowercase());
            (variant_name, string_name)
        })
        .collect::<Vec<_>>();

    let name_arms = variant_mappings.iter().map(|(variant_name, string_name)| {
        quote! {
            #enum_name::#variant_name => #string_name
        }
    });

    let from_name_arms = variant_mappings.iter().map(|(variant_name, string_name)| {
        quote! {
            #string_name => Some(#enum_name::#variant_name)
        }
    });

    let variant_paths = variant_mappings.iter().map(|(variant_name, _)| {
        quote! {
            #enum_name::#variant_name
        }
    });
    let variant_count = variant_mappings.len();

    let expanded = quote! {
        impl #enum_name {
            /// Get the string name of this variant
            pub const fn name(&self) -> &'static str {
                match self {
                    #(#name_arms),*
                }
            }

            /// Try to resolve a variant from its string name
            pub fn from_name(s: &str) -> Option<Self> {
                match s {
                    #(#from_name_arms),*,
                    _ => None,
                }
            }

            /// All variants in declaration order
            pub const fn variants() -> [Self; #variant_count] {
                [#(#variant_paths),*]
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

/// Extract the string value from a `#[name = "..."]` attribute if present
fn extract_name_attribute(variant: &Variant) -> Option<String> {
    variant
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("name"))
        .map(|attr| match &attr.meta {
            Meta::NameValue(MetaNameValue { value, .. }) => {
                if let Expr::Lit(ExprLit {
                    lit: Lit::Str(lit_str),
                    ..
                }) = value
                {
                    lit_str.value()
                } else {
                    panic!("name attribute must have a string literal value");
                }
            }
            _ => panic!("name attribute must be in the form #[name = \"value\"]"),
        })
}

/// Derive macro that generates bidirectional conversion methods between enum
/// variants and their numeric discriminants. Generates:
/// - `from_int<T: Into<usize>>(value: T) -> Option<Self>`
/// - `to_int(&self) -> usize`
///
/// # Examples
///
/// ```
/// use mgen_derive::NumericEnum;
///
/// #[derive(Debug, PartialEq, Clone, Copy, NumericEnum)]
/// enum Code {
///     UnsupportedFeature = 1001,
///     TypeMismatch = 2003,
/// }
///
/// assert_eq!(Code::from_int(1001usize), Some(Code::UnsupportedFeature));
/// assert_eq!(Code::TypeMismatch.to_int(), 2003);
/// ```
#[proc_macro_derive(NumericEnum)]
pub fn derive_numeric_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = &input.ident;

    let variants = if let Data::Enum(data_enum) = &input.data {
        &data_enum.variants
    } else {
        panic!("NumericEnum can only be derived for enums");
    };

    // Track the expected next discriminant for variants without an explicit one
    let mut next_discriminant = 0usize;
    let mut variant_values = Vec::new();

    for variant in variants.iter() {
        let variant_name = &variant.ident;

        let value = if let Some((_, expr)) = &variant.discriminant {
            if let Expr::Lit(ExprLit {
                lit: Lit::Int(lit_int),
                ..
            }) = expr
            {
                let parsed_value = lit_int
                    .base10_parse::<usize>()
                    .expect("Enum discriminant must be a valid integer");
                next_discriminant = parsed_value + 1;
                parsed_value
            } else {
                panic!("NumericEnum requires integer literals as enum discriminants");
            }
        } else {
            let value = next_discriminant;
            next_discriminant += 1;
            value
        };

        variant_values.push((variant_name, value));
    }

    let from_int_arms = variant_values.iter().map(|(variant_name, value)| {
        quote! {
            #value => Some(#enum_name::#variant_name)
        }
    });

    let to_int_arms = variant_values.iter().map(|(variant_name, value)| {
        quote! {
            #enum_name::#variant_name => #value
        }
    });

    let expanded = quote! {
        impl #enum_name {
            /// Convert a numeric value to an enum variant
            ///
            /// # Arguments
            ///
            /// * `value` - The numeric value to convert
            ///
            /// # Returns
            ///
            /// Some(Enum) if the value represents a valid variant, None otherwise
            pub fn from_int<T: Into<usize>>(value: T) -> Option<Self> {
                let value = value.into();
                match value {
                    #(#from_int_arms),*,
                    _ => None,
                }
            }

            /// Convert the enum variant back to its numeric value
            pub fn to_int(&self) -> usize {
                match self {
                    #(#to_int_arms),*
                }
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}
