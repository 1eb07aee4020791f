use mgen_derive::NamedEnum;

// Mix of explicit and implicit names
#[derive(Debug, PartialEq, Clone, Copy, NamedEnum)]
enum TargetName {
    #[name = "c++"]
    Cpp,
    C,
    Rust,
    #[name = "ocaml"]
    OCaml,
}

#[derive(Debug, PartialEq, Clone, Copy, NamedEnum)]
enum ScalarName {
    Int,
    Float,
    #[name = "str"]
    Text,
    #[name = "None"]
    NoneValue,
}

#[test]
fn explicit_names_are_used() {
    assert_eq!(TargetName::Cpp.name(), "c++");
    assert_eq!(ScalarName::Text.name(), "str");
    assert_eq!(ScalarName::NoneValue.name(), "None");
}

#[test]
fn implicit_names_lowercase_the_variant() {
    assert_eq!(TargetName::C.name(), "c");
    assert_eq!(TargetName::Rust.name(), "rust");
    assert_eq!(ScalarName::Int.name(), "int");
}

#[test]
fn from_name_round_trips_every_variant() {
    for variant in TargetName::variants() {
        assert_eq!(TargetName::from_name(variant.name()), Some(variant));
    }
    for variant in ScalarName::variants() {
        assert_eq!(ScalarName::from_name(variant.name()), Some(variant));
    }
}

#[test]
fn from_name_rejects_unknown_names() {
    assert_eq!(TargetName::from_name("fortran"), None);
    assert_eq!(ScalarName::from_name(""), None);
}

#[test]
fn variants_preserve_declaration_order() {
    let all = TargetName::variants();
    assert_eq!(
        all,
        [
            TargetName::Cpp,
            TargetName::C,
            TargetName::Rust,
            TargetName::OCaml
        ]
    );
}
