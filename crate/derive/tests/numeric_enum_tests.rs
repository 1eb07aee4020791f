use mgen_derive::NumericEnum;

#[derive(Debug, PartialEq, Clone, Copy, NumericEnum)]
enum Band {
    UnsupportedFeature = 1001,
    MissingAnnotation = 2002,
    IncompatibleTypes = 2003,
    ParseFailure = 3001,
    CodegenFailure = 5001,
}

#[derive(Debug, PartialEq, Clone, Copy, NumericEnum)]
enum Implicit {
    Zero,
    One,
    Five = 5,
    Six,
}

#[test]
fn from_int_resolves_explicit_discriminants() {
    assert_eq!(Band::from_int(1001usize), Some(Band::UnsupportedFeature));
    assert_eq!(Band::from_int(2003usize), Some(Band::IncompatibleTypes));
    assert_eq!(Band::from_int(5001usize), Some(Band::CodegenFailure));
}

#[test]
fn from_int_rejects_unknown_values() {
    assert_eq!(Band::from_int(0usize), None);
    assert_eq!(Band::from_int(9999usize), None);
}

#[test]
fn to_int_inverts_from_int() {
    for code in [1001usize, 2002, 2003, 3001, 5001] {
        let variant = Band::from_int(code).unwrap();
        assert_eq!(variant.to_int(), code);
    }
}

#[test]
fn implicit_discriminants_continue_from_explicit() {
    assert_eq!(Implicit::Zero.to_int(), 0);
    assert_eq!(Implicit::One.to_int(), 1);
    assert_eq!(Implicit::Five.to_int(), 5);
    assert_eq!(Implicit::Six.to_int(), 6);
    assert_eq!(Implicit::from_int(6usize), Some(Implicit::Six));
}

#[test]
fn from_int_accepts_any_into_usize() {
    assert_eq!(Band::from_int(1001u16), Some(Band::UnsupportedFeature));
    assert_eq!(Band::from_int(2002u32 as usize), Some(Band::MissingAnnotation));
}
