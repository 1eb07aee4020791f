//! Typed per-backend preferences
//!
//! Each backend declares a schema (key, type, default, description); the
//! CLI's `--pref key=value` overrides are validated against the schema
//! before the pipeline starts. Unknown keys warn, malformed values error.

use mgen_error::{Diagnostic, ErrorCode, MgenError};
use mgen_ir::SourceLocation;
use std::collections::BTreeMap;

/// A typed preference value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

/// One entry of a backend's preferences schema
#[derive(Debug, Clone)]
pub struct PrefSpec {
    pub key: &'static str,
    pub default: PrefValue,
    pub description: &'static str,
    /// The admissible values for small-enum preferences
    pub choices: &'static [&'static str],
}

impl PrefSpec {
    pub const fn bool(key: &'static str, default: bool, description: &'static str) -> Self {
        PrefSpec {
            key,
            default: PrefValue::Bool(default),
            description,
            choices: &[],
        }
    }

    pub const fn int(key: &'static str, default: i64, description: &'static str) -> Self {
        PrefSpec {
            key,
            default: PrefValue::Int(default),
            description,
            choices: &[],
        }
    }

    pub const fn choice(
        key: &'static str,
        default: &'static str,
        choices: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        PrefSpec {
            key,
            default: PrefValue::Str(default),
            description,
            choices,
        }
    }
}

/// Validated preference values for one backend instance
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    values: BTreeMap<String, OwnedValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OwnedValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Preferences {
    /// Creates a preferences bag holding every schema default
    pub fn defaults(schema: &[PrefSpec]) -> Self {
        let mut values = BTreeMap::new();
        for spec in schema {
            values.insert(spec.key.to_string(), OwnedValue::from_spec(&spec.default));
        }
        Preferences { values }
    }

    /// Applies `key=value` overrides against the schema
    ///
    /// Unknown keys produce warnings; a value that does not parse for the
    /// key's declared type, or is outside a small-enum's choices, is an
    /// error. All diagnostics carry the default (whole-input) location
    /// since preferences have no source file.
    ///
    /// ### Returns
    /// The validated bag and any warnings, or the validation errors
    pub fn with_overrides(
        schema: &[PrefSpec],
        overrides: &[(String, String)],
    ) -> Result<(Self, Vec<Diagnostic>), Vec<Diagnostic>> {
        let mut prefs = Preferences::defaults(schema);
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let location = SourceLocation::default();

        for (key, raw) in overrides {
            let Some(spec) = schema.iter().find(|spec| spec.key == key) else {
                warnings.push(Diagnostic::warning(
                    ErrorCode::UnresolvedType,
                    format!("unknown preference '{}' ignored", key),
                    location,
                ));
                continue;
            };
            match spec.parse(raw) {
                Ok(value) => {
                    prefs.values.insert(key.clone(), value);
                }
                Err(error) => {
                    errors.push(Diagnostic::error(
                        ErrorCode::UnresolvedType,
                        error.to_string(),
                        location,
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok((prefs, warnings))
        } else {
            Err(errors)
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(OwnedValue::Bool(true)))
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(OwnedValue::Int(value)) => *value,
            _ => 0,
        }
    }

    pub fn get_str(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(OwnedValue::Str(value)) => value,
            _ => "",
        }
    }
}

impl OwnedValue {
    fn from_spec(value: &PrefValue) -> Self {
        match value {
            PrefValue::Bool(v) => OwnedValue::Bool(*v),
            PrefValue::Int(v) => OwnedValue::Int(*v),
            PrefValue::Str(v) => OwnedValue::Str(v.to_string()),
        }
    }
}

impl PrefSpec {
    fn parse(&self, raw: &str) -> Result<OwnedValue, MgenError> {
        match &self.default {
            PrefValue::Bool(_) => match raw {
                "true" | "1" | "yes" => Ok(OwnedValue::Bool(true)),
                "false" | "0" | "no" => Ok(OwnedValue::Bool(false)),
                _ => Err(MgenError::Preferences(format!(
                    "'{}' expects a boolean, got '{}'",
                    self.key, raw
                ))),
            },
            PrefValue::Int(_) => raw.parse::<i64>().map(OwnedValue::Int).map_err(|_| {
                MgenError::Preferences(format!(
                    "'{}' expects an integer, got '{}'",
                    self.key, raw
                ))
            }),
            PrefValue::Str(_) => {
                if self.choices.is_empty() || self.choices.contains(&raw) {
                    Ok(OwnedValue::Str(raw.to_string()))
                } else {
                    Err(MgenError::Preferences(format!(
                        "'{}' must be one of {:?}, got '{}'",
                        self.key, self.choices, raw
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &[PrefSpec] = &[
        PrefSpec::int("indent_size", 4, "spaces per indentation level"),
        PrefSpec::bool("use_modern_features", true, "prefer newer idioms"),
        PrefSpec::choice(
            "brace_style",
            "k&r",
            &["k&r", "allman"],
            "brace placement",
        ),
    ];

    #[test]
    fn defaults_cover_the_schema() {
        let prefs = Preferences::defaults(SCHEMA);
        assert_eq!(prefs.get_int("indent_size"), 4);
        assert!(prefs.get_bool("use_modern_features"));
        assert_eq!(prefs.get_str("brace_style"), "k&r");
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides = vec![
            ("indent_size".to_string(), "2".to_string()),
            ("brace_style".to_string(), "allman".to_string()),
        ];
        let (prefs, warnings) = Preferences::with_overrides(SCHEMA, &overrides).expect("valid");
        assert!(warnings.is_empty());
        assert_eq!(prefs.get_int("indent_size"), 2);
        assert_eq!(prefs.get_str("brace_style"), "allman");
    }

    #[test]
    fn unknown_keys_warn_but_do_not_fail() {
        let overrides = vec![("tabs".to_string(), "true".to_string())];
        let (prefs, warnings) = Preferences::with_overrides(SCHEMA, &overrides).expect("valid");
        assert_eq!(warnings.len(), 1);
        assert_eq!(prefs.get_int("indent_size"), 4);
    }

    #[test]
    fn malformed_values_error_before_the_pipeline() {
        let overrides = vec![("indent_size".to_string(), "wide".to_string())];
        let errors = Preferences::with_overrides(SCHEMA, &overrides).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("expects an integer"));
    }

    #[test]
    fn choices_are_enforced() {
        let overrides = vec![("brace_style".to_string(), "gnu".to_string())];
        let errors = Preferences::with_overrides(SCHEMA, &overrides).unwrap_err();
        assert!(errors[0].message.contains("must be one of"));
    }
}
