use mgen_error::{Diagnostic, ErrorCode};
use mgen_ir::ast::{Module, Statement};
use mgen_ir::query;
use mgen_shared::{CompilationContext, FunctionSig};
use mgen_types::TargetTypeRegistry;

/// Structural summary of a module, the analysis-phase artifact
#[derive(Debug, Clone, Default)]
pub struct ModuleSummary {
    /// Top-level function names in source order
    pub functions: Vec<String>,
    /// Record names in source order
    pub records: Vec<String>,
    /// Imported (module, member) pairs; the member is empty for plain
    /// imports
    pub imports: Vec<(String, String)>,
    /// Whether any expression in the module is a comprehension
    pub uses_comprehensions: bool,
}

/// Modules whose members may be imported, with the members we understand
const RECOGNIZED_MODULES: &[(&str, &[&str])] = &[
    (
        "typing",
        &["List", "Dict", "Set", "Tuple", "Optional", "NamedTuple"],
    ),
    ("dataclasses", &["dataclass", "field"]),
    ("collections", &["namedtuple"]),
];

/// Extracts structural summaries and populates the context and registry
///
/// Records are registered (fields, methods, mutation flags) so inference
/// and emission can resolve them; function signatures are registered for
/// call-site typing; imports are resolved against the recognized set.
///
/// ### Returns
/// The summary, or the import/duplicate-definition errors found
pub fn analyze(
    module: &Module,
    context: &mut CompilationContext,
    registry: &mut TargetTypeRegistry,
) -> Result<ModuleSummary, Vec<Diagnostic>> {
    let mut summary = ModuleSummary {
        uses_comprehensions: query::uses_comprehensions(module),
        ..ModuleSummary::default()
    };
    let mut diagnostics = Vec::new();

    for item in &module.items {
        match item {
            Statement::ClassDef(class_def) => {
                let record = query::extract_record(class_def);
                summary.records.push(record.name.clone());
                registry.register_record(&record.name);
                if !context.define_record(record) {
                    diagnostics.push(Diagnostic::error(
                        ErrorCode::IncompatibleTypes,
                        format!("record '{}' is defined more than once", class_def.name),
                        class_def.location,
                    ));
                }
            }
            Statement::FunctionDef(def) => {
                summary.functions.push(def.name.clone());
                let sig = FunctionSig {
                    parameters: def
                        .parameters
                        .iter()
                        .map(|p| (p.name.clone(), p.ty.clone()))
                        .collect(),
                    return_type: def.return_type.clone(),
                };
                context.define_function(def.name.clone(), sig);
            }
            Statement::Import(import) => {
                let recognized = RECOGNIZED_MODULES
                    .iter()
                    .find(|(name, _)| *name == import.module);
                match recognized {
                    None => diagnostics.push(Diagnostic::error(
                        ErrorCode::UnknownModule,
                        format!("cannot import from unknown module '{}'", import.module),
                        import.location,
                    )
                    .with_help(
                        "only typing, dataclasses and collections members can be imported",
                    )
                    .with_note("import resolution recognizes no other modules")),
                    Some((_, members)) => {
                        if import.members.is_empty() {
                            summary.imports.push((import.module.clone(), String::new()));
                            context.add_import(import.module.clone(), String::new());
                        }
                        for member in &import.members {
                            if members.contains(&member.as_str()) {
                                summary.imports.push((import.module.clone(), member.clone()));
                                context.add_import(import.module.clone(), member.clone());
                            } else {
                                diagnostics.push(Diagnostic::error(
                                    ErrorCode::UnknownImportMember,
                                    format!(
                                        "module '{}' has no importable member '{}'",
                                        import.module, member
                                    ),
                                    import.location,
                                ));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if diagnostics.is_empty() {
        Ok(summary)
    } else {
        Err(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use mgen_types::{Target, Type};

    fn analyze_source(
        source: &str,
    ) -> (
        Result<ModuleSummary, Vec<Diagnostic>>,
        CompilationContext,
        TargetTypeRegistry,
    ) {
        let module = parse_source(source, "test.py").expect("parses");
        let mut context = CompilationContext::new();
        let mut registry = TargetTypeRegistry::new(Target::C);
        let result = analyze(&module, &mut context, &mut registry);
        (result, context, registry)
    }

    #[test]
    fn collects_functions_and_records() {
        let (result, context, registry) = analyze_source(
            "@dataclass\nclass Counter:\n    n: int\n\ndef main() -> int:\n    return 0\n",
        );
        let summary = result.expect("analyzes");
        assert_eq!(summary.records, vec!["Counter".to_string()]);
        assert_eq!(summary.functions, vec!["main".to_string()]);
        assert!(registry.has_record("Counter"));
        let record = context.record("Counter").expect("registered");
        assert!(record.is_dataclass);
        assert_eq!(record.fields, vec![("n".to_string(), Type::int())]);
    }

    #[test]
    fn constructor_fields_pick_up_parameter_types() {
        let (result, context, _) = analyze_source(
            "class Point:\n    def __init__(self, x: int, y: int):\n        self.x = x\n        self.y = y\n",
        );
        result.expect("analyzes");
        let record = context.record("Point").expect("registered");
        assert_eq!(
            record.fields,
            vec![
                ("x".to_string(), Type::int()),
                ("y".to_string(), Type::int())
            ]
        );
    }

    #[test]
    fn method_mutation_is_detected() {
        let (result, context, _) = analyze_source(
            "class Counter:\n    n: int\n    def bump(self, k: int) -> None:\n        self.n += k\n    def value(self) -> int:\n        return self.n\n",
        );
        result.expect("analyzes");
        let record = context.record("Counter").expect("registered");
        assert!(record.method("bump").expect("bump").mutates_receiver);
        assert!(!record.method("value").expect("value").mutates_receiver);
    }

    #[test]
    fn recognized_imports_resolve() {
        let (result, context, _) =
            analyze_source("from dataclasses import dataclass\nfrom typing import List\n");
        let summary = result.expect("analyzes");
        assert_eq!(summary.imports.len(), 2);
        assert_eq!(context.imports().len(), 2);
    }

    #[test]
    fn unknown_module_is_an_import_error() {
        let (result, _, _) = analyze_source("import os\n");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UnknownModule);
    }

    #[test]
    fn unknown_member_is_an_import_error() {
        let (result, _, _) = analyze_source("from typing import Protocol\n");
        let errors = result.unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::UnknownImportMember);
    }

    #[test]
    fn duplicate_records_are_reported() {
        let (result, _, _) =
            analyze_source("class A:\n    n: int\n\nclass A:\n    m: int\n");
        let errors = result.unwrap_err();
        assert!(errors[0].message.contains("defined more than once"));
    }
}
