//! Multi-pass type inference
//!
//! Assigns a type to every expression and binding of a validated module.
//! Four passes run over each scope, each a pure function of the previous
//! pass's output:
//!
//! 1. literal & annotation — types from annotations and literal constants
//! 2. container refinement — element types from append/insert/add calls,
//!    subscript stores and returns
//! 3. nested structure — two-dimensional patterns (`a[i][j]`, appends of
//!    container values)
//! 4. key/value — dict key and value types from subscript traffic
//!
//! A finalize step re-synthesizes expression types against the refined
//! bindings, reports type conflicts, and turns every residual `Unknown`
//! binding into an E2002 diagnostic. Running the engine a second time on
//! its own output is a no-op.

mod passes;
mod strategies;

use mgen_error::{Diagnostic, ErrorCode, default_suggestion};
use mgen_ir::ast::{ClassDef, FunctionDef, Module, Statement};
use mgen_shared::{CompilationContext, FunctionSig};
use mgen_types::{TargetTypeRegistry, Type};

/// Runs inference over the module, annotating it in place
///
/// ### Arguments
/// * `module` - The validated module; type slots are filled in place
/// * `context` - Record and function tables from the analysis phase
/// * `registry` - The target registry, for mapping checks
///
/// ### Returns
/// Every type error found; empty means the module is fully typed
pub fn infer(
    module: &mut Module,
    context: &mut CompilationContext,
    registry: &TargetTypeRegistry,
) -> Vec<Diagnostic> {
    let mut inferencer = Inferencer::new(context, registry);
    // the module-name binding backs the `if __name__ == "__main__"` idiom
    inferencer.context.bind("__name__", Type::str());

    // module scope first so function bodies can see top-level bindings
    let mut top_level: Vec<&mut Statement> = module
        .items
        .iter_mut()
        .filter(|s| !matches!(s, Statement::FunctionDef(_) | Statement::ClassDef(_)))
        .collect();
    inferencer.infer_scope(&mut top_level, None, Type::none());

    for item in &mut module.items {
        match item {
            Statement::FunctionDef(def) => inferencer.infer_function(def, None),
            Statement::ClassDef(class_def) => inferencer.infer_class(class_def),
            _ => {}
        }
    }

    inferencer.diagnostics
}

pub(crate) struct Inferencer<'a> {
    pub(crate) context: &'a mut CompilationContext,
    pub(crate) registry: &'a TargetTypeRegistry,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// The record whose method body is being inferred, for `self`
    pub(crate) current_record: Option<String>,
    /// The annotated return type of the enclosing function
    pub(crate) current_return: Type,
    /// Whether synthesis reports diagnostics (quiet during early passes)
    pub(crate) report: bool,
}

impl<'a> Inferencer<'a> {
    fn new(context: &'a mut CompilationContext, registry: &'a TargetTypeRegistry) -> Self {
        Inferencer {
            context,
            registry,
            diagnostics: Vec::new(),
            current_record: None,
            current_return: Type::none(),
            report: false,
        }
    }

    pub(crate) fn error(&mut self, code: ErrorCode, message: String, location: mgen_ir::SourceLocation) {
        if self.report {
            self.diagnostics.push(Diagnostic::error(code, message, location));
        }
    }

    /// Emits regardless of quiet mode; used by the refinement passes that
    /// run exactly once
    pub(crate) fn error_always(
        &mut self,
        code: ErrorCode,
        message: String,
        location: mgen_ir::SourceLocation,
    ) {
        self.diagnostics.push(Diagnostic::error(code, message, location));
    }

    fn infer_class(&mut self, class_def: &mut ClassDef) {
        let record_name = class_def.name.clone();
        for item in &mut class_def.body {
            if let Statement::FunctionDef(def) = item {
                self.infer_function(def, Some(record_name.clone()));
            }
        }
    }

    fn infer_function(&mut self, def: &mut FunctionDef, record: Option<String>) {
        self.context.begin_scope();
        self.current_record = record.clone();

        let is_static = def.decorators.iter().any(|d| d == "staticmethod");
        for (index, param) in def.parameters.iter_mut().enumerate() {
            if index == 0 && record.is_some() && !is_static && param.ty.is_unknown() {
                param.ty = Type::Record(record.clone().unwrap_or_default());
            }
            self.context.bind(param.name.clone(), param.ty.clone());
        }

        // an unannotated return type resolves from the first valued return
        if def.return_type.is_unknown() {
            def.return_type = self
                .first_return_type(&mut def.body)
                .unwrap_or_else(Type::none);
        }
        self.current_return = def.return_type.clone();

        let mut body: Vec<&mut Statement> = def.body.iter_mut().collect();
        self.infer_scope(&mut body, record.as_deref(), def.return_type.clone());

        // a bare container annotation (`-> list`) adopts the returned
        // value's resolved type
        if def.return_type.contains_unknown() {
            let mut resolved: Option<Type> = None;
            mgen_ir::query::walk_statements(&def.body, &mut |stmt| {
                if let Statement::Return(ret) = stmt {
                    if let Some(value) = &ret.value {
                        let ty = value.ty().clone();
                        if !ty.contains_unknown() && resolved.is_none() {
                            resolved = Some(ty);
                        }
                    }
                }
            });
            if let Some(ty) = resolved {
                def.return_type = ty;
            }
        }

        // keep the signature table in sync with the resolved types
        if record.is_none() {
            let sig = FunctionSig {
                parameters: def
                    .parameters
                    .iter()
                    .map(|p| (p.name.clone(), p.ty.clone()))
                    .collect(),
                return_type: def.return_type.clone(),
            };
            self.context.define_function(def.name.clone(), sig);
        }

        self.current_record = None;
        self.context.end_scope();
    }

    /// Runs the four passes plus finalize over one scope's statements
    fn infer_scope(
        &mut self,
        body: &mut [&mut Statement],
        record: Option<&str>,
        return_type: Type,
    ) {
        self.current_record = record.map(str::to_string);
        self.current_return = return_type;

        self.report = false;
        self.pass_literals_and_annotations(body);
        self.pass_container_refinement(body);
        self.pass_nested_structure(body);
        self.pass_key_value(body);

        self.report = true;
        self.finalize(body);
        self.report = false;
    }

    /// Resolves an omitted return annotation from the body
    fn first_return_type(&mut self, body: &mut [Statement]) -> Option<Type> {
        // bindings are not established yet, so only annotation-free
        // synthesis of the returned expression is attempted
        let mut found = None;
        for stmt in body.iter_mut() {
            if found.is_some() {
                break;
            }
            if let Statement::Return(ret) = stmt {
                if let Some(value) = &mut ret.value {
                    let ty = self.synthesize(value);
                    if !ty.contains_unknown() {
                        found = Some(ty);
                    }
                }
            }
        }
        found
    }

    /// The element type produced by iterating a value of `ty`
    pub(crate) fn iteration_element(&self, ty: &Type) -> Type {
        match ty {
            Type::List(t) | Type::Set(t) => (**t).clone(),
            Type::Dict(k, _) => (**k).clone(),
            Type::Scalar(mgen_types::ScalarType::Str) => Type::str(),
            Type::Tuple(ts) => ts.first().cloned().unwrap_or(Type::Unknown),
            _ => Type::Unknown,
        }
    }

    /// Binds a `for` target list against the iterable's element type
    pub(crate) fn bind_for_targets(&mut self, targets: &[String], element: &Type) -> Vec<Type> {
        let tys: Vec<Type> = if targets.len() == 1 {
            vec![element.clone()]
        } else {
            match element {
                Type::Tuple(parts) if parts.len() == targets.len() => parts.clone(),
                _ => targets.iter().map(|_| Type::Unknown).collect(),
            }
        };
        for (name, ty) in targets.iter().zip(&tys) {
            self.context.bind(name.clone(), ty.clone());
        }
        tys
    }

    /// Reports an E2002 for a binding that never resolved
    pub(crate) fn missing_annotation(
        &mut self,
        name: &str,
        ty: &Type,
        location: mgen_ir::SourceLocation,
    ) {
        let mut diagnostic = Diagnostic::error(
            ErrorCode::MissingAnnotation,
            format!("cannot infer the type of '{}' (best guess: {})", name, ty),
            location,
        );
        if let Some(suggestion) = default_suggestion(ErrorCode::MissingAnnotation, name) {
            diagnostic = diagnostic.with_help(suggestion);
        }
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis;
    use crate::parser::parse_source;
    use mgen_types::Target;

    fn infer_ok(source: &str) -> (Module, CompilationContext) {
        let mut module = parse_source(source, "test.py").expect("parses");
        let mut context = CompilationContext::new();
        let mut registry = TargetTypeRegistry::new(Target::C);
        analysis::analyze(&module, &mut context, &mut registry).expect("analyzes");
        let diagnostics = infer(&mut module, &mut context, &registry);
        assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
        (module, context)
    }

    fn infer_errors(source: &str) -> Vec<Diagnostic> {
        let mut module = parse_source(source, "test.py").expect("parses");
        let mut context = CompilationContext::new();
        let mut registry = TargetTypeRegistry::new(Target::C);
        analysis::analyze(&module, &mut context, &mut registry).expect("analyzes");
        infer(&mut module, &mut context, &registry)
    }

    fn assign_ty(module: &Module, index: usize) -> Type {
        match &module.items[index] {
            Statement::Assign(assign) => assign.ty.clone(),
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn literals_take_their_obvious_types() {
        let (module, _) = infer_ok("a = 1\nb = 2.5\nc = True\nd = \"hi\"\n");
        assert_eq!(assign_ty(&module, 0), Type::int());
        assert_eq!(assign_ty(&module, 1), Type::float());
        assert_eq!(assign_ty(&module, 2), Type::bool());
        assert_eq!(assign_ty(&module, 3), Type::str());
    }

    #[test]
    fn annotations_win_over_literals() {
        let (module, _) = infer_ok("x: float = 0\n");
        assert_eq!(assign_ty(&module, 0), Type::float());
    }

    #[test]
    fn container_elements_refine_from_appends() {
        let (module, _) = infer_ok(
            "def build() -> list[int]:\n    out: list = []\n    out.append(1)\n    return out\n",
        );
        match &module.items[0] {
            Statement::FunctionDef(def) => match &def.body[0] {
                Statement::Assign(assign) => {
                    assert_eq!(assign.ty, Type::list(Type::int()));
                }
                other => panic!("expected assign, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn nested_lists_resolve_to_two_levels() {
        let (module, _) = infer_ok(
            "def build() -> list:\n    out: list = []\n    row: list = [1, 2, 3]\n    out.append(row)\n    return out\n",
        );
        match &module.items[0] {
            Statement::FunctionDef(def) => {
                match &def.body[0] {
                    Statement::Assign(assign) => {
                        assert_eq!(assign.ty, Type::list(Type::list(Type::int())));
                    }
                    other => panic!("expected assign, got {:?}", other),
                }
                match &def.body[1] {
                    Statement::Assign(assign) => {
                        assert_eq!(assign.ty, Type::list(Type::int()));
                    }
                    other => panic!("expected assign, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn dict_keys_and_values_refine_from_stores() {
        let (module, _) = infer_ok(
            "def count(words: list[str]) -> int:\n    counts: dict = {}\n    for w in words:\n        counts[w] = 1\n    return counts[\"the\"]\n",
        );
        match &module.items[0] {
            Statement::FunctionDef(def) => match &def.body[0] {
                Statement::Assign(assign) => {
                    assert_eq!(assign.ty, Type::dict(Type::str(), Type::int()));
                }
                other => panic!("expected assign, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn unused_empty_container_is_a_missing_annotation() {
        let errors = infer_errors("def f() -> None:\n    xs = []\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::MissingAnnotation);
        let help = errors[0].suggestion.as_ref().expect("has help");
        assert!(help.message.contains("annotation"));
    }

    #[test]
    fn conflicting_appends_are_incompatible() {
        let errors = infer_errors(
            "def f() -> None:\n    xs: list = []\n    xs.append(1)\n    xs.append(\"two\")\n",
        );
        assert!(errors.iter().any(|d| d.code == ErrorCode::IncompatibleTypes));
    }

    #[test]
    fn arithmetic_mixing_int_and_str_is_reported() {
        let errors = infer_errors("def f(a: int, b: str) -> int:\n    return a + b\n");
        assert!(errors.iter().any(|d| d.code == ErrorCode::IncompatibleTypes));
    }

    #[test]
    fn method_calls_type_through_records() {
        let (module, _) = infer_ok(
            "@dataclass\nclass Counter:\n    n: int\n    def value(self) -> int:\n        return self.n\n\ndef use() -> int:\n    c = Counter(0)\n    return c.value()\n",
        );
        match &module.items[1] {
            Statement::FunctionDef(def) => match &def.body[0] {
                Statement::Assign(assign) => {
                    assert_eq!(assign.ty, Type::Record("Counter".to_string()));
                }
                other => panic!("expected assign, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn inference_is_a_fixpoint() {
        let source =
            "def build() -> list:\n    out: list = []\n    row: list = [1, 2, 3]\n    out.append(row)\n    return out\n";
        let mut module = parse_source(source, "test.py").expect("parses");
        let mut context = CompilationContext::new();
        let mut registry = TargetTypeRegistry::new(Target::C);
        analysis::analyze(&module, &mut context, &mut registry).expect("analyzes");
        let first = infer(&mut module, &mut context, &registry);
        assert!(first.is_empty());
        let snapshot = format!("{:?}", module);
        let second = infer(&mut module, &mut context, &registry);
        assert!(second.is_empty());
        assert_eq!(snapshot, format!("{:?}", module));
    }

    #[test]
    fn three_level_nesting_is_rejected() {
        let errors = infer_errors(
            "def f() -> None:\n    a: list[list[list[int]]] = []\n",
        );
        assert!(errors.iter().any(|d| d.code == ErrorCode::IncompatibleTypes));
    }

    #[test]
    fn range_loops_bind_int(){
        let (module, _) = infer_ok(
            "def f(n: int) -> int:\n    total = 0\n    for i in range(n):\n        total += i\n    return total\n",
        );
        match &module.items[0] {
            Statement::FunctionDef(def) => match &def.body[1] {
                Statement::For(for_stmt) => {
                    assert_eq!(for_stmt.target_tys, vec![Type::int()]);
                }
                other => panic!("expected for, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }
}
