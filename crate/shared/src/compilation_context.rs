use mgen_ir::ast::RecordDescriptor;
use mgen_types::Type;
use std::collections::HashMap;

/// Signature of a top-level function
#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub parameters: Vec<(String, Type)>,
    pub return_type: Type,
}

/// Compilation context shared by the analysis, inference and emission phases
///
/// Owns the record and function signature tables plus the scoped binding
/// environment. One context exists per pipeline invocation; backends read
/// it, only the frontend writes it.
pub struct CompilationContext {
    /// User records in declaration order
    records: Vec<RecordDescriptor>,
    /// Top-level function signatures
    functions: HashMap<String, FunctionSig>,
    /// Imported (module, member) pairs in source order
    imports: Vec<(String, String)>,
    /// Binding scopes, innermost last
    scopes: Vec<HashMap<String, Type>>,
}

impl Default for CompilationContext {
    fn default() -> Self {
        CompilationContext::new()
    }
}

impl CompilationContext {
    /// Creates a context with a single (module-level) scope
    pub fn new() -> Self {
        CompilationContext {
            records: Vec::new(),
            functions: HashMap::new(),
            imports: Vec::new(),
            scopes: vec![HashMap::new()],
        }
    }

    /// Registers a record summary
    ///
    /// ### Returns
    /// False if a record with this name already exists
    pub fn define_record(&mut self, record: RecordDescriptor) -> bool {
        if self.record(&record.name).is_some() {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Looks up a record by name
    pub fn record(&self, name: &str) -> Option<&RecordDescriptor> {
        self.records.iter().find(|r| r.name == name)
    }

    /// User records in declaration order
    pub fn records(&self) -> &[RecordDescriptor] {
        &self.records
    }

    /// Registers a top-level function signature
    pub fn define_function(&mut self, name: impl Into<String>, sig: FunctionSig) {
        self.functions.insert(name.into(), sig);
    }

    /// Looks up a function signature by name
    pub fn function(&self, name: &str) -> Option<&FunctionSig> {
        self.functions.get(name)
    }

    /// Records an imported member
    pub fn add_import(&mut self, module: impl Into<String>, member: impl Into<String>) {
        self.imports.push((module.into(), member.into()));
    }

    /// Imported (module, member) pairs in source order
    pub fn imports(&self) -> &[(String, String)] {
        &self.imports
    }

    /// Enters a new binding scope
    pub fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Leaves the innermost binding scope
    pub fn end_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Binds a name in the innermost scope
    pub fn bind(&mut self, name: impl Into<String>, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), ty);
        }
    }

    /// Looks a binding up through the scope stack, innermost first
    pub fn binding(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Refines an existing binding's type in the scope that holds it
    ///
    /// ### Returns
    /// False if the name is not bound anywhere
    pub fn refine(&mut self, name: &str, ty: Type) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = ty;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgen_ir::ast::RecordDescriptor;

    fn counter_record() -> RecordDescriptor {
        RecordDescriptor {
            name: "Counter".to_string(),
            fields: vec![("n".to_string(), Type::int())],
            methods: Vec::new(),
            is_dataclass: true,
            is_namedtuple: false,
        }
    }

    #[test]
    fn records_reject_duplicates() {
        let mut context = CompilationContext::new();
        assert!(context.define_record(counter_record()));
        assert!(!context.define_record(counter_record()));
        assert_eq!(context.records().len(), 1);
    }

    #[test]
    fn bindings_shadow_through_scopes() {
        let mut context = CompilationContext::new();
        context.bind("x", Type::int());
        context.begin_scope();
        context.bind("x", Type::str());
        assert_eq!(context.binding("x"), Some(&Type::str()));
        context.end_scope();
        assert_eq!(context.binding("x"), Some(&Type::int()));
    }

    #[test]
    fn refine_updates_the_owning_scope() {
        let mut context = CompilationContext::new();
        context.bind("xs", Type::list(Type::Unknown));
        context.begin_scope();
        assert!(context.refine("xs", Type::list(Type::int())));
        context.end_scope();
        assert_eq!(context.binding("xs"), Some(&Type::list(Type::int())));
        assert!(!context.refine("missing", Type::int()));
    }

    #[test]
    fn module_scope_survives_end_scope() {
        let mut context = CompilationContext::new();
        context.end_scope();
        context.bind("x", Type::bool());
        assert_eq!(context.binding("x"), Some(&Type::bool()));
    }
}
