//! Rust backend
//!
//! Ownership-aware: values of heap-owned descriptors move by default, and
//! the emitter inserts clones where a later use might need the value.
//! Records derive `Clone`; methods take `&mut self` when the pre-scan saw
//! any field mutation and `&self` otherwise. Comprehensions emit as
//! iterator chains.

use crate::Backend;
use crate::emitter::{CodeWriter, escape_c_string};
use crate::operators;
use crate::preferences::{PrefSpec, Preferences};
use mgen_error::{Diagnostic, ErrorCode};
use mgen_ir::SourceLocation;
use mgen_ir::ast::{
    AssignStmt, BinaryOperator, ComparisonOperator, ComprehensionExpr, ComprehensionKind,
    Expression, FStringPart, ForStmt, FunctionDef, LiteralValue, MethodCallExpr, Module,
    RecordDescriptor, Statement,
};
use mgen_ir::query::{self, main_guard_body};
use mgen_shared::CompilationContext;
use mgen_types::{ScalarType, Target, TargetTypeRegistry, Type};
use std::collections::HashSet;

/// Preferences understood by the Rust backend
pub const SCHEMA: &[PrefSpec] = &[
    PrefSpec::choice("edition", "2021", &["2018", "2021"], "Rust edition"),
    PrefSpec::choice(
        "clone_strategy",
        "implicit",
        &["implicit", "explicit"],
        "when to clone owned values that are used again",
    ),
    PrefSpec::int("indent_size", 4, "spaces per indentation level"),
];

pub fn factory(prefs: Preferences) -> Box<dyn Backend> {
    Box::new(RustBackend { prefs })
}

pub struct RustBackend {
    prefs: Preferences,
}

type EmitExpr = Result<String, ()>;

impl Backend for RustBackend {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn file_extension(&self) -> &'static str {
        "rs"
    }

    fn map_type(&self, ty: &Type, context: &CompilationContext) -> Option<String> {
        let registry = registry_for(context);
        registry.descriptor(ty).map(|d| d.target_name)
    }

    fn map_builtin(&self, name: &str) -> Option<&'static str> {
        match name {
            "print" => Some("println!"),
            "len" => Some("len"),
            "str" => Some("to_string"),
            "abs" => Some("abs"),
            _ => None,
        }
    }

    /// Peephole pass: `not (a == b)` becomes `a != b` (and the other
    /// negated comparisons), and double negation drops out
    fn optimize(&self, module: &mut Module) -> usize {
        let mut rewrites = 0;
        let mut body: Vec<&mut Statement> = module.items.iter_mut().collect();
        for stmt in body.iter_mut() {
            rewrite_statement(stmt, &mut rewrites);
        }
        rewrites
    }

    fn emit(
        &mut self,
        module: &Module,
        context: &CompilationContext,
    ) -> Result<String, Vec<Diagnostic>> {
        let registry = registry_for(context);
        let indent = self.prefs.get_int("indent_size").max(1) as usize;
        let mut emitter = RustEmitter {
            context,
            registry: &registry,
            diagnostics: Vec::new(),
            indent,
            receiver: None,
            needs_hashmap: false,
            needs_hashset: false,
        };
        emitter.emit_module(module)
    }

    fn build_descriptor(&self, module_name: &str) -> Option<(String, String)> {
        let edition = self.prefs.get_str("edition");
        let manifest = format!(
            "[package]\nname = \"{}\"\nversion = \"0.1.0\"\nedition = \"{}\"\n\n[dependencies]\n",
            module_name, edition
        );
        Some(("Cargo.toml".to_string(), manifest))
    }
}

fn registry_for(context: &CompilationContext) -> TargetTypeRegistry {
    let mut registry = TargetTypeRegistry::new(Target::Rust);
    for record in context.records() {
        registry.register_record(&record.name);
    }
    registry
}

struct RustEmitter<'a> {
    context: &'a CompilationContext,
    registry: &'a TargetTypeRegistry,
    diagnostics: Vec<Diagnostic>,
    indent: usize,
    receiver: Option<String>,
    needs_hashmap: bool,
    needs_hashset: bool,
}

impl<'a> RustEmitter<'a> {
    fn fail(&mut self, message: String, location: SourceLocation) -> EmitExpr {
        self.diagnostics
            .push(Diagnostic::error(ErrorCode::CodegenFailure, message, location));
        Err(())
    }

    fn type_name(&mut self, ty: &Type, location: SourceLocation) -> EmitExpr {
        match ty {
            Type::Dict(_, _) => self.needs_hashmap = true,
            Type::Set(_) => self.needs_hashset = true,
            _ => {}
        }
        match self.registry.descriptor(ty) {
            Some(descriptor) => Ok(descriptor.target_name),
            None => self.fail(format!("type {} has no Rust mapping", ty), location),
        }
    }

    fn is_owned(&self, ty: &Type) -> bool {
        self.registry
            .descriptor(ty)
            .map(|d| d.heap_owned)
            .unwrap_or(false)
    }

    fn emit_module(&mut self, module: &Module) -> Result<String, Vec<Diagnostic>> {
        let mut records = CodeWriter::new(self.indent);
        for item in &module.items {
            if let Statement::ClassDef(class_def) = item {
                if let Some(record) = self.context.record(&class_def.name).cloned() {
                    self.emit_record(&mut records, &record, class_def);
                }
            }
        }

        let mut bodies = CodeWriter::new(self.indent);
        for item in &module.items {
            if let Statement::FunctionDef(def) = item {
                self.emit_function(&mut bodies, def);
            }
        }
        self.emit_entry_point(&mut bodies, module);

        if !self.diagnostics.is_empty() {
            return Err(std::mem::take(&mut self.diagnostics));
        }

        let mut out = String::new();
        if self.needs_hashmap {
            out.push_str("use std::collections::HashMap;\n");
        }
        if self.needs_hashset {
            out.push_str("use std::collections::HashSet;\n");
        }
        if self.needs_hashmap || self.needs_hashset {
            out.push('\n');
        }
        out.push_str("#[allow(dead_code)]\nstatic MODULE_NAME: &str = \"__main__\";\n\n");
        out.push_str(&records.finish());
        out.push_str(&bodies.finish());
        Ok(out)
    }

    // ---- records ----

    fn emit_record(
        &mut self,
        writer: &mut CodeWriter,
        record: &RecordDescriptor,
        class_def: &mgen_ir::ast::ClassDef,
    ) {
        writer.line("#[derive(Clone, Debug, Default)]");
        writer.line(format!("pub struct {} {{", record.name));
        writer.indent();
        for (field, ty) in &record.fields {
            if let Ok(name) = self.type_name(ty, class_def.location) {
                writer.line(format!("pub {}: {},", field, name));
            }
        }
        writer.dedent();
        writer.line("}");
        writer.blank();

        writer.line(format!("impl {} {{", record.name));
        writer.indent();

        // constructor mirroring the field list
        let mut params = Vec::new();
        for (field, ty) in &record.fields {
            if let Ok(name) = self.type_name(ty, class_def.location) {
                params.push(format!("{}: {}", field, name));
            }
        }
        writer.line(format!(
            "pub fn new({}) -> {} {{",
            params.join(", "),
            record.name
        ));
        writer.indent();
        let field_names: Vec<&str> = record.fields.iter().map(|(f, _)| f.as_str()).collect();
        writer.line(format!("{} {{ {} }}", record.name, field_names.join(", ")));
        writer.dedent();
        writer.line("}");
        writer.blank();

        for item in &class_def.body {
            if let Statement::FunctionDef(def) = item {
                if def.name != "__init__" {
                    self.emit_method(writer, record, def);
                }
            }
        }
        writer.dedent();
        writer.line("}");
        writer.blank();
    }

    fn emit_method(
        &mut self,
        writer: &mut CodeWriter,
        record: &RecordDescriptor,
        def: &FunctionDef,
    ) {
        let descriptor = record.method(&def.name);
        let is_static = descriptor
            .map(|method| method.is_static)
            .unwrap_or_else(|| def.decorators.iter().any(|d| d == "staticmethod"));
        let mutates = descriptor.map(|m| m.mutates_receiver).unwrap_or(false);

        // a @staticmethod becomes an associated function without self
        let mut params = Vec::new();
        if !is_static {
            params.push(if mutates { "&mut self" } else { "&self" }.to_string());
        }
        for param in def.parameters.iter().skip(if is_static { 0 } else { 1 }) {
            match self.type_name(&param.ty, param.location) {
                Ok(name) => params.push(format!("{}: {}", param.name, name)),
                Err(()) => return,
            }
        }
        let return_clause = match self.return_clause(&def.return_type, def.location) {
            Ok(clause) => clause,
            Err(()) => return,
        };
        writer.line(format!(
            "pub fn {}({}){} {{",
            def.name,
            params.join(", "),
            return_clause
        ));
        writer.indent();
        self.receiver = if is_static {
            None
        } else {
            Some(
                def.parameters
                    .first()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "self".to_string()),
            )
        };
        self.emit_body(writer, &def.body);
        self.receiver = None;
        writer.dedent();
        writer.line("}");
        writer.blank();
    }

    // ---- functions ----

    fn return_clause(&mut self, ty: &Type, location: SourceLocation) -> EmitExpr {
        if ty == &Type::none() {
            return Ok(String::new());
        }
        let name = self.type_name(ty, location)?;
        Ok(format!(" -> {}", name))
    }

    fn emit_function(&mut self, writer: &mut CodeWriter, def: &FunctionDef) {
        let name = if def.name == "main" {
            "mgen_main"
        } else {
            &def.name
        };
        let mut params = Vec::new();
        for param in &def.parameters {
            match self.type_name(&param.ty, param.location) {
                Ok(type_name) => params.push(format!("{}: {}", param.name, type_name)),
                Err(()) => return,
            }
        }
        let Ok(return_clause) = self.return_clause(&def.return_type, def.location) else {
            return;
        };
        writer.line(format!(
            "pub fn {}({}){} {{",
            name,
            params.join(", "),
            return_clause
        ));
        writer.indent();
        self.emit_body(writer, &def.body);
        writer.dedent();
        writer.line("}");
        writer.blank();
    }

    fn emit_entry_point(&mut self, writer: &mut CodeWriter, module: &Module) {
        let main_def = query::function_defs(module).find(|def| def.name == "main");
        let mut guard_body: Option<&[Statement]> = None;
        let mut top_level: Vec<&Statement> = Vec::new();
        for item in &module.items {
            match item {
                Statement::FunctionDef(_) | Statement::ClassDef(_) | Statement::Import(_) => {}
                other => {
                    if let Some(body) = main_guard_body(other) {
                        guard_body = Some(body);
                    } else {
                        top_level.push(other);
                    }
                }
            }
        }

        if top_level.is_empty() && guard_body.is_none() && main_def.is_none() {
            return;
        }

        writer.line("fn main() {");
        writer.indent();
        for stmt in top_level {
            self.emit_statement(writer, stmt, &mut HashSet::new());
        }
        let returns_int = main_def
            .map(|def| def.return_type == Type::int())
            .unwrap_or(false);
        match guard_body {
            // a guard that just calls main() propagates the exit code
            Some(body) if query::guard_calls_main(body) => {
                if returns_int {
                    writer.line("std::process::exit(mgen_main() as i32);");
                } else {
                    writer.line("mgen_main();");
                }
            }
            Some(body) => self.emit_body(writer, body),
            None => {
                if main_def.is_some() {
                    if returns_int {
                        writer.line("std::process::exit(mgen_main() as i32);");
                    } else {
                        writer.line("mgen_main();");
                    }
                }
            }
        }
        writer.dedent();
        writer.line("}");
    }

    // ---- statements ----

    /// Emits a body, hoisting bindings first assigned inside nested
    /// blocks so they stay visible afterwards
    fn emit_body(&mut self, writer: &mut CodeWriter, body: &[Statement]) {
        let mut declared: HashSet<String> = HashSet::new();
        let top: HashSet<String> = body
            .iter()
            .filter_map(|stmt| match stmt {
                Statement::Assign(s) => s.target.as_name().map(str::to_string),
                _ => None,
            })
            .collect();
        let mut nested: Vec<(String, Type)> = Vec::new();
        query::walk_statements(body, &mut |stmt| {
            if let Statement::Assign(s) = stmt {
                if let Some(name) = s.target.as_name() {
                    if !top.contains(name) && !nested.iter().any(|(n, _)| n == name) {
                        nested.push((name.to_string(), s.ty.clone()));
                    }
                }
            }
        });
        for (name, ty) in nested {
            if let Ok(type_name) = self.type_name(&ty, SourceLocation::default()) {
                writer.line(format!("let mut {}: {};", name, type_name));
                declared.insert(name);
            }
        }
        for stmt in body {
            self.emit_statement(writer, stmt, &mut declared);
        }
    }

    fn emit_statement(
        &mut self,
        writer: &mut CodeWriter,
        stmt: &Statement,
        declared: &mut HashSet<String>,
    ) {
        match stmt {
            Statement::Assign(s) => self.emit_assign(writer, s, declared),
            Statement::AugAssign(s) => {
                let Ok(value) = self.emit_expression(&s.value) else {
                    return;
                };
                // dict entries mutate in place through get_mut
                if let Expression::Subscript(sub) = &s.target {
                    if let Type::Dict(_, _) = sub.receiver.ty() {
                        let Ok(receiver) = self.emit_expression_raw(&sub.receiver) else {
                            return;
                        };
                        let Ok(key) = self.emit_expression(&sub.index) else {
                            return;
                        };
                        let op = operators::augmented(s.operator).unwrap_or("+=");
                        writer.line(format!(
                            "*{}.get_mut(&{}).unwrap() {} {};",
                            receiver, key, op, value
                        ));
                        return;
                    }
                }
                let Ok(target) = self.emit_expression_raw(&s.target) else {
                    return;
                };
                match operators::augmented(s.operator) {
                    Some(op) => writer.line(format!("{} {} {};", target, op, value)),
                    None => {
                        let Ok(full) = self.emit_binary_text(
                            &target,
                            s.operator,
                            &value,
                            s.target.ty(),
                            s.location,
                        ) else {
                            return;
                        };
                        writer.line(format!("{} = {};", target, full));
                    }
                }
            }
            Statement::Expression(s) => {
                if let Ok(text) = self.emit_expression(&s.expression) {
                    writer.line(format!("{};", text));
                }
            }
            Statement::Return(s) => match &s.value {
                Some(value) => {
                    if let Ok(text) = self.emit_return_value(value) {
                        writer.line(format!("return {};", text));
                    }
                }
                None => writer.line("return;"),
            },
            Statement::If(s) => {
                for (index, arm) in s.arms.iter().enumerate() {
                    let Ok(condition) = self.emit_expression(&arm.condition) else {
                        return;
                    };
                    let keyword = if index == 0 { "if" } else { "} else if" };
                    writer.line(format!("{} {} {{", keyword, condition));
                    writer.indent();
                    for stmt in &arm.body {
                        self.emit_statement(writer, stmt, declared);
                    }
                    writer.dedent();
                }
                if !s.else_body.is_empty() {
                    writer.line("} else {");
                    writer.indent();
                    for stmt in &s.else_body {
                        self.emit_statement(writer, stmt, declared);
                    }
                    writer.dedent();
                }
                writer.line("}");
            }
            Statement::While(s) => {
                let Ok(condition) = self.emit_expression(&s.condition) else {
                    return;
                };
                writer.line(format!("while {} {{", condition));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt, declared);
                }
                writer.dedent();
                writer.line("}");
            }
            Statement::For(s) => self.emit_for(writer, s, declared),
            Statement::Break(_) => writer.line("break;"),
            Statement::Continue(_) => writer.line("continue;"),
            Statement::Pass(_) => {}
            Statement::Assert(s) => {
                let Ok(condition) = self.emit_expression(&s.condition) else {
                    return;
                };
                match &s.message {
                    Some(Expression::Literal(lit)) => {
                        if let LiteralValue::Str(text) = &lit.value {
                            writer.line(format!(
                                "assert!({}, \"{}\");",
                                condition,
                                escape_c_string(text)
                            ));
                            return;
                        }
                        writer.line(format!("assert!({});", condition));
                    }
                    _ => writer.line(format!("assert!({});", condition)),
                }
            }
            Statement::Import(_) => {}
            other => {
                let _ = self.fail(
                    "statement form cannot be emitted for Rust".to_string(),
                    other.location(),
                );
            }
        }
    }

    fn emit_assign(
        &mut self,
        writer: &mut CodeWriter,
        s: &AssignStmt,
        declared: &mut HashSet<String>,
    ) {
        // dict subscript stores insert
        if let Expression::Subscript(sub) = &s.target {
            if let Type::Dict(_, _) = sub.receiver.ty() {
                let Ok(receiver) = self.emit_expression_raw(&sub.receiver) else {
                    return;
                };
                let Ok(key) = self.emit_expression(&sub.index) else {
                    return;
                };
                let Ok(value) = self.emit_expression(&s.value) else {
                    return;
                };
                writer.line(format!("{}.insert({}, {});", receiver, key, value));
                return;
            }
        }

        let Ok(value) = self.emit_expression(&s.value) else {
            return;
        };
        if let Some(name) = s.target.as_name() {
            if declared.contains(name) {
                writer.line(format!("{} = {};", name, value));
            } else {
                declared.insert(name.to_string());
                match &s.annotation {
                    Some(_) => {
                        let Ok(type_name) = self.type_name(&s.ty, s.location) else {
                            return;
                        };
                        writer.line(format!("let mut {}: {} = {};", name, type_name, value));
                    }
                    None => writer.line(format!("let mut {} = {};", name, value)),
                }
            }
            return;
        }
        if let Ok(target) = self.emit_expression_raw(&s.target) {
            writer.line(format!("{} = {};", target, value));
        }
    }

    fn emit_for(&mut self, writer: &mut CodeWriter, s: &ForStmt, declared: &mut HashSet<String>) {
        let header = if let Expression::Call(call) = &s.iterable {
            if call.function == "range" {
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    let Ok(text) = self.emit_expression(argument) else {
                        return;
                    };
                    parts.push(text);
                }
                let text = match parts.len() {
                    1 => format!("0..{}", parts[0]),
                    2 => format!("{}..{}", parts[0], parts[1]),
                    _ => format!(
                        "({}..{}).step_by(({}) as usize)",
                        parts[0], parts[1], parts[2]
                    ),
                };
                Some(format!("for {} in {} {{", s.targets[0], text))
            } else {
                None
            }
        } else {
            None
        };

        let header = match header {
            Some(header) => header,
            None => {
                // containers iterate a clone so the body can mutate the
                // original binding's siblings freely
                if let Expression::MethodCall(call) = &s.iterable {
                    if call.method == "items" && s.targets.len() == 2 {
                        let Ok(source) = self.emit_expression_raw(&call.receiver) else {
                            return;
                        };
                        let header = format!(
                            "for ({}, {}) in {}.clone() {{",
                            s.targets[0], s.targets[1], source
                        );
                        self.emit_loop(writer, &header, &s.body, declared);
                        return;
                    }
                }
                let Ok(source) = self.emit_expression_raw(&s.iterable) else {
                    return;
                };
                match s.iterable.ty() {
                    Type::Dict(_, _) => {
                        format!("for {} in {}.clone().into_keys() {{", s.targets[0], source)
                    }
                    Type::List(_) | Type::Set(_) => {
                        format!("for {} in {}.clone() {{", s.targets[0], source)
                    }
                    Type::Scalar(ScalarType::Str) => {
                        format!("for {} in {}.chars() {{", s.targets[0], source)
                    }
                    other => {
                        let _ = self.fail(
                            format!("cannot iterate a value of type {}", other),
                            s.location,
                        );
                        return;
                    }
                }
            }
        };
        self.emit_loop(writer, &header, &s.body, declared);
    }

    fn emit_loop(
        &mut self,
        writer: &mut CodeWriter,
        header: &str,
        body: &[Statement],
        declared: &mut HashSet<String>,
    ) {
        writer.line(header);
        writer.indent();
        for stmt in body {
            self.emit_statement(writer, stmt, declared);
        }
        writer.dedent();
        writer.line("}");
    }

    // ---- expressions ----

    /// A returned owned name moves out; everything else goes through the
    /// cloning path
    fn emit_return_value(&mut self, value: &Expression) -> EmitExpr {
        if let Expression::Name(name) = value {
            if self.receiver.as_deref() != Some(name.name.as_str()) {
                return Ok(name.name.clone());
            }
        }
        self.emit_expression(value)
    }

    /// Emits an expression as a value, cloning owned names because a
    /// later use may need them
    fn emit_expression(&mut self, expr: &Expression) -> EmitExpr {
        let text = self.emit_expression_raw(expr)?;
        if let Expression::Name(_) | Expression::Attribute(_) = expr {
            if self.is_owned(expr.ty()) {
                return Ok(format!("{}.clone()", text));
            }
        }
        Ok(text)
    }

    fn emit_expression_raw(&mut self, expr: &Expression) -> EmitExpr {
        match expr {
            Expression::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Int(v) => v.to_string(),
                LiteralValue::Float(v) => format_float(*v),
                LiteralValue::Bool(v) => if *v { "true" } else { "false" }.to_string(),
                LiteralValue::Str(v) => {
                    format!("\"{}\".to_string()", escape_c_string(v))
                }
                LiteralValue::None => "()".to_string(),
            }),
            Expression::Name(name) => {
                if self.receiver.as_deref() == Some(name.name.as_str()) {
                    Ok("self".to_string())
                } else {
                    Ok(name.name.clone())
                }
            }
            Expression::Binary(e) => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                self.emit_binary_text(&left, e.operator, &right, e.left.ty(), e.location)
            }
            Expression::Unary(e) => {
                let operand = self.emit_expression(&e.operand)?;
                Ok(format!("{}({})", operators::unary(e.operator), operand))
            }
            Expression::Comparison(e) => self.emit_comparison(e),
            Expression::Bool(e) => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                Ok(format!(
                    "({} {} {})",
                    left,
                    operators::bool_op(e.operator),
                    right
                ))
            }
            Expression::Call(e) => self.emit_call(e),
            Expression::MethodCall(e) => self.emit_method_call(e),
            Expression::Attribute(e) => {
                let base = self.emit_expression_raw(&e.receiver)?;
                Ok(format!("{}.{}", base, e.attribute))
            }
            Expression::Subscript(e) => {
                let base = self.emit_expression_raw(&e.receiver)?;
                let index = self.emit_expression(&e.index)?;
                match e.receiver.ty() {
                    Type::List(element) => {
                        let access = format!("{}[({}) as usize]", base, index);
                        if self.is_owned(element) {
                            Ok(format!("{}.clone()", access))
                        } else {
                            Ok(access)
                        }
                    }
                    Type::Dict(_, value) => {
                        let access = format!("{}[&{}]", base, index);
                        if self.is_owned(value) {
                            Ok(format!("{}.clone()", access))
                        } else {
                            Ok(access)
                        }
                    }
                    Type::Tuple(_) => Ok(format!("{}.{}", base, index)),
                    other => self.fail(
                        format!("cannot subscript {} in the Rust backend", other),
                        e.location,
                    ),
                }
            }
            Expression::Slice(e) => {
                let base = self.emit_expression_raw(&e.receiver)?;
                let lower = match &e.lower {
                    Some(lower) => format!("({}) as usize", self.emit_expression(lower)?),
                    None => "0".to_string(),
                };
                let upper = match &e.upper {
                    Some(upper) => format!("({}) as usize", self.emit_expression(upper)?),
                    None => format!("{}.len()", base),
                };
                Ok(format!("{}[{}..{}].to_vec()", base, lower, upper))
            }
            Expression::ListLiteral(e) => {
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element)?);
                }
                Ok(format!("vec![{}]", elements.join(", ")))
            }
            Expression::SetLiteral(e) => {
                self.needs_hashset = true;
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element)?);
                }
                Ok(format!(
                    "HashSet::from([{}])",
                    elements.join(", ")
                ))
            }
            Expression::DictLiteral(e) => {
                self.needs_hashmap = true;
                if e.entries.is_empty() {
                    return Ok("HashMap::new()".to_string());
                }
                let mut entries = Vec::new();
                for (key, value) in &e.entries {
                    let key = self.emit_expression(key)?;
                    let value = self.emit_expression(value)?;
                    entries.push(format!("({}, {})", key, value));
                }
                Ok(format!("HashMap::from([{}])", entries.join(", ")))
            }
            Expression::TupleLiteral(e) => {
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element)?);
                }
                Ok(format!("({})", elements.join(", ")))
            }
            Expression::Comprehension(e) => self.emit_comprehension(e),
            Expression::FormattedString(e) => {
                let mut fmt = String::new();
                let mut args = Vec::new();
                for part in &e.parts {
                    match part {
                        FStringPart::Text(text) => {
                            fmt.push_str(&escape_c_string(text).replace('{', "{{").replace('}', "}}"))
                        }
                        FStringPart::Expr(inner) => {
                            fmt.push_str("{}");
                            args.push(self.emit_expression(inner)?);
                        }
                    }
                }
                if args.is_empty() {
                    Ok(format!("\"{}\".to_string()", fmt))
                } else {
                    Ok(format!("format!(\"{}\", {})", fmt, args.join(", ")))
                }
            }
            Expression::Conditional(e) => {
                let condition = self.emit_expression(&e.condition)?;
                let then_value = self.emit_expression(&e.then_value)?;
                let else_value = self.emit_expression(&e.else_value)?;
                Ok(format!(
                    "(if {} {{ {} }} else {{ {} }})",
                    condition, then_value, else_value
                ))
            }
            other => self.fail(
                "expression form cannot be emitted for Rust".to_string(),
                other.location(),
            ),
        }
    }

    fn emit_binary_text(
        &mut self,
        left: &str,
        operator: BinaryOperator,
        right: &str,
        left_ty: &Type,
        location: SourceLocation,
    ) -> EmitExpr {
        match operator {
            BinaryOperator::Pow => {
                if left_ty == &Type::float() {
                    Ok(format!("({}).powf({})", left, right))
                } else {
                    Ok(format!("({}).pow(({}) as u32)", left, right))
                }
            }
            BinaryOperator::FloorDiv => Ok(format!("({}).div_euclid({})", left, right)),
            BinaryOperator::Mod if left_ty == &Type::int() => {
                Ok(format!("({}).rem_euclid({})", left, right))
            }
            BinaryOperator::Div if left_ty == &Type::int() => {
                Ok(format!("(({}) as f64 / ({}) as f64)", left, right))
            }
            BinaryOperator::Add if left_ty == &Type::str() => {
                Ok(format!("format!(\"{{}}{{}}\", {}, {})", left, right))
            }
            other => match operators::binary(other) {
                Some(op) => Ok(format!("({} {} {})", left, op, right)),
                None => self.fail(format!("operator '{}' has no Rust form", other), location),
            },
        }
    }

    fn emit_comparison(&mut self, e: &mgen_ir::ast::ComparisonExpr) -> EmitExpr {
        use ComparisonOperator::*;
        match e.operator {
            In | NotIn => {
                let negate = e.operator == NotIn;
                let value = self.emit_expression_raw(&e.left)?;
                let container = self.emit_expression_raw(&e.right)?;
                let text = match e.right.ty() {
                    Type::Dict(_, _) => format!("{}.contains_key(&{})", container, value),
                    Type::Set(_) | Type::List(_) => {
                        format!("{}.contains(&{})", container, value)
                    }
                    Type::Scalar(ScalarType::Str) => {
                        format!("{}.contains(&{})", container, value)
                    }
                    other => {
                        return self.fail(
                            format!("'in' is not supported on {} in the Rust backend", other),
                            e.location,
                        );
                    }
                };
                Ok(if negate { format!("!{}", text) } else { text })
            }
            other => {
                let left = self.emit_expression_raw(&e.left)?;
                let right = self.emit_expression_raw(&e.right)?;
                match operators::comparison(other) {
                    Some(op) => Ok(format!("({} {} {})", left, op, right)),
                    None => self.fail(
                        format!("comparison '{}' has no Rust form", other),
                        e.location,
                    ),
                }
            }
        }
    }

    /// Comprehensions are iterator chains ending in a collect
    fn emit_comprehension(&mut self, e: &ComprehensionExpr) -> EmitExpr {
        let source = if let Expression::Call(call) = &*e.iterable {
            if call.function == "range" {
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    parts.push(self.emit_expression(argument)?);
                }
                match parts.len() {
                    1 => format!("(0..{})", parts[0]),
                    2 => format!("({}..{})", parts[0], parts[1]),
                    _ => format!(
                        "({}..{}).step_by(({}) as usize)",
                        parts[0], parts[1], parts[2]
                    ),
                }
            } else {
                format!("{}.clone().into_iter()", self.emit_expression_raw(&e.iterable)?)
            }
        } else {
            format!("{}.clone().into_iter()", self.emit_expression_raw(&e.iterable)?)
        };

        let mut chain = source;
        if let Some(condition) = &e.condition {
            let condition = self.emit_expression(condition)?;
            chain = format!("{}.filter(|&{}| {})", chain, e.variable, condition);
        }
        let element = self.emit_expression(&e.element)?;
        match e.kind {
            ComprehensionKind::List => {
                let collect = self.type_name(&e.ty, e.location)?;
                Ok(format!(
                    "{}.map(|{}| {}).collect::<{}>()",
                    chain, e.variable, element, collect
                ))
            }
            ComprehensionKind::Set => {
                self.needs_hashset = true;
                let collect = self.type_name(&e.ty, e.location)?;
                Ok(format!(
                    "{}.map(|{}| {}).collect::<{}>()",
                    chain, e.variable, element, collect
                ))
            }
            ComprehensionKind::Dict => {
                self.needs_hashmap = true;
                let value = match &e.value {
                    Some(value) => self.emit_expression(value)?,
                    None => return Err(()),
                };
                let collect = self.type_name(&e.ty, e.location)?;
                Ok(format!(
                    "{}.map(|{}| ({}, {})).collect::<{}>()",
                    chain, e.variable, element, value, collect
                ))
            }
            ComprehensionKind::Generator => self.fail(
                "generator expressions cannot be emitted".to_string(),
                e.location,
            ),
        }
    }

    fn emit_call(&mut self, e: &mgen_ir::ast::CallExpr) -> EmitExpr {
        match e.function.as_str() {
            "print" => {
                let Some(argument) = e.arguments.first() else {
                    return Ok("println!()".to_string());
                };
                let text = self.emit_expression_raw(argument)?;
                Ok(format!("println!(\"{{}}\", {})", text))
            }
            "len" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("len() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression_raw(argument)?;
                Ok(format!("{}.len() as i64", text))
            }
            "str" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("str() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression_raw(argument)?;
                Ok(format!("{}.to_string()", text))
            }
            "abs" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("abs() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("({}).abs()", text))
            }
            "int" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("int() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("(({}) as i64)", text))
            }
            "float" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("float() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("(({}) as f64)", text))
            }
            "sum" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("sum() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression_raw(argument)?;
                Ok(format!("{}.iter().sum::<i64>()", text))
            }
            "min" | "max" if e.arguments.len() == 1 => {
                let text = self.emit_expression_raw(&e.arguments[0])?;
                let method = if e.function == "min" { "min" } else { "max" };
                Ok(format!(
                    "*{}.iter().{}().unwrap()",
                    text, method
                ))
            }
            "bool" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("bool() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("(({}) != 0)", text))
            }
            "range" => self.fail(
                "range() is only usable as a loop iterable".to_string(),
                e.location,
            ),
            name => {
                if crate::is_builtin(name) {
                    return self.fail(
                        format!("builtin '{}' has no Rust lowering", name),
                        e.location,
                    );
                }
                let mut arguments = Vec::new();
                for argument in &e.arguments {
                    arguments.push(self.emit_expression(argument)?);
                }
                if self.context.record(name).is_some() {
                    return Ok(format!("{}::new({})", name, arguments.join(", ")));
                }
                let callee = if name == "main" { "mgen_main" } else { name };
                Ok(format!("{}({})", callee, arguments.join(", ")))
            }
        }
    }

    fn emit_method_call(&mut self, e: &MethodCallExpr) -> EmitExpr {
        let base = self.emit_expression_raw(&e.receiver)?;
        let receiver_ty = e.receiver.ty().clone();
        let mut arguments = Vec::new();
        for argument in &e.arguments {
            arguments.push(self.emit_expression(argument)?);
        }

        match &receiver_ty {
            Type::Record(record_name) => {
                // static methods call through the type, not the value
                let is_static = self
                    .context
                    .record(record_name)
                    .and_then(|record| record.method(&e.method))
                    .map(|method| method.is_static)
                    .unwrap_or(false);
                if is_static {
                    Ok(format!(
                        "{}::{}({})",
                        record_name,
                        e.method,
                        arguments.join(", ")
                    ))
                } else {
                    Ok(format!("{}.{}({})", base, e.method, arguments.join(", ")))
                }
            }
            Type::List(_) => match e.method.as_str() {
                "append" => Ok(format!("{}.push({})", base, arguments.join(", "))),
                "pop" if arguments.is_empty() => Ok(format!("{}.pop().unwrap()", base)),
                "insert" => Ok(format!(
                    "{}.insert(({}) as usize, {})",
                    base, arguments[0], arguments[1]
                )),
                "clear" => Ok(format!("{}.clear()", base)),
                "sort" => Ok(format!("{}.sort()", base)),
                other => self.fail(
                    format!("list method '{}' has no Rust lowering", other),
                    e.location,
                ),
            },
            Type::Set(_) => match e.method.as_str() {
                "add" => Ok(format!("{}.insert({})", base, arguments.join(", "))),
                "discard" | "remove" => Ok(format!("{}.remove(&{})", base, arguments[0])),
                "clear" => Ok(format!("{}.clear()", base)),
                other => self.fail(
                    format!("set method '{}' has no Rust lowering", other),
                    e.location,
                ),
            },
            Type::Dict(_, _) => match e.method.as_str() {
                "get" if arguments.len() == 2 => Ok(format!(
                    "{}.get(&{}).cloned().unwrap_or({})",
                    base, arguments[0], arguments[1]
                )),
                "clear" => Ok(format!("{}.clear()", base)),
                other => self.fail(
                    format!("dict method '{}' has no Rust lowering", other),
                    e.location,
                ),
            },
            Type::Scalar(ScalarType::Str) => match e.method.as_str() {
                "split" if arguments.is_empty() => Ok(format!(
                    "{}.split_whitespace().map(|w| w.to_string()).collect::<Vec<String>>()",
                    base
                )),
                "join" => Ok(format!("{}.join(&{})", arguments[0], base)),
                "upper" => Ok(format!("{}.to_uppercase()", base)),
                "lower" => Ok(format!("{}.to_lowercase()", base)),
                "strip" if arguments.is_empty() => Ok(format!("{}.trim().to_string()", base)),
                "find" => Ok(format!(
                    "{}.find(&{}).map(|i| i as i64).unwrap_or(-1)",
                    base, arguments[0]
                )),
                "startswith" => Ok(format!("{}.starts_with(&{})", base, arguments[0])),
                "endswith" => Ok(format!("{}.ends_with(&{})", base, arguments[0])),
                "replace" => Ok(format!(
                    "{}.replace(&{}, &{})",
                    base, arguments[0], arguments[1]
                )),
                other => self.fail(
                    format!("string method '{}' has no Rust lowering", other),
                    e.location,
                ),
            },
            other => self.fail(
                format!("cannot call a method on {} in the Rust backend", other),
                e.location,
            ),
        }
    }
}

/// Negated-comparison rewrites for the target-optimization phase
fn rewrite_statement(stmt: &mut Statement, rewrites: &mut usize) {
    match stmt {
        Statement::Assign(s) => {
            rewrite_expression(&mut s.value, rewrites);
        }
        Statement::AugAssign(s) => rewrite_expression(&mut s.value, rewrites),
        Statement::Expression(s) => rewrite_expression(&mut s.expression, rewrites),
        Statement::Return(s) => {
            if let Some(value) = &mut s.value {
                rewrite_expression(value, rewrites);
            }
        }
        Statement::If(s) => {
            for arm in &mut s.arms {
                rewrite_expression(&mut arm.condition, rewrites);
                for stmt in &mut arm.body {
                    rewrite_statement(stmt, rewrites);
                }
            }
            for stmt in &mut s.else_body {
                rewrite_statement(stmt, rewrites);
            }
        }
        Statement::While(s) => {
            rewrite_expression(&mut s.condition, rewrites);
            for stmt in &mut s.body {
                rewrite_statement(stmt, rewrites);
            }
        }
        Statement::For(s) => {
            rewrite_expression(&mut s.iterable, rewrites);
            for stmt in &mut s.body {
                rewrite_statement(stmt, rewrites);
            }
        }
        Statement::FunctionDef(def) => {
            for stmt in &mut def.body {
                rewrite_statement(stmt, rewrites);
            }
        }
        Statement::ClassDef(def) => {
            for stmt in &mut def.body {
                rewrite_statement(stmt, rewrites);
            }
        }
        Statement::Assert(s) => rewrite_expression(&mut s.condition, rewrites),
        _ => {}
    }
}

fn rewrite_expression(expr: &mut Expression, rewrites: &mut usize) {
    if let Expression::Unary(unary) = expr {
        if unary.operator == mgen_ir::ast::UnaryOperator::Not {
            // not (a == b) -> a != b
            if let Expression::Comparison(inner) = unary.operand.as_mut() {
                let negated = match inner.operator {
                    ComparisonOperator::Eq => Some(ComparisonOperator::NotEq),
                    ComparisonOperator::NotEq => Some(ComparisonOperator::Eq),
                    ComparisonOperator::Lt => Some(ComparisonOperator::GtEq),
                    ComparisonOperator::GtEq => Some(ComparisonOperator::Lt),
                    ComparisonOperator::Gt => Some(ComparisonOperator::LtEq),
                    ComparisonOperator::LtEq => Some(ComparisonOperator::Gt),
                    _ => None,
                };
                if let Some(operator) = negated {
                    inner.operator = operator;
                    *rewrites += 1;
                    let inner = std::mem::replace(
                        unary.operand.as_mut(),
                        Expression::Literal(mgen_ir::ast::LiteralExpr {
                            value: LiteralValue::None,
                            ty: Type::Unknown,
                            location: unary.location,
                        }),
                    );
                    *expr = inner;
                    rewrite_expression(expr, rewrites);
                    return;
                }
            }
            // not (not x) -> x
            if let Expression::Unary(inner) = unary.operand.as_mut() {
                if inner.operator == mgen_ir::ast::UnaryOperator::Not {
                    let grand = std::mem::replace(
                        inner.operand.as_mut(),
                        Expression::Literal(mgen_ir::ast::LiteralExpr {
                            value: LiteralValue::None,
                            ty: Type::Unknown,
                            location: inner.location,
                        }),
                    );
                    *expr = grand;
                    *rewrites += 1;
                    rewrite_expression(expr, rewrites);
                    return;
                }
            }
        }
    }
    match expr {
        Expression::Binary(e) => {
            rewrite_expression(&mut e.left, rewrites);
            rewrite_expression(&mut e.right, rewrites);
        }
        Expression::Unary(e) => rewrite_expression(&mut e.operand, rewrites),
        Expression::Comparison(e) => {
            rewrite_expression(&mut e.left, rewrites);
            rewrite_expression(&mut e.right, rewrites);
        }
        Expression::Bool(e) => {
            rewrite_expression(&mut e.left, rewrites);
            rewrite_expression(&mut e.right, rewrites);
        }
        Expression::Call(e) => {
            for argument in &mut e.arguments {
                rewrite_expression(argument, rewrites);
            }
        }
        Expression::MethodCall(e) => {
            rewrite_expression(&mut e.receiver, rewrites);
            for argument in &mut e.arguments {
                rewrite_expression(argument, rewrites);
            }
        }
        Expression::Conditional(e) => {
            rewrite_expression(&mut e.then_value, rewrites);
            rewrite_expression(&mut e.condition, rewrites);
            rewrite_expression(&mut e.else_value, rewrites);
        }
        _ => {}
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
