//! OCaml backend
//!
//! Functional with explicit mutation: bindings the source reassigns
//! become `ref` cells, single-assignment bindings stay immutable lets.
//! Records use OCaml record syntax with mutable fields when a method
//! mutates the receiver; dictionaries and sets are Hashtbl-backed.
//! Statement sequences emit in continuation style, so early returns turn
//! into if/else expressions.

use crate::Backend;
use crate::emitter::escape_c_string;
use crate::operators;
use crate::preferences::{PrefSpec, Preferences};
use mgen_error::{Diagnostic, ErrorCode};
use mgen_ir::SourceLocation;
use mgen_ir::ast::{
    BinaryOperator, BoolOperator, ComparisonOperator, ComprehensionKind, Expression, FStringPart,
    FunctionDef, LiteralValue, MethodCallExpr, Module, RecordDescriptor, Statement,
    UnaryOperator,
};
use mgen_ir::query::{self, main_guard_body};
use mgen_shared::CompilationContext;
use mgen_types::{ScalarType, Target, TargetTypeRegistry, Type};
use std::collections::HashSet;

/// Preferences understood by the OCaml backend
pub const SCHEMA: &[PrefSpec] = &[
    PrefSpec::bool(
        "prefer_immutable",
        true,
        "use plain lets wherever the source never reassigns",
    ),
    PrefSpec::bool(
        "use_pattern_matching",
        true,
        "use match expressions where the subset allows",
    ),
    PrefSpec::int("indent_size", 2, "spaces per indentation level"),
];

pub fn factory(prefs: Preferences) -> Box<dyn Backend> {
    Box::new(OCamlBackend { prefs })
}

pub struct OCamlBackend {
    prefs: Preferences,
}

type EmitExpr = Result<String, ()>;

impl Backend for OCamlBackend {
    fn name(&self) -> &'static str {
        "ocaml"
    }

    fn file_extension(&self) -> &'static str {
        "ml"
    }

    fn map_type(&self, ty: &Type, context: &CompilationContext) -> Option<String> {
        let registry = registry_for(context);
        registry.descriptor(ty).map(|d| d.target_name)
    }

    fn map_builtin(&self, name: &str) -> Option<&'static str> {
        match name {
            "print" => Some("Printf.printf"),
            "len" => Some("List.length"),
            "str" => Some("string_of_int"),
            "abs" => Some("abs"),
            _ => None,
        }
    }

    fn emit(
        &mut self,
        module: &Module,
        context: &CompilationContext,
    ) -> Result<String, Vec<Diagnostic>> {
        let registry = registry_for(context);
        let prefer_immutable = self.prefs.get_bool("prefer_immutable");
        let mut emitter = OCamlEmitter {
            context,
            registry: &registry,
            diagnostics: Vec::new(),
            prefer_immutable,
            refs: HashSet::new(),
            receiver: None,
            needs_range: false,
            needs_floordiv: false,
            needs_ipow: false,
            needs_split: false,
        };
        emitter.emit_module(module)
    }

    fn build_descriptor(&self, module_name: &str) -> Option<(String, String)> {
        Some((
            "dune".to_string(),
            format!("(executable\n (name {}))\n", module_name),
        ))
    }
}

fn registry_for(context: &CompilationContext) -> TargetTypeRegistry {
    let mut registry = TargetTypeRegistry::new(Target::OCaml);
    for record in context.records() {
        registry.register_record(&record.name);
    }
    registry
}

struct OCamlEmitter<'a> {
    context: &'a CompilationContext,
    registry: &'a TargetTypeRegistry,
    diagnostics: Vec<Diagnostic>,
    prefer_immutable: bool,
    /// Names realized as `ref` cells in the current function
    refs: HashSet<String>,
    receiver: Option<String>,
    needs_range: bool,
    needs_floordiv: bool,
    needs_ipow: bool,
    needs_split: bool,
}

impl<'a> OCamlEmitter<'a> {
    fn fail(&mut self, message: String, location: SourceLocation) -> EmitExpr {
        self.diagnostics
            .push(Diagnostic::error(ErrorCode::CodegenFailure, message, location));
        Err(())
    }

    fn type_name(&mut self, ty: &Type, location: SourceLocation) -> EmitExpr {
        match self.registry.descriptor(ty) {
            Some(descriptor) => Ok(descriptor.target_name),
            None => self.fail(format!("type {} has no OCaml mapping", ty), location),
        }
    }

    fn emit_module(&mut self, module: &Module) -> Result<String, Vec<Diagnostic>> {
        let mut types_text = String::new();
        for item in &module.items {
            if let Statement::ClassDef(class_def) = item {
                if let Some(record) = self.context.record(&class_def.name).cloned() {
                    match self.emit_record(&record, class_def.location) {
                        Ok(text) => types_text.push_str(&text),
                        Err(()) => {}
                    }
                }
            }
        }

        // all functions in one recursive group so call order is free
        let mut functions = Vec::new();
        for item in &module.items {
            match item {
                Statement::FunctionDef(def) => {
                    if let Ok(text) = self.emit_function(def, None) {
                        functions.push(text);
                    }
                }
                Statement::ClassDef(class_def) => {
                    let record = self.context.record(&class_def.name).cloned();
                    if let Some(record) = record {
                        for stmt in &class_def.body {
                            if let Statement::FunctionDef(def) = stmt {
                                if def.name != "__init__" {
                                    if let Ok(text) = self.emit_function(def, Some(&record)) {
                                        functions.push(text);
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let entry = self.emit_entry_point(module);

        if !self.diagnostics.is_empty() {
            return Err(std::mem::take(&mut self.diagnostics));
        }

        let mut out = String::new();
        out.push_str("let __name__ = \"__main__\"\n\n");
        out.push_str(&self.runtime());
        out.push_str(&types_text);
        if !functions.is_empty() {
            out.push_str("let rec ");
            out.push_str(&functions.join("\nand "));
            out.push('\n');
        }
        out.push_str(&entry.unwrap_or_default());
        Ok(out)
    }

    fn runtime(&self) -> String {
        let mut out = String::new();
        if self.needs_range {
            out.push_str(
                "let rec mgen_range start stop =\n  if start >= stop then [] else start :: mgen_range (start + 1) stop\n\n",
            );
        }
        if self.needs_floordiv {
            out.push_str(
                "let mgen_floordiv a b =\n  let q = a / b in\n  if a mod b <> 0 && (a < 0) <> (b < 0) then q - 1 else q\n\nlet mgen_mod a b =\n  let r = a mod b in\n  if r <> 0 && (r < 0) <> (b < 0) then r + b else r\n\n",
            );
        }
        if self.needs_ipow {
            out.push_str(
                "let rec mgen_ipow base exp =\n  if exp <= 0 then 1 else base * mgen_ipow base (exp - 1)\n\n",
            );
        }
        if self.needs_split {
            out.push_str(
                "let mgen_split s =\n  String.split_on_char ' ' s |> List.filter (fun w -> String.length w > 0)\n\n",
            );
        }
        out
    }

    // ---- records ----

    fn emit_record(
        &mut self,
        record: &RecordDescriptor,
        location: SourceLocation,
    ) -> Result<String, ()> {
        let any_mutation = record.methods.iter().any(|m| m.mutates_receiver);
        let type_name = record.name.to_lowercase();
        let mut out = format!("type {} = {{\n", type_name);
        for (field, ty) in &record.fields {
            let field_type = self.type_name(ty, location)?;
            let qualifier = if any_mutation { "mutable " } else { "" };
            out.push_str(&format!("  {}{} : {};\n", qualifier, field, field_type));
        }
        out.push_str("}\n\n");

        // constructor
        let params: Vec<&str> = record.fields.iter().map(|(f, _)| f.as_str()).collect();
        out.push_str(&format!(
            "let make_{} {} = {{ {} }}\n\n",
            type_name,
            if params.is_empty() {
                "()".to_string()
            } else {
                params.join(" ")
            },
            params.join("; ")
        ));
        Ok(out)
    }

    // ---- functions ----

    /// One `let rec` group member: `name (params) : ret = body`
    fn emit_function(
        &mut self,
        def: &FunctionDef,
        record: Option<&RecordDescriptor>,
    ) -> Result<String, ()> {
        self.collect_refs(def);
        // a @staticmethod has no receiver: every parameter keeps its own
        // annotation
        let is_static = record
            .and_then(|r| r.method(&def.name))
            .map(|method| method.is_static)
            .unwrap_or_else(|| def.decorators.iter().any(|d| d == "staticmethod"));
        let has_receiver = record.is_some() && !is_static;
        self.receiver = if has_receiver {
            def.parameters.first().map(|p| p.name.clone())
        } else {
            None
        };

        let name = match record {
            Some(record) => format!("{}_{}", record.name.to_lowercase(), def.name),
            None => def.name.clone(),
        };

        let mut params = Vec::new();
        for (index, param) in def.parameters.iter().enumerate() {
            if index == 0 && has_receiver {
                params.push(format!(
                    "({} : {})",
                    param.name,
                    record.map(|r| r.name.to_lowercase()).unwrap_or_default()
                ));
                continue;
            }
            let type_name = self.type_name(&param.ty, param.location)?;
            params.push(format!("({} : {})", param.name, type_name));
        }
        if params.is_empty() {
            params.push("()".to_string());
        }

        let return_type = self.type_name(&def.return_type, def.location)?;
        let body = self.emit_block(&def.body, 1, &mut HashSet::new())?;
        self.receiver = None;
        self.refs.clear();

        Ok(format!(
            "{} {} : {} =\n  {}\n",
            name,
            params.join(" "),
            return_type,
            body
        ))
    }

    /// Names that must become ref cells: reassigned, augmented, or grown
    /// through container mutators
    fn collect_refs(&mut self, def: &FunctionDef) {
        self.refs.clear();
        let mut assigned: Vec<String> = Vec::new();
        let mut mutated: HashSet<String> = HashSet::new();
        query::walk_statements(&def.body, &mut |stmt| match stmt {
            Statement::Assign(s) => {
                if let Some(name) = s.target.as_name() {
                    if assigned.iter().any(|n| n == name) {
                        mutated.insert(name.to_string());
                    } else {
                        assigned.push(name.to_string());
                    }
                }
            }
            Statement::AugAssign(s) => {
                if let Some(name) = s.target.as_name() {
                    mutated.insert(name.to_string());
                }
            }
            Statement::Expression(s) => {
                if let Expression::MethodCall(call) = &s.expression {
                    if query::is_list_mutator(&call.method) || query::is_set_mutator(&call.method)
                    {
                        if let Some(name) = call.receiver.as_name() {
                            mutated.insert(name.to_string());
                        }
                    }
                }
            }
            _ => {}
        });
        if !self.prefer_immutable {
            for name in &assigned {
                mutated.insert(name.clone());
            }
        }
        self.refs = mutated;
    }

    fn emit_entry_point(&mut self, module: &Module) -> Result<String, ()> {
        let main_def = query::function_defs(module).find(|def| def.name == "main");
        let mut guard_body: Option<&[Statement]> = None;
        let mut top_level: Vec<Statement> = Vec::new();
        for item in &module.items {
            match item {
                Statement::FunctionDef(_) | Statement::ClassDef(_) | Statement::Import(_) => {}
                other => {
                    if let Some(body) = main_guard_body(other) {
                        guard_body = Some(body);
                    } else {
                        top_level.push(other.clone());
                    }
                }
            }
        }

        if top_level.is_empty() && guard_body.is_none() && main_def.is_none() {
            return Ok(String::new());
        }

        let mut statements: Vec<Statement> = top_level;
        if let Some(body) = guard_body {
            statements.extend(body.iter().cloned());
        }

        // with no guard, run main directly; an int main sets the exit code
        let mut tail = String::new();
        if guard_body.is_none() {
            if let Some(def) = main_def {
                tail = if def.return_type == Type::int() {
                    "exit (main ())".to_string()
                } else {
                    "main ()".to_string()
                };
            }
        } else if let Some(def) = main_def {
            // a guard that just calls main() propagates the exit code
            if def.return_type == Type::int() && statements.len() == 1 {
                if let Statement::Expression(stmt) = &statements[0] {
                    if let Expression::Call(call) = &stmt.expression {
                        if call.function == "main" && call.arguments.is_empty() {
                            statements.clear();
                            tail = "exit (main ())".to_string();
                        }
                    }
                }
            }
        }

        // refs for the entry block
        let entry_def = FunctionDef {
            name: "__entry".to_string(),
            parameters: Vec::new(),
            return_type: Type::none(),
            body: statements,
            decorators: Vec::new(),
            location: SourceLocation::default(),
        };
        self.collect_refs(&entry_def);
        let mut body = if entry_def.body.is_empty() {
            String::new()
        } else {
            self.emit_unit_block(&entry_def.body, 1)?
        };
        self.refs.clear();

        if !tail.is_empty() {
            if body.is_empty() {
                body = tail;
            } else {
                body = format!("{};\n  {}", body.trim_end_matches(';'), tail);
            }
        }
        if body.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("\nlet () =\n  {}\n", body))
    }

    // ---- statement sequences ----

    /// Emits a statement list as one expression (continuation style)
    fn emit_block(
        &mut self,
        stmts: &[Statement],
        depth: usize,
        declared: &mut HashSet<String>,
    ) -> EmitExpr {
        let Some((first, rest)) = stmts.split_first() else {
            return Ok("()".to_string());
        };
        let pad = "  ".repeat(depth);

        match first {
            Statement::Return(s) => match &s.value {
                Some(value) => self.emit_expression(value),
                None => Ok("()".to_string()),
            },
            Statement::Assign(s) => {
                if let Some(name) = s.target.as_name().map(str::to_string) {
                    let value = self.emit_expression(&s.value)?;
                    let rest_text = if rest.is_empty() {
                        "()".to_string()
                    } else {
                        self.emit_block(rest, depth, declared)?
                    };
                    if declared.contains(&name) {
                        if self.refs.contains(&name) {
                            return Ok(format!("{} := {};\n{}{}", name, value, pad, rest_text));
                        }
                        // single-assignment names never reassign; shadow
                        return Ok(format!(
                            "let {} = {} in\n{}{}",
                            name, value, pad, rest_text
                        ));
                    }
                    declared.insert(name.clone());
                    if self.refs.contains(&name) {
                        return Ok(format!(
                            "let {} = ref ({}) in\n{}{}",
                            name, value, pad, rest_text
                        ));
                    }
                    return Ok(format!("let {} = {} in\n{}{}", name, value, pad, rest_text));
                }
                // attribute or dict-subscript store
                let store = self.emit_store(s)?;
                let rest_text = if rest.is_empty() {
                    "()".to_string()
                } else {
                    self.emit_block(rest, depth, declared)?
                };
                Ok(format!("{};\n{}{}", store, pad, rest_text))
            }
            Statement::AugAssign(s) => {
                let store = self.emit_aug_store(s)?;
                let rest_text = if rest.is_empty() {
                    "()".to_string()
                } else {
                    self.emit_block(rest, depth, declared)?
                };
                Ok(format!("{};\n{}{}", store, pad, rest_text))
            }
            Statement::If(s) => {
                if always_returns(first) {
                    // a fully-returning if is the final expression
                    return self.emit_if_expression(s, depth, declared);
                }
                // early-return arm: continue in the else branch
                if s.arms.len() == 1 && s.else_body.is_empty() && ends_in_return(&s.arms[0].body)
                {
                    let condition = self.emit_expression(&s.arms[0].condition)?;
                    let then_text =
                        self.emit_block(&s.arms[0].body, depth + 1, &mut declared.clone())?;
                    let rest_text = self.emit_block(rest, depth + 1, declared)?;
                    return Ok(format!(
                        "if {} then begin\n{}  {}\n{}end else begin\n{}  {}\n{}end",
                        condition,
                        pad,
                        then_text,
                        pad,
                        pad,
                        rest_text,
                        pad
                    ));
                }
                // side-effecting if
                let mut out = String::new();
                for (index, arm) in s.arms.iter().enumerate() {
                    let condition = self.emit_expression(&arm.condition)?;
                    let body = self.emit_unit_nested(&arm.body, depth + 1, declared)?;
                    if index == 0 {
                        out.push_str(&format!("(if {} then begin\n{}  {}\n{}end", condition, pad, body, pad));
                    } else {
                        out.push_str(&format!(
                            " else if {} then begin\n{}  {}\n{}end",
                            condition, pad, body, pad
                        ));
                    }
                }
                if !s.else_body.is_empty() {
                    let body = self.emit_unit_nested(&s.else_body, depth + 1, declared)?;
                    out.push_str(&format!(" else begin\n{}  {}\n{}end", pad, body, pad));
                }
                out.push(')');
                let rest_text = if rest.is_empty() {
                    "()".to_string()
                } else {
                    self.emit_block(rest, depth, declared)?
                };
                Ok(format!("{};\n{}{}", out, pad, rest_text))
            }
            Statement::While(s) => {
                let condition = self.emit_expression(&s.condition)?;
                let body = self.emit_unit_nested(&s.body, depth + 1, declared)?;
                let rest_text = if rest.is_empty() {
                    "()".to_string()
                } else {
                    self.emit_block(rest, depth, declared)?
                };
                Ok(format!(
                    "while {} do\n{}  {}\n{}done;\n{}{}",
                    condition, pad, body, pad, pad, rest_text
                ))
            }
            Statement::For(s) => {
                let loop_text = self.emit_for(s, depth, declared)?;
                let rest_text = if rest.is_empty() {
                    "()".to_string()
                } else {
                    self.emit_block(rest, depth, declared)?
                };
                Ok(format!("{};\n{}{}", loop_text, pad, rest_text))
            }
            Statement::Expression(s) => {
                let text = self.emit_statement_expression(&s.expression)?;
                let rest_text = if rest.is_empty() {
                    "()".to_string()
                } else {
                    self.emit_block(rest, depth, declared)?
                };
                Ok(format!("{};\n{}{}", text, pad, rest_text))
            }
            Statement::Assert(s) => {
                let condition = self.emit_expression(&s.condition)?;
                let rest_text = if rest.is_empty() {
                    "()".to_string()
                } else {
                    self.emit_block(rest, depth, declared)?
                };
                Ok(format!("assert ({});\n{}{}", condition, pad, rest_text))
            }
            Statement::Pass(_) => {
                if rest.is_empty() {
                    Ok("()".to_string())
                } else {
                    self.emit_block(rest, depth, declared)
                }
            }
            Statement::Import(_) => {
                if rest.is_empty() {
                    Ok("()".to_string())
                } else {
                    self.emit_block(rest, depth, declared)
                }
            }
            other => self.fail(
                "statement form cannot be emitted for OCaml".to_string(),
                other.location(),
            ),
        }
    }

    /// A unit-valued sequence (loop and branch bodies)
    fn emit_unit_block(&mut self, stmts: &[Statement], depth: usize) -> EmitExpr {
        self.emit_block(stmts, depth, &mut HashSet::new())
    }

    fn emit_unit_nested(
        &mut self,
        stmts: &[Statement],
        depth: usize,
        declared: &mut HashSet<String>,
    ) -> EmitExpr {
        self.emit_block(stmts, depth, &mut declared.clone())
    }

    fn emit_if_expression(
        &mut self,
        s: &mgen_ir::ast::IfStmt,
        depth: usize,
        declared: &mut HashSet<String>,
    ) -> EmitExpr {
        let pad = "  ".repeat(depth);
        let mut out = String::new();
        for (index, arm) in s.arms.iter().enumerate() {
            let condition = self.emit_expression(&arm.condition)?;
            let body = self.emit_block(&arm.body, depth + 1, &mut declared.clone())?;
            let keyword = if index == 0 { "if" } else { "else if" };
            out.push_str(&format!(
                "{} {} then begin\n{}  {}\n{}end ",
                keyword, condition, pad, body, pad
            ));
        }
        let else_body = self.emit_block(&s.else_body, depth + 1, &mut declared.clone())?;
        out.push_str(&format!("else begin\n{}  {}\n{}end", pad, else_body, pad));
        Ok(out)
    }

    fn emit_for(
        &mut self,
        s: &mgen_ir::ast::ForStmt,
        depth: usize,
        declared: &mut HashSet<String>,
    ) -> EmitExpr {
        let pad = "  ".repeat(depth);
        let mut body_declared = declared.clone();
        for target in &s.targets {
            body_declared.insert(target.clone());
        }

        if let Expression::Call(call) = &s.iterable {
            if call.function == "range" && call.arguments.len() <= 2 {
                let (start, stop) = match call.arguments.len() {
                    1 => ("0".to_string(), self.emit_expression(&call.arguments[0])?),
                    _ => (
                        self.emit_expression(&call.arguments[0])?,
                        self.emit_expression(&call.arguments[1])?,
                    ),
                };
                let body = self.emit_block(&s.body, depth + 1, &mut body_declared)?;
                return Ok(format!(
                    "for {} = {} to ({}) - 1 do\n{}  {}\n{}done",
                    s.targets[0], start, stop, pad, body, pad
                ));
            }
        }

        if let Expression::MethodCall(call) = &s.iterable {
            if call.method == "items" && s.targets.len() == 2 {
                let source = self.emit_expression(&call.receiver)?;
                let body = self.emit_block(&s.body, depth + 1, &mut body_declared)?;
                return Ok(format!(
                    "Hashtbl.iter (fun {} {} ->\n{}  {}) {}",
                    s.targets[0], s.targets[1], pad, body, source
                ));
            }
        }

        let source = self.emit_expression(&s.iterable)?;
        let body = self.emit_block(&s.body, depth + 1, &mut body_declared)?;
        match s.iterable.ty() {
            Type::List(_) => Ok(format!(
                "List.iter (fun {} ->\n{}  {}) {}",
                s.targets[0], pad, body, source
            )),
            Type::Dict(_, _) | Type::Set(_) => Ok(format!(
                "Hashtbl.iter (fun {} _ ->\n{}  {}) {}",
                s.targets[0], pad, body, source
            )),
            Type::Scalar(ScalarType::Str) => Ok(format!(
                "String.iter (fun {} ->\n{}  {}) {}",
                s.targets[0], pad, body, source
            )),
            other => self.fail(
                format!("cannot iterate a value of type {}", other),
                s.location,
            ),
        }
    }

    // ---- stores ----

    fn emit_store(&mut self, s: &mgen_ir::ast::AssignStmt) -> EmitExpr {
        match &s.target {
            Expression::Attribute(attr) => {
                let receiver = self.emit_expression(&attr.receiver)?;
                let value = self.emit_expression(&s.value)?;
                Ok(format!("{}.{} <- {}", receiver, attr.attribute, value))
            }
            Expression::Subscript(sub) => {
                if let Type::Dict(_, _) = sub.receiver.ty() {
                    let receiver = self.emit_expression(&sub.receiver)?;
                    let key = self.emit_expression(&sub.index)?;
                    let value = self.emit_expression(&s.value)?;
                    Ok(format!("Hashtbl.replace {} {} {}", receiver, key, value))
                } else {
                    self.fail(
                        "list element stores are not supported in the OCaml backend".to_string(),
                        s.location,
                    )
                }
            }
            other => self.fail(
                "unsupported assignment target".to_string(),
                other.location(),
            ),
        }
    }

    fn emit_aug_store(&mut self, s: &mgen_ir::ast::AugAssignStmt) -> EmitExpr {
        let value = self.emit_expression(&s.value)?;
        match &s.target {
            Expression::Name(name) => {
                let current = if self.refs.contains(&name.name) {
                    format!("!{}", name.name)
                } else {
                    return self.fail(
                        format!("augmented assignment to immutable '{}'", name.name),
                        s.location,
                    );
                };
                let combined =
                    self.binary_text(&current, s.operator, &value, s.target.ty(), s.location)?;
                Ok(format!("{} := {}", name.name, combined))
            }
            Expression::Attribute(attr) => {
                let receiver = self.emit_expression(&attr.receiver)?;
                let current = format!("{}.{}", receiver, attr.attribute);
                let combined =
                    self.binary_text(&current, s.operator, &value, s.target.ty(), s.location)?;
                Ok(format!("{}.{} <- {}", receiver, attr.attribute, combined))
            }
            Expression::Subscript(sub) => {
                if let Type::Dict(_, _) = sub.receiver.ty() {
                    let receiver = self.emit_expression(&sub.receiver)?;
                    let key = self.emit_expression(&sub.index)?;
                    let current = format!("(Hashtbl.find {} {})", receiver, key);
                    let combined = self.binary_text(
                        &current,
                        s.operator,
                        &value,
                        s.target.ty(),
                        s.location,
                    )?;
                    Ok(format!(
                        "Hashtbl.replace {} {} ({})",
                        receiver, key, combined
                    ))
                } else {
                    self.fail(
                        "list element stores are not supported in the OCaml backend".to_string(),
                        s.location,
                    )
                }
            }
            other => self.fail(
                "unsupported assignment target".to_string(),
                other.location(),
            ),
        }
    }

    /// A method call or other expression in statement position
    fn emit_statement_expression(&mut self, expr: &Expression) -> EmitExpr {
        if let Expression::MethodCall(call) = expr {
            if let (Some(name), Some(argument)) =
                (call.receiver.as_name(), call.arguments.first())
            {
                if call.method == "append" && self.refs.contains(name) {
                    let value = self.emit_expression(argument)?;
                    return Ok(format!("{} := !{} @ [{}]", name, name, value));
                }
            }
        }
        let text = self.emit_expression(expr)?;
        if expr.ty() == &Type::none() || expr.ty().is_unknown() {
            Ok(text)
        } else {
            Ok(format!("ignore ({})", text))
        }
    }

    // ---- expressions ----

    fn emit_expression(&mut self, expr: &Expression) -> EmitExpr {
        match expr {
            Expression::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Int(v) => {
                    if *v < 0 {
                        format!("({})", v)
                    } else {
                        v.to_string()
                    }
                }
                LiteralValue::Float(v) => format_float(*v),
                LiteralValue::Bool(v) => if *v { "true" } else { "false" }.to_string(),
                LiteralValue::Str(v) => format!("\"{}\"", escape_c_string(v)),
                LiteralValue::None => "()".to_string(),
            }),
            Expression::Name(name) => {
                if self.refs.contains(&name.name) {
                    Ok(format!("!{}", name.name))
                } else {
                    Ok(name.name.clone())
                }
            }
            Expression::Binary(e) => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                self.binary_text(&left, e.operator, &right, e.left.ty(), e.location)
            }
            Expression::Unary(e) => {
                let operand = self.emit_expression(&e.operand)?;
                Ok(match e.operator {
                    UnaryOperator::Neg => format!("(- {})", operand),
                    UnaryOperator::Pos => operand,
                    UnaryOperator::Not => format!("(not {})", operand),
                })
            }
            Expression::Comparison(e) => self.emit_comparison(e),
            Expression::Bool(e) => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                let op = match e.operator {
                    BoolOperator::And => "&&",
                    BoolOperator::Or => "||",
                };
                Ok(format!("({} {} {})", left, op, right))
            }
            Expression::Call(e) => self.emit_call(e),
            Expression::MethodCall(e) => self.emit_method_call(e),
            Expression::Attribute(e) => {
                let receiver = self.emit_expression(&e.receiver)?;
                Ok(format!("{}.{}", receiver, e.attribute))
            }
            Expression::Subscript(e) => {
                let base = self.emit_expression(&e.receiver)?;
                let index = self.emit_expression(&e.index)?;
                match e.receiver.ty() {
                    Type::List(_) => Ok(format!("(List.nth ({}) ({}))", base, index)),
                    Type::Dict(_, _) => Ok(format!("(Hashtbl.find ({}) ({}))", base, index)),
                    Type::Scalar(ScalarType::Str) => {
                        Ok(format!("String.make 1 {}.[{}]", base, index))
                    }
                    other => self.fail(
                        format!("cannot subscript {} in the OCaml backend", other),
                        e.location,
                    ),
                }
            }
            Expression::ListLiteral(e) => {
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element)?);
                }
                Ok(format!("[{}]", elements.join("; ")))
            }
            Expression::DictLiteral(e) => {
                if e.entries.is_empty() {
                    return Ok("Hashtbl.create 16".to_string());
                }
                let mut out = String::from("(let h = Hashtbl.create 16 in ");
                for (key, value) in &e.entries {
                    let key = self.emit_expression(key)?;
                    let value = self.emit_expression(value)?;
                    out.push_str(&format!("Hashtbl.replace h {} {}; ", key, value));
                }
                out.push_str("h)");
                Ok(out)
            }
            Expression::SetLiteral(e) => {
                if e.elements.is_empty() {
                    return Ok("Hashtbl.create 16".to_string());
                }
                let mut out = String::from("(let h = Hashtbl.create 16 in ");
                for element in &e.elements {
                    let element = self.emit_expression(element)?;
                    out.push_str(&format!("Hashtbl.replace h {} (); ", element));
                }
                out.push_str("h)");
                Ok(out)
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
                            fmt.push_str(&escape_c_string(text).replace('%', "%%"))
                        }
                        FStringPart::Expr(inner) => {
                            let spec = self
                                .registry
                                .descriptor(inner.ty())
                                .map(|d| d.format_spec)
                                .filter(|spec| !spec.is_empty())
                                .unwrap_or("%d");
                            fmt.push_str(spec);
                            args.push(self.emit_expression(inner)?);
                        }
                    }
                }
                if args.is_empty() {
                    Ok(format!("\"{}\"", fmt))
                } else {
                    Ok(format!(
                        "Printf.sprintf \"{}\" {}",
                        fmt,
                        args.iter()
                            .map(|a| format!("({})", a))
                            .collect::<Vec<_>>()
                            .join(" ")
                    ))
                }
            }
            Expression::Conditional(e) => {
                let condition = self.emit_expression(&e.condition)?;
                let then_value = self.emit_expression(&e.then_value)?;
                let else_value = self.emit_expression(&e.else_value)?;
                Ok(format!(
                    "(if {} then {} else {})",
                    condition, then_value, else_value
                ))
            }
            other => self.fail(
                "expression form cannot be emitted for OCaml".to_string(),
                other.location(),
            ),
        }
    }

    fn binary_text(
        &mut self,
        left: &str,
        operator: BinaryOperator,
        right: &str,
        left_ty: &Type,
        location: SourceLocation,
    ) -> EmitExpr {
        let is_float = left_ty == &Type::float();
        let is_str = left_ty == &Type::str();
        let text = match operator {
            BinaryOperator::Add if is_str => format!("({} ^ {})", left, right),
            BinaryOperator::Add if is_float => format!("({} +. {})", left, right),
            BinaryOperator::Add => format!("({} + {})", left, right),
            BinaryOperator::Sub if is_float => format!("({} -. {})", left, right),
            BinaryOperator::Sub => format!("({} - {})", left, right),
            BinaryOperator::Mul if is_float => format!("({} *. {})", left, right),
            BinaryOperator::Mul => format!("({} * {})", left, right),
            BinaryOperator::Div if is_float => format!("({} /. {})", left, right),
            BinaryOperator::Div => {
                format!("(float_of_int {} /. float_of_int {})", left, right)
            }
            BinaryOperator::FloorDiv => {
                self.needs_floordiv = true;
                format!("(mgen_floordiv {} {})", left, right)
            }
            BinaryOperator::Mod => {
                if is_float {
                    return self.fail(
                        "float modulo has no OCaml lowering".to_string(),
                        location,
                    );
                }
                self.needs_floordiv = true;
                format!("(mgen_mod {} {})", left, right)
            }
            BinaryOperator::Pow => {
                if is_float {
                    format!("({} ** {})", left, right)
                } else {
                    self.needs_ipow = true;
                    format!("(mgen_ipow {} {})", left, right)
                }
            }
        };
        Ok(text)
    }

    fn emit_comparison(&mut self, e: &mgen_ir::ast::ComparisonExpr) -> EmitExpr {
        use ComparisonOperator::*;
        match e.operator {
            In | NotIn => {
                let negate = e.operator == NotIn;
                let value = self.emit_expression(&e.left)?;
                let container = self.emit_expression(&e.right)?;
                let text = match e.right.ty() {
                    Type::Dict(_, _) | Type::Set(_) => {
                        format!("Hashtbl.mem {} ({})", container, value)
                    }
                    Type::List(_) => format!("List.mem ({}) {}", value, container),
                    other => {
                        return self.fail(
                            format!("'in' is not supported on {} in the OCaml backend", other),
                            e.location,
                        );
                    }
                };
                Ok(if negate {
                    format!("(not ({}))", text)
                } else {
                    format!("({})", text)
                })
            }
            other => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                // equality is spelled differently; the orderings come from
                // the shared table
                let op = match other {
                    Eq => "=",
                    NotEq => "<>",
                    _ => operators::comparison(other).unwrap_or("="),
                };
                Ok(format!("({} {} {})", left, op, right))
            }
        }
    }

    fn emit_comprehension(&mut self, e: &mgen_ir::ast::ComprehensionExpr) -> EmitExpr {
        if e.kind != ComprehensionKind::List {
            return self.fail(
                "only list comprehensions are supported in the OCaml backend".to_string(),
                e.location,
            );
        }
        let source = if let Expression::Call(call) = &*e.iterable {
            if call.function == "range" && call.arguments.len() <= 2 {
                self.needs_range = true;
                match call.arguments.len() {
                    1 => format!("(mgen_range 0 ({}))", self.emit_expression(&call.arguments[0])?),
                    _ => format!(
                        "(mgen_range ({}) ({}))",
                        self.emit_expression(&call.arguments[0])?,
                        self.emit_expression(&call.arguments[1])?
                    ),
                }
            } else {
                self.emit_expression(&e.iterable)?
            }
        } else {
            self.emit_expression(&e.iterable)?
        };

        let mut chain = source;
        if let Some(condition) = &e.condition {
            let condition = self.emit_expression(condition)?;
            chain = format!(
                "(List.filter (fun {} -> {}) {})",
                e.variable, condition, chain
            );
        }
        let element = self.emit_expression(&e.element)?;
        Ok(format!(
            "(List.map (fun {} -> {}) {})",
            e.variable, element, chain
        ))
    }

    fn emit_call(&mut self, e: &mgen_ir::ast::CallExpr) -> EmitExpr {
        match e.function.as_str() {
            "print" => {
                let Some(argument) = e.arguments.first() else {
                    return Ok("print_newline ()".to_string());
                };
                let text = self.emit_expression(argument)?;
                let spec = self
                    .registry
                    .descriptor(argument.ty())
                    .map(|d| d.format_spec)
                    .filter(|spec| !spec.is_empty())
                    .unwrap_or("%d");
                Ok(format!("Printf.printf \"{}\\n\" ({})", spec, text))
            }
            "len" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("len() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                match argument.ty() {
                    Type::List(_) => Ok(format!("List.length {}", text)),
                    Type::Dict(_, _) | Type::Set(_) => Ok(format!("Hashtbl.length {}", text)),
                    Type::Scalar(ScalarType::Str) => Ok(format!("String.length {}", text)),
                    ty => self.fail(format!("len() is not defined for {}", ty), e.location),
                }
            }
            "str" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("str() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                match argument.ty() {
                    Type::Scalar(ScalarType::Int) => Ok(format!("string_of_int ({})", text)),
                    Type::Scalar(ScalarType::Float) => {
                        Ok(format!("string_of_float ({})", text))
                    }
                    Type::Scalar(ScalarType::Bool) => Ok(format!("string_of_bool ({})", text)),
                    _ => Ok(text),
                }
            }
            "abs" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("abs() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                if argument.ty() == &Type::float() {
                    Ok(format!("abs_float ({})", text))
                } else {
                    Ok(format!("abs ({})", text))
                }
            }
            "int" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("int() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("int_of_float ({})", text))
            }
            "float" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("float() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("float_of_int ({})", text))
            }
            "bool" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("bool() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("(({}) <> 0)", text))
            }
            "range" => self.fail(
                "range() is only usable in loops and comprehensions".to_string(),
                e.location,
            ),
            name => {
                if crate::is_builtin(name) {
                    return self.fail(
                        format!("builtin '{}' has no OCaml lowering", name),
                        e.location,
                    );
                }
                let mut arguments = Vec::new();
                for argument in &e.arguments {
                    arguments.push(format!("({})", self.emit_expression(argument)?));
                }
                if let Some(record) = self.context.record(name) {
                    let ctor = format!("make_{}", record.name.to_lowercase());
                    if arguments.is_empty() {
                        return Ok(format!("{} ()", ctor));
                    }
                    return Ok(format!("{} {}", ctor, arguments.join(" ")));
                }
                if arguments.is_empty() {
                    Ok(format!("{} ()", name))
                } else {
                    Ok(format!("{} {}", name, arguments.join(" ")))
                }
            }
        }
    }

    fn emit_method_call(&mut self, e: &MethodCallExpr) -> EmitExpr {
        let receiver_ty = e.receiver.ty().clone();
        match &receiver_ty {
            Type::Record(name) => {
                let record_fn = format!(
                    "{}_{}",
                    name.to_lowercase(),
                    e.method
                );
                // static methods take no receiver argument
                let is_static = self
                    .context
                    .record(name)
                    .and_then(|record| record.method(&e.method))
                    .map(|method| method.is_static)
                    .unwrap_or(false);
                let mut arguments = Vec::new();
                if !is_static {
                    let base = self.emit_expression(&e.receiver)?;
                    arguments.push(format!("({})", base));
                }
                for argument in &e.arguments {
                    arguments.push(format!("({})", self.emit_expression(argument)?));
                }
                if arguments.is_empty() {
                    return Ok(format!("{} ()", record_fn));
                }
                Ok(format!("{} {}", record_fn, arguments.join(" ")))
            }
            Type::Dict(_, _) => {
                let base = self.emit_expression(&e.receiver)?;
                match e.method.as_str() {
                    "get" if e.arguments.len() == 2 => {
                        let key = self.emit_expression(&e.arguments[0])?;
                        let default = self.emit_expression(&e.arguments[1])?;
                        Ok(format!(
                            "(try Hashtbl.find {} ({}) with Not_found -> {})",
                            base, key, default
                        ))
                    }
                    other => self.fail(
                        format!("dict method '{}' has no OCaml lowering", other),
                        e.location,
                    ),
                }
            }
            Type::Set(_) => {
                let base = self.emit_expression(&e.receiver)?;
                match (e.method.as_str(), e.arguments.first()) {
                    ("add", Some(argument)) => {
                        let value = self.emit_expression(argument)?;
                        Ok(format!("Hashtbl.replace {} ({}) ()", base, value))
                    }
                    ("discard", Some(argument)) | ("remove", Some(argument)) => {
                        let value = self.emit_expression(argument)?;
                        Ok(format!("Hashtbl.remove {} ({})", base, value))
                    }
                    (other, _) => self.fail(
                        format!("set method '{}' has no OCaml lowering", other),
                        e.location,
                    ),
                }
            }
            Type::Scalar(ScalarType::Str) => {
                let base = self.emit_expression(&e.receiver)?;
                match e.method.as_str() {
                    "split" if e.arguments.is_empty() => {
                        self.needs_split = true;
                        Ok(format!("mgen_split {}", base))
                    }
                    "join" => {
                        let parts = self.emit_expression(&e.arguments[0])?;
                        Ok(format!("String.concat {} {}", base, parts))
                    }
                    "upper" => Ok(format!("String.uppercase_ascii {}", base)),
                    "lower" => Ok(format!("String.lowercase_ascii {}", base)),
                    "strip" if e.arguments.is_empty() => Ok(format!("String.trim {}", base)),
                    other => self.fail(
                        format!("string method '{}' has no OCaml lowering", other),
                        e.location,
                    ),
                }
            }
            other => self.fail(
                format!("cannot call a method on {} in the OCaml backend", other),
                e.location,
            ),
        }
    }
}

/// Whether every control path through the statement ends in a return
fn always_returns(stmt: &Statement) -> bool {
    match stmt {
        Statement::Return(_) => true,
        Statement::If(s) => {
            !s.else_body.is_empty()
                && s.arms.iter().all(|arm| ends_in_return(&arm.body))
                && ends_in_return(&s.else_body)
        }
        _ => false,
    }
}

fn ends_in_return(body: &[Statement]) -> bool {
    body.last().is_some_and(always_returns)
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
