//! Haskell backend
//!
//! Pure-functional emission with two statement paths: function bodies
//! translate to pure equations (lets, if/else expressions, loop lowering
//! through fold/map/comprehension strategies), while statements inside
//! `main` emit as let-bindings and actions in a do-block. Record field
//! mutation becomes record-update syntax producing a new value, with
//! rebound receivers versioned (`c`, `c2`, `c3`, ...).

use crate::Backend;
use crate::emitter::escape_c_string;
use crate::operators;
use crate::preferences::{PrefSpec, Preferences};
use mgen_error::{Diagnostic, ErrorCode};
use mgen_ir::SourceLocation;
use mgen_ir::ast::{
    AssignStmt, AugAssignStmt, BinaryOperator, BoolOperator, ComparisonOperator,
    ComprehensionKind, Expression, FStringPart, ForStmt, FunctionDef, LiteralValue,
    MethodCallExpr, Module, RecordDescriptor, Statement, UnaryOperator,
};
use mgen_ir::query::{self, main_guard_body};
use mgen_shared::CompilationContext;
use mgen_types::{ScalarType, Target, TargetTypeRegistry, Type};
use std::collections::HashMap;

/// Preferences understood by the Haskell backend
pub const SCHEMA: &[PrefSpec] = &[
    PrefSpec::bool(
        "use_native_comprehensions",
        true,
        "emit list comprehensions instead of map/filter chains",
    ),
    PrefSpec::bool("strict_data", false, "add strictness annotations to record fields"),
    PrefSpec::int("indent_size", 2, "spaces per indentation level"),
];

pub fn factory(prefs: Preferences) -> Box<dyn Backend> {
    Box::new(HaskellBackend { prefs })
}

pub struct HaskellBackend {
    prefs: Preferences,
}

type EmitExpr = Result<String, ()>;

impl Backend for HaskellBackend {
    fn name(&self) -> &'static str {
        "haskell"
    }

    fn file_extension(&self) -> &'static str {
        "hs"
    }

    fn map_type(&self, ty: &Type, context: &CompilationContext) -> Option<String> {
        let registry = registry_for(context);
        registry.descriptor(ty).map(|d| d.target_name)
    }

    fn map_builtin(&self, name: &str) -> Option<&'static str> {
        match name {
            "print" => Some("putStrLn"),
            "len" => Some("length"),
            "str" => Some("show"),
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
        let mut emitter = HsEmitter {
            context,
            registry: &registry,
            diagnostics: Vec::new(),
            native_comprehensions: self.prefs.get_bool("use_native_comprehensions"),
            strict_data: self.prefs.get_bool("strict_data"),
            needs_map: false,
            needs_set: false,
            needs_exit: false,
        };
        emitter.emit_module(module)
    }

    fn build_descriptor(&self, module_name: &str) -> Option<(String, String)> {
        let cabal = format!(
            "cabal-version: 2.4\nname: {}\nversion: 0.1.0\n\nexecutable {}\n    main-is: Main.hs\n    build-depends: base, containers\n    default-language: Haskell2010\n",
            module_name, module_name
        );
        Some((format!("{}.cabal", module_name), cabal))
    }
}

fn registry_for(context: &CompilationContext) -> TargetTypeRegistry {
    let mut registry = TargetTypeRegistry::new(Target::Haskell);
    for record in context.records() {
        registry.register_record(&record.name);
    }
    registry
}

struct HsEmitter<'a> {
    context: &'a CompilationContext,
    registry: &'a TargetTypeRegistry,
    diagnostics: Vec<Diagnostic>,
    native_comprehensions: bool,
    strict_data: bool,
    needs_map: bool,
    needs_set: bool,
    needs_exit: bool,
}

/// Versioned-name environment for the do-block path: reassigning `c`
/// introduces `c2`, `c3`, ...
#[derive(Debug, Clone, Default)]
struct Versions {
    current: HashMap<String, String>,
    counters: HashMap<String, usize>,
}

impl Versions {
    fn resolve(&self, name: &str) -> String {
        self.current
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn rebind(&mut self, name: &str) -> String {
        let counter = self.counters.entry(name.to_string()).or_insert(1);
        *counter += 1;
        let fresh = format!("{}{}", name, counter);
        self.current.insert(name.to_string(), fresh.clone());
        fresh
    }

    fn bind_fresh(&mut self, name: &str) -> String {
        if self.current.contains_key(name) || self.counters.contains_key(name) {
            self.rebind(name)
        } else {
            self.counters.insert(name.to_string(), 1);
            self.current.insert(name.to_string(), name.to_string());
            name.to_string()
        }
    }
}

impl<'a> HsEmitter<'a> {
    fn fail(&mut self, message: String, location: SourceLocation) -> EmitExpr {
        self.diagnostics
            .push(Diagnostic::error(ErrorCode::CodegenFailure, message, location));
        Err(())
    }

    fn type_name(&mut self, ty: &Type, location: SourceLocation) -> EmitExpr {
        match ty {
            Type::Dict(_, _) => self.needs_map = true,
            Type::Set(_) => self.needs_set = true,
            _ => {}
        }
        match self.registry.descriptor(ty) {
            Some(descriptor) => Ok(descriptor.target_name),
            None => self.fail(format!("type {} has no Haskell mapping", ty), location),
        }
    }

    fn emit_module(&mut self, module: &Module) -> Result<String, Vec<Diagnostic>> {
        let mut records_text = String::new();
        for item in &module.items {
            if let Statement::ClassDef(class_def) = item {
                if let Some(record) = self.context.record(&class_def.name).cloned() {
                    if let Ok(text) = self.emit_record(&record, class_def) {
                        records_text.push_str(&text);
                    }
                }
            }
        }

        let mut functions_text = String::new();
        for item in &module.items {
            if let Statement::FunctionDef(def) = item {
                if let Ok(text) = self.emit_pure_function(def) {
                    functions_text.push_str(&text);
                    functions_text.push('\n');
                }
            }
        }

        let entry = self.emit_entry_point(module).unwrap_or_default();

        if !self.diagnostics.is_empty() {
            return Err(std::mem::take(&mut self.diagnostics));
        }

        let mut out = String::from("module Main where\n\n");
        if self.needs_map {
            out.push_str("import qualified Data.Map.Strict as Map\n");
        }
        if self.needs_set {
            out.push_str("import qualified Data.Set as Set\n");
        }
        if self.needs_exit {
            out.push_str("import System.Exit (ExitCode (..), exitWith)\n");
        }
        if self.needs_map || self.needs_set || self.needs_exit {
            out.push('\n');
        }
        out.push_str(&records_text);
        out.push_str(&functions_text);
        out.push_str(&entry);
        Ok(out)
    }

    // ---- records ----

    /// Field accessors are prefixed (`counterN`) and mutation emits
    /// record-update syntax
    fn emit_record(
        &mut self,
        record: &RecordDescriptor,
        class_def: &mgen_ir::ast::ClassDef,
    ) -> Result<String, ()> {
        let mut out = format!("data {} = {}\n", record.name, record.name);
        let bang = if self.strict_data { "!" } else { "" };
        for (index, (field, ty)) in record.fields.iter().enumerate() {
            let field_type = self.type_name(ty, class_def.location)?;
            let sep = if index == 0 { "{" } else { "," };
            out.push_str(&format!(
                "  {} {} :: {}{}\n",
                sep,
                field_accessor(&record.name, field),
                bang,
                field_type
            ));
        }
        out.push_str("  } deriving (Eq, Show)\n\n");

        for item in &class_def.body {
            if let Statement::FunctionDef(def) = item {
                if def.name != "__init__" {
                    let text = self.emit_method(record, def)?;
                    out.push_str(&text);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }

    /// Methods are pure functions over the record; mutators return the
    /// updated record
    fn emit_method(&mut self, record: &RecordDescriptor, def: &FunctionDef) -> Result<String, ()> {
        let descriptor = record.method(&def.name).cloned();
        let is_static = descriptor
            .as_ref()
            .map(|method| method.is_static)
            .unwrap_or_else(|| def.decorators.iter().any(|d| d == "staticmethod"));
        let mutates = descriptor.as_ref().map(|m| m.mutates_receiver).unwrap_or(false);
        let name = method_name(&record.name, &def.name);

        // a @staticmethod is an ordinary pure equation over its own
        // parameters; nothing is peeled off as a receiver
        if is_static {
            let mut param_types = Vec::new();
            for param in &def.parameters {
                param_types.push(self.type_name(&param.ty, param.location)?);
            }
            let result_type = self.type_name(&def.return_type, def.location)?;
            let mut out = if param_types.is_empty() {
                format!("{} :: {}\n", name, result_type)
            } else {
                format!("{} :: {} -> {}\n", name, param_types.join(" -> "), result_type)
            };

            let mut versions = Versions::default();
            let params: Vec<String> = def
                .parameters
                .iter()
                .map(|p| versions.bind_fresh(&p.name))
                .collect();
            let body = self.emit_pure_block(&def.body, None, 1, &mut versions)?;
            let head = if params.is_empty() {
                name
            } else {
                format!("{} {}", name, params.join(" "))
            };
            out.push_str(&format!("{} = {}\n", head, body));
            return Ok(out);
        }

        let receiver = def
            .parameters
            .first()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "self".to_string());

        // signature
        let mut param_types = vec![record.name.clone()];
        for param in def.parameters.iter().skip(1) {
            param_types.push(self.type_name(&param.ty, param.location)?);
        }
        let result_type = if mutates {
            record.name.clone()
        } else {
            self.type_name(&def.return_type, def.location)?
        };
        let mut out = format!("{} :: {} -> {}\n", name, param_types.join(" -> "), result_type);

        let mut params = vec![receiver.clone()];
        for param in def.parameters.iter().skip(1) {
            params.push(param.name.clone());
        }

        let body = if mutates {
            self.emit_mutating_method_body(record, &receiver, &def.body, def.location)?
        } else {
            let mut versions = Versions::default();
            versions.bind_fresh(&receiver);
            for param in def.parameters.iter().skip(1) {
                versions.bind_fresh(&param.name);
            }
            self.emit_pure_block(
                &def.body,
                Some((record, receiver.as_str())),
                1,
                &mut versions,
            )?
        };
        out.push_str(&format!("{} {} = {}\n", name, params.join(" "), body));
        Ok(out)
    }

    /// A mutating method becomes a record update: every `self.f = v` /
    /// `self.f op= v` contributes one updated field
    fn emit_mutating_method_body(
        &mut self,
        record: &RecordDescriptor,
        receiver: &str,
        body: &[Statement],
        location: SourceLocation,
    ) -> EmitExpr {
        let mut updates = Vec::new();
        for stmt in body {
            match stmt {
                Statement::Assign(s) => {
                    if let Expression::Attribute(attr) = &s.target {
                        if attr.receiver.as_name() == Some(receiver) {
                            let value =
                                self.emit_expression(&s.value, Some((record, receiver)))?;
                            updates.push(format!(
                                "{} = {}",
                                field_accessor(&record.name, &attr.attribute),
                                value
                            ));
                            continue;
                        }
                    }
                    return self.fail(
                        "mutating methods may only assign receiver fields".to_string(),
                        s.location,
                    );
                }
                Statement::AugAssign(s) => {
                    if let Expression::Attribute(attr) = &s.target {
                        if attr.receiver.as_name() == Some(receiver) {
                            let accessor = field_accessor(&record.name, &attr.attribute);
                            let current = format!("{} {}", accessor, receiver);
                            let value =
                                self.emit_expression(&s.value, Some((record, receiver)))?;
                            let combined = self.binary_text(
                                &current,
                                s.operator,
                                &value,
                                s.target.ty(),
                                s.location,
                            )?;
                            updates.push(format!("{} = {}", accessor, combined));
                            continue;
                        }
                    }
                    return self.fail(
                        "mutating methods may only assign receiver fields".to_string(),
                        s.location,
                    );
                }
                Statement::Return(_) | Statement::Pass(_) => {}
                other => {
                    return self.fail(
                        "mutating methods support only field assignments".to_string(),
                        other.location(),
                    );
                }
            }
        }
        if updates.is_empty() {
            return self.fail("mutating method updates no field".to_string(), location);
        }
        Ok(format!("{} {{ {} }}", receiver, updates.join(", ")))
    }

    // ---- pure-function path ----

    fn emit_pure_function(&mut self, def: &FunctionDef) -> Result<String, ()> {
        // the source `main` is the one function emitted on the IO path
        if def.name == "main" {
            return self.emit_main_function(def);
        }
        let name = haskell_name(&def.name);

        let mut param_types = Vec::new();
        for param in &def.parameters {
            param_types.push(self.type_name(&param.ty, param.location)?);
        }
        let result_type = self.type_name(&def.return_type, def.location)?;
        let signature = if param_types.is_empty() {
            format!("{} :: {}\n", name, result_type)
        } else {
            format!("{} :: {} -> {}\n", name, param_types.join(" -> "), result_type)
        };

        let mut versions = Versions::default();
        let params: Vec<String> = def
            .parameters
            .iter()
            .map(|p| versions.bind_fresh(&p.name))
            .collect();
        let body = self.emit_pure_block(&def.body, None, 1, &mut versions)?;
        let head = if params.is_empty() {
            name
        } else {
            format!("{} {}", name, params.join(" "))
        };
        Ok(format!("{}{} = {}\n", signature, head, body))
    }

    fn emit_main_function(&mut self, def: &FunctionDef) -> Result<String, ()> {
        let result_type = if def.return_type == Type::int() {
            "IO Int"
        } else {
            "IO ()"
        };
        let mut versions = Versions::default();
        let mut actions = Vec::new();
        for stmt in &def.body {
            self.emit_do_statement(stmt, &mut versions, &mut actions)?;
        }
        if def.return_type == Type::int() {
            if !actions.iter().any(|a| a.starts_with("return ")) {
                actions.push("return 0".to_string());
            }
        } else {
            actions.push("return ()".to_string());
        }
        let mut out = format!("mgenMain :: {}\nmgenMain = do\n", result_type);
        for action in actions {
            out.push_str("  ");
            out.push_str(&action);
            out.push('\n');
        }
        Ok(out)
    }

    /// The pure statement path: lets, if/else expressions, loop lowering.
    /// Haskell lets are recursive, so rebinding goes through the same
    /// version map the do path uses.
    fn emit_pure_block(
        &mut self,
        stmts: &[Statement],
        method: Option<(&RecordDescriptor, &str)>,
        depth: usize,
        versions: &mut Versions,
    ) -> EmitExpr {
        let Some((first, rest)) = stmts.split_first() else {
            return Ok("()".to_string());
        };
        let pad = "  ".repeat(depth);

        match first {
            Statement::Return(s) => match &s.value {
                Some(value) => {
                    let mut renamed = value.clone();
                    rename_expression(&mut renamed, versions);
                    self.emit_expression(&renamed, method)
                }
                None => Ok("()".to_string()),
            },
            Statement::Assign(s) => {
                let Some(name) = s.target.as_name().map(str::to_string) else {
                    return self.fail(
                        "only name bindings are supported in pure functions".to_string(),
                        s.location,
                    );
                };
                let mut value = s.value.clone();
                rename_expression(&mut value, versions);
                let value = self.emit_expression(&value, method)?;
                let bound = versions.bind_fresh(&name);
                let rest_text = self.emit_pure_block(rest, method, depth, versions)?;
                Ok(format!("let {} = {} in\n{}{}", bound, value, pad, rest_text))
            }
            Statement::If(s) => {
                if always_returns(first) {
                    return self.emit_pure_if(s, method, depth, versions);
                }
                if s.arms.len() == 1 && s.else_body.is_empty() && ends_in_return(&s.arms[0].body)
                {
                    let mut condition = s.arms[0].condition.clone();
                    rename_expression(&mut condition, versions);
                    let condition = self.emit_expression(&condition, method)?;
                    let then_text = self.emit_pure_block(
                        &s.arms[0].body,
                        method,
                        depth + 1,
                        &mut versions.clone(),
                    )?;
                    let rest_text = self.emit_pure_block(rest, method, depth + 1, versions)?;
                    return Ok(format!(
                        "if {}\n{}  then {}\n{}  else {}",
                        condition, pad, then_text, pad, rest_text
                    ));
                }
                self.fail(
                    "side-effecting conditionals have no pure lowering".to_string(),
                    s.location,
                )
            }
            Statement::For(s) => {
                let renamed = self.rename_for(s, versions);
                let (binding, value) = self.lower_pure_loop(&renamed, method)?;
                let original = original_name(versions, &binding);
                let bound = versions.rebind(&original);
                let rest_text = self.emit_pure_block(rest, method, depth, versions)?;
                Ok(format!(
                    "let {} = {} in\n{}{}",
                    bound, value, pad, rest_text
                ))
            }
            Statement::AugAssign(s) => {
                let Some(name) = s.target.as_name().map(str::to_string) else {
                    return self.fail(
                        "only name targets are supported in pure functions".to_string(),
                        s.location,
                    );
                };
                let current = versions.resolve(&name);
                let mut value = s.value.clone();
                rename_expression(&mut value, versions);
                let value = self.emit_expression(&value, method)?;
                let combined =
                    self.binary_text(&current, s.operator, &value, s.target.ty(), s.location)?;
                let bound = versions.rebind(&name);
                let rest_text = self.emit_pure_block(rest, method, depth, versions)?;
                Ok(format!(
                    "let {} = {} in\n{}{}",
                    bound, combined, pad, rest_text
                ))
            }
            Statement::Expression(stmt) => {
                // straight-line appends extend the list under a fresh name
                if let Expression::MethodCall(call) = &stmt.expression {
                    if call.method == "append" && !call.arguments.is_empty() {
                        if let Some(receiver) = call.receiver.as_name().map(str::to_string) {
                            let mut argument = call.arguments[0].clone();
                            rename_expression(&mut argument, versions);
                            let element = self.emit_expression(&argument, method)?;
                            let current = versions.resolve(&receiver);
                            let bound = versions.rebind(&receiver);
                            let rest_text =
                                self.emit_pure_block(rest, method, depth, versions)?;
                            return Ok(format!(
                                "let {} = {} ++ [{}] in\n{}{}",
                                bound, current, element, pad, rest_text
                            ));
                        }
                    }
                }
                // a mutating method call rebinds its receiver
                if let Expression::MethodCall(call) = &stmt.expression {
                    if let Type::Record(record_name) = call.receiver.ty() {
                        let mutates = self
                            .context
                            .record(record_name)
                            .and_then(|r| r.method(&call.method))
                            .map(|m| m.mutates_receiver)
                            .unwrap_or(false);
                        if mutates {
                            if let Some(receiver) =
                                call.receiver.as_name().map(str::to_string)
                            {
                                let mut renamed = Expression::MethodCall(call.clone());
                                rename_expression(&mut renamed, versions);
                                let text = self.emit_expression(&renamed, method)?;
                                let bound = versions.rebind(&receiver);
                                let rest_text =
                                    self.emit_pure_block(rest, method, depth, versions)?;
                                return Ok(format!(
                                    "let {} = {} in\n{}{}",
                                    bound, text, pad, rest_text
                                ));
                            }
                        }
                    }
                }
                self.fail(
                    "expression statements have no pure lowering".to_string(),
                    stmt.location,
                )
            }
            Statement::Assert(s) => {
                let mut condition = s.condition.clone();
                rename_expression(&mut condition, versions);
                let condition = self.emit_expression(&condition, method)?;
                let rest_text = self.emit_pure_block(rest, method, depth, versions)?;
                Ok(format!(
                    "if not ({}) then error \"assertion failed\" else\n{}{}",
                    condition, pad, rest_text
                ))
            }
            Statement::Pass(_) | Statement::Import(_) => {
                self.emit_pure_block(rest, method, depth, versions)
            }
            other => self.fail(
                "statement form has no pure Haskell lowering".to_string(),
                other.location(),
            ),
        }
    }

    fn emit_pure_if(
        &mut self,
        s: &mgen_ir::ast::IfStmt,
        method: Option<(&RecordDescriptor, &str)>,
        depth: usize,
        versions: &mut Versions,
    ) -> EmitExpr {
        let pad = "  ".repeat(depth);
        let mut out = String::new();
        for (index, arm) in s.arms.iter().enumerate() {
            let mut condition = arm.condition.clone();
            rename_expression(&mut condition, versions);
            let condition = self.emit_expression(&condition, method)?;
            let body =
                self.emit_pure_block(&arm.body, method, depth + 1, &mut versions.clone())?;
            if index == 0 {
                out.push_str(&format!("if {}\n{}  then {}\n", condition, pad, body));
            } else {
                out.push_str(&format!(
                    "{}  else if {}\n{}    then {}\n",
                    pad, condition, pad, body
                ));
            }
        }
        let else_body =
            self.emit_pure_block(&s.else_body, method, depth + 1, &mut versions.clone())?;
        out.push_str(&format!("{}  else {}", pad, else_body));
        Ok(out)
    }

    /// Loop lowering strategies for the pure path: accumulation folds,
    /// append maps, and dict-store folds, picked by a light pattern match
    /// on the loop body
    fn lower_pure_loop(
        &mut self,
        s: &ForStmt,
        method: Option<(&RecordDescriptor, &str)>,
    ) -> Result<(String, String), ()> {
        let source = self.loop_source(s, method)?;
        let variable = &s.targets[0];

        if let [body_stmt] = s.body.as_slice() {
            match body_stmt {
                // accumulation: `total += expr`  =>  foldl
                Statement::AugAssign(aug) => {
                    if let Some(acc) = aug.target.as_name() {
                        let value = self.emit_expression(&aug.value, method)?;
                        let op = self.fold_operator(aug.operator, aug.target.ty(), aug.location)?;
                        return Ok((
                            acc.to_string(),
                            format!(
                                "foldl (\\{} {} -> {} {} ({})) {} {}",
                                acc, variable, acc, op, value, acc, source
                            ),
                        ));
                    }
                }
                // mapping: `out.append(expr)`  =>  out ++ map
                Statement::Expression(stmt) => {
                    if let Expression::MethodCall(call) = &stmt.expression {
                        if call.method == "append" && !call.arguments.is_empty() {
                            if let Some(out_name) = call.receiver.as_name() {
                                let element =
                                    self.emit_expression(&call.arguments[0], method)?;
                                let mapped = if self.native_comprehensions {
                                    format!("[{} | {} <- {}]", element, variable, source)
                                } else {
                                    format!("map (\\{} -> {}) {}", variable, element, source)
                                };
                                return Ok((
                                    out_name.to_string(),
                                    format!("{} ++ {}", out_name, mapped),
                                ));
                            }
                        }
                    }
                }
                // dict store: `d[k] = expr`  =>  foldl with Map.insert
                Statement::Assign(assign) => {
                    if let Expression::Subscript(sub) = &assign.target {
                        if let (Some(dict_name), Type::Dict(_, _)) =
                            (sub.receiver.as_name(), sub.receiver.ty())
                        {
                            self.needs_map = true;
                            let key = self.emit_expression(&sub.index, method)?;
                            let value = self.emit_expression(&assign.value, method)?;
                            return Ok((
                                dict_name.to_string(),
                                format!(
                                    "foldl (\\{} {} -> Map.insert ({}) ({}) {}) {} {}",
                                    dict_name, variable, key, value, dict_name, dict_name, source
                                ),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        let _ = self.fail(
            "loop shape has no pure lowering (supported: accumulate, append, dict store)"
                .to_string(),
            s.location,
        );
        Err(())
    }

    fn loop_source(
        &mut self,
        s: &ForStmt,
        method: Option<(&RecordDescriptor, &str)>,
    ) -> EmitExpr {
        if let Expression::Call(call) = &s.iterable {
            if call.function == "range" {
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    parts.push(self.emit_expression(argument, method)?);
                }
                return Ok(match parts.len() {
                    1 => format!("[0 .. ({}) - 1]", parts[0]),
                    2 => format!("[({}) .. ({}) - 1]", parts[0], parts[1]),
                    _ => format!(
                        "[({}), ({}) + ({}) .. ({}) - 1]",
                        parts[0], parts[0], parts[2], parts[1]
                    ),
                });
            }
        }
        match s.iterable.ty() {
            Type::Dict(_, _) => {
                self.needs_map = true;
                let source = self.emit_expression(&s.iterable, method)?;
                Ok(format!("(Map.keys {})", source))
            }
            Type::Set(_) => {
                self.needs_set = true;
                let source = self.emit_expression(&s.iterable, method)?;
                Ok(format!("(Set.toList {})", source))
            }
            _ => self.emit_expression(&s.iterable, method),
        }
    }

    fn fold_operator(
        &mut self,
        operator: BinaryOperator,
        ty: &Type,
        location: SourceLocation,
    ) -> EmitExpr {
        let _ = ty;
        match operator {
            BinaryOperator::Add => Ok("+".to_string()),
            BinaryOperator::Sub => Ok("-".to_string()),
            BinaryOperator::Mul => Ok("*".to_string()),
            _ => self.fail(
                format!("accumulation operator '{}' has no fold form", operator),
                location,
            ),
        }
    }

    // ---- main do-block path ----

    fn emit_entry_point(&mut self, module: &Module) -> Result<String, ()> {
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
            return Ok(String::new());
        }

        // a guard that only calls an int main propagates the exit code
        let direct_exit = match (guard_body, main_def) {
            (None, Some(def)) => Some(def.return_type == Type::int()),
            (Some([Statement::Expression(stmt)]), Some(def))
                if matches!(
                    &stmt.expression,
                    Expression::Call(call) if call.function == "main" && call.arguments.is_empty()
                ) =>
            {
                Some(def.return_type == Type::int())
            }
            _ => None,
        };
        if top_level.is_empty() {
            if let Some(returns_int) = direct_exit {
                return Ok(if returns_int {
                    self.needs_exit = true;
                    "main :: IO ()\nmain = do\n  code <- mgenMain\n  exitWith (if code == 0 then ExitSuccess else ExitFailure code)\n"
                        .to_string()
                } else {
                    "main :: IO ()\nmain = mgenMain\n".to_string()
                });
            }
        }

        let mut actions = Vec::new();
        let mut versions = Versions::default();
        for stmt in &top_level {
            self.emit_do_statement(stmt, &mut versions, &mut actions)?;
        }
        if let Some(body) = guard_body {
            for stmt in body {
                self.emit_do_statement(stmt, &mut versions, &mut actions)?;
            }
        }
        if actions.is_empty() {
            actions.push("return ()".to_string());
        }

        let mut out = String::from("main :: IO ()\nmain = do\n");
        for action in actions {
            out.push_str("  ");
            out.push_str(&action);
            out.push('\n');
        }
        Ok(out)
    }

    /// The in-main statement path: lets with versioned rebinding plus IO
    /// actions
    fn emit_do_statement(
        &mut self,
        stmt: &Statement,
        versions: &mut Versions,
        actions: &mut Vec<String>,
    ) -> Result<(), ()> {
        match stmt {
            Statement::Assign(s) => {
                let Some(name) = s.target.as_name() else {
                    let _ = self.fail(
                        "only name bindings are supported in main".to_string(),
                        s.location,
                    );
                    return Err(());
                };
                let value = self.emit_do_expression(&s.value, versions)?;
                let bound = versions.bind_fresh(name);
                actions.push(format!("let {} = {}", bound, value));
                Ok(())
            }
            Statement::AugAssign(s) => {
                let Some(name) = s.target.as_name() else {
                    let _ = self.fail(
                        "only name targets are supported in main".to_string(),
                        s.location,
                    );
                    return Err(());
                };
                let current = versions.resolve(name);
                let value = self.emit_do_expression(&s.value, versions)?;
                let combined =
                    self.binary_text(&current, s.operator, &value, s.target.ty(), s.location)?;
                let bound = versions.rebind(name);
                actions.push(format!("let {} = {}", bound, combined));
                Ok(())
            }
            Statement::Expression(s) => {
                // a mutating method call rebinds its receiver
                if let Expression::MethodCall(call) = &s.expression {
                    if let Type::Record(record_name) = call.receiver.ty() {
                        let mutates = self
                            .context
                            .record(record_name)
                            .and_then(|r| r.method(&call.method))
                            .map(|m| m.mutates_receiver)
                            .unwrap_or(false);
                        if mutates {
                            if let Some(receiver) = call.receiver.as_name() {
                                let call_text = self.emit_do_method(call, versions)?;
                                let bound = versions.rebind(receiver);
                                actions.push(format!("let {} = {}", bound, call_text));
                                return Ok(());
                            }
                        }
                    }
                }
                let text = self.emit_do_expression(&s.expression, versions)?;
                if s.expression.ty() == &Type::none() {
                    actions.push(text);
                } else {
                    actions.push(format!("_ <- return ({})", text));
                }
                Ok(())
            }
            Statement::For(s) => {
                // print-only loops become mapM_
                if let [Statement::Expression(stmt)] = s.body.as_slice() {
                    if let Expression::Call(call) = &stmt.expression {
                        if call.function == "print" {
                            let versions_snapshot = versions.clone();
                            let mut inner = versions_snapshot;
                            inner.bind_fresh(&s.targets[0]);
                            let argument = call.arguments.first().ok_or(())?;
                            let text = self.emit_print_value(argument, &inner)?;
                            let source = self.do_loop_source(s, versions)?;
                            actions.push(format!(
                                "mapM_ (\\{} -> {}) {}",
                                s.targets[0], text, source
                            ));
                            return Ok(());
                        }
                    }
                }
                // otherwise reuse the pure lowering and rebind
                let renamed = self.rename_for(s, versions);
                let (binding, value) = self.lower_pure_loop(&renamed, None)?;
                let bound = versions.rebind(&binding);
                actions.push(format!("let {} = {}", bound, value));
                Ok(())
            }
            Statement::If(s) => {
                let condition = self.emit_do_expression(&s.arms[0].condition, versions)?;
                let mut then_actions = Vec::new();
                let mut then_versions = versions.clone();
                for stmt in &s.arms[0].body {
                    self.emit_do_statement(stmt, &mut then_versions, &mut then_actions)?;
                }
                let mut else_actions = Vec::new();
                let mut else_versions = versions.clone();
                for stmt in &s.else_body {
                    self.emit_do_statement(stmt, &mut else_versions, &mut else_actions)?;
                }
                if else_actions.is_empty() {
                    else_actions.push("return ()".to_string());
                }
                actions.push(format!(
                    "if {} then do {} else do {}",
                    condition,
                    then_actions.join("; "),
                    else_actions.join("; ")
                ));
                Ok(())
            }
            Statement::Assert(s) => {
                let condition = self.emit_do_expression(&s.condition, versions)?;
                actions.push(format!(
                    "if not ({}) then error \"assertion failed\" else return ()",
                    condition
                ));
                Ok(())
            }
            Statement::Return(s) => {
                match &s.value {
                    Some(value) => {
                        let text = self.emit_do_expression(value, versions)?;
                        actions.push(format!("return ({})", text));
                    }
                    None => actions.push("return ()".to_string()),
                }
                Ok(())
            }
            Statement::Pass(_) | Statement::Import(_) => Ok(()),
            other => {
                let _ = self.fail(
                    "statement form has no main-block lowering".to_string(),
                    other.location(),
                );
                Err(())
            }
        }
    }

    /// Rewrites name references through the version map before pure
    /// lowering
    fn rename_for(&self, s: &ForStmt, versions: &Versions) -> ForStmt {
        let mut renamed = s.clone();
        rename_expression(&mut renamed.iterable, versions);
        for stmt in &mut renamed.body {
            rename_statement(stmt, versions);
        }
        renamed
    }

    fn do_loop_source(&mut self, s: &ForStmt, versions: &Versions) -> EmitExpr {
        let renamed = self.rename_for(s, versions);
        self.loop_source(&renamed, None)
    }

    fn emit_do_expression(&mut self, expr: &Expression, versions: &Versions) -> EmitExpr {
        let mut renamed = expr.clone();
        rename_expression(&mut renamed, versions);
        self.emit_expression(&renamed, None)
    }

    fn emit_do_method(&mut self, call: &MethodCallExpr, versions: &Versions) -> EmitExpr {
        let mut renamed = Expression::MethodCall(call.clone());
        rename_expression(&mut renamed, versions);
        self.emit_expression(&renamed, None)
    }

    fn emit_print_value(&mut self, argument: &Expression, versions: &Versions) -> EmitExpr {
        let mut renamed = argument.clone();
        rename_expression(&mut renamed, versions);
        let text = self.emit_expression(&renamed, None)?;
        Ok(match renamed.ty() {
            Type::Scalar(ScalarType::Str) => format!("putStrLn ({})", text),
            _ => format!("putStrLn (show ({}))", text),
        })
    }

    // ---- expressions ----

    fn emit_expression(
        &mut self,
        expr: &Expression,
        method: Option<(&RecordDescriptor, &str)>,
    ) -> EmitExpr {
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
                LiteralValue::Bool(v) => if *v { "True" } else { "False" }.to_string(),
                LiteralValue::Str(v) => format!("\"{}\"", escape_c_string(v)),
                LiteralValue::None => "()".to_string(),
            }),
            Expression::Name(name) => Ok(haskell_name(&name.name)),
            Expression::Binary(e) => {
                let left = self.emit_expression(&e.left, method)?;
                let right = self.emit_expression(&e.right, method)?;
                self.binary_text(&left, e.operator, &right, e.left.ty(), e.location)
            }
            Expression::Unary(e) => {
                let operand = self.emit_expression(&e.operand, method)?;
                Ok(match e.operator {
                    UnaryOperator::Neg => format!("(negate ({}))", operand),
                    UnaryOperator::Pos => operand,
                    UnaryOperator::Not => format!("(not ({}))", operand),
                })
            }
            Expression::Comparison(e) => self.emit_comparison(e, method),
            Expression::Bool(e) => {
                let left = self.emit_expression(&e.left, method)?;
                let right = self.emit_expression(&e.right, method)?;
                let op = match e.operator {
                    BoolOperator::And => "&&",
                    BoolOperator::Or => "||",
                };
                Ok(format!("({} {} {})", left, op, right))
            }
            Expression::Call(e) => self.emit_call(e, method),
            Expression::MethodCall(e) => self.emit_method_call(e, method),
            Expression::Attribute(e) => {
                if let Type::Record(record_name) = e.receiver.ty() {
                    let receiver = self.emit_expression(&e.receiver, method)?;
                    return Ok(format!(
                        "{} {}",
                        field_accessor(record_name, &e.attribute),
                        receiver
                    ));
                }
                self.fail(
                    "attribute access needs a record receiver".to_string(),
                    e.location,
                )
            }
            Expression::Subscript(e) => {
                let base = self.emit_expression(&e.receiver, method)?;
                let index = self.emit_expression(&e.index, method)?;
                match e.receiver.ty() {
                    Type::List(_) => Ok(format!("({} !! ({}))", base, index)),
                    Type::Dict(_, _) => {
                        self.needs_map = true;
                        Ok(format!("({} Map.! ({}))", base, index))
                    }
                    Type::Scalar(ScalarType::Str) => {
                        Ok(format!("[{} !! ({})]", base, index))
                    }
                    other => self.fail(
                        format!("cannot subscript {} in the Haskell backend", other),
                        e.location,
                    ),
                }
            }
            Expression::ListLiteral(e) => {
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element, method)?);
                }
                Ok(format!("[{}]", elements.join(", ")))
            }
            Expression::DictLiteral(e) => {
                self.needs_map = true;
                if e.entries.is_empty() {
                    return Ok("Map.empty".to_string());
                }
                let mut entries = Vec::new();
                for (key, value) in &e.entries {
                    let key = self.emit_expression(key, method)?;
                    let value = self.emit_expression(value, method)?;
                    entries.push(format!("({}, {})", key, value));
                }
                Ok(format!("(Map.fromList [{}])", entries.join(", ")))
            }
            Expression::SetLiteral(e) => {
                self.needs_set = true;
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element, method)?);
                }
                Ok(format!("(Set.fromList [{}])", elements.join(", ")))
            }
            Expression::TupleLiteral(e) => {
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element, method)?);
                }
                Ok(format!("({})", elements.join(", ")))
            }
            Expression::Comprehension(e) => self.emit_comprehension(e, method),
            Expression::FormattedString(e) => {
                let mut parts = Vec::new();
                for part in &e.parts {
                    match part {
                        FStringPart::Text(text) => {
                            parts.push(format!("\"{}\"", escape_c_string(text)));
                        }
                        FStringPart::Expr(inner) => {
                            let text = self.emit_expression(inner, method)?;
                            parts.push(match inner.ty() {
                                Type::Scalar(ScalarType::Str) => format!("({})", text),
                                _ => format!("show ({})", text),
                            });
                        }
                    }
                }
                Ok(format!("({})", parts.join(" ++ ")))
            }
            Expression::Conditional(e) => {
                let condition = self.emit_expression(&e.condition, method)?;
                let then_value = self.emit_expression(&e.then_value, method)?;
                let else_value = self.emit_expression(&e.else_value, method)?;
                Ok(format!(
                    "(if {} then {} else {})",
                    condition, then_value, else_value
                ))
            }
            other => self.fail(
                "expression form cannot be emitted for Haskell".to_string(),
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
        let is_list = matches!(left_ty, Type::List(_));
        Ok(match operator {
            BinaryOperator::Add if is_str || is_list => format!("({} ++ {})", left, right),
            BinaryOperator::Add => format!("({} + {})", left, right),
            BinaryOperator::Sub => format!("({} - {})", left, right),
            BinaryOperator::Mul => format!("({} * {})", left, right),
            BinaryOperator::Div if is_float => format!("({} / {})", left, right),
            BinaryOperator::Div => {
                format!("(fromIntegral ({}) / fromIntegral ({}))", left, right)
            }
            BinaryOperator::FloorDiv => format!("({} `div` {})", left, right),
            BinaryOperator::Mod => format!("({} `mod` {})", left, right),
            BinaryOperator::Pow if is_float => format!("({} ** {})", left, right),
            BinaryOperator::Pow => format!("({} ^ {})", left, right),
            _ => {
                return self.fail(
                    format!("operator '{}' has no Haskell form", operator),
                    location,
                );
            }
        })
    }

    fn emit_comparison(
        &mut self,
        e: &mgen_ir::ast::ComparisonExpr,
        method: Option<(&RecordDescriptor, &str)>,
    ) -> EmitExpr {
        use ComparisonOperator::*;
        match e.operator {
            In | NotIn => {
                let negate = e.operator == NotIn;
                let value = self.emit_expression(&e.left, method)?;
                let container = self.emit_expression(&e.right, method)?;
                let text = match e.right.ty() {
                    Type::Dict(_, _) => {
                        self.needs_map = true;
                        format!("Map.member ({}) {}", value, container)
                    }
                    Type::Set(_) => {
                        self.needs_set = true;
                        format!("Set.member ({}) {}", value, container)
                    }
                    Type::List(_) => format!("elem ({}) {}", value, container),
                    other => {
                        return self.fail(
                            format!(
                                "'in' is not supported on {} in the Haskell backend",
                                other
                            ),
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
                let left = self.emit_expression(&e.left, method)?;
                let right = self.emit_expression(&e.right, method)?;
                // inequality is spelled differently; the rest comes from
                // the shared table
                let op = match other {
                    NotEq => "/=",
                    _ => operators::comparison(other).unwrap_or("=="),
                };
                Ok(format!("({} {} {})", left, op, right))
            }
        }
    }

    fn emit_comprehension(
        &mut self,
        e: &mgen_ir::ast::ComprehensionExpr,
        method: Option<(&RecordDescriptor, &str)>,
    ) -> EmitExpr {
        let source = if let Expression::Call(call) = &*e.iterable {
            if call.function == "range" {
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    parts.push(self.emit_expression(argument, method)?);
                }
                match parts.len() {
                    1 => format!("[0 .. ({}) - 1]", parts[0]),
                    2 => format!("[({}) .. ({}) - 1]", parts[0], parts[1]),
                    _ => format!(
                        "[({}), ({}) + ({}) .. ({}) - 1]",
                        parts[0], parts[0], parts[2], parts[1]
                    ),
                }
            } else {
                self.emit_expression(&e.iterable, method)?
            }
        } else {
            self.emit_expression(&e.iterable, method)?
        };

        let element = self.emit_expression(&e.element, method)?;
        let body = match (self.native_comprehensions, &e.condition) {
            (true, Some(condition)) => {
                let condition = self.emit_expression(condition, method)?;
                format!("[{} | {} <- {}, {}]", element, e.variable, source, condition)
            }
            (true, None) => format!("[{} | {} <- {}]", element, e.variable, source),
            (false, Some(condition)) => {
                let condition = self.emit_expression(condition, method)?;
                format!(
                    "(map (\\{} -> {}) (filter (\\{} -> {}) {}))",
                    e.variable, element, e.variable, condition, source
                )
            }
            (false, None) => format!("(map (\\{} -> {}) {})", e.variable, element, source),
        };

        match e.kind {
            ComprehensionKind::List => Ok(body),
            ComprehensionKind::Set => {
                self.needs_set = true;
                Ok(format!("(Set.fromList {})", body))
            }
            ComprehensionKind::Dict => {
                self.needs_map = true;
                let value = match &e.value {
                    Some(value) => self.emit_expression(value, method)?,
                    None => return Err(()),
                };
                let pairs = format!(
                    "[({}, {}) | {} <- {}]",
                    element, value, e.variable, source
                );
                Ok(format!("(Map.fromList {})", pairs))
            }
            ComprehensionKind::Generator => self.fail(
                "generator expressions cannot be emitted".to_string(),
                e.location,
            ),
        }
    }

    fn emit_call(
        &mut self,
        e: &mgen_ir::ast::CallExpr,
        method: Option<(&RecordDescriptor, &str)>,
    ) -> EmitExpr {
        match e.function.as_str() {
            "print" => {
                let Some(argument) = e.arguments.first() else {
                    return Ok("putStrLn \"\"".to_string());
                };
                let text = self.emit_expression(argument, method)?;
                Ok(match argument.ty() {
                    Type::Scalar(ScalarType::Str) => format!("putStrLn ({})", text),
                    _ => format!("putStrLn (show ({}))", text),
                })
            }
            "len" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("len() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, method)?;
                match argument.ty() {
                    Type::Dict(_, _) => {
                        self.needs_map = true;
                        Ok(format!("(Map.size {})", text))
                    }
                    Type::Set(_) => {
                        self.needs_set = true;
                        Ok(format!("(Set.size {})", text))
                    }
                    _ => Ok(format!("(length {})", text)),
                }
            }
            "str" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("str() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, method)?;
                Ok(match argument.ty() {
                    Type::Scalar(ScalarType::Str) => text,
                    _ => format!("(show ({}))", text),
                })
            }
            "abs" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("abs() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, method)?;
                Ok(format!("(abs ({}))", text))
            }
            "sum" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("sum() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, method)?;
                Ok(format!("(sum {})", text))
            }
            "min" | "max" if e.arguments.len() == 1 => {
                let text = self.emit_expression(&e.arguments[0], method)?;
                let function = if e.function == "min" { "minimum" } else { "maximum" };
                Ok(format!("({} {})", function, text))
            }
            "int" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("int() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, method)?;
                Ok(format!("(floor ({}))", text))
            }
            "float" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("float() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, method)?;
                Ok(format!("(fromIntegral ({}))", text))
            }
            "bool" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("bool() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, method)?;
                Ok(format!("(({}) /= 0)", text))
            }
            "range" => self.fail(
                "range() is only usable in loops and comprehensions".to_string(),
                e.location,
            ),
            name => {
                if crate::is_builtin(name) {
                    return self.fail(
                        format!("builtin '{}' has no Haskell lowering", name),
                        e.location,
                    );
                }
                let mut arguments = Vec::new();
                for argument in &e.arguments {
                    arguments.push(format!("({})", self.emit_expression(argument, method)?));
                }
                if self.context.record(name).is_some() {
                    return Ok(format!("({} {})", name, arguments.join(" ")));
                }
                let callee = if name == "main" {
                    "mgenMain".to_string()
                } else {
                    haskell_name(name)
                };
                if arguments.is_empty() {
                    Ok(callee)
                } else {
                    Ok(format!("({} {})", callee, arguments.join(" ")))
                }
            }
        }
    }

    fn emit_method_call(
        &mut self,
        e: &MethodCallExpr,
        method: Option<(&RecordDescriptor, &str)>,
    ) -> EmitExpr {
        let receiver_ty = e.receiver.ty().clone();
        match &receiver_ty {
            Type::Record(record_name) => {
                // static methods take no receiver argument
                let is_static = self
                    .context
                    .record(record_name)
                    .and_then(|record| record.method(&e.method))
                    .map(|descriptor| descriptor.is_static)
                    .unwrap_or(false);
                let mut arguments = Vec::new();
                if !is_static {
                    let base = self.emit_expression(&e.receiver, method)?;
                    arguments.push(format!("({})", base));
                }
                for argument in &e.arguments {
                    arguments.push(format!("({})", self.emit_expression(argument, method)?));
                }
                if arguments.is_empty() {
                    return Ok(method_name(record_name, &e.method));
                }
                Ok(format!(
                    "({} {})",
                    method_name(record_name, &e.method),
                    arguments.join(" ")
                ))
            }
            Type::Dict(_, _) => {
                self.needs_map = true;
                let base = self.emit_expression(&e.receiver, method)?;
                match e.method.as_str() {
                    "get" if e.arguments.len() == 2 => {
                        let key = self.emit_expression(&e.arguments[0], method)?;
                        let default = self.emit_expression(&e.arguments[1], method)?;
                        Ok(format!(
                            "(Map.findWithDefault ({}) ({}) {})",
                            default, key, base
                        ))
                    }
                    "keys" => Ok(format!("(Map.keys {})", base)),
                    "values" => Ok(format!("(Map.elems {})", base)),
                    other => self.fail(
                        format!("dict method '{}' has no Haskell lowering", other),
                        e.location,
                    ),
                }
            }
            Type::Scalar(ScalarType::Str) => {
                let base = self.emit_expression(&e.receiver, method)?;
                match e.method.as_str() {
                    "split" if e.arguments.is_empty() => {
                        // qualified so a local named `words` cannot shadow it
                        Ok(format!("(Prelude.words {})", base))
                    }
                    "join" => {
                        let parts = self.emit_expression(&e.arguments[0], method)?;
                        Ok(format!(
                            "(concat (zipWith (++) (\"\" : repeat ({})) {}))",
                            base, parts
                        ))
                    }
                    "upper" => Ok(format!(
                        "(map (\\c -> if c >= 'a' && c <= 'z' then toEnum (fromEnum c - 32) else c) {})",
                        base
                    )),
                    "strip" if e.arguments.is_empty() => Ok(format!(
                        "(dropWhile (== ' ') (reverse (dropWhile (== ' ') (reverse {}))))",
                        base
                    )),
                    other => self.fail(
                        format!("string method '{}' has no Haskell lowering", other),
                        e.location,
                    ),
                }
            }
            other => self.fail(
                format!("cannot call a method on {} in the Haskell backend", other),
                e.location,
            ),
        }
    }
}

// ---- name plumbing and renaming ----

/// `Counter` + `n` → `counterN`
fn field_accessor(record: &str, field: &str) -> String {
    format!("{}{}", lower_first(record), upper_first(field))
}

/// `Counter` + `bump` → `counterBump`
fn method_name(record: &str, method: &str) -> String {
    format!("{}{}", lower_first(record), upper_first(&haskell_name(method)))
}

/// snake_case → camelCase, since Haskell identifiers start lowercase
fn haskell_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The source name behind a (possibly versioned) emitted name
fn original_name(versions: &Versions, current: &str) -> String {
    versions
        .current
        .iter()
        .find(|(_, v)| v.as_str() == current)
        .map(|(k, _)| k.clone())
        .unwrap_or_else(|| current.to_string())
}

fn rename_statement(stmt: &mut Statement, versions: &Versions) {
    match stmt {
        Statement::Assign(AssignStmt { target, value, .. }) => {
            rename_expression(target, versions);
            rename_expression(value, versions);
        }
        Statement::AugAssign(AugAssignStmt { target, value, .. }) => {
            rename_expression(target, versions);
            rename_expression(value, versions);
        }
        Statement::Expression(s) => rename_expression(&mut s.expression, versions),
        Statement::Return(s) => {
            if let Some(value) = &mut s.value {
                rename_expression(value, versions);
            }
        }
        Statement::If(s) => {
            for arm in &mut s.arms {
                rename_expression(&mut arm.condition, versions);
                for stmt in &mut arm.body {
                    rename_statement(stmt, versions);
                }
            }
            for stmt in &mut s.else_body {
                rename_statement(stmt, versions);
            }
        }
        Statement::For(s) => {
            rename_expression(&mut s.iterable, versions);
            for stmt in &mut s.body {
                rename_statement(stmt, versions);
            }
        }
        Statement::While(s) => {
            rename_expression(&mut s.condition, versions);
            for stmt in &mut s.body {
                rename_statement(stmt, versions);
            }
        }
        _ => {}
    }
}

fn rename_expression(expr: &mut Expression, versions: &Versions) {
    match expr {
        Expression::Name(name) => {
            name.name = versions.resolve(&name.name);
        }
        Expression::Binary(e) => {
            rename_expression(&mut e.left, versions);
            rename_expression(&mut e.right, versions);
        }
        Expression::Unary(e) => rename_expression(&mut e.operand, versions),
        Expression::Comparison(e) => {
            rename_expression(&mut e.left, versions);
            rename_expression(&mut e.right, versions);
        }
        Expression::Bool(e) => {
            rename_expression(&mut e.left, versions);
            rename_expression(&mut e.right, versions);
        }
        Expression::Call(e) => {
            for argument in &mut e.arguments {
                rename_expression(argument, versions);
            }
        }
        Expression::MethodCall(e) => {
            rename_expression(&mut e.receiver, versions);
            for argument in &mut e.arguments {
                rename_expression(argument, versions);
            }
        }
        Expression::Attribute(e) => rename_expression(&mut e.receiver, versions),
        Expression::Subscript(e) => {
            rename_expression(&mut e.receiver, versions);
            rename_expression(&mut e.index, versions);
        }
        Expression::ListLiteral(e) | Expression::SetLiteral(e) | Expression::TupleLiteral(e) => {
            for element in &mut e.elements {
                rename_expression(element, versions);
            }
        }
        Expression::DictLiteral(e) => {
            for (key, value) in &mut e.entries {
                rename_expression(key, versions);
                rename_expression(value, versions);
            }
        }
        Expression::Comprehension(e) => {
            rename_expression(&mut e.element, versions);
            if let Some(value) = &mut e.value {
                rename_expression(value, versions);
            }
            rename_expression(&mut e.iterable, versions);
            if let Some(condition) = &mut e.condition {
                rename_expression(condition, versions);
            }
        }
        Expression::FormattedString(e) => {
            for part in &mut e.parts {
                if let FStringPart::Expr(inner) = part {
                    rename_expression(inner, versions);
                }
            }
        }
        Expression::Conditional(e) => {
            rename_expression(&mut e.then_value, versions);
            rename_expression(&mut e.condition, versions);
            rename_expression(&mut e.else_value, versions);
        }
        _ => {}
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
