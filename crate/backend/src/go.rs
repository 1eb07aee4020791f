//! Go backend
//!
//! Receiver methods with exported field names, `:=` on first binding and
//! `=` on reassignment tracked through a declared-set, and comprehensions
//! through either generic runtime helpers or type-specialized loops
//! depending on the `use_generics` preference.

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

/// Preferences understood by the Go backend
pub const SCHEMA: &[PrefSpec] = &[
    PrefSpec::choice(
        "go_version",
        "1.21",
        &["1.18", "1.21", "1.22"],
        "go directive written to the build descriptor",
    ),
    PrefSpec::bool(
        "use_generics",
        true,
        "lower comprehensions through generic helpers instead of loops",
    ),
    PrefSpec::int("indent_size", 4, "spaces per indentation level"),
];

pub fn factory(prefs: Preferences) -> Box<dyn Backend> {
    Box::new(GoBackend { prefs })
}

pub struct GoBackend {
    prefs: Preferences,
}

type EmitExpr = Result<String, ()>;

impl Backend for GoBackend {
    fn name(&self) -> &'static str {
        "go"
    }

    fn file_extension(&self) -> &'static str {
        "go"
    }

    fn map_type(&self, ty: &Type, context: &CompilationContext) -> Option<String> {
        let registry = registry_for(context);
        registry.descriptor(ty).map(|d| d.target_name)
    }

    fn map_builtin(&self, name: &str) -> Option<&'static str> {
        match name {
            "print" => Some("fmt.Println"),
            "len" => Some("len"),
            "str" => Some("fmt.Sprint"),
            "abs" => Some("math.Abs"),
            _ => None,
        }
    }

    fn emit(
        &mut self,
        module: &Module,
        context: &CompilationContext,
    ) -> Result<String, Vec<Diagnostic>> {
        let registry = registry_for(context);
        let indent = self.prefs.get_int("indent_size").max(1) as usize;
        let use_generics = self.prefs.get_bool("use_generics");
        let mut emitter = GoEmitter {
            context,
            registry: &registry,
            diagnostics: Vec::new(),
            indent,
            use_generics,
            receiver: None,
            needs_fmt: false,
            needs_os: false,
            needs_strings: false,
            needs_math: false,
            needs_floordiv: false,
            needs_ipow: false,
            needs_helpers: false,
        };
        emitter.emit_module(module)
    }

    fn build_descriptor(&self, module_name: &str) -> Option<(String, String)> {
        let version = self.prefs.get_str("go_version");
        Some((
            "go.mod".to_string(),
            format!("module {}\n\ngo {}\n", module_name, version),
        ))
    }
}

fn registry_for(context: &CompilationContext) -> TargetTypeRegistry {
    let mut registry = TargetTypeRegistry::new(Target::Go);
    for record in context.records() {
        registry.register_record(&record.name);
    }
    registry
}

struct GoEmitter<'a> {
    context: &'a CompilationContext,
    registry: &'a TargetTypeRegistry,
    diagnostics: Vec<Diagnostic>,
    indent: usize,
    use_generics: bool,
    receiver: Option<String>,
    needs_fmt: bool,
    needs_os: bool,
    needs_strings: bool,
    needs_math: bool,
    needs_floordiv: bool,
    needs_ipow: bool,
    needs_helpers: bool,
}

impl<'a> GoEmitter<'a> {
    fn fail(&mut self, message: String, location: SourceLocation) -> EmitExpr {
        self.diagnostics
            .push(Diagnostic::error(ErrorCode::CodegenFailure, message, location));
        Err(())
    }

    fn type_name(&mut self, ty: &Type, location: SourceLocation) -> EmitExpr {
        match self.registry.descriptor(ty) {
            Some(descriptor) => Ok(descriptor.target_name),
            None => self.fail(format!("type {} has no Go mapping", ty), location),
        }
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

        let mut out = String::from("package main\n\n");
        let mut imports = Vec::new();
        if self.needs_fmt {
            imports.push("\"fmt\"");
        }
        if self.needs_math {
            imports.push("\"math\"");
        }
        if self.needs_os {
            imports.push("\"os\"");
        }
        if self.needs_strings {
            imports.push("\"strings\"");
        }
        match imports.len() {
            0 => {}
            1 => out.push_str(&format!("import {}\n\n", imports[0])),
            _ => {
                out.push_str("import (\n");
                for import in imports {
                    out.push_str(&format!("    {}\n", import));
                }
                out.push_str(")\n\n");
            }
        }
        out.push_str(&self.runtime());
        out.push_str(&records.finish());
        out.push_str(&bodies.finish());
        Ok(out)
    }

    fn runtime(&self) -> String {
        let mut out = String::new();
        if self.needs_floordiv {
            out.push_str(
                "func mgenFloorDiv(a int, b int) int {\n    q := a / b\n    if (a%b != 0) && ((a < 0) != (b < 0)) {\n        q--\n    }\n    return q\n}\n\nfunc mgenMod(a int, b int) int {\n    r := a % b\n    if r != 0 && ((r < 0) != (b < 0)) {\n        r += b\n    }\n    return r\n}\n\n",
            );
        }
        if self.needs_ipow {
            out.push_str(
                "func mgenIpow(base int, exp int) int {\n    out := 1\n    for exp > 0 {\n        if exp%2 == 1 {\n            out *= base\n        }\n        base *= base\n        exp /= 2\n    }\n    return out\n}\n\n",
            );
        }
        if self.needs_helpers {
            out.push_str(
                "func mgenRange(start int, stop int, step int) []int {\n    out := []int{}\n    for i := start; i < stop; i += step {\n        out = append(out, i)\n    }\n    return out\n}\n\nfunc mgenMap[T any, U any](xs []T, f func(T) U) []U {\n    out := make([]U, 0, len(xs))\n    for _, x := range xs {\n        out = append(out, f(x))\n    }\n    return out\n}\n\nfunc mgenFilter[T any](xs []T, f func(T) bool) []T {\n    out := []T{}\n    for _, x := range xs {\n        if f(x) {\n            out = append(out, x)\n        }\n    }\n    return out\n}\n\n",
            );
        }
        out
    }

    // ---- records ----

    fn emit_record(
        &mut self,
        writer: &mut CodeWriter,
        record: &RecordDescriptor,
        class_def: &mgen_ir::ast::ClassDef,
    ) {
        writer.line(format!("type {} struct {{", record.name));
        writer.indent();
        for (field, ty) in &record.fields {
            if let Ok(name) = self.type_name(ty, class_def.location) {
                writer.line(format!("{} {}", exported(field), name));
            }
        }
        writer.dedent();
        writer.line("}");
        writer.blank();

        // constructor
        let mut params = Vec::new();
        let mut inits = Vec::new();
        for (field, ty) in &record.fields {
            if let Ok(name) = self.type_name(ty, class_def.location) {
                params.push(format!("{} {}", field, name));
                inits.push(format!("{}: {}", exported(field), field));
            }
        }
        writer.line(format!(
            "func New{}({}) {} {{",
            record.name,
            params.join(", "),
            record.name
        ));
        writer.indent();
        writer.line(format!("return {}{{{}}}", record.name, inits.join(", ")));
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

        let mut params = Vec::new();
        for param in def.parameters.iter().skip(if is_static { 0 } else { 1 }) {
            match self.type_name(&param.ty, param.location) {
                Ok(name) => params.push(format!("{} {}", param.name, name)),
                Err(()) => return,
            }
        }
        let return_clause = match self.return_clause(&def.return_type, def.location) {
            Ok(clause) => clause,
            Err(()) => return,
        };

        // Go has no static methods; a @staticmethod becomes a free
        // function prefixed with the record name
        if is_static {
            writer.line(format!(
                "func {}{}({}){} {{",
                record.name,
                exported(&def.name),
                params.join(", "),
                return_clause
            ));
            writer.indent();
            self.receiver = None;
            let mut declared: HashSet<String> =
                def.parameters.iter().map(|p| p.name.clone()).collect();
            for stmt in &def.body {
                self.emit_statement(writer, stmt, &mut declared);
            }
            writer.dedent();
            writer.line("}");
            writer.blank();
            return;
        }

        let receiver_name = def
            .parameters
            .first()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "self".to_string());
        let receiver_type = if mutates {
            format!("*{}", record.name)
        } else {
            record.name.clone()
        };
        writer.line(format!(
            "func ({} {}) {}({}){} {{",
            receiver_name,
            receiver_type,
            exported(&def.name),
            params.join(", "),
            return_clause
        ));
        writer.indent();
        self.receiver = Some(receiver_name);
        let mut declared: HashSet<String> =
            def.parameters.iter().map(|p| p.name.clone()).collect();
        for stmt in &def.body {
            self.emit_statement(writer, stmt, &mut declared);
        }
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
        Ok(format!(" {}", name))
    }

    fn emit_function(&mut self, writer: &mut CodeWriter, def: &FunctionDef) {
        let name = if def.name == "main" {
            "mgenMain".to_string()
        } else {
            def.name.clone()
        };
        let mut params = Vec::new();
        for param in &def.parameters {
            match self.type_name(&param.ty, param.location) {
                Ok(type_name) => params.push(format!("{} {}", param.name, type_name)),
                Err(()) => return,
            }
        }
        let Ok(return_clause) = self.return_clause(&def.return_type, def.location) else {
            return;
        };
        writer.line(format!(
            "func {}({}){} {{",
            name,
            params.join(", "),
            return_clause
        ));
        writer.indent();
        let mut declared: HashSet<String> =
            def.parameters.iter().map(|p| p.name.clone()).collect();
        for stmt in &def.body {
            self.emit_statement(writer, stmt, &mut declared);
        }
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

        writer.line("func main() {");
        writer.indent();
        let mut declared = HashSet::new();
        for stmt in top_level {
            self.emit_statement(writer, stmt, &mut declared);
        }
        let returns_int = main_def
            .map(|def| def.return_type == Type::int())
            .unwrap_or(false);
        match guard_body {
            // a guard that just calls main() propagates the exit code
            Some(body) if query::guard_calls_main(body) => {
                if returns_int {
                    self.needs_os = true;
                    writer.line("os.Exit(mgenMain())");
                } else {
                    writer.line("mgenMain()");
                }
            }
            Some(body) => {
                for stmt in body {
                    self.emit_statement(writer, stmt, &mut declared);
                }
            }
            None => {
                if main_def.is_some() {
                    if returns_int {
                        self.needs_os = true;
                        writer.line("os.Exit(mgenMain())");
                    } else {
                        writer.line("mgenMain()");
                    }
                }
            }
        }
        writer.dedent();
        writer.line("}");
    }

    // ---- statements ----

    fn emit_statement(
        &mut self,
        writer: &mut CodeWriter,
        stmt: &Statement,
        declared: &mut HashSet<String>,
    ) {
        match stmt {
            Statement::Assign(s) => self.emit_assign(writer, s, declared),
            Statement::AugAssign(s) => {
                let Ok(target) = self.emit_expression(&s.target) else {
                    return;
                };
                let Ok(value) = self.emit_expression(&s.value) else {
                    return;
                };
                match operators::augmented(s.operator) {
                    Some(op) => writer.line(format!("{} {} {}", target, op, value)),
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
                        writer.line(format!("{} = {}", target, full));
                    }
                }
            }
            Statement::Expression(s) => {
                // `xs.append(v)` must reassign in Go
                if let Expression::MethodCall(call) = &s.expression {
                    if call.method == "append" {
                        if let (Type::List(_), Some(argument)) =
                            (call.receiver.ty(), call.arguments.first())
                        {
                            let Ok(base) = self.emit_expression(&call.receiver) else {
                                return;
                            };
                            let Ok(value) = self.emit_expression(argument) else {
                                return;
                            };
                            writer.line(format!("{} = append({}, {})", base, base, value));
                            return;
                        }
                    }
                }
                if let Ok(text) = self.emit_expression(&s.expression) {
                    writer.line(text);
                }
            }
            Statement::Return(s) => match &s.value {
                Some(value) => {
                    if let Ok(text) = self.emit_expression(value) {
                        writer.line(format!("return {}", text));
                    }
                }
                None => writer.line("return"),
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
                writer.line(format!("for {} {{", condition));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt, declared);
                }
                writer.dedent();
                writer.line("}");
            }
            Statement::For(s) => self.emit_for(writer, s, declared),
            Statement::Break(_) => writer.line("break"),
            Statement::Continue(_) => writer.line("continue"),
            Statement::Pass(_) => {}
            Statement::Assert(s) => {
                let Ok(condition) = self.emit_expression(&s.condition) else {
                    return;
                };
                self.needs_fmt = true;
                self.needs_os = true;
                writer.line(format!("if !({}) {{", condition));
                writer.indent();
                match &s.message {
                    Some(Expression::Literal(lit)) => {
                        if let LiteralValue::Str(text) = &lit.value {
                            writer.line(format!(
                                "fmt.Println(\"assertion failed: {}\")",
                                escape_c_string(text)
                            ));
                        } else {
                            writer.line("fmt.Println(\"assertion failed\")");
                        }
                    }
                    _ => writer.line("fmt.Println(\"assertion failed\")"),
                }
                writer.line("os.Exit(1)");
                writer.dedent();
                writer.line("}");
            }
            Statement::Import(_) => {}
            other => {
                let _ = self.fail(
                    "statement form cannot be emitted for Go".to_string(),
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
        let Ok(value) = self.emit_expression(&s.value) else {
            return;
        };
        if let Some(name) = s.target.as_name() {
            if declared.contains(name) {
                writer.line(format!("{} = {}", name, value));
            } else {
                declared.insert(name.to_string());
                writer.line(format!("{} := {}", name, value));
            }
            return;
        }
        if let Ok(target) = self.emit_expression(&s.target) {
            writer.line(format!("{} = {}", target, value));
        }
    }

    fn emit_for(&mut self, writer: &mut CodeWriter, s: &ForStmt, declared: &mut HashSet<String>) {
        let mut body_declared = declared.clone();
        for target in &s.targets {
            body_declared.insert(target.clone());
        }

        if let Expression::Call(call) = &s.iterable {
            if call.function == "range" {
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    let Ok(text) = self.emit_expression(argument) else {
                        return;
                    };
                    parts.push(text);
                }
                let (start, stop, step) = match parts.len() {
                    1 => ("0".to_string(), parts[0].clone(), "1".to_string()),
                    2 => (parts[0].clone(), parts[1].clone(), "1".to_string()),
                    _ => (parts[0].clone(), parts[1].clone(), parts[2].clone()),
                };
                let variable = &s.targets[0];
                writer.line(format!(
                    "for {} := {}; {} < {}; {} += {} {{",
                    variable, start, variable, stop, variable, step
                ));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt, &mut body_declared);
                }
                writer.dedent();
                writer.line("}");
                return;
            }
        }

        if let Expression::MethodCall(call) = &s.iterable {
            if call.method == "items" && s.targets.len() == 2 {
                let Ok(source) = self.emit_expression(&call.receiver) else {
                    return;
                };
                writer.line(format!(
                    "for {}, {} := range {} {{",
                    s.targets[0], s.targets[1], source
                ));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt, &mut body_declared);
                }
                writer.dedent();
                writer.line("}");
                return;
            }
        }

        let Ok(source) = self.emit_expression(&s.iterable) else {
            return;
        };
        let header = match s.iterable.ty() {
            Type::List(_) => format!("for _, {} := range {} {{", s.targets[0], source),
            Type::Dict(_, _) | Type::Set(_) => {
                format!("for {} := range {} {{", s.targets[0], source)
            }
            Type::Scalar(ScalarType::Str) => {
                format!("for _, {} := range {} {{", s.targets[0], source)
            }
            other => {
                let _ = self.fail(
                    format!("cannot iterate a value of type {}", other),
                    s.location,
                );
                return;
            }
        };
        writer.line(header);
        writer.indent();
        for stmt in &s.body {
            self.emit_statement(writer, stmt, &mut body_declared);
        }
        writer.dedent();
        writer.line("}");
    }

    // ---- expressions ----

    fn emit_expression(&mut self, expr: &Expression) -> EmitExpr {
        match expr {
            Expression::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Int(v) => v.to_string(),
                LiteralValue::Float(v) => format_float(*v),
                LiteralValue::Bool(v) => if *v { "true" } else { "false" }.to_string(),
                LiteralValue::Str(v) => format!("\"{}\"", escape_c_string(v)),
                LiteralValue::None => "nil".to_string(),
            }),
            Expression::Name(name) => Ok(name.name.clone()),
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
                let base = self.emit_expression(&e.receiver)?;
                Ok(format!("{}.{}", base, exported(&e.attribute)))
            }
            Expression::Subscript(e) => {
                let base = self.emit_expression(&e.receiver)?;
                let index = self.emit_expression(&e.index)?;
                match e.receiver.ty() {
                    Type::List(_) | Type::Dict(_, _) => Ok(format!("{}[{}]", base, index)),
                    Type::Scalar(ScalarType::Str) => {
                        Ok(format!("string({}[{}])", base, index))
                    }
                    other => self.fail(
                        format!("cannot subscript {} in the Go backend", other),
                        e.location,
                    ),
                }
            }
            Expression::Slice(e) => {
                let base = self.emit_expression(&e.receiver)?;
                let lower = match &e.lower {
                    Some(lower) => self.emit_expression(lower)?,
                    None => String::new(),
                };
                let upper = match &e.upper {
                    Some(upper) => self.emit_expression(upper)?,
                    None => String::new(),
                };
                Ok(format!("{}[{}:{}]", base, lower, upper))
            }
            Expression::ListLiteral(e) => {
                let type_name = self.type_name(&e.ty, e.location)?;
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element)?);
                }
                Ok(format!("{}{{{}}}", type_name, elements.join(", ")))
            }
            Expression::SetLiteral(e) => {
                let type_name = self.type_name(&e.ty, e.location)?;
                let mut entries = Vec::new();
                for element in &e.elements {
                    entries.push(format!("{}: true", self.emit_expression(element)?));
                }
                Ok(format!("{}{{{}}}", type_name, entries.join(", ")))
            }
            Expression::DictLiteral(e) => {
                let type_name = self.type_name(&e.ty, e.location)?;
                let mut entries = Vec::new();
                for (key, value) in &e.entries {
                    let key = self.emit_expression(key)?;
                    let value = self.emit_expression(value)?;
                    entries.push(format!("{}: {}", key, value));
                }
                Ok(format!("{}{{{}}}", type_name, entries.join(", ")))
            }
            Expression::Comprehension(e) => self.emit_comprehension(e),
            Expression::FormattedString(e) => {
                self.needs_fmt = true;
                let mut fmt = String::new();
                let mut args = Vec::new();
                for part in &e.parts {
                    match part {
                        FStringPart::Text(text) => fmt.push_str(&escape_c_string(text)),
                        FStringPart::Expr(inner) => {
                            fmt.push_str("%v");
                            args.push(self.emit_expression(inner)?);
                        }
                    }
                }
                if args.is_empty() {
                    Ok(format!("\"{}\"", fmt))
                } else {
                    Ok(format!("fmt.Sprintf(\"{}\", {})", fmt, args.join(", ")))
                }
            }
            Expression::Conditional(e) => {
                // Go has no conditional expression; use an immediate
                // function
                let result = self.type_name(&e.ty, e.location)?;
                let condition = self.emit_expression(&e.condition)?;
                let then_value = self.emit_expression(&e.then_value)?;
                let else_value = self.emit_expression(&e.else_value)?;
                Ok(format!(
                    "(func() {} {{ if {} {{ return {} }}; return {} }})()",
                    result, condition, then_value, else_value
                ))
            }
            other => self.fail(
                "expression form cannot be emitted for Go".to_string(),
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
                    self.needs_math = true;
                    Ok(format!("math.Pow({}, {})", left, right))
                } else {
                    self.needs_ipow = true;
                    Ok(format!("mgenIpow({}, {})", left, right))
                }
            }
            BinaryOperator::FloorDiv => {
                self.needs_floordiv = true;
                Ok(format!("mgenFloorDiv({}, {})", left, right))
            }
            BinaryOperator::Mod if left_ty == &Type::int() => {
                self.needs_floordiv = true;
                Ok(format!("mgenMod({}, {})", left, right))
            }
            BinaryOperator::Div if left_ty == &Type::int() => {
                Ok(format!("(float64({}) / float64({}))", left, right))
            }
            other => match operators::binary(other) {
                Some(op) => Ok(format!("({} {} {})", left, op, right)),
                None => self.fail(format!("operator '{}' has no Go form", other), location),
            },
        }
    }

    fn emit_comparison(&mut self, e: &mgen_ir::ast::ComparisonExpr) -> EmitExpr {
        use ComparisonOperator::*;
        match e.operator {
            In | NotIn => {
                let negate = e.operator == NotIn;
                let value = self.emit_expression(&e.left)?;
                let container = self.emit_expression(&e.right)?;
                let text = match e.right.ty() {
                    Type::Set(_) => format!("{}[{}]", container, value),
                    Type::Dict(_, _) => {
                        format!(
                            "(func() bool {{ _, ok := {}[{}]; return ok }})()",
                            container, value
                        )
                    }
                    Type::Scalar(ScalarType::Str) => {
                        self.needs_strings = true;
                        format!("strings.Contains({}, {})", container, value)
                    }
                    Type::List(_) => {
                        return self.fail(
                            "'in' on lists needs a loop in the Go backend".to_string(),
                            e.location,
                        );
                    }
                    other => {
                        return self.fail(
                            format!("'in' is not supported on {} in the Go backend", other),
                            e.location,
                        );
                    }
                };
                Ok(if negate { format!("!{}", text) } else { text })
            }
            other => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                match operators::comparison(other) {
                    Some(op) => Ok(format!("({} {} {})", left, op, right)),
                    None => self.fail(
                        format!("comparison '{}' has no Go form", other),
                        e.location,
                    ),
                }
            }
        }
    }

    /// Generic helpers when `use_generics` is set, otherwise a
    /// type-specialized immediate loop
    fn emit_comprehension(&mut self, e: &ComprehensionExpr) -> EmitExpr {
        let element_src_ty = match e.iterable.ty() {
            Type::List(element) => (**element).clone(),
            _ => Type::int(),
        };
        let source = if let Expression::Call(call) = &*e.iterable {
            if call.function == "range" {
                self.needs_helpers = true;
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    parts.push(self.emit_expression(argument)?);
                }
                match parts.len() {
                    1 => format!("mgenRange(0, {}, 1)", parts[0]),
                    2 => format!("mgenRange({}, {}, 1)", parts[0], parts[1]),
                    _ => format!("mgenRange({}, {}, {})", parts[0], parts[1], parts[2]),
                }
            } else {
                self.emit_expression(&e.iterable)?
            }
        } else {
            self.emit_expression(&e.iterable)?
        };

        if self.use_generics && e.kind == ComprehensionKind::List {
            self.needs_helpers = true;
            let source_type = self.type_name(&element_src_ty, e.location)?;
            let mut chain = source;
            if let Some(condition) = &e.condition {
                let condition = self.emit_expression(condition)?;
                chain = format!(
                    "mgenFilter({}, func({} {}) bool {{ return {} }})",
                    chain, e.variable, source_type, condition
                );
            }
            let element = self.emit_expression(&e.element)?;
            let result_elem = match &e.ty {
                Type::List(element) => self.type_name(element, e.location)?,
                _ => "int".to_string(),
            };
            return Ok(format!(
                "mgenMap({}, func({} {}) {} {{ return {} }})",
                chain, e.variable, source_type, result_elem, element
            ));
        }

        // specialized immediate loop
        let result_type = self.type_name(&e.ty, e.location)?;
        let mut writer = CodeWriter::new(self.indent);
        writer.raw(&format!("(func() {} {{\n", result_type));
        writer.indent();
        writer.line(format!("acc := {}{{}}", result_type));
        writer.line(format!("for _, {} := range {} {{", e.variable, source));
        writer.indent();
        let guarded = e.condition.is_some();
        if let Some(condition) = &e.condition {
            let condition = self.emit_expression(condition)?;
            writer.line(format!("if {} {{", condition));
            writer.indent();
        }
        let element = self.emit_expression(&e.element)?;
        match e.kind {
            ComprehensionKind::List => writer.line(format!("acc = append(acc, {})", element)),
            ComprehensionKind::Set => writer.line(format!("acc[{}] = true", element)),
            ComprehensionKind::Dict => {
                let value = match &e.value {
                    Some(value) => self.emit_expression(value)?,
                    None => return Err(()),
                };
                writer.line(format!("acc[{}] = {}", element, value));
            }
            ComprehensionKind::Generator => {
                return self.fail(
                    "generator expressions cannot be emitted".to_string(),
                    e.location,
                );
            }
        }
        if guarded {
            writer.dedent();
            writer.line("}");
        }
        writer.dedent();
        writer.line("}");
        writer.line("return acc");
        writer.dedent();
        writer.raw("})()");
        Ok(writer.finish())
    }

    fn emit_call(&mut self, e: &mgen_ir::ast::CallExpr) -> EmitExpr {
        match e.function.as_str() {
            "print" => {
                self.needs_fmt = true;
                let Some(argument) = e.arguments.first() else {
                    return Ok("fmt.Println()".to_string());
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("fmt.Println({})", text))
            }
            "len" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("len() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("len({})", text))
            }
            "str" => {
                self.needs_fmt = true;
                let Some(argument) = e.arguments.first() else {
                    return self.fail("str() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("fmt.Sprint({})", text))
            }
            "abs" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("abs() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                if argument.ty() == &Type::float() {
                    self.needs_math = true;
                    Ok(format!("math.Abs({})", text))
                } else {
                    Ok(format!(
                        "(func() int {{ if {} < 0 {{ return -({}) }}; return {} }})()",
                        text, text, text
                    ))
                }
            }
            "int" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("int() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("int({})", text))
            }
            "float" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("float() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("float64({})", text))
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
                        format!("builtin '{}' has no Go lowering", name),
                        e.location,
                    );
                }
                let mut arguments = Vec::new();
                for argument in &e.arguments {
                    arguments.push(self.emit_expression(argument)?);
                }
                if self.context.record(name).is_some() {
                    return Ok(format!("New{}({})", name, arguments.join(", ")));
                }
                let callee = if name == "main" { "mgenMain" } else { name };
                Ok(format!("{}({})", callee, arguments.join(", ")))
            }
        }
    }

    fn emit_method_call(&mut self, e: &MethodCallExpr) -> EmitExpr {
        let base = self.emit_expression(&e.receiver)?;
        let receiver_ty = e.receiver.ty().clone();
        let mut arguments = Vec::new();
        for argument in &e.arguments {
            arguments.push(self.emit_expression(argument)?);
        }

        match &receiver_ty {
            Type::Record(record_name) => {
                // static methods are free functions prefixed with the
                // record name
                let is_static = self
                    .context
                    .record(record_name)
                    .and_then(|record| record.method(&e.method))
                    .map(|method| method.is_static)
                    .unwrap_or(false);
                if is_static {
                    Ok(format!(
                        "{}{}({})",
                        record_name,
                        exported(&e.method),
                        arguments.join(", ")
                    ))
                } else {
                    Ok(format!(
                        "{}.{}({})",
                        base,
                        exported(&e.method),
                        arguments.join(", ")
                    ))
                }
            }
            Type::List(_) => match e.method.as_str() {
                // bare `append` expressions are rewritten at statement
                // level; anything else is unsupported
                "append" => self.fail(
                    "append is only usable as a statement in the Go backend".to_string(),
                    e.location,
                ),
                other => self.fail(
                    format!("list method '{}' has no Go lowering", other),
                    e.location,
                ),
            },
            Type::Set(_) => match e.method.as_str() {
                "add" => Ok(format!("{}[{}] = true", base, arguments[0])),
                "discard" | "remove" => Ok(format!("delete({}, {})", base, arguments[0])),
                other => self.fail(
                    format!("set method '{}' has no Go lowering", other),
                    e.location,
                ),
            },
            Type::Dict(_, value_ty) => match e.method.as_str() {
                "get" if arguments.len() == 2 => {
                    let value_type = self.type_name(value_ty, e.location)?;
                    Ok(format!(
                        "(func() {} {{ if v, ok := {}[{}]; ok {{ return v }}; return {} }})()",
                        value_type, base, arguments[0], arguments[1]
                    ))
                }
                other => self.fail(
                    format!("dict method '{}' has no Go lowering", other),
                    e.location,
                ),
            },
            Type::Scalar(ScalarType::Str) => {
                self.needs_strings = true;
                match e.method.as_str() {
                    "split" if arguments.is_empty() => Ok(format!("strings.Fields({})", base)),
                    "join" => Ok(format!("strings.Join({}, {})", arguments[0], base)),
                    "upper" => Ok(format!("strings.ToUpper({})", base)),
                    "lower" => Ok(format!("strings.ToLower({})", base)),
                    "strip" if arguments.is_empty() => {
                        Ok(format!("strings.TrimSpace({})", base))
                    }
                    "find" => Ok(format!("strings.Index({}, {})", base, arguments[0])),
                    "startswith" => {
                        Ok(format!("strings.HasPrefix({}, {})", base, arguments[0]))
                    }
                    "endswith" => Ok(format!("strings.HasSuffix({}, {})", base, arguments[0])),
                    "replace" => Ok(format!(
                        "strings.ReplaceAll({}, {}, {})",
                        base, arguments[0], arguments[1]
                    )),
                    other => self.fail(
                        format!("string method '{}' has no Go lowering", other),
                        e.location,
                    ),
                }
            }
            other => self.fail(
                format!("cannot call a method on {} in the Go backend", other),
                e.location,
            ),
        }
    }
}

/// `n` → `N`, for exported Go field and method names
fn exported(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
