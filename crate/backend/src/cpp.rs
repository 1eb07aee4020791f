//! C++ backend
//!
//! Uses the standard library's containers and strings directly. Records
//! become classes with member functions; nested containers map through
//! template nesting; comprehensions lower to immediately-invoked lambdas
//! so they stay usable in any expression position.

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

/// Preferences understood by the C++ backend
pub const SCHEMA: &[PrefSpec] = &[
    PrefSpec::choice(
        "cpp_standard",
        "c++17",
        &["c++17", "c++20"],
        "language standard targeted by the emitted code",
    ),
    PrefSpec::bool("use_modern_features", true, "prefer newer idioms"),
    PrefSpec::int("indent_size", 4, "spaces per indentation level"),
];

pub fn factory(prefs: Preferences) -> Box<dyn Backend> {
    Box::new(CppBackend { prefs })
}

pub struct CppBackend {
    prefs: Preferences,
}

type EmitExpr = Result<String, ()>;

impl Backend for CppBackend {
    fn name(&self) -> &'static str {
        "cpp"
    }

    fn file_extension(&self) -> &'static str {
        "cpp"
    }

    fn map_type(&self, ty: &Type, context: &CompilationContext) -> Option<String> {
        let registry = registry_for(context);
        registry.descriptor(ty).map(|d| d.target_name)
    }

    fn map_builtin(&self, name: &str) -> Option<&'static str> {
        match name {
            "print" => Some("std::cout"),
            "len" => Some("size"),
            "str" => Some("std::to_string"),
            "abs" => Some("std::abs"),
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
        let mut emitter = CppEmitter {
            context,
            registry: &registry,
            diagnostics: Vec::new(),
            indent,
            declared: HashSet::new(),
            needs_split: false,
            needs_join: false,
            needs_ipow: false,
            needs_floordiv: false,
            needs_algorithm: false,
        };
        emitter.emit_module(module)
    }
}

fn registry_for(context: &CompilationContext) -> TargetTypeRegistry {
    let mut registry = TargetTypeRegistry::new(Target::Cpp);
    for record in context.records() {
        registry.register_record(&record.name);
    }
    registry
}

struct CppEmitter<'a> {
    context: &'a CompilationContext,
    registry: &'a TargetTypeRegistry,
    diagnostics: Vec<Diagnostic>,
    indent: usize,
    /// Names already declared in the function being emitted
    declared: HashSet<String>,
    needs_split: bool,
    needs_join: bool,
    needs_ipow: bool,
    needs_floordiv: bool,
    needs_algorithm: bool,
}

impl<'a> CppEmitter<'a> {
    fn fail(&mut self, message: String, location: SourceLocation) -> EmitExpr {
        self.diagnostics
            .push(Diagnostic::error(ErrorCode::CodegenFailure, message, location));
        Err(())
    }

    fn type_name(&mut self, ty: &Type, location: SourceLocation) -> EmitExpr {
        match self.registry.descriptor(ty) {
            Some(descriptor) => Ok(descriptor.target_name),
            None => self.fail(format!("type {} has no C++ mapping", ty), location),
        }
    }

    fn emit_module(&mut self, module: &Module) -> Result<String, Vec<Diagnostic>> {
        let mut records = CodeWriter::new(self.indent);
        for class_def in query::class_defs(module) {
            if let Some(record) = self.context.record(&class_def.name).cloned() {
                self.emit_record(&mut records, &record, class_def);
            }
        }

        let mut prototypes = Vec::new();
        let mut bodies = CodeWriter::new(self.indent);
        for item in &module.items {
            if let Statement::FunctionDef(def) = item {
                if let Ok(signature) = self.function_signature(def) {
                    prototypes.push(format!("{};", signature));
                }
                self.emit_function(&mut bodies, def);
            }
        }

        self.emit_entry_point(&mut bodies, module);

        if !self.diagnostics.is_empty() {
            return Err(std::mem::take(&mut self.diagnostics));
        }

        let mut out = String::new();
        out.push_str(&self.prelude(module));
        out.push_str(&records.finish());
        if !prototypes.is_empty() {
            for prototype in &prototypes {
                out.push_str(prototype);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&bodies.finish());
        Ok(out)
    }

    fn prelude(&self, module: &Module) -> String {
        let mut out = String::new();
        if self.needs_algorithm {
            out.push_str("#include <algorithm>\n");
        }
        out.push_str("#include <cassert>\n");
        if self.needs_ipow {
            out.push_str("#include <cmath>\n");
        }
        out.push_str("#include <iostream>\n#include <map>\n#include <set>\n");
        if self.needs_split {
            out.push_str("#include <sstream>\n");
        }
        out.push_str("#include <string>\n#include <tuple>\n#include <vector>\n\n");
        out.push_str("static const std::string __name__ = \"__main__\";\n\n");
        if self.needs_ipow {
            out.push_str(
                "static int mgen_ipow(int base, int exp) {\n    int out = 1;\n    while (exp > 0) {\n        if (exp % 2 == 1) {\n            out *= base;\n        }\n        base *= base;\n        exp /= 2;\n    }\n    return out;\n}\n\n",
            );
        }
        if self.needs_floordiv {
            out.push_str(
                "static int mgen_floordiv(int a, int b) {\n    int q = a / b;\n    if ((a % b != 0) && ((a < 0) != (b < 0))) {\n        q--;\n    }\n    return q;\n}\n\nstatic int mgen_mod(int a, int b) {\n    int r = a % b;\n    if (r != 0 && ((r < 0) != (b < 0))) {\n        r += b;\n    }\n    return r;\n}\n\n",
            );
        }
        if self.needs_split {
            out.push_str(
                "static std::vector<std::string> mgen_split(const std::string& s) {\n    std::vector<std::string> out;\n    std::istringstream stream(s);\n    std::string word;\n    while (stream >> word) {\n        out.push_back(word);\n    }\n    return out;\n}\n\n",
            );
        }
        if self.needs_join {
            out.push_str(
                "static std::string mgen_join(const std::string& sep, const std::vector<std::string>& parts) {\n    std::string out;\n    for (size_t i = 0; i < parts.size(); i++) {\n        out += parts[i];\n        if (i + 1 < parts.size()) {\n            out += sep;\n        }\n    }\n    return out;\n}\n\n",
            );
        }
        let _ = module;
        out
    }

    // ---- records ----

    fn emit_record(
        &mut self,
        writer: &mut CodeWriter,
        record: &RecordDescriptor,
        class_def: &mgen_ir::ast::ClassDef,
    ) {
        writer.line(format!("class {} {{", record.name));
        writer.line("public:");
        writer.indent();
        for (field, ty) in &record.fields {
            if let Ok(name) = self.type_name(ty, class_def.location) {
                writer.line(format!("{} {};", name, field));
            }
        }
        writer.blank();

        // constructor from the field list, mirroring the source __init__
        let mut params = Vec::new();
        let mut inits = Vec::new();
        for (field, ty) in &record.fields {
            if let Ok(name) = self.type_name(ty, class_def.location) {
                params.push(format!("{} {}_", name, field));
                inits.push(format!("{}({}_)", field, field));
            }
        }
        if record.fields.is_empty() {
            writer.line(format!("{}() {{}}", record.name));
        } else {
            writer.line(format!(
                "{}({}) : {} {{}}",
                record.name,
                params.join(", "),
                inits.join(", ")
            ));
        }
        writer.blank();

        for item in &class_def.body {
            if let Statement::FunctionDef(def) = item {
                if def.name != "__init__" {
                    self.emit_method(writer, record, def);
                }
            }
        }
        writer.dedent();
        writer.line("};");
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
        let Ok(return_name) = self.type_name(&def.return_type, def.location) else {
            return;
        };
        // a @staticmethod keeps all its parameters and has no `this`
        let mut params = Vec::new();
        for param in def.parameters.iter().skip(if is_static { 0 } else { 1 }) {
            match self.type_name(&param.ty, param.location) {
                Ok(name) => params.push(format!("{} {}", name, param.name)),
                Err(()) => return,
            }
        }
        let mutates = descriptor.map(|m| m.mutates_receiver).unwrap_or(false);
        let prefix = if is_static { "static " } else { "" };
        let qualifier = if mutates || is_static { "" } else { " const" };
        writer.line(format!(
            "{}{} {}({}){} {{",
            prefix,
            return_name,
            def.name,
            params.join(", "),
            qualifier
        ));
        writer.indent();
        let receiver = if is_static {
            None
        } else {
            Some(
                def.parameters
                    .first()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "self".to_string()),
            )
        };
        self.declared = def.parameters.iter().map(|p| p.name.clone()).collect();
        for stmt in &def.body {
            self.emit_statement(writer, stmt, receiver.as_deref());
        }
        writer.dedent();
        writer.line("}");
        writer.blank();
    }

    // ---- functions ----

    fn function_signature(&mut self, def: &FunctionDef) -> EmitExpr {
        let name = if def.name == "main" {
            "mgen_main"
        } else {
            &def.name
        };
        let return_name = self.type_name(&def.return_type, def.location)?;
        let mut params = Vec::new();
        for param in &def.parameters {
            let type_name = self.type_name(&param.ty, param.location)?;
            params.push(format!("{} {}", type_name, param.name));
        }
        Ok(format!("{} {}({})", return_name, name, params.join(", ")))
    }

    fn emit_function(&mut self, writer: &mut CodeWriter, def: &FunctionDef) {
        let Ok(signature) = self.function_signature(def) else {
            return;
        };
        writer.line(format!("{} {{", signature));
        writer.indent();
        self.declared = def.parameters.iter().map(|p| p.name.clone()).collect();
        for stmt in &def.body {
            self.emit_statement(writer, stmt, None);
        }
        writer.dedent();
        writer.line("}");
        writer.blank();
    }

    fn emit_entry_point(&mut self, writer: &mut CodeWriter, module: &Module) {
        let has_main_fn = query::function_defs(module).any(|def| def.name == "main");
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

        if top_level.is_empty() && guard_body.is_none() && !has_main_fn {
            return;
        }

        writer.line("int main() {");
        writer.indent();
        self.declared = HashSet::new();
        for stmt in top_level {
            self.emit_statement(writer, stmt, None);
        }
        let returns_int = query::function_defs(module)
            .find(|def| def.name == "main")
            .map(|def| def.return_type == Type::int())
            .unwrap_or(false);
        match guard_body {
            // a guard that just calls main() propagates the exit code
            Some(body) if query::guard_calls_main(body) => {
                if returns_int {
                    writer.line("return mgen_main();");
                } else {
                    writer.line("mgen_main();");
                }
            }
            Some(body) => {
                for stmt in body {
                    self.emit_statement(writer, stmt, None);
                }
            }
            None => {
                if has_main_fn {
                    if returns_int {
                        writer.line("return mgen_main();");
                    } else {
                        writer.line("mgen_main();");
                    }
                }
            }
        }
        writer.line("return 0;");
        writer.dedent();
        writer.line("}");
    }

    // ---- statements ----

    fn emit_statement(&mut self, writer: &mut CodeWriter, stmt: &Statement, receiver: Option<&str>) {
        match stmt {
            Statement::Assign(s) => self.emit_assign(writer, s, receiver),
            Statement::AugAssign(s) => {
                let Ok(target) = self.emit_expression(&s.target, receiver) else {
                    return;
                };
                let Ok(value) = self.emit_expression(&s.value, receiver) else {
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
                if let Ok(text) = self.emit_expression(&s.expression, receiver) {
                    writer.line(format!("{};", text));
                }
            }
            Statement::Return(s) => match &s.value {
                Some(value) => {
                    if let Ok(text) = self.emit_expression(value, receiver) {
                        writer.line(format!("return {};", text));
                    }
                }
                None => writer.line("return;"),
            },
            Statement::If(s) => {
                for (index, arm) in s.arms.iter().enumerate() {
                    let Ok(condition) = self.emit_expression(&arm.condition, receiver) else {
                        return;
                    };
                    let keyword = if index == 0 { "if" } else { "} else if" };
                    writer.line(format!("{} ({}) {{", keyword, condition));
                    writer.indent();
                    for stmt in &arm.body {
                        self.emit_statement(writer, stmt, receiver);
                    }
                    writer.dedent();
                }
                if !s.else_body.is_empty() {
                    writer.line("} else {");
                    writer.indent();
                    for stmt in &s.else_body {
                        self.emit_statement(writer, stmt, receiver);
                    }
                    writer.dedent();
                }
                writer.line("}");
            }
            Statement::While(s) => {
                let Ok(condition) = self.emit_expression(&s.condition, receiver) else {
                    return;
                };
                writer.line(format!("while ({}) {{", condition));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt, receiver);
                }
                writer.dedent();
                writer.line("}");
            }
            Statement::For(s) => self.emit_for(writer, s, receiver),
            Statement::Break(_) => writer.line("break;"),
            Statement::Continue(_) => writer.line("continue;"),
            Statement::Pass(_) => {}
            Statement::Assert(s) => {
                let Ok(condition) = self.emit_expression(&s.condition, receiver) else {
                    return;
                };
                writer.line(format!("assert({});", condition));
            }
            Statement::Import(_) => {}
            other => {
                let _ = self.fail(
                    "statement form cannot be emitted for C++".to_string(),
                    other.location(),
                );
            }
        }
    }

    fn emit_assign(&mut self, writer: &mut CodeWriter, s: &AssignStmt, receiver: Option<&str>) {
        let Ok(value) = self.emit_expression(&s.value, receiver) else {
            return;
        };
        // dict stores insert through operator[]; .at() would throw on a
        // fresh key
        if let Expression::Subscript(sub) = &s.target {
            if let Type::Dict(_, _) = sub.receiver.ty() {
                let Ok(base) = self.emit_expression(&sub.receiver, receiver) else {
                    return;
                };
                let Ok(key) = self.emit_expression(&sub.index, receiver) else {
                    return;
                };
                writer.line(format!("{}[{}] = {};", base, key, value));
                return;
            }
        }
        if let Some(name) = s.target.as_name() {
            if self.declared.contains(name) {
                writer.line(format!("{} = {};", name, value));
            } else if s.annotation.is_some() {
                self.declared.insert(name.to_string());
                let Ok(type_name) = self.type_name(&s.ty, s.location) else {
                    return;
                };
                writer.line(format!("{} {} = {};", type_name, name, value));
            } else {
                self.declared.insert(name.to_string());
                writer.line(format!("auto {} = {};", name, value));
            }
            return;
        }
        if let Ok(target) = self.emit_expression(&s.target, receiver) {
            writer.line(format!("{} = {};", target, value));
        }
    }

    fn emit_for(&mut self, writer: &mut CodeWriter, s: &ForStmt, receiver: Option<&str>) {
        if let Expression::Call(call) = &s.iterable {
            if call.function == "range" {
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    let Ok(text) = self.emit_expression(argument, receiver) else {
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
                    "for (int {} = {}; {} < {}; {} += {}) {{",
                    variable, start, variable, stop, variable, step
                ));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt, receiver);
                }
                writer.dedent();
                writer.line("}");
                return;
            }
        }

        // dict iteration binds keys (and values for .items())
        let iterable_ty = s.iterable.ty().clone();
        if let Type::Dict(_, _) = &iterable_ty {
            let Ok(source) = self.emit_expression(&s.iterable, receiver) else {
                return;
            };
            if s.targets.len() == 1 {
                writer.line(format!(
                    "for (const auto& [{}, {}_value] : {}) {{",
                    s.targets[0], s.targets[0], source
                ));
                writer.indent();
                writer.line(format!("(void){}_value;", s.targets[0]));
            } else {
                writer.line(format!(
                    "for (const auto& [{}, {}] : {}) {{",
                    s.targets[0], s.targets[1], source
                ));
                writer.indent();
            }
            for stmt in &s.body {
                self.emit_statement(writer, stmt, receiver);
            }
            writer.dedent();
            writer.line("}");
            return;
        }
        if let Expression::MethodCall(call) = &s.iterable {
            if call.method == "items" && s.targets.len() == 2 {
                let Ok(source) = self.emit_expression(&call.receiver, receiver) else {
                    return;
                };
                writer.line(format!(
                    "for (const auto& [{}, {}] : {}) {{",
                    s.targets[0], s.targets[1], source
                ));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt, receiver);
                }
                writer.dedent();
                writer.line("}");
                return;
            }
        }

        let Ok(source) = self.emit_expression(&s.iterable, receiver) else {
            return;
        };
        writer.line(format!("for (const auto& {} : {}) {{", s.targets[0], source));
        writer.indent();
        for stmt in &s.body {
            self.emit_statement(writer, stmt, receiver);
        }
        writer.dedent();
        writer.line("}");
    }

    // ---- expressions ----

    fn emit_expression(&mut self, expr: &Expression, receiver: Option<&str>) -> EmitExpr {
        match expr {
            Expression::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Int(v) => v.to_string(),
                LiteralValue::Float(v) => format_float(*v),
                LiteralValue::Bool(v) => if *v { "true" } else { "false" }.to_string(),
                LiteralValue::Str(v) => {
                    format!("std::string(\"{}\")", escape_c_string(v))
                }
                LiteralValue::None => "nullptr".to_string(),
            }),
            Expression::Name(name) => {
                if receiver == Some(name.name.as_str()) {
                    Ok("(*this)".to_string())
                } else {
                    Ok(name.name.clone())
                }
            }
            Expression::Binary(e) => {
                let left = self.emit_expression(&e.left, receiver)?;
                let right = self.emit_expression(&e.right, receiver)?;
                self.emit_binary_text(&left, e.operator, &right, e.left.ty(), e.location)
            }
            Expression::Unary(e) => {
                let operand = self.emit_expression(&e.operand, receiver)?;
                Ok(format!("{}({})", operators::unary(e.operator), operand))
            }
            Expression::Comparison(e) => self.emit_comparison(e, receiver),
            Expression::Bool(e) => {
                let left = self.emit_expression(&e.left, receiver)?;
                let right = self.emit_expression(&e.right, receiver)?;
                Ok(format!(
                    "({} {} {})",
                    left,
                    operators::bool_op(e.operator),
                    right
                ))
            }
            Expression::Call(e) => self.emit_call(e, receiver),
            Expression::MethodCall(e) => self.emit_method_call(e, receiver),
            Expression::Attribute(e) => {
                let base = self.emit_expression(&e.receiver, receiver)?;
                if base == "(*this)" {
                    Ok(format!("this->{}", e.attribute))
                } else {
                    Ok(format!("{}.{}", base, e.attribute))
                }
            }
            Expression::Subscript(e) => {
                let base = self.emit_expression(&e.receiver, receiver)?;
                let index = self.emit_expression(&e.index, receiver)?;
                match e.receiver.ty() {
                    Type::List(_) => Ok(format!("{}.at((size_t)({}))", base, index)),
                    Type::Dict(_, _) => Ok(format!("{}.at({})", base, index)),
                    Type::Scalar(ScalarType::Str) => {
                        Ok(format!("std::string(1, {}.at((size_t)({})))", base, index))
                    }
                    Type::Tuple(_) => Ok(format!("std::get<{}>({})", index, base)),
                    other => self.fail(
                        format!("cannot subscript {} in the C++ backend", other),
                        e.location,
                    ),
                }
            }
            Expression::Slice(e) => {
                let base = self.emit_expression(&e.receiver, receiver)?;
                let lower = match &e.lower {
                    Some(lower) => self.emit_expression(lower, receiver)?,
                    None => "0".to_string(),
                };
                match e.receiver.ty() {
                    Type::Scalar(ScalarType::Str) => {
                        let upper = match &e.upper {
                            Some(upper) => self.emit_expression(upper, receiver)?,
                            None => format!("(int){}.size()", base),
                        };
                        Ok(format!(
                            "{}.substr((size_t)({}), (size_t)(({}) - ({})))",
                            base, lower, upper, lower
                        ))
                    }
                    Type::List(_) => {
                        let upper = match &e.upper {
                            Some(upper) => self.emit_expression(upper, receiver)?,
                            None => format!("(int){}.size()", base),
                        };
                        let element = self.type_name(e.ty.element().unwrap_or(&Type::Unknown), e.location)?;
                        Ok(format!(
                            "std::vector<{}>({}.begin() + {}, {}.begin() + {})",
                            element, base, lower, base, upper
                        ))
                    }
                    other => self.fail(
                        format!("cannot slice {} in the C++ backend", other),
                        e.location,
                    ),
                }
            }
            Expression::ListLiteral(e) => {
                let type_name = self.type_name(&e.ty, e.location)?;
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element, receiver)?);
                }
                Ok(format!("{}{{{}}}", type_name, elements.join(", ")))
            }
            Expression::SetLiteral(e) => {
                let type_name = self.type_name(&e.ty, e.location)?;
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element, receiver)?);
                }
                Ok(format!("{}{{{}}}", type_name, elements.join(", ")))
            }
            Expression::DictLiteral(e) => {
                let type_name = self.type_name(&e.ty, e.location)?;
                let mut entries = Vec::new();
                for (key, value) in &e.entries {
                    let key = self.emit_expression(key, receiver)?;
                    let value = self.emit_expression(value, receiver)?;
                    entries.push(format!("{{{}, {}}}", key, value));
                }
                Ok(format!("{}{{{}}}", type_name, entries.join(", ")))
            }
            Expression::TupleLiteral(e) => {
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.emit_expression(element, receiver)?);
                }
                Ok(format!("std::make_tuple({})", elements.join(", ")))
            }
            Expression::Comprehension(e) => self.emit_comprehension(e, receiver),
            Expression::FormattedString(e) => {
                let mut parts = Vec::new();
                for part in &e.parts {
                    match part {
                        FStringPart::Text(text) => {
                            parts.push(format!("std::string(\"{}\")", escape_c_string(text)));
                        }
                        FStringPart::Expr(inner) => {
                            let text = self.emit_expression(inner, receiver)?;
                            parts.push(self.stringify(&text, inner.ty()));
                        }
                    }
                }
                Ok(format!("({})", parts.join(" + ")))
            }
            Expression::Conditional(e) => {
                let condition = self.emit_expression(&e.condition, receiver)?;
                let then_value = self.emit_expression(&e.then_value, receiver)?;
                let else_value = self.emit_expression(&e.else_value, receiver)?;
                Ok(format!("({} ? {} : {})", condition, then_value, else_value))
            }
            other => self.fail(
                "expression form cannot be emitted for C++".to_string(),
                other.location(),
            ),
        }
    }

    fn stringify(&self, text: &str, ty: &Type) -> String {
        match ty {
            Type::Scalar(ScalarType::Str) => text.to_string(),
            Type::Scalar(ScalarType::Bool) => {
                format!("std::string(({}) ? \"true\" : \"false\")", text)
            }
            _ => format!("std::to_string({})", text),
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
                self.needs_ipow = true;
                if left_ty == &Type::float() {
                    Ok(format!("std::pow({}, {})", left, right))
                } else {
                    Ok(format!("mgen_ipow({}, {})", left, right))
                }
            }
            BinaryOperator::FloorDiv => {
                self.needs_floordiv = true;
                Ok(format!("mgen_floordiv({}, {})", left, right))
            }
            BinaryOperator::Mod if left_ty == &Type::int() => {
                self.needs_floordiv = true;
                Ok(format!("mgen_mod({}, {})", left, right))
            }
            BinaryOperator::Div if left_ty == &Type::int() => {
                Ok(format!("((double){} / (double){})", left, right))
            }
            other => match operators::binary(other) {
                Some(op) => Ok(format!("({} {} {})", left, op, right)),
                None => self.fail(format!("operator '{}' has no C++ form", other), location),
            },
        }
    }

    fn emit_comparison(
        &mut self,
        e: &mgen_ir::ast::ComparisonExpr,
        receiver: Option<&str>,
    ) -> EmitExpr {
        use ComparisonOperator::*;
        match e.operator {
            In | NotIn => {
                let negate = e.operator == NotIn;
                let value = self.emit_expression(&e.left, receiver)?;
                let container = self.emit_expression(&e.right, receiver)?;
                let text = match e.right.ty() {
                    Type::Dict(_, _) | Type::Set(_) => {
                        format!("({}.count({}) != 0)", container, value)
                    }
                    Type::List(_) => {
                        self.needs_algorithm = true;
                        format!(
                            "(std::find({}.begin(), {}.end(), {}) != {}.end())",
                            container, container, value, container
                        )
                    }
                    Type::Scalar(ScalarType::Str) => {
                        format!("({}.find({}) != std::string::npos)", container, value)
                    }
                    other => {
                        return self.fail(
                            format!("'in' is not supported on {} in the C++ backend", other),
                            e.location,
                        );
                    }
                };
                Ok(if negate { format!("!{}", text) } else { text })
            }
            other => {
                let left = self.emit_expression(&e.left, receiver)?;
                let right = self.emit_expression(&e.right, receiver)?;
                match operators::comparison(other) {
                    Some(op) => Ok(format!("({} {} {})", left, op, right)),
                    None => self.fail(
                        format!("comparison '{}' has no C++ form", other),
                        e.location,
                    ),
                }
            }
        }
    }

    /// Comprehensions become immediately-invoked lambdas so they remain
    /// expressions
    fn emit_comprehension(&mut self, e: &ComprehensionExpr, receiver: Option<&str>) -> EmitExpr {
        let type_name = self.type_name(&e.ty, e.location)?;
        let mut writer = CodeWriter::new(self.indent);
        writer.line("[&]() {");
        writer.indent();
        writer.line(format!("{} __acc;", type_name));

        let open_loop = if let Expression::Call(call) = &*e.iterable {
            if call.function == "range" {
                let mut parts = Vec::new();
                for argument in &call.arguments {
                    parts.push(self.emit_expression(argument, receiver)?);
                }
                let (start, stop, step) = match parts.len() {
                    1 => ("0".to_string(), parts[0].clone(), "1".to_string()),
                    2 => (parts[0].clone(), parts[1].clone(), "1".to_string()),
                    _ => (parts[0].clone(), parts[1].clone(), parts[2].clone()),
                };
                format!(
                    "for (int {} = {}; {} < {}; {} += {}) {{",
                    e.variable, start, e.variable, stop, e.variable, step
                )
            } else {
                let source = self.emit_expression(&e.iterable, receiver)?;
                format!("for (const auto& {} : {}) {{", e.variable, source)
            }
        } else {
            let source = self.emit_expression(&e.iterable, receiver)?;
            format!("for (const auto& {} : {}) {{", e.variable, source)
        };
        writer.line(open_loop);
        writer.indent();

        let guarded = e.condition.is_some();
        if let Some(condition) = &e.condition {
            let condition = self.emit_expression(condition, receiver)?;
            writer.line(format!("if ({}) {{", condition));
            writer.indent();
        }
        let element = self.emit_expression(&e.element, receiver)?;
        match e.kind {
            ComprehensionKind::List => writer.line(format!("__acc.push_back({});", element)),
            ComprehensionKind::Set => writer.line(format!("__acc.insert({});", element)),
            ComprehensionKind::Dict => {
                let value = match &e.value {
                    Some(value) => self.emit_expression(value, receiver)?,
                    None => return Err(()),
                };
                writer.line(format!("__acc[{}] = {};", element, value));
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
        writer.line("return __acc;");
        writer.dedent();
        writer.raw("}()");
        Ok(writer.finish())
    }

    fn emit_call(&mut self, e: &mgen_ir::ast::CallExpr, receiver: Option<&str>) -> EmitExpr {
        match e.function.as_str() {
            "print" => {
                let Some(argument) = e.arguments.first() else {
                    return Ok("std::cout << std::endl".to_string());
                };
                let text = self.emit_expression(argument, receiver)?;
                match argument.ty() {
                    Type::Scalar(ScalarType::Bool) => Ok(format!(
                        "std::cout << (({}) ? \"true\" : \"false\") << std::endl",
                        text
                    )),
                    _ => Ok(format!("std::cout << {} << std::endl", text)),
                }
            }
            "len" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("len() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, receiver)?;
                Ok(format!("(int){}.size()", text))
            }
            "str" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("str() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, receiver)?;
                Ok(self.stringify(&text, argument.ty()))
            }
            "abs" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("abs() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, receiver)?;
                Ok(format!("std::abs({})", text))
            }
            "int" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("int() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, receiver)?;
                Ok(format!("(int)({})", text))
            }
            "float" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("float() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, receiver)?;
                Ok(format!("(double)({})", text))
            }
            "bool" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("bool() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument, receiver)?;
                Ok(format!("(({}) != 0)", text))
            }
            "range" => self.fail(
                "range() is only usable as a loop iterable".to_string(),
                e.location,
            ),
            name => {
                if crate::is_builtin(name) {
                    return self.fail(
                        format!("builtin '{}' has no C++ lowering", name),
                        e.location,
                    );
                }
                let mut arguments = Vec::new();
                for argument in &e.arguments {
                    arguments.push(self.emit_expression(argument, receiver)?);
                }
                if self.context.record(name).is_some() {
                    return Ok(format!("{}({})", name, arguments.join(", ")));
                }
                let callee = if name == "main" { "mgen_main" } else { name };
                Ok(format!("{}({})", callee, arguments.join(", ")))
            }
        }
    }

    fn emit_method_call(&mut self, e: &MethodCallExpr, receiver: Option<&str>) -> EmitExpr {
        let base = self.emit_expression(&e.receiver, receiver)?;
        let receiver_ty = e.receiver.ty().clone();
        let mut arguments = Vec::new();
        for argument in &e.arguments {
            arguments.push(self.emit_expression(argument, receiver)?);
        }

        match &receiver_ty {
            Type::Record(_) => {
                let callee = if base == "(*this)" {
                    format!("this->{}", e.method)
                } else {
                    format!("{}.{}", base, e.method)
                };
                Ok(format!("{}({})", callee, arguments.join(", ")))
            }
            Type::List(_) => match e.method.as_str() {
                "append" => Ok(format!("{}.push_back({})", base, arguments.join(", "))),
                "pop" if arguments.is_empty() => Ok(format!("{}.pop_back()", base)),
                "insert" => Ok(format!(
                    "{}.insert({}.begin() + {}, {})",
                    base, base, arguments[0], arguments[1]
                )),
                "clear" => Ok(format!("{}.clear()", base)),
                "sort" => {
                    self.needs_algorithm = true;
                    Ok(format!("std::sort({}.begin(), {}.end())", base, base))
                }
                other => self.fail(
                    format!("list method '{}' has no C++ lowering", other),
                    e.location,
                ),
            },
            Type::Set(_) => match e.method.as_str() {
                "add" => Ok(format!("{}.insert({})", base, arguments.join(", "))),
                "discard" | "remove" => Ok(format!("{}.erase({})", base, arguments.join(", "))),
                "clear" => Ok(format!("{}.clear()", base)),
                other => self.fail(
                    format!("set method '{}' has no C++ lowering", other),
                    e.location,
                ),
            },
            Type::Dict(_, _) => match e.method.as_str() {
                "get" if arguments.len() == 2 => Ok(format!(
                    "({}.count({}) != 0 ? {}.at({}) : {})",
                    base, arguments[0], base, arguments[0], arguments[1]
                )),
                "clear" => Ok(format!("{}.clear()", base)),
                other => self.fail(
                    format!("dict method '{}' has no C++ lowering", other),
                    e.location,
                ),
            },
            Type::Scalar(ScalarType::Str) => match e.method.as_str() {
                "split" if arguments.is_empty() => {
                    self.needs_split = true;
                    Ok(format!("mgen_split({})", base))
                }
                "join" => {
                    self.needs_join = true;
                    Ok(format!("mgen_join({}, {})", base, arguments[0]))
                }
                "find" => Ok(format!("(int){}.find({})", base, arguments[0])),
                "startswith" => Ok(format!("({}.rfind({}, 0) == 0)", base, arguments[0])),
                other => self.fail(
                    format!("string method '{}' has no C++ lowering", other),
                    e.location,
                ),
            },
            other => self.fail(
                format!("cannot call a method on {} in the C++ backend", other),
                e.location,
            ),
        }
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
