//! C backend
//!
//! Emits a single self-contained translation unit. Containers are
//! realized by the container engine; strings are `char*` with literals
//! static and computed strings heap-owned; records become structs with
//! `make_Record` constructors and `Record_method(&receiver, ...)`
//! functions. Local bindings are hoisted to the top of their function so
//! branch-local assignments stay visible afterwards.

use crate::Backend;
use crate::containers::ContainerEngine;
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

/// Preferences understood by the C backend
pub const SCHEMA: &[PrefSpec] = &[
    PrefSpec::choice(
        "container_mode",
        "generated",
        &["runtime", "generated"],
        "realize containers with generated templates or a shipped runtime",
    ),
    PrefSpec::int("indent_size", 4, "spaces per indentation level"),
    PrefSpec::choice("brace_style", "k&r", &["k&r", "allman"], "brace placement"),
];

pub fn factory(prefs: Preferences) -> Box<dyn Backend> {
    Box::new(CBackend { prefs })
}

pub struct CBackend {
    prefs: Preferences,
}

type EmitExpr = Result<String, ()>;

impl Backend for CBackend {
    fn name(&self) -> &'static str {
        "c"
    }

    fn file_extension(&self) -> &'static str {
        "c"
    }

    fn map_type(&self, ty: &Type, context: &CompilationContext) -> Option<String> {
        let registry = registry_for(context);
        registry.descriptor(ty).map(|d| d.target_name)
    }

    fn map_builtin(&self, name: &str) -> Option<&'static str> {
        match name {
            "print" => Some("printf"),
            "len" => Some("strlen"),
            "str" => Some("mgen_asprintf"),
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
        let indent = self.prefs.get_int("indent_size").max(1) as usize;
        let allman = self.prefs.get_str("brace_style") == "allman";
        let mut emitter = CEmitter {
            context,
            engine: ContainerEngine::new(&registry),
            registry: &registry,
            diagnostics: Vec::new(),
            indent,
            allman,
            pointer_receiver: None,
            globals: Vec::new(),
            temp_counter: 0,
            needs_math: false,
            needs_ipow: false,
            needs_floordiv: false,
            needs_split: false,
            needs_join: false,
            needs_upper_lower: false,
            needs_strip: false,
            needs_asprintf: false,
        };
        emitter.emit_module(module)
    }
}

fn registry_for(context: &CompilationContext) -> TargetTypeRegistry {
    let mut registry = TargetTypeRegistry::new(Target::C);
    for record in context.records() {
        registry.register_record(&record.name);
    }
    registry
}

struct CEmitter<'a> {
    context: &'a CompilationContext,
    engine: ContainerEngine<'a>,
    registry: &'a TargetTypeRegistry,
    diagnostics: Vec<Diagnostic>,
    indent: usize,
    allman: bool,
    /// The receiver parameter of the method being emitted (a pointer)
    pointer_receiver: Option<String>,
    /// Top-level bindings, declared as statics and assigned in main
    globals: Vec<String>,
    temp_counter: usize,
    needs_math: bool,
    needs_ipow: bool,
    needs_floordiv: bool,
    needs_split: bool,
    needs_join: bool,
    needs_upper_lower: bool,
    needs_strip: bool,
    needs_asprintf: bool,
}

impl<'a> CEmitter<'a> {
    fn fail(&mut self, message: String, location: SourceLocation) -> EmitExpr {
        self.diagnostics
            .push(Diagnostic::error(ErrorCode::CodegenFailure, message, location));
        Err(())
    }

    fn type_name(&mut self, ty: &Type, location: SourceLocation) -> EmitExpr {
        if ty.is_container() && !matches!(ty, Type::Tuple(_)) {
            if let Err(diagnostic) = self.engine.request(ty, location) {
                self.diagnostics.push(diagnostic);
                return Err(());
            }
        }
        match self.registry.descriptor(ty) {
            Some(descriptor) => Ok(descriptor.target_name),
            None => self.fail(format!("type {} has no C mapping", ty), location),
        }
    }

    fn fresh_temp(&mut self, base: &str) -> String {
        let name = format!("_{}{}", base, self.temp_counter);
        self.temp_counter += 1;
        name
    }

    fn open_brace(&self, writer: &mut CodeWriter, head: &str) {
        if self.allman {
            writer.line(head);
            writer.line("{");
        } else {
            writer.line(format!("{} {{", head));
        }
    }

    // ---- module layout ----

    fn emit_module(&mut self, module: &Module) -> Result<String, Vec<Diagnostic>> {
        let records: Vec<RecordDescriptor> = self.context.records().to_vec();
        for record in &records {
            self.request_record_containers(record);
        }

        let mut record_text = CodeWriter::new(self.indent);
        for class_def in query::class_defs(module) {
            if let Some(record) = self.context.record(&class_def.name).cloned() {
                self.emit_record(&mut record_text, &record, class_def);
            }
        }

        let mut bodies = CodeWriter::new(self.indent);
        let mut prototypes: Vec<String> = Vec::new();
        for item in &module.items {
            if let Statement::FunctionDef(def) = item {
                if let Ok(signature) = self.function_signature(def) {
                    prototypes.push(format!("{};", signature));
                }
                self.emit_function(&mut bodies, def);
            }
        }

        let mut globals_text = CodeWriter::new(self.indent);
        self.declare_globals(&mut globals_text, module);
        self.emit_entry_point(&mut bodies, module);

        if !self.diagnostics.is_empty() {
            return Err(std::mem::take(&mut self.diagnostics));
        }

        // assemble: prelude, containers, late runtime, records, globals,
        // prototypes, bodies
        let mut out = String::new();
        out.push_str(&self.prelude());
        if !self.engine.is_empty() {
            let (headers, sources) = self.engine.emit_all();
            out.push_str(&headers);
            out.push('\n');
            out.push_str(&sources);
        }
        out.push_str(&self.late_runtime());
        out.push_str(&record_text.finish());
        out.push_str(&globals_text.finish());
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

    fn prelude(&self) -> String {
        let mut out = String::new();
        out.push_str("#include <assert.h>\n");
        if self.needs_math {
            out.push_str("#include <math.h>\n");
        }
        if self.needs_asprintf {
            out.push_str("#include <stdarg.h>\n");
        }
        out.push_str("#include <stdbool.h>\n");
        out.push_str("#include <stdio.h>\n");
        out.push_str("#include <stdlib.h>\n");
        out.push_str("#include <string.h>\n\n");
        out.push_str("static char* __name__ = \"__main__\";\n\n");
        out.push_str(
            "static char* mgen_strdup(const char* s) {\n    size_t n = strlen(s) + 1;\n    char* out = (char*)malloc(n);\n    memcpy(out, s, n);\n    return out;\n}\n\n",
        );
        out.push_str(
            "static bool str_eq(const char* a, const char* b) {\n    return strcmp(a, b) == 0;\n}\n\n",
        );
        out
    }

    /// Helpers that depend on generated containers, emitted after them
    fn late_runtime(&self) -> String {
        let mut out = String::new();
        if self.needs_asprintf {
            out.push_str(
                "static char* mgen_asprintf(const char* fmt, ...) {\n    va_list args;\n    va_start(args, fmt);\n    va_list copy;\n    va_copy(copy, args);\n    int n = vsnprintf(NULL, 0, fmt, copy);\n    va_end(copy);\n    char* out = (char*)malloc((size_t)n + 1);\n    vsnprintf(out, (size_t)n + 1, fmt, args);\n    va_end(args);\n    return out;\n}\n\n",
            );
        }
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
                "static vec_str mgen_str_split(const char* s) {\n    vec_str out = vec_str_new();\n    const char* p = s;\n    while (*p) {\n        while (*p == ' ' || *p == '\\t' || *p == '\\n') {\n            p++;\n        }\n        if (!*p) {\n            break;\n        }\n        const char* start = p;\n        while (*p && *p != ' ' && *p != '\\t' && *p != '\\n') {\n            p++;\n        }\n        size_t n = (size_t)(p - start);\n        char* word = (char*)malloc(n + 1);\n        memcpy(word, start, n);\n        word[n] = '\\0';\n        vec_str_push(&out, word);\n        free(word);\n    }\n    return out;\n}\n\n",
            );
        }
        if self.needs_join {
            out.push_str(
                "static char* mgen_str_join(const char* sep, vec_str* parts) {\n    size_t total = 1;\n    size_t sep_len = strlen(sep);\n    for (size_t i = 0; i < vec_str_size(parts); i++) {\n        total += strlen(vec_str_at(parts, i));\n        if (i + 1 < vec_str_size(parts)) {\n            total += sep_len;\n        }\n    }\n    char* out = (char*)malloc(total);\n    out[0] = '\\0';\n    for (size_t i = 0; i < vec_str_size(parts); i++) {\n        strcat(out, vec_str_at(parts, i));\n        if (i + 1 < vec_str_size(parts)) {\n            strcat(out, sep);\n        }\n    }\n    return out;\n}\n\n",
            );
        }
        if self.needs_upper_lower {
            out.push_str(
                "static char* mgen_str_upper(const char* s) {\n    char* out = mgen_strdup(s);\n    for (char* p = out; *p; p++) {\n        if (*p >= 'a' && *p <= 'z') {\n            *p -= 32;\n        }\n    }\n    return out;\n}\n\nstatic char* mgen_str_lower(const char* s) {\n    char* out = mgen_strdup(s);\n    for (char* p = out; *p; p++) {\n        if (*p >= 'A' && *p <= 'Z') {\n            *p += 32;\n        }\n    }\n    return out;\n}\n\n",
            );
        }
        if self.needs_strip {
            out.push_str(
                "static char* mgen_str_strip(const char* s) {\n    while (*s == ' ' || *s == '\\t' || *s == '\\n') {\n        s++;\n    }\n    size_t n = strlen(s);\n    while (n > 0 && (s[n - 1] == ' ' || s[n - 1] == '\\t' || s[n - 1] == '\\n')) {\n        n--;\n    }\n    char* out = (char*)malloc(n + 1);\n    memcpy(out, s, n);\n    out[n] = '\\0';\n    return out;\n}\n\n",
            );
        }
        out
    }

    fn request_record_containers(&mut self, record: &RecordDescriptor) {
        for (_, ty) in &record.fields {
            if ty.is_container() && !matches!(ty, Type::Tuple(_)) {
                if let Err(diagnostic) = self.engine.request(ty, SourceLocation::default()) {
                    self.diagnostics.push(diagnostic);
                }
            }
        }
    }

    /// Collects the bindings of a statement list, for declaration hoisting
    fn hoisted_bindings(&self, body: &[Statement]) -> Vec<(String, Type)> {
        let mut bindings: Vec<(String, Type)> = Vec::new();
        query::walk_statements(body, &mut |stmt| {
            if let Statement::Assign(assign) = stmt {
                if let Some(name) = assign.target.as_name() {
                    if !bindings.iter().any(|(existing, _)| existing == name) {
                        bindings.push((name.to_string(), assign.ty.clone()));
                    }
                }
            }
        });
        bindings
    }

    fn declare_globals(&mut self, writer: &mut CodeWriter, module: &Module) {
        let top_level: Vec<&Statement> = module
            .items
            .iter()
            .filter(|item| matches!(item, Statement::Assign(_)))
            .collect();
        for stmt in top_level {
            if let Statement::Assign(assign) = stmt {
                if let Some(name) = assign.target.as_name() {
                    if let Ok(type_name) = self.type_name(&assign.ty, assign.location) {
                        writer.line(format!("static {} {};", type_name, name));
                        self.globals.push(name.to_string());
                    }
                }
            }
        }
        if !self.globals.is_empty() {
            writer.blank();
        }
    }

    // ---- records ----

    fn emit_record(
        &mut self,
        writer: &mut CodeWriter,
        record: &RecordDescriptor,
        class_def: &mgen_ir::ast::ClassDef,
    ) {
        self.open_brace(writer, &format!("typedef struct {}", record.name));
        writer.indent();
        for (field, ty) in &record.fields {
            if let Ok(name) = self.type_name(ty, class_def.location) {
                writer.line(format!("{} {};", name, field));
            }
        }
        writer.dedent();
        writer.line(format!("}} {};", record.name));
        writer.blank();

        self.emit_constructor(writer, record, class_def);

        for item in &class_def.body {
            if let Statement::FunctionDef(def) = item {
                if def.name != "__init__" {
                    self.emit_method(writer, record, def);
                }
            }
        }
    }

    fn emit_constructor(
        &mut self,
        writer: &mut CodeWriter,
        record: &RecordDescriptor,
        class_def: &mgen_ir::ast::ClassDef,
    ) {
        let init = class_def.body.iter().find_map(|item| match item {
            Statement::FunctionDef(def) if def.name == "__init__" => Some(def),
            _ => None,
        });

        let params: Vec<(String, Type)> = match init {
            Some(def) => def
                .parameters
                .iter()
                .skip(1)
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
            None => record.fields.clone(),
        };

        let mut rendered = Vec::new();
        for (name, ty) in &params {
            match self.type_name(ty, class_def.location) {
                Ok(type_name) => rendered.push(format!("{} {}", type_name, name)),
                Err(()) => return,
            }
        }
        self.open_brace(
            writer,
            &format!(
                "{} make_{}({})",
                record.name,
                record.name,
                rendered.join(", ")
            ),
        );
        writer.indent();
        writer.line(format!("{} self = {{0}};", record.name));
        match init {
            Some(def) => {
                // constructor bodies assign fields through the receiver
                let receiver = def
                    .parameters
                    .first()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "self".to_string());
                self.pointer_receiver = None;
                for stmt in &def.body {
                    if let Statement::Assign(assign) = stmt {
                        if let Expression::Attribute(attr) = &assign.target {
                            if attr.receiver.as_name() == Some(receiver.as_str()) {
                                if let Ok(value) = self.emit_expression(&assign.value) {
                                    writer.line(format!("self.{} = {};", attr.attribute, value));
                                }
                            }
                        }
                    }
                }
            }
            None => {
                for (field, _) in &record.fields {
                    writer.line(format!("self.{} = {};", field, field));
                }
            }
        }
        writer.line("return self;");
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
        let is_static = record
            .method(&def.name)
            .map(|method| method.is_static)
            .unwrap_or_else(|| def.decorators.iter().any(|d| d == "staticmethod"));
        let Ok(return_name) = self.type_name(&def.return_type, def.location) else {
            return;
        };

        // a @staticmethod is a plain namespaced function: every parameter
        // is its own, and no receiver pointer exists
        let mut params = Vec::new();
        let receiver = if is_static {
            None
        } else {
            let name = def
                .parameters
                .first()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "self".to_string());
            params.push(format!("{}* {}", record.name, name));
            Some(name)
        };
        for param in def.parameters.iter().skip(if is_static { 0 } else { 1 }) {
            match self.type_name(&param.ty, param.location) {
                Ok(type_name) => params.push(format!("{} {}", type_name, param.name)),
                Err(()) => return,
            }
        }

        self.open_brace(
            writer,
            &format!(
                "{} {}_{}({})",
                return_name,
                record.name,
                def.name,
                params.join(", ")
            ),
        );
        writer.indent();
        self.pointer_receiver = receiver;
        self.emit_hoisted(writer, &def.body, &[]);
        for stmt in &def.body {
            self.emit_statement(writer, stmt);
        }
        self.pointer_receiver = None;
        writer.dedent();
        writer.line("}");
        writer.blank();
    }

    /// Declares every local binding of a body up front
    fn emit_hoisted(&mut self, writer: &mut CodeWriter, body: &[Statement], skip: &[String]) {
        let bindings = self.hoisted_bindings(body);
        let mut any = false;
        for (name, ty) in bindings {
            if skip.contains(&name) || self.globals.contains(&name) {
                continue;
            }
            if let Ok(type_name) = self.type_name(&ty, SourceLocation::default()) {
                writer.line(format!("{} {};", type_name, name));
                any = true;
            }
        }
        if any {
            writer.blank();
        }
    }

    // ---- functions ----

    fn function_signature(&mut self, def: &FunctionDef) -> EmitExpr {
        let name = if def.name == "main" {
            "mgen_main".to_string()
        } else {
            def.name.clone()
        };
        let return_name = self.type_name(&def.return_type, def.location)?;
        let mut params = Vec::new();
        for param in &def.parameters {
            let type_name = self.type_name(&param.ty, param.location)?;
            params.push(format!("{} {}", type_name, param.name));
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        Ok(format!("{} {}({})", return_name, name, params))
    }

    fn emit_function(&mut self, writer: &mut CodeWriter, def: &FunctionDef) {
        let Ok(signature) = self.function_signature(def) else {
            return;
        };
        self.open_brace(writer, &signature);
        writer.indent();
        self.emit_hoisted(writer, &def.body, &[]);
        for stmt in &def.body {
            self.emit_statement(writer, stmt);
        }
        writer.dedent();
        writer.line("}");
        writer.blank();
    }

    /// The synthesized `int main`: top-level statements, then the main
    /// guard body (or a direct `mgen_main` call when there is no guard)
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

        self.open_brace(writer, "int main(void)");
        writer.indent();
        if let Some(body) = guard_body {
            self.emit_hoisted(writer, body, &[]);
        }
        for stmt in top_level {
            self.emit_statement(writer, stmt);
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
                    self.emit_statement(writer, stmt);
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

    fn emit_statement(&mut self, writer: &mut CodeWriter, stmt: &Statement) {
        match stmt {
            Statement::Assign(s) => self.emit_assign(writer, s),
            Statement::AugAssign(s) => {
                let Ok(target) = self.emit_target(&s.target) else {
                    return;
                };
                let Ok(value) = self.emit_expression(&s.value) else {
                    return;
                };
                match operators::augmented(s.operator) {
                    Some(op) => writer.line(format!("{} {} {};", target, op, value)),
                    None => {
                        // **= and //= have no C spelling; expand
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
                    if let Expression::Comprehension(comp) = value {
                        if let Ok(temp) = self.lower_comprehension(writer, comp) {
                            writer.line(format!("return {};", temp));
                        }
                        return;
                    }
                    if let Ok(text) = self.emit_expression(value) {
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
                    writer.line(format!("{} ({}) {{", keyword, condition));
                    writer.indent();
                    for stmt in &arm.body {
                        self.emit_statement(writer, stmt);
                    }
                    writer.dedent();
                }
                if !s.else_body.is_empty() {
                    writer.line("} else {");
                    writer.indent();
                    for stmt in &s.else_body {
                        self.emit_statement(writer, stmt);
                    }
                    writer.dedent();
                }
                writer.line("}");
            }
            Statement::While(s) => {
                let Ok(condition) = self.emit_expression(&s.condition) else {
                    return;
                };
                writer.line(format!("while ({}) {{", condition));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt);
                }
                writer.dedent();
                writer.line("}");
            }
            Statement::For(s) => self.emit_for(writer, s),
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
                                "assert(({}) && \"{}\");",
                                condition,
                                escape_c_string(text)
                            ));
                            return;
                        }
                        writer.line(format!("assert({});", condition));
                    }
                    _ => writer.line(format!("assert({});", condition)),
                }
            }
            Statement::Import(_) => {}
            other => {
                let _ = self.fail(
                    "statement form cannot be emitted for C".to_string(),
                    other.location(),
                );
            }
        }
    }

    fn emit_assign(&mut self, writer: &mut CodeWriter, s: &AssignStmt) {
        // comprehensions and container literals lower to loops
        if let Expression::Comprehension(comp) = &s.value {
            if let Ok(temp) = self.lower_comprehension(writer, comp) {
                if let Ok(target) = self.emit_target(&s.target) {
                    writer.line(format!("{} = {};", target, temp));
                }
            }
            return;
        }
        if is_nonempty_container_literal(&s.value) {
            if let Ok(target) = self.emit_target(&s.target) {
                let _ = self.lower_container_literal(writer, &s.value, &target);
            }
            return;
        }

        // dict subscript stores go through insert
        if let Expression::Subscript(sub) = &s.target {
            if let Type::Dict(_, _) = sub.receiver.ty() {
                let Ok(receiver) = self.emit_lvalue_pointer(&sub.receiver) else {
                    return;
                };
                let Ok(key) = self.emit_expression(&sub.index) else {
                    return;
                };
                let Ok(value) = self.emit_expression(&s.value) else {
                    return;
                };
                let suffix = sub.receiver.ty().suffix();
                writer.line(format!(
                    "{}_insert({}, {}, {});",
                    suffix, receiver, key, value
                ));
                return;
            }
        }

        let Ok(value) = self.emit_expression(&s.value) else {
            return;
        };
        if let Ok(target) = self.emit_target(&s.target) {
            writer.line(format!("{} = {};", target, value));
        }
    }

    /// `xs = vec_int_new(); vec_int_push(&xs, 1); ...` for a non-empty
    /// container literal
    fn lower_container_literal(
        &mut self,
        writer: &mut CodeWriter,
        value: &Expression,
        target: &str,
    ) -> Result<(), ()> {
        let ty = value.ty().clone();
        let suffix = ty.suffix();
        self.type_name(&ty, value.location())?;
        writer.line(format!("{} = {}_new();", target, suffix));
        match value {
            Expression::ListLiteral(seq) => {
                for element in &seq.elements {
                    let text = self.emit_expression(element)?;
                    writer.line(format!("{}_push(&{}, {});", suffix, target, text));
                }
            }
            Expression::SetLiteral(seq) => {
                for element in &seq.elements {
                    let text = self.emit_expression(element)?;
                    writer.line(format!("{}_insert(&{}, {});", suffix, target, text));
                }
            }
            Expression::DictLiteral(dict) => {
                for (key, entry_value) in &dict.entries {
                    let key_text = self.emit_expression(key)?;
                    let value_text = self.emit_expression(entry_value)?;
                    writer.line(format!(
                        "{}_insert(&{}, {}, {});",
                        suffix, target, key_text, value_text
                    ));
                }
            }
            _ => return Err(()),
        }
        Ok(())
    }

    fn emit_for(&mut self, writer: &mut CodeWriter, s: &ForStmt) {
        // range loops become counting loops
        if let Expression::Call(call) = &s.iterable {
            if call.function == "range" {
                let Ok(parts) = self.range_parts(&call.arguments) else {
                    return;
                };
                let variable = &s.targets[0];
                writer.line(format!(
                    "for (int {} = {}; {} < {}; {} += {}) {{",
                    variable, parts.0, variable, parts.1, variable, parts.2
                ));
                writer.indent();
                for stmt in &s.body {
                    self.emit_statement(writer, stmt);
                }
                writer.dedent();
                writer.line("}");
                return;
            }
        }

        // dict.items() iterates keys and values in parallel
        if let Expression::MethodCall(call) = &s.iterable {
            if call.method == "items" && s.targets.len() == 2 {
                if let Type::Dict(key_ty, value_ty) = call.receiver.ty().clone() {
                    let Ok(pointer) = self.emit_lvalue_pointer(&call.receiver) else {
                        return;
                    };
                    let suffix = call.receiver.ty().suffix();
                    let index = self.fresh_temp("i");
                    let Ok(key_name) = self.type_name(&key_ty, s.location) else {
                        return;
                    };
                    let Ok(value_name) = self.type_name(&value_ty, s.location) else {
                        return;
                    };
                    writer.line(format!(
                        "for (size_t {} = 0; {} < {}_size({}); {}++) {{",
                        index, index, suffix, pointer, index
                    ));
                    writer.indent();
                    writer.line(format!(
                        "{} {} = {}->keys[{}];",
                        key_name,
                        s.targets[0],
                        receiver_deref(&pointer),
                        index
                    ));
                    writer.line(format!(
                        "{} {} = {}->values[{}];",
                        value_name,
                        s.targets[1],
                        receiver_deref(&pointer),
                        index
                    ));
                    for stmt in &s.body {
                        self.emit_statement(writer, stmt);
                    }
                    writer.dedent();
                    writer.line("}");
                    return;
                }
            }
        }

        let iterable_ty = s.iterable.ty().clone();
        let Ok(pointer) = self.emit_lvalue_pointer(&s.iterable) else {
            return;
        };
        let suffix = iterable_ty.suffix();
        match &iterable_ty {
            Type::List(element) | Type::Set(element) => {
                let Ok(element_name) = self.type_name(element, s.location) else {
                    return;
                };
                let index = self.fresh_temp("i");
                writer.line(format!(
                    "for (size_t {} = 0; {} < {}_size({}); {}++) {{",
                    index, index, suffix, pointer, index
                ));
                writer.indent();
                writer.line(format!(
                    "{} {} = {}_at({}, {});",
                    element_name, s.targets[0], suffix, pointer, index
                ));
                for stmt in &s.body {
                    self.emit_statement(writer, stmt);
                }
                writer.dedent();
                writer.line("}");
            }
            Type::Dict(key, _) => {
                let Ok(key_name) = self.type_name(key, s.location) else {
                    return;
                };
                let index = self.fresh_temp("i");
                writer.line(format!(
                    "for (size_t {} = 0; {} < {}_size({}); {}++) {{",
                    index, index, suffix, pointer, index
                ));
                writer.indent();
                writer.line(format!(
                    "{} {} = {}->keys[{}];",
                    key_name,
                    s.targets[0],
                    receiver_deref(&pointer),
                    index
                ));
                for stmt in &s.body {
                    self.emit_statement(writer, stmt);
                }
                writer.dedent();
                writer.line("}");
            }
            other => {
                let _ = self.fail(
                    format!("cannot iterate a value of type {}", other),
                    s.location,
                );
            }
        }
    }

    fn range_parts(&mut self, arguments: &[Expression]) -> Result<(String, String, String), ()> {
        let mut parts = Vec::new();
        for argument in arguments {
            parts.push(self.emit_expression(argument)?);
        }
        Ok(match parts.len() {
            1 => ("0".to_string(), parts[0].clone(), "1".to_string()),
            2 => (parts[0].clone(), parts[1].clone(), "1".to_string()),
            _ => (parts[0].clone(), parts[1].clone(), parts[2].clone()),
        })
    }

    /// Declares a temporary holding the comprehension result and emits
    /// the loop filling it
    fn lower_comprehension(
        &mut self,
        writer: &mut CodeWriter,
        comp: &ComprehensionExpr,
    ) -> EmitExpr {
        let result_ty = comp.ty.clone();
        let type_name = self.type_name(&result_ty, comp.location)?;
        let suffix = result_ty.suffix();
        let temp = self.fresh_temp("acc");
        writer.line(format!("{} {} = {}_new();", type_name, temp, suffix));

        if let Expression::Call(call) = &*comp.iterable {
            if call.function == "range" {
                let parts = self.range_parts(&call.arguments)?;
                writer.line(format!(
                    "for (int {} = {}; {} < {}; {} += {}) {{",
                    comp.variable, parts.0, comp.variable, parts.1, comp.variable, parts.2
                ));
                writer.indent();
                self.emit_comprehension_body(writer, comp, &suffix, &temp)?;
                writer.dedent();
                writer.line("}");
                return Ok(temp);
            }
        }

        let iterable_ty = comp.iterable.ty().clone();
        let source_pointer = self.emit_lvalue_pointer(&comp.iterable)?;
        let source_suffix = iterable_ty.suffix();
        match &iterable_ty {
            Type::List(element) | Type::Set(element) => {
                let element_name = self.type_name(element, comp.location)?;
                let index = self.fresh_temp("i");
                writer.line(format!(
                    "for (size_t {} = 0; {} < {}_size({}); {}++) {{",
                    index, index, source_suffix, source_pointer, index
                ));
                writer.indent();
                writer.line(format!(
                    "{} {} = {}_at({}, {});",
                    element_name, comp.variable, source_suffix, source_pointer, index
                ));
                self.emit_comprehension_body(writer, comp, &suffix, &temp)?;
                writer.dedent();
                writer.line("}");
            }
            other => {
                return self.fail(
                    format!("cannot build a comprehension over {}", other),
                    comp.location,
                );
            }
        }
        Ok(temp)
    }

    fn emit_comprehension_body(
        &mut self,
        writer: &mut CodeWriter,
        comp: &ComprehensionExpr,
        suffix: &str,
        temp: &str,
    ) -> Result<(), ()> {
        let guarded = comp.condition.is_some();
        if let Some(condition) = &comp.condition {
            let condition = self.emit_expression(condition)?;
            writer.line(format!("if ({}) {{", condition));
            writer.indent();
        }

        let element = self.emit_expression(&comp.element)?;
        match comp.kind {
            ComprehensionKind::List => {
                writer.line(format!("{}_push(&{}, {});", suffix, temp, element));
            }
            ComprehensionKind::Set => {
                writer.line(format!("{}_insert(&{}, {});", suffix, temp, element));
            }
            ComprehensionKind::Dict => {
                let value = match &comp.value {
                    Some(value) => self.emit_expression(value)?,
                    None => return Err(()),
                };
                writer.line(format!("{}_insert(&{}, {}, {});", suffix, temp, element, value));
            }
            ComprehensionKind::Generator => return Err(()),
        }

        if guarded {
            writer.dedent();
            writer.line("}");
        }
        Ok(())
    }

    // ---- expressions ----

    /// Emits pointer-valued text for a container or record receiver
    fn emit_lvalue_pointer(&mut self, expr: &Expression) -> EmitExpr {
        match expr {
            Expression::Name(name) => {
                if self.pointer_receiver.as_deref() == Some(name.name.as_str()) {
                    Ok(name.name.clone())
                } else {
                    Ok(format!("&{}", name.name))
                }
            }
            Expression::Attribute(attr) => {
                let receiver = self.emit_expression(&attr.receiver)?;
                Ok(format!(
                    "&{}",
                    join_field(&receiver, &attr.attribute, self.is_pointer(&attr.receiver))
                ))
            }
            // nested element access: `a[i]` of a vec is an lvalue slot
            Expression::Subscript(sub) if matches!(sub.receiver.ty(), Type::List(_)) => {
                let pointer = self.emit_lvalue_pointer(&sub.receiver)?;
                let index = self.emit_expression(&sub.index)?;
                Ok(format!(
                    "&{}->data[(size_t)({})]",
                    receiver_deref(&pointer),
                    index
                ))
            }
            other => self.fail(
                "container operations need a named receiver".to_string(),
                other.location(),
            ),
        }
    }

    fn is_pointer(&self, expr: &Expression) -> bool {
        matches!(expr.as_name(), Some(name) if self.pointer_receiver.as_deref() == Some(name))
    }

    fn emit_target(&mut self, target: &Expression) -> EmitExpr {
        match target {
            Expression::Name(name) => Ok(name.name.clone()),
            Expression::Attribute(attr) => {
                let receiver = self.emit_expression(&attr.receiver)?;
                Ok(join_field(
                    &receiver,
                    &attr.attribute,
                    self.is_pointer(&attr.receiver),
                ))
            }
            Expression::Subscript(sub) => match sub.receiver.ty() {
                Type::List(_) => {
                    let pointer = self.emit_lvalue_pointer(&sub.receiver)?;
                    let index = self.emit_expression(&sub.index)?;
                    Ok(format!(
                        "{}->data[(size_t)({})]",
                        receiver_deref(&pointer),
                        index
                    ))
                }
                Type::Dict(_, _) => {
                    let pointer = self.emit_lvalue_pointer(&sub.receiver)?;
                    let index = self.emit_expression(&sub.index)?;
                    let suffix = sub.receiver.ty().suffix();
                    Ok(format!("(*{}_get({}, {}))", suffix, pointer, index))
                }
                other => self.fail(
                    format!("cannot assign through a subscript of {}", other),
                    sub.location,
                ),
            },
            other => self.fail(
                "unsupported assignment target".to_string(),
                other.location(),
            ),
        }
    }

    fn emit_expression(&mut self, expr: &Expression) -> EmitExpr {
        match expr {
            Expression::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Int(v) => v.to_string(),
                LiteralValue::Float(v) => format_float(*v),
                LiteralValue::Bool(v) => if *v { "true" } else { "false" }.to_string(),
                LiteralValue::Str(v) => format!("\"{}\"", escape_c_string(v)),
                LiteralValue::None => "NULL".to_string(),
            }),
            Expression::Name(name) => {
                if self.pointer_receiver.as_deref() == Some(name.name.as_str()) {
                    Ok(format!("(*{})", name.name))
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
                let receiver = self.emit_expression(&e.receiver)?;
                Ok(join_field(
                    &receiver,
                    &e.attribute,
                    self.is_pointer(&e.receiver),
                ))
            }
            Expression::Subscript(e) => {
                let index = self.emit_expression(&e.index)?;
                match e.receiver.ty() {
                    Type::List(_) => {
                        let pointer = self.emit_lvalue_pointer(&e.receiver)?;
                        let suffix = e.receiver.ty().suffix();
                        Ok(format!("{}_at({}, (size_t)({}))", suffix, pointer, index))
                    }
                    Type::Dict(_, _) => {
                        let pointer = self.emit_lvalue_pointer(&e.receiver)?;
                        let suffix = e.receiver.ty().suffix();
                        Ok(format!("(*{}_get({}, {}))", suffix, pointer, index))
                    }
                    other => self.fail(
                        format!("cannot subscript {} in the C backend", other),
                        e.location,
                    ),
                }
            }
            Expression::FormattedString(e) => {
                self.needs_asprintf = true;
                let mut fmt = String::new();
                let mut args = Vec::new();
                for part in &e.parts {
                    match part {
                        FStringPart::Text(text) => fmt.push_str(&escape_c_string(text)),
                        FStringPart::Expr(inner) => {
                            let descriptor = self.registry.descriptor(inner.ty());
                            let spec = descriptor
                                .map(|d| d.format_spec)
                                .filter(|spec| !spec.is_empty())
                                .unwrap_or("%d");
                            fmt.push_str(spec);
                            args.push(self.emit_expression(inner)?);
                        }
                    }
                }
                if args.is_empty() {
                    Ok(format!("mgen_strdup(\"{}\")", fmt))
                } else {
                    Ok(format!("mgen_asprintf(\"{}\", {})", fmt, args.join(", ")))
                }
            }
            Expression::Conditional(e) => {
                let condition = self.emit_expression(&e.condition)?;
                let then_value = self.emit_expression(&e.then_value)?;
                let else_value = self.emit_expression(&e.else_value)?;
                Ok(format!("({} ? {} : {})", condition, then_value, else_value))
            }
            Expression::ListLiteral(e) if e.elements.is_empty() => {
                let suffix = e.ty.suffix();
                self.type_name(&e.ty, e.location)?;
                Ok(format!("{}_new()", suffix))
            }
            Expression::DictLiteral(e) if e.entries.is_empty() => {
                let suffix = e.ty.suffix();
                self.type_name(&e.ty, e.location)?;
                Ok(format!("{}_new()", suffix))
            }
            Expression::SetLiteral(e) if e.elements.is_empty() => {
                let suffix = e.ty.suffix();
                self.type_name(&e.ty, e.location)?;
                Ok(format!("{}_new()", suffix))
            }
            other => self.fail(
                "expression form cannot be emitted for C".to_string(),
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
                    Ok(format!("pow({}, {})", left, right))
                } else {
                    self.needs_ipow = true;
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
            BinaryOperator::Add if left_ty == &Type::str() => {
                self.needs_asprintf = true;
                Ok(format!("mgen_asprintf(\"%s%s\", {}, {})", left, right))
            }
            other => match operators::binary(other) {
                Some(op) => Ok(format!("({} {} {})", left, op, right)),
                None => self.fail(format!("operator '{}' has no C form", other), location),
            },
        }
    }

    fn emit_comparison(&mut self, e: &mgen_ir::ast::ComparisonExpr) -> EmitExpr {
        use ComparisonOperator::*;
        match e.operator {
            In | NotIn => {
                let negate = e.operator == NotIn;
                let right_ty = e.right.ty().clone();
                let text = match &right_ty {
                    Type::Dict(_, _) | Type::List(_) | Type::Set(_) => {
                        let pointer = self.emit_lvalue_pointer(&e.right)?;
                        let value = self.emit_expression(&e.left)?;
                        format!("{}_contains({}, {})", right_ty.suffix(), pointer, value)
                    }
                    Type::Scalar(ScalarType::Str) => {
                        let haystack = self.emit_expression(&e.right)?;
                        let needle = self.emit_expression(&e.left)?;
                        format!("(strstr({}, {}) != NULL)", haystack, needle)
                    }
                    other => {
                        return self.fail(
                            format!("'in' is not supported on {} in the C backend", other),
                            e.location,
                        );
                    }
                };
                Ok(if negate { format!("!{}", text) } else { text })
            }
            Eq | NotEq if e.left.ty() == &Type::str() => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                let text = format!("str_eq({}, {})", left, right);
                Ok(if e.operator == NotEq {
                    format!("!{}", text)
                } else {
                    text
                })
            }
            Eq | NotEq
                if e.left.ty().is_container() && !matches!(e.left.ty(), Type::Tuple(_)) =>
            {
                let left = self.emit_lvalue_pointer(&e.left)?;
                let right = self.emit_lvalue_pointer(&e.right)?;
                let text = format!("{}_eq({}, {})", e.left.ty().suffix(), left, right);
                Ok(if e.operator == NotEq {
                    format!("!{}", text)
                } else {
                    text
                })
            }
            other => {
                let left = self.emit_expression(&e.left)?;
                let right = self.emit_expression(&e.right)?;
                match operators::comparison(other) {
                    Some(op) => Ok(format!("({} {} {})", left, op, right)),
                    None => {
                        self.fail(format!("comparison '{}' has no C form", other), e.location)
                    }
                }
            }
        }
    }

    fn emit_call(&mut self, e: &mgen_ir::ast::CallExpr) -> EmitExpr {
        match e.function.as_str() {
            "print" => {
                let argument = match e.arguments.first() {
                    Some(argument) => argument,
                    None => return Ok("printf(\"\\n\")".to_string()),
                };
                let text = self.emit_expression(argument)?;
                match argument.ty() {
                    Type::Scalar(ScalarType::Bool) => Ok(format!(
                        "printf(\"%s\\n\", ({}) ? \"true\" : \"false\")",
                        text
                    )),
                    ty => {
                        let spec = self
                            .registry
                            .descriptor(ty)
                            .map(|d| d.format_spec)
                            .filter(|spec| !spec.is_empty());
                        match spec {
                            Some(spec) => Ok(format!("printf(\"{}\\n\", {})", spec, text)),
                            None => self.fail(
                                format!("cannot print a value of type {}", ty),
                                e.location,
                            ),
                        }
                    }
                }
            }
            "len" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("len() needs an argument".to_string(), e.location);
                };
                match argument.ty() {
                    Type::Scalar(ScalarType::Str) => {
                        let text = self.emit_expression(argument)?;
                        Ok(format!("(int)strlen({})", text))
                    }
                    ty if ty.is_container() => {
                        let suffix = ty.suffix().to_string();
                        let pointer = self.emit_lvalue_pointer(argument)?;
                        Ok(format!("(int){}_size({})", suffix, pointer))
                    }
                    ty => self.fail(format!("len() is not defined for {}", ty), e.location),
                }
            }
            "str" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("str() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                self.needs_asprintf = true;
                let spec = self
                    .registry
                    .descriptor(argument.ty())
                    .map(|d| d.format_spec)
                    .filter(|spec| !spec.is_empty())
                    .unwrap_or("%d");
                Ok(format!("mgen_asprintf(\"{}\", {})", spec, text))
            }
            "abs" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("abs() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                if argument.ty() == &Type::float() {
                    self.needs_math = true;
                    Ok(format!("fabs({})", text))
                } else {
                    Ok(format!("abs({})", text))
                }
            }
            "int" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("int() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("(int)({})", text))
            }
            "float" => {
                let Some(argument) = e.arguments.first() else {
                    return self.fail("float() needs an argument".to_string(), e.location);
                };
                let text = self.emit_expression(argument)?;
                Ok(format!("(double)({})", text))
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
                        format!("builtin '{}' has no C lowering", name),
                        e.location,
                    );
                }
                // record constructors then user functions
                let mut arguments = Vec::new();
                for argument in &e.arguments {
                    arguments.push(self.emit_expression(argument)?);
                }
                if self.context.record(name).is_some() {
                    return Ok(format!("make_{}({})", name, arguments.join(", ")));
                }
                let callee = if name == "main" { "mgen_main" } else { name };
                Ok(format!("{}({})", callee, arguments.join(", ")))
            }
        }
    }

    fn emit_method_call(&mut self, e: &MethodCallExpr) -> EmitExpr {
        let receiver_ty = e.receiver.ty().clone();
        match &receiver_ty {
            Type::Record(record_name) => {
                // static methods take no receiver pointer
                let is_static = self
                    .context
                    .record(record_name)
                    .and_then(|record| record.method(&e.method))
                    .map(|method| method.is_static)
                    .unwrap_or(false);
                let mut arguments = Vec::new();
                if !is_static {
                    arguments.push(self.emit_lvalue_pointer(&e.receiver)?);
                }
                for argument in &e.arguments {
                    arguments.push(self.emit_expression(argument)?);
                }
                Ok(format!(
                    "{}_{}({})",
                    record_name,
                    e.method,
                    arguments.join(", ")
                ))
            }
            Type::List(_) | Type::Set(_) => {
                let suffix = receiver_ty.suffix();
                let pointer = self.emit_lvalue_pointer(&e.receiver)?;
                match (e.method.as_str(), e.arguments.first()) {
                    ("append", Some(argument)) => {
                        let value = self.emit_expression(argument)?;
                        Ok(format!("{}_push({}, {})", suffix, pointer, value))
                    }
                    ("add", Some(argument)) => {
                        let value = self.emit_expression(argument)?;
                        Ok(format!("{}_insert({}, {})", suffix, pointer, value))
                    }
                    ("remove", Some(argument)) | ("discard", Some(argument)) => {
                        let value = self.emit_expression(argument)?;
                        Ok(format!("{}_remove({}, {})", suffix, pointer, value))
                    }
                    ("clear", _) => Ok(format!("{}_destroy({})", suffix, pointer)),
                    (other, _) => self.fail(
                        format!("method '{}' has no C lowering", other),
                        e.location,
                    ),
                }
            }
            Type::Dict(_, _) => {
                let suffix = receiver_ty.suffix();
                let pointer = self.emit_lvalue_pointer(&e.receiver)?;
                match e.method.as_str() {
                    "get" if e.arguments.len() == 2 => {
                        let key = self.emit_expression(&e.arguments[0])?;
                        let default = self.emit_expression(&e.arguments[1])?;
                        Ok(format!(
                            "({}_contains({}, {}) ? *{}_get({}, {}) : {})",
                            suffix, pointer, key, suffix, pointer, key, default
                        ))
                    }
                    other => self.fail(
                        format!(
                            "dict method '{}' is only usable in loops in the C backend",
                            other
                        ),
                        e.location,
                    ),
                }
            }
            Type::Scalar(ScalarType::Str) => {
                let receiver = self.emit_expression(&e.receiver)?;
                match e.method.as_str() {
                    "split" if e.arguments.is_empty() => {
                        self.needs_split = true;
                        self.type_name(&Type::list(Type::str()), e.location)?;
                        Ok(format!("mgen_str_split({})", receiver))
                    }
                    "join" => {
                        self.needs_join = true;
                        self.type_name(&Type::list(Type::str()), e.location)?;
                        let Some(argument) = e.arguments.first() else {
                            return self.fail("join() needs an argument".to_string(), e.location);
                        };
                        let parts = self.emit_lvalue_pointer(argument)?;
                        Ok(format!("mgen_str_join({}, {})", receiver, parts))
                    }
                    "upper" => {
                        self.needs_upper_lower = true;
                        Ok(format!("mgen_str_upper({})", receiver))
                    }
                    "lower" => {
                        self.needs_upper_lower = true;
                        Ok(format!("mgen_str_lower({})", receiver))
                    }
                    "strip" if e.arguments.is_empty() => {
                        self.needs_strip = true;
                        Ok(format!("mgen_str_strip({})", receiver))
                    }
                    "find" => {
                        let Some(argument) = e.arguments.first() else {
                            return self.fail("find() needs an argument".to_string(), e.location);
                        };
                        let needle = self.emit_expression(argument)?;
                        Ok(format!(
                            "(strstr({}, {}) ? (int)(strstr({}, {}) - {}) : -1)",
                            receiver, needle, receiver, needle, receiver
                        ))
                    }
                    "startswith" => {
                        let Some(argument) = e.arguments.first() else {
                            return self
                                .fail("startswith() needs an argument".to_string(), e.location);
                        };
                        let prefix = self.emit_expression(argument)?;
                        Ok(format!(
                            "(strncmp({}, {}, strlen({})) == 0)",
                            receiver, prefix, prefix
                        ))
                    }
                    other => {
                        let message = if query::is_string_method(other) {
                            format!("string method '{}' has no C lowering", other)
                        } else {
                            format!("'{}' is not a string method", other)
                        };
                        self.fail(message, e.location)
                    }
                }
            }
            other => self.fail(
                format!("cannot call a method on {} in the C backend", other),
                e.location,
            ),
        }
    }
}

fn is_nonempty_container_literal(expr: &Expression) -> bool {
    match expr {
        Expression::ListLiteral(e) | Expression::SetLiteral(e) => !e.elements.is_empty(),
        Expression::DictLiteral(e) => !e.entries.is_empty(),
        _ => false,
    }
}

/// `p` → `p->field` / `v` → `v.field`
fn join_field(receiver: &str, field: &str, is_pointer: bool) -> String {
    if is_pointer {
        format!("{}->{}", receiver, field)
    } else if let Some(inner) = receiver.strip_prefix("(*").and_then(|r| r.strip_suffix(')')) {
        format!("{}->{}", inner, field)
    } else {
        format!("{}.{}", receiver, field)
    }
}

/// `&name` → `(&name)` usable with `->`; a bare pointer stays itself
fn receiver_deref(pointer: &str) -> String {
    if let Some(name) = pointer.strip_prefix('&') {
        format!("(&{})", name)
    } else {
        pointer.to_string()
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
