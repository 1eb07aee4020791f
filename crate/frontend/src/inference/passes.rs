//! The four inference passes and the finalize step
//!
//! Pass order is strict; each pass sees the bindings the previous pass
//! left in the compilation context. The early passes run quiet (no
//! diagnostics) because finalize re-synthesizes everything loud.

use super::Inferencer;
use mgen_error::ErrorCode;
use mgen_ir::ast::{Expression, Statement};
use mgen_ir::query;
use mgen_types::Type;
use std::collections::HashSet;

impl Inferencer<'_> {
    // ---- pass 1: literals and annotations ----

    pub(crate) fn pass_literals_and_annotations(&mut self, body: &mut [&mut Statement]) {
        for stmt in body.iter_mut() {
            self.pass1_statement(stmt);
        }
    }

    fn pass1_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Assign(s) => {
                let value_ty = self.synthesize(&mut s.value);
                let ty = match &s.annotation {
                    Some(annotation) => {
                        if annotation.container_depth() > 2 {
                            self.error_always(
                                ErrorCode::IncompatibleTypes,
                                format!(
                                    "container nesting deeper than two levels is not supported ({})",
                                    annotation
                                ),
                                s.location,
                            );
                        }
                        // a bare `list` annotation adopts the literal's
                        // element type when it has one
                        merge_annotation(annotation, &value_ty)
                    }
                    None => value_ty,
                };
                if let Some(name) = s.target.as_name() {
                    self.context.bind(name.to_string(), ty.clone());
                }
                s.ty = ty;
            }
            Statement::AugAssign(s) => {
                self.synthesize(&mut s.target);
                self.synthesize(&mut s.value);
            }
            Statement::Expression(s) => {
                self.synthesize(&mut s.expression);
            }
            Statement::Return(s) => {
                if let Some(value) = &mut s.value {
                    self.synthesize(value);
                }
            }
            Statement::If(s) => {
                for arm in &mut s.arms {
                    self.synthesize(&mut arm.condition);
                    for stmt in &mut arm.body {
                        self.pass1_statement(stmt);
                    }
                }
                for stmt in &mut s.else_body {
                    self.pass1_statement(stmt);
                }
            }
            Statement::While(s) => {
                self.synthesize(&mut s.condition);
                for stmt in &mut s.body {
                    self.pass1_statement(stmt);
                }
            }
            Statement::For(s) => {
                let iterable_ty = self.synthesize(&mut s.iterable);
                let element = self.iteration_element(&iterable_ty);
                s.target_tys = self.bind_for_targets(&s.targets, &element);
                for stmt in &mut s.body {
                    self.pass1_statement(stmt);
                }
            }
            Statement::Assert(s) => {
                self.synthesize(&mut s.condition);
                if let Some(message) = &mut s.message {
                    self.synthesize(message);
                }
            }
            _ => {}
        }
    }

    // ---- pass 2: container element refinement ----

    pub(crate) fn pass_container_refinement(&mut self, body: &mut [&mut Statement]) {
        let mut conflicted = HashSet::new();
        for stmt in body.iter_mut() {
            self.pass2_statement(stmt, &mut conflicted);
        }
    }

    fn pass2_statement(&mut self, stmt: &mut Statement, conflicted: &mut HashSet<String>) {
        match stmt {
            Statement::Expression(s) => {
                self.refine_from_mutator_call(&mut s.expression, conflicted);
            }
            Statement::Assign(s) => {
                // subscript store: `xs[i] = v` pins the element type
                if let Expression::Subscript(sub) = &s.target {
                    if let Some(name) = sub.receiver.as_name() {
                        let name = name.to_string();
                        if let Some(Type::List(element)) = self.context.binding(&name).cloned() {
                            if element.is_unknown() {
                                let value_ty = self.synthesize(&mut s.value);
                                if !value_ty.contains_unknown() {
                                    self.context.refine(&name, Type::list(value_ty));
                                }
                            }
                        }
                    }
                }
            }
            Statement::Return(s) => {
                // a returned binding adopts the annotated return container
                if let Some(value) = &s.value {
                    if let Some(name) = value.as_name() {
                        let name = name.to_string();
                        let annotated = self.current_return.clone();
                        if let Some(bound) = self.context.binding(&name).cloned() {
                            if same_container_family(&bound, &annotated)
                                && bound.contains_unknown()
                                && !annotated.contains_unknown()
                            {
                                self.context.refine(&name, annotated);
                            }
                        }
                    }
                }
            }
            Statement::If(s) => {
                for arm in &mut s.arms {
                    for stmt in &mut arm.body {
                        self.pass2_statement(stmt, conflicted);
                    }
                }
                for stmt in &mut s.else_body {
                    self.pass2_statement(stmt, conflicted);
                }
            }
            Statement::While(s) => {
                for stmt in &mut s.body {
                    self.pass2_statement(stmt, conflicted);
                }
            }
            Statement::For(s) => {
                for stmt in &mut s.body {
                    self.pass2_statement(stmt, conflicted);
                }
            }
            _ => {}
        }
    }

    /// Refines a binding from `xs.append(v)` / `xs.insert(i, v)` /
    /// `s.add(v)`, reporting the first conflicting site
    fn refine_from_mutator_call(
        &mut self,
        expr: &mut Expression,
        conflicted: &mut HashSet<String>,
    ) {
        let Expression::MethodCall(call) = expr else {
            return;
        };
        let Some(name) = call.receiver.as_name().map(str::to_string) else {
            return;
        };
        let value_index = match call.method.as_str() {
            "append" | "add" => 0,
            "insert" => 1,
            _ => return,
        };
        let Some(argument) = call.arguments.get_mut(value_index) else {
            return;
        };
        let argument_location = argument.location();
        let arg_ty = self.synthesize(argument);
        if arg_ty.contains_unknown() {
            return;
        }

        match self.context.binding(&name).cloned() {
            Some(Type::List(element)) => {
                if element.is_unknown() {
                    self.context.refine(&name, Type::list(arg_ty));
                } else if *element != arg_ty && !conflicted.contains(&name) {
                    conflicted.insert(name.clone());
                    self.error_always(
                        ErrorCode::IncompatibleTypes,
                        format!(
                            "incompatible element types for '{}': {} vs {}",
                            name, element, arg_ty
                        ),
                        argument_location,
                    );
                }
            }
            Some(Type::Set(element)) => {
                if element.is_unknown() {
                    self.context.refine(&name, Type::set(arg_ty));
                } else if *element != arg_ty && !conflicted.contains(&name) {
                    conflicted.insert(name.clone());
                    self.error_always(
                        ErrorCode::IncompatibleTypes,
                        format!(
                            "incompatible element types for '{}': {} vs {}",
                            name, element, arg_ty
                        ),
                        argument_location,
                    );
                }
            }
            _ => {}
        }
    }

    // ---- pass 3: nested-structure detection ----

    pub(crate) fn pass_nested_structure(&mut self, body: &mut [&mut Statement]) {
        // two triggers: appending a container value (already folded into
        // the refinement walk above, re-run for containers resolved by
        // pass 2), and `a[i][j]` reads
        let mut conflicted = HashSet::new();
        for stmt in body.iter_mut() {
            self.pass2_statement(stmt, &mut conflicted);
        }

        let mut double_subscripted: Vec<String> = Vec::new();
        for stmt in body.iter() {
            collect_double_subscripts(&**stmt, &mut double_subscripted);
        }
        for name in double_subscripted {
            if let Some(Type::List(element)) = self.context.binding(&name).cloned() {
                if element.is_unknown() {
                    self.context
                        .refine(&name, Type::list(Type::list(Type::Unknown)));
                }
            }
        }

        // reject resolutions that went deeper than two levels
        let mut too_deep: Vec<(String, mgen_ir::SourceLocation)> = Vec::new();
        for stmt in body.iter() {
            if let Statement::Assign(s) = &**stmt {
                if let Some(name) = s.target.as_name() {
                    if let Some(ty) = self.context.binding(name) {
                        if ty.container_depth() > 2 && s.annotation.is_none() {
                            too_deep.push((name.to_string(), s.location));
                        }
                    }
                }
            }
        }
        for (name, location) in too_deep {
            self.error_always(
                ErrorCode::IncompatibleTypes,
                format!(
                    "container nesting deeper than two levels is not supported ('{}')",
                    name
                ),
                location,
            );
        }
    }

    // ---- pass 4: dict key/value refinement ----

    pub(crate) fn pass_key_value(&mut self, body: &mut [&mut Statement]) {
        let mut conflicted = HashSet::new();
        for stmt in body.iter_mut() {
            self.pass4_statement(stmt, &mut conflicted);
        }
    }

    fn pass4_statement(&mut self, stmt: &mut Statement, conflicted: &mut HashSet<String>) {
        match stmt {
            Statement::Assign(s) => {
                if let Expression::Subscript(sub) = &mut s.target {
                    if let Some(name) = sub.receiver.as_name().map(str::to_string) {
                        if let Some(Type::Dict(_, _)) = self.context.binding(&name) {
                            let key_ty = self.synthesize(&mut sub.index);
                            let value_ty = self.synthesize(&mut s.value);
                            self.refine_dict(&name, Some(&key_ty), Some(&value_ty), s.location, conflicted);
                        }
                    }
                }
                self.refine_dict_reads(&s.value.clone(), conflicted);
            }
            Statement::AugAssign(s) => {
                if let Expression::Subscript(sub) = &mut s.target {
                    if let Some(name) = sub.receiver.as_name().map(str::to_string) {
                        if let Some(Type::Dict(_, _)) = self.context.binding(&name) {
                            let key_ty = self.synthesize(&mut sub.index);
                            let value_ty = self.synthesize(&mut s.value);
                            self.refine_dict(&name, Some(&key_ty), Some(&value_ty), s.location, conflicted);
                        }
                    }
                }
            }
            Statement::Expression(s) => self.refine_dict_reads(&s.expression.clone(), conflicted),
            Statement::Return(s) => {
                if let Some(value) = &s.value {
                    self.refine_dict_reads(&value.clone(), conflicted);
                }
            }
            Statement::If(s) => {
                let conditions: Vec<Expression> =
                    s.arms.iter().map(|arm| arm.condition.clone()).collect();
                for condition in &conditions {
                    self.refine_dict_reads(condition, conflicted);
                }
                for arm in &mut s.arms {
                    for stmt in &mut arm.body {
                        self.pass4_statement(stmt, conflicted);
                    }
                }
                for stmt in &mut s.else_body {
                    self.pass4_statement(stmt, conflicted);
                }
            }
            Statement::While(s) => {
                self.refine_dict_reads(&s.condition.clone(), conflicted);
                for stmt in &mut s.body {
                    self.pass4_statement(stmt, conflicted);
                }
            }
            Statement::For(s) => {
                for stmt in &mut s.body {
                    self.pass4_statement(stmt, conflicted);
                }
            }
            _ => {}
        }
    }

    /// Scans an expression tree for dict reads that pin key types:
    /// `d[k]`, `k in d`, `d.get(k)`
    fn refine_dict_reads(&mut self, expr: &Expression, conflicted: &mut HashSet<String>) {
        let mut observations: Vec<(String, Type)> = Vec::new();
        query::walk_expression(expr, &mut |node| match node {
            Expression::Subscript(sub) => {
                if let Some(name) = sub.receiver.as_name() {
                    observations.push((name.to_string(), key_guess(&sub.index)));
                }
            }
            Expression::Comparison(cmp)
                if matches!(
                    cmp.operator,
                    mgen_ir::ast::ComparisonOperator::In
                        | mgen_ir::ast::ComparisonOperator::NotIn
                ) =>
            {
                if let Some(name) = cmp.right.as_name() {
                    observations.push((name.to_string(), key_guess(&cmp.left)));
                }
            }
            Expression::MethodCall(call) if call.method == "get" => {
                if let Some(name) = call.receiver.as_name() {
                    if let Some(key) = call.arguments.first() {
                        observations.push((name.to_string(), key_guess(key)));
                    }
                }
            }
            _ => {}
        });

        for (name, key_ty) in observations {
            if let Some(Type::Dict(_, _)) = self.context.binding(&name) {
                if !key_ty.contains_unknown() {
                    let location = expr.location();
                    self.refine_dict(&name, Some(&key_ty), None, location, conflicted);
                }
            }
        }
    }

    fn refine_dict(
        &mut self,
        name: &str,
        key_ty: Option<&Type>,
        value_ty: Option<&Type>,
        location: mgen_ir::SourceLocation,
        conflicted: &mut HashSet<String>,
    ) {
        let Some(Type::Dict(bound_key, bound_value)) = self.context.binding(name).cloned() else {
            return;
        };
        let mut new_key = *bound_key.clone();
        let mut new_value = *bound_value.clone();

        if let Some(observed) = key_ty {
            if !observed.contains_unknown() {
                if new_key.is_unknown() {
                    new_key = observed.clone();
                } else if new_key != *observed && !conflicted.contains(name) {
                    conflicted.insert(name.to_string());
                    self.error_always(
                        ErrorCode::IncompatibleTypes,
                        format!(
                            "incompatible key types for '{}': {} vs {}",
                            name, new_key, observed
                        ),
                        location,
                    );
                }
            }
        }
        if let Some(observed) = value_ty {
            if !observed.contains_unknown() {
                if new_value.is_unknown() {
                    new_value = observed.clone();
                } else if new_value != *observed && !conflicted.contains(name) {
                    conflicted.insert(name.to_string());
                    self.error_always(
                        ErrorCode::IncompatibleTypes,
                        format!(
                            "incompatible value types for '{}': {} vs {}",
                            name, new_value, observed
                        ),
                        location,
                    );
                }
            }
        }

        if new_key != *bound_key || new_value != *bound_value {
            self.context.refine(name, Type::dict(new_key, new_value));
        }
    }

    // ---- finalize: loud re-synthesis and E2002 collection ----

    pub(crate) fn finalize(&mut self, body: &mut [&mut Statement]) {
        let mut reported: HashSet<String> = HashSet::new();
        for stmt in body.iter_mut() {
            self.finalize_statement(stmt, &mut reported);
        }
    }

    fn finalize_statement(&mut self, stmt: &mut Statement, reported: &mut HashSet<String>) {
        match stmt {
            Statement::Assign(s) => {
                let value_ty = self.synthesize(&mut s.value);
                self.synthesize(&mut s.target);
                if let Some(name) = s.target.as_name().map(str::to_string) {
                    // an empty container literal adopts the binding's
                    // resolved type so emitters see a concrete element
                    if let Some(bound) = self.context.binding(&name).cloned() {
                        if s.value.ty().contains_unknown() && !bound.contains_unknown() {
                            *s.value.ty_mut() = bound;
                        }
                    }
                    let bound = self
                        .context
                        .binding(&name)
                        .cloned()
                        .unwrap_or(Type::Unknown);
                    if let Some(annotation) = &s.annotation {
                        if !types_compatible(&bound, &value_ty) {
                            self.error(
                                ErrorCode::IncompatibleTypes,
                                format!(
                                    "'{}' is annotated {} but assigned {}",
                                    name, annotation, value_ty
                                ),
                                s.location,
                            );
                        }
                    }
                    s.ty = bound.clone();
                    if bound.contains_unknown() && !reported.contains(&name) {
                        reported.insert(name.clone());
                        self.missing_annotation(&name, &bound, s.location);
                    } else if !bound.contains_unknown() && !self.registry.is_registered(&bound) {
                        self.error(
                            ErrorCode::UnresolvedType,
                            format!("type {} cannot be mapped to the target", bound),
                            s.location,
                        );
                    }
                } else {
                    // attribute or subscript store
                    s.ty = value_ty;
                }
            }
            Statement::AugAssign(s) => {
                let target_ty = self.synthesize(&mut s.target);
                let value_ty = self.synthesize(&mut s.value);
                if !target_ty.contains_unknown()
                    && !value_ty.contains_unknown()
                    && !types_compatible(&target_ty, &value_ty)
                {
                    self.error(
                        ErrorCode::IncompatibleTypes,
                        format!(
                            "cannot apply '{}=' between {} and {}",
                            s.operator, target_ty, value_ty
                        ),
                        s.location,
                    );
                }
            }
            Statement::Expression(s) => {
                self.synthesize(&mut s.expression);
            }
            Statement::Return(s) => {
                if let Some(value) = &mut s.value {
                    let value_ty = self.synthesize(value);
                    let expected = self.current_return.clone();
                    if !expected.contains_unknown()
                        && !value_ty.contains_unknown()
                        && !types_compatible(&expected, &value_ty)
                    {
                        self.error(
                            ErrorCode::IncompatibleTypes,
                            format!("returning {} from a function declared {}", value_ty, expected),
                            s.location,
                        );
                    }
                }
            }
            Statement::If(s) => {
                for arm in &mut s.arms {
                    self.synthesize(&mut arm.condition);
                    for stmt in &mut arm.body {
                        self.finalize_statement(stmt, reported);
                    }
                }
                for stmt in &mut s.else_body {
                    self.finalize_statement(stmt, reported);
                }
            }
            Statement::While(s) => {
                self.synthesize(&mut s.condition);
                for stmt in &mut s.body {
                    self.finalize_statement(stmt, reported);
                }
            }
            Statement::For(s) => {
                let iterable_ty = self.synthesize(&mut s.iterable);
                let element = self.iteration_element(&iterable_ty);
                s.target_tys = self.bind_for_targets(&s.targets, &element);
                for stmt in &mut s.body {
                    self.finalize_statement(stmt, reported);
                }
            }
            Statement::Assert(s) => {
                self.synthesize(&mut s.condition);
                if let Some(message) = &mut s.message {
                    self.synthesize(message);
                }
            }
            _ => {}
        }
    }
}

/// Whether `expected` accepts a value of type `actual`
pub(crate) fn types_compatible(expected: &Type, actual: &Type) -> bool {
    if expected == actual || expected.contains_unknown() || actual.contains_unknown() {
        return true;
    }
    match (expected, actual) {
        // int literals flow into float contexts
        (Type::Scalar(mgen_types::ScalarType::Float), Type::Scalar(mgen_types::ScalarType::Int)) => {
            true
        }
        (Type::List(a), Type::List(b)) | (Type::Set(a), Type::Set(b)) => types_compatible(a, b),
        (Type::Dict(ak, av), Type::Dict(bk, bv)) => {
            types_compatible(ak, bk) && types_compatible(av, bv)
        }
        _ => false,
    }
}

/// Whether both types are the same container family
fn same_container_family(a: &Type, b: &Type) -> bool {
    matches!(
        (a, b),
        (Type::List(_), Type::List(_))
            | (Type::Set(_), Type::Set(_))
            | (Type::Dict(_, _), Type::Dict(_, _))
    )
}

/// An annotated container adopts element types the value already carries
fn merge_annotation(annotation: &Type, value_ty: &Type) -> Type {
    match (annotation, value_ty) {
        (Type::List(a), Type::List(b)) if a.is_unknown() && !b.contains_unknown() => {
            value_ty.clone()
        }
        (Type::Set(a), Type::Set(b)) if a.is_unknown() && !b.contains_unknown() => value_ty.clone(),
        (Type::Dict(ak, av), Type::Dict(bk, bv))
            if ak.is_unknown()
                && av.is_unknown()
                && !bk.contains_unknown()
                && !bv.contains_unknown() =>
        {
            value_ty.clone()
        }
        _ => annotation.clone(),
    }
}

/// Collects names read through two subscript levels (`a[i][j]`)
fn collect_double_subscripts(stmt: &Statement, out: &mut Vec<String>) {
    query::walk_statements(std::slice::from_ref(stmt), &mut |inner| {
        query::statement_expressions(inner, &mut |expr| {
            if let Expression::Subscript(outer) = expr {
                if let Expression::Subscript(inner_sub) = &*outer.receiver {
                    if let Some(name) = inner_sub.receiver.as_name() {
                        out.push(name.to_string());
                    }
                }
            }
        });
    });
}

/// The type of a key expression, for dict refinement observations
fn key_guess(expr: &Expression) -> Type {
    match expr {
        Expression::Literal(lit) => match &lit.value {
            mgen_ir::ast::LiteralValue::Str(_) => Type::str(),
            mgen_ir::ast::LiteralValue::Int(_) => Type::int(),
            _ => Type::Unknown,
        },
        other => other.ty().clone(),
    }
}
