//! Per-expression-kind inference strategies
//!
//! `synthesize` is the dispatcher: one strategy per expression kind, each
//! receiving the binding environment and the target registry through the
//! inferencer. Every strategy writes the resolved type into the node's
//! type slot and returns it, so re-running the dispatcher on an already
//! typed tree reproduces the same answer.

use super::Inferencer;
use super::passes::types_compatible;
use mgen_error::ErrorCode;
use mgen_ir::ast::{
    AttributeExpr, BinaryExpr, BinaryOperator, BoolExpr, CallExpr, ComparisonExpr,
    ComprehensionExpr, ComprehensionKind, ConditionalExpr, DictLiteralExpr, Expression,
    FStringPart, FormattedStringExpr, LiteralValue, MethodCallExpr, SequenceLiteralExpr,
    SliceExpr, SubscriptExpr, UnaryExpr, UnaryOperator,
};
use mgen_ir::query;
use mgen_types::{ScalarType, Type};

impl Inferencer<'_> {
    /// Dispatches to the strategy for this expression kind
    pub(crate) fn synthesize(&mut self, expr: &mut Expression) -> Type {
        let ty = match expr {
            Expression::Literal(e) => {
                let ty = infer_literal(&e.value);
                e.ty = ty.clone();
                return ty;
            }
            Expression::Name(e) => {
                let ty = self.infer_name(&e.name, e.location);
                e.ty = ty.clone();
                return ty;
            }
            Expression::Binary(e) => self.infer_binary(e),
            Expression::Unary(e) => self.infer_unary(e),
            Expression::Comparison(e) => self.infer_comparison(e),
            Expression::Bool(e) => self.infer_bool(e),
            Expression::Call(e) => self.infer_call(e),
            Expression::MethodCall(e) => self.infer_method_call(e),
            Expression::Attribute(e) => self.infer_attribute(e),
            Expression::Subscript(e) => self.infer_subscript(e),
            Expression::Slice(e) => self.infer_slice(e),
            Expression::ListLiteral(e) => {
                let element = self.infer_sequence_element(e);
                e.ty = Type::List(Box::new(element));
                return e.ty.clone();
            }
            Expression::SetLiteral(e) => {
                let element = self.infer_sequence_element(e);
                e.ty = Type::Set(Box::new(element));
                return e.ty.clone();
            }
            Expression::TupleLiteral(e) => {
                let mut types = Vec::new();
                for element in &mut e.elements {
                    types.push(self.synthesize(element));
                }
                e.ty = Type::Tuple(types);
                return e.ty.clone();
            }
            Expression::DictLiteral(e) => self.infer_dict_literal(e),
            Expression::Comprehension(e) => self.infer_comprehension(e),
            Expression::FormattedString(e) => self.infer_fstring(e),
            Expression::Conditional(e) => self.infer_conditional(e),
            Expression::Lambda(e) => {
                self.synthesize(&mut e.body);
                e.ty = Type::Unknown;
                return Type::Unknown;
            }
            Expression::Yield(e) => {
                e.ty = Type::Unknown;
                return Type::Unknown;
            }
            Expression::Await(e) => {
                e.ty = Type::Unknown;
                return Type::Unknown;
            }
        };
        *expr.ty_mut() = ty.clone();
        ty
    }

    fn infer_name(&mut self, name: &str, location: mgen_ir::SourceLocation) -> Type {
        if let Some(ty) = self.context.binding(name) {
            return ty.clone();
        }
        if self.context.function(name).is_some() || self.context.record(name).is_some() {
            // bare function/record references only make sense as callees
            return Type::Unknown;
        }
        self.error(
            ErrorCode::UnresolvedType,
            format!("undefined name '{}'", name),
            location,
        );
        Type::Unknown
    }

    fn infer_binary(&mut self, e: &mut BinaryExpr) -> Type {
        let left = self.synthesize(&mut e.left);
        let right = self.synthesize(&mut e.right);
        if left.contains_unknown() || right.contains_unknown() {
            return Type::Unknown;
        }

        use ScalarType::*;
        let result = match (&left, e.operator, &right) {
            (Type::Scalar(Int), BinaryOperator::Div, Type::Scalar(Int)) => Some(Type::float()),
            (Type::Scalar(Int), _, Type::Scalar(Int)) => Some(Type::int()),
            (Type::Scalar(Float), op, Type::Scalar(Float))
            | (Type::Scalar(Int), op, Type::Scalar(Float))
            | (Type::Scalar(Float), op, Type::Scalar(Int))
                if op != BinaryOperator::FloorDiv =>
            {
                Some(Type::float())
            }
            (Type::Scalar(Str), BinaryOperator::Add, Type::Scalar(Str)) => Some(Type::str()),
            (Type::Scalar(Str), BinaryOperator::Mul, Type::Scalar(Int)) => Some(Type::str()),
            (Type::List(a), BinaryOperator::Add, Type::List(b)) if a == b => Some(left.clone()),
            _ => None,
        };

        match result {
            Some(ty) => ty,
            None => {
                self.error(
                    ErrorCode::IncompatibleTypes,
                    format!("cannot apply '{}' between {} and {}", e.operator, left, right),
                    e.location,
                );
                Type::Unknown
            }
        }
    }

    fn infer_unary(&mut self, e: &mut UnaryExpr) -> Type {
        let operand = self.synthesize(&mut e.operand);
        if operand.contains_unknown() {
            return Type::Unknown;
        }
        match (e.operator, &operand) {
            (UnaryOperator::Neg | UnaryOperator::Pos, ty) if ty.is_numeric() => operand,
            (UnaryOperator::Not, Type::Scalar(ScalarType::Bool)) => Type::bool(),
            _ => {
                self.error(
                    ErrorCode::IncompatibleTypes,
                    format!("cannot apply unary '{}' to {}", e.operator, operand),
                    e.location,
                );
                Type::Unknown
            }
        }
    }

    fn infer_comparison(&mut self, e: &mut ComparisonExpr) -> Type {
        use mgen_ir::ast::ComparisonOperator::*;
        let left = self.synthesize(&mut e.left);
        let right = self.synthesize(&mut e.right);
        match e.operator {
            In | NotIn => {
                // the right operand must be a container or a string
                if !right.contains_unknown()
                    && !right.is_container()
                    && right != Type::str()
                {
                    self.error(
                        ErrorCode::IncompatibleTypes,
                        format!("'in' needs a container or string, found {}", right),
                        e.location,
                    );
                }
            }
            _ => {
                let comparable = left.contains_unknown()
                    || right.contains_unknown()
                    || left == right
                    || (left.is_numeric() && right.is_numeric());
                if !comparable {
                    self.error(
                        ErrorCode::IncompatibleTypes,
                        format!("cannot compare {} with {}", left, right),
                        e.location,
                    );
                }
            }
        }
        Type::bool()
    }

    fn infer_bool(&mut self, e: &mut BoolExpr) -> Type {
        for side in [&mut e.left, &mut e.right] {
            let ty = self.synthesize(side);
            if !ty.contains_unknown() && ty != Type::bool() {
                let location = side.location();
                self.error(
                    ErrorCode::IncompatibleTypes,
                    format!("'{}' operands must be bool, found {}", e.operator, ty),
                    location,
                );
            }
        }
        Type::bool()
    }

    fn infer_call(&mut self, e: &mut CallExpr) -> Type {
        let mut argument_types = Vec::new();
        for argument in &mut e.arguments {
            argument_types.push(self.synthesize(argument));
        }

        if let Some(ty) = self.infer_builtin_call(e, &argument_types) {
            return ty;
        }

        // record constructor
        if let Some(record) = self.context.record(&e.function) {
            let arity = record.fields.len();
            if e.arguments.len() != arity {
                let name = record.name.clone();
                self.error(
                    ErrorCode::SignatureMismatch,
                    format!(
                        "'{}' takes {} arguments, {} given",
                        name,
                        arity,
                        e.arguments.len()
                    ),
                    e.location,
                );
            }
            return Type::Record(e.function.clone());
        }

        if let Some(sig) = self.context.function(&e.function) {
            let return_type = sig.return_type.clone();
            let arity = sig.parameters.len();
            if e.arguments.len() != arity {
                let name = e.function.clone();
                self.error(
                    ErrorCode::SignatureMismatch,
                    format!("'{}' takes {} arguments, {} given", name, arity, e.arguments.len()),
                    e.location,
                );
            }
            return return_type;
        }

        self.error(
            ErrorCode::UnresolvedType,
            format!("call to undefined function '{}'", e.function),
            e.location,
        );
        Type::Unknown
    }

    /// Types calls to the recognized builtins
    fn infer_builtin_call(&mut self, e: &CallExpr, argument_types: &[Type]) -> Option<Type> {
        let first = argument_types.first().cloned().unwrap_or(Type::Unknown);
        let ty = match e.function.as_str() {
            "print" => Type::none(),
            "len" => Type::int(),
            "range" => Type::list(Type::int()),
            "str" => Type::str(),
            "int" => Type::int(),
            "float" => Type::float(),
            "bool" => Type::bool(),
            "abs" => first,
            "min" | "max" => {
                if argument_types.len() == 1 {
                    self.iteration_element(&first)
                } else {
                    first
                }
            }
            "sum" => match self.iteration_element(&first) {
                Type::Scalar(ScalarType::Float) => Type::float(),
                _ => Type::int(),
            },
            "sorted" => first,
            _ => return None,
        };
        Some(ty)
    }

    fn infer_method_call(&mut self, e: &mut MethodCallExpr) -> Type {
        let receiver = self.synthesize(&mut e.receiver);
        let mut argument_types = Vec::new();
        for argument in &mut e.arguments {
            argument_types.push(self.synthesize(argument));
        }

        if receiver.contains_unknown() {
            // containers with unresolved parameters still type their
            // no-result mutators
            if query::is_list_mutator(&e.method)
                || query::is_set_mutator(&e.method)
                || query::is_dict_mutator(&e.method)
            {
                return Type::none();
            }
            return Type::Unknown;
        }

        let result = match &receiver {
            Type::Scalar(ScalarType::Str) => match e.method.as_str() {
                "split" => Some(Type::list(Type::str())),
                "join" => Some(Type::str()),
                "upper" | "lower" | "strip" | "replace" => Some(Type::str()),
                "find" => Some(Type::int()),
                "startswith" | "endswith" => Some(Type::bool()),
                _ => None,
            },
            Type::List(element) => match e.method.as_str() {
                "append" | "insert" | "remove" | "extend" | "clear" | "sort" => Some(Type::none()),
                "pop" => Some((**element).clone()),
                "index" | "count" => Some(Type::int()),
                _ => None,
            },
            Type::Set(element) => match e.method.as_str() {
                "add" | "discard" | "remove" | "clear" => Some(Type::none()),
                "pop" => Some((**element).clone()),
                _ => None,
            },
            Type::Dict(key, value) => match e.method.as_str() {
                // an unresolved value type borrows get's default argument
                "get" => {
                    let mut ty = (**value).clone();
                    if ty.is_unknown() {
                        if let Some(default) = argument_types.get(1) {
                            ty = default.clone();
                        }
                    }
                    Some(ty)
                }
                "pop" => Some((**value).clone()),
                "keys" => Some(Type::List(key.clone())),
                "values" => Some(Type::List(value.clone())),
                "items" => Some(Type::list(Type::Tuple(vec![
                    (**key).clone(),
                    (**value).clone(),
                ]))),
                "clear" | "update" => Some(Type::none()),
                _ => None,
            },
            Type::Record(name) => {
                let method = self
                    .context
                    .record(name)
                    .and_then(|record| record.method(&e.method))
                    .cloned();
                match method {
                    Some(descriptor) => {
                        if e.arguments.len() != descriptor.parameters.len() {
                            self.error(
                                ErrorCode::SignatureMismatch,
                                format!(
                                    "'{}.{}' takes {} arguments, {} given",
                                    name,
                                    e.method,
                                    descriptor.parameters.len(),
                                    e.arguments.len()
                                ),
                                e.location,
                            );
                        }
                        Some(descriptor.return_type.clone())
                    }
                    None => None,
                }
            }
            _ => None,
        };

        match result {
            Some(ty) => ty,
            None => {
                self.error(
                    ErrorCode::UnresolvedType,
                    format!("{} has no method '{}'", receiver, e.method),
                    e.location,
                );
                Type::Unknown
            }
        }
    }

    fn infer_attribute(&mut self, e: &mut AttributeExpr) -> Type {
        let receiver = self.synthesize(&mut e.receiver);
        match &receiver {
            Type::Record(name) => {
                let field = self
                    .context
                    .record(name)
                    .and_then(|record| record.field_type(&e.attribute))
                    .cloned();
                match field {
                    Some(ty) => ty,
                    None => {
                        let record = name.clone();
                        self.error(
                            ErrorCode::UnresolvedType,
                            format!("record '{}' has no field '{}'", record, e.attribute),
                            e.location,
                        );
                        Type::Unknown
                    }
                }
            }
            _ => Type::Unknown,
        }
    }

    fn infer_subscript(&mut self, e: &mut SubscriptExpr) -> Type {
        let receiver = self.synthesize(&mut e.receiver);
        let index = self.synthesize(&mut e.index);
        match &receiver {
            Type::List(element) => {
                if !index.contains_unknown() && index != Type::int() {
                    self.error(
                        ErrorCode::IncompatibleTypes,
                        format!("list index must be int, found {}", index),
                        e.location,
                    );
                }
                (**element).clone()
            }
            Type::Dict(key, value) => {
                if !index.contains_unknown() && !key.is_unknown() && index != **key {
                    self.error(
                        ErrorCode::IncompatibleTypes,
                        format!("dict key must be {}, found {}", key, index),
                        e.location,
                    );
                }
                (**value).clone()
            }
            Type::Scalar(ScalarType::Str) => Type::str(),
            Type::Tuple(elements) => match constant_index(&e.index) {
                Some(i) if i < elements.len() => elements[i].clone(),
                _ => Type::Unknown,
            },
            Type::Unknown => Type::Unknown,
            other => {
                self.error(
                    ErrorCode::IncompatibleTypes,
                    format!("{} is not subscriptable", other),
                    e.location,
                );
                Type::Unknown
            }
        }
    }

    fn infer_slice(&mut self, e: &mut SliceExpr) -> Type {
        let receiver = self.synthesize(&mut e.receiver);
        if let Some(lower) = &mut e.lower {
            self.synthesize(lower);
        }
        if let Some(upper) = &mut e.upper {
            self.synthesize(upper);
        }
        match &receiver {
            Type::List(_) | Type::Scalar(ScalarType::Str) => receiver,
            Type::Unknown => Type::Unknown,
            other => {
                self.error(
                    ErrorCode::IncompatibleTypes,
                    format!("{} cannot be sliced", other),
                    e.location,
                );
                Type::Unknown
            }
        }
    }

    /// The element type of a list/set literal: unknown when empty,
    /// otherwise the first element's type
    fn infer_sequence_element(&mut self, e: &mut SequenceLiteralExpr) -> Type {
        let mut element = Type::Unknown;
        for (index, item) in e.elements.iter_mut().enumerate() {
            let ty = self.synthesize(item);
            if index == 0 {
                element = ty;
            } else if !element.contains_unknown()
                && !ty.contains_unknown()
                && !types_compatible(&element, &ty)
            {
                let location = item.location();
                self.error(
                    ErrorCode::IncompatibleTypes,
                    format!("container literal mixes {} and {}", element, ty),
                    location,
                );
            }
        }
        element
    }

    fn infer_dict_literal(&mut self, e: &mut DictLiteralExpr) -> Type {
        let mut key_ty = Type::Unknown;
        let mut value_ty = Type::Unknown;
        for (index, (key, value)) in e.entries.iter_mut().enumerate() {
            let k = self.synthesize(key);
            let v = self.synthesize(value);
            if index == 0 {
                key_ty = k;
                value_ty = v;
            }
        }
        Type::dict(key_ty, value_ty)
    }

    fn infer_comprehension(&mut self, e: &mut ComprehensionExpr) -> Type {
        let iterable = self.synthesize(&mut e.iterable);
        let element_ty = self.iteration_element(&iterable);

        self.context.begin_scope();
        self.context.bind(e.variable.clone(), element_ty);
        let element = self.synthesize(&mut e.element);
        let value = e.value.as_mut().map(|value| self.synthesize(value));
        if let Some(condition) = &mut e.condition {
            let ty = self.synthesize(condition);
            if !ty.contains_unknown() && ty != Type::bool() {
                let location = condition.location();
                self.error(
                    ErrorCode::IncompatibleTypes,
                    format!("comprehension filter must be bool, found {}", ty),
                    location,
                );
            }
        }
        self.context.end_scope();

        match e.kind {
            ComprehensionKind::List => Type::List(Box::new(element)),
            ComprehensionKind::Set => Type::Set(Box::new(element)),
            ComprehensionKind::Dict => {
                Type::dict(element, value.unwrap_or(Type::Unknown))
            }
            ComprehensionKind::Generator => Type::Unknown,
        }
    }

    fn infer_fstring(&mut self, e: &mut FormattedStringExpr) -> Type {
        for part in &mut e.parts {
            if let FStringPart::Expr(inner) = part {
                self.synthesize(inner);
            }
        }
        Type::str()
    }

    fn infer_conditional(&mut self, e: &mut ConditionalExpr) -> Type {
        let condition = self.synthesize(&mut e.condition);
        if !condition.contains_unknown() && condition != Type::bool() {
            self.error(
                ErrorCode::IncompatibleTypes,
                format!("conditional test must be bool, found {}", condition),
                e.location,
            );
        }
        let then_ty = self.synthesize(&mut e.then_value);
        let else_ty = self.synthesize(&mut e.else_value);
        if then_ty.contains_unknown() {
            return else_ty;
        }
        if !else_ty.contains_unknown() && !types_compatible(&then_ty, &else_ty) {
            self.error(
                ErrorCode::IncompatibleTypes,
                format!("conditional branches disagree: {} vs {}", then_ty, else_ty),
                e.location,
            );
        }
        then_ty
    }
}

fn infer_literal(value: &LiteralValue) -> Type {
    match value {
        LiteralValue::Int(_) => Type::int(),
        LiteralValue::Float(_) => Type::float(),
        LiteralValue::Bool(_) => Type::bool(),
        LiteralValue::Str(_) => Type::str(),
        LiteralValue::None => Type::none(),
    }
}

fn constant_index(expr: &Expression) -> Option<usize> {
    match expr {
        Expression::Literal(lit) => match lit.value {
            LiteralValue::Int(v) if v >= 0 => Some(v as usize),
            _ => None,
        },
        _ => None,
    }
}
