use crate::location::SourceLocation;
use mgen_types::Type;
use std::fmt::Display;

/// A parsed source module: the ordered top-level items plus the raw text
/// and file path for diagnostics
#[derive(Debug, Clone)]
pub struct Module {
    /// Top-level statements in source order
    pub items: Vec<Statement>,
    /// The raw source text
    pub source: String,
    /// Path of the source file, for diagnostics
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// Addition operator
    Add,
    /// Subtraction operator
    Sub,
    /// Multiplication operator
    Mul,
    /// True division operator
    Div,
    /// Floor division operator
    FloorDiv,
    /// Modulo operator
    Mod,
    /// Power operator
    Pow,
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op_str = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
        };
        write!(f, "{}", op_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// Equality operator
    Eq,
    /// Inequality operator
    NotEq,
    /// Less than operator
    Lt,
    /// Less than or equal operator
    LtEq,
    /// Greater than operator
    Gt,
    /// Greater than or equal operator
    GtEq,
    /// Membership test
    In,
    /// Negated membership test
    NotIn,
}

impl Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op_str = match self {
            ComparisonOperator::Eq => "==",
            ComparisonOperator::NotEq => "!=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::LtEq => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::GtEq => ">=",
            ComparisonOperator::In => "in",
            ComparisonOperator::NotIn => "not in",
        };
        write!(f, "{}", op_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOperator {
    /// Logical conjunction
    And,
    /// Logical disjunction
    Or,
}

impl Display for BoolOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BoolOperator::And => "and",
                BoolOperator::Or => "or",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Arithmetic negation
    Neg,
    /// Arithmetic identity
    Pos,
    /// Logical negation
    Not,
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op_str = match self {
            UnaryOperator::Neg => "-",
            UnaryOperator::Pos => "+",
            UnaryOperator::Not => "not",
        };
        write!(f, "{}", op_str)
    }
}

/// A literal constant value
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    None,
}

/// Expression nodes in the AST
///
/// Every variant carries a source location and a type slot the inference
/// engine fills in. Constructs outside the accepted subset (`lambda`,
/// `yield`, `await`, generator expressions) are parsed into their own
/// variants so the validator can reject them with precise locations.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A literal constant
    Literal(LiteralExpr),
    /// A name reference
    Name(NameExpr),
    /// A binary arithmetic operation
    Binary(BinaryExpr),
    /// A unary operation
    Unary(UnaryExpr),
    /// A comparison (chains are desugared by the parser)
    Comparison(ComparisonExpr),
    /// A boolean `and`/`or`
    Bool(BoolExpr),
    /// A free function call
    Call(CallExpr),
    /// A method call on a receiver
    MethodCall(MethodCallExpr),
    /// Attribute access on a receiver
    Attribute(AttributeExpr),
    /// Subscript read (`a[i]`)
    Subscript(SubscriptExpr),
    /// Slice read (`a[lo:hi]`)
    Slice(SliceExpr),
    /// A list literal
    ListLiteral(SequenceLiteralExpr),
    /// A set literal
    SetLiteral(SequenceLiteralExpr),
    /// A tuple literal
    TupleLiteral(SequenceLiteralExpr),
    /// A dict literal
    DictLiteral(DictLiteralExpr),
    /// A list/set/dict/generator comprehension
    Comprehension(ComprehensionExpr),
    /// A formatted string with interpolated expressions
    FormattedString(FormattedStringExpr),
    /// A conditional expression (`a if cond else b`)
    Conditional(ConditionalExpr),
    /// A lambda (accepted only non-capturing and unary inside comprehensions)
    Lambda(LambdaExpr),
    /// `yield` — outside the subset, kept for validation
    Yield(YieldExpr),
    /// `await` — outside the subset, kept for validation
    Await(AwaitExpr),
}

impl Expression {
    /// The source location of this expression
    pub fn location(&self) -> SourceLocation {
        match self {
            Expression::Literal(e) => e.location,
            Expression::Name(e) => e.location,
            Expression::Binary(e) => e.location,
            Expression::Unary(e) => e.location,
            Expression::Comparison(e) => e.location,
            Expression::Bool(e) => e.location,
            Expression::Call(e) => e.location,
            Expression::MethodCall(e) => e.location,
            Expression::Attribute(e) => e.location,
            Expression::Subscript(e) => e.location,
            Expression::Slice(e) => e.location,
            Expression::ListLiteral(e) => e.location,
            Expression::SetLiteral(e) => e.location,
            Expression::TupleLiteral(e) => e.location,
            Expression::DictLiteral(e) => e.location,
            Expression::Comprehension(e) => e.location,
            Expression::FormattedString(e) => e.location,
            Expression::Conditional(e) => e.location,
            Expression::Lambda(e) => e.location,
            Expression::Yield(e) => e.location,
            Expression::Await(e) => e.location,
        }
    }

    /// The inferred type of this expression
    pub fn ty(&self) -> &Type {
        match self {
            Expression::Literal(e) => &e.ty,
            Expression::Name(e) => &e.ty,
            Expression::Binary(e) => &e.ty,
            Expression::Unary(e) => &e.ty,
            Expression::Comparison(e) => &e.ty,
            Expression::Bool(e) => &e.ty,
            Expression::Call(e) => &e.ty,
            Expression::MethodCall(e) => &e.ty,
            Expression::Attribute(e) => &e.ty,
            Expression::Subscript(e) => &e.ty,
            Expression::Slice(e) => &e.ty,
            Expression::ListLiteral(e) => &e.ty,
            Expression::SetLiteral(e) => &e.ty,
            Expression::TupleLiteral(e) => &e.ty,
            Expression::DictLiteral(e) => &e.ty,
            Expression::Comprehension(e) => &e.ty,
            Expression::FormattedString(e) => &e.ty,
            Expression::Conditional(e) => &e.ty,
            Expression::Lambda(e) => &e.ty,
            Expression::Yield(e) => &e.ty,
            Expression::Await(e) => &e.ty,
        }
    }

    /// Mutable access to the inferred-type slot
    pub fn ty_mut(&mut self) -> &mut Type {
        match self {
            Expression::Literal(e) => &mut e.ty,
            Expression::Name(e) => &mut e.ty,
            Expression::Binary(e) => &mut e.ty,
            Expression::Unary(e) => &mut e.ty,
            Expression::Comparison(e) => &mut e.ty,
            Expression::Bool(e) => &mut e.ty,
            Expression::Call(e) => &mut e.ty,
            Expression::MethodCall(e) => &mut e.ty,
            Expression::Attribute(e) => &mut e.ty,
            Expression::Subscript(e) => &mut e.ty,
            Expression::Slice(e) => &mut e.ty,
            Expression::ListLiteral(e) => &mut e.ty,
            Expression::SetLiteral(e) => &mut e.ty,
            Expression::TupleLiteral(e) => &mut e.ty,
            Expression::DictLiteral(e) => &mut e.ty,
            Expression::Comprehension(e) => &mut e.ty,
            Expression::FormattedString(e) => &mut e.ty,
            Expression::Conditional(e) => &mut e.ty,
            Expression::Lambda(e) => &mut e.ty,
            Expression::Yield(e) => &mut e.ty,
            Expression::Await(e) => &mut e.ty,
        }
    }

    /// The name, if this is a plain name reference
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expression::Name(e) => Some(&e.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiteralExpr {
    pub value: LiteralValue,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct NameExpr {
    pub name: String,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub left: Box<Expression>,
    pub operator: BinaryOperator,
    pub right: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ComparisonExpr {
    pub left: Box<Expression>,
    pub operator: ComparisonOperator,
    pub right: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct BoolExpr {
    pub left: Box<Expression>,
    pub operator: BoolOperator,
    pub right: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

/// A free function call; the callee is a plain name in the subset
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub function: String,
    pub arguments: Vec<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

/// A call on a receiver (`receiver.method(args...)`)
#[derive(Debug, Clone)]
pub struct MethodCallExpr {
    pub receiver: Box<Expression>,
    pub method: String,
    pub arguments: Vec<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct AttributeExpr {
    pub receiver: Box<Expression>,
    pub attribute: String,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct SubscriptExpr {
    pub receiver: Box<Expression>,
    pub index: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct SliceExpr {
    pub receiver: Box<Expression>,
    pub lower: Option<Box<Expression>>,
    pub upper: Option<Box<Expression>>,
    pub ty: Type,
    pub location: SourceLocation,
}

/// Shared shape of list/set/tuple literals
#[derive(Debug, Clone)]
pub struct SequenceLiteralExpr {
    pub elements: Vec<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct DictLiteralExpr {
    pub entries: Vec<(Expression, Expression)>,
    pub ty: Type,
    pub location: SourceLocation,
}

/// Which container a comprehension builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    /// Generator form — outside the subset, kept for validation
    Generator,
}

/// A comprehension with one generator clause and at most one filter
#[derive(Debug, Clone)]
pub struct ComprehensionExpr {
    pub kind: ComprehensionKind,
    /// The element expression (key expression for dict comprehensions)
    pub element: Box<Expression>,
    /// The value expression for dict comprehensions
    pub value: Option<Box<Expression>>,
    /// The iteration variable
    pub variable: String,
    pub iterable: Box<Expression>,
    pub condition: Option<Box<Expression>>,
    pub ty: Type,
    pub location: SourceLocation,
}

/// One piece of a formatted string
#[derive(Debug, Clone)]
pub enum FStringPart {
    Text(String),
    Expr(Expression),
}

#[derive(Debug, Clone)]
pub struct FormattedStringExpr {
    pub parts: Vec<FStringPart>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpr {
    pub then_value: Box<Expression>,
    pub condition: Box<Expression>,
    pub else_value: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub parameters: Vec<String>,
    pub body: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct YieldExpr {
    pub value: Option<Box<Expression>>,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct AwaitExpr {
    pub value: Box<Expression>,
    pub ty: Type,
    pub location: SourceLocation,
}

/// Statement nodes in the AST
///
/// The forbidden statement forms (`try`, `with`, `raise`, `del`, `global`,
/// `nonlocal`) are parsed so the validator can point at them; they never
/// reach a backend.
#[derive(Debug, Clone)]
pub enum Statement {
    /// Assignment, optionally annotated (`x: int = 0` or `x = 0`)
    Assign(AssignStmt),
    /// Augmented assignment (`x += 1`)
    AugAssign(AugAssignStmt),
    /// A bare expression statement
    Expression(ExpressionStmt),
    /// Return from the enclosing function
    Return(ReturnStmt),
    /// `if`/`elif`/`else`
    If(IfStmt),
    /// `while` loop
    While(WhileStmt),
    /// `for` loop over a range or container
    For(ForStmt),
    /// `break`
    Break(SourceLocation),
    /// `continue`
    Continue(SourceLocation),
    /// `pass`
    Pass(SourceLocation),
    /// Function definition
    FunctionDef(FunctionDef),
    /// Class definition
    ClassDef(ClassDef),
    /// `import` / `from ... import ...`
    Import(ImportStmt),
    /// `assert cond` / `assert cond, message`
    Assert(AssertStmt),
    /// `try`/`except`/`finally` — outside the subset
    Try(TryStmt),
    /// `with` — outside the subset
    With(WithStmt),
    /// `raise` — outside the subset
    Raise(RaiseStmt),
    /// `del` — outside the subset
    Delete(DeleteStmt),
    /// `global` — outside the subset
    Global(ScopeDeclStmt),
    /// `nonlocal` — outside the subset
    Nonlocal(ScopeDeclStmt),
}

impl Statement {
    /// The source location of this statement
    pub fn location(&self) -> SourceLocation {
        match self {
            Statement::Assign(s) => s.location,
            Statement::AugAssign(s) => s.location,
            Statement::Expression(s) => s.location,
            Statement::Return(s) => s.location,
            Statement::If(s) => s.location,
            Statement::While(s) => s.location,
            Statement::For(s) => s.location,
            Statement::Break(loc) | Statement::Continue(loc) | Statement::Pass(loc) => *loc,
            Statement::FunctionDef(s) => s.location,
            Statement::ClassDef(s) => s.location,
            Statement::Import(s) => s.location,
            Statement::Assert(s) => s.location,
            Statement::Try(s) => s.location,
            Statement::With(s) => s.location,
            Statement::Raise(s) => s.location,
            Statement::Delete(s) => s.location,
            Statement::Global(s) | Statement::Nonlocal(s) => s.location,
        }
    }
}

/// An assignment; the target is a name, attribute, or subscript expression
#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub target: Expression,
    /// The annotation as written, if any
    pub annotation: Option<Type>,
    pub value: Expression,
    /// The binding's resolved type, filled by inference
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct AugAssignStmt {
    pub target: Expression,
    pub operator: BinaryOperator,
    pub value: Expression,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ExpressionStmt {
    pub expression: Expression,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expression>,
    pub location: SourceLocation,
}

/// One `if`/`elif` arm
#[derive(Debug, Clone)]
pub struct IfArm {
    pub condition: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    /// The `if` arm followed by any `elif` arms
    pub arms: Vec<IfArm>,
    pub else_body: Vec<Statement>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expression,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    /// The loop targets; one name, or two for `for k, v in d.items()`
    pub targets: Vec<String>,
    /// The targets' inferred types, parallel to `targets`
    pub target_tys: Vec<Type>,
    pub iterable: Expression,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

/// A function parameter with its annotation
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    /// The annotated type (`Unknown` when the annotation is missing)
    pub ty: Type,
    /// Whether the parameter carries a default value (rejected by the
    /// validator)
    pub has_default: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// The annotated return type (`Unknown` when missing)
    pub return_type: Type,
    pub body: Vec<Statement>,
    pub decorators: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

/// A single imported member (`from module import name`)
#[derive(Debug, Clone)]
pub struct ImportStmt {
    pub module: String,
    /// Imported member names; empty for a plain `import module`
    pub members: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct AssertStmt {
    pub condition: Expression,
    pub message: Option<Expression>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct WithStmt {
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct RaiseStmt {
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ScopeDeclStmt {
    pub names: Vec<String>,
    pub location: SourceLocation,
}

/// Summary of a user record, derived from its `ClassDef` during analysis
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub name: String,
    /// Ordered fields (name, type)
    pub fields: Vec<(String, Type)>,
    /// Method signatures, excluding the receiver parameter
    pub methods: Vec<MethodDescriptor>,
    pub is_dataclass: bool,
    pub is_namedtuple: bool,
}

impl RecordDescriptor {
    /// The declared type of a field, if present
    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| ty)
    }

    /// The signature of a method, if present
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Signature of one record method
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    /// Parameters excluding the receiver
    pub parameters: Vec<(String, Type)>,
    pub return_type: Type,
    /// Whether the body assigns to any receiver field
    pub mutates_receiver: bool,
    pub is_static: bool,
}
