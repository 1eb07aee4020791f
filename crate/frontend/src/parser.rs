use crate::lexer;
use crate::token::{Token, TokenKind};
use mgen_error::{Diagnostic, ErrorCode};
use mgen_ir::SourceLocation;
use mgen_ir::ast::{
    AssertStmt, AssignStmt, AttributeExpr, AugAssignStmt, BinaryExpr, BinaryOperator, BoolExpr,
    BoolOperator, CallExpr, ClassDef, ComparisonExpr, ComparisonOperator, ComprehensionExpr,
    ComprehensionKind, ConditionalExpr, DeleteStmt, DictLiteralExpr, Expression, ExpressionStmt,
    FStringPart, ForStmt, FormattedStringExpr, FunctionDef, IfArm, IfStmt, ImportStmt,
    LambdaExpr, LiteralExpr, LiteralValue, MethodCallExpr, Module, NameExpr, Parameter,
    RaiseStmt, ReturnStmt, ScopeDeclStmt, SequenceLiteralExpr, SliceExpr, Statement,
    SubscriptExpr, TryStmt, UnaryExpr, UnaryOperator, WhileStmt, WithStmt, YieldExpr,
};
use mgen_types::Type;

type ParseResult<T> = Result<T, ()>;

/// Parses source text into a module
///
/// Lexing happens here too; lexical errors short-circuit parsing.
///
/// ### Arguments
/// * `source` - The raw source text
/// * `file_name` - The path used in diagnostics
///
/// ### Returns
/// The parsed module, or every syntax error found
pub fn parse_source(source: &str, file_name: &str) -> Result<Module, Vec<Diagnostic>> {
    let tokens = lexer::tokenize(source)?;
    parse(&tokens, source, file_name)
}

/// Parses a token sequence into a module
pub fn parse(tokens: &[Token], source: &str, file_name: &str) -> Result<Module, Vec<Diagnostic>> {
    let mut parser = Parser::new(tokens);
    let items = parser.parse_module();
    if parser.errors.is_empty() {
        Ok(Module {
            items,
            source: source.to_string(),
            file_name: file_name.to_string(),
        })
    } else {
        Err(parser.errors)
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    errors: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    // ---- token plumbing ----

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            self.error_here(ErrorCode::UnexpectedToken, message.to_string());
            Err(())
        }
    }

    fn error_here(&mut self, code: ErrorCode, message: String) {
        let location = self.peek().location;
        self.errors.push(Diagnostic::error(code, message, location));
    }

    fn error_at(&mut self, code: ErrorCode, message: String, location: SourceLocation) {
        self.errors.push(Diagnostic::error(code, message, location));
    }

    /// End-inclusive span from a start location to the previous token
    fn span_from(&self, start: SourceLocation) -> SourceLocation {
        start.merge(&self.previous().location)
    }

    /// Skips to the start of the next statement after an error
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                    return;
                }
                TokenKind::Dedent => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- module and statements ----

    fn parse_module(&mut self) -> Vec<Statement> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            if self.match_token(TokenKind::Newline) {
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => items.push(stmt),
                Err(()) => self.synchronize(),
            }
        }
        items
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.peek_kind() {
            TokenKind::At => self.parse_decorated(),
            TokenKind::Def => self.parse_function_def(Vec::new()),
            TokenKind::Async => {
                self.advance();
                // `async def` parses as a function tagged for rejection
                if self.check(TokenKind::Def) {
                    self.parse_function_def(vec!["async".to_string()])
                } else {
                    self.error_here(
                        ErrorCode::UnexpectedToken,
                        "expected 'def' after 'async'".to_string(),
                    );
                    Err(())
                }
            }
            TokenKind::Class => self.parse_class_def(Vec::new()),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let location = self.advance().location;
                self.end_simple_statement()?;
                Ok(Statement::Break(location))
            }
            TokenKind::Continue => {
                let location = self.advance().location;
                self.end_simple_statement()?;
                Ok(Statement::Continue(location))
            }
            TokenKind::Pass => {
                let location = self.advance().location;
                self.end_simple_statement()?;
                Ok(Statement::Pass(location))
            }
            TokenKind::Import | TokenKind::From => self.parse_import(),
            TokenKind::Assert => self.parse_assert(),
            TokenKind::Try => self.parse_try(),
            TokenKind::With => self.parse_with(),
            TokenKind::Raise => {
                let location = self.advance().location;
                // the raised expression is irrelevant; validation rejects it
                if !self.check(TokenKind::Newline) && !self.is_at_end() {
                    let _ = self.parse_expression();
                }
                self.end_simple_statement()?;
                Ok(Statement::Raise(RaiseStmt { location }))
            }
            TokenKind::Del => {
                let location = self.advance().location;
                let _ = self.parse_expression();
                self.end_simple_statement()?;
                Ok(Statement::Delete(DeleteStmt { location }))
            }
            TokenKind::Global => self.parse_scope_decl(true),
            TokenKind::Nonlocal => self.parse_scope_decl(false),
            _ => self.parse_simple_statement(),
        }
    }

    fn end_simple_statement(&mut self) -> ParseResult<()> {
        if self.match_token(TokenKind::Newline) || self.is_at_end() {
            return Ok(());
        }
        // a Dedent can directly follow a one-line suite
        if self.check(TokenKind::Dedent) {
            return Ok(());
        }
        self.error_here(
            ErrorCode::UnexpectedToken,
            format!("expected end of statement, found '{}'", self.peek().lexeme),
        );
        Err(())
    }

    fn parse_decorated(&mut self) -> ParseResult<Statement> {
        let mut decorators = Vec::new();
        while self.match_token(TokenKind::At) {
            let name = self
                .expect(TokenKind::Identifier, "expected decorator name after '@'")?
                .lexeme
                .clone();
            // decorator arguments are consumed and rejected later
            if self.match_token(TokenKind::LeftParen) {
                let mut depth = 1usize;
                while depth > 0 && !self.is_at_end() {
                    match self.advance().kind {
                        TokenKind::LeftParen => depth += 1,
                        TokenKind::RightParen => depth -= 1,
                        _ => {}
                    }
                }
            }
            decorators.push(name);
            self.match_token(TokenKind::Newline);
        }
        match self.peek_kind() {
            TokenKind::Def => self.parse_function_def(decorators),
            TokenKind::Class => self.parse_class_def(decorators),
            TokenKind::Async => {
                self.advance();
                decorators.push("async".to_string());
                self.parse_function_def(decorators)
            }
            _ => {
                self.error_here(
                    ErrorCode::UnexpectedToken,
                    "expected 'def' or 'class' after decorator".to_string(),
                );
                Err(())
            }
        }
    }

    fn parse_function_def(&mut self, decorators: Vec<String>) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::Def, "expected 'def'")?.location;
        let name = self
            .expect(TokenKind::Identifier, "expected function name")?
            .lexeme
            .clone();
        self.expect(TokenKind::LeftParen, "expected '(' after function name")?;

        let mut parameters = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.check(TokenKind::Star) || self.check(TokenKind::DoubleStar) {
                    // *args / **kwargs parse into a marker parameter the
                    // validator rejects
                    let loc = self.advance().location;
                    let starred = self
                        .expect(TokenKind::Identifier, "expected parameter name")?
                        .lexeme
                        .clone();
                    parameters.push(Parameter {
                        name: format!("*{}", starred),
                        ty: Type::Unknown,
                        has_default: false,
                        location: loc,
                    });
                } else {
                    let param_token = self
                        .expect(TokenKind::Identifier, "expected parameter name")?;
                    let param_name = param_token.lexeme.clone();
                    let param_location = param_token.location;
                    let ty = if self.match_token(TokenKind::Colon) {
                        self.parse_type()?
                    } else {
                        Type::Unknown
                    };
                    let has_default = if self.match_token(TokenKind::Assign) {
                        let _ = self.parse_expression()?;
                        true
                    } else {
                        false
                    };
                    parameters.push(Parameter {
                        name: param_name,
                        ty,
                        has_default,
                        location: param_location,
                    });
                }
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after parameters")?;

        let return_type = if self.match_token(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            Type::Unknown
        };

        let body = self.parse_suite()?;
        let location = self.span_from(start);
        Ok(Statement::FunctionDef(FunctionDef {
            name,
            parameters,
            return_type,
            body,
            decorators,
            location,
        }))
    }

    fn parse_class_def(&mut self, decorators: Vec<String>) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::Class, "expected 'class'")?.location;
        let name = self
            .expect(TokenKind::Identifier, "expected class name")?
            .lexeme
            .clone();

        let mut bases = Vec::new();
        if self.match_token(TokenKind::LeftParen) {
            if !self.check(TokenKind::RightParen) {
                loop {
                    let base = self
                        .expect(TokenKind::Identifier, "expected base class name")?
                        .lexeme
                        .clone();
                    bases.push(base);
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen, "expected ')' after base classes")?;
        }

        let body = self.parse_suite()?;
        let location = self.span_from(start);
        Ok(Statement::ClassDef(ClassDef {
            name,
            bases,
            decorators,
            body,
            location,
        }))
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::If, "expected 'if'")?.location;
        let mut arms = Vec::new();

        let condition = self.parse_expression()?;
        let body = self.parse_suite()?;
        arms.push(IfArm { condition, body });

        let mut else_body = Vec::new();
        loop {
            if self.match_token(TokenKind::Elif) {
                let condition = self.parse_expression()?;
                let body = self.parse_suite()?;
                arms.push(IfArm { condition, body });
            } else if self.match_token(TokenKind::Else) {
                else_body = self.parse_suite()?;
                break;
            } else {
                break;
            }
        }

        let location = self.span_from(start);
        Ok(Statement::If(IfStmt {
            arms,
            else_body,
            location,
        }))
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::While, "expected 'while'")?.location;
        let condition = self.parse_expression()?;
        let body = self.parse_suite()?;
        let location = self.span_from(start);
        Ok(Statement::While(WhileStmt {
            condition,
            body,
            location,
        }))
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::For, "expected 'for'")?.location;
        let mut targets = vec![
            self.expect(TokenKind::Identifier, "expected loop variable")?
                .lexeme
                .clone(),
        ];
        while self.match_token(TokenKind::Comma) {
            targets.push(
                self.expect(TokenKind::Identifier, "expected loop variable")?
                    .lexeme
                    .clone(),
            );
        }
        self.expect(TokenKind::In, "expected 'in' in for statement")?;
        let iterable = self.parse_expression()?;
        let body = self.parse_suite()?;
        let location = self.span_from(start);
        let target_tys = targets.iter().map(|_| Type::Unknown).collect();
        Ok(Statement::For(ForStmt {
            targets,
            target_tys,
            iterable,
            body,
            location,
        }))
    }

    fn parse_return(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::Return, "expected 'return'")?.location;
        let value = if self.check(TokenKind::Newline)
            || self.check(TokenKind::Dedent)
            || self.is_at_end()
        {
            None
        } else {
            let first = self.parse_expression()?;
            if self.check(TokenKind::Comma) {
                // `return a, b` builds a tuple
                let mut elements = vec![first];
                while self.match_token(TokenKind::Comma) {
                    elements.push(self.parse_expression()?);
                }
                let location = self.span_from(start);
                Some(Expression::TupleLiteral(SequenceLiteralExpr {
                    elements,
                    ty: Type::Unknown,
                    location,
                }))
            } else {
                Some(first)
            }
        };
        self.end_simple_statement()?;
        let location = self.span_from(start);
        Ok(Statement::Return(ReturnStmt { value, location }))
    }

    fn parse_import(&mut self) -> ParseResult<Statement> {
        let start = self.peek().location;
        if self.match_token(TokenKind::Import) {
            let module = self.parse_dotted_name()?;
            self.end_simple_statement()?;
            let location = self.span_from(start);
            return Ok(Statement::Import(ImportStmt {
                module,
                members: Vec::new(),
                location,
            }));
        }

        self.expect(TokenKind::From, "expected 'from'")?;
        let module = self.parse_dotted_name()?;
        self.expect(TokenKind::Import, "expected 'import' after module name")?;
        let mut members = Vec::new();
        loop {
            let member = self
                .expect(TokenKind::Identifier, "expected imported member name")?
                .lexeme
                .clone();
            members.push(member);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.end_simple_statement()?;
        let location = self.span_from(start);
        Ok(Statement::Import(ImportStmt {
            module,
            members,
            location,
        }))
    }

    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self
            .expect(TokenKind::Identifier, "expected module name")?
            .lexeme
            .clone();
        while self.match_token(TokenKind::Dot) {
            let part = self
                .expect(TokenKind::Identifier, "expected name after '.'")?
                .lexeme
                .clone();
            name.push('.');
            name.push_str(&part);
        }
        Ok(name)
    }

    fn parse_assert(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::Assert, "expected 'assert'")?.location;
        let condition = self.parse_expression()?;
        let message = if self.match_token(TokenKind::Comma) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.end_simple_statement()?;
        let location = self.span_from(start);
        Ok(Statement::Assert(AssertStmt {
            condition,
            message,
            location,
        }))
    }

    fn parse_try(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::Try, "expected 'try'")?.location;
        let body = self.parse_suite()?;
        // except/finally clauses are consumed; validation rejects the whole
        // statement at the `try` location
        while self.check(TokenKind::Except) || self.check(TokenKind::Finally) {
            if self.match_token(TokenKind::Except) {
                while !self.check(TokenKind::Colon) && !self.is_at_end() {
                    self.advance();
                }
            } else {
                self.advance();
            }
            let _ = self.parse_suite()?;
        }
        let location = start;
        Ok(Statement::Try(TryStmt { body, location }))
    }

    fn parse_with(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::With, "expected 'with'")?.location;
        let _ = self.parse_expression()?;
        // `as name` — the lexer has no dedicated 'as' keyword
        if self.check(TokenKind::Identifier) && self.peek().lexeme == "as" {
            self.advance();
            self.expect(TokenKind::Identifier, "expected name after 'as'")?;
        }
        let body = self.parse_suite()?;
        Ok(Statement::With(WithStmt {
            body,
            location: start,
        }))
    }

    fn parse_scope_decl(&mut self, global: bool) -> ParseResult<Statement> {
        let start = self.advance().location;
        let mut names = Vec::new();
        loop {
            let name = self
                .expect(TokenKind::Identifier, "expected name")?
                .lexeme
                .clone();
            names.push(name);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.end_simple_statement()?;
        let stmt = ScopeDeclStmt {
            names,
            location: start,
        };
        Ok(if global {
            Statement::Global(stmt)
        } else {
            Statement::Nonlocal(stmt)
        })
    }

    /// Parses an assignment, augmented assignment or expression statement
    fn parse_simple_statement(&mut self) -> ParseResult<Statement> {
        let start = self.peek().location;
        let target = self.parse_expression()?;

        // annotated assignment: `name: type = value` (value optional in
        // class bodies)
        if self.match_token(TokenKind::Colon) {
            let annotation = self.parse_type()?;
            let value = if self.match_token(TokenKind::Assign) {
                self.parse_expression()?
            } else {
                Expression::Literal(LiteralExpr {
                    value: LiteralValue::None,
                    ty: Type::Unknown,
                    location: self.previous().location,
                })
            };
            self.end_simple_statement()?;
            let location = self.span_from(start);
            return Ok(Statement::Assign(AssignStmt {
                target,
                annotation: Some(annotation),
                value,
                ty: Type::Unknown,
                location,
            }));
        }

        if self.match_token(TokenKind::Assign) {
            let value = self.parse_expression()?;
            if self.check(TokenKind::Assign) {
                self.error_here(
                    ErrorCode::SyntaxError,
                    "chained assignment is not supported".to_string(),
                );
                return Err(());
            }
            self.end_simple_statement()?;
            let location = self.span_from(start);
            return Ok(Statement::Assign(AssignStmt {
                target,
                annotation: None,
                value,
                ty: Type::Unknown,
                location,
            }));
        }

        let aug = match self.peek_kind() {
            TokenKind::PlusAssign => Some(BinaryOperator::Add),
            TokenKind::MinusAssign => Some(BinaryOperator::Sub),
            TokenKind::StarAssign => Some(BinaryOperator::Mul),
            TokenKind::SlashAssign => Some(BinaryOperator::Div),
            TokenKind::DoubleSlashAssign => Some(BinaryOperator::FloorDiv),
            TokenKind::PercentAssign => Some(BinaryOperator::Mod),
            _ => None,
        };
        if let Some(operator) = aug {
            self.advance();
            let value = self.parse_expression()?;
            self.end_simple_statement()?;
            let location = self.span_from(start);
            return Ok(Statement::AugAssign(AugAssignStmt {
                target,
                operator,
                value,
                location,
            }));
        }

        self.end_simple_statement()?;
        let location = self.span_from(start);
        Ok(Statement::Expression(ExpressionStmt {
            expression: target,
            location,
        }))
    }

    /// Parses `:` then an indented block or a one-line suite
    fn parse_suite(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(TokenKind::Colon, "expected ':'")?;
        if self.match_token(TokenKind::Newline) {
            self.expect(TokenKind::Indent, "expected an indented block")?;
            let mut body = Vec::new();
            while !self.check(TokenKind::Dedent) && !self.is_at_end() {
                if self.match_token(TokenKind::Newline) {
                    continue;
                }
                match self.parse_statement() {
                    Ok(stmt) => body.push(stmt),
                    Err(()) => self.synchronize(),
                }
            }
            self.match_token(TokenKind::Dedent);
            Ok(body)
        } else {
            // one-line suite: `if x: return y`
            let stmt = self.parse_statement()?;
            Ok(vec![stmt])
        }
    }

    // ---- types ----

    /// Parses a type annotation
    fn parse_type(&mut self) -> ParseResult<Type> {
        if self.match_token(TokenKind::None) {
            return Ok(Type::none());
        }
        let name_token = self.expect(TokenKind::Identifier, "expected type name")?;
        let name = name_token.lexeme.clone();
        let name_location = name_token.location;

        if self.match_token(TokenKind::LeftBracket) {
            let mut args = Vec::new();
            loop {
                args.push(self.parse_type()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RightBracket, "expected ']' in type annotation")?;

            return match (name.as_str(), args.len()) {
                ("list" | "List", 1) => Ok(Type::List(Box::new(args.remove(0)))),
                ("set" | "Set", 1) => Ok(Type::Set(Box::new(args.remove(0)))),
                ("dict" | "Dict", 2) => {
                    let key = args.remove(0);
                    let value = args.remove(0);
                    Ok(Type::Dict(Box::new(key), Box::new(value)))
                }
                ("tuple" | "Tuple", _) if !args.is_empty() => Ok(Type::Tuple(args)),
                _ => {
                    self.error_at(
                        ErrorCode::SyntaxError,
                        format!("malformed parameterized type '{}'", name),
                        name_location,
                    );
                    Err(())
                }
            };
        }

        Ok(Type::from_annotation_name(&name).unwrap_or(Type::Record(name)))
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        if self.check(TokenKind::Lambda) {
            return self.parse_lambda();
        }
        let value = self.parse_or()?;

        // conditional expression: `a if cond else b`
        if self.match_token(TokenKind::If) {
            let condition = self.parse_or()?;
            self.expect(TokenKind::Else, "expected 'else' in conditional expression")?;
            let else_value = self.parse_expression()?;
            let location = value.location().merge(&else_value.location());
            return Ok(Expression::Conditional(ConditionalExpr {
                then_value: Box::new(value),
                condition: Box::new(condition),
                else_value: Box::new(else_value),
                ty: Type::Unknown,
                location,
            }));
        }

        Ok(value)
    }

    fn parse_lambda(&mut self) -> ParseResult<Expression> {
        let start = self.expect(TokenKind::Lambda, "expected 'lambda'")?.location;
        let mut parameters = Vec::new();
        if !self.check(TokenKind::Colon) {
            loop {
                let name = self
                    .expect(TokenKind::Identifier, "expected lambda parameter")?
                    .lexeme
                    .clone();
                parameters.push(name);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::Colon, "expected ':' in lambda")?;
        let body = self.parse_expression()?;
        let location = self.span_from(start);
        Ok(Expression::Lambda(LambdaExpr {
            parameters,
            body: Box::new(body),
            ty: Type::Unknown,
            location,
        }))
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_and()?;
        while self.match_token(TokenKind::Or) {
            let right = self.parse_and()?;
            let location = expr.location().merge(&right.location());
            expr = Expression::Bool(BoolExpr {
                left: Box::new(expr),
                operator: BoolOperator::Or,
                right: Box::new(right),
                ty: Type::Unknown,
                location,
            });
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_not()?;
        while self.match_token(TokenKind::And) {
            let right = self.parse_not()?;
            let location = expr.location().merge(&right.location());
            expr = Expression::Bool(BoolExpr {
                left: Box::new(expr),
                operator: BoolOperator::And,
                right: Box::new(right),
                ty: Type::Unknown,
                location,
            });
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> ParseResult<Expression> {
        if self.check(TokenKind::Not) && self.peek_ahead_is_not_in() {
            // `not in` belongs to the comparison level
            return self.parse_comparison();
        }
        if self.match_token(TokenKind::Not) {
            let start = self.previous().location;
            let operand = self.parse_not()?;
            let location = start.merge(&operand.location());
            return Ok(Expression::Unary(UnaryExpr {
                operator: UnaryOperator::Not,
                operand: Box::new(operand),
                ty: Type::Unknown,
                location,
            }));
        }
        self.parse_comparison()
    }

    fn peek_ahead_is_not_in(&self) -> bool {
        self.tokens
            .get(self.current + 1)
            .is_some_and(|t| t.kind == TokenKind::In)
    }

    fn comparison_operator(&mut self) -> Option<ComparisonOperator> {
        let op = match self.peek_kind() {
            TokenKind::Eq => ComparisonOperator::Eq,
            TokenKind::NotEq => ComparisonOperator::NotEq,
            TokenKind::Lt => ComparisonOperator::Lt,
            TokenKind::LtEq => ComparisonOperator::LtEq,
            TokenKind::Gt => ComparisonOperator::Gt,
            TokenKind::GtEq => ComparisonOperator::GtEq,
            TokenKind::In => ComparisonOperator::In,
            TokenKind::Not if self.peek_ahead_is_not_in() => {
                self.advance();
                ComparisonOperator::NotIn
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let first = self.parse_arith()?;
        let Some(operator) = self.comparison_operator() else {
            return Ok(first);
        };
        let right = self.parse_arith()?;
        let location = first.location().merge(&right.location());
        let mut prev_right = right.clone();
        let mut expr = Expression::Comparison(ComparisonExpr {
            left: Box::new(first),
            operator,
            right: Box::new(right),
            ty: Type::Unknown,
            location,
        });

        // chains desugar to conjunctions: a < b < c  =>  a < b and b < c
        while let Some(operator) = self.comparison_operator() {
            let next = self.parse_arith()?;
            let location = prev_right.location().merge(&next.location());
            let link = Expression::Comparison(ComparisonExpr {
                left: Box::new(prev_right.clone()),
                operator,
                right: Box::new(next.clone()),
                ty: Type::Unknown,
                location,
            });
            prev_right = next;
            let location = expr.location().merge(&link.location());
            expr = Expression::Bool(BoolExpr {
                left: Box::new(expr),
                operator: BoolOperator::And,
                right: Box::new(link),
                ty: Type::Unknown,
                location,
            });
        }
        Ok(expr)
    }

    fn parse_arith(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_term()?;
        loop {
            let operator = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            let location = expr.location().merge(&right.location());
            expr = Expression::Binary(BinaryExpr {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                ty: Type::Unknown,
                location,
            });
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_unary()?;
        loop {
            let operator = match self.peek_kind() {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::DoubleSlash => BinaryOperator::FloorDiv,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let location = expr.location().merge(&right.location());
            expr = Expression::Binary(BinaryExpr {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                ty: Type::Unknown,
                location,
            });
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOperator::Neg),
            TokenKind::Plus => Some(UnaryOperator::Pos),
            _ => None,
        };
        if let Some(operator) = operator {
            let start = self.advance().location;
            let operand = self.parse_unary()?;
            let location = start.merge(&operand.location());
            return Ok(Expression::Unary(UnaryExpr {
                operator,
                operand: Box::new(operand),
                ty: Type::Unknown,
                location,
            }));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> ParseResult<Expression> {
        let base = self.parse_postfix()?;
        if self.match_token(TokenKind::DoubleStar) {
            let exponent = self.parse_unary()?;
            let location = base.location().merge(&exponent.location());
            return Ok(Expression::Binary(BinaryExpr {
                left: Box::new(base),
                operator: BinaryOperator::Pow,
                right: Box::new(exponent),
                ty: Type::Unknown,
                location,
            }));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.match_token(TokenKind::Dot) {
                let attribute = self
                    .expect(TokenKind::Identifier, "expected attribute name after '.'")?
                    .lexeme
                    .clone();
                if self.match_token(TokenKind::LeftParen) {
                    let arguments = self.parse_arguments()?;
                    let location = self.span_from(expr.location());
                    expr = Expression::MethodCall(MethodCallExpr {
                        receiver: Box::new(expr),
                        method: attribute,
                        arguments,
                        ty: Type::Unknown,
                        location,
                    });
                } else {
                    let location = self.span_from(expr.location());
                    expr = Expression::Attribute(AttributeExpr {
                        receiver: Box::new(expr),
                        attribute,
                        ty: Type::Unknown,
                        location,
                    });
                }
            } else if self.match_token(TokenKind::LeftParen) {
                let arguments = self.parse_arguments()?;
                let location = self.span_from(expr.location());
                match expr {
                    Expression::Name(name) => {
                        expr = Expression::Call(CallExpr {
                            function: name.name,
                            arguments,
                            ty: Type::Unknown,
                            location,
                        });
                    }
                    other => {
                        self.error_at(
                            ErrorCode::SyntaxError,
                            "only named functions and methods can be called".to_string(),
                            other.location(),
                        );
                        return Err(());
                    }
                }
            } else if self.match_token(TokenKind::LeftBracket) {
                expr = self.parse_subscript(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(arguments)
    }

    /// Parses a subscript or slice after the opening bracket
    fn parse_subscript(&mut self, receiver: Expression) -> ParseResult<Expression> {
        // `a[:hi]`
        if self.match_token(TokenKind::Colon) {
            let upper = if self.check(TokenKind::RightBracket) {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            };
            self.expect(TokenKind::RightBracket, "expected ']' after slice")?;
            let location = self.span_from(receiver.location());
            return Ok(Expression::Slice(SliceExpr {
                receiver: Box::new(receiver),
                lower: None,
                upper,
                ty: Type::Unknown,
                location,
            }));
        }

        let index = self.parse_expression()?;
        if self.match_token(TokenKind::Colon) {
            let upper = if self.check(TokenKind::RightBracket) {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            };
            self.expect(TokenKind::RightBracket, "expected ']' after slice")?;
            let location = self.span_from(receiver.location());
            return Ok(Expression::Slice(SliceExpr {
                receiver: Box::new(receiver),
                lower: Some(Box::new(index)),
                upper,
                ty: Type::Unknown,
                location,
            }));
        }

        self.expect(TokenKind::RightBracket, "expected ']' after subscript")?;
        let location = self.span_from(receiver.location());
        Ok(Expression::Subscript(SubscriptExpr {
            receiver: Box::new(receiver),
            index: Box::new(index),
            ty: Type::Unknown,
            location,
        }))
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let location = self.peek().location;
        match self.peek_kind() {
            TokenKind::IntLiteral => {
                let token = self.advance();
                let lexeme = token.lexeme.clone();
                match lexeme.parse::<i64>() {
                    Ok(value) => Ok(Expression::Literal(LiteralExpr {
                        value: LiteralValue::Int(value),
                        ty: Type::Unknown,
                        location,
                    })),
                    Err(_) => {
                        self.error_at(
                            ErrorCode::InvalidNumberLiteral,
                            format!("integer literal '{}' is out of range", lexeme),
                            location,
                        );
                        Err(())
                    }
                }
            }
            TokenKind::FloatLiteral => {
                let token = self.advance();
                let lexeme = token.lexeme.clone();
                match lexeme.parse::<f64>() {
                    Ok(value) => Ok(Expression::Literal(LiteralExpr {
                        value: LiteralValue::Float(value),
                        ty: Type::Unknown,
                        location,
                    })),
                    Err(_) => {
                        self.error_at(
                            ErrorCode::InvalidNumberLiteral,
                            format!("invalid float literal '{}'", lexeme),
                            location,
                        );
                        Err(())
                    }
                }
            }
            TokenKind::StrLiteral => {
                let value = self.advance().lexeme.clone();
                Ok(Expression::Literal(LiteralExpr {
                    value: LiteralValue::Str(value),
                    ty: Type::Unknown,
                    location,
                }))
            }
            TokenKind::FStringLiteral => {
                let raw = self.advance().lexeme.clone();
                let parts = self.parse_fstring_body(&raw, location)?;
                Ok(Expression::FormattedString(FormattedStringExpr {
                    parts,
                    ty: Type::Unknown,
                    location,
                }))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.advance().kind == TokenKind::True;
                Ok(Expression::Literal(LiteralExpr {
                    value: LiteralValue::Bool(value),
                    ty: Type::Unknown,
                    location,
                }))
            }
            TokenKind::None => {
                self.advance();
                Ok(Expression::Literal(LiteralExpr {
                    value: LiteralValue::None,
                    ty: Type::Unknown,
                    location,
                }))
            }
            TokenKind::Identifier => {
                let name = self.advance().lexeme.clone();
                Ok(Expression::Name(NameExpr {
                    name,
                    ty: Type::Unknown,
                    location,
                }))
            }
            TokenKind::Yield => {
                self.advance();
                let value = if self.check(TokenKind::Newline)
                    || self.check(TokenKind::RightParen)
                    || self.is_at_end()
                {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                Ok(Expression::Yield(YieldExpr {
                    value,
                    ty: Type::Unknown,
                    location,
                }))
            }
            TokenKind::Await => {
                self.advance();
                let value = Box::new(self.parse_expression()?);
                Ok(Expression::Await(mgen_ir::ast::AwaitExpr {
                    value,
                    ty: Type::Unknown,
                    location,
                }))
            }
            TokenKind::LeftParen => self.parse_paren(location),
            TokenKind::LeftBracket => self.parse_list(location),
            TokenKind::LeftBrace => self.parse_brace(location),
            _ => {
                self.error_here(
                    ErrorCode::UnexpectedToken,
                    format!("expected expression, found '{}'", self.peek().lexeme),
                );
                Err(())
            }
        }
    }

    fn parse_paren(&mut self, start: SourceLocation) -> ParseResult<Expression> {
        self.expect(TokenKind::LeftParen, "expected '('")?;
        if self.match_token(TokenKind::RightParen) {
            // the empty tuple
            return Ok(Expression::TupleLiteral(SequenceLiteralExpr {
                elements: Vec::new(),
                ty: Type::Unknown,
                location: self.span_from(start),
            }));
        }
        let first = self.parse_expression()?;

        if self.check(TokenKind::For) {
            let comp = self.parse_comprehension_tail(
                ComprehensionKind::Generator,
                first,
                None,
                start,
            )?;
            self.expect(TokenKind::RightParen, "expected ')'")?;
            return Ok(comp);
        }

        if self.check(TokenKind::Comma) {
            let mut elements = vec![first];
            while self.match_token(TokenKind::Comma) {
                if self.check(TokenKind::RightParen) {
                    break;
                }
                elements.push(self.parse_expression()?);
            }
            self.expect(TokenKind::RightParen, "expected ')'")?;
            return Ok(Expression::TupleLiteral(SequenceLiteralExpr {
                elements,
                ty: Type::Unknown,
                location: self.span_from(start),
            }));
        }

        self.expect(TokenKind::RightParen, "expected ')'")?;
        Ok(first)
    }

    fn parse_list(&mut self, start: SourceLocation) -> ParseResult<Expression> {
        self.expect(TokenKind::LeftBracket, "expected '['")?;
        if self.match_token(TokenKind::RightBracket) {
            return Ok(Expression::ListLiteral(SequenceLiteralExpr {
                elements: Vec::new(),
                ty: Type::Unknown,
                location: self.span_from(start),
            }));
        }
        let first = self.parse_expression()?;

        if self.check(TokenKind::For) {
            let comp =
                self.parse_comprehension_tail(ComprehensionKind::List, first, None, start)?;
            self.expect(TokenKind::RightBracket, "expected ']'")?;
            return Ok(comp);
        }

        let mut elements = vec![first];
        while self.match_token(TokenKind::Comma) {
            if self.check(TokenKind::RightBracket) {
                break;
            }
            elements.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RightBracket, "expected ']'")?;
        Ok(Expression::ListLiteral(SequenceLiteralExpr {
            elements,
            ty: Type::Unknown,
            location: self.span_from(start),
        }))
    }

    fn parse_brace(&mut self, start: SourceLocation) -> ParseResult<Expression> {
        self.expect(TokenKind::LeftBrace, "expected '{'")?;
        if self.match_token(TokenKind::RightBrace) {
            // `{}` is the empty dict
            return Ok(Expression::DictLiteral(DictLiteralExpr {
                entries: Vec::new(),
                ty: Type::Unknown,
                location: self.span_from(start),
            }));
        }

        let first = self.parse_expression()?;

        if self.match_token(TokenKind::Colon) {
            let first_value = self.parse_expression()?;
            if self.check(TokenKind::For) {
                let comp = self.parse_comprehension_tail(
                    ComprehensionKind::Dict,
                    first,
                    Some(first_value),
                    start,
                )?;
                self.expect(TokenKind::RightBrace, "expected '}'")?;
                return Ok(comp);
            }
            let mut entries = vec![(first, first_value)];
            while self.match_token(TokenKind::Comma) {
                if self.check(TokenKind::RightBrace) {
                    break;
                }
                let key = self.parse_expression()?;
                self.expect(TokenKind::Colon, "expected ':' in dict literal")?;
                let value = self.parse_expression()?;
                entries.push((key, value));
            }
            self.expect(TokenKind::RightBrace, "expected '}'")?;
            return Ok(Expression::DictLiteral(DictLiteralExpr {
                entries,
                ty: Type::Unknown,
                location: self.span_from(start),
            }));
        }

        if self.check(TokenKind::For) {
            let comp =
                self.parse_comprehension_tail(ComprehensionKind::Set, first, None, start)?;
            self.expect(TokenKind::RightBrace, "expected '}'")?;
            return Ok(comp);
        }

        let mut elements = vec![first];
        while self.match_token(TokenKind::Comma) {
            if self.check(TokenKind::RightBrace) {
                break;
            }
            elements.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RightBrace, "expected '}'")?;
        Ok(Expression::SetLiteral(SequenceLiteralExpr {
            elements,
            ty: Type::Unknown,
            location: self.span_from(start),
        }))
    }

    /// Parses `for var in iterable [if cond]` after the element expression
    fn parse_comprehension_tail(
        &mut self,
        kind: ComprehensionKind,
        element: Expression,
        value: Option<Expression>,
        start: SourceLocation,
    ) -> ParseResult<Expression> {
        self.expect(TokenKind::For, "expected 'for'")?;
        let variable = self
            .expect(TokenKind::Identifier, "expected comprehension variable")?
            .lexeme
            .clone();
        self.expect(TokenKind::In, "expected 'in' in comprehension")?;
        let iterable = self.parse_or()?;
        let condition = if self.match_token(TokenKind::If) {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        if self.check(TokenKind::For) {
            self.error_here(
                ErrorCode::SyntaxError,
                "only a single generator clause is supported in comprehensions".to_string(),
            );
            return Err(());
        }
        Ok(Expression::Comprehension(ComprehensionExpr {
            kind,
            element: Box::new(element),
            value: value.map(Box::new),
            variable,
            iterable: Box::new(iterable),
            condition,
            ty: Type::Unknown,
            location: self.span_from(start),
        }))
    }

    /// Splits a raw f-string body into text and expression parts
    ///
    /// `{{` and `}}` escape literal braces; each `{...}` hole is parsed as
    /// a complete expression with a fresh sub-parser.
    fn parse_fstring_body(
        &mut self,
        raw: &str,
        location: SourceLocation,
    ) -> ParseResult<Vec<FStringPart>> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    if !text.is_empty() {
                        parts.push(FStringPart::Text(std::mem::take(&mut text)));
                    }
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        self.error_at(
                            ErrorCode::SyntaxError,
                            "unterminated '{' in formatted string".to_string(),
                            location,
                        );
                        return Err(());
                    }
                    let expr = self.parse_embedded_expression(&inner, location)?;
                    parts.push(FStringPart::Expr(expr));
                }
                '}' => {
                    self.error_at(
                        ErrorCode::SyntaxError,
                        "single '}' in formatted string".to_string(),
                        location,
                    );
                    return Err(());
                }
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            parts.push(FStringPart::Text(text));
        }
        Ok(parts)
    }

    /// Parses one `{...}` hole of a formatted string
    fn parse_embedded_expression(
        &mut self,
        snippet: &str,
        location: SourceLocation,
    ) -> ParseResult<Expression> {
        if snippet.contains(':') || snippet.contains('!') {
            self.error_at(
                ErrorCode::SyntaxError,
                "format specifiers are not supported in formatted strings".to_string(),
                location,
            );
            return Err(());
        }
        let tokens = match lexer::tokenize(snippet) {
            Ok(tokens) => tokens,
            Err(_) => {
                self.error_at(
                    ErrorCode::SyntaxError,
                    format!("invalid expression '{}' in formatted string", snippet),
                    location,
                );
                return Err(());
            }
        };
        let mut sub = Parser::new(&tokens);
        let expr = sub.parse_expression();
        let fully_consumed = matches!(
            sub.peek_kind(),
            TokenKind::Newline | TokenKind::Eof
        );
        match expr {
            Ok(mut expr) if sub.errors.is_empty() && fully_consumed => {
                // hole expressions report at the f-string itself
                relocate(&mut expr, location);
                Ok(expr)
            }
            _ => {
                self.error_at(
                    ErrorCode::SyntaxError,
                    format!("invalid expression '{}' in formatted string", snippet),
                    location,
                );
                Err(())
            }
        }
    }
}

/// Rewrites every location in an expression tree, used for f-string holes
fn relocate(expr: &mut Expression, location: SourceLocation) {
    match expr {
        Expression::Literal(e) => e.location = location,
        Expression::Name(e) => e.location = location,
        Expression::Binary(e) => {
            e.location = location;
            relocate(&mut e.left, location);
            relocate(&mut e.right, location);
        }
        Expression::Unary(e) => {
            e.location = location;
            relocate(&mut e.operand, location);
        }
        Expression::Comparison(e) => {
            e.location = location;
            relocate(&mut e.left, location);
            relocate(&mut e.right, location);
        }
        Expression::Bool(e) => {
            e.location = location;
            relocate(&mut e.left, location);
            relocate(&mut e.right, location);
        }
        Expression::Call(e) => {
            e.location = location;
            for arg in &mut e.arguments {
                relocate(arg, location);
            }
        }
        Expression::MethodCall(e) => {
            e.location = location;
            relocate(&mut e.receiver, location);
            for arg in &mut e.arguments {
                relocate(arg, location);
            }
        }
        Expression::Attribute(e) => {
            e.location = location;
            relocate(&mut e.receiver, location);
        }
        Expression::Subscript(e) => {
            e.location = location;
            relocate(&mut e.receiver, location);
            relocate(&mut e.index, location);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        parse_source(source, "test.py").expect("parses")
    }

    #[test]
    fn parses_an_annotated_function() {
        let module = parse_ok("def fib(n: int) -> int:\n    return n\n");
        assert_eq!(module.items.len(), 1);
        match &module.items[0] {
            Statement::FunctionDef(def) => {
                assert_eq!(def.name, "fib");
                assert_eq!(def.parameters.len(), 1);
                assert_eq!(def.parameters[0].ty, Type::int());
                assert_eq!(def.return_type, Type::int());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn parses_nested_container_annotations() {
        let module = parse_ok("m: list[list[int]] = []\n");
        match &module.items[0] {
            Statement::Assign(assign) => {
                assert_eq!(
                    assign.annotation,
                    Some(Type::list(Type::list(Type::int())))
                );
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn parses_elif_chains_into_arms() {
        let module =
            parse_ok("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n");
        match &module.items[0] {
            Statement::If(stmt) => {
                assert_eq!(stmt.arms.len(), 2);
                assert_eq!(stmt.else_body.len(), 1);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn desugars_comparison_chains() {
        let module = parse_ok("ok = 0 <= x <= 10\n");
        match &module.items[0] {
            Statement::Assign(assign) => {
                assert!(matches!(assign.value, Expression::Bool(_)));
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn parses_method_calls_and_subscripts() {
        let module = parse_ok("counts[word] = counts[word] + 1\nwords.append(w)\n");
        match &module.items[0] {
            Statement::Assign(assign) => {
                assert!(matches!(assign.target, Expression::Subscript(_)));
            }
            other => panic!("expected assign, got {:?}", other),
        }
        match &module.items[1] {
            Statement::Expression(stmt) => {
                assert!(matches!(stmt.expression, Expression::MethodCall(_)));
            }
            other => panic!("expected expression stmt, got {:?}", other),
        }
    }

    #[test]
    fn parses_comprehensions_with_filter() {
        let module = parse_ok("evens = [x * 2 for x in items if x > 0]\n");
        match &module.items[0] {
            Statement::Assign(assign) => match &assign.value {
                Expression::Comprehension(comp) => {
                    assert_eq!(comp.kind, ComprehensionKind::List);
                    assert_eq!(comp.variable, "x");
                    assert!(comp.condition.is_some());
                }
                other => panic!("expected comprehension, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn parses_fstrings_into_parts() {
        let module = parse_ok("s = f\"value is {x} end\"\n");
        match &module.items[0] {
            Statement::Assign(assign) => match &assign.value {
                Expression::FormattedString(fstring) => {
                    assert_eq!(fstring.parts.len(), 3);
                    assert!(matches!(fstring.parts[0], FStringPart::Text(_)));
                    assert!(matches!(fstring.parts[1], FStringPart::Expr(_)));
                }
                other => panic!("expected fstring, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn parses_yield_for_later_rejection() {
        let module = parse_ok("def f():\n    yield 1\n");
        match &module.items[0] {
            Statement::FunctionDef(def) => match &def.body[0] {
                Statement::Expression(stmt) => {
                    assert!(matches!(stmt.expression, Expression::Yield(_)));
                }
                other => panic!("expected expression stmt, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn parses_class_with_dataclass_fields() {
        let module = parse_ok(
            "@dataclass\nclass Counter:\n    n: int\n    def bump(self, k: int) -> None:\n        self.n += k\n",
        );
        match &module.items[0] {
            Statement::ClassDef(class_def) => {
                assert_eq!(class_def.name, "Counter");
                assert_eq!(class_def.decorators, vec!["dataclass".to_string()]);
                assert_eq!(class_def.body.len(), 2);
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn parses_for_with_tuple_target() {
        let module = parse_ok("for k, v in counts.items():\n    total += v\n");
        match &module.items[0] {
            Statement::For(stmt) => {
                assert_eq!(stmt.targets, vec!["k".to_string(), "v".to_string()]);
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn reports_missing_paren() {
        let errors = parse_source("def f(x: int -> int:\n    return x\n", "t.py").unwrap_err();
        assert!(!errors.is_empty());
        assert!(errors.iter().all(|d| d.code.is_syntax_error()));
    }

    #[test]
    fn parses_slice_expressions() {
        let module = parse_ok("tail = items[1:]\nhead = items[:3]\nmid = items[1:3]\n");
        for item in &module.items {
            match item {
                Statement::Assign(assign) => {
                    assert!(matches!(assign.value, Expression::Slice(_)));
                }
                other => panic!("expected assign, got {:?}", other),
            }
        }
    }

    #[test]
    fn parses_conditional_expression() {
        let module = parse_ok("v = a if flag else b\n");
        match &module.items[0] {
            Statement::Assign(assign) => {
                assert!(matches!(assign.value, Expression::Conditional(_)));
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn parses_augmented_assignment() {
        let module = parse_ok("x += 1\ny //= 2\n");
        assert!(matches!(&module.items[0], Statement::AugAssign(s) if s.operator == BinaryOperator::Add));
        assert!(matches!(&module.items[1], Statement::AugAssign(s) if s.operator == BinaryOperator::FloorDiv));
    }
}
