pub mod ast;
mod expr;

use log::debug;

use crate::errors::{CompileError, CompileResult};
use crate::lexer::token::{Token, TokenKind};
use crate::typechecker::types::Type;
use crate::typechecker::{
    require_numeric, require_resolved, AnalysisContext, FunctionSignature, Scope,
};
use ast::{AssignOp, Assignment, ElseBranch, IfStmt, Param, Program, Stmt, Target};

/// Parse a token stream with a fresh analysis context.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    context: AnalysisContext,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenKind::Eof, String::new(), line, column));
        }

        Self {
            tokens,
            current: 0,
            context: AnalysisContext::new(),
        }
    }

    /// Symbol and function tables as left by the last parse.
    pub fn into_context(self) -> AnalysisContext {
        self.context
    }

    pub fn parse_program(&mut self) -> CompileResult<Program> {
        self.current = 0;
        self.context = AnalysisContext::new();

        let scope = Scope::TopLevel;
        let mut statements = Vec::new();

        self.skip_statement_breaks();
        while !self.is_at_end() {
            statements.push(self.statement(&scope)?);
            if !self.is_at_end() {
                self.consume_symbol(TokenKind::Newline, "expected line break after statement")?;
            }
            self.skip_statement_breaks();
        }

        Ok(Program { statements })
    }

    fn statement(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        let line = self.peek().line;
        let stmt = match self.peek_kind().clone() {
            TokenKind::If => Stmt::If(self.if_statement(scope)?),
            TokenKind::While => self.while_statement(scope)?,
            TokenKind::For => self.for_statement(scope)?,
            TokenKind::IntType | TokenKind::DoubleType => {
                if matches!(self.peek_kind_at(1), Some(TokenKind::Subroutine)) {
                    self.function_declaration(scope)?
                } else {
                    self.array_declaration(scope)?
                }
            }
            TokenKind::Return => self.return_statement(scope)?,
            TokenKind::Output => self.output_statement(scope)?,
            TokenKind::Input => self.input_statement(scope)?,
            TokenKind::Identifier(_) if self.looks_like_assignment() => {
                Stmt::Assignment(self.assignment(scope)?)
            }
            _ => {
                let expr = self.expression(scope)?;
                require_resolved(&expr, line)?;
                Stmt::Expr(expr)
            }
        };

        debug!("reduced {} at line {}", stmt.label(), line);
        Ok(stmt)
    }

    fn if_statement(&mut self, scope: &Scope) -> CompileResult<IfStmt> {
        self.consume_symbol(TokenKind::If, "expected IF")?;
        let condition = self.condition(scope)?;
        self.consume_symbol(TokenKind::Then, "expected THEN after IF condition")?;
        self.consume_symbol(TokenKind::Newline, "expected line break after THEN")?;
        let then_body = self.block(scope, &[TokenKind::Else, TokenKind::EndIf], "ENDIF")?;

        if self.matches_symbol(TokenKind::EndIf) {
            return Ok(IfStmt {
                condition,
                then_body,
                else_branch: None,
            });
        }

        self.consume_symbol(TokenKind::Else, "expected ELSE or ENDIF")?;
        let else_branch = if self.check_kind(&TokenKind::If) {
            ElseBranch::If(Box::new(self.if_statement(scope)?))
        } else {
            self.consume_symbol(TokenKind::Newline, "expected line break after ELSE")?;
            let body = self.block(scope, &[TokenKind::EndIf], "ENDIF")?;
            self.consume_symbol(TokenKind::EndIf, "expected ENDIF to close IF")?;
            ElseBranch::Block(body)
        };

        Ok(IfStmt {
            condition,
            then_body,
            else_branch: Some(else_branch),
        })
    }

    fn while_statement(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        self.consume_symbol(TokenKind::While, "expected WHILE")?;
        let condition = self.condition(scope)?;
        self.consume_symbol(TokenKind::Do, "expected DO after WHILE condition")?;
        self.consume_symbol(TokenKind::Newline, "expected line break after DO")?;
        let body = self.block(scope, &[TokenKind::EndWhile], "ENDWHILE")?;
        self.consume_symbol(TokenKind::EndWhile, "expected ENDWHILE to close WHILE")?;
        Ok(Stmt::While { condition, body })
    }

    fn for_statement(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        self.consume_symbol(TokenKind::For, "expected FOR")?;
        if !matches!(self.peek_kind(), TokenKind::Identifier(_))
            || !matches!(self.peek_kind_at(1), Some(TokenKind::Equal))
        {
            return Err(CompileError::syntax(
                "expected loop variable assignment after FOR",
                self.peek(),
            ));
        }
        let line = self.peek().line;
        let init = self.assignment(scope)?;
        if !init.ty.is_numeric() {
            return Err(CompileError::type_mismatch(
                format!("loop variable '{}' must be numeric", init.target.name()),
                line,
            ));
        }
        self.consume_symbol(TokenKind::To, "expected TO after FOR initializer")?;
        let bound = self.condition(scope)?;
        self.consume_symbol(TokenKind::Newline, "expected line break after FOR bound")?;
        let body = self.block(scope, &[TokenKind::Next], "NEXT")?;
        self.consume_symbol(TokenKind::Next, "expected NEXT to close FOR")?;

        let counter = self.peek().clone();
        let name = self.consume_identifier("expected loop variable after NEXT")?;
        if name != init.target.name() {
            return Err(CompileError::syntax(
                format!(
                    "NEXT names '{}' but the loop variable is '{}'",
                    name,
                    init.target.name()
                ),
                &counter,
            ));
        }

        Ok(Stmt::For { init, bound, body })
    }

    fn function_declaration(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        let return_type = self.element_type()?;
        let keyword = self.peek().clone();
        self.consume_symbol(TokenKind::Subroutine, "expected SUBROUTINE")?;
        if let Scope::Function(outer) = scope {
            return Err(CompileError::syntax(
                format!("subroutines cannot be declared inside '{}'", outer),
                &keyword,
            ));
        }

        let name = self.consume_identifier("expected subroutine name")?;
        self.consume_symbol(TokenKind::LeftParen, "expected '(' after subroutine name")?;
        let mut params = Vec::new();
        if !self.check_kind(&TokenKind::RightParen) {
            loop {
                let ty = self.element_type()?;
                let name_token = self.peek().clone();
                let param_name = self.consume_identifier("expected parameter name")?;
                if params.iter().any(|param: &Param| param.name == param_name) {
                    return Err(CompileError::syntax(
                        format!("duplicate parameter '{}'", param_name),
                        &name_token,
                    ));
                }
                params.push(Param {
                    name: param_name,
                    ty,
                });
                if !self.matches_symbol(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume_symbol(TokenKind::RightParen, "expected ')' after parameter list")?;

        // Registered before the body so the subroutine can call itself.
        self.context.functions.register(
            &name,
            FunctionSignature {
                return_type,
                params: params.clone(),
            },
        );

        let inner = Scope::Function(name.clone());
        for param in &params {
            self.context.symbols.bind(&param.name, &inner, param.ty, 0);
        }

        self.consume_symbol(TokenKind::Newline, "expected line break after subroutine header")?;
        let body = self.block(&inner, &[TokenKind::EndSubroutine], "ENDSUBROUTINE")?;
        self.consume_symbol(TokenKind::EndSubroutine, "expected ENDSUBROUTINE")?;

        Ok(Stmt::FunctionDecl {
            name,
            params,
            body,
            return_type,
        })
    }

    fn array_declaration(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        let ty = self.element_type()?;
        let name = self.consume_identifier("expected array name")?;
        self.consume_symbol(TokenKind::LeftBracket, "expected '[' after array name")?;
        let size_line = self.peek().line;
        let size = self.expression(scope)?;
        require_numeric(&size, "an array size", size_line)?;
        self.consume_symbol(TokenKind::RightBracket, "expected ']' after array size")?;

        self.context.symbols.bind(&name, scope, ty, 0);
        Ok(Stmt::ArrayDeclaration { ty, name, size })
    }

    fn return_statement(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        let keyword = self.peek().clone();
        self.consume_symbol(TokenKind::Return, "expected RETURN")?;
        if *scope == Scope::TopLevel {
            return Err(CompileError::syntax(
                "RETURN is only allowed inside a SUBROUTINE",
                &keyword,
            ));
        }
        let expr = self.expression(scope)?;
        require_resolved(&expr, keyword.line)?;
        Ok(Stmt::Return { expr })
    }

    fn output_statement(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        let keyword = self.peek().clone();
        self.consume_symbol(TokenKind::Output, "expected OUTPUT")?;
        let expr = self.expression(scope)?;
        require_resolved(&expr, keyword.line)?;
        Ok(Stmt::Output { expr })
    }

    fn input_statement(&mut self, scope: &Scope) -> CompileResult<Stmt> {
        self.consume_symbol(TokenKind::Input, "expected INPUT")?;
        let name_token = self.peek().clone();
        let name = self.consume_identifier("expected variable after INPUT")?;
        if !self.context.symbols.contains(&name, scope) {
            return Err(CompileError::UndefinedVariable {
                name,
                line: name_token.line,
            });
        }

        let ty = self.context.symbols.lookup(&name, scope);
        let target = if self.matches_symbol(TokenKind::LeftBracket) {
            let index = self.expression(scope)?;
            require_numeric(&index, "an array index", name_token.line)?;
            self.consume_symbol(TokenKind::RightBracket, "expected ']' after index")?;
            Target::Element {
                name,
                ty,
                index: Box::new(index),
            }
        } else {
            Target::Variable {
                length: self.context.symbols.length(&name, scope),
                name,
                ty,
            }
        };

        Ok(Stmt::Input { target, ty })
    }

    fn assignment(&mut self, scope: &Scope) -> CompileResult<Assignment> {
        let name_token = self.peek().clone();
        let name = self.consume_identifier("expected assignment target")?;

        if self.matches_symbol(TokenKind::LeftBracket) {
            if !self.context.symbols.contains(&name, scope) {
                return Err(CompileError::UndefinedVariable {
                    name,
                    line: name_token.line,
                });
            }
            let index = self.expression(scope)?;
            require_numeric(&index, "an array index", name_token.line)?;
            self.consume_symbol(TokenKind::RightBracket, "expected ']' after index")?;
            self.consume_symbol(TokenKind::Equal, "expected '=' in assignment")?;
            let value = self.expression(scope)?;
            require_resolved(&value, name_token.line)?;

            let ty = self.context.symbols.lookup(&name, scope);
            if value.ty() == Type::Str {
                return Err(CompileError::type_mismatch(
                    format!("cannot store a string in array '{}'", name),
                    name_token.line,
                ));
            }

            return Ok(Assignment {
                op: AssignOp::Set,
                ty,
                target: Target::Element {
                    name,
                    ty,
                    index: Box::new(index),
                },
                value,
            });
        }

        self.consume_symbol(TokenKind::Equal, "expected '=' in assignment")?;
        let value = self.expression(scope)?;
        require_resolved(&value, name_token.line)?;

        let (ty, length) = (value.ty(), value.length());
        self.context.symbols.bind(&name, scope, ty, length);
        Ok(Assignment {
            op: AssignOp::Set,
            ty,
            target: Target::Variable { name, ty, length },
            value,
        })
    }

    /// Numeric expression used as a branch test or a loop bound.
    fn condition(&mut self, scope: &Scope) -> CompileResult<ast::Expr> {
        let line = self.peek().line;
        let expr = self.expression(scope)?;
        require_numeric(&expr, "a condition or loop bound", line)?;
        Ok(expr)
    }

    /// Statements up to (not including) one of `terminators`.
    fn block(
        &mut self,
        scope: &Scope,
        terminators: &[TokenKind],
        closer: &str,
    ) -> CompileResult<Vec<Stmt>> {
        let mut body = Vec::new();
        self.skip_statement_breaks();
        while !terminators.iter().any(|kind| self.check_kind(kind)) {
            if self.is_at_end() {
                return Err(CompileError::syntax(
                    format!("expected {} before end of input", closer),
                    self.peek(),
                ));
            }
            body.push(self.statement(scope)?);
            self.consume_symbol(TokenKind::Newline, "expected line break after statement")?;
            self.skip_statement_breaks();
        }
        Ok(body)
    }

    fn element_type(&mut self) -> CompileResult<Type> {
        if self.matches_symbol(TokenKind::IntType) {
            Ok(Type::Int32)
        } else if self.matches_symbol(TokenKind::DoubleType) {
            Ok(Type::Float64)
        } else {
            Err(CompileError::syntax(
                format!("expected INT or DOUBLE, found {}", self.peek().describe()),
                self.peek(),
            ))
        }
    }

    fn looks_like_assignment(&self) -> bool {
        match self.peek_kind_at(1) {
            Some(TokenKind::Equal) => true,
            Some(TokenKind::LeftBracket) => {
                let mut i = self.current + 1;
                let mut depth: i32 = 0;
                while let Some(token) = self.tokens.get(i) {
                    match token.kind {
                        TokenKind::LeftBracket => depth += 1,
                        TokenKind::RightBracket => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(
                                    self.tokens.get(i + 1).map(|t| &t.kind),
                                    Some(TokenKind::Equal)
                                );
                            }
                        }
                        TokenKind::Newline | TokenKind::Eof => return false,
                        _ => {}
                    }
                    i += 1;
                }
                false
            }
            _ => false,
        }
    }

    pub(crate) fn skip_statement_breaks(&mut self) {
        while self.matches_symbol(TokenKind::Newline) {}
    }

    pub(crate) fn matches_symbol(&mut self, kind: TokenKind) -> bool {
        if self.check_kind(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn consume_symbol(&mut self, kind: TokenKind, message: &str) -> CompileResult<()> {
        if self.check_kind(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::syntax(
                format!("{}, found {}", message, self.peek().describe()),
                self.peek(),
            ))
        }
    }

    pub(crate) fn consume_identifier(&mut self, message: &str) -> CompileResult<String> {
        match self.peek_kind() {
            TokenKind::Identifier(name) => {
                let value = name.clone();
                self.advance();
                Ok(value)
            }
            _ => Err(CompileError::syntax(
                format!("{}, found {}", message, self.peek().describe()),
                self.peek(),
            )),
        }
    }

    pub(crate) fn check_kind(&self, kind: &TokenKind) -> bool {
        self.peek_kind().same_kind(kind)
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + offset).map(|token| &token.kind)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}
