use crate::errors::{CompileError, CompileResult};
use crate::lexer::token::TokenKind;
use crate::typechecker::types::Type;
use crate::typechecker::Scope;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::Parser;

impl Parser {
    pub(crate) fn expression(&mut self, scope: &Scope) -> CompileResult<Expr> {
        self.comparison(scope)
    }

    fn comparison(&mut self, scope: &Scope) -> CompileResult<Expr> {
        let lhs = self.additive(scope)?;

        let op = match self.peek_kind() {
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            TokenKind::EqualEqual => BinaryOp::Equal,
            // `<>` is the source spelling of not-equal.
            TokenKind::LessGreater => BinaryOp::NotEqual,
            _ => return Ok(lhs),
        };
        let line = self.advance().line;
        let rhs = self.additive(scope)?;
        self.context.binary(op, lhs, rhs, line)
    }

    fn additive(&mut self, scope: &Scope) -> CompileResult<Expr> {
        let mut expr = self.term(scope)?;

        loop {
            let op = if self.matches_symbol(TokenKind::Plus) {
                Some(BinaryOp::Add)
            } else if self.matches_symbol(TokenKind::Minus) {
                Some(BinaryOp::Subtract)
            } else {
                None
            };

            let Some(op) = op else { break };
            let line = self.previous().line;
            let rhs = self.term(scope)?;
            expr = self.context.binary(op, expr, rhs, line)?;
        }

        Ok(expr)
    }

    fn term(&mut self, scope: &Scope) -> CompileResult<Expr> {
        let mut expr = self.unary(scope)?;

        loop {
            let op = if self.matches_symbol(TokenKind::Star) {
                Some(BinaryOp::Multiply)
            } else if self.matches_symbol(TokenKind::Slash) {
                Some(BinaryOp::Divide)
            } else if self.matches_symbol(TokenKind::Percent) {
                Some(BinaryOp::Modulo)
            } else {
                None
            };

            let Some(op) = op else { break };
            let line = self.previous().line;
            let rhs = self.unary(scope)?;
            expr = self.context.binary(op, expr, rhs, line)?;
        }

        Ok(expr)
    }

    fn unary(&mut self, scope: &Scope) -> CompileResult<Expr> {
        if self.matches_symbol(TokenKind::Minus) {
            let line = self.previous().line;
            let operand = self.unary(scope)?;
            return self.context.unary(UnaryOp::Negate, operand, line);
        }

        self.primary(scope)
    }

    fn primary(&mut self, scope: &Scope) -> CompileResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(value) => {
                self.advance();
                let value = i32::try_from(value).map_err(|_| {
                    CompileError::syntax(
                        format!("integer literal {} does not fit in 32 bits", token.lexeme),
                        &token,
                    )
                })?;
                Ok(Expr::Constant {
                    ty: Type::Int32,
                    value: Literal::Int(value),
                    length: 0,
                })
            }
            TokenKind::Double(value) => {
                self.advance();
                Ok(Expr::Constant {
                    ty: Type::Float64,
                    value: Literal::Double(value),
                    length: 0,
                })
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expr::Constant {
                    ty: Type::Str,
                    length: value.len() + 1,
                    value: Literal::Str(value),
                })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.matches_symbol(TokenKind::LeftParen) {
                    let args = self.arguments(scope)?;
                    return self.context.call(&name, args, token.line);
                }

                if self.matches_symbol(TokenKind::LeftBracket) {
                    let index = self.expression(scope)?;
                    self.consume_symbol(TokenKind::RightBracket, "expected ']' after index")?;
                    return self.context.array_element(&name, index, scope, token.line);
                }

                Ok(self.context.variable(&name, scope))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression(scope)?;
                self.consume_symbol(TokenKind::RightParen, "expected ')' after expression")?;
                Ok(expr)
            }
            _ => Err(CompileError::syntax(
                format!("expected expression, found {}", token.describe()),
                &token,
            )),
        }
    }

    fn arguments(&mut self, scope: &Scope) -> CompileResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check_kind(&TokenKind::RightParen) {
            loop {
                args.push(self.expression(scope)?);
                if !self.matches_symbol(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume_symbol(TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(args)
    }
}
