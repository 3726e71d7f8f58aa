//! Symbol tables and the typing rules applied at every grammar reduction.
//!
//! There is no separate checking pass: the parser owns one
//! [`AnalysisContext`] per parse and calls into it as it builds each node, so
//! a node leaves the parser with its type and length already resolved.

pub mod types;

use std::collections::HashMap;
use std::fmt;

use log::trace;

use crate::errors::{CompileError, CompileResult};
use crate::parser::ast::{BinaryOp, Expr, Param, UnaryOp};
use types::{common_numeric_type, concat_length, Type};

/// Name resolution scope. Subroutine bodies get their own; nothing nests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    TopLevel,
    Function(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::TopLevel => f.write_str("<top level>"),
            Scope::Function(name) => f.write_str(name),
        }
    }
}

/// `(identifier, scope)` pair that keeps locals apart from globals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub name: String,
    pub scope: Scope,
}

impl ScopeKey {
    pub fn new(name: impl Into<String>, scope: &Scope) -> Self {
        Self {
            name: name.into(),
            scope: scope.clone(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    types: HashMap<ScopeKey, Type>,
    lengths: HashMap<ScopeKey, usize>,
}

impl SymbolTable {
    /// Rebinding is allowed and may change the recorded type.
    pub fn bind(&mut self, name: &str, scope: &Scope, ty: Type, length: usize) {
        trace!("bind {} in {} as {} (length {})", name, scope, ty, length);
        let key = ScopeKey::new(name, scope);
        self.types.insert(key.clone(), ty);
        self.lengths.insert(key, length);
    }

    pub fn lookup(&self, name: &str, scope: &Scope) -> Type {
        self.types
            .get(&ScopeKey::new(name, scope))
            .copied()
            .unwrap_or(Type::Undetermined)
    }

    pub fn length(&self, name: &str, scope: &Scope) -> usize {
        self.lengths
            .get(&ScopeKey::new(name, scope))
            .copied()
            .unwrap_or(0)
    }

    pub fn contains(&self, name: &str, scope: &Scope) -> bool {
        self.types.contains_key(&ScopeKey::new(name, scope))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub return_type: Type,
    pub params: Vec<Param>,
}

#[derive(Debug, Default, Clone)]
pub struct FunctionTable {
    functions: HashMap<String, FunctionSignature>,
}

impl FunctionTable {
    pub fn register(&mut self, name: &str, signature: FunctionSignature) {
        trace!("register function {} -> {}", name, signature.return_type);
        self.functions.insert(name.to_string(), signature);
    }

    pub fn return_type(&self, name: &str) -> Option<Type> {
        self.functions.get(name).map(|sig| sig.return_type)
    }
}

/// All mutable analysis state for a single parse.
#[derive(Debug, Default)]
pub struct AnalysisContext {
    pub symbols: SymbolTable,
    pub functions: FunctionTable,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&self, name: &str, scope: &Scope) -> Expr {
        Expr::Variable {
            ty: self.symbols.lookup(name, scope),
            name: name.to_string(),
            length: self.symbols.length(name, scope),
        }
    }

    /// The element takes the array's type; the index must be a resolved number.
    pub fn array_element(
        &self,
        name: &str,
        index: Expr,
        scope: &Scope,
        line: usize,
    ) -> CompileResult<Expr> {
        require_numeric(&index, "an array index", line)?;
        Ok(Expr::ArrayElement {
            ty: self.symbols.lookup(name, scope),
            name: name.to_string(),
            index: Box::new(index),
            length: 0,
        })
    }

    pub fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr, line: usize) -> CompileResult<Expr> {
        require_resolved(&lhs, line)?;
        require_resolved(&rhs, line)?;

        let (left_ty, right_ty) = (lhs.ty(), rhs.ty());
        if op.is_comparison() {
            if left_ty == Type::Str || right_ty == Type::Str {
                return Err(CompileError::type_mismatch(
                    format!("strings cannot be compared with '{}'", op.symbol()),
                    line,
                ));
            }
        } else if left_ty == Type::Str && right_ty == Type::Str {
            if op != BinaryOp::Add {
                return Err(CompileError::type_mismatch(
                    format!("operator '{}' is not defined for strings", op.symbol()),
                    line,
                ));
            }
            let length = concat_length(lhs.length(), rhs.length());
            return Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                ty: Type::Str,
                length,
            });
        }

        let ty = common_numeric_type(left_ty, right_ty).ok_or_else(|| {
            CompileError::type_mismatch(
                format!(
                    "operator '{}' cannot combine '{}' and '{}'",
                    op.symbol(),
                    left_ty,
                    right_ty
                ),
                line,
            )
        })?;

        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty,
            length: 0,
        })
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr, line: usize) -> CompileResult<Expr> {
        require_resolved(&operand, line)?;
        if operand.ty() == Type::Str {
            return Err(CompileError::type_mismatch("a string cannot be negated", line));
        }

        Ok(Expr::Unary {
            ty: operand.ty(),
            op,
            length: operand.length(),
            operand: Box::new(operand),
        })
    }

    pub fn call(&self, name: &str, args: Vec<Expr>, line: usize) -> CompileResult<Expr> {
        let return_type =
            self.functions
                .return_type(name)
                .ok_or_else(|| CompileError::UndefinedFunction {
                    name: name.to_string(),
                    line,
                })?;
        // Parameters are INT or DOUBLE, so no argument may be a string.
        for arg in &args {
            require_numeric(arg, &format!("an argument to '{}'", name), line)?;
        }

        Ok(Expr::Call {
            name: name.to_string(),
            args,
            return_type,
        })
    }
}

/// Fail with `UndefinedVariable` when an expression could not be resolved.
pub fn require_resolved(expr: &Expr, line: usize) -> CompileResult<()> {
    if expr.ty().is_resolved() {
        return Ok(());
    }

    Err(CompileError::UndefinedVariable {
        name: unresolved_name(expr),
        line,
    })
}

/// Like [`require_resolved`], and also reject strings with `TypeMismatch`.
pub fn require_numeric(expr: &Expr, position: &str, line: usize) -> CompileResult<()> {
    require_resolved(expr, line)?;
    if expr.ty() == Type::Str {
        return Err(CompileError::type_mismatch(
            format!("a string cannot be used as {}", position),
            line,
        ));
    }
    Ok(())
}

fn unresolved_name(expr: &Expr) -> String {
    match expr {
        Expr::Variable { name, .. } | Expr::ArrayElement { name, .. } | Expr::Call { name, .. } => {
            name.clone()
        }
        Expr::Binary { lhs, rhs, .. } => {
            if lhs.ty().is_resolved() {
                unresolved_name(rhs)
            } else {
                unresolved_name(lhs)
            }
        }
        Expr::Unary { operand, .. } => unresolved_name(operand),
        Expr::Constant { .. } => "<constant>".to_string(),
    }
}
