pub mod pretty;

use thiserror::Error;

use crate::lexer::token::Token;

/// Fatal front-end failure. The first one stops the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("undefined variable '{name}' at line {line}")]
    UndefinedVariable { name: String, line: usize },

    #[error("undefined function '{name}' at line {line}")]
    UndefinedFunction { name: String, line: usize },

    #[error("type mismatch at line {line}: {message}")]
    TypeMismatch { message: String, line: usize },
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, token: &Token) -> Self {
        CompileError::Syntax {
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }

    pub fn type_mismatch(message: impl Into<String>, line: usize) -> Self {
        CompileError::TypeMismatch {
            message: message.into(),
            line,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            CompileError::Syntax { line, .. }
            | CompileError::UndefinedVariable { line, .. }
            | CompileError::UndefinedFunction { line, .. }
            | CompileError::TypeMismatch { line, .. } => *line,
        }
    }

    pub fn column(&self) -> Option<usize> {
        match self {
            CompileError::Syntax { column, .. } => Some(*column),
            _ => None,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
