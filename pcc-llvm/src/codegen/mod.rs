//! Code generation orchestration
//!
//! Lowers a typed [`Program`] into a [`Module`]: one `main` function for the
//! top-level statements, one function per subroutine, the runtime shim
//! declarations and the format-string globals.

pub mod lowering;
pub mod runtime;

use thiserror::Error;

use crate::ir::builder::ModuleBuilder;
use crate::ir::Module;
use pcc::parser::ast::Program;

/// Failures while lowering an AST the analyzer already accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("no storage for '{name}' in {scope}")]
    UnresolvedName { name: String, scope: String },

    #[error("'{name}' expects {expected} argument(s) but was called with {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{0}' is reserved and cannot name a subroutine")]
    ReservedName(String),

    #[error("subroutine '{0}' is defined more than once")]
    DuplicateFunction(String),

    #[error("invalid operand: {0}")]
    InvalidOperand(String),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Main codegen entry point.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    /// Identifier written in the module header.
    pub module_name: String,
    /// Recorded as `source_filename`.
    pub source_filename: String,
    /// Recorded as `target triple`.
    pub target_triple: String,
}

impl CodeGenerator {
    /// Create a new code generator.
    pub fn new(module_name: impl Into<String>, target_triple: impl Into<String>) -> Self {
        let module_name = module_name.into();
        Self {
            source_filename: module_name.clone(),
            module_name,
            target_triple: target_triple.into(),
        }
    }

    pub fn with_source_filename(mut self, name: impl Into<String>) -> Self {
        self.source_filename = name.into();
        self
    }

    /// Lower a program. Every call starts from empty memo tables.
    pub fn generate(&self, program: &Program) -> CodegenResult<Module> {
        let mut builder = ModuleBuilder::new(&self.module_name, &self.target_triple);
        builder.set_source_filename(&self.source_filename);
        lowering::Lowering::new(builder).lower_program(program)
    }
}
