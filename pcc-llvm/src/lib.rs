//! pcc-llvm - LLVM IR back end for the pseudocode compiler
//!
//! Takes the typed AST produced by the `pcc` front end and lowers it to a
//! textual LLVM module that `clang` or `llc` can turn into a native program
//! linked against the C runtime (`printf`, `scanf`, `malloc`, `memcpy`,
//! `realloc`).

#![warn(missing_docs)]

pub mod codegen;
pub mod ir;

use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use codegen::{CodeGenerator, CodegenError};
use pcc::parser::ast::Program;

/// Main compiler interface
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Target triple recorded in the module
    pub target_triple: String,
    /// Module identifier, usually the output path
    pub module_name: String,
}

impl Compiler {
    /// Create a new compiler targeting the host
    pub fn new() -> Self {
        Self {
            target_triple: default_target_triple(),
            module_name: "output.ll".to_string(),
        }
    }

    /// Use a different target triple.
    pub fn with_target(mut self, triple: impl Into<String>) -> Self {
        self.target_triple = triple.into();
        self
    }

    /// Use a different module identifier.
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    /// Compile source text into an IR module.
    pub fn compile_source(&self, source: &str) -> Result<ir::Module, CompileError> {
        self.compile_named(source, &self.module_name)
    }

    /// Compile source text, recording `source_name` as the module's source file.
    pub fn compile_named(&self, source: &str, source_name: &str) -> Result<ir::Module, CompileError> {
        let lexed = pcc::lexer::lex(source);
        debug!(
            "lexed {} tokens ({} diagnostics)",
            lexed.tokens.len(),
            lexed.diagnostics.len()
        );

        // A fresh parser per call: analysis state never carries over.
        let mut parser = pcc::parser::Parser::new(lexed.tokens);
        let program = parser.parse_program()?;
        self.compile_program(&program, source_name)
    }

    /// Lower an already analyzed program.
    pub fn compile_program(
        &self,
        program: &Program,
        source_name: &str,
    ) -> Result<ir::Module, CompileError> {
        let generator = CodeGenerator::new(&self.module_name, &self.target_triple)
            .with_source_filename(source_name);
        let module = generator.generate(program)?;
        info!(
            "generated {} function(s), {} global(s) for {}",
            module.functions.len(),
            module.globals.len(),
            source_name
        );
        Ok(module)
    }

    /// Read, preprocess and compile a source file.
    pub fn compile_file(&self, path: &Path) -> Result<ir::Module, CompileError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = pcc::preprocess(&raw);
        self.compile_named(&source, &path.display().to_string())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Triple for the machine the compiler runs on.
pub fn default_target_triple() -> String {
    let arch = std::env::consts::ARCH;
    match std::env::consts::OS {
        "linux" => format!("{}-unknown-linux-gnu", arch),
        "macos" => format!("{}-apple-darwin", arch),
        "windows" => format!("{}-pc-windows-msvc", arch),
        os => format!("{}-unknown-{}", arch, os),
    }
}

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    /// Lexing, parsing or semantic analysis failed
    #[error(transparent)]
    Frontend(#[from] pcc::CompileError),
    /// Lowering failed
    #[error("code generation failed: {0}")]
    Codegen(#[from] CodegenError),
    /// Reading the source failed
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_creation() {
        let compiler = Compiler::new();
        assert_eq!(compiler.module_name, "output.ll");
        assert!(compiler.target_triple.starts_with(std::env::consts::ARCH));
    }

    #[test]
    fn test_builder_overrides() {
        let compiler = Compiler::new()
            .with_target("wasm32-unknown-unknown")
            .with_module_name("demo.ll");
        let module = compiler.compile_source("OUTPUT 1").expect("compiles");
        assert_eq!(module.target_triple, "wasm32-unknown-unknown");
        assert_eq!(module.name, "demo.ll");
    }
}
