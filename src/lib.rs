//! Front end of the pseudocode compiler.
//!
//! `lexer` turns source text into tokens, `parser` builds the typed AST while
//! resolving names and types through `typechecker`, and `errors` holds the
//! diagnostics shared by both. Code generation lives in the `pcc-llvm` crate.

pub mod errors;
pub mod lexer;
pub mod parser;
pub mod typechecker;

pub use errors::{CompileError, CompileResult};

/// Drop blank lines and leading indentation, as the driver does before lexing.
pub fn preprocess(source: &str) -> String {
    source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n")
}
