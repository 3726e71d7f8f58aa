//! External C routines the generated code calls, and the format strings it
//! hands them.

use crate::ir::builder::{FunctionBuilder, ModuleBuilder};
use crate::ir::{FunctionType, Type, Value};
use pcc::typechecker::types::Type as SourceType;

use super::{CodegenError, CodegenResult};

pub const PRINTF: &str = "printf";
pub const SCANF: &str = "scanf";
pub const MALLOC: &str = "malloc";
pub const MEMCPY: &str = "memcpy";
pub const REALLOC: &str = "realloc";

pub const FMT_DOUBLE: &str = "fmt_double";
pub const FMT_STRING: &str = "fmt_string";
pub const FMT_INT: &str = "fmt_int";
pub const FMT_NEWLINE: &str = "fmt_newline";

/// Symbols a subroutine may not take: they would clash in the module.
pub const RESERVED_NAMES: [&str; 10] = [
    "main",
    PRINTF,
    SCANF,
    MALLOC,
    MEMCPY,
    REALLOC,
    FMT_DOUBLE,
    FMT_STRING,
    FMT_INT,
    FMT_NEWLINE,
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Declared signatures and interned format globals for one module.
#[derive(Debug, Clone)]
pub struct RuntimeShim {
    pub printf: FunctionType,
    pub scanf: FunctionType,
    pub malloc: FunctionType,
    pub memcpy: FunctionType,
    pub realloc: FunctionType,
    fmt_double: Value,
    fmt_string: Value,
    fmt_int: Value,
    fmt_newline: Value,
}

impl RuntimeShim {
    /// Add the declarations and format globals to `module`.
    pub fn declare(module: &mut ModuleBuilder) -> Self {
        let bytes = Type::byte_ptr();
        Self {
            printf: module.declare(PRINTF, FunctionType::variadic(Type::I32, vec![bytes.clone()])),
            scanf: module.declare(SCANF, FunctionType::variadic(Type::I32, vec![bytes.clone()])),
            malloc: module.declare(MALLOC, FunctionType::new(bytes.clone(), vec![Type::I64])),
            memcpy: module.declare(
                MEMCPY,
                FunctionType::new(bytes.clone(), vec![bytes.clone(), bytes.clone(), Type::I64]),
            ),
            realloc: module.declare(
                REALLOC,
                FunctionType::new(bytes.clone(), vec![bytes, Type::I64]),
            ),
            fmt_double: module.intern_named(FMT_DOUBLE, "%lf"),
            fmt_string: module.intern_named(FMT_STRING, "%s"),
            fmt_int: module.intern_named(FMT_INT, "%d"),
            fmt_newline: module.intern_named(FMT_NEWLINE, "\n"),
        }
    }

    /// `i8*` to the format string for values of type `ty`.
    pub fn format(&self, ty: SourceType, builder: &mut FunctionBuilder) -> CodegenResult<Value> {
        let global = match ty {
            SourceType::Int32 => &self.fmt_int,
            SourceType::Float64 => &self.fmt_double,
            SourceType::Str => &self.fmt_string,
            SourceType::Undetermined => {
                return Err(CodegenError::InvalidOperand(
                    "no format for an undetermined value".to_string(),
                ))
            }
        };
        string_pointer(global.clone(), builder)
    }

    pub fn newline(&self, builder: &mut FunctionBuilder) -> CodegenResult<Value> {
        string_pointer(self.fmt_newline.clone(), builder)
    }
}

/// Address of the first byte of a global `[N x i8]`.
pub fn string_pointer(global: Value, builder: &mut FunctionBuilder) -> CodegenResult<Value> {
    builder.gep(global, vec![Value::i32(0), Value::i32(0)], true)
}
