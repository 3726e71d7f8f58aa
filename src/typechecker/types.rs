use std::fmt;

/// Resolved type of an expression or a declared name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int32,
    Float64,
    Str,
    /// A name that is not bound in the scope it was looked up in.
    Undetermined,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int32 | Type::Float64)
    }

    pub fn is_resolved(self) -> bool {
        !matches!(self, Type::Undetermined)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int32 => "int",
            Type::Float64 => "double",
            Type::Str => "string",
            Type::Undetermined => "undetermined",
        };
        f.write_str(name)
    }
}

/// Implicit numeric promotion: `Float64` wins over `Int32`.
pub fn common_numeric_type(left: Type, right: Type) -> Option<Type> {
    match (left, right) {
        (Type::Int32, Type::Int32) => Some(Type::Int32),
        (Type::Float64, Type::Int32 | Type::Float64) | (Type::Int32, Type::Float64) => {
            Some(Type::Float64)
        }
        _ => None,
    }
}

/// Length of a concatenation: the left terminator is dropped.
pub fn concat_length(left: usize, right: usize) -> usize {
    left.saturating_sub(1) + right
}
