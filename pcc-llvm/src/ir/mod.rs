//! Target module data model
//!
//! A typed, SSA-style representation that mirrors LLVM's textual IR closely
//! enough that [`printer`] can write it out directly. Pointers are typed
//! (`i8*`, `double*`), which keeps every load, store and address computation
//! self-describing.

pub mod builder;
pub mod printer;

/// A compiled module
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Module identifier written in the header comment
    pub name: String,
    /// Source file the module was compiled from
    pub source_filename: String,
    /// Target triple
    pub target_triple: String,
    /// Private constant byte buffers
    pub globals: Vec<Global>,
    /// External functions referenced but not defined here
    pub declarations: Vec<Declaration>,
    /// Functions defined in this module
    pub functions: Vec<Function>,
}

/// An immutable global byte buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    /// Global name, without the `@` sigil
    pub name: String,
    /// Bytes including the trailing NUL
    pub bytes: Vec<u8>,
}

impl Global {
    /// Type of the buffer itself, `[N x i8]`.
    pub fn ty(&self) -> Type {
        Type::Array(self.bytes.len(), Box::new(Type::I8))
    }

    /// Value naming the buffer's address.
    pub fn address(&self) -> Value {
        Value::Global {
            name: self.name.clone(),
            ty: Type::pointer_to(self.ty()),
        }
    }
}

/// External function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Symbol name
    pub name: String,
    /// Signature
    pub signature: FunctionType,
}

/// A function signature
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    /// Return type
    pub ret: Type,
    /// Fixed parameter types
    pub params: Vec<Type>,
    /// Whether extra arguments may follow the fixed ones
    pub variadic: bool,
}

impl FunctionType {
    /// Signature with a fixed parameter list.
    pub fn new(ret: Type, params: Vec<Type>) -> Self {
        Self {
            ret,
            params,
            variadic: false,
        }
    }

    /// Signature accepting extra trailing arguments.
    pub fn variadic(ret: Type, params: Vec<Type>) -> Self {
        Self {
            ret,
            params,
            variadic: true,
        }
    }
}

/// A function definition
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Return type
    pub return_type: Type,
    /// Basic blocks; the first one is the entry block
    pub blocks: Vec<BasicBlock>,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: Type,
}

impl Parameter {
    /// The incoming argument as a value.
    pub fn value(&self) -> Value {
        Value::Local {
            name: self.name.clone(),
            ty: self.ty.clone(),
        }
    }
}

/// A basic block (straight-line code with no branches except at the end)
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    /// Block label
    pub label: String,
    /// Instructions in this block
    pub instructions: Vec<Instruction>,
    /// Block terminator
    pub terminator: Terminator,
}

/// IR instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Reserve a stack slot
    Alloca { dest: String, ty: Type },
    /// Load through a pointer
    Load { dest: String, ty: Type, ptr: Value },
    /// Store through a pointer
    Store { value: Value, ptr: Value },
    /// Arithmetic on two operands of the same type
    Binary {
        dest: String,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    /// Signed integer comparison producing `i1`
    ICmp {
        dest: String,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Unordered floating comparison producing `i1`
    FCmp {
        dest: String,
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Conversion between types
    Cast {
        dest: String,
        op: CastOp,
        value: Value,
        to: Type,
    },
    /// Address arithmetic
    GetElementPtr {
        dest: String,
        result: Type,
        base: Value,
        indices: Vec<Value>,
        inbounds: bool,
    },
    /// Function call
    Call {
        dest: Option<String>,
        callee: String,
        signature: FunctionType,
        args: Vec<Value>,
    },
}

/// Block terminator (control flow)
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Return from function
    Return(Option<Value>),
    /// Unconditional branch
    Branch { target: String },
    /// Conditional branch
    CondBranch {
        cond: Value,
        then_block: String,
        else_block: String,
    },
    /// Unreachable code; also the state of a block nobody has terminated yet
    Unreachable,
}

/// Arithmetic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

/// Signed integer comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// Unordered floating comparison (true if either side is NaN)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPredicate {
    Ueq,
    Une,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Conversion opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    SiToFp,
    FpToSi,
    UiToFp,
    ZExt,
    SExt,
    Bitcast,
}

/// IR value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Function-local name (`%name`)
    Local { name: String, ty: Type },
    /// Module-level name (`@name`)
    Global { name: String, ty: Type },
    /// Integer constant of the given integer type
    Int { ty: Type, value: i64 },
    /// `double` constant
    Double(f64),
    /// Null pointer of the given pointer type
    Null(Type),
}

impl Value {
    /// `i32` constant.
    pub fn i32(value: i32) -> Self {
        Value::Int {
            ty: Type::I32,
            value: i64::from(value),
        }
    }

    /// Type of the value.
    pub fn ty(&self) -> Type {
        match self {
            Value::Local { ty, .. } | Value::Global { ty, .. } | Value::Int { ty, .. } => {
                ty.clone()
            }
            Value::Double(_) => Type::Double,
            Value::Null(ty) => ty.clone(),
        }
    }
}

/// IR type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Void (no value)
    Void,
    /// Truth value
    I1,
    /// Byte
    I8,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 64-bit float
    Double,
    /// Pointer to type
    Ptr(Box<Type>),
    /// Fixed-length array `[N x T]`
    Array(usize, Box<Type>),
}

impl Type {
    /// `T*` for the given `T`.
    pub fn pointer_to(ty: Type) -> Self {
        Type::Ptr(Box::new(ty))
    }

    /// `i8*`, the type of every string and heap block.
    pub fn byte_ptr() -> Self {
        Type::pointer_to(Type::I8)
    }

    /// Type a pointer points at, if this is a pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// Element type of a pointer or array.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Ptr(inner) | Type::Array(_, inner) => Some(inner),
            _ => None,
        }
    }
}

impl Module {
    /// Create a new empty module
    pub fn new(name: impl Into<String>, target_triple: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source_filename: name.clone(),
            name,
            target_triple: target_triple.into(),
            globals: Vec::new(),
            declarations: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Look up a defined function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name == name)
    }
}

impl Function {
    /// Create a new function
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            blocks: Vec::new(),
        }
    }

    /// Look up a block by label.
    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.label == label)
    }

    /// All instructions in block order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|block| block.instructions.iter())
    }
}

impl BasicBlock {
    /// Create a new basic block
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
            terminator: Terminator::Unreachable,
        }
    }

    /// Whether a terminator other than the placeholder has been set.
    pub fn is_terminated(&self) -> bool {
        !matches!(self.terminator, Terminator::Unreachable)
    }
}
