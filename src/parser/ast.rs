use crate::typechecker::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assignment(Assignment),
    ArrayDeclaration {
        ty: Type,
        name: String,
        size: Expr,
    },
    Output {
        expr: Expr,
    },
    Input {
        target: Target,
        ty: Type,
    },
    If(IfStmt),
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Assignment,
        bound: Expr,
        body: Vec<Stmt>,
    },
    FunctionDecl {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        return_type: Type,
    },
    Return {
        expr: Expr,
    },
}

impl Stmt {
    /// Short name used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Stmt::Expr(_) => "expression",
            Stmt::Assignment(_) => "assignment",
            Stmt::ArrayDeclaration { .. } => "array declaration",
            Stmt::Output { .. } => "OUTPUT",
            Stmt::Input { .. } => "INPUT",
            Stmt::If(_) => "IF",
            Stmt::While { .. } => "WHILE",
            Stmt::For { .. } => "FOR",
            Stmt::FunctionDecl { .. } => "SUBROUTINE",
            Stmt::Return { .. } => "RETURN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub op: AssignOp,
    pub ty: Type,
    pub target: Target,
    pub value: Expr,
}

/// Left-hand side of an assignment or `INPUT`.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Variable {
        name: String,
        ty: Type,
        length: usize,
    },
    Element {
        name: String,
        ty: Type,
        index: Box<Expr>,
    },
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Target::Variable { name, .. } | Target::Element { name, .. } => name,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Target::Variable { ty, .. } | Target::Element { ty, .. } => *ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_body: Vec<Stmt>,
    pub else_branch: Option<ElseBranch>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    Block(Vec<Stmt>),
    If(Box<IfStmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Double(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant {
        ty: Type,
        value: Literal,
        length: usize,
    },
    Variable {
        ty: Type,
        name: String,
        length: usize,
    },
    ArrayElement {
        ty: Type,
        name: String,
        index: Box<Expr>,
        length: usize,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Type,
        length: usize,
    },
    Unary {
        ty: Type,
        op: UnaryOp,
        operand: Box<Expr>,
        length: usize,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        return_type: Type,
    },
}

impl Expr {
    pub fn ty(&self) -> Type {
        match self {
            Expr::Constant { ty, .. }
            | Expr::Variable { ty, .. }
            | Expr::ArrayElement { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Unary { ty, .. } => *ty,
            Expr::Call { return_type, .. } => *return_type,
        }
    }

    /// Byte length including the terminator for strings, 0 otherwise.
    pub fn length(&self) -> usize {
        match self {
            Expr::Constant { length, .. }
            | Expr::Variable { length, .. }
            | Expr::ArrayElement { length, .. }
            | Expr::Binary { length, .. }
            | Expr::Unary { length, .. } => *length,
            Expr::Call { .. } => 0,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Expr::Binary { op, .. } if op.is_comparison())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}
