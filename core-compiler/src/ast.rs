// Surface syntax tree produced by the parser.

use crate::diagnostic::Position;

#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub uses: Vec<UseDecl>,
    pub items: Vec<Item>,
}

/// `use Std.Text.Regex;`
#[derive(Debug, Clone)]
pub struct UseDecl {
    pub path: Vec<String>,
    pub position: Position,
}

impl UseDecl {
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    Function(FnDecl),
    Type(TypeDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Container of stateless functions.
    Module,
    /// Record type; may declare methods taking `self`.
    Struct,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub is_pub: bool,
    pub fields: Vec<FieldDecl>,
    pub functions: Vec<FnDecl>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    pub is_pub: bool,
    /// Declared with a leading `self` receiver.
    pub has_self: bool,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Named(String, Position),
    List(Box<TypeExpr>, Position),
}

impl TypeExpr {
    pub fn position(&self) -> Position {
        match self {
            TypeExpr::Named(_, p) | TypeExpr::List(_, p) => *p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: String,
        ty: Option<TypeExpr>,
        value: Expr,
        position: Position,
    },
    Assign {
        name: String,
        value: Expr,
        position: Position,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_branch: Option<ElseBranch>,
        position: Position,
    },
    While {
        cond: Expr,
        body: Block,
        position: Position,
    },
    Return {
        value: Option<Expr>,
        position: Position,
    },
    Throw {
        value: Expr,
        position: Position,
    },
    Expr(Expr),
}

impl Stmt {
    pub fn position(&self) -> Position {
        match self {
            Stmt::Let { position, .. }
            | Stmt::Assign { position, .. }
            | Stmt::If { position, .. }
            | Stmt::While { position, .. }
            | Stmt::Return { position, .. }
            | Stmt::Throw { position, .. } => *position,
            Stmt::Expr(e) => e.position,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
    Block(Block),
    If(Box<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(u128),
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
    SelfValue,
    /// `a`, `a.b`, `Ns.Path.name`; meaning decided by the checker.
    Path(Vec<String>),
    /// `f(..)`, `Type.f(..)`, `Ns.Path.f(..)`, `local.method(..)`.
    Call { callee: Vec<String>, args: Vec<Expr> },
    Field { base: Box<Expr>, name: String },
    MethodCall { receiver: Box<Expr>, method: String, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    List(Vec<Expr>),
    Index { base: Box<Expr>, index: Box<Expr> },
    Cast { expr: Box<Expr>, ty: TypeExpr },
    StructLit { name: String, fields: Vec<(String, Expr)> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}
