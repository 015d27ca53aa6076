// Lowered, fully resolved form of a snippet.
// Names are gone: locals are frame slots, calls point at a function index or a
// native library function, and every expression carries its static type.

use crate::ast::{BinaryOp, UnaryOp};
use crate::library::NativeFn;
use crate::types::Type;
use crate::value::Value;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A function of the compiled unit.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Module or struct declaring the function; `None` for free functions.
    pub declaring_type: Option<String>,
    pub is_pub: bool,
    /// Takes a `self` receiver, so it needs an instance to be called.
    pub has_self: bool,
    pub params: Vec<Param>,
    pub ret: Type,
    pub(crate) slots: usize,
    pub(crate) body: Vec<Stmt>,
}

impl Function {
    /// `Type.name` or plain `name` for free functions.
    pub fn qualified_name(&self) -> String {
        match &self.declaring_type {
            Some(ty) => format!("{}.{}", ty, self.name),
            None => self.name.clone(),
        }
    }

    /// Argument count at the call boundary, including the receiver.
    pub fn arity(&self) -> usize {
        self.params.len() + usize::from(self.has_self)
    }
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Param>,
}

#[derive(Clone)]
pub enum Callee {
    User(usize),
    Native(Arc<NativeFn>),
}

impl std::fmt::Debug for Callee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callee::User(index) => write!(f, "User({})", index),
            Callee::Native(native) => write!(f, "Native({})", native.name),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Store { slot: usize, value: Expr },
    If { cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt> },
    While { cond: Expr, body: Vec<Stmt> },
    Return(Option<Expr>),
    Throw(Expr),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub(crate) enum ExprKind {
    Const(Value),
    Local(usize),
    Call { callee: Callee, args: Vec<Expr> },
    Field { base: Box<Expr>, index: usize },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    List(Vec<Expr>),
    Index { base: Box<Expr>, index: Box<Expr> },
    Cast { expr: Box<Expr>, to: Type },
    /// Field initialisers in declaration order.
    Struct { name: String, fields: Vec<(String, Expr)> },
}
