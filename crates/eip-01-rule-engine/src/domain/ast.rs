//! Tagged-variant syntax tree.
//!
//! The tree is closed: every node is one of the variants below and none of
//! them can reach anything outside the message under evaluation.

use serde_json::Value;
use shared_types::{FieldPath, Segment};

/// One expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant.
    Literal(Value),
    /// Reference into the message, resolved from the envelope root.
    Field(FieldPath),
    /// `[a, b, ...]`
    Array(Vec<Expr>),
    /// `.key` / `[index]` applied to a computed value.
    Member { target: Box<Expr>, segment: Segment },
    /// Prefix operator.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Comparison or arithmetic.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Short-circuit boolean combinator (Kleene logic).
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Built-in function.
    Call { function: Function, arg: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `a in b`
    In,
    /// `a contains b`
    Contains,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// The complete set of callable functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `exists(x)`: whether `x` resolves to a present value.
    Exists,
    /// `len(x)`: length of a string, array or object.
    Len,
    /// `lower(s)`
    Lower,
    /// `upper(s)`
    Upper,
}

impl Function {
    /// Look up a function by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "exists" => Some(Self::Exists),
            "len" => Some(Self::Len),
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            _ => None,
        }
    }
}
