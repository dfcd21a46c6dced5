//! Domain layer: pure expression language, no I/O.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, Function, LogicalOp, UnaryOp};
pub use eval::{compare, loose_eq, truthy};
