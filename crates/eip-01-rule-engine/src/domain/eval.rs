//! Fail-closed evaluator.
//!
//! Every node evaluates to `Some(value)` or `None` ("missing"). Missing
//! propagates through comparisons and arithmetic as *unknown*; boolean
//! combinators use Kleene logic, so `unknown && false` is `false` and
//! `unknown || true` is `true`. A predicate whose result is unknown is false.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::{Number, Value};
use shared_types::{FieldPath, MessageEnvelope};

use crate::domain::ast::{BinaryOp, Expr, Function, LogicalOp, UnaryOp};

/// Evaluation result: `None` is a missing value.
pub type Evaluated<'a> = Option<Cow<'a, Value>>;

/// Evaluate `expr` against `message`.
pub fn evaluate<'a>(expr: &'a Expr, message: &'a MessageEnvelope) -> Evaluated<'a> {
    match expr {
        Expr::Literal(value) => Some(Cow::Borrowed(value)),
        Expr::Field(path) => message.resolve(path),
        Expr::Array(items) => Some(Cow::Owned(Value::Array(
            items
                .iter()
                .filter_map(|item| evaluate(item, message).map(Cow::into_owned))
                .collect(),
        ))),
        Expr::Member { target, segment } => match evaluate(target, message)? {
            Cow::Borrowed(value) => {
                FieldPath::resolve_segments(value, std::slice::from_ref(segment))
                    .map(Cow::Borrowed)
            }
            Cow::Owned(value) => {
                FieldPath::resolve_segments(&value, std::slice::from_ref(segment))
                    .cloned()
                    .map(Cow::Owned)
            }
        },
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, message)?;
            match op {
                UnaryOp::Not => Some(boolean(!truthy(&value))),
                UnaryOp::Neg => negate(&value).map(Cow::Owned),
            }
        }
        Expr::Logical { op, lhs, rhs } => logical(*op, lhs, rhs, message).map(boolean),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, message)?;
            let rhs = evaluate(rhs, message)?;
            binary(*op, &lhs, &rhs).map(Cow::Owned)
        }
        Expr::Call { function, arg } => call(*function, evaluate(arg, message)),
    }
}

/// Evaluate as a predicate: true only for a present, truthy result.
pub fn evaluate_predicate(expr: &Expr, message: &MessageEnvelope) -> bool {
    evaluate(expr, message).is_some_and(|value| truthy(&value))
}

/// Truthiness: `null`, `false`, `0` and `""` are false.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn boolean<'a>(b: bool) -> Cow<'a, Value> {
    Cow::Owned(Value::Bool(b))
}

fn logical(op: LogicalOp, lhs: &Expr, rhs: &Expr, message: &MessageEnvelope) -> Option<bool> {
    let left = evaluate(lhs, message).map(|v| truthy(&v));
    match (op, left) {
        (LogicalOp::And, Some(false)) => return Some(false),
        (LogicalOp::Or, Some(true)) => return Some(true),
        _ => {}
    }
    let right = evaluate(rhs, message).map(|v| truthy(&v));
    match op {
        LogicalOp::And => match (left, right) {
            (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        LogicalOp::Or => match (left, right) {
            (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    let result = match op {
        BinaryOp::Eq => loose_eq(lhs, rhs),
        BinaryOp::Ne => !loose_eq(lhs, rhs),
        BinaryOp::Lt => compare(lhs, rhs) == Some(Ordering::Less),
        BinaryOp::Le => matches!(compare(lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Gt => compare(lhs, rhs) == Some(Ordering::Greater),
        BinaryOp::Ge => matches!(
            compare(lhs, rhs),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        BinaryOp::In => contains(rhs, lhs),
        BinaryOp::Contains => contains(lhs, rhs),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            return arithmetic(op, lhs, rhs)
        }
    };
    Some(Value::Bool(result))
}

/// Equality with numbers compared by value (`1 == 1.0`).
#[must_use]
pub fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| loose_eq(x, y)))
        }
        _ => lhs == rhs,
    }
}

/// Ordering for number/number and string/string; anything else is unordered.
#[must_use]
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// `container` holds `item`: array element, substring, or object key.
fn contains(container: &Value, item: &Value) -> bool {
    match (container, item) {
        (Value::Array(items), _) => items.iter().any(|candidate| loose_eq(candidate, item)),
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn negate(value: &Value) -> Option<Value> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
        return Some(Value::from(i));
    }
    Number::from_f64(-n.as_f64()?).map(Value::Number)
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    if op == BinaryOp::Add && (lhs.is_string() || rhs.is_string()) {
        return Some(Value::String(format!("{}{}", text(lhs), text(rhs))));
    }

    let (x, y) = (lhs.as_f64()?, rhs.as_f64()?);
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && y == 0.0 {
        return None;
    }

    if let (Some(i), Some(j)) = (lhs.as_i64(), rhs.as_i64()) {
        let exact = match op {
            BinaryOp::Add => i.checked_add(j),
            BinaryOp::Sub => i.checked_sub(j),
            BinaryOp::Mul => i.checked_mul(j),
            BinaryOp::Div if i.checked_rem(j) == Some(0) => i.checked_div(j),
            BinaryOp::Rem => i.checked_rem(j),
            _ => None,
        };
        if let Some(value) = exact {
            return Some(Value::from(value));
        }
    }

    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => return None,
    };
    Number::from_f64(result).map(Value::Number)
}

/// String form used for concatenation.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn call(function: Function, arg: Evaluated<'_>) -> Evaluated<'_> {
    if function == Function::Exists {
        return Some(boolean(arg.is_some()));
    }
    let arg = arg?;
    let value = match (function, &*arg) {
        (Function::Len, Value::String(s)) => Value::from(s.chars().count()),
        (Function::Len, Value::Array(items)) => Value::from(items.len()),
        (Function::Len, Value::Object(map)) => Value::from(map.len()),
        (Function::Lower, Value::String(s)) => Value::String(s.to_lowercase()),
        (Function::Upper, Value::String(s)) => Value::String(s.to_uppercase()),
        _ => return None,
    };
    Some(Cow::Owned(value))
}
