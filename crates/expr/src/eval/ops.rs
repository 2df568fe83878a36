//! Element-wise scalar operators.

use std::cmp::Ordering;
use tabula_table::Scalar;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{ExecError, Result};
use crate::eval::aggregate::truthy;

pub(crate) fn binary(op: BinaryOp, lhs: &Scalar, rhs: &Scalar) -> Result<Scalar> {
    match op {
        BinaryOp::And | BinaryOp::Or => logical(op, lhs, rhs),
        op if op.is_comparison() => compare(op, lhs, rhs).map(Scalar::Bool),
        _ => arithmetic(op, lhs, rhs),
    }
}

pub(crate) fn unary(op: UnaryOp, value: &Scalar) -> Result<Scalar> {
    match (op, value) {
        (_, Scalar::Null) => Ok(Scalar::Null),
        (UnaryOp::Not, Scalar::Bool(b)) => Ok(Scalar::Bool(!b)),
        (UnaryOp::Not, Scalar::Int(v)) => Ok(Scalar::Int(!v)),
        (UnaryOp::Negate, Scalar::Int(v)) => Ok(v
            .checked_neg()
            .map_or(Scalar::Float(-(*v as f64)), Scalar::Int)),
        (UnaryOp::Negate, Scalar::Float(v)) => Ok(Scalar::Float(-v)),
        (UnaryOp::Negate, Scalar::Bool(b)) => Ok(Scalar::Int(-i64::from(*b))),
        (op, other) => Err(ExecError::type_error(format!(
            "bad operand for unary {}: '{other}'",
            if op == UnaryOp::Not { "~" } else { "-" }
        ))),
    }
}

fn logical(op: BinaryOp, lhs: &Scalar, rhs: &Scalar) -> Result<Scalar> {
    if let (Scalar::Int(a), Scalar::Int(b)) = (lhs, rhs) {
        return Ok(Scalar::Int(if op == BinaryOp::And { a & b } else { a | b }));
    }
    let (a, b) = (truthy(lhs), truthy(rhs));
    Ok(Scalar::Bool(if op == BinaryOp::And { a && b } else { a || b }))
}

/// Comparisons involving a null are false, except `!=` which is true.
pub(crate) fn compare(op: BinaryOp, lhs: &Scalar, rhs: &Scalar) -> Result<bool> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(op == BinaryOp::NotEqual);
    }
    let ordering = match (lhs, rhs) {
        (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
        (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return match op {
            BinaryOp::Equal => Ok(false),
            BinaryOp::NotEqual => Ok(true),
            _ => Err(ExecError::type_error(format!(
                "'{}' not supported between '{lhs}' and '{rhs}'",
                op.symbol()
            ))),
        };
    };
    Ok(match op {
        BinaryOp::Equal => ordering == Ordering::Equal,
        BinaryOp::NotEqual => ordering != Ordering::Equal,
        BinaryOp::LessThan => ordering == Ordering::Less,
        BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOp::GreaterThan => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

fn arithmetic(op: BinaryOp, lhs: &Scalar, rhs: &Scalar) -> Result<Scalar> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Scalar::Null);
    }
    if let (BinaryOp::Add, Scalar::Str(a), Scalar::Str(b)) = (op, lhs, rhs) {
        return Ok(Scalar::Str(format!("{a}{b}")));
    }
    let mismatch = || {
        ExecError::type_error(format!(
            "unsupported operand types for {}: '{lhs}' and '{rhs}'",
            op.symbol()
        ))
    };
    if matches!(lhs, Scalar::Str(_)) || matches!(rhs, Scalar::Str(_)) {
        return Err(mismatch());
    }

    if let (Some(a), Some(b), false) = (
        lhs.as_i64(),
        rhs.as_i64(),
        matches!(lhs, Scalar::Float(_)) || matches!(rhs, Scalar::Float(_)),
    ) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Remainder if b == 0 => return Ok(Scalar::Null),
            BinaryOp::Remainder => a.checked_rem(b).map(|r| {
                if r != 0 && (r < 0) != (b < 0) {
                    r + b
                } else {
                    r
                }
            }),
            _ => None,
        };
        if let Some(value) = exact {
            return Ok(Scalar::Int(value));
        }
    }

    let (a, b) = (
        lhs.as_f64().ok_or_else(mismatch)?,
        rhs.as_f64().ok_or_else(mismatch)?,
    );
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Remainder => {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        _ => return Err(mismatch()),
    };
    Ok(Scalar::Float(value))
}

/// Python-style rounding to `digits` decimals (half to even).
pub(crate) fn round(value: &Scalar, digits: i64) -> Result<Scalar> {
    match value {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Int(_) | Scalar::Bool(_) if digits >= 0 => {
            Ok(Scalar::Int(value.as_i64().unwrap_or_default()))
        }
        Scalar::Str(s) => Err(ExecError::type_error(format!("cannot round string '{s}'"))),
        other => {
            let v = other.as_f64().unwrap_or(f64::NAN);
            let factor = 10f64.powi(digits.clamp(-300, 300) as i32);
            let scaled = v * factor;
            let rounded = scaled.round();
            let rounded = if (scaled - scaled.trunc()).abs() == 0.5 {
                2.0 * (scaled / 2.0).round()
            } else {
                rounded
            };
            Ok(Scalar::Float(rounded / factor))
        }
    }
}

pub(crate) fn abs(value: &Scalar) -> Result<Scalar> {
    match value {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Int(v) => Ok(v
            .checked_abs()
            .map_or(Scalar::Float((*v as f64).abs()), Scalar::Int)),
        Scalar::Float(v) => Ok(Scalar::Float(v.abs())),
        Scalar::Bool(b) => Ok(Scalar::Int(i64::from(*b))),
        Scalar::Str(s) => Err(ExecError::type_error(format!(
            "bad operand for abs(): '{s}'"
        ))),
    }
}
