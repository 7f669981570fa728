// fable-vm - Binary operators over dynamic values
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Binary operators with their implicit coercion rules.
//!
//! When operand types differ, exactly one side is coerced before the
//! operator applies. The rule is asymmetric: a Double on the left with an
//! Integer on the right coerces the right side up (so `Double + Integer`
//! stays Double), otherwise the left side is converted to the right side's
//! type (so `String + Integer` concatenates). `+` additionally keeps the
//! left side when it is a String.

use crate::error::{Result, RuntimeError};
use crate::value::{Value, ValueKind};

/// A binary operator the VM can apply to two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Gte => ">=",
            BinaryOp::Lte => "<=",
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Neq)
    }
}

impl Value {
    /// Apply a binary operator, coercing operands as described in the
    /// module documentation. Comparison results are pushed as `Integer`
    /// 0 or 1.
    pub fn binary(&self, op: BinaryOp, rhs: &Value) -> Result<Value> {
        // Undefined only ever takes part in equality, where it compares
        // equal to itself and unequal to everything else.
        if op.is_equality() {
            let lhs_undef = self.kind() == ValueKind::Undefined;
            let rhs_undef = rhs.kind() == ValueKind::Undefined;
            if lhs_undef || rhs_undef {
                let equal = lhs_undef && rhs_undef;
                return Ok(Value::from_bool(equal == (op == BinaryOp::Eq)));
            }
        }

        if self.kind() != rhs.kind() {
            let keep_lhs = match op {
                BinaryOp::Add => {
                    self.kind() == ValueKind::String
                        || (self.kind() == ValueKind::Double && rhs.kind() == ValueKind::Integer)
                }
                _ => self.kind() == ValueKind::Double && rhs.kind() == ValueKind::Integer,
            };
            return if keep_lhs {
                self.binary(op, &rhs.convert(self.kind())?)
            } else {
                self.convert(rhs.kind())?.binary(op, rhs)
            };
        }

        let fail = || RuntimeError::InvalidOperator {
            op: op.symbol(),
            ty: self.type_name(),
        };

        match (self, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Self::integer_op(op, *a, *b),
            (Value::Double(a), Value::Double(b)) => Self::double_op(op, *a, *b).ok_or_else(fail),
            (Value::String(a), Value::String(b)) => Self::string_op(op, a, b).ok_or_else(fail),
            _ => Err(fail()),
        }
    }

    fn integer_op(op: BinaryOp, a: i32, b: i32) -> Result<Value> {
        let value = match op {
            BinaryOp::Add => Value::Integer(a.wrapping_add(b)),
            BinaryOp::Sub => Value::Integer(a.wrapping_sub(b)),
            BinaryOp::Mul => Value::Integer(a.wrapping_mul(b)),
            BinaryOp::Div | BinaryOp::Mod => {
                if b == 0 {
                    return Err(RuntimeError::InvalidOperator {
                        op: op.symbol(),
                        ty: "Integer",
                    });
                }
                if op == BinaryOp::Div {
                    Value::Integer(a.wrapping_div(b))
                } else {
                    Value::Integer(a.wrapping_rem(b))
                }
            }
            BinaryOp::Eq => Value::from_bool(a == b),
            BinaryOp::Neq => Value::from_bool(a != b),
            BinaryOp::Gt => Value::from_bool(a > b),
            BinaryOp::Lt => Value::from_bool(a < b),
            BinaryOp::Gte => Value::from_bool(a >= b),
            BinaryOp::Lte => Value::from_bool(a <= b),
        };
        Ok(value)
    }

    fn double_op(op: BinaryOp, a: f64, b: f64) -> Option<Value> {
        let value = match op {
            BinaryOp::Add => Value::Double(a + b),
            BinaryOp::Sub => Value::Double(a - b),
            BinaryOp::Mul => Value::Double(a * b),
            BinaryOp::Div => Value::Double(a / b),
            BinaryOp::Mod => return None,
            BinaryOp::Eq => Value::from_bool(a == b),
            BinaryOp::Neq => Value::from_bool(a != b),
            BinaryOp::Gt => Value::from_bool(a > b),
            BinaryOp::Lt => Value::from_bool(a < b),
            BinaryOp::Gte => Value::from_bool(a >= b),
            BinaryOp::Lte => Value::from_bool(a <= b),
        };
        Some(value)
    }

    fn string_op(op: BinaryOp, a: &str, b: &str) -> Option<Value> {
        let value = match op {
            BinaryOp::Add => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Value::String(s)
            }
            BinaryOp::Eq => Value::from_bool(a == b),
            BinaryOp::Neq => Value::from_bool(a != b),
            _ => return None,
        };
        Some(value)
    }
}
