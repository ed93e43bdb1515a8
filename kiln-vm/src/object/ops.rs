// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Binary operators, ordering and negation.

use std::cmp::Ordering;

use super::{ErrorValue, Value};
use crate::opcode::BinaryOpType;

fn unsupported(left: &Value, op: BinaryOpType, right: &Value) -> Value {
    Value::type_error(format_args!(
        "unsupported operation for {}: {} on type {}",
        left.type_name(),
        op.symbol(),
        right.type_name()
    ))
}

fn division_by_zero() -> Value {
    Value::error("value error: division by zero")
}

fn int_op(op: BinaryOpType, a: i64, b: i64) -> Option<Value> {
    Some(match op {
        BinaryOpType::Add => Value::Int(a.wrapping_add(b)),
        BinaryOpType::Subtract => Value::Int(a.wrapping_sub(b)),
        BinaryOpType::Multiply => Value::Int(a.wrapping_mul(b)),
        BinaryOpType::Divide if b == 0 => division_by_zero(),
        BinaryOpType::Divide => Value::Int(a.wrapping_div(b)),
        BinaryOpType::Modulo if b == 0 => division_by_zero(),
        BinaryOpType::Modulo => Value::Int(a.wrapping_rem(b)),
        BinaryOpType::Xor => Value::Int(a ^ b),
        BinaryOpType::BitwiseAnd => Value::Int(a & b),
        BinaryOpType::BitwiseOr => Value::Int(a | b),
        BinaryOpType::Power => match u32::try_from(b) {
            Ok(exp) => Value::Int(a.wrapping_pow(exp)),
            Err(_) => Value::Float((a as f64).powf(b as f64)),
        },
        BinaryOpType::LShift | BinaryOpType::RShift => {
            let Ok(shift) = u32::try_from(b) else {
                return Some(Value::error("value error: negative shift count"));
            };
            if shift >= i64::BITS {
                return Some(Value::error("value error: shift count too large"));
            }
            if op == BinaryOpType::LShift {
                Value::Int(a << shift)
            } else {
                Value::Int(a >> shift)
            }
        }
        BinaryOpType::And | BinaryOpType::Or => return None,
    })
}

fn float_op(op: BinaryOpType, a: f64, b: f64) -> Option<Value> {
    Some(match op {
        BinaryOpType::Add => Value::Float(a + b),
        BinaryOpType::Subtract => Value::Float(a - b),
        BinaryOpType::Multiply => Value::Float(a * b),
        BinaryOpType::Divide => Value::Float(a / b),
        BinaryOpType::Modulo => Value::Float(a % b),
        BinaryOpType::Power => Value::Float(a.powf(b)),
        _ => return None,
    })
}

impl Value {
    /// Apply a binary operator with `self` on the left.
    ///
    /// Type mismatches and arithmetic faults return error values.
    pub fn run_operation(&self, op: BinaryOpType, right: &Value) -> Value {
        let result = match (self, right) {
            (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b),
            (Value::Int(a), Value::Float(b)) => float_op(op, *a as f64, *b),
            (Value::Float(a), Value::Int(b)) => float_op(op, *a, *b as f64),
            (Value::Float(a), Value::Float(b)) => float_op(op, *a, *b),
            (Value::String(a), Value::String(b)) if op == BinaryOpType::Add => {
                Some(Value::string(format!("{a}{b}")))
            }
            (Value::List(a), Value::List(b)) if op == BinaryOpType::Add => {
                let mut items = a.snapshot();
                items.append(b.snapshot());
                Some(Value::List(super::List::new(items)))
            }
            (Value::Bool(a), Value::Bool(b)) => match op {
                BinaryOpType::Xor => Some(Value::Bool(a ^ b)),
                BinaryOpType::BitwiseAnd => Some(Value::Bool(a & b)),
                BinaryOpType::BitwiseOr => Some(Value::Bool(a | b)),
                _ => None,
            },
            (Value::Custom(obj), _) => Some(obj.run_operation(op, right)),
            _ => None,
        };
        result.unwrap_or_else(|| unsupported(self, op, right))
    }

    /// Ordering for `<`, `<=`, `>` and `>=`.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ErrorValue> {
        let ordering = match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Custom(obj), _) => return obj.compare(other),
            _ => match (self.as_float(), other.as_float()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        };
        ordering.ok_or_else(|| {
            ErrorValue::type_error(format_args!(
                "unable to compare {} and {}",
                self.type_name(),
                other.type_name()
            ))
        })
    }

    /// Unary minus.
    pub fn negate(&self) -> Value {
        match self {
            Value::Int(n) => Value::Int(n.wrapping_neg()),
            Value::Float(f) => Value::Float(-f),
            other => Value::type_error(format_args!(
                "bad operand type for unary -: {}",
                other.type_name()
            )),
        }
    }
}
