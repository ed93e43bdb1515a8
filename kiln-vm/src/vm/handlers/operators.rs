// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Operator opcode handlers: BinaryOp, CompareOp, UnaryNegative, UnaryNot.

use std::cmp::Ordering;

use crate::object::Value;
use crate::opcode::{BinaryOpType, CompareOpType, Op, Word};
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    /// Execute an operator opcode.
    pub(crate) fn execute_operators(&mut self, op: Op, operand: Word) -> Result<()> {
        let result = match op {
            Op::BinaryOp => {
                let op = BinaryOpType::try_from(operand).map_err(|word| {
                    RuntimeError::Internal(format!("unknown binary operator {word}"))
                })?;
                let right = self.stack.pop()?;
                let left = self.stack.pop()?;
                binary_op(op, left, &right)
            }
            Op::CompareOp => {
                let op = CompareOpType::try_from(operand).map_err(|word| {
                    RuntimeError::Internal(format!("unknown comparison operator {word}"))
                })?;
                let right = self.stack.pop()?;
                let left = self.stack.pop()?;
                compare_op(op, &left, &right)
            }
            Op::UnaryNegative => self.stack.pop()?.negate(),
            Op::UnaryNot => Value::Bool(!self.stack.pop()?.is_truthy()),
            _ => {
                return Err(RuntimeError::Internal(format!(
                    "execute_operators: unexpected opcode {op}"
                )));
            }
        };
        self.stack.push(result)
    }
}

/// `And` and `Or` pick an operand by truthiness; everything else is the
/// left operand's business.
fn binary_op(op: BinaryOpType, left: Value, right: &Value) -> Value {
    match op {
        BinaryOpType::And if left.is_truthy() => right.clone(),
        BinaryOpType::And => left,
        BinaryOpType::Or if left.is_truthy() => left,
        BinaryOpType::Or => right.clone(),
        op => left.run_operation(op, right),
    }
}

fn compare_op(op: CompareOpType, left: &Value, right: &Value) -> Value {
    let ordering = match op {
        CompareOpType::Equal => return Value::Bool(left.equals(right)),
        CompareOpType::NotEqual => return Value::Bool(!left.equals(right)),
        _ => match left.compare(right) {
            Ok(ordering) => ordering,
            Err(err) => return Value::from(err),
        },
    };
    Value::Bool(match op {
        CompareOpType::LessThan => ordering == Ordering::Less,
        CompareOpType::LessThanOrEqual => ordering != Ordering::Greater,
        CompareOpType::GreaterThan => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}
