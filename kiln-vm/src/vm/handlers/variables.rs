// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Variable opcode handlers: loads, stores, attributes and closure creation.

use std::sync::Arc;

use crate::object::{Cell, Value};
use crate::opcode::{Op, Word};
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    /// Execute a variable opcode.
    pub(crate) fn execute_variables(&mut self, op: Op, a: Word, b: Word) -> Result<()> {
        match op {
            Op::LoadConst => {
                let value = self.constant(a)?;
                self.stack.push(value)?;
            }
            Op::LoadFast => {
                let value = match self.local(a)? {
                    Value::Cell(cell) => cell.get(),
                    other => other.clone(),
                };
                self.stack.push(value)?;
            }
            Op::StoreFast => {
                let value = self.stack.pop()?;
                let slot = self.local_mut(a)?;
                match slot {
                    Value::Cell(cell) => cell.set(value),
                    _ => *slot = value,
                }
            }
            Op::LoadFree => {
                let value = self.cell(a)?.get();
                self.stack.push(value)?;
            }
            Op::StoreFree => {
                let value = self.stack.pop()?;
                self.cell(a)?.set(value);
            }
            Op::LoadGlobal => {
                let value = self.globals.read().get(a as usize).cloned().unwrap_or_default();
                self.stack.push(value)?;
            }
            Op::StoreGlobal => {
                let value = self.stack.pop()?;
                self.set_global(a as usize, value);
            }
            Op::LoadBuiltin => {
                let value = self
                    .builtins
                    .get(a as usize)
                    .cloned()
                    .ok_or_else(|| RuntimeError::Internal(format!("builtin {a} is not registered")))?;
                self.stack.push(value)?;
            }
            Op::LoadAttr => {
                let name = self.name(a)?;
                let object = self.stack.pop()?;
                let value = object.get_attr(&name).ok_or_else(|| {
                    RuntimeError::TypeError(format!(
                        "attribute {name:?} not found on {} object",
                        object.type_name()
                    ))
                })?;
                self.stack.push(value)?;
            }
            Op::StoreAttr => {
                let name = self.name(a)?;
                let object = self.stack.pop()?;
                let value = self.stack.pop()?;
                object.set_attr(&name, value)?;
            }
            Op::MakeCell => {
                let cell = match b {
                    0 => {
                        let slot = self.local_mut(a)?;
                        match slot {
                            Value::Cell(cell) => cell.clone(),
                            other => {
                                let cell = Cell::new(std::mem::take(other));
                                *other = Value::Cell(cell.clone());
                                cell
                            }
                        }
                    }
                    1 => self.cell(a)?.clone(),
                    other => {
                        return Err(RuntimeError::Internal(format!(
                            "invalid cell source {other}"
                        )));
                    }
                };
                self.stack.push(Value::Cell(cell))?;
            }
            Op::LoadClosure => {
                let Value::Function(function) = self.constant(a)? else {
                    return Err(RuntimeError::Internal(format!(
                        "constant {a} is not a function"
                    )));
                };
                let cells = self
                    .stack
                    .pop_n(b as usize)?
                    .into_iter()
                    .map(|value| match value {
                        Value::Cell(cell) => Ok(cell),
                        other => Err(RuntimeError::Internal(format!(
                            "expected a cell, found {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.stack
                    .push(Value::Function(Arc::new(function.with_cells(cells))))?;
            }
            _ => {
                return Err(RuntimeError::Internal(format!(
                    "execute_variables: unexpected opcode {op}"
                )));
            }
        }
        Ok(())
    }

    fn local(&self, slot: Word) -> Result<&Value> {
        self.frame()?
            .locals
            .get(slot as usize)
            .ok_or_else(|| RuntimeError::Internal(format!("local slot {slot} out of range")))
    }

    fn local_mut(&mut self, slot: Word) -> Result<&mut Value> {
        self.frame_mut()?
            .locals
            .get_mut(slot as usize)
            .ok_or_else(|| RuntimeError::Internal(format!("local slot {slot} out of range")))
    }

    fn cell(&self, index: Word) -> Result<&Cell> {
        self.frame()?
            .cells()
            .get(index as usize)
            .ok_or_else(|| RuntimeError::Internal(format!("free variable {index} out of range")))
    }
}
