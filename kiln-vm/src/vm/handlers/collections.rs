// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Container opcode handlers: builders, subscripts, membership, slicing
//! and unpacking.

use std::sync::Arc;

use crate::context::Context;
use crate::object::Value;
use crate::opcode::{Op, Word};
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    /// Execute a container opcode.
    pub(crate) fn execute_collections(&mut self, ctx: &Context, op: Op, n: Word) -> Result<()> {
        let n = n as usize;
        match op {
            Op::BuildList => {
                let items = self.stack.pop_n(n)?;
                self.push_built(ctx, Value::list(items))?;
            }
            Op::BuildMap => {
                let flat = self.stack.pop_n(n * 2)?;
                let mut entries: Vec<(Arc<str>, Value)> = Vec::with_capacity(n);
                let mut flat = flat.into_iter();
                while let (Some(key), Some(value)) = (flat.next(), flat.next()) {
                    let Value::String(key) = key else {
                        return Err(RuntimeError::TypeError(format!(
                            "map keys must be strings (got {})",
                            key.type_name()
                        )));
                    };
                    entries.push((key, value));
                }
                self.push_built(ctx, Value::map(entries))?;
            }
            Op::BuildSet => {
                let items = self.stack.pop_n(n)?;
                let set = Value::set(items)?;
                self.push_built(ctx, set)?;
            }
            Op::BuildString => {
                let parts = self.stack.pop_n(n)?;
                let text: String = parts.iter().map(Value::render).collect();
                self.push_built(ctx, Value::string(text))?;
            }
            Op::BinarySubscr => {
                let index = self.stack.pop()?;
                let object = self.stack.pop()?;
                self.stack.push(object.get_item(&index))?;
            }
            Op::StoreSubscr => {
                let index = self.stack.pop()?;
                let object = self.stack.pop()?;
                let value = self.stack.pop()?;
                object.set_item(&index, value)?;
            }
            Op::ContainsOp => {
                let item = self.stack.pop()?;
                let container = self.stack.pop()?;
                let result = match container.contains(&item) {
                    Value::Bool(found) => Value::Bool(found != (n != 0)),
                    other => other,
                };
                self.stack.push(result)?;
            }
            Op::Length => {
                let value = self.stack.pop()?;
                self.stack.push(value.len())?;
            }
            Op::Slice => {
                let from = self.stack.pop()?;
                let to = self.stack.pop()?;
                let object = self.stack.pop()?;
                self.stack.push(object.slice(&from, &to))?;
            }
            Op::Unpack => {
                let value = self.stack.pop()?;
                let items = value.to_items().ok_or_else(|| {
                    RuntimeError::TypeError(format!("cannot unpack {} object", value.type_name()))
                })?;
                if items.len() != n {
                    return Err(RuntimeError::TypeError(format!(
                        "unpack count mismatch: expected {n} values (got {})",
                        items.len()
                    )));
                }
                for item in items {
                    self.stack.push(item)?;
                }
            }
            _ => {
                return Err(RuntimeError::Internal(format!(
                    "execute_collections: unexpected opcode {op}"
                )));
            }
        }
        Ok(())
    }

    /// Charge the cost of a freshly built value, then push it.
    fn push_built(&mut self, ctx: &Context, value: Value) -> Result<()> {
        ctx.limits().track_cost(value.cost())?;
        self.stack.push(value)
    }
}
