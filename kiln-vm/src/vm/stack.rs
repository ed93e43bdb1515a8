// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Operand stack for the VM.

use crate::object::Value;

use super::{Result, RuntimeError};

/// The VM's operand stack, bounded by the configured maximum.
#[derive(Debug)]
pub struct ValueStack {
    values: Vec<Value>,
    limit: usize,
}

impl Default for ValueStack {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl ValueStack {
    /// Create an empty stack holding at most `limit` values.
    pub fn new(limit: usize) -> Self {
        Self {
            values: Vec::with_capacity(limit.min(256)),
            limit,
        }
    }

    #[inline]
    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.values.len() >= self.limit {
            return Err(RuntimeError::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// The value `distance` slots below the top.
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<&Value> {
        let len = self.values.len();
        len.checked_sub(distance + 1)
            .map(|at| &self.values[at])
            .ok_or(RuntimeError::StackUnderflow)
    }

    /// Swap the top with the value `distance` below it.
    pub fn swap(&mut self, distance: usize) -> Result<()> {
        if distance >= self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        let top = self.values.len() - 1;
        self.values.swap(top, top - distance);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn truncate(&mut self, size: usize) {
        self.values.truncate(size);
    }

    /// Pop n values, returned bottom first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let start = self
            .values
            .len()
            .checked_sub(n)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.values.drain(start..).collect())
    }
}
