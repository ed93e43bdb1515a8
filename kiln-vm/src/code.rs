// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compiled code objects: instructions, constants and names for one
//! function or program body.

use std::fmt;
use std::sync::Arc;

use crate::compiler::{CompileError, Result};
use crate::object::Value;
use crate::opcode::{Op, Word};

/// A body of compiled bytecode.
#[derive(Debug, Clone, Default)]
pub struct Code {
    name: Option<String>,
    source: Option<Arc<str>>,
    instructions: Vec<Word>,
    constants: Vec<Value>,
    /// Attribute names used by `LoadAttr` and `StoreAttr`.
    names: Vec<String>,
    local_count: usize,
    global_count: usize,
}

impl Code {
    pub(crate) fn new(name: Option<String>, source: Option<Arc<str>>) -> Self {
        Self {
            name,
            source,
            ..Self::default()
        }
    }

    /// Assemble code by hand.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kiln_vm::{Code, Op, Value};
    ///
    /// let code = Code::from_parts(
    ///     vec![Op::LoadConst.into(), 0, Op::ReturnValue.into(), 1],
    ///     vec![Value::Int(7)],
    /// );
    /// assert_eq!(code.len(), 4);
    /// ```
    pub fn from_parts(instructions: Vec<Word>, constants: Vec<Value>) -> Self {
        Self {
            instructions,
            constants,
            ..Self::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Identifier of the source this code was compiled from, if the host
    /// supplied one.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn instructions(&self) -> &[Word] {
        &self.instructions
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Local slots a frame running this code needs.
    pub fn local_count(&self) -> usize {
        self.local_count
    }

    /// Global slots declared so far. Only meaningful for program code.
    pub fn global_count(&self) -> usize {
        self.global_count
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Decode the instruction stream.
    ///
    /// Fails with the first word that is not an opcode.
    pub fn decode(&self) -> std::result::Result<Vec<Instruction>, Word> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.instructions.len() {
            let op = Op::try_from(self.instructions[offset])?;
            let end = (offset + 1 + op.operand_count()).min(self.instructions.len());
            out.push(Instruction {
                offset,
                op,
                operands: self.instructions[offset + 1..end].to_vec(),
            });
            offset = end;
        }
        Ok(out)
    }

    // =========================================================================
    // Emission (compiler only)
    // =========================================================================

    /// Append an instruction and return its offset.
    pub(crate) fn emit(&mut self, op: Op, operands: &[Word]) -> usize {
        debug_assert_eq!(operands.len(), op.operand_count(), "{op} operand count");
        let pos = self.instructions.len();
        self.instructions.push(op.into());
        self.instructions.extend_from_slice(operands);
        pos
    }

    /// Overwrite one word in place. Used for backpatching jumps.
    pub(crate) fn set_word(&mut self, pos: usize, word: Word) {
        self.instructions[pos] = word;
    }

    /// Add a constant, reusing an existing slot for equal scalars.
    pub(crate) fn add_constant(&mut self, value: Value) -> Result<Word> {
        if let Some(pos) = self
            .constants
            .iter()
            .position(|existing| same_scalar(existing, &value))
        {
            return Ok(pos as Word);
        }
        let index = Word::try_from(self.constants.len()).map_err(|_| CompileError::TooManyConstants)?;
        self.constants.push(value);
        Ok(index)
    }

    pub(crate) fn add_name(&mut self, name: &str) -> Result<Word> {
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            return Ok(pos as Word);
        }
        let index = Word::try_from(self.names.len()).map_err(|_| CompileError::TooManyConstants)?;
        self.names.push(name.to_string());
        Ok(index)
    }

    pub(crate) fn set_local_count(&mut self, count: usize) {
        self.local_count = count;
    }

    pub(crate) fn set_global_count(&mut self, count: usize) {
        self.global_count = count;
    }

    /// Drop everything emitted after `len` words and `constants` constants.
    pub(crate) fn truncate(&mut self, len: usize, constants: usize, names: usize) {
        self.instructions.truncate(len);
        self.constants.truncate(constants);
        self.names.truncate(names);
    }
}

/// Scalars are interchangeable when equal; floats compare by bits so `0.0`
/// and `-0.0` keep separate slots.
fn same_scalar(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub op: Op,
    pub operands: Vec<Word>,
}

impl Instruction {
    pub fn new(offset: usize, op: Op, operands: &[Word]) -> Self {
        Self {
            offset,
            op,
            operands: operands.to_vec(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04} {}", self.offset, self.op)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}
