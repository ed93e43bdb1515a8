// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames for the VM.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::code::Code;
use crate::object::{Cell, Function, Value};

/// Local slots kept inline before spilling to the heap.
pub const INLINE_LOCALS: usize = 8;

/// A call frame on the VM's call stack.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Instruction pointer (index into the code's words).
    pub ip: usize,

    /// The function being run. `None` for the program frame.
    pub function: Option<Arc<Function>>,

    pub code: Arc<Code>,

    pub locals: SmallVec<[Value; INLINE_LOCALS]>,

    /// Operand stack height when the frame was entered. Restored on return.
    pub stack_base: usize,

    /// Set for frames entered from the host. Returning from one ends the
    /// host's call instead of resuming a caller.
    pub entry: bool,
}

impl CallFrame {
    /// The frame that runs program code.
    pub fn program(code: Arc<Code>, ip: usize) -> Self {
        Self {
            ip,
            function: None,
            code,
            locals: SmallVec::new(),
            stack_base: 0,
            entry: true,
        }
    }

    /// A frame for a call to `function` with its arguments already bound
    /// to the first slots.
    pub fn call(function: Arc<Function>, mut locals: SmallVec<[Value; INLINE_LOCALS]>, stack_base: usize) -> Self {
        let code = function.code().clone();
        locals.resize(code.local_count().max(locals.len()), Value::Nil);
        Self {
            ip: 0,
            function: Some(function),
            code,
            locals,
            stack_base,
            entry: false,
        }
    }

    /// Captured cells of the active closure.
    pub fn cells(&self) -> &[Cell] {
        match &self.function {
            Some(function) => function.cells(),
            None => &[],
        }
    }
}
