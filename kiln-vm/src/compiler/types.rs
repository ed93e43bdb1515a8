// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared types for the bytecode compiler.

use crate::code::Code;

use super::symbols::ScopeId;

/// Error during compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("compile error: undefined variable {0:?}")]
    Undefined(String),
    #[error("compile error: variable {0:?} already exists")]
    DuplicateDeclaration(String),
    #[error("compile error: cannot assign to constant {0:?}")]
    AssignToConstant(String),
    #[error("compile error: the pipe operator requires at least two expressions")]
    PipeTooShort,
    #[error("compile error: invalid nested pipe")]
    NestedPipe,
    #[error("compile error: invalid return statement outside of a function")]
    ReturnOutsideFunction,
    #[error("compile error: invalid break statement outside of a loop")]
    BreakOutsideLoop,
    #[error("compile error: invalid continue statement outside of a loop")]
    ContinueOutsideLoop,
    #[error("compile error: unsupported default value for parameter {0:?}")]
    UnsupportedDefault(String),
    #[error("compile error: too many symbols")]
    TooManySymbols,
    #[error("compile error: number of constants exceeded limits")]
    TooManyConstants,
    #[error("compile error: max {what} limit of {limit} exceeded (got {got})")]
    TooManyArguments {
        what: &'static str,
        limit: usize,
        got: usize,
    },
    #[error("compile error: jump destination is too far away")]
    JumpTooFar,
    #[error("compile error: unsupported {0}")]
    Unsupported(String),
    #[error("compile error: internal: {0}")]
    Internal(String),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Pending jumps for one open loop.
#[derive(Debug, Default)]
pub struct Loop {
    /// `JumpForward` placeholders patched to the loop exit.
    pub breaks: Vec<usize>,
    /// `JumpForward` placeholders patched to the continue target.
    pub continues: Vec<usize>,
    /// Values the body currently holds on the operand stack (switch
    /// subjects) that a break or continue has to pop first.
    pub held: usize,
}

/// A function or program body being emitted.
#[derive(Debug)]
pub struct Unit {
    pub code: Code,
    /// Innermost open scope.
    pub scope: ScopeId,
    /// The function scope that owns this unit's slots.
    pub function_scope: ScopeId,
    pub loops: Vec<Loop>,
    /// Set while compiling the stages of a pipe.
    pub in_pipe: bool,
}

impl Unit {
    pub fn new(code: Code, scope: ScopeId) -> Self {
        Self {
            code,
            scope,
            function_scope: scope,
            loops: Vec::new(),
            in_pipe: false,
        }
    }
}
