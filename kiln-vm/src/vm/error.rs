// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime errors for the VM.

use crate::context::Interrupt;
use crate::limits::LimitError;
use crate::object::{ErrorValue, Value};

/// Fatal error during VM execution.
///
/// Failures a script can handle (a type mismatch in an operator, a bad
/// index) are not raised here: they come back as [`Value::Error`] data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("type error: object is not callable (got {0})")]
    NotCallable(&'static str),
    #[error("argument error: {name}() takes {expected} arguments ({got} given)")]
    ArgumentCount {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u16),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("{0}")]
    Raised(ErrorValue),
    #[error(transparent)]
    Limit(#[from] LimitError),
    #[error(transparent)]
    Interrupted(#[from] Interrupt),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    pub fn is_limit(&self) -> bool {
        matches!(self, RuntimeError::Limit(_))
    }

    /// The error as a script-visible value.
    pub fn to_value(&self) -> Value {
        match self {
            RuntimeError::Raised(err) => Value::from(err.clone()),
            other => Value::from(ErrorValue::raised(other.to_string())),
        }
    }

    pub(crate) fn argument_count(name: &str, expected: impl ToString, got: usize) -> Self {
        RuntimeError::ArgumentCount {
            name: name.to_string(),
            expected: expected.to_string(),
            got,
        }
    }
}

impl From<ErrorValue> for RuntimeError {
    fn from(err: ErrorValue) -> Self {
        RuntimeError::Raised(err.into_raised())
    }
}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
