// kiln-embed - Embedding errors
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Errors surfaced to the embedding host.

use kiln_vm::{CompileError, ErrorValue, RuntimeError, Value};

/// Result type for the embedding API.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(RuntimeError),

    /// A script finished with an error value, or a builtin raised one.
    #[error("script error: {0}")]
    Script(ErrorValue),

    #[error("conversion error: expected {expected}, got {got}")]
    Conversion { expected: &'static str, got: String },

    #[error("undefined global: {0}")]
    Undefined(String),
}

impl Error {
    /// A conversion error naming the value's type.
    pub fn conversion(expected: &'static str, value: &Value) -> Self {
        Error::Conversion {
            expected,
            got: value.type_name().to_string(),
        }
    }

    pub fn out_of_range(expected: &'static str, got: impl std::fmt::Display) -> Self {
        Error::Conversion {
            expected,
            got: got.to_string(),
        }
    }

    /// The error as a native function hands it back to the VM. Anything
    /// that is not already a runtime error aborts the run as a raised error.
    pub(crate) fn into_runtime(self) -> RuntimeError {
        match self {
            Error::Runtime(err) => err,
            Error::Script(err) => RuntimeError::Raised(err.into_raised()),
            other => RuntimeError::Raised(ErrorValue::raised(other.to_string())),
        }
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Raised(value) => Error::Script(value),
            other => Error::Runtime(other),
        }
    }
}
