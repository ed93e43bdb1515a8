// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! First-class error values.

/// An error as scripts see it.
///
/// Most failures inside an expression (a type mismatch in an operator, an
/// out-of-range index) produce an unraised error value that flows through
/// the program as data. A raised error returned from a builtin aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ErrorValue {
    message: String,
    raised: bool,
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raised: false,
        }
    }

    /// An error that aborts execution when a builtin returns it.
    pub fn raised(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raised: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn into_raised(mut self) -> Self {
        self.raised = true;
        self
    }

    pub(crate) fn type_error(message: impl std::fmt::Display) -> Self {
        Self::new(format!("type error: {message}"))
    }
}
