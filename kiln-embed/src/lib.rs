// kiln-embed - Embedding API for Kiln
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # kiln-embed
//!
//! A high-level embedding API for the Kiln scripting language.
//!
//! [`Engine`] wraps an incremental compiler and VM pair. Hosts hand it
//! syntax trees, read and write globals, call script functions and expose
//! native functions to scripts.
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln_ast::build::*;
//! use kiln_embed::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! let result = engine
//!     .eval(&program(vec![expr(add(int(1), int(2)))]))
//!     .unwrap();
//! assert_eq!(result, Value::Int(3));
//! ```
//!
//! ## Calling Script Functions
//!
//! ```rust
//! use kiln_ast::build::*;
//! use kiln_embed::{Engine, IntoValue};
//!
//! let mut engine = Engine::new();
//! engine
//!     .eval(&program(vec![func("square", &["n"], vec![ret(mul(ident("n"), ident("n")))])]))
//!     .unwrap();
//! let result = engine.call("square", vec![9i64.into_value()]).unwrap();
//! assert_eq!(result.to_string(), "81");
//! ```

mod convert;
mod engine;
mod error;

pub use convert::{FromValue, IntoValue, from_value, to_value};
pub use engine::{Engine, EngineBuilder};
pub use error::{Error, Result};

// Re-export VM types for convenience
pub use kiln_vm::{
    Builtins, CallContext, CancelHandle, CompileError, Context, CustomObject, ErrorValue,
    Interrupt, Limits, RuntimeError, StandardLimits, Value, VmConfig,
};
