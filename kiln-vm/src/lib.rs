// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and stack-based virtual machine for Kiln.
//!
//! A [`Compiler`] turns a `kiln_ast` syntax tree into [`Code`], and a [`Vm`]
//! executes it under a [`Context`] that carries cancellation, a deadline
//! and resource [`Limits`]. The compiler and VM are incremental: each new
//! batch compiled into the same program is appended, and the next run only
//! executes what was added.
//!
//! ```rust
//! use kiln_ast::build::*;
//! use kiln_vm::{Compiler, Context, Value, Vm};
//!
//! let code = Compiler::new()
//!     .compile(&program(vec![expr(mul(add(int(1), int(2)), int(3)))]))
//!     .unwrap();
//! let result = Vm::new().run(&Context::background(), &code).unwrap();
//! assert_eq!(result, Value::Int(9));
//! ```

pub mod builtins;
pub mod code;
pub mod compiler;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod limits;
pub mod object;
pub mod opcode;
pub mod vm;

pub use builtins::{Builtins, CallContext, check_arity};
pub use code::{Code, Instruction};
pub use compiler::{CompileError, Compiler};
pub use concurrency::{Chan, Thread};
pub use config::VmConfig;
pub use context::{CancelHandle, Context, Interrupt};
pub use limits::{LimitError, Limits, NoLimits, StandardLimits};
pub use object::{CustomObject, ErrorValue, Value};
pub use opcode::{BinaryOpType, CompareOpType, Op, Word};
pub use vm::{RuntimeError, Vm, VmState};
