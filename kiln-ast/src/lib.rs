// kiln-ast - Syntax tree contract for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Syntax tree types consumed by the Kiln compiler.
//!
//! Kiln does not ship a parser. A front end produces a [`Program`] from these
//! node types and hands it to `kiln_vm::Compiler`. The [`build`] module has
//! terse constructors for assembling trees by hand, which is how the test
//! suites and host tooling build programs.
//!
//! ```rust
//! use kiln_ast::build::*;
//!
//! // x := 2; x * 21
//! let program = program(vec![
//!     var("x", int(2)),
//!     expr(mul(ident("x"), int(21))),
//! ]);
//! assert_eq!(program.statements.len(), 2);
//! ```

pub mod build;
pub mod node;
pub mod ops;

pub use node::{
    AssignTarget, Block, Case, Expr, For, Fragment, Func, Param, Program, Statement,
};
pub use ops::{AssignOp, InfixOp, PostfixOp, PrefixOp, UnknownOperator};
