// kiln-vm - Common test utilities
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared helpers for the VM integration tests.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

pub use kiln_ast::build::*;
pub use kiln_ast::{AssignOp, InfixOp, Statement};
pub use kiln_vm::{
    Builtins, CompileError, Compiler, Context, RuntimeError, Value, Vm, VmConfig,
};

/// Compile and run a program in a fresh compiler and VM.
pub fn try_run(statements: Vec<Statement>) -> Result<Value, RuntimeError> {
    try_run_with(Builtins::new(), &Context::background(), statements)
}

/// Compile and run a program, panicking on any error.
#[must_use]
pub fn run(statements: Vec<Statement>) -> Value {
    match try_run(statements) {
        Ok(value) => value,
        Err(err) => panic!("run failed: {err}"),
    }
}

/// Run with the given builtins and context.
pub fn try_run_with(
    builtins: Builtins,
    ctx: &Context,
    statements: Vec<Statement>,
) -> Result<Value, RuntimeError> {
    let mut compiler = Compiler::with_builtins(builtins.names()).expect("builtin names");
    let code = compiler
        .compile(&program(statements))
        .unwrap_or_else(|err| panic!("compile failed: {err}"));
    Vm::new().with_builtins(builtins).run(ctx, &code)
}

/// Run with the given VM configuration.
pub fn try_run_config(config: VmConfig, statements: Vec<Statement>) -> Result<Value, RuntimeError> {
    let code = Compiler::new()
        .compile(&program(statements))
        .unwrap_or_else(|err| panic!("compile failed: {err}"));
    Vm::with_config(config).run(&Context::background(), &code)
}

/// Compile a program that is expected not to compile.
#[must_use]
pub fn compile_err(statements: Vec<Statement>) -> CompileError {
    match Compiler::new().compile(&program(statements)) {
        Ok(code) => panic!("expected a compile error, compiled {} words", code.len()),
        Err(err) => err,
    }
}

/// A list of ints.
#[must_use]
pub fn ints(values: &[i64]) -> Value {
    Value::list(values.iter().map(|n| Value::Int(*n)))
}

/// Assert that a statement list evaluates to the expected value.
#[macro_export]
macro_rules! assert_run {
    ($statements:expr, $expected:expr) => {
        assert_eq!(run($statements), $expected);
    };
}
