// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler: transforms the Kiln syntax tree to bytecode.
//!
//! Compilation is a single pass. Names are resolved through the
//! [`SymbolTable`] as they are met, and forward jumps are emitted with
//! placeholder deltas that are patched once the target is known.

pub mod codegen;
pub mod emit;
pub mod symbols;
pub mod types;

pub use codegen::{Compiler, MAX_ARGS};
pub use emit::BytecodeEmitter;
pub use symbols::{Resolution, Scope, ScopeId, ScopeKind, Symbol, SymbolTable};
pub use types::{CompileError, Result};
