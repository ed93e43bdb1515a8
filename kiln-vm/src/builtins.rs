// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Builtin registry and the context builtins are called with.
//!
//! The registry's order defines `LoadBuiltin` indices, so the compiler must
//! be given [`Builtins::names`] in the same order the VM sees them.

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::concurrency::{Chan, Thread};
use crate::context::Context;
use crate::object::{Builtin, Value};
use crate::vm::{Result, RuntimeError, Vm};

/// Host callables visible to scripts by name.
#[derive(Clone, Default)]
pub struct Builtins {
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native function. Re-registering a name replaces the
    /// function and keeps its index.
    pub fn register<F>(&mut self, name: &str, func: F) -> usize
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert(name, Value::builtin(Builtin::new(name, func)))
    }

    /// Register any value under a builtin name.
    pub fn insert(&mut self, name: &str, value: Value) -> usize {
        if let Some(&index) = self.index.get(name) {
            self.entries[index].1 = value;
            return index;
        }
        let index = self.entries.len();
        self.entries.push((name.to_string(), value));
        self.index.insert(name.to_string(), index);
        index
    }

    /// Add `spawn(f, args...)` and `chan(size = 0)`.
    pub fn with_concurrency(mut self) -> Self {
        self.register("spawn", |cx, args| {
            let Some((callee, rest)) = args.split_first() else {
                return Err(RuntimeError::argument_count("spawn", "at least 1", 0));
            };
            if !callee.is_callable() {
                return Ok(Value::type_error(format_args!(
                    "spawn() expected a callable (got {})",
                    callee.type_name()
                )));
            }
            Ok(Value::Thread(cx.spawn(callee, rest.to_vec())?))
        });
        self.register("chan", |_, args| {
            let size = match args {
                [] => 0,
                [Value::Int(n)] if *n >= 0 => *n as usize,
                [other] => {
                    return Ok(Value::type_error(format_args!(
                        "chan() expected a non-negative int (got {})",
                        other.inspect()
                    )));
                }
                _ => return Err(RuntimeError::argument_count("chan", "0 to 1", args.len())),
            };
            Ok(Value::Chan(Chan::new(size)))
        });
        self
    }

    /// Names in index order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, value)| value)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Builtins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// What a builtin can reach while it runs: the execution context and the
/// VM that called it.
pub struct CallContext<'a> {
    vm: &'a mut Vm,
    ctx: &'a Context,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(vm: &'a mut Vm, ctx: &'a Context) -> Self {
        Self { vm, ctx }
    }

    pub fn ctx(&self) -> &Context {
        self.ctx
    }

    /// Call back into script code.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        self.vm.call(self.ctx, callee, args)
    }

    /// Run `callee(args...)` on a new worker thread.
    pub fn spawn(&mut self, callee: &Value, args: Vec<Value>) -> Result<Thread> {
        debug!(callee = callee.type_name(), args = args.len(), "spawning thread");
        Thread::spawn(self.vm.fork(), self.ctx.clone(), callee.clone(), args)
    }
}

/// Fail with an argument count error unless exactly `expected` arguments
/// were passed.
pub fn check_arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(RuntimeError::argument_count(name, expected, args.len()));
    }
    Ok(())
}
