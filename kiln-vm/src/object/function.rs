// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Callables and the captured-variable cell.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Value;
use crate::code::Code;
use crate::vm::{CallContext, Result};

// ============================================================================
// Cell
// ============================================================================

/// A shared, mutable single-slot box for a captured variable.
///
/// The defining frame and every closure that captures the variable hold the
/// same cell, so a write through any of them is seen by all of them.
///
/// Cells are mutex-guarded so a closure handed to a spawned worker stays
/// memory safe. Each `get` and `set` is atomic on its own; a
/// read-modify-write such as `x += 1` is two operations and can interleave
/// with another worker.
#[derive(Clone, Default)]
pub struct Cell(Arc<Mutex<Value>>);

impl Cell {
    pub fn new(value: Value) -> Self {
        Cell(Arc::new(Mutex::new(value)))
    }

    pub fn get(&self) -> Value {
        self.0.lock().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.lock() = value;
    }

    /// True if both handles refer to the same box.
    pub fn ptr_eq(&self, other: &Cell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell({:?})", self.get())
    }
}

// ============================================================================
// Function
// ============================================================================

/// A compiled function.
///
/// The compiler stores one of these as a constant. A closure is the same
/// function paired with the cells it captured; `LoadClosure` builds it at
/// runtime with [`Function::with_cells`].
#[derive(Clone)]
pub struct Function {
    name: Option<String>,
    parameters: Vec<String>,
    defaults: Vec<Option<Value>>,
    code: Arc<Code>,
    cells: Vec<Cell>,
}

impl Function {
    /// `defaults` is positional and padded to the parameter count.
    pub fn new(
        name: Option<String>,
        parameters: Vec<String>,
        mut defaults: Vec<Option<Value>>,
        code: Arc<Code>,
    ) -> Self {
        defaults.resize(parameters.len(), None);
        Self {
            name,
            parameters,
            defaults,
            code,
            cells: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn defaults(&self) -> &[Option<Value>] {
        &self.defaults
    }

    pub fn code(&self) -> &Arc<Code> {
        &self.code
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_closure(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Arguments a call has to supply: everything up to and including the
    /// last parameter without a default.
    pub fn required_args(&self) -> usize {
        self.defaults
            .iter()
            .rposition(Option::is_none)
            .map_or(0, |i| i + 1)
    }

    /// A copy of this function bound to the given captured cells.
    pub fn with_cells(&self, cells: Vec<Cell>) -> Self {
        Self {
            cells,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "func {}({})",
            self.name.as_deref().unwrap_or(""),
            self.parameters.join(", ")
        )
    }
}

// ============================================================================
// Builtin
// ============================================================================

/// Signature of host functions callable from scripts.
///
/// Returning `Ok(Value::Error(..))` hands the script an error value. A raised
/// error value, or `Err`, aborts the run.
pub type NativeFn = dyn Fn(&mut CallContext<'_>, &[Value]) -> Result<Value> + Send + Sync;

/// A named host function.
#[derive(Clone)]
pub struct Builtin {
    name: String,
    func: Arc<NativeFn>,
}

impl Builtin {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, cx: &mut CallContext<'_>, args: &[Value]) -> Result<Value> {
        (self.func)(cx, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "builtin({})", self.name)
    }
}

// ============================================================================
// Partial
// ============================================================================

/// A callable with trailing arguments already bound.
///
/// Calling a partial with `args` calls the wrapped callable with `args`
/// followed by the bound arguments. Pipe stages written as calls compile to
/// partials so the piped value lands in the first position.
#[derive(Debug, Clone)]
pub struct Partial {
    callee: Value,
    args: Vec<Value>,
}

impl Partial {
    pub fn new(callee: Value, args: Vec<Value>) -> Self {
        Self { callee, args }
    }

    pub fn callee(&self) -> &Value {
        &self.callee
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The full argument list for a call with `leading` arguments.
    pub fn expand(&self, leading: Vec<Value>) -> Vec<Value> {
        let mut all = leading;
        all.extend(self.args.iter().cloned());
        all
    }
}
