// kiln-embed - Engine implementation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The Engine struct - main entry point for embedding Kiln.

use std::sync::Arc;

use kiln_ast::Program;
use kiln_vm::{Builtins, CallContext, Code, Compiler, Context, Value, Vm, VmConfig};
use tracing::debug;

use crate::convert::{FromValue, IntoValue};
use crate::error::{Error, Result};

/// The Kiln scripting engine.
///
/// An `Engine` owns a compiler and a VM that share one program: every
/// [`eval`](Engine::eval) appends a batch, so globals and functions declared
/// by earlier batches stay visible to later ones.
///
/// A script that finishes with an error value is reported as
/// [`Error::Script`], as is an error raised by a native function.
///
/// # Example
///
/// ```rust
/// use kiln_ast::build::*;
/// use kiln_embed::{Engine, Value};
///
/// let mut engine = Engine::new();
/// engine.eval(&program(vec![var("x", int(42))])).unwrap();
/// let result = engine.eval(&program(vec![expr(mul(ident("x"), int(2)))])).unwrap();
/// assert_eq!(result, Value::Int(84));
/// ```
pub struct Engine {
    compiler: Compiler,
    vm: Vm,
    builtins: Builtins,
    ctx: Context,
}

impl Engine {
    /// An engine with no builtins, default limits and a background context.
    pub fn new() -> Self {
        Engine {
            compiler: Compiler::new(),
            vm: Vm::new(),
            builtins: Builtins::new(),
            ctx: Context::background(),
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Compile and run a program.
    ///
    /// Returns the value of the last expression statement, or nil.
    ///
    /// # Errors
    ///
    /// - [`Error::Compile`] if the program does not compile; nothing runs
    /// - [`Error::Runtime`] if execution fails or is interrupted
    /// - [`Error::Script`] if the result is an error value or a native
    ///   function raised one
    pub fn eval(&mut self, program: &Program) -> Result<Value> {
        let code = self.compile(program)?;
        self.run(&code)
    }

    /// Compile a program without running it. The batch runs on the next
    /// [`run`](Engine::run) or [`eval`](Engine::eval).
    pub fn compile(&mut self, program: &Program) -> Result<Arc<Code>> {
        Ok(self.compiler.compile(program)?)
    }

    /// Run everything compiled since the last run.
    pub fn run(&mut self, code: &Arc<Code>) -> Result<Value> {
        let value = self.vm.run(&self.ctx, code)?;
        script_result(value)
    }

    /// Get a global by name.
    ///
    /// Returns `None` if no global of that name was declared. A declared
    /// global that was never assigned reads as nil.
    pub fn get(&self, name: &str) -> Option<Value> {
        let index = self.compiler.global_index(name)?;
        Some(self.vm.global(index as usize).unwrap_or(Value::Nil))
    }

    /// Get a global and convert it to a Rust type.
    ///
    /// ```rust
    /// use kiln_ast::build::*;
    /// use kiln_embed::Engine;
    ///
    /// let mut engine = Engine::new();
    /// engine.eval(&program(vec![var("name", string("kiln"))])).unwrap();
    /// let name: String = engine.get_as("name").unwrap();
    /// assert_eq!(name, "kiln");
    /// ```
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get(name)
            .ok_or_else(|| Error::Undefined(name.to_string()))?;
        T::from_value(&value)
    }

    /// Set a global, declaring it if needed. Scripts compiled afterwards
    /// can read it by name.
    pub fn set(&mut self, name: &str, value: impl IntoValue) -> Result<()> {
        let index = self.compiler.declare_global(name)?;
        self.vm.set_global(index as usize, value.into_value());
        Ok(())
    }

    /// Call a global function with already-converted arguments.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let callee = self
            .get(name)
            .ok_or_else(|| Error::Undefined(name.to_string()))?;
        let value = self.vm.call(&self.ctx, &callee, args)?;
        script_result(value)
    }

    /// Register a native function callable from scripts compiled afterwards.
    ///
    /// ```rust
    /// use kiln_ast::build::*;
    /// use kiln_embed::{Engine, Error, Value};
    ///
    /// let mut engine = Engine::new();
    /// engine
    ///     .register_native("double", |args| match args {
    ///         [Value::Int(n)] => Ok(Value::Int(n * 2)),
    ///         [other] => Err(Error::conversion("int", other)),
    ///         _ => Ok(Value::error("double() takes 1 argument")),
    ///     })
    ///     .unwrap();
    /// let result = engine
    ///     .eval(&program(vec![expr(call(ident("double"), vec![int(21)]))]))
    ///     .unwrap();
    /// assert_eq!(result, Value::Int(42));
    /// ```
    pub fn register_native<F>(&mut self, name: &str, func: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_builtin(name, move |_, args| func(args).map_err(Error::into_runtime))
    }

    /// Register a native function that can call back into the VM.
    pub fn register_builtin<F>(&mut self, name: &str, func: F) -> Result<()>
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> kiln_vm::vm::Result<Value>
            + Send
            + Sync
            + 'static,
    {
        let slot = self.compiler.add_builtin(name)?;
        let index = self.builtins.register(name, func);
        if usize::from(slot) != index {
            return Err(Error::Runtime(kiln_vm::RuntimeError::Internal(format!(
                "builtin {name:?} registered at {index}, compiled as {slot}"
            ))));
        }
        self.vm.set_builtins(self.builtins.clone());
        debug!(name, index, "registered native function");
        Ok(())
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Replace the context later runs and calls execute under.
    pub fn set_context(&mut self, ctx: Context) {
        self.ctx = ctx;
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn script_result(value: Value) -> Result<Value> {
    match value {
        Value::Error(err) => Err(Error::Script((*err).clone())),
        value => Ok(value),
    }
}

/// Configures an [`Engine`] before it compiles anything.
///
/// ```rust
/// use std::time::Duration;
/// use kiln_embed::{Context, Engine, VmConfig};
///
/// let engine = Engine::builder()
///     .config(VmConfig::default().max_frames(256))
///     .context(Context::background().with_timeout(Duration::from_secs(5)))
///     .concurrency()
///     .build()
///     .unwrap();
/// assert!(engine.context().remaining().is_some());
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: VmConfig,
    context: Option<Context>,
    builtins: Builtins,
    concurrency: bool,
}

impl EngineBuilder {
    pub fn config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(mut self, ctx: Context) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn builtins(mut self, builtins: Builtins) -> Self {
        self.builtins = builtins;
        self
    }

    /// Add the `spawn` and `chan` builtins.
    pub fn concurrency(mut self) -> Self {
        self.concurrency = true;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let builtins = if self.concurrency {
            self.builtins.with_concurrency()
        } else {
            self.builtins
        };
        let compiler = Compiler::with_builtins(builtins.names())?;
        let vm = Vm::with_config(self.config).with_builtins(builtins.clone());
        Ok(Engine {
            compiler,
            vm,
            builtins,
            ctx: self.context.unwrap_or_else(Context::background),
        })
    }
}
