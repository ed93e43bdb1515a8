// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing Kiln bytecode.

pub mod error;
pub mod frame;
pub mod handlers;
pub mod stack;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::builtins::Builtins;
use crate::code::Code;
use crate::config::VmConfig;
use crate::context::Context;
use crate::object::Value;
use crate::opcode::{Op, Word};

pub use crate::builtins::CallContext;
pub use error::{Result, RuntimeError};
pub use frame::CallFrame;
pub use handlers::control::ControlFlow;
pub use stack::ValueStack;

/// Global slots, shared between a VM and the workers it spawns.
pub type Globals = Arc<RwLock<Vec<Value>>>;

/// Lifecycle of a [`Vm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Created, nothing run yet.
    Ready,
    Running,
    /// The last run or call finished normally.
    Returned,
    /// The last run executed `Halt`.
    Halted,
    /// The last run or call failed.
    Errored,
}

/// The Kiln virtual machine.
///
/// A VM is tied to one program: each [`Vm::run`] executes the program code
/// from where the previous run stopped, so a host can keep appending
/// batches through the same [`Compiler`](crate::Compiler) and only the new
/// instructions execute. Globals persist across runs.
///
/// # Example
///
/// ```rust
/// use kiln_ast::build::*;
/// use kiln_vm::{Compiler, Context, Value, Vm};
///
/// let mut compiler = Compiler::new();
/// let mut vm = Vm::new();
/// let ctx = Context::background();
///
/// let code = compiler.compile(&program(vec![var("x", int(40))])).unwrap();
/// vm.run(&ctx, &code).unwrap();
///
/// let code = compiler.compile(&program(vec![expr(add(ident("x"), int(2)))])).unwrap();
/// assert_eq!(vm.run(&ctx, &code).unwrap(), Value::Int(42));
/// ```
#[derive(Debug)]
pub struct Vm {
    config: VmConfig,

    /// Operand stack.
    stack: ValueStack,

    /// Call frame stack.
    frames: Vec<CallFrame>,

    globals: Globals,

    builtins: Arc<Builtins>,

    /// Offset in the program code that the next run starts from.
    main_ip: usize,

    state: VmState,

    /// Instructions executed, for spacing out deadline checks.
    ticks: u32,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Create a new VM.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            stack: ValueStack::new(config.stack_limit()),
            frames: Vec::new(),
            globals: Arc::new(RwLock::new(Vec::new())),
            builtins: Arc::new(Builtins::new()),
            main_ip: 0,
            state: VmState::Ready,
            ticks: 0,
        }
    }

    /// Replace the builtin registry. Its order must match the names the
    /// compiler was given.
    pub fn with_builtins(mut self, builtins: impl Into<Arc<Builtins>>) -> Self {
        self.builtins = builtins.into();
        self
    }

    /// Swap the builtin registry between runs.
    pub fn set_builtins(&mut self, builtins: impl Into<Arc<Builtins>>) {
        self.builtins = builtins.into();
    }

    /// A VM for a worker thread: same globals, builtins and configuration,
    /// empty stacks.
    pub(crate) fn fork(&self) -> Self {
        Self {
            config: self.config,
            stack: ValueStack::new(self.config.stack_limit()),
            frames: Vec::new(),
            globals: self.globals.clone(),
            builtins: self.builtins.clone(),
            main_ip: 0,
            state: VmState::Ready,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// Offset in the program code the next run starts from.
    pub fn main_ip(&self) -> usize {
        self.main_ip
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Run the program code from where the last run stopped to its end.
    ///
    /// On success the result is also left as the only value on the operand
    /// stack. A failed run still advances past the batch, so the next batch
    /// starts at its own instructions.
    #[tracing::instrument(level = "debug", skip_all, fields(from = self.main_ip, to = code.len()))]
    pub fn run(&mut self, ctx: &Context, code: &Arc<Code>) -> Result<Value> {
        if self.state == VmState::Running {
            return Err(RuntimeError::Internal("vm is already running".into()));
        }
        let start = if self.main_ip > code.len() {
            0
        } else {
            self.main_ip
        };
        self.stack.truncate(0);
        self.frames.clear();
        self.ensure_globals(code.global_count());
        self.frames.push(CallFrame::program(code.clone(), start));
        self.state = VmState::Running;

        let result = self.run_loop(ctx);
        self.main_ip = code.len();
        self.frames.clear();
        self.stack.truncate(0);
        match result {
            Ok(value) => {
                if self.state != VmState::Halted {
                    self.state = VmState::Returned;
                }
                self.stack.push(value.clone())?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "run failed");
                self.state = VmState::Errored;
                self.stack.push(Value::Nil)?;
                Err(err)
            }
        }
    }

    /// Call any callable from the host.
    ///
    /// Works both on an idle VM and from inside a builtin while a run is in
    /// progress.
    pub fn call(&mut self, ctx: &Context, callee: &Value, args: Vec<Value>) -> Result<Value> {
        let nested = self.state == VmState::Running;
        let depth = self.frames.len();
        let base = self.stack.len();
        self.state = VmState::Running;

        let result = match self.call_value(ctx, callee.clone(), args, true) {
            Ok(handlers::control::Invoked::Value(value)) => Ok(value),
            Ok(handlers::control::Invoked::Frame) => self.run_loop(ctx),
            Err(err) => Err(err),
        };
        if result.is_err() {
            self.frames.truncate(depth);
            self.stack.truncate(base);
        }
        if nested {
            if self.state == VmState::Halted {
                return result;
            }
            self.state = VmState::Running;
        } else if self.state != VmState::Halted {
            self.state = if result.is_ok() {
                VmState::Returned
            } else {
                VmState::Errored
            };
        }
        result
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Top of the operand stack.
    pub fn tos(&self) -> Option<Value> {
        self.stack.peek(0).ok().cloned()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn global(&self, index: usize) -> Option<Value> {
        self.globals.read().get(index).cloned()
    }

    /// Set a global slot, growing the global table if needed.
    pub fn set_global(&mut self, index: usize, value: Value) {
        let mut globals = self.globals.write();
        if index >= globals.len() {
            globals.resize(index + 1, Value::Nil);
        }
        globals[index] = value;
    }

    pub fn global_count(&self) -> usize {
        self.globals.read().len()
    }

    fn ensure_globals(&self, count: usize) {
        let mut globals = self.globals.write();
        if globals.len() < count {
            globals.resize(count, Value::Nil);
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Execute until the entry frame returns.
    fn run_loop(&mut self, ctx: &Context) -> Result<Value> {
        let interval = self.config.check_interval();
        loop {
            ctx.check_cancelled()?;
            self.ticks = self.ticks.wrapping_add(1);
            if self.ticks % interval == 0 {
                ctx.check_deadline()?;
            }

            // A halt clears every frame, including those of enclosing calls.
            let Some(frame) = self.frames.last_mut() else {
                return Ok(self.stack.pop().unwrap_or_default());
            };
            let instructions = frame.code.instructions();
            if frame.ip >= instructions.len() {
                if let Some(function) = &frame.function {
                    return Err(RuntimeError::Internal(format!(
                        "function {} ran past its code",
                        function.name().unwrap_or("<anonymous>")
                    )));
                }
                // The program frame ends by falling off its code.
                let base = frame.stack_base;
                self.frames.pop();
                let value = if self.stack.len() > base {
                    self.stack.pop()?
                } else {
                    Value::Nil
                };
                self.stack.truncate(base);
                return Ok(value);
            }

            let start = frame.ip;
            let op = Op::try_from(instructions[start]).map_err(RuntimeError::UnknownOpcode)?;
            let count = op.operand_count();
            let mut operands: [Word; 2] = [0; 2];
            let end = start + 1 + count;
            let Some(words) = instructions.get(start + 1..end) else {
                return Err(RuntimeError::Internal(format!(
                    "{op} at {start} is missing operands"
                )));
            };
            operands[..count].copy_from_slice(words);
            frame.ip = end;

            match self.execute(ctx, op, start, operands)? {
                ControlFlow::Continue => {}
                ControlFlow::Return(value) => return Ok(value),
            }
        }
    }

    fn execute(&mut self, ctx: &Context, op: Op, start: usize, operands: [Word; 2]) -> Result<ControlFlow> {
        let [a, b] = operands;
        match op {
            // Stack - handled inline
            Op::PopTop => {
                self.stack.pop()?;
            }
            Op::Copy => {
                let value = self.stack.peek(a as usize)?.clone();
                self.stack.push(value)?;
            }
            Op::Swap => self.stack.swap(a as usize)?,
            Op::Nil => self.stack.push(Value::Nil)?,
            Op::True => self.stack.push(Value::Bool(true))?,
            Op::False => self.stack.push(Value::Bool(false))?,

            // Variables - delegated to handler
            Op::LoadFast
            | Op::LoadFree
            | Op::LoadGlobal
            | Op::LoadConst
            | Op::LoadBuiltin
            | Op::LoadAttr
            | Op::StoreFast
            | Op::StoreFree
            | Op::StoreGlobal
            | Op::StoreAttr
            | Op::MakeCell
            | Op::LoadClosure => self.execute_variables(op, a, b)?,

            // Control flow - delegated to handler
            Op::Nop
            | Op::Halt
            | Op::Call
            | Op::ReturnValue
            | Op::JumpForward
            | Op::JumpBackward
            | Op::PopJumpForwardIfFalse
            | Op::PopJumpForwardIfTrue
            | Op::GetIter
            | Op::ForIter
            | Op::Partial => return self.execute_control(ctx, op, start, a, b),

            // Operators - delegated to handler
            Op::BinaryOp | Op::CompareOp | Op::UnaryNegative | Op::UnaryNot => {
                self.execute_operators(op, a)?
            }

            // Containers - delegated to handler
            Op::BuildList
            | Op::BuildMap
            | Op::BuildSet
            | Op::BuildString
            | Op::BinarySubscr
            | Op::StoreSubscr
            | Op::ContainsOp
            | Op::Length
            | Op::Slice
            | Op::Unpack => self.execute_collections(ctx, op, a)?,
        }
        Ok(ControlFlow::Continue)
    }

    fn frame(&self) -> Result<&CallFrame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::Internal("no active frame".into()))
    }

    fn frame_mut(&mut self) -> Result<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::Internal("no active frame".into()))
    }

    fn constant(&self, index: Word) -> Result<Value> {
        self.frame()?
            .code
            .constants()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::Internal(format!("constant {index} out of range")))
    }

    fn name(&self, index: Word) -> Result<String> {
        self.frame()?
            .code
            .names()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::Internal(format!("name {index} out of range")))
    }
}
