// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Control flow opcode handlers: jumps, iteration, calls, partials and returns.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::builtins::CallContext;
use crate::context::Context;
use crate::object::{Function, Partial, Value};
use crate::opcode::{Op, Word};
use crate::vm::frame::CallFrame;
use crate::vm::{Result, RuntimeError, Vm, VmState};

/// What the dispatch loop does after an instruction.
#[derive(Debug)]
pub enum ControlFlow {
    /// Continue to the next instruction.
    Continue,
    /// The entry frame returned (or the VM halted) with this value.
    Return(Value),
}

/// Outcome of invoking a callable.
#[derive(Debug)]
pub(crate) enum Invoked {
    /// A host callable finished immediately.
    Value(Value),
    /// A frame was pushed and the dispatch loop has to run it.
    Frame,
}

impl Vm {
    /// Execute a control flow opcode.
    pub(crate) fn execute_control(
        &mut self,
        ctx: &Context,
        op: Op,
        start: usize,
        a: Word,
        b: Word,
    ) -> Result<ControlFlow> {
        match op {
            Op::Nop => {}
            Op::Halt => {
                let value = self.stack.pop().unwrap_or_default();
                debug!(frames = self.frames.len(), "halt");
                self.frames.clear();
                self.state = VmState::Halted;
                return Ok(ControlFlow::Return(value));
            }

            // Jump instructions
            Op::JumpForward => self.jump_to(start + a as usize)?,
            Op::JumpBackward => {
                let target = start
                    .checked_sub(a as usize)
                    .ok_or_else(|| RuntimeError::Internal("backward jump before code start".into()))?;
                self.jump_to(target)?;
            }
            Op::PopJumpForwardIfFalse => {
                if !self.stack.pop()?.is_truthy() {
                    self.jump_to(start + a as usize)?;
                }
            }
            Op::PopJumpForwardIfTrue => {
                if self.stack.pop()?.is_truthy() {
                    self.jump_to(start + a as usize)?;
                }
            }

            // Iteration
            Op::GetIter => {
                let value = self.stack.pop()?;
                let iter = value.iter().ok_or_else(|| {
                    RuntimeError::TypeError(format!("{} object is not iterable", value.type_name()))
                })?;
                self.stack.push(Value::Iter(iter))?;
            }
            Op::ForIter => {
                let Value::Iter(iter) = self.stack.peek(0)? else {
                    return Err(RuntimeError::Internal("FOR_ITER without an iterator".into()));
                };
                match iter.next_entry() {
                    Some((key, value)) => {
                        // The key ends up on top.
                        if b >= 2 {
                            self.stack.push(value)?;
                        }
                        if b >= 1 {
                            self.stack.push(key)?;
                        }
                    }
                    None => {
                        self.stack.pop()?;
                        self.jump_to(start + a as usize)?;
                    }
                }
            }

            // Function calls
            Op::Call => {
                let args = self.stack.pop_n(a as usize)?;
                let callee = self.stack.pop()?;
                if let Invoked::Value(value) = self.call_value(ctx, callee, args, false)? {
                    self.stack.push(value)?;
                }
            }
            Op::Partial => {
                let args = self.stack.pop_n(a as usize)?;
                let callee = self.stack.pop()?;
                self.stack
                    .push(Value::Partial(Arc::new(Partial::new(callee, args))))?;
            }
            Op::ReturnValue => {
                let value = if a == 0 {
                    Value::Nil
                } else {
                    self.stack.pop()?
                };
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| RuntimeError::Internal("return without a frame".into()))?;
                trace!(depth = self.frames.len(), "pop frame");
                self.stack.truncate(frame.stack_base);
                if frame.entry {
                    return Ok(ControlFlow::Return(value));
                }
                self.stack.push(value)?;
            }
            _ => {
                return Err(RuntimeError::Internal(format!(
                    "execute_control: unexpected opcode {op}"
                )));
            }
        }
        Ok(ControlFlow::Continue)
    }

    fn jump_to(&mut self, target: usize) -> Result<()> {
        let frame = self.frame_mut()?;
        if target > frame.code.len() {
            return Err(RuntimeError::Internal(format!(
                "jump target {target} is outside the code"
            )));
        }
        frame.ip = target;
        Ok(())
    }

    /// Invoke a callable with arguments in left-to-right order.
    ///
    /// Functions get a new frame marked `entry` when the host is the caller.
    /// Builtins run to completion here.
    pub(crate) fn call_value(
        &mut self,
        ctx: &Context,
        callee: Value,
        args: Vec<Value>,
        entry: bool,
    ) -> Result<Invoked> {
        if args.len() > self.config.arg_limit() {
            return Err(RuntimeError::TypeError(format!(
                "max arguments limit of {} exceeded (got {})",
                self.config.arg_limit(),
                args.len()
            )));
        }
        match callee {
            Value::Function(function) => {
                self.push_call_frame(function, args, entry)?;
                Ok(Invoked::Frame)
            }
            Value::Builtin(builtin) => {
                debug!(builtin = builtin.name(), args = args.len(), "calling builtin");
                let mut cx = CallContext::new(self, ctx);
                let value = builtin.call(&mut cx, &args)?;
                if let Value::Error(err) = &value {
                    if err.is_raised() {
                        return Err(RuntimeError::Raised((**err).clone()));
                    }
                }
                Ok(Invoked::Value(value))
            }
            Value::Partial(partial) => {
                let args = partial.expand(args);
                self.call_value(ctx, partial.callee().clone(), args, entry)
            }
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn push_call_frame(&mut self, function: Arc<Function>, args: Vec<Value>, entry: bool) -> Result<()> {
        if self.frames.len() >= self.config.frame_limit() {
            return Err(RuntimeError::StackOverflow);
        }
        let params = function.parameters().len();
        let required = function.required_args();
        let got = args.len();
        if got > params || got < required {
            let expected = if required == params {
                params.to_string()
            } else {
                format!("{required} to {params}")
            };
            return Err(RuntimeError::argument_count(
                function.name().unwrap_or("func"),
                expected,
                got,
            ));
        }

        let mut locals: SmallVec<[Value; 8]> = args.into_iter().collect();
        locals.extend(
            function.defaults()[got..]
                .iter()
                .map(|default| default.clone().unwrap_or_default()),
        );
        let mut frame = CallFrame::call(function.clone(), locals, self.stack.len());
        if function.code().is_named() && params < frame.locals.len() {
            frame.locals[params] = Value::Function(function);
        }
        frame.entry = entry;
        trace!(
            function = frame.function.as_ref().and_then(|f| f.name()).unwrap_or("<anonymous>"),
            depth = self.frames.len() + 1,
            "push frame"
        );
        self.frames.push(frame);
        Ok(())
    }
}
