// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Threads and channels for scripts.
//!
//! A spawned thread runs a forked VM that shares globals and builtins with
//! its parent. Every blocking operation polls the execution context, so
//! cancelling a context unblocks waits, sends and receives alike.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::context::Context;
use crate::object::{ErrorValue, Value};
use crate::vm::{Result, RuntimeError, Vm};

const POLL: Duration = Duration::from_millis(10);

// =============================================================================
// Thread
// =============================================================================

struct ThreadInner {
    done: Receiver<Result<Value>>,
    outcome: Mutex<Option<Result<Value>>>,
}

/// Handle to a script function running on its own OS thread.
#[derive(Clone)]
pub struct Thread(Arc<ThreadInner>);

impl Thread {
    /// Start `callee(args...)` on `vm`, a VM forked from the caller's.
    pub(crate) fn spawn(mut vm: Vm, ctx: Context, callee: Value, args: Vec<Value>) -> Result<Self> {
        let (tx, rx) = channel::bounded(1);
        std::thread::Builder::new()
            .name("kiln-worker".into())
            .spawn(move || {
                let result = vm.call(&ctx, &callee, args);
                if let Err(err) = &result {
                    debug!(%err, "worker failed");
                }
                // The handle may already be gone; nobody is waiting then.
                let _ = tx.send(result);
            })
            .map_err(|err| RuntimeError::Internal(format!("failed to spawn thread: {err}")))?;
        Ok(Thread(Arc::new(ThreadInner {
            done: rx,
            outcome: Mutex::new(None),
        })))
    }

    /// Block until the thread finishes and return its result. Waiting again
    /// returns the same result.
    pub fn wait(&self, ctx: &Context) -> Result<Value> {
        loop {
            ctx.check()?;
            let Some(mut outcome) = self.0.outcome.try_lock_for(POLL) else {
                continue;
            };
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            match self.0.done.recv_timeout(POLL) {
                Ok(result) => {
                    *outcome = Some(result.clone());
                    return result;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    let result = Err(RuntimeError::Internal("worker exited without a result".into()));
                    *outcome = Some(result.clone());
                    return result;
                }
            }
        }
    }

    pub fn ptr_eq(&self, other: &Thread) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let finished = self.0.outcome.try_lock().is_some_and(|o| o.is_some());
        f.debug_struct("Thread").field("finished", &finished).finish()
    }
}

// =============================================================================
// Chan
// =============================================================================

struct ChanInner {
    tx: Sender<Value>,
    rx: Receiver<Value>,
    closed: AtomicBool,
    capacity: usize,
}

/// A bounded channel. Capacity 0 makes every send wait for a receiver.
#[derive(Clone)]
pub struct Chan(Arc<ChanInner>);

impl Chan {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        Chan(Arc::new(ChanInner {
            tx,
            rx,
            closed: AtomicBool::new(false),
            capacity,
        }))
    }

    fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }

    /// Send a value, blocking while the buffer is full.
    pub fn send(&self, ctx: &Context, value: Value) -> Result<()> {
        let mut value = value;
        loop {
            if self.is_closed() {
                return Err(RuntimeError::Raised(ErrorValue::raised("send on closed channel")));
            }
            ctx.check()?;
            match self.0.tx.send_timeout(value, POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(v)) => value = v,
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(RuntimeError::Internal("channel disconnected".into()));
                }
            }
        }
    }

    /// Receive a value, blocking while the buffer is empty. A closed and
    /// drained channel yields nil.
    pub fn recv(&self, ctx: &Context) -> Result<Value> {
        loop {
            if let Ok(value) = self.0.rx.try_recv() {
                return Ok(value);
            }
            if self.is_closed() {
                return Ok(Value::Nil);
            }
            ctx.check()?;
            match self.0.rx.recv_timeout(POLL) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(Value::Nil),
            }
        }
    }

    /// Close the channel. Buffered values can still be received.
    pub fn close(&self) {
        self.0.closed.store(true, Ordering::Release);
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.0.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity
    }

    pub fn ptr_eq(&self, other: &Chan) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Chan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chan")
            .field("capacity", &self.0.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
