// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Cancellation, deadlines and resource limits for one execution.
//!
//! A [`Context`] is threaded through every VM run and every builtin call.
//! Clones share the same cancellation flags, so a [`CancelHandle`] held by
//! the host stops the VM and any workers it spawned. Cancelling a context
//! also cancels every context derived from it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::limits::{Limits, NoLimits};

/// Why a context stopped execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupt {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Execution context.
#[derive(Clone)]
pub struct Context {
    /// This context's flag last, preceded by its ancestors' flags.
    cancel: Arc<[Arc<AtomicBool>]>,
    deadline: Option<Instant>,
    limits: Arc<dyn Limits>,
}

impl Context {
    /// A context that is never cancelled and has no limits.
    pub fn background() -> Self {
        Self {
            cancel: Arc::new([Arc::new(AtomicBool::new(false))]),
            deadline: None,
            limits: Arc::new(NoLimits),
        }
    }

    /// A child context plus the handle that cancels it. The child is also
    /// cancelled when `self` is.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let cancel: Vec<_> = self.cancel.iter().cloned().chain([flag.clone()]).collect();
        let ctx = Context {
            cancel: cancel.into(),
            deadline: self.deadline,
            limits: self.limits.clone(),
        };
        (ctx, CancelHandle(flag))
    }

    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A context with `deadline`, or the current deadline if it is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Context {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn with_limits(&self, limits: Arc<dyn Limits>) -> Context {
        Context {
            limits,
            ..self.clone()
        }
    }

    pub fn limits(&self) -> &dyn Limits {
        &*self.limits
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.iter().any(|flag| flag.load(Ordering::Relaxed))
    }

    /// Check the cancellation flag and then the deadline.
    pub fn check(&self) -> Result<(), Interrupt> {
        self.check_cancelled()?;
        self.check_deadline()
    }

    /// The cancellation half of [`Context::check`]. Cheap enough to run on
    /// every instruction.
    #[inline]
    pub fn check_cancelled(&self) -> Result<(), Interrupt> {
        if self.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        Ok(())
    }

    /// The deadline half of [`Context::check`]. Reads the clock.
    pub fn check_deadline(&self) -> Result<(), Interrupt> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupt::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Cancels the context it was created with, every clone of it, and every
/// context derived from it.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}
