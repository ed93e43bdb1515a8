// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Resource limits a host can place on a script.
//!
//! Limits travel with the [`Context`](crate::context::Context). The VM charges
//! the cost of every container and string it builds; builtins that do I/O
//! are expected to call [`Limits::track_request`] and [`Limits::check_size`].

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;

/// A limit was exceeded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    #[error("limit error: reached maximum processing cost ({max})")]
    Cost { max: u64 },
    #[error("limit error: reached maximum number of requests ({max})")]
    Requests { max: u64 },
    #[error("limit error: data size exceeded limit of {max} bytes (got {size} bytes)")]
    Size { size: u64, max: u64 },
}

/// A resource policy. Implementations are shared between the VM and any
/// spawned workers, so counters need interior locking.
pub trait Limits: fmt::Debug + Send + Sync {
    /// Add `cost` to the running processing cost.
    fn track_cost(&self, cost: usize) -> Result<(), LimitError>;

    /// Count one outbound request.
    fn track_request(&self) -> Result<(), LimitError>;

    /// Check a buffer of `size` bytes against the maximum buffer size.
    fn check_size(&self, size: usize) -> Result<(), LimitError>;

    /// How long blocking I/O may wait. `None` means no timeout.
    fn io_timeout(&self) -> Option<Duration>;
}

/// No limits at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimits;

impl Limits for NoLimits {
    fn track_cost(&self, _cost: usize) -> Result<(), LimitError> {
        Ok(())
    }

    fn track_request(&self) -> Result<(), LimitError> {
        Ok(())
    }

    fn check_size(&self, _size: usize) -> Result<(), LimitError> {
        Ok(())
    }

    fn io_timeout(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Default)]
struct Counters {
    cost: u64,
    requests: u64,
}

/// Counting limits. Each ceiling is optional; unset ceilings never trip.
///
/// # Example
///
/// ```rust
/// use kiln_vm::limits::{LimitError, Limits, StandardLimits};
///
/// let limits = StandardLimits::new().max_cost(10);
/// assert!(limits.track_cost(6).is_ok());
/// assert_eq!(limits.track_cost(6), Err(LimitError::Cost { max: 10 }));
/// ```
#[derive(Debug, Default)]
pub struct StandardLimits {
    max_cost: Option<u64>,
    max_requests: Option<u64>,
    max_buffer_size: Option<u64>,
    io_timeout: Option<Duration>,
    counters: Mutex<Counters>,
}

impl StandardLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_cost(mut self, max: u64) -> Self {
        self.max_cost = Some(max);
        self
    }

    pub fn max_requests(mut self, max: u64) -> Self {
        self.max_requests = Some(max);
        self
    }

    pub fn max_buffer_size(mut self, max: u64) -> Self {
        self.max_buffer_size = Some(max);
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Processing cost charged so far.
    pub fn cost(&self) -> u64 {
        self.counters.lock().cost
    }

    pub fn requests(&self) -> u64 {
        self.counters.lock().requests
    }
}

impl Limits for StandardLimits {
    fn track_cost(&self, cost: usize) -> Result<(), LimitError> {
        let mut counters = self.counters.lock();
        counters.cost = counters.cost.saturating_add(cost as u64);
        match self.max_cost {
            Some(max) if counters.cost > max => {
                tracing::debug!(cost = counters.cost, max, "cost limit exceeded");
                Err(LimitError::Cost { max })
            }
            _ => Ok(()),
        }
    }

    fn track_request(&self) -> Result<(), LimitError> {
        let mut counters = self.counters.lock();
        counters.requests += 1;
        match self.max_requests {
            Some(max) if counters.requests > max => {
                tracing::debug!(requests = counters.requests, max, "request limit exceeded");
                Err(LimitError::Requests { max })
            }
            _ => Ok(()),
        }
    }

    fn check_size(&self, size: usize) -> Result<(), LimitError> {
        match self.max_buffer_size {
            Some(max) if size as u64 > max => Err(LimitError::Size {
                size: size as u64,
                max,
            }),
            _ => Ok(()),
        }
    }

    fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }
}
