// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! VM configuration.

/// Bounds and tuning for a [`Vm`](crate::vm::Vm).
///
/// ```rust
/// use kiln_vm::VmConfig;
///
/// let config = VmConfig::default().max_frames(64);
/// assert_eq!(config.frame_limit(), 64);
/// assert_eq!(config.stack_limit(), 65536);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    max_frames: usize,
    max_stack: usize,
    max_args: usize,
    cancel_check_interval: u32,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: 1024,
            max_stack: 65536,
            max_args: 255,
            cancel_check_interval: 256,
        }
    }
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum call depth before `StackOverflow`.
    pub fn max_frames(mut self, max: usize) -> Self {
        self.max_frames = max.max(1);
        self
    }

    /// Maximum operand stack size before `StackOverflow`.
    pub fn max_stack(mut self, max: usize) -> Self {
        self.max_stack = max.max(1);
        self
    }

    /// Maximum arguments a call may pass.
    pub fn max_args(mut self, max: usize) -> Self {
        self.max_args = max;
        self
    }

    /// Instructions between deadline checks. The cancellation flag is
    /// checked on every instruction regardless.
    pub fn cancel_check_interval(mut self, interval: u32) -> Self {
        self.cancel_check_interval = interval.max(1);
        self
    }

    pub fn frame_limit(&self) -> usize {
        self.max_frames
    }

    pub fn stack_limit(&self) -> usize {
        self.max_stack
    }

    pub fn arg_limit(&self) -> usize {
        self.max_args
    }

    pub fn check_interval(&self) -> u32 {
        self.cancel_check_interval
    }
}
