//! Environment-driven runtime configuration.
//!
//! ## Environment Variables
//!
//! ### `APILANE_STACK_SIZE`
//!
//! Stack size for handler coroutines, decimal (`16384`) or hex (`0x4000`).
//! Default: `0x4000` (16 KB). Larger stacks support deeper call chains;
//! smaller stacks reduce memory when running thousands of coroutines.
//!
//! Worker-pool sizing is configured separately, see
//! [`crate::worker_pool::WorkerPoolConfig`].

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup with [`RuntimeConfig::from_env()`] and apply it to
/// the `may` runtime before registering handlers.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for handler coroutines in bytes.
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        RuntimeConfig {
            stack_size: parse_size(env::var("APILANE_STACK_SIZE").ok().as_deref())
                .unwrap_or(DEFAULT_STACK_SIZE),
        }
    }

    /// Apply the configuration to the global `may` runtime.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

pub(crate) fn parse_size(val: Option<&str>) -> Option<usize> {
    let val = val?;
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}
