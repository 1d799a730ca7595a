//! # Runtime Configuration Module
//!
//! Environment-variable configuration for the coroutine runtime.
//!
//! ## Environment Variables
//!
//! ### `MAY_HTTPD_STACK_SIZE`
//!
//! Stack size for the accept-loop and per-connection session coroutines.
//! Accepts decimal (`65536`) or hexadecimal (`0x10000`) values.
//!
//! Default: `0x10000` (64 KB). Sessions reach user handler code only
//! through a channel, so their own stack needs are modest; the default
//! leaves headroom for TLS record processing.

use std::env;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for spawned coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = match env::var("MAY_HTTPD_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x10000)
                } else {
                    val.parse().unwrap_or(0x10000)
                }
            }
            Err(_) => 0x10000,
        };
        Self { stack_size }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stack_size() {
        std::env::remove_var("MAY_HTTPD_STACK_SIZE");
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.stack_size, 0x10000);
    }
}
