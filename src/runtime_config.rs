//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the coroutine runtime.
//!
//! ## Environment Variables
//!
//! ### `DUOLANE_STACK_SIZE`
//!
//! Stack size for spawned coroutines, in decimal (`16384`) or hexadecimal
//! (`0x4000`). Default: `0x4000` (16 KB).
//!
//! Larger stacks support deeper call chains; smaller stacks keep memory
//! down when many coroutines run on a constrained device. Tune to the
//! complexity of your transports and handlers.
//!
//! ## Usage
//!
//! ```rust
//! use duolane::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! may::config().set_stack_size(config.stack_size);
//! ```

use std::env;

/// Parse a size value that may be decimal or `0x`-prefixed hexadecimal.
pub(crate) fn parse_size(val: &str) -> Option<usize> {
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup with [`RuntimeConfig::from_env()`] and apply it to
/// the `may` scheduler before spawning anything.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("DUOLANE_STACK_SIZE")
            .ok()
            .and_then(|v| parse_size(&v))
            .unwrap_or(0x4000);
        RuntimeConfig { stack_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("16384"), Some(16384));
        assert_eq!(parse_size("0x4000"), Some(0x4000));
        assert_eq!(parse_size("banana"), None);
    }
}
