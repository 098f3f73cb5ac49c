//! # Limits Module
//!
//! Environment variable-based runtime limits for the dispatch core.
//!
//! ## Environment Variables
//!
//! ### `WIREROUTE_MAX_STRING_LEN`
//!
//! Maximum byte length accepted for a decoded string or textual `json`
//! payload. Accepts decimal (`1048576`) or hexadecimal (`0x100000`)
//! values. Default: 1 MiB. Frames declaring longer strings are rejected
//! before any allocation of that size happens.
//!
//! ### `WIREROUTE_MAX_ARGS`
//!
//! Maximum declared handler arity accepted at registration time.
//! Default: 64.
//!
//! ### `WIREROUTE_MAX_DEPTH`
//!
//! Maximum container nesting accepted inside a textual `json` payload.
//! Default: 128. Deeper payloads are rejected as decode errors before the
//! recursion can exhaust the stack.
//!
//! Unparseable values fall back to the defaults.

use std::env;

/// Default cap on decoded string length (1 MiB).
pub const DEFAULT_MAX_STRING_LEN: usize = 0x10_0000;

/// Default cap on declared handler arity.
pub const DEFAULT_MAX_ARGS: usize = 64;

/// Default cap on `json` payload nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Runtime limits loaded from environment variables.
///
/// Load once at startup with [`DispatchLimits::from_env()`] and hand to
/// the router and codec; `Default` uses the documented defaults without
/// touching the environment.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    /// Maximum decoded string / textual payload length in bytes.
    pub max_string_len: usize,
    /// Maximum handler arity accepted at registration.
    pub max_args: usize,
    /// Maximum container nesting inside a textual `json` payload.
    pub max_depth: usize,
}

impl DispatchLimits {
    /// Load limits from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        DispatchLimits {
            max_string_len: env_usize("WIREROUTE_MAX_STRING_LEN", DEFAULT_MAX_STRING_LEN),
            max_args: env_usize("WIREROUTE_MAX_ARGS", DEFAULT_MAX_ARGS),
            max_depth: env_usize("WIREROUTE_MAX_DEPTH", DEFAULT_MAX_DEPTH),
        }
    }
}

impl Default for DispatchLimits {
    fn default() -> Self {
        DispatchLimits {
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_args: DEFAULT_MAX_ARGS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(val) => {
            if let Some(hex) = val.strip_prefix("0x") {
                usize::from_str_radix(hex, 16).unwrap_or(default)
            } else {
                val.parse().unwrap_or(default)
            }
        }
        Err(_) => default,
    }
}
