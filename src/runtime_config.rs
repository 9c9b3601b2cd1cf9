//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the dispatch runtime.
//!
//! ## Environment Variables
//!
//! ### `BRRTR_STACK_SIZE`
//!
//! Stack size for operation coroutines. Accepts decimal (`16384`) or hexadecimal (`0x4000`).
//! Default: `0x4000` (16 KB).
//!
//! ### `BRRTR_DEFAULT_TIMEOUT`
//!
//! How long a mutating request waits for its operation before answering `202 Accepted`
//! when the request carries no `timeout` query parameter. Accepts humantime durations
//! (`30s`, `1m 30s`, `250ms`). Default: `30s`.
//!
//! ### `BRRTR_OPERATION_TTL`
//!
//! How long a finished operation stays pollable under `/operations/{id}`. Default: `5m`.
//!
//! ### `BRRTR_API_PREFIX`
//!
//! Canonical prefix used for self links and stripped from incoming paths.
//! Default: `/api/v1beta1`.
//!
//! ```bash
//! export BRRTR_STACK_SIZE=0x8000
//! export BRRTR_DEFAULT_TIMEOUT=5s
//! brrtrest serve --addr 0.0.0.0:8080
//! ```
//!
//! Malformed values fall back to the default with a warning.

use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_STACK_SIZE: usize = 0x4000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OPERATION_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_API_PREFIX: &str = "/api/v1beta1";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
    pub default_timeout: Duration,
    pub operation_ttl: Duration,
    pub api_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            default_timeout: DEFAULT_TIMEOUT,
            operation_ttl: DEFAULT_OPERATION_TTL,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }
}

fn parse_stack_size(val: &str) -> Option<usize> {
    match val.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn parse_duration(var: &str, val: &str, default: Duration) -> Duration {
    match humantime::parse_duration(val.trim()) {
        Ok(duration) => duration,
        Err(e) => {
            warn!(var, value = val, error = %e, "Invalid duration, using default");
            default
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let stack_size = match lookup("BRRTR_STACK_SIZE") {
            Some(val) => parse_stack_size(&val).unwrap_or_else(|| {
                warn!(value = %val, "Invalid BRRTR_STACK_SIZE, using default");
                DEFAULT_STACK_SIZE
            }),
            None => defaults.stack_size,
        };
        let default_timeout = lookup("BRRTR_DEFAULT_TIMEOUT")
            .map(|val| parse_duration("BRRTR_DEFAULT_TIMEOUT", &val, DEFAULT_TIMEOUT))
            .unwrap_or(defaults.default_timeout);
        let operation_ttl = lookup("BRRTR_OPERATION_TTL")
            .map(|val| parse_duration("BRRTR_OPERATION_TTL", &val, DEFAULT_OPERATION_TTL))
            .unwrap_or(defaults.operation_ttl);
        let api_prefix = lookup("BRRTR_API_PREFIX")
            .filter(|val| !val.trim().is_empty())
            .unwrap_or(defaults.api_prefix);

        RuntimeConfig {
            stack_size,
            default_timeout,
            operation_ttl,
            api_prefix,
        }
    }
}
