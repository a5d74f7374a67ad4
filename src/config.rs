// Service configuration
// Values come from the environment, optionally seeded from a .env file

use std::net::SocketAddr;

use crate::dispatch::dispatcher::DEFAULT_EVENT_LOG_CAPACITY;
use crate::dispatch::errors::{DispatchError, DispatchResult};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Runtime configuration of the dispatch service
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the HTTP server listens on (`BIND_ADDR`)
    pub bind_addr: SocketAddr,
    /// Number of dispatch events kept in memory (`EVENT_LOG_CAPACITY`)
    pub event_log_capacity: usize,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// Reads `.env` first if present. Unset variables fall back to defaults;
    /// set but malformed ones are an error.
    pub fn from_env() -> DispatchResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DispatchResult<Self> {
        let bind_addr = match lookup("BIND_ADDR") {
            Some(value) => value
                .parse::<SocketAddr>()
                .map_err(|e| DispatchError::Config(format!("Invalid BIND_ADDR {value:?}: {e}")))?,
            None => {
                tracing::warn!("BIND_ADDR not set, using default {}", DEFAULT_BIND_ADDR);
                DEFAULT_BIND_ADDR
                    .parse::<SocketAddr>()
                    .map_err(|e| DispatchError::Config(format!("Invalid default address: {e}")))?
            }
        };

        let event_log_capacity = match lookup("EVENT_LOG_CAPACITY") {
            Some(value) => match value.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(DispatchError::Config(format!(
                        "EVENT_LOG_CAPACITY must be a positive integer, got {value:?}"
                    )))
                }
            },
            None => DEFAULT_EVENT_LOG_CAPACITY,
        };

        Ok(Self {
            bind_addr,
            event_log_capacity,
        })
    }
}
