//! Error types for Valkey operations

use std::io;
use thiserror::Error;

/// Result type for Valkey operations
pub type ValkeyResult<T> = Result<T, ValkeyError>;

/// Comprehensive error type for Valkey operations
#[derive(Error, Debug)]
pub enum ValkeyError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol parsing error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server returned an error
    #[error("Server error: {0}")]
    Server(String),

    /// Caller misuse of the API (wrong mode transition, unsupported
    /// operation on the current topology); never retried
    #[error("Invalid API usage: {0}")]
    Usage(String),

    /// A lookup failed against a (possibly stale) topology snapshot;
    /// callers may refresh the topology and retry
    #[error("Cluster state error: {0}")]
    ClusterState(String),

    /// MOVED redirect in cluster mode
    #[error("MOVED redirect: slot {slot} to {host}:{port}")]
    Moved {
        /// Slot number that was moved
        slot: u16,
        /// Target host
        host: String,
        /// Target port
        port: u16,
    },

    /// ASK redirect in cluster mode
    #[error("ASK redirect: slot {slot} to {host}:{port}")]
    Ask {
        /// Slot number for temporary redirect
        slot: u16,
        /// Target host
        host: String,
        /// Target port
        port: u16,
    },

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Type conversion error
    #[error("Type conversion error: {0}")]
    Type(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl ValkeyError {
    /// Parse a server error message to check for MOVED or ASK redirects
    #[must_use]
    pub fn parse_redirect(msg: &str) -> Option<Self> {
        fn parse(rest: &str) -> Option<(u16, String, u16)> {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() != 2 {
                return None;
            }
            let slot = parts[0].parse::<u16>().ok()?;
            let (host, port) = parts[1].rsplit_once(':')?;
            let port = port.parse::<u16>().ok()?;
            Some((slot, host.to_string(), port))
        }

        if let Some(rest) = msg.strip_prefix("MOVED ") {
            if let Some((slot, host, port)) = parse(rest) {
                return Some(Self::Moved { slot, host, port });
            }
        }

        if let Some(rest) = msg.strip_prefix("ASK ") {
            if let Some((slot, host, port)) = parse(rest) {
                return Some(Self::Ask { slot, host, port });
            }
        }

        None
    }

    /// Check if this error is a redirect (MOVED or ASK)
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Moved { .. } | Self::Ask { .. })
    }

    /// Check if this error signals a caller programming mistake
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Check if this error signals a stale cluster topology
    #[must_use]
    pub const fn is_cluster_state(&self) -> bool {
        matches!(self, Self::ClusterState(_))
    }

    /// Get the target address from a redirect error
    #[must_use]
    pub fn redirect_target(&self) -> Option<(String, u16)> {
        match self {
            Self::Moved { host, port, .. } | Self::Ask { host, port, .. } => {
                Some((host.clone(), *port))
            }
            _ => None,
        }
    }

    /// Get the slot number from a redirect error
    #[must_use]
    pub const fn redirect_slot(&self) -> Option<u16> {
        match self {
            Self::Moved { slot, .. } | Self::Ask { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}
