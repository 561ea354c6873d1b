//! Configuration types for Valkey connections

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Topology mode of the target deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyMode {
    /// Single standalone server (or a pooled client in front of one)
    Standalone,
    /// Valkey Cluster with slot-partitioned keyspace
    Cluster,
}

/// Configuration for a Valkey connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection string (e.g., "valkey://localhost:6379" or "valkey://host1:6379,host2:6380")
    pub connection_string: String,

    /// Optional username for ACL authentication
    pub username: Option<String>,

    /// Optional password for authentication
    pub password: Option<String>,

    /// Database number (standalone mode only; cluster mode accepts only 0)
    pub database: u8,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Read/write operation timeout
    pub operation_timeout: Duration,

    /// Enable TCP keepalive
    pub tcp_keepalive: Option<Duration>,

    /// Topology mode of the deployment
    pub topology_mode: TopologyMode,

    /// Maximum number of MOVED redirects followed by the cluster driver
    pub max_redirects: usize,

    /// How long a cluster topology snapshot may be served from cache
    pub topology_cache_ttl: Duration,

    /// Abort pipeline result conversion on the first per-command error
    /// instead of capturing errors positionally
    pub fail_fast_pipeline: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_string: "valkey://localhost:6379".to_string(),
            username: None,
            password: None,
            database: 0,
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30),
            tcp_keepalive: Some(Duration::from_secs(60)),
            topology_mode: TopologyMode::Standalone,
            max_redirects: 3,
            topology_cache_ttl: Duration::from_millis(100),
            fail_fast_pipeline: false,
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration with the given connection string
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Set the username for ACL authentication
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password for authentication
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database number
    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the topology mode
    pub fn with_topology_mode(mut self, mode: TopologyMode) -> Self {
        self.topology_mode = mode;
        self
    }

    /// Set the maximum number of redirects
    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set the topology cache time-to-live
    pub fn with_topology_cache_ttl(mut self, ttl: Duration) -> Self {
        self.topology_cache_ttl = ttl;
        self
    }

    /// Make pipeline flushing fail on the first per-command error
    pub fn with_fail_fast_pipeline(mut self, fail_fast: bool) -> Self {
        self.fail_fast_pipeline = fail_fast;
        self
    }

    /// Parse connection endpoints from the connection string
    pub fn parse_endpoints(&self) -> Vec<(String, u16)> {
        let conn_str = self.connection_string.trim();

        let addr_part = conn_str
            .strip_prefix("valkey://")
            .or_else(|| conn_str.strip_prefix("valkeys://"))
            .or_else(|| conn_str.strip_prefix("redis://"))
            .or_else(|| conn_str.strip_prefix("rediss://"))
            .unwrap_or(conn_str);

        addr_part
            .split(',')
            .filter_map(|endpoint| {
                let endpoint = endpoint.trim();
                if endpoint.is_empty() {
                    return None;
                }

                if let Some((host, port_str)) = endpoint.rsplit_once(':') {
                    if let Ok(port) = port_str.parse::<u16>() {
                        return Some((host.to_string(), port));
                    }
                }

                // Default port if not specified
                Some((endpoint.to_string(), 6379))
            })
            .collect()
    }
}
