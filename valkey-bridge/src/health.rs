//! Health probes
//!
//! A lightweight up/down probe over an existing connection: standalone
//! deployments answer with their server information, clusters with the
//! aggregated cluster state. The async probes are the primary path; a
//! blocking wrapper is provided for callers outside an async runtime.

use valkey_bridge_core::{config::ConnectionConfig, error::ValkeyResult};

use crate::adapter::UnifiedClient;
use crate::cluster_connection::ClusterConnection;
use crate::connection::Connection;
use crate::factory::ConnectionFactory;

/// Probe outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The deployment answered the probe
    Up,
    /// The probe failed
    Down,
}

/// Probe outcome with supporting details
#[derive(Debug, Clone)]
pub struct Health {
    /// Up/down status
    pub status: HealthStatus,
    /// Key/value details backing the status (server info, cluster state,
    /// or the failure message)
    pub details: Vec<(String, String)>,
}

impl Health {
    fn up(details: Vec<(String, String)>) -> Self {
        Self {
            status: HealthStatus::Up,
            details,
        }
    }

    fn down(error: &valkey_bridge_core::error::ValkeyError) -> Self {
        Self {
            status: HealthStatus::Down,
            details: vec![("error".to_string(), error.to_string())],
        }
    }

    /// Check whether the probe succeeded
    #[must_use]
    pub const fn is_up(&self) -> bool {
        matches!(self.status, HealthStatus::Up)
    }
}

/// Probe a standalone deployment through its connection
pub async fn probe<A: UnifiedClient>(conn: &mut Connection<A>) -> Health {
    match probe_inner(conn).await {
        Ok(details) => Health::up(details),
        Err(err) => Health::down(&err),
    }
}

async fn probe_inner<A: UnifiedClient>(
    conn: &mut Connection<A>,
) -> ValkeyResult<Vec<(String, String)>> {
    let info = conn.info().await?.done()?;
    Ok(info
        .into_iter()
        .filter(|(key, _)| key == "redis_version" || key == "valkey_version" || key == "uptime_in_seconds")
        .collect())
}

/// Probe a cluster deployment, reporting the aggregated cluster state
pub async fn probe_cluster(conn: &mut ClusterConnection) -> Health {
    match conn.cluster_info().await {
        Ok(details) => {
            let ok = details
                .iter()
                .any(|(key, value)| key == "cluster_state" && value == "ok");
            if ok {
                Health::up(details)
            } else {
                Health {
                    status: HealthStatus::Down,
                    details,
                }
            }
        }
        Err(err) => Health::down(&err),
    }
}

/// Blocking probe for callers outside an async runtime
///
/// Opens a short-lived connection on a private current-thread runtime.
///
/// # Errors
///
/// Returns an IO error when the runtime cannot be built; probe failures
/// are reported through the returned [`Health`] instead.
pub fn probe_blocking(config: ConnectionConfig) -> std::io::Result<Health> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    Ok(runtime.block_on(async move {
        let factory = ConnectionFactory::new(config);
        if factory.is_cluster() {
            match factory.cluster_connection().await {
                Ok(mut conn) => probe_cluster(&mut conn).await,
                Err(err) => Health::down(&err),
            }
        } else {
            match factory.standalone_connection().await {
                Ok(mut conn) => probe(&mut conn).await,
                Err(err) => Health::down(&err),
            }
        }
    }))
}
