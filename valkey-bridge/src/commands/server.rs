//! Server commands (single-node forms)
//!
//! On a cluster connection the cluster-wide forms with their per-command
//! aggregation live in [`crate::cluster_connection`]; these single-node
//! forms go to whichever node the driver picks.

use valkey_bridge_core::{
    error::{ValkeyError, ValkeyResult},
    reply::{Outcome, Reply},
};

use super::static_arg;
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::{parse_info_properties, Conv};

impl<A: UnifiedClient> Connection<A> {
    /// Server information as key/value properties
    pub async fn info(&mut self) -> ValkeyResult<Outcome<Vec<(String, String)>>> {
        match self.execute("INFO", Vec::new(), Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(reply) => Ok(Outcome::Done(parse_info_properties(&String::try_from(
                reply,
            )?))),
        }
    }

    /// One section of the server information
    pub async fn info_section(&mut self, section: &str) -> ValkeyResult<Outcome<Vec<(String, String)>>> {
        match self
            .execute("INFO", vec![copy_arg(section.as_bytes())], Conv::Raw)
            .await?
        {
            None => Ok(Outcome::Queued),
            Some(reply) => Ok(Outcome::Done(parse_info_properties(&String::try_from(
                reply,
            )?))),
        }
    }

    /// Number of keys in the selected database
    pub async fn db_size(&mut self) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("DBSIZE", Vec::new(), Conv::Int).await?)
    }

    /// Remove every key of the selected database
    pub async fn flush_db(&mut self) -> ValkeyResult<Outcome<bool>> {
        finish(self.execute("FLUSHDB", Vec::new(), Conv::OkBool).await?)
    }

    /// Remove every key of every database
    pub async fn flush_all(&mut self) -> ValkeyResult<Outcome<bool>> {
        finish(self.execute("FLUSHALL", Vec::new(), Conv::OkBool).await?)
    }

    /// Configuration parameters matching a glob pattern
    pub async fn config_get(&mut self, pattern: &str) -> ValkeyResult<Outcome<Vec<(String, String)>>> {
        match self
            .execute(
                "CONFIG",
                vec![static_arg("GET"), copy_arg(pattern.as_bytes())],
                Conv::BytesMap,
            )
            .await?
        {
            None => Ok(Outcome::Queued),
            Some(reply) => {
                let params: Vec<(bytes::Bytes, bytes::Bytes)> = reply.try_into()?;
                Ok(Outcome::Done(
                    params
                        .into_iter()
                        .map(|(key, value)| {
                            (
                                String::from_utf8_lossy(&key).into_owned(),
                                String::from_utf8_lossy(&value).into_owned(),
                            )
                        })
                        .collect(),
                ))
            }
        }
    }

    /// Set a configuration parameter
    pub async fn config_set(&mut self, parameter: &str, value: &str) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "CONFIG",
                vec![
                    static_arg("SET"),
                    copy_arg(parameter.as_bytes()),
                    copy_arg(value.as_bytes()),
                ],
                Conv::OkBool,
            )
            .await?,
        )
    }

    /// Server time as (unix seconds, microseconds)
    pub async fn time(&mut self) -> ValkeyResult<Outcome<(i64, i64)>> {
        match self.execute("TIME", Vec::new(), Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(Reply::Seq(parts)) if parts.len() == 2 => {
                let seconds = string_int(&parts[0])?;
                let micros = string_int(&parts[1])?;
                Ok(Outcome::Done((seconds, micros)))
            }
            Some(other) => Err(ValkeyError::Type(format!(
                "Unexpected TIME reply: {other:?}"
            ))),
        }
    }

    /// Unix timestamp of the last successful save to disk
    pub async fn last_save(&mut self) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("LASTSAVE", Vec::new(), Conv::Int).await?)
    }
}

fn string_int(reply: &Reply) -> ValkeyResult<i64> {
    match reply {
        Reply::Int(i) => Ok(*i),
        Reply::Bytes(b) => String::from_utf8_lossy(b)
            .parse::<i64>()
            .map_err(|e| ValkeyError::Type(format!("Cannot parse integer: {e}"))),
        other => Err(ValkeyError::Type(format!(
            "Cannot convert {other:?} to integer"
        ))),
    }
}
