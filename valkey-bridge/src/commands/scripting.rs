//! Scripting commands

use sha1::{Digest, Sha1};
use valkey_bridge_core::{
    error::ValkeyResult,
    reply::{Outcome, Reply},
};

use super::{static_arg, uint_arg};
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

impl<A: UnifiedClient> Connection<A> {
    /// Evaluate a script with the given keys and arguments
    ///
    /// The reply shape depends on the script; it is normalized
    /// structurally.
    pub async fn eval(
        &mut self,
        script: &str,
        keys: &[&[u8]],
        argv: &[&[u8]],
    ) -> ValkeyResult<Outcome<Reply>> {
        let mut args = vec![copy_arg(script.as_bytes()), uint_arg(keys.len() as u64)];
        args.extend(keys.iter().map(|key| copy_arg(key)));
        args.extend(argv.iter().map(|arg| copy_arg(arg)));
        match self.execute("EVAL", args, Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(reply) => Ok(Outcome::Done(reply)),
        }
    }

    /// Evaluate a previously loaded script by its SHA1 digest
    pub async fn evalsha(
        &mut self,
        sha1: &str,
        keys: &[&[u8]],
        argv: &[&[u8]],
    ) -> ValkeyResult<Outcome<Reply>> {
        let mut args = vec![copy_arg(sha1.as_bytes()), uint_arg(keys.len() as u64)];
        args.extend(keys.iter().map(|key| copy_arg(key)));
        args.extend(argv.iter().map(|arg| copy_arg(arg)));
        match self.execute("EVALSHA", args, Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(reply) => Ok(Outcome::Done(reply)),
        }
    }

    /// Load a script into the server cache, returning its SHA1 digest
    pub async fn script_load(&mut self, script: &str) -> ValkeyResult<Outcome<String>> {
        finish(
            self.execute(
                "SCRIPT",
                vec![static_arg("LOAD"), copy_arg(script.as_bytes())],
                Conv::Status,
            )
            .await?,
        )
    }

    /// Check which of the given digests are cached
    pub async fn script_exists(&mut self, sha1s: &[&str]) -> ValkeyResult<Outcome<Vec<bool>>> {
        let mut args = vec![static_arg("EXISTS")];
        args.extend(sha1s.iter().map(|sha| copy_arg(sha.as_bytes())));
        match self.execute("SCRIPT", args, Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(Reply::Seq(flags)) => Ok(Outcome::Done(
                flags
                    .into_iter()
                    .map(bool::try_from)
                    .collect::<ValkeyResult<Vec<_>>>()?,
            )),
            Some(other) => Err(valkey_bridge_core::error::ValkeyError::Type(format!(
                "Unexpected SCRIPT EXISTS reply: {other:?}"
            ))),
        }
    }

    /// Drop the server's script cache
    pub async fn script_flush(&mut self) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute("SCRIPT", vec![static_arg("FLUSH")], Conv::OkBool)
                .await?,
        )
    }
}

/// SHA1 digest of a script, as the server computes for EVALSHA
#[must_use]
pub fn script_sha1(script: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(script.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// A script paired with its digest for EVALSHA-first execution
#[derive(Debug, Clone)]
pub struct Script {
    source: String,
    sha1: String,
}

impl Script {
    /// Create a script, computing its digest
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let sha1 = script_sha1(&source);
        Self { source, sha1 }
    }

    /// The script source
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The script's SHA1 digest
    #[must_use]
    pub fn sha1(&self) -> &str {
        &self.sha1
    }

    /// Evaluate via EVALSHA, falling back to EVAL when the server does not
    /// have the script cached
    ///
    /// Not available while a pipeline or transaction is collecting: the
    /// fallback decision needs the reply.
    pub async fn eval_on<A: UnifiedClient>(
        &self,
        conn: &mut Connection<A>,
        keys: &[&[u8]],
        argv: &[&[u8]],
    ) -> ValkeyResult<Reply> {
        conn.reject_when_queued("EVALSHA")?;

        match conn.evalsha(&self.sha1, keys, argv).await {
            Err(valkey_bridge_core::error::ValkeyError::Server(msg))
                if msg.starts_with("NOSCRIPT") =>
            {
                conn.eval(&self.source, keys, argv).await?.done()
            }
            Err(err) => Err(err),
            Ok(outcome) => outcome.done(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_sha1_known_vectors() {
        // SHA1("") and SHA1("abc") reference digests
        assert_eq!(script_sha1(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(script_sha1("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_script_digest_is_stable() {
        let script = Script::new("return redis.call('GET', KEYS[1])");
        assert_eq!(script.sha1().len(), 40);
        assert_eq!(script.sha1(), script_sha1(script.source()));
    }
}
