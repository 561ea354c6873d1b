//! Static command-classification tables
//!
//! Cluster routing decisions hinge on exact knowledge of how the wire
//! client dispatches each command by default. The tables below transcribe
//! that routing: which commands silently fan out to all primaries or all
//! nodes, and which commands return nested record maps that must never be
//! reinterpreted. Misclassifying a command here silently corrupts results
//! (a caller would receive a map of node addresses instead of its data), so
//! changes must be checked against the wire client's routing source.
//!
//! The same module carries the read-only command table used by
//! [`ReadWriteRouter`] to split read and write traffic without proxying.

/// Default routing applied by the cluster client when no explicit route is
/// given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRoute {
    /// Route by the slot of the first key argument
    FirstKey,
    /// Fan out to every master node
    AllPrimaries,
    /// Fan out to every node
    AllNodes,
    /// Any node will do
    Random,
}

/// Build the classification label for a command: the uppercased name, plus
/// the subcommand for container commands like `CONFIG GET` or `SCRIPT LOAD`
#[must_use]
pub fn command_label(args: &[bytes::Bytes]) -> String {
    let Some(first) = args.first() else {
        return String::new();
    };
    let name = String::from_utf8_lossy(first).to_uppercase();

    let takes_subcommand = matches!(
        name.as_str(),
        "ACL"
            | "CLIENT"
            | "CLUSTER"
            | "COMMAND"
            | "CONFIG"
            | "FUNCTION"
            | "LATENCY"
            | "MEMORY"
            | "OBJECT"
            | "PUBSUB"
            | "SCRIPT"
            | "SLOWLOG"
            | "XGROUP"
            | "XINFO"
    );

    if takes_subcommand {
        if let Some(second) = args.get(1) {
            let sub = String::from_utf8_lossy(second).to_uppercase();
            return format!("{name} {sub}");
        }
    }

    name
}

/// Default route of a command in the cluster client's routing engine
#[must_use]
pub fn default_route(label: &str) -> DefaultRoute {
    if is_all_nodes_command(label) {
        return DefaultRoute::AllNodes;
    }
    if is_all_primaries_command(label) {
        return DefaultRoute::AllPrimaries;
    }
    if is_keyless_command(label) {
        return DefaultRoute::Random;
    }
    DefaultRoute::FirstKey
}

/// Check whether a command fans out to multiple nodes when no explicit
/// route is given
#[must_use]
pub fn is_default_multi_node_command(label: &str) -> bool {
    is_all_nodes_command(label) || is_all_primaries_command(label)
}

fn is_all_nodes_command(label: &str) -> bool {
    matches!(
        label,
        "ACL SETUSER"
            | "ACL DELUSER"
            | "ACL SAVE"
            | "CLIENT SETNAME"
            | "CLIENT SETINFO"
            | "SLOWLOG GET"
            | "SLOWLOG LEN"
            | "SLOWLOG RESET"
            | "CONFIG SET"
            | "CONFIG RESETSTAT"
            | "CONFIG REWRITE"
            | "SCRIPT FLUSH"
            | "SCRIPT LOAD"
            | "SCRIPT KILL"
            | "LATENCY RESET"
            | "LATENCY GRAPH"
            | "LATENCY HISTOGRAM"
            | "LATENCY HISTORY"
            | "LATENCY DOCTOR"
            | "LATENCY LATEST"
            | "PUBSUB NUMPAT"
            | "PUBSUB CHANNELS"
            | "PUBSUB NUMSUB"
            | "PUBSUB SHARDCHANNELS"
            | "PUBSUB SHARDNUMSUB"
            | "FUNCTION KILL"
            | "FUNCTION STATS"
    )
}

fn is_all_primaries_command(label: &str) -> bool {
    matches!(
        label,
        "DBSIZE"
            | "DEBUG"
            | "FLUSHALL"
            | "FLUSHDB"
            | "FT._ALIASLIST"
            | "FT._LIST"
            | "INFO"
            | "KEYS"
            | "PING"
            | "SCRIPT EXISTS"
            | "UNWATCH"
            | "WAIT"
            | "RANDOMKEY"
            | "WAITAOF"
            | "FUNCTION DELETE"
            | "FUNCTION FLUSH"
            | "FUNCTION LOAD"
            | "FUNCTION RESTORE"
            | "MEMORY DOCTOR"
            | "MEMORY MALLOC-STATS"
            | "MEMORY PURGE"
            | "MEMORY STATS"
    )
}

fn is_keyless_command(label: &str) -> bool {
    matches!(
        label,
        "HELLO" | "AUTH" | "SELECT" | "ECHO" | "TIME" | "LASTSAVE" | "COMMAND COUNT"
    ) || label.starts_with("CLUSTER ")
        || label.starts_with("CLIENT ")
        || label.starts_with("CONFIG ")
        || label.starts_with("ACL ")
}

/// Check whether a command returns nested record maps that must be passed
/// through untouched
///
/// Stream replies are maps whose values are themselves record maps; the
/// outer map is a container, not node-keyed data and not a flat field map,
/// so neither fan-out handling nor key reconstruction may touch it.
#[must_use]
pub fn is_nested_map_command(label: &str) -> bool {
    matches!(
        label,
        "XREAD" | "XREADGROUP" | "XRANGE" | "XREVRANGE" | "XCLAIM" | "XAUTOCLAIM" | "XPENDING"
    )
}

/// Intent of a command with respect to the keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// The command only reads
    ReadOnly,
    /// The command may write
    ReadWrite,
}

/// Classify a command as read-only or read-write
#[must_use]
pub fn classify_command(label: &str) -> CommandKind {
    let read_only = matches!(
        label,
        "GET"
            | "MGET"
            | "GETRANGE"
            | "STRLEN"
            | "EXISTS"
            | "TYPE"
            | "TTL"
            | "PTTL"
            | "KEYS"
            | "RANDOMKEY"
            | "SCAN"
            | "TOUCH"
            | "DUMP"
            | "HGET"
            | "HGETALL"
            | "HMGET"
            | "HKEYS"
            | "HVALS"
            | "HLEN"
            | "HEXISTS"
            | "HSCAN"
            | "HRANDFIELD"
            | "LRANGE"
            | "LLEN"
            | "LINDEX"
            | "LPOS"
            | "SMEMBERS"
            | "SISMEMBER"
            | "SMISMEMBER"
            | "SCARD"
            | "SRANDMEMBER"
            | "SSCAN"
            | "SINTER"
            | "SUNION"
            | "SDIFF"
            | "ZSCORE"
            | "ZMSCORE"
            | "ZCARD"
            | "ZCOUNT"
            | "ZRANK"
            | "ZREVRANK"
            | "ZRANGE"
            | "ZRANGEBYSCORE"
            | "ZRANGEBYLEX"
            | "ZREVRANGE"
            | "ZSCAN"
            | "XLEN"
            | "XRANGE"
            | "XREVRANGE"
            | "XREAD"
            | "XINFO STREAM"
            | "XINFO GROUPS"
            | "GETBIT"
            | "BITCOUNT"
            | "BITPOS"
            | "DBSIZE"
            | "MEMORY USAGE"
            | "OBJECT ENCODING"
            | "OBJECT REFCOUNT"
            | "OBJECT IDLETIME"
            | "PFCOUNT"
    );

    if read_only {
        CommandKind::ReadOnly
    } else {
        CommandKind::ReadWrite
    }
}

/// Explicit read/write split strategy
///
/// Dispatches each command to one of two underlying targets based on the
/// static table above. Replaces interception-based connection splitting
/// with a plain strategy object.
#[derive(Debug)]
pub struct ReadWriteRouter<T> {
    read: T,
    write: T,
}

impl<T> ReadWriteRouter<T> {
    /// Create a new router over a read target and a write target
    pub fn new(read: T, write: T) -> Self {
        Self { read, write }
    }

    /// Select the target for the given command
    pub fn select(&mut self, label: &str) -> &mut T {
        match classify_command(label) {
            CommandKind::ReadOnly => &mut self.read,
            CommandKind::ReadWrite => &mut self.write,
        }
    }

    /// Tear the router apart again
    pub fn into_parts(self) -> (T, T) {
        (self.read, self.write)
    }
}
