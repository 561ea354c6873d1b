//! Typed command round trips over the in-memory driver double

mod support;

use bytes::Bytes;
use support::memory_connection;
use valkey_bridge::commands::{BitFieldArgs, BitFieldOverflow, BitFieldType};

#[tokio::test]
async fn test_string_round_trip() {
    let (mut conn, _) = memory_connection();

    assert!(conn.set(b"test_key", b"test_value").await.unwrap().done().unwrap());
    let value = conn.get(b"test_key").await.unwrap().done().unwrap();
    assert_eq!(value, Some(Bytes::from_static(b"test_value")));

    // GETDEL returns the value and removes the key
    let value = conn.get_del(b"test_key").await.unwrap().done().unwrap();
    assert_eq!(value, Some(Bytes::from_static(b"test_value")));
    let value = conn.get(b"test_key").await.unwrap().done().unwrap();
    assert_eq!(value, None);
}

#[tokio::test]
async fn test_counter_commands() {
    let (mut conn, _) = memory_connection();

    assert_eq!(conn.incr(b"n").await.unwrap().done().unwrap(), 1);
    assert_eq!(conn.incr_by(b"n", 10).await.unwrap().done().unwrap(), 11);
    assert_eq!(conn.decr(b"n").await.unwrap().done().unwrap(), 10);
    assert_eq!(conn.decr_by(b"n", 4).await.unwrap().done().unwrap(), 6);
}

#[tokio::test]
async fn test_mget_reports_missing_keys() {
    let (mut conn, _) = memory_connection();

    conn.set(b"a", b"1").await.unwrap().done().unwrap();
    conn.set(b"c", b"3").await.unwrap().done().unwrap();

    let values = conn.mget(&[b"a", b"b", b"c"]).await.unwrap().done().unwrap();
    assert_eq!(
        values,
        vec![
            Some(Bytes::from_static(b"1")),
            None,
            Some(Bytes::from_static(b"3")),
        ]
    );
}

#[tokio::test]
async fn test_hash_round_trip() {
    let (mut conn, _) = memory_connection();

    assert!(conn.hset(b"h", b"f1", b"v1").await.unwrap().done().unwrap());
    assert!(conn.hset(b"h", b"f2", b"v2").await.unwrap().done().unwrap());
    // Overwriting an existing field is not a new field
    assert!(!conn.hset(b"h", b"f1", b"v1b").await.unwrap().done().unwrap());

    let all = conn.hgetall(b"h").await.unwrap().done().unwrap();
    assert_eq!(
        all,
        vec![
            (Bytes::from_static(b"f1"), Bytes::from_static(b"v1b")),
            (Bytes::from_static(b"f2"), Bytes::from_static(b"v2")),
        ]
    );

    assert_eq!(conn.hlen(b"h").await.unwrap().done().unwrap(), 2);
    assert_eq!(conn.hdel(b"h", &[b"f1"]).await.unwrap().done().unwrap(), 1);
    assert!(!conn.hexists(b"h", b"f1").await.unwrap().done().unwrap());
}

#[tokio::test]
async fn test_list_round_trip() {
    let (mut conn, _) = memory_connection();

    conn.rpush(b"l", &[b"a", b"b", b"c"]).await.unwrap().done().unwrap();
    assert_eq!(conn.llen(b"l").await.unwrap().done().unwrap(), 3);

    let range = conn.lrange(b"l", 0, -1).await.unwrap().done().unwrap();
    assert_eq!(
        range,
        vec![
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
        ]
    );

    assert_eq!(
        conn.lpop(b"l").await.unwrap().done().unwrap(),
        Some(Bytes::from_static(b"a"))
    );
    assert_eq!(
        conn.rpop(b"l").await.unwrap().done().unwrap(),
        Some(Bytes::from_static(b"c"))
    );
}

#[tokio::test]
async fn test_set_round_trip() {
    let (mut conn, _) = memory_connection();

    assert_eq!(
        conn.sadd(b"s", &[b"a", b"b", b"a"]).await.unwrap().done().unwrap(),
        2
    );
    assert!(conn.sismember(b"s", b"a").await.unwrap().done().unwrap());
    assert!(!conn.sismember(b"s", b"z").await.unwrap().done().unwrap());
    assert_eq!(conn.scard(b"s").await.unwrap().done().unwrap(), 2);
    assert_eq!(conn.srem(b"s", &[b"a"]).await.unwrap().done().unwrap(), 1);
}

#[tokio::test]
async fn test_sorted_set_with_scores() {
    let (mut conn, _) = memory_connection();

    conn.zadd(b"z", &[(2.0, b"two".as_ref()), (1.0, b"one"), (3.0, b"three")])
        .await
        .unwrap()
        .done()
        .unwrap();

    let members = conn.zrange(b"z", 0, -1).await.unwrap().done().unwrap();
    assert_eq!(
        members,
        vec![
            Bytes::from_static(b"one"),
            Bytes::from_static(b"two"),
            Bytes::from_static(b"three"),
        ]
    );

    let scored = conn
        .zrange_with_scores(b"z", 0, -1)
        .await
        .unwrap()
        .done()
        .unwrap();
    assert_eq!(
        scored,
        vec![
            (Bytes::from_static(b"one"), 1.0),
            (Bytes::from_static(b"two"), 2.0),
            (Bytes::from_static(b"three"), 3.0),
        ]
    );

    assert_eq!(
        conn.zscore(b"z", b"two").await.unwrap().done().unwrap(),
        Some(2.0)
    );
    assert_eq!(
        conn.zscore(b"z", b"missing").await.unwrap().done().unwrap(),
        None
    );
}

#[tokio::test]
async fn test_stream_round_trip() {
    let (mut conn, _) = memory_connection();

    let id1 = conn
        .xadd(b"events", "*", &[(b"action".as_ref(), b"login".as_ref())])
        .await
        .unwrap()
        .done()
        .unwrap();
    let id2 = conn
        .xadd(b"events", "*", &[(b"action".as_ref(), b"logout".as_ref())])
        .await
        .unwrap()
        .done()
        .unwrap();
    assert_ne!(id1, id2);

    assert_eq!(conn.xlen(b"events").await.unwrap().done().unwrap(), 2);

    let entries = conn
        .xrange(b"events", "-", "+", None)
        .await
        .unwrap()
        .done()
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, id1);
    assert_eq!(
        entries[0].fields,
        vec![(Bytes::from_static(b"action"), Bytes::from_static(b"login"))]
    );

    let streams = conn
        .xread(&[(b"events".as_ref(), "0")], None)
        .await
        .unwrap()
        .done()
        .unwrap();
    assert_eq!(streams.len(), 1);
    assert_eq!(&streams[0].0[..], b"events");
    assert_eq!(streams[0].1.len(), 2);
}

#[tokio::test]
async fn test_bitfield_wrap_policy() {
    let (mut conn, _) = memory_connection();
    let u2 = BitFieldType::unsigned(2);

    let mut observed = Vec::new();
    for _ in 0..4 {
        let results = conn
            .bit_field(b"bits", BitFieldArgs::new().incr_by(u2, 0, 1))
            .await
            .unwrap()
            .done()
            .unwrap();
        observed.push(results[0]);
    }

    // A 2-bit unsigned field wraps back to 0 after 3
    assert_eq!(
        observed,
        vec![Some(1), Some(2), Some(3), Some(0)]
    );
}

#[tokio::test]
async fn test_bitfield_sat_policy() {
    let (mut conn, _) = memory_connection();
    let u2 = BitFieldType::unsigned(2);

    let mut observed = Vec::new();
    for _ in 0..4 {
        let results = conn
            .bit_field(
                b"bits",
                BitFieldArgs::new()
                    .overflow(BitFieldOverflow::Sat)
                    .incr_by(u2, 0, 1),
            )
            .await
            .unwrap()
            .done()
            .unwrap();
        observed.push(results[0]);
    }

    // Saturates at the 2-bit maximum instead of wrapping
    assert_eq!(
        observed,
        vec![Some(1), Some(2), Some(3), Some(3)]
    );
}

#[tokio::test]
async fn test_bitfield_fail_policy() {
    let (mut conn, _) = memory_connection();
    let u2 = BitFieldType::unsigned(2);

    let mut observed = Vec::new();
    for _ in 0..4 {
        let results = conn
            .bit_field(
                b"bits",
                BitFieldArgs::new()
                    .overflow(BitFieldOverflow::Fail)
                    .incr_by(u2, 0, 1),
            )
            .await
            .unwrap()
            .done()
            .unwrap();
        observed.push(results[0]);
    }

    // The overflowing increment yields absent and leaves the field at 3
    assert_eq!(observed, vec![Some(1), Some(2), Some(3), None]);

    let read = conn
        .bit_field(b"bits", BitFieldArgs::new().get(u2, 0))
        .await
        .unwrap()
        .done()
        .unwrap();
    assert_eq!(read, vec![Some(3)]);
}

#[tokio::test]
async fn test_key_commands() {
    let (mut conn, _) = memory_connection();

    conn.set(b"k1", b"v").await.unwrap().done().unwrap();
    conn.set(b"k2", b"v").await.unwrap().done().unwrap();

    assert_eq!(conn.exists(&[b"k1", b"k2", b"k3"]).await.unwrap().done().unwrap(), 2);
    assert_eq!(conn.type_of(b"k1").await.unwrap().done().unwrap(), "string");
    assert_eq!(conn.del(&[b"k1", b"k3"]).await.unwrap().done().unwrap(), 1);
    assert_eq!(conn.exists(&[b"k1"]).await.unwrap().done().unwrap(), 0);

    let keys = conn.keys(b"k*").await.unwrap().done().unwrap();
    assert_eq!(keys, vec![Bytes::from_static(b"k2")]);
}
