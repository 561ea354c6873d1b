//! Scan cursor behavior over the in-memory driver double

mod support;

use bytes::Bytes;
use support::memory_connection;
use valkey_bridge::ScanOptions;

#[tokio::test]
async fn test_scan_fetches_batches_transparently() {
    let (mut conn, _) = memory_connection();

    for i in 0..25 {
        let key = format!("key:{i:02}");
        conn.set(key.as_bytes(), b"v").await.unwrap().done().unwrap();
    }

    // A batch hint below the keyspace size forces multiple round trips
    let cursor = conn.scan(ScanOptions::none().count(7));
    let keys = cursor.collect_all().await.unwrap();

    assert_eq!(keys.len(), 25);
    let mut sorted: Vec<Bytes> = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 25, "no key is yielded twice");
}

#[tokio::test]
async fn test_scan_honors_match_pattern() {
    let (mut conn, _) = memory_connection();

    conn.set(b"user:1", b"a").await.unwrap().done().unwrap();
    conn.set(b"user:2", b"b").await.unwrap().done().unwrap();
    conn.set(b"order:1", b"c").await.unwrap().done().unwrap();

    let cursor = conn.scan(ScanOptions::none().matching(b"user:*"));
    let mut keys = cursor.collect_all().await.unwrap();
    keys.sort();

    assert_eq!(
        keys,
        vec![Bytes::from_static(b"user:1"), Bytes::from_static(b"user:2")]
    );
}

#[tokio::test]
async fn test_scan_empty_keyspace_terminates() {
    let (mut conn, _) = memory_connection();

    let mut cursor = conn.scan(ScanOptions::none());
    assert_eq!(cursor.next().await.unwrap(), None);
    assert_eq!(cursor.cursor_id(), 0);
}

#[tokio::test]
async fn test_sscan_iterates_members() {
    let (mut conn, _) = memory_connection();

    let members: Vec<String> = (0..12).map(|i| format!("m{i:02}")).collect();
    let member_refs: Vec<&[u8]> = members.iter().map(|m| m.as_bytes()).collect();
    conn.sadd(b"s", &member_refs).await.unwrap().done().unwrap();

    let cursor = conn.sscan(b"s", ScanOptions::none().count(5));
    let scanned = cursor.collect_all().await.unwrap();
    assert_eq!(scanned.len(), 12);
}

#[tokio::test]
async fn test_hscan_yields_field_value_pairs() {
    let (mut conn, _) = memory_connection();

    conn.hset_multiple(
        b"h",
        &[
            (b"f1".as_ref(), b"v1".as_ref()),
            (b"f2", b"v2"),
            (b"f3", b"v3"),
        ],
    )
    .await
    .unwrap()
    .done()
    .unwrap();

    let cursor = conn.hscan(b"h", ScanOptions::none().count(2));
    let pairs = cursor.collect_all().await.unwrap();

    assert_eq!(pairs.len(), 3);
    assert!(pairs.contains(&(Bytes::from_static(b"f2"), Bytes::from_static(b"v2"))));
}
