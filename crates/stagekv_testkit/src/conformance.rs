//! Conformance suites for bucket implementations.
//!
//! Each suite panics with a descriptive message on the first violation, so
//! it can be called directly from a `#[test]`.

use stagekv_storage::{
    all_keys, all_keys_with_prefix, set_map, Bucket, Context, ReadBucket, StoreError,
    TransactionalBucket, TraversingBucket, TxnBeginner, TxnCompleter, WriteBucket,
};
use std::collections::HashMap;

/// Exercises get, set, has, and delete, including idempotent deletes and
/// not-found reporting.
pub fn check_bucket_simple<B: Bucket + ?Sized>(ctx: &Context, bucket: &B) {
    const MISSING_KEY: &str = "test_key_1";
    const PRESENT_KEY: &str = "test_key_2";
    const VALUE: &[u8] = b"test_value_1";

    for i in 0..5 {
        let missing = format!("{MISSING_KEY}_iter_{i}");
        let present = format!("{PRESENT_KEY}_iter_{i}");

        bucket.delete(ctx, &missing).expect("delete");
        // again, to catch buckets that fail on absent keys
        bucket
            .delete(ctx, &missing)
            .unwrap_or_else(|e| panic!("delete of absent key {missing} failed: {e}"));

        match bucket.get(ctx, &missing) {
            Ok(_) => panic!("get of absent key {missing} should fail"),
            Err(e) => assert!(e.is_not_found(), "expected not found for {missing}, got: {e}"),
        }
        assert!(!bucket.has(ctx, &missing).expect("has"), "{missing} should be absent");

        bucket.set(ctx, &present, VALUE).expect("set");
        assert!(bucket.has(ctx, &present).expect("has"), "{present} should be found");
        assert_eq!(bucket.get(ctx, &present).expect("get"), VALUE);

        bucket.delete(ctx, &present).expect("cleanup delete");
    }
}

fn sample_entries() -> HashMap<String, Vec<u8>> {
    [
        ("hello", "world"),
        ("foo", "bar"),
        ("help", "i need somebody"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
    .collect()
}

/// Exercises key enumeration with and without a prefix.
///
/// `bucket` must start out empty, since every enumerated key is checked.
pub fn check_keys_traversing<B: TraversingBucket + ?Sized>(ctx: &Context, bucket: &B) {
    let entries = sample_entries();
    set_map(ctx, bucket, &entries).expect("set_map");

    let mut remaining = entries.clone();
    for key in all_keys(ctx, bucket) {
        assert!(
            remaining.remove(&key).is_some(),
            "unexpected or duplicate key returned: {key}"
        );
    }
    assert!(remaining.is_empty(), "keys not returned: {:?}", remaining.keys());

    let mut remaining = entries.clone();
    for key in all_keys_with_prefix(ctx, bucket, "hel") {
        assert!(
            remaining.remove(&key).is_some(),
            "unexpected or duplicate prefixed key returned: {key}"
        );
    }
    assert_eq!(remaining.len(), 1, "only foo should be left: {:?}", remaining.keys());
    assert_eq!(remaining.get("foo"), entries.get("foo"));
}

/// Exercises rollback and commit of transactions begun from `bucket`.
pub fn check_txn_simple<B>(ctx: &Context, bucket: &B)
where
    B: TxnBeginner + Bucket + ?Sized,
{
    const KEY1: &str = "test-txn-key-1";
    const KEY2: &str = "test-txn-key-2";

    bucket.set(ctx, KEY1, b"test-txn-val-1").expect("parent set");
    assert_eq!(bucket.get(ctx, KEY1).expect("parent get"), b"test-txn-val-1");

    let txn = bucket.begin_txn(ctx).expect("begin");
    assert_eq!(txn.get(ctx, KEY1).expect("txn get"), b"test-txn-val-1");

    txn.set(ctx, KEY1, b"test-txn-val-2").expect("txn set");
    txn.rollback(ctx).expect("rollback");

    assert_eq!(
        bucket.get(ctx, KEY1).expect("parent get after rollback"),
        b"test-txn-val-1",
        "rolled back write reached the parent"
    );
    assert_eq!(
        txn.get(ctx, KEY1).expect("txn get after rollback"),
        b"test-txn-val-1",
        "rolled back write still visible in the transaction"
    );

    txn.set(ctx, KEY1, b"test-txn-val-2").expect("txn set");
    txn.commit(ctx).expect("commit");
    assert_eq!(
        bucket.get(ctx, KEY1).expect("parent get after commit"),
        b"test-txn-val-2",
        "committed write missing from the parent"
    );

    let txn = bucket.begin_txn(ctx).expect("begin");
    txn.set(ctx, KEY2, b"test-txn-val-3").expect("txn set");
    assert_eq!(txn.get(ctx, KEY2).expect("txn get"), b"test-txn-val-3");
    txn.rollback(ctx).expect("rollback");

    assert_not_found(txn.get(ctx, KEY2), KEY2);
    assert_not_found(bucket.get(ctx, KEY2), KEY2);
}

/// Exercises key enumeration inside a transaction against staged writes
/// and deletes.
///
/// `bucket` must start out empty.
pub fn check_txn_keys<B: TransactionalBucket + ?Sized>(ctx: &Context, bucket: &B) {
    bucket.set(ctx, "hello", b"dlrow").expect("parent set");

    let txn = bucket.begin_txn(ctx).expect("begin");
    txn.set(ctx, "hello", b"world").expect("txn set");
    assert_eq!(all_keys(ctx, &txn), vec!["hello".to_string()]);

    txn.delete(ctx, "hello").expect("txn delete");
    assert!(
        all_keys(ctx, &txn).is_empty(),
        "staged delete should hide the key"
    );

    txn.rollback(ctx).expect("rollback");
    assert_eq!(all_keys(ctx, bucket), vec!["hello".to_string()]);

    bucket.delete(ctx, "hello").expect("cleanup delete");
}

fn assert_not_found(result: Result<Vec<u8>, StoreError>, key: &str) {
    match result {
        Ok(value) => panic!("{key} should be missing, found {value:?}"),
        Err(e) => assert!(e.is_not_found(), "expected not found for {key}, got: {e}"),
    }
}
