//! End-to-end transaction scenarios over the workspace buckets.

use stagekv_storage::{
    all_keys, CancelToken, Context, FileBucket, KeyTraverser, MemoryBucket, ReadBucket, StoreError,
    TxnBeginner, TxnCompleter, WriteBucket,
};
use stagekv_testkit::prelude::*;
use stagekv_txn::{perform_txn, PendingOp, TxnBucket, TxnError};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn rollback_on_empty_store_leaves_nothing() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(MemoryBucket::new());

    let txn = root.begin_txn(&ctx).unwrap();
    txn.set(&ctx, "a", b"1").unwrap();
    assert_eq!(txn.get(&ctx, "a").unwrap(), b"1");
    txn.rollback(&ctx).unwrap();

    assert!(root.get(&ctx, "a").unwrap_err().is_not_found());
    assert_eq!(root.lock_manager().entry_count(), 0);
}

#[test]
fn rollback_then_commit_over_file_bucket() {
    init_tracing();
    let ctx = Context::background();
    let temp = TempDir::new().unwrap();
    let root = TxnBucket::new(FileBucket::open(temp.path()).unwrap());
    root.set(&ctx, "k1", b"v1").unwrap();

    let txn = root.begin_txn(&ctx).unwrap();
    txn.set(&ctx, "k1", b"v2").unwrap();
    txn.rollback(&ctx).unwrap();
    assert_eq!(root.get(&ctx, "k1").unwrap(), b"v1");

    let txn = root.begin_txn(&ctx).unwrap();
    txn.set(&ctx, "k1", b"v2").unwrap();
    txn.commit(&ctx).unwrap();
    assert_eq!(root.get(&ctx, "k1").unwrap(), b"v2");
    assert_eq!(txn.staged_len(), 0);
    assert_eq!(std::fs::read(temp.path().join("k1")).unwrap(), b"v2");
}

#[test]
fn dropped_transaction_is_rolled_back() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(MemoryBucket::new());

    {
        let txn = root.begin_txn(&ctx).unwrap();
        txn.set(&ctx, "x", b"1").unwrap();
        assert_eq!(root.lock_manager().entry_count(), 1);
    }

    assert_eq!(root.lock_manager().entry_count(), 0);
    root.set(&ctx, "x", b"2").unwrap();
    assert!(root.store().snapshot().contains_key("x"));
}

#[test]
fn sibling_writes_invisible_until_commit() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(MemoryBucket::new());

    let writer = root.begin_txn(&ctx).unwrap();
    let reader = root.begin_txn(&ctx).unwrap();
    writer.set(&ctx, "shared", b"new").unwrap();

    assert!(all_keys(&ctx, &reader).is_empty());
    writer.commit(&ctx).unwrap();
    assert_eq!(reader.get(&ctx, "shared").unwrap(), b"new");
}

#[test]
fn sibling_write_blocks_until_commit() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(MemoryBucket::new());
    let first = root.begin_txn(&ctx).unwrap();
    first.set(&ctx, "x", b"first").unwrap();

    let (tx, rx) = mpsc::channel();
    let root_ref = &root;
    thread::scope(|s| {
        s.spawn(move || {
            let ctx = Context::background();
            let second = root_ref.begin_txn(&ctx).unwrap();
            second.set(&ctx, "x", b"second").unwrap();
            tx.send(()).unwrap();
            second.commit(&ctx).unwrap();
        });

        assert!(
            rx.recv_timeout(Duration::from_millis(50)).is_err(),
            "second writer was not blocked"
        );
        first.commit(&ctx).unwrap();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("second writer never unblocked");
    });

    assert_eq!(root.get(&ctx, "x").unwrap(), b"second");
}

#[test]
fn partial_commit_can_be_retried() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(FaultyBucket::new());
    root.store().fail_on("bad");

    let txn = root.begin_txn(&ctx).unwrap();
    txn.set(&ctx, "good", b"1").unwrap();
    txn.set(&ctx, "bad", b"2").unwrap();
    txn.delete(&ctx, "gone").unwrap();

    let err = txn.commit(&ctx).unwrap_err();
    let StoreError::PartialCommit { key, remaining, .. } = &err else {
        panic!("expected a partial commit, got {err}");
    };
    assert_eq!(key, "bad");
    assert!(*remaining >= 1);
    assert_eq!(txn.staged("bad"), Some(PendingOp::Set(b"2".to_vec())));
    assert_eq!(txn.staged_len(), *remaining);

    root.store().heal_all();
    txn.commit(&ctx).unwrap();
    assert_eq!(root.get(&ctx, "good").unwrap(), b"1");
    assert_eq!(root.get(&ctx, "bad").unwrap(), b"2");
    assert_eq!(root.lock_manager().entry_count(), 0);
}

#[test]
fn partial_commit_then_rollback_keeps_applied_writes() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(FaultyBucket::new());
    root.store().fail_on("bad");

    let txn = root.begin_txn(&ctx).unwrap();
    for key in ["a", "b", "c", "bad"] {
        txn.set(&ctx, key, key.as_bytes()).unwrap();
    }
    let err = txn.commit(&ctx).unwrap_err();
    assert!(matches!(err, StoreError::PartialCommit { .. }));

    txn.rollback(&ctx).unwrap();
    assert_eq!(txn.staged_len(), 0);
    assert!(root.get(&ctx, "bad").unwrap_err().is_not_found());
    // whatever was applied before the failure stays applied
    let applied = root.store().inner().len();
    assert!(applied <= 3);
    assert_eq!(root.lock_manager().entry_count(), 0);
}

#[test]
fn perform_txn_commits_or_rolls_back() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(MemoryBucket::new());

    let n = perform_txn(&ctx, &root, |ctx, txn| {
        txn.set(ctx, "a", b"1")?;
        txn.set(ctx, "b", b"2")?;
        Ok(2)
    })
    .unwrap();
    assert_eq!(n, 2);
    assert_eq!(root.store().len(), 2);

    let err = perform_txn(&ctx, &root, |ctx, txn| {
        txn.delete(ctx, "a")?;
        txn.get(ctx, "missing").map(|_| ())
    })
    .unwrap_err();
    assert!(matches!(err, TxnError::RolledBack(_)));
    assert!(err.is_not_found());
    assert_eq!(root.get(&ctx, "a").unwrap(), b"1");
}

#[test]
fn cancelled_enumeration_stops_and_unlocks_writers() {
    init_tracing();
    let ctx = Context::background();
    let root = TxnBucket::new(MemoryBucket::new());
    for i in 0..10 {
        root.set(&ctx, &format!("k{i}"), b"v").unwrap();
    }

    let txn = root.begin_txn(&ctx).unwrap();
    txn.set(&ctx, "staged", b"v").unwrap();

    let cancel = CancelToken::new();
    let mut keys = txn.keys(&ctx, &cancel);
    assert!(keys.next().is_some());
    cancel.cancel();
    assert!(keys.next().is_none());
    drop(keys);

    root.set(&ctx, "k0", b"w").unwrap();
    assert_eq!(root.get(&ctx, "k0").unwrap(), b"w");
}

#[test]
fn expired_deadline_fails_file_operations() {
    init_tracing();
    let temp = TempFileBucket::new();
    let ctx = Context::background().with_timeout(Duration::ZERO);
    thread::sleep(Duration::from_millis(1));

    let err = temp.set(&ctx, "k", b"v").unwrap_err();
    assert!(err.is_cancelled());
}
