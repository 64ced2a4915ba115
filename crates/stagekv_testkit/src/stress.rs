//! Stress tests for transactional buckets.
//!
//! These runs verify behavior under heavy load and concurrent access. Every
//! transaction writes its keys in ascending order, since the lock manager has
//! no deadlock detection.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use stagekv_storage::{
    Bucket, Context, ReadBucket, StoreResult, TraversingBucket, TxnBeginner, TxnCompleter,
};
use stagekv_txn::TxnBucket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome counts of one stress run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressRun {
    /// Operations that returned `Ok`.
    pub succeeded: usize,
    /// Operations that returned an error.
    pub failed: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl StressRun {
    fn finish(succeeded: usize, failed: usize, start: Instant) -> Self {
        let run = Self {
            succeeded,
            failed,
            elapsed: start.elapsed(),
        };
        debug!(succeeded, failed, elapsed = ?run.elapsed, "stress run finished");
        run
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations (or transactions) to perform.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
    /// Keys written per transaction.
    pub keys_per_txn: usize,
    /// Fraction of transactions rolled back instead of committed.
    pub rollback_ratio: f64,
    /// Seed for the per-thread random generators.
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            key_count: 1_000,
            keys_per_txn: 4,
            rollback_ratio: 0.25,
            seed: 0x5eed,
        }
    }
}

/// Returns the key name for index `i`.
pub fn stress_key(i: usize) -> String {
    format!("key_{i:06}")
}

/// Run a sequential auto-commit write stress test.
pub fn stress_sequential_writes<B: Bucket + ?Sized>(
    bucket: &B,
    config: &StressConfig,
) -> StressRun {
    let ctx = Context::background();
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match bucket.set(&ctx, &stress_key(i % config.key_count), &value) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressRun::finish(successful, failed, start)
}

/// Run a mixed read/write/delete stress test.
pub fn stress_mixed_operations<B: Bucket + ?Sized>(
    bucket: &B,
    config: &StressConfig,
) -> StressRun {
    let ctx = Context::background();
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = stress_key(i % config.key_count);

        let result = match i % 3 {
            0 => bucket.set(&ctx, &key, &value),
            1 => match bucket.get(&ctx, &key) {
                Err(e) if !e.is_not_found() => Err(e),
                _ => Ok(()),
            },
            _ => bucket.delete(&ctx, &key),
        };

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressRun::finish(successful, failed, start)
}

fn run_txn<T>(ctx: &Context, txn: &T, keys: &[String], value: &[u8], commit: bool) -> StoreResult<()>
where
    T: TraversingBucket + TxnCompleter,
{
    for key in keys {
        txn.set(ctx, key, value)?;
    }
    if commit {
        txn.commit(ctx)
    } else {
        txn.rollback(ctx)
    }
}

/// Counts of a concurrent transaction run.
#[derive(Debug, Clone)]
pub struct ConcurrentTxnResult {
    /// Totals, counting one operation per transaction.
    pub run: StressRun,
    /// Transactions committed.
    pub committed: usize,
    /// Transactions rolled back on purpose.
    pub rolled_back: usize,
}

/// Run transactions from several threads at once against one root bucket.
///
/// Each transaction writes `keys_per_txn` random keys, tagged with the
/// writing thread's id, then commits or rolls back.
pub fn stress_concurrent_txns<B>(root: &TxnBucket<B>, config: &StressConfig) -> ConcurrentTxnResult
where
    B: TraversingBucket,
{
    let committed = AtomicUsize::new(0);
    let rolled_back = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let ops_per_thread = config.operations / config.threads.max(1);
    let keys_per_txn = config.keys_per_txn.min(config.key_count);

    let start = Instant::now();

    thread::scope(|s| {
        for t in 0..config.threads {
            let committed = &committed;
            let rolled_back = &rolled_back;
            let failed = &failed;
            s.spawn(move || {
                let ctx = Context::background();
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let mut value = vec![0u8; config.value_size.max(1)];
                value[0] = t as u8;

                for _ in 0..ops_per_thread {
                    let mut indices = sample(&mut rng, config.key_count, keys_per_txn).into_vec();
                    indices.sort_unstable();
                    let keys: Vec<String> = indices.into_iter().map(stress_key).collect();
                    let commit = !rng.gen_bool(config.rollback_ratio.clamp(0.0, 1.0));

                    let outcome = root
                        .begin_txn(&ctx)
                        .and_then(|txn| run_txn(&ctx, &txn, &keys, &value, commit));
                    let counter = match (outcome, commit) {
                        (Ok(()), true) => committed,
                        (Ok(()), false) => rolled_back,
                        (Err(_), _) => failed,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    let committed = committed.into_inner();
    let rolled_back = rolled_back.into_inner();
    let failed = failed.into_inner();
    ConcurrentTxnResult {
        run: StressRun::finish(committed + rolled_back, failed, start),
        committed,
        rolled_back,
    }
}

/// Run a large transaction stress test.
pub fn stress_large_transactions<B>(root: &TxnBucket<B>, config: &StressConfig) -> StressRun
where
    B: TraversingBucket,
{
    const BATCH_SIZE: usize = 100;

    let ctx = Context::background();
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for batch in 0..(config.operations / BATCH_SIZE) {
        let keys: Vec<String> = (0..BATCH_SIZE)
            .map(|i| stress_key((batch * BATCH_SIZE + i) % config.key_count))
            .collect();
        let result = root
            .begin_txn(&ctx)
            .and_then(|txn| run_txn(&ctx, &txn, &keys, &value, true));

        match result {
            Ok(()) => successful += BATCH_SIZE,
            Err(_) => failed += BATCH_SIZE,
        }
    }

    StressRun::finish(successful, failed, start)
}

/// Checks that every stored stress key holds a value written by one of
/// `threads` writers. Returns the number of keys checked.
pub fn verify_thread_tagged_values<B: ReadBucket + ?Sized>(
    bucket: &B,
    config: &StressConfig,
) -> usize {
    let ctx = Context::background();
    let mut checked = 0;
    for i in 0..config.key_count {
        if let Ok(value) = bucket.get(&ctx, &stress_key(i)) {
            assert_eq!(value.len(), config.value_size.max(1), "torn value for {}", stress_key(i));
            assert!(
                (value[0] as usize) < config.threads,
                "value for {} written by unknown thread {}",
                stress_key(i),
                value[0]
            );
            checked += 1;
        }
    }
    checked
}
