//! Benchmark utilities.

use rand::Rng;
use stagekv_storage::{Context, StoreResult, WriteBucket};

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` distinct keys under `prefix`.
pub fn generate_keys(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i:08}")).collect()
}

/// Generate key/value pairs with values of `value_size` bytes.
pub fn generate_entries(prefix: &str, count: usize, value_size: usize) -> Vec<(String, Vec<u8>)> {
    generate_keys(prefix, count)
        .into_iter()
        .map(|key| (key, random_data(value_size)))
        .collect()
}

/// Writes `entries` to `bucket`.
pub fn populate<B: WriteBucket + ?Sized>(
    ctx: &Context,
    bucket: &B,
    entries: &[(String, Vec<u8>)],
) -> StoreResult<()> {
    for (key, value) in entries {
        bucket.set(ctx, key, value)?;
    }
    Ok(())
}
