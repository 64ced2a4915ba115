//! Batch helpers over the store contract.
//!
//! None of these are atomic: each stops at the first error, leaving any
//! earlier operations applied.

use crate::bucket::{KeyPrefixTraverser, KeyTraverser, ReadBucket, WriteBucket};
use crate::context::{CancelToken, Context};
use crate::error::{StoreError, StoreResult};
use std::collections::HashMap;

/// Sets every entry of `entries` in `bucket`.
///
/// # Errors
///
/// Returns the first failure, wrapped with its key.
pub fn set_map<B>(ctx: &Context, bucket: &B, entries: &HashMap<String, Vec<u8>>) -> StoreResult<()>
where
    B: WriteBucket + ?Sized,
{
    for (key, value) in entries {
        bucket
            .set(ctx, key, value)
            .map_err(|e| StoreError::failure("set", key.as_str(), e))?;
    }
    Ok(())
}

/// Reads the value of every key in `keys` from `bucket`.
///
/// # Errors
///
/// Returns the first failure, wrapped with its key. A missing key still
/// satisfies [`StoreError::is_not_found`].
pub fn get_map<B, K>(ctx: &Context, bucket: &B, keys: &[K]) -> StoreResult<HashMap<String, Vec<u8>>>
where
    B: ReadBucket + ?Sized,
    K: AsRef<str>,
{
    let mut values = HashMap::with_capacity(keys.len());
    for key in keys {
        let key = key.as_ref();
        let value = bucket
            .get(ctx, key)
            .map_err(|e| StoreError::failure("get", key, e))?;
        values.insert(key.to_string(), value);
    }
    Ok(values)
}

/// Deletes every key in `keys` from `bucket`.
///
/// # Errors
///
/// Returns the first failure, wrapped with its key.
pub fn delete_keys<B, K>(ctx: &Context, bucket: &B, keys: &[K]) -> StoreResult<()>
where
    B: WriteBucket + ?Sized,
    K: AsRef<str>,
{
    for key in keys {
        let key = key.as_ref();
        bucket
            .delete(ctx, key)
            .map_err(|e| StoreError::failure("delete", key, e))?;
    }
    Ok(())
}

/// Collects every key in `bucket`.
///
/// This buffers the whole keyspace, which may be prohibitive for large stores.
pub fn all_keys<B>(ctx: &Context, bucket: &B) -> Vec<String>
where
    B: KeyTraverser + ?Sized,
{
    bucket.keys(ctx, &CancelToken::new()).collect()
}

/// Collects every key in `bucket` that starts with `prefix`.
///
/// This buffers every matching key.
pub fn all_keys_with_prefix<B>(ctx: &Context, bucket: &B, prefix: &str) -> Vec<String>
where
    B: KeyPrefixTraverser + ?Sized,
{
    bucket
        .keys_with_prefix(ctx, prefix, &CancelToken::new())
        .collect()
}
