//! Prefix-namespacing adapter.

use crate::bucket::{KeyPrefixTraverser, KeyTraverser, ReadBucket, TraversingBucket, WriteBucket};
use crate::context::{CancelToken, Context};
use crate::error::StoreResult;
use crate::keys::KeyStream;

/// A view of another bucket in which every key carries a fixed prefix.
///
/// Keys passed in are prepended with the prefix before reaching the inner
/// bucket, and enumerated keys have it stripped again. Several prefix buckets
/// can share one inner bucket without seeing each other's keys.
#[derive(Debug)]
pub struct PrefixBucket<B> {
    prefix: String,
    inner: B,
}

impl<B: TraversingBucket> PrefixBucket<B> {
    /// Creates a prefix view over `inner`.
    pub fn new(prefix: impl Into<String>, inner: B) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the wrapped bucket.
    #[must_use]
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn full_key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.prefix.len() + key.len());
        full.push_str(&self.prefix);
        full.push_str(key);
        full
    }
}

impl<B: TraversingBucket> ReadBucket for PrefixBucket<B> {
    fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool> {
        self.inner.has(ctx, &self.full_key(key))
    }

    fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(ctx, &self.full_key(key))
    }
}

impl<B: TraversingBucket> WriteBucket for PrefixBucket<B> {
    fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.set(ctx, &self.full_key(key), value)
    }

    fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()> {
        self.inner.delete(ctx, &self.full_key(key))
    }
}

impl<B: TraversingBucket> KeyTraverser for PrefixBucket<B> {
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
        self.keys_with_prefix(ctx, "", cancel)
    }
}

impl<B: TraversingBucket> KeyPrefixTraverser for PrefixBucket<B> {
    fn keys_with_prefix(
        &self,
        ctx: &Context,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'_> {
        let strip = self.prefix.len();
        let inner = self
            .inner
            .keys_with_prefix(ctx, &self.full_key(prefix), cancel)
            .filter_map(move |key| key.get(strip..).map(str::to_string));
        KeyStream::new(inner, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::all_keys;
    use crate::MemoryBucket;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn prefix_is_applied_to_inner_keys() {
        let ctx = Context::background();
        let inner = Arc::new(MemoryBucket::new());
        let bucket = PrefixBucket::new("app1.", inner.clone());

        bucket.set(&ctx, "lorem", b"ipsum").unwrap();
        assert_eq!(inner.get(&ctx, "app1.lorem").unwrap(), b"ipsum");
        assert_eq!(bucket.get(&ctx, "lorem").unwrap(), b"ipsum");
        assert!(bucket.has(&ctx, "lorem").unwrap());
        assert_eq!(bucket.prefix(), "app1.");
    }

    #[test]
    fn prefixes_are_isolated() {
        let ctx = Context::background();
        let inner = Arc::new(MemoryBucket::new());
        let one = PrefixBucket::new("one.", inner.clone());
        let two = PrefixBucket::new("two.", inner.clone());

        one.set(&ctx, "k", b"1").unwrap();
        two.set(&ctx, "k", b"2").unwrap();

        assert_eq!(one.get(&ctx, "k").unwrap(), b"1");
        assert_eq!(all_keys(&ctx, &one), vec!["k"]);
        assert_eq!(inner.len(), 2);

        two.delete(&ctx, "k").unwrap();
        assert!(two.get(&ctx, "k").unwrap_err().is_not_found());
        assert!(one.has(&ctx, "k").unwrap());
    }

    proptest! {
        #[test]
        fn enumerated_keys_round_trip(keys in prop::collection::hash_set("[a-z]{1,8}", 0..16)) {
            let ctx = Context::background();
            let bucket = PrefixBucket::new("ns/", MemoryBucket::new());
            for key in &keys {
                bucket.set(&ctx, key, b"v").unwrap();
            }

            let listed: std::collections::HashSet<String> = all_keys(&ctx, &bucket).into_iter().collect();
            prop_assert_eq!(listed, keys);
        }
    }
}
