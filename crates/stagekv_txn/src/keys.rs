//! Key enumeration merged with staged operations.

use crate::txn::TxnBucket;
use stagekv_storage::{
    CancelToken, Context, KeyPrefixTraverser, KeyStream, KeyTraverser, TraversingBucket,
};
use std::iter;

impl<B: TraversingBucket> TxnBucket<B> {
    /// Merges the store's keys with this transaction's stage.
    ///
    /// Store keys with any staged operation are skipped, so a staged delete
    /// hides the key and a staged write is not listed twice. Staged writes
    /// matching `prefix` follow once the store's keys are exhausted. Key
    /// locks are not consulted.
    fn merge_staged<'a>(
        &'a self,
        stored: KeyStream<'a>,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'a> {
        let stage = &self.stage;
        let prefix = prefix.to_string();
        let unstaged = stored.filter(move |key| !stage.read().contains(key));
        // read the stage only after the store is drained
        let staged = iter::once(()).flat_map(move |()| stage.read().keys(&prefix, true));
        KeyStream::new(unstaged.chain(staged), cancel)
    }
}

impl<B: TraversingBucket> KeyTraverser for TxnBucket<B> {
    /// Returns the store's keys merged with this transaction's staged keys.
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
        self.merge_staged(self.store.keys(ctx, cancel), "", cancel)
    }
}

impl<B: TraversingBucket> KeyPrefixTraverser for TxnBucket<B> {
    /// Returns the store's keys starting with `prefix` merged with this
    /// transaction's staged keys starting with `prefix`.
    fn keys_with_prefix(
        &self,
        ctx: &Context,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'_> {
        self.merge_staged(self.store.keys_with_prefix(ctx, prefix, cancel), prefix, cancel)
    }
}
