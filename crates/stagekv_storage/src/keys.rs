//! Lazy, cancellable key enumeration.

use crate::context::CancelToken;

/// A lazy sequence of keys produced by a bucket.
///
/// Keys have no ordering guarantees. The stream checks its [`CancelToken`]
/// before handing out every key. The first time it sees cancellation, or the
/// producer runs dry, the producer is dropped so anything it holds (directory
/// handles, lock guards, borrowed state) is released straight away.
pub struct KeyStream<'a> {
    inner: Option<Box<dyn Iterator<Item = String> + Send + 'a>>,
    cancel: CancelToken,
}

impl<'a> KeyStream<'a> {
    /// Wraps a key producer, stopping it when `cancel` is raised.
    pub fn new<I>(keys: I, cancel: &CancelToken) -> Self
    where
        I: Iterator<Item = String> + Send + 'a,
    {
        Self {
            inner: Some(Box::new(keys)),
            cancel: cancel.clone(),
        }
    }

    /// Returns a stream that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: None,
            cancel: CancelToken::new(),
        }
    }

    /// Returns the token this stream honours.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns true once the producer has been released.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    fn release(&mut self) {
        self.inner = None;
    }
}

impl Iterator for KeyStream<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.cancel.is_cancelled() {
            self.release();
            return None;
        }
        let key = self.inner.as_mut()?.next();
        // the producer may have blocked; look again before handing out a key
        if key.is_none() || self.cancel.is_cancelled() {
            self.release();
            return None;
        }
        key
    }
}

impl std::fmt::Debug for KeyStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStream")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
