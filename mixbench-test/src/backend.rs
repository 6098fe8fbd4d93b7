//! Backend wrappers that inject latency and failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use mixbench_engine::backend::{BackendResult, ObjectMeta, PutResponse};
use mixbench_engine::{Backend, BackendError, Payload};

/// Wraps a backend and delays every call by a fixed amount.
#[derive(Debug)]
pub struct SlowBackend<B> {
    inner: B,
    delay: Duration,
    calls: AtomicUsize,
}

impl<B: Backend> SlowBackend<B> {
    /// Creates a wrapper sleeping `delay` before forwarding each call.
    pub fn new(inner: B, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls that have started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait::async_trait]
impl<B: Backend> Backend for SlowBackend<B> {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn put_object(&self, key: &str, payload: Payload) -> BackendResult<PutResponse> {
        self.pause().await;
        self.inner.put_object(key, payload).await
    }

    async fn get_object(&self, key: &str) -> BackendResult<Bytes> {
        self.pause().await;
        self.inner.get_object(key).await
    }

    async fn stat_object(&self, key: &str) -> BackendResult<ObjectMeta> {
        self.pause().await;
        self.inner.stat_object(key).await
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        self.pause().await;
        self.inner.delete_object(key).await
    }
}

/// Wraps a backend and fails every `nth` call without forwarding it.
#[derive(Debug)]
pub struct FaultyBackend<B> {
    inner: B,
    nth: usize,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl<B: Backend> FaultyBackend<B> {
    /// Creates a wrapper failing calls `nth`, `2 * nth`, and so on.
    pub fn new(inner: B, nth: usize) -> Self {
        assert!(nth > 0, "nth must be positive");
        Self {
            inner,
            nth,
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Number of injected failures.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self, key: &str) -> BackendResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % self.nth == 0 {
            self.failures.fetch_add(1, Ordering::SeqCst);
            let cause = std::io::Error::other(format!("injected failure for {key}"));
            return Err(BackendError::Io(cause));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<B: Backend> Backend for FaultyBackend<B> {
    fn name(&self) -> &'static str {
        "faulty"
    }

    async fn put_object(&self, key: &str, payload: Payload) -> BackendResult<PutResponse> {
        self.check(key)?;
        self.inner.put_object(key, payload).await
    }

    async fn get_object(&self, key: &str) -> BackendResult<Bytes> {
        self.check(key)?;
        self.inner.get_object(key).await
    }

    async fn stat_object(&self, key: &str) -> BackendResult<ObjectMeta> {
        self.check(key)?;
        self.inner.stat_object(key).await
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        self.check(key)?;
        self.inner.delete_object(key).await
    }
}
