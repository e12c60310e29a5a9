//! Model oracle capability
//!
//! The vision model is a text-in/text-out function over one page image. Each
//! call is independent; nothing is retained between calls.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::OracleError;
use crate::models::document::PageImage;

/// Narrow capability contract of the external model
#[async_trait]
pub trait ModelOracle: Send + Sync {
    /// Transcribe or answer about `image` following `prompt`
    ///
    /// `Err` covers both error responses and missing responses; callers do
    /// not distinguish them.
    async fn transcribe(&self, image: &PageImage, prompt: &str) -> Result<String, OracleError>;
}

#[async_trait]
impl<T: ModelOracle + ?Sized> ModelOracle for Arc<T> {
    async fn transcribe(&self, image: &PageImage, prompt: &str) -> Result<String, OracleError> {
        (**self).transcribe(image, prompt).await
    }
}

/// Enforces a minimum delay between consecutive calls
///
/// Elapsed-time check before each call; sleeps for the remainder when the
/// interval has not yet passed.
pub struct RateLimitedOracle<O> {
    inner: O,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<O: ModelOracle> RateLimitedOracle<O> {
    pub fn new(inner: O, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: ModelOracle> ModelOracle for RateLimitedOracle<O> {
    async fn transcribe(&self, image: &PageImage, prompt: &str) -> Result<String, OracleError> {
        {
            let mut last = self.last_call.lock().await;
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < self.min_interval {
                    let wait = self.min_interval - elapsed;
                    debug!("rate limit: waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
            *last = Some(Instant::now());
        }
        self.inner.transcribe(image, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelOracle for Echo {
        async fn transcribe(&self, _image: &PageImage, prompt: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(prompt.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spaces_calls() {
        let oracle = RateLimitedOracle::new(
            Echo {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(4),
        );
        let image = PageImage::png(vec![0]);

        let start = Instant::now();
        oracle.transcribe(&image, "one").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));

        let reply = oracle.transcribe(&image, "two").await.unwrap();
        assert_eq!(reply, "two");
        assert!(start.elapsed() >= Duration::from_secs(4));

        // enough time already passed: no extra wait
        tokio::time::sleep(Duration::from_secs(10)).await;
        let before = Instant::now();
        oracle.transcribe(&image, "three").await.unwrap();
        assert!(before.elapsed() < Duration::from_millis(10));
        assert_eq!(oracle.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_arc_forwarding() {
        let oracle: Arc<dyn ModelOracle> = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let reply = oracle.transcribe(&PageImage::png(vec![]), "hi").await;
        tokio_test::assert_ok!(&reply);
        assert_eq!(reply.unwrap(), "hi");
    }
}
