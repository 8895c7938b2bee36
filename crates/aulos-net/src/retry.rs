//! Retry layer with exponential backoff and an optional caller hook.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::{
    client::Net,
    error::{NetError, NetResult},
    types::{Headers, RangeSpec, RetryPolicy},
};

/// Caller-supplied retry decision. Receives `(attempt_index, previous_error,
/// url)` and returns the delay before the next attempt, or `None` to give up.
pub type RetryHook = Arc<dyn Fn(u32, &NetError, &Url) -> Option<Duration> + Send + Sync>;

/// Retry decorator for [`Net`] implementations.
///
/// Without a hook, retryable errors back off exponentially per the policy;
/// with a hook, the hook alone decides whether and how long to wait.
pub struct RetryNet<N> {
    inner: N,
    policy: RetryPolicy,
    hook: Option<RetryHook>,
}

impl<N: Net> RetryNet<N> {
    pub fn new(inner: N, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: RetryHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Delay before retrying `attempt`, or `None` to stop.
    fn next_delay(&self, attempt: u32, error: &NetError, url: &Url) -> Option<Duration> {
        if let Some(hook) = &self.hook {
            return hook(attempt, error, url);
        }
        if attempt >= self.policy.max_retries || !error.is_retryable() {
            return None;
        }
        Some(self.policy.delay_for_attempt(attempt + 1))
    }

    async fn run<T, F, Fut>(&self, url: &Url, mut operation: F) -> NetResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = NetResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.next_delay(attempt, &error, url) {
                    Some(delay) => {
                        debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying fetch");
                        sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        if attempt == 0 {
                            return Err(error);
                        }
                        return Err(NetError::RetryExhausted {
                            attempts: attempt + 1,
                            source: Box::new(error),
                        });
                    }
                },
            }
        }
    }
}

#[async_trait]
impl<N: Net> Net for RetryNet<N> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes> {
        self.run(&url, || self.inner.get_bytes(url.clone(), headers.clone()))
            .await
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> NetResult<Bytes> {
        self.run(&url, || {
            self.inner.get_range(url.clone(), range, headers.clone())
        })
        .await
    }
}
