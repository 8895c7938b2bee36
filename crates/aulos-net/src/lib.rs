#![forbid(unsafe_code)]

//! HTTP fetch abstraction for the HLS engine.
//!
//! [`Net`] is the object-safe interface the HLS layers depend on; [`HttpNet`]
//! is the reqwest implementation, and [`TimeoutNet`] / [`RetryNet`] stack on
//! top of any implementation.

mod client;
mod error;
mod retry;
mod timeout;
mod types;

use std::{sync::Arc, time::Duration};

pub use client::{HttpNet, Net};
pub use error::{NetError, NetResult};
pub use retry::{RetryHook, RetryNet};
pub use timeout::TimeoutNet;
pub use types::{Headers, NetOptions, RangeSpec, RetryPolicy};

/// Shared client handle as the HLS layers consume it.
pub type NetClient = Arc<dyn Net>;

/// Default stack: reqwest under retry under a per-operation deadline.
pub fn build_client(options: &NetOptions) -> NetResult<NetClient> {
    let base = HttpNet::new()?;
    let retry = RetryNet::new(
        base,
        RetryPolicy::new(
            options.max_retries,
            options.retry_base_delay,
            options.max_retry_delay,
        ),
    );
    Ok(Arc::new(TimeoutNet::new(retry, options.request_timeout)))
}

/// Like [`build_client`], with a caller-supplied retry hook.
pub fn build_client_with_hook(options: &NetOptions, hook: RetryHook) -> NetResult<NetClient> {
    let base = HttpNet::new()?;
    let retry = RetryNet::new(
        base,
        RetryPolicy::new(
            options.max_retries,
            options.retry_base_delay,
            options.max_retry_delay,
        ),
    )
    .with_hook(hook);
    Ok(Arc::new(TimeoutNet::new(retry, options.request_timeout)))
}

/// Convenience for one-off deadlines tighter than the stack default.
pub async fn with_deadline<T>(
    deadline: Duration,
    future: impl std::future::Future<Output = NetResult<T>>,
) -> NetResult<T> {
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| NetError::Timeout)?
}
