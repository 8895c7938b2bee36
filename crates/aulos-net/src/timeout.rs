//! Per-operation deadline layer.
//!
//! The deadline covers the whole operation, headers and body both.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::timeout;
use url::Url;

use crate::{
    client::Net,
    error::{NetError, NetResult},
    types::{Headers, RangeSpec},
};

/// Timeout decorator for [`Net`] implementations.
pub struct TimeoutNet<N> {
    inner: N,
    deadline: Duration,
}

impl<N: Net> TimeoutNet<N> {
    pub fn new(inner: N, deadline: Duration) -> Self {
        Self { inner, deadline }
    }
}

#[async_trait]
impl<N: Net> Net for TimeoutNet<N> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes> {
        timeout(self.deadline, self.inner.get_bytes(url, headers))
            .await
            .map_err(|_| NetError::Timeout)?
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> NetResult<Bytes> {
        timeout(self.deadline, self.inner.get_range(url, range, headers))
            .await
            .map_err(|_| NetError::Timeout)?
    }
}
