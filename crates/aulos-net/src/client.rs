//! Base reqwest-backed client.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    types::{Headers, RangeSpec},
};

/// Object-safe fetch interface. The HLS layers depend on this trait so tests
/// can substitute deterministic fakes.
#[async_trait]
pub trait Net: Send + Sync {
    /// Fetch the whole resource. Accepts `200` only.
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes>;

    /// Fetch a byte range. Accepts `200` (server ignored the range) and `206`.
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> NetResult<Bytes>;
}

/// reqwest implementation with rustls.
#[derive(Clone, Debug)]
pub struct HttpNet {
    client: reqwest::Client,
}

impl HttpNet {
    pub fn new() -> NetResult<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| NetError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    fn build_request(
        &self,
        url: Url,
        headers: Option<&Headers>,
        range: Option<RangeSpec>,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(headers) = headers {
            for (key, value) in headers.iter() {
                request = request.header(key, value);
            }
        }
        if let Some(range) = range {
            request = request.header("Range", range.to_header_value());
        }
        request
    }

    fn check_status(response: &reqwest::Response, ranged: bool) -> NetResult<()> {
        let status = response.status();
        let ok = status == reqwest::StatusCode::OK
            || (ranged && status == reqwest::StatusCode::PARTIAL_CONTENT);
        if ok {
            Ok(())
        } else {
            Err(NetError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }
}

#[async_trait]
impl Net for HttpNet {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes> {
        let response = self.build_request(url, headers.as_ref(), None).send().await?;
        Self::check_status(&response, false)?;
        Ok(response.bytes().await?)
    }

    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> NetResult<Bytes> {
        let response = self
            .build_request(url, headers.as_ref(), Some(range))
            .send()
            .await?;
        Self::check_status(&response, true)?;
        Ok(response.bytes().await?)
    }
}
