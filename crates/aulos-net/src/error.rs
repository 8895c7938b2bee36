use thiserror::Error;

pub type NetResult<T> = Result<T, NetError>;

/// Transport-level fetch errors.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("timeout")]
    Timeout,

    #[error("request failed after {attempts} attempts: {source}")]
    RetryExhausted { attempts: u32, source: Box<NetError> },
}

impl NetError {
    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Self::Http(message) => {
                message.contains("timeout")
                    || message.contains("connection")
                    || message.contains("network")
                    || message.contains("body")
            }
            Self::RetryExhausted { .. } => false,
        }
    }

    /// HTTP status code, when the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetryExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout;
        }
        // Alternate formatting keeps the full cause chain in the message.
        Self::Http(format!("{error:#}"))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::timeout(NetError::Timeout, true)]
    #[case::server_error(NetError::Status { status: 503, url: "http://x/".into() }, true)]
    #[case::too_many_requests(NetError::Status { status: 429, url: "http://x/".into() }, true)]
    #[case::not_found(NetError::Status { status: 404, url: "http://x/".into() }, false)]
    #[case::exhausted(
        NetError::RetryExhausted { attempts: 3, source: Box::new(NetError::Timeout) },
        false
    )]
    fn retryability(#[case] error: NetError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[test]
    fn status_is_visible_through_retry_exhausted() {
        let error = NetError::RetryExhausted {
            attempts: 2,
            source: Box::new(NetError::Status {
                status: 502,
                url: "http://x/seg.mp4".into(),
            }),
        };
        assert_eq!(error.status(), Some(502));
    }
}
