use thiserror::Error;

/// Why a read fell off the live window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveEdgeKind {
    /// The read cursor fell below the start of the sliding window; the
    /// consumer must seek forward to recover.
    BehindWindow,
    /// The source waited for fresh segments and none arrived before the
    /// deadline; the consumer may simply retry.
    Timeout,
}

/// HLS ingest errors.
#[derive(Debug, Error)]
pub enum HlsError {
    #[error("network error: {0}")]
    Net(#[from] aulos_net::NetError),

    #[error(transparent)]
    Parse(#[from] aulos_m3u8::ParseError),

    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("master playlist has no variants")]
    NoVariants,

    #[error("variant not found: {0}")]
    VariantNotFound(String),

    #[error("segment not found: sequence {0}")]
    SegmentNotFound(u64),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("live edge: {0:?}")]
    LiveEdge(LiveEdgeKind),

    #[error("source disposed")]
    Disposed,
}

impl HlsError {
    /// Whether this is a live-edge condition the consumer recovers from by
    /// seeking (rather than a fatal failure).
    #[must_use]
    pub fn is_live_edge(&self) -> bool {
        matches!(self, Self::LiveEdge(_))
    }
}

pub type HlsResult<T> = Result<T, HlsError>;
