//! URL resolution helpers.

use url::Url;

use crate::error::{HlsError, HlsResult};

/// RFC 3986 relative resolution against a base document URL.
pub fn resolve_url(base: &Url, uri: &str) -> HlsResult<Url> {
    base.join(uri)
        .map_err(|e| HlsError::InvalidUrl(format!("{uri:?} against {base}: {e}")))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("seg1.mp4", "https://cdn.example/live/seg1.mp4")]
    #[case("media/seg1.mp4", "https://cdn.example/live/media/seg1.mp4")]
    #[case("/root.mp4", "https://cdn.example/root.mp4")]
    #[case("../up.mp4", "https://cdn.example/up.mp4")]
    #[case("https://other.example/abs.mp4", "https://other.example/abs.mp4")]
    fn resolves_relative_and_absolute(#[case] uri: &str, #[case] expected: &str) {
        let base = Url::parse("https://cdn.example/live/playlist.m3u8").unwrap();
        assert_eq!(resolve_url(&base, uri).unwrap().as_str(), expected);
    }
}
