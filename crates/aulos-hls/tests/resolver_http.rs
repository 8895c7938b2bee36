//! Resolver behavior against a loopback server.

mod fixture;

use std::{collections::HashMap, sync::Arc};

use aulos_hls::{HlsError, ManifestResolver, QualitySelection};
use aulos_net::{HttpNet, NetClient, NetError};
use bytes::Bytes;
use fixture::MediaServer;
use rstest::{fixture, rstest};

const MASTER: &str = "#EXTM3U\n\
    #EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",URI=\"audio/en.m3u8\"\n\
    #EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"French\",URI=\"audio/fr.m3u8\"\n\
    #EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"other\",NAME=\"Commentary\",URI=\"audio/alt.m3u8\"\n\
    #EXT-X-STREAM-INF:BANDWIDTH=1000000,AUDIO=\"aud\"\n\
    media/low.m3u8\n\
    #EXT-X-STREAM-INF:BANDWIDTH=3000000,AUDIO=\"aud\"\n\
    media/high.m3u8\n";

const MEDIA: &str = "#EXTM3U\n\
    #EXT-X-TARGETDURATION:6\n\
    #EXT-X-MAP:URI=\"init.mp4\"\n\
    #EXTINF:6,\n\
    s0.m4s\n\
    #EXT-X-ENDLIST\n";

const LIVE_MEDIA: &str = "#EXTM3U\n\
    #EXT-X-TARGETDURATION:6\n\
    #EXT-X-MEDIA-SEQUENCE:42\n\
    #EXT-X-MAP:URI=\"init.mp4\"\n\
    #EXTINF:6,\n\
    s42.m4s\n";

#[fixture]
fn net() -> NetClient {
    Arc::new(HttpNet::new().unwrap())
}

async fn server() -> MediaServer {
    let mut files = HashMap::new();
    files.insert("master.m3u8".to_string(), Bytes::from(MASTER));
    files.insert("media/low.m3u8".to_string(), Bytes::from(MEDIA));
    files.insert("media/high.m3u8".to_string(), Bytes::from(LIVE_MEDIA));
    files.insert("empty.m3u8".to_string(), Bytes::from("#EXTM3U\n#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"a\",NAME=\"n\",URI=\"u.m3u8\"\n"));
    files.insert("broken.m3u8".to_string(), Bytes::from("this is not m3u8"));
    MediaServer::start(files).await
}

#[rstest]
#[tokio::test]
async fn master_resolves_to_selected_media_playlist(net: NetClient) {
    let server = server().await;
    let resolver = ManifestResolver::new(net);

    let resolved = resolver
        .resolve(server.url("master.m3u8"), QualitySelection::Highest)
        .await
        .unwrap();

    assert_eq!(resolved.selected_variant, Some(1));
    assert!(resolved.media_url.as_str().ends_with("media/high.m3u8"));
    assert!(resolved.is_live);
    assert_eq!(resolved.media.media_sequence, 42);
    // Audio renditions of the variant's group only.
    assert_eq!(resolved.audio_renditions.len(), 2);
    assert!(resolved
        .audio_renditions
        .iter()
        .all(|r| r.group_id == "aud"));
    assert_eq!(resolved.variant().unwrap().bandwidth, 3_000_000);
}

#[rstest]
#[tokio::test]
async fn media_only_manifest_resolves_directly(net: NetClient) {
    let server = server().await;
    let resolver = ManifestResolver::new(net);

    let resolved = resolver
        .resolve(server.url("media/low.m3u8"), QualitySelection::Auto)
        .await
        .unwrap();

    assert!(resolved.master.is_none());
    assert!(resolved.selected_variant.is_none());
    assert!(!resolved.is_live);
    assert_eq!(resolved.media_url, resolved.base_url);
}

#[rstest]
#[tokio::test]
async fn master_without_variants_is_no_variants(net: NetClient) {
    let server = server().await;
    let resolver = ManifestResolver::new(net);

    let error = resolver
        .resolve(server.url("empty.m3u8"), QualitySelection::Highest)
        .await
        .unwrap_err();
    assert!(matches!(error, HlsError::NoVariants));
}

#[rstest]
#[tokio::test]
async fn parse_failure_carries_through(net: NetClient) {
    let server = server().await;
    let resolver = ManifestResolver::new(net);

    let error = resolver
        .resolve(server.url("broken.m3u8"), QualitySelection::Highest)
        .await
        .unwrap_err();
    assert!(matches!(error, HlsError::Parse(_)));
}

#[rstest]
#[tokio::test]
async fn missing_manifest_is_a_fetch_error_with_status(net: NetClient) {
    let server = server().await;
    let resolver = ManifestResolver::new(net);

    let error = resolver
        .resolve(server.url("nope.m3u8"), QualitySelection::Highest)
        .await
        .unwrap_err();
    match error {
        HlsError::Net(NetError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected a 404 fetch error, got {other:?}"),
    }
}
