//! Resolve an HLS manifest and read the head of the virtual byte stream.
//!
//! ```sh
//! cargo run --example ingest -- https://example.com/stream/master.m3u8
//! ```

use std::sync::Arc;

use aulos_hls::{FragmentedSource, ManifestResolver, QualitySelection, SegmentSource, SourceConfig};
use aulos_net::{build_client, NetOptions};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let url: url::Url = std::env::args()
        .nth(1)
        .ok_or("usage: ingest <manifest-url>")?
        .parse()?;

    let net = build_client(&NetOptions::default())?;
    let resolver = ManifestResolver::new(Arc::clone(&net));
    let resolved = resolver.resolve(url, QualitySelection::Highest).await?;

    println!(
        "resolved: live={} variant={:?} segments={}",
        resolved.is_live,
        resolved.selected_variant,
        resolved.media.segments.len()
    );

    let source = SegmentSource::new(
        net,
        resolved.media_url,
        resolved.media,
        SourceConfig::default(),
        CancellationToken::new(),
    );

    let Some((bytes, offset)) = source.read(0, 4096).await? else {
        println!("stream is empty");
        return Ok(());
    };
    println!("read {} bytes at offset {offset}", bytes.len());
    println!(
        "ftyp probe: {:?}",
        bytes.get(4..8).map(|b| String::from_utf8_lossy(b).into_owned())
    );

    let (from, to) = source.available_time_range();
    println!("available time range: {from:.3}s .. {to:.3}s");
    for sequence in source.available_segments().into_iter().take(5) {
        println!(
            "  seq {sequence}: starts at {:?}s, byte offset {:?}",
            source.segment_expected_start_time(sequence),
            source.segment_byte_offset(sequence)
        );
    }

    source.dispose();
    Ok(())
}
