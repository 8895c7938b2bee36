//! Shared test fixtures: a loopback media server and a scripted demuxer.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use aulos_hls::{
    ByteSource, Demuxer, FragmentEntry, FragmentLookupSink, FragmentedSource, HlsResult,
    MemoryLookupTable, Track, TrackKind,
};
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use url::Url;

/// Deterministic segment payload.
pub fn pattern_bytes(len: usize, seed: u8) -> Bytes {
    (0..len)
        .map(|i| seed.wrapping_add((i % 251) as u8))
        .collect::<Vec<u8>>()
        .into()
}

#[derive(Clone)]
struct ServerState {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

/// Loopback HTTP server: a mutable set of files with `Range` support and
/// per-path hit counters. Playlists are just files that can be swapped to
/// simulate a live window sliding.
pub struct MediaServer {
    base: Url,
    state: ServerState,
}

impl MediaServer {
    pub async fn start(files: HashMap<String, Bytes>) -> Self {
        let state = ServerState {
            files: Arc::new(Mutex::new(files)),
            hits: Arc::new(Mutex::new(HashMap::new())),
        };

        let app = Router::new()
            .route("/{*path}", get(serve_file))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://127.0.0.1:{}/", addr.port()).parse().unwrap(),
            state,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    /// Replace a file (e.g. swap the live playlist for the next window).
    pub fn put(&self, path: &str, data: impl Into<Bytes>) {
        self.state.files.lock().insert(path.to_string(), data.into());
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }
}

async fn serve_file(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, StatusCode> {
    *state.hits.lock().entry(path.clone()).or_insert(0) += 1;

    let data = state
        .files
        .lock()
        .get(&path)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;

    let range = request
        .headers()
        .get("Range")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("bytes="))
        .map(str::to_string);

    match range {
        Some(spec) => {
            let (start_str, end_str) = spec.split_once('-').ok_or(StatusCode::BAD_REQUEST)?;
            let start: usize = start_str.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
            let end: usize = if end_str.is_empty() {
                data.len() - 1
            } else {
                end_str.parse().map_err(|_| StatusCode::BAD_REQUEST)?
            };
            if start > end || end >= data.len() {
                return Err(StatusCode::RANGE_NOT_SATISFIABLE);
            }
            Ok(Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    "Content-Range",
                    format!("bytes {start}-{end}/{}", data.len()),
                )
                .body(axum::body::Body::from(data.slice(start..=end)))
                .unwrap())
        }
        None => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(axum::body::Body::from(data))
            .unwrap()),
    }
}

/// Scripted demuxer: probes a few bytes through the bound source (driving
/// the lazy init), reports one video and one audio track, and keeps its
/// lookup table in a [`MemoryLookupTable`].
pub struct FakeDemuxer {
    pub table: MemoryLookupTable,
    pub edit_list_offset: f64,
    byte_source: Mutex<Option<Arc<dyn ByteSource>>>,
    fragmented: Mutex<Option<Arc<dyn FragmentedSource>>>,
    metadata_reads: AtomicUsize,
}

impl FakeDemuxer {
    pub fn new() -> Self {
        Self {
            table: MemoryLookupTable::new(),
            edit_list_offset: 0.0,
            byte_source: Mutex::new(None),
            fragmented: Mutex::new(None),
            metadata_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_edit_list_offset(offset: f64) -> Self {
        Self {
            edit_list_offset: offset,
            ..Self::new()
        }
    }

    pub fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst)
    }

    pub fn fragmented_source(&self) -> Option<Arc<dyn FragmentedSource>> {
        self.fragmented.lock().clone()
    }
}

impl FragmentLookupSink for FakeDemuxer {
    fn populate_fragment_lookup_table(&self, entries: &[FragmentEntry]) {
        self.table.populate_fragment_lookup_table(entries);
    }

    fn append_fragments_to_lookup_table(&self, entries: &[FragmentEntry], start_time_seconds: f64) {
        self.table
            .append_fragments_to_lookup_table(entries, start_time_seconds);
    }

    fn remove_old_fragments_from_lookup_table(&self, segment_ids: &[u64]) {
        self.table.remove_old_fragments_from_lookup_table(segment_ids);
    }

    fn adjust_for_edit_list_offset(&self, offset_seconds: f64) {
        self.table.adjust_for_edit_list_offset(offset_seconds);
    }
}

#[async_trait]
impl Demuxer for FakeDemuxer {
    fn bind_byte_source(&self, source: Arc<dyn ByteSource>) {
        *self.byte_source.lock() = Some(source);
    }

    async fn read_metadata(&self) -> HlsResult<Vec<Track>> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);

        // Format-detection probe: read the first bytes of the virtual
        // stream, which forces the init-segment fetch.
        let source = self.byte_source.lock().clone();
        if let Some(source) = source {
            let _ = source.read(0, 8).await?;
        }

        Ok(vec![
            Track {
                kind: TrackKind::Video,
                id: 1,
                codec: Some("avc1.42c01e".into()),
            },
            Track {
                kind: TrackKind::Audio,
                id: 2,
                codec: Some("mp4a.40.2".into()),
            },
        ])
    }

    fn normalize_start_timestamp(&self) -> f64 {
        self.edit_list_offset
    }

    fn set_fragmented_source(&self, source: Arc<dyn FragmentedSource>) {
        *self.fragmented.lock() = Some(source);
    }
}
