//! User-facing HLS input.
//!
//! Composes the manifest resolver, the segment source and the demuxer into
//! one object: variant enumeration and selection, track aggregation across
//! muxed audio and separate audio renditions, duration/liveness queries, and
//! the live-edge recovery debounce.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use aulos_m3u8::{parse_playlist, MediaPlaylist, MediaRendition, Playlist, Variant};
use aulos_net::NetClient;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::{
    demux::{Demuxer, FragmentEntry, FragmentLookupSink, FragmentedSource, Track, TrackKind},
    error::{HlsError, HlsResult},
    lookup::LookupBridge,
    resolver::{ManifestResolver, QualitySelection, ResolvedStream},
    source::{SegmentSource, SourceConfig},
    util::resolve_url,
};

/// Creates one demuxer instance per bound source.
pub type DemuxerFactory = Arc<dyn Fn() -> Arc<dyn Demuxer> + Send + Sync>;

/// Facade configuration.
#[derive(Clone)]
pub struct HlsInputOptions {
    pub quality: QualitySelection,
    pub source: SourceConfig,
    /// Minimum quiet period after a live-edge recovery completes before the
    /// next one may start.
    pub live_edge_debounce: Duration,
}

impl Default for HlsInputOptions {
    fn default() -> Self {
        Self {
            quality: QualitySelection::default(),
            source: SourceConfig::default(),
            live_edge_debounce: Duration::from_millis(500),
        }
    }
}

/// One variant's ingest pipeline: source, demuxer, lookup bridge.
struct Pipeline {
    source: SegmentSource,
    demuxer: Arc<dyn Demuxer>,
    #[allow(dead_code)]
    bridge: Arc<LookupBridge>,
    tracks: Vec<Track>,
    cancel: CancellationToken,
}

impl Pipeline {
    fn dispose(&self) {
        self.source.dispose();
        self.cancel.cancel();
    }
}

/// Bridges `Arc<dyn Demuxer>` into the lookup sink the bridge consumes.
struct DemuxerSink(Arc<dyn Demuxer>);

impl FragmentLookupSink for DemuxerSink {
    fn populate_fragment_lookup_table(&self, entries: &[FragmentEntry]) {
        self.0.populate_fragment_lookup_table(entries);
    }

    fn append_fragments_to_lookup_table(&self, entries: &[FragmentEntry], start_time_seconds: f64) {
        self.0
            .append_fragments_to_lookup_table(entries, start_time_seconds);
    }

    fn remove_old_fragments_from_lookup_table(&self, segment_ids: &[u64]) {
        self.0.remove_old_fragments_from_lookup_table(segment_ids);
    }

    fn adjust_for_edit_list_offset(&self, offset_seconds: f64) {
        self.0.adjust_for_edit_list_offset(offset_seconds);
    }
}

struct LiveEdgeState {
    handling: bool,
    last_completed: Option<Instant>,
}

struct FacadeState {
    resolved: Option<ResolvedStream>,
    current_variant: Option<usize>,
    video_pipeline: Option<Arc<Pipeline>>,
    audio_pipeline: Option<Arc<Pipeline>>,
    disposed: bool,
}

struct InputShared {
    net: NetClient,
    manifest_url: Url,
    options: HlsInputOptions,
    factory: DemuxerFactory,
    cancel: CancellationToken,
    /// Single memoized initialization; repeated calls share one manifest
    /// fetch.
    init: OnceCell<()>,
    state: Mutex<FacadeState>,
    live_edge: Mutex<LiveEdgeState>,
}

/// The user-facing HLS input object.
#[derive(Clone)]
pub struct HlsInput {
    shared: Arc<InputShared>,
}

impl HlsInput {
    pub fn new(net: NetClient, manifest_url: Url, factory: DemuxerFactory) -> Self {
        Self::with_options(net, manifest_url, factory, HlsInputOptions::default())
    }

    pub fn with_options(
        net: NetClient,
        manifest_url: Url,
        factory: DemuxerFactory,
        options: HlsInputOptions,
    ) -> Self {
        Self {
            shared: Arc::new(InputShared {
                net,
                manifest_url,
                options,
                factory,
                cancel: CancellationToken::new(),
                init: OnceCell::new(),
                state: Mutex::new(FacadeState {
                    resolved: None,
                    current_variant: None,
                    video_pipeline: None,
                    audio_pipeline: None,
                    disposed: false,
                }),
                live_edge: Mutex::new(LiveEdgeState {
                    handling: false,
                    last_completed: None,
                }),
            }),
        }
    }

    /// Resolve the manifest and build the initial pipelines. Memoized.
    pub async fn initialize(&self) -> HlsResult<()> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .init
            .get_or_try_init(|| async move { InputShared::initialize(&shared).await })
            .await?;
        Ok(())
    }

    // ---- variant management ---------------------------------------------

    /// Variants of the resolved master, in manifest order. Empty for a
    /// media-only manifest.
    pub async fn list_variants(&self) -> HlsResult<Vec<Variant>> {
        self.initialize().await?;
        let state = self.shared.state.lock();
        Ok(state
            .resolved
            .as_ref()
            .and_then(|r| r.master.as_ref())
            .map(|m| m.variants.clone())
            .unwrap_or_default())
    }

    pub fn current_variant(&self) -> Option<Variant> {
        let state = self.shared.state.lock();
        let resolved = state.resolved.as_ref()?;
        let master = resolved.master.as_ref()?;
        master.variants.get(state.current_variant?).cloned()
    }

    /// Switch to another variant from [`Self::list_variants`]. Disposes the
    /// previous variant pipeline when the URI changes; the new media
    /// playlist is fetched in the background, never blocking the caller.
    pub async fn select_variant(&self, index: usize) -> HlsResult<()> {
        self.initialize().await?;

        let (media_url, old_pipeline) = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return Err(HlsError::Disposed);
            }
            let resolved = state
                .resolved
                .as_ref()
                .ok_or_else(|| HlsError::VariantNotFound(format!("index {index}")))?;
            let master = resolved
                .master
                .as_ref()
                .ok_or_else(|| HlsError::VariantNotFound(format!("index {index}")))?;
            let variant = master
                .variants
                .get(index)
                .ok_or_else(|| HlsError::VariantNotFound(format!("index {index}")))?;

            let new_url = resolve_url(&resolved.base_url, &variant.uri)?;
            let unchanged = state
                .video_pipeline
                .as_ref()
                .is_some_and(|p| p.source.media_url() == &new_url);
            if unchanged {
                state.current_variant = Some(index);
                return Ok(());
            }

            state.current_variant = Some(index);
            (new_url, state.video_pipeline.take())
        };

        if let Some(pipeline) = old_pipeline {
            pipeline.dispose();
        }

        // Build the replacement pipeline off the caller's path.
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let bytes = match shared.net.get_bytes(media_url.clone(), None).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(%error, url = %media_url, "variant playlist fetch failed");
                    return;
                }
            };
            let media = match parse_playlist(&String::from_utf8_lossy(&bytes)) {
                Ok(Playlist::Media(media)) => media,
                Ok(Playlist::Master(_)) | Err(_) => {
                    warn!(url = %media_url, "variant playlist was not a media playlist");
                    return;
                }
            };
            match shared.build_pipeline(media_url, media).await {
                Ok(pipeline) => {
                    let mut state = shared.state.lock();
                    if state.disposed {
                        pipeline.dispose();
                        return;
                    }
                    state.video_pipeline = Some(Arc::new(pipeline));
                }
                Err(error) => warn!(%error, "variant pipeline build failed"),
            }
        });

        Ok(())
    }

    // ---- tracks ----------------------------------------------------------

    /// All video tracks of the current variant pipeline.
    pub async fn video_tracks(&self) -> HlsResult<Vec<Track>> {
        self.initialize().await?;
        let state = self.shared.state.lock();
        Ok(collect_tracks(&state.video_pipeline, TrackKind::Video))
    }

    /// Muxed audio tracks aggregated with the separate audio-rendition
    /// pipeline, when one exists.
    pub async fn audio_tracks(&self) -> HlsResult<Vec<Track>> {
        self.initialize().await?;
        let state = self.shared.state.lock();
        let mut tracks = collect_tracks(&state.video_pipeline, TrackKind::Audio);
        tracks.extend(collect_tracks(&state.audio_pipeline, TrackKind::Audio));
        Ok(tracks)
    }

    pub async fn primary_video_track(&self) -> HlsResult<Option<Track>> {
        Ok(self.video_tracks().await?.into_iter().next())
    }

    pub async fn primary_audio_track(&self) -> HlsResult<Option<Track>> {
        Ok(self.audio_tracks().await?.into_iter().next())
    }

    // ---- stream properties ----------------------------------------------

    /// VOD: the sum of segment durations. Live: the source's total observed
    /// duration, which grows monotonically with refresh. Before the source
    /// reports anything, falls back to the manifest sum when available.
    pub fn compute_duration(&self) -> f64 {
        let state = self.shared.state.lock();
        if let Some(pipeline) = &state.video_pipeline {
            let total = pipeline.source.total_duration();
            if total > 0.0 {
                return total;
            }
        }
        state
            .resolved
            .as_ref()
            .map(|r| r.media.total_duration())
            .unwrap_or(0.0)
    }

    /// Reflects the current media playlist's `end_list` flag.
    pub fn is_live(&self) -> bool {
        let state = self.shared.state.lock();
        match &state.video_pipeline {
            Some(pipeline) => pipeline.source.is_live(),
            None => state.resolved.as_ref().is_some_and(|r| r.is_live),
        }
    }

    pub fn target_duration(&self) -> u64 {
        let state = self.shared.state.lock();
        match &state.video_pipeline {
            Some(pipeline) => pipeline.source.target_duration(),
            None => state
                .resolved
                .as_ref()
                .map(|r| r.media.target_duration)
                .unwrap_or(0),
        }
    }

    /// The current variant's segment source (for the demuxer's byte reads).
    pub fn source(&self) -> Option<SegmentSource> {
        self.shared
            .state
            .lock()
            .video_pipeline
            .as_ref()
            .map(|p| p.source.clone())
    }

    /// The current variant's demuxer instance.
    pub fn demuxer(&self) -> Option<Arc<dyn Demuxer>> {
        self.shared
            .state
            .lock()
            .video_pipeline
            .as_ref()
            .map(|p| Arc::clone(&p.demuxer))
    }

    // ---- live-edge recovery ---------------------------------------------

    /// Serialize concurrent live-edge recoveries. Returns the number of
    /// seconds to seek back (`3 × target_duration`) when this caller should
    /// handle the error, or `None` when another recovery is in flight or one
    /// completed within the debounce window.
    pub fn begin_live_edge_recovery(&self) -> Option<f64> {
        let mut live_edge = self.shared.live_edge.lock();
        if live_edge.handling {
            return None;
        }
        if let Some(last) = live_edge.last_completed {
            if last.elapsed() < self.shared.options.live_edge_debounce {
                return None;
            }
        }
        live_edge.handling = true;
        Some(3.0 * self.target_duration() as f64)
    }

    /// Mark the in-flight recovery finished and start the debounce window.
    pub fn finish_live_edge_recovery(&self) {
        let mut live_edge = self.shared.live_edge.lock();
        live_edge.handling = false;
        live_edge.last_completed = Some(Instant::now());
    }

    // ---- teardown --------------------------------------------------------

    /// Release the refresh timers and all buffers. Idempotent and
    /// re-entrant-safe.
    pub fn dispose(&self) {
        let (video, audio) = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (state.video_pipeline.take(), state.audio_pipeline.take())
        };
        if let Some(pipeline) = video {
            pipeline.dispose();
        }
        if let Some(pipeline) = audio {
            pipeline.dispose();
        }
        self.shared.cancel.cancel();
        debug!(url = %self.shared.manifest_url, "hls input disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }
}

impl InputShared {
    async fn initialize(shared: &Arc<InputShared>) -> HlsResult<()> {
        if shared.state.lock().disposed {
            return Err(HlsError::Disposed);
        }

        let resolver = ManifestResolver::new(Arc::clone(&shared.net));
        let resolved = resolver
            .resolve(shared.manifest_url.clone(), shared.options.quality)
            .await?;

        debug!(
            url = %shared.manifest_url,
            variant = ?resolved.selected_variant,
            is_live = resolved.is_live,
            "manifest resolved"
        );

        let video_pipeline = shared
            .build_pipeline(resolved.media_url.clone(), resolved.media.clone())
            .await?;

        let audio_pipeline = match pick_audio_rendition(&resolved.audio_renditions) {
            Some(rendition) => match shared.build_rendition_pipeline(&resolved, rendition).await {
                Ok(pipeline) => Some(pipeline),
                Err(error) => {
                    // The muxed audio still plays without the rendition.
                    warn!(%error, name = %rendition.name, "audio rendition pipeline failed");
                    None
                }
            },
            None => None,
        };

        let mut state = shared.state.lock();
        if state.disposed {
            video_pipeline.dispose();
            if let Some(audio) = &audio_pipeline {
                audio.dispose();
            }
            return Err(HlsError::Disposed);
        }
        state.current_variant = resolved.selected_variant;
        state.resolved = Some(resolved);
        state.video_pipeline = Some(Arc::new(video_pipeline));
        state.audio_pipeline = audio_pipeline.map(Arc::new);
        Ok(())
    }

    async fn build_pipeline(&self, media_url: Url, media: MediaPlaylist) -> HlsResult<Pipeline> {
        let cancel = self.cancel.child_token();
        let is_live = media.is_live();
        let source = SegmentSource::new(
            Arc::clone(&self.net),
            media_url,
            media,
            self.options.source.clone(),
            cancel.clone(),
        );

        let demuxer = (self.factory)();
        let bridge = Arc::new(LookupBridge::new(
            Arc::new(DemuxerSink(Arc::clone(&demuxer))) as Arc<dyn FragmentLookupSink>,
        ));
        bridge.attach(&source);
        demuxer.bind_byte_source(Arc::new(source.clone()) as Arc<dyn crate::demux::ByteSource>);
        if is_live {
            demuxer.set_fragmented_source(Arc::new(source.clone()) as Arc<dyn FragmentedSource>);
        }

        // Metadata reads drive the source's lazy init.
        let tracks = demuxer.read_metadata().await?;
        let edit_list_offset = demuxer.normalize_start_timestamp();
        bridge.apply_edit_list_offset(edit_list_offset);

        Ok(Pipeline {
            source,
            demuxer,
            bridge,
            tracks,
            cancel,
        })
    }

    async fn build_rendition_pipeline(
        &self,
        resolved: &ResolvedStream,
        rendition: &MediaRendition,
    ) -> HlsResult<Pipeline> {
        let uri = rendition
            .uri
            .as_deref()
            .ok_or_else(|| HlsError::UnsupportedMedia("audio rendition without URI".into()))?;
        let media_url = resolve_url(&resolved.base_url, uri)?;
        let bytes = self.net.get_bytes(media_url.clone(), None).await?;
        let media = match parse_playlist(&String::from_utf8_lossy(&bytes))? {
            Playlist::Media(media) => media,
            Playlist::Master(_) => {
                return Err(HlsError::UnsupportedMedia(
                    "audio rendition URI resolved to a master playlist".into(),
                ));
            }
        };
        self.build_pipeline(media_url, media).await
    }
}

fn collect_tracks(pipeline: &Option<Arc<Pipeline>>, kind: TrackKind) -> Vec<Track> {
    pipeline
        .as_ref()
        .map(|p| {
            p.tracks
                .iter()
                .filter(|t| t.kind == kind)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// The rendition marked DEFAULT wins; manifest order breaks ties.
fn pick_audio_rendition(renditions: &[MediaRendition]) -> Option<&MediaRendition> {
    renditions
        .iter()
        .find(|r| r.default && r.uri.is_some())
        .or_else(|| renditions.iter().find(|r| r.uri.is_some()))
}
