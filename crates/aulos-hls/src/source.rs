//! The segment source: one linear, randomly-addressable byte stream over a
//! media playlist.
//!
//! Layout: `[init segment][seg(ms_first)][seg(ms_first+1)]…` — virtual
//! offsets are assigned once on first observation and never renumbered. When
//! a live window slides, the head becomes a gap area whose reads fail with
//! [`LiveEdgeKind::BehindWindow`]; reads past the tail wait for the refresh
//! task to append and fail with [`LiveEdgeKind::Timeout`] when nothing
//! arrives.
//!
//! Segment data is cached with LRU eviction; segment metadata is retained
//! for the window plus a behind-live buffer so slow readers do not
//! immediately fall off the back.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use aulos_m3u8::{parse_playlist, MediaPlaylist, Playlist, Segment};
use aulos_net::{with_deadline, NetClient, RangeSpec};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::{
    sync::{Notify, OnceCell},
    time::{sleep, timeout, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    demux::{ByteSource, FragmentEntry, FragmentedSource},
    error::{HlsError, HlsResult, LiveEdgeKind},
    util::resolve_url,
};

/// Notified with the fragment entries appended by an ingest and their common
/// starting time.
pub type SegmentsAddedFn = Arc<dyn Fn(&[FragmentEntry], f64) + Send + Sync>;
/// Notified with the sequences expired out of the sliding window.
pub type SegmentsRemovedFn = Arc<dyn Fn(&[u64]) + Send + Sync>;

/// Tuning knobs; the defaults match production behavior.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Deadline for the init-segment fetch.
    pub init_deadline: Duration,
    /// Deadline for a media-segment fetch.
    pub segment_deadline: Duration,
    /// Deadline for a live playlist refresh.
    pub refresh_deadline: Duration,
    /// Data-cache capacity in segments.
    pub max_cached_segments: usize,
    /// Metadata retained behind the live window, in segments. 72 covers
    /// roughly 15 minutes at 12.5 s per segment.
    pub buffer_behind_segments: u64,
    /// Poll interval while waiting at the live edge.
    pub live_wait_poll: Duration,
    /// Total wait at the live edge before giving up.
    pub live_wait_timeout: Duration,
    /// Parallelism bound for post-refresh prefetch.
    pub prefetch_concurrency: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            init_deadline: Duration::from_secs(10),
            segment_deadline: Duration::from_secs(15),
            refresh_deadline: Duration::from_secs(5),
            max_cached_segments: 20,
            buffer_behind_segments: 72,
            live_wait_poll: Duration::from_millis(100),
            live_wait_timeout: Duration::from_secs(10),
            prefetch_concurrency: 3,
        }
    }
}

/// Per-segment runtime state: the immutable playlist value plus its place in
/// the virtual stream.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    pub segment: Segment,
    pub sequence: u64,
    /// Virtual start offset; immutable once observed, except that segments
    /// behind a still-provisional neighbour shift when that neighbour's size
    /// is learned.
    pub start: u64,
    /// Virtual end offset; equals `start` while provisional.
    pub end: u64,
    /// `end` is final: the segment carries an explicit byte-range or has
    /// been fetched.
    pub end_known: bool,
    /// Cumulative playlist time at which this segment starts.
    pub start_time: f64,
}

struct SourceState {
    playlist: MediaPlaylist,
    live: bool,
    init_data: Option<Bytes>,
    init_len: u64,
    segments: BTreeMap<u64, SegmentInfo>,
    cache: HashMap<u64, Bytes>,
    /// LRU order, least recently used at the front.
    access_order: VecDeque<u64>,
    /// Append cursor used while no segment is tracked yet.
    next_segment_offset: u64,
    total_duration: f64,
    removed_duration: f64,
    /// Bumped once per appended or removed segment; read waiters watch it.
    change_counter: u64,
    disposed: bool,
    on_added: Option<SegmentsAddedFn>,
    on_removed: Option<SegmentsRemovedFn>,
}

struct SourceShared {
    net: NetClient,
    media_url: Url,
    config: SourceConfig,
    state: Mutex<SourceState>,
    changed: Notify,
    cancel: CancellationToken,
}

/// Virtual byte stream over one media playlist.
#[derive(Clone)]
pub struct SegmentSource {
    shared: Arc<SourceShared>,
    ready: Arc<OnceCell<()>>,
}

impl SegmentSource {
    pub fn new(
        net: NetClient,
        media_url: Url,
        playlist: MediaPlaylist,
        config: SourceConfig,
        cancel: CancellationToken,
    ) -> Self {
        let live = playlist.is_live();
        Self {
            shared: Arc::new(SourceShared {
                net,
                media_url,
                config,
                state: Mutex::new(SourceState {
                    playlist,
                    live,
                    init_data: None,
                    init_len: 0,
                    segments: BTreeMap::new(),
                    cache: HashMap::new(),
                    access_order: VecDeque::new(),
                    next_segment_offset: 0,
                    total_duration: 0.0,
                    removed_duration: 0.0,
                    change_counter: 0,
                    disposed: false,
                    on_added: None,
                    on_removed: None,
                }),
                changed: Notify::new(),
                cancel,
            }),
            ready: Arc::new(OnceCell::new()),
        }
    }

    /// Install the change callbacks (used by the fragment lookup bridge).
    pub fn set_callbacks(&self, on_added: SegmentsAddedFn, on_removed: SegmentsRemovedFn) {
        let mut state = self.shared.state.lock();
        if state.disposed {
            return;
        }
        state.on_added = Some(on_added);
        state.on_removed = Some(on_removed);
    }

    /// Lazy initialization: fetch the init segment, ingest the current
    /// snapshot and arm the refresh timer for live playlists. Memoized;
    /// every read path goes through here.
    pub async fn prepare(&self) -> HlsResult<()> {
        let shared = Arc::clone(&self.shared);
        self.ready
            .get_or_try_init(|| async move { Self::initialize(&shared).await })
            .await?;
        Ok(())
    }

    async fn initialize(shared: &Arc<SourceShared>) -> HlsResult<()> {
        let (map, snapshot) = {
            let state = shared.state.lock();
            if state.disposed {
                return Err(HlsError::Disposed);
            }
            let map = state
                .playlist
                .segments
                .iter()
                .find_map(|segment| segment.map.clone());
            (map, state.playlist.clone())
        };

        let map = map.ok_or_else(|| {
            HlsError::UnsupportedMedia("fMP4 required: playlist has no EXT-X-MAP".into())
        })?;

        let init_url = resolve_url(&shared.media_url, &map.uri)?;
        let fetch = async {
            match map.byte_range {
                Some(range) => {
                    shared
                        .net
                        .get_range(
                            init_url.clone(),
                            RangeSpec::from_length(range.length, range.offset),
                            None,
                        )
                        .await
                }
                None => shared.net.get_bytes(init_url.clone(), None).await,
            }
        };
        let init_data = with_deadline(shared.config.init_deadline, fetch).await?;

        debug!(url = %init_url, len = init_data.len(), "init segment fetched");

        let (entries, start_time, on_added, live) = {
            let mut state = shared.state.lock();
            if state.disposed {
                return Err(HlsError::Disposed);
            }
            state.init_len = init_data.len() as u64;
            state.next_segment_offset = state.init_len;
            state.init_data = Some(init_data);

            let (entries, start_time) = Self::ingest_locked(&mut state, snapshot);
            (entries, start_time, state.on_added.clone(), state.live)
        };

        if !entries.is_empty() {
            shared.changed.notify_waiters();
            if let Some(on_added) = on_added {
                on_added(&entries, start_time);
            }
        }

        if live {
            Self::spawn_refresh_task(Arc::clone(shared));
        }

        Ok(())
    }

    /// Track every not-yet-known segment of a playlist snapshot. Returns the
    /// new fragment entries and their common starting time.
    fn ingest_locked(state: &mut SourceState, snapshot: MediaPlaylist) -> (Vec<FragmentEntry>, f64) {
        let mut entries = Vec::new();
        let mut first_start_time = state.total_duration;

        for (index, segment) in snapshot.segments.iter().enumerate() {
            let sequence = snapshot.media_sequence + index as u64;
            if state.segments.contains_key(&sequence) {
                continue;
            }

            let start = state
                .segments
                .values()
                .next_back()
                .map(|info| info.end)
                .unwrap_or(state.next_segment_offset);
            let (end, end_known) = match segment.byte_range {
                Some(range) => (start + range.length, true),
                None => (start, false),
            };

            let start_time = state.total_duration;
            if entries.is_empty() {
                first_start_time = start_time;
            }

            trace!(sequence, start, end, end_known, "segment tracked");
            state.segments.insert(
                sequence,
                SegmentInfo {
                    segment: segment.clone(),
                    sequence,
                    start,
                    end,
                    end_known,
                    start_time,
                },
            );
            state.total_duration += segment.duration;
            state.change_counter += 1;
            entries.push(FragmentEntry {
                segment_sequence: sequence,
                duration_seconds: segment.duration,
                moof_offset: start,
            });
        }

        state.live = snapshot.is_live();
        state.playlist = snapshot;
        (entries, first_start_time)
    }

    /// Expire sequences below the retention window. Returns the expired ids.
    fn expire_locked(state: &mut SourceState, buffer_behind: u64) -> Vec<u64> {
        let low = state.playlist.media_sequence.saturating_sub(buffer_behind);
        let expired: Vec<u64> = state.segments.range(..low).map(|(ms, _)| *ms).collect();

        for sequence in &expired {
            if let Some(info) = state.segments.remove(sequence) {
                state.removed_duration += info.segment.duration;
            }
            state.cache.remove(sequence);
            state.access_order.retain(|ms| ms != sequence);
            state.change_counter += 1;
        }
        expired
    }

    fn spawn_refresh_task(shared: Arc<SourceShared>) {
        tokio::spawn(async move {
            loop {
                let interval = {
                    let state = shared.state.lock();
                    if state.disposed || !state.live {
                        break;
                    }
                    // Half the target duration, per RFC 8216 client guidance.
                    Duration::from_secs_f64((state.playlist.target_duration.max(1) as f64) / 2.0)
                };

                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = sleep(interval) => {}
                }

                Self::refresh_once(&shared).await;
            }
            debug!("refresh task stopped");
        });
    }

    /// One refresh cycle. Network and parse failures are swallowed; the
    /// loop rearms regardless.
    async fn refresh_once(shared: &Arc<SourceShared>) {
        let fetched = with_deadline(
            shared.config.refresh_deadline,
            shared.net.get_bytes(shared.media_url.clone(), None),
        )
        .await;

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(url = %shared.media_url, %error, "playlist refresh failed");
                return;
            }
        };

        let snapshot = match parse_playlist(&String::from_utf8_lossy(&bytes)) {
            Ok(Playlist::Media(media)) => media,
            Ok(Playlist::Master(_)) => {
                warn!(url = %shared.media_url, "refresh returned a master playlist");
                return;
            }
            Err(error) => {
                warn!(url = %shared.media_url, %error, "playlist refresh parse failed");
                return;
            }
        };

        let (added, start_time, removed, on_added, on_removed, prefetch) = {
            let mut state = shared.state.lock();
            if state.disposed {
                return;
            }
            let (added, start_time) = Self::ingest_locked(&mut state, snapshot);
            let removed = Self::expire_locked(&mut state, shared.config.buffer_behind_segments);

            // Recent sequences worth warming, newest window tail first.
            let prefetch: Vec<u64> = state
                .segments
                .keys()
                .rev()
                .filter(|ms| !state.cache.contains_key(ms))
                .take(shared.config.prefetch_concurrency)
                .copied()
                .collect();

            (
                added,
                start_time,
                removed,
                state.on_added.clone(),
                state.on_removed.clone(),
                prefetch,
            )
        };

        if !removed.is_empty() {
            debug!(count = removed.len(), "segments expired from window");
            if let Some(on_removed) = on_removed {
                on_removed(&removed);
            }
        }
        if !added.is_empty() {
            debug!(count = added.len(), start_time, "segments appended");
            if let Some(on_added) = on_added {
                on_added(&added, start_time);
            }
        }
        if !added.is_empty() || !removed.is_empty() {
            shared.changed.notify_waiters();
        }

        // Best-effort warmup; failures are swallowed.
        let source = SegmentSource {
            shared: Arc::clone(shared),
            ready: Arc::new(OnceCell::new_with(Some(()))),
        };
        futures::stream::iter(prefetch)
            .for_each_concurrent(shared.config.prefetch_concurrency, |sequence| {
                let source = source.clone();
                async move {
                    if let Err(error) = source.fetch_segment(sequence).await {
                        trace!(sequence, %error, "prefetch failed");
                    }
                }
            })
            .await;
    }

    /// Fetch one segment's payload, through the LRU cache.
    pub async fn fetch_segment(&self, sequence: u64) -> HlsResult<Bytes> {
        let (url, range) = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return Err(HlsError::Disposed);
            }
            if let Some(bytes) = state.cache.get(&sequence).cloned() {
                promote(&mut state.access_order, sequence);
                return Ok(bytes);
            }
            let info = state
                .segments
                .get(&sequence)
                .ok_or(HlsError::SegmentNotFound(sequence))?;
            let url = resolve_url(&self.shared.media_url, &info.segment.uri)?;
            let range = info
                .segment
                .byte_range
                .map(|br| RangeSpec::from_length(br.length, br.offset));
            (url, range)
        };

        let fetch = async {
            match range {
                Some(range) => self.shared.net.get_range(url.clone(), range, None).await,
                None => self.shared.net.get_bytes(url.clone(), None).await,
            }
        };
        let bytes = with_deadline(self.shared.config.segment_deadline, fetch).await?;
        if self.shared.cancel.is_cancelled() {
            return Err(HlsError::Disposed);
        }

        trace!(sequence, len = bytes.len(), url = %url, "segment fetched");

        let mut state = self.shared.state.lock();
        if state.disposed {
            return Err(HlsError::Disposed);
        }

        while state.cache.len() >= self.shared.config.max_cached_segments {
            if !evict_one(&mut state) {
                break;
            }
        }
        state.cache.insert(sequence, bytes.clone());
        promote(&mut state.access_order, sequence);

        // First fetch of a byte-range-less segment pins its size.
        let newly_sized = state
            .segments
            .get_mut(&sequence)
            .filter(|info| !info.end_known)
            .map(|info| {
                info.end = info.start + bytes.len() as u64;
                info.end_known = true;
                info.end
            });
        if newly_sized.is_some() {
            propagate_starts(&mut state.segments, sequence);
        }

        Ok(bytes)
    }

    /// Read `[start, end)` from the virtual stream.
    ///
    /// Returns the available prefix (never more than `end - start` bytes)
    /// with the echoed start offset, or `None` at VOD end-of-stream.
    pub async fn read(&self, start: u64, end: u64) -> HlsResult<Option<(Bytes, u64)>> {
        self.prepare().await?;

        loop {
            match self.try_read(start, end).await? {
                ReadProgress::Data(bytes) => return Ok(Some((bytes, start))),
                ReadProgress::Eof => return Ok(None),
                ReadProgress::WaitForSegments { seen_counter } => {
                    self.wait_for_growth(seen_counter).await?;
                }
            }
        }
    }

    async fn try_read(&self, start: u64, end: u64) -> HlsResult<ReadProgress> {
        if end <= start {
            return Ok(ReadProgress::Data(Bytes::new()));
        }

        let mut out: Vec<u8> = Vec::new();

        // Init-segment prefix.
        {
            let state = self.shared.state.lock();
            if state.disposed {
                return Err(HlsError::Disposed);
            }
            if start < state.init_len {
                let init = state.init_data.as_ref().ok_or(HlsError::Disposed)?;
                let to = end.min(state.init_len) as usize;
                out.extend_from_slice(&init[start as usize..to]);
            } else if let Some(first) = state.segments.values().next() {
                // Gap area: below the first known segment, above init.
                if start < first.start {
                    if state.live {
                        return Err(HlsError::LiveEdge(LiveEdgeKind::BehindWindow));
                    }
                    return Ok(ReadProgress::Eof);
                }
            }
        }

        let first_sequence = {
            let state = self.shared.state.lock();
            state.segments.keys().next().copied()
        };

        if let Some(mut sequence) = first_sequence {
            loop {
                let cursor = start + out.len() as u64;
                let info = {
                    let state = self.shared.state.lock();
                    if state.disposed {
                        return Err(HlsError::Disposed);
                    }
                    state.segments.get(&sequence).cloned()
                };
                let Some(info) = info else { break };

                if info.start >= end {
                    break;
                }

                if !info.end_known {
                    // Provisional end; the request reaches its start, so
                    // fetching is the only way to learn its size.
                    self.fetch_segment(sequence).await?;
                    continue;
                }

                if info.end <= cursor {
                    sequence += 1;
                    continue;
                }

                // Overlap; the copy must continue exactly at the cursor.
                if info.start > cursor {
                    break;
                }
                let data = self.fetch_segment(sequence).await?;
                let from = (cursor - info.start) as usize;
                let to = (end.min(info.end) - info.start) as usize;
                out.extend_from_slice(&data[from..to]);

                if end <= info.end {
                    break;
                }
                sequence += 1;
            }
        }

        if !out.is_empty() {
            return Ok(ReadProgress::Data(Bytes::from(out)));
        }

        let state = self.shared.state.lock();
        if state.live {
            Ok(ReadProgress::WaitForSegments {
                seen_counter: state.change_counter,
            })
        } else {
            Ok(ReadProgress::Eof)
        }
    }

    /// Wait until the change counter advances past `seen_counter`, polling
    /// every `live_wait_poll` up to `live_wait_timeout`.
    async fn wait_for_growth(&self, seen_counter: u64) -> HlsResult<()> {
        let deadline = Instant::now() + self.shared.config.live_wait_timeout;
        loop {
            if self.shared.cancel.is_cancelled() {
                return Err(HlsError::Disposed);
            }
            {
                let state = self.shared.state.lock();
                if state.disposed {
                    return Err(HlsError::Disposed);
                }
                if state.change_counter != seen_counter {
                    return Ok(());
                }
                if !state.live {
                    // The stream ended while we were waiting.
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(HlsError::LiveEdge(LiveEdgeKind::Timeout));
            }
            let notified = self.shared.changed.notified();
            let _ = timeout(self.shared.config.live_wait_poll, notified).await;
        }
    }

    /// Cancel the refresh timer, clear callbacks, release all buffers.
    /// Idempotent and re-entrant-safe.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            // Callbacks first, buffers after.
            state.on_added = None;
            state.on_removed = None;
            state.cache.clear();
            state.access_order.clear();
            state.init_data = None;
        }
        self.shared.cancel.cancel();
        self.shared.changed.notify_waiters();
        debug!(url = %self.shared.media_url, "segment source disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    // ---- observers -------------------------------------------------------

    pub fn media_url(&self) -> &Url {
        &self.shared.media_url
    }

    pub fn is_live(&self) -> bool {
        self.shared.state.lock().live
    }

    pub fn target_duration(&self) -> u64 {
        self.shared.state.lock().playlist.target_duration
    }

    /// Total cumulative duration of every segment ever observed; grows
    /// monotonically with refresh and never shrinks on expiry.
    pub fn total_duration(&self) -> f64 {
        self.shared.state.lock().total_duration
    }

    /// Cumulative duration of segments expired out of the window.
    pub fn removed_duration(&self) -> f64 {
        self.shared.state.lock().removed_duration
    }

    pub fn change_counter(&self) -> u64 {
        self.shared.state.lock().change_counter
    }

    pub fn known_sequences(&self) -> Vec<u64> {
        self.shared.state.lock().segments.keys().copied().collect()
    }

    pub fn segment_info(&self, sequence: u64) -> Option<SegmentInfo> {
        self.shared.state.lock().segments.get(&sequence).cloned()
    }

    /// Snapshot of the current lookup entries (for initial table seeding).
    pub fn fragment_entries(&self) -> Vec<FragmentEntry> {
        self.shared
            .state
            .lock()
            .segments
            .values()
            .map(|info| FragmentEntry {
                segment_sequence: info.sequence,
                duration_seconds: info.segment.duration,
                moof_offset: info.start,
            })
            .collect()
    }

    /// Sequences currently held in the data cache (test observability).
    pub fn cached_sequences(&self) -> Vec<u64> {
        let state = self.shared.state.lock();
        state.access_order.iter().copied().collect()
    }
}

enum ReadProgress {
    Data(Bytes),
    Eof,
    WaitForSegments { seen_counter: u64 },
}

fn promote(access_order: &mut VecDeque<u64>, sequence: u64) {
    access_order.retain(|ms| *ms != sequence);
    access_order.push_back(sequence);
}

/// Evict one cache entry. Sequences no longer in the window go first; when
/// the least-recently-used entry is still live, the next one goes instead so
/// the imminent playback front survives. Returns false when nothing can be
/// evicted.
fn evict_one(state: &mut SourceState) -> bool {
    let victim = state
        .access_order
        .iter()
        .position(|ms| !state.segments.contains_key(ms))
        .or_else(|| match state.access_order.len() {
            0 => None,
            1 => Some(0),
            _ => Some(1),
        });

    match victim {
        Some(index) => {
            if let Some(sequence) = state.access_order.remove(index) {
                trace!(sequence, "cache eviction");
                state.cache.remove(&sequence);
            }
            true
        }
        None => false,
    }
}

/// After a byte-range-less segment's size is learned, shift the starts of the
/// following byte-range-less run; stops at the first byte-range-having
/// segment or the first not-yet-fetched neighbour.
fn propagate_starts(segments: &mut BTreeMap<u64, SegmentInfo>, from: u64) {
    let mut prev_end = match segments.get(&from) {
        Some(info) => info.end,
        None => return,
    };
    let mut next = from + 1;
    while let Some(info) = segments.get_mut(&next) {
        if info.segment.byte_range.is_some() {
            break;
        }
        let length = info.end - info.start;
        info.start = prev_end;
        info.end = prev_end + length;
        if !info.end_known {
            break;
        }
        prev_end = info.end;
        next += 1;
    }
}

// ---- demuxer-facing contracts -------------------------------------------

#[async_trait]
impl ByteSource for SegmentSource {
    fn retrieve_size(&self) -> Option<u64> {
        let state = self.shared.state.lock();
        if state.live {
            return None;
        }
        let all_known = state.segments.values().all(|info| info.end_known);
        if !all_known {
            return None;
        }
        Some(
            state
                .segments
                .values()
                .next_back()
                .map(|info| info.end)
                .unwrap_or(state.init_len),
        )
    }

    async fn read(&self, start: u64, end: u64) -> HlsResult<Option<(Bytes, u64)>> {
        SegmentSource::read(self, start, end).await
    }
}

#[async_trait]
impl FragmentedSource for SegmentSource {
    fn is_live(&self) -> bool {
        SegmentSource::is_live(self)
    }

    fn available_time_range(&self) -> (f64, f64) {
        let state = self.shared.state.lock();
        if state.live {
            (state.removed_duration, state.total_duration)
        } else {
            (0.0, state.total_duration)
        }
    }

    fn find_segment_at_time(&self, t: f64) -> Option<u64> {
        let state = self.shared.state.lock();
        state
            .segments
            .values()
            .find(|info| t >= info.start_time && t < info.start_time + info.segment.duration)
            .map(|info| info.sequence)
    }

    async fn read_segment_data(&self, sequence: u64) -> HlsResult<Bytes> {
        self.prepare().await?;
        self.fetch_segment(sequence).await
    }

    fn available_segments(&self) -> Vec<u64> {
        self.known_sequences()
    }

    fn segment_byte_offset(&self, sequence: u64) -> Option<u64> {
        let state = self.shared.state.lock();
        state
            .segments
            .get(&sequence)
            .filter(|info| info.end_known)
            .map(|info| info.start)
    }

    fn segment_expected_start_time(&self, sequence: u64) -> Option<f64> {
        let state = self.shared.state.lock();
        state.segments.get(&sequence).map(|info| info.start_time)
    }
}
