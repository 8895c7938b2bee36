//! Collaborator contracts for the fMP4 demuxer.
//!
//! The demuxer itself is a black box; the engine talks to it through these
//! object-safe traits. [`ByteSource`] is what the demuxer reads the virtual
//! stream through, [`FragmentedSource`] is the live capability set it binds
//! to for seeking, and [`FragmentLookupSink`] is the time→offset table the
//! lookup bridge maintains on its behalf.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::HlsResult;

/// Decode timestamps within this tolerance are considered equal; float
/// arithmetic over cumulative playlist durations jitters below it.
pub const TIME_EPSILON: f64 = 1e-4;

/// Equality up to [`TIME_EPSILON`].
pub fn time_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_EPSILON
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// One elementary stream advertised by the demuxer's metadata pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub kind: TrackKind,
    pub id: u32,
    pub codec: Option<String>,
}

/// A decoded media packet.
///
/// Packets are ordered by `sequence_number` (decode order); presentation
/// timestamps reorder under B-frames and must not be used for ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub track: TrackKind,
    pub sequence_number: u64,
    /// Seconds on the demuxer's timeline.
    pub timestamp: f64,
    pub data: Bytes,
}

/// One fragment lookup entry: the cumulative duration of a segment and the
/// virtual offset of its first `moof` box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentEntry {
    pub segment_sequence: u64,
    pub duration_seconds: f64,
    pub moof_offset: u64,
}

/// Random-access byte contract the demuxer consumes.
///
/// `read` may return fewer bytes than requested on truncation; the returned
/// offset always echoes the request start.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Total size when known (VOD with all segment sizes resolved).
    fn retrieve_size(&self) -> Option<u64>;

    /// Read `[start, end)`; `None` means end of stream with nothing available.
    async fn read(&self, start: u64, end: u64) -> HlsResult<Option<(Bytes, u64)>>;
}

/// Live capability set the demuxer binds to when the playlist is live.
#[async_trait]
pub trait FragmentedSource: Send + Sync {
    fn is_live(&self) -> bool;

    /// `[removed_duration, total_duration]`, or `[0, total]` for VOD.
    fn available_time_range(&self) -> (f64, f64);

    /// Sequence of the segment covering `t`, if still in the window.
    fn find_segment_at_time(&self, t: f64) -> Option<u64>;

    /// Full segment payload (fetching on miss).
    async fn read_segment_data(&self, sequence: u64) -> HlsResult<Bytes>;

    /// Currently tracked sequences, in window order.
    fn available_segments(&self) -> Vec<u64>;

    /// Virtual byte offset of a segment; defined only once the segment has an
    /// explicit byte-range or has been fetched.
    fn segment_byte_offset(&self, sequence: u64) -> Option<u64>;

    /// Cumulative playlist time at which the segment is expected to start.
    fn segment_expected_start_time(&self, sequence: u64) -> Option<f64>;
}

/// The demuxer's fragment lookup table (the replacement for the absent
/// `mfra` box). Mutated only through these operations.
pub trait FragmentLookupSink: Send + Sync {
    /// Initial seed from the first playlist snapshot.
    fn populate_fragment_lookup_table(&self, entries: &[FragmentEntry]);

    /// Extend after a refresh; `start_time_seconds` is the cumulative time of
    /// the first new entry.
    fn append_fragments_to_lookup_table(&self, entries: &[FragmentEntry], start_time_seconds: f64);

    /// Drop entries whose offsets now lie in gap territory.
    fn remove_old_fragments_from_lookup_table(&self, segment_ids: &[u64]);

    /// Shift every recorded time by the demuxer's edit-list offset. Applied
    /// once, after start-timestamp normalization and before any seek queries.
    fn adjust_for_edit_list_offset(&self, offset_seconds: f64);
}

/// The demuxer instance the facade composes with, once bound to the source
/// via a format-detection probe.
#[async_trait]
pub trait Demuxer: FragmentLookupSink {
    /// Bind the byte stream all reads go through. Called once, before
    /// [`Self::read_metadata`].
    fn bind_byte_source(&self, source: Arc<dyn ByteSource>);

    /// Parse `ftyp`/`moov` and report tracks. Drives reads on the bound
    /// [`ByteSource`].
    async fn read_metadata(&self) -> HlsResult<Vec<Track>>;

    /// Subtract the first packet's decode time from the timeline; returns the
    /// scalar edit-list offset that was subtracted.
    fn normalize_start_timestamp(&self) -> f64;

    /// Bind the live capability set.
    fn set_fragmented_source(&self, source: Arc<dyn FragmentedSource>);
}
