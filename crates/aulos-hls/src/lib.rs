#![forbid(unsafe_code)]

//! HLS (fMP4) ingest engine.
//!
//! Consumes an HLS manifest URL, resolves its variant hierarchy, and exposes
//! the backing media as one virtual, randomly-addressable byte stream an
//! ISO-BMFF demuxer can read without knowing anything about HLS. Supports
//! VOD and live sliding-window playlists, with segment-level LRU caching,
//! live-edge detection and a time→byte-offset fragment lookup table in place
//! of the absent `mfra` box.
//!
//! Layering, bottom up:
//! - [`resolver`]: manifest fetch, master/media classification, variant
//!   selection policy.
//! - [`source`]: the virtual byte stream over one media playlist.
//! - [`lookup`]: the fragment lookup bridge between source and demuxer.
//! - [`timestamp`]: per-segment decode-timestamp normalization.
//! - [`facade`]: the user-facing [`HlsInput`] composing all of the above
//!   with a demuxer.
//! - [`mirror`]: the write-side twin emitting playlists and segments.

pub mod demux;
pub mod error;
pub mod facade;
pub mod lookup;
pub mod mirror;
pub mod resolver;
pub mod source;
pub mod timestamp;
pub mod util;

pub use demux::{
    time_eq, ByteSource, Demuxer, FragmentEntry, FragmentLookupSink, FragmentedSource, Packet,
    Track, TrackKind, TIME_EPSILON,
};
pub use error::{HlsError, HlsResult, LiveEdgeKind};
pub use facade::{DemuxerFactory, HlsInput, HlsInputOptions};
pub use lookup::{LookupBridge, MemoryLookupTable};
pub use mirror::{CallbackSink, FsSink, MemorySink, MirrorOptions, PlaylistMirror, SegmentSink};
pub use resolver::{ManifestResolver, QualitySelection, ResolvedStream};
pub use source::{SegmentInfo, SegmentSource, SourceConfig};
pub use util::resolve_url;
