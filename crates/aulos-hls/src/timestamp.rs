//! Per-segment timestamp normalization.
//!
//! A segment's internal `baseMediaDecodeTime` routinely disagrees with the
//! playlist's cumulative time for that segment. For each track kind the
//! normalizer takes the first packet in decode order, computes
//! `offset = T₀ − O` against the expected playlist start time `O`, and
//! shifts every packet of the segment by that offset so the produced
//! timeline starts exactly at `O`.

use tracing::trace;

use crate::demux::{time_eq, Packet, TrackKind};

/// Expected playlist start time of each segment: cumulative duration up to
/// it. Discontinuities need no special casing here because every segment is
/// re-anchored independently; the cumulative timeline stays monotonic across
/// them.
pub fn expected_start_times(durations: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(durations.len());
    let mut cumulative = 0.0;
    for duration in durations {
        out.push(cumulative);
        cumulative += duration;
    }
    out
}

/// Normalize one segment's packets for one track kind against the expected
/// start time. Packets must already be in decode-sequence order; presentation
/// timestamps reorder under B-frames and are never used for ordering.
///
/// Returns clones with adjusted timestamps; packets of other track kinds are
/// ignored.
pub fn normalize_segment_packets(
    packets: &[Packet],
    track: TrackKind,
    expected_start: f64,
) -> Vec<Packet> {
    let mut iter = packets.iter().filter(|p| p.track == track);
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let offset = first.timestamp - expected_start;
    if !time_eq(offset, 0.0) {
        trace!(
            ?track,
            offset,
            expected_start,
            first_timestamp = first.timestamp,
            "normalizing segment timestamps"
        );
    }

    packets
        .iter()
        .filter(|p| p.track == track)
        .map(|p| Packet {
            timestamp: p.timestamp - offset,
            ..p.clone()
        })
        .collect()
}

/// Normalize both track kinds of one segment in a single pass, preserving
/// decode order within each kind.
pub fn normalize_segment(packets: &[Packet], expected_start: f64) -> Vec<Packet> {
    let mut video = normalize_segment_packets(packets, TrackKind::Video, expected_start);
    let audio = normalize_segment_packets(packets, TrackKind::Audio, expected_start);
    video.extend(audio);
    video.sort_by_key(|p| p.sequence_number);
    video
}
