//! Fragment lookup bridge.
//!
//! fMP4 over HLS carries no `mfra` box, so seeking needs a time→byte-offset
//! index built from playlist segment durations. The bridge seeds that index
//! in the demuxer from the segment source, keeps it in sync through the
//! source's add/remove callbacks, and re-applies the demuxer's edit-list
//! offset after start-timestamp normalization.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    demux::{time_eq, FragmentEntry, FragmentLookupSink},
    source::SegmentSource,
};

/// Wires one segment source to one demuxer-side lookup table.
pub struct LookupBridge {
    sink: Arc<dyn FragmentLookupSink>,
    seeded: Arc<Mutex<bool>>,
    edit_list_applied: Mutex<bool>,
}

impl LookupBridge {
    pub fn new(sink: Arc<dyn FragmentLookupSink>) -> Self {
        Self {
            sink,
            seeded: Arc::new(Mutex::new(false)),
            edit_list_applied: Mutex::new(false),
        }
    }

    /// Install the source callbacks and seed the table from anything the
    /// source already tracks. The first delivery populates; every later one
    /// appends.
    pub fn attach(&self, source: &SegmentSource) {
        let sink_added = Arc::clone(&self.sink);
        let seeded_added = Arc::clone(&self.seeded);
        let on_added = Arc::new(move |entries: &[FragmentEntry], start_time: f64| {
            let mut seeded = seeded_added.lock();
            if *seeded {
                sink_added.append_fragments_to_lookup_table(entries, start_time);
            } else {
                sink_added.populate_fragment_lookup_table(entries);
                *seeded = true;
            }
        });

        let sink_removed = Arc::clone(&self.sink);
        let on_removed = Arc::new(move |ids: &[u64]| {
            sink_removed.remove_old_fragments_from_lookup_table(ids);
        });

        source.set_callbacks(on_added, on_removed);

        // Entries ingested before attach would otherwise never arrive.
        let existing = source.fragment_entries();
        if !existing.is_empty() {
            let mut seeded = self.seeded.lock();
            if !*seeded {
                debug!(count = existing.len(), "seeding fragment lookup table");
                self.sink.populate_fragment_lookup_table(&existing);
                *seeded = true;
            }
        }
    }

    /// Re-apply the scalar edit-list offset to every recorded time value.
    /// Happens once, after normalization and before any seek queries; later
    /// calls are ignored.
    pub fn apply_edit_list_offset(&self, offset_seconds: f64) {
        let mut applied = self.edit_list_applied.lock();
        if *applied {
            return;
        }
        *applied = true;
        if time_eq(offset_seconds, 0.0) {
            return;
        }
        debug!(offset_seconds, "applying edit-list offset to lookup table");
        self.sink.adjust_for_edit_list_offset(offset_seconds);
    }
}

/// In-memory lookup table: sorted `(time, offset)` rows with binary-search
/// queries. Serves as the default sink and as the reference behavior for
/// demuxer implementations.
#[derive(Default)]
pub struct MemoryLookupTable {
    rows: Mutex<Vec<LookupRow>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupRow {
    pub segment_sequence: u64,
    pub time_seconds: f64,
    pub moof_offset: u64,
}

impl MemoryLookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of the fragment covering `t`: the last row whose time is
    /// at or before `t` (within epsilon).
    pub fn offset_for_time(&self, t: f64) -> Option<u64> {
        let rows = self.rows.lock();
        let index = rows.partition_point(|row| row.time_seconds <= t + crate::demux::TIME_EPSILON);
        index.checked_sub(1).map(|i| rows[i].moof_offset)
    }

    pub fn rows(&self) -> Vec<LookupRow> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl FragmentLookupSink for MemoryLookupTable {
    fn populate_fragment_lookup_table(&self, entries: &[FragmentEntry]) {
        let mut rows = self.rows.lock();
        rows.clear();
        let mut time = 0.0;
        for entry in entries {
            rows.push(LookupRow {
                segment_sequence: entry.segment_sequence,
                time_seconds: time,
                moof_offset: entry.moof_offset,
            });
            time += entry.duration_seconds;
        }
    }

    fn append_fragments_to_lookup_table(&self, entries: &[FragmentEntry], start_time_seconds: f64) {
        let mut rows = self.rows.lock();
        let mut time = start_time_seconds;
        for entry in entries {
            rows.push(LookupRow {
                segment_sequence: entry.segment_sequence,
                time_seconds: time,
                moof_offset: entry.moof_offset,
            });
            time += entry.duration_seconds;
        }
    }

    fn remove_old_fragments_from_lookup_table(&self, segment_ids: &[u64]) {
        let mut rows = self.rows.lock();
        rows.retain(|row| !segment_ids.contains(&row.segment_sequence));
    }

    fn adjust_for_edit_list_offset(&self, offset_seconds: f64) {
        let mut rows = self.rows.lock();
        for row in rows.iter_mut() {
            row.time_seconds -= offset_seconds;
        }
    }
}
