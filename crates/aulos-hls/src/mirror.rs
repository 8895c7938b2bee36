//! Output mirror: the same playlist model driving a segment writer and a
//! playlist emitter.
//!
//! The mirror is the write-side twin of the ingest path: segments and an
//! optional init segment go to a [`SegmentSink`] (memory, callback or
//! filesystem) and a round-trippable media playlist is re-emitted through
//! the playlist writer after every change. A bounded window turns the
//! emitted playlist into a live sliding window with an advancing
//! `EXT-X-MEDIA-SEQUENCE`.

use std::{collections::HashMap, collections::VecDeque, path::PathBuf, sync::Arc};

use aulos_m3u8::{write_playlist, InitMap, MediaPlaylist, Playlist, PlaylistType, Segment};
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::HlsResult;

/// Where mirrored bytes land.
pub trait SegmentSink: Send + Sync {
    fn write_segment(&self, name: &str, data: &[u8]) -> HlsResult<()>;
    fn write_playlist(&self, name: &str, text: &str) -> HlsResult<()>;
}

/// In-memory sink, mostly for tests and preview pipelines.
#[derive(Default)]
pub struct MemorySink {
    files: Mutex<HashMap<String, Bytes>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, name: &str) -> Option<Bytes> {
        self.files.lock().get(name).cloned()
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl SegmentSink for MemorySink {
    fn write_segment(&self, name: &str, data: &[u8]) -> HlsResult<()> {
        self.files
            .lock()
            .insert(name.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    fn write_playlist(&self, name: &str, text: &str) -> HlsResult<()> {
        self.files
            .lock()
            .insert(name.to_string(), Bytes::copy_from_slice(text.as_bytes()));
        Ok(())
    }
}

/// Callback sink for embedding into host pipelines.
pub struct CallbackSink {
    callback: Arc<dyn Fn(&str, &[u8]) + Send + Sync>,
}

impl CallbackSink {
    pub fn new(callback: Arc<dyn Fn(&str, &[u8]) + Send + Sync>) -> Self {
        Self { callback }
    }
}

impl SegmentSink for CallbackSink {
    fn write_segment(&self, name: &str, data: &[u8]) -> HlsResult<()> {
        (self.callback)(name, data);
        Ok(())
    }

    fn write_playlist(&self, name: &str, text: &str) -> HlsResult<()> {
        (self.callback)(name, text.as_bytes());
        Ok(())
    }
}

/// Filesystem sink rooted at a directory.
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SegmentSink for FsSink {
    fn write_segment(&self, name: &str, data: &[u8]) -> HlsResult<()> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }

    fn write_playlist(&self, name: &str, text: &str) -> HlsResult<()> {
        self.write_segment(name, text.as_bytes())
    }
}

/// Mirror configuration.
#[derive(Clone)]
pub struct MirrorOptions {
    pub playlist_name: String,
    pub version: u32,
    pub target_duration: u64,
    pub playlist_type: Option<PlaylistType>,
    /// Maximum segments kept in the emitted playlist; `None` keeps all
    /// (VOD / EVENT style), `Some(n)` produces a sliding window.
    pub window: Option<usize>,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            playlist_name: "playlist.m3u8".into(),
            version: 7,
            target_duration: 6,
            playlist_type: None,
            window: None,
        }
    }
}

struct MirrorState {
    media_sequence: u64,
    init: Option<InitMap>,
    segments: VecDeque<Segment>,
    finished: bool,
}

/// Writes segments to a sink and keeps the emitted playlist in sync.
pub struct PlaylistMirror {
    sink: Arc<dyn SegmentSink>,
    options: MirrorOptions,
    state: Mutex<MirrorState>,
}

impl PlaylistMirror {
    pub fn new(sink: Arc<dyn SegmentSink>, options: MirrorOptions) -> Self {
        Self {
            sink,
            options,
            state: Mutex::new(MirrorState {
                media_sequence: 0,
                init: None,
                segments: VecDeque::new(),
                finished: false,
            }),
        }
    }

    /// Write the init segment and reference it from all following segments.
    pub fn set_init_segment(&self, name: &str, data: &[u8]) -> HlsResult<()> {
        self.sink.write_segment(name, data)?;
        self.state.lock().init = Some(InitMap {
            uri: name.to_string(),
            byte_range: None,
        });
        self.emit()
    }

    /// Append one segment, slide the window if bounded, re-emit.
    pub fn push_segment(&self, name: &str, duration: f64, data: &[u8]) -> HlsResult<()> {
        self.sink.write_segment(name, data)?;

        {
            let mut state = self.state.lock();
            let map = state.init.clone();
            state.segments.push_back(Segment {
                uri: name.to_string(),
                duration,
                map,
                ..Segment::default()
            });

            if let Some(window) = self.options.window {
                while state.segments.len() > window {
                    state.segments.pop_front();
                    state.media_sequence += 1;
                }
            }
        }

        debug!(name, duration, "segment mirrored");
        self.emit()
    }

    /// Mark the playlist complete (`EXT-X-ENDLIST`) and emit one last time.
    pub fn finish(&self) -> HlsResult<()> {
        self.state.lock().finished = true;
        self.emit()
    }

    /// Current playlist text as it stands on the sink.
    pub fn playlist_text(&self) -> String {
        write_playlist(&Playlist::Media(self.snapshot()))
    }

    fn snapshot(&self) -> MediaPlaylist {
        let state = self.state.lock();
        MediaPlaylist {
            version: self.options.version,
            target_duration: self.options.target_duration,
            media_sequence: state.media_sequence,
            playlist_type: self.options.playlist_type,
            end_list: state.finished,
            segments: state.segments.iter().cloned().collect(),
            ..MediaPlaylist::default()
        }
    }

    fn emit(&self) -> HlsResult<()> {
        let text = self.playlist_text();
        self.sink.write_playlist(&self.options.playlist_name, &text)
    }
}

#[cfg(test)]
mod tests {
    use aulos_m3u8::parse_playlist;

    use super::*;

    fn mirror_with_window(window: Option<usize>) -> (Arc<MemorySink>, PlaylistMirror) {
        let sink = Arc::new(MemorySink::new());
        let mirror = PlaylistMirror::new(
            Arc::clone(&sink) as Arc<dyn SegmentSink>,
            MirrorOptions {
                target_duration: 6,
                window,
                ..MirrorOptions::default()
            },
        );
        (sink, mirror)
    }

    #[test]
    fn emitted_playlist_parses_back() {
        let (sink, mirror) = mirror_with_window(None);
        mirror.set_init_segment("init.mp4", b"ftyp").unwrap();
        mirror.push_segment("s0.m4s", 6.0, b"moofmdat0").unwrap();
        mirror.push_segment("s1.m4s", 5.5, b"moofmdat1").unwrap();
        mirror.finish().unwrap();

        let text = String::from_utf8(sink.file("playlist.m3u8").unwrap().to_vec()).unwrap();
        let playlist = parse_playlist(&text).unwrap();
        let media = playlist.as_media().unwrap();

        assert!(media.end_list);
        assert_eq!(media.segments.len(), 2);
        assert_eq!(media.segments[0].uri, "s0.m4s");
        assert_eq!(
            media.segments[0].map.as_ref().map(|m| m.uri.as_str()),
            Some("init.mp4")
        );
        assert_eq!(media.segments[1].duration, 5.5);
    }

    #[test]
    fn bounded_window_slides_and_advances_media_sequence() {
        let (sink, mirror) = mirror_with_window(Some(2));
        for i in 0..4 {
            mirror
                .push_segment(&format!("s{i}.m4s"), 6.0, b"data")
                .unwrap();
        }

        let text = String::from_utf8(sink.file("playlist.m3u8").unwrap().to_vec()).unwrap();
        let playlist = parse_playlist(&text).unwrap();
        let media = playlist.as_media().unwrap();

        assert_eq!(media.media_sequence, 2);
        assert_eq!(media.segments.len(), 2);
        assert_eq!(media.segments[0].uri, "s2.m4s");
        // No ENDLIST while live.
        assert!(!media.end_list);
        // Old segment files stay on the sink; only the playlist window moved.
        assert!(sink.file("s0.m4s").is_some());
    }

    #[test]
    fn filesystem_sink_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(FsSink::new(dir.path()));
        let mirror = PlaylistMirror::new(sink, MirrorOptions::default());

        mirror.push_segment("media/s0.m4s", 4.0, b"payload").unwrap();
        mirror.finish().unwrap();

        let written = std::fs::read(dir.path().join("media/s0.m4s")).unwrap();
        assert_eq!(written, b"payload");

        let text = std::fs::read_to_string(dir.path().join("playlist.m3u8")).unwrap();
        let playlist = parse_playlist(&text).unwrap();
        assert_eq!(playlist.as_media().unwrap().segments.len(), 1);
    }

    #[test]
    fn callback_sink_sees_every_write() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in_callback = Arc::clone(&seen);
        let sink = Arc::new(CallbackSink::new(Arc::new(move |name: &str, _: &[u8]| {
            seen_in_callback.lock().push(name.to_string());
        })));

        let mirror = PlaylistMirror::new(sink, MirrorOptions::default());
        mirror.push_segment("s0.m4s", 6.0, b"data").unwrap();

        let seen = seen.lock();
        assert!(seen.contains(&"s0.m4s".to_string()));
        assert!(seen.contains(&"playlist.m3u8".to_string()));
    }
}
