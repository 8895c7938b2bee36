//! Round-trippable playlist writer.
//!
//! Serialization rules: the version tag is suppressed for version 1,
//! `EXT-X-MEDIA-SEQUENCE` is suppressed when zero, repeated identical
//! `EXT-X-KEY` / `EXT-X-MAP` state is elided, a cleared key is emitted as
//! `METHOD=NONE`, and segment durations are formatted with at most three
//! decimals (trailing zeros trimmed).

use std::fmt::Write as _;

use crate::types::{
    AttributeValue, ByteRange, InitMap, Key, MasterPlaylist, MediaPlaylist, MediaRendition,
    Playlist, Segment, Variant,
};

/// Serialize a playlist back to M3U8 text.
pub fn write_playlist(playlist: &Playlist) -> String {
    match playlist {
        Playlist::Master(master) => write_master(master),
        Playlist::Media(media) => write_media(media),
    }
}

/// Segment durations carry up to three decimals, zeros trimmed.
pub fn format_duration(duration: f64) -> String {
    let fixed = format!("{duration:.3}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

fn push_quoted(out: &mut String, key: &str, value: &str) {
    let _ = write!(out, ",{key}=\"{value}\"");
}

fn push_plain(out: &mut String, key: &str, value: impl std::fmt::Display) {
    let _ = write!(out, ",{key}={value}");
}

fn byte_range_value(range: &ByteRange) -> String {
    match range.offset {
        Some(offset) => format!("{}@{}", range.length, offset),
        None => range.length.to_string(),
    }
}

fn write_master(master: &MasterPlaylist) -> String {
    let mut out = String::from("#EXTM3U\n");

    if master.version != 1 {
        let _ = writeln!(out, "#EXT-X-VERSION:{}", master.version);
    }
    if master.independent_segments {
        out.push_str("#EXT-X-INDEPENDENT-SEGMENTS\n");
    }

    for rendition in &master.renditions {
        write_rendition(&mut out, rendition);
    }
    for variant in &master.variants {
        write_variant(&mut out, variant);
    }

    if let Some(session_data) = &master.session_data {
        out.push_str("#EXT-X-SESSION-DATA:");
        let _ = write!(out, "DATA-ID=\"{}\"", session_data.data_id);
        if let Some(value) = &session_data.value {
            push_quoted(&mut out, "VALUE", value);
        }
        if let Some(uri) = &session_data.uri {
            push_quoted(&mut out, "URI", uri);
        }
        if let Some(language) = &session_data.language {
            push_quoted(&mut out, "LANGUAGE", language);
        }
        out.push('\n');
    }
    if let Some(key) = &master.session_key {
        out.push_str("#EXT-X-SESSION-KEY:");
        write_key_attributes(&mut out, key);
        out.push('\n');
    }

    out
}

fn write_rendition(out: &mut String, rendition: &MediaRendition) {
    let _ = write!(
        out,
        "#EXT-X-MEDIA:TYPE={},GROUP-ID=\"{}\",NAME=\"{}\"",
        rendition.media_type.as_str(),
        rendition.group_id,
        rendition.name
    );
    if let Some(uri) = &rendition.uri {
        push_quoted(out, "URI", uri);
    }
    if let Some(language) = &rendition.language {
        push_quoted(out, "LANGUAGE", language);
    }
    if let Some(assoc) = &rendition.assoc_language {
        push_quoted(out, "ASSOC-LANGUAGE", assoc);
    }
    if rendition.default {
        out.push_str(",DEFAULT=YES");
    }
    if rendition.autoselect {
        out.push_str(",AUTOSELECT=YES");
    }
    if rendition.forced {
        out.push_str(",FORCED=YES");
    }
    if let Some(instream_id) = &rendition.instream_id {
        push_quoted(out, "INSTREAM-ID", instream_id);
    }
    if let Some(characteristics) = &rendition.characteristics {
        push_quoted(out, "CHARACTERISTICS", characteristics);
    }
    if let Some(channels) = &rendition.channels {
        push_quoted(out, "CHANNELS", channels);
    }
    out.push('\n');
}

fn write_variant(out: &mut String, variant: &Variant) {
    let _ = write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", variant.bandwidth);
    if let Some(average) = variant.average_bandwidth {
        push_plain(out, "AVERAGE-BANDWIDTH", average);
    }
    if let Some(codecs) = &variant.codecs {
        push_quoted(out, "CODECS", codecs);
    }
    if let Some(resolution) = &variant.resolution {
        push_plain(out, "RESOLUTION", resolution);
    }
    if let Some(frame_rate) = variant.frame_rate {
        push_plain(out, "FRAME-RATE", format!("{frame_rate:.3}"));
    }
    if let Some(hdcp) = &variant.hdcp_level {
        push_plain(out, "HDCP-LEVEL", hdcp);
    }
    if let Some(audio) = &variant.audio {
        push_quoted(out, "AUDIO", audio);
    }
    if let Some(video) = &variant.video {
        push_quoted(out, "VIDEO", video);
    }
    if let Some(subtitles) = &variant.subtitles {
        push_quoted(out, "SUBTITLES", subtitles);
    }
    if let Some(closed_captions) = &variant.closed_captions {
        push_quoted(out, "CLOSED-CAPTIONS", closed_captions);
    }
    out.push('\n');
    out.push_str(&variant.uri);
    out.push('\n');
}

fn write_key_attributes(out: &mut String, key: &Key) {
    let _ = write!(out, "METHOD={}", key.method.as_str());
    if let Some(uri) = &key.uri {
        push_quoted(out, "URI", uri);
    }
    if let Some(iv) = &key.iv {
        push_plain(out, "IV", iv);
    }
    if let Some(format) = &key.key_format {
        push_quoted(out, "KEYFORMAT", format);
    }
    if let Some(versions) = &key.key_format_versions {
        push_quoted(out, "KEYFORMATVERSIONS", versions);
    }
}

fn write_media(media: &MediaPlaylist) -> String {
    let mut out = String::from("#EXTM3U\n");

    if media.version != 1 {
        let _ = writeln!(out, "#EXT-X-VERSION:{}", media.version);
    }
    let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", media.target_duration);
    if media.media_sequence != 0 {
        let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", media.media_sequence);
    }
    if let Some(sequence) = media.discontinuity_sequence {
        let _ = writeln!(out, "#EXT-X-DISCONTINUITY-SEQUENCE:{sequence}");
    }
    if let Some(playlist_type) = media.playlist_type {
        let _ = writeln!(out, "#EXT-X-PLAYLIST-TYPE:{}", playlist_type.as_str());
    }
    if media.i_frames_only {
        out.push_str("#EXT-X-I-FRAMES-ONLY\n");
    }
    if media.independent_segments {
        out.push_str("#EXT-X-INDEPENDENT-SEGMENTS\n");
    }
    if let Some(start) = &media.start {
        let _ = write!(out, "#EXT-X-START:TIME-OFFSET={}", format_duration(start.time_offset));
        if start.precise {
            out.push_str(",PRECISE=YES");
        }
        out.push('\n');
    }

    for date_range in &media.date_ranges {
        let _ = write!(
            out,
            "#EXT-X-DATERANGE:ID=\"{}\",START-DATE=\"{}\"",
            date_range.id, date_range.start_date
        );
        if let Some(class) = &date_range.class {
            push_quoted(&mut out, "CLASS", class);
        }
        if let Some(end_date) = &date_range.end_date {
            push_quoted(&mut out, "END-DATE", end_date);
        }
        if let Some(duration) = date_range.duration {
            push_plain(&mut out, "DURATION", format_duration(duration));
        }
        if let Some(planned) = date_range.planned_duration {
            push_plain(&mut out, "PLANNED-DURATION", format_duration(planned));
        }
        for (key, value) in &date_range.client_attributes {
            match value {
                AttributeValue::String(text) => push_quoted(&mut out, &format!("X-{key}"), text),
                AttributeValue::Number(number) => {
                    push_plain(&mut out, &format!("X-{key}"), format_duration(*number));
                }
            }
        }
        if date_range.end_on_next {
            out.push_str(",END-ON-NEXT=YES");
        }
        out.push('\n');
    }

    // Key, map and bitrate state persist across segments; only emit on change.
    let mut emitted_key: Option<Key> = None;
    let mut key_was_emitted = false;
    let mut emitted_map: Option<InitMap> = None;
    let mut emitted_bitrate: Option<u64> = None;

    for segment in &media.segments {
        write_segment(
            &mut out,
            segment,
            &mut emitted_key,
            &mut key_was_emitted,
            &mut emitted_map,
            &mut emitted_bitrate,
        );
    }

    if media.end_list {
        out.push_str("#EXT-X-ENDLIST\n");
    }

    out
}

fn write_segment(
    out: &mut String,
    segment: &Segment,
    emitted_key: &mut Option<Key>,
    key_was_emitted: &mut bool,
    emitted_map: &mut Option<InitMap>,
    emitted_bitrate: &mut Option<u64>,
) {
    if segment.key != *emitted_key {
        match &segment.key {
            Some(key) => {
                out.push_str("#EXT-X-KEY:");
                write_key_attributes(out, key);
                out.push('\n');
                *key_was_emitted = true;
            }
            None if *key_was_emitted => {
                out.push_str("#EXT-X-KEY:METHOD=NONE\n");
            }
            None => {}
        }
        *emitted_key = segment.key.clone();
    }

    if segment.map != *emitted_map {
        if let Some(map) = &segment.map {
            let _ = write!(out, "#EXT-X-MAP:URI=\"{}\"", map.uri);
            if let Some(range) = &map.byte_range {
                push_quoted(out, "BYTERANGE", &byte_range_value(range));
            }
            out.push('\n');
        }
        *emitted_map = segment.map.clone();
    }

    if segment.bitrate != *emitted_bitrate {
        if let Some(bitrate) = segment.bitrate {
            // Tag value is kbps, the model carries bps.
            let _ = writeln!(out, "#EXT-X-BITRATE:{}", bitrate / 1000);
        }
        *emitted_bitrate = segment.bitrate;
    }

    if segment.discontinuity {
        out.push_str("#EXT-X-DISCONTINUITY\n");
    }
    if let Some(date_time) = &segment.program_date_time {
        let _ = writeln!(out, "#EXT-X-PROGRAM-DATE-TIME:{date_time}");
    }
    if segment.gap {
        out.push_str("#EXT-X-GAP\n");
    }
    if let Some(range) = &segment.byte_range {
        let _ = writeln!(out, "#EXT-X-BYTERANGE:{}", byte_range_value(range));
    }

    let _ = write!(out, "#EXTINF:{},", format_duration(segment.duration));
    if let Some(title) = &segment.title {
        out.push_str(title);
    }
    out.push('\n');
    out.push_str(&segment.uri);
    out.push('\n');
}
