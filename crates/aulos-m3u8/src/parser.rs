//! Tolerant line-based M3U8 parser.
//!
//! Dispatches master vs media on the presence of `EXT-X-STREAM-INF`,
//! `EXT-X-MEDIA` or `EXT-X-I-FRAME-STREAM-INF`. Unknown tags are ignored;
//! structural problems and missing mandatory attributes fail with a
//! [`ParseError`] carrying the offending line number.

use crate::attrs::AttrList;
use crate::types::{
    AttributeValue, ByteRange, DateRange, InitMap, Key, KeyMethod, MasterPlaylist, MediaPlaylist,
    MediaRendition, Playlist, PlaylistType, RenditionType, Resolution, Segment, SessionData, Start,
    Variant,
};
use crate::ParseError;

/// Parse a complete playlist document.
pub fn parse_playlist(text: &str) -> Result<Playlist, ParseError> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
        .collect();

    match lines.first() {
        Some((_, first)) if first.trim_start_matches('\u{feff}').trim() == "#EXTM3U" => {}
        Some((line, _)) => {
            return Err(ParseError::at(*line, "playlist must start with #EXTM3U"));
        }
        None => return Err(ParseError::at(1, "empty playlist")),
    }

    let is_master = lines.iter().any(|(_, line)| {
        line.starts_with("#EXT-X-STREAM-INF:")
            || line.starts_with("#EXT-X-MEDIA:")
            || line.starts_with("#EXT-X-I-FRAME-STREAM-INF:")
    });

    if is_master {
        parse_master(&lines).map(Playlist::Master)
    } else {
        parse_media(&lines).map(Playlist::Media)
    }
}

fn tag_value<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix(tag).and_then(|rest| rest.strip_prefix(':'))
}

fn parse_master(lines: &[(usize, &str)]) -> Result<MasterPlaylist, ParseError> {
    let mut master = MasterPlaylist {
        version: 1,
        ..MasterPlaylist::default()
    };
    let mut pending_variant: Option<Variant> = None;

    for &(line_no, line) in &lines[1..] {
        if line.is_empty() {
            continue;
        }

        if !line.starts_with('#') {
            // URI line completing the preceding EXT-X-STREAM-INF.
            if let Some(mut variant) = pending_variant.take() {
                variant.uri = line.to_string();
                master.variants.push(variant);
            }
            continue;
        }

        if let Some(value) = tag_value(line, "#EXT-X-VERSION") {
            master.version = value
                .parse()
                .map_err(|_| ParseError::at(line_no, format!("invalid version: {value:?}")))?;
        } else if line == "#EXT-X-INDEPENDENT-SEGMENTS" {
            master.independent_segments = true;
        } else if let Some(value) = tag_value(line, "#EXT-X-STREAM-INF") {
            let attrs = AttrList::parse(value, line_no)?;
            pending_variant = Some(parse_variant(&attrs, line_no)?);
        } else if tag_value(line, "#EXT-X-I-FRAME-STREAM-INF").is_some() {
            // Trick-play variants carry their URI as an attribute and are not
            // part of the selectable variant list.
        } else if let Some(value) = tag_value(line, "#EXT-X-MEDIA") {
            let attrs = AttrList::parse(value, line_no)?;
            master.renditions.push(parse_rendition(&attrs, line_no)?);
        } else if let Some(value) = tag_value(line, "#EXT-X-SESSION-DATA") {
            let attrs = AttrList::parse(value, line_no)?;
            master.session_data = Some(SessionData {
                data_id: attrs.require("DATA-ID", "EXT-X-SESSION-DATA", line_no)?,
                value: attrs.get_str("VALUE"),
                uri: attrs.get_str("URI"),
                language: attrs.get_str("LANGUAGE"),
            });
        } else if let Some(value) = tag_value(line, "#EXT-X-SESSION-KEY") {
            let attrs = AttrList::parse(value, line_no)?;
            master.session_key = parse_key(&attrs, line_no)?;
        }
        // Any other tag or comment: ignored.
    }

    Ok(master)
}

fn parse_variant(attrs: &AttrList, line: usize) -> Result<Variant, ParseError> {
    let bandwidth = attrs
        .require("BANDWIDTH", "EXT-X-STREAM-INF", line)?
        .parse::<u64>()
        .map_err(|_| ParseError::at(line, "BANDWIDTH is not an integer"))?;

    Ok(Variant {
        uri: String::new(),
        bandwidth,
        average_bandwidth: attrs.get_u64("AVERAGE-BANDWIDTH", line)?,
        resolution: attrs
            .get_str("RESOLUTION")
            .map(|value| parse_resolution(&value, line))
            .transpose()?,
        frame_rate: attrs.get_f64("FRAME-RATE", line)?,
        codecs: attrs.get_str("CODECS"),
        audio: attrs.get_str("AUDIO"),
        video: attrs.get_str("VIDEO"),
        subtitles: attrs.get_str("SUBTITLES"),
        closed_captions: attrs.get_str("CLOSED-CAPTIONS"),
        hdcp_level: attrs.get_str("HDCP-LEVEL"),
    })
}

fn parse_resolution(value: &str, line: usize) -> Result<Resolution, ParseError> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| ParseError::at(line, format!("invalid RESOLUTION: {value:?}")))?;
    let width = w
        .parse()
        .map_err(|_| ParseError::at(line, format!("invalid RESOLUTION: {value:?}")))?;
    let height = h
        .parse()
        .map_err(|_| ParseError::at(line, format!("invalid RESOLUTION: {value:?}")))?;
    Ok(Resolution { width, height })
}

fn parse_rendition(attrs: &AttrList, line: usize) -> Result<MediaRendition, ParseError> {
    let media_type = match attrs.require("TYPE", "EXT-X-MEDIA", line)?.as_str() {
        "AUDIO" => RenditionType::Audio,
        "VIDEO" => RenditionType::Video,
        "SUBTITLES" => RenditionType::Subtitles,
        "CLOSED-CAPTIONS" => RenditionType::ClosedCaptions,
        other => {
            return Err(ParseError::at(
                line,
                format!("invalid EXT-X-MEDIA TYPE: {other:?}"),
            ));
        }
    };

    let uri = attrs.get_str("URI");
    if uri.is_none() && media_type != RenditionType::ClosedCaptions {
        return Err(ParseError::at(
            line,
            format!("EXT-X-MEDIA TYPE={} requires URI", media_type.as_str()),
        ));
    }

    Ok(MediaRendition {
        media_type,
        group_id: attrs.require("GROUP-ID", "EXT-X-MEDIA", line)?,
        name: attrs.require("NAME", "EXT-X-MEDIA", line)?,
        uri,
        language: attrs.get_str("LANGUAGE"),
        assoc_language: attrs.get_str("ASSOC-LANGUAGE"),
        default: attrs.get_bool("DEFAULT"),
        autoselect: attrs.get_bool("AUTOSELECT"),
        forced: attrs.get_bool("FORCED"),
        instream_id: attrs.get_str("INSTREAM-ID"),
        characteristics: attrs.get_str("CHARACTERISTICS"),
        channels: attrs.get_str("CHANNELS"),
    })
}

fn parse_key(attrs: &AttrList, line: usize) -> Result<Option<Key>, ParseError> {
    let method = match attrs.require("METHOD", "EXT-X-KEY", line)?.as_str() {
        "NONE" => return Ok(None),
        "AES-128" => KeyMethod::Aes128,
        "SAMPLE-AES" => KeyMethod::SampleAes,
        other => {
            return Err(ParseError::at(
                line,
                format!("invalid EXT-X-KEY METHOD: {other:?}"),
            ));
        }
    };

    Ok(Some(Key {
        method,
        uri: attrs.get_str("URI"),
        iv: attrs.get_str("IV"),
        key_format: attrs.get_str("KEYFORMAT"),
        key_format_versions: attrs.get_str("KEYFORMATVERSIONS"),
    }))
}

/// `LEN[@OFFSET]` byte-range value (used by `EXT-X-BYTERANGE` and the
/// `BYTERANGE` attribute of `EXT-X-MAP`).
fn parse_byte_range_value(value: &str, line: usize) -> Result<ByteRange, ParseError> {
    let (length_str, offset_str) = match value.split_once('@') {
        Some((l, o)) => (l, Some(o)),
        None => (value, None),
    };
    let length = length_str
        .trim()
        .parse()
        .map_err(|_| ParseError::at(line, format!("invalid byte range: {value:?}")))?;
    let offset = offset_str
        .map(|o| {
            o.trim()
                .parse()
                .map_err(|_| ParseError::at(line, format!("invalid byte range: {value:?}")))
        })
        .transpose()?;
    Ok(ByteRange { length, offset })
}

/// Per-segment tags awaiting their URI line.
#[derive(Default)]
struct PendingSegment {
    duration: Option<f64>,
    title: Option<String>,
    byte_range: Option<ByteRange>,
    discontinuity: bool,
    program_date_time: Option<String>,
    gap: bool,
}

fn parse_media(lines: &[(usize, &str)]) -> Result<MediaPlaylist, ParseError> {
    let mut playlist = MediaPlaylist {
        version: 1,
        ..MediaPlaylist::default()
    };

    let mut pending = PendingSegment::default();
    // Persistent segment state: key and map apply until overridden, the
    // byte-range cursor resolves elided offsets.
    let mut current_key: Option<Key> = None;
    let mut current_map: Option<InitMap> = None;
    let mut current_bitrate: Option<u64> = None;
    let mut range_cursor: u64 = 0;

    for &(line_no, line) in &lines[1..] {
        if line.is_empty() {
            continue;
        }

        if !line.starts_with('#') {
            playlist.segments.push(Segment {
                uri: line.to_string(),
                duration: pending.duration.take().unwrap_or(0.0),
                title: pending.title.take(),
                byte_range: pending.byte_range.take(),
                discontinuity: pending.discontinuity,
                program_date_time: pending.program_date_time.take(),
                key: current_key.clone(),
                map: current_map.clone(),
                gap: pending.gap,
                bitrate: current_bitrate,
            });
            pending = PendingSegment::default();
            continue;
        }

        if let Some(value) = tag_value(line, "#EXT-X-VERSION") {
            playlist.version = value
                .parse()
                .map_err(|_| ParseError::at(line_no, format!("invalid version: {value:?}")))?;
        } else if let Some(value) = tag_value(line, "#EXT-X-TARGETDURATION") {
            playlist.target_duration = value.parse().map_err(|_| {
                ParseError::at(line_no, format!("invalid target duration: {value:?}"))
            })?;
        } else if let Some(value) = tag_value(line, "#EXT-X-MEDIA-SEQUENCE") {
            playlist.media_sequence = value.parse().map_err(|_| {
                ParseError::at(line_no, format!("invalid media sequence: {value:?}"))
            })?;
        } else if let Some(value) = tag_value(line, "#EXT-X-DISCONTINUITY-SEQUENCE") {
            playlist.discontinuity_sequence = Some(value.parse().map_err(|_| {
                ParseError::at(line_no, format!("invalid discontinuity sequence: {value:?}"))
            })?);
        } else if let Some(value) = tag_value(line, "#EXT-X-PLAYLIST-TYPE") {
            playlist.playlist_type = Some(match value {
                "VOD" => PlaylistType::Vod,
                "EVENT" => PlaylistType::Event,
                other => {
                    return Err(ParseError::at(
                        line_no,
                        format!("invalid playlist type: {other:?}"),
                    ));
                }
            });
        } else if line == "#EXT-X-ENDLIST" {
            playlist.end_list = true;
        } else if line == "#EXT-X-I-FRAMES-ONLY" {
            playlist.i_frames_only = true;
        } else if line == "#EXT-X-INDEPENDENT-SEGMENTS" {
            playlist.independent_segments = true;
        } else if line == "#EXT-X-DISCONTINUITY" {
            pending.discontinuity = true;
        } else if line == "#EXT-X-GAP" {
            pending.gap = true;
        } else if let Some(value) = tag_value(line, "#EXTINF") {
            let (duration_str, title) = match value.split_once(',') {
                Some((d, t)) => (d, (!t.is_empty()).then(|| t.to_string())),
                None => (value, None),
            };
            pending.duration = Some(duration_str.trim().parse().map_err(|_| {
                ParseError::at(line_no, format!("invalid EXTINF duration: {duration_str:?}"))
            })?);
            pending.title = title;
        } else if let Some(value) = tag_value(line, "#EXT-X-BYTERANGE") {
            let mut range = parse_byte_range_value(value, line_no)?;
            // Elided offset continues directly after the previous byte range.
            if range.offset.is_none() {
                range.offset = Some(range_cursor);
            }
            range_cursor = range.end();
            pending.byte_range = Some(range);
        } else if let Some(value) = tag_value(line, "#EXT-X-PROGRAM-DATE-TIME") {
            pending.program_date_time = Some(value.to_string());
        } else if let Some(value) = tag_value(line, "#EXT-X-KEY") {
            let attrs = AttrList::parse(value, line_no)?;
            current_key = parse_key(&attrs, line_no)?;
        } else if let Some(value) = tag_value(line, "#EXT-X-MAP") {
            let attrs = AttrList::parse(value, line_no)?;
            current_map = Some(InitMap {
                uri: attrs.require("URI", "EXT-X-MAP", line_no)?,
                byte_range: attrs
                    .get_str("BYTERANGE")
                    .map(|v| parse_byte_range_value(&v, line_no))
                    .transpose()?,
            });
        } else if let Some(value) = tag_value(line, "#EXT-X-BITRATE") {
            let kbps: u64 = value
                .trim()
                .parse()
                .map_err(|_| ParseError::at(line_no, format!("invalid bitrate: {value:?}")))?;
            current_bitrate = Some(kbps * 1000);
        } else if let Some(value) = tag_value(line, "#EXT-X-DATERANGE") {
            let attrs = AttrList::parse(value, line_no)?;
            playlist.date_ranges.push(parse_date_range(&attrs, line_no)?);
        } else if let Some(value) = tag_value(line, "#EXT-X-START") {
            let attrs = AttrList::parse(value, line_no)?;
            if let Some(time_offset) = attrs.get_f64("TIME-OFFSET", line_no)? {
                playlist.start = Some(Start {
                    time_offset,
                    precise: attrs.get_bool("PRECISE"),
                });
            }
        }
        // Any other tag or comment: ignored.
    }

    Ok(playlist)
}

fn parse_date_range(attrs: &AttrList, line: usize) -> Result<DateRange, ParseError> {
    let mut client_attributes = Vec::new();
    for (key, value) in attrs.iter() {
        if let Some(stripped) = key.strip_prefix("X-") {
            let parsed = if !value.quoted {
                value
                    .value
                    .parse::<f64>()
                    .map(AttributeValue::Number)
                    .unwrap_or_else(|_| AttributeValue::String(value.value.clone()))
            } else {
                AttributeValue::String(value.value.clone())
            };
            client_attributes.push((stripped.to_string(), parsed));
        }
    }

    Ok(DateRange {
        id: attrs.require("ID", "EXT-X-DATERANGE", line)?,
        class: attrs.get_str("CLASS"),
        start_date: attrs.require("START-DATE", "EXT-X-DATERANGE", line)?,
        end_date: attrs.get_str("END-DATE"),
        duration: attrs.get_f64("DURATION", line)?,
        planned_duration: attrs.get_f64("PLANNED-DURATION", line)?,
        client_attributes,
        end_on_next: attrs.get_bool("END-ON-NEXT"),
    })
}
