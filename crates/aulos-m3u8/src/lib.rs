#![forbid(unsafe_code)]

//! M3U8 playlist model, tolerant parser and round-trippable writer.
//!
//! The entry points are [`parse_playlist`] and [`write_playlist`]; everything
//! else is the value model they operate on.

use thiserror::Error;

mod attrs;
mod parser;
mod types;
mod writer;

pub use parser::parse_playlist;
pub use types::{
    AttributeValue, ByteRange, DateRange, InitMap, Key, KeyMethod, MasterPlaylist, MediaPlaylist,
    MediaRendition, Playlist, PlaylistType, RenditionType, Resolution, Segment, SessionData, Start,
    Variant,
};
pub use writer::{format_duration, write_playlist};

/// Playlist syntax or structure error, with the offending line when known.
#[derive(Debug, Clone, Error)]
#[error("playlist parse error{}: {message}", line.map(|l| format!(" at line {l}")).unwrap_or_default())]
pub struct ParseError {
    pub line: Option<usize>,
    pub message: String,
}

impl ParseError {
    pub(crate) fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}
