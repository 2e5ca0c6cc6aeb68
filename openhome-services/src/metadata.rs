//! XML fragment parsing
//!
//! Two fragment dialects flow through OpenHome events:
//!
//! - `SourceXml` from the Product service: a plain `<SourceList>` document,
//!   parsed strictly with `quick-xml`.
//! - DIDL-Lite metadata from the Playlist/Info/Sender services: namespaced,
//!   frequently malformed in the wild, and often double-escaped. Parsed
//!   leniently by tag scanning, the same trade-off every control point ends
//!   up making for DIDL.

use serde::Deserialize;

use crate::error::{Result, ServiceError};
use crate::model::{Source, Track};

// ============================================================================
// SourceXml
// ============================================================================

#[derive(Debug, Deserialize)]
struct SourceListXml {
    #[serde(rename = "Source", default)]
    sources: Vec<SourceEntryXml>,
}

#[derive(Debug, Deserialize)]
struct SourceEntryXml {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Visible", default)]
    visible: String,
}

/// Parse the Product service `SourceXml` document
pub fn parse_source_xml(xml: &str) -> Result<Vec<Source>> {
    let parsed: SourceListXml =
        quick_xml::de::from_str(xml).map_err(|e| ServiceError::MalformedXml {
            context: "SourceXml",
            message: e.to_string(),
        })?;

    Ok(parsed
        .sources
        .into_iter()
        .map(|entry| Source {
            name: entry.name,
            kind: entry.kind,
            visible: matches!(entry.visible.as_str(), "true" | "1" | "True"),
        })
        .collect())
}

// ============================================================================
// DIDL-Lite
// ============================================================================

/// Fields extracted from one DIDL-Lite `<item>` fragment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub uri: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Parse a DIDL-Lite metadata fragment
///
/// Empty and `NOT_IMPLEMENTED` fragments yield empty metadata; anything the
/// fragment omits stays `None`.
pub fn parse_track_metadata(xml: &str) -> TrackMetadata {
    if xml.is_empty() || xml == "NOT_IMPLEMENTED" {
        return TrackMetadata::default();
    }

    let duration_ms = extract_attribute(xml, "res", "duration").and_then(|d| parse_duration_ms(&d));

    TrackMetadata {
        title: extract_element(xml, "dc:title"),
        artist: extract_element(xml, "upnp:artist").or_else(|| extract_element(xml, "dc:creator")),
        album: extract_element(xml, "upnp:album"),
        album_art_uri: extract_element(xml, "upnp:albumArtURI"),
        uri: extract_element(xml, "res"),
        duration_ms,
    }
}

/// Pull the songcast channel URI out of Sender service metadata
///
/// The Sender events its channel as the `<res>` of its metadata; that URI is
/// what Receiver services event back, so it is the join key for zones.
pub fn sender_uri_from_metadata(xml: &str) -> Option<String> {
    extract_element(xml, "res").filter(|uri| !uri.is_empty())
}

impl Track {
    /// Combine a playlist ID, a URI and parsed metadata into a track
    pub fn from_metadata(id: u32, uri: Option<String>, metadata: TrackMetadata) -> Self {
        Self {
            id,
            uri: uri.or(metadata.uri),
            title: metadata.title,
            artist: metadata.artist,
            album: metadata.album,
            album_art_uri: metadata.album_art_uri,
            duration_ms: metadata.duration_ms,
        }
    }
}

/// Parse `H:MM:SS` / `H:MM:SS.mmm` durations to milliseconds
pub fn parse_duration_ms(value: &str) -> Option<u64> {
    if value.is_empty() || value == "NOT_IMPLEMENTED" {
        return None;
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;

    let seconds_parts: Vec<&str> = parts[2].split('.').collect();
    let seconds: u64 = seconds_parts[0].parse().ok()?;
    let millis: u64 = seconds_parts
        .get(1)
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);

    Some((hours * 3600 + minutes * 60 + seconds) * 1000 + millis)
}

/// Find the text content of the first `<tag>` or `<tag attr=...>` element
fn extract_element(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut search_from = 0;
    loop {
        let start = xml[search_from..].find(&open)? + search_from;
        let after_tag = start + open.len();

        // Require a real tag boundary: "<res>" or "<res ", not "<result>"
        match xml.as_bytes().get(after_tag) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') => {}
            _ => {
                search_from = after_tag;
                continue;
            }
        }

        let content_start = xml[after_tag..].find('>')? + after_tag + 1;
        let content_end = xml[content_start..].find(&close)? + content_start;
        let content = unescape(&xml[content_start..content_end]);

        return if content.is_empty() {
            None
        } else {
            Some(content)
        };
    }
}

/// Find an attribute value on the first occurrence of `<tag ...>`
fn extract_attribute(xml: &str, tag: &str, attribute: &str) -> Option<String> {
    let open = format!("<{} ", tag);
    let start = xml.find(&open)? + open.len();
    let tag_end = xml[start..].find('>')? + start;
    let attrs = &xml[start..tag_end];

    let marker = format!("{}=\"", attribute);
    let value_start = attrs.find(&marker)? + marker.len();
    let value_end = attrs[value_start..].find('"')? + value_start;
    Some(unescape(&attrs[value_start..value_end]))
}

/// Undo the XML entity escaping DIDL fragments arrive with
fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
