//! Shared value types

use serde::{Deserialize, Serialize};

/// Rendering state of a playlist or receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Playing,
    Paused,
    Stopped,
    Buffering,
}

impl TransportState {
    /// Lenient parse of the evented `TransportState` string
    ///
    /// Devices are inconsistent about casing, and older firmware events
    /// `Waiting` where newer firmware events `Buffering`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "playing" => Some(TransportState::Playing),
            "paused" => Some(TransportState::Paused),
            "stopped" => Some(TransportState::Stopped),
            "buffering" | "waiting" => Some(TransportState::Buffering),
            _ => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }
}

/// Sender availability as evented by the Sender service `Status` variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderStatus {
    Enabled,
    Disabled,
    Blocked,
}

impl SenderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "enabled" => Some(SenderStatus::Enabled),
            "disabled" => Some(SenderStatus::Disabled),
            "blocked" => Some(SenderStatus::Blocked),
            _ => None,
        }
    }
}

/// One input of a product, parsed from the Product service `SourceXml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display name ("Playlist", "Analog1", ...)
    pub name: String,
    /// Source kind ("Playlist", "Radio", "Receiver", "Analog", ...)
    pub kind: String,
    /// Whether the UI should offer this source
    pub visible: bool,
}

impl Source {
    /// Receiver sources are how a room joins a songcast zone
    pub fn is_receiver(&self) -> bool {
        self.kind.eq_ignore_ascii_case("receiver")
    }
}

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Playlist-assigned track ID (unique per device playlist)
    pub id: u32,
    pub uri: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub duration_ms: Option<u64>,
}

impl Track {
    /// Placeholder for an ID the device no longer knows
    ///
    /// Snapshot reads hand these out instead of failing when a stale
    /// snapshot references a deleted track.
    pub fn unknown(id: u32) -> Self {
        Self {
            id,
            uri: None,
            title: None,
            artist: None,
            album: None,
            album_art_uri: None,
            duration_ms: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.uri.is_none() && self.title.is_none() && self.artist.is_none()
    }

    /// Display string for logs and simple UIs
    pub fn display(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{} - {}", artist, title),
            (None, Some(title)) => title.clone(),
            (Some(artist), None) => artist.clone(),
            (None, None) => format!("track #{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_parse() {
        assert_eq!(TransportState::parse("Playing"), Some(TransportState::Playing));
        assert_eq!(TransportState::parse("STOPPED"), Some(TransportState::Stopped));
        assert_eq!(
            TransportState::parse("Waiting"),
            Some(TransportState::Buffering)
        );
        assert_eq!(TransportState::parse("Eating"), None);
    }

    #[test]
    fn test_sender_status_parse() {
        assert_eq!(SenderStatus::parse("Enabled"), Some(SenderStatus::Enabled));
        assert_eq!(SenderStatus::parse("blocked"), Some(SenderStatus::Blocked));
        assert_eq!(SenderStatus::parse(""), None);
    }

    #[test]
    fn test_source_is_receiver() {
        let source = Source {
            name: "Songcast".to_string(),
            kind: "Receiver".to_string(),
            visible: true,
        };
        assert!(source.is_receiver());
    }

    #[test]
    fn test_unknown_track_display() {
        let track = Track::unknown(42);
        assert!(track.is_unknown());
        assert_eq!(track.display(), "track #42");
    }

    #[test]
    fn test_track_display_prefers_artist_title() {
        let mut track = Track::unknown(1);
        track.artist = Some("Orbital".to_string());
        track.title = Some("Halcyon".to_string());
        assert_eq!(track.display(), "Orbital - Halcyon");
    }
}
