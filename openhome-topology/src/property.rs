//! Property types for the reconciled topology
//!
//! Properties are the unit of observable state. Each one:
//! - has a stable key (from `watch_store::Property`)
//! - belongs to a scope (product, room, or the house itself)
//! - names the service its data comes from, which is what drives
//!   demand-driven subscriptions

use serde::{Deserialize, Serialize};

use openhome_services::{SenderStatus, Service, Source, TrackMetadata, TransportState};

use crate::model::{RoomId, ZoneRole};

// Re-export the base trait; topology properties are watch-store properties
// with routing metadata on top.
pub use watch_store::Property;

/// Where a property lives and how it is keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Per product (keyed by `DeviceId`)
    Product,
    /// Per room (keyed by `RoomId`)
    Room,
    /// One per house
    House,
}

/// Routing metadata for topology properties
pub trait TopologyProperty: Property {
    /// Scope this property is stored under
    const SCOPE: Scope;

    /// Service whose events produce this property
    ///
    /// Watching a product property of service S holds a subscription to S on
    /// that product for the watcher's lifetime.
    const SERVICE: Service;
}

// ============================================================================
// Product-scoped properties (Product service)
// ============================================================================

/// Product standby state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standby(pub bool);

impl Property for Standby {
    const KEY: &'static str = "standby";
}

impl TopologyProperty for Standby {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Product;
}

/// Selected source index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceIndex(pub u32);

impl Property for SourceIndex {
    const KEY: &'static str = "source_index";
}

impl TopologyProperty for SourceIndex {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Product;
}

/// The product's input list, parsed from `SourceXml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceList(pub Vec<Source>);

impl Property for SourceList {
    const KEY: &'static str = "source_list";
}

impl TopologyProperty for SourceList {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Product;
}

impl SourceList {
    /// The source at an index, if the index is in range
    pub fn source_at(&self, index: u32) -> Option<&Source> {
        self.0.get(index as usize)
    }
}

// ============================================================================
// Product-scoped properties (Volume service)
// ============================================================================

/// Volume level (device units, typically 0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeLevel(pub u32);

impl Property for VolumeLevel {
    const KEY: &'static str = "volume";
}

impl TopologyProperty for VolumeLevel {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Volume;
}

/// Mute state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuteState(pub bool);

impl Property for MuteState {
    const KEY: &'static str = "mute";
}

impl TopologyProperty for MuteState {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Volume;
}

// ============================================================================
// Product-scoped properties (Playlist service)
// ============================================================================

/// Current playlist track IDs, in play order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistIds(pub Vec<u32>);

impl Property for PlaylistIds {
    const KEY: &'static str = "playlist_ids";
}

impl TopologyProperty for PlaylistIds {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Playlist;
}

/// Playlist transport state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistTransport(pub TransportState);

impl Property for PlaylistTransport {
    const KEY: &'static str = "playlist_transport";
}

impl TopologyProperty for PlaylistTransport {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Playlist;
}

/// Repeat mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatMode(pub bool);

impl Property for RepeatMode {
    const KEY: &'static str = "repeat";
}

impl TopologyProperty for RepeatMode {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Playlist;
}

/// Shuffle mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuffleMode(pub bool);

impl Property for ShuffleMode {
    const KEY: &'static str = "shuffle";
}

impl TopologyProperty for ShuffleMode {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Playlist;
}

// ============================================================================
// Product-scoped properties (Info service)
// ============================================================================

/// What the product is currently rendering
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NowPlaying {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub duration_seconds: Option<u32>,
}

impl Property for NowPlaying {
    const KEY: &'static str = "now_playing";
}

impl TopologyProperty for NowPlaying {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Info;
}

impl NowPlaying {
    /// Fold parsed DIDL metadata into the current value
    pub fn merge_metadata(&mut self, metadata: &TrackMetadata) {
        if metadata.title.is_some() {
            self.title = metadata.title.clone();
        }
        if metadata.artist.is_some() {
            self.artist = metadata.artist.clone();
        }
        if metadata.album.is_some() {
            self.album = metadata.album.clone();
        }
        if metadata.album_art_uri.is_some() {
            self.album_art_uri = metadata.album_art_uri.clone();
        }
    }
}

// ============================================================================
// Product-scoped properties (Time service)
// ============================================================================

/// Playback position within the current track
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackPosition {
    pub seconds: Option<u32>,
    pub duration_seconds: Option<u32>,
}

impl Property for TrackPosition {
    const KEY: &'static str = "track_position";
}

impl TopologyProperty for TrackPosition {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Time;
}

// ============================================================================
// Product-scoped properties (Sender / Receiver services)
// ============================================================================

/// Broadcast side of songcast, as last evented
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SenderAudio {
    /// Channel URI from the sender metadata
    pub uri: Option<String>,
    pub status: Option<SenderStatus>,
    /// Whether audio is flowing
    pub audio: bool,
}

impl Property for SenderAudio {
    const KEY: &'static str = "sender_audio";
}

impl TopologyProperty for SenderAudio {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Sender;
}

impl SenderAudio {
    /// A sender only anchors a zone while enabled with a known channel
    pub fn is_broadcasting(&self) -> bool {
        self.uri.is_some() && self.status == Some(SenderStatus::Enabled)
    }
}

/// Listening side of songcast, as last evented
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReceiverFeed {
    pub uri: Option<String>,
    pub transport: Option<TransportState>,
}

impl Property for ReceiverFeed {
    const KEY: &'static str = "receiver_feed";
}

impl TopologyProperty for ReceiverFeed {
    const SCOPE: Scope = Scope::Product;
    const SERVICE: Service = Service::Receiver;
}

impl ReceiverFeed {
    /// A receiver joins a zone only while actually playing its feed
    pub fn is_listening(&self) -> bool {
        self.uri.is_some() && self.transport.map(|t| t.is_playing()).unwrap_or(false)
    }
}

// ============================================================================
// Room-scoped properties
// ============================================================================

/// Room standby: true only when every product in the room is in standby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStandby(pub bool);

impl Property for RoomStandby {
    const KEY: &'static str = "room_standby";
}

impl TopologyProperty for RoomStandby {
    const SCOPE: Scope = Scope::Room;
    const SERVICE: Service = Service::Product;
}

/// The room's current source, taken from its active product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSource(pub Source);

impl Property for CurrentSource {
    const KEY: &'static str = "current_source";
}

impl TopologyProperty for CurrentSource {
    const SCOPE: Scope = Scope::Room;
    const SERVICE: Service = Service::Product;
}

/// The room's transport state, taken from its active product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTransport(pub TransportState);

impl Property for RoomTransport {
    const KEY: &'static str = "room_transport";
}

impl TopologyProperty for RoomTransport {
    const SCOPE: Scope = Scope::Room;
    const SERVICE: Service = Service::Playlist;
}

/// The room's relationship to songcast zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomZone(pub ZoneRole);

impl Property for RoomZone {
    const KEY: &'static str = "zone_role";
}

impl TopologyProperty for RoomZone {
    const SCOPE: Scope = Scope::Room;
    const SERVICE: Service = Service::Receiver;
}

// ============================================================================
// House-scoped properties
// ============================================================================

/// All rooms, ordered case-insensitively by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomOrder(pub Vec<RoomId>);

impl Property for RoomOrder {
    const KEY: &'static str = "room_order";
}

impl TopologyProperty for RoomOrder {
    const SCOPE: Scope = Scope::House;
    const SERVICE: Service = Service::Product;
}
