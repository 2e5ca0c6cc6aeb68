//! Model types for the reconciled topology

use serde::{Deserialize, Serialize};
use std::fmt;

use openhome_services::DeviceId;

// ============================================================================
// RoomId
// ============================================================================

/// Identity of a room
///
/// Rooms have no identity of their own on the network: they exist because
/// one or more products event the same `ProductRoom` string. The ID wraps
/// the trimmed name; ordering is case-insensitive so house listings read
/// naturally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used for house ordering
    pub fn sort_key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        RoomId::new(s)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        RoomId::new(s)
    }
}

// ============================================================================
// Metadata records
// ============================================================================

/// Static-ish description of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub device: DeviceId,
    /// Room the product claims, as evented
    pub room: RoomId,
    /// Product display name ("Majik DSM", ...)
    pub name: String,
}

/// Description of one room and the products behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: RoomId,
    /// Products claiming this room, in deterministic (device ID) order
    pub products: Vec<DeviceId>,
}

impl RoomInfo {
    pub fn new(id: RoomId, products: Vec<DeviceId>) -> Self {
        Self { id, products }
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

// ============================================================================
// Zones
// ============================================================================

/// A songcast zone: one sending room and the rooms listening to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Room the audio originates in
    pub sender_room: RoomId,
    /// The product doing the sending
    pub sender_device: DeviceId,
    /// Channel URI listeners tune to
    pub uri: String,
    /// Listening rooms, in house order
    pub listeners: Vec<RoomId>,
}

/// A room's relationship to zones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneRole {
    /// Not sending, not listening
    Standalone,
    /// Broadcasting; `listeners` may be empty
    Sender { listeners: Vec<RoomId> },
    /// Tuned to another room's sender
    Listener { sender_room: RoomId },
}

impl ZoneRole {
    pub fn is_standalone(&self) -> bool {
        matches!(self, ZoneRole::Standalone)
    }

    pub fn is_sender(&self) -> bool {
        matches!(self, ZoneRole::Sender { .. })
    }

    pub fn is_listener(&self) -> bool {
        matches!(self, ZoneRole::Listener { .. })
    }
}

impl Default for ZoneRole {
    fn default() -> Self {
        ZoneRole::Standalone
    }
}
