//! Typed service event payloads
//!
//! A GENA NOTIFY delivers a bag of `(variable, value)` strings. [`decode`]
//! turns that bag into the typed payload for its service. Payload fields are
//! `Option`: events are partial, and an absent variable means the device said
//! nothing about it.

use std::collections::HashMap;

use crate::error::Result;
use crate::id_array::decode_id_array;
use crate::metadata::{parse_source_xml, parse_track_metadata, sender_uri_from_metadata, TrackMetadata};
use crate::model::{SenderStatus, Source, TransportState};
use crate::service::Service;

// ============================================================================
// PropertySet
// ============================================================================

/// The raw evented variables of one NOTIFY
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    /// GENA event sequence number (0 on the initial, full-state NOTIFY)
    pub seq: u32,
    /// Variable name -> evented value
    pub variables: HashMap<String, String>,
}

impl PropertySet {
    pub fn new(seq: u32) -> Self {
        Self {
            seq,
            variables: HashMap::new(),
        }
    }

    /// Builder-style insert, mostly for fixtures and mock engines
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// UPnP booleans arrive as `0`/`1` or `false`/`true`
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            "1" | "true" | "True" => Some(true),
            "0" | "false" | "False" => Some(false),
            _ => None,
        }
    }

    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.get(name)?.parse().ok()
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }
}

// ============================================================================
// Per-service payloads
// ============================================================================

/// Product service: identity, standby, source selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductEvent {
    pub room: Option<String>,
    pub name: Option<String>,
    pub standby: Option<bool>,
    pub source_index: Option<u32>,
    pub source_count: Option<u32>,
    pub sources: Option<Vec<Source>>,
    pub attributes: Option<String>,
}

/// Playlist service: ordering, transport, play modes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistEvent {
    pub ids: Option<Vec<u32>>,
    pub transport_state: Option<TransportState>,
    pub current_id: Option<u32>,
    pub repeat: Option<bool>,
    pub shuffle: Option<bool>,
}

/// Volume service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeEvent {
    pub volume: Option<u32>,
    pub volume_limit: Option<u32>,
    pub mute: Option<bool>,
    pub fade: Option<i32>,
}

/// Info service: whatever is currently rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoEvent {
    pub uri: Option<String>,
    pub metadata: Option<TrackMetadata>,
    pub duration_seconds: Option<u32>,
    pub bit_rate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub lossless: Option<bool>,
    pub codec_name: Option<String>,
    pub metatext: Option<String>,
}

/// Time service: playback position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeEvent {
    pub track_count: Option<u32>,
    pub duration_seconds: Option<u32>,
    pub seconds: Option<u32>,
}

/// Sender service: the broadcast side of songcast
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenderEvent {
    pub audio: Option<bool>,
    pub status: Option<SenderStatus>,
    pub metadata: Option<String>,
    /// Channel URI pulled out of the metadata; the zone join key
    pub uri: Option<String>,
}

/// Receiver service: the listening side of songcast
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverEvent {
    /// Evented verbatim: `Some("")` means the feed was cleared, `None`
    /// means the event said nothing about it
    pub uri: Option<String>,
    pub transport_state: Option<TransportState>,
    pub metadata: Option<String>,
}

/// A decoded event from any service
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEventData {
    Product(ProductEvent),
    Playlist(PlaylistEvent),
    Volume(VolumeEvent),
    Info(InfoEvent),
    Time(TimeEvent),
    Sender(SenderEvent),
    Receiver(ReceiverEvent),
}

impl ServiceEventData {
    pub fn service(&self) -> Service {
        match self {
            ServiceEventData::Product(_) => Service::Product,
            ServiceEventData::Playlist(_) => Service::Playlist,
            ServiceEventData::Volume(_) => Service::Volume,
            ServiceEventData::Info(_) => Service::Info,
            ServiceEventData::Time(_) => Service::Time,
            ServiceEventData::Sender(_) => Service::Sender,
            ServiceEventData::Receiver(_) => Service::Receiver,
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a property set against the service that evented it
///
/// Unknown variables are ignored; unparsable enum-like values (transport
/// states, sender status) decode to `None`. Structured values (the ID
/// array, SourceXml) fail loudly instead, since silently dropping them
/// would desynchronize the topology.
pub fn decode(service: Service, properties: &PropertySet) -> Result<ServiceEventData> {
    match service {
        Service::Product => decode_product(properties),
        Service::Playlist => decode_playlist(properties),
        Service::Volume => Ok(ServiceEventData::Volume(decode_volume(properties))),
        Service::Info => Ok(ServiceEventData::Info(decode_info(properties))),
        Service::Time => Ok(ServiceEventData::Time(decode_time(properties))),
        Service::Sender => Ok(ServiceEventData::Sender(decode_sender(properties))),
        Service::Receiver => Ok(ServiceEventData::Receiver(decode_receiver(properties))),
    }
}

fn decode_product(properties: &PropertySet) -> Result<ServiceEventData> {
    let sources = match properties.get("SourceXml") {
        Some(xml) => Some(parse_source_xml(xml)?),
        None => None,
    };

    Ok(ServiceEventData::Product(ProductEvent {
        room: properties.get_string("ProductRoom"),
        name: properties.get_string("ProductName"),
        standby: properties.get_bool("Standby"),
        source_index: properties.get_u32("SourceIndex"),
        source_count: properties.get_u32("SourceCount"),
        sources,
        attributes: properties.get_string("Attributes"),
    }))
}

fn decode_playlist(properties: &PropertySet) -> Result<ServiceEventData> {
    let ids = match properties.get("IdArray") {
        Some(encoded) => Some(decode_id_array(encoded)?),
        None => None,
    };

    Ok(ServiceEventData::Playlist(PlaylistEvent {
        ids,
        transport_state: properties
            .get("TransportState")
            .and_then(TransportState::parse),
        current_id: properties.get_u32("Id"),
        repeat: properties.get_bool("Repeat"),
        shuffle: properties.get_bool("Shuffle"),
    }))
}

fn decode_volume(properties: &PropertySet) -> VolumeEvent {
    VolumeEvent {
        volume: properties.get_u32("Volume"),
        volume_limit: properties.get_u32("VolumeLimit"),
        mute: properties.get_bool("Mute"),
        fade: properties.get("Fade").and_then(|f| f.parse().ok()),
    }
}

fn decode_info(properties: &PropertySet) -> InfoEvent {
    InfoEvent {
        uri: properties.get_string("Uri"),
        metadata: properties.get("Metadata").map(parse_track_metadata),
        duration_seconds: properties.get_u32("Duration"),
        bit_rate: properties.get_u32("BitRate"),
        sample_rate: properties.get_u32("SampleRate"),
        lossless: properties.get_bool("Lossless"),
        codec_name: properties.get_string("CodecName"),
        metatext: properties.get_string("Metatext"),
    }
}

fn decode_time(properties: &PropertySet) -> TimeEvent {
    TimeEvent {
        track_count: properties.get_u32("TrackCount"),
        duration_seconds: properties.get_u32("Duration"),
        seconds: properties.get_u32("Seconds"),
    }
}

fn decode_sender(properties: &PropertySet) -> SenderEvent {
    let metadata = properties.get_string("Metadata");
    let uri = metadata.as_deref().and_then(sender_uri_from_metadata);

    SenderEvent {
        audio: properties.get_bool("Audio"),
        status: properties.get("Status").and_then(SenderStatus::parse),
        metadata,
        uri,
    }
}

fn decode_receiver(properties: &PropertySet) -> ReceiverEvent {
    ReceiverEvent {
        uri: properties.get_string("Uri"),
        transport_state: properties
            .get("TransportState")
            .and_then(TransportState::parse),
        metadata: properties.get_string("Metadata"),
    }
}
