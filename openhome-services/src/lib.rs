//! OpenHome service models
//!
//! Typed representations of the `av-openhome-org` UPnP services a control
//! point observes, plus the decoding that turns raw GENA property sets into
//! typed event payloads.
//!
//! This crate deliberately contains no wire protocol: subscription transport
//! and action invocation belong to the control-point engine. What lives here
//! is the vocabulary both sides share:
//!
//! - [`Service`]: which services exist and their `urn:` type strings
//! - [`PropertySet`]: the raw evented variables of one NOTIFY
//! - [`ServiceEventData`] and the per-service payloads it wraps
//! - [`decode`]: property set -> typed payload
//! - [`PlaylistBrowser`]: the one action trait the topology layer needs
//!
//! # Decoding rules
//!
//! UPnP events are partial: a NOTIFY carries only the variables that changed
//! (except the initial NOTIFY, which carries everything). Decoded payloads
//! therefore hold `Option` fields, and absent variables mean "no statement",
//! never "reset to default". Unknown variables are ignored.

pub mod browse;
pub mod device;
pub mod error;
pub mod event;
pub mod id_array;
pub mod metadata;
pub mod model;
pub mod service;

pub use browse::PlaylistBrowser;
pub use device::DeviceId;
pub use error::{Result, ServiceError};
pub use event::{
    decode, InfoEvent, PlaylistEvent, ProductEvent, PropertySet, ReceiverEvent, SenderEvent,
    ServiceEventData, TimeEvent, VolumeEvent,
};
pub use id_array::{decode_id_array, encode_id_array};
pub use metadata::{
    parse_duration_ms, parse_source_xml, parse_track_metadata, sender_uri_from_metadata,
    TrackMetadata,
};
pub use model::{SenderStatus, Source, Track, TransportState};
pub use service::Service;
