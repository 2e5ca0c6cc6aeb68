//! # OpenHome SDK - reactive control of whole-home audio
//!
//! A property-centric API over an OpenHome control-point engine:
//!
//! ```rust,ignore
//! use openhome_sdk::House;
//!
//! let house = House::connect(engine, browser)?;
//!
//! for room in house.rooms() {
//!     println!("{}: standby={:?}", room.name(), room.standby.get());
//! }
//!
//! if let Some(room) = house.room("Lounge") {
//!     // Two methods on each property handle:
//!     let asleep = room.standby.get();          // cached, instant
//!     let mut watcher = room.standby.watch();   // reactive
//!     watcher.changed().await.ok();
//!     println!("standby changed to {:?}", watcher.current());
//! }
//! ```
//!
//! ## Key features
//!
//! - **Rooms, not devices**: products group into rooms the way the house is
//!   actually laid out; multi-product rooms behave as one
//! - **Two access patterns**: `get()` for the cached value, `watch()` for a
//!   reactive watcher
//! - **Zones**: songcast sender/listener grouping is derived and observable
//!   like any other property
//! - **Playlist snapshots**: paged, cached track reads against a pinned ID
//!   ordering
//! - **Warm start**: the last-known room list is cached on disk so UIs can
//!   render before the network answers
//!
//! ## Architecture
//!
//! ```text
//! openhome-sdk        (House / Room / Product handles)
//!     ↓
//! openhome-topology   (reconciled observable state)
//!     ↓                        ↓
//! openhome-events     openhome-services
//!     ↓
//! ControlPointEngine  (the native UPnP engine binding - not this crate)
//! ```

// Main exports
pub use error::SdkError;
pub use house::House;
pub use product::{Product, ProductHandle};
pub use room::{Room, RoomHandle};

// Re-exports from the layers below that appear in this crate's API
pub use openhome_events::{ControlPointEngine, EngineError, EngineEvent, EventSink};
pub use openhome_services::{
    DeviceId, PlaylistBrowser, Service, Source, Track, TransportState,
};
pub use openhome_topology::{
    ChangeFilter, ChangeStream, CurrentSource, MuteState, NowPlaying, PlaylistIds,
    PlaylistSnapshot, PlaylistTransport, PropertyWatcher, RoomId, RoomOrder, RoomStandby,
    RoomTransport, RoomZone, StateChange, TrackPosition, VolumeLevel, Zone, ZoneRole,
};

// Internal modules
mod error;
mod house;
mod persist;
mod product;
mod room;
