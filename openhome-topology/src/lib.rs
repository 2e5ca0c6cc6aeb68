//! OpenHome Topology Reconciliation
//!
//! Turns the raw event stream of an OpenHome control-point engine into a
//! consistent, observable model of a whole house: products, rooms, songcast
//! zones, and playlists.
//!
//! # Architecture
//!
//! ```text
//! Engine events ──> HouseReconciler ──> StateStore ──> watchers
//!  (openhome-events)  (single writer)    (queries)     (reactive)
//!                          │
//!                          └──> PlaylistRegistry ──> PlaylistSnapshot
//! ```
//!
//! The reconciler is the sole writer and applies events in arrival order, so
//! observers never see a torn topology. Where derived state depends on more
//! than one device (rooms, zones), it is recomputed from the full staged
//! state, which makes the outcome independent of event arrival order.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use openhome_topology::{HouseManager, RoomStandby, RoomOrder};
//!
//! let manager = HouseManager::new(engine, browser)?;
//!
//! // Ordered room list, reactively
//! let mut rooms = manager.watch_house::<RoomOrder>();
//! while rooms.changed().await.is_ok() {
//!     println!("rooms: {:?}", rooms.current());
//! }
//!
//! // Paged playlist reads against a pinned snapshot
//! let snapshot = manager.playlist(&device)?;
//! let page = snapshot.read(0, 50).await?;
//! ```

// Core modules
pub mod changes;
pub mod error;
pub mod logging;
pub mod manager;
pub mod model;
pub mod playlist;
pub mod property;
pub mod store;

// The reconciliation loop itself is internal; it is driven by HouseManager
mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

// Manager (main interface)
pub use manager::{HouseManager, PropertyWatcher};

// Store
pub use store::{StateChange, StateStore};

// Model types
pub use model::{ProductInfo, RoomId, RoomInfo, Zone, ZoneRole};

// Properties
pub use property::{
    CurrentSource, MuteState, NowPlaying, PlaylistIds, PlaylistTransport, Property, ReceiverFeed,
    RepeatMode, RoomOrder, RoomStandby, RoomTransport, RoomZone, Scope, SenderAudio, ShuffleMode,
    SourceIndex, SourceList, Standby, TopologyProperty, TrackPosition, VolumeLevel,
};

// Playlists
pub use playlist::{PlaylistRegistry, PlaylistSnapshot, TrackCache};

// Change consumption
pub use changes::{BlockingChangeIterator, ChangeFilter, ChangeStream};

// Subscription policy
pub use reconciler::BASE_SERVICES;

// Errors
pub use error::{Result, StateError};

// Logging
pub use logging::{init_logging, init_logging_from_env, is_initialized, LoggingError, LoggingMode};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::changes::{ChangeFilter, ChangeStream};
    pub use crate::manager::{HouseManager, PropertyWatcher};
    pub use crate::model::{RoomId, RoomInfo, Zone, ZoneRole};
    pub use crate::property::{
        CurrentSource, NowPlaying, PlaylistIds, RoomOrder, RoomStandby, RoomTransport, RoomZone,
        SourceList, Standby, TopologyProperty, VolumeLevel,
    };
    pub use crate::store::{StateChange, StateStore};
}
