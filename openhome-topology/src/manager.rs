//! The house manager
//!
//! Top of the topology crate: owns the event manager, runs the reconciler on
//! its own thread, and exposes the observable house.
//!
//! # Subscription policy
//!
//! Product, Sender and Receiver are held for every device the engine
//! reports; the topology cannot be derived without them. Everything else
//! (Volume, Playlist, Info, Time) is demand-driven: watching a property
//! holds a ref-counted subscription to its service for the watcher's
//! lifetime.
//!
//! # Example
//!
//! ```rust,ignore
//! use openhome_topology::{HouseManager, VolumeLevel, RoomStandby};
//!
//! let manager = HouseManager::new(engine, browser)?;
//!
//! // Reactive: wake on change, read the current value any time
//! let mut volume = manager.watch_product::<VolumeLevel>(&device)?;
//! while volume.changed().await.is_ok() {
//!     println!("volume now {:?}", volume.current());
//! }
//! ```

use std::sync::Arc;
use std::thread;

use tokio::sync::watch;
use tracing::debug;

use openhome_events::{ControlPointEngine, EventManager};
use openhome_services::{DeviceId, PlaylistBrowser, Service};

use crate::changes::{BlockingChangeIterator, ChangeFilter, ChangeStream};
use crate::error::{Result, StateError};
use crate::model::{ProductInfo, RoomId, RoomInfo, Zone};
use crate::playlist::{PlaylistRegistry, PlaylistSnapshot};
use crate::property::{Property, RoomOrder, TopologyProperty};
use crate::reconciler::HouseReconciler;
use crate::store::StateStore;

// ============================================================================
// PropertyWatcher
// ============================================================================

/// Releases a demand-driven subscription when the last watcher goes away
struct SubscriptionGuard {
    events: Arc<EventManager>,
    device: DeviceId,
    service: Service,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Err(e) = self
            .events
            .release_subscription(&self.device, self.service)
        {
            debug!(
                device = %self.device,
                service = %self.service,
                "Subscription release on watcher drop failed: {}",
                e
            );
        }
    }
}

/// A reactive handle on one property
///
/// Holds the underlying service subscription (for product properties) while
/// alive; dropping the watcher releases it.
pub struct PropertyWatcher<P: Property> {
    rx: watch::Receiver<Option<P>>,
    _guard: Option<SubscriptionGuard>,
}

impl<P: Property> PropertyWatcher<P> {
    /// Wait for the property to change
    pub async fn changed(&mut self) -> std::result::Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// Current value, without waiting
    pub fn current(&self) -> Option<P> {
        self.rx.borrow().clone()
    }
}

// ============================================================================
// HouseManager
// ============================================================================

/// Reactive view of a whole house, driven by one engine
pub struct HouseManager {
    store: StateStore,
    events: Arc<EventManager>,
    playlists: Arc<PlaylistRegistry>,
    _reconciler: thread::JoinHandle<()>,
}

impl HouseManager {
    /// Wire up the manager: engine events in, observable topology out
    pub fn new<E: ControlPointEngine>(
        engine: E,
        browser: Arc<dyn PlaylistBrowser>,
    ) -> Result<Self> {
        let events = Arc::new(EventManager::new(engine)?);
        let store = StateStore::new();
        let playlists = Arc::new(PlaylistRegistry::new(browser));

        let reconciler = HouseReconciler::new(
            store.clone(),
            Arc::clone(&events),
            Arc::clone(&playlists),
        );
        let iter = events.iter();
        let handle = thread::Builder::new()
            .name("house-reconciler".to_string())
            .spawn(move || reconciler.run(iter))
            .map_err(StateError::ReconcilerStartup)?;

        Ok(Self {
            store,
            events,
            playlists,
            _reconciler: handle,
        })
    }

    // ========================================================================
    // Watching
    // ========================================================================

    /// Watch a product property; holds its service subscription while alive
    pub fn watch_product<P: TopologyProperty>(
        &self,
        device: &DeviceId,
    ) -> Result<PropertyWatcher<P>> {
        self.events.ensure_subscribed(device, P::SERVICE)?;

        Ok(PropertyWatcher {
            rx: self.store.watch_product::<P>(device),
            _guard: Some(SubscriptionGuard {
                events: Arc::clone(&self.events),
                device: device.clone(),
                service: P::SERVICE,
            }),
        })
    }

    /// Watch a room property
    ///
    /// Room properties derive from the always-held base services, so no
    /// extra subscription is needed.
    pub fn watch_room<P: TopologyProperty>(&self, room: &RoomId) -> PropertyWatcher<P> {
        PropertyWatcher {
            rx: self.store.watch_room::<P>(room),
            _guard: None,
        }
    }

    /// Watch a house property
    pub fn watch_house<P: TopologyProperty>(&self) -> PropertyWatcher<P> {
        PropertyWatcher {
            rx: self.store.watch_house::<P>(),
            _guard: None,
        }
    }

    // ========================================================================
    // Instant reads
    // ========================================================================

    pub fn get_product<P: TopologyProperty>(&self, device: &DeviceId) -> Option<P> {
        self.store.get_product::<P>(device)
    }

    pub fn get_room<P: TopologyProperty>(&self, room: &RoomId) -> Option<P> {
        self.store.get_room::<P>(room)
    }

    pub fn get_house<P: TopologyProperty>(&self) -> Option<P> {
        self.store.get_house::<P>()
    }

    pub fn product(&self, device: &DeviceId) -> Option<ProductInfo> {
        self.store.product(device)
    }

    pub fn room(&self, id: &RoomId) -> Option<RoomInfo> {
        self.store.room(id)
    }

    /// Rooms in house order
    pub fn rooms(&self) -> Vec<RoomInfo> {
        self.room_order()
            .into_iter()
            .filter_map(|id| self.store.room(&id))
            .collect()
    }

    pub fn room_order(&self) -> Vec<RoomId> {
        self.store
            .get_house::<RoomOrder>()
            .map(|order| order.0)
            .unwrap_or_default()
    }

    pub fn zones(&self) -> Vec<Zone> {
        self.store.zones()
    }

    // ========================================================================
    // Playlists
    // ========================================================================

    /// Pin the current playlist of a product for paged reading
    pub fn playlist(&self, device: &DeviceId) -> Result<PlaylistSnapshot> {
        self.playlists
            .snapshot(device)
            .ok_or_else(|| StateError::PlaylistUnknown(device.clone()))
    }

    // ========================================================================
    // Change firehose
    // ========================================================================

    /// Async stream of every state change
    pub fn changes(&self) -> ChangeStream {
        ChangeStream::new(self.store.subscribe_changes())
    }

    /// Async stream of changes matching a filter
    pub fn changes_filtered(&self, filter: ChangeFilter) -> ChangeStream {
        ChangeStream::filtered(self.store.subscribe_changes(), filter)
    }

    /// Blocking iterator for synchronous consumers
    pub fn changes_blocking(&self) -> BlockingChangeIterator {
        BlockingChangeIterator::new(self.store.subscribe_changes())
    }

    /// Blocking iterator with a filter
    pub fn changes_blocking_filtered(&self, filter: ChangeFilter) -> BlockingChangeIterator {
        BlockingChangeIterator::filtered(self.store.subscribe_changes(), filter)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop the event worker; the reconciler drains and exits
    pub fn shutdown(&self) {
        self.events.shutdown();
    }
}
