//! Unified topology store with reactive watchers
//!
//! Every piece of reconciled state flows through this store. Values can be:
//! - queried instantly via `get_*` (no async)
//! - watched reactively via `watch_*` (`tokio::sync::watch` channels, so a
//!   new watcher sees the current value immediately)
//! - observed wholesale via the `StateChange` broadcast firehose
//!
//! The reconciler task is the only writer; everything else reads. That
//! single-writer rule is what keeps observers from ever seeing a torn
//! topology (a room without its products, a zone without its sender).
//!
//! # Layout
//!
//! ```text
//! StateStore
//! ├── product_props: HashMap<DeviceId, PropertyBag>
//! ├── room_props:    HashMap<RoomId, PropertyBag>
//! ├── house_props:   PropertyBag
//! ├── products:      HashMap<DeviceId, ProductInfo>   (metadata)
//! ├── rooms:         HashMap<RoomId, RoomInfo>        (metadata)
//! └── changes_tx:    broadcast::Sender<StateChange>
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};

use openhome_services::{DeviceId, Service};
use watch_store::diff::ListDelta;

use crate::model::{ProductInfo, RoomId, RoomInfo, Zone};
use crate::property::{Property, TopologyProperty};

/// Capacity of the change broadcast; laggards drop, they are not waited on
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

// ============================================================================
// StateChange
// ============================================================================

/// One observable change to the reconciled topology
#[derive(Debug, Clone)]
pub enum StateChange {
    /// A product property changed
    ProductPropertyChanged {
        device: DeviceId,
        property_key: &'static str,
        service: Service,
    },
    /// A room property changed
    RoomPropertyChanged {
        room: RoomId,
        property_key: &'static str,
        service: Service,
    },
    /// A house property changed
    HousePropertyChanged {
        property_key: &'static str,
        service: Service,
    },
    /// A product became visible (room and name known)
    ProductAdded { device: DeviceId },
    /// A product vanished
    ProductRemoved { device: DeviceId },
    /// A room gained its first product
    RoomAdded { room: RoomId },
    /// A room lost its last product
    RoomRemoved { room: RoomId },
    /// The ordered room list changed; deltas replay old -> new
    RoomOrderChanged {
        order: Vec<RoomId>,
        deltas: Vec<ListDelta<RoomId>>,
    },
    /// The set of songcast zones changed
    ZonesChanged { zones: Vec<Zone> },
}

impl StateChange {
    /// The room this change concerns, if it concerns exactly one
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            StateChange::RoomPropertyChanged { room, .. } => Some(room),
            StateChange::RoomAdded { room } => Some(room),
            StateChange::RoomRemoved { room } => Some(room),
            _ => None,
        }
    }

    /// The device this change concerns, if it concerns exactly one
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            StateChange::ProductPropertyChanged { device, .. } => Some(device),
            StateChange::ProductAdded { device } => Some(device),
            StateChange::ProductRemoved { device } => Some(device),
            _ => None,
        }
    }
}

// ============================================================================
// PropertyBag (watch-channel backed)
// ============================================================================

/// Typed properties, each behind its own watch channel
///
/// Distinct from `watch_store::PropertyBag`: values here live inside
/// `watch::Sender`s so subscribers get the current value at watch time and
/// wake on change.
#[derive(Default)]
struct PropertyBag {
    channels: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertyBag {
    fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    fn get_or_create_sender<P: Property>(&mut self) -> &watch::Sender<Option<P>> {
        let type_id = TypeId::of::<P>();

        self.channels
            .entry(type_id)
            .or_insert_with(|| {
                let (tx, _rx) = watch::channel::<Option<P>>(None);
                Box::new(tx)
            })
            .downcast_ref::<watch::Sender<Option<P>>>()
            .expect("PropertyBag: type mismatch (this is a bug)")
    }

    /// Set a value; true when it changed
    fn set<P: Property>(&mut self, value: P) -> bool {
        let sender = self.get_or_create_sender::<P>();
        let changed = sender.borrow().as_ref() != Some(&value);

        if changed {
            // send_replace, not send: the value must stick even with no
            // receivers subscribed yet
            sender.send_replace(Some(value));
        }
        changed
    }

    fn get<P: Property>(&self) -> Option<P> {
        self.channels
            .get(&TypeId::of::<P>())
            .and_then(|boxed| boxed.downcast_ref::<watch::Sender<Option<P>>>())
            .and_then(|sender| sender.borrow().clone())
    }

    fn watch<P: Property>(&mut self) -> watch::Receiver<Option<P>> {
        self.get_or_create_sender::<P>().subscribe()
    }
}

// ============================================================================
// StateStore
// ============================================================================

/// The reconciled, observable topology
pub struct StateStore {
    product_props: Arc<RwLock<HashMap<DeviceId, PropertyBag>>>,
    room_props: Arc<RwLock<HashMap<RoomId, PropertyBag>>>,
    house_props: Arc<RwLock<PropertyBag>>,

    products: Arc<RwLock<HashMap<DeviceId, ProductInfo>>>,
    rooms: Arc<RwLock<HashMap<RoomId, RoomInfo>>>,
    zones: Arc<RwLock<Vec<Zone>>>,

    changes_tx: broadcast::Sender<StateChange>,
}

impl StateStore {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Self {
            product_props: Arc::new(RwLock::new(HashMap::new())),
            room_props: Arc::new(RwLock::new(HashMap::new())),
            house_props: Arc::new(RwLock::new(PropertyBag::new())),
            products: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
            zones: Arc::new(RwLock::new(Vec::new())),
            changes_tx,
        }
    }

    // ========================================================================
    // Reading (instant)
    // ========================================================================

    pub fn get_product<P: TopologyProperty>(&self, device: &DeviceId) -> Option<P> {
        self.product_props.read().get(device)?.get::<P>()
    }

    pub fn get_room<P: TopologyProperty>(&self, room: &RoomId) -> Option<P> {
        self.room_props.read().get(room)?.get::<P>()
    }

    pub fn get_house<P: TopologyProperty>(&self) -> Option<P> {
        self.house_props.read().get::<P>()
    }

    // ========================================================================
    // Watching (reactive)
    // ========================================================================

    /// Watch a product property; the receiver holds the current value
    pub fn watch_product<P: TopologyProperty>(
        &self,
        device: &DeviceId,
    ) -> watch::Receiver<Option<P>> {
        self.product_props
            .write()
            .entry(device.clone())
            .or_insert_with(PropertyBag::new)
            .watch::<P>()
    }

    pub fn watch_room<P: TopologyProperty>(&self, room: &RoomId) -> watch::Receiver<Option<P>> {
        self.room_props
            .write()
            .entry(room.clone())
            .or_insert_with(PropertyBag::new)
            .watch::<P>()
    }

    pub fn watch_house<P: TopologyProperty>(&self) -> watch::Receiver<Option<P>> {
        self.house_props.write().watch::<P>()
    }

    // ========================================================================
    // Writing (reconciler only)
    // ========================================================================

    /// Set a product property; notifies watchers on real change
    pub fn set_product<P: TopologyProperty>(&self, device: &DeviceId, value: P) -> bool {
        let changed = self
            .product_props
            .write()
            .entry(device.clone())
            .or_insert_with(PropertyBag::new)
            .set(value);

        if changed {
            self.broadcast(StateChange::ProductPropertyChanged {
                device: device.clone(),
                property_key: P::KEY,
                service: P::SERVICE,
            });
        }
        changed
    }

    pub fn set_room<P: TopologyProperty>(&self, room: &RoomId, value: P) -> bool {
        let changed = self
            .room_props
            .write()
            .entry(room.clone())
            .or_insert_with(PropertyBag::new)
            .set(value);

        if changed {
            self.broadcast(StateChange::RoomPropertyChanged {
                room: room.clone(),
                property_key: P::KEY,
                service: P::SERVICE,
            });
        }
        changed
    }

    pub fn set_house<P: TopologyProperty>(&self, value: P) -> bool {
        let changed = self.house_props.write().set(value);

        if changed {
            self.broadcast(StateChange::HousePropertyChanged {
                property_key: P::KEY,
                service: P::SERVICE,
            });
        }
        changed
    }

    // ========================================================================
    // Metadata management (reconciler only)
    // ========================================================================

    /// Add or update product metadata
    pub fn upsert_product(&self, product: ProductInfo) {
        let device = product.device.clone();
        let is_new = self
            .products
            .write()
            .insert(device.clone(), product)
            .is_none();

        if is_new {
            self.broadcast(StateChange::ProductAdded { device });
        }
    }

    /// Remove a product and its properties
    pub fn remove_product(&self, device: &DeviceId) {
        let removed = self.products.write().remove(device).is_some();
        if removed {
            self.product_props.write().remove(device);
            self.broadcast(StateChange::ProductRemoved {
                device: device.clone(),
            });
        }
    }

    pub fn upsert_room(&self, room: RoomInfo) {
        let id = room.id.clone();
        let is_new = self.rooms.write().insert(id.clone(), room).is_none();

        if is_new {
            self.broadcast(StateChange::RoomAdded { room: id });
        }
    }

    pub fn remove_room(&self, id: &RoomId) {
        let removed = self.rooms.write().remove(id).is_some();
        if removed {
            self.room_props.write().remove(id);
            self.broadcast(StateChange::RoomRemoved { room: id.clone() });
        }
    }

    /// Publish the ordered room list along with its edit script
    pub fn set_room_order(&self, order: Vec<RoomId>, deltas: Vec<ListDelta<RoomId>>) {
        let changed = self
            .house_props
            .write()
            .set(crate::property::RoomOrder(order.clone()));

        if changed {
            self.broadcast(StateChange::RoomOrderChanged { order, deltas });
        }
    }

    /// Publish the zone set
    pub fn set_zones(&self, zones: Vec<Zone>) {
        let changed = {
            let mut current = self.zones.write();
            if *current != zones {
                *current = zones.clone();
                true
            } else {
                false
            }
        };

        if changed {
            self.broadcast(StateChange::ZonesChanged { zones });
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn product(&self, device: &DeviceId) -> Option<ProductInfo> {
        self.products.read().get(device).cloned()
    }

    pub fn room(&self, id: &RoomId) -> Option<RoomInfo> {
        self.rooms.read().get(id).cloned()
    }

    pub fn products(&self) -> Vec<ProductInfo> {
        self.products.read().values().cloned().collect()
    }

    pub fn rooms(&self) -> Vec<RoomInfo> {
        self.rooms.read().values().cloned().collect()
    }

    pub fn zones(&self) -> Vec<Zone> {
        self.zones.read().clone()
    }

    pub fn product_count(&self) -> usize {
        self.products.read().len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.product_count() == 0
    }

    // ========================================================================
    // Change firehose
    // ========================================================================

    /// Subscribe to every state change
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes_tx.subscribe()
    }

    fn broadcast(&self, change: StateChange) {
        // No receivers is fine; the store does not care who listens
        let _ = self.changes_tx.send(change);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateStore {
    fn clone(&self) -> Self {
        Self {
            product_props: Arc::clone(&self.product_props),
            room_props: Arc::clone(&self.room_props),
            house_props: Arc::clone(&self.house_props),
            products: Arc::clone(&self.products),
            rooms: Arc::clone(&self.rooms),
            zones: Arc::clone(&self.zones),
            changes_tx: self.changes_tx.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{RoomStandby, SourceIndex, Standby, VolumeLevel};

    fn device() -> DeviceId {
        DeviceId::new("4c494e4e-dev-1")
    }

    fn product_info() -> ProductInfo {
        ProductInfo {
            device: device(),
            room: RoomId::new("Lounge"),
            name: "Majik DSM".to_string(),
        }
    }

    #[test]
    fn test_set_and_get_product_property() {
        let store = StateStore::new();
        let id = device();

        assert!(store.get_product::<Standby>(&id).is_none());
        assert!(store.set_product(&id, Standby(false)));
        assert_eq!(store.get_product::<Standby>(&id), Some(Standby(false)));

        // Same value: no change
        assert!(!store.set_product(&id, Standby(false)));
    }

    #[test]
    fn test_change_broadcast_fires_once_per_real_change() {
        let store = StateStore::new();
        let id = device();
        let mut rx = store.subscribe_changes();

        store.set_product(&id, VolumeLevel(30));
        assert!(matches!(
            rx.try_recv(),
            Ok(StateChange::ProductPropertyChanged {
                property_key: "volume",
                ..
            })
        ));

        store.set_product(&id, VolumeLevel(30));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watch_sees_current_then_changes() {
        let store = StateStore::new();
        let id = device();

        store.set_product(&id, SourceIndex(1));

        // A new watcher reads the current value without waiting
        let rx = store.watch_product::<SourceIndex>(&id);
        assert_eq!(*rx.borrow(), Some(SourceIndex(1)));

        let mut rx2 = store.watch_product::<SourceIndex>(&id);
        store.set_product(&id, SourceIndex(2));
        rx2.changed().await.unwrap();
        assert_eq!(*rx2.borrow(), Some(SourceIndex(2)));
    }

    #[test]
    fn test_product_metadata_lifecycle() {
        let store = StateStore::new();
        let mut rx = store.subscribe_changes();

        store.upsert_product(product_info());
        assert!(matches!(rx.try_recv(), Ok(StateChange::ProductAdded { .. })));
        assert_eq!(store.product_count(), 1);

        // Second upsert updates silently
        store.upsert_product(product_info());
        assert!(rx.try_recv().is_err());

        store.set_product(&device(), Standby(true));
        let _ = rx.try_recv();

        store.remove_product(&device());
        assert!(matches!(
            rx.try_recv(),
            Ok(StateChange::ProductRemoved { .. })
        ));
        assert!(store.get_product::<Standby>(&device()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_room_property() {
        let store = StateStore::new();
        let room = RoomId::new("Kitchen");

        assert!(store.set_room(&room, RoomStandby(true)));
        assert_eq!(store.get_room::<RoomStandby>(&room), Some(RoomStandby(true)));
    }

    #[test]
    fn test_room_order_broadcast_carries_deltas() {
        let store = StateStore::new();
        let mut rx = store.subscribe_changes();

        let order = vec![RoomId::new("Attic"), RoomId::new("Lounge")];
        let deltas = watch_store::diff_ordered(&[], &order);
        store.set_room_order(order.clone(), deltas);

        match rx.try_recv() {
            Ok(StateChange::RoomOrderChanged { order: o, deltas: d }) => {
                assert_eq!(o, order);
                assert_eq!(d.len(), 2);
            }
            other => panic!("expected RoomOrderChanged, got {:?}", other),
        }

        // Unchanged order: no broadcast
        store.set_room_order(order, vec![]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_zone_set_deduplicates() {
        let store = StateStore::new();
        let mut rx = store.subscribe_changes();

        let zones = vec![Zone {
            sender_room: RoomId::new("Lounge"),
            sender_device: device(),
            uri: "ohz://host/ch".to_string(),
            listeners: vec![RoomId::new("Kitchen")],
        }];

        store.set_zones(zones.clone());
        assert!(matches!(rx.try_recv(), Ok(StateChange::ZonesChanged { .. })));

        store.set_zones(zones);
        assert!(rx.try_recv().is_err());
    }
}
