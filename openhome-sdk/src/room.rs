//! Room handle with property accessors

use std::marker::PhantomData;
use std::sync::Arc;

use openhome_topology::{
    CurrentSource, HouseManager, PropertyWatcher, RoomId, RoomStandby, RoomTransport, RoomZone,
    TopologyProperty,
};

use crate::product::Product;

/// Handle on one room-scoped property
///
/// Room properties derive from services the SDK always holds, so `watch()`
/// never needs to open a subscription and cannot fail.
pub struct RoomHandle<P: TopologyProperty> {
    room: RoomId,
    manager: Arc<HouseManager>,
    _marker: PhantomData<fn() -> P>,
}

impl<P: TopologyProperty> RoomHandle<P> {
    pub(crate) fn new(room: RoomId, manager: Arc<HouseManager>) -> Self {
        Self {
            room,
            manager,
            _marker: PhantomData,
        }
    }

    /// Cached value, instant
    pub fn get(&self) -> Option<P> {
        self.manager.get_room::<P>(&self.room)
    }

    /// Reactive watcher
    pub fn watch(&self) -> PropertyWatcher<P> {
        self.manager.watch_room::<P>(&self.room)
    }
}

/// A room of the house
///
/// Every product claiming the same room name is folded into one `Room`;
/// room properties answer for the ensemble (standby is a conjunction, the
/// source and transport follow the active product).
pub struct Room {
    /// Room identity (the name)
    pub id: RoomId,

    /// Standby for the whole room
    pub standby: RoomHandle<RoomStandby>,
    /// Currently selected source
    pub source: RoomHandle<CurrentSource>,
    /// Transport state of the active product
    pub transport: RoomHandle<RoomTransport>,
    /// Songcast role (standalone / sender / listener)
    pub zone: RoomHandle<RoomZone>,

    manager: Arc<HouseManager>,
}

impl Room {
    pub(crate) fn new(id: RoomId, manager: Arc<HouseManager>) -> Self {
        Self {
            standby: RoomHandle::new(id.clone(), Arc::clone(&manager)),
            source: RoomHandle::new(id.clone(), Arc::clone(&manager)),
            transport: RoomHandle::new(id.clone(), Arc::clone(&manager)),
            zone: RoomHandle::new(id.clone(), Arc::clone(&manager)),
            id,
            manager,
        }
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }

    /// The products behind this room
    pub fn products(&self) -> Vec<Product> {
        self.manager
            .room(&self.id)
            .map(|info| info.products)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|device| {
                self.manager
                    .product(&device)
                    .map(|info| Product::new(info, Arc::clone(&self.manager)))
            })
            .collect()
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("id", &self.id).finish()
    }
}
