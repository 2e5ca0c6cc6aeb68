//! The house: entry point of the SDK

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use openhome_events::ControlPointEngine;
use openhome_services::PlaylistBrowser;
use openhome_topology::{
    ChangeFilter, ChangeStream, HouseManager, RoomId, StateChange, Zone,
};

use crate::error::SdkError;
use crate::persist::{self, HouseCache};
use crate::room::Room;

/// A whole-home audio system, observed through one engine
///
/// `House` wires the engine into the topology layer, keeps the warm-start
/// cache current, and hands out [`Room`] handles.
pub struct House {
    manager: Arc<HouseManager>,
    /// Room names from the on-disk cache, shown until live topology arrives
    warm_rooms: Vec<RoomId>,
    _persister: Option<thread::JoinHandle<()>>,
}

impl House {
    /// Connect using the default cache location
    pub fn connect<E: ControlPointEngine>(
        engine: E,
        browser: Arc<dyn PlaylistBrowser>,
    ) -> Result<Self, SdkError> {
        Self::connect_with_cache(engine, browser, persist::default_cache_path())
    }

    /// Connect with an explicit cache file, or none at all
    pub fn connect_with_cache<E: ControlPointEngine>(
        engine: E,
        browser: Arc<dyn PlaylistBrowser>,
        cache_path: Option<PathBuf>,
    ) -> Result<Self, SdkError> {
        let manager = Arc::new(HouseManager::new(engine, browser)?);

        let warm_rooms = cache_path
            .as_deref()
            .and_then(persist::load_from)
            .map(|cache| cache.rooms.into_iter().map(RoomId::new).collect())
            .unwrap_or_default();

        // The persister holds only a change receiver: it wakes on room-order
        // changes, writes the cache, and exits when the house is dropped.
        let persister = cache_path.map(|path| {
            let changes = manager.changes_blocking_filtered(ChangeFilter::topology_only());
            thread::spawn(move || {
                for change in changes {
                    if let StateChange::RoomOrderChanged { order, .. } = change {
                        let cache = HouseCache {
                            rooms: order.iter().map(|room| room.as_str().to_string()).collect(),
                        };
                        if let Err(e) = persist::save_to(&path, &cache) {
                            warn!(path = %path.display(), "House cache write failed: {}", e);
                        }
                    }
                }
                debug!("House cache persister stopped");
            })
        });

        Ok(Self {
            manager,
            warm_rooms,
            _persister: persister,
        })
    }

    /// Rooms currently on the network, in house order
    pub fn rooms(&self) -> Vec<Room> {
        self.manager
            .room_order()
            .into_iter()
            .map(|id| Room::new(id, Arc::clone(&self.manager)))
            .collect()
    }

    /// Look up a room by name
    pub fn room(&self, name: &str) -> Option<Room> {
        let id = RoomId::new(name);
        self.manager
            .room(&id)
            .map(|info| Room::new(info.id, Arc::clone(&self.manager)))
    }

    /// Room names for display: live when available, cached otherwise
    ///
    /// Before the first Product event arrives this answers from the
    /// warm-start cache, so a UI can draw immediately. Entries from the
    /// cache are names only; their `Room` handles do not exist yet.
    pub fn room_names(&self) -> Vec<RoomId> {
        let live = self.manager.room_order();
        if live.is_empty() {
            self.warm_rooms.clone()
        } else {
            live
        }
    }

    /// Current songcast zones
    pub fn zones(&self) -> Vec<Zone> {
        self.manager.zones()
    }

    /// Async stream of every state change
    pub fn changes(&self) -> ChangeStream {
        self.manager.changes()
    }

    /// Async stream of changes matching a filter
    pub fn changes_filtered(&self, filter: ChangeFilter) -> ChangeStream {
        self.manager.changes_filtered(filter)
    }

    /// Stop event processing; watchers see no further changes
    pub fn shutdown(&self) {
        self.manager.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    use openhome_events::MockEngine;
    use openhome_services::{DeviceId, PropertySet, Service, Track};

    struct NoBrowser;

    #[async_trait]
    impl PlaylistBrowser for NoBrowser {
        async fn read_list(
            &self,
            _device: &DeviceId,
            _ids: &[u32],
        ) -> openhome_services::Result<Vec<Track>> {
            Ok(vec![])
        }
    }

    fn wait_until(what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn product_state(room: &str, name: &str) -> PropertySet {
        PropertySet::new(0)
            .with("ProductRoom", room)
            .with("ProductName", name)
            .with("Standby", "0")
    }

    #[test]
    fn test_warm_start_answers_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("house.json");
        persist::save_to(
            &path,
            &HouseCache {
                rooms: vec!["Attic".to_string(), "Lounge".to_string()],
            },
        )
        .unwrap();

        let house =
            House::connect_with_cache(MockEngine::new(), Arc::new(NoBrowser), Some(path)).unwrap();

        // Nothing live yet: names come from the cache, handles do not exist
        assert_eq!(
            house.room_names(),
            vec![RoomId::new("Attic"), RoomId::new("Lounge")]
        );
        assert!(house.rooms().is_empty());
        assert!(house.room("Attic").is_none());
    }

    #[test]
    fn test_live_topology_replaces_cache_and_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("house.json");
        persist::save_to(
            &path,
            &HouseCache {
                rooms: vec!["Stale Room".to_string()],
            },
        )
        .unwrap();

        let engine = MockEngine::new();
        let handle = engine.handle();
        let house =
            House::connect_with_cache(engine, Arc::new(NoBrowser), Some(path.clone())).unwrap();

        let device = DeviceId::new("dev-1");
        handle.set_initial(device.clone(), Service::Product, product_state("Lounge", "DSM"));
        handle.add_device(device);

        wait_until("live room", || !house.rooms().is_empty());

        // Live names win over the cache
        assert_eq!(house.room_names(), vec![RoomId::new("Lounge")]);
        let room = house.room("Lounge").unwrap();
        assert_eq!(room.name(), "Lounge");

        // And the cache file follows the live house
        wait_until("cache to update", || {
            persist::load_from(&path)
                .map(|cache| cache.rooms == vec!["Lounge".to_string()])
                .unwrap_or(false)
        });
    }

    #[test]
    fn test_room_products_and_handles() {
        let engine = MockEngine::new();
        let handle = engine.handle();
        let house =
            House::connect_with_cache(engine, Arc::new(NoBrowser), None).unwrap();

        let device = DeviceId::new("dev-1");
        handle.set_initial(device.clone(), Service::Product, product_state("Lounge", "Majik DSM"));
        handle.add_device(device);

        wait_until("room", || house.room("Lounge").is_some());
        let room = house.room("Lounge").unwrap();

        wait_until("room standby", || room.standby.get().is_some());
        assert_eq!(room.standby.get().map(|s| s.0), Some(false));

        let products = room.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Majik DSM");
        // Volume never watched, so never evented
        assert!(products[0].volume.get().is_none());
    }
}
