//! End-to-end reconciliation tests against the mock engine
//!
//! These drive the full path: MockEngine -> EventManager worker ->
//! HouseReconciler thread -> StateStore, the way a real engine binding
//! would. Assertions poll, because events cross two threads on the way in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use openhome_events::MockEngine;
use openhome_services::{encode_id_array, DeviceId, PlaylistBrowser, PropertySet, Service, Track};
use openhome_topology::{
    ChangeFilter, CurrentSource, HouseManager, PlaylistIds, RoomId, RoomStandby, StateChange,
    VolumeLevel, ZoneRole,
};

const WAIT: Duration = Duration::from_secs(3);

/// Poll until the condition holds or the deadline passes
fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Browser serving fixed titles per track ID
struct FixtureBrowser {
    tracks: HashMap<u32, String>,
}

impl FixtureBrowser {
    fn new(tracks: &[(u32, &str)]) -> Arc<Self> {
        Arc::new(Self {
            tracks: tracks
                .iter()
                .map(|(id, title)| (*id, title.to_string()))
                .collect(),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self {
            tracks: HashMap::new(),
        })
    }
}

#[async_trait]
impl PlaylistBrowser for FixtureBrowser {
    async fn read_list(
        &self,
        _device: &DeviceId,
        ids: &[u32],
    ) -> openhome_services::Result<Vec<Track>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.tracks.get(id).map(|title| {
                    let mut track = Track::unknown(*id);
                    track.title = Some(title.clone());
                    track
                })
            })
            .collect())
    }
}

fn product_state(room: &str, name: &str, standby: bool) -> PropertySet {
    PropertySet::new(0)
        .with("ProductRoom", room)
        .with("ProductName", name)
        .with("Standby", if standby { "1" } else { "0" })
        .with("SourceIndex", "0")
        .with(
            "SourceXml",
            "<SourceList><Source><Name>Playlist</Name><Type>Playlist</Type>\
             <Visible>true</Visible></Source></SourceList>",
        )
}

fn sender_state(uri: &str) -> PropertySet {
    PropertySet::new(0)
        .with("Audio", "1")
        .with("Status", "Enabled")
        .with(
            "Metadata",
            format!("<DIDL-Lite><item><res>{}</res></item></DIDL-Lite>", uri),
        )
}

fn receiver_state(uri: &str, transport: &str) -> PropertySet {
    PropertySet::new(0)
        .with("Uri", uri)
        .with("TransportState", transport)
}

#[test]
fn test_house_builds_from_initial_events() {
    let engine = MockEngine::new();
    let handle = engine.handle();
    let manager = HouseManager::new(engine, FixtureBrowser::empty()).unwrap();

    let lounge = DeviceId::new("dev-lounge");
    let attic = DeviceId::new("dev-attic");

    handle.set_initial(lounge.clone(), Service::Product, product_state("Lounge", "Majik DSM", false));
    handle.set_initial(attic.clone(), Service::Product, product_state("attic", "Sneaky DS", true));

    handle.add_device(lounge.clone());
    handle.add_device(attic.clone());

    // Case-insensitive house ordering
    wait_until("both rooms in order", || {
        manager.room_order() == vec![RoomId::new("attic"), RoomId::new("Lounge")]
    });
    assert_eq!(manager.rooms().len(), 2);

    // Standby and source derive per room
    wait_until("lounge standby", || {
        manager.get_room::<RoomStandby>(&RoomId::new("Lounge")) == Some(RoomStandby(false))
    });
    wait_until("attic standby", || {
        manager.get_room::<RoomStandby>(&RoomId::new("attic")) == Some(RoomStandby(true))
    });
    wait_until("lounge source", || {
        manager
            .get_room::<CurrentSource>(&RoomId::new("Lounge"))
            .map(|source| source.0.name == "Playlist")
            .unwrap_or(false)
    });

    manager.shutdown();
}

#[test]
fn test_rooms_merge_and_split_as_products_move() {
    let engine = MockEngine::new();
    let handle = engine.handle();
    let manager = HouseManager::new(engine, FixtureBrowser::empty()).unwrap();

    let dev1 = DeviceId::new("dev-1");
    let dev2 = DeviceId::new("dev-2");
    handle.set_initial(dev1.clone(), Service::Product, product_state("Lounge", "DSM", false));
    handle.set_initial(dev2.clone(), Service::Product, product_state("Lounge", "Kiko", false));
    handle.add_device(dev1.clone());
    handle.add_device(dev2.clone());

    wait_until("one merged room", || {
        manager
            .room(&RoomId::new("Lounge"))
            .map(|room| room.product_count() == 2)
            .unwrap_or(false)
    });
    assert_eq!(manager.rooms().len(), 1);

    // A rename event moves dev2 into its own room
    handle.notify(
        dev2.clone(),
        Service::Product,
        PropertySet::new(1).with("ProductRoom", "Study"),
    );

    wait_until("rooms to split", || manager.rooms().len() == 2);
    assert_eq!(
        manager.room(&RoomId::new("Lounge")).unwrap().product_count(),
        1
    );
}

#[test]
fn test_device_removal_removes_empty_room() {
    let engine = MockEngine::new();
    let handle = engine.handle();
    let manager = HouseManager::new(engine, FixtureBrowser::empty()).unwrap();

    let device = DeviceId::new("dev-1");
    handle.set_initial(device.clone(), Service::Product, product_state("Lounge", "DSM", false));
    handle.add_device(device.clone());
    wait_until("room to appear", || manager.rooms().len() == 1);

    handle.remove_device(device);
    wait_until("room to vanish", || manager.room_order().is_empty());
    assert!(manager.rooms().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_playlist_snapshot_reads_through_browser() {
    let engine = MockEngine::new();
    let handle = engine.handle();
    let browser = FixtureBrowser::new(&[(10, "Alpha"), (11, "Beta"), (12, "Gamma")]);
    let manager = HouseManager::new(engine, browser).unwrap();

    let device = DeviceId::new("dev-1");
    handle.set_initial(device.clone(), Service::Product, product_state("Lounge", "DSM", false));
    handle.set_initial(
        device.clone(),
        Service::Playlist,
        PropertySet::new(0)
            .with("IdArray", encode_id_array(&[10, 11, 12]))
            .with("TransportState", "Playing"),
    );
    handle.add_device(device.clone());

    wait_until("room to appear", || !manager.rooms().is_empty());

    // Playlist is demand-subscribed through a watcher
    let watcher = manager.watch_product::<PlaylistIds>(&device).unwrap();
    wait_until("playlist ids to arrive", || {
        manager.get_product::<PlaylistIds>(&device).is_some()
    });
    assert_eq!(watcher.current(), Some(PlaylistIds(vec![10, 11, 12])));

    let snapshot = manager.playlist(&device).unwrap();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot.is_current());

    let page = snapshot.read(0, 2).await.unwrap();
    assert_eq!(page[0].title.as_deref(), Some("Alpha"));
    assert_eq!(page[1].title.as_deref(), Some("Beta"));

    // A new ID array stales the snapshot but not its pinned ordering
    handle.notify(
        device.clone(),
        Service::Playlist,
        PropertySet::new(1).with("IdArray", encode_id_array(&[12, 10])),
    );
    wait_until("snapshot to go stale", || !snapshot.is_current());
    assert_eq!(snapshot.ids(), &[10, 11, 12]);

    let fresh = manager.playlist(&device).unwrap();
    assert_eq!(fresh.ids(), &[12, 10]);
}

#[test]
fn test_zone_forms_even_when_receiver_events_first() {
    let engine = MockEngine::new();
    let handle = engine.handle();
    let manager = HouseManager::new(engine, FixtureBrowser::empty()).unwrap();

    let uri = "ohz://239.255.255.250:51972/lounge";
    let sender_dev = DeviceId::new("dev-lounge");
    let listener_dev = DeviceId::new("dev-kitchen");

    handle.set_initial(sender_dev.clone(), Service::Product, product_state("Lounge", "DSM", false));
    handle.set_initial(listener_dev.clone(), Service::Product, product_state("Kitchen", "Kiko", false));
    // The listener's receiver state is evented as part of subscription,
    // before the sender's Sender service says anything
    handle.set_initial(listener_dev.clone(), Service::Receiver, receiver_state(uri, "Playing"));

    handle.add_device(listener_dev.clone());
    handle.add_device(sender_dev.clone());

    wait_until("both rooms", || manager.rooms().len() == 2);
    assert!(manager.zones().is_empty());

    // Now the sender comes up; the pending listener must bind
    handle.notify(sender_dev.clone(), Service::Sender, sender_state(uri));

    wait_until("zone to form", || manager.zones().len() == 1);
    let zones = manager.zones();
    assert_eq!(zones[0].sender_room, RoomId::new("Lounge"));
    assert_eq!(zones[0].listeners, vec![RoomId::new("Kitchen")]);

    assert_eq!(
        manager
            .get_room::<openhome_topology::RoomZone>(&RoomId::new("Kitchen"))
            .map(|role| role.0),
        Some(ZoneRole::Listener {
            sender_room: RoomId::new("Lounge")
        })
    );

    // Sender disappearing dissolves the zone
    handle.notify(
        sender_dev,
        Service::Sender,
        PropertySet::new(1).with("Status", "Disabled"),
    );
    wait_until("zone to dissolve", || manager.zones().is_empty());
}

#[test]
fn test_change_firehose_reports_structural_changes() {
    let engine = MockEngine::new();
    let handle = engine.handle();
    let manager = HouseManager::new(engine, FixtureBrowser::empty()).unwrap();

    let mut changes = manager.changes_blocking_filtered(ChangeFilter::topology_only());

    let device = DeviceId::new("dev-1");
    handle.set_initial(device.clone(), Service::Product, product_state("Lounge", "DSM", false));
    handle.add_device(device);

    // Product added, then room added, in that order
    let first = changes.next().unwrap();
    assert!(matches!(first, StateChange::ProductAdded { .. }), "got {:?}", first);

    let saw_room = std::iter::from_fn(|| changes.next())
        .take(5)
        .any(|change| matches!(change, StateChange::RoomAdded { .. }));
    assert!(saw_room);
}

#[test]
fn test_volume_arrives_only_for_watchers() {
    let engine = MockEngine::new();
    let handle = engine.handle();
    let manager = HouseManager::new(engine, FixtureBrowser::empty()).unwrap();

    let device = DeviceId::new("dev-1");
    handle.set_initial(device.clone(), Service::Product, product_state("Lounge", "DSM", false));
    handle.set_initial(
        device.clone(),
        Service::Volume,
        PropertySet::new(0).with("Volume", "35").with("Mute", "0"),
    );
    handle.add_device(device.clone());

    wait_until("room to appear", || !manager.rooms().is_empty());

    // No watcher yet: the Volume service was never subscribed
    assert_eq!(handle.subscribe_count(&device, Service::Volume), 0);
    assert!(manager.get_product::<VolumeLevel>(&device).is_none());

    let watcher = manager.watch_product::<VolumeLevel>(&device).unwrap();
    wait_until("volume to arrive", || {
        manager.get_product::<VolumeLevel>(&device) == Some(VolumeLevel(35))
    });
    assert_eq!(watcher.current(), Some(VolumeLevel(35)));
    assert_eq!(handle.subscribe_count(&device, Service::Volume), 1);
}
