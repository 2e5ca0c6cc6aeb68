//! House reconciliation
//!
//! One loop consumes the engine event stream and is the sole writer to the
//! [`StateStore`]. Events arrive per device and per service, in whatever
//! order the network produced them; this module folds them into a consistent
//! picture:
//!
//! - products appear once their Product service has evented a room and name
//! - rooms are the grouping of products by room name, ordered for the house
//! - zones bind broadcasting senders to playing receivers by channel URI
//!
//! Derivations are recomputed from the full staged state whenever an input
//! to them changes. That makes the result independent of event arrival
//! order: a receiver evented before its sender converges to the same zones
//! as the reverse.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use openhome_events::{EngineEvent, EventIterator, EventManager, ServiceEvent};
use openhome_services::{
    decode, DeviceId, PlaylistEvent, ProductEvent, ReceiverEvent, SenderEvent, Service,
    ServiceEventData, TransportState,
};
use watch_store::{diff_ordered, WatchStore};

use crate::model::{ProductInfo, RoomId, RoomInfo, Zone, ZoneRole};
use crate::playlist::PlaylistRegistry;
use crate::property::{
    CurrentSource, MuteState, NowPlaying, PlaylistIds, PlaylistTransport, ReceiverFeed,
    RepeatMode, RoomStandby, RoomTransport, RoomZone, SenderAudio, ShuffleMode, SourceIndex,
    SourceList, Standby, TrackPosition, VolumeLevel,
};
use crate::store::StateStore;

/// Services held for every device while it is on the network
///
/// Product carries identity, Sender and Receiver carry zone membership; the
/// topology cannot be derived without them. Everything else is subscribed on
/// demand.
pub const BASE_SERVICES: [Service; 3] = [Service::Product, Service::Sender, Service::Receiver];

/// Room and name, as far as the Product service has told us
#[derive(Default)]
struct PendingIdentity {
    room: Option<RoomId>,
    name: Option<String>,
}

/// The single-writer reconciliation loop
pub(crate) struct HouseReconciler {
    store: StateStore,
    events: Arc<EventManager>,
    playlists: Arc<PlaylistRegistry>,

    /// Raw evented state per device; `set` change flags gate recomputation
    staging: WatchStore<DeviceId>,
    identities: HashMap<DeviceId, PendingIdentity>,
    visible: HashSet<DeviceId>,
    room_order: Vec<RoomId>,
}

impl HouseReconciler {
    pub(crate) fn new(
        store: StateStore,
        events: Arc<EventManager>,
        playlists: Arc<PlaylistRegistry>,
    ) -> Self {
        Self {
            store,
            events,
            playlists,
            staging: WatchStore::new(),
            identities: HashMap::new(),
            visible: HashSet::new(),
            room_order: Vec::new(),
        }
    }

    /// Consume the event stream until it closes
    pub(crate) fn run(mut self, iter: EventIterator) {
        info!("House reconciler started");

        for event in iter {
            match event {
                EngineEvent::DeviceAdded(device) => self.on_device_added(device),
                EngineEvent::DeviceRemoved(device) => self.on_device_removed(device),
                EngineEvent::Notify(notify) => self.on_notify(notify),
            }
        }

        info!("House reconciler stopped");
    }

    // ========================================================================
    // Device lifecycle
    // ========================================================================

    fn on_device_added(&mut self, device: DeviceId) {
        debug!(device = %device, "Device appeared");
        self.identities.entry(device.clone()).or_default();

        for service in BASE_SERVICES {
            if let Err(e) = self.events.ensure_subscribed(&device, service) {
                warn!(device = %device, service = %service, "Base subscription failed: {}", e);
            }
        }
    }

    fn on_device_removed(&mut self, device: DeviceId) {
        debug!(device = %device, "Device vanished");

        for service in BASE_SERVICES {
            let _ = self.events.release_subscription(&device, service);
        }

        self.identities.remove(&device);
        self.visible.remove(&device);
        self.staging.remove_entity(&device);
        self.playlists.remove(&device);
        self.store.remove_product(&device);

        self.rebuild_rooms();
        self.rebuild_zones();
    }

    // ========================================================================
    // Event application
    // ========================================================================

    fn on_notify(&mut self, notify: ServiceEvent) {
        let data = match decode(notify.service, &notify.properties) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    device = %notify.device,
                    service = %notify.service,
                    seq = notify.seq(),
                    "Dropping undecodable event: {}",
                    e
                );
                return;
            }
        };

        let device = notify.device;
        match data {
            ServiceEventData::Product(event) => self.apply_product(&device, event),
            ServiceEventData::Playlist(event) => self.apply_playlist(&device, event),
            ServiceEventData::Sender(event) => self.apply_sender(&device, event),
            ServiceEventData::Receiver(event) => self.apply_receiver(&device, event),
            ServiceEventData::Volume(event) => {
                if let Some(volume) = event.volume {
                    if self.staging.set(&device, VolumeLevel(volume)) {
                        self.store.set_product(&device, VolumeLevel(volume));
                    }
                }
                if let Some(mute) = event.mute {
                    if self.staging.set(&device, MuteState(mute)) {
                        self.store.set_product(&device, MuteState(mute));
                    }
                }
            }
            ServiceEventData::Info(event) => {
                let mut now = self
                    .staging
                    .get::<NowPlaying>(&device)
                    .unwrap_or_default();
                if let Some(uri) = event.uri {
                    now.uri = if uri.is_empty() { None } else { Some(uri) };
                }
                if let Some(duration) = event.duration_seconds {
                    now.duration_seconds = Some(duration);
                }
                if let Some(metadata) = &event.metadata {
                    now.merge_metadata(metadata);
                }
                if self.staging.set(&device, now.clone()) {
                    self.store.set_product(&device, now);
                }
            }
            ServiceEventData::Time(event) => {
                let mut position = self
                    .staging
                    .get::<TrackPosition>(&device)
                    .unwrap_or_default();
                if let Some(seconds) = event.seconds {
                    position.seconds = Some(seconds);
                }
                if let Some(duration) = event.duration_seconds {
                    position.duration_seconds = Some(duration);
                }
                if self.staging.set(&device, position.clone()) {
                    self.store.set_product(&device, position);
                }
            }
        }
    }

    fn apply_product(&mut self, device: &DeviceId, event: ProductEvent) {
        let mut rooms_dirty = false;

        // Identity first: room and name gate the product's visibility
        {
            let identity = self.identities.entry(device.clone()).or_default();
            if let Some(room) = event.room {
                let room = RoomId::new(room);
                if identity.room.as_ref() != Some(&room) {
                    identity.room = Some(room);
                    rooms_dirty = true;
                }
            }
            if let Some(name) = event.name {
                if identity.name.as_deref() != Some(name.as_str()) {
                    identity.name = Some(name);
                    rooms_dirty = true;
                }
            }
        }
        rooms_dirty |= self.publish_identity(device);

        if let Some(standby) = event.standby {
            if self.staging.set(device, Standby(standby)) {
                self.store.set_product(device, Standby(standby));
                rooms_dirty = true;
            }
        }
        if let Some(index) = event.source_index {
            if self.staging.set(device, SourceIndex(index)) {
                self.store.set_product(device, SourceIndex(index));
                rooms_dirty = true;
            }
        }
        if let Some(sources) = event.sources {
            if self.staging.set(device, SourceList(sources.clone())) {
                self.store.set_product(device, SourceList(sources));
                rooms_dirty = true;
            }
        }

        if rooms_dirty {
            self.rebuild_rooms();
            self.rebuild_zones();
        }
    }

    fn apply_playlist(&mut self, device: &DeviceId, event: PlaylistEvent) {
        if let Some(ids) = event.ids {
            if self.staging.set(device, PlaylistIds(ids.clone())) {
                // Registry first: anyone who observes the property change
                // must be able to snapshot immediately
                self.playlists.update_ids(device, ids.clone());
                self.store.set_product(device, PlaylistIds(ids));
            }
        }
        if let Some(state) = event.transport_state {
            if self.staging.set(device, PlaylistTransport(state)) {
                self.store.set_product(device, PlaylistTransport(state));
                // Room transport derives from this
                self.rebuild_rooms();
            }
        }
        if let Some(repeat) = event.repeat {
            if self.staging.set(device, RepeatMode(repeat)) {
                self.store.set_product(device, RepeatMode(repeat));
            }
        }
        if let Some(shuffle) = event.shuffle {
            if self.staging.set(device, ShuffleMode(shuffle)) {
                self.store.set_product(device, ShuffleMode(shuffle));
            }
        }
    }

    fn apply_sender(&mut self, device: &DeviceId, event: SenderEvent) {
        let mut sender = self
            .staging
            .get::<SenderAudio>(device)
            .unwrap_or_default();

        // The channel URI tracks the metadata: a metadata event without a
        // <res> means the channel is gone.
        if event.metadata.is_some() {
            sender.uri = event.uri;
        }
        if let Some(status) = event.status {
            sender.status = Some(status);
        }
        if let Some(audio) = event.audio {
            sender.audio = audio;
        }

        if self.staging.set(device, sender.clone()) {
            self.store.set_product(device, sender);
            self.rebuild_zones();
        }
    }

    fn apply_receiver(&mut self, device: &DeviceId, event: ReceiverEvent) {
        let mut feed = self
            .staging
            .get::<ReceiverFeed>(device)
            .unwrap_or_default();

        if let Some(uri) = event.uri {
            feed.uri = if uri.is_empty() { None } else { Some(uri) };
        }
        if let Some(state) = event.transport_state {
            feed.transport = Some(state);
        }

        if self.staging.set(device, feed.clone()) {
            self.store.set_product(device, feed);
            self.rebuild_zones();
        }
    }

    /// Make the product visible once room and name are both known
    fn publish_identity(&mut self, device: &DeviceId) -> bool {
        let Some(identity) = self.identities.get(device) else {
            return false;
        };
        let (Some(room), Some(name)) = (identity.room.clone(), identity.name.clone()) else {
            return false;
        };

        let info = ProductInfo {
            device: device.clone(),
            room,
            name,
        };

        let changed = self.store.product(device).as_ref() != Some(&info);
        if changed {
            self.store.upsert_product(info);
            self.visible.insert(device.clone());
        }
        changed
    }

    // ========================================================================
    // Room derivation
    // ========================================================================

    /// Re-derive the room set and per-room properties from staged state
    fn rebuild_rooms(&mut self) {
        // Group visible products by room, deterministically ordered
        let mut grouped: BTreeMap<RoomId, Vec<DeviceId>> = BTreeMap::new();
        for device in &self.visible {
            if let Some(room) = self.identities.get(device).and_then(|i| i.room.clone()) {
                grouped.entry(room).or_default().push(device.clone());
            }
        }
        for products in grouped.values_mut() {
            products.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        }

        // Rooms that disappeared
        let current: HashSet<RoomId> = grouped.keys().cloned().collect();
        for info in self.store.rooms() {
            if !current.contains(&info.id) {
                self.store.remove_room(&info.id);
            }
        }

        // Rooms that exist: metadata plus derived properties
        for (room, products) in &grouped {
            self.store
                .upsert_room(RoomInfo::new(room.clone(), products.clone()));

            let standby = products.iter().all(|d| {
                self.staging
                    .get::<Standby>(d)
                    .map(|s| s.0)
                    .unwrap_or(true)
            });
            self.store.set_room(room, RoomStandby(standby));

            // The room speaks with the voice of its active product: the
            // first one awake, or the first one at all.
            let active = products
                .iter()
                .find(|d| {
                    self.staging
                        .get::<Standby>(d)
                        .map(|s| !s.0)
                        .unwrap_or(false)
                })
                .or_else(|| products.first());

            if let Some(active) = active {
                let source = self
                    .staging
                    .get::<SourceIndex>(active)
                    .and_then(|index| {
                        self.staging
                            .get::<SourceList>(active)
                            .and_then(|list| list.source_at(index.0).cloned())
                    });
                if let Some(source) = source {
                    self.store.set_room(room, CurrentSource(source));
                }

                let transport = self
                    .staging
                    .get::<PlaylistTransport>(active)
                    .map(|t| t.0)
                    .unwrap_or(TransportState::Stopped);
                self.store.set_room(room, RoomTransport(transport));
            }
        }

        // Ordered house listing, with the edit script observers replay
        let new_order: Vec<RoomId> = {
            let mut order: Vec<RoomId> = grouped.keys().cloned().collect();
            order.sort_by_key(|room| room.sort_key());
            order
        };
        if new_order != self.room_order {
            let deltas = diff_ordered(&self.room_order, &new_order);
            self.store.set_room_order(new_order.clone(), deltas);
            self.room_order = new_order;
        }
    }

    // ========================================================================
    // Zone derivation
    // ========================================================================

    /// Re-derive songcast zones from staged sender/receiver state
    ///
    /// Always a full pass: a "pending" listener (playing a URI nobody sends
    /// yet) is simply one that fails to match this round and matches a later
    /// one, so sender-before-receiver and receiver-before-sender converge.
    fn rebuild_zones(&mut self) {
        let room_of: HashMap<DeviceId, RoomId> = self
            .visible
            .iter()
            .filter_map(|d| {
                self.identities
                    .get(d)
                    .and_then(|i| i.room.clone())
                    .map(|room| (d.clone(), room))
            })
            .collect();

        // Broadcasting senders, first by house order wins a contested URI
        let mut senders: Vec<(String, DeviceId, RoomId)> = Vec::new();
        for room in &self.room_order {
            for (device, device_room) in &room_of {
                if device_room != room {
                    continue;
                }
                let Some(sender) = self.staging.get::<SenderAudio>(device) else {
                    continue;
                };
                if !sender.is_broadcasting() {
                    continue;
                }
                let uri = sender.uri.clone().unwrap_or_default();
                if senders.iter().any(|(u, _, _)| u == &uri) {
                    warn!(uri = %uri, device = %device, "Duplicate sender URI ignored");
                    continue;
                }
                senders.push((uri, device.clone(), room.clone()));
            }
        }

        // Playing receivers, matched to senders by URI
        let mut listeners: HashMap<String, Vec<RoomId>> = HashMap::new();
        for room in &self.room_order {
            for (device, device_room) in &room_of {
                if device_room != room {
                    continue;
                }
                let Some(feed) = self.staging.get::<ReceiverFeed>(device) else {
                    continue;
                };
                if !feed.is_listening() {
                    continue;
                }
                let Some(uri) = feed.uri else { continue };

                let Some((_, _, sender_room)) =
                    senders.iter().find(|(u, _, _)| u == &uri)
                else {
                    // Pending: no such sender yet
                    continue;
                };
                if sender_room == room {
                    continue;
                }

                let entry = listeners.entry(uri).or_default();
                if !entry.contains(room) {
                    entry.push(room.clone());
                }
            }
        }

        // Publish zones and per-room roles
        let zones: Vec<Zone> = senders
            .iter()
            .map(|(uri, device, room)| Zone {
                sender_room: room.clone(),
                sender_device: device.clone(),
                uri: uri.clone(),
                listeners: listeners.get(uri).cloned().unwrap_or_default(),
            })
            .collect();

        for room in &self.room_order {
            let role = if let Some(zone) = zones.iter().find(|z| &z.sender_room == room) {
                ZoneRole::Sender {
                    listeners: zone.listeners.clone(),
                }
            } else if let Some(zone) = zones.iter().find(|z| z.listeners.contains(room)) {
                ZoneRole::Listener {
                    sender_room: zone.sender_room.clone(),
                }
            } else {
                ZoneRole::Standalone
            };
            self.store.set_room(room, RoomZone(role));
        }

        self.store.set_zones(zones);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openhome_events::MockEngine;

    // The reconciler's pure pieces are tested here; the full event-driven
    // path is covered by tests/house_reconciliation.rs against MockEngine.

    fn reconciler() -> HouseReconciler {
        struct NoBrowser;

        #[async_trait::async_trait]
        impl openhome_services::PlaylistBrowser for NoBrowser {
            async fn read_list(
                &self,
                _device: &DeviceId,
                _ids: &[u32],
            ) -> openhome_services::Result<Vec<openhome_services::Track>> {
                Ok(vec![])
            }
        }

        let events = Arc::new(EventManager::new(MockEngine::new()).unwrap());
        HouseReconciler::new(
            StateStore::new(),
            events,
            Arc::new(PlaylistRegistry::new(Arc::new(NoBrowser))),
        )
    }

    fn product_event(room: &str, name: &str) -> ProductEvent {
        ProductEvent {
            room: Some(room.to_string()),
            name: Some(name.to_string()),
            standby: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn test_product_visible_only_with_room_and_name() {
        let mut r = reconciler();
        let device = DeviceId::new("dev-1");

        r.apply_product(
            &device,
            ProductEvent {
                room: Some("Lounge".to_string()),
                ..Default::default()
            },
        );
        assert!(r.store.product(&device).is_none());

        r.apply_product(
            &device,
            ProductEvent {
                name: Some("Majik DSM".to_string()),
                ..Default::default()
            },
        );
        let info = r.store.product(&device).unwrap();
        assert_eq!(info.room, RoomId::new("Lounge"));
        assert_eq!(info.name, "Majik DSM");
    }

    #[test]
    fn test_rooms_group_products_by_name() {
        let mut r = reconciler();
        r.apply_product(&DeviceId::new("dev-1"), product_event("Lounge", "DSM"));
        r.apply_product(&DeviceId::new("dev-2"), product_event("Lounge", "Kiko"));
        r.apply_product(&DeviceId::new("dev-3"), product_event("Attic", "Sneaky"));

        assert_eq!(r.store.room_count(), 2);
        let lounge = r.store.room(&RoomId::new("Lounge")).unwrap();
        assert_eq!(lounge.product_count(), 2);

        // House order is case-insensitive alphabetical
        let order = r.store.get_house::<crate::property::RoomOrder>().unwrap();
        assert_eq!(order.0, vec![RoomId::new("Attic"), RoomId::new("Lounge")]);
    }

    #[test]
    fn test_room_standby_is_a_conjunction() {
        let mut r = reconciler();
        let dev1 = DeviceId::new("dev-1");
        let dev2 = DeviceId::new("dev-2");
        r.apply_product(&dev1, product_event("Lounge", "DSM"));
        r.apply_product(&dev2, product_event("Lounge", "Kiko"));

        let room = RoomId::new("Lounge");
        assert_eq!(
            r.store.get_room::<RoomStandby>(&room),
            Some(RoomStandby(false))
        );

        // One product asleep: room still awake
        r.apply_product(
            &dev1,
            ProductEvent {
                standby: Some(true),
                ..Default::default()
            },
        );
        assert_eq!(
            r.store.get_room::<RoomStandby>(&room),
            Some(RoomStandby(false))
        );

        // All asleep: room asleep
        r.apply_product(
            &dev2,
            ProductEvent {
                standby: Some(true),
                ..Default::default()
            },
        );
        assert_eq!(
            r.store.get_room::<RoomStandby>(&room),
            Some(RoomStandby(true))
        );
    }

    #[test]
    fn test_zone_formation_is_order_insensitive() {
        let uri = "ohz://239.255.255.250:51972/lounge";

        let sender_event = SenderEvent {
            audio: Some(true),
            status: Some(openhome_services::SenderStatus::Enabled),
            metadata: Some(format!("<DIDL-Lite><item><res>{}</res></item></DIDL-Lite>", uri)),
            uri: Some(uri.to_string()),
        };
        let receiver_event = ReceiverEvent {
            uri: Some(uri.to_string()),
            transport_state: Some(TransportState::Playing),
            metadata: None,
        };

        // Sender first, then receiver
        let mut a = reconciler();
        a.apply_product(&DeviceId::new("dev-1"), product_event("Lounge", "DSM"));
        a.apply_product(&DeviceId::new("dev-2"), product_event("Kitchen", "Kiko"));
        a.apply_sender(&DeviceId::new("dev-1"), sender_event.clone());
        a.apply_receiver(&DeviceId::new("dev-2"), receiver_event.clone());

        // Receiver first, then sender
        let mut b = reconciler();
        b.apply_product(&DeviceId::new("dev-1"), product_event("Lounge", "DSM"));
        b.apply_product(&DeviceId::new("dev-2"), product_event("Kitchen", "Kiko"));
        b.apply_receiver(&DeviceId::new("dev-2"), receiver_event);
        b.apply_sender(&DeviceId::new("dev-1"), sender_event);

        for r in [&a, &b] {
            let zones = r.store.zones();
            assert_eq!(zones.len(), 1);
            assert_eq!(zones[0].sender_room, RoomId::new("Lounge"));
            assert_eq!(zones[0].listeners, vec![RoomId::new("Kitchen")]);

            assert_eq!(
                r.store.get_room::<RoomZone>(&RoomId::new("Kitchen")),
                Some(RoomZone(ZoneRole::Listener {
                    sender_room: RoomId::new("Lounge")
                }))
            );
        }
    }

    #[test]
    fn test_receiver_stopping_leaves_the_zone() {
        let uri = "ohz://host/lounge";
        let mut r = reconciler();
        r.apply_product(&DeviceId::new("dev-1"), product_event("Lounge", "DSM"));
        r.apply_product(&DeviceId::new("dev-2"), product_event("Kitchen", "Kiko"));
        r.apply_sender(
            &DeviceId::new("dev-1"),
            SenderEvent {
                audio: Some(true),
                status: Some(openhome_services::SenderStatus::Enabled),
                metadata: Some(format!("<DIDL-Lite><res>{}</res></DIDL-Lite>", uri)),
                uri: Some(uri.to_string()),
            },
        );
        r.apply_receiver(
            &DeviceId::new("dev-2"),
            ReceiverEvent {
                uri: Some(uri.to_string()),
                transport_state: Some(TransportState::Playing),
                metadata: None,
            },
        );
        assert_eq!(r.store.zones()[0].listeners.len(), 1);

        r.apply_receiver(
            &DeviceId::new("dev-2"),
            ReceiverEvent {
                uri: None,
                transport_state: Some(TransportState::Stopped),
                metadata: None,
            },
        );
        assert!(r.store.zones()[0].listeners.is_empty());
        assert_eq!(
            r.store.get_room::<RoomZone>(&RoomId::new("Kitchen")),
            Some(RoomZone(ZoneRole::Standalone))
        );
    }

    #[test]
    fn test_device_removal_dissolves_zone_and_room() {
        let uri = "ohz://host/lounge";
        let mut r = reconciler();
        let sender_dev = DeviceId::new("dev-1");
        r.on_device_added(sender_dev.clone());
        r.on_device_added(DeviceId::new("dev-2"));
        r.apply_product(&sender_dev, product_event("Lounge", "DSM"));
        r.apply_product(&DeviceId::new("dev-2"), product_event("Kitchen", "Kiko"));
        r.apply_sender(
            &sender_dev,
            SenderEvent {
                audio: Some(true),
                status: Some(openhome_services::SenderStatus::Enabled),
                metadata: Some(format!("<DIDL-Lite><res>{}</res></DIDL-Lite>", uri)),
                uri: Some(uri.to_string()),
            },
        );
        r.apply_receiver(
            &DeviceId::new("dev-2"),
            ReceiverEvent {
                uri: Some(uri.to_string()),
                transport_state: Some(TransportState::Playing),
                metadata: None,
            },
        );
        assert_eq!(r.store.zones().len(), 1);
        assert_eq!(r.store.room_count(), 2);

        r.on_device_removed(sender_dev);

        assert!(r.store.zones().is_empty());
        assert_eq!(r.store.room_count(), 1);
        assert!(r.store.room(&RoomId::new("Lounge")).is_none());
        // The orphaned listener falls back to standalone
        assert_eq!(
            r.store.get_room::<RoomZone>(&RoomId::new("Kitchen")),
            Some(RoomZone(ZoneRole::Standalone))
        );
    }

    #[test]
    fn test_current_source_follows_active_product() {
        let mut r = reconciler();
        let device = DeviceId::new("dev-1");
        r.apply_product(&device, product_event("Lounge", "DSM"));
        r.apply_product(
            &device,
            ProductEvent {
                source_index: Some(1),
                sources: Some(vec![
                    openhome_services::Source {
                        name: "Playlist".to_string(),
                        kind: "Playlist".to_string(),
                        visible: true,
                    },
                    openhome_services::Source {
                        name: "Radio".to_string(),
                        kind: "Radio".to_string(),
                        visible: true,
                    },
                ]),
                ..Default::default()
            },
        );

        let source = r
            .store
            .get_room::<CurrentSource>(&RoomId::new("Lounge"))
            .unwrap();
        assert_eq!(source.0.name, "Radio");
    }
}
