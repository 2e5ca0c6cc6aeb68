//! Consuming the change firehose
//!
//! The store broadcasts every [`StateChange`]. This module wraps the raw
//! broadcast receiver in the two shapes applications actually want:
//! an async stream for UIs, and a blocking iterator for CLIs. Both accept a
//! [`ChangeFilter`] so consumers only wake for what they care about.
//!
//! Broadcast receivers that fall behind lose the oldest changes; that is
//! logged and skipped rather than treated as fatal, because every change is
//! re-readable from the store itself.

use std::collections::HashSet;

use tokio::sync::broadcast;
use tracing::warn;

use openhome_services::DeviceId;

use crate::model::RoomId;
use crate::store::StateChange;

// ============================================================================
// ChangeFilter
// ============================================================================

/// Selects which changes a consumer sees
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    rooms: Option<HashSet<RoomId>>,
    devices: Option<HashSet<DeviceId>>,
    topology_only: bool,
}

impl ChangeFilter {
    /// Everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Only structural changes: rooms appearing/vanishing, ordering, zones
    pub fn topology_only() -> Self {
        Self {
            topology_only: true,
            ..Self::default()
        }
    }

    /// Restrict to changes concerning one room
    pub fn for_room(room: RoomId) -> Self {
        Self {
            rooms: Some([room].into_iter().collect()),
            ..Self::default()
        }
    }

    /// Restrict to changes concerning one device
    pub fn for_device(device: DeviceId) -> Self {
        Self {
            devices: Some([device].into_iter().collect()),
            ..Self::default()
        }
    }

    /// Widen a room filter with another room
    pub fn and_room(mut self, room: RoomId) -> Self {
        self.rooms.get_or_insert_with(HashSet::new).insert(room);
        self
    }

    pub fn matches(&self, change: &StateChange) -> bool {
        if self.topology_only {
            let structural = matches!(
                change,
                StateChange::RoomAdded { .. }
                    | StateChange::RoomRemoved { .. }
                    | StateChange::RoomOrderChanged { .. }
                    | StateChange::ZonesChanged { .. }
                    | StateChange::ProductAdded { .. }
                    | StateChange::ProductRemoved { .. }
            );
            if !structural {
                return false;
            }
        }

        if let Some(rooms) = &self.rooms {
            match change.room() {
                Some(room) if rooms.contains(room) => {}
                _ => return false,
            }
        }

        if let Some(devices) = &self.devices {
            match change.device() {
                Some(device) if devices.contains(device) => {}
                _ => return false,
            }
        }

        true
    }
}

// ============================================================================
// ChangeStream (async)
// ============================================================================

/// Async consumption of state changes
pub struct ChangeStream {
    rx: broadcast::Receiver<StateChange>,
    filter: ChangeFilter,
}

impl ChangeStream {
    pub(crate) fn new(rx: broadcast::Receiver<StateChange>) -> Self {
        Self {
            rx,
            filter: ChangeFilter::all(),
        }
    }

    pub(crate) fn filtered(rx: broadcast::Receiver<StateChange>, filter: ChangeFilter) -> Self {
        Self { rx, filter }
    }

    /// Next matching change; `None` once the store is gone
    pub async fn next(&mut self) -> Option<StateChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change stream lagged; continuing from live state");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ============================================================================
// BlockingChangeIterator (sync)
// ============================================================================

/// Blocking consumption of state changes for synchronous code
pub struct BlockingChangeIterator {
    rx: broadcast::Receiver<StateChange>,
    filter: ChangeFilter,
}

impl BlockingChangeIterator {
    pub(crate) fn new(rx: broadcast::Receiver<StateChange>) -> Self {
        Self {
            rx,
            filter: ChangeFilter::all(),
        }
    }

    pub(crate) fn filtered(rx: broadcast::Receiver<StateChange>, filter: ChangeFilter) -> Self {
        Self { rx, filter }
    }
}

impl Iterator for BlockingChangeIterator {
    type Item = StateChange;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.rx.blocking_recv() {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Blocking change iterator lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openhome_services::Service;

    fn room_change(room: &str) -> StateChange {
        StateChange::RoomPropertyChanged {
            room: RoomId::new(room),
            property_key: "room_standby",
            service: Service::Product,
        }
    }

    #[test]
    fn test_filter_all_matches_everything() {
        let filter = ChangeFilter::all();
        assert!(filter.matches(&room_change("Lounge")));
        assert!(filter.matches(&StateChange::ZonesChanged { zones: vec![] }));
    }

    #[test]
    fn test_room_filter() {
        let filter = ChangeFilter::for_room(RoomId::new("Lounge"));
        assert!(filter.matches(&room_change("Lounge")));
        assert!(!filter.matches(&room_change("Kitchen")));
        // Changes with no room attribution are filtered out too
        assert!(!filter.matches(&StateChange::ZonesChanged { zones: vec![] }));

        let wider = filter.and_room(RoomId::new("Kitchen"));
        assert!(wider.matches(&room_change("Kitchen")));
    }

    #[test]
    fn test_topology_only_filter() {
        let filter = ChangeFilter::topology_only();
        assert!(filter.matches(&StateChange::RoomAdded {
            room: RoomId::new("Lounge")
        }));
        assert!(filter.matches(&StateChange::ZonesChanged { zones: vec![] }));
        assert!(!filter.matches(&room_change("Lounge")));
    }

    #[tokio::test]
    async fn test_stream_applies_filter() {
        let (tx, rx) = broadcast::channel(16);
        let mut stream = ChangeStream::filtered(rx, ChangeFilter::for_room(RoomId::new("Lounge")));

        tx.send(room_change("Kitchen")).unwrap();
        tx.send(room_change("Lounge")).unwrap();
        drop(tx);

        let change = stream.next().await.unwrap();
        assert_eq!(change.room(), Some(&RoomId::new("Lounge")));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_blocking_iterator_ends_when_closed() {
        let (tx, rx) = broadcast::channel(16);
        tx.send(room_change("Lounge")).unwrap();
        drop(tx);

        let changes: Vec<_> = BlockingChangeIterator::new(rx).collect();
        assert_eq!(changes.len(), 1);
    }
}
