//! The OpenHome services a control point observes

use serde::{Deserialize, Serialize};
use std::fmt;

/// An `av-openhome-org` UPnP service
///
/// One variant per service the topology layer consumes. The set is closed on
/// purpose: services are not extensible at runtime, and a closed enum lets
/// subscription bookkeeping use plain `(DeviceId, Service)` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    /// Product identity: room, name, standby, source selection
    Product,
    /// Playlist: track ID array, transport state, repeat/shuffle
    Playlist,
    /// Volume: level, mute, fade
    Volume,
    /// Info: metadata of whatever is currently rendering
    Info,
    /// Time: track position and duration
    Time,
    /// Sender: the songcast broadcast side of a device
    Sender,
    /// Receiver: the songcast listening side of a device
    Receiver,
}

impl Service {
    pub const ALL: [Service; 7] = [
        Service::Product,
        Service::Playlist,
        Service::Volume,
        Service::Info,
        Service::Time,
        Service::Sender,
        Service::Receiver,
    ];

    /// Short name as it appears in the service type URN
    pub fn name(&self) -> &'static str {
        match self {
            Service::Product => "Product",
            Service::Playlist => "Playlist",
            Service::Volume => "Volume",
            Service::Info => "Info",
            Service::Time => "Time",
            Service::Sender => "Sender",
            Service::Receiver => "Receiver",
        }
    }

    /// Full UPnP service type URN
    pub fn urn(&self) -> String {
        format!("urn:av-openhome-org:service:{}:1", self.name())
    }

    /// Parse a service from its type URN; versions above 1 are accepted
    pub fn from_urn(urn: &str) -> Option<Service> {
        let rest = urn.strip_prefix("urn:av-openhome-org:service:")?;
        let name = rest.split(':').next()?;
        Service::ALL.iter().copied().find(|s| s.name() == name)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urn_round_trip() {
        for service in Service::ALL {
            assert_eq!(Service::from_urn(&service.urn()), Some(service));
        }
    }

    #[test]
    fn test_from_urn_accepts_later_versions() {
        assert_eq!(
            Service::from_urn("urn:av-openhome-org:service:Playlist:2"),
            Some(Service::Playlist)
        );
    }

    #[test]
    fn test_from_urn_rejects_foreign_namespaces() {
        assert_eq!(
            Service::from_urn("urn:schemas-upnp-org:service:AVTransport:1"),
            None
        );
        assert_eq!(Service::from_urn("not-a-urn"), None);
    }
}
