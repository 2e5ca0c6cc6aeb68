//! Sync-first event manager
//!
//! Owns the worker thread and the subscription bookkeeping. All methods are
//! blocking; the async engine never leaks through this API.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;

use openhome_services::{DeviceId, Service};

use crate::engine::{ControlPointEngine, EngineEvent};
use crate::error::{EventManagerError, Result};
use crate::iter::EventIterator;
use crate::worker::{spawn_event_worker, Command};

/// Reference-counted subscription orchestration over one engine
///
/// Many parts of an application can want the same `(device, service)`
/// subscription at once; the manager counts them and keeps exactly one GENA
/// subscription alive while any are outstanding.
///
/// # Example
///
/// ```rust,ignore
/// use openhome_events::EventManager;
/// use openhome_services::Service;
///
/// let manager = EventManager::new(engine)?;
/// manager.ensure_subscribed(&device, Service::Product)?;
///
/// for event in manager.iter() {
///     // ...
/// }
///
/// manager.release_subscription(&device, Service::Product)?;
/// ```
pub struct EventManager {
    /// Commands to the background worker
    command_tx: mpsc::Sender<Command>,

    /// Events from the background worker
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,

    /// Devices the engine currently reports, with first-seen times
    devices: Arc<DashMap<DeviceId, Instant>>,

    /// Subscription reference counts
    service_refs: DashMap<(DeviceId, Service), usize>,

    /// Worker handle (kept alive for the manager's lifetime)
    _worker: JoinHandle<()>,
}

impl EventManager {
    /// Start the manager over an engine
    ///
    /// Spawns the worker thread and attaches the engine; discovery begins
    /// immediately, subscriptions only on demand.
    pub fn new<E: ControlPointEngine>(engine: E) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let devices = Arc::new(DashMap::new());

        let worker = spawn_event_worker(engine, command_rx, event_tx, Arc::clone(&devices));

        Ok(Self {
            command_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            devices,
            service_refs: DashMap::new(),
            _worker: worker,
        })
    }

    /// Devices the engine currently reports
    pub fn devices(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Hold a subscription for `(device, service)`, ref-counted
    ///
    /// The first holder triggers the actual GENA subscribe; later holders
    /// only bump the count.
    pub fn ensure_subscribed(&self, device: &DeviceId, service: Service) -> Result<()> {
        let key = (device.clone(), service);
        let mut entry = self.service_refs.entry(key).or_insert(0);
        let was_zero = *entry == 0;
        *entry += 1;

        debug!(
            device = %device,
            service = %service,
            refs = *entry,
            "Subscription reference acquired"
        );

        if was_zero {
            self.command_tx
                .send(Command::Subscribe {
                    device: device.clone(),
                    service,
                })
                .map_err(|_| EventManagerError::WorkerDisconnected)?;
        }

        Ok(())
    }

    /// Release one reference; the last one triggers the GENA unsubscribe
    pub fn release_subscription(&self, device: &DeviceId, service: Service) -> Result<()> {
        let key = (device.clone(), service);

        let should_unsubscribe = match self.service_refs.get_mut(&key) {
            Some(mut entry) => {
                *entry = entry.saturating_sub(1);
                let drained = *entry == 0;
                debug!(
                    device = %device,
                    service = %service,
                    refs = *entry,
                    "Subscription reference released"
                );
                drained
            }
            None => {
                return Err(EventManagerError::NotSubscribed {
                    device: device.clone(),
                    service,
                });
            }
        };

        if should_unsubscribe {
            self.service_refs.remove(&key);
            self.command_tx
                .send(Command::Unsubscribe {
                    device: device.clone(),
                    service,
                })
                .map_err(|_| EventManagerError::WorkerDisconnected)?;
        }

        Ok(())
    }

    pub fn is_subscribed(&self, device: &DeviceId, service: Service) -> bool {
        self.subscription_refs(device, service) > 0
    }

    pub fn subscription_refs(&self, device: &DeviceId, service: Service) -> usize {
        self.service_refs
            .get(&(device.clone(), service))
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    /// Blocking iterator over engine events
    pub fn iter(&self) -> EventIterator {
        EventIterator::new(Arc::clone(&self.event_rx))
    }

    /// Ask the worker to stop; also happens on drop
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

impl Drop for EventManager {
    fn drop(&mut self) {
        debug!(
            active_subscriptions = self.service_refs.len(),
            "EventManager dropping"
        );
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;
    use std::time::Duration;

    #[test]
    fn test_reference_counting() {
        let engine = MockEngine::new();
        let handle = engine.handle();
        let manager = EventManager::new(engine).unwrap();
        let device = DeviceId::new("dev-1");

        assert!(!manager.is_subscribed(&device, Service::Volume));

        manager.ensure_subscribed(&device, Service::Volume).unwrap();
        manager.ensure_subscribed(&device, Service::Volume).unwrap();
        assert_eq!(manager.subscription_refs(&device, Service::Volume), 2);

        manager.release_subscription(&device, Service::Volume).unwrap();
        assert_eq!(manager.subscription_refs(&device, Service::Volume), 1);
        assert!(manager.is_subscribed(&device, Service::Volume));

        manager.release_subscription(&device, Service::Volume).unwrap();
        assert!(!manager.is_subscribed(&device, Service::Volume));

        // Only one subscribe reached the engine
        handle.wait_for_subscribes(1, Duration::from_secs(1));
        assert_eq!(handle.subscribe_count(&device, Service::Volume), 1);
    }

    #[test]
    fn test_release_without_hold_is_an_error() {
        let engine = MockEngine::new();
        let manager = EventManager::new(engine).unwrap();
        let device = DeviceId::new("dev-1");

        assert!(matches!(
            manager.release_subscription(&device, Service::Volume),
            Err(EventManagerError::NotSubscribed { .. })
        ));
    }

    #[test]
    fn test_device_registry_follows_engine() {
        let engine = MockEngine::new();
        let handle = engine.handle();
        let manager = EventManager::new(engine).unwrap();
        let iter = manager.iter();

        handle.add_device(DeviceId::new("dev-1"));

        // The registry is updated by the worker as the event passes through
        let event = iter.recv_timeout(Duration::from_secs(1));
        assert!(matches!(event, Some(EngineEvent::DeviceAdded(_))));
        assert_eq!(manager.device_count(), 1);

        handle.remove_device(DeviceId::new("dev-1"));
        let event = iter.recv_timeout(Duration::from_secs(1));
        assert!(matches!(event, Some(EngineEvent::DeviceRemoved(_))));
        assert_eq!(manager.device_count(), 0);
    }

    #[test]
    fn test_events_flow_to_iterator_in_order() {
        let engine = MockEngine::new();
        let handle = engine.handle();
        let manager = EventManager::new(engine).unwrap();
        let iter = manager.iter();
        let device = DeviceId::new("dev-1");

        handle.add_device(device.clone());
        manager.ensure_subscribed(&device, Service::Volume).unwrap();

        handle.notify(
            device.clone(),
            Service::Volume,
            openhome_services::PropertySet::new(0).with("Volume", "10"),
        );
        handle.notify(
            device.clone(),
            Service::Volume,
            openhome_services::PropertySet::new(1).with("Volume", "11"),
        );

        let mut volumes = vec![];
        for event in iter.timeout_iter(Duration::from_secs(1)) {
            if let EngineEvent::Notify(notify) = event {
                volumes.push(notify.properties.get_string("Volume").unwrap());
            }
            if volumes.len() == 2 {
                break;
            }
        }
        assert_eq!(volumes, vec!["10", "11"]);
    }

    #[test]
    fn test_gap_triggers_resubscribe() {
        let engine = MockEngine::new();
        let handle = engine.handle();
        let manager = EventManager::new(engine).unwrap();
        let iter = manager.iter();
        let device = DeviceId::new("dev-1");

        manager.ensure_subscribed(&device, Service::Playlist).unwrap();
        handle.wait_for_subscribes(1, Duration::from_secs(1));

        handle.notify(
            device.clone(),
            Service::Playlist,
            openhome_services::PropertySet::new(0),
        );
        // Skip seq 1
        handle.notify(
            device.clone(),
            Service::Playlist,
            openhome_services::PropertySet::new(2),
        );

        // Both events still reach the consumer
        let mut seen = 0;
        for event in iter.timeout_iter(Duration::from_secs(1)) {
            if matches!(event, EngineEvent::Notify(_)) {
                seen += 1;
            }
            if seen == 2 {
                break;
            }
        }

        // And the gap forced a second subscribe
        handle.wait_for_subscribes(2, Duration::from_secs(1));
        assert_eq!(handle.subscribe_count(&device, Service::Playlist), 2);
    }
}
