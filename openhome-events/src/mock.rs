//! In-memory engine for tests
//!
//! `MockEngine` stands in for a real control-point engine: tests script
//! device arrivals and NOTIFYs through a [`MockHandle`] and assert on the
//! subscribe/unsubscribe traffic the code under test generated. Being test
//! tooling, it panics on misuse instead of returning errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use openhome_services::{DeviceId, PropertySet, Service};

use crate::engine::{
    ControlPointEngine, EngineError, EventSink, ServiceEvent, SubscriptionId,
};

#[derive(Default)]
struct MockInner {
    sink: Mutex<Option<EventSink>>,
    subscribes: Mutex<Vec<(DeviceId, Service)>>,
    unsubscribes: Mutex<Vec<(DeviceId, Service)>>,
    active: Mutex<HashMap<SubscriptionId, (DeviceId, Service)>>,
    initial: Mutex<HashMap<(DeviceId, Service), PropertySet>>,
}

impl MockInner {
    /// Block until the worker has attached the sink
    fn sink(&self) -> EventSink {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(sink) = self.sink.lock().unwrap().clone() {
                return sink;
            }
            assert!(
                Instant::now() < deadline,
                "MockEngine: attach() was never called"
            );
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Scriptable in-memory control-point engine
pub struct MockEngine {
    inner: Arc<MockInner>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockInner::default()),
        }
    }

    /// Handle for driving the engine after it has been moved into a manager
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlPointEngine for MockEngine {
    async fn attach(&self, sink: EventSink) -> Result<(), EngineError> {
        *self.inner.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn subscribe(
        &self,
        device: &DeviceId,
        service: Service,
    ) -> Result<SubscriptionId, EngineError> {
        let key = (device.clone(), service);
        self.inner.subscribes.lock().unwrap().push(key.clone());

        let id = SubscriptionId::new();
        self.inner.active.lock().unwrap().insert(id, key.clone());

        // A real subscription is answered with a full-state initial NOTIFY
        if let Some(properties) = self.inner.initial.lock().unwrap().get(&key).cloned() {
            self.inner.sink().notify(ServiceEvent::new(
                device.clone(),
                service,
                properties,
            ));
        }

        Ok(id)
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), EngineError> {
        match self.inner.active.lock().unwrap().remove(&subscription) {
            Some(key) => {
                self.inner.unsubscribes.lock().unwrap().push(key);
                Ok(())
            }
            None => Err(EngineError::SubscriptionUnknown(subscription)),
        }
    }
}

/// Test-side controls for a [`MockEngine`]
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<MockInner>,
}

impl MockHandle {
    /// Report a device arriving on the network
    pub fn add_device(&self, device: DeviceId) {
        self.inner.sink().device_added(device);
    }

    /// Report a device leaving the network
    pub fn remove_device(&self, device: DeviceId) {
        self.inner.sink().device_removed(device);
    }

    /// Deliver a NOTIFY for a service
    pub fn notify(&self, device: DeviceId, service: Service, properties: PropertySet) {
        self.inner
            .sink()
            .notify(ServiceEvent::new(device, service, properties));
    }

    /// Configure the full-state NOTIFY a subscribe is answered with
    pub fn set_initial(&self, device: DeviceId, service: Service, properties: PropertySet) {
        self.inner
            .initial
            .lock()
            .unwrap()
            .insert((device, service), properties);
    }

    /// How many times `(device, service)` was subscribed
    pub fn subscribe_count(&self, device: &DeviceId, service: Service) -> usize {
        self.inner
            .subscribes
            .lock()
            .unwrap()
            .iter()
            .filter(|key| &key.0 == device && key.1 == service)
            .count()
    }

    pub fn total_subscribes(&self) -> usize {
        self.inner.subscribes.lock().unwrap().len()
    }

    pub fn total_unsubscribes(&self) -> usize {
        self.inner.unsubscribes.lock().unwrap().len()
    }

    /// Block until at least `count` subscribes have been seen
    ///
    /// Panics when the timeout passes first, with the observed traffic in
    /// the message.
    pub fn wait_for_subscribes(&self, count: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            let seen = self.total_subscribes();
            if seen >= count {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "MockEngine: expected {} subscribes, saw {}",
                count,
                seen
            );
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_subscribe_answers_with_initial_state() {
        let engine = MockEngine::new();
        let handle = engine.handle();
        let device = DeviceId::new("dev");

        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.attach(EventSink::new(tx)).await.unwrap();

        handle.set_initial(
            device.clone(),
            Service::Volume,
            PropertySet::new(0).with("Volume", "25"),
        );

        engine.subscribe(&device, Service::Volume).await.unwrap();

        let event = rx.recv().await.unwrap();
        let crate::engine::EngineEvent::Notify(notify) = event else {
            panic!("expected a notify");
        };
        assert_eq!(notify.properties.get("Volume"), Some("25"));
        assert_eq!(notify.seq(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_requires_live_subscription() {
        let engine = MockEngine::new();
        let id = SubscriptionId::new();
        assert!(engine.unsubscribe(id).await.is_err());
    }
}
