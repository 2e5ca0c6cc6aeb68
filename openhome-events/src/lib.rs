//! Event subscription orchestration
//!
//! Sits between an opaque UPnP control-point engine and the topology layer.
//! The engine owns the wire protocol (discovery, GENA transport, SOAP); this
//! crate owns *which* subscriptions exist and hands the resulting events to
//! consumers as one ordered stream.
//!
//! # Responsibilities
//!
//! - **Reference-counted subscriptions**: many watchers, one GENA
//!   subscription per `(device, service)`
//! - **Sync facade over an async engine**: the engine runs on a background
//!   worker thread with its own runtime; callers never need `.await`
//! - **Ordering**: one worker, one channel - events reach consumers in the
//!   order the engine delivered them
//! - **Gap recovery**: a skipped GENA sequence number triggers a
//!   resubscribe, and the fresh initial NOTIFY restores full state
//!
//! # Example
//!
//! ```rust,ignore
//! use openhome_events::{EventManager, EngineEvent};
//! use openhome_services::Service;
//!
//! let manager = EventManager::new(engine)?;
//! manager.ensure_subscribed(&device, Service::Product)?;
//!
//! for event in manager.iter() {
//!     match event {
//!         EngineEvent::DeviceAdded(id) => println!("found {id}"),
//!         EngineEvent::Notify(e) => println!("{}/{:?} evented", e.device, e.service),
//!         EngineEvent::DeviceRemoved(id) => println!("lost {id}"),
//!     }
//! }
//! ```

pub mod engine;
pub mod error;
pub mod iter;
pub mod manager;
mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use engine::{
    ControlPointEngine, EngineError, EngineEvent, EventSink, ServiceEvent, SubscriptionId,
};
pub use error::{EventManagerError, Result};
pub use iter::EventIterator;
pub use manager::EventManager;

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockEngine;
