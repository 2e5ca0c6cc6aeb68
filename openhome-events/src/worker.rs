//! Background worker thread for engine ownership
//!
//! The engine API is async; the manager API is sync. The worker bridges the
//! two: a dedicated thread with a current-thread tokio runtime owns the
//! engine, polls commands from the manager, and forwards engine events to
//! the sync channel consumers iterate.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use openhome_services::{DeviceId, Service};

use crate::engine::{ControlPointEngine, EngineEvent, EventSink, SubscriptionId};

/// Commands from the sync manager to the worker
#[derive(Debug)]
pub(crate) enum Command {
    Subscribe { device: DeviceId, service: Service },
    Unsubscribe { device: DeviceId, service: Service },
    Shutdown,
}

/// Spawn the worker thread that owns the engine
pub(crate) fn spawn_event_worker<E: ControlPointEngine>(
    engine: E,
    command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<EngineEvent>,
    devices: Arc<DashMap<DeviceId, Instant>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Failed to create runtime for event worker: {}", e);
                return;
            }
        };

        rt.block_on(run_event_loop(engine, command_rx, event_tx, devices));
    })
}

async fn run_event_loop<E: ControlPointEngine>(
    engine: E,
    command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<EngineEvent>,
    devices: Arc<DashMap<DeviceId, Instant>>,
) {
    let (engine_tx, mut engine_rx) = tokio::sync::mpsc::unbounded_channel();

    if let Err(e) = engine.attach(EventSink::new(engine_tx)).await {
        warn!("Engine attach failed: {}", e);
        return;
    }

    let mut subscriptions: HashMap<(DeviceId, Service), SubscriptionId> = HashMap::new();
    let mut last_seq: HashMap<(DeviceId, Service), u32> = HashMap::new();

    info!("Event worker started");

    loop {
        tokio::select! {
            event = engine_rx.recv() => {
                match event {
                    Some(EngineEvent::DeviceAdded(device)) => {
                        devices.insert(device.clone(), Instant::now());
                        if event_tx.send(EngineEvent::DeviceAdded(device)).is_err() {
                            break;
                        }
                    }
                    Some(EngineEvent::DeviceRemoved(device)) => {
                        devices.remove(&device);
                        // The engine already tore the GENA side down; just
                        // forget the local handles.
                        subscriptions.retain(|(d, _), _| d != &device);
                        last_seq.retain(|(d, _), _| d != &device);
                        if event_tx.send(EngineEvent::DeviceRemoved(device)).is_err() {
                            break;
                        }
                    }
                    Some(EngineEvent::Notify(notify)) => {
                        let key = (notify.device.clone(), notify.service);
                        if let Some(resubscribe) = check_sequence(&mut last_seq, &key, notify.seq()) {
                            warn!(
                                device = %key.0,
                                service = %key.1,
                                expected = resubscribe,
                                received = notify.seq(),
                                "GENA sequence gap, resubscribing"
                            );
                            resubscribe_service(&engine, &mut subscriptions, &mut last_seq, &key).await;
                        }
                        if event_tx.send(EngineEvent::Notify(notify)).is_err() {
                            debug!("Event receiver dropped, shutting down worker");
                            break;
                        }
                    }
                    None => {
                        info!("Engine event stream ended, shutting down worker");
                        break;
                    }
                }
            }

            // Commands arrive on a std channel; poll it between events
            _ = tokio::time::sleep(Duration::from_millis(10)) => {
                let mut shutdown = false;
                while let Ok(cmd) = command_rx.try_recv() {
                    match cmd {
                        Command::Subscribe { device, service } => {
                            let key = (device.clone(), service);
                            if subscriptions.contains_key(&key) {
                                continue;
                            }
                            match engine.subscribe(&device, service).await {
                                Ok(id) => {
                                    debug!(device = %device, service = %service, subscription = %id, "Subscribed");
                                    subscriptions.insert(key, id);
                                }
                                Err(e) => {
                                    warn!(device = %device, service = %service, "Subscribe failed: {}", e);
                                }
                            }
                        }
                        Command::Unsubscribe { device, service } => {
                            let key = (device.clone(), service);
                            last_seq.remove(&key);
                            match subscriptions.remove(&key) {
                                Some(id) => {
                                    if let Err(e) = engine.unsubscribe(id).await {
                                        warn!(device = %device, service = %service, "Unsubscribe failed: {}", e);
                                    }
                                }
                                None => {
                                    warn!(device = %device, service = %service, "No subscription to release");
                                }
                            }
                        }
                        Command::Shutdown => {
                            shutdown = true;
                            break;
                        }
                    }
                }
                if shutdown {
                    break;
                }
            }
        }
    }

    // Graceful teardown of whatever is still subscribed
    for ((device, service), id) in subscriptions.drain() {
        if let Err(e) = engine.unsubscribe(id).await {
            debug!(device = %device, service = %service, "Teardown unsubscribe failed: {}", e);
        }
    }

    info!("Event worker shut down");
}

/// Track GENA sequence numbers; returns `Some(expected)` on a gap
///
/// Sequence 0 is the initial full-state NOTIFY and always resets tracking.
/// The GENA counter wraps from `u32::MAX` to 1, never back to 0.
fn check_sequence(
    last_seq: &mut HashMap<(DeviceId, Service), u32>,
    key: &(DeviceId, Service),
    seq: u32,
) -> Option<u32> {
    if seq == 0 {
        last_seq.insert(key.clone(), 0);
        return None;
    }

    let expected = match last_seq.get(key) {
        Some(&last) => {
            let next = last.wrapping_add(1);
            if next == 0 {
                1
            } else {
                next
            }
        }
        // First event observed mid-stream: nothing to compare against
        None => seq,
    };

    last_seq.insert(key.clone(), seq);

    if seq != expected {
        Some(expected)
    } else {
        None
    }
}

async fn resubscribe_service<E: ControlPointEngine>(
    engine: &E,
    subscriptions: &mut HashMap<(DeviceId, Service), SubscriptionId>,
    last_seq: &mut HashMap<(DeviceId, Service), u32>,
    key: &(DeviceId, Service),
) {
    last_seq.remove(key);

    if let Some(id) = subscriptions.remove(key) {
        if let Err(e) = engine.unsubscribe(id).await {
            debug!(device = %key.0, service = %key.1, "Unsubscribe during resubscribe failed: {}", e);
        }
    }

    match engine.subscribe(&key.0, key.1).await {
        Ok(id) => {
            subscriptions.insert(key.clone(), id);
        }
        Err(e) => {
            warn!(device = %key.0, service = %key.1, "Resubscribe failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> (DeviceId, Service) {
        (DeviceId::new("dev"), Service::Playlist)
    }

    #[test]
    fn test_initial_notify_resets_tracking() {
        let mut seqs = HashMap::new();
        assert_eq!(check_sequence(&mut seqs, &key(), 0), None);
        assert_eq!(check_sequence(&mut seqs, &key(), 1), None);
        assert_eq!(check_sequence(&mut seqs, &key(), 2), None);
    }

    #[test]
    fn test_gap_is_detected() {
        let mut seqs = HashMap::new();
        check_sequence(&mut seqs, &key(), 0);
        check_sequence(&mut seqs, &key(), 1);
        assert_eq!(check_sequence(&mut seqs, &key(), 3), Some(2));
    }

    #[test]
    fn test_mid_stream_start_is_tolerated() {
        let mut seqs = HashMap::new();
        assert_eq!(check_sequence(&mut seqs, &key(), 17), None);
        assert_eq!(check_sequence(&mut seqs, &key(), 18), None);
    }

    #[test]
    fn test_wrap_goes_to_one() {
        let mut seqs = HashMap::new();
        check_sequence(&mut seqs, &key(), 0);
        seqs.insert(key(), u32::MAX);
        assert_eq!(check_sequence(&mut seqs, &key(), 1), None);
    }

    #[test]
    fn test_reset_after_gap_recovers() {
        let mut seqs = HashMap::new();
        check_sequence(&mut seqs, &key(), 0);
        check_sequence(&mut seqs, &key(), 5);
        // The resubscribe produces a fresh initial NOTIFY
        assert_eq!(check_sequence(&mut seqs, &key(), 0), None);
        assert_eq!(check_sequence(&mut seqs, &key(), 1), None);
    }
}
