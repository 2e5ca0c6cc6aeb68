//! Sync iteration over engine events
//!
//! The manager exposes one stream of [`EngineEvent`]s. This iterator is the
//! consuming end: blocking, timeout-bounded, or non-blocking, all without
//! async/await.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::engine::EngineEvent;

/// Blocking iterator over engine events
pub struct EventIterator {
    rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EventIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>) -> Self {
        Self { rx }
    }

    /// Block until an event arrives; `None` once the worker is gone
    pub fn recv(&self) -> Option<EngineEvent> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Receive without blocking
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Block for at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Drain currently queued events without blocking
    pub fn try_iter(&self) -> TryIterator<'_> {
        TryIterator { inner: self }
    }

    /// Iterate with a per-item timeout
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIterator<'_> {
        TimeoutIterator {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for EventIterator {
    type Item = EngineEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Clone for EventIterator {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Non-blocking iterator over currently queued events
pub struct TryIterator<'a> {
    inner: &'a EventIterator,
}

impl<'a> Iterator for TryIterator<'a> {
    type Item = EngineEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with a per-item timeout
pub struct TimeoutIterator<'a> {
    inner: &'a EventIterator,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIterator<'a> {
    type Item = EngineEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
