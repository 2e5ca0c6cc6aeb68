//! Browse actions the topology layer invokes
//!
//! The only SOAP action the reconciliation layer needs is the Playlist
//! service's `ReadList`, and invoking it is the engine's job. This trait is
//! the seam: the engine binding implements it, the playlist cache consumes
//! it, and tests substitute an in-memory fake.

use async_trait::async_trait;

use crate::device::DeviceId;
use crate::error::Result;
use crate::model::Track;

/// Paged access to playlist track metadata
#[async_trait]
pub trait PlaylistBrowser: Send + Sync + 'static {
    /// Fetch metadata for the given track IDs on one device
    ///
    /// Mirrors the Playlist `ReadList` action: the device answers only for
    /// IDs it still knows, so the response may be shorter than the request
    /// and is not guaranteed to preserve order. Callers key the response by
    /// `Track::id`.
    async fn read_list(&self, device: &DeviceId, ids: &[u32]) -> Result<Vec<Track>>;
}
