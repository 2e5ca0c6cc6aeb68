//! Warm-start house cache
//!
//! Discovery takes seconds; users open the app in less. The last-known room
//! list is written to the user cache directory whenever the house changes,
//! and read back at connect so a UI has something to draw immediately. The
//! cache is presentation-only: live topology replaces it wholesale and
//! nothing is ever controlled through a cached entry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// On-disk shape of the cached house
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct HouseCache {
    /// Room names in house order
    pub rooms: Vec<String>,
}

/// Default cache file location under the user cache directory
pub(crate) fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("openhome-sdk").join("house.json"))
}

/// Read a cache file; absent or unreadable caches are simply `None`
pub(crate) fn load_from(path: &Path) -> Option<HouseCache> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(path = %path.display(), "Discarding unreadable house cache: {}", e);
            None
        }
    }
}

/// Write a cache file, creating parent directories as needed
pub(crate) fn save_to(path: &Path, cache: &HouseCache) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(cache)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, raw)?;
    debug!(path = %path.display(), rooms = cache.rooms.len(), "House cache written");
    Ok(())
}
