//! Playlist snapshot cache
//!
//! A playlist is evented as an ID array; the track metadata behind the IDs
//! has to be pulled over SOAP (`ReadList`), which is slow and paged. This
//! module makes that tolerable:
//!
//! - [`TrackCache`]: bounded per-product LRU of `id -> Track`. IDs never get
//!   reused for different content, so a cached entry is valid until the ID
//!   drops out of the playlist.
//! - [`PlaylistRegistry`]: the reconciler writes ID arrays in, API users take
//!   snapshots out. Every real ID-array change bumps a generation and evicts
//!   cache entries whose IDs are gone.
//! - [`PlaylistSnapshot`]: pins one `(ids, generation)`. Reads answer from
//!   the pinned ordering even if the live playlist has moved on, so a UI can
//!   page through a list without it shifting underneath.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use openhome_services::{DeviceId, PlaylistBrowser, Result as ServiceResult, Track};

/// Cached tracks per product
const DEFAULT_CACHE_CAPACITY: usize = 500;

/// IDs per `ReadList` round trip
const READ_LIST_BATCH: usize = 100;

// ============================================================================
// TrackCache
// ============================================================================

/// Bounded LRU of track metadata for one product
pub struct TrackCache {
    capacity: usize,
    entries: HashMap<u32, Track>,
    /// Least-recently-used at the front
    order: VecDeque<u32>,
}

impl TrackCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Look up a track, refreshing its recency
    pub fn get(&mut self, id: u32) -> Option<Track> {
        if self.entries.contains_key(&id) {
            self.touch(id);
        }
        self.entries.get(&id).cloned()
    }

    /// Insert a track, evicting the least recently used past capacity
    pub fn insert(&mut self, track: Track) {
        let id = track.id;
        if self.entries.insert(id, track).is_some() {
            self.touch(id);
        } else {
            self.order.push_back(id);
        }

        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Drop every entry whose ID is not in `keep`
    pub fn retain(&mut self, keep: &HashSet<u32>) {
        self.entries.retain(|id, _| keep.contains(id));
        self.order.retain(|id| keep.contains(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, id: u32) {
        if let Some(pos) = self.order.iter().position(|&x| x == id) {
            self.order.remove(pos);
        }
        self.order.push_back(id);
    }
}

// ============================================================================
// PlaylistRegistry
// ============================================================================

struct PlaylistShared {
    ids: RwLock<Arc<Vec<u32>>>,
    generation: AtomicU64,
    cache: Mutex<TrackCache>,
}

/// Live playlist state per product
///
/// The reconciler is the only writer; snapshots are the only read surface
/// that leaves this module.
pub struct PlaylistRegistry {
    browser: Arc<dyn PlaylistBrowser>,
    playlists: RwLock<HashMap<DeviceId, Arc<PlaylistShared>>>,
    cache_capacity: usize,
}

impl PlaylistRegistry {
    pub fn new(browser: Arc<dyn PlaylistBrowser>) -> Self {
        Self::with_cache_capacity(browser, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(browser: Arc<dyn PlaylistBrowser>, capacity: usize) -> Self {
        Self {
            browser,
            playlists: RwLock::new(HashMap::new()),
            cache_capacity: capacity,
        }
    }

    /// Apply an evented ID array; returns the new generation on real change
    pub fn update_ids(&self, device: &DeviceId, ids: Vec<u32>) -> Option<u64> {
        let shared = self.get_or_create(device);

        let mut current = shared.ids.write();
        if **current == ids {
            return None;
        }

        let keep: HashSet<u32> = ids.iter().copied().collect();
        *current = Arc::new(ids);
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut cache = shared.cache.lock();
        let before = cache.len();
        cache.retain(&keep);
        debug!(
            device = %device,
            generation,
            evicted = before - cache.len(),
            "Playlist ID array changed"
        );

        Some(generation)
    }

    /// Forget a product entirely (device vanished)
    pub fn remove(&self, device: &DeviceId) {
        self.playlists.write().remove(device);
    }

    /// Pin the current playlist of a product
    ///
    /// `None` when no Playlist event has been seen for the device yet.
    pub fn snapshot(&self, device: &DeviceId) -> Option<PlaylistSnapshot> {
        let shared = self.playlists.read().get(device)?.clone();
        let ids = shared.ids.read().clone();
        let generation = shared.generation.load(Ordering::SeqCst);

        Some(PlaylistSnapshot {
            device: device.clone(),
            ids,
            generation,
            shared,
            browser: Arc::clone(&self.browser),
        })
    }

    fn get_or_create(&self, device: &DeviceId) -> Arc<PlaylistShared> {
        if let Some(shared) = self.playlists.read().get(device) {
            return Arc::clone(shared);
        }

        let capacity = self.cache_capacity;
        Arc::clone(
            self.playlists
                .write()
                .entry(device.clone())
                .or_insert_with(|| {
                    Arc::new(PlaylistShared {
                        ids: RwLock::new(Arc::new(Vec::new())),
                        generation: AtomicU64::new(0),
                        cache: Mutex::new(TrackCache::new(capacity)),
                    })
                }),
        )
    }
}

// ============================================================================
// PlaylistSnapshot
// ============================================================================

/// A pinned view of one product's playlist
///
/// Reads are consistent with the pinned ID ordering. The snapshot shares the
/// product's track cache, so metadata fetched through a stale snapshot still
/// benefits later readers when the IDs survived the change.
pub struct PlaylistSnapshot {
    device: DeviceId,
    ids: Arc<Vec<u32>>,
    generation: u64,
    shared: Arc<PlaylistShared>,
    browser: Arc<dyn PlaylistBrowser>,
}

impl PlaylistSnapshot {
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the live playlist still matches this snapshot
    pub fn is_current(&self) -> bool {
        self.shared.generation.load(Ordering::SeqCst) == self.generation
    }

    /// Read a page of tracks in snapshot order
    ///
    /// The window is clamped to the snapshot length. Cache misses are
    /// fetched in `ReadList`-sized batches; IDs the device no longer knows
    /// come back as [`Track::unknown`] placeholders, never as errors.
    pub async fn read(&self, offset: usize, count: usize) -> ServiceResult<Vec<Track>> {
        let end = offset.saturating_add(count).min(self.ids.len());
        if offset >= end {
            return Ok(Vec::new());
        }
        let window = &self.ids[offset..end];

        let misses: Vec<u32> = {
            let cache = self.shared.cache.lock();
            window
                .iter()
                .copied()
                .filter(|id| !cache.contains(*id))
                .collect()
        };

        trace!(
            device = %self.device,
            offset,
            count = window.len(),
            misses = misses.len(),
            "Snapshot read"
        );

        for chunk in misses.chunks(READ_LIST_BATCH) {
            // Lock released while the SOAP round trip is in flight
            let tracks = self.browser.read_list(&self.device, chunk).await?;
            let mut cache = self.shared.cache.lock();
            for track in tracks {
                cache.insert(track);
            }
        }

        let mut cache = self.shared.cache.lock();
        Ok(window
            .iter()
            .map(|&id| cache.get(id).unwrap_or_else(|| Track::unknown(id)))
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
