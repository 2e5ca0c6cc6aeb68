//! Product handle with property accessors

use std::marker::PhantomData;
use std::sync::Arc;

use openhome_services::DeviceId;
use openhome_topology::{
    HouseManager, MuteState, NowPlaying, PlaylistSnapshot, PlaylistTransport, ProductInfo,
    PropertyWatcher, RoomId, TopologyProperty, TrackPosition, VolumeLevel,
};

use crate::error::SdkError;

/// Handle on one product-scoped property
pub struct ProductHandle<P: TopologyProperty> {
    device: DeviceId,
    manager: Arc<HouseManager>,
    _marker: PhantomData<fn() -> P>,
}

impl<P: TopologyProperty> ProductHandle<P> {
    pub(crate) fn new(device: DeviceId, manager: Arc<HouseManager>) -> Self {
        Self {
            device,
            manager,
            _marker: PhantomData,
        }
    }

    /// Cached value, instant
    ///
    /// `None` until the property's service has evented at least once, which
    /// for demand-driven services means until something watches it.
    pub fn get(&self) -> Option<P> {
        self.manager.get_product::<P>(&self.device)
    }

    /// Reactive watcher; holds the service subscription while alive
    pub fn watch(&self) -> Result<PropertyWatcher<P>, SdkError> {
        Ok(self.manager.watch_product::<P>(&self.device)?)
    }
}

/// One physical product (device) of the house
pub struct Product {
    /// Device identity (UDN)
    pub device: DeviceId,
    /// Product display name
    pub name: String,
    /// Room the product claims
    pub room: RoomId,

    /// Volume level
    pub volume: ProductHandle<VolumeLevel>,
    /// Mute state
    pub mute: ProductHandle<MuteState>,
    /// What the product is rendering right now
    pub now_playing: ProductHandle<NowPlaying>,
    /// Playlist transport state
    pub transport: ProductHandle<PlaylistTransport>,
    /// Playback position
    pub position: ProductHandle<TrackPosition>,

    manager: Arc<HouseManager>,
}

impl Product {
    pub(crate) fn new(info: ProductInfo, manager: Arc<HouseManager>) -> Self {
        let device = info.device;
        Self {
            volume: ProductHandle::new(device.clone(), Arc::clone(&manager)),
            mute: ProductHandle::new(device.clone(), Arc::clone(&manager)),
            now_playing: ProductHandle::new(device.clone(), Arc::clone(&manager)),
            transport: ProductHandle::new(device.clone(), Arc::clone(&manager)),
            position: ProductHandle::new(device.clone(), Arc::clone(&manager)),
            device,
            name: info.name,
            room: info.room,
            manager,
        }
    }

    /// Pin the product's current playlist for paged reading
    ///
    /// Note the Playlist service is demand-driven: without a playlist
    /// watcher (or a prior snapshot) no Playlist event has arrived and this
    /// returns an error.
    pub fn playlist(&self) -> Result<PlaylistSnapshot, SdkError> {
        Ok(self.manager.playlist(&self.device)?)
    }
}

impl std::fmt::Debug for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Product")
            .field("device", &self.device)
            .field("name", &self.name)
            .field("room", &self.room)
            .finish()
    }
}
