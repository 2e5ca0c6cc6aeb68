//! Type-erased property storage with change detection
//!
//! Two layers:
//! - `PropertyBag`: one entity's typed properties behind `TypeId` erasure
//! - `WatchStore<Id>`: a table of entities with watch registration and a
//!   change-event channel

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{mpsc, Arc, Mutex, RwLock};

use crate::event::ChangeEvent;
use crate::iter::ChangeIterator;
use crate::property::Property;

// ============================================================================
// PropertyBag
// ============================================================================

/// Typed properties for a single entity
///
/// `set` compares against the stored value and reports whether anything
/// actually changed, which is what lets callers decide whether downstream
/// recomputation is needed at all.
pub struct PropertyBag {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Current value of a property, if ever set
    pub fn get<P: Property>(&self) -> Option<P> {
        self.values
            .get(&TypeId::of::<P>())
            .and_then(|boxed| boxed.downcast_ref::<P>())
            .cloned()
    }

    /// Store a value; `true` when it differs from what was there
    pub fn set<P: Property>(&mut self, value: P) -> bool {
        let current = self
            .values
            .get(&TypeId::of::<P>())
            .and_then(|boxed| boxed.downcast_ref::<P>());

        if current != Some(&value) {
            self.values.insert(TypeId::of::<P>(), Box::new(value));
            true
        } else {
            false
        }
    }

    /// Drop a property; `true` when it existed
    pub fn remove<P: Property>(&mut self) -> bool {
        self.values.remove(&TypeId::of::<P>()).is_some()
    }

    pub fn contains<P: Property>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<P>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for PropertyBag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyBag")
            .field("property_count", &self.values.len())
            .finish()
    }
}

// ============================================================================
// WatchStore<Id>
// ============================================================================

/// Entity table with change detection and watch registration
///
/// Generic over the entity ID so the same store works for devices, rooms, or
/// anything hashable. Watched `(entity, key)` pairs emit [`ChangeEvent`]s on
/// real changes only; everything else mutates silently.
pub struct WatchStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    entities: Arc<RwLock<HashMap<Id, PropertyBag>>>,
    watched: Arc<RwLock<HashSet<(Id, &'static str)>>>,
    event_tx: mpsc::Sender<ChangeEvent<Id>>,
    event_rx: Arc<Mutex<mpsc::Receiver<ChangeEvent<Id>>>>,
}

impl<Id> WatchStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
            watched: Arc::new(RwLock::new(HashSet::new())),
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    /// Current value of `P` for an entity
    pub fn get<P: Property>(&self, entity_id: &Id) -> Option<P> {
        let entities = self.entities.read().ok()?;
        entities.get(entity_id)?.get::<P>()
    }

    /// Store a value, creating the entity on first touch
    ///
    /// Returns whether the value changed. A change on a watched pair also
    /// emits a [`ChangeEvent`].
    pub fn set<P: Property>(&self, entity_id: &Id, value: P) -> bool {
        let changed = {
            let mut entities = match self.entities.write() {
                Ok(e) => e,
                Err(_) => return false,
            };
            entities
                .entry(entity_id.clone())
                .or_default()
                .set(value)
        };

        if changed {
            self.maybe_emit(entity_id, P::KEY);
        }
        changed
    }

    /// Register interest in `(entity, key)`; changes then appear in `iter()`
    pub fn watch(&self, entity_id: Id, property_key: &'static str) {
        if let Ok(mut watched) = self.watched.write() {
            watched.insert((entity_id, property_key));
        }
    }

    pub fn unwatch(&self, entity_id: &Id, property_key: &'static str) {
        if let Ok(mut watched) = self.watched.write() {
            watched.remove(&(entity_id.clone(), property_key));
        }
    }

    pub fn is_watched(&self, entity_id: &Id, property_key: &'static str) -> bool {
        self.watched
            .read()
            .map(|w| w.contains(&(entity_id.clone(), property_key)))
            .unwrap_or(false)
    }

    /// Blocking iterator over change events for watched pairs
    pub fn iter(&self) -> ChangeIterator<Id> {
        ChangeIterator::new(Arc::clone(&self.event_rx))
    }

    pub fn entity_count(&self) -> usize {
        self.entities.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    pub fn entity_ids(&self) -> Vec<Id> {
        self.entities
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_entity(&self, entity_id: &Id) -> bool {
        self.entities
            .read()
            .map(|e| e.contains_key(entity_id))
            .unwrap_or(false)
    }

    /// Drop an entity and everything it stored
    pub fn remove_entity(&self, entity_id: &Id) -> bool {
        self.entities
            .write()
            .map(|mut e| e.remove(entity_id).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entities) = self.entities.write() {
            entities.clear();
        }
        if let Ok(mut watched) = self.watched.write() {
            watched.clear();
        }
    }

    fn maybe_emit(&self, entity_id: &Id, property_key: &'static str) {
        let is_watched = self
            .watched
            .read()
            .map(|w| w.contains(&(entity_id.clone(), property_key)))
            .unwrap_or(false);

        if is_watched {
            let _ = self
                .event_tx
                .send(ChangeEvent::new(entity_id.clone(), property_key));
        }
    }
}

impl<Id> Default for WatchStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id> Clone for WatchStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            entities: Arc::clone(&self.entities),
            watched: Arc::clone(&self.watched),
            event_tx: self.event_tx.clone(),
            event_rx: Arc::clone(&self.event_rx),
        }
    }
}

impl<Id> std::fmt::Debug for WatchStore<Id>
where
    Id: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStore")
            .field("entity_count", &self.entity_count())
            .finish()
    }
}
