//! Generic Watchable State
//!
//! A small, dependency-free state layer with change detection, blocking
//! iteration, and ordered-list diffing.
//!
//! # Features
//!
//! - **Typed Storage**: Store and retrieve strongly-typed properties per entity
//! - **Change Detection**: Events fire only when a value actually changes
//! - **Watch Pattern**: Register interest in specific `(entity, property)` pairs
//! - **Blocking Iteration**: Consume change events without async/await
//! - **List Diffing**: Turn two versions of an ordered, unique list into
//!   replayable insert/remove/move deltas
//!
//! # Quick Start
//!
//! ```rust
//! use watch_store::{Property, WatchStore};
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Standby(bool);
//!
//! impl Property for Standby {
//!     const KEY: &'static str = "standby";
//! }
//!
//! let store = WatchStore::<String>::new();
//! store.watch("device-1".to_string(), Standby::KEY);
//!
//! store.set(&"device-1".to_string(), Standby(false));
//! assert_eq!(store.get::<Standby>(&"device-1".to_string()), Some(Standby(false)));
//! ```
//!
//! # List Diffing
//!
//! ```rust
//! use watch_store::{apply_deltas, diff_ordered};
//!
//! let old = vec![1u32, 2, 3];
//! let new = vec![3, 1, 4];
//!
//! let deltas = diff_ordered(&old, &new);
//! let mut replay = old.clone();
//! apply_deltas(&mut replay, &deltas);
//! assert_eq!(replay, new);
//! ```

pub mod diff;
pub mod event;
pub mod iter;
pub mod property;
pub mod store;

pub use diff::{apply_deltas, diff_ordered, ListDelta};
pub use event::ChangeEvent;
pub use iter::{ChangeIterator, TimeoutIter, TryIter};
pub use property::Property;
pub use store::{PropertyBag, WatchStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::diff::{apply_deltas, diff_ordered, ListDelta};
    pub use crate::event::ChangeEvent;
    pub use crate::iter::ChangeIterator;
    pub use crate::property::Property;
    pub use crate::store::{PropertyBag, WatchStore};
}
