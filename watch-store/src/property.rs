//! Property trait for typed, watchable state values

/// Marker trait for values that can be stored and watched
///
/// Properties must be:
/// - Clone: values are handed out by copy, never by reference into the store
/// - Send + Sync: the store is shared across threads
/// - PartialEq: change detection compares old and new before notifying
/// - 'static: storage is type-erased via `TypeId`
///
/// The `KEY` constant is a stable, human-readable identifier used in change
/// events, log lines, and watch registrations. It must be unique within the
/// application domain.
pub trait Property: Clone + Send + Sync + PartialEq + 'static {
    /// Unique key identifying this property type
    const KEY: &'static str;
}
