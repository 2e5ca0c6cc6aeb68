//! Change events for property updates

use std::time::Instant;

/// Emitted when a watched property changes
///
/// Events carry the entity and property key, not the value: by the time an
/// event is consumed the value may have changed again, so consumers read the
/// current value back from the store.
#[derive(Debug, Clone)]
pub struct ChangeEvent<Id> {
    /// The entity whose property changed
    pub entity_id: Id,
    /// The property key that changed (matches `Property::KEY`)
    pub property_key: &'static str,
    /// When the change was detected
    pub timestamp: Instant,
}

impl<Id> ChangeEvent<Id> {
    pub fn new(entity_id: Id, property_key: &'static str) -> Self {
        Self {
            entity_id,
            property_key,
            timestamp: Instant::now(),
        }
    }
}

impl<Id: PartialEq> PartialEq for ChangeEvent<Id> {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp deliberately excluded
        self.entity_id == other.entity_id && self.property_key == other.property_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_timestamp() {
        let a = ChangeEvent::new("room-1".to_string(), "standby");
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = ChangeEvent::new("room-1".to_string(), "standby");
        assert_eq!(a, b);

        let c = ChangeEvent::new("room-2".to_string(), "standby");
        assert_ne!(a, c);
    }
}
