//! Device identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an OpenHome device
///
/// The UDN from the UPnP device description, normalized to strip the
/// `uuid:` prefix so IDs compare consistently no matter which layer
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let normalized = id.strip_prefix("uuid:").unwrap_or(&id);
        Self(normalized.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_uuid_prefix() {
        let id = DeviceId::new("uuid:4c494e4e-0026-0f21");
        assert_eq!(id.as_str(), "4c494e4e-0026-0f21");
    }

    #[test]
    fn test_prefixed_and_bare_compare_equal() {
        assert_eq!(
            DeviceId::new("uuid:4c494e4e-0026"),
            DeviceId::new("4c494e4e-0026")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DeviceId::new("abc-123")), "abc-123");
    }
}
