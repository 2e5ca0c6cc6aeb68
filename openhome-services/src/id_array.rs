//! OpenHome binary ID arrays
//!
//! The Playlist service events its track ordering as `IdArray`: a base64
//! string wrapping big-endian `u32` track IDs. An empty string is a valid,
//! empty playlist.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Result, ServiceError};

/// Decode an evented `IdArray` value into track IDs
pub fn decode_id_array(encoded: &str) -> Result<Vec<u32>> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| ServiceError::IdArrayEncoding(e.to_string()))?;

    if bytes.len() % 4 != 0 {
        return Err(ServiceError::IdArrayLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Encode track IDs the way a device would event them
///
/// The inverse of [`decode_id_array`]; mostly useful for fixtures and mock
/// engines.
pub fn encode_id_array(ids: &[u32]) -> String {
    let mut bytes = Vec::with_capacity(ids.len() * 4);
    for id in ids {
        bytes.extend_from_slice(&id.to_be_bytes());
    }
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let ids = vec![1u32, 2, 3, 0xDEAD_BEEF, 0];
        assert_eq!(decode_id_array(&encode_id_array(&ids)).unwrap(), ids);
    }

    #[test]
    fn test_empty_string_is_empty_playlist() {
        assert!(decode_id_array("").unwrap().is_empty());
        assert!(decode_id_array("   ").unwrap().is_empty());
    }

    #[test]
    fn test_big_endian_layout() {
        // 0x00000001 0x00000100
        let encoded = STANDARD.encode([0u8, 0, 0, 1, 0, 0, 1, 0]);
        assert_eq!(decode_id_array(&encoded).unwrap(), vec![1, 256]);
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        assert!(matches!(
            decode_id_array("!!not base64!!"),
            Err(ServiceError::IdArrayEncoding(_))
        ));
    }

    #[test]
    fn test_partial_word_is_an_error() {
        // Three bytes: a truncated u32
        let encoded = STANDARD.encode([0u8, 0, 1]);
        assert!(matches!(
            decode_id_array(&encoded),
            Err(ServiceError::IdArrayLength(3))
        ));
    }
}
