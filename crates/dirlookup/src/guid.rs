//! Binary identifier decoding.
//!
//! `objectGUID` and `objectSid` are returned as raw bytes. Directory tools
//! display them in the mixed-endian GUID text form, which is what lookups
//! are keyed and compared by.

use uuid::Uuid;

/// Attributes (lower-cased) whose single values are decoded to GUID text.
pub const BINARY_IDENTIFIER_ATTRIBUTES: [&str; 2] = ["objectguid", "objectsid"];

const GUID_LEN: usize = 16;

/// Whether `attribute` is decoded as a binary identifier.
pub fn is_binary_identifier(attribute: &str) -> bool {
    BINARY_IDENTIFIER_ATTRIBUTES
        .iter()
        .any(|name| attribute.eq_ignore_ascii_case(name))
}

/// Render a binary identifier as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
///
/// The first three groups are byte-reversed, the last two keep wire order.
/// Inputs longer than 16 bytes are read from their last 16 bytes. Returns
/// `None` when fewer than 16 bytes are given.
pub fn binary_id_to_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() < GUID_LEN {
        return None;
    }
    let tail = &bytes[bytes.len() - GUID_LEN..];
    Uuid::from_slice_le(tail)
        .ok()
        .map(|uuid| uuid.hyphenated().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_guid() {
        assert_eq!(
            binary_id_to_string(&[0u8; 16]).as_deref(),
            Some("00000000-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_byte_reversal_layout() {
        let bytes: Vec<u8> = (0u8..16).collect();
        assert_eq!(
            binary_id_to_string(&bytes).as_deref(),
            Some("03020100-0504-0706-0809-0a0b0c0d0e0f")
        );
    }

    #[test]
    fn test_known_ad_guid() {
        // objectGUID of a test account as shown by directory tools:
        // 7c38ad08-5e0d-4e31-8a7f-0f4a7a35c6d2
        let bytes = [
            0x08, 0xad, 0x38, 0x7c, 0x0d, 0x5e, 0x31, 0x4e, 0x8a, 0x7f, 0x0f, 0x4a, 0x7a, 0x35,
            0xc6, 0xd2,
        ];
        assert_eq!(
            binary_id_to_string(&bytes).as_deref(),
            Some("7c38ad08-5e0d-4e31-8a7f-0f4a7a35c6d2")
        );
    }

    #[test]
    fn test_output_is_36_chars() {
        let bytes = [0xabu8; 16];
        let text = binary_id_to_string(&bytes).unwrap();
        assert_eq!(text.len(), 36);
        assert_eq!(text, "abababab-abab-abab-abab-abababababab");
    }

    #[test]
    fn test_longer_input_uses_trailing_bytes() {
        let mut sid = vec![0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x15, 0x00, 0x00, 0x00];
        sid.extend(0u8..16);
        assert_eq!(sid.len(), 28);
        assert_eq!(
            binary_id_to_string(&sid).as_deref(),
            Some("03020100-0504-0706-0809-0a0b0c0d0e0f")
        );
    }

    #[test]
    fn test_short_input_fails() {
        assert_eq!(binary_id_to_string(&[0x01, 0x02, 0x03]), None);
        assert_eq!(binary_id_to_string(&[]), None);
    }

    #[test]
    fn test_is_binary_identifier() {
        assert!(is_binary_identifier("objectGUID"));
        assert!(is_binary_identifier("objectsid"));
        assert!(!is_binary_identifier("objectClass"));
    }
}
