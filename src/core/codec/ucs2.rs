//! UCS2 hex codec (4 hex digits per UTF-16 code unit)

/// Placeholder returned when a payload is not valid UCS2 hex
pub const DECODE_FAILED: &str = "<failed to decode>";

/// True if `text` consists solely of hex digits
pub fn is_ucs2_hex(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decode a UCS2 hex string.
///
/// Never fails: input that is not hex, or whose code units do not form valid
/// UTF-16, yields [`DECODE_FAILED`]. A trailing group shorter than four
/// digits is ignored.
pub fn decode_ucs2(text: &str) -> String {
    if !is_ucs2_hex(text) {
        return DECODE_FAILED.to_string();
    }

    let whole = text.len() - text.len() % 4;
    let Ok(bytes) = hex::decode(&text[..whole]) else {
        return DECODE_FAILED.to_string();
    };

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).unwrap_or_else(|_| DECODE_FAILED.to_string())
}

/// Encode text as uppercase UCS2 hex
pub fn encode_ucs2(text: &str) -> String {
    text.encode_utf16()
        .map(|unit| hex::encode_upper(unit.to_be_bytes()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii() {
        assert_eq!(decode_ucs2("0048006500790021"), "Hey!");
        assert_eq!(decode_ucs2("0031003100320032"), "1122");
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        assert_eq!(decode_ucs2("041f04400438043204350442"), "Привет");
        assert_eq!(decode_ucs2("041F04400438043204350442"), "Привет");
    }

    #[test]
    fn test_decode_surrogate_pair() {
        assert_eq!(decode_ucs2("D83DDE00"), "\u{1F600}");
    }

    #[test]
    fn test_non_hex_yields_placeholder() {
        assert_eq!(decode_ucs2("+15551234567"), DECODE_FAILED);
        assert_eq!(decode_ucs2("Hello"), DECODE_FAILED);
    }

    #[test]
    fn test_lone_surrogate_yields_placeholder() {
        assert_eq!(decode_ucs2("D83D0041"), DECODE_FAILED);
    }

    #[test]
    fn test_trailing_partial_group_ignored() {
        assert_eq!(decode_ucs2("004100"), "A");
        assert_eq!(decode_ucs2(""), "");
    }

    #[test]
    fn test_encode_then_decode_restores_text() {
        for text in ["Hey!", "+375291234567", "Привет, мир", "日本語 \u{1F600}", ""] {
            assert_eq!(decode_ucs2(&encode_ucs2(text)), text);
        }
    }

    #[test]
    fn test_encode_is_uppercase() {
        assert_eq!(encode_ucs2("П"), "041F");
    }
}
