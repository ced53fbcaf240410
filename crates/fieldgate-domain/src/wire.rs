use serde::Deserialize;
use serde_json::value::RawValue;

/// A device message decoded from raw publication bytes.
///
/// `payload` is carved out of the input as the exact byte region the sender
/// serialized. The signature covers those bytes, so the verifier must never
/// re-serialize them: two serializers can disagree on key order and number
/// formatting.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireMessage<'a> {
    pub device_id: String,
    pub timestamp: i64,
    pub message_id: String,
    #[serde(borrow)]
    pub payload: &'a RawValue,
    pub signature: String,
}

/// Decode and structurally validate a raw device publication.
///
/// Enforces the strict on-wire schema: exactly the five required fields of
/// the required kinds, `payload` a JSON object, `signature` 64 lowercase hex
/// characters. Unknown fields are rejected so they can never be silently
/// excluded from the signed region.
pub fn parse_message(raw: &[u8]) -> Result<WireMessage<'_>, String> {
    let text = std::str::from_utf8(raw).map_err(|_| "message is not valid UTF-8".to_string())?;

    let message: WireMessage<'_> =
        serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;

    if message.device_id.is_empty() {
        return Err("device_id is empty".to_string());
    }
    if message.message_id.is_empty() {
        return Err("message_id is empty".to_string());
    }
    if !message.payload.get().starts_with('{') {
        return Err("payload is not a JSON object".to_string());
    }
    if !is_hex_signature(&message.signature) {
        return Err("signature is not 64 lowercase hex characters".to_string());
    }

    Ok(message)
}

fn is_hex_signature(signature: &str) -> bool {
    signature.len() == 64
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = concat!(
        r#"{"device_id":"sensor_001","timestamp":1727712000,"#,
        r#""message_id":"550e8400-e29b-41d4-a716-446655440000","#,
        r#""payload":{"temperature":22.5,"humidity":60},"#,
        r#""signature":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}"#
    );

    #[test]
    fn test_parse_valid_message() {
        let msg = parse_message(VALID.as_bytes()).unwrap();
        assert_eq!(msg.device_id, "sensor_001");
        assert_eq!(msg.timestamp, 1727712000);
        assert_eq!(msg.message_id, "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(msg.payload.get(), r#"{"temperature":22.5,"humidity":60}"#);
    }

    #[test]
    fn test_payload_bytes_preserved_verbatim() {
        // Whitespace and key order inside the payload region must survive
        // untouched; the MAC ran over these exact bytes.
        let raw = concat!(
            r#"{"device_id":"d","timestamp":1,"message_id":"m","#,
            r#""payload":{"b": 2,"a":1.50},"#,
            r#""signature":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}"#
        );
        let msg = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(msg.payload.get(), r#"{"b": 2,"a":1.50}"#);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let raw = r#"{"device_id":"d","timestamp":1,"message_id":"m","payload":{}}"#;
        assert!(parse_message(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let raw = concat!(
            r#"{"device_id":"d","timestamp":1,"message_id":"m","payload":{},"#,
            r#""signature":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","#,
            r#""extra":true}"#
        );
        assert!(parse_message(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        for payload in ["42", r#""scalar""#, "[1,2]", "null", "true"] {
            let raw = format!(
                r#"{{"device_id":"d","timestamp":1,"message_id":"m","payload":{},"signature":"{}"}}"#,
                payload,
                "a".repeat(64),
            );
            assert!(parse_message(raw.as_bytes()).is_err(), "payload {} accepted", payload);
        }
    }

    #[test]
    fn test_non_integer_timestamp_is_rejected() {
        for ts in ["1.5", r#""1727712000""#, "null"] {
            let raw = format!(
                r#"{{"device_id":"d","timestamp":{},"message_id":"m","payload":{{}},"signature":"{}"}}"#,
                ts,
                "a".repeat(64),
            );
            assert!(parse_message(raw.as_bytes()).is_err(), "timestamp {} accepted", ts);
        }
    }

    #[test]
    fn test_bad_signature_shapes_are_rejected() {
        for sig in [
            "a".repeat(63),                   // too short
            "a".repeat(65),                   // too long
            "A".repeat(64),                   // uppercase hex
            format!("{}g", "a".repeat(63)),   // non-hex character
        ] {
            let raw = format!(
                r#"{{"device_id":"d","timestamp":1,"message_id":"m","payload":{{}},"signature":"{}"}}"#,
                sig,
            );
            assert!(parse_message(raw.as_bytes()).is_err(), "signature {} accepted", sig);
        }
    }

    #[test]
    fn test_truncated_and_binary_input_rejected() {
        assert!(parse_message(b"{\"device_id\":\"d\"").is_err());
        assert!(parse_message(&[0xff, 0xfe, 0x00]).is_err());
        assert!(parse_message(b"").is_err());
    }
}
