use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes the HMAC-SHA256 tag for a device data message.
///
/// The signed region is the unseparated concatenation
/// `device_id || decimal(timestamp) || message_id || payload_bytes`, where
/// `payload_bytes` is the payload exactly as the sender serialized it. The
/// tag is returned as 64 lowercase hex characters.
pub fn sign_data_message(
    device_id: &str,
    timestamp: i64,
    message_id: &str,
    payload: &str,
    secret: &[u8],
) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(device_id.as_bytes());
    mac.update(timestamp.to_string().as_bytes());
    mac.update(message_id.as_bytes());
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Computes the HMAC-SHA256 tag for a backend→device command.
///
/// Commands omit `device_id` from the signed region; the target is implied
/// by the publication topic and the device verifies against its own
/// identity implicitly: `decimal(timestamp) || message_id || payload_bytes`.
pub fn sign_command(timestamp: i64, message_id: &str, payload: &str, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(message_id.as_bytes());
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a data-message tag in constant time.
pub fn verify_data_message(
    device_id: &str,
    timestamp: i64,
    message_id: &str,
    payload: &str,
    secret: &[u8],
    signature_hex: &str,
) -> bool {
    let expected = sign_data_message(device_id, timestamp, message_id, payload, secret);
    expected.as_bytes().ct_eq(signature_hex.as_bytes()).into()
}
