/// Subscription filter for device data publications.
pub const DATA_TOPIC_FILTER: &str = "device/+/data";

/// Parsed device data topic. The middle segment carries the transport
/// identity: the broker's ACL binds each client certificate's common name
/// to its own `device/{cn}/...` namespace, so the segment is authoritative
/// for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDataTopic {
    pub device_id: String,
}

/// Parse an MQTT topic in the format `device/{device_id}/data`.
pub fn parse_data_topic(topic: &str) -> Result<ParsedDataTopic, String> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.len() != 3 || parts[0] != "device" || parts[2] != "data" {
        return Err(format!(
            "invalid topic '{}': expected 'device/{{device_id}}/data'",
            topic
        ));
    }

    let device_id = parts[1].trim();
    if device_id.is_empty() {
        return Err("device ID cannot be empty in topic".to_string());
    }

    Ok(ParsedDataTopic {
        device_id: device_id.to_string(),
    })
}

/// Topic carrying backend responses for a device.
pub fn response_topic(device_id: &str) -> String {
    format!("device/{}/response", device_id)
}

/// Topic carrying signed backend commands for a device.
pub fn command_topic(device_id: &str) -> String {
    format!("device/{}/command", device_id)
}
