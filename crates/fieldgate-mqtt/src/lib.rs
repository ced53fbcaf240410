pub mod ingress;
pub mod publisher;
pub mod session;
pub mod topic;

pub use ingress::MqttIngress;
pub use publisher::MqttDevicePublisher;
pub use session::{connect_session, MqttSessionConfig};
pub use topic::{command_topic, parse_data_topic, response_topic, ParsedDataTopic, DATA_TOPIC_FILTER};
