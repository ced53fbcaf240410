pub mod bridge;
pub mod clock;
pub mod command;
pub mod error;
pub mod ports;
pub mod replay;
pub mod signature;
pub mod stats;
pub mod types;
pub mod validator;
pub mod wire;

pub use bridge::{BridgeConfig, BridgeOutcome, BridgeService};
pub use clock::SystemClock;
pub use command::CommandService;
pub use error::{CommandError, GatewayError, GatewayResult, RejectReason};
pub use ports::{BackendForwarder, Clock, CredentialStore, DevicePublisher};
pub use replay::ReplayCache;
pub use stats::{GatewayStats, RejectionSnapshot, StatsSnapshot};
pub use types::{AcceptedMessage, BackendResponse, DeviceRecord, DispatchedCommand};
pub use validator::{MessageValidator, ValidationOutcome};

// Re-export mocks for adapter crates when the testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use ports::MockBackendForwarder;
#[cfg(any(test, feature = "testing"))]
pub use ports::MockClock;
#[cfg(any(test, feature = "testing"))]
pub use ports::MockCredentialStore;
#[cfg(any(test, feature = "testing"))]
pub use ports::MockDevicePublisher;
