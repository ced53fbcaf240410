pub mod backend;
pub mod command_api;

pub use backend::HttpBackendForwarder;
pub use command_api::{command_router, serve_command_api, CommandApiState};
