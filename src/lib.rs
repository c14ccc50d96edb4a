pub mod bus;
pub mod config;
pub mod errors;
pub mod frontend;
pub mod gateway;
pub mod pubsub;
pub mod shared_types;
pub mod wamp;

pub use config::Config;
pub use errors::{CallError, GatewayError};
pub use frontend::{FrontendConnection, Server};
