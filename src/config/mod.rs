pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod credentials;
pub mod types;

pub use config::Config;
pub use credentials::{CredentialsConfig, CredentialsError};
pub use types::LogLevel;
