use parking_lot::RwLock;
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use super::{cli::CliConfig, credentials::CredentialsConfig, types::LogLevel};

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceLock<Arc<RwLock<Config>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: LogLevel,
    pub credentials_file_location: Option<PathBuf>,
    pub credentials: &'static CredentialsConfig,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Async because CredentialsConfig::init() is async (non-blocking IO).
    pub async fn init() {
        CliConfig::init();

        let cli = CliConfig::snapshot();
        CredentialsConfig::init(cli.credentials_file_location.as_deref()).await;

        Self::load();
    }

    /// Re-reads the credentials file in place; the listen address and log
    /// level are fixed at startup.
    pub async fn reload() {
        let cli = CliConfig::snapshot();
        CredentialsConfig::reload(cli.credentials_file_location.as_deref()).await;

        Self::load();
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    fn load() {
        let cli = CliConfig::snapshot();

        let next = Config {
            listen_addr: cli.listen_addr,
            log_level: cli.log_level,
            credentials_file_location: cli.credentials_file_location,
            credentials: CredentialsConfig::handle(),
        };

        if let Some(handle) = ROOT_CONFIG.get() {
            *handle.write() = next;
        } else {
            let _ = ROOT_CONFIG.set(Arc::new(RwLock::new(next)));
        }
    }

    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
