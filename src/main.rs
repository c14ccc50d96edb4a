use std::sync::Arc;

use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use busgate::bus::DbusConnector;
use busgate::{Config, Server};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "busgate";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    setup().await;
    run_forever().await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let filter = EnvFilter::try_new(config.log_level.filter_directive())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever() -> std::io::Result<()> {
    // Config might reload, but the fields used by run_forever are set at startup
    let config = Config::snapshot();

    let server = Server::bind(
        config.listen_addr,
        Arc::new(DbusConnector),
        config.credentials.clone(),
    )?;

    info!("{} listening on {}", APP_NAME, server.local_addr()?);

    spawn_reload_on_hangup();

    server
        .run_until(async {
            let _ = signal::ctrl_c().await;
            info!("{} shutting down", APP_NAME);
        })
        .await
}

/// SIGHUP re-reads the credentials file.
#[cfg(unix)]
fn spawn_reload_on_hangup() {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::warn;

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(e) => {
            warn!("cannot listen for SIGHUP: {e}");
            return;
        }
    };

    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, reloading credentials");
            Config::reload().await;
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup() {}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
