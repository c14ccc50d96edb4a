use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use secrecy::SecretString;
use serde::Deserialize;
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const BUILTIN_KEY: &str = "cloudeebus";
const BUILTIN_SECRET: &str = "secret";

/// Bus services a client may ask permission for when no credentials file
/// overrides the list.
pub const BUILTIN_WHITELIST: &[&str] = &[
    "com.intel.media-service-upnp",
    "com.intel.renderer-service-upnp",
    "org.freedesktop.DBus",
    "org.freedesktop.DisplayManager",
    "org.freedesktop.FileManager1",
    "org.freedesktop.ModemManager",
    "org.freedesktop.NetworkManager",
    "org.freedesktop.Notifications",
    "org.freedesktop.Tracker1",
    "org.gnome.Nautilus",
    "org.gnome.Rygel1",
    "org.gnome.ScreenSaver",
    "org.neard",
    "org.ofono",
];

// -----------------------------------------------------------------------------
// ----- Singleton -------------------------------------------------------------

static CREDENTIALS: OnceCell<CredentialsConfig> = OnceCell::new();

// -----------------------------------------------------------------------------
// ----- CredentialsConfig -----------------------------------------------------

/// Fixed credential table (key -> secret) and the whitelist of bus service
/// names a session may request.
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    inner: Arc<RwLock<CredentialsMap>>,
}

// -----------------------------------------------------------------------------
// ----- CredentialsConfig: Static ---------------------------------------------

impl CredentialsConfig {
    /// Init: panic on any error. Do not continue with a bad state.
    pub async fn init(path: Option<&Path>) {
        let cfg = match path {
            Some(path) => Self::from_file_async(path)
                .await
                .unwrap_or_else(|e| panic!("failed to load credentials from {:?}: {e}", path)),
            None => Self::builtin(),
        };

        CREDENTIALS
            .set(cfg)
            .unwrap_or_else(|_| panic!("CredentialsConfig::init called twice"));
    }

    /// Reload: on error, DO NOT swap; keep current table and log.
    pub async fn reload(path: Option<&Path>) {
        let Some(path) = path else {
            return;
        };

        let new_cfg = match Self::from_file_async(path).await {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(
                    "reload failed; keeping previous credentials. path={:?} error={}",
                    path, e
                );
                return;
            }
        };

        let new_map = new_cfg.inner.read().clone();
        let current = Self::handle();

        *current.inner.write() = new_map;
        info!("credentials reloaded from {:?}", path);
    }

    pub fn handle() -> &'static CredentialsConfig {
        CREDENTIALS.get().expect("Credentials not initialized")
    }

    /// The table compiled into the binary: one key and the default whitelist.
    pub fn builtin() -> Self {
        let mut by_key = HashMap::with_capacity(1);
        by_key.insert(
            BUILTIN_KEY.to_string(),
            CredentialRecord {
                key: BUILTIN_KEY.to_string(),
                secret: SecretString::new(BUILTIN_SECRET.into()),
            },
        );

        Self::from_map(CredentialsMap {
            by_key,
            whitelist: builtin_whitelist(),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- CredentialsConfig: Public ---------------------------------------------

impl CredentialsConfig {
    /// Secret for a client-supplied key. An unknown key has no secret.
    pub fn secret_for(&self, key: &str) -> Option<SecretString> {
        let guard = self.inner.read();
        guard.by_key.get(key).map(|record| record.secret.clone())
    }

    /// Checks requested permissions one at a time, in order. The first one
    /// outside the whitelist fails the whole request; nothing after it is
    /// looked at.
    pub fn check_permissions(&self, requested: &[String]) -> Result<(), CredentialsError> {
        let guard = self.inner.read();

        for permission in requested {
            if !guard.whitelist.iter().any(|allowed| allowed == permission) {
                return Err(CredentialsError::NotWhitelisted {
                    permission: permission.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.inner.read().whitelist.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        let guard = self.inner.read();
        let mut keys: Vec<String> = guard.by_key.values().map(|r| r.key.clone()).collect();
        keys.sort();
        keys
    }
}

// -----------------------------------------------------------------------------
// ----- CredentialsConfig: Private --------------------------------------------

impl CredentialsConfig {
    fn from_map(map: CredentialsMap) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    async fn from_file_async(path: &Path) -> Result<CredentialsConfig, CredentialsError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| CredentialsError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<CredentialsConfig, CredentialsError> {
        let mut doc: CredentialsFile =
            toml::from_str(raw).map_err(|e| CredentialsError::Toml { source: e })?;

        if doc.credentials.is_empty() {
            return Err(CredentialsError::EmptyConfig);
        }

        let mut by_key = HashMap::with_capacity(doc.credentials.len());
        for entry in doc.credentials.drain(..) {
            validate(&entry)?;

            let record = CredentialRecord {
                key: entry.key.clone(),
                secret: SecretString::new(entry.secret.into_boxed_str()),
            };

            if by_key.insert(entry.key.clone(), record).is_some() {
                return Err(CredentialsError::DuplicateKey { key: entry.key });
            }
        }

        let whitelist = doc.whitelist.unwrap_or_else(builtin_whitelist);

        Ok(Self::from_map(CredentialsMap { by_key, whitelist }))
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: map ---------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct CredentialsMap {
    by_key: HashMap<String, CredentialRecord>,
    whitelist: Vec<String>,
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    whitelist: Option<Vec<String>>,

    #[serde(default)]
    credentials: Vec<CredentialsFileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CredentialsFileEntry {
    #[serde(alias = "authkey")]
    key: String,

    secret: String,
}

// -----------------------------------------------------------------------------
// ----- Internal: In-memory record --------------------------------------------

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub key: String,
    pub secret: SecretString,
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn builtin_whitelist() -> Vec<String> {
    BUILTIN_WHITELIST.iter().map(|s| s.to_string()).collect()
}

fn validate(entry: &CredentialsFileEntry) -> Result<(), CredentialsError> {
    if entry.key.trim().is_empty() {
        return Err(CredentialsError::InvalidField("key".into()));
    }
    if entry.secret.is_empty() {
        return Err(CredentialsError::InvalidField("secret".into()));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credentials file has no [[credentials]] entries")]
    EmptyConfig,

    #[error("duplicate [[credentials]] entry for key '{key}'")]
    DuplicateKey { key: String },

    #[error("invalid or missing field '{0}'")]
    InvalidField(String),

    #[error("permission '{permission}' is not whitelisted")]
    NotWhitelisted { permission: String },

    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
