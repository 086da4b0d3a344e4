//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VEL_BASE_URL=https://content.example.org                           │
//! │     VEL_COLLECTIONS=banners,wallpapers                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/vel-sync/vel-sync.toml (Linux)                           │
//! │     ~/Library/Application Support/com.vel.vel-sync/vel-sync.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     seven content collections, auto-sync every 60 s                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [client]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Living room tablet"
//!
//! [sync]
//! collections = ["banners", "wallpapers", "media"]
//! auto_sync = true
//! interval_ms = 60000
//!
//! [remote]
//! base_url = "https://content.example.org"
//! api_key = "anon-key"
//!
//! [cache]
//! path = "/var/lib/vel/cache.db"
//! namespace = "default"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Client Configuration
// =============================================================================

/// Identity of this client towards the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Unique client identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    #[serde(default = "default_client_id")]
    pub id: String,

    /// Human-readable client name.
    #[serde(default = "default_client_name")]
    pub name: String,
}

fn default_client_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_client_name() -> String {
    "Vel Client".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            id: default_client_id(),
            name: default_client_name(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// What to sync and how often.
///
/// Immutable once an orchestrator has been built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Collections to sync, in the order a full sync visits them.
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,

    /// Whether `enable_auto_sync` may start the periodic timer.
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Auto-sync period in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_collections() -> Vec<String> {
    vel_core::DEFAULT_COLLECTIONS
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    vel_core::DEFAULT_SYNC_INTERVAL_MS
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            collections: default_collections(),
            auto_sync: true,
            interval_ms: default_interval_ms(),
        }
    }
}

impl SyncSettings {
    /// Settings for an explicit collection list, other fields defaulted.
    pub fn with_collections<I, S>(collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SyncSettings {
            collections: collections.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Sets whether auto-sync is allowed.
    pub fn auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    /// Sets the auto-sync period in milliseconds.
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Auto-sync period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Content backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the backend; sync endpoints live under `/api/sync/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// TCP connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout (seconds). Bounds every in-flight fetch.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            api_key: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Where the local cache lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// SQLite file path. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Persistence namespace; clients sharing a file must use distinct ones.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            path: None,
            namespace: default_namespace(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Client identity.
    #[serde(default)]
    pub client: ClientConfig,

    /// Collections and auto-sync behaviour.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Backend connection.
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Local cache location.
    #[serde(default)]
    pub cache: CacheSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated client ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (vel-sync.toml)
    /// 3. Environment variables
    ///
    /// When the file is missing or has no `client.id`, the file-level config
    /// (with the generated id, without environment overrides) is written
    /// back so the client keeps its identity across restarts.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            let has_client_id = if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
                declares_client_id(&contents)
            } else {
                debug!(?path, "Config file not found, using defaults");
                false
            };

            if !has_client_id {
                if let Err(e) = config.save(Some(path.clone())) {
                    warn!(?path, error = %e, "Failed to persist generated client ID");
                }
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());

        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// An empty collection list is valid: every sync is then a no-op.
    pub fn validate(&self) -> SyncResult<()> {
        if self.client.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("client.id must not be empty".into()));
        }

        let url = url::Url::parse(&self.remote.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }

        if self.sync.interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_ms must be greater than 0".into(),
            ));
        }

        if self.sync.collections.iter().any(|c| c.trim().is_empty()) {
            return Err(SyncError::InvalidConfig(
                "collection names must not be empty".into(),
            ));
        }

        if self.cache.namespace.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "cache.namespace must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies overrides looked up by variable name.
    ///
    /// `load` passes the process environment; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("VEL_CLIENT_ID") {
            debug!(client_id = %id, "Overriding client ID from environment");
            self.client.id = id;
        }

        if let Some(url) = lookup("VEL_BASE_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.remote.base_url = url;
        }

        if let Some(key) = lookup("VEL_API_KEY") {
            self.remote.api_key = Some(key);
        }

        if let Some(list) = lookup("VEL_COLLECTIONS") {
            self.sync.collections = list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            debug!(collections = ?self.sync.collections, "Overriding collections from environment");
        }

        if let Some(flag) = lookup("VEL_AUTO_SYNC") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.auto_sync = true,
                "0" | "false" | "no" | "off" => self.sync.auto_sync = false,
                _ => warn!(value = %flag, "Unknown VEL_AUTO_SYNC value in environment"),
            }
        }

        if let Some(interval) = lookup("VEL_SYNC_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => self.sync.interval_ms = ms,
                Err(_) => warn!(value = %interval, "Ignoring invalid VEL_SYNC_INTERVAL_MS"),
            }
        }

        if let Some(path) = lookup("VEL_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(path));
        }

        if let Some(namespace) = lookup("VEL_CACHE_NAMESPACE") {
            self.cache.namespace = namespace;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("vel-sync.toml"))
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "vel", "vel-sync")
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the client ID.
    pub fn client_id(&self) -> &str {
        &self.client.id
    }

    /// Returns the backend base URL.
    pub fn base_url(&self) -> &str {
        &self.remote.base_url
    }

    /// Returns the cache database path: configured, or
    /// `<data dir>/vel-cache.db`.
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("vel-cache.db")))
    }
}

fn declares_client_id(contents: &str) -> bool {
    contents
        .parse::<toml::Table>()
        .ok()
        .and_then(|table| table.get("client")?.get("id").cloned())
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.client.id.is_empty());
        assert_eq!(config.sync.collections.len(), 7);
        assert_eq!(config.sync.collections[0], "banners");
        assert!(config.sync.auto_sync);
        assert_eq!(config.sync.interval_ms, 60_000);
        assert_eq!(config.cache.namespace, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.remote.base_url = "ftp://content.example.org".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.remote.base_url = "not a url".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.remote.base_url = "https://content.example.org".into();
        config.sync.interval_ms = 0;
        assert!(config.validate().is_err());

        config.sync.interval_ms = 1_000;
        config.cache.namespace = "  ".into();
        assert!(config.validate().is_err());

        config.cache.namespace = "tablet".into();
        config.sync.collections.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [sync]
            collections = ["banners", "photos"]
            interval_ms = 5000

            [remote]
            base_url = "https://content.example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.collections, vec!["banners", "photos"]);
        assert_eq!(config.sync.interval_ms, 5_000);
        assert!(config.sync.auto_sync);
        assert_eq!(config.remote.request_timeout_secs, 30);
        assert!(!config.client.id.is_empty());
    }

    #[test]
    fn test_overrides() {
        let mut config = SyncConfig::default();
        config.apply_overrides(env(&[
            ("VEL_CLIENT_ID", "kiosk-7"),
            ("VEL_BASE_URL", "https://cdn.example.org"),
            ("VEL_COLLECTIONS", "banners, media ,,"),
            ("VEL_AUTO_SYNC", "off"),
            ("VEL_SYNC_INTERVAL_MS", "abc"),
            ("VEL_CACHE_NAMESPACE", "kiosk"),
        ]));

        assert_eq!(config.client_id(), "kiosk-7");
        assert_eq!(config.base_url(), "https://cdn.example.org");
        assert_eq!(config.sync.collections, vec!["banners", "media"]);
        assert!(!config.sync.auto_sync);
        assert_eq!(config.sync.interval_ms, 60_000);
        assert_eq!(config.cache.namespace, "kiosk");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("vel-sync.toml");

        let mut config = SyncConfig::default();
        config.sync = SyncSettings::with_collections(["media"]).interval_ms(2_000);
        config.remote.api_key = Some("secret".into());
        config.save(Some(path.clone())).unwrap();

        let loaded: SyncConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.client.id, config.client.id);
        assert_eq!(loaded.sync, config.sync);
        assert_eq!(loaded.remote.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_load_persists_generated_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vel-sync.toml");

        let first = SyncConfig::load(Some(path.clone())).unwrap();
        assert!(path.exists());

        let second = SyncConfig::load(Some(path.clone())).unwrap();
        assert_eq!(second.client.id, first.client.id);
    }

    #[test]
    fn test_load_fills_in_missing_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vel-sync.toml");
        std::fs::write(&path, "[sync]\ninterval_ms = 5000\n").unwrap();

        let first = SyncConfig::load(Some(path.clone())).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(declares_client_id(&contents));

        let second = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(second.client.id, first.client.id);
        assert_eq!(second.sync.interval_ms, 5_000);
    }

    #[test]
    fn test_load_keeps_existing_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vel-sync.toml");
        let contents = "# kiosk\n[client]\nid = \"kiosk-7\"\n";
        std::fs::write(&path, contents).unwrap();

        SyncConfig::load(Some(path.clone())).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
    }

    #[test]
    fn test_explicit_cache_path_wins() {
        let mut config = SyncConfig::default();
        config.cache.path = Some(PathBuf::from("/tmp/vel/cache.db"));
        assert_eq!(config.cache_path(), Some(PathBuf::from("/tmp/vel/cache.db")));
    }
}
