//! # Bridge Configuration
//!
//! Settings for both remotes, the ledger database, the HTTP API and the
//! batch jobs.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ODOO_URL, ODOO_DB, ODOO_USERNAME, ODOO_PASSWORD,                   │
//! │     ODOO_STORE_LOCATION_IDS, WATI_BASE_URL, WATI_TENANT_ID,            │
//! │     WATI_TOKEN, WATI_SOURCE_TYPE, LEDGER_DB_PATH, LEDGER_HTTP_PORT     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledger-bridge/bridge.toml (Linux)                        │
//! │     ~/Library/Application Support/com.ledger.bridge/bridge.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Credentials are checked when a client is built, not here: the HTTP API
//! can serve contact search without messaging credentials, and `status`
//! needs neither remote.
//!
//! ## Configuration File Format
//! ```toml
//! [erp]
//! url = "https://erp.example.com"
//! database = "prod"
//! username = "bot@example.com"
//! password = "secret"
//! store_location_ids = [8, 12]
//!
//! [messaging]
//! tenant_id = "123456"
//! token = "eyJ..."
//!
//! [jobs]
//! erp_pull_batch_size = 500
//! push_limit = 150
//! import_max_pages = 2
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use ledger_core::validation::{parse_id_list, require};
use ledger_core::DEFAULT_FALLBACK_NAME;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// ERP Settings
// =============================================================================

/// Connection settings for the ERP's XML-RPC endpoints.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ErpSettings {
    /// Base URL; `/xmlrpc/2/common` and `/xmlrpc/2/object` are appended.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Warehouse locations whose stock is summed by smart search.
    /// Empty means "use the ERP's own quantity".
    #[serde(default)]
    pub store_location_ids: Vec<i64>,
}

impl ErpSettings {
    /// Checks that every credential is present and the URL parses.
    pub fn validate(&self) -> SyncResult<()> {
        for (field, value) in [
            ("erp.url", &self.url),
            ("erp.database", &self.database),
            ("erp.username", &self.username),
            ("erp.password", &self.password),
        ] {
            require(field, value).map_err(|e| SyncError::Config(e.to_string()))?;
        }
        url::Url::parse(self.url.trim())?;
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }
}

impl std::fmt::Debug for ErpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpSettings")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("store_location_ids", &self.store_location_ids)
            .finish()
    }
}

// =============================================================================
// Messaging Settings
// =============================================================================

/// Connection settings for the messaging platform's REST API.
#[derive(Clone, Serialize, Deserialize)]
pub struct MessagingSettings {
    #[serde(default = "default_messaging_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub token: String,

    /// Value of the `sourceType` query parameter on write calls.
    #[serde(default = "default_source_type")]
    pub source_type: String,
}

fn default_messaging_base_url() -> String {
    "https://live-mt-server.wati.io".to_string()
}

fn default_source_type() -> String {
    "Wati".to_string()
}

impl Default for MessagingSettings {
    fn default() -> Self {
        MessagingSettings {
            base_url: default_messaging_base_url(),
            tenant_id: String::new(),
            token: String::new(),
            source_type: default_source_type(),
        }
    }
}

impl MessagingSettings {
    /// Checks that every field is present and the URL parses.
    pub fn validate(&self) -> SyncResult<()> {
        for (field, value) in [
            ("messaging.base_url", &self.base_url),
            ("messaging.tenant_id", &self.tenant_id),
            ("messaging.token", &self.token),
            ("messaging.source_type", &self.source_type),
        ] {
            require(field, value).map_err(|e| SyncError::Config(e.to_string()))?;
        }
        url::Url::parse(self.base_url.trim())?;
        Ok(())
    }

    /// Returns true when credentials were supplied at all.
    pub fn is_configured(&self) -> bool {
        !self.tenant_id.trim().is_empty() && !self.token.trim().is_empty()
    }
}

impl std::fmt::Debug for MessagingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingSettings")
            .field("base_url", &self.base_url)
            .field("tenant_id", &self.tenant_id)
            .field("token", &"<redacted>")
            .field("source_type", &self.source_type)
            .finish()
    }
}

// =============================================================================
// Database / Server Settings
// =============================================================================

/// Location of the ledger database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `None` means the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DatabaseSettings {
    /// Resolves the database file path.
    pub fn resolve_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.data_dir().join("ledger.db"))
                .unwrap_or_else(|| PathBuf::from("ledger.db"))
        })
    }
}

/// Inbound HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Job Settings
// =============================================================================

/// Defaults for the batch jobs; CLI flags override them per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// ERP page size for the pull (clamped to 1..=1000).
    #[serde(default = "default_erp_pull_batch_size")]
    pub erp_pull_batch_size: u32,

    /// Stop the pull after this many rows. 0 = unlimited.
    #[serde(default)]
    pub erp_pull_max_total: u32,

    /// Rows per push run.
    #[serde(default = "default_push_limit")]
    pub push_limit: u32,

    /// Also retry rows in `error`.
    #[serde(default)]
    pub push_retry_errors: bool,

    /// Messaging page size for the import (clamped to 1..=500).
    #[serde(default = "default_import_page_size")]
    pub import_page_size: u32,

    /// Pages per import run. 0 = unlimited.
    #[serde(default = "default_import_max_pages")]
    pub import_max_pages: u32,

    /// How long a crashed run's lock blocks the next run.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Name used when neither remote supplies one.
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,
}

fn default_erp_pull_batch_size() -> u32 {
    500
}
fn default_push_limit() -> u32 {
    150
}
fn default_import_page_size() -> u32 {
    100
}
fn default_import_max_pages() -> u32 {
    2
}
fn default_lock_ttl() -> u64 {
    24 * 60 * 60
}
fn default_fallback_name() -> String {
    DEFAULT_FALLBACK_NAME.to_string()
}

impl Default for JobSettings {
    fn default() -> Self {
        JobSettings {
            erp_pull_batch_size: default_erp_pull_batch_size(),
            erp_pull_max_total: 0,
            push_limit: default_push_limit(),
            push_retry_errors: false,
            import_page_size: default_import_page_size(),
            import_max_pages: default_import_max_pages(),
            lock_ttl_secs: default_lock_ttl(),
            fallback_name: default_fallback_name(),
        }
    }
}

impl JobSettings {
    pub fn lock_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.lock_ttl_secs)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub erp: ErpSettings,

    #[serde(default)]
    pub messaging: MessagingSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub jobs: JobSettings,
}

impl BridgeConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (bridge.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        let explicit = config_path.is_some();
        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading bridge config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else if explicit {
                return Err(SyncError::ConfigLoad(format!(
                    "config file not found: {}",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document.
    pub fn from_toml(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates structural settings (sizes, URLs). Credentials are
    /// validated by the clients that need them.
    pub fn validate(&self) -> SyncResult<()> {
        if self.jobs.erp_pull_batch_size == 0 {
            return Err(SyncError::Config(
                "jobs.erp_pull_batch_size must be greater than 0".into(),
            ));
        }
        if self.jobs.push_limit == 0 {
            return Err(SyncError::Config("jobs.push_limit must be greater than 0".into()));
        }
        if self.jobs.import_page_size == 0 {
            return Err(SyncError::Config(
                "jobs.import_page_size must be greater than 0".into(),
            ));
        }
        if !self.erp.url.trim().is_empty() {
            url::Url::parse(self.erp.url.trim())?;
        }
        url::Url::parse(self.messaging.base_url.trim())?;
        Ok(())
    }

    /// Applies overrides from an environment lookup.
    ///
    /// Blank values are ignored so an exported-but-empty variable does not
    /// wipe a file setting.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ODOO_URL") {
            debug!(url = %v, "Overriding ERP URL from environment");
            self.erp.url = v;
        }
        if let Some(v) = get("ODOO_DB") {
            self.erp.database = v;
        }
        if let Some(v) = get("ODOO_USERNAME") {
            self.erp.username = v;
        }
        if let Some(v) = get("ODOO_PASSWORD") {
            self.erp.password = v;
        }
        if let Some(v) = get("ODOO_STORE_LOCATION_IDS") {
            self.erp.store_location_ids = parse_id_list(&v);
        }
        if let Some(v) = get("WATI_BASE_URL") {
            self.messaging.base_url = v;
        }
        if let Some(v) = get("WATI_TENANT_ID") {
            self.messaging.tenant_id = v;
        }
        if let Some(v) = get("WATI_TOKEN") {
            self.messaging.token = v;
        }
        if let Some(v) = get("WATI_SOURCE_TYPE") {
            self.messaging.source_type = v;
        }
        if let Some(v) = get("LEDGER_DB_PATH") {
            self.database.path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LEDGER_HTTP_PORT") {
            if let Ok(port) = v.trim().parse::<u16>() {
                debug!(port, "Overriding HTTP port from environment");
                self.server.port = port;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("bridge.toml"))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "ledger", "bridge")
}
