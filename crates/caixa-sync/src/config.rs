//! # Sync Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAIXA_SYNC_ENDPOINT=https://script.example.com/exec                │
//! │     CAIXA_SYNC_MODE=offline                                            │
//! │     CAIXA_SYNC_INTERVAL_SECS=60                                        │
//! │     CAIXA_BACKEND_URL=https://xyz.supabase.co                          │
//! │     CAIXA_BACKEND_KEY=...                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/caixa/sync.toml (Linux)                                  │
//! │     ~/Library/Application Support/br.freitas.caixa/sync.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     SyncMode::Online, no endpoint, 60 s interval                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [sync]
//! mode = "online"          # online | offline
//! endpoint = "https://script.example.com/exec"
//! interval_secs = 60
//! probe_interval_secs = 10
//! # request_timeout_secs = 15   (unset = no timeout)
//!
//! [backend]
//! url = "https://xyz.supabase.co"
//! api_key = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Mode
// =============================================================================

/// Whether this register talks to the outside world at all.
///
/// ```text
/// ONLINE (Default)                     OFFLINE
/// ────────────────                     ───────
/// • Agent runs passes on interval,     • Agent never starts
///   trigger and reconnect              • Outbox still fills up and is
/// • Events mirrored to the backend       delivered once switched back
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Online,
    Offline,
}

impl SyncMode {
    pub fn is_sync_enabled(&self) -> bool {
        matches!(self, SyncMode::Online)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Online => write!(f, "online"),
            SyncMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" | "on" | "enabled" => Ok(SyncMode::Online),
            "offline" | "off" | "disabled" => Ok(SyncMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown sync mode: '{}'. Valid options: online, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Outbox delivery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub mode: SyncMode,

    /// Where outbox envelopes are POSTed. Without one the agent only
    /// accumulates entries.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Seconds between periodic passes.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Seconds between connectivity probes (drives the reconnect trigger).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Per-request timeout. Unset means requests may take as long as the
    /// network does.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_interval() -> u64 {
    60
}

fn default_probe_interval() -> u64 {
    10
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            mode: SyncMode::default(),
            endpoint: None,
            interval_secs: default_interval(),
            probe_interval_secs: default_probe_interval(),
            request_timeout_secs: None,
        }
    }
}

// =============================================================================
// Backend Settings
// =============================================================================

/// Relational backend (PostgREST) used for mirroring shifts and transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Project base URL; `/rest/v1/` is appended per table.
    #[serde(default)]
    pub url: Option<String>,

    /// Sent as both `apikey` and bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl BackendSettings {
    /// Mirroring only happens with both URL and key present.
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
            && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub backend: BackendSettings,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
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

    pub fn validate(&self) -> SyncResult<()> {
        if let Some(ref endpoint) = self.sync.endpoint {
            parse_http_url(endpoint)?;
        }

        if let Some(ref url) = self.backend.url {
            parse_http_url(url)?;
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.probe_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "probe_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.request_timeout_secs == Some(0) {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production).
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("CAIXA_SYNC_ENDPOINT") {
            debug!(endpoint = %endpoint, "Overriding sync endpoint from environment");
            self.sync.endpoint = Some(endpoint);
        }

        if let Some(mode) = lookup("CAIXA_SYNC_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding sync mode from environment");
                    self.sync.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown sync mode in environment"),
            }
        }

        if let Some(interval) = lookup("CAIXA_SYNC_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => self.sync.interval_secs = secs,
                Err(_) => warn!(value = %interval, "Invalid CAIXA_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(url) = lookup("CAIXA_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.url = Some(url);
        }

        if let Some(key) = lookup("CAIXA_BACKEND_KEY") {
            self.backend.api_key = Some(key);
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("br", "freitas", "caixa")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn mode(&self) -> SyncMode {
        self.sync.mode
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.sync.mode.is_sync_enabled()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.sync.endpoint.as_deref()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.sync.probe_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.sync.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Parses a URL and requires an http(s) scheme.
pub(crate) fn parse_http_url(raw: &str) -> SyncResult<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::InvalidUrl(format!(
            "URL must use http:// or https://, got {}://",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_sync_mode_parsing() {
        assert_eq!("online".parse::<SyncMode>().unwrap(), SyncMode::Online);
        assert_eq!("OFFLINE".parse::<SyncMode>().unwrap(), SyncMode::Offline);
        assert_eq!("disabled".parse::<SyncMode>().unwrap(), SyncMode::Offline);
        assert!("primary".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.mode(), SyncMode::Online);
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert!(config.endpoint().is_none());
        assert!(config.request_timeout().is_none());
        assert!(!config.backend.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.sync.endpoint = Some("ftp://example.com".into());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.sync.endpoint = Some("not a url".into());
        assert!(config.validate().is_err());

        config.sync.endpoint = Some("https://script.example.com/exec".into());
        assert!(config.validate().is_ok());

        config.sync.interval_secs = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        config.sync.interval_secs = 60;
        config.sync.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CAIXA_SYNC_ENDPOINT", "https://sync.example.com"),
            ("CAIXA_SYNC_MODE", "offline"),
            ("CAIXA_SYNC_INTERVAL_SECS", "15"),
            ("CAIXA_BACKEND_URL", "https://db.example.com"),
            ("CAIXA_BACKEND_KEY", "anon-key"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.endpoint(), Some("https://sync.example.com"));
        assert_eq!(config.mode(), SyncMode::Offline);
        assert_eq!(config.sync.interval_secs, 15);
        assert!(config.backend.is_configured());
    }

    #[test]
    fn test_bad_override_values_are_ignored() {
        let mut config = SyncConfig::default();
        config.apply_overrides(|k| match k {
            "CAIXA_SYNC_MODE" => Some("sideways".into()),
            "CAIXA_SYNC_INTERVAL_SECS" => Some("soon".into()),
            _ => None,
        });

        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
            [sync]
            mode = "offline"
            endpoint = "https://script.example.com/exec"
            request_timeout_secs = 20

            [backend]
            url = "https://xyz.supabase.co"
        "#;

        let config: SyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.mode(), SyncMode::Offline);
        assert_eq!(config.sync.interval_secs, 60);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(20)));
        assert!(!config.backend.is_configured());

        let written = toml::to_string_pretty(&config).unwrap();
        assert!(written.contains("[sync]"));
        let reparsed: SyncConfig = toml::from_str(&written).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("caixa-sync-config-does-not-exist.toml");
        let config = SyncConfig::load_or_default(Some(path));
        assert_eq!(config.sync.interval_secs, SyncSettings::default().interval_secs);
    }
}
