//! # Configuration State
//!
//! Register settings loaded at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`CAIXA_DB_PATH`, `CAIXA_REOPEN_POLICY`)
//! 2. Config file (`register.toml`)
//! 3. Defaults (this file)
//!
//! ## Configuration File Format
//! ```toml
//! # register.toml
//! reopen_policy = "reject"        # reject | replace
//! db_path = "/var/lib/caixa/caixa.db"
//!
//! [[catalog]]
//! name = "Pão de Sal"
//! price = 70                      # centavos
//!
//! [[catalog]]
//! name = "Sonho"
//! price = 350
//! ```
//!
//! ## Thread Safety
//! Configuration is read-only after initialization, so no mutex needed.

use std::path::{Path, PathBuf};

use caixa_core::catalog::{default_catalog, find_product, validate_catalog};
use caixa_core::{CatalogProduct, ReopenPolicy};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ApiError;

/// Register configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigState {
    /// Product buttons. Default: the three daily breads.
    pub catalog: Vec<CatalogProduct>,

    /// What `start` does while a shift is open. Default: reject.
    pub reopen_policy: ReopenPolicy,

    /// SQLite file. Default: platform data directory.
    pub db_path: Option<PathBuf>,
}

impl Default for ConfigState {
    fn default() -> Self {
        ConfigState {
            catalog: default_catalog(),
            reopen_policy: ReopenPolicy::Reject,
            db_path: None,
        }
    }
}

impl ConfigState {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let mut config = ConfigState::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Register config not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ApiError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ApiError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| ApiError::config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.catalog.is_empty() {
            return Err(ApiError::config("catalog must have at least one product"));
        }
        validate_catalog(&self.catalog).map_err(|e| ApiError::config(e.to_string()))
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CAIXA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.db_path = Some(PathBuf::from(path));
        }

        if let Some(policy) = lookup("CAIXA_REOPEN_POLICY") {
            match policy.parse() {
                Ok(parsed) => self.reopen_policy = parsed,
                Err(_) => warn!(policy = %policy, "Unknown reopen policy in environment"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("br", "freitas", "caixa").map(|dirs| dirs.config_dir().join("register.toml"))
    }

    /// Catalog lookup by name or 1-based button position.
    pub fn find_product(&self, query: &str) -> Option<&CatalogProduct> {
        find_product(&self.catalog, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caixa_core::Money;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ConfigState::default();
        assert_eq!(config.catalog.len(), 3);
        assert_eq!(config.reopen_policy, ReopenPolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_catalog() {
        let config: ConfigState = toml::from_str(
            r#"
            reopen_policy = "replace"

            [[catalog]]
            name = "Sonho"
            price = 350
            "#,
        )
        .unwrap();

        assert_eq!(config.reopen_policy, ReopenPolicy::Replace);
        assert_eq!(config.catalog, vec![CatalogProduct::new("Sonho", Money::from_cents(350))]);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CAIXA_DB_PATH", "/tmp/caixa-test.db"),
            ("CAIXA_REOPEN_POLICY", "replace"),
        ]
        .into_iter()
        .collect();

        let mut config = ConfigState::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/caixa-test.db")));
        assert_eq!(config.reopen_policy, ReopenPolicy::Replace);
    }

    #[test]
    fn test_invalid_policy_is_ignored() {
        let mut config = ConfigState::default();
        config.apply_overrides(|k| (k == "CAIXA_REOPEN_POLICY").then(|| "sometimes".to_string()));
        assert_eq!(config.reopen_policy, ReopenPolicy::Reject);
    }

    #[test]
    fn test_validate_rejects_bad_catalog() {
        let config = ConfigState {
            catalog: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ConfigState {
            catalog: vec![CatalogProduct::new("Outros", Money::from_cents(100))],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_find_product() {
        let config = ConfigState::default();
        assert_eq!(config.find_product("pão de sal").unwrap().price, Money::from_cents(70));
        assert_eq!(config.find_product("3").unwrap().name, "Pão Doce Especial");
        assert!(config.find_product("Baguete").is_none());
    }
}
