//! Workflow configuration.
//!
//! Read from a YAML file located via `REPAIRDESK_CONFIG` or, failing that,
//! `config.yaml` in the platform data directory. String values may use
//! `${VAR}` or `${VAR:-default}` and are interpolated before parsing.
//! A missing or broken file falls back to defaults with a warning.

use std::path::{Path, PathBuf};

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::money;
use crate::diagnostics::RetentionPolicy;

/// Env var pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "REPAIRDESK_CONFIG";

const CONFIG_FILE_NAME: &str = "config.yaml";
const DATABASE_FILE_NAME: &str = "repairdesk.db";

/// Upper bound for day-count settings (one hundred years).
const MAX_WINDOW_DAYS: i64 = 36_500;

/// Errors that can occur while loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

/// Shop-level settings for capture retention and quoting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// SQLite file. Defaults to `repairdesk.db` in the data directory.
    pub database_path: Option<PathBuf>,
    /// Days a captured record stays readable.
    pub retention_days: i64,
    /// Days a new estimate stays valid.
    pub estimate_validity_days: i64,
    /// Hourly rate applied to labor items captured without one.
    #[serde(deserialize_with = "money::de_amount")]
    pub default_labor_rate: Decimal,
    /// Fraction applied to labor + parts, e.g. `0.0825`.
    #[serde(deserialize_with = "money::de_amount")]
    pub tax_rate: Decimal,
    /// Flat fee added to every new estimate.
    #[serde(deserialize_with = "money::de_amount")]
    pub shop_fees: Decimal,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retention_days: 30,
            estimate_validity_days: 30,
            default_labor_rate: Decimal::new(12000, 2),
            tax_rate: Decimal::ZERO,
            shop_fees: Decimal::ZERO,
        }
    }
}

impl WorkflowConfig {
    /// Load from the discovered config file, or return defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = find_config_path() else {
            tracing::debug!("no config file found, using defaults");
            return Self::default();
        };
        match Self::load(&path) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "loaded workflow config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load workflow config, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Load and validate a specific file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse YAML text after env-var interpolation.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(raw);
        // An empty document is an empty config, not an error.
        if interpolated.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, days) in [
            ("retention_days", self.retention_days),
            ("estimate_validity_days", self.estimate_validity_days),
        ] {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(ConfigError::Invalid {
                    reason: format!("{name} must be between 1 and {MAX_WINDOW_DAYS}, got {days}"),
                });
            }
        }
        if self.tax_rate > Decimal::ONE {
            return Err(ConfigError::Invalid {
                reason: format!("tax_rate {} is above 1", self.tax_rate),
            });
        }
        Ok(())
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::days(self.retention_days)
    }

    /// Saturates for day counts outside what `Duration` can hold.
    pub fn estimate_validity(&self) -> Duration {
        Duration::try_days(self.estimate_validity_days).unwrap_or(Duration::MAX)
    }

    /// Where the SQLite database lives. Creates the parent directory.
    pub fn resolve_database_path(&self) -> PathBuf {
        let path = self
            .database_path
            .clone()
            .unwrap_or_else(|| crate::data_dir().join(DATABASE_FILE_NAME));
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(
                        dir = %parent.display(),
                        error = %e,
                        "failed to create database directory"
                    );
                }
            }
        }
        path
    }
}

/// Locate the config file: the env var first, then the data directory.
pub fn find_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&explicit));
        if candidate.exists() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} points at a missing file");
    }
    let candidate = crate::data_dir().join(CONFIG_FILE_NAME);
    candidate.exists().then_some(candidate)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                expr.push(c);
            }
            result.push_str(&resolve_var_expr(&expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.estimate_validity_days, 30);
        assert_eq!(cfg.default_labor_rate.to_string(), "120.00");
        assert_eq!(cfg.retention(), RetentionPolicy::days(30));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = WorkflowConfig::from_yaml("tax_rate: 0.0825\nshop_fees: \"$15.00\"\n").unwrap();
        assert_eq!(cfg.tax_rate, Decimal::from_str("0.0825").unwrap());
        assert_eq!(cfg.shop_fees, Decimal::from_str("15.00").unwrap());
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.default_labor_rate, Decimal::new(12000, 2));
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(WorkflowConfig::from_yaml("  \n").unwrap(), WorkflowConfig::default());
    }

    #[test]
    fn test_interpolation() {
        std::env::remove_var("__REPAIRDESK_TEST_UNSET__");
        let cfg = WorkflowConfig::from_yaml(
            "database_path: ${__REPAIRDESK_TEST_UNSET__:-/tmp/rd.db}\nretention_days: 7\n",
        )
        .unwrap();
        assert_eq!(cfg.database_path, Some(PathBuf::from("/tmp/rd.db")));
        assert_eq!(cfg.retention_days, 7);

        std::env::set_var("__REPAIRDESK_TEST_RATE__", "95.5");
        let cfg = WorkflowConfig::from_yaml("default_labor_rate: ${__REPAIRDESK_TEST_RATE__}\n")
            .unwrap();
        assert_eq!(cfg.default_labor_rate, Decimal::from_str("95.5").unwrap());
        std::env::remove_var("__REPAIRDESK_TEST_RATE__");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            WorkflowConfig::from_yaml("retention_days: 0\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            WorkflowConfig::from_yaml("retention_days: 9223372036854775807\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            WorkflowConfig::from_yaml("estimate_validity_days: 36501\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            WorkflowConfig::from_yaml("tax_rate: 1.5\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            WorkflowConfig::from_yaml("default_labor_rate: -10\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "estimate_validity_days: 14\n").unwrap();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.estimate_validity(), Duration::days(14));

        let missing = WorkflowConfig::load(&dir.path().join("nope.yaml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_out_of_range_windows_do_not_panic() {
        let cfg = WorkflowConfig {
            retention_days: i64::MAX,
            estimate_validity_days: i64::MAX,
            ..WorkflowConfig::default()
        };
        assert_eq!(cfg.estimate_validity(), Duration::MAX);
        let now = chrono::Utc::now();
        assert!(cfg.retention().expires_at(now) > now);
    }

    #[test]
    fn test_resolve_database_path_survives_unwritable_parent() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let db = blocker.join("nested").join("shop.db");
        let cfg = WorkflowConfig {
            database_path: Some(db.clone()),
            ..WorkflowConfig::default()
        };
        assert_eq!(cfg.resolve_database_path(), db);
        assert!(!blocker.join("nested").exists());
    }

    #[test]
    fn test_resolve_database_path_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("shop.db");
        let cfg = WorkflowConfig {
            database_path: Some(db.clone()),
            ..WorkflowConfig::default()
        };
        assert_eq!(cfg.resolve_database_path(), db);
        assert!(dir.path().join("nested").exists());
    }
}
