//! Configuration system for the headless SQL layer.
//!
//! Supports TOML-based configuration for engine compatibility thresholds and
//! the date columns used when rendering date windows.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HeadlessError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadlessConfig {
    pub engine: EngineVersionConfig,
    pub date: DateColumnConfig,
}

/// Minimum engine versions below which `WITH` clauses are not emitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineVersionConfig {
    /// MySQL versions starting with this prefix lack CTE support (default: "5.").
    pub mysql_low_version: String,
    /// ClickHouse versions strictly below this lack CTE support (default: "20.4").
    pub clickhouse_low_version: String,
}

/// Column naming and defaults for date windows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DateColumnConfig {
    /// Partition column for daily data (default: "sys_imp_date").
    pub day_column: String,
    /// Partition column for weekly data (default: "sys_imp_week").
    pub week_column: String,
    /// Partition column for monthly data (default: "sys_imp_month").
    pub month_column: String,
    /// Period count used when a recent window omits its unit (default: 1).
    pub default_recent_unit: u32,
}

impl Default for EngineVersionConfig {
    fn default() -> Self {
        Self {
            mysql_low_version: "5.".to_string(),
            clickhouse_low_version: "20.4".to_string(),
        }
    }
}

impl Default for DateColumnConfig {
    fn default() -> Self {
        Self {
            day_column: "sys_imp_date".to_string(),
            week_column: "sys_imp_week".to_string(),
            month_column: "sys_imp_month".to_string(),
            default_recent_unit: 1,
        }
    }
}

impl HeadlessConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HeadlessError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| HeadlessError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `HEADLESS_CONFIG` environment variable
    /// 2. `./headless.toml` (current directory)
    /// 3. `~/.config/headless/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("HEADLESS_CONFIG") {
            if let Ok(cfg) = Self::from_file(&path) {
                tracing::info!(path = %path, "loaded config from HEADLESS_CONFIG");
                return cfg;
            }
        }

        if let Ok(cfg) = Self::from_file("headless.toml") {
            tracing::info!("loaded config from ./headless.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("headless").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = HeadlessConfig::default();
        assert_eq!(cfg.engine.mysql_low_version, "5.");
        assert_eq!(cfg.engine.clickhouse_low_version, "20.4");
        assert_eq!(cfg.date.day_column, "sys_imp_date");
        assert_eq!(cfg.date.default_recent_unit, 1);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[engine]
mysql_low_version = "5.6"

[date]
day_column = "dt"
"#;
        let cfg = HeadlessConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.engine.mysql_low_version, "5.6");
        // Unspecified keys keep their defaults
        assert_eq!(cfg.engine.clickhouse_low_version, "20.4");
        assert_eq!(cfg.date.day_column, "dt");
        assert_eq!(cfg.date.month_column, "sys_imp_month");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = HeadlessConfig::from_toml("engine = 3").unwrap_err();
        assert!(matches!(err, HeadlessError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = HeadlessConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
