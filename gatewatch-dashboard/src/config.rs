// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dashboard configuration
//!
//! Loaded with priority: file > env > defaults.

use crate::error::{DashboardError, DashboardResult};
use gatewatch_core::{FilterMode, Resolution};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Dashboard refresh and retention settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Refresh tick period in milliseconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,

    /// Gateway fine-resolution bin interval in milliseconds
    #[serde(default = "default_fine_bin_interval")]
    pub fine_bin_interval_ms: i64,

    /// Chart time range at fine resolution
    #[serde(default = "default_fine_chart_range")]
    pub fine_chart_range_ms: i64,

    /// Chart time range at hourly resolution
    #[serde(default = "default_hourly_chart_range")]
    pub hourly_chart_range_ms: i64,

    /// Chart time range at daily resolution
    #[serde(default = "default_daily_chart_range")]
    pub daily_chart_range_ms: i64,

    /// Polling interval of the per-service statistics, sizes the rate window
    #[serde(default = "default_rate_interval")]
    pub rate_interval_secs: u64,

    /// Resolution shown when the dashboard opens
    #[serde(default)]
    pub resolution: Resolution,

    /// How node and service selectors combine
    #[serde(default)]
    pub filter_mode: FilterMode,
}

fn default_refresh_interval() -> u64 {
    2_500
}

fn default_fine_bin_interval() -> i64 {
    5_000
}

fn default_fine_chart_range() -> i64 {
    10 * 60 * 1000 // 10 minutes
}

fn default_hourly_chart_range() -> i64 {
    60 * 60 * 60 * 1000 // 60 hours
}

fn default_daily_chart_range() -> i64 {
    60 * 24 * 60 * 60 * 1000 // 60 days
}

fn default_rate_interval() -> u64 {
    5
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval(),
            fine_bin_interval_ms: default_fine_bin_interval(),
            fine_chart_range_ms: default_fine_chart_range(),
            hourly_chart_range_ms: default_hourly_chart_range(),
            daily_chart_range_ms: default_daily_chart_range(),
            rate_interval_secs: default_rate_interval(),
            resolution: Resolution::default(),
            filter_mode: FilterMode::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> DashboardResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overridden by environment variables
    ///
    /// Supported environment variables:
    /// - GATEWATCH_REFRESH_INTERVAL_MS: refresh tick (default: 2500)
    /// - GATEWATCH_FINE_BIN_INTERVAL_MS: fine bin interval (default: 5000)
    /// - GATEWATCH_RATE_INTERVAL_SECS: statistics polling interval (default: 5)
    /// - GATEWATCH_RESOLUTION: fine | hourly | daily (default: fine)
    /// - GATEWATCH_STRICT_FILTER: require both node and service to match (default: false)
    pub fn from_env() -> DashboardResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<PathBuf>) -> DashboardResult<Self> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using environment", path);
                Self::from_env()?
            }
            None => Self::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> DashboardResult<()> {
        if let Some(val) = env_parse("GATEWATCH_REFRESH_INTERVAL_MS")? {
            self.refresh_interval_ms = val;
        }
        if let Some(val) = env_parse("GATEWATCH_FINE_BIN_INTERVAL_MS")? {
            self.fine_bin_interval_ms = val;
        }
        if let Some(val) = env_parse("GATEWATCH_RATE_INTERVAL_SECS")? {
            self.rate_interval_secs = val;
        }
        if let Ok(resolution) = std::env::var("GATEWATCH_RESOLUTION") {
            self.resolution = resolution.parse()?;
        }
        if let Some(strict) = env_parse::<bool>("GATEWATCH_STRICT_FILTER")? {
            self.filter_mode = if strict {
                FilterMode::AllOf
            } else {
                FilterMode::AnyOf
            };
        }
        Ok(())
    }

    /// Reject settings that would stall the refresh loop or the rate window
    pub fn validate(&self) -> DashboardResult<()> {
        if self.refresh_interval_ms == 0 {
            return Err(DashboardError::ConfigError(
                "refresh_interval_ms must be positive".to_string(),
            ));
        }
        if self.fine_bin_interval_ms <= 0 {
            return Err(DashboardError::ConfigError(
                "fine_bin_interval_ms must be positive".to_string(),
            ));
        }
        if self.rate_interval_secs == 0 {
            return Err(DashboardError::ConfigError(
                "rate_interval_secs must be positive".to_string(),
            ));
        }
        let ranges = [
            self.fine_chart_range_ms,
            self.hourly_chart_range_ms,
            self.daily_chart_range_ms,
        ];
        if ranges.iter().any(|r| *r <= 0) {
            return Err(DashboardError::ConfigError(
                "chart time ranges must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> DashboardResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DashboardError::ConfigError(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(None),
    }
}
