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

//! Dashboard error types

use gatewatch_core::CoreError;
use thiserror::Error;

/// Result type for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;

/// Errors raised while setting up the dashboard.
///
/// Failures of the admin backend are not here: they are reported through
/// [`crate::AdminError`] and absorbed by the monitor.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Invalid metrics input (resolution, interval)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Config or replay file could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<toml::de::Error> for DashboardError {
    fn from(e: toml::de::Error) -> Self {
        DashboardError::ParseError(e.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(e: serde_json::Error) -> Self {
        DashboardError::ParseError(e.to_string())
    }
}
