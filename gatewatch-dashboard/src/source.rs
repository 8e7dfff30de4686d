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

//! Admin-facing metrics source
//!
//! The dashboard never talks to the gateway directly. It is handed a
//! [`MetricsSource`] and calls it once per refresh tick.

use crate::error::DashboardResult;
use async_trait::async_trait;
use gatewatch_core::{MetricsSample, Resolution};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Failures reported by the admin backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdminError {
    /// Remote call could not be completed
    #[error("Gateway unreachable: {0}")]
    Connectivity(String),

    /// Caller lacks permission to read metrics
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Problem on gateway: {0}")]
    Other(String),
}

/// Cumulative per-service totals, as shown in the statistics table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUsage {
    pub service_name: String,
    pub attempted: u64,
    pub authorized: u64,
    pub completed: u64,
}

/// Remote administrative interface supplying raw metrics
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Whether metrics collection is turned on at the gateway
    async fn is_metrics_enabled(&self) -> Result<bool, AdminError>;

    /// Samples of `resolution` whose period starts at or after `since_ms`.
    /// An empty result means "no data", not an error.
    async fn fetch_metrics_since(
        &self,
        node_id: Option<&str>,
        service_id: Option<i64>,
        since_ms: i64,
        resolution: Resolution,
    ) -> Result<Vec<MetricsSample>, AdminError>;

    /// Cumulative usage totals for every published service
    async fn fetch_service_usage(&self) -> Result<Vec<ServiceUsage>, AdminError>;
}

/// Contents of a recorded metrics file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub samples: Vec<MetricsSample>,
    #[serde(default)]
    pub usage: Vec<ServiceUsage>,
}

impl Recording {
    /// Load from JSON: either `{ "samples": [...], "usage": [...] }` or a bare
    /// array of samples
    pub fn from_json(content: &str) -> DashboardResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if value.is_array() {
            Ok(Self {
                samples: serde_json::from_value(value)?,
                usage: Vec::new(),
            })
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> DashboardResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// In-memory source serving recorded samples.
///
/// Used to replay captured metrics through the dashboard pipeline. Failures
/// can be injected to exercise the error path.
#[derive(Debug)]
pub struct ReplaySource {
    samples: Mutex<Vec<MetricsSample>>,
    usage: Mutex<Vec<ServiceUsage>>,
    enabled: AtomicBool,
    failure: Mutex<Option<AdminError>>,
}

impl Default for ReplaySource {
    fn default() -> Self {
        Self::new(Recording::default())
    }
}

impl ReplaySource {
    pub fn new(recording: Recording) -> Self {
        Self {
            samples: Mutex::new(recording.samples),
            usage: Mutex::new(recording.usage),
            enabled: AtomicBool::new(true),
            failure: Mutex::new(None),
        }
    }

    pub fn push_samples(&self, samples: impl IntoIterator<Item = MetricsSample>) {
        self.samples.lock().extend(samples);
    }

    pub fn set_usage(&self, usage: Vec<ServiceUsage>) {
        *self.usage.lock() = usage;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Make every call fail with `error` until [`ReplaySource::recover`]
    pub fn fail_with(&self, error: AdminError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    fn check(&self) -> Result<(), AdminError> {
        match self.failure.lock().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetricsSource for ReplaySource {
    async fn is_metrics_enabled(&self) -> Result<bool, AdminError> {
        self.check()?;
        Ok(self.enabled.load(Ordering::Relaxed))
    }

    async fn fetch_metrics_since(
        &self,
        _node_id: Option<&str>,
        _service_id: Option<i64>,
        since_ms: i64,
        resolution: Resolution,
    ) -> Result<Vec<MetricsSample>, AdminError> {
        // Selection is applied by the aggregator, as with the legacy backend.
        self.check()?;
        Ok(self
            .samples
            .lock()
            .iter()
            .filter(|s| s.resolution == resolution && s.period_start >= since_ms)
            .cloned()
            .collect())
    }

    async fn fetch_service_usage(&self) -> Result<Vec<ServiceUsage>, AdminError> {
        self.check()?;
        Ok(self.usage.lock().clone())
    }
}
