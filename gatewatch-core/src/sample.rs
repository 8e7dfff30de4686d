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

//! Metrics samples reported by gateway nodes
//!
//! A sample carries one reporting interval's absolute counters for a single
//! (node, service) pair, or for an aggregate of several. Counters are never
//! validated against each other: `attempted >= authorized >= completed` is
//! expected but inconsistent input simply propagates through the arithmetic.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Legacy service identifier meaning "unspecified / all services"
pub const AGGREGATE_SERVICE_ID: i64 = -1;

/// Granularity of a reporting bucket
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Fine,
    Hourly,
    Daily,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::Fine, Resolution::Hourly, Resolution::Daily];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Fine => "fine",
            Resolution::Hourly => "hourly",
            Resolution::Daily => "daily",
        }
    }

    /// Map the numeric resolution codes used by the admin interface (0, 1, 2)
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Resolution::Fine),
            1 => Ok(Resolution::Hourly),
            2 => Ok(Resolution::Daily),
            other => Err(CoreError::UnknownResolution(other.to_string())),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Resolution::Fine => 0,
            Resolution::Hourly => 1,
            Resolution::Daily => 2,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fine" => Ok(Resolution::Fine),
            "hourly" => Ok(Resolution::Hourly),
            "daily" => Ok(Resolution::Daily),
            _ => Err(CoreError::UnknownResolution(s.to_string())),
        }
    }
}

/// Min / max / sum of response times (milliseconds) over a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTimes {
    pub min: u64,
    pub max: u64,
    pub sum: u64,
}

impl ResponseTimes {
    pub fn new(min: u64, max: u64, sum: u64) -> Self {
        Self { min, max, sum }
    }

    /// Average over `completed` requests, 0 when nothing completed
    pub fn average(&self, completed: u64) -> f64 {
        if completed == 0 {
            0.0
        } else {
            self.sum as f64 / completed as f64
        }
    }
}

/// One reporting interval's counters for a node/service pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// Actual bucket start, milliseconds since epoch
    pub period_start: i64,
    /// Actual bucket end, milliseconds since epoch
    pub period_end: i64,
    /// Nominal bucket duration in milliseconds
    pub interval_ms: i64,
    pub resolution: Resolution,
    /// Reporting node, `None` when unspecified
    #[serde(default)]
    pub node_id: Option<String>,
    /// Published service, `None` for aggregate samples
    #[serde(default, deserialize_with = "deserialize_service_id")]
    pub service_id: Option<i64>,

    pub attempted: u64,
    pub authorized: u64,
    pub completed: u64,

    #[serde(default)]
    pub frontend: ResponseTimes,
    #[serde(default)]
    pub backend: ResponseTimes,
}

fn deserialize_service_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.filter(|id| *id != AGGREGATE_SERVICE_ID))
}

impl MetricsSample {
    /// Create an empty sample covering `[period_start, period_start + interval_ms)`
    pub fn new(period_start: i64, interval_ms: i64, resolution: Resolution) -> Self {
        Self {
            period_start,
            period_end: period_start + interval_ms,
            interval_ms,
            resolution,
            ..Default::default()
        }
    }

    pub fn with_period_end(mut self, period_end: i64) -> Self {
        self.period_end = period_end;
        self
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_service(mut self, service_id: i64) -> Self {
        self.service_id = Some(service_id).filter(|id| *id != AGGREGATE_SERVICE_ID);
        self
    }

    pub fn with_counts(mut self, attempted: u64, authorized: u64, completed: u64) -> Self {
        self.attempted = attempted;
        self.authorized = authorized;
        self.completed = completed;
        self
    }

    pub fn with_frontend(mut self, min: u64, max: u64, sum: u64) -> Self {
        self.frontend = ResponseTimes::new(min, max, sum);
        self
    }

    pub fn with_backend(mut self, min: u64, max: u64, sum: u64) -> Self {
        self.backend = ResponseTimes::new(min, max, sum);
        self
    }

    pub fn average_frontend_response_time(&self) -> f64 {
        self.frontend.average(self.completed)
    }

    pub fn average_backend_response_time(&self) -> f64 {
        self.backend.average(self.completed)
    }

    pub fn num_success(&self) -> i64 {
        self.completed as i64
    }

    /// Requests rejected by policy (attempted but not authorized)
    pub fn num_policy_violation(&self) -> i64 {
        self.attempted as i64 - self.authorized as i64
    }

    /// Requests authorized but not completed by the routing backend
    pub fn num_routing_failure(&self) -> i64 {
        self.authorized as i64 - self.completed as i64
    }

    pub fn nominal_attempted_rate(&self) -> f64 {
        self.nominal_rate(self.attempted as f64)
    }

    pub fn nominal_authorized_rate(&self) -> f64 {
        self.nominal_rate(self.authorized as f64)
    }

    pub fn nominal_completed_rate(&self) -> f64 {
        self.nominal_rate(self.completed as f64)
    }

    /// Messages per second over the nominal interval
    fn nominal_rate(&self, count: f64) -> f64 {
        if self.interval_ms <= 0 {
            0.0
        } else {
            count * 1000.0 / self.interval_ms as f64
        }
    }

    /// Nominal end of the bucket, used for charting without gaps
    pub fn nominal_period_end(&self) -> i64 {
        self.period_start + self.interval_ms
    }

    pub fn is_empty(&self) -> bool {
        self.attempted == 0 && self.authorized == 0 && self.completed == 0
    }
}
