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

use crate::config::DashboardConfig;
use gatewatch_core::Resolution;
use serde::{Deserialize, Serialize};

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Bin interval and chart time range for one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionProfile {
    pub resolution: Resolution,
    /// Nominal duration of one bin
    pub bin_interval_ms: i64,
    /// How far back the chart reaches
    pub chart_time_range_ms: i64,
}

impl ResolutionProfile {
    pub fn for_resolution(resolution: Resolution, config: &DashboardConfig) -> Self {
        match resolution {
            Resolution::Fine => Self {
                resolution,
                bin_interval_ms: config.fine_bin_interval_ms,
                chart_time_range_ms: config.fine_chart_range_ms,
            },
            Resolution::Hourly => Self {
                resolution,
                bin_interval_ms: HOUR_MS,
                chart_time_range_ms: config.hourly_chart_range_ms,
            },
            Resolution::Daily => Self {
                resolution,
                bin_interval_ms: DAY_MS,
                chart_time_range_ms: config.daily_chart_range_ms,
            },
        }
    }

    /// Start of the first download: one chart range plus one bin back from `now_ms`
    pub fn initial_since(&self, now_ms: i64) -> i64 {
        now_ms - self.chart_time_range_ms - self.bin_interval_ms
    }

    /// Resolution and look-back of the samples behind the "latest" summary.
    ///
    /// `None` at fine resolution, where the newest downloaded bin is used as is.
    /// Hourly collates the last hour of fine bins, daily the last day of
    /// hourly bins.
    pub fn latest_summary_window(&self) -> Option<(Resolution, i64)> {
        match self.resolution {
            Resolution::Fine => None,
            Resolution::Hourly => Some((Resolution::Fine, HOUR_MS)),
            Resolution::Daily => Some((Resolution::Hourly, DAY_MS)),
        }
    }
}
