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

//! Gatewatch Dashboard
//!
//! State behind the live service-metrics dashboard:
//! - **Chart series**: time-bounded window of aggregated periods
//! - **Rate cache**: last-minute request counts from cumulative totals
//! - **Monitor**: the refresh loop that pulls from a [`MetricsSource`]
//!
//! ```text
//!   MetricsSource ──► DashboardMonitor ──► PeriodAggregator (core)
//!                          │    │
//!                          │    └──────► ChartSeriesWindow
//!                          └───────────► RollingRateCache
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gatewatch_dashboard::{DashboardConfig, DashboardMonitor, Recording, ReplaySource};
//!
//! let recording = Recording::from_file("metrics.json")?;
//! let mut monitor = DashboardMonitor::new(ReplaySource::new(recording), DashboardConfig::default())?;
//! monitor.refresh().await;
//! for point in monitor.chart().points() {
//!     println!("{} {:.2} msg/s", point.period_start, point.total_rate());
//! }
//! ```

pub mod chart_series;
pub mod config;
pub mod error;
pub mod monitor;
pub mod profile;
pub mod rate_cache;
pub mod source;

pub use chart_series::{
    ChangeListener, ChartPoint, ChartSeriesWindow, ResponseTimeStats, SeriesChange, YBounds,
};
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use monitor::{DashboardMonitor, MonitorStatus};
pub use profile::ResolutionProfile;
pub use rate_cache::{RollingRateCache, RATE_WINDOW_SECS};
pub use source::{AdminError, MetricsSource, Recording, ReplaySource, ServiceUsage};
