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

//! Gatewatch Core
//!
//! Service metrics samples as reported by gateway nodes, and the period
//! aggregation that merges them for the dashboard.

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod sample;

pub use aggregate::{combine, combine_with, PeriodAggregator, PeriodSummary};
pub use error::{CoreError, Result};
pub use filter::{FilterMode, SampleFilter};
pub use sample::{MetricsSample, Resolution, ResponseTimes, AGGREGATE_SERVICE_ID};
