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

//! Core error types

use thiserror::Error;

/// Result type for core metrics operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the metrics core.
///
/// Aggregation itself never fails; these cover programmer errors such as an
/// unknown resolution name or a zero reporting interval.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Resolution name or legacy code not recognized
    #[error("Unknown resolution: {0}")]
    UnknownResolution(String),

    /// Reporting interval must be a positive number of seconds
    #[error("Invalid reporting interval: {0}s")]
    InvalidInterval(u64),
}
