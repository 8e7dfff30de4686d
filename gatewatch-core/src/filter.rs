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

//! Node / service selection for aggregation

use crate::sample::MetricsSample;
use serde::{Deserialize, Serialize};

/// How the node and service selectors combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// A sample is kept if any clause of
    /// `no node filter || node matches || no service filter || service matches`
    /// holds. This is what the gateway console has always done, so it stays
    /// the default even though it keeps almost everything once either
    /// selector is unset.
    #[default]
    AnyOf,
    /// Both selectors must match (an unset selector matches everything).
    AllOf,
}

/// Optional node and service selectors applied before merging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFilter {
    pub node_id: Option<String>,
    pub service_id: Option<i64>,
    #[serde(default)]
    pub mode: FilterMode,
}

impl SampleFilter {
    /// Filter that keeps every sample
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(node_id: Option<&str>, service_id: Option<i64>) -> Self {
        Self {
            node_id: node_id.map(str::to_string),
            service_id,
            mode: FilterMode::AnyOf,
        }
    }

    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn matches(&self, sample: &MetricsSample) -> bool {
        let node_unset = self.node_id.is_none();
        let node_hit = self.node_id.is_some() && sample.node_id == self.node_id;
        let service_unset = self.service_id.is_none();
        let service_hit = self.service_id.is_some() && sample.service_id == self.service_id;

        match self.mode {
            FilterMode::AnyOf => node_unset || node_hit || service_unset || service_hit,
            FilterMode::AllOf => (node_unset || node_hit) && (service_unset || service_hit),
        }
    }
}
