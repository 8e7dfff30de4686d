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

//! Period aggregation of metrics samples
//!
//! Gateway nodes report one sample per service per interval. The dashboard
//! wants one value per period, so samples sharing a period are merged into a
//! "mega-sample":
//!
//! - counters and response-time sums add up
//! - response-time min/max narrow/widen over samples that carry data
//! - the period spans the earliest start to the latest valid end
//!
//! Merging never fails and never touches its inputs. Grouping by period is a
//! separate step ([`PeriodAggregator::group_by_period`]); [`combine`] merges
//! whatever it is handed.

use crate::filter::SampleFilter;
use crate::sample::{MetricsSample, Resolution, ResponseTimes};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Merge samples matching the node/service selectors into one sample.
///
/// Selectors use the legacy OR-chain semantics, see [`crate::FilterMode::AnyOf`].
pub fn combine(
    samples: &[MetricsSample],
    node_filter: Option<&str>,
    service_filter: Option<i64>,
) -> MetricsSample {
    combine_with(samples, &SampleFilter::new(node_filter, service_filter))
}

/// Merge samples matching an arbitrary filter
pub fn combine_with(samples: &[MetricsSample], filter: &SampleFilter) -> MetricsSample {
    merge(samples.iter().filter(|s| filter.matches(s)))
}

/// Mega-sample plus the services that had problems during the period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub sample: MetricsSample,
    pub services_with_routing_failure: BTreeSet<i64>,
    pub services_with_policy_violation: BTreeSet<i64>,
}

impl PeriodSummary {
    /// Services with at least one kind of problem
    pub fn services_with_problems(&self) -> BTreeSet<i64> {
        self.services_with_routing_failure
            .union(&self.services_with_policy_violation)
            .copied()
            .collect()
    }
}

/// Filters and merges samples under a fixed [`SampleFilter`]
#[derive(Debug, Clone, Default)]
pub struct PeriodAggregator {
    filter: SampleFilter,
}

impl PeriodAggregator {
    pub fn new(filter: SampleFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &SampleFilter {
        &self.filter
    }

    /// Merge all matching samples, regardless of their periods
    pub fn combine(&self, samples: &[MetricsSample]) -> MetricsSample {
        combine_with(samples, &self.filter)
    }

    /// Merge matching samples and collect services with problems
    pub fn summarize(&self, samples: &[MetricsSample]) -> PeriodSummary {
        let matching: Vec<&MetricsSample> =
            samples.iter().filter(|s| self.filter.matches(s)).collect();

        let mut summary = PeriodSummary {
            sample: merge(matching.iter().copied()),
            ..Default::default()
        };
        for sample in &matching {
            let Some(service_id) = sample.service_id else {
                continue;
            };
            if sample.num_routing_failure() > 0 {
                summary.services_with_routing_failure.insert(service_id);
            }
            if sample.num_policy_violation() > 0 {
                summary.services_with_policy_violation.insert(service_id);
            }
        }
        summary
    }

    /// One mega-sample per `(period_start, resolution)`, oldest first
    pub fn group_by_period(&self, samples: &[MetricsSample]) -> Vec<MetricsSample> {
        let mut groups: BTreeMap<(i64, Resolution), Vec<&MetricsSample>> = BTreeMap::new();
        for sample in samples.iter().filter(|s| self.filter.matches(s)) {
            groups
                .entry((sample.period_start, sample.resolution))
                .or_default()
                .push(sample);
        }

        tracing::trace!(
            samples = samples.len(),
            periods = groups.len(),
            "grouped metrics samples by period"
        );

        groups
            .into_values()
            .map(|group| merge(group.into_iter()))
            .collect()
    }
}

/// Running min/max where "never set" reports 0
#[derive(Debug, Default, Clone, Copy)]
struct Bounds {
    min: Option<u64>,
    max: Option<u64>,
}

impl Bounds {
    fn observe(&mut self, times: &ResponseTimes, completed: u64) {
        // A sample with nothing completed and zero bounds carries no data;
        // u64::MAX marks an unset bound on either side.
        if completed == 0 && times.min == 0 && times.max == 0 {
            return;
        }
        if times.min != u64::MAX {
            self.min = Some(self.min.map_or(times.min, |m| m.min(times.min)));
        }
        if times.max != u64::MAX {
            self.max = Some(self.max.map_or(times.max, |m| m.max(times.max)));
        }
    }

    fn into_times(self, sum: u64) -> ResponseTimes {
        ResponseTimes {
            min: self.min.unwrap_or(0),
            max: self.max.unwrap_or(0),
            sum,
        }
    }
}

fn merge<'a>(samples: impl Iterator<Item = &'a MetricsSample>) -> MetricsSample {
    let mut merged = MetricsSample::default();
    let mut start: Option<i64> = None;
    let mut end: Option<i64> = None;
    let mut frontend = Bounds::default();
    let mut backend = Bounds::default();
    let mut frontend_sum = 0u64;
    let mut backend_sum = 0u64;
    let mut first = true;
    let mut node_id: Option<String> = None;
    let mut service_id: Option<i64> = None;

    for sample in samples {
        if first {
            merged.resolution = sample.resolution;
            node_id = sample.node_id.clone();
            service_id = sample.service_id;
            first = false;
        } else {
            // Identity survives only while every sample agrees on it.
            if node_id != sample.node_id {
                node_id = None;
            }
            if service_id != sample.service_id {
                service_id = None;
            }
        }

        start = Some(start.map_or(sample.period_start, |s| s.min(sample.period_start)));
        if sample.period_end >= sample.period_start {
            end = Some(end.map_or(sample.period_end, |e| e.max(sample.period_end)));
        }
        merged.interval_ms = merged.interval_ms.max(sample.interval_ms);

        merged.attempted = merged.attempted.saturating_add(sample.attempted);
        merged.authorized = merged.authorized.saturating_add(sample.authorized);
        merged.completed = merged.completed.saturating_add(sample.completed);
        frontend_sum = frontend_sum.saturating_add(sample.frontend.sum);
        backend_sum = backend_sum.saturating_add(sample.backend.sum);

        frontend.observe(&sample.frontend, sample.completed);
        backend.observe(&sample.backend, sample.completed);
    }

    merged.period_start = start.unwrap_or(0);
    merged.period_end = end.unwrap_or(merged.period_start);
    merged.node_id = node_id;
    merged.service_id = service_id;
    merged.frontend = frontend.into_times(frontend_sum);
    merged.backend = backend.into_times(backend_sum);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterMode;

    fn fine(start: i64) -> MetricsSample {
        MetricsSample::new(start, 5000, Resolution::Fine)
    }

    #[test]
    fn test_combine_empty() {
        let merged = combine(&[], Some("node-1"), Some(3));
        assert_eq!(merged.period_start, 0);
        assert_eq!(merged.period_end, 0);
        assert_eq!(merged.attempted, 0);
        assert_eq!(merged.completed, 0);
        assert_eq!(merged.frontend, ResponseTimes::default());
        assert_eq!(merged.backend, ResponseTimes::default());
    }

    #[test]
    fn test_combine_adds_counters() {
        let a = fine(0)
            .with_counts(10, 9, 8)
            .with_frontend(5, 100, 400)
            .with_backend(2, 80, 300);
        let b = fine(0)
            .with_counts(4, 3, 2)
            .with_frontend(3, 50, 60)
            .with_backend(1, 90, 70);

        let merged = combine(&[a, b], None, None);
        assert_eq!(merged.attempted, 14);
        assert_eq!(merged.authorized, 12);
        assert_eq!(merged.completed, 10);
        assert_eq!(merged.frontend, ResponseTimes::new(3, 100, 460));
        assert_eq!(merged.backend, ResponseTimes::new(1, 90, 370));
    }

    #[test]
    fn test_samples_without_data_do_not_drag_min_to_zero() {
        let idle = fine(0);
        let busy = fine(0).with_counts(2, 2, 2).with_frontend(40, 60, 100);

        let merged = combine(&[idle, busy], None, None);
        assert_eq!(merged.frontend.min, 40);
        assert_eq!(merged.frontend.max, 60);
        assert_eq!(merged.backend, ResponseTimes::default());
    }

    #[test]
    fn test_unset_min_sentinel_is_ignored() {
        let unset = fine(0).with_counts(1, 1, 0).with_frontend(u64::MAX, 0, 0);
        let merged = combine(&[unset], None, None);
        assert_eq!(merged.frontend.min, 0);
        assert_eq!(merged.frontend.max, 0);
    }

    #[test]
    fn test_unset_max_sentinel_is_ignored() {
        let unset = fine(0).with_counts(1, 1, 1).with_frontend(7, u64::MAX, 7);
        let busy = fine(0).with_counts(1, 1, 1).with_frontend(9, 30, 30);
        let merged = combine(&[unset, busy], None, None);
        assert_eq!(merged.frontend.min, 7);
        assert_eq!(merged.frontend.max, 30);
    }

    #[test]
    fn test_counters_saturate_instead_of_overflowing() {
        let huge = fine(0)
            .with_counts(u64::MAX, u64::MAX - 1, u64::MAX - 2)
            .with_frontend(1, 2, u64::MAX)
            .with_backend(1, 2, u64::MAX);
        let small = fine(0).with_counts(5, 5, 5).with_frontend(1, 2, 10).with_backend(1, 2, 10);

        let merged = combine(&[huge, small], None, None);
        assert_eq!(merged.attempted, u64::MAX);
        assert_eq!(merged.authorized, u64::MAX);
        assert_eq!(merged.completed, u64::MAX);
        assert_eq!(merged.frontend.sum, u64::MAX);
        assert_eq!(merged.backend.sum, u64::MAX);
    }

    #[test]
    fn test_period_bounds() {
        let a = fine(10_000).with_period_end(14_900);
        let b = fine(5_000).with_period_end(9_950);
        let merged = combine(&[a, b], None, None);
        assert_eq!(merged.period_start, 5_000);
        assert_eq!(merged.period_end, 14_900);
    }

    #[test]
    fn test_end_defaults_to_start_without_valid_end() {
        let broken = fine(8_000).with_period_end(1_000);
        let merged = combine(&[broken], None, None);
        assert_eq!(merged.period_start, 8_000);
        assert_eq!(merged.period_end, 8_000);
    }

    #[test]
    fn test_identity_kept_only_when_shared() {
        let a = fine(0).with_node("n1").with_service(4);
        let b = fine(0).with_node("n1").with_service(5);
        let merged = combine(&[a, b], None, None);
        assert_eq!(merged.node_id.as_deref(), Some("n1"));
        assert_eq!(merged.service_id, None);
    }

    #[test]
    fn test_strict_filter_excludes_mismatches() {
        let a = fine(0).with_node("n1").with_service(4).with_counts(1, 1, 1);
        let b = fine(0).with_node("n2").with_service(4).with_counts(5, 5, 5);
        let aggregator = PeriodAggregator::new(
            SampleFilter::new(Some("n1"), Some(4)).with_mode(FilterMode::AllOf),
        );
        assert_eq!(aggregator.combine(&[a.clone(), b.clone()]).attempted, 1);
        assert_eq!(combine_with(&[a.clone(), b.clone()], aggregator.filter()).attempted, 1);

        // The legacy chain lets n2 through on the service clause.
        assert_eq!(combine(&[a, b], Some("n1"), Some(4)).attempted, 6);
    }

    #[test]
    fn test_group_by_period_orders_and_merges() {
        let samples = vec![
            fine(10_000).with_counts(1, 1, 1),
            fine(0).with_counts(2, 2, 2),
            fine(10_000).with_counts(3, 3, 3),
            MetricsSample::new(0, 3_600_000, Resolution::Hourly).with_counts(7, 7, 7),
        ];
        let periods = PeriodAggregator::default().group_by_period(&samples);

        assert_eq!(periods.len(), 3);
        assert_eq!((periods[0].period_start, periods[0].resolution), (0, Resolution::Fine));
        assert_eq!(periods[0].completed, 2);
        assert_eq!(periods[1].resolution, Resolution::Hourly);
        assert_eq!(periods[2].period_start, 10_000);
        assert_eq!(periods[2].completed, 4);
    }

    #[test]
    fn test_summarize_collects_problem_services() {
        let samples = vec![
            fine(0).with_service(1).with_counts(5, 5, 5),
            fine(0).with_service(2).with_counts(5, 4, 4),
            fine(0).with_service(3).with_counts(5, 5, 3),
            fine(0).with_service(4).with_counts(5, 4, 3),
            fine(0).with_counts(9, 1, 0),
        ];
        let summary = PeriodAggregator::default().summarize(&samples);

        assert_eq!(summary.sample.attempted, 29);
        assert_eq!(
            summary.services_with_policy_violation,
            BTreeSet::from([2, 4])
        );
        assert_eq!(summary.services_with_routing_failure, BTreeSet::from([3, 4]));
        assert_eq!(summary.services_with_problems(), BTreeSet::from([2, 3, 4]));
    }
}
