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

//! Time-bounded chart series for the live metrics chart
//!
//! Each point is one aggregated period: response-time stats for the front
//! and back end, plus message rates split into success, policy violation and
//! routing failure. A point is dropped once its period ended more than
//! `max_time_range` ms before the newest period end.
//!
//! ## Update suspension
//!
//! While the user is inspecting the chart, updates can be suspended. Incoming
//! points are parked in a pending buffer (pruned to the same time range) and
//! flushed in period order on [`ChartSeriesWindow::resume`].

use gatewatch_core::MetricsSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Smallest y-axis extent for response times (ms)
pub const MIN_RESPONSE_AXIS: f64 = 1.0;

/// Smallest y-axis extent for message rates; one message per day stays visible
pub const MIN_RATE_AXIS: f64 = 0.0001;

/// Average / min / max response time of one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// One aggregated period on the chart
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub period_start: i64,
    pub period_end: i64,
    pub frontend: ResponseTimeStats,
    pub backend: ResponseTimeStats,
    /// Completed messages per second
    pub success_rate: f64,
    /// Attempted but unauthorized messages per second
    pub policy_violation_rate: f64,
    /// Authorized but not completed messages per second
    pub routing_failure_rate: f64,
}

impl ChartPoint {
    /// Point for a mega-sample, using its nominal period and nominal rates so
    /// bars line up without gaps
    pub fn from_sample(sample: &MetricsSample) -> Self {
        Self {
            period_start: sample.period_start,
            period_end: sample.nominal_period_end(),
            frontend: ResponseTimeStats {
                avg: sample.average_frontend_response_time(),
                min: sample.frontend.min as f64,
                max: sample.frontend.max as f64,
            },
            backend: ResponseTimeStats {
                avg: sample.average_backend_response_time(),
                min: sample.backend.min as f64,
                max: sample.backend.max as f64,
            },
            success_rate: sample.nominal_completed_rate(),
            policy_violation_rate: sample.nominal_attempted_rate()
                - sample.nominal_authorized_rate(),
            routing_failure_rate: sample.nominal_authorized_rate()
                - sample.nominal_completed_rate(),
        }
    }

    pub fn total_rate(&self) -> f64 {
        self.success_rate + self.policy_violation_rate + self.routing_failure_rate
    }

    pub fn contains(&self, time_ms: i64) -> bool {
        self.period_start <= time_ms && time_ms < self.period_end
    }
}

/// Change notification for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesChange {
    Appended { count: usize },
    Evicted { count: usize },
    Cleared,
}

/// Callback invoked after each mutation
pub type ChangeListener = Box<dyn FnMut(&SeriesChange) + Send>;

/// Y-axis upper bounds for the response-time and message-rate plots
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YBounds {
    pub max_response_time: f64,
    pub max_total_rate: f64,
}

/// Capped-duration sequence of chart points
pub struct ChartSeriesWindow {
    points: VecDeque<ChartPoint>,
    max_time_range: i64,
    max_period_end: Option<i64>,
    suspended: bool,
    pending: Vec<ChartPoint>,
    listener: Option<ChangeListener>,
}

impl fmt::Debug for ChartSeriesWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartSeriesWindow")
            .field("points", &self.points.len())
            .field("max_time_range", &self.max_time_range)
            .field("max_period_end", &self.max_period_end)
            .field("suspended", &self.suspended)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ChartSeriesWindow {
    pub fn new(max_time_range: i64) -> Self {
        Self {
            points: VecDeque::new(),
            max_time_range,
            max_period_end: None,
            suspended: false,
            pending: Vec::new(),
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    pub fn max_time_range(&self) -> i64 {
        self.max_time_range
    }

    /// Change the retention horizon, evicting immediately if it shrank
    pub fn set_max_time_range(&mut self, max_time_range: i64) {
        self.max_time_range = max_time_range;
        self.evict_and_notify();
    }

    /// Append one period's values at the tail
    #[allow(clippy::too_many_arguments)]
    pub fn add_sample(
        &mut self,
        period_start: i64,
        period_end: i64,
        frontend_avg: f64,
        frontend_min: f64,
        frontend_max: f64,
        backend_avg: f64,
        backend_min: f64,
        backend_max: f64,
        success_rate: f64,
        policy_violation_rate: f64,
        routing_failure_rate: f64,
    ) {
        self.add_point(ChartPoint {
            period_start,
            period_end,
            frontend: ResponseTimeStats {
                avg: frontend_avg,
                min: frontend_min,
                max: frontend_max,
            },
            backend: ResponseTimeStats {
                avg: backend_avg,
                min: backend_min,
                max: backend_max,
            },
            success_rate,
            policy_violation_rate,
            routing_failure_rate,
        });
    }

    pub fn add_point(&mut self, point: ChartPoint) {
        self.add_points(std::iter::once(point));
    }

    /// Append one point per mega-sample
    pub fn add_samples(&mut self, samples: &[MetricsSample]) {
        self.add_points(samples.iter().map(ChartPoint::from_sample));
    }

    pub fn add_points<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = ChartPoint>,
    {
        if self.suspended {
            self.pending.extend(points);
            self.prune_pending();
            return;
        }

        let mut appended = 0;
        for point in points {
            self.max_period_end = Some(
                self.max_period_end
                    .map_or(point.period_end, |end| end.max(point.period_end)),
            );
            self.points.push_back(point);
            appended += 1;
        }
        if appended == 0 {
            return;
        }

        self.notify(SeriesChange::Appended { count: appended });
        self.evict_and_notify();
    }

    /// Remove all points; later additions start from a clean slate
    pub fn clear(&mut self) {
        self.points.clear();
        self.pending.clear();
        self.max_period_end = None;
        self.notify(SeriesChange::Cleared);
    }

    /// Park incoming points instead of displaying them
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Flush parked points and resume live updates
    pub fn resume(&mut self) {
        self.suspended = false;
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|p| p.period_start);
        self.add_points(pending);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&ChartPoint> {
        self.points.front()
    }

    pub fn last(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    pub fn max_period_end(&self) -> Option<i64> {
        self.max_period_end
    }

    /// From the oldest retained start to the newest end
    pub fn span_ms(&self) -> i64 {
        match (self.points.iter().map(|p| p.period_start).min(), self.max_period_end) {
            (Some(start), Some(end)) => end - start,
            _ => 0,
        }
    }

    /// Point whose period contains `time_ms`, for chart selection
    pub fn point_at(&self, time_ms: i64) -> Option<&ChartPoint> {
        self.points.iter().find(|p| p.contains(time_ms))
    }

    pub fn y_bounds(&self) -> YBounds {
        let max_response_time = self
            .points
            .iter()
            .map(|p| p.frontend.max.max(p.backend.max))
            .fold(0.0, f64::max);
        let max_total_rate = self
            .points
            .iter()
            .map(ChartPoint::total_rate)
            .fold(0.0, f64::max);

        YBounds {
            max_response_time: max_response_time.max(MIN_RESPONSE_AXIS),
            max_total_rate: max_total_rate.max(MIN_RATE_AXIS),
        }
    }

    fn evict_and_notify(&mut self) {
        let evicted = self.evict();
        if evicted > 0 {
            tracing::debug!(
                evicted,
                retained = self.points.len(),
                "evicted chart points older than time range"
            );
            self.notify(SeriesChange::Evicted { count: evicted });
        }
    }

    /// Drop points that ended before the window; the newest point always stays
    fn evict(&mut self) -> usize {
        let Some(upper) = self.max_period_end else {
            return 0;
        };
        let lower = upper - self.max_time_range;
        let before = self.points.len();
        self.points.retain(|p| p.period_end >= lower);
        before - self.points.len()
    }

    /// Parked points are pruned by period start, unlike the live series
    fn prune_pending(&mut self) {
        let Some(upper) = self.pending.iter().map(|p| p.period_end).max() else {
            return;
        };
        let lower = upper - self.max_time_range;
        self.pending.retain(|p| p.period_start >= lower);
    }

    fn notify(&mut self, change: SeriesChange) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&change);
        }
    }
}
