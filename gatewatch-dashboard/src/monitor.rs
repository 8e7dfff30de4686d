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

//! Timer-driven dashboard refresh
//!
//! Each tick downloads new samples since the last period seen, merges them
//! per period under the current node/service selection, and feeds the chart
//! window, the "latest" summary and the per-service rate cache.
//!
//! All remote calls of a tick complete before any state is touched, so a
//! failed tick leaves the previous state exactly as it was.

use crate::chart_series::ChartSeriesWindow;
use crate::config::DashboardConfig;
use crate::error::DashboardResult;
use crate::profile::ResolutionProfile;
use crate::rate_cache::RollingRateCache;
use crate::source::{AdminError, MetricsSource, ServiceUsage};
use chrono::{DateTime, Utc};
use gatewatch_core::{MetricsSample, PeriodAggregator, PeriodSummary, Resolution, SampleFilter};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of the most recent refresh, for the status line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MonitorStatus {
    /// No refresh attempted yet
    Idle,
    Updated { at: DateTime<Utc>, periods: usize },
    /// Metrics collection is turned off at the gateway
    MetricsDisabled,
    Failed { reason: String },
}

/// Owns the aggregation state behind one dashboard view
pub struct DashboardMonitor<S: MetricsSource> {
    source: S,
    config: DashboardConfig,
    profile: ResolutionProfile,
    aggregator: PeriodAggregator,
    chart: ChartSeriesWindow,
    rates: RollingRateCache,
    latest_period_start: Option<i64>,
    latest: Option<PeriodSummary>,
    usage: Vec<ServiceUsage>,
    status: MonitorStatus,
    connected: bool,
}

/// Everything one tick downloads, applied only once complete
struct TickData {
    samples: Vec<MetricsSample>,
    /// Finer-grained samples behind the latest summary at hourly/daily resolution
    latest_window: Option<Vec<MetricsSample>>,
    usage: Vec<ServiceUsage>,
}

impl<S: MetricsSource> DashboardMonitor<S> {
    pub fn new(source: S, config: DashboardConfig) -> DashboardResult<Self> {
        config.validate()?;
        let profile = ResolutionProfile::for_resolution(config.resolution, &config);
        let rates = RollingRateCache::new(config.rate_interval_secs)?;
        let aggregator =
            PeriodAggregator::new(SampleFilter::all().with_mode(config.filter_mode));

        Ok(Self {
            source,
            profile,
            aggregator,
            chart: ChartSeriesWindow::new(profile.chart_time_range_ms),
            rates,
            latest_period_start: None,
            latest: None,
            usage: Vec::new(),
            status: MonitorStatus::Idle,
            connected: true,
            config,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn profile(&self) -> &ResolutionProfile {
        &self.profile
    }

    pub fn selection(&self) -> &SampleFilter {
        self.aggregator.filter()
    }

    pub fn chart(&self) -> &ChartSeriesWindow {
        &self.chart
    }

    /// Mutable chart access for suspension and change listeners
    pub fn chart_mut(&mut self) -> &mut ChartSeriesWindow {
        &mut self.chart
    }

    pub fn rates(&self) -> &RollingRateCache {
        &self.rates
    }

    /// Summary of the newest downloaded period
    pub fn latest_summary(&self) -> Option<&PeriodSummary> {
        self.latest.as_ref()
    }

    pub fn latest_period_start(&self) -> Option<i64> {
        self.latest_period_start
    }

    pub fn service_usage(&self) -> &[ServiceUsage] {
        &self.usage
    }

    pub fn status(&self) -> &MonitorStatus {
        &self.status
    }

    /// Completed requests for `service_name` over roughly the last minute
    pub fn requests_last_minute(&self, service_name: &str) -> i64 {
        self.rates.windowed_delta(service_name)
    }

    /// Switch resolution; the chart cannot keep data across resolutions
    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.profile = ResolutionProfile::for_resolution(resolution, &self.config);
        self.reset();
    }

    /// Select a node and/or service; `None` means all
    pub fn set_selection(&mut self, node_id: Option<&str>, service_id: Option<i64>) {
        self.aggregator = PeriodAggregator::new(
            SampleFilter::new(node_id, service_id).with_mode(self.config.filter_mode),
        );
        self.reset();
    }

    fn reset(&mut self) {
        self.chart.clear();
        self.chart.set_max_time_range(self.profile.chart_time_range_ms);
        self.latest_period_start = None;
        self.latest = None;
    }

    /// One timer tick at the current wall-clock time
    pub async fn refresh(&mut self) -> &MonitorStatus {
        let now_ms = Utc::now().timestamp_millis();
        self.refresh_at(now_ms).await
    }

    /// One timer tick, with `now_ms` deciding the initial download window
    pub async fn refresh_at(&mut self, now_ms: i64) -> &MonitorStatus {
        match self.download(now_ms).await {
            Ok(None) => {
                self.status = MonitorStatus::MetricsDisabled;
            }
            Ok(Some(data)) => {
                let periods = self.apply(data);
                self.status = MonitorStatus::Updated {
                    at: Utc::now(),
                    periods,
                };
                if !self.connected {
                    info!("Reconnected to gateway");
                }
                self.connected = true;
            }
            Err(error) => {
                warn!(error = %error, "Unable to get dashboard data");
                self.status = MonitorStatus::Failed {
                    reason: error.to_string(),
                };
                self.connected = false;
            }
        }
        &self.status
    }

    async fn download(&self, now_ms: i64) -> Result<Option<TickData>, AdminError> {
        if !self.source.is_metrics_enabled().await? {
            // Nothing to show while collection is off at the gateway.
            return Ok(None);
        }

        let since = match self.latest_period_start {
            Some(start) => start + 1,
            None => self.profile.initial_since(now_ms),
        };
        let filter = self.aggregator.filter();
        let samples = self
            .source
            .fetch_metrics_since(
                filter.node_id.as_deref(),
                filter.service_id,
                since,
                self.profile.resolution,
            )
            .await?;

        let latest_window = match self.profile.latest_summary_window() {
            Some((resolution, span_ms)) => Some(
                self.source
                    .fetch_metrics_since(
                        filter.node_id.as_deref(),
                        filter.service_id,
                        now_ms - span_ms,
                        resolution,
                    )
                    .await?
                    .into_iter()
                    .filter(|s| s.resolution == resolution)
                    .collect(),
            ),
            None => None,
        };
        let usage = self.source.fetch_service_usage().await?;

        Ok(Some(TickData {
            samples,
            latest_window,
            usage,
        }))
    }

    fn apply(&mut self, data: TickData) -> usize {
        let resolution = self.profile.resolution;
        let periods: Vec<MetricsSample> = self
            .aggregator
            .group_by_period(&data.samples)
            .into_iter()
            .filter(|p| p.resolution == resolution)
            .collect();

        if let Some(newest) = periods.last() {
            let newest_start = newest.period_start;
            if self.latest_period_start.map_or(true, |s| s < newest_start) {
                if data.latest_window.is_none() {
                    let in_period: Vec<MetricsSample> = data
                        .samples
                        .iter()
                        .filter(|s| s.period_start == newest_start && s.resolution == resolution)
                        .cloned()
                        .collect();
                    self.latest = Some(self.aggregator.summarize(&in_period));
                }
                self.latest_period_start = Some(newest_start);
            }
            debug!(
                periods = periods.len(),
                resolution = %resolution,
                latest = newest_start,
                "downloaded metrics periods"
            );
            self.chart.add_samples(&periods);
        }

        // At hourly and daily resolution the summary covers the last bin span
        // of finer bins, refreshed every tick.
        if let Some(window) = &data.latest_window {
            self.latest = Some(self.aggregator.summarize(window));
        }

        let names: HashSet<&str> = data.usage.iter().map(|u| u.service_name.as_str()).collect();
        self.rates.retain_keys(|key| names.contains(key));
        for usage in &data.usage {
            self.rates.record(&usage.service_name, usage.completed as i64);
        }
        self.usage = data.usage;

        periods.len()
    }

    /// Refresh on every tick until `cancel` fires. Ticks never overlap.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.refresh_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("dashboard refresh loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::HOUR_MS;
    use crate::source::ReplaySource;
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    const NOW: i64 = 10_000_000;

    fn sample(start: i64, service: i64, completed: u64) -> MetricsSample {
        MetricsSample::new(start, 5_000, Resolution::Fine)
            .with_node("gw-1")
            .with_service(service)
            .with_counts(completed + 2, completed + 1, completed)
            .with_frontend(10, 30, completed * 20)
    }

    /// Serves every stored sample regardless of the requested resolution
    struct UnfilteredSource(Vec<MetricsSample>);

    #[async_trait]
    impl MetricsSource for UnfilteredSource {
        async fn is_metrics_enabled(&self) -> Result<bool, AdminError> {
            Ok(true)
        }

        async fn fetch_metrics_since(
            &self,
            _node_id: Option<&str>,
            _service_id: Option<i64>,
            since_ms: i64,
            _resolution: Resolution,
        ) -> Result<Vec<MetricsSample>, AdminError> {
            Ok(self
                .0
                .iter()
                .filter(|s| s.period_start >= since_ms)
                .cloned()
                .collect())
        }

        async fn fetch_service_usage(&self) -> Result<Vec<ServiceUsage>, AdminError> {
            Ok(Vec::new())
        }
    }

    fn monitor() -> DashboardMonitor<ReplaySource> {
        DashboardMonitor::new(ReplaySource::default(), DashboardConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_first_refresh_downloads_chart_range() {
        let mut monitor = monitor();
        monitor.source().push_samples([
            // Older than one chart range plus one bin: never requested.
            sample(NOW - 700_000, 1, 1),
            sample(NOW - 10_000, 1, 4),
            sample(NOW - 10_000, 2, 6),
            sample(NOW - 5_000, 1, 2),
        ]);

        let status = monitor.refresh_at(NOW).await.clone();
        assert!(matches!(status, MonitorStatus::Updated { periods: 2, .. }));
        assert_eq!(monitor.chart().len(), 2);
        assert_eq!(monitor.latest_period_start(), Some(NOW - 5_000));

        let latest = monitor.latest_summary().unwrap();
        assert_eq!(latest.sample.completed, 2);
        assert_eq!(latest.services_with_policy_violation, BTreeSet::from([1]));
    }

    #[tokio::test]
    async fn test_incremental_refresh_only_adds_new_periods() {
        let mut monitor = monitor();
        monitor.source().push_samples([sample(NOW - 5_000, 1, 1)]);
        monitor.refresh_at(NOW).await;

        monitor.source().push_samples([sample(NOW, 1, 3)]);
        let status = monitor.refresh_at(NOW + 5_000).await.clone();
        assert!(matches!(status, MonitorStatus::Updated { periods: 1, .. }));
        assert_eq!(monitor.chart().len(), 2);
        assert_eq!(monitor.latest_summary().unwrap().sample.completed, 3);
    }

    #[tokio::test]
    async fn test_failure_retains_state() {
        let mut monitor = monitor();
        monitor.source().push_samples([sample(NOW - 5_000, 1, 1)]);
        monitor.refresh_at(NOW).await;
        let before = monitor.latest_summary().cloned();

        monitor
            .source()
            .fail_with(AdminError::Connectivity("connection refused".into()));
        monitor.source().push_samples([sample(NOW, 1, 9)]);
        let status = monitor.refresh_at(NOW + 5_000).await.clone();

        assert!(matches!(status, MonitorStatus::Failed { .. }));
        assert_eq!(monitor.chart().len(), 1);
        assert_eq!(monitor.latest_summary().cloned(), before);

        monitor.source().recover();
        monitor.refresh_at(NOW + 5_000).await;
        assert_eq!(monitor.chart().len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_metrics_skip_refresh() {
        let mut monitor = monitor();
        monitor.source().push_samples([sample(NOW - 5_000, 1, 1)]);
        monitor.source().set_enabled(false);

        assert_eq!(monitor.refresh_at(NOW).await, &MonitorStatus::MetricsDisabled);
        assert!(monitor.chart().is_empty());
        assert_eq!(monitor.latest_period_start(), None);
    }

    #[tokio::test]
    async fn test_usage_feeds_rate_cache() {
        let mut monitor = monitor();
        for completed in [100, 130, 175] {
            monitor.source().set_usage(vec![ServiceUsage {
                service_name: "warehouse".into(),
                completed,
                ..Default::default()
            }]);
            monitor.refresh_at(NOW).await;
        }
        assert_eq!(monitor.requests_last_minute("warehouse"), 75);

        // Services that disappear are forgotten.
        monitor.source().set_usage(Vec::new());
        monitor.refresh_at(NOW).await;
        assert_eq!(monitor.requests_last_minute("warehouse"), 0);
        assert!(monitor.rates().is_empty());
    }

    #[tokio::test]
    async fn test_selection_resets_and_filters() {
        let mut monitor = monitor();
        monitor.source().push_samples([
            sample(NOW - 5_000, 1, 1),
            sample(NOW - 5_000, 2, 10).with_node("gw-2"),
        ]);
        monitor.refresh_at(NOW).await;
        assert_eq!(monitor.latest_summary().unwrap().sample.completed, 11);

        monitor.set_selection(Some("gw-2"), Some(2));
        assert!(monitor.chart().is_empty());
        assert_eq!(monitor.latest_period_start(), None);

        // Legacy selector: gw-1/service 1 matches neither clause and drops out.
        monitor.refresh_at(NOW).await;
        assert_eq!(monitor.latest_summary().unwrap().sample.completed, 10);
    }

    #[tokio::test]
    async fn test_resolution_switch_changes_range() {
        let mut monitor = monitor();
        monitor.source().push_samples([sample(NOW - 5_000, 1, 1)]);
        monitor.refresh_at(NOW).await;

        monitor.set_resolution(Resolution::Hourly);
        assert!(monitor.chart().is_empty());
        assert_eq!(monitor.chart().max_time_range(), 60 * 60 * 60 * 1000);

        monitor.refresh_at(NOW).await;
        assert!(monitor.chart().is_empty());
    }

    #[tokio::test]
    async fn test_hourly_summary_collates_fine_bins() {
        let config = DashboardConfig {
            resolution: Resolution::Hourly,
            ..Default::default()
        };
        let mut monitor = DashboardMonitor::new(ReplaySource::default(), config).unwrap();
        monitor.source().push_samples([
            MetricsSample::new(HOUR_MS, HOUR_MS, Resolution::Hourly).with_counts(100, 100, 100),
            // Older than one hour: outside the summary.
            sample(NOW - 2 * HOUR_MS, 1, 50),
            sample(NOW - 10_000, 1, 4),
            sample(NOW - 5_000, 2, 6),
        ]);

        monitor.refresh_at(NOW).await;
        assert_eq!(monitor.chart().len(), 1);
        assert_eq!(monitor.latest_period_start(), Some(HOUR_MS));

        let latest = monitor.latest_summary().unwrap();
        assert_eq!(latest.sample.resolution, Resolution::Fine);
        assert_eq!(latest.sample.completed, 10);
        assert_eq!(latest.services_with_routing_failure, BTreeSet::from([1, 2]));

        // The summary follows new fine bins even without a new hourly bin.
        monitor.source().push_samples([sample(NOW, 1, 5)]);
        monitor.refresh_at(NOW + 5_000).await;
        assert_eq!(monitor.chart().len(), 1);
        assert_eq!(monitor.latest_summary().unwrap().sample.completed, 15);
    }

    #[tokio::test]
    async fn test_latest_summary_ignores_other_resolutions() {
        let source = UnfilteredSource(vec![
            sample(NOW - 5_000, 1, 2),
            MetricsSample::new(NOW - 5_000, HOUR_MS, Resolution::Hourly).with_counts(100, 100, 100),
        ]);
        let mut monitor = DashboardMonitor::new(source, DashboardConfig::default()).unwrap();

        monitor.refresh_at(NOW).await;
        assert_eq!(monitor.chart().len(), 1);
        let latest = monitor.latest_summary().unwrap();
        assert_eq!(latest.sample.completed, 2);
        assert_eq!(latest.sample.resolution, Resolution::Fine);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let config = DashboardConfig {
            refresh_interval_ms: 10,
            ..Default::default()
        };
        let mut monitor = DashboardMonitor::new(ReplaySource::default(), config).unwrap();
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        monitor.run(cancel).await;
        assert!(matches!(monitor.status(), MonitorStatus::Updated { .. }));
    }
}
