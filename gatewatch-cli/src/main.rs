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

//! Gatewatch CLI
//!
//! Replays recorded gateway metrics through the dashboard pipeline and
//! prints what the dashboard would show.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatewatch_core::{FilterMode, PeriodSummary, Resolution};
use gatewatch_dashboard::{
    ChartPoint, DashboardConfig, DashboardMonitor, MonitorStatus, Recording, ReplaySource, YBounds,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gatewatch")]
#[command(about = "Gatewatch - gateway service metrics dashboard", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded metrics, one refresh tick per input file
    Replay {
        /// Recording files (JSON), applied in order
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Only samples from this node
        #[arg(long)]
        node: Option<String>,

        /// Only samples for this service
        #[arg(long)]
        service: Option<i64>,

        /// Bucket resolution: fine, hourly or daily
        #[arg(long)]
        resolution: Option<Resolution>,

        /// Require both node and service to match
        #[arg(long)]
        strict_filter: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Serialize)]
struct ServiceRate {
    service_name: String,
    completed: u64,
    last_minute: i64,
}

#[derive(Serialize)]
struct ReplayReport {
    status: MonitorStatus,
    resolution: Resolution,
    chart: Vec<ChartPoint>,
    y_bounds: YBounds,
    latest: Option<PeriodSummary>,
    services: Vec<ServiceRate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = DashboardConfig::load(cli.config.clone()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Config => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }

        Commands::Replay {
            input,
            node,
            service,
            resolution,
            strict_filter,
        } => {
            if let Some(resolution) = resolution {
                config.resolution = resolution;
            }
            if strict_filter {
                config.filter_mode = FilterMode::AllOf;
            }
            let report = replay(&input, node.as_deref(), service, config).await?;
            print_report(&report, cli.json)?;
        }
    }

    Ok(())
}

async fn replay(
    inputs: &[PathBuf],
    node: Option<&str>,
    service: Option<i64>,
    config: DashboardConfig,
) -> Result<ReplayReport> {
    let mut monitor = DashboardMonitor::new(ReplaySource::default(), config)
        .context("Invalid dashboard configuration")?;
    monitor.set_selection(node, service);

    let mut newest_end: Option<i64> = None;
    for path in inputs {
        let recording = Recording::from_file(path)
            .with_context(|| format!("Failed to read recording {:?}", path))?;
        info!(
            "Replaying {:?}: {} samples, {} services",
            path,
            recording.samples.len(),
            recording.usage.len()
        );

        let end = recording.samples.iter().map(|s| s.nominal_period_end()).max();
        newest_end = newest_end.max(end);
        monitor.source().push_samples(recording.samples);
        monitor.source().set_usage(recording.usage);

        // Pretend the tick happens right after the newest recorded period.
        let now_ms = newest_end.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()) + 1;
        let status = monitor.refresh_at(now_ms).await;
        debug!(?status, now_ms, "replay tick");
    }

    let services = monitor
        .service_usage()
        .iter()
        .map(|usage| ServiceRate {
            service_name: usage.service_name.clone(),
            completed: usage.completed,
            last_minute: monitor.requests_last_minute(&usage.service_name),
        })
        .collect();

    Ok(ReplayReport {
        status: monitor.status().clone(),
        resolution: monitor.profile().resolution,
        chart: monitor.chart().points().copied().collect(),
        y_bounds: monitor.chart().y_bounds(),
        latest: monitor.latest_summary().cloned(),
        services,
    })
}

fn print_report(report: &ReplayReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match &report.status {
        MonitorStatus::Idle => println!("No refresh performed"),
        MonitorStatus::Updated { .. } => {
            println!("✓ {} periods at {} resolution", report.chart.len(), report.resolution);
        }
        MonitorStatus::MetricsDisabled => println!("✗ Metrics collection is disabled"),
        MonitorStatus::Failed { reason } => println!("✗ Refresh failed: {}", reason),
    }

    if !report.chart.is_empty() {
        println!();
        println!(
            "{:>15} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "start", "front avg", "back avg", "success/s", "policy/s", "routing/s"
        );
        for point in &report.chart {
            println!(
                "{:>15} {:>10.1} {:>10.1} {:>10.3} {:>10.3} {:>10.3}",
                point.period_start,
                point.frontend.avg,
                point.backend.avg,
                point.success_rate,
                point.policy_violation_rate,
                point.routing_failure_rate
            );
        }
        println!(
            "  y-axis: {:.1} ms, {:.4} msg/s",
            report.y_bounds.max_response_time, report.y_bounds.max_total_rate
        );
    }

    if let Some(latest) = &report.latest {
        let sample = &latest.sample;
        println!();
        println!("Latest period {}..{}:", sample.period_start, sample.period_end);
        println!(
            "  Attempted: {}, Authorized: {}, Completed: {}",
            sample.attempted, sample.authorized, sample.completed
        );
        println!(
            "  Response time: front {:.1} ms, back {:.1} ms",
            sample.average_frontend_response_time(),
            sample.average_backend_response_time()
        );
        let problems = latest.services_with_problems();
        if !problems.is_empty() {
            println!("  Services with problems: {:?}", problems);
        }
    }

    if !report.services.is_empty() {
        println!();
        println!("{:<30} {:>12} {:>12}", "service", "completed", "last minute");
        for service in &report.services {
            println!(
                "{:<30} {:>12} {:>12}",
                service.service_name, service.completed, service.last_minute
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_recording(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();
        file
    }

    #[test]
    fn test_cli_parses_replay() {
        let cli = Cli::try_parse_from([
            "gatewatch",
            "--json",
            "replay",
            "--input",
            "a.json",
            "b.json",
            "--service",
            "4",
            "--resolution",
            "hourly",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Replay {
                input,
                service,
                resolution,
                strict_filter,
                ..
            } => {
                assert_eq!(input.len(), 2);
                assert_eq!(service, Some(4));
                assert_eq!(resolution, Some(Resolution::Hourly));
                assert!(!strict_filter);
            }
            Commands::Config => panic!("expected replay"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_resolution() {
        assert!(Cli::try_parse_from(["gatewatch", "replay", "-i", "a.json", "--resolution", "weekly"]).is_err());
    }

    #[tokio::test]
    async fn test_replay_two_polls() {
        let first = write_recording(
            r#"{"samples": [{"period_start": 0, "period_end": 5000, "interval_ms": 5000,
                "resolution": "fine", "service_id": 1, "attempted": 4, "authorized": 4, "completed": 4}],
                "usage": [{"service_name": "echo", "attempted": 4, "authorized": 4, "completed": 4}]}"#,
        );
        let second = write_recording(
            r#"{"samples": [{"period_start": 5000, "period_end": 10000, "interval_ms": 5000,
                "resolution": "fine", "service_id": 1, "attempted": 6, "authorized": 5, "completed": 5}],
                "usage": [{"service_name": "echo", "attempted": 10, "authorized": 9, "completed": 9}]}"#,
        );

        let report = replay(
            &[first.path().to_path_buf(), second.path().to_path_buf()],
            None,
            None,
            DashboardConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.chart.len(), 2);
        assert_eq!(report.latest.as_ref().map(|l| l.sample.period_start), Some(5_000));
        assert_eq!(report.services[0].last_minute, 5);
        assert!(matches!(report.status, MonitorStatus::Updated { periods: 1, .. }));
    }
}
