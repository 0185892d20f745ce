//! Statistics polling loop
//!
//! Fetches port statistics and appends them to the run's log on a fixed
//! interval. The stop signal is checked at the top of every tick; a fetch or
//! record already in progress always runs to completion.

use super::{MonitorPhase, MonitorState, StopSignal};
use crate::fetcher::{StatsSource, DEFAULT_SWITCH_ID};
use crate::models::FetchOutcome;
use crate::observability::{HarnessMetrics, StructuredLogger};
use crate::params::RunContext;
use crate::recorder::{ArtifactHandle, RecordError, StatsRecorder};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between ticks (default: 5 seconds)
    pub interval: Duration,
    /// Switch whose ports are sampled
    pub switch_id: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            switch_id: DEFAULT_SWITCH_ID.to_string(),
        }
    }
}

/// What a finished loop leaves behind
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSummary {
    pub ticks: u64,
    pub unavailable_ticks: u64,
    pub artifact: Option<ArtifactHandle>,
}

/// Polling loop feeding the statistics log
pub struct StatsMonitor {
    source: Arc<dyn StatsSource>,
    recorder: StatsRecorder,
    run: RunContext,
    config: MonitorConfig,
    state: Arc<MonitorState>,
    metrics: HarnessMetrics,
    logger: StructuredLogger,
}

impl StatsMonitor {
    pub fn new(
        source: Arc<dyn StatsSource>,
        run: RunContext,
        config: MonitorConfig,
        state: Arc<MonitorState>,
    ) -> Self {
        let logger = StructuredLogger::new(run.params.dir_name());
        Self {
            source,
            recorder: StatsRecorder::new(),
            run,
            config,
            state,
            metrics: HarnessMetrics::new(),
            logger,
        }
    }

    pub fn state(&self) -> Arc<MonitorState> {
        self.state.clone()
    }

    /// Run the loop on its own task
    pub fn spawn(self, stop: StopSignal) -> JoinHandle<Result<MonitorSummary, RecordError>> {
        tokio::spawn(self.run(stop))
    }

    /// Poll until `stop` fires or the log cannot be written
    pub async fn run(self, mut stop: StopSignal) -> Result<MonitorSummary, RecordError> {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            switch_id = %self.config.switch_id,
            "Starting SDN statistics monitor"
        );
        self.state.set_phase(MonitorPhase::Running);

        let mut ticker = interval(self.config.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = MonitorSummary {
            ticks: 0,
            unavailable_ticks: 0,
            artifact: None,
        };

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.stopped() => {}
            }

            if stop.is_stopped() {
                break;
            }

            match self.tick(summary.artifact.take()).await {
                Ok((handle, available)) => {
                    summary.ticks += 1;
                    if !available {
                        summary.unavailable_ticks += 1;
                    }
                    summary.artifact = Some(handle);
                }
                Err(e) => {
                    error!(error = %e, "Statistics log write failed, stopping monitor");
                    self.metrics.inc_record_errors();
                    self.state.set_phase(MonitorPhase::Failed);
                    return Err(e);
                }
            }
        }

        info!(
            ticks = summary.ticks,
            unavailable_ticks = summary.unavailable_ticks,
            "Shutting down SDN statistics monitor"
        );
        self.state.set_phase(MonitorPhase::Stopped);
        Ok(summary)
    }

    /// One fetch and record; returns the handle and whether stats were available
    async fn tick(&self, artifact: Option<ArtifactHandle>) -> Result<(ArtifactHandle, bool), RecordError> {
        let start = Instant::now();
        let outcome = self.source.fetch(&self.config.switch_id).await;
        let elapsed = start.elapsed();
        self.metrics.observe_fetch_latency(elapsed.as_secs_f64());

        let handle = self.recorder.record(&outcome, artifact, &self.run).await?;
        let artifact_path = handle.path().display().to_string();

        let ports = outcome.samples().map(|samples| samples.len());
        self.metrics.record_poll(ports);
        self.state.record_tick(handle.path(), ports.is_some());

        match (&outcome, ports) {
            (_, Some(count)) => self.logger.log_stats_recorded(count, &artifact_path),
            (FetchOutcome::NotAvailable { reason }, None) => {
                self.logger.log_stats_unavailable(reason, &artifact_path)
            }
            (FetchOutcome::Stats(_), None) => {
                self.logger.log_stats_unavailable("no ports reported", &artifact_path)
            }
        }

        debug!(elapsed_ms = elapsed.as_millis() as u64, "Polling tick complete");
        Ok((handle, ports.is_some()))
    }
}

/// Builder for the polling loop
pub struct StatsMonitorBuilder {
    source: Option<Arc<dyn StatsSource>>,
    run: Option<RunContext>,
    state: Option<Arc<MonitorState>>,
    config: MonitorConfig,
}

impl StatsMonitorBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            run: None,
            state: None,
            config: MonitorConfig::default(),
        }
    }

    pub fn source(mut self, source: Arc<dyn StatsSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn run(mut self, run: RunContext) -> Self {
        self.run = Some(run);
        self
    }

    /// Share progress with an existing state (e.g. the status API)
    pub fn state(mut self, state: Arc<MonitorState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn switch_id(mut self, switch_id: impl Into<String>) -> Self {
        self.config.switch_id = switch_id.into();
        self
    }

    pub fn build(self) -> Result<StatsMonitor> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Stats source is required"))?;
        let run = self
            .run
            .ok_or_else(|| anyhow::anyhow!("Run context is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Polling interval must be positive");
        }

        Ok(StatsMonitor::new(
            source,
            run,
            self.config,
            self.state.unwrap_or_default(),
        ))
    }
}

impl Default for StatsMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
