//! One experiment run, start to finish

use super::{ControllerSpec, LinkSpec, NetworkEmulator, OperatorConsole, Topology};
use crate::fetcher::StatsSource;
use crate::monitor::{stop_channel, MonitorConfig, MonitorState, MonitorSummary, StatsMonitor};
use crate::observability::StructuredLogger;
use crate::params::{ExperimentParams, RunContext};
use crate::qoe;
use crate::recorder::RecordError;
use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Shell commands run on the emulated hosts
#[derive(Debug, Clone)]
pub struct HostCommands {
    /// Interactive terminal opened on the server host
    pub terminal: String,
    /// Clears any web server left over from a previous run
    pub stop_web_server: String,
    pub start_web_server: String,
    /// Local account the browser runs as
    pub browser_user: String,
    pub video_url: String,
}

impl Default for HostCommands {
    fn default() -> Self {
        Self {
            terminal: "xterm &".to_string(),
            stop_web_server: "killall apache2".to_string(),
            start_web_server: "./start_apache2_manually.sh &".to_string(),
            browser_user: "ytovan".to_string(),
            video_url: "http://10.0.0.1/index.html".to_string(),
        }
    }
}

impl HostCommands {
    pub fn browser(&self) -> String {
        format!("sudo -u {} firefox {} &", self.browser_user, self.video_url)
    }
}

/// Everything needed to run one experiment
#[derive(Debug, Clone)]
pub struct ExperimentSettings {
    pub params: ExperimentParams,
    /// Parent of the per-parameter output directories
    pub output_root: PathBuf,
    pub link_delay: String,
    pub controller: ControllerSpec,
    pub monitor: MonitorConfig,
    pub hosts: HostCommands,
    /// How long to wait for the monitor after stopping it
    pub join_timeout: Duration,
}

impl ExperimentSettings {
    pub fn new(params: ExperimentParams, output_root: PathBuf) -> Self {
        Self {
            params,
            output_root,
            link_delay: "10ms".to_string(),
            controller: ControllerSpec {
                ip: "127.0.0.1".to_string(),
                port: 6633,
            },
            monitor: MonitorConfig::default(),
            hosts: HostCommands::default(),
            join_timeout: Duration::from_secs(1),
        }
    }

    pub fn topology(&self) -> Topology {
        Topology::single_switch(
            LinkSpec {
                bandwidth_mbps: self.params.bandwidth_mbps,
                delay: self.link_delay.clone(),
                packet_loss_pct: self.params.packet_loss_pct,
            },
            self.controller.clone(),
        )
    }
}

/// Artifacts and counters of a finished run
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub output_dir: PathBuf,
    /// Absent when the monitor never completed a tick
    pub stats_log: Option<PathBuf>,
    pub qoe_report: PathBuf,
    /// Absent when the monitor failed or outlived the join timeout
    pub monitor: Option<MonitorSummary>,
}

/// Interactive experiment over an emulated network
pub struct Experiment<E, C> {
    settings: ExperimentSettings,
    emulator: E,
    console: C,
    source: Arc<dyn StatsSource>,
    monitor_state: Arc<MonitorState>,
    logger: StructuredLogger,
}

impl<E: NetworkEmulator, C: OperatorConsole> Experiment<E, C> {
    pub fn new(settings: ExperimentSettings, emulator: E, console: C, source: Arc<dyn StatsSource>) -> Self {
        let logger = StructuredLogger::new(settings.params.dir_name());
        Self {
            settings,
            emulator,
            console,
            source,
            monitor_state: Arc::new(MonitorState::new()),
            logger,
        }
    }

    /// Publish monitor progress into a shared state
    pub fn with_monitor_state(mut self, state: Arc<MonitorState>) -> Self {
        self.monitor_state = state;
        self
    }

    /// Run the experiment; the network is stopped on every path once started
    pub async fn run(mut self) -> Result<ExperimentOutcome> {
        let run = RunContext::new(self.settings.params, &self.settings.output_root);
        tokio::fs::create_dir_all(&run.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", run.output_dir.display()))?;
        self.logger.log_experiment_started(
            run.params.bandwidth_mbps,
            run.params.packet_loss_pct,
            &run.output_dir.display().to_string(),
        );

        let topology = self.settings.topology();
        info!(topology = %topology, "Starting network");
        self.emulator.start(&topology).await?;

        let result = self.drive(&run, &topology).await;
        let stopped = self.emulator.stop().await;

        let outcome = result?;
        stopped.context("Failed to stop network")?;

        self.logger.log_experiment_finished(
            self.monitor_state.ticks(),
            self.monitor_state.unavailable_ticks(),
        );
        Ok(outcome)
    }

    async fn drive(&mut self, run: &RunContext, topology: &Topology) -> Result<ExperimentOutcome> {
        let server = topology.server().name.clone();
        let client = topology.client().name.clone();
        let hosts = self.settings.hosts.clone();

        info!("Opening xterm on {}. Enter your commands in the xterm window.", server);
        self.emulator.host_cmd(&server, &hosts.terminal).await?;
        info!("Press Enter in this terminal to proceed with Apache and Firefox commands.");
        self.console.read_line().await?;

        self.emulator.host_cmd(&server, &hosts.stop_web_server).await?;
        self.emulator.host_cmd(&server, &hosts.start_web_server).await?;

        let (stop, signal) = stop_channel();
        let monitor = StatsMonitor::new(
            self.source.clone(),
            run.clone(),
            self.settings.monitor.clone(),
            self.monitor_state.clone(),
        );
        let monitor_task = monitor.spawn(signal);

        let session = self.session(&client, &hosts).await;

        stop.stop();
        let summary = self.join_monitor(monitor_task).await;
        session?;

        let qoe_report = qoe::write_report(run, Local::now()).await?;
        self.logger
            .log_qoe_report_written(&qoe_report.display().to_string());

        Ok(ExperimentOutcome {
            output_dir: run.output_dir.clone(),
            stats_log: self.monitor_state.artifact().map(PathBuf::from),
            qoe_report,
            monitor: summary,
        })
    }

    /// Browser start plus the operator's interactive session
    async fn session(&mut self, client: &str, hosts: &HostCommands) -> Result<()> {
        self.emulator.host_cmd(client, &hosts.browser()).await?;

        info!("Network is running. Apache started and Firefox opened.");
        info!("Play the video for at least 60 seconds to generate sufficient traffic.");
        info!(
            "SDN statistics are being collected every {} seconds.",
            self.settings.monitor.interval.as_secs_f64()
        );
        info!("Type \"exit\" in CLI to stop network and save final stats.");

        while let Some(line) = self.console.read_line().await? {
            let command = line.trim();
            match command {
                "exit" | "quit" => break,
                "" => continue,
                _ => self.emulator.forward(command).await?,
            }
        }

        Ok(())
    }

    /// Wait briefly for the stopped monitor; a slow one is left to finish on its own
    async fn join_monitor(
        &self,
        task: JoinHandle<Result<MonitorSummary, RecordError>>,
    ) -> Option<MonitorSummary> {
        match tokio::time::timeout(self.settings.join_timeout, task).await {
            Ok(Ok(Ok(summary))) => Some(summary),
            Ok(Ok(Err(e))) => {
                error!(error = %e, "Statistics monitor failed");
                None
            }
            Ok(Err(e)) => {
                error!(error = %e, "Statistics monitor task panicked");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.join_timeout.as_millis() as u64,
                    "Statistics monitor still busy, detaching it"
                );
                None
            }
        }
    }
}
