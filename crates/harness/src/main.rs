//! SDN Harness - video streaming experiment over an emulated SDN
//!
//! Builds a two-host, one-switch Mininet network attached to a remote
//! OpenDaylight controller, starts a web server and a browser on the hosts,
//! records the controller's port statistics while the operator plays the
//! video, and writes the simulated QoE report when the session ends.

use anyhow::Result;
use clap::Parser;
use harness_lib::{
    api::{self, AppState},
    experiment::{Experiment, MininetEmulator, StdinConsole},
    ExperimentParams, HarnessMetrics, MonitorState, OpenDaylightFetcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

/// SDN video streaming experiment harness
#[derive(Parser)]
#[command(name = "sdn-harness")]
#[command(author, version, about = "SDN video streaming experiment harness", long_about = None)]
#[command(allow_negative_numbers = true)]
struct Args {
    /// Link bandwidth in Mbps (e.g. 0.1, 0.25, 0.5, 1, 5); invalid values fall back to 1
    bandwidth: Option<String>,

    /// Packet loss percentage on each link (0-100); invalid values fall back to 0
    packet_loss: Option<String>,

    /// Configuration file (toml, yaml, json...); SDN_HARNESS_* variables override it
    #[arg(long, short, env = "SDN_HARNESS_CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::HarnessConfig::load(args.config.as_deref())?;

    // Initialize tracing with env filter
    let json = config.log_json;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .init();

    if let Some(reason) = &config.fallback_reason {
        warn!(error = %reason, "Invalid configuration, using defaults");
    }

    let (params, rejected) =
        ExperimentParams::from_args(args.bandwidth.as_deref(), args.packet_loss.as_deref());
    for e in &rejected {
        println!("Error: {}", e);
        warn!(error = %e, "Invalid experiment parameter");
    }
    println!(
        "Starting network with bandwidth: {} Mbps, packet loss: {}%",
        params.bandwidth_mbps, params.packet_loss_pct
    );

    let metrics = HarnessMetrics::new();
    let monitor_state = Arc::new(MonitorState::new());

    if let Some(port) = config.metrics_port {
        let app_state = Arc::new(AppState::new(monitor_state.clone(), metrics.clone()));
        tokio::spawn(async move {
            if let Err(e) = api::serve(port, app_state).await {
                error!(error = %e, "Status API server stopped");
            }
        });
    }

    let fetcher = OpenDaylightFetcher::new(config.endpoint()?)?;
    info!(
        controller = %fetcher.endpoint().base_url(),
        switch_id = %config.switch_id,
        "Controller configured"
    );

    let experiment = Experiment::new(
        config.settings(params),
        MininetEmulator::new(&config.mininet_program),
        StdinConsole::new(),
        Arc::new(fetcher),
    )
    .with_monitor_state(monitor_state);

    let outcome = experiment.run().await?;
    info!(
        output_dir = %outcome.output_dir.display(),
        stats_log = ?outcome.stats_log,
        qoe_report = %outcome.qoe_report.display(),
        polls = metrics.polls_total(),
        "Experiment complete"
    );

    Ok(())
}
