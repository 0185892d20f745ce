//! SDN statistics CLI
//!
//! A command-line tool for querying switch port counters from the
//! OpenDaylight controller and previewing the simulated video QoE for a
//! given link configuration.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{ports, qoe};
use harness_lib::{
    fetcher::{DEFAULT_CONTROLLER_URL, DEFAULT_FETCH_TIMEOUT, DEFAULT_SWITCH_ID},
    ControllerEndpoint, Credentials, OpenDaylightFetcher,
};
use std::time::Duration;

/// SDN statistics CLI
#[derive(Parser)]
#[command(name = "sdnstat")]
#[command(author, version, about = "CLI for SDN switch statistics and simulated QoE", long_about = None)]
pub struct Cli {
    /// Controller RESTCONF URL [default: http://127.0.0.1:8181]
    #[arg(long, env = "SDNSTAT_CONTROLLER_URL")]
    pub controller_url: Option<String>,

    /// Controller username [default: admin]
    #[arg(long, env = "SDNSTAT_USERNAME")]
    pub username: Option<String>,

    /// Controller password [default: admin]
    #[arg(long, env = "SDNSTAT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds [default: 5]
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current port counters of a switch
    Ports {
        /// Switch node id [default: openflow:1]
        #[arg(long, short)]
        switch: Option<String>,
    },

    /// Show the simulated QoE metrics for a link configuration
    #[command(allow_negative_numbers = true)]
    Qoe {
        /// Link bandwidth in Mbps
        bandwidth: String,

        /// Packet loss percentage (0-100)
        packet_loss: String,
    },
}

/// Flags win over the config file, which wins over built-in defaults
fn build_fetcher(cli: &Cli, config: &config::Config) -> Result<OpenDaylightFetcher> {
    let url = cli
        .controller_url
        .as_deref()
        .or(config.controller_url.as_deref())
        .unwrap_or(DEFAULT_CONTROLLER_URL);

    let defaults = Credentials::default();
    let credentials = Credentials::new(
        cli.username
            .clone()
            .or_else(|| config.username.clone())
            .unwrap_or(defaults.username),
        cli.password
            .clone()
            .or_else(|| config.password.clone())
            .unwrap_or(defaults.password),
    );

    let timeout = cli
        .timeout_secs
        .or(config.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_FETCH_TIMEOUT);

    let endpoint = ControllerEndpoint::new(url)
        .with_context(|| format!("Invalid controller URL '{}'", url))?
        .with_credentials(credentials)
        .with_timeout(timeout);

    Ok(OpenDaylightFetcher::new(endpoint)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    // Execute command
    match &cli.command {
        Commands::Ports { switch } => {
            let fetcher = build_fetcher(&cli, &config)?;
            let switch_id = switch
                .as_deref()
                .or(config.switch_id.as_deref())
                .unwrap_or(DEFAULT_SWITCH_ID);
            ports::show_ports(&fetcher, switch_id, cli.format).await?;
        }
        Commands::Qoe {
            bandwidth,
            packet_loss,
        } => {
            qoe::show_qoe(bandwidth, packet_loss, cli.format)?;
        }
    }

    Ok(())
}
