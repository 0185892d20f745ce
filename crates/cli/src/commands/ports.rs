//! Switch port statistics command

use anyhow::Result;
use colored::Colorize;
use harness_lib::{OpenDaylightFetcher, PortStatSample};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{color_loss, format_bytes, print_info, print_warning, OutputFormat};

/// Row for the port statistics table
#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Sent")]
    bytes_sent: String,
    #[tabled(rename = "Received")]
    bytes_received: String,
    #[tabled(rename = "Pkts Sent")]
    packets_sent: u64,
    #[tabled(rename = "Pkts Recv")]
    packets_received: u64,
    #[tabled(rename = "Loss")]
    loss: String,
    #[tabled(rename = "Duration (s)")]
    duration: u64,
}

impl From<&PortStatSample> for PortRow {
    fn from(s: &PortStatSample) -> Self {
        Self {
            port: s.port_id.clone(),
            bytes_sent: format_bytes(s.bytes_sent),
            bytes_received: format_bytes(s.bytes_received),
            packets_sent: s.packets_sent,
            packets_received: s.packets_received,
            loss: color_loss(s.packet_loss_pct),
            duration: s.duration_sec,
        }
    }
}

/// JSON shape for `ports --format json`
#[derive(Serialize)]
struct PortsReport<'a> {
    switch_id: &'a str,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    ports: &'a [PortStatSample],
}

/// Fetch and print the current counters of one switch
pub async fn show_ports(
    fetcher: &OpenDaylightFetcher,
    switch_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let (ports, reason) = match fetcher.try_fetch(switch_id).await {
        Ok(ports) if ports.is_empty() => (ports, Some("controller reported no ports".to_string())),
        Ok(ports) => (ports, None),
        Err(e) => (Vec::new(), Some(e.to_string())),
    };

    match format {
        OutputFormat::Json => {
            let report = PortsReport {
                switch_id,
                available: reason.is_none(),
                reason,
                ports: &ports,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            if let Some(reason) = reason {
                print_warning("No SDN statistics available.");
                print_info(&reason);
                return Ok(());
            }

            println!("{}", "SDN Port Statistics".bold());
            println!("Switch:     {}", switch_id.cyan());
            println!("Controller: {}", fetcher.endpoint().base_url().as_str().cyan());
            println!();

            let rows: Vec<PortRow> = ports.iter().map(PortRow::from).collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} ports", ports.len());
        }
    }

    Ok(())
}
