//! Simulated QoE command

use anyhow::Result;
use colored::Colorize;
use harness_lib::{ExperimentParams, QoeMetrics};
use serde::Serialize;

use crate::output::{print_warning, OutputFormat};

#[derive(Serialize)]
struct QoeReport {
    params: ExperimentParams,
    metrics: QoeMetrics,
}

/// Print the simulated playback metrics for a parameter set.
///
/// Rejected values fall back to the harness defaults, as they do for a run.
pub fn show_qoe(bandwidth: &str, packet_loss: &str, format: OutputFormat) -> Result<()> {
    let (params, rejected) = ExperimentParams::from_args(Some(bandwidth), Some(packet_loss));
    for e in &rejected {
        print_warning(&e.to_string());
    }

    let metrics = QoeMetrics::simulate(&params);

    match format {
        OutputFormat::Json => {
            let report = QoeReport { params, metrics };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            println!("{}", "Simulated Video Performance".bold());
            println!("{}", "=".repeat(40));
            println!("Bandwidth:   {} Mbps", params.bandwidth_mbps.to_string().cyan());
            println!("Packet loss: {}%", params.packet_loss_pct.to_string().cyan());
            println!();
            println!(
                "Initial buffering time:   {:.2} seconds",
                metrics.initial_buffering_secs
            );
            println!("Buffering events:         {}", metrics.buffering_events);
            println!(
                "Average buffering time:   {:.2} seconds",
                metrics.avg_buffering_secs
            );
            println!("Average bitrate:          {:.0} kbps", metrics.avg_bitrate_kbps);
            println!(
                "Representation switches:  {}",
                metrics.representation_switches
            );
            println!("Dropped frames:           {}", metrics.dropped_frames);
        }
    }

    Ok(())
}
