//! Append-only statistics log
//!
//! Each run owns one plain-text artifact named after its bandwidth, loss and
//! start time. Every poll tick appends a timestamped block: a grid table of
//! the sampled ports, or a single "no statistics" line.

use crate::models::{FetchOutcome, PortStatSample};
use crate::params::{RunContext, TIMESTAMP_FORMAT};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Columns, style::HorizontalLine, Alignment, Modify, Style},
    Table, Tabled,
};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Failure to persist a block; fatal for the polling task
#[derive(Debug, Error)]
#[error("failed to write statistics log {path}: {source}")]
pub struct RecordError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Identity of an opened artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    path: PathBuf,
}

impl ArtifactHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Table row as written to the log
#[derive(Tabled)]
struct PortStatRow {
    #[tabled(rename = "Port ID")]
    port_id: String,
    #[tabled(rename = "Bytes Sent")]
    bytes_sent: u64,
    #[tabled(rename = "Bytes Received")]
    bytes_received: u64,
    #[tabled(rename = "Packets Sent")]
    packets_sent: u64,
    #[tabled(rename = "Packets Received")]
    packets_received: u64,
    #[tabled(rename = "Packet Loss (%)")]
    packet_loss_pct: String,
    #[tabled(rename = "Duration (s)")]
    duration_sec: u64,
}

impl From<&PortStatSample> for PortStatRow {
    fn from(sample: &PortStatSample) -> Self {
        Self {
            port_id: sample.port_id.clone(),
            bytes_sent: sample.bytes_sent,
            bytes_received: sample.bytes_received,
            packets_sent: sample.packets_sent,
            packets_received: sample.packets_received,
            packet_loss_pct: format!("{:.2}", sample.packet_loss_pct),
            duration_sec: sample.duration_sec,
        }
    }
}

/// Grid table of samples, in the given order.
///
/// The header is ruled with `=` and the counter columns are right-aligned.
pub fn format_stats_table(samples: &[PortStatSample]) -> String {
    let rows: Vec<PortStatRow> = samples.iter().map(PortStatRow::from).collect();
    let style = Style::ascii().horizontals([(1, HorizontalLine::full('=', '+', '+', '+'))]);

    Table::new(rows)
        .with(style)
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string()
}

/// Writes statistics blocks into per-run artifacts
#[derive(Debug, Clone, Default)]
pub struct StatsRecorder;

impl StatsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Artifact name for a run: `sdn_stats_bw_<b>_loss_<p>_<start>.txt`
    pub fn artifact_name(run: &RunContext) -> String {
        format!(
            "sdn_stats_bw_{}_loss_{}_{}.txt",
            run.params.bandwidth_mbps,
            run.params.packet_loss_pct,
            run.start_stamp()
        )
    }

    /// Create the artifact (and its directory) if missing and return its handle.
    ///
    /// Existing content is left untouched.
    pub async fn open_or_create(&self, dir: &Path, name: &str) -> Result<ArtifactHandle, RecordError> {
        let path = dir.join(name);
        fs::create_dir_all(dir).await.map_err(|source| RecordError {
            path: dir.to_path_buf(),
            source,
        })?;
        open_append(&path).await?;
        Ok(ArtifactHandle { path })
    }

    /// Append a block to an opened artifact
    pub async fn append(&self, handle: &ArtifactHandle, block: &str) -> Result<(), RecordError> {
        let mut file = open_append(&handle.path).await?;
        let io_err = |source: std::io::Error| RecordError {
            path: handle.path.clone(),
            source,
        };
        file.write_all(block.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }

    /// Append the block for `outcome`, opening the run's artifact on first use.
    ///
    /// The returned handle is `handle` itself when one was supplied.
    pub async fn record(
        &self,
        outcome: &FetchOutcome,
        handle: Option<ArtifactHandle>,
        run: &RunContext,
    ) -> Result<ArtifactHandle, RecordError> {
        let handle = match handle {
            Some(handle) => handle,
            None => {
                self.open_or_create(&run.output_dir, &Self::artifact_name(run))
                    .await?
            }
        };

        let block = render_block(outcome, run, Local::now());
        self.append(&handle, &block).await?;

        if outcome.is_available() {
            info!(
                path = %handle.path.display(),
                "SDN statistics appended"
            );
        }

        Ok(handle)
    }
}

/// Text appended for one tick
pub fn render_block(outcome: &FetchOutcome, run: &RunContext, at: DateTime<Local>) -> String {
    let stamp = at.format(TIMESTAMP_FORMAT);
    match outcome.samples() {
        None => format!("\n[{}] No SDN statistics available.\n", stamp),
        Some(samples) => format!(
            "\n[{}] SDN Port Statistics (Bandwidth: {} Mbps, Packet Loss: {}%)\n{}\n",
            stamp,
            run.params.bandwidth_mbps,
            run.params.packet_loss_pct,
            format_stats_table(samples)
        ),
    }
}

async fn open_append(path: &Path) -> Result<fs::File, RecordError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| RecordError {
            path: path.to_path_buf(),
            source,
        })
}
