//! Experiment parameters and per-run context
//!
//! Bandwidth and packet loss come from the command line as free text. Bad
//! values never abort a run: they are reported and replaced by defaults.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BANDWIDTH_MBPS: f64 = 1.0;
pub const DEFAULT_PACKET_LOSS_PCT: f64 = 0.0;

/// Timestamp layout used in artifact names and log blocks
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Rejected command-line parameter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("Invalid bandwidth value '{0}'. Use a positive number (e.g., 0.1, 1, 5). Defaulting to 1 Mbps.")]
    InvalidBandwidth(String),

    #[error("Invalid packet loss value '{0}'. Use a number between 0 and 100. Defaulting to 0%.")]
    InvalidPacketLoss(String),
}

/// Link shaping parameters for one experiment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExperimentParams {
    pub bandwidth_mbps: f64,
    pub packet_loss_pct: f64,
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            bandwidth_mbps: DEFAULT_BANDWIDTH_MBPS,
            packet_loss_pct: DEFAULT_PACKET_LOSS_PCT,
        }
    }
}

impl ExperimentParams {
    /// Parse optional raw arguments, falling back per field.
    ///
    /// Returns the parameters actually used and one error per rejected field.
    pub fn from_args(bandwidth: Option<&str>, packet_loss: Option<&str>) -> (Self, Vec<ParamError>) {
        let mut params = Self::default();
        let mut rejected = Vec::new();

        if let Some(raw) = bandwidth {
            match parse_bandwidth(raw) {
                Ok(value) => params.bandwidth_mbps = value,
                Err(e) => rejected.push(e),
            }
        }

        if let Some(raw) = packet_loss {
            match parse_packet_loss(raw) {
                Ok(value) => params.packet_loss_pct = value,
                Err(e) => rejected.push(e),
            }
        }

        (params, rejected)
    }

    /// Directory name for this parameter set, e.g. `bw_0.5_loss_10`
    pub fn dir_name(&self) -> String {
        format!("bw_{}_loss_{}", self.bandwidth_mbps, self.packet_loss_pct)
    }
}

impl fmt::Display for ExperimentParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bandwidth: {} Mbps, packet loss: {}%",
            self.bandwidth_mbps, self.packet_loss_pct
        )
    }
}

/// Bandwidth in Mbps: finite and strictly positive
pub fn parse_bandwidth(raw: &str) -> Result<f64, ParamError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(ParamError::InvalidBandwidth(raw.to_string())),
    }
}

/// Packet loss percentage: finite and within [0, 100]
pub fn parse_packet_loss(raw: &str) -> Result<f64, ParamError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if (0.0..=100.0).contains(&value) => Ok(value),
        _ => Err(ParamError::InvalidPacketLoss(raw.to_string())),
    }
}

/// Everything a run's artifacts are named after
#[derive(Debug, Clone)]
pub struct RunContext {
    pub params: ExperimentParams,
    pub started_at: DateTime<Local>,
    pub output_dir: PathBuf,
}

impl RunContext {
    /// Context for a run starting now under `<output_root>/bw_<b>_loss_<p>`
    pub fn new(params: ExperimentParams, output_root: &Path) -> Self {
        Self::started_at(params, output_root, Local::now())
    }

    pub fn started_at(params: ExperimentParams, output_root: &Path, started_at: DateTime<Local>) -> Self {
        Self {
            params,
            started_at,
            output_dir: output_root.join(params.dir_name()),
        }
    }

    pub fn start_stamp(&self) -> String {
        self.started_at.format(TIMESTAMP_FORMAT).to_string()
    }
}
