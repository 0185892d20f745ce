//! Core data models for the experiment harness

use serde::{Deserialize, Serialize};

/// Counters for one switch port at one sampling instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortStatSample {
    pub port_id: String,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Transmitted-vs-received on the same port; may be negative or exceed 100
    pub packet_loss_pct: f64,
    pub duration_sec: u64,
}

impl PortStatSample {
    /// Build a sample from raw counters, deriving the loss estimate
    pub fn from_counters(
        port_id: impl Into<String>,
        bytes_sent: u64,
        bytes_received: u64,
        packets_sent: u64,
        packets_received: u64,
        duration_sec: u64,
    ) -> Self {
        Self {
            port_id: port_id.into(),
            bytes_sent,
            bytes_received,
            packets_sent,
            packets_received,
            packet_loss_pct: apparent_loss_pct(packets_sent, packets_received),
            duration_sec,
        }
    }
}

/// Apparent packet loss: `(sent - received) / sent * 100`, zero when nothing was sent.
///
/// Not end-to-end loss. Received can exceed sent on the same port, which
/// makes the result negative; that value is kept as-is.
pub fn apparent_loss_pct(packets_sent: u64, packets_received: u64) -> f64 {
    if packets_sent == 0 {
        return 0.0;
    }
    let sent = packets_sent as f64;
    (sent - packets_received as f64) / sent * 100.0
}

/// Result of one statistics query
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Samples in the controller's connector order
    Stats(Vec<PortStatSample>),
    /// The controller could not be queried or answered with garbage
    NotAvailable { reason: String },
}

impl FetchOutcome {
    pub fn not_available(reason: impl Into<String>) -> Self {
        FetchOutcome::NotAvailable {
            reason: reason.into(),
        }
    }

    /// Samples worth tabulating, if any
    pub fn samples(&self) -> Option<&[PortStatSample]> {
        match self {
            FetchOutcome::Stats(samples) if !samples.is_empty() => Some(samples),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.samples().is_some()
    }
}
