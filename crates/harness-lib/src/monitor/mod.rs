//! Background statistics monitoring
//!
//! The polling loop fetches port statistics and records them on a fixed
//! interval until its [`StopSignal`] fires. The signal is a write-once flag
//! handed to the task at spawn time; [`MonitorState`] publishes progress to
//! readers such as the status API.

mod r#loop;


pub use r#loop::{MonitorConfig, MonitorSummary, StatsMonitor, StatsMonitorBuilder};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;
use tokio::sync::watch;

/// Create a connected stop handle and signal
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Owner side of the stop flag
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Request a stop; idempotent
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal observing this handle
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side of the stop flag.
///
/// Dropping every [`StopHandle`] counts as a stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&mut self) {
        // Err means the handle is gone, which is a stop as well
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Lifecycle of the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    /// Not started yet
    Idle,
    Running,
    Stopped,
    /// Ended by a statistics log write failure
    Failed,
}

impl MonitorPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => MonitorPhase::Idle,
            1 => MonitorPhase::Running,
            2 => MonitorPhase::Stopped,
            _ => MonitorPhase::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            MonitorPhase::Idle => 0,
            MonitorPhase::Running => 1,
            MonitorPhase::Stopped => 2,
            MonitorPhase::Failed => 3,
        }
    }
}

/// Progress published by the polling loop, readable from any task
#[derive(Debug, Default)]
pub struct MonitorState {
    phase: AtomicU8,
    ticks: AtomicU64,
    unavailable_ticks: AtomicU64,
    artifact: OnceLock<PathBuf>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MonitorPhase {
        MonitorPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: MonitorPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    pub(crate) fn record_tick(&self, artifact: &Path, available: bool) {
        // identity is fixed by the first write
        let _ = self.artifact.set(artifact.to_path_buf());
        self.ticks.fetch_add(1, Ordering::AcqRel);
        if !available {
            self.unavailable_ticks.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn unavailable_ticks(&self) -> u64 {
        self.unavailable_ticks.load(Ordering::Acquire)
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.get().map(PathBuf::as_path)
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            status: self.phase(),
            ticks: self.ticks(),
            unavailable_ticks: self.unavailable_ticks(),
            artifact: self.artifact().map(|p| p.display().to_string()),
        }
    }
}

/// Serializable view of [`MonitorState`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub status: MonitorPhase,
    pub ticks: u64,
    pub unavailable_ticks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}
