//! Core library for the SDN streaming experiment harness
//!
//! This crate provides the core functionality for:
//! - Port statistics retrieval from the SDN controller
//! - Append-only statistics logs and the simulated QoE report
//! - The background polling loop and its stop signal
//! - Experiment orchestration over an emulated network
//! - Status API, metrics and structured logging

pub mod api;
pub mod experiment;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod params;
pub mod qoe;
pub mod recorder;

pub use fetcher::{ControllerEndpoint, Credentials, FetchError, OpenDaylightFetcher, StatsSource};
pub use models::*;
pub use monitor::{MonitorState, StatsMonitor, StatsMonitorBuilder, StopHandle, StopSignal};
pub use observability::{HarnessMetrics, StructuredLogger};
pub use params::{ExperimentParams, ParamError, RunContext};
pub use qoe::QoeMetrics;
pub use recorder::{ArtifactHandle, RecordError, StatsRecorder};
