//! Observability infrastructure for the experiment harness
//!
//! Provides:
//! - Prometheus metrics (poll counts, fetch latency, ports reported)
//! - Structured logging of experiment events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram, IntCounter,
    IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for controller round trips (in seconds)
const FETCH_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<HarnessMetricsInner> = OnceLock::new();

struct HarnessMetricsInner {
    polls: IntCounter,
    polls_unavailable: IntCounter,
    fetch_latency_seconds: Histogram,
    ports_reported: IntGauge,
    record_errors: IntCounter,
}

impl HarnessMetricsInner {
    fn new() -> Self {
        Self {
            polls: register_int_counter!(
                "sdn_harness_polls_total",
                "Number of completed polling ticks"
            )
            .expect("Failed to register polls_total"),

            polls_unavailable: register_int_counter!(
                "sdn_harness_polls_unavailable_total",
                "Polling ticks where controller statistics were unavailable"
            )
            .expect("Failed to register polls_unavailable_total"),

            fetch_latency_seconds: register_histogram!(
                "sdn_harness_fetch_latency_seconds",
                "Time spent querying the controller for port statistics",
                FETCH_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            ports_reported: register_int_gauge!(
                "sdn_harness_ports_reported",
                "Number of switch ports in the latest statistics snapshot"
            )
            .expect("Failed to register ports_reported"),

            record_errors: register_int_counter!(
                "sdn_harness_record_errors_total",
                "Failures writing the statistics log"
            )
            .expect("Failed to register record_errors_total"),
        }
    }
}

/// Handle to the process-wide harness metrics.
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct HarnessMetrics {
    _private: (),
}

impl Default for HarnessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HarnessMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HarnessMetricsInner {
        GLOBAL_METRICS.get_or_init(HarnessMetricsInner::new)
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
    }

    /// Count a finished tick and the ports it saw (`None` when unavailable)
    pub fn record_poll(&self, ports: Option<usize>) {
        let inner = self.inner();
        inner.polls.inc();
        match ports {
            Some(count) => inner.ports_reported.set(count as i64),
            None => {
                inner.polls_unavailable.inc();
                inner.ports_reported.set(0);
            }
        }
    }

    pub fn inc_record_errors(&self) {
        self.inner().record_errors.inc();
    }

    pub fn polls_total(&self) -> u64 {
        self.inner().polls.get()
    }

    /// Prometheus text exposition of the process registry
    pub fn encode_text(&self) -> prometheus::Result<Vec<u8>> {
        self.inner();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Structured logger for experiment events
#[derive(Clone)]
pub struct StructuredLogger {
    experiment: String,
}

impl StructuredLogger {
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
        }
    }

    pub fn log_experiment_started(&self, bandwidth_mbps: f64, packet_loss_pct: f64, output_dir: &str) {
        info!(
            event = "experiment_started",
            experiment = %self.experiment,
            bandwidth_mbps = bandwidth_mbps,
            packet_loss_pct = packet_loss_pct,
            output_dir = %output_dir,
            "Experiment started"
        );
    }

    pub fn log_stats_recorded(&self, ports: usize, artifact: &str) {
        info!(
            event = "stats_recorded",
            experiment = %self.experiment,
            ports = ports,
            artifact = %artifact,
            "SDN statistics recorded"
        );
    }

    pub fn log_stats_unavailable(&self, reason: &str, artifact: &str) {
        warn!(
            event = "stats_unavailable",
            experiment = %self.experiment,
            reason = %reason,
            artifact = %artifact,
            "No SDN statistics available"
        );
    }

    pub fn log_qoe_report_written(&self, path: &str) {
        info!(
            event = "qoe_report_written",
            experiment = %self.experiment,
            path = %path,
            "Video statistics written"
        );
    }

    pub fn log_experiment_finished(&self, ticks: u64, unavailable_ticks: u64) {
        info!(
            event = "experiment_finished",
            experiment = %self.experiment,
            ticks = ticks,
            unavailable_ticks = unavailable_ticks,
            "Experiment finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_metrics_updates() {
        let metrics = HarnessMetrics::new();
        let before = metrics.polls_total();

        metrics.observe_fetch_latency(0.01);
        metrics.record_poll(Some(3));
        metrics.record_poll(None);
        metrics.inc_record_errors();

        // other tests share the global registry
        assert!(metrics.polls_total() >= before + 2);
    }

    #[test]
    fn test_encode_text_lists_harness_metrics() {
        let metrics = HarnessMetrics::new();
        metrics.record_poll(Some(1));

        let text = String::from_utf8(metrics.encode_text().unwrap()).unwrap();
        assert!(text.contains("sdn_harness_polls_total"));
        assert!(text.contains("sdn_harness_fetch_latency_seconds"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("bw_1_loss_0");
        assert_eq!(logger.experiment, "bw_1_loss_0");
    }
}
