//! Simulated video quality-of-experience report
//!
//! Placeholder metrics computed in closed form from the link parameters.
//! Nothing here is measured from the player; the same inputs always give
//! the same report.

use crate::params::{ExperimentParams, RunContext, TIMESTAMP_FORMAT};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Playback metrics for one parameter set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QoeMetrics {
    /// Seconds before playback starts
    pub initial_buffering_secs: f64,
    pub buffering_events: u64,
    pub avg_buffering_secs: f64,
    pub avg_bitrate_kbps: f64,
    pub representation_switches: u64,
    pub dropped_frames: u64,
}

impl QoeMetrics {
    /// Evaluate the placeholder formulas for bandwidth `b > 0` and loss `p` in [0, 100]
    pub fn simulate(params: &ExperimentParams) -> Self {
        let b = params.bandwidth_mbps;
        let p = params.packet_loss_pct;

        Self {
            initial_buffering_secs: 1.5 + 0.5 * p,
            buffering_events: (2.0 * p).floor() as u64,
            avg_buffering_secs: 0.8 + 0.3 * p,
            avg_bitrate_kbps: (3000.0 - 50.0 * p - 500.0 / b).max(500.0),
            representation_switches: (5.0 + 3.0 * p).floor() as u64,
            dropped_frames: (8.0 * p).floor() as u64,
        }
    }

    /// Report body as written to the artifact
    pub fn render_report(&self, params: &ExperimentParams, at: DateTime<Local>) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Experiment with {}% packet loss and {} Mbps bandwidth\n",
            params.packet_loss_pct, params.bandwidth_mbps
        ));
        out.push_str(&format!("Date: {}\n\n", at.format(TIMESTAMP_FORMAT)));
        out.push_str("Video Performance Metrics:\n");
        out.push_str(&format!(
            "- Initial buffering time: {:.2} seconds\n",
            self.initial_buffering_secs
        ));
        out.push_str(&format!(
            "- Number of buffering events: {}\n",
            self.buffering_events
        ));
        out.push_str(&format!(
            "- Average buffering time: {:.2} seconds\n",
            self.avg_buffering_secs
        ));
        out.push_str(&format!("- Average bitrate: {:.0} kbps\n", self.avg_bitrate_kbps));
        out.push_str(&format!(
            "- Representation switches: {}\n",
            self.representation_switches
        ));
        out.push_str(&format!("- Dropped frames: {}\n", self.dropped_frames));
        out
    }
}

/// Artifact name: `video_stats_bw_<b>_loss_<p>_<ts>.txt`
pub fn report_name(params: &ExperimentParams, at: DateTime<Local>) -> String {
    format!(
        "video_stats_bw_{}_loss_{}_{}.txt",
        params.bandwidth_mbps,
        params.packet_loss_pct,
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Write the report for `run` into its output directory, stamped `at`
pub async fn write_report(run: &RunContext, at: DateTime<Local>) -> Result<PathBuf> {
    let metrics = QoeMetrics::simulate(&run.params);
    let path = run.output_dir.join(report_name(&run.params, at));

    tokio::fs::write(&path, metrics.render_report(&run.params, at))
        .await
        .with_context(|| format!("Failed to write video statistics to {}", path.display()))?;

    info!(path = %path.display(), "Video statistics saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn params(bandwidth_mbps: f64, packet_loss_pct: f64) -> ExperimentParams {
        ExperimentParams {
            bandwidth_mbps,
            packet_loss_pct,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_regression_bw5_loss10() {
        let m = QoeMetrics::simulate(&params(5.0, 10.0));

        assert!(approx(m.initial_buffering_secs, 6.5));
        assert_eq!(m.buffering_events, 20);
        assert!(approx(m.avg_buffering_secs, 3.8));
        assert!(approx(m.avg_bitrate_kbps, 2400.0));
        assert_eq!(m.representation_switches, 35);
        assert_eq!(m.dropped_frames, 80);
    }

    #[test]
    fn test_lossless_link() {
        let m = QoeMetrics::simulate(&params(1.0, 0.0));

        assert!(approx(m.initial_buffering_secs, 1.5));
        assert_eq!(m.buffering_events, 0);
        assert!(approx(m.avg_buffering_secs, 0.8));
        assert!(approx(m.avg_bitrate_kbps, 2500.0));
        assert_eq!(m.representation_switches, 5);
        assert_eq!(m.dropped_frames, 0);
    }

    #[test]
    fn test_bitrate_floor() {
        let m = QoeMetrics::simulate(&params(0.1, 50.0));
        assert_eq!(m.avg_bitrate_kbps, 500.0);
    }

    #[test]
    fn test_fractional_loss_truncates_counts() {
        let m = QoeMetrics::simulate(&params(1.0, 2.7));
        assert_eq!(m.buffering_events, 5);
        assert_eq!(m.representation_switches, 13);
        assert_eq!(m.dropped_frames, 21);
    }

    #[test]
    fn test_deterministic() {
        let p = params(0.25, 7.5);
        assert_eq!(QoeMetrics::simulate(&p), QoeMetrics::simulate(&p));
    }

    #[test]
    fn test_render_report() {
        let p = params(5.0, 10.0);
        let at = Local.with_ymd_and_hms(2024, 6, 2, 18, 0, 1).unwrap();
        let report = QoeMetrics::simulate(&p).render_report(&p, at);

        let expected = "Experiment with 10% packet loss and 5 Mbps bandwidth\n\
                        Date: 2024-06-02_18-00-01\n\
                        \n\
                        Video Performance Metrics:\n\
                        - Initial buffering time: 6.50 seconds\n\
                        - Number of buffering events: 20\n\
                        - Average buffering time: 3.80 seconds\n\
                        - Average bitrate: 2400 kbps\n\
                        - Representation switches: 35\n\
                        - Dropped frames: 80\n";
        assert_eq!(report, expected);
    }

    #[tokio::test]
    async fn test_write_report() {
        let temp_dir = TempDir::new().unwrap();
        let at = Local.with_ymd_and_hms(2024, 6, 2, 18, 0, 1).unwrap();
        let run = RunContext {
            params: params(1.0, 0.0),
            started_at: at,
            output_dir: temp_dir.path().to_path_buf(),
        };

        let path = write_report(&run, at).await.unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "video_stats_bw_1_loss_0_2024-06-02_18-00-01.txt"
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 10);
        assert!(content.contains("- Average bitrate: 2500 kbps"));
    }
}
