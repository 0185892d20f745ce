//! Orchestration tests with a recording emulator and a scripted operator

use super::*;
use crate::fetcher::StatsSource;
use crate::models::{FetchOutcome, PortStatSample};
use crate::monitor::{MonitorPhase, MonitorState};
use crate::params::ExperimentParams;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Emulator double that records every call
#[derive(Clone, Default)]
struct RecordingEmulator {
    calls: Arc<Mutex<Vec<String>>>,
    fail_start: bool,
    fail_host: Option<String>,
}

impl RecordingEmulator {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl NetworkEmulator for RecordingEmulator {
    async fn start(&mut self, topology: &Topology) -> Result<()> {
        if self.fail_start {
            anyhow::bail!("mn not installed");
        }
        self.push(format!(
            "start bw={} loss={}",
            topology.link.bandwidth_mbps, topology.link.packet_loss_pct
        ));
        Ok(())
    }

    async fn host_cmd(&mut self, host: &str, command: &str) -> Result<()> {
        if self.fail_host.as_deref() == Some(host) {
            anyhow::bail!("{} is unreachable", host);
        }
        self.push(format!("{} {}", host, command));
        Ok(())
    }

    async fn forward(&mut self, line: &str) -> Result<()> {
        self.push(format!("cli {}", line));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.push("stop".to_string());
        Ok(())
    }
}

/// Operator double typing pre-scripted lines with a pause before each
struct ScriptedConsole {
    lines: VecDeque<String>,
    pause: Duration,
}

impl ScriptedConsole {
    fn new(lines: &[&str], pause: Duration) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            pause,
        }
    }
}

#[async_trait]
impl OperatorConsole for ScriptedConsole {
    async fn read_line(&mut self) -> Result<Option<String>> {
        tokio::time::sleep(self.pause).await;
        Ok(self.lines.pop_front())
    }
}

struct StaticSource;

#[async_trait]
impl StatsSource for StaticSource {
    async fn fetch(&self, _switch_id: &str) -> FetchOutcome {
        FetchOutcome::Stats(vec![PortStatSample::from_counters(
            "openflow:1:1",
            2048,
            1024,
            20,
            18,
            12,
        )])
    }
}

fn settings(root: &std::path::Path) -> ExperimentSettings {
    let mut settings = ExperimentSettings::new(
        ExperimentParams {
            bandwidth_mbps: 5.0,
            packet_loss_pct: 10.0,
        },
        root.to_path_buf(),
    );
    settings.monitor.interval = Duration::from_millis(10);
    settings
}

#[test]
fn test_topology_from_settings() {
    let topology = settings(std::path::Path::new("/tmp")).topology();

    assert_eq!(topology.server().name, "h1");
    assert_eq!(topology.server().ip, "10.0.0.1");
    assert_eq!(topology.client().name, "h2");
    assert_eq!(topology.client().ip, "10.0.0.2");
    assert_eq!(topology.switch, "s1");
    assert_eq!(topology.link.delay, "10ms");
    assert_eq!(topology.link.bandwidth_mbps, 5.0);
    assert_eq!(topology.controller.port, 6633);
}

#[test]
fn test_browser_command() {
    assert_eq!(
        HostCommands::default().browser(),
        "sudo -u ytovan firefox http://10.0.0.1/index.html &"
    );
}

#[tokio::test]
async fn test_full_run_sequence() {
    let temp_dir = TempDir::new().unwrap();
    let emulator = RecordingEmulator::default();
    let console = ScriptedConsole::new(&["", "pingall", "  ", "exit", "never read"], Duration::from_millis(30));
    let state = Arc::new(MonitorState::new());

    let outcome = Experiment::new(settings(temp_dir.path()), emulator.clone(), console, Arc::new(StaticSource))
        .with_monitor_state(state.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(
        emulator.calls(),
        vec![
            "start bw=5 loss=10",
            "h1 xterm &",
            "h1 killall apache2",
            "h1 ./start_apache2_manually.sh &",
            "h2 sudo -u ytovan firefox http://10.0.0.1/index.html &",
            "cli pingall",
            "stop",
        ]
    );

    assert_eq!(outcome.output_dir, temp_dir.path().join("bw_5_loss_10"));
    assert!(outcome.qoe_report.starts_with(&outcome.output_dir));
    let report = std::fs::read_to_string(&outcome.qoe_report).unwrap();
    assert!(report.contains("- Average bitrate: 2400 kbps"));

    let stats_log = outcome.stats_log.expect("monitor should have ticked");
    let log = std::fs::read_to_string(stats_log).unwrap();
    assert!(log.contains("openflow:1:1"));

    let summary = outcome.monitor.expect("monitor should stop within the join timeout");
    assert!(summary.ticks >= 1);
    assert_eq!(state.phase(), MonitorPhase::Stopped);
}

#[tokio::test]
async fn test_end_of_input_ends_session() {
    let temp_dir = TempDir::new().unwrap();
    let emulator = RecordingEmulator::default();
    let console = ScriptedConsole::new(&[""], Duration::from_millis(5));

    let outcome = Experiment::new(settings(temp_dir.path()), emulator.clone(), console, Arc::new(StaticSource))
        .run()
        .await
        .unwrap();

    assert!(outcome.qoe_report.exists());
    assert_eq!(emulator.calls().last().map(String::as_str), Some("stop"));
}

#[tokio::test]
async fn test_start_failure_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let emulator = RecordingEmulator {
        fail_start: true,
        ..Default::default()
    };
    let console = ScriptedConsole::new(&[], Duration::ZERO);

    let result = Experiment::new(settings(temp_dir.path()), emulator.clone(), console, Arc::new(StaticSource))
        .run()
        .await;

    assert!(result.is_err());
    assert!(emulator.calls().is_empty());
}

#[tokio::test]
async fn test_network_stopped_when_host_command_fails() {
    let temp_dir = TempDir::new().unwrap();
    let emulator = RecordingEmulator {
        fail_host: Some("h2".to_string()),
        ..Default::default()
    };
    let console = ScriptedConsole::new(&["", "exit"], Duration::from_millis(5));
    let state = Arc::new(MonitorState::new());

    let result = Experiment::new(settings(temp_dir.path()), emulator.clone(), console, Arc::new(StaticSource))
        .with_monitor_state(state.clone())
        .run()
        .await;

    assert!(result.is_err());
    assert_eq!(emulator.calls().last().map(String::as_str), Some("stop"));
    // monitor was started before the browser and must have been stopped
    assert_ne!(state.phase(), MonitorPhase::Running);
}
