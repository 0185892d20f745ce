//! Mininet driver
//!
//! Starts `mn` with the requested topology and talks to its interactive CLI
//! through stdin. The CLI's own output goes straight to the operator's
//! terminal.

use super::{NetworkEmulator, Topology};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// [`NetworkEmulator`] backed by the Mininet command line
pub struct MininetEmulator {
    program: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl MininetEmulator {
    /// Driver for the given `mn` executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            child: None,
            stdin: None,
        }
    }

    /// `mn` arguments reproducing `topology`
    pub fn command_args(topology: &Topology) -> Vec<String> {
        let link = &topology.link;
        vec![
            "--topo".to_string(),
            "single,2".to_string(),
            "--switch".to_string(),
            format!("ovs,protocols={}", topology.openflow_version),
            "--controller".to_string(),
            format!(
                "remote,ip={},port={}",
                topology.controller.ip, topology.controller.port
            ),
            "--link".to_string(),
            format!(
                "tc,bw={},delay={},loss={}",
                link.bandwidth_mbps, link.delay, link.packet_loss_pct
            ),
        ]
    }

    async fn send(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .context("Mininet is not running")?;

        debug!(line = %line, "mininet>");
        stdin
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .context("Failed to write to the Mininet CLI")?;
        stdin.flush().await.context("Failed to flush the Mininet CLI")?;
        Ok(())
    }
}

#[async_trait]
impl NetworkEmulator for MininetEmulator {
    async fn start(&mut self, topology: &Topology) -> Result<()> {
        if self.child.is_some() {
            anyhow::bail!("Mininet is already running");
        }

        let args = Self::command_args(topology);
        info!(program = %self.program, args = ?args, "Starting Mininet");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program))?;

        self.stdin = child.stdin.take();
        self.child = Some(child);
        Ok(())
    }

    async fn host_cmd(&mut self, host: &str, command: &str) -> Result<()> {
        self.send(&format!("{} {}", host, command)).await
    }

    async fn forward(&mut self, line: &str) -> Result<()> {
        self.send(line).await
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Err(e) = self.send("exit").await {
            warn!(error = %e, "Could not ask Mininet to exit");
        }
        // closing stdin ends the CLI even if `exit` was lost
        self.stdin = None;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait()).await {
            Ok(status) => {
                let status = status.context("Failed to wait for Mininet")?;
                info!(status = %status, "Mininet stopped");
            }
            Err(_) => {
                warn!("Mininet did not exit in time, killing it");
                child.kill().await.context("Failed to kill Mininet")?;
            }
        }

        Ok(())
    }
}
