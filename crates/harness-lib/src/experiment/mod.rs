//! Experiment orchestration
//!
//! Sequences the emulated network, the host processes (web server and
//! browser), the statistics monitor and the final QoE report. The emulator
//! and the operator's terminal sit behind traits so a run can be driven
//! entirely in-process.

mod console;
mod mininet;
mod runner;

#[cfg(test)]
mod tests;

pub use console::StdinConsole;
pub use mininet::MininetEmulator;
pub use runner::{Experiment, ExperimentOutcome, ExperimentSettings, HostCommands};

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Emulated host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub name: String,
    pub ip: String,
}

/// Shaping applied to every host-switch link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub bandwidth_mbps: f64,
    /// tc delay expression, e.g. `10ms`
    pub delay: String,
    pub packet_loss_pct: f64,
}

/// Remote OpenFlow controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSpec {
    pub ip: String,
    pub port: u16,
}

/// Two hosts on one OpenFlow switch: `h1 - s1 - h2`
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub hosts: [HostSpec; 2],
    pub switch: String,
    pub openflow_version: String,
    pub link: LinkSpec,
    pub controller: ControllerSpec,
}

impl Topology {
    pub fn single_switch(link: LinkSpec, controller: ControllerSpec) -> Self {
        Self {
            hosts: [
                HostSpec {
                    name: "h1".to_string(),
                    ip: "10.0.0.1".to_string(),
                },
                HostSpec {
                    name: "h2".to_string(),
                    ip: "10.0.0.2".to_string(),
                },
            ],
            switch: "s1".to_string(),
            openflow_version: "OpenFlow13".to_string(),
            link,
            controller,
        }
    }

    /// Host serving the video
    pub fn server(&self) -> &HostSpec {
        &self.hosts[0]
    }

    /// Host running the browser
    pub fn client(&self) -> &HostSpec {
        &self.hosts[1]
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {} (bw={}Mbps delay={} loss={}%) controller {}:{}",
            self.hosts[0].name,
            self.switch,
            self.hosts[1].name,
            self.link.bandwidth_mbps,
            self.link.delay,
            self.link.packet_loss_pct,
            self.controller.ip,
            self.controller.port
        )
    }
}

/// Network emulator driving hosts and links
#[async_trait]
pub trait NetworkEmulator: Send {
    /// Build and start the topology
    async fn start(&mut self, topology: &Topology) -> Result<()>;

    /// Run a shell command on a host (background it with a trailing `&`)
    async fn host_cmd(&mut self, host: &str, command: &str) -> Result<()>;

    /// Pass one line of operator input to the emulator's own CLI
    async fn forward(&mut self, line: &str) -> Result<()>;

    /// Tear the network down
    async fn stop(&mut self) -> Result<()>;
}

/// Operator's terminal
#[async_trait]
pub trait OperatorConsole: Send {
    /// Next input line without its terminator, `None` at end of input
    async fn read_line(&mut self) -> Result<Option<String>>;
}
