//! Harness configuration

use anyhow::{Context, Result};
use harness_lib::{
    experiment::{ControllerSpec, ExperimentSettings, HostCommands},
    monitor::MonitorConfig,
    ControllerEndpoint, Credentials, ExperimentParams,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Harness configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    /// Controller address, shared by OpenFlow and REST
    #[serde(default = "default_controller_ip")]
    pub controller_ip: String,

    /// OpenFlow port the switch connects to
    #[serde(default = "default_openflow_port")]
    pub openflow_port: u16,

    /// RESTCONF port queried for statistics
    #[serde(default = "default_rest_port")]
    pub rest_port: u16,

    #[serde(default = "default_switch_id")]
    pub switch_id: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Statistics polling interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Defaults to `~/experiments`
    #[serde(default)]
    pub output_root: Option<PathBuf>,

    #[serde(default = "default_link_delay")]
    pub link_delay: String,

    #[serde(default = "default_web_server_script")]
    pub web_server_script: String,

    #[serde(default = "default_browser_user")]
    pub browser_user: String,

    #[serde(default = "default_video_url")]
    pub video_url: String,

    #[serde(default = "default_join_timeout")]
    pub join_timeout_ms: u64,

    /// Serve /healthz and /metrics on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_mininet_program")]
    pub mininet_program: String,

    /// Why the defaults were used instead of the provided settings
    #[serde(skip)]
    pub fallback_reason: Option<String>,
}

fn default_controller_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_openflow_port() -> u16 {
    6633
}

fn default_rest_port() -> u16 {
    8181
}

fn default_switch_id() -> String {
    "openflow:1".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "admin".to_string()
}

fn default_fetch_timeout() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    5
}

fn default_link_delay() -> String {
    "10ms".to_string()
}

fn default_web_server_script() -> String {
    "./start_apache2_manually.sh".to_string()
}

fn default_browser_user() -> String {
    "ytovan".to_string()
}

fn default_video_url() -> String {
    "http://10.0.0.1/index.html".to_string()
}

fn default_join_timeout() -> u64 {
    1000
}

fn default_mininet_program() -> String {
    "mn".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            controller_ip: default_controller_ip(),
            openflow_port: default_openflow_port(),
            rest_port: default_rest_port(),
            switch_id: default_switch_id(),
            username: default_username(),
            password: default_password(),
            fetch_timeout_secs: default_fetch_timeout(),
            poll_interval_secs: default_poll_interval(),
            output_root: None,
            link_delay: default_link_delay(),
            web_server_script: default_web_server_script(),
            browser_user: default_browser_user(),
            video_url: default_video_url(),
            join_timeout_ms: default_join_timeout(),
            metrics_port: None,
            log_json: false,
            mininet_program: default_mininet_program(),
            fallback_reason: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from an optional file, then `SDN_HARNESS_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("SDN_HARNESS").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Ok(config.try_deserialize().unwrap_or_else(|e| HarnessConfig {
            fallback_reason: Some(e.to_string()),
            ..HarnessConfig::default()
        }))
    }

    /// Root for per-experiment output directories
    pub fn output_root(&self) -> PathBuf {
        self.output_root.clone().unwrap_or_else(|| {
            dirs_next::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("experiments")
        })
    }

    pub fn endpoint(&self) -> Result<ControllerEndpoint> {
        let endpoint = ControllerEndpoint::from_host_port(&self.controller_ip, self.rest_port)
            .context("Invalid controller address")?;

        Ok(endpoint
            .with_credentials(Credentials::new(&self.username, &self.password))
            .with_timeout(Duration::from_secs(self.fetch_timeout_secs)))
    }

    pub fn settings(&self, params: ExperimentParams) -> ExperimentSettings {
        let mut settings = ExperimentSettings::new(params, self.output_root());
        settings.link_delay = self.link_delay.clone();
        settings.controller = ControllerSpec {
            ip: self.controller_ip.clone(),
            port: self.openflow_port,
        };
        settings.monitor = MonitorConfig {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            switch_id: self.switch_id.clone(),
        };
        settings.hosts = HostCommands {
            start_web_server: format!("{} &", self.web_server_script),
            browser_user: self.browser_user.clone(),
            video_url: self.video_url.clone(),
            ..HostCommands::default()
        };
        settings.join_timeout = Duration::from_millis(self.join_timeout_ms);
        settings
    }
}
