//! Controller REST client for switch port statistics
//!
//! Queries the OpenDaylight operational inventory for one switch and turns
//! the nested connector counters into [`PortStatSample`]s. Every failure
//! (transport, status, payload) is folded into [`FetchOutcome::NotAvailable`]
//! at the [`StatsSource`] boundary, so callers only ever skip a tick.

use crate::models::{FetchOutcome, PortStatSample};
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_CONTROLLER_URL: &str = "http://127.0.0.1:8181";
pub const DEFAULT_SWITCH_ID: &str = "openflow:1";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

const INVENTORY_NODE_PATH: &str = "restconf/operational/opendaylight-inventory:nodes/node/";

/// Errors raised while querying the controller
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid controller URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("controller returned {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("malformed statistics payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP basic auth credentials for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("admin", "admin")
    }
}

/// Where and how to reach the controller's REST interface
#[derive(Debug, Clone)]
pub struct ControllerEndpoint {
    base_url: Url,
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl ControllerEndpoint {
    /// Parse a base URL such as `http://127.0.0.1:8181`
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            credentials: Credentials::default(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Plain HTTP endpoint from a host and REST port
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, FetchError> {
        Self::new(&format!("http://{}:{}", host, port))
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Inventory URL for a single switch
    pub fn node_url(&self, switch_id: &str) -> Result<Url, FetchError> {
        Ok(self
            .base_url
            .join(&format!("{}{}", INVENTORY_NODE_PATH, switch_id))?)
    }
}

/// Source of per-port statistics for a switch
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Query once; failures come back as [`FetchOutcome::NotAvailable`]
    async fn fetch(&self, switch_id: &str) -> FetchOutcome;
}

/// [`StatsSource`] backed by the OpenDaylight RESTCONF API
pub struct OpenDaylightFetcher {
    client: Client,
    endpoint: ControllerEndpoint,
}

impl OpenDaylightFetcher {
    pub fn new(endpoint: ControllerEndpoint) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &ControllerEndpoint {
        &self.endpoint
    }

    /// Query the controller, surfacing the precise failure
    pub async fn try_fetch(&self, switch_id: &str) -> Result<Vec<PortStatSample>, FetchError> {
        let url = self.endpoint.node_url(switch_id)?;
        let credentials = &self.endpoint.credentials;

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let samples = parse_node_response(&body)?;
        debug!(switch_id = %switch_id, ports = samples.len(), "Fetched port statistics");
        Ok(samples)
    }
}

#[async_trait]
impl StatsSource for OpenDaylightFetcher {
    async fn fetch(&self, switch_id: &str) -> FetchOutcome {
        match self.try_fetch(switch_id).await {
            Ok(samples) => FetchOutcome::Stats(samples),
            Err(e) => {
                warn!(switch_id = %switch_id, error = %e, "Failed to query controller");
                FetchOutcome::not_available(e.to_string())
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct NodeResponse {
    #[serde(default)]
    node: Vec<Node>,
}

#[derive(Debug, Default, Deserialize)]
struct Node {
    #[serde(default, rename = "node-connector")]
    node_connector: Vec<NodeConnector>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeConnector {
    #[serde(default)]
    id: Option<String>,
    #[serde(
        default,
        rename = "opendaylight-port-statistics:flow-capable-node-connector-statistics"
    )]
    statistics: ConnectorStatistics,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectorStatistics {
    #[serde(default)]
    packets: Counters,
    #[serde(default)]
    bytes: Counters,
    #[serde(default)]
    duration: Uptime,
}

#[derive(Debug, Default, Deserialize)]
struct Counters {
    #[serde(default)]
    transmitted: u64,
    #[serde(default)]
    received: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Uptime {
    #[serde(default)]
    second: u64,
}

/// Decode an inventory node document into samples, in connector order.
///
/// Missing fields count as zero; a missing or empty `node` array yields no samples.
pub fn parse_node_response(body: &[u8]) -> Result<Vec<PortStatSample>, serde_json::Error> {
    let response: NodeResponse = serde_json::from_slice(body)?;

    let connectors = response
        .node
        .into_iter()
        .next()
        .map(|node| node.node_connector)
        .unwrap_or_default();

    Ok(connectors
        .into_iter()
        .map(|connector| {
            let stats = connector.statistics;
            PortStatSample::from_counters(
                connector.id.unwrap_or_else(|| "Unknown".to_string()),
                stats.bytes.transmitted,
                stats.bytes.received,
                stats.packets.transmitted,
                stats.packets.received,
                stats.duration.second,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PORTS: &str = r#"{
        "node": [{
            "id": "openflow:1",
            "node-connector": [
                {
                    "id": "openflow:1:2",
                    "opendaylight-port-statistics:flow-capable-node-connector-statistics": {
                        "packets": {"transmitted": 400, "received": 300},
                        "bytes": {"transmitted": 52000, "received": 41000},
                        "duration": {"second": 120, "nanosecond": 5000}
                    }
                },
                {
                    "id": "openflow:1:1",
                    "opendaylight-port-statistics:flow-capable-node-connector-statistics": {
                        "packets": {"transmitted": 0, "received": 17},
                        "bytes": {"transmitted": 0, "received": 1200},
                        "duration": {"second": 119}
                    }
                }
            ]
        }]
    }"#;

    #[test]
    fn test_parse_keeps_connector_order() {
        let samples = parse_node_response(TWO_PORTS.as_bytes()).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].port_id, "openflow:1:2");
        assert_eq!(samples[1].port_id, "openflow:1:1");

        assert_eq!(samples[0].bytes_sent, 52000);
        assert_eq!(samples[0].bytes_received, 41000);
        assert_eq!(samples[0].packets_sent, 400);
        assert_eq!(samples[0].packets_received, 300);
        assert_eq!(samples[0].duration_sec, 120);
        assert!((samples[0].packet_loss_pct - 25.0).abs() < 1e-9);

        // nothing transmitted
        assert_eq!(samples[1].packet_loss_pct, 0.0);
    }

    #[test]
    fn test_parse_missing_fields_default_to_zero() {
        let body = r#"{"node": [{"node-connector": [{"id": "LOCAL"}, {}]}]}"#;
        let samples = parse_node_response(body.as_bytes()).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].port_id, "LOCAL");
        assert_eq!(samples[0].bytes_sent, 0);
        assert_eq!(samples[0].duration_sec, 0);
        assert_eq!(samples[1].port_id, "Unknown");
    }

    #[test]
    fn test_parse_without_node_is_empty() {
        assert!(parse_node_response(b"{}").unwrap().is_empty());
        assert!(parse_node_response(br#"{"node": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_payload() {
        assert!(parse_node_response(b"<html>oops</html>").is_err());
        assert!(parse_node_response(br#"{"node": [{"node-connector": [{"opendaylight-port-statistics:flow-capable-node-connector-statistics": {"packets": {"transmitted": -1}}}]}]}"#).is_err());
    }

    #[test]
    fn test_node_url() {
        let endpoint = ControllerEndpoint::from_host_port("127.0.0.1", 8181).unwrap();
        assert_eq!(
            endpoint.node_url("openflow:1").unwrap().as_str(),
            "http://127.0.0.1:8181/restconf/operational/opendaylight-inventory:nodes/node/openflow:1"
        );
    }

    #[test]
    fn test_node_url_keeps_base_path() {
        let endpoint = ControllerEndpoint::new("http://controller:8181/odl").unwrap();
        assert_eq!(
            endpoint.node_url("openflow:7").unwrap().as_str(),
            "http://controller:8181/odl/restconf/operational/opendaylight-inventory:nodes/node/openflow:7"
        );
    }

    #[test]
    fn test_endpoint_defaults() {
        let endpoint = ControllerEndpoint::new(DEFAULT_CONTROLLER_URL).unwrap();
        assert_eq!(endpoint.credentials, Credentials::new("admin", "admin"));
        assert_eq!(endpoint.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            ControllerEndpoint::new("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
