//! Consul agent registration.
//!
//! Best effort: failures are logged by the caller and never stop the relay.

use serde::Serialize;

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;

const SERVICE_ID: &str = "sms";
const SERVICE_NAME: &str = "sms-service";
const SERVICE_ADDRESS: &str = "sms";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Registration {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    address: String,
    port: u16,
    check: HttpCheck,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct HttpCheck {
    #[serde(rename = "HTTP")]
    http: String,
    interval: String,
    timeout: String,
}

/// Registers this service with a Consul agent.
pub struct ServiceRegistry {
    agent_url: String,
    service_port: u16,
    client: reqwest::Client,
}

impl ServiceRegistry {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self::with_agent_url(config.agent_url(), config.service_port)
    }

    pub fn with_agent_url(agent_url: impl Into<String>, service_port: u16) -> Self {
        Self {
            agent_url: agent_url.into().trim_end_matches('/').to_string(),
            service_port,
            client: reqwest::Client::new(),
        }
    }

    pub fn service_id(&self) -> &str {
        SERVICE_ID
    }

    fn registration(&self) -> Registration {
        Registration {
            id: SERVICE_ID.into(),
            name: SERVICE_NAME.into(),
            address: SERVICE_ADDRESS.into(),
            port: self.service_port,
            check: HttpCheck {
                http: format!("http://{SERVICE_ADDRESS}:{}/health", self.service_port),
                interval: "10s".into(),
                timeout: "5s".into(),
            },
        }
    }

    /// Register the service and its HTTP health check.
    pub async fn register(&self) -> Result<(), DiscoveryError> {
        let url = format!("{}/v1/agent/service/register", self.agent_url);
        let resp = self
            .client
            .put(url)
            .json(&self.registration())
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;
        check_status(resp).await
    }

    /// Remove the service from the agent.
    pub async fn deregister(&self) -> Result<(), DiscoveryError> {
        let url = format!("{}/v1/agent/service/deregister/{SERVICE_ID}", self.agent_url);
        let resp = self
            .client
            .put(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;
        check_status(resp).await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<(), DiscoveryError> {
    if resp.status().is_success() {
        return Ok(());
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(DiscoveryError::Rejected { status, body })
}
