//! HTTP transport: posts tickets to the router and agent services.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::traits::AgentTransport;
use crate::agents::{HandleRequest, HandleResponse};
use crate::config::{EndpointsConfig, TransportConfig};
use crate::routing::RouteResponse;
use crate::tickets::Ticket;

const MAX_ERROR_BODY_CHARS: usize = 200;
const ROUTER_ENDPOINT: &str = "router";

/// Endpoint key for an agent name: `technical_agent` → `technical`.
pub fn endpoint_key(agent: &str) -> &str {
    agent.strip_suffix("_agent").unwrap_or(agent)
}

/// Truncate an error body at a char boundary.
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{truncated}...")
}

/// Build an error from a non-success response, preferring the service's
/// `{"error": ...}` message over the raw body.
async fn service_error(url: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read response body>".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    anyhow::anyhow!("{url} returned {status}: {}", truncate_body(&message))
}

pub struct HttpTransport {
    client: Client,
    endpoints: BTreeMap<String, String>,
}

impl HttpTransport {
    pub fn new(endpoints: &EndpointsConfig, transport: &TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(transport.request_timeout_secs))
            .connect_timeout(Duration::from_secs(transport.connect_timeout_secs))
            .build()
            .context("failed to build HTTP transport client")?;
        Ok(Self {
            client,
            endpoints: endpoints.table(),
        })
    }

    fn endpoint(&self, key: &str) -> Result<&str> {
        self.endpoints
            .get(key)
            .map(|url| url.trim_end_matches('/'))
            .with_context(|| format!("no endpoint configured for '{key}'"))
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        if !response.status().is_success() {
            return Err(service_error(url, response).await);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("invalid response body from {url}"))
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn route(&self, ticket: &Ticket) -> Result<RouteResponse> {
        let url = format!("{}/route_ticket", self.endpoint(ROUTER_ENDPOINT)?);
        self.post(&url, ticket).await
    }

    async fn handle(&self, agent: &str, ticket: &Ticket) -> Result<HandleResponse> {
        let url = format!("{}/handle_ticket", self.endpoint(endpoint_key(agent))?);
        let request = HandleRequest {
            ticket: ticket.clone(),
        };
        self.post(&url, &request).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
