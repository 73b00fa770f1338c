//! HTTP client for the agent-invocation service.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;
use stockpulse_core::{AgentInvoker, BackendError, InvocationResponse};
use stockpulse_scheduler::{build_auth_headers, endpoint, parse_base_url};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Clone)]
pub struct AgentClient {
    client: reqwest::Client,
    base_url: Url,
    auth_header: HeaderMap,
}

impl AgentClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            auth_header: build_auth_headers(api_key)?,
        })
    }

    async fn parse_response(
        &self,
        response: reqwest::Response,
    ) -> Result<InvocationResponse, BackendError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let decoded = serde_json::from_str::<InvocationResponse>(&text);

        if status.is_success() {
            return decoded.map_err(|e| BackendError::Malformed(e.to_string()));
        }
        match decoded {
            // Error bodies that still carry the envelope are structured failures.
            Ok(mut envelope) => {
                envelope.success = false;
                Ok(envelope)
            }
            Err(_) => Err(BackendError::Rejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            ))),
        }
    }
}

#[async_trait]
impl AgentInvoker for AgentClient {
    async fn invoke(
        &self,
        message: &str,
        agent_id: &str,
    ) -> Result<InvocationResponse, BackendError> {
        let url = endpoint(&self.base_url, &["agents", agent_id, "invoke"])?;
        info!(agent_id, "Invoking agent");
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .json(&InvokeRequest { message })
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let envelope = self.parse_response(response).await?;
        debug!(
            agent_id,
            success = envelope.success,
            session_id = ?envelope.session_id,
            "Agent invocation returned"
        );
        Ok(envelope)
    }
}
