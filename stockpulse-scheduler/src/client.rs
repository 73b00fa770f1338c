//! HTTP client for the remote scheduler.

use crate::api::ScheduleApi;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use stockpulse_core::{
    recent_window, BackendError, ExecutionLog, Schedule, ScheduleError, ScheduleFilter,
};
use tracing::debug;

/// Uniform response body; anything but `success: true` is a failure.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    schedules: Option<Vec<Schedule>>,
    #[serde(default)]
    schedule: Option<Schedule>,
    #[serde(default)]
    executions: Option<Vec<ExecutionLog>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleClient {
    client: reqwest::Client,
    base_url: Url,
    auth_header: HeaderMap,
}

impl ScheduleClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            auth_header: build_auth_headers(api_key)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `schedule_id` names the resource a 404 refers to, if any.
    async fn get_json<Q>(
        &self,
        segments: &[&str],
        schedule_id: Option<&str>,
        query: Option<&Q>,
    ) -> Result<Envelope, ScheduleError>
    where
        Q: serde::Serialize + ?Sized,
    {
        let url = endpoint(&self.base_url, segments)?;
        let mut request = self.client.get(url).headers(self.auth_header.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await.map_err(transport)?;
        self.parse_response(schedule_id, response).await
    }

    async fn post_empty(
        &self,
        segments: &[&str],
        schedule_id: &str,
    ) -> Result<Envelope, ScheduleError> {
        let url = endpoint(&self.base_url, segments)?;
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .send()
            .await
            .map_err(transport)?;
        self.parse_response(Some(schedule_id), response).await
    }

    async fn parse_response(
        &self,
        schedule_id: Option<&str>,
        response: reqwest::Response,
    ) -> Result<Envelope, ScheduleError> {
        let status = response.status();
        let path = response.url().path().to_string();
        let text = response.text().await.map_err(transport)?;
        debug!(path = %path, status = status.as_u16(), "Scheduler responded");

        if status == StatusCode::NOT_FOUND {
            if let Some(schedule_id) = schedule_id {
                return Err(ScheduleError::NotFound {
                    schedule_id: schedule_id.to_string(),
                });
            }
        }

        let envelope = serde_json::from_str::<Envelope>(&text);
        if !status.is_success() {
            let message = envelope
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), text));
            return Err(BackendError::Rejected(message).into());
        }

        let envelope =
            envelope.map_err(|e| ScheduleError::from(BackendError::Malformed(e.to_string())))?;
        if envelope.success != Some(true) {
            return Err(BackendError::Rejected(envelope.error.unwrap_or_default()).into());
        }
        Ok(envelope)
    }
}

#[async_trait]
impl ScheduleApi for ScheduleClient {
    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, ScheduleError> {
        let envelope = self.get_json(&["schedules"], None, Some(filter)).await?;
        let mut schedules = envelope.schedules.unwrap_or_default();
        schedules.retain(|schedule| filter.matches(schedule));
        Ok(schedules)
    }

    async fn get(&self, schedule_id: &str) -> Result<Schedule, ScheduleError> {
        self.get_json::<()>(&["schedules", schedule_id], Some(schedule_id), None)
            .await?
            .schedule
            .ok_or_else(|| missing("schedule"))
    }

    async fn pause(&self, schedule_id: &str) -> Result<(), ScheduleError> {
        self.post_empty(&["schedules", schedule_id, "pause"], schedule_id)
            .await
            .map(|_| ())
    }

    async fn resume(&self, schedule_id: &str) -> Result<(), ScheduleError> {
        self.post_empty(&["schedules", schedule_id, "resume"], schedule_id)
            .await
            .map(|_| ())
    }

    async fn logs(
        &self,
        schedule_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, ScheduleError> {
        let envelope = self
            .get_json(
                &["schedules", schedule_id, "executions"],
                Some(schedule_id),
                Some(&[("limit", limit)]),
            )
            .await?;
        Ok(recent_window(envelope.executions.unwrap_or_default(), limit))
    }
}

/// `x-api-key` header map; empty when no key is configured.
pub fn build_auth_headers(api_key: Option<&str>) -> Result<HeaderMap, BackendError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key)
                .map_err(|e| BackendError::Transport(format!("invalid api key header: {}", e)))?,
        );
    }
    Ok(headers)
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

fn missing(field: &str) -> ScheduleError {
    BackendError::Malformed(format!("response has no `{}`", field)).into()
}

/// Parse a service base URL; a trailing slash is optional.
pub fn parse_base_url(raw: &str) -> Result<Url, BackendError> {
    let url = Url::parse(raw)
        .map_err(|e| BackendError::Transport(format!("invalid base url {}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(BackendError::Transport(format!("invalid base url {}", raw)));
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| BackendError::Transport(format!("invalid base url {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = parse_base_url("http://scheduler.local/api/").unwrap();
        assert_eq!(
            endpoint(&base, &["schedules", "S1", "pause"]).unwrap().as_str(),
            "http://scheduler.local/api/schedules/S1/pause"
        );
        assert_eq!(
            endpoint(&base, &["schedules", "a/b c"]).unwrap().as_str(),
            "http://scheduler.local/api/schedules/a%2Fb%20c"
        );
        let root = parse_base_url("http://scheduler.local").unwrap();
        assert_eq!(
            endpoint(&root, &["schedules"]).unwrap().as_str(),
            "http://scheduler.local/schedules"
        );
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_auth_headers() {
        assert!(build_auth_headers(None).unwrap().is_empty());
        let headers = build_auth_headers(Some("secret")).unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        assert!(build_auth_headers(Some("bad\nkey")).is_err());
    }
}
