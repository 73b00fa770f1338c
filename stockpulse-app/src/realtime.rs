//! WebSocket event source for live agent activity.
//!
//! One connection per session, opened at `{endpoint}?sessionId={id}`. Each
//! text frame carries one JSON event. Frames that fail to decode are logged
//! and skipped. There is no reconnect; a dropped connection ends the stream.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Url;
use stockpulse_core::{AgentEvent, BackendError, StreamError};
use stockpulse_events::{EventSource, EventStream};
use stockpulse_scheduler::build_auth_headers;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WsEventSource {
    endpoint: String,
    auth_header: HeaderMap,
}

impl WsEventSource {
    pub fn new(endpoint: &str, api_key: Option<&str>) -> Result<Self, BackendError> {
        Ok(Self {
            endpoint: endpoint.to_string(),
            auth_header: build_auth_headers(api_key)?,
        })
    }

    /// Endpoint URL scoped to `session_id`.
    pub fn session_url(&self, session_id: &str) -> Result<Url, StreamError> {
        Url::parse_with_params(&self.endpoint, &[("sessionId", session_id)]).map_err(|e| {
            StreamError::Connect {
                session_id: session_id.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl EventSource for WsEventSource {
    async fn open(&self, session_id: &str) -> Result<EventStream, StreamError> {
        let connect_error = |reason: String| StreamError::Connect {
            session_id: session_id.to_string(),
            reason,
        };

        let url = self.session_url(session_id)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_error(e.to_string()))?;
        let headers = request.headers_mut();
        for (name, value) in self.auth_header.iter() {
            headers.insert(name, value.clone());
        }

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        debug!(session_id, "Event stream connected");

        let session = session_id.to_string();
        let events = stream.filter_map(move |message| {
            let session = session.clone();
            async move {
                match message {
                    Ok(Message::Text(text)) => match AgentEvent::decode(&text) {
                        Ok(event) => Some(Ok(event)),
                        Err(err) => {
                            warn!(session_id = %session, error = %err, "Skipping undecodable event frame");
                            None
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        debug!(session_id = %session, frame = ?frame, "Event stream close frame");
                        None
                    }
                    Ok(_) => None,
                    Err(err) => Some(Err(StreamError::Transport(err.to_string()))),
                }
            }
        });
        Ok(events.boxed())
    }
}
