//! Agent Event Types
//!
//! Tagged events pushed on the live, session-scoped activity stream while an
//! agent run executes. Events are ordered by arrival only; there is no logical
//! clock on the wire.

use serde::{Deserialize, Serialize};

/// One unit on the live stream.
///
/// Wire form: `{"kind": "status" | "thinking", "agentId": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Who is currently acting and whether it is busy.
    Status(StatusEvent),
    /// Narration of the agent's reasoning.
    Thinking(ThinkingEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// Absent when the frame only announces who is acting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub agent_id: String,
    #[serde(default)]
    pub message: String,
}

impl AgentEvent {
    pub fn status(agent_id: impl Into<String>, agent_name: Option<&str>, processing: bool) -> Self {
        Self::Status(StatusEvent {
            id: None,
            agent_id: agent_id.into(),
            agent_name: agent_name.map(str::to_string),
            processing: Some(processing),
        })
    }

    pub fn thinking(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Thinking(ThinkingEvent {
            id: None,
            agent_id: agent_id.into(),
            message: message.into(),
        })
    }

    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Optional server-assigned id used for de-duplication.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Status(e) => e.id.as_deref(),
            Self::Thinking(e) => e.id.as_deref(),
        }
    }

    pub fn agent_id(&self) -> &str {
        match self {
            Self::Status(e) => &e.agent_id,
            Self::Thinking(e) => &e.agent_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Thinking(_) => "thinking",
        }
    }
}
