//! Inbound request/response bodies for the proxy surface.

use serde::{Deserialize, Serialize};

use crate::ChatTurn;

/// Request body for `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,

    /// A short model code (`"1"`..`"4"`) or a full model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Opaque session id from an earlier reply. Absent means a new session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// When true, the reply is forwarded incrementally instead of buffered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Buffered reply body for `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    /// Approximate cumulative token count for the session.
    pub tokens: u64,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// Request body for `POST /v1/chat/completions`.
///
/// This surface takes the full turn list and a model *name* (no code
/// aliasing); it is stateless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionsRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// JSON error envelope returned on any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
