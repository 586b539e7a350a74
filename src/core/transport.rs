//! Seam between the chat core and a hosted model service.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::core::compose::MessagePayload;
use crate::core::message::Role;

#[derive(Debug, Clone, PartialEq)]
pub struct SeedTurn {
    pub role: Role,
    pub text: String,
}

/// Everything needed to open a conversation with the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub system_instruction: String,
    pub temperature: f32,
    pub seed_history: Vec<SeedTurn>,
}

/// One event of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Text produced since the previous chunk.
    Delta(String),
    /// Entire text produced so far.
    Snapshot(String),
    Error(TransportError),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    MissingApiKey,
    Network(String),
    Api { status: Option<u16>, message: String },
    /// The service answered with something that could not be parsed.
    Malformed(String),
    /// The stream closed before signalling completion.
    Interrupted,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::MissingApiKey => write!(
                f,
                "No API key configured (set GEMINI_API_KEY or run `vibecode auth`)"
            ),
            TransportError::Network(detail) => write!(f, "Network error: {detail}"),
            TransportError::Api {
                status: Some(status),
                message,
            } => write!(f, "HTTP {status}: {message}"),
            TransportError::Api {
                status: None,
                message,
            } => f.write_str(message),
            TransportError::Malformed(detail) => write!(f, "Malformed response: {detail}"),
            TransportError::Interrupted => write!(f, "Stream ended unexpectedly"),
        }
    }
}

impl StdError for TransportError {}

/// A live conversation on the model side.
///
/// The handle owns the model-side history; each `send_stream` call submits
/// one user turn and streams the reply back over the returned channel.
pub trait ChatHandle: Send + Sync {
    fn send_stream(&self, payload: MessagePayload) -> mpsc::UnboundedReceiver<StreamMessage>;
}

#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn open_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<dyn ChatHandle>, TransportError>;
}
