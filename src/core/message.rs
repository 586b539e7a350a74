use serde::{Deserialize, Serialize};

use crate::core::attachment::Attachment;
use crate::utils::ids::{generate_id, now_millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_streaming: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            timestamp: now_millis(),
            attachments: Vec::new(),
            is_streaming: false,
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::new(Role::User, content)
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }
}

/// Append-only conversation log.
///
/// Only the content of a message flagged `is_streaming` can change, and only
/// until [`Conversation::finish_stream`] freezes it.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Append an empty model message in the streaming state and return its id.
    pub fn begin_model_stream(&mut self) -> String {
        let mut message = Message::model(String::new());
        message.is_streaming = true;
        self.push(message)
    }

    /// Replace the content of a streaming message with the latest snapshot.
    /// Returns false if the message is unknown or already frozen.
    pub fn update_stream(&mut self, id: &str, snapshot: &str) -> bool {
        match self.find_mut(id) {
            Some(message) if message.is_streaming => {
                message.content.clear();
                message.content.push_str(snapshot);
                true
            }
            _ => false,
        }
    }

    /// Clear the streaming flag. Returns true only for the call that actually
    /// performed the transition.
    pub fn finish_stream(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(message) if message.is_streaming => {
                message.is_streaming = false;
                true
            }
            _ => false,
        }
    }

    pub fn find(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent model message that has finished streaming.
    pub fn last_model_response(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Model && !m.is_streaming)
    }

    /// Drop all history and start over from a single message.
    pub fn reset_with(&mut self, message: Message) {
        self.messages.clear();
        self.messages.push(message);
    }
}
