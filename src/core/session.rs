//! Persona-bound chat sessions.
//!
//! A [`ChatSession`] pairs a persona with one model-side conversation
//! handle. The [`SessionManager`] keeps at most one of them alive and opens a
//! fresh one whenever the requested persona differs from the current one.
//! Sessions are cheap to clone, so a send captures the session it started
//! with and keeps using it even if the manager replaces it afterwards.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::core::message::Role;
use crate::core::persona::PersonaId;
use crate::core::transport::{
    ChatHandle, ModelTransport, SeedTurn, SessionConfig, TransportError,
};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Canned opening exchange seeded into every new session.
pub const SEED_USER_GREETING: &str = "Xin chào! Tôi đã sẵn sàng viết code.";
pub const SEED_MODEL_ACKNOWLEDGEMENT: &str =
    "Hệ thống đã trực tuyến. Hãy cùng xây dựng điều gì đó tuyệt vời.";

#[derive(Clone)]
pub struct ChatSession {
    persona: PersonaId,
    generation: u64,
    handle: Arc<dyn ChatHandle>,
}

impl ChatSession {
    pub fn persona(&self) -> PersonaId {
        self.persona
    }

    /// Monotonic counter identifying which opening produced this session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle(&self) -> &dyn ChatHandle {
        self.handle.as_ref()
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("persona", &self.persona)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub persona: PersonaId,
    pub source: TransportError,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to open a {} session: {}",
            self.persona, self.source
        )
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Build the configuration used to open a session for `persona`.
pub fn session_config(persona: PersonaId, temperature: f32) -> SessionConfig {
    SessionConfig {
        system_instruction: persona.persona().system_instruction.to_string(),
        temperature,
        seed_history: vec![
            SeedTurn {
                role: Role::User,
                text: SEED_USER_GREETING.to_string(),
            },
            SeedTurn {
                role: Role::Model,
                text: SEED_MODEL_ACKNOWLEDGEMENT.to_string(),
            },
        ],
    }
}

pub struct SessionManager {
    transport: Arc<dyn ModelTransport>,
    temperature: f32,
    current: Option<ChatSession>,
    opened: u64,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn ModelTransport>) -> Self {
        Self::with_temperature(transport, DEFAULT_TEMPERATURE)
    }

    pub fn with_temperature(transport: Arc<dyn ModelTransport>, temperature: f32) -> Self {
        Self {
            transport,
            temperature,
            current: None,
            opened: 0,
        }
    }

    /// Return a live session bound to `persona`, opening a new one if there
    /// is none or the current one belongs to another persona.
    pub async fn ensure_session(
        &mut self,
        persona: PersonaId,
    ) -> Result<ChatSession, SessionError> {
        if let Some(session) = &self.current {
            if session.persona == persona {
                return Ok(session.clone());
            }
        }

        // Release the previous handle before opening its replacement.
        if let Some(previous) = self.current.take() {
            debug!(
                from = %previous.persona,
                to = %persona,
                generation = previous.generation,
                "Replacing chat session"
            );
        }

        let config = session_config(persona, self.temperature);
        let handle = self
            .transport
            .open_session(config)
            .await
            .map_err(|source| SessionError { persona, source })?;

        self.opened += 1;
        let session = ChatSession {
            persona,
            generation: self.opened,
            handle,
        };
        debug!(persona = %persona, generation = session.generation, "Opened chat session");
        self.current = Some(session.clone());
        Ok(session)
    }

    pub fn current(&self) -> Option<&ChatSession> {
        self.current.as_ref()
    }

    /// Drop the current session; the next send opens a new one.
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn sessions_opened(&self) -> u64 {
        self.opened
    }
}
