//! Sends a composed turn over a session and folds the streamed reply into
//! cumulative text.

use tracing::{debug, warn};

use crate::core::compose::MessagePayload;
use crate::core::session::ChatSession;
use crate::core::transport::{StreamMessage, TransportError};

/// Shown in place of the model's reply when a send fails.
pub const STREAM_FALLBACK_MESSAGE: &str = "Lỗi: Không thể kết nối với máy chủ. Vui lòng kiểm tra khóa API, file đính kèm hoặc kết nối mạng của bạn.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed(String),
    Failed {
        fallback: String,
        error: TransportError,
    },
}

impl DispatchOutcome {
    /// Text to display for this turn: the full reply or the fallback message.
    pub fn text(&self) -> &str {
        match self {
            DispatchOutcome::Completed(text) => text,
            DispatchOutcome::Failed { fallback, .. } => fallback,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            DispatchOutcome::Completed(text) => text,
            DispatchOutcome::Failed { fallback, .. } => fallback,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed(_))
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            DispatchOutcome::Completed(_) => None,
            DispatchOutcome::Failed { error, .. } => Some(error),
        }
    }
}

/// Running reply text, accepting either incremental or cumulative chunks.
#[derive(Debug, Default)]
pub struct CumulativeText {
    text: String,
}

impl CumulativeText {
    /// Fold one chunk in. Returns true if the visible text changed.
    pub fn apply(&mut self, message: &StreamMessage) -> bool {
        match message {
            StreamMessage::Delta(delta) if !delta.is_empty() => {
                self.text.push_str(delta);
                true
            }
            StreamMessage::Snapshot(snapshot) if snapshot != &self.text => {
                self.text.clear();
                self.text.push_str(snapshot);
                true
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Send `payload` on `session` and stream the reply.
///
/// `on_chunk` receives the full text received so far on every change, so
/// callers replace their displayed buffer rather than appending to it.
/// Transport failures never escape: they resolve to
/// [`DispatchOutcome::Failed`] carrying [`STREAM_FALLBACK_MESSAGE`].
pub async fn dispatch<F>(
    session: &ChatSession,
    payload: MessagePayload,
    mut on_chunk: F,
) -> DispatchOutcome
where
    F: FnMut(&str),
{
    let mut rx = session.handle().send_stream(payload);
    let mut reply = CumulativeText::default();
    let mut chunks = 0usize;

    let error = loop {
        match rx.recv().await {
            Some(StreamMessage::End) => {
                debug!(
                    persona = %session.persona(),
                    generation = session.generation(),
                    chunks,
                    "Stream completed"
                );
                return DispatchOutcome::Completed(reply.into_string());
            }
            Some(StreamMessage::Error(err)) => break err,
            Some(message) => {
                if reply.apply(&message) {
                    chunks += 1;
                    on_chunk(reply.as_str());
                }
            }
            None => break TransportError::Interrupted,
        }
    };

    warn!(
        persona = %session.persona(),
        generation = session.generation(),
        chunks,
        error = %error,
        "Stream failed"
    );
    DispatchOutcome::Failed {
        fallback: STREAM_FALLBACK_MESSAGE.to_string(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persona::PersonaId;
    use crate::core::session::SessionManager;
    use crate::utils::test_utils::MockTransport;
    use std::sync::Arc;

    async fn session_with(transport: &MockTransport) -> ChatSession {
        let mut manager = SessionManager::new(Arc::new(transport.clone()));
        manager.ensure_session(PersonaId::Chill).await.unwrap()
    }

    #[tokio::test]
    async fn deltas_are_delivered_as_cumulative_text() {
        let transport = MockTransport::new();
        transport.script_reply(vec![
            StreamMessage::Delta("Hel".into()),
            StreamMessage::Delta("lo".into()),
            StreamMessage::Delta(" world".into()),
            StreamMessage::End,
        ]);
        let session = session_with(&transport).await;

        let mut seen = Vec::new();
        let outcome = dispatch(
            &session,
            MessagePayload::PlainText("hi".into()),
            |text| seen.push(text.to_string()),
        )
        .await;

        assert_eq!(seen, vec!["Hel", "Hello", "Hello world"]);
        assert_eq!(outcome, DispatchOutcome::Completed("Hello world".into()));
        assert_eq!(
            transport.sent_payloads(),
            vec![(1, MessagePayload::PlainText("hi".into()))]
        );
    }

    #[tokio::test]
    async fn snapshots_replace_running_text() {
        let transport = MockTransport::new();
        transport.script_reply(vec![
            StreamMessage::Snapshot("A".into()),
            StreamMessage::Snapshot("AB".into()),
            StreamMessage::Snapshot("AB".into()),
            StreamMessage::Snapshot("ABC".into()),
            StreamMessage::End,
        ]);
        let session = session_with(&transport).await;

        let mut seen = Vec::new();
        let outcome = dispatch(&session, MessagePayload::PlainText("x".into()), |text| {
            seen.push(text.to_string())
        })
        .await;

        assert_eq!(seen, vec!["A", "AB", "ABC"]);
        assert_eq!(outcome.text(), "ABC");
    }

    #[tokio::test]
    async fn mid_stream_error_resolves_to_fallback() {
        let transport = MockTransport::new();
        transport.script_reply(vec![
            StreamMessage::Delta("partial".into()),
            StreamMessage::Error(TransportError::Network("reset".into())),
        ]);
        let session = session_with(&transport).await;

        let outcome = dispatch(&session, MessagePayload::PlainText("x".into()), |_| {}).await;

        assert!(!outcome.is_completed());
        assert_eq!(outcome.text(), STREAM_FALLBACK_MESSAGE);
        assert_eq!(
            outcome.error(),
            Some(&TransportError::Network("reset".into()))
        );
    }

    #[tokio::test]
    async fn closed_channel_without_end_is_interrupted() {
        let transport = MockTransport::new();
        transport.script_reply(vec![StreamMessage::Delta("cut".into())]);
        let session = session_with(&transport).await;

        let outcome = dispatch(&session, MessagePayload::PlainText("x".into()), |_| {}).await;
        assert_eq!(outcome.error(), Some(&TransportError::Interrupted));
    }

    #[tokio::test]
    async fn empty_reply_completes_with_empty_text() {
        let transport = MockTransport::new();
        transport.script_reply(vec![StreamMessage::End]);
        let session = session_with(&transport).await;

        let mut calls = 0;
        let outcome =
            dispatch(&session, MessagePayload::PlainText("x".into()), |_| calls += 1).await;
        assert_eq!(calls, 0);
        assert_eq!(outcome, DispatchOutcome::Completed(String::new()));
    }

    #[tokio::test]
    async fn in_flight_send_uses_captured_session() {
        let transport = MockTransport::new();
        transport.script_reply(vec![StreamMessage::Delta("old".into()), StreamMessage::End]);
        let mut manager = SessionManager::new(Arc::new(transport.clone()));
        let captured = manager.ensure_session(PersonaId::Chill).await.unwrap();

        // Persona switch replaces the manager's session before the send runs.
        manager.ensure_session(PersonaId::Cyberpunk).await.unwrap();

        let outcome = dispatch(&captured, MessagePayload::PlainText("q".into()), |_| {}).await;
        assert_eq!(outcome.text(), "old");
        assert_eq!(transport.sent_payloads()[0].0, captured.generation());
        assert_eq!(manager.current().unwrap().generation(), 2);
    }
}
