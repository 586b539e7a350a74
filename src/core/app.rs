//! Chat controller tying personas, sessions, attachments and snippets
//! together. Front ends drive it and render its [`Conversation`].

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::attachment::{
    encode_batch, encode_clipboard, Attachment, BatchNotice, ClipboardItem, FileInput,
};
use crate::core::chat_stream::{dispatch, DispatchOutcome};
use crate::core::code_blocks::{extract_code_blocks, CodeBlock};
use crate::core::compose::{compose, ComposeError, Submission};
use crate::core::message::{Conversation, Message};
use crate::core::persona::PersonaId;
use crate::core::session::{SessionError, SessionManager};
use crate::core::snippets::{Snippet, SnippetStore};
use crate::core::storage::StorageError;
use crate::core::transport::ModelTransport;
use crate::utils::logging::LoggingState;

/// Message that replaces the conversation after `/clear`.
pub const MEMORY_CLEARED_MESSAGE: &str = "Bộ nhớ đã bị xóa. Sẵn sàng cho dữ liệu mới.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub user_message_id: String,
    pub reply_message_id: String,
    pub dispatch: DispatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Empty(ComposeError),
    Session(SessionError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Empty(err) => write!(f, "{err}"),
            SubmitError::Session(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Empty(err) => Some(err),
            SubmitError::Session(err) => Some(err),
        }
    }
}

impl From<ComposeError> for SubmitError {
    fn from(err: ComposeError) -> Self {
        SubmitError::Empty(err)
    }
}

impl From<SessionError> for SubmitError {
    fn from(err: SessionError) -> Self {
        SubmitError::Session(err)
    }
}

/// Settles the streaming reply when dropped, so a send that panics or is
/// abandoned mid-stream never leaves the reply or the app loading.
struct ReplyInFlight<'a> {
    conversation: &'a mut Conversation,
    is_loading: &'a mut bool,
    id: &'a str,
}

impl Drop for ReplyInFlight<'_> {
    fn drop(&mut self) {
        self.conversation.finish_stream(self.id);
        *self.is_loading = false;
    }
}

pub struct ChatApp {
    persona: PersonaId,
    sessions: SessionManager,
    conversation: Conversation,
    pending: Vec<Attachment>,
    snippets: SnippetStore,
    logging: LoggingState,
    is_loading: bool,
}

impl ChatApp {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        snippets: SnippetStore,
        persona: PersonaId,
        temperature: f32,
    ) -> Self {
        let mut conversation = Conversation::new();
        conversation.push(Message::model(persona.persona().greeting()));

        Self {
            persona,
            sessions: SessionManager::with_temperature(transport, temperature),
            conversation,
            pending: Vec::new(),
            snippets,
            logging: LoggingState::disabled(),
            is_loading: false,
        }
    }

    pub fn with_logging(mut self, logging: LoggingState) -> Self {
        self.logging = logging;
        self
    }

    pub fn persona(&self) -> PersonaId {
        self.persona
    }

    /// Switch personas. History is kept; a notification is appended and the
    /// next send opens a session for the new persona. Returns false when
    /// `persona` is already active.
    pub fn set_persona(&mut self, persona: PersonaId) -> bool {
        if persona == self.persona {
            return false;
        }
        debug!(from = %self.persona, to = %persona, "Persona switched");
        self.persona = persona;
        let notice = Message::model(persona.persona().switch_notification());
        self.log(&notice);
        self.conversation.push(notice);
        true
    }

    /// Encode files into pending attachments. Returns the notices for files
    /// that were skipped or dropped.
    pub fn add_files(&mut self, inputs: Vec<FileInput>) -> Vec<BatchNotice> {
        let batch = encode_batch(inputs);
        self.pending.extend(batch.attachments);
        batch.notices
    }

    /// Capture pasted images. Returns true when the host should suppress its
    /// default paste behaviour.
    pub fn paste(&mut self, items: Vec<ClipboardItem>) -> bool {
        let capture = encode_clipboard(items);
        self.pending.extend(capture.attachments);
        capture.suppress_default
    }

    pub fn remove_attachment(&mut self, id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|a| a.id != id);
        self.pending.len() != before
    }

    pub fn pending(&self) -> &[Attachment] {
        &self.pending
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Send one user turn and stream the reply into the conversation.
    ///
    /// `on_chunk` receives the cumulative reply text as it grows. Empty
    /// submissions are rejected before any session work. If no session can
    /// be opened the conversation is left untouched and the pending
    /// attachments are kept. Transport failures during the reply do not
    /// error: the reply message carries the fallback text instead.
    pub async fn submit<F>(
        &mut self,
        input: &str,
        mut on_chunk: F,
    ) -> Result<SubmitOutcome, SubmitError>
    where
        F: FnMut(&str),
    {
        let submission = Submission::new(input, std::mem::take(&mut self.pending))?;

        let session = match self.sessions.ensure_session(self.persona).await {
            Ok(session) => session,
            Err(err) => {
                let (_, attachments) = submission.into_parts();
                self.pending = attachments;
                return Err(err.into());
            }
        };

        let user_message = Message::user(submission.input(), submission.attachments().to_vec());
        self.log(&user_message);
        let user_message_id = self.conversation.push(user_message);
        let reply_message_id = self.conversation.begin_model_stream();
        self.is_loading = true;

        let payload = compose(&submission);
        let outcome = {
            let mut reply = ReplyInFlight {
                conversation: &mut self.conversation,
                is_loading: &mut self.is_loading,
                id: &reply_message_id,
            };
            let outcome = dispatch(&session, payload, |text| {
                reply.conversation.update_stream(reply.id, text);
                on_chunk(text);
            })
            .await;

            if let DispatchOutcome::Failed { fallback, .. } = &outcome {
                reply.conversation.update_stream(reply.id, fallback);
            }
            outcome
        };

        if let Some(reply) = self.conversation.find(&reply_message_id) {
            self.log(reply);
        }

        Ok(SubmitOutcome {
            user_message_id,
            reply_message_id,
            dispatch: outcome,
        })
    }

    /// Forget everything: history, pending attachments and the model-side
    /// session.
    pub fn clear(&mut self) {
        self.conversation
            .reset_with(Message::model(MEMORY_CLEARED_MESSAGE));
        self.pending.clear();
        self.sessions.reset();
        if let Err(err) = self.logging.rewrite_log(self.conversation.messages()) {
            warn!(error = %err, "Failed to rewrite transcript");
        }
    }

    pub fn code_blocks_in_last_response(&self) -> Vec<CodeBlock> {
        self.conversation
            .last_model_response()
            .map(|m| extract_code_blocks(&m.content))
            .unwrap_or_default()
    }

    pub fn save_snippet(
        &mut self,
        code: &str,
        language: &str,
        title: &str,
    ) -> Result<String, StorageError> {
        self.snippets.save(code, language, title)
    }

    /// Save the `index`th code block of the last reply. Returns `Ok(None)`
    /// when there is no such block.
    pub fn save_code_block(
        &mut self,
        index: usize,
        title: &str,
    ) -> Result<Option<String>, StorageError> {
        let Some(block) = self.code_blocks_in_last_response().into_iter().nth(index) else {
            return Ok(None);
        };
        self.snippets
            .save(block.code, block.language, title)
            .map(Some)
    }

    pub fn delete_snippet(&mut self, id: &str) -> Result<bool, StorageError> {
        self.snippets.delete(id)
    }

    pub fn snippets(&self) -> &[Snippet] {
        self.snippets.list()
    }

    pub fn snippet(&self, id: &str) -> Option<&Snippet> {
        self.snippets.get(id)
    }

    fn log(&self, message: &Message) {
        if let Err(err) = self.logging.log_message(message) {
            warn!(error = %err, "Failed to write transcript");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attachment::AttachmentKind;
    use crate::core::chat_stream::STREAM_FALLBACK_MESSAGE;
    use crate::core::compose::MessagePayload;
    use crate::core::message::Role;
    use crate::core::storage::MemoryKeyValueStore;
    use crate::core::transport::{StreamMessage, TransportError};
    use crate::utils::test_utils::MockTransport;

    fn app_with(transport: &MockTransport) -> ChatApp {
        ChatApp::new(
            Arc::new(transport.clone()),
            SnippetStore::load(Box::new(MemoryKeyValueStore::new())),
            PersonaId::Chill,
            0.7,
        )
    }

    #[test]
    fn new_app_greets_with_persona() {
        let app = app_with(&MockTransport::new());
        let messages = app.conversation().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Model);
        assert!(messages[0].content.contains("Chill Flow"));
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn empty_submission_is_rejected_without_opening_a_session() {
        let transport = MockTransport::new();
        let mut app = app_with(&transport);

        let result = app.submit("   \n", |_| {}).await;

        assert_eq!(
            result,
            Err(SubmitError::Empty(ComposeError::EmptySubmission))
        );
        assert!(transport.opened_configs().is_empty());
        assert_eq!(app.conversation().len(), 1);
    }

    #[tokio::test]
    async fn panicking_chunk_callback_still_settles_the_reply() {
        use futures_util::FutureExt;
        use std::panic::AssertUnwindSafe;

        let transport = MockTransport::new();
        transport.script_reply(vec![
            StreamMessage::Delta("partial".into()),
            StreamMessage::End,
        ]);
        let mut app = app_with(&transport);

        let result = AssertUnwindSafe(app.submit("hi", |_| panic!("renderer gone")))
            .catch_unwind()
            .await;

        assert!(result.is_err());
        assert!(!app.is_loading());
        let reply = app.conversation().last().unwrap();
        assert_eq!(reply.role, Role::Model);
        assert!(!reply.is_streaming);
        assert_eq!(reply.content, "partial");
    }

    #[tokio::test]
    async fn dropped_submit_still_settles_the_reply() {
        let transport = MockTransport::new();
        transport.script_reply(vec![StreamMessage::Delta("partial".into())]);
        transport.hold_streams_open();
        let mut app = app_with(&transport);

        {
            let mut submit = Box::pin(app.submit("hi", |_| {}));
            // Drive the send up to its first suspension point, then abandon it.
            let _ = futures_util::poll!(submit.as_mut());
        }

        assert!(!app.is_loading());
        assert!(app
            .conversation()
            .messages()
            .iter()
            .all(|message| !message.is_streaming));
    }

    #[tokio::test]
    async fn reply_streams_into_the_conversation() {
        let transport = MockTransport::new();
        transport.script_reply(vec![
            StreamMessage::Delta("Hel".into()),
            StreamMessage::Delta("lo".into()),
            StreamMessage::End,
        ]);
        let mut app = app_with(&transport);
        let mut seen = Vec::new();

        let outcome = app
            .submit("hi", |text| seen.push(text.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["Hel", "Hello"]);
        assert_eq!(outcome.dispatch, DispatchOutcome::Completed("Hello".into()));
        let reply = app.conversation().find(&outcome.reply_message_id).unwrap();
        assert_eq!(reply.content, "Hello");
        assert!(!reply.is_streaming);
        let user = app.conversation().find(&outcome.user_message_id).unwrap();
        assert_eq!(user.content, "hi");
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn failed_stream_leaves_fallback_and_clears_flags() {
        let transport = MockTransport::new();
        transport.script_reply(vec![
            StreamMessage::Delta("partial".into()),
            StreamMessage::Error(TransportError::Network("reset".into())),
        ]);
        let mut app = app_with(&transport);

        let outcome = app.submit("hi", |_| {}).await.unwrap();

        assert!(!outcome.dispatch.is_completed());
        let reply = app.conversation().find(&outcome.reply_message_id).unwrap();
        assert_eq!(reply.content, STREAM_FALLBACK_MESSAGE);
        assert!(!reply.is_streaming);
        assert!(!app.is_loading());
        assert!(app.conversation().messages().iter().all(|m| !m.is_streaming));
    }

    #[tokio::test]
    async fn session_failure_keeps_pending_attachments() {
        let transport = MockTransport::new();
        transport.fail_next_open(TransportError::MissingApiKey);
        let mut app = app_with(&transport);
        app.add_files(vec![FileInput::from_bytes(
            "a.py",
            "text/x-python",
            b"print(1)".to_vec(),
        )]);

        let result = app.submit("check", |_| {}).await;

        assert!(matches!(result, Err(SubmitError::Session(_))));
        assert_eq!(app.pending().len(), 1);
        assert_eq!(app.conversation().len(), 1);
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn attachments_move_into_the_user_message() {
        let transport = MockTransport::new();
        let mut app = app_with(&transport);
        let notices = app.add_files(vec![
            FileInput::from_bytes("a.py", "text/x-python", b"print(1)".to_vec()),
            FileInput::from_bytes("dot.png", "image/png", vec![0x89, 0x50]),
        ]);
        assert!(notices.is_empty());

        let outcome = app.submit("", |_| {}).await.unwrap();

        assert!(app.pending().is_empty());
        let user = app.conversation().find(&outcome.user_message_id).unwrap();
        assert_eq!(user.attachments.len(), 2);
        let sent = transport.sent_payloads();
        match &sent[0].1 {
            MessagePayload::Parts(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected multipart payload, got {other:?}"),
        }
        assert!(user.attachments.iter().any(|a| a.kind == AttachmentKind::Image));
    }

    #[tokio::test]
    async fn persona_switch_opens_a_new_session_on_next_send() {
        let transport = MockTransport::new();
        let mut app = app_with(&transport);

        app.submit("one", |_| {}).await.unwrap();
        assert!(!app.set_persona(PersonaId::Chill));
        assert!(app.set_persona(PersonaId::Cyberpunk));
        let notice = app.conversation().last().unwrap();
        assert!(notice.content.contains("Cyberpunk"));

        app.submit("two", |_| {}).await.unwrap();

        let configs = transport.opened_configs();
        assert_eq!(configs.len(), 2);
        assert_eq!(
            configs[1].system_instruction,
            PersonaId::Cyberpunk.persona().system_instruction
        );
        let handles: Vec<u64> = transport.sent_payloads().iter().map(|(h, _)| *h).collect();
        assert_eq!(handles, vec![1, 2]);
    }

    #[tokio::test]
    async fn clear_resets_history_pending_and_session() {
        let transport = MockTransport::new();
        let mut app = app_with(&transport);
        app.submit("one", |_| {}).await.unwrap();
        app.add_files(vec![FileInput::from_bytes(
            "notes.txt",
            "text/plain",
            b"x".to_vec(),
        )]);

        app.clear();

        let messages = app.conversation().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, MEMORY_CLEARED_MESSAGE);
        assert!(app.pending().is_empty());

        app.submit("two", |_| {}).await.unwrap();
        assert_eq!(transport.opened_configs().len(), 2);
    }

    #[tokio::test]
    async fn code_blocks_from_last_reply_can_be_saved() {
        let transport = MockTransport::new();
        transport.script_reply(vec![
            StreamMessage::Snapshot("Here:\n\n```rust\nfn a() {}\n```\n".into()),
            StreamMessage::End,
        ]);
        let mut app = app_with(&transport);
        app.submit("write a fn", |_| {}).await.unwrap();

        let blocks = app.code_blocks_in_last_response();
        assert_eq!(blocks.len(), 1);

        assert_eq!(app.save_code_block(3, "nope").unwrap(), None);
        let id = app.save_code_block(0, "").unwrap().unwrap();
        let saved = &app.snippets()[0];
        assert_eq!(saved.id, id);
        assert_eq!(saved.title, "rust snippet");
        assert_eq!(saved.code, "fn a() {}");

        assert!(app.delete_snippet(&id).unwrap());
        assert!(app.snippets().is_empty());
    }

    #[test]
    fn pending_attachments_can_be_removed() {
        let mut app = app_with(&MockTransport::new());
        let suppressed = app.paste(vec![ClipboardItem {
            media_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        }]);
        assert!(suppressed);
        let id = app.pending()[0].id.clone();

        assert!(app.remove_attachment(&id));
        assert!(!app.remove_attachment(&id));
        assert!(app.pending().is_empty());
    }
}
