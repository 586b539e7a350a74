use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::core::compose::MessagePayload;
use crate::core::transport::{
    ChatHandle, ModelTransport, SessionConfig, StreamMessage, TransportError,
};

#[derive(Default)]
struct MockState {
    opened: Vec<SessionConfig>,
    fail_next_open: Option<TransportError>,
    replies: VecDeque<Vec<StreamMessage>>,
    sent: Vec<(u64, MessagePayload)>,
    hold_open: bool,
    held: Vec<mpsc::UnboundedSender<StreamMessage>>,
}

/// In-process transport that records what it is asked to do and replays
/// scripted replies. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the events returned by the next `send_stream` call. Without a
    /// script, a send answers with a single "ok" chunk.
    pub fn script_reply(&self, events: Vec<StreamMessage>) {
        self.state.lock().unwrap().replies.push_back(events);
    }

    /// Keep reply channels open after the scripted events, so a send stays
    /// in flight until the test lets go of it.
    pub fn hold_streams_open(&self) {
        self.state.lock().unwrap().hold_open = true;
    }

    pub fn fail_next_open(&self, error: TransportError) {
        self.state.lock().unwrap().fail_next_open = Some(error);
    }

    pub fn opened_configs(&self) -> Vec<SessionConfig> {
        self.state.lock().unwrap().opened.clone()
    }

    /// Payloads sent so far, tagged with the 1-based index of the handle
    /// (in opening order) that sent them.
    pub fn sent_payloads(&self) -> Vec<(u64, MessagePayload)> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl ModelTransport for MockTransport {
    async fn open_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<dyn ChatHandle>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_next_open.take() {
            return Err(error);
        }
        state.opened.push(config);
        Ok(Arc::new(MockHandle {
            index: state.opened.len() as u64,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockHandle {
    index: u64,
    state: Arc<Mutex<MockState>>,
}

impl ChatHandle for MockHandle {
    fn send_stream(&self, payload: MessagePayload) -> mpsc::UnboundedReceiver<StreamMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.sent.push((self.index, payload));
        let events = state
            .replies
            .pop_front()
            .unwrap_or_else(|| vec![StreamMessage::Delta("ok".into()), StreamMessage::End]);
        for event in events {
            let _ = tx.send(event);
        }
        if state.hold_open {
            state.held.push(tx);
        }
        rx
    }
}

/// A chat app over a fresh [`MockTransport`] and an in-memory snippet store.
pub fn create_test_app() -> (crate::core::app::ChatApp, MockTransport) {
    use crate::core::snippets::SnippetStore;
    use crate::core::storage::MemoryKeyValueStore;

    let transport = MockTransport::new();
    let app = crate::core::app::ChatApp::new(
        Arc::new(transport.clone()),
        SnippetStore::load(Box::new(MemoryKeyValueStore::new())),
        crate::core::persona::PersonaId::Chill,
        0.7,
    );
    (app, transport)
}
