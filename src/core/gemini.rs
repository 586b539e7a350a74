//! Gemini REST transport: opens chat handles and streams replies over SSE.

use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    SystemInstruction, WirePart,
};
use crate::core::compose::MessagePayload;
use crate::core::message::Role;
use crate::core::transport::{
    ChatHandle, ModelTransport, SessionConfig, StreamMessage, TransportError,
};
use crate::utils::url::stream_generate_url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

#[derive(Clone)]
pub struct GeminiTransport {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiTransport {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn open_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<dyn ChatHandle>, TransportError> {
        let api_key = self.api_key.clone().ok_or(TransportError::MissingApiKey)?;

        let history = config
            .seed_history
            .iter()
            .map(|turn| Content::from_text(turn.role, turn.text.clone()))
            .collect();

        Ok(Arc::new(GeminiChat {
            client: self.client.clone(),
            url: stream_generate_url(&self.base_url, &self.model),
            api_key,
            system_instruction: config.system_instruction,
            temperature: config.temperature,
            history: Arc::new(Mutex::new(history)),
        }))
    }
}

/// One model-side conversation. Completed exchanges are appended to the
/// history so later turns carry the full context.
pub struct GeminiChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    system_instruction: String,
    temperature: f32,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiChat {
    fn build_request(&self, user_turn: Content) -> GenerateContentRequest {
        let mut contents = self
            .history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default();
        contents.push(user_turn);

        GenerateContentRequest {
            contents,
            system_instruction: (!self.system_instruction.is_empty()).then(|| SystemInstruction {
                parts: vec![WirePart::text(self.system_instruction.clone())],
            }),
            generation_config: Some(GenerationConfig {
                temperature: self.temperature,
            }),
        }
    }
}

impl ChatHandle for GeminiChat {
    fn send_stream(&self, payload: MessagePayload) -> mpsc::UnboundedReceiver<StreamMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let user_turn = Content::user(payload);
        let request = self.build_request(user_turn.clone());
        let client = self.client.clone();
        let url = self.url.clone();
        let api_key = self.api_key.clone();
        let history = Arc::clone(&self.history);

        tokio::spawn(async move {
            let mut reply = String::new();
            if !stream_reply(&client, &url, &api_key, &request, &tx, &mut reply).await {
                return;
            }

            if let Ok(mut history) = history.lock() {
                history.push(user_turn);
                history.push(Content::from_text(Role::Model, reply));
            }
            let _ = tx.send(StreamMessage::End);
        });

        rx
    }
}

/// Post the request and forward every text chunk. Returns true when the
/// stream completed cleanly; on failure an error has already been sent.
async fn stream_reply(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    request: &GenerateContentRequest,
    tx: &mpsc::UnboundedSender<StreamMessage>,
    reply: &mut String,
) -> bool {
    let response = match client
        .post(url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", api_key)
        .json(request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(StreamMessage::Error(TransportError::Network(e.to_string())));
            return false;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let _ = tx.send(StreamMessage::Error(TransportError::Api {
            status: Some(status.as_u16()),
            message: format_api_error(&error_text),
        }));
        return false;
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send(StreamMessage::Error(TransportError::Network(e.to_string())));
                return false;
            }
        };
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let outcome = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(line) => process_sse_line(line.trim(), tx, reply),
                Err(e) => {
                    debug!(error = %e, "Invalid UTF-8 in stream");
                    LineOutcome::Continue
                }
            };
            buffer.drain(..=newline_pos);
            if outcome == LineOutcome::Failed {
                return false;
            }
        }
    }

    // A final event may arrive without a trailing newline.
    if let Ok(line) = std::str::from_utf8(&buffer) {
        if process_sse_line(line.trim(), tx, reply) == LineOutcome::Failed {
            return false;
        }
    }

    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOutcome {
    Continue,
    Failed,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(
    payload: &str,
    tx: &mpsc::UnboundedSender<StreamMessage>,
    reply: &mut String,
) -> LineOutcome {
    if payload.trim().is_empty() {
        return LineOutcome::Continue;
    }

    let value = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value,
        Err(_) => {
            let _ = tx.send(StreamMessage::Error(TransportError::Malformed(
                format_api_error(payload),
            )));
            return LineOutcome::Failed;
        }
    };

    if value.get("error").is_some() {
        let _ = tx.send(StreamMessage::Error(TransportError::Api {
            status: None,
            message: format_api_error(payload),
        }));
        return LineOutcome::Failed;
    }

    match serde_json::from_value::<GenerateContentResponse>(value) {
        Ok(response) => {
            if let Some(text) = response.text() {
                reply.push_str(&text);
                let _ = tx.send(StreamMessage::Delta(text));
            }
            LineOutcome::Continue
        }
        Err(e) => {
            let _ = tx.send(StreamMessage::Error(TransportError::Malformed(e.to_string())));
            LineOutcome::Failed
        }
    }
}

fn process_sse_line(
    line: &str,
    tx: &mpsc::UnboundedSender<StreamMessage>,
    reply: &mut String,
) -> LineOutcome {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, reply))
        .unwrap_or(LineOutcome::Continue)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Render an error body for logs: a one-line summary when one can be found,
/// followed by the body in a fenced block.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {}\n```json\n{}\n```", summary, pretty_json);
                }
            }
            return format!("API Error:\n```json\n{}\n```", pretty_json);
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::session_config;
    use crate::core::persona::PersonaId;

    #[test]
    fn process_sse_line_handles_spacing_variants() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reply = String::new();
        let lines = [
            r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"}]}}]}"#,
            r#"data:{"candidates":[{"content":{"role":"model","parts":[{"text":" World"}]}}]}"#,
        ];

        for line in lines {
            assert_eq!(process_sse_line(line, &tx, &mut reply), LineOutcome::Continue);
        }

        assert_eq!(rx.try_recv().unwrap(), StreamMessage::Delta("Hello".into()));
        assert_eq!(rx.try_recv().unwrap(), StreamMessage::Delta(" World".into()));
        assert!(rx.try_recv().is_err());
        assert_eq!(reply, "Hello World");
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reply = String::new();
        assert_eq!(process_sse_line("", &tx, &mut reply), LineOutcome::Continue);
        assert_eq!(
            process_sse_line(": keep-alive", &tx, &mut reply),
            LineOutcome::Continue
        );
        assert_eq!(
            process_sse_line(r#"data: {"candidates":[]}"#, &tx, &mut reply),
            LineOutcome::Continue
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn process_sse_line_routes_stream_errors() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reply = String::new();
        let error_line = r#"data: {"error":{"code":500,"message":"internal server error","status":"INTERNAL"}}"#;

        assert_eq!(
            process_sse_line(error_line, &tx, &mut reply),
            LineOutcome::Failed
        );

        match rx.try_recv().unwrap() {
            StreamMessage::Error(TransportError::Api { status, message }) => {
                assert_eq!(status, None);
                assert!(message.starts_with("API Error: internal server error\n```json\n"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unparseable_payload_is_malformed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reply = String::new();
        assert_eq!(
            process_sse_line("data: not json", &tx, &mut reply),
            LineOutcome::Failed
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            StreamMessage::Error(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn format_api_error_prettifies_json_with_summary() {
        let raw = r#"{"error":{"message":"API key not valid.  Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let formatted = format_api_error(raw);

        let expected = r#"API Error: API key not valid. Please pass a valid API key.
```json
{
  "error": {
    "message": "API key not valid.  Please pass a valid API key.",
    "status": "INVALID_ARGUMENT"
  }
}
```"#;
        assert_eq!(formatted, expected);
    }

    #[test]
    fn format_api_error_handles_json_without_summary() {
        let formatted = format_api_error(r#"{"status":"failed"}"#);
        assert_eq!(
            formatted,
            "API Error:\n```json\n{\n  \"status\": \"failed\"\n}\n```"
        );
    }

    #[test]
    fn format_api_error_handles_xml_plaintext_and_empty() {
        assert_eq!(
            format_api_error("<error>bad</error>"),
            "API Error:\n```xml\n<error>bad</error>\n```"
        );
        assert_eq!(
            format_api_error("api failure"),
            "API Error:\n```\napi failure\n```"
        );
        assert_eq!(format_api_error("  "), "API Error:\n```\n<empty>\n```");
    }

    #[tokio::test]
    async fn open_session_requires_api_key() {
        let transport = GeminiTransport::new(
            reqwest::Client::new(),
            DEFAULT_BASE_URL,
            DEFAULT_MODEL,
            Some("   ".into()),
        );
        let result = transport
            .open_session(session_config(PersonaId::Chill, 0.7))
            .await;
        assert_eq!(result.err(), Some(TransportError::MissingApiKey));
    }

    #[test]
    fn request_carries_seed_history_and_instruction() {
        let config = session_config(PersonaId::TenX, 0.7);
        let chat = GeminiChat {
            client: reqwest::Client::new(),
            url: String::new(),
            api_key: "k".into(),
            system_instruction: config.system_instruction.clone(),
            temperature: config.temperature,
            history: Arc::new(Mutex::new(
                config
                    .seed_history
                    .iter()
                    .map(|turn| Content::from_text(turn.role, turn.text.clone()))
                    .collect(),
            )),
        };

        let request = chat.build_request(Content::user(MessagePayload::PlainText("hi".into())));
        assert_eq!(request.contents.len(), 3);
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
        assert_eq!(request.contents[1].role.as_deref(), Some("model"));
        assert_eq!(request.contents[2].text(), "hi");
        let instruction = request.system_instruction.unwrap();
        assert_eq!(
            instruction.parts[0].text.as_deref(),
            Some(PersonaId::TenX.persona().system_instruction)
        );
    }
}
