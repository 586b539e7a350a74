//! Turns a user turn (free text plus attachments) into the payload sent to
//! the model.

use std::fmt;

use crate::core::attachment::{Attachment, AttachmentKind};

/// Heading placed before inlined text attachments.
pub const ATTACHED_FILES_HEADER: &str = "--- FILE ĐÍNH KÈM ---";

const FALLBACK_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

/// What the transport receives: either a bare string or an ordered part list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    PlainText(String),
    Parts(Vec<Part>),
}

impl MessagePayload {
    /// View the payload as a part list regardless of representation.
    pub fn to_parts(&self) -> Vec<Part> {
        match self {
            MessagePayload::PlainText(text) => vec![Part::Text(text.clone())],
            MessagePayload::Parts(parts) => parts.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Whitespace-only input with nothing attached.
    EmptySubmission,
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::EmptySubmission => {
                write!(f, "Nothing to send: type a message or attach a file")
            }
        }
    }
}

impl std::error::Error for ComposeError {}

/// A user turn that has passed validation and may be composed.
#[derive(Debug, Clone)]
pub struct Submission {
    input: String,
    attachments: Vec<Attachment>,
}

impl Submission {
    pub fn new(
        input: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<Self, ComposeError> {
        let input = input.into();
        if input.trim().is_empty() && attachments.is_empty() {
            return Err(ComposeError::EmptySubmission);
        }
        Ok(Self { input, attachments })
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn into_parts(self) -> (String, Vec<Attachment>) {
        (self.input, self.attachments)
    }
}

/// Build the outgoing text: the user's input followed by every text
/// attachment rendered as a fenced block.
pub fn compose_text(input: &str, attachments: &[Attachment]) -> String {
    let mut text = input.to_string();
    let mut text_attachments = attachments
        .iter()
        .filter(|a| a.kind == AttachmentKind::Text)
        .peekable();

    if text_attachments.peek().is_some() {
        text.push_str("\n\n");
        text.push_str(ATTACHED_FILES_HEADER);
        for attachment in text_attachments {
            text.push_str(&format!(
                "\n\nFile: {}\n```\n{}\n```",
                attachment.file_name, attachment.content
            ));
        }
    }
    text
}

/// Compose a validated submission into its wire payload.
///
/// Image parts come first in attachment order, followed by the text part
/// when the combined text is non-blank. A lone text part collapses to
/// [`MessagePayload::PlainText`].
pub fn compose(submission: &Submission) -> MessagePayload {
    let mut parts: Vec<Part> = submission
        .attachments
        .iter()
        .filter(|a| a.kind == AttachmentKind::Image)
        .map(|a| Part::InlineData {
            mime_type: a
                .mime_type
                .clone()
                .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string()),
            data: a.content.clone(),
        })
        .collect();

    let text = compose_text(&submission.input, &submission.attachments);
    if !text.trim().is_empty() {
        parts.push(Part::Text(text));
    }

    match <[Part; 1]>::try_from(parts) {
        Ok([Part::Text(text)]) => MessagePayload::PlainText(text),
        Ok([part]) => MessagePayload::Parts(vec![part]),
        Err(parts) => MessagePayload::Parts(parts),
    }
}
