//! Normalises user-supplied files into [`Attachment`] records.
//!
//! Every input origin (file picker, drag and drop, folder selection,
//! clipboard paste) ends up as a [`FileInput`] or [`ClipboardItem`] and goes
//! through the same encoding rules: images become pure base64, everything
//! else is read as text. A bad file is skipped with a notice and never aborts
//! the rest of the batch.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::utils::ids::{generate_id, now_millis};

/// Maximum number of attachments accepted from a single batch.
pub const MAX_ATTACHMENTS_PER_BATCH: usize = 20;

/// Non-image files above this size are skipped.
pub const MAX_TEXT_ATTACHMENT_BYTES: u64 = 1024 * 1024;

const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub kind: AttachmentKind,
    /// Pure base64 for images, raw text otherwise.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub file_name: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }
}

#[derive(Debug, Clone)]
pub enum ContentReader {
    Bytes(Vec<u8>),
    Path(PathBuf),
    /// A `data:<type>;base64,<payload>` string, as produced by browser readers.
    DataUrl(String),
}

/// A raw file-like input before encoding.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub reader: ContentReader,
}

impl FileInput {
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            reader: ContentReader::Bytes(bytes),
        }
    }

    /// Describe a file on disk. The media type is guessed from the extension;
    /// the content is read lazily during encoding.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "text/plain".to_string());

        Ok(Self {
            name,
            media_type,
            size: metadata.len(),
            reader: ContentReader::Path(path.to_path_buf()),
        })
    }

    pub fn from_data_url(name: impl Into<String>, data_url: impl Into<String>) -> Self {
        let data_url = data_url.into();
        let (media_type, size) = match DataUrl::parse(&data_url) {
            Some(parsed) => (parsed.media_type.to_string(), parsed.decoded_len_hint()),
            None => (String::new(), 0),
        };
        Self {
            name: name.into(),
            media_type,
            size,
            reader: ContentReader::DataUrl(data_url),
        }
    }

    /// Collect every regular file below `dir`, sorted by path, skipping hidden
    /// entries. Entries that cannot be inspected are logged and left out.
    pub fn collect_dir(dir: &Path) -> io::Result<Vec<FileInput>> {
        let mut paths = Vec::new();
        walk_dir(dir, &mut paths)?;
        paths.sort();

        let mut inputs = Vec::with_capacity(paths.len());
        for path in paths {
            match FileInput::from_path(&path) {
                Ok(input) => inputs.push(input),
                Err(err) => warn!(path = %path.display(), error = %err, "Skipping unreadable file"),
            }
        }
        Ok(inputs)
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

fn walk_dir(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// A `data:[<media type>][;base64],<payload>` URL split into its parts.
#[derive(Debug, PartialEq, Eq)]
struct DataUrl<'a> {
    media_type: &'a str,
    base64: bool,
    payload: &'a str,
}

impl<'a> DataUrl<'a> {
    /// None unless the input has the `data:` scheme and a comma after the
    /// header.
    fn parse(url: &'a str) -> Option<Self> {
        let (header, payload) = url.strip_prefix("data:")?.split_once(',')?;
        let mut params = header.split(';');
        let media_type = params.next().unwrap_or_default().trim();
        let base64 = params.any(|param| param.trim().eq_ignore_ascii_case("base64"));
        Some(Self {
            media_type,
            base64,
            payload,
        })
    }

    fn decoded_len_hint(&self) -> u64 {
        if self.base64 {
            (self.payload.len() as u64 / 4) * 3
        } else {
            self.payload.len() as u64
        }
    }

    /// Raw bytes of the payload. Base64 payloads are validated here, others
    /// are percent-decoded.
    fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.base64 {
            base64::prelude::BASE64_STANDARD.decode(self.payload.trim())
        } else {
            Ok(urlencoding::decode_binary(self.payload.as_bytes()).into_owned())
        }
    }
}

fn data_url_bytes(input: &FileInput, url: &str) -> Result<Vec<u8>, BatchNotice> {
    let parsed = DataUrl::parse(url).ok_or_else(|| unreadable(input, "malformed data URL"))?;
    parsed.decode().map_err(|err| unreadable(input, err))
}

/// Why an input did not make it into the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchNotice {
    /// More inputs than [`MAX_ATTACHMENTS_PER_BATCH`] were supplied.
    Truncated { supplied: usize, discarded: usize },
    Oversized { file_name: String, size: u64 },
    Unreadable { file_name: String, reason: String },
}

impl fmt::Display for BatchNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchNotice::Truncated {
                supplied,
                discarded,
            } => write!(
                f,
                "Only the first {MAX_ATTACHMENTS_PER_BATCH} files are attached ({supplied} supplied, {discarded} ignored)"
            ),
            BatchNotice::Oversized { file_name, size } => write!(
                f,
                "Skipped {file_name}: {size} bytes exceeds the {} KiB limit for text files",
                MAX_TEXT_ATTACHMENT_BYTES / 1024
            ),
            BatchNotice::Unreadable { file_name, reason } => {
                write!(f, "Skipped {file_name}: {reason}")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct EncodedBatch {
    pub attachments: Vec<Attachment>,
    pub notices: Vec<BatchNotice>,
}

impl EncodedBatch {
    pub fn was_truncated(&self) -> bool {
        self.notices
            .iter()
            .any(|notice| matches!(notice, BatchNotice::Truncated { .. }))
    }
}

/// Encode a batch of inputs in order, stopping once
/// [`MAX_ATTACHMENTS_PER_BATCH`] attachments have been accepted.
pub fn encode_batch(inputs: Vec<FileInput>) -> EncodedBatch {
    let supplied = inputs.len();
    let mut batch = EncodedBatch::default();
    let mut iter = inputs.into_iter();

    for input in iter.by_ref() {
        match encode_file(&input) {
            Ok(attachment) => batch.attachments.push(attachment),
            Err(notice) => {
                warn!(file = %input.name, notice = %notice, "Attachment skipped");
                batch.notices.push(notice);
            }
        }
        if batch.attachments.len() == MAX_ATTACHMENTS_PER_BATCH {
            break;
        }
    }

    let discarded = iter.count();
    if discarded > 0 {
        batch.notices.push(BatchNotice::Truncated {
            supplied,
            discarded,
        });
    }
    batch
}

/// Encode one input according to its media type.
pub fn encode_file(input: &FileInput) -> Result<Attachment, BatchNotice> {
    if input.is_image() {
        encode_image(input)
    } else {
        encode_text(input)
    }
}

fn unreadable(input: &FileInput, reason: impl fmt::Display) -> BatchNotice {
    BatchNotice::Unreadable {
        file_name: input.name.clone(),
        reason: reason.to_string(),
    }
}

fn encode_image(input: &FileInput) -> Result<Attachment, BatchNotice> {
    let content = match &input.reader {
        ContentReader::DataUrl(url) => {
            let bytes = data_url_bytes(input, url)?;
            if bytes.is_empty() {
                return Err(unreadable(input, "empty image payload"));
            }
            base64::prelude::BASE64_STANDARD.encode(bytes)
        }
        ContentReader::Bytes(bytes) => base64::prelude::BASE64_STANDARD.encode(bytes),
        ContentReader::Path(path) => {
            let bytes = fs::read(path).map_err(|err| unreadable(input, err))?;
            base64::prelude::BASE64_STANDARD.encode(bytes)
        }
    };

    let mime_type = if input.media_type.is_empty() {
        DEFAULT_IMAGE_MIME.to_string()
    } else {
        input.media_type.clone()
    };

    Ok(Attachment {
        id: generate_id(),
        kind: AttachmentKind::Image,
        content,
        mime_type: Some(mime_type),
        file_name: input.name.clone(),
    })
}

fn encode_text(input: &FileInput) -> Result<Attachment, BatchNotice> {
    if input.size > MAX_TEXT_ATTACHMENT_BYTES {
        return Err(BatchNotice::Oversized {
            file_name: input.name.clone(),
            size: input.size,
        });
    }

    let bytes = match &input.reader {
        ContentReader::Bytes(bytes) => bytes.clone(),
        ContentReader::Path(path) => fs::read(path).map_err(|err| unreadable(input, err))?,
        ContentReader::DataUrl(url) => data_url_bytes(input, url)?,
    };

    // The declared size may be stale for files that grew after selection.
    if bytes.len() as u64 > MAX_TEXT_ATTACHMENT_BYTES {
        return Err(BatchNotice::Oversized {
            file_name: input.name.clone(),
            size: bytes.len() as u64,
        });
    }

    Ok(Attachment {
        id: generate_id(),
        kind: AttachmentKind::Text,
        content: String::from_utf8_lossy(&bytes).into_owned(),
        mime_type: None,
        file_name: input.name.clone(),
    })
}

/// One entry of a clipboard paste.
#[derive(Debug, Clone)]
pub struct ClipboardItem {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ClipboardCapture {
    pub attachments: Vec<Attachment>,
    /// True when at least one image was captured and the host should not
    /// also paste the raw clipboard content.
    pub suppress_default: bool,
}

/// Capture image items from a paste. Non-image items are ignored.
pub fn encode_clipboard(items: Vec<ClipboardItem>) -> ClipboardCapture {
    let timestamp = now_millis();
    let mut capture = ClipboardCapture::default();

    for item in items {
        if !item.media_type.starts_with("image/") {
            continue;
        }
        if capture.attachments.len() == MAX_ATTACHMENTS_PER_BATCH {
            warn!("Clipboard paste exceeded attachment limit; remaining images ignored");
            break;
        }

        let name = pasted_image_name(timestamp, capture.attachments.len(), &item.media_type);
        let input = FileInput::from_bytes(name, item.media_type, item.bytes);
        match encode_image(&input) {
            Ok(attachment) => capture.attachments.push(attachment),
            Err(notice) => warn!(notice = %notice, "Pasted image skipped"),
        }
    }

    capture.suppress_default = !capture.attachments.is_empty();
    capture
}

fn pasted_image_name(timestamp: i64, index: usize, media_type: &str) -> String {
    let subtype = media_type
        .split_once('/')
        .map(|(_, sub)| sub.split('+').next().unwrap_or(sub))
        .filter(|sub| !sub.is_empty())
        .unwrap_or("png");
    if index == 0 {
        format!("pasted-image-{timestamp}.{subtype}")
    } else {
        format!("pasted-image-{timestamp}-{index}.{subtype}")
    }
}
