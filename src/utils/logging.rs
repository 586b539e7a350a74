use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG` for the log filter.
pub const LOG_ENV: &str = "VIBECODE_LOG";

/// Install the stderr diagnostics subscriber. Defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Optional plain-text transcript of the conversation.
pub struct LoggingState {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl LoggingState {
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = LoggingState {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            logging.set_log_file(path)?;
        }
        Ok(logging)
    }

    pub fn disabled() -> Self {
        LoggingState {
            file_path: None,
            is_active: false,
        }
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> Result<String, Box<dyn std::error::Error>> {
        test_file_access(&path)?;

        let status = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(status)
    }

    /// Append one finished message to the transcript.
    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        match (&self.file_path, self.is_active) {
            (Some(path), true) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                let mut writer = BufWriter::with_capacity(64 * 1024, file);
                write_entry(&mut writer, message)?;
                writer.flush()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Replace the transcript with `messages`, skipping unfinished ones.
    pub fn rewrite_log(&self, messages: &[Message]) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_ref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let parent = file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(parent)?;

        for message in messages.iter().filter(|m| !m.is_streaming) {
            write_entry(&mut temp_file, message)?;
        }

        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(file_path)?;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!(
                "active ({})",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            (Some(path), false) => format!(
                "paused ({})",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }
}

fn write_entry<W: Write>(writer: &mut W, message: &Message) -> std::io::Result<()> {
    let prefix = match message.role {
        Role::User => "You: ",
        Role::Model => "",
    };
    for line in format!("{prefix}{}", message.content).lines() {
        writeln!(writer, "{line}")?;
    }
    for attachment in &message.attachments {
        writeln!(writer, "[attached {}]", attachment.file_name)?;
    }
    writeln!(writer)
}

fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()?;
    Ok(())
}
