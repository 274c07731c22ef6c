use crate::core::constants::LOG_ENV;
use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "warn";

/// Install the stderr diagnostics subscriber. `CHATDESK_LOG` takes the usual
/// `EnvFilter` directives; without it only warnings and errors are shown.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second init (tests, embedders) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// A plain-text transcript of the conversation, appended as messages
/// settle. User turns are prefixed with the signed-in name, replies are
/// written as-is, and notes start with `## `.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    /// A log that starts writing immediately when `log_file` is given.
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut log = TranscriptLog {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            log.set_log_file(path)?;
        }
        Ok(log)
    }

    pub fn set_log_file(
        &mut self,
        path: impl Into<PathBuf>,
    ) -> Result<String, Box<dyn std::error::Error>> {
        let path = path.into();
        test_file_access(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn toggle_logging(
        &mut self,
        pause_message: &str,
    ) -> Result<String, Box<dyn std::error::Error>> {
        let Some(path) = self.file_path.clone() else {
            return Err("No log file specified. Use /log <filename> to enable logging first.".into());
        };
        if self.is_active {
            // The pause note goes in before writing stops
            self.log_note(pause_message)?;
            self.is_active = false;
            Ok(format!("Logging paused (file: {})", path.display()))
        } else {
            self.is_active = true;
            Ok(format!("Logging resumed to: {}", path.display()))
        }
    }

    /// Append a settled message. Pending and failed sends are not logged.
    pub fn log_message(
        &self,
        message: &Message,
        user_display_name: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if message.is_pending() || message.is_failed() {
            return Ok(());
        }
        match message.role {
            Role::User => self.write_block(&format!("{user_display_name}: {}", message.content)),
            Role::Assistant if message.content.is_empty() => Ok(()),
            Role::Assistant => self.write_block(&message.content),
        }
    }

    pub fn log_note(&self, note: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write_block(&format!("## {note}"))
    }

    fn write_block(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_ref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between blocks
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        let file_name = |path: &Path| {
            path.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }
}

fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{DeliveryStatus, MessageIds};
    use tempfile::TempDir;

    fn committed(mut message: Message) -> Message {
        message.status = DeliveryStatus::Committed;
        message
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = TranscriptLog::new(None).unwrap();
        let mut ids = MessageIds::new();
        log.log_message(&committed(ids.user("hi", None)), "alice")
            .unwrap();
        assert!(!log.is_active());
        assert_eq!(log.get_status_string(), "disabled");
    }

    #[test]
    fn transcript_prefixes_user_turns_and_skips_unsettled_messages() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chat.log");
        let log = TranscriptLog::new(Some(path.clone())).unwrap();
        let mut ids = MessageIds::new();

        log.log_message(&ids.user("pending", None), "alice").unwrap();
        log.log_message(&committed(ids.user("hello", None)), "alice")
            .unwrap();
        log.log_message(&ids.assistant("hi\nthere", None), "alice")
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "alice: hello\n\nhi\nthere\n\n");
        assert_eq!(log.get_status_string(), "active (chat.log)");
    }

    #[test]
    fn toggling_writes_pause_note_and_stops_logging() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chat.log");
        let mut log = TranscriptLog::new(None).unwrap();

        assert!(log.toggle_logging("paused").is_err());

        log.set_log_file(&path).unwrap();
        let message = log.toggle_logging("Logging paused").unwrap();
        assert!(message.starts_with("Logging paused"));
        log.log_note("not written").unwrap();
        assert_eq!(log.get_status_string(), "paused (chat.log)");

        log.toggle_logging("unused").unwrap();
        log.log_note("back").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "## Logging paused\n\n## back\n\n");
    }

    #[test]
    fn unwritable_path_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing").join("chat.log");
        assert!(TranscriptLog::new(Some(missing)).is_err());
    }
}
