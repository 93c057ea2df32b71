//! Optional transcript logging to a plain-text file.
//!
//! Finalized user and assistant messages are appended as `Sender: text`
//! blocks separated by blank lines. Streaming placeholders, welcome banners,
//! and error notices stay out of the log; it mirrors the conversation, not
//! the client's chrome.

use std::error::Error as StdError;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::message::{Message, MessageKind};

pub struct TranscriptLog {
    file_path: Option<String>,
}

impl TranscriptLog {
    pub fn new(file_path: Option<String>) -> Result<Self, Box<dyn StdError>> {
        if let Some(path) = &file_path {
            // Fail at startup, not on the first send.
            OpenOptions::new().create(true).append(true).open(path)?;
        }
        Ok(TranscriptLog { file_path })
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn status_string(&self) -> String {
        match &self.file_path {
            None => "disabled".to_string(),
            Some(path) => format!(
                "active ({})",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ),
        }
    }

    /// Append one finalized message, if it belongs in the transcript.
    pub fn record(&self, message: &Message) -> Result<(), Box<dyn StdError>> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if message.is_streaming || message.text.is_empty() {
            return Ok(());
        }
        if !matches!(message.kind(), Some(MessageKind::User | MessageKind::Ai)) {
            return Ok(());
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for line in format!("{}: {}", message.sender, message.text).lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
