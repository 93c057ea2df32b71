//! Per-conversation persistence.
//!
//! Each `(username, personality)` pair owns one JSON file in the platform
//! data directory, named after the original client's storage key
//! (`chatHistory-<username>-<personality>.json`). Loads self-heal: a missing
//! or corrupt file yields a fresh welcome message and corrupt files are
//! discarded. Saves are atomic and skip the untouched welcome-only state so
//! a first render never clobbers real history.

use std::error::Error as StdError;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use directories::ProjectDirs;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::core::message::Message;
use crate::core::personality::Personality;

pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn open() -> Result<Self, Box<dyn StdError>> {
        let proj_dirs = ProjectDirs::from("org", "lorz", "lorz")
            .ok_or("failed to determine data directory")?;
        Ok(Self::with_dir(proj_dirs.data_dir().to_path_buf()))
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        HistoryStore { dir }
    }

    fn conversation_path(&self, username: &str, personality: Personality) -> PathBuf {
        self.dir
            .join(format!("{}.json", storage_key(username, personality)))
    }

    /// Load the conversation for `(username, personality)`.
    ///
    /// Returns the stored messages with timestamps restored, or a single
    /// synthesized welcome message when nothing (readable) is stored. Any
    /// message persisted mid-stream comes back finalized; a reload never
    /// resurrects a streaming placeholder.
    pub fn load(&self, username: &str, personality: Personality) -> Vec<Message> {
        let path = self.conversation_path(username, personality);
        let welcome = || vec![Message::welcome(personality.welcome_text(username))];

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return welcome(),
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(mut messages) if !messages.is_empty() => {
                for message in &mut messages {
                    message.is_streaming = false;
                }
                messages
            }
            Ok(_) => welcome(),
            Err(error) => {
                warn!(path = %path.display(), %error, "discarding corrupt history");
                let _ = fs::remove_file(&path);
                welcome()
            }
        }
    }

    /// Persist the conversation, dropping attachment fields via serde.
    ///
    /// Skip rule: a list holding exactly one synthesized welcome message is
    /// the untouched initial state and is not written.
    pub fn save(
        &self,
        username: &str,
        personality: Personality,
        messages: &[Message],
    ) -> Result<(), Box<dyn StdError>> {
        if is_initial_state(messages) {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string(messages)?;

        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(contents.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(self.conversation_path(username, personality))
            .map_err(|err| -> Box<dyn StdError> { Box::new(err) })?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn raw_path(&self, username: &str, personality: Personality) -> PathBuf {
        self.conversation_path(username, personality)
    }
}

fn is_initial_state(messages: &[Message]) -> bool {
    matches!(messages, [only] if only.is_welcome())
}

/// Composite storage key; username characters unsafe in file names are
/// replaced so distinct names still get distinct, valid paths.
fn storage_key(username: &str, personality: Personality) -> String {
    let safe_username: String = username
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("chatHistory-{}-{}", safe_username, personality.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Attachment;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempdir().unwrap();
        let store = HistoryStore::with_dir(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn absent_file_yields_a_single_welcome_message() {
        let (_dir, store) = store();
        let messages = store.load("ada", Personality::Default);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_welcome());
        assert!(messages[0].text.contains("ada"));
    }

    #[test]
    fn reload_round_trips_except_attachments() {
        let (_dir, store) = store();
        let messages = vec![
            Message::welcome(Personality::Default.welcome_text("ada")),
            Message::user(
                "ada",
                "look at this",
                Some(Attachment {
                    url: "/tmp/cat.png".to_string(),
                    name: "cat.png".to_string(),
                    mime_type: "image/png".to_string(),
                }),
            ),
            Message::error("it broke"),
        ];
        store.save("ada", Personality::Default, &messages).unwrap();

        let reloaded = store.load("ada", Personality::Default);
        assert_eq!(reloaded.len(), 3);
        for (original, restored) in messages.iter().zip(&reloaded) {
            assert_eq!(original.id, restored.id);
            assert_eq!(original.text, restored.text);
            assert_eq!(original.sender, restored.sender);
            assert_eq!(original.timestamp, restored.timestamp);
        }
        assert_eq!(reloaded[1].attachment, None);
    }

    #[test]
    fn welcome_only_state_is_not_persisted() {
        let (_dir, store) = store();
        let messages = vec![Message::welcome("hello")];
        store.save("ada", Personality::Default, &messages).unwrap();
        assert!(!store.raw_path("ada", Personality::Default).exists());
    }

    #[test]
    fn corrupt_file_is_discarded_and_replaced_by_welcome() {
        let (_dir, store) = store();
        let path = store.raw_path("ada", Personality::Technical);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ this is not json").unwrap();

        let messages = store.load("ada", Personality::Technical);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_welcome());
        assert!(!path.exists());
    }

    #[test]
    fn personalities_store_separately() {
        let (_dir, store) = store();
        let default_history = vec![
            Message::welcome("hi"),
            Message::user("ada", "default question", None),
        ];
        store
            .save("ada", Personality::Default, &default_history)
            .unwrap();

        let technical = store.load("ada", Personality::Technical);
        assert_eq!(technical.len(), 1);
        assert!(technical[0].is_welcome());

        let default_again = store.load("ada", Personality::Default);
        assert_eq!(default_again.len(), 2);
        assert_eq!(default_again[1].text, "default question");
    }

    #[test]
    fn streaming_flags_are_cleared_on_load() {
        let (_dir, store) = store();
        let mut placeholder = Message::streaming_placeholder();
        placeholder.text = "partial".to_string();
        let messages = vec![Message::user("ada", "q", None), placeholder];
        store.save("ada", Personality::Default, &messages).unwrap();

        let reloaded = store.load("ada", Personality::Default);
        assert!(reloaded.iter().all(|message| !message.is_streaming));
    }

    #[test]
    fn unsafe_usernames_still_get_valid_paths() {
        let (_dir, store) = store();
        let history = vec![Message::welcome("hi"), Message::user("a/b", "q", None)];
        store.save("a/b", Personality::Default, &history).unwrap();
        assert!(store.raw_path("a/b", Personality::Default).exists());
        assert_eq!(
            storage_key("a/b", Personality::Default),
            "chatHistory-a_b-default"
        );
    }
}
