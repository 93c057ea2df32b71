use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name the assistant signs its replies with.
pub const ASSISTANT_SENDER: &str = "Lorz";

/// Sender used for client-level notices (session failures and the like).
pub const SYSTEM_SENDER: &str = "system";

/// A cited reference attributed to part of an AI reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

/// Ordered, uri-keyed set of citations. The first title seen for a uri wins;
/// insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    sources: Vec<Source>,
}

impl SourceSet {
    pub fn new() -> Self {
        SourceSet::default()
    }

    pub fn insert(&mut self, source: Source) {
        if !self.sources.iter().any(|known| known.uri == source.uri) {
            self.sources.push(source);
        }
    }

    pub fn extend(&mut self, sources: impl IntoIterator<Item = Source>) {
        for source in sources {
            self.insert(source);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn into_vec(self) -> Vec<Source> {
        self.sources
    }

    pub fn as_slice(&self) -> &[Source] {
        &self.sources
    }
}

/// Metadata for a file attached to an outgoing message. The `url` is a
/// transient reference (a local path in this client); it is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub mime_type: String,
}

/// Provenance of a transcript message, encoded as its id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Ai,
    Error,
    Welcome,
}

impl MessageKind {
    pub fn prefix(self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Ai => "ai",
            MessageKind::Error => "error",
            MessageKind::Welcome => "welcome",
        }
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique, creation-ordered message id: `<prefix>-<millis>-<seq>`.
pub fn next_message_id(kind: MessageKind) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", kind.prefix(), Utc::now().timestamp_millis(), seq)
}

/// One entry in a conversation transcript.
///
/// Streaming replies are mutated in place (`is_streaming == true`) until the
/// stream finishes; every other mutation of a conversation is an append. The
/// attachment field is skipped on serialization so persisted history never
/// carries stale file references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(skip_serializing, default)]
    pub attachment: Option<Attachment>,
}

impl Message {
    fn new(kind: MessageKind, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Message {
            id: next_message_id(kind),
            text: text.into(),
            sender: sender.into(),
            timestamp: Utc::now(),
            is_streaming: false,
            sources: None,
            attachment: None,
        }
    }

    pub fn user(
        username: impl Into<String>,
        text: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Self {
        let mut message = Message::new(MessageKind::User, username, text);
        message.attachment = attachment;
        message
    }

    /// Empty assistant reply that a stream will fill in.
    pub fn streaming_placeholder() -> Self {
        let mut message = Message::new(MessageKind::Ai, ASSISTANT_SENDER, "");
        message.is_streaming = true;
        message
    }

    pub fn error(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Error, ASSISTANT_SENDER, text)
    }

    pub fn system_error(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Error, SYSTEM_SENDER, text)
    }

    pub fn welcome(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Welcome, ASSISTANT_SENDER, text)
    }

    pub fn kind(&self) -> Option<MessageKind> {
        for kind in [
            MessageKind::User,
            MessageKind::Ai,
            MessageKind::Error,
            MessageKind::Welcome,
        ] {
            if self.has_kind(kind) {
                return Some(kind);
            }
        }
        None
    }

    pub fn has_kind(&self, kind: MessageKind) -> bool {
        self.id
            .strip_prefix(kind.prefix())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    pub fn is_welcome(&self) -> bool {
        self.has_kind(MessageKind::Welcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_provenance_and_stay_unique() {
        let user = Message::user("ada", "hi", None);
        let reply = Message::streaming_placeholder();
        let error = Message::error("oops");
        let welcome = Message::welcome("hello");

        assert!(user.has_kind(MessageKind::User));
        assert!(reply.has_kind(MessageKind::Ai));
        assert!(error.has_kind(MessageKind::Error));
        assert!(welcome.is_welcome());
        assert_ne!(Message::welcome("a").id, Message::welcome("b").id);
    }

    #[test]
    fn kind_prefix_matching_requires_the_separator() {
        let mut message = Message::welcome("hi");
        message.id = "userland-123".to_string();
        assert!(!message.has_kind(MessageKind::User));
        assert_eq!(message.kind(), None);
    }

    #[test]
    fn attachment_is_dropped_on_serialization() {
        let message = Message::user(
            "ada",
            "look",
            Some(Attachment {
                url: "/tmp/cat.png".to_string(),
                name: "cat.png".to_string(),
                mime_type: "image/png".to_string(),
            }),
        );
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("attachment"));
        assert!(!json.contains("cat.png"));

        let restored: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.attachment, None);
        assert_eq!(restored.text, "look");
        assert_eq!(restored.timestamp, message.timestamp);
    }

    #[test]
    fn source_set_keeps_first_title_and_order() {
        let mut set = SourceSet::new();
        set.insert(Source {
            uri: "a".to_string(),
            title: "A1".to_string(),
        });
        set.insert(Source {
            uri: "a".to_string(),
            title: "A2".to_string(),
        });
        set.insert(Source {
            uri: "b".to_string(),
            title: "B".to_string(),
        });

        let sources = set.into_vec();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].uri, "a");
        assert_eq!(sources[0].title, "A1");
        assert_eq!(sources[1].uri, "b");
    }
}
