use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::message::Source;

pub mod gemini;
pub mod textgen;

/// Remote inference backends the client can talk to.
///
/// The adapters in [`gemini`] and [`textgen`] translate each provider's wire
/// format into [`StreamChunk`]s; nothing outside this module inspects the
/// provider-specific shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Streaming SSE endpoint with grounding citations and inline image parts.
    Gemini,
    /// Batch text-generation endpoint; replies arrive as a single chunk.
    Textgen,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Textgen => "textgen",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Textgen => "https://api-inference.huggingface.co",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Textgen => "mistralai/Mixtral-8x7B-Instruct-v0.1",
        }
    }
}

/// One ordered piece of request content. Inline data precedes text when both
/// are present; providers weight earlier parts as primary context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

/// Base64-encoded binary payload tagged with its mime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blob {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// One prior or current turn sent to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Content {
            role: "user".to_string(),
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Content {
            role: "model".to_string(),
            parts: vec![Part::text(text)],
        }
    }
}

/// The normalized unit of an incremental response: a text delta plus any
/// citation fragments that arrived with it. Provider adapters produce these;
/// the core consumes nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,
    pub citations: Vec<Source>,
}

impl StreamChunk {
    pub fn text_only(text: impl Into<String>) -> Self {
        StreamChunk {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}
