//! Wire types and parsing for the streaming SSE provider.
//!
//! The endpoint speaks the `generateContent` shape: requests carry ordered
//! content parts plus an optional system instruction, and each SSE payload
//! holds a candidate with a text delta and, occasionally, grounding metadata
//! with web citations.

use serde::{Deserialize, Serialize};

use super::{Content, StreamChunk};
use crate::core::message::Source;

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<InstructionPart>,
}

#[derive(Debug, Serialize)]
pub struct InstructionPart {
    pub text: String,
}

impl SystemInstruction {
    pub fn new(text: impl Into<String>) -> Self {
        SystemInstruction {
            parts: vec![InstructionPart { text: text.into() }],
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

/// Endpoint path for a streaming generation call against `model`.
pub fn stream_path(model: &str) -> String {
    format!("models/{model}:streamGenerateContent?alt=sse")
}

/// Parse one SSE `data:` payload into a normalized chunk.
///
/// Returns `Ok(None)` when the payload parses but carries neither text nor
/// citations (keep-alive frames, finish markers). A payload that is not a
/// `GenerateResponse` at all, or that carries an error object, is reported
/// as `Err` with the raw text so the caller can classify it.
pub fn parse_sse_payload(payload: &str) -> Result<Option<StreamChunk>, String> {
    let response: GenerateResponse =
        serde_json::from_str(payload).map_err(|_| payload.to_string())?;

    if response.error.is_some() {
        return Err(payload.to_string());
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(None);
    };

    let mut chunk = StreamChunk::default();

    if let Some(content) = candidate.content {
        for part in content.parts {
            if let Some(text) = part.text {
                chunk.text.push_str(&text);
            }
        }
    }

    if let Some(grounding) = candidate.grounding_metadata {
        for grounded in grounding.grounding_chunks {
            if let Some(web) = grounded.web {
                if let Some(uri) = web.uri {
                    chunk.citations.push(Source {
                        uri,
                        title: web.title.unwrap_or_default(),
                    });
                }
            }
        }
    }

    if chunk.text.is_empty() && chunk.citations.is_empty() {
        Ok(None)
    } else {
        Ok(Some(chunk))
    }
}
