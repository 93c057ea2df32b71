//! Wire types for the batch text-generation provider.
//!
//! This backend has no streaming mode and no citations: one POST, one JSON
//! array with the generated text. The stream service surfaces the reply as a
//! single chunk followed by the end marker, so the rest of the client never
//! special-cases it.

use serde::{Deserialize, Serialize};

use super::Content;

#[derive(Debug, Serialize)]
pub struct TextgenRequest {
    pub inputs: String,
    pub parameters: TextgenParameters,
}

#[derive(Debug, Serialize)]
pub struct TextgenParameters {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub return_full_text: bool,
}

impl Default for TextgenParameters {
    fn default() -> Self {
        TextgenParameters {
            max_new_tokens: 512,
            temperature: 0.7,
            return_full_text: false,
        }
    }
}

#[derive(Deserialize)]
struct Generation {
    generated_text: Option<String>,
}

/// Endpoint path for a generation call against `model`.
pub fn generate_path(model: &str) -> String {
    format!("models/{model}")
}

/// Flatten the structured turn history into the single prompt string this
/// provider expects. Inline-data parts have no textual form and are skipped.
pub fn flatten_prompt(system_instruction: Option<&str>, contents: &[Content]) -> String {
    let mut prompt = String::new();

    if let Some(instruction) = system_instruction {
        prompt.push_str(instruction);
        prompt.push_str("\n\n");
    }

    for content in contents {
        let speaker = if content.role == "model" {
            "Assistant"
        } else {
            "User"
        };
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.as_text())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(&text);
        prompt.push('\n');
    }

    prompt.push_str("Assistant:");
    prompt
}

/// Extract the reply text from a response body.
pub fn parse_response(body: &str) -> Result<String, String> {
    let generations: Vec<Generation> =
        serde_json::from_str(body).map_err(|_| body.to_string())?;

    generations
        .into_iter()
        .find_map(|generation| generation.generated_text)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| body.to_string())
}
