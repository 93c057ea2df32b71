//! Error taxonomy for the chat client.
//!
//! Configuration and session errors block before any request is made.
//! Encoding errors abort a single send during request construction. The
//! remaining variants classify failed provider calls; they are advisory text
//! for the transcript and never trigger an automatic retry.

use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;

/// Body marker some batch backends return while a model is warming up.
const MODEL_LOADING_MARKER: &str = "is currently loading";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// No API credential configured; chat cannot start.
    Configuration(String),
    /// Session handle construction failed for this conversation.
    Session(String),
    /// The attachment could not be read while building the request.
    Encoding(String),
    /// Transport-level failure before any response arrived.
    Network(String),
    /// The provider rejected the request (4xx other than 429).
    BadRequest(String),
    /// The provider throttled us (429).
    RateLimited(String),
    /// The provider is down or still loading the model (500/503 or marker).
    ServiceUnavailable(String),
    /// Anything we cannot place.
    Unknown(String),
}

impl ChatError {
    /// Transcript-facing text for this failure. Technical detail stays in
    /// the logs; this is what the user reads.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Configuration(_) => {
                "No API credential is configured. Set LORZ_API_KEY or add api_key to the \
                 config file, then restart."
                    .to_string()
            }
            ChatError::Session(_) => {
                "The chat session could not be opened. Switch personality or restart to try \
                 again."
                    .to_string()
            }
            ChatError::Encoding(_) => {
                "The attached file could not be read, so the message was not sent.".to_string()
            }
            ChatError::Network(_) => {
                "Connection failed. Check your network and try again.".to_string()
            }
            ChatError::BadRequest(_) => {
                "The request could not be processed. Please rephrase and try again.".to_string()
            }
            ChatError::RateLimited(_) => {
                "Too many requests right now. Wait a moment and try again.".to_string()
            }
            ChatError::ServiceUnavailable(_) => {
                "The service is busy or still loading. Please try again shortly.".to_string()
            }
            ChatError::Unknown(_) => {
                "Sorry, something unexpected went wrong. Please try again.".to_string()
            }
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ChatError::Configuration(detail)
            | ChatError::Session(detail)
            | ChatError::Encoding(detail)
            | ChatError::Network(detail)
            | ChatError::BadRequest(detail)
            | ChatError::RateLimited(detail)
            | ChatError::ServiceUnavailable(detail)
            | ChatError::Unknown(detail) => detail,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ChatError::Configuration(_) => "configuration error",
            ChatError::Session(_) => "session error",
            ChatError::Encoding(_) => "encoding error",
            ChatError::Network(_) => "network error",
            ChatError::BadRequest(_) => "bad request",
            ChatError::RateLimited(_) => "rate limited",
            ChatError::ServiceUnavailable(_) => "service unavailable",
            ChatError::Unknown(_) => "unknown error",
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.detail();
        if detail.is_empty() {
            write!(f, "{}", self.label())
        } else {
            write!(f, "{}: {}", self.label(), detail)
        }
    }
}

impl StdError for ChatError {}

/// Classify a non-success HTTP response by status code and body.
pub fn classify_response(status: StatusCode, body: &str) -> ChatError {
    let detail = error_detail(body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), trimmed)
        }
    });

    match status.as_u16() {
        429 => ChatError::RateLimited(detail),
        _ if body.contains(MODEL_LOADING_MARKER) => ChatError::ServiceUnavailable(detail),
        500 | 503 => ChatError::ServiceUnavailable(detail),
        400..=499 => ChatError::BadRequest(detail),
        _ => ChatError::Unknown(detail),
    }
}

/// Classify a transport failure from the HTTP client.
pub fn classify_transport(error: &reqwest::Error) -> ChatError {
    if let Some(status) = error.status() {
        return classify_response(status, "");
    }
    if error.is_connect() || error.is_timeout() || error.is_request() {
        ChatError::Network(error.to_string())
    } else {
        ChatError::Unknown(error.to_string())
    }
}

/// Classify an in-stream error payload (a frame that was not a response).
pub fn classify_stream_payload(payload: &str) -> ChatError {
    let detail = error_detail(payload).unwrap_or_else(|| payload.trim().to_string());
    if payload.contains(MODEL_LOADING_MARKER) {
        ChatError::ServiceUnavailable(detail)
    } else {
        ChatError::Unknown(detail)
    }
}

/// Pull a human-readable summary out of a JSON error body, trying the shapes
/// both providers use: `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": "..."}`.
pub fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;

    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_the_documented_categories() {
        let cases = [
            (429, ChatError::RateLimited("HTTP 429".to_string())),
            (400, ChatError::BadRequest("HTTP 400".to_string())),
            (404, ChatError::BadRequest("HTTP 404".to_string())),
            (500, ChatError::ServiceUnavailable("HTTP 500".to_string())),
            (503, ChatError::ServiceUnavailable("HTTP 503".to_string())),
            (502, ChatError::Unknown("HTTP 502".to_string())),
        ];
        for (code, expected) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify_response(status, ""), expected, "status {code}");
        }
    }

    #[test]
    fn model_loading_marker_wins_over_status() {
        let body = r#"{"error": "Model mistralai/Mixtral is currently loading"}"#;
        let classified = classify_response(StatusCode::BAD_REQUEST, body);
        assert!(matches!(classified, ChatError::ServiceUnavailable(_)));

        let classified = classify_stream_payload(body);
        assert!(matches!(classified, ChatError::ServiceUnavailable(_)));
    }

    #[test]
    fn error_detail_handles_both_provider_shapes() {
        assert_eq!(
            error_detail(r#"{"error":{"message":"quota   exceeded"}}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            error_detail(r#"{"error":"model overloaded"}"#).as_deref(),
            Some("model overloaded")
        );
        assert_eq!(
            error_detail(r#"{"message":"bad input"}"#).as_deref(),
            Some("bad input")
        );
        assert_eq!(error_detail("not json"), None);
        assert_eq!(error_detail(r#"{"error": 42}"#), None);
    }

    #[test]
    fn user_messages_match_the_category_intent() {
        assert!(ChatError::Network(String::new())
            .user_message()
            .contains("network"));
        assert!(ChatError::RateLimited(String::new())
            .user_message()
            .contains("Wait"));
        assert!(ChatError::ServiceUnavailable(String::new())
            .user_message()
            .contains("busy"));
        assert!(ChatError::BadRequest(String::new())
            .user_message()
            .contains("could not be processed"));
    }

    #[test]
    fn display_includes_detail_when_present() {
        let error = ChatError::RateLimited("HTTP 429".to_string());
        assert_eq!(error.to_string(), "rate limited: HTTP 429");
        assert_eq!(
            ChatError::Unknown(String::new()).to_string(),
            "unknown error"
        );
    }
}
