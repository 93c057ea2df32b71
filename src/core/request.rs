//! Request construction: turns user text plus an optional attachment into
//! ordered content parts. No network I/O happens here; reading the
//! attachment bytes is the only suspension point.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::api::Part;
use crate::core::error::ChatError;
use crate::core::message::Attachment;

/// Build the ordered parts for one send. The inline-data part, when present,
/// goes before the text part.
pub async fn build_parts(
    text: &str,
    attachment: Option<&Attachment>,
) -> Result<Vec<Part>, ChatError> {
    let mut parts = Vec::new();

    if let Some(attachment) = attachment {
        let bytes = tokio::fs::read(&attachment.url).await.map_err(|err| {
            ChatError::Encoding(format!(
                "failed to read attachment {}: {err}",
                attachment.name
            ))
        })?;
        parts.push(Part::inline_data(
            attachment.mime_type.clone(),
            BASE64.encode(bytes),
        ));
    }

    let trimmed = text.trim();
    if !trimmed.is_empty() {
        parts.push(Part::text(trimmed));
    }

    Ok(parts)
}
