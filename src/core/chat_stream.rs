//! Background consumption of provider responses.
//!
//! `spawn_stream` issues the HTTP call on a detached task and forwards
//! normalized [`StreamMessage`]s, tagged with the stream id, over an
//! unbounded channel. Every terminal path emits `End` after at most one
//! `Error`, and a cancelled token stops the task without further sends; the
//! receiver drops anything whose stream id is no longer current.

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{gemini, textgen, Content, ProviderKind, StreamChunk};
use crate::core::error::{self, ChatError};
use crate::core::session::SessionHandle;
use crate::utils::url::construct_api_url;

#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(StreamChunk),
    Error(ChatError),
    End,
}

pub struct StreamParams {
    pub handle: SessionHandle,
    pub contents: Vec<Content>,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                handle,
                contents,
                cancel_token,
                stream_id,
            } = params;

            tokio::select! {
                _ = run_stream(&handle, contents, &cancel_token, &tx, stream_id) => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "stream cancelled");
                }
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

async fn run_stream(
    handle: &SessionHandle,
    contents: Vec<Content>,
    cancel_token: &CancellationToken,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) {
    match handle.provider {
        ProviderKind::Gemini => stream_gemini(handle, contents, cancel_token, tx, stream_id).await,
        ProviderKind::Textgen => fetch_textgen(handle, contents, tx, stream_id).await,
    }
}

fn fail(tx: &mpsc::UnboundedSender<(StreamMessage, u64)>, stream_id: u64, error: ChatError) {
    debug!(stream_id, %error, "stream failed");
    let _ = tx.send((StreamMessage::Error(error), stream_id));
    let _ = tx.send((StreamMessage::End, stream_id));
}

async fn stream_gemini(
    handle: &SessionHandle,
    contents: Vec<Content>,
    cancel_token: &CancellationToken,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) {
    let request = gemini::GenerateRequest {
        contents,
        system_instruction: handle
            .system_instruction()
            .map(gemini::SystemInstruction::new),
    };
    let url = construct_api_url(&handle.base_url, &gemini::stream_path(&handle.model));

    let response = match handle
        .client
        .post(url)
        .header("x-goog-api-key", &handle.api_key)
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            fail(tx, stream_id, error::classify_transport(&err));
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        fail(tx, stream_id, error::classify_response(status, &body));
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        if cancel_token.is_cancelled() {
            return;
        }

        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                fail(tx, stream_id, error::classify_transport(&err));
                return;
            }
        };
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let line = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(s) => s.trim().to_string(),
                Err(_) => {
                    buffer.drain(..=newline_pos);
                    continue;
                }
            };
            buffer.drain(..=newline_pos);

            if process_sse_line(&line, tx, stream_id) {
                return;
            }
        }
    }

    let _ = tx.send((StreamMessage::End, stream_id));
}

/// Handle one SSE line. Returns true when the stream is finished.
fn process_sse_line(
    line: &str,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) -> bool {
    let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
        return false;
    };

    if payload == "[DONE]" {
        let _ = tx.send((StreamMessage::End, stream_id));
        return true;
    }

    match gemini::parse_sse_payload(payload) {
        Ok(Some(chunk)) => {
            let _ = tx.send((StreamMessage::Chunk(chunk), stream_id));
            false
        }
        Ok(None) => false,
        Err(raw) => {
            fail(tx, stream_id, error::classify_stream_payload(&raw));
            true
        }
    }
}

async fn fetch_textgen(
    handle: &SessionHandle,
    contents: Vec<Content>,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) {
    let request = textgen::TextgenRequest {
        inputs: textgen::flatten_prompt(handle.system_instruction(), &contents),
        parameters: textgen::TextgenParameters::default(),
    };
    let url = construct_api_url(&handle.base_url, &textgen::generate_path(&handle.model));

    let response = match handle
        .client
        .post(url)
        .bearer_auth(&handle.api_key)
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            fail(tx, stream_id, error::classify_transport(&err));
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        fail(tx, stream_id, error::classify_response(status, &body));
        return;
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            fail(tx, stream_id, error::classify_transport(&err));
            return;
        }
    };

    match textgen::parse_response(&body) {
        Ok(text) => {
            let _ = tx.send((StreamMessage::Chunk(StreamChunk::text_only(text)), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
        }
        Err(raw) => fail(tx, stream_id, error::classify_stream_payload(&raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Source;

    fn service() -> (
        ChatStreamService,
        mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    ) {
        ChatStreamService::new()
    }

    #[test]
    fn sse_lines_become_chunks() {
        let (svc, mut rx) = service();
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#;
        assert!(!process_sse_line(line, &svc.tx, 7));

        let (message, id) = rx.try_recv().unwrap();
        assert_eq!(id, 7);
        match message {
            StreamMessage::Chunk(chunk) => assert_eq!(chunk.text, "Hello"),
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn citations_ride_along_with_chunks() {
        let (svc, mut rx) = service();
        let line = concat!(
            r#"data:{"candidates":[{"content":{"parts":[{"text":"x"}]},"#,
            r#""groundingMetadata":{"groundingChunks":[{"web":{"uri":"u","title":"T"}}]}}]}"#
        );
        assert!(!process_sse_line(line, &svc.tx, 1));
        let (message, _) = rx.try_recv().unwrap();
        match message {
            StreamMessage::Chunk(chunk) => {
                assert_eq!(
                    chunk.citations,
                    vec![Source {
                        uri: "u".to_string(),
                        title: "T".to_string()
                    }]
                );
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn done_marker_ends_the_stream() {
        let (svc, mut rx) = service();
        assert!(process_sse_line("data: [DONE]", &svc.tx, 3));
        let (message, _) = rx.try_recv().unwrap();
        assert!(matches!(message, StreamMessage::End));
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let (svc, mut rx) = service();
        assert!(!process_sse_line("", &svc.tx, 1));
        assert!(!process_sse_line(": keep-alive", &svc.tx, 1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_payload_yields_error_then_end() {
        let (svc, mut rx) = service();
        let line = r#"data: {"error":{"message":"quota exceeded"}}"#;
        assert!(process_sse_line(line, &svc.tx, 9));

        let (message, id) = rx.try_recv().unwrap();
        assert_eq!(id, 9);
        match message {
            StreamMessage::Error(error) => {
                assert_eq!(error.detail(), "quota exceeded");
            }
            other => panic!("expected error, got {other:?}"),
        }
        let (message, _) = rx.try_recv().unwrap();
        assert!(matches!(message, StreamMessage::End));
        assert!(rx.try_recv().is_err());
    }
}
