//! Conversation orchestration.
//!
//! [`ChatController`] owns the message log for the active
//! `(username, personality)` conversation and ties the store, request
//! builder, session manager, and stream service together. One send may be in
//! flight per conversation; a second call while one is pending is a no-op.
//! Stream events re-enter through [`ChatController::handle_stream_message`],
//! which drops anything tagged with a stale stream id, so late chunks from a
//! replaced session never touch the current conversation.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::Content;
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::error::ChatError;
use crate::core::history::HistoryStore;
use crate::core::message::{Attachment, Message, MessageKind, SourceSet};
use crate::core::personality::Personality;
use crate::core::request::build_parts;
use crate::core::session::SessionManager;
use crate::utils::logging::TranscriptLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The send was accepted; stream events will follow.
    Dispatched,
    /// Empty input or a send already in flight; nothing changed.
    Ignored,
}

/// What applying one stream event did to the conversation.
#[derive(Debug, Clone)]
pub enum StreamUpdate {
    /// Text was appended to the in-progress reply.
    Delta(String),
    /// The reply finished and was finalized.
    Finalized(Message),
    /// The send failed; the partial reply was replaced by this error message.
    Failed(Message),
    /// Stale or out-of-band event; the conversation is untouched.
    Ignored,
}

pub struct ChatController {
    username: String,
    personality: Personality,
    messages: Vec<Message>,
    store: HistoryStore,
    sessions: SessionManager,
    streams: ChatStreamService,
    transcript: TranscriptLog,
    in_flight: bool,
    current_stream_id: u64,
    cancel_token: Option<CancellationToken>,
    pending_sources: SourceSet,
    observers: Vec<mpsc::UnboundedSender<Message>>,
}

impl ChatController {
    /// Open the conversation for `(username, personality)`: load history,
    /// open a session handle, and hand back the receiver the driver loop
    /// feeds into [`handle_stream_message`].
    ///
    /// A failed session open is surfaced as a system message in the
    /// transcript; sends are rejected until a personality switch succeeds.
    ///
    /// [`handle_stream_message`]: ChatController::handle_stream_message
    pub fn new(
        username: impl Into<String>,
        personality: Personality,
        store: HistoryStore,
        sessions: SessionManager,
        transcript: TranscriptLog,
    ) -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let username = username.into();
        let messages = store.load(&username, personality);
        let (streams, rx) = ChatStreamService::new();

        let mut controller = ChatController {
            username,
            personality,
            messages,
            store,
            sessions,
            streams,
            transcript,
            in_flight: false,
            current_stream_id: 0,
            cancel_token: None,
            pending_sources: SourceSet::new(),
            observers: Vec::new(),
        };

        if let Err(error) = controller.sessions.open(personality) {
            controller.push_session_failure(&error);
        }

        (controller, rx)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Register an observer that receives an immutable snapshot of the
    /// in-progress (and then finalized) assistant message on every update.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Issue one send: optimistic user message, streaming placeholder, then
    /// the provider call on a background task.
    pub async fn send_message(
        &mut self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> SendOutcome {
        if text.trim().is_empty() && attachment.is_none() {
            return SendOutcome::Ignored;
        }
        if self.in_flight {
            debug!("send rejected: a request is already in flight");
            return SendOutcome::Ignored;
        }
        self.in_flight = true;

        let user_message = Message::user(&self.username, text.trim(), attachment.clone());
        self.record_transcript(&user_message);
        self.messages.push(user_message);
        self.persist();

        self.messages.push(Message::streaming_placeholder());
        self.pending_sources.clear();
        self.persist();

        let parts = match build_parts(text, attachment.as_ref()).await {
            Ok(parts) => parts,
            Err(error) => {
                self.fail_current_send(error);
                return SendOutcome::Dispatched;
            }
        };

        let Some(handle) = self.sessions.current().cloned() else {
            self.fail_current_send(ChatError::Session(
                "no open session for this conversation".into(),
            ));
            return SendOutcome::Dispatched;
        };

        let mut contents = self.turn_history();
        contents.push(Content::user(parts));

        self.current_stream_id += 1;
        let token = CancellationToken::new();
        self.cancel_token = Some(token.clone());
        self.streams.spawn_stream(StreamParams {
            handle,
            contents,
            cancel_token: token,
            stream_id: self.current_stream_id,
        });

        SendOutcome::Dispatched
    }

    /// Apply one event from the stream service.
    pub fn handle_stream_message(
        &mut self,
        message: StreamMessage,
        stream_id: u64,
    ) -> StreamUpdate {
        if stream_id != self.current_stream_id || !self.in_flight {
            return StreamUpdate::Ignored;
        }

        match message {
            StreamMessage::Chunk(chunk) => {
                let Some(reply) = self.streaming_reply_mut() else {
                    return StreamUpdate::Ignored;
                };
                reply.text.push_str(&chunk.text);
                let snapshot = reply.clone();
                self.pending_sources.extend(chunk.citations);
                self.persist();
                self.notify(&snapshot);
                StreamUpdate::Delta(chunk.text)
            }
            StreamMessage::Error(error) => {
                let failure = self.fail_current_send(error);
                StreamUpdate::Failed(failure)
            }
            StreamMessage::End => {
                let sources = std::mem::take(&mut self.pending_sources);
                let Some(reply) = self.streaming_reply_mut() else {
                    self.clear_in_flight();
                    return StreamUpdate::Ignored;
                };
                reply.is_streaming = false;
                reply.sources = if sources.is_empty() {
                    None
                } else {
                    Some(sources.into_vec())
                };
                let finalized = reply.clone();
                self.record_transcript(&finalized);
                self.clear_in_flight();
                self.persist();
                self.notify(&finalized);
                StreamUpdate::Finalized(finalized)
            }
        }
    }

    /// Switch to another personality's conversation.
    ///
    /// Cancels any in-flight stream (its late events are dropped by the
    /// stream-id guard), disposes the session handle, and loads the target
    /// personality's own history.
    pub fn switch_personality(&mut self, personality: Personality) -> Result<(), ChatError> {
        if personality == self.personality {
            return Ok(());
        }

        if self.in_flight {
            self.drop_streaming_placeholder();
            self.clear_in_flight();
            self.persist();
        }
        self.sessions.dispose();

        self.personality = personality;
        self.pending_sources.clear();
        self.messages = self.store.load(&self.username, personality);

        if let Err(error) = self.sessions.open(personality) {
            self.push_session_failure(&error);
            return Err(error);
        }
        Ok(())
    }

    /// Conversation turns sent as prior context: user and finalized
    /// assistant messages only. Error notices and the synthesized welcome
    /// never reach the provider.
    fn turn_history(&self) -> Vec<Content> {
        self.messages
            .iter()
            .take(self.messages.len().saturating_sub(2))
            .filter_map(|message| match message.kind() {
                Some(MessageKind::User) => Some(Content::user(vec![crate::api::Part::text(
                    message.text.as_str(),
                )])),
                Some(MessageKind::Ai) if !message.text.is_empty() => {
                    Some(Content::model(message.text.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    fn streaming_reply_mut(&mut self) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.is_streaming)
    }

    fn drop_streaming_placeholder(&mut self) {
        if let Some(position) = self.messages.iter().rposition(|m| m.is_streaming) {
            self.messages.remove(position);
        }
    }

    /// Replace the partial reply with a classified error message and settle
    /// the send. A half-written assistant turn must never stay visible.
    fn fail_current_send(&mut self, error: ChatError) -> Message {
        warn!(%error, "send failed");
        self.drop_streaming_placeholder();

        let failure = Message::error(error.user_message());
        self.messages.push(failure.clone());
        self.clear_in_flight();
        self.persist();
        self.notify(&failure);
        failure
    }

    fn clear_in_flight(&mut self) {
        self.in_flight = false;
        self.pending_sources.clear();
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }

    fn push_session_failure(&mut self, error: &ChatError) {
        warn!(%error, "session open failed");
        self.messages.push(Message::system_error(error.user_message()));
        self.persist();
    }

    fn persist(&self) {
        if let Err(error) = self
            .store
            .save(&self.username, self.personality, &self.messages)
        {
            warn!(%error, "failed to persist conversation");
        }
    }

    fn record_transcript(&self, message: &Message) {
        if let Err(error) = self.transcript.record(message) {
            warn!(%error, "failed to write transcript log");
        }
    }

    fn notify(&mut self, message: &Message) {
        self.observers
            .retain(|observer| observer.send(message.clone()).is_ok());
    }
}
