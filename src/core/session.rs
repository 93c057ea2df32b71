//! Session lifecycle.
//!
//! One live provider dialogue handle per conversation, owned by
//! [`SessionManager`]. Opening a conversation (or switching personality)
//! disposes the previous handle and constructs a fresh one scoped to the new
//! personality; handle ids strictly increase so anything holding a stale id
//! can detect it.

use reqwest::Client;

use crate::api::ProviderKind;
use crate::core::error::ChatError;
use crate::core::personality::Personality;

/// Opaque dialogue context for one conversation: transport, provider
/// coordinates, and the personality whose system instruction rides every
/// request.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: u64,
    pub client: Client,
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub personality: Personality,
}

impl SessionHandle {
    pub fn system_instruction(&self) -> Option<&'static str> {
        self.personality.system_instruction()
    }
}

#[derive(Debug)]
pub enum SessionState {
    Uninitialized,
    Ready(SessionHandle),
    Error(ChatError),
    Disposed,
}

pub struct SessionManager {
    state: SessionState,
    next_id: u64,
    client: Client,
    provider: ProviderKind,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl SessionManager {
    pub fn new(
        provider: ProviderKind,
        model: String,
        base_url: String,
        api_key: Option<String>,
    ) -> Self {
        SessionManager {
            state: SessionState::Uninitialized,
            next_id: 0,
            client: Client::new(),
            provider,
            model,
            base_url,
            api_key,
        }
    }

    /// Dispose any existing handle and open a fresh one for `personality`.
    ///
    /// On failure the manager stays in the error state and [`current`]
    /// returns `None` until a later `open` succeeds.
    ///
    /// [`current`]: SessionManager::current
    pub fn open(&mut self, personality: Personality) -> Result<&SessionHandle, ChatError> {
        self.dispose();

        let api_key = match self.api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => key.to_string(),
            None => {
                let error =
                    ChatError::Session("cannot open a session without an API credential".into());
                self.state = SessionState::Error(error.clone());
                return Err(error);
            }
        };

        self.next_id += 1;
        let handle = SessionHandle {
            id: self.next_id,
            client: self.client.clone(),
            provider: self.provider,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key,
            personality,
        };
        self.state = SessionState::Ready(handle);

        match &self.state {
            SessionState::Ready(handle) => Ok(handle),
            _ => unreachable!("state was just set to Ready"),
        }
    }

    pub fn current(&self) -> Option<&SessionHandle> {
        match &self.state {
            SessionState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn dispose(&mut self) {
        if !matches!(self.state, SessionState::Uninitialized) {
            self.state = SessionState::Disposed;
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&ChatError> {
        match &self.state {
            SessionState::Error(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_key() -> SessionManager {
        SessionManager::new(
            ProviderKind::Gemini,
            "test-model".to_string(),
            "https://example.invalid/v1".to_string(),
            Some("key".to_string()),
        )
    }

    #[test]
    fn open_produces_a_ready_handle_scoped_to_the_personality() {
        let mut manager = manager_with_key();
        assert!(manager.current().is_none());

        let handle = manager.open(Personality::Technical).unwrap();
        assert_eq!(handle.personality, Personality::Technical);
        assert!(handle.system_instruction().is_some());
        assert_eq!(handle.model, "test-model");
        assert!(manager.current().is_some());
    }

    #[test]
    fn reopen_replaces_the_handle_with_a_new_id() {
        let mut manager = manager_with_key();
        let first_id = manager.open(Personality::Default).unwrap().id;
        let second_id = manager.open(Personality::Creative).unwrap().id;
        assert!(second_id > first_id);
        assert_eq!(manager.current().unwrap().id, second_id);
    }

    #[test]
    fn dispose_invalidates_the_handle() {
        let mut manager = manager_with_key();
        manager.open(Personality::Default).unwrap();
        manager.dispose();
        assert!(manager.current().is_none());
        assert!(matches!(manager.state(), SessionState::Disposed));
    }

    #[test]
    fn missing_credential_moves_to_error_state() {
        let mut manager = SessionManager::new(
            ProviderKind::Gemini,
            "m".to_string(),
            "https://example.invalid".to_string(),
            None,
        );
        let error = manager.open(Personality::Default).unwrap_err();
        assert!(matches!(error, ChatError::Session(_)));
        assert!(manager.current().is_none());
        assert!(manager.last_error().is_some());
    }
}
