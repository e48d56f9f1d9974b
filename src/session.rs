//! Session-scoped conversation state
//!
//! A session owns one conversation log plus the bookkeeping for the turn
//! in flight. Sessions are handed out behind a `tokio::Mutex`; a turn
//! holds the owned lock from user-append to commit/abort, which is what
//! serializes concurrent requests on the same conversation.

use crate::conversation::{ConversationLog, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Session id used when the client names none
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a turn is already in flight")]
    TurnInFlight,
    #[error("no turn in flight")]
    NoTurnInFlight,
    #[error(transparent)]
    Append(#[from] crate::conversation::AppendError),
}

/// One conversation and its in-flight turn state
pub struct Session {
    id: String,
    log: ConversationLog,
    /// Log length before the pending turn's user message, for rollback
    turn_checkpoint: Option<usize>,
}

impl Session {
    pub fn new(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: ConversationLog::new(system_prompt),
            turn_checkpoint: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Append the user message and return the snapshot to submit to the
    /// generation adapter.
    pub fn begin_turn(&mut self, user_input: &str) -> Result<Vec<Message>, SessionError> {
        if self.turn_checkpoint.is_some() {
            return Err(SessionError::TurnInFlight);
        }
        let checkpoint = self.log.len();
        self.log.append(Message::user(user_input))?;
        self.turn_checkpoint = Some(checkpoint);
        Ok(self.log.snapshot())
    }

    /// Commit the fully-drained assistant reply, completing the turn.
    pub fn commit_turn(&mut self, assistant_text: impl Into<String>) -> Result<(), SessionError> {
        if self.turn_checkpoint.is_none() {
            return Err(SessionError::NoTurnInFlight);
        }
        self.log.append(Message::assistant(assistant_text))?;
        self.turn_checkpoint = None;
        Ok(())
    }

    /// Roll the log back to the last complete turn. A failed or cancelled
    /// turn commits nothing, including its user message, so the
    /// alternation invariant holds for the next turn.
    pub fn abort_turn(&mut self) {
        if let Some(checkpoint) = self.turn_checkpoint.take() {
            self.log.truncate(checkpoint);
        }
    }
}

/// Registry of sessions keyed by id
pub struct SessionManager {
    system_prompt: String,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionManager {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the session for `id`.
    pub async fn get_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id = %id, "Creating session");
                Arc::new(Mutex::new(Session::new(id, self.system_prompt.clone())))
            })
            .clone()
    }

    #[allow(dead_code)] // Used in tests
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
