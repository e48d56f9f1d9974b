//! Streaming relay
//!
//! Bridges the generation adapter's pull-based fragment stream to the
//! push-based transport: forwards each fragment the moment it arrives,
//! accumulates the full reply, and commits or rolls back the session's
//! turn. The per-turn state machine in [`crate::turn`] is driven here.

use crate::llm::Generator;
use crate::session::Session;
use crate::turn::{transition, TurnEvent, TurnState};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, OwnedMutexGuard};

/// Events pushed to the transport: one per fragment, plus a terminal marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Fragment(String),
    Done,
    Failed { message: String },
}

/// Turn that ended without committing a reply
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TurnFailed {
    pub message: String,
}

enum TurnAbort {
    /// Receiver dropped mid-stream; nothing left to signal
    Disconnected,
    Failed(String),
}

fn advance(state: &TurnState, event: TurnEvent) -> Result<TurnState, TurnAbort> {
    transition(state, event).map_err(|e| TurnAbort::Failed(e.to_string()))
}

/// Run one turn to its terminal state.
///
/// Holds the session's owned lock for the whole turn, which serializes
/// concurrent requests on the same conversation. A failed or cancelled
/// turn is rolled back; partial replies are never committed.
pub async fn run_turn(
    mut session: OwnedMutexGuard<Session>,
    generator: Arc<dyn Generator>,
    user_input: String,
    events: mpsc::Sender<RelayEvent>,
) {
    match drive(&mut session, generator.as_ref(), &user_input, &events).await {
        Ok(()) => {
            let _ = events.send(RelayEvent::Done).await;
        }
        Err(TurnAbort::Disconnected) => {
            session.abort_turn();
            tracing::info!(
                session_id = %session.id(),
                "Client disconnected, generation cancelled"
            );
        }
        Err(TurnAbort::Failed(message)) => {
            session.abort_turn();
            let _ = events.send(RelayEvent::Failed { message }).await;
        }
    }
}

async fn drive(
    session: &mut Session,
    generator: &dyn Generator,
    user_input: &str,
    events: &mpsc::Sender<RelayEvent>,
) -> Result<(), TurnAbort> {
    let snapshot = session
        .begin_turn(user_input)
        .map_err(|e| TurnAbort::Failed(e.to_string()))?;

    let mut state = advance(&TurnState::Idle, TurnEvent::TurnStarted)?;
    tracing::debug!(
        session_id = %session.id(),
        messages = snapshot.len(),
        state = state.name(),
        "Turn started"
    );

    let mut stream = generator
        .stream_reply(&snapshot)
        .await
        .map_err(|e| TurnAbort::Failed(e.to_string()))?;

    let mut reply = String::new();
    loop {
        match stream.next().await {
            Some(Ok(fragment)) => {
                state = advance(&state, TurnEvent::FragmentReceived)?;
                reply.push_str(&fragment);
                if events.send(RelayEvent::Fragment(fragment)).await.is_err() {
                    // Dropping the stream tears down the backend
                    // connection, releasing its compute.
                    drop(stream);
                    return Err(TurnAbort::Disconnected);
                }
            }
            Some(Err(e)) => {
                let failed = advance(
                    &state,
                    TurnEvent::StreamFailed {
                        message: e.to_string(),
                    },
                )?;
                tracing::warn!(
                    session_id = %session.id(),
                    state = failed.name(),
                    error = %e,
                    "Generation failed mid-stream"
                );
                return Err(TurnAbort::Failed(e.to_string()));
            }
            None => break,
        }
    }

    state = advance(&state, TurnEvent::StreamEnded)?;
    let reply_chars = reply.chars().count();
    session
        .commit_turn(reply)
        .map_err(|e| TurnAbort::Failed(e.to_string()))?;
    tracing::info!(
        session_id = %session.id(),
        state = state.name(),
        reply_chars,
        "Turn complete"
    );
    Ok(())
}

/// Run a turn and return the full reply once generation completes.
///
/// Drives the same relay path the streaming endpoint uses, so the
/// non-streaming surface cannot diverge from the streamed one.
pub async fn collect_turn(
    session: OwnedMutexGuard<Session>,
    generator: Arc<dyn Generator>,
    user_input: String,
) -> Result<String, TurnFailed> {
    let (events_tx, mut events_rx) = mpsc::channel(32);
    tokio::spawn(run_turn(session, generator, user_input, events_tx));

    let mut reply = String::new();
    while let Some(event) = events_rx.recv().await {
        match event {
            RelayEvent::Fragment(fragment) => reply.push_str(&fragment),
            RelayEvent::Done => return Ok(reply),
            RelayEvent::Failed { message } => return Err(TurnFailed { message }),
        }
    }
    Err(TurnFailed {
        message: "relay ended without a terminal event".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::llm::testing::ScriptedGenerator;
    use crate::llm::GenerateError;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn new_session() -> Arc<Mutex<Session>> {
        Arc::new(Mutex::new(Session::new("test", "sys")))
    }

    async fn locked(session: &Arc<Mutex<Session>>) -> OwnedMutexGuard<Session> {
        session.clone().lock_owned().await
    }

    #[tokio::test]
    async fn fragments_then_done_and_reply_committed() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.queue_reply(["hi", " there"]);
        let session = new_session();

        let (tx, mut rx) = mpsc::channel(32);
        run_turn(locked(&session).await, generator.clone(), "hello".to_string(), tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                RelayEvent::Fragment("hi".to_string()),
                RelayEvent::Fragment(" there".to_string()),
                RelayEvent::Done,
            ]
        );

        // Streaming completeness: the committed message is exactly the
        // concatenation of the forwarded fragments.
        let session = session.lock().await;
        let messages = session.log().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "hi there");
    }

    #[tokio::test]
    async fn snapshot_submitted_includes_the_user_message() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.queue_reply(["ok"]);
        let session = new_session();

        let (tx, _rx) = mpsc::channel(32);
        run_turn(locked(&session).await, generator.clone(), "question".to_string(), tx).await;

        let recorded = generator.recorded_requests();
        assert_eq!(recorded.len(), 1);
        let roles: Vec<Role> = recorded[0].iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert_eq!(recorded[0][1].content, "question");
    }

    #[tokio::test]
    async fn mid_stream_failure_signals_and_rolls_back() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.queue_failure(["partial"], GenerateError::server_error("backend exploded"));
        let session = new_session();

        let (tx, mut rx) = mpsc::channel(32);
        run_turn(locked(&session).await, generator.clone(), "hello".to_string(), tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events[0], RelayEvent::Fragment("partial".to_string()));
        assert!(matches!(events.last(), Some(RelayEvent::Failed { message }) if message.contains("backend exploded")));

        // Nothing committed; the pending user message is gone too.
        assert_eq!(session.lock().await.log().len(), 1);

        // The server stays usable: the next turn succeeds.
        generator.queue_reply(["recovered"]);
        let reply = collect_turn(locked(&session).await, generator, "hello again".to_string())
            .await
            .unwrap();
        assert_eq!(reply, "recovered");
        assert_eq!(session.lock().await.log().len(), 3);
    }

    #[tokio::test]
    async fn start_error_fails_the_turn() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.queue_start_error(GenerateError::exhausted("no slots"));
        let session = new_session();

        let (tx, mut rx) = mpsc::channel(32);
        run_turn(locked(&session).await, generator, "hello".to_string(), tx).await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, RelayEvent::Failed { message } if message.contains("no slots")));
        assert_eq!(session.lock().await.log().len(), 1);
    }

    #[tokio::test]
    async fn client_disconnect_cancels_generation_and_rolls_back() {
        let generator = Arc::new(ScriptedGenerator::new());
        let dropped = generator.queue_endless("tick");
        let session = new_session();

        let (tx, mut rx) = mpsc::channel(2);
        let handle = tokio::spawn(run_turn(
            locked(&session).await,
            generator,
            "hello".to_string(),
            tx,
        ));

        assert_eq!(
            rx.recv().await.unwrap(),
            RelayEvent::Fragment("tick".to_string())
        );
        drop(rx);

        handle.await.unwrap();
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(session.lock().await.log().len(), 1);
    }

    #[tokio::test]
    async fn collect_turn_returns_full_reply() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.queue_reply(["hi there"]);
        let session = new_session();

        let reply = collect_turn(locked(&session).await, generator, "hello".to_string())
            .await
            .unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn empty_reply_is_a_legal_turn() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.queue_reply(Vec::<String>::new());
        let session = new_session();

        let reply = collect_turn(locked(&session).await, generator, "hello".to_string())
            .await
            .unwrap();
        assert_eq!(reply, "");
        assert_eq!(session.lock().await.log().len(), 3);
    }
}
