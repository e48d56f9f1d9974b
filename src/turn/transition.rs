//! Pure turn state transition function

use super::event::TurnEvent;
use super::state::TurnState;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition: {event} in state {state}")]
    InvalidTransition { state: &'static str, event: &'static str },
}

/// Apply one event to a turn state.
///
/// Terminal states accept no further events. An empty reply (stream ends
/// before the first fragment) is a legal completion.
pub fn transition(state: &TurnState, event: TurnEvent) -> Result<TurnState, TransitionError> {
    match (state, event) {
        (TurnState::Idle, TurnEvent::TurnStarted) => Ok(TurnState::AwaitingFirstFragment),

        (TurnState::AwaitingFirstFragment, TurnEvent::FragmentReceived) => Ok(TurnState::Streaming),
        (TurnState::AwaitingFirstFragment, TurnEvent::StreamEnded) => Ok(TurnState::Complete),
        (TurnState::AwaitingFirstFragment, TurnEvent::StreamFailed { message }) => {
            Ok(TurnState::Failed { reason: message })
        }

        (TurnState::Streaming, TurnEvent::FragmentReceived) => Ok(TurnState::Streaming),
        (TurnState::Streaming, TurnEvent::StreamEnded) => Ok(TurnState::Complete),
        (TurnState::Streaming, TurnEvent::StreamFailed { message }) => {
            Ok(TurnState::Failed { reason: message })
        }

        (state, event) => Err(TransitionError::InvalidTransition {
            state: state.name(),
            event: event.name(),
        }),
    }
}
