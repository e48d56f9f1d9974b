//! Property-based tests for the turn state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::event::TurnEvent;
use super::state::TurnState;
use super::transition::transition;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_event() -> impl Strategy<Value = TurnEvent> {
    prop_oneof![
        Just(TurnEvent::TurnStarted),
        Just(TurnEvent::FragmentReceived),
        Just(TurnEvent::StreamEnded),
        "[a-zA-Z ]{1,30}".prop_map(|message| TurnEvent::StreamFailed { message }),
    ]
}

fn arb_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        Just(TurnState::Idle),
        Just(TurnState::AwaitingFirstFragment),
        Just(TurnState::Streaming),
        Just(TurnState::Complete),
        "[a-zA-Z ]{1,30}".prop_map(|reason| TurnState::Failed { reason }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Terminal states never transition, whatever the event.
    #[test]
    fn terminal_states_are_absorbing(event in arb_event()) {
        prop_assert!(transition(&TurnState::Complete, event.clone()).is_err());
        let failed = TurnState::Failed { reason: "r".to_string() };
        prop_assert!(transition(&failed, event).is_err());
    }

    /// `TurnStarted` is accepted in exactly one state: `Idle`.
    #[test]
    fn turn_started_only_from_idle(state in arb_state()) {
        let result = transition(&state, TurnEvent::TurnStarted);
        if state == TurnState::Idle {
            prop_assert_eq!(result.unwrap(), TurnState::AwaitingFirstFragment);
        } else {
            prop_assert!(result.is_err());
        }
    }

    /// Applying an arbitrary event sequence from `Idle` either errors or
    /// stays within the legal lifecycle; once a terminal state is reached,
    /// every further event is rejected.
    #[test]
    fn event_sequences_respect_lifecycle(
        events in proptest::collection::vec(arb_event(), 0..20),
    ) {
        let mut state = TurnState::Idle;
        for event in events {
            let was_terminal = state.is_terminal();
            match transition(&state, event) {
                Ok(next) => {
                    prop_assert!(!was_terminal, "terminal state transitioned");
                    state = next;
                }
                Err(_) => {
                    // Rejected events leave the state untouched.
                }
            }
        }
    }

    /// A stream failure always lands in `Failed` carrying the message.
    #[test]
    fn failure_preserves_reason(message in "[a-zA-Z ]{1,30}") {
        for from in [TurnState::AwaitingFirstFragment, TurnState::Streaming] {
            let next = transition(
                &from,
                TurnEvent::StreamFailed { message: message.clone() },
            ).unwrap();
            prop_assert_eq!(next, TurnState::Failed { reason: message.clone() });
        }
    }
}
