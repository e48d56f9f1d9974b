//! Turn state types

/// State of a single turn's streaming lifecycle.
///
/// `Complete` commits the accumulated assistant message; `Failed` commits
/// nothing (the session rolls back the pending user message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    /// No turn in flight
    Idle,
    /// Generation invoked, nothing emitted yet
    AwaitingFirstFragment,
    /// At least one fragment forwarded
    Streaming,
    Complete,
    Failed { reason: String },
}

impl TurnState {
    #[allow(dead_code)] // Used in tests
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Complete | TurnState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::AwaitingFirstFragment => "awaiting_first_fragment",
            TurnState::Streaming => "streaming",
            TurnState::Complete => "complete",
            TurnState::Failed { .. } => "failed",
        }
    }
}
