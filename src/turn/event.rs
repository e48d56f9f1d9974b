//! Events that drive a turn through its streaming lifecycle

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// User message appended, generation about to be invoked
    TurnStarted,
    /// The adapter emitted a text fragment
    FragmentReceived,
    /// The adapter's sequence ended normally
    StreamEnded,
    /// The adapter raised mid-stream
    StreamFailed { message: String },
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::TurnStarted => "turn_started",
            TurnEvent::FragmentReceived => "fragment_received",
            TurnEvent::StreamEnded => "stream_ended",
            TurnEvent::StreamFailed { .. } => "stream_failed",
        }
    }
}
