//! Dispatch lifecycle states.

/// Where a dispatch currently is. `Acknowledged` and `TimedOut` are
/// transient: the dispatcher returns to `Idle` once the channel is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Authorizing,
    Connecting,
    Publishing,
    AwaitingAck,
    Acknowledged,
    TimedOut,
}

impl DispatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchState::Idle => "idle",
            DispatchState::Authorizing => "authorizing",
            DispatchState::Connecting => "connecting",
            DispatchState::Publishing => "publishing",
            DispatchState::AwaitingAck => "awaiting_ack",
            DispatchState::Acknowledged => "acknowledged",
            DispatchState::TimedOut => "timed_out",
        }
    }
}
