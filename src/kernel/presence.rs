use serde::{Deserialize, Serialize};

/// Monitoring lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MonitorMode {
    /// Monitoring off. No session, no ticks.
    #[default]
    Idle,
    /// Monitoring on. Ticks classify the active tab and accumulate strikes.
    Active,
    /// Monitoring on but suspended. Time-on-tab is frozen.
    Paused,
}

/// Requests that ask for a mode transition.
/// These are REQUESTS; the graph decides whether they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    Start,
    Pause,
    Resume,
    Stop,
}

/// The transition graph for `MonitorMode`.
pub struct ModeGraph;

impl ModeGraph {
    /// Pure function: (Current Mode, Request) -> New Mode.
    /// Returns None if the transition is invalid.
    pub fn transition(current: MonitorMode, request: ModeRequest) -> Option<MonitorMode> {
        use ModeRequest::*;
        use MonitorMode::*;

        match (current, request) {
            (Idle, Start) => Some(Active),
            (Active, Pause) => Some(Paused),
            (Paused, Resume) => Some(Active),

            // Stop is always honoured, including from Idle.
            (_, Stop) => Some(Idle),

            _ => None,
        }
    }
}
