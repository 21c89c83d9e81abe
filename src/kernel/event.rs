use super::state::TickTicket;
use super::time::Timestamp;
use crate::classifier::verdict::ClassificationVerdict;

/// Immutable snapshot of the focused browser tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSnapshot {
    pub url: String,
    pub title: String,
    pub observed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabChange {
    Unchanged,
    Changed { previous: Option<String> },
}

/// User-facing commands (start/stop/pause/resume and settings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { task: String },
    Stop,
    Pause,
    Resume,
    /// `None` leaves a number unchanged, `Some("")` clears it.
    SetPhoneNumbers {
        mom: Option<String>,
        yours: Option<String>,
    },
    Status,
}

#[derive(Debug, Clone)]
pub enum Event {
    Command(Command),
    /// Periodic tick (and the one-shot eligibility recheck).
    /// `tab` is None when no tab is focused.
    Poll { tab: Option<TabSnapshot> },
    /// Result of a classification started by `SideEffect::Classify`.
    Classified {
        ticket: TickTicket,
        verdict: ClassificationVerdict,
    },
    /// Human-readable reason for the last verdict.
    Justified { ticket: TickTicket, text: String },
}
