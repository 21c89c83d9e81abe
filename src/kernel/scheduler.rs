use serde::Serialize;
use std::time::Duration;

use super::presence::MonitorMode;
use super::state::{TickReport, TickTicket};
use super::telemetry::metrics::TelemetrySnapshot;
use crate::classifier::ClassificationRequest;
use crate::store::{PersistedState, TabProductivity};

/// What the driver should do after a reactor step.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Run the classifier chain for this ticket and report back.
    Classify {
        ticket: TickTicket,
        request: ClassificationRequest,
    },
    /// Run a poll right away (after start/resume).
    PollNow,
    /// Arm the one-shot recheck for when the tab becomes strike-eligible.
    ScheduleCheck(Duration),
    CancelCheck,
    Persist(PersistedState),
    /// Bump the backend's lifetime strike counter.
    RecordStrike,
    /// Tell the user a strike just landed.
    AlertStrike(StrikeAlert),
    Escalate {
        task: String,
        phone: Option<String>,
    },
    PublishSession { active: bool },
    Status(StatusReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrikeAlert {
    /// Hostname of the offending tab, or the raw url if it has none.
    pub host: String,
    pub strikes: u32,
}

impl StrikeAlert {
    pub fn new(url: &str, strikes: u32) -> Self {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        Self { host, strikes }
    }
}

/// Everything the UI shows: badge, countdown, counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub mode: MonitorMode,
    pub task: Option<String>,
    pub url: Option<String>,
    pub productivity: TabProductivity,
    pub justification: Option<String>,
    pub strikes: u32,
    pub checks: u32,
    pub calls: u32,
    /// Milliseconds until the current tab can earn a strike.
    pub strike_countdown_ms: Option<u64>,
    pub telemetry: TelemetrySnapshot,
}

pub struct Scheduler;

impl Scheduler {
    /// Pure Projection: TickReport -> SideEffects.
    /// Persistence is added by the caller, which owns the full state.
    pub fn project(report: &TickReport, task: &str, phone: Option<&str>) -> Vec<SideEffect> {
        let mut effects = Vec::new();

        if report.strike_added {
            effects.push(SideEffect::RecordStrike);
        }

        if report.escalate {
            effects.push(SideEffect::Escalate {
                task: task.to_string(),
                phone: phone.map(str::to_string),
            });
        }

        effects
    }
}
