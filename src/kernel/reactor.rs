use tracing::{debug, info, warn};

use super::event::{Command, Event, TabChange, TabSnapshot};
use super::presence::MonitorMode;
use super::scheduler::{Scheduler, SideEffect, StatusReport, StrikeAlert};
use super::state::{RestoredSession, StrikeAccumulator, StrikePolicy, TickOutcome, TickTicket};
use super::telemetry::event::TelemetryEvent;
use super::telemetry::metrics::TelemetrySnapshot;
use super::telemetry::recorder::TelemetryRecorder;
use super::time::Timestamp;
use crate::classifier::{ClassificationRequest, ClassificationVerdict};
use crate::escalation::PhoneNumbers;
use crate::store::{PersistedState, TabProductivity};

/// Owns the strike accumulator and everything the UI displays.
///
/// `step` is synchronous and performs no I/O. The driver feeds it events with
/// `now` and executes the side effects it returns.
#[derive(Debug)]
pub struct Reactor {
    accumulator: StrikeAccumulator,
    productivity: TabProductivity,
    justification: Option<String>,
    contacts: PhoneNumbers,
    telemetry: TelemetryRecorder,
}

impl Reactor {
    pub fn new(policy: StrikePolicy) -> Self {
        Self {
            accumulator: StrikeAccumulator::new(policy),
            productivity: TabProductivity::Unknown,
            justification: None,
            contacts: PhoneNumbers::default(),
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn accumulator(&self) -> &StrikeAccumulator {
        &self.accumulator
    }

    pub fn productivity(&self) -> TabProductivity {
        self.productivity
    }

    pub fn justification(&self) -> Option<&str> {
        self.justification.as_deref()
    }

    pub fn contacts(&self) -> &PhoneNumbers {
        &self.contacts
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Load saved state at boot. Resumes monitoring if it was on.
    pub fn restore(&mut self, saved: PersistedState, now: Timestamp) -> Vec<SideEffect> {
        self.contacts = PhoneNumbers {
            mom: saved.mom_phone_number.clone(),
            yours: saved.your_phone_number.clone(),
        };

        let mut effects = Vec::new();
        if saved.is_monitoring {
            match saved.current_task.clone() {
                Some(task) => {
                    let restored = RestoredSession {
                        task,
                        paused: saved.is_paused,
                        strikes: saved.strikes,
                        checks: saved.checks,
                        last_strike_at: saved.last_strike_at,
                        mom_called: saved.mom_called,
                        calls: saved.calls,
                    };
                    match self.accumulator.restore(restored, now) {
                        Ok(()) if !saved.is_paused => effects.push(SideEffect::PollNow),
                        Ok(()) => {}
                        Err(e) => warn!("could not restore saved session: {}", e),
                    }
                }
                None => warn!("saved state says monitoring but has no task; staying idle"),
            }
        }

        effects.insert(0, SideEffect::Persist(self.persisted()));
        effects
    }

    /// Fill unset phone numbers from another source (the backend).
    pub fn merge_contacts(&mut self, numbers: PhoneNumbers) -> Vec<SideEffect> {
        let before = self.contacts.clone();
        self.contacts.fill_from(numbers);
        if self.contacts != before {
            vec![SideEffect::Persist(self.persisted())]
        } else {
            Vec::new()
        }
    }

    pub fn step(&mut self, event: Event, now: Timestamp) -> Vec<SideEffect> {
        match event {
            Event::Command(command) => self.command(command, now),
            Event::Poll { tab } => self.poll(tab, now),
            Event::Classified { ticket, verdict } => self.classified(ticket, verdict, now),
            Event::Justified { ticket, text } => {
                if self.accumulator.is_current(ticket) {
                    self.justification = Some(text);
                    vec![SideEffect::Persist(self.persisted())]
                } else {
                    debug!(seq = ticket.seq, "dropping justification for a stale tick");
                    Vec::new()
                }
            }
        }
    }

    fn command(&mut self, command: Command, now: Timestamp) -> Vec<SideEffect> {
        match command {
            Command::Start { task } => match self.accumulator.start(&task, now) {
                Ok(()) => {
                    self.productivity = TabProductivity::Unknown;
                    self.justification = None;
                    self.telemetry.clear();
                    vec![
                        SideEffect::CancelCheck,
                        SideEffect::Persist(self.persisted()),
                        SideEffect::PublishSession { active: true },
                        SideEffect::PollNow,
                    ]
                }
                Err(e) => {
                    warn!("start rejected: {}", e);
                    Vec::new()
                }
            },
            Command::Stop => {
                let was_running = self.accumulator.stop();
                self.productivity = TabProductivity::Unknown;
                self.justification = None;
                let mut effects = vec![SideEffect::CancelCheck, SideEffect::Persist(self.persisted())];
                if was_running {
                    effects.push(SideEffect::PublishSession { active: false });
                }
                effects
            }
            Command::Pause => match self.accumulator.pause(now) {
                Ok(()) => vec![
                    SideEffect::CancelCheck,
                    SideEffect::Persist(self.persisted()),
                    SideEffect::Status(self.status(now)),
                ],
                Err(e) => {
                    warn!("pause rejected: {}", e);
                    Vec::new()
                }
            },
            Command::Resume => match self.accumulator.resume(now) {
                Ok(()) => vec![SideEffect::Persist(self.persisted()), SideEffect::PollNow],
                Err(e) => {
                    warn!("resume rejected: {}", e);
                    Vec::new()
                }
            },
            Command::SetPhoneNumbers { mom, yours } => {
                self.contacts.apply(mom, yours);
                vec![SideEffect::Persist(self.persisted())]
            }
            Command::Status => vec![SideEffect::Status(self.status(now))],
        }
    }

    fn poll(&mut self, tab: Option<TabSnapshot>, now: Timestamp) -> Vec<SideEffect> {
        // 1. Gate on mode
        if self.accumulator.mode() != MonitorMode::Active {
            return Vec::new();
        }
        let Some(task) = self.accumulator.session().map(|s| s.task.clone()) else {
            warn!("active without a task; skipping tick");
            return Vec::new();
        };
        let Some(tab) = tab else {
            debug!("no active tab; skipping tick");
            return Vec::new();
        };

        let mut effects = Vec::new();

        // 2. Observe tab
        if let TabChange::Changed { previous } = self.accumulator.observe_tab(&tab.url, now) {
            info!(from = ?previous, to = %tab.url, "tab changed");
            self.productivity = TabProductivity::Checking;
            self.justification = None;
            effects.push(SideEffect::CancelCheck);
            effects.push(SideEffect::Persist(self.persisted()));
        }

        // 3. Arm the recheck for the moment the strike threshold is crossed
        if let Some(wait) = self.accumulator.until_strike_eligible(now) {
            effects.push(SideEffect::ScheduleCheck(wait));
        }

        // 4. Classify (even before eligibility, so the badge updates now)
        match self.accumulator.begin_tick() {
            Some(ticket) => effects.push(SideEffect::Classify {
                ticket,
                request: ClassificationRequest::new(task, tab.title, tab.url),
            }),
            None => debug!("classification still in flight; skipping"),
        }

        effects
    }

    fn classified(&mut self, ticket: TickTicket, verdict: ClassificationVerdict, now: Timestamp) -> Vec<SideEffect> {
        match self.accumulator.complete_tick(ticket, verdict.on_task(), now) {
            TickOutcome::Stale => {
                self.telemetry.record(TelemetryEvent::StaleResult { at: now });
                Vec::new()
            }
            TickOutcome::Abandoned => {
                self.telemetry.record(TelemetryEvent::TickAbandoned { at: now });
                warn!("no classifier produced a verdict; tick abandoned");
                Vec::new()
            }
            TickOutcome::Recorded(report) => {
                self.productivity = if report.on_task {
                    TabProductivity::Productive
                } else {
                    TabProductivity::Unproductive
                };
                self.telemetry.record(TelemetryEvent::TickRecorded {
                    at: now,
                    source: verdict.source,
                    verdict: verdict.verdict,
                    strike_added: report.strike_added,
                    escalated: report.escalate,
                });

                let alert = report.strike_added.then(|| {
                    let url = self.accumulator.current_url().unwrap_or_default();
                    info!(strikes = report.strikes, url, "strike added");
                    StrikeAlert::new(url, report.strikes)
                });
                if report.escalate {
                    info!(strikes = report.strikes, "escalation threshold reached");
                }

                let task = self
                    .accumulator
                    .session()
                    .map(|s| s.task.clone())
                    .unwrap_or_default();
                let mut effects = vec![SideEffect::Persist(self.persisted())];
                effects.extend(alert.map(SideEffect::AlertStrike));
                effects.extend(Scheduler::project(&report, &task, self.contacts.escalation_target()));
                effects.push(SideEffect::Status(self.status(now)));
                effects
            }
        }
    }

    pub fn persisted(&self) -> PersistedState {
        let mode = self.accumulator.mode();
        let state = self.accumulator.state();
        PersistedState {
            current_task: self.accumulator.session().map(|s| s.task.clone()),
            is_monitoring: mode != MonitorMode::Idle,
            is_paused: mode == MonitorMode::Paused,
            strikes: state.strikes,
            checks: state.checks,
            last_strike_at: state.last_strike_at,
            mom_called: state.mom_called,
            calls: state.calls,
            mom_phone_number: self.contacts.mom.clone(),
            your_phone_number: self.contacts.yours.clone(),
            current_tab_productivity: self.productivity,
            productivity_justification: self.justification.clone(),
        }
    }

    pub fn status(&self, now: Timestamp) -> StatusReport {
        let state = self.accumulator.state();
        StatusReport {
            mode: self.accumulator.mode(),
            task: self.accumulator.session().map(|s| s.task.clone()),
            url: self.accumulator.current_url().map(str::to_string),
            productivity: self.productivity,
            justification: self.justification.clone(),
            strikes: state.strikes,
            checks: state.checks,
            calls: state.calls,
            strike_countdown_ms: self
                .accumulator
                .until_strike_eligible(now)
                .map(|d| d.as_millis() as u64),
            telemetry: self.telemetry.snapshot(),
        }
    }
}
