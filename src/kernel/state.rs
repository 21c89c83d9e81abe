use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::event::TabChange;
use super::presence::{ModeGraph, ModeRequest, MonitorMode};
use super::time::Timestamp;
use crate::error::TransitionError;

/// What happens to the visible strike counter once an escalation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReset {
    /// Strikes keep counting after the call.
    #[default]
    Keep,
    /// Strikes drop back to zero for display; `calls` keeps the tally.
    DisplayOnly,
}

/// Thresholds that drive the strike accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikePolicy {
    /// Minimum continuous time on a tab before it can earn a strike.
    pub strike_after: Duration,
    /// Minimum time between two strikes.
    pub cooldown: Duration,
    /// Strike count at which the escalation call is placed.
    pub escalation_threshold: u32,
    pub reset: EscalationReset,
}

impl Default for StrikePolicy {
    fn default() -> Self {
        Self {
            strike_after: Duration::from_secs(30),
            cooldown: Duration::from_secs(30),
            escalation_threshold: 2,
            reset: EscalationReset::Keep,
        }
    }
}

/// Counters and clocks of one monitoring session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrikeState {
    pub strikes: u32,
    pub checks: u32,
    pub last_strike_at: Option<Timestamp>,
    pub tab_started_at: Timestamp,
    pub total_paused: Duration,
    pub mom_called: bool,
    /// Escalations fired this session.
    pub calls: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub task: String,
    pub started_at: Timestamp,
}

/// Saved session data used to pick monitoring back up after a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredSession {
    pub task: String,
    pub paused: bool,
    pub strikes: u32,
    pub checks: u32,
    pub last_strike_at: Option<Timestamp>,
    pub mom_called: bool,
    pub calls: u32,
}

/// Identifies one classification round trip.
/// A result is only applied if its ticket is still the one in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickTicket {
    pub seq: u64,
    pub generation: u64,
    pub tab_epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub on_task: bool,
    pub strike_added: bool,
    pub escalate: bool,
    pub strikes: u32,
    pub checks: u32,
    pub time_on_tab: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The ticket no longer matches the live session/tab; result ignored.
    Stale,
    /// Every classifier came back unknown. No counters moved.
    Abandoned,
    Recorded(TickReport),
}

/// The polling/strike/cooldown state machine.
///
/// All mutation goes through the transition methods; callers supply `now`
/// so the machine is deterministic under test.
#[derive(Debug)]
pub struct StrikeAccumulator {
    policy: StrikePolicy,
    mode: MonitorMode,
    session: Option<Session>,
    state: StrikeState,
    paused_at: Option<Timestamp>,
    current_url: Option<String>,
    // Bumped on start/stop/restore; invalidates in-flight tickets.
    generation: u64,
    // Bumped on every tab change.
    tab_epoch: u64,
    next_seq: u64,
    in_flight: Option<TickTicket>,
}

impl StrikeAccumulator {
    pub fn new(policy: StrikePolicy) -> Self {
        Self {
            policy,
            mode: MonitorMode::Idle,
            session: None,
            state: StrikeState::default(),
            paused_at: None,
            current_url: None,
            generation: 0,
            tab_epoch: 0,
            next_seq: 0,
            in_flight: None,
        }
    }

    pub fn policy(&self) -> &StrikePolicy {
        &self.policy
    }

    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    pub fn state(&self) -> &StrikeState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn in_flight(&self) -> Option<TickTicket> {
        self.in_flight
    }

    /// Idle -> Active. Zeroes every counter and clock.
    pub fn start(&mut self, task: &str, now: Timestamp) -> Result<(), TransitionError> {
        let task = task.trim();
        if task.is_empty() {
            return Err(TransitionError::EmptyTask);
        }
        let next = ModeGraph::transition(self.mode, ModeRequest::Start)
            .ok_or(TransitionError::AlreadyMonitoring)?;

        let session = self.begin_session(task, now);
        self.mode = next;
        info!(%session, task, "monitoring started");
        Ok(())
    }

    /// Re-enter a saved session. Counters and cooldown come back, the tab
    /// clock starts fresh.
    pub fn restore(&mut self, saved: RestoredSession, now: Timestamp) -> Result<(), TransitionError> {
        let task = saved.task.trim();
        if task.is_empty() {
            return Err(TransitionError::EmptyTask);
        }
        if self.mode != MonitorMode::Idle {
            return Err(TransitionError::AlreadyMonitoring);
        }

        let session = self.begin_session(task, now);
        self.state.strikes = saved.strikes;
        self.state.checks = saved.checks;
        self.state.last_strike_at = saved.last_strike_at;
        self.state.mom_called = saved.mom_called;
        self.state.calls = saved.calls;

        if saved.paused {
            self.mode = MonitorMode::Paused;
            self.paused_at = Some(now);
        } else {
            self.mode = MonitorMode::Active;
        }
        info!(%session, task, paused = saved.paused, strikes = saved.strikes, "monitoring restored");
        Ok(())
    }

    /// Active -> Paused. Freezes time-on-tab and drops any in-flight tick.
    pub fn pause(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        let next = ModeGraph::transition(self.mode, ModeRequest::Pause)
            .ok_or(TransitionError::NotActive)?;
        self.mode = next;
        self.paused_at = Some(now);
        self.in_flight = None;
        info!("monitoring paused");
        Ok(())
    }

    /// Paused -> Active. The pause length is excluded from time-on-tab.
    pub fn resume(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        let next = ModeGraph::transition(self.mode, ModeRequest::Resume)
            .ok_or(TransitionError::NotPaused)?;
        if let Some(paused_at) = self.paused_at.take() {
            self.state.total_paused += now.saturating_since(paused_at);
        }
        self.mode = next;
        info!(paused_total_ms = self.state.total_paused.as_millis() as u64, "monitoring resumed");
        Ok(())
    }

    /// Any -> Idle. Returns whether a session was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.mode != MonitorMode::Idle;
        self.mode = ModeGraph::transition(self.mode, ModeRequest::Stop).unwrap_or(MonitorMode::Idle);
        let session = self.session.take();
        self.state = StrikeState::default();
        self.paused_at = None;
        self.current_url = None;
        self.generation += 1;
        self.in_flight = None;
        if let Some(session) = session.filter(|_| was_running) {
            info!(session = %session.id, "monitoring stopped");
        }
        was_running
    }

    /// Record the active tab. A different url is the "tab-changed" transition:
    /// tab clock, cooldown and pause accounting go back to zero.
    pub fn observe_tab(&mut self, url: &str, now: Timestamp) -> TabChange {
        if self.current_url.as_deref() == Some(url) {
            return TabChange::Unchanged;
        }

        let previous = self.current_url.replace(url.to_string());
        self.state.tab_started_at = now;
        self.state.last_strike_at = None;
        self.state.total_paused = Duration::ZERO;
        self.tab_epoch += 1;
        self.in_flight = None;
        debug!(url, "tab changed, clock reset");

        TabChange::Changed { previous }
    }

    /// `now - tab_started_at - total_paused`, with an ongoing pause excluded too.
    pub fn time_on_tab(&self, now: Timestamp) -> Duration {
        let elapsed = now.saturating_since(self.state.tab_started_at);
        let paused_now = self
            .paused_at
            .map(|at| now.saturating_since(at))
            .unwrap_or_default();
        elapsed
            .saturating_sub(self.state.total_paused)
            .saturating_sub(paused_now)
    }

    /// Time left until the current tab becomes strike-eligible.
    /// None when not Active, no tab is known, or the threshold is already crossed.
    pub fn until_strike_eligible(&self, now: Timestamp) -> Option<Duration> {
        if self.mode != MonitorMode::Active || self.current_url.is_none() {
            return None;
        }
        let on_tab = self.time_on_tab(now);
        if on_tab >= self.policy.strike_after {
            None
        } else {
            Some(self.policy.strike_after - on_tab)
        }
    }

    /// Claim the right to classify. Fails while another tick is in flight,
    /// when not Active, or before any tab has been observed.
    pub fn begin_tick(&mut self) -> Option<TickTicket> {
        if self.mode != MonitorMode::Active || self.current_url.is_none() {
            return None;
        }
        if self.in_flight.is_some() {
            return None;
        }
        self.next_seq += 1;
        let ticket = TickTicket {
            seq: self.next_seq,
            generation: self.generation,
            tab_epoch: self.tab_epoch,
        };
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    /// Whether the ticket still refers to the live session and tab.
    pub fn is_current(&self, ticket: TickTicket) -> bool {
        self.mode != MonitorMode::Idle
            && ticket.generation == self.generation
            && ticket.tab_epoch == self.tab_epoch
    }

    /// Apply a verdict (`None` = unknown) to the strike counters.
    pub fn complete_tick(&mut self, ticket: TickTicket, on_task: Option<bool>, now: Timestamp) -> TickOutcome {
        if self.in_flight != Some(ticket) || self.mode != MonitorMode::Active {
            debug!(seq = ticket.seq, "discarding stale classification result");
            return TickOutcome::Stale;
        }
        self.in_flight = None;

        let Some(on_task) = on_task else {
            return TickOutcome::Abandoned;
        };

        let time_on_tab = self.time_on_tab(now);
        let eligible = time_on_tab >= self.policy.strike_after;
        let cooled_down = self
            .state
            .last_strike_at
            .map_or(true, |at| now.saturating_since(at) >= self.policy.cooldown);

        let strike_added = !on_task && eligible && cooled_down;
        if strike_added {
            // Stamp first so a duplicate result cannot double count.
            self.state.last_strike_at = Some(now);
            self.state.strikes += 1;
        }
        self.state.checks += 1;

        let mut escalate = false;
        if self.state.strikes >= self.policy.escalation_threshold
            && !self.state.mom_called
            && !on_task
            && eligible
        {
            self.state.mom_called = true;
            self.state.calls += 1;
            escalate = true;
            if self.policy.reset == EscalationReset::DisplayOnly {
                self.state.strikes = 0;
            }
        }

        TickOutcome::Recorded(TickReport {
            on_task,
            strike_added,
            escalate,
            strikes: self.state.strikes,
            checks: self.state.checks,
            time_on_tab,
        })
    }

    fn begin_session(&mut self, task: &str, now: Timestamp) -> Uuid {
        let id = Uuid::new_v4();
        self.session = Some(Session {
            id,
            task: task.to_string(),
            started_at: now,
        });
        self.state = StrikeState {
            tab_started_at: now,
            ..StrikeState::default()
        };
        self.paused_at = None;
        self.current_url = None;
        self.generation += 1;
        self.in_flight = None;
        id
    }
}
