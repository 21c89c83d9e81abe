use ontask::error::TransitionError;
use ontask::kernel::presence::MonitorMode;
use ontask::kernel::state::{
    EscalationReset, RestoredSession, StrikeAccumulator, StrikePolicy, TickOutcome, TickReport,
};
use ontask::kernel::time::Timestamp;
use std::time::Duration;

const EMAIL: &str = "https://mail.example.com/inbox";
const VIDEO: &str = "https://videos.example.com/watch?v=cats";

fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn started(task: &str) -> StrikeAccumulator {
    let mut acc = StrikeAccumulator::new(StrikePolicy::default());
    acc.start(task, at(0)).expect("start from idle");
    acc
}

/// One full tick: observe the tab, claim a ticket, apply the verdict.
fn tick(acc: &mut StrikeAccumulator, url: &str, now: Timestamp, on_task: Option<bool>) -> TickOutcome {
    acc.observe_tab(url, now);
    let ticket = acc.begin_tick().expect("no tick in flight");
    acc.complete_tick(ticket, on_task, now)
}

fn recorded(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Recorded(report) => report,
        other => panic!("expected a recorded tick, got {:?}", other),
    }
}

#[test]
fn test_scenario_a_on_task_never_strikes() {
    let mut acc = started("answer emails");

    // 1. Stay on the email client for 40s, polled every 5s
    for secs in (0..=40).step_by(5) {
        let report = recorded(tick(&mut acc, EMAIL, at(secs), Some(true)));
        assert!(!report.strike_added);
        assert!(!report.escalate);
    }

    // 2. Verify
    assert_eq!(acc.state().strikes, 0);
    assert_eq!(acc.state().checks, 9);
    assert!(!acc.state().mom_called);
}

#[test]
fn test_scenario_b_two_strikes_then_escalation() {
    let mut acc = started("write report");
    let mut strike_times = Vec::new();
    let mut escalations = Vec::new();

    // 1. Off-task on an entertainment site for 65s
    for secs in (0..=65).step_by(5) {
        let report = recorded(tick(&mut acc, VIDEO, at(secs), Some(false)));
        if report.strike_added {
            strike_times.push(secs);
        }
        if report.escalate {
            escalations.push(secs);
        }
    }

    // 2. Exactly two strikes, at the threshold and one cooldown later
    assert_eq!(strike_times, vec![30, 60]);
    assert_eq!(acc.state().strikes, 2);

    // 3. Escalation fires once, with the second strike
    assert_eq!(escalations, vec![60]);
    assert!(acc.state().mom_called);
    assert_eq!(acc.state().calls, 1);
}

#[test]
fn test_scenario_c_unknown_verdicts_are_abandoned() {
    let mut acc = started("write report");
    recorded(tick(&mut acc, VIDEO, at(0), Some(false)));
    let before = acc.state().clone();

    // 1. Three unknown verdicts, all past the eligibility threshold
    for secs in [35, 40, 45] {
        assert_eq!(tick(&mut acc, VIDEO, at(secs), None), TickOutcome::Abandoned);
    }

    // 2. No counters moved and nothing is left in flight
    assert_eq!(acc.state().checks, before.checks);
    assert_eq!(acc.state().strikes, before.strikes);
    assert_eq!(acc.state().last_strike_at, None);
    assert_eq!(acc.in_flight(), None);
}

#[test]
fn test_scenario_d_pause_shifts_eligibility() {
    let mut acc = started("write report");
    acc.observe_tab(VIDEO, at(0));

    // 1. Pause at t=20, resume at t=50
    acc.pause(at(20)).expect("pause");
    assert_eq!(acc.time_on_tab(at(35)), Duration::from_secs(20));
    acc.resume(at(50)).expect("resume");

    // 2. At t=50 only 20s count; eligibility lands at t=60
    assert_eq!(acc.time_on_tab(at(50)), Duration::from_secs(20));
    assert_eq!(acc.until_strike_eligible(at(50)), Some(Duration::from_secs(10)));

    let early = recorded(tick(&mut acc, VIDEO, at(55), Some(false)));
    assert!(!early.strike_added);

    let due = recorded(tick(&mut acc, VIDEO, at(60), Some(false)));
    assert!(due.strike_added);
    assert_eq!(due.time_on_tab, Duration::from_secs(30));
}

#[test]
fn test_strike_requires_eligibility_and_cooldown() {
    let mut acc = started("write report");

    // 1. Never before 30s on tab
    for secs in [0, 10, 29] {
        assert!(!recorded(tick(&mut acc, VIDEO, at(secs), Some(false))).strike_added);
    }

    // 2. First strike at 30s, then none inside the cooldown
    assert!(recorded(tick(&mut acc, VIDEO, at(30), Some(false))).strike_added);
    for secs in [31, 45, 59] {
        assert!(!recorded(tick(&mut acc, VIDEO, at(secs), Some(false))).strike_added);
    }

    // 3. Cooldown elapsed
    assert!(recorded(tick(&mut acc, VIDEO, at(60), Some(false))).strike_added);
    assert_eq!(acc.state().last_strike_at, Some(at(60)));
}

#[test]
fn test_strikes_monotonic_while_active() {
    let mut acc = StrikeAccumulator::new(StrikePolicy {
        escalation_threshold: 5,
        ..StrikePolicy::default()
    });
    acc.start("write report", at(0)).expect("start");

    let verdicts = [Some(false), None, Some(true), Some(false), Some(false), None];
    let mut last = 0;
    for (i, secs) in (0..300).step_by(7).enumerate() {
        let _ = tick(&mut acc, VIDEO, at(secs), verdicts[i % verdicts.len()]);
        assert!(acc.state().strikes >= last, "strikes decreased at t={}", secs);
        last = acc.state().strikes;
    }
    assert!(last > 0);
}

#[test]
fn test_mom_called_flips_once_per_session() {
    let mut acc = started("write report");
    let mut escalations = 0;

    for secs in (0..=300).step_by(5) {
        if recorded(tick(&mut acc, VIDEO, at(secs), Some(false))).escalate {
            escalations += 1;
        }
    }

    assert_eq!(escalations, 1);
    assert!(acc.state().strikes > 2);
    assert_eq!(acc.state().calls, 1);
}

#[test]
fn test_display_only_reset_zeroes_strikes_after_call() {
    let mut acc = StrikeAccumulator::new(StrikePolicy {
        reset: EscalationReset::DisplayOnly,
        ..StrikePolicy::default()
    });
    acc.start("write report", at(0)).expect("start");

    for secs in (0..=60).step_by(5) {
        let _ = tick(&mut acc, VIDEO, at(secs), Some(false));
    }

    assert_eq!(acc.state().strikes, 0);
    assert_eq!(acc.state().calls, 1);
    assert!(acc.state().mom_called);
}

#[test]
fn test_tab_change_resets_clock_and_cooldown() {
    let mut acc = started("write report");
    recorded(tick(&mut acc, VIDEO, at(0), Some(false)));
    assert!(recorded(tick(&mut acc, VIDEO, at(30), Some(false))).strike_added);
    acc.pause(at(35)).expect("pause");
    acc.resume(at(40)).expect("resume");

    // 1. Switch tabs with a strike imminent
    let change = acc.observe_tab("https://games.example.com", at(58));
    assert!(matches!(change, ontask::kernel::event::TabChange::Changed { .. }));

    // 2. Clock and cooldown are gone, strikes survive
    assert_eq!(acc.time_on_tab(at(58)), Duration::ZERO);
    assert_eq!(acc.state().last_strike_at, None);
    assert_eq!(acc.state().total_paused, Duration::ZERO);
    assert_eq!(acc.state().strikes, 1);

    // 3. The new tab needs its own 30s
    assert!(!recorded(tick(&mut acc, "https://games.example.com", at(80), Some(false))).strike_added);
    assert!(recorded(tick(&mut acc, "https://games.example.com", at(88), Some(false))).strike_added);
}

#[test]
fn test_start_resets_counters() {
    let mut acc = started("write report");
    for secs in (0..=60).step_by(5) {
        let _ = tick(&mut acc, VIDEO, at(secs), Some(false));
    }
    assert!(acc.state().mom_called);

    acc.stop();
    acc.start("study", at(100)).expect("restart");

    assert_eq!(acc.state().strikes, 0);
    assert_eq!(acc.state().checks, 0);
    assert_eq!(acc.state().last_strike_at, None);
    assert!(!acc.state().mom_called);
    assert_eq!(acc.current_url(), None);
}

#[test]
fn test_each_session_gets_its_own_id() {
    let mut acc = started("write report");
    let first = acc.session().expect("session").id;

    acc.stop();
    assert!(acc.session().is_none());

    acc.start("write report", at(10)).expect("restart");
    let second = acc.session().expect("session").id;
    assert_ne!(first, second);
}

#[test]
fn test_transition_errors() {
    let mut acc = StrikeAccumulator::new(StrikePolicy::default());

    assert_eq!(acc.start("   ", at(0)), Err(TransitionError::EmptyTask));
    assert_eq!(acc.pause(at(0)), Err(TransitionError::NotActive));
    assert_eq!(acc.resume(at(0)), Err(TransitionError::NotPaused));
    assert!(!acc.stop());

    acc.start("write report", at(0)).expect("start");
    assert_eq!(acc.start("again", at(1)), Err(TransitionError::AlreadyMonitoring));
    assert_eq!(acc.resume(at(1)), Err(TransitionError::NotPaused));

    acc.pause(at(2)).expect("pause");
    assert_eq!(acc.pause(at(3)), Err(TransitionError::NotActive));
    assert_eq!(acc.mode(), MonitorMode::Paused);
    assert!(acc.stop());
    assert_eq!(acc.mode(), MonitorMode::Idle);
}

#[test]
fn test_single_tick_in_flight() {
    let mut acc = started("write report");
    acc.observe_tab(VIDEO, at(0));

    let first = acc.begin_tick().expect("first ticket");
    assert!(acc.begin_tick().is_none(), "second tick must wait");

    recorded(acc.complete_tick(first, Some(true), at(1)));
    assert!(acc.begin_tick().is_some());
}

#[test]
fn test_late_results_are_stale() {
    let mut acc = started("write report");
    acc.observe_tab(VIDEO, at(0));

    // 1. Stopped while in flight
    let ticket = acc.begin_tick().expect("ticket");
    acc.stop();
    assert_eq!(acc.complete_tick(ticket, Some(false), at(40)), TickOutcome::Stale);
    assert_eq!(acc.state().checks, 0);

    // 2. Tab changed while in flight
    acc.start("write report", at(50)).expect("start");
    acc.observe_tab(VIDEO, at(50));
    let ticket = acc.begin_tick().expect("ticket");
    acc.observe_tab(EMAIL, at(55));
    assert!(!acc.is_current(ticket));
    assert_eq!(acc.complete_tick(ticket, Some(false), at(90)), TickOutcome::Stale);

    // 3. Paused while in flight
    let ticket = acc.begin_tick().expect("ticket");
    acc.pause(at(60)).expect("pause");
    assert_eq!(acc.complete_tick(ticket, Some(false), at(95)), TickOutcome::Stale);

    // 4. Duplicate delivery of an applied result
    acc.resume(at(61)).expect("resume");
    let ticket = acc.begin_tick().expect("ticket");
    recorded(acc.complete_tick(ticket, Some(true), at(62)));
    assert_eq!(acc.complete_tick(ticket, Some(true), at(62)), TickOutcome::Stale);
    assert_eq!(acc.state().checks, 1);
}

#[test]
fn test_restore_keeps_counters_with_fresh_clock() {
    let mut acc = StrikeAccumulator::new(StrikePolicy::default());
    acc.restore(
        RestoredSession {
            task: "write report".into(),
            paused: false,
            strikes: 1,
            checks: 7,
            last_strike_at: Some(at(90)),
            mom_called: false,
            calls: 0,
        },
        at(100),
    )
    .expect("restore");

    assert_eq!(acc.mode(), MonitorMode::Active);
    assert_eq!(acc.state().strikes, 1);
    assert_eq!(acc.state().checks, 7);

    // 1. Tab clock restarted at boot, and the first observation resets cooldown
    assert!(!recorded(tick(&mut acc, VIDEO, at(120), Some(false))).strike_added);
    let report = recorded(tick(&mut acc, VIDEO, at(150), Some(false)));
    assert!(report.strike_added);
    assert!(report.escalate);
}

#[test]
fn test_restore_paused_session() {
    let mut acc = StrikeAccumulator::new(StrikePolicy::default());
    acc.restore(
        RestoredSession {
            task: "write report".into(),
            paused: true,
            strikes: 0,
            checks: 2,
            last_strike_at: None,
            mom_called: false,
            calls: 0,
        },
        at(10),
    )
    .expect("restore");

    assert_eq!(acc.mode(), MonitorMode::Paused);
    assert!(acc.begin_tick().is_none());
    acc.resume(at(20)).expect("resume");
    assert_eq!(acc.mode(), MonitorMode::Active);
}
