use ontask::classifier::{
    BoxFuture, ClassificationRequest, Classifier, ClassifierGateway, ClassifierSource, Justifier, Screenshot, Verdict,
};
use ontask::driver::Driver;
use ontask::escalation::EscalationTrigger;
use ontask::kernel::event::{Command, Event, TabSnapshot};
use ontask::kernel::presence::MonitorMode;
use ontask::kernel::reactor::Reactor;
use ontask::kernel::state::StrikePolicy;
use ontask::kernel::time::Timestamp;
use ontask::observer::{ReportedTab, ScreenCapture};
use ontask::store::{PersistedState, StateStore, TabProductivity};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

struct Scripted {
    verdict: Verdict,
    delay: Duration,
}

impl Classifier for Scripted {
    fn source(&self) -> ClassifierSource {
        ClassifierSource::AgentService
    }

    fn classify<'a>(&'a self, _request: &'a ClassificationRequest) -> BoxFuture<'a, Verdict> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.verdict
        })
    }
}

struct Because;

impl Justifier for Because {
    fn justify<'a>(&'a self, request: &'a ClassificationRequest, _on_task: bool) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move { Some(format!("{} matches the task.", request.title)) })
    }
}

/// Blows up on its first call, answers OffTask after that.
struct Flaky {
    calls: AtomicUsize,
}

impl Classifier for Flaky {
    fn source(&self) -> ClassifierSource {
        ClassifierSource::VisionLlm
    }

    fn classify<'a>(&'a self, _request: &'a ClassificationRequest) -> BoxFuture<'a, Verdict> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if call == 0 {
                panic!("adapter bug");
            }
            Verdict::OffTask
        })
    }
}

/// Wants a screenshot and records whether one was attached.
struct Vision {
    saw_screenshot: AtomicBool,
}

impl Classifier for Vision {
    fn source(&self) -> ClassifierSource {
        ClassifierSource::VisionLlm
    }

    fn accepts_screenshot(&self) -> bool {
        true
    }

    fn classify<'a>(&'a self, request: &'a ClassificationRequest) -> BoxFuture<'a, Verdict> {
        self.saw_screenshot
            .store(request.screenshot.is_some(), Ordering::SeqCst);
        Box::pin(async move { Verdict::OnTask })
    }
}

/// A display server that never answers in time.
struct StalledCapture;

impl ScreenCapture for StalledCapture {
    fn capture(&self) -> Option<Screenshot> {
        std::thread::sleep(Duration::from_secs(1));
        None
    }
}

fn snapshot(url: &str) -> Event {
    Event::Poll {
        tab: Some(TabSnapshot {
            url: url.to_string(),
            title: "Cats".to_string(),
            observed_at: Timestamp::now(),
        }),
    }
}

fn driver(verdict: Verdict, delay: Duration, tabs: &ReportedTab) -> Driver {
    let gateway = ClassifierGateway::new()
        .with_classifier(Arc::new(Scripted { verdict, delay }))
        .with_justifier(Arc::new(Because));
    Driver::new(
        Reactor::new(StrikePolicy::default()),
        gateway,
        EscalationTrigger::new(None, None, "1"),
        Arc::new(tabs.clone()),
    )
}

#[tokio::test]
async fn test_start_classifies_current_tab() {
    let dir = tempdir().expect("tempdir");
    let store = StateStore::new(dir.path().join("state.json"));
    let tabs = ReportedTab::new();
    tabs.report("https://docs.example.com/report", "Quarterly report", Timestamp::now());
    let mut driver = driver(Verdict::OnTask, Duration::ZERO, &tabs).with_store(store.clone());

    // 1. Start polls right away and arms the eligibility recheck
    driver.dispatch(Event::Command(Command::Start {
        task: "write report".into(),
    }));
    assert_eq!(driver.reactor().productivity(), TabProductivity::Checking);
    assert!(driver.pending_check().is_some());

    // 2. Verdict, then justification, come back through the channel
    assert!(driver.pump(WAIT).await);
    assert_eq!(driver.reactor().productivity(), TabProductivity::Productive);
    assert!(driver.pump(WAIT).await);
    assert_eq!(
        driver.reactor().justification(),
        Some("Quarterly report matches the task.")
    );

    // 3. Everything landed on disk
    let saved = store.load().expect("load");
    assert!(saved.is_monitoring);
    assert_eq!(saved.checks, 1);
    assert_eq!(saved.current_tab_productivity, TabProductivity::Productive);
}

#[tokio::test]
async fn test_slow_classifier_times_out_as_unknown() {
    let tabs = ReportedTab::new();
    tabs.report("https://videos.example.com", "Cats", Timestamp::now());
    let mut driver = driver(Verdict::OffTask, Duration::from_secs(30), &tabs)
        .with_classify_timeout(Duration::from_millis(50));

    driver.dispatch(Event::Command(Command::Start {
        task: "write report".into(),
    }));
    assert!(driver.pump(WAIT).await);

    let status = driver.reactor().status(Timestamp::now());
    assert_eq!(status.checks, 0);
    assert_eq!(status.telemetry.abandoned, 1);
    assert_eq!(driver.reactor().accumulator().in_flight(), None);
}

#[tokio::test]
async fn test_result_after_stop_is_ignored() {
    let tabs = ReportedTab::new();
    tabs.report("https://videos.example.com", "Cats", Timestamp::now());
    let mut driver = driver(Verdict::OffTask, Duration::from_millis(50), &tabs);

    driver.dispatch(Event::Command(Command::Start {
        task: "write report".into(),
    }));
    driver.dispatch(Event::Command(Command::Stop));
    assert!(driver.pending_check().is_none());

    assert!(driver.pump(WAIT).await);
    assert_eq!(driver.reactor().accumulator().mode(), MonitorMode::Idle);
    assert_eq!(driver.reactor().persisted().checks, 0);
    assert_eq!(driver.reactor().telemetry().stale, 1);
}

#[tokio::test]
async fn test_boot_restores_saved_session() {
    let dir = tempdir().expect("tempdir");
    let store = StateStore::new(dir.path().join("state.json"));
    store
        .save(&PersistedState {
            current_task: Some("write report".into()),
            is_monitoring: true,
            is_paused: true,
            strikes: 1,
            checks: 9,
            your_phone_number: Some("5551234567".into()),
            ..PersistedState::default()
        })
        .expect("seed");

    let tabs = ReportedTab::new();
    let mut driver = driver(Verdict::OnTask, Duration::ZERO, &tabs).with_store(store);
    driver.boot().await;

    let reactor = driver.reactor();
    assert_eq!(reactor.accumulator().mode(), MonitorMode::Paused);
    assert_eq!(reactor.accumulator().state().strikes, 1);
    assert_eq!(reactor.accumulator().state().checks, 9);
    assert_eq!(reactor.contacts().yours.as_deref(), Some("5551234567"));
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
    let tabs = ReportedTab::new();
    let driver = driver(Verdict::OnTask, Duration::ZERO, &tabs).with_poll_interval(Duration::from_millis(10));
    let tx = driver.sender();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(driver.run(cancel.clone()));
    tx.send(Event::Command(Command::Status)).await.expect("send");
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    tokio::time::timeout(WAIT, handle)
        .await
        .expect("driver exits after cancel")
        .expect("driver task");
}

#[tokio::test]
async fn test_panicking_classifier_does_not_wedge_the_loop() {
    let tabs = ReportedTab::new();
    tabs.report("https://videos.example.com", "Cats", Timestamp::now());
    let flaky = Arc::new(Flaky {
        calls: AtomicUsize::new(0),
    });
    let mut driver = Driver::new(
        Reactor::new(StrikePolicy::default()),
        ClassifierGateway::new().with_classifier(flaky.clone()),
        EscalationTrigger::new(None, None, "1"),
        Arc::new(tabs.clone()),
    );

    // 1. The first classification panics and still comes back as unknown
    driver.dispatch(Event::Command(Command::Start {
        task: "write report".into(),
    }));
    assert!(driver.pump(WAIT).await);
    assert_eq!(driver.reactor().accumulator().in_flight(), None);
    assert_eq!(driver.reactor().telemetry().abandoned, 1);

    // 2. The next poll classifies normally
    driver.dispatch(snapshot("https://videos.example.com"));
    assert!(driver.pump(WAIT).await);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    assert_eq!(driver.reactor().persisted().checks, 1);
    assert_eq!(driver.reactor().productivity(), TabProductivity::Unproductive);
}

#[tokio::test]
async fn test_stalled_capture_is_skipped_within_budget() {
    let tabs = ReportedTab::new();
    tabs.report("https://docs.example.com/report", "Quarterly report", Timestamp::now());
    let vision = Arc::new(Vision {
        saw_screenshot: AtomicBool::new(true),
    });
    let mut driver = Driver::new(
        Reactor::new(StrikePolicy::default()),
        ClassifierGateway::new().with_classifier(vision.clone()),
        EscalationTrigger::new(None, None, "1"),
        Arc::new(tabs.clone()),
    )
    .with_capture(Arc::new(StalledCapture))
    .with_classify_timeout(Duration::from_millis(200));

    driver.dispatch(Event::Command(Command::Start {
        task: "write report".into(),
    }));
    assert!(driver.pump(WAIT).await);

    assert!(!vision.saw_screenshot.load(Ordering::SeqCst));
    assert_eq!(driver.reactor().persisted().checks, 1);
    assert_eq!(driver.reactor().productivity(), TabProductivity::Productive);
    assert_eq!(driver.reactor().accumulator().in_flight(), None);
}

#[tokio::test]
async fn test_strike_alert_reaches_sink() {
    let tabs = ReportedTab::new();
    tabs.report("https://videos.example.com/watch?v=cats", "Cats", Timestamp::now());
    let (alert_tx, mut alert_rx) = tokio::sync::mpsc::unbounded_channel();
    let policy = StrikePolicy {
        strike_after: Duration::ZERO,
        ..StrikePolicy::default()
    };
    let mut driver = Driver::new(
        Reactor::new(policy),
        ClassifierGateway::new().with_classifier(Arc::new(Scripted {
            verdict: Verdict::OffTask,
            delay: Duration::ZERO,
        })),
        EscalationTrigger::new(None, None, "1"),
        Arc::new(tabs.clone()),
    )
    .with_alert_sink(alert_tx);

    driver.dispatch(Event::Command(Command::Start {
        task: "write report".into(),
    }));
    assert!(driver.pump(WAIT).await);

    let alert = alert_rx.try_recv().expect("strike alert");
    assert_eq!(alert.host, "videos.example.com");
    assert_eq!(alert.strikes, 1);
}
