//! The async shell around the reactor.
//!
//! The driver owns every timer and every outbound call. It feeds events into
//! `Reactor::step` and executes the side effects that come back. Provider
//! results re-enter as events, never as direct state writes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classifier::{ClassificationRequest, ClassificationVerdict, ClassifierGateway};
use crate::config::Config;
use crate::escalation::EscalationTrigger;
use crate::kernel::event::Event;
use crate::kernel::reactor::Reactor;
use crate::kernel::scheduler::{SideEffect, StatusReport, StrikeAlert};
use crate::kernel::state::TickTicket;
use crate::kernel::time::Timestamp;
use crate::observer::{NoCapture, ScreenCapture, TabSource};
use crate::services::agent::AgentClient;
use crate::services::backend::BackendClient;
use crate::services::llm::{AnthropicClient, GeminiClient};
use crate::services::voice::VoiceClient;
use crate::store::StateStore;

const CHANNEL_CAPACITY: usize = 100;

pub struct Driver {
    reactor: Reactor,
    gateway: ClassifierGateway,
    escalation: EscalationTrigger,
    backend: Option<BackendClient>,
    capture: Arc<dyn ScreenCapture>,
    tabs: Arc<dyn TabSource>,
    store: Option<StateStore>,
    status_sink: Option<mpsc::UnboundedSender<StatusReport>>,
    alert_sink: Option<mpsc::UnboundedSender<StrikeAlert>>,
    poll_interval: Duration,
    classify_timeout: Duration,
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
    pending_check: Option<Instant>,
}

impl Driver {
    pub fn new(
        reactor: Reactor,
        gateway: ClassifierGateway,
        escalation: EscalationTrigger,
        tabs: Arc<dyn TabSource>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            reactor,
            gateway,
            escalation,
            backend: None,
            capture: Arc::new(NoCapture),
            tabs,
            store: None,
            status_sink: None,
            alert_sink: None,
            poll_interval: Duration::from_secs(5),
            classify_timeout: Duration::from_secs(20),
            tx,
            rx,
            pending_check: None,
        }
    }

    /// Wire every configured provider. A missing agent id triggers provisioning;
    /// if that fails the chain simply starts at the next provider.
    pub async fn from_config(config: &Config, tabs: Arc<dyn TabSource>) -> anyhow::Result<Self> {
        let mut gateway = ClassifierGateway::new();

        if config.agent.is_enabled() {
            let agent_id = match config.agent.agent_id.clone().filter(|id| !id.is_empty()) {
                Some(id) => Some(id),
                None => match AgentClient::provision(&config.agent).await {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!("agent provisioning failed, continuing without it: {}", e);
                        None
                    }
                },
            };
            if let Some(id) = agent_id {
                gateway = gateway.with_classifier(Arc::new(AgentClient::new(&config.agent, id)));
            }
        }
        if config.vision.is_enabled() {
            let vision = Arc::new(AnthropicClient::new(&config.vision));
            gateway = gateway.with_classifier(vision.clone()).with_justifier(vision);
        }
        if config.fallback.is_enabled() {
            gateway = gateway.with_classifier(Arc::new(GeminiClient::new(&config.fallback)));
        }
        if gateway.is_empty() {
            warn!("no classifier configured; every tick will be abandoned");
        }

        let backend = config.backend.is_enabled().then(|| BackendClient::new(&config.backend));
        let voice = config.voice.is_enabled().then(|| VoiceClient::new(&config.voice));
        let escalation = EscalationTrigger::new(voice, backend.clone(), config.voice.default_country_code.clone());
        let store = StateStore::new(config.store_path()?);
        info!(path = %store.path().display(), providers = gateway.len(), "driver configured");

        let driver = Self::new(Reactor::new(config.monitor.policy()), gateway, escalation, tabs)
            .with_backend(backend)
            .with_capture(screen_capture(config.vision.capture_screenshots))
            .with_store(store)
            .with_poll_interval(config.monitor.poll_interval())
            .with_classify_timeout(config.monitor.classify_timeout());
        Ok(driver)
    }

    pub fn with_backend(mut self, backend: Option<BackendClient>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn ScreenCapture>) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_status_sink(mut self, sink: mpsc::UnboundedSender<StatusReport>) -> Self {
        self.status_sink = Some(sink);
        self
    }

    pub fn with_alert_sink(mut self, sink: mpsc::UnboundedSender<StrikeAlert>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    /// Handle for feeding commands from outside (console, extension bridge).
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Deadline of the one-shot eligibility recheck, if armed.
    pub fn pending_check(&self) -> Option<Instant> {
        self.pending_check
    }

    /// Restore persisted state and pull phone numbers from the backend.
    pub async fn boot(&mut self) {
        if let Some(store) = self.store.clone() {
            match store.load() {
                Ok(saved) => {
                    let effects = self.reactor.restore(saved, Timestamp::now());
                    self.apply(effects);
                }
                Err(e) => warn!("could not load saved state from {}: {}", store.path().display(), e),
            }
        }

        if let Some(backend) = self.backend.clone() {
            match backend.fetch_phone_numbers().await {
                Ok(numbers) => {
                    let effects = self.reactor.merge_contacts(numbers);
                    self.apply(effects);
                }
                Err(e) => warn!("could not fetch phone numbers: {}", e),
            }
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        self.boot().await;

        let mut cadence = tokio::time::interval(self.poll_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "monitor loop active");

        loop {
            let check = self.pending_check;
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutting down");
                    break;
                }
                _ = cadence.tick() => self.poll(),
                _ = wait_for(check) => {
                    self.pending_check = None;
                    debug!("eligibility recheck fired");
                    self.poll();
                }
                Some(event) = self.rx.recv() => self.dispatch(event),
            }
        }
    }

    /// Receive one event produced by a spawned task and apply it.
    /// Returns false if nothing arrived within `wait`.
    pub async fn pump(&mut self, wait: Duration) -> bool {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(event)) => {
                self.dispatch(event);
                true
            }
            _ => false,
        }
    }

    pub fn dispatch(&mut self, event: Event) {
        let effects = self.reactor.step(event, Timestamp::now());
        self.apply(effects);
    }

    fn poll(&mut self) {
        let tab = self.tabs.active_tab();
        self.dispatch(Event::Poll { tab });
    }

    fn apply(&mut self, effects: Vec<SideEffect>) {
        let mut queue: VecDeque<SideEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                SideEffect::PollNow => {
                    let tab = self.tabs.active_tab();
                    queue.extend(self.reactor.step(Event::Poll { tab }, Timestamp::now()));
                }
                other => self.execute(other),
            }
        }
    }

    fn execute(&mut self, effect: SideEffect) {
        match effect {
            SideEffect::Classify { ticket, request } => self.spawn_classification(ticket, request),
            SideEffect::PollNow => {}
            SideEffect::ScheduleCheck(wait) => {
                self.pending_check = Some(Instant::now() + wait);
            }
            SideEffect::CancelCheck => {
                self.pending_check = None;
            }
            SideEffect::Persist(state) => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.save(&state) {
                        error!("failed to persist state to {}: {}", store.path().display(), e);
                    }
                }
            }
            SideEffect::RecordStrike => {
                if let Some(backend) = self.backend.clone() {
                    tokio::spawn(async move {
                        if let Err(e) = backend.increment_strikes().await {
                            warn!("failed to record strike: {}", e);
                        }
                    });
                }
            }
            SideEffect::AlertStrike(alert) => match &self.alert_sink {
                Some(sink) => {
                    let _ = sink.send(alert);
                }
                None => warn!(host = %alert.host, strikes = alert.strikes, "strike on an off-task tab"),
            },
            SideEffect::Escalate { task, phone } => {
                let escalation = self.escalation.clone();
                tokio::spawn(async move {
                    let outcome = escalation.trigger(phone.as_deref(), &task).await;
                    debug!(?outcome, "escalation finished");
                });
            }
            SideEffect::PublishSession { active } => {
                if let Some(backend) = self.backend.clone() {
                    tokio::spawn(async move {
                        if let Err(e) = backend.update_session_status(active).await {
                            warn!("failed to publish session status: {}", e);
                        }
                    });
                }
            }
            SideEffect::Status(report) => match &self.status_sink {
                Some(sink) => {
                    let _ = sink.send(report);
                }
                None => info!(
                    mode = ?report.mode,
                    productivity = ?report.productivity,
                    strikes = report.strikes,
                    checks = report.checks,
                    "status"
                ),
            },
        }
    }

    fn spawn_classification(&self, ticket: TickTicket, request: ClassificationRequest) {
        let gateway = self.gateway.clone();
        let capture = self.capture.clone();
        let timeout = self.classify_timeout;
        let tx = self.tx.clone();

        tokio::spawn(async move {
            // Every ticket ends in a Classified event, even if the chain panics or stalls.
            let work = tokio::spawn(classify_with_capture(gateway.clone(), capture, request, timeout));
            let abort = work.abort_handle();

            let (request, verdict) = match tokio::time::timeout(timeout, work).await {
                Ok(Ok((request, verdict))) => (Some(request), verdict),
                Ok(Err(e)) => {
                    error!(seq = ticket.seq, "classification task failed: {}", e);
                    (None, ClassificationVerdict::unknown())
                }
                Err(_) => {
                    abort.abort();
                    warn!(timeout_ms = timeout.as_millis() as u64, "classification timed out");
                    (None, ClassificationVerdict::unknown())
                }
            };
            let on_task = verdict.on_task();

            if tx.send(Event::Classified { ticket, verdict }).await.is_err() {
                return;
            }

            let (Some(request), Some(on_task)) = (request, on_task) else {
                return;
            };
            match tokio::time::timeout(timeout, gateway.justify(&request, on_task)).await {
                Ok(Some(text)) => {
                    let _ = tx.send(Event::Justified { ticket, text }).await;
                }
                Ok(None) => {}
                Err(_) => debug!("justification timed out"),
            }
        });
    }
}

/// Attach a screenshot if any provider wants one, then walk the chain.
/// A capture that does not finish within half the budget is skipped.
async fn classify_with_capture(
    gateway: ClassifierGateway,
    capture: Arc<dyn ScreenCapture>,
    request: ClassificationRequest,
    timeout: Duration,
) -> (ClassificationRequest, ClassificationVerdict) {
    let request = if gateway.wants_screenshot() {
        let grab = tokio::task::spawn_blocking(move || capture.capture());
        let screenshot = match tokio::time::timeout(timeout / 2, grab).await {
            Ok(Ok(screenshot)) => screenshot,
            Ok(Err(e)) => {
                warn!("screen capture task failed: {}", e);
                None
            }
            Err(_) => {
                warn!("screen capture stalled; classifying without it");
                None
            }
        };
        request.with_screenshot(screenshot)
    } else {
        request
    };

    let verdict = gateway.classify(&request).await;
    (request, verdict)
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(feature = "screen-capture")]
fn screen_capture(enabled: bool) -> Arc<dyn ScreenCapture> {
    if enabled {
        Arc::new(crate::observer::capture::MonitorCapture)
    } else {
        Arc::new(NoCapture)
    }
}

#[cfg(not(feature = "screen-capture"))]
fn screen_capture(enabled: bool) -> Arc<dyn ScreenCapture> {
    if enabled {
        debug!("built without screen-capture; classifying on title and url only");
    }
    Arc::new(NoCapture)
}
