//! Escalation trigger: places the phone call once the strike threshold is hit.
//!
//! The trigger does not de-duplicate; the accumulator's `mom_called` guard does.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::services::backend::BackendClient;
use crate::services::voice::VoiceClient;

/// The two numbers a user can configure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumbers {
    pub mom: Option<String>,
    pub yours: Option<String>,
}

impl PhoneNumbers {
    /// The number an escalation dials: mom first, then the user's own.
    pub fn escalation_target(&self) -> Option<&str> {
        self.mom
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.yours.as_deref().filter(|n| !n.trim().is_empty()))
    }

    /// Overlay an update. `Some("")` clears a number, `None` keeps it.
    pub fn apply(&mut self, mom: Option<String>, yours: Option<String>) {
        if let Some(mom) = mom {
            self.mom = Some(mom.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(yours) = yours {
            self.yours = Some(yours.trim().to_string()).filter(|n| !n.is_empty());
        }
    }

    /// Fill numbers that are missing here from `other`.
    pub fn fill_from(&mut self, other: PhoneNumbers) {
        if self.mom.is_none() {
            self.mom = other.mom;
        }
        if self.yours.is_none() {
            self.yours = other.yours;
        }
    }
}

/// Normalise to an E.164-like `+<digits>` string.
/// Without a leading `+` the default country code is prepended.
/// Returns None when no digits remain.
pub fn normalize_phone_number(raw: &str, default_country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{}", digits))
    } else {
        let cc: String = default_country_code.chars().filter(|c| c.is_ascii_digit()).collect();
        Some(format!("+{}{}", cc, digits))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    Placed { number: String, call_id: Option<String> },
    NoPhoneNumber,
    NotConfigured,
    Failed,
}

#[derive(Clone)]
pub struct EscalationTrigger {
    voice: Option<VoiceClient>,
    backend: Option<BackendClient>,
    default_country_code: String,
}

impl EscalationTrigger {
    pub fn new(voice: Option<VoiceClient>, backend: Option<BackendClient>, default_country_code: impl Into<String>) -> Self {
        Self {
            voice,
            backend,
            default_country_code: default_country_code.into(),
        }
    }

    /// Place the call. Never returns an error; every failure is logged.
    pub async fn trigger(&self, phone: Option<&str>, task: &str) -> EscalationOutcome {
        let Some(number) = phone.and_then(|p| normalize_phone_number(p, &self.default_country_code)) else {
            warn!("escalation skipped: no phone number configured");
            return EscalationOutcome::NoPhoneNumber;
        };
        let Some(voice) = &self.voice else {
            warn!("escalation skipped: voice service not configured");
            return EscalationOutcome::NotConfigured;
        };

        info!(task, number = %mask(&number), "placing escalation call");
        match voice.place_call(&number).await {
            Ok(call_id) => {
                info!(?call_id, "escalation call placed");
                if let Some(backend) = &self.backend {
                    if let Err(e) = backend.increment_calls().await {
                        warn!("failed to record call count: {}", e);
                    }
                }
                EscalationOutcome::Placed { number, call_id }
            }
            Err(e) => {
                warn!("escalation call failed: {}", e);
                EscalationOutcome::Failed
            }
        }
    }
}

/// Keep only the last four digits for logs.
fn mask(number: &str) -> String {
    let visible = number.len().saturating_sub(4);
    format!("{}{}", "*".repeat(visible), &number[visible..])
}
