use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    OnTask,
    OffTask,
    /// Network failure, non-2xx, malformed body or no recognisable token.
    Unknown,
}

impl Verdict {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Verdict::OnTask => Some(true),
            Verdict::OffTask => Some(false),
            Verdict::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Verdict::Unknown
    }
}

impl From<Option<bool>> for Verdict {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Verdict::OnTask,
            Some(false) => Verdict::OffTask,
            None => Verdict::Unknown,
        }
    }
}

/// Which adapter in the fallback chain produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassifierSource {
    AgentService,
    VisionLlm,
    FallbackLlm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationVerdict {
    pub verdict: Verdict,
    /// None when the whole chain came back unknown.
    pub source: Option<ClassifierSource>,
}

impl ClassificationVerdict {
    pub fn unknown() -> Self {
        Self {
            verdict: Verdict::Unknown,
            source: None,
        }
    }

    pub fn on_task(&self) -> Option<bool> {
        self.verdict.as_bool()
    }
}

/// Parse free LLM text for an `ON_TASK` / `OFF_TASK` token.
pub fn parse_task_token(text: &str) -> Verdict {
    let upper = text.trim().to_uppercase();
    if upper.contains("OFF_TASK") {
        Verdict::OffTask
    } else if upper.contains("ON_TASK") {
        Verdict::OnTask
    } else {
        Verdict::Unknown
    }
}

/// Parse agent text for a `PRODUCTIVE` / `UNPRODUCTIVE` token.
/// `UNPRODUCTIVE` contains `PRODUCTIVE`, so it is checked first.
pub fn parse_productivity_token(text: &str) -> Verdict {
    let upper = text.trim().to_uppercase();
    if upper.contains("UNPRODUCTIVE") {
        Verdict::OffTask
    } else if upper.contains("PRODUCTIVE") {
        Verdict::OnTask
    } else {
        Verdict::Unknown
    }
}
