use serde::{Deserialize, Serialize};

use crate::classifier::verdict::{ClassifierSource, Verdict};
use crate::kernel::time::Timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A tick whose verdict reached the accumulator.
    TickRecorded {
        at: Timestamp,
        source: Option<ClassifierSource>,
        verdict: Verdict,
        strike_added: bool,
        escalated: bool,
    },

    /// Every classifier returned unknown; the tick was abandoned.
    TickAbandoned { at: Timestamp },

    /// A result arrived after its session or tab had moved on.
    StaleResult { at: Timestamp },
}
