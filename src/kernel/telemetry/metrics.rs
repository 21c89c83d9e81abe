use serde::Serialize;
use std::collections::VecDeque;

use super::event::TelemetryEvent;
use crate::classifier::verdict::{ClassifierSource, Verdict};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub recorded: u64,
    pub abandoned: u64,
    pub stale: u64,
    pub on_task: u64,
    pub off_task: u64,
    pub strikes: u64,
    pub escalations: u64,
    pub by_source: SourceStats,
}

/// How often each link in the chain produced the winning verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub agent_service: u64,
    pub vision_llm: u64,
    pub fallback_llm: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::TickRecorded { source, verdict, strike_added, escalated, .. } => {
                snap.recorded += 1;
                match verdict {
                    Verdict::OnTask => snap.on_task += 1,
                    Verdict::OffTask => snap.off_task += 1,
                    Verdict::Unknown => {}
                }
                if *strike_added {
                    snap.strikes += 1;
                }
                if *escalated {
                    snap.escalations += 1;
                }
                match source {
                    Some(ClassifierSource::AgentService) => snap.by_source.agent_service += 1,
                    Some(ClassifierSource::VisionLlm) => snap.by_source.vision_llm += 1,
                    Some(ClassifierSource::FallbackLlm) => snap.by_source.fallback_llm += 1,
                    None => {}
                }
            }
            TelemetryEvent::TickAbandoned { .. } => snap.abandoned += 1,
            TelemetryEvent::StaleResult { .. } => snap.stale += 1,
        }
    }

    snap
}
