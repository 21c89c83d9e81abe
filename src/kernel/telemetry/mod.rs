//! Tick telemetry.
//!
//! # INVARIANT
//! Telemetry is a READ-ONLY side layer. It is never read by the strike
//! accumulator and never carries page content, only sources and counts.

pub mod event;
pub mod metrics;
pub mod recorder;
