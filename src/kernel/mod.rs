//! Deterministic core: the strike accumulator, mode graph and the pure
//! reactor step. Nothing in here performs I/O.

pub mod event;
pub mod presence;
pub mod reactor;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod time;
