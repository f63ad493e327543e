// src/engine/mod.rs

//! Pure proctoring core: classification, risk derivation and the session
//! state machine. Nothing here performs I/O.

pub mod classifier;
pub mod machine;
pub mod risk;

pub use classifier::{Classification, HistorySummary, PolicyRule, PolicyTable, Signal, classify};
pub use machine::DetectionThresholds;
