// src/services/mod.rs

pub mod proctoring;
pub mod reporting;

pub use proctoring::ProctoringService;
