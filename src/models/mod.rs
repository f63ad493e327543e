// src/models/mod.rs

pub mod activity;
pub mod analytics;
pub mod recording;
pub mod review;
pub mod session;
pub mod signal;
