// src/handlers/mod.rs

pub mod health;
pub mod monitoring;
pub mod recordings;
pub mod review;
pub mod sessions;
pub mod signals;
