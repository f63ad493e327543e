// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, services::ProctoringService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProctoringService>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<ProctoringService> {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
