//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like database pools and service clients.

use crate::config::Config;
use lingua_core::analysis::AnalysisService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub analysis: Arc<dyn AnalysisService>,
    pub config: Arc<Config>,
}
