//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every request handler.

use crate::config::Config;
use coderr_core::ports::SessionStore;
use coderr_core::Marketplace;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub marketplace: Marketplace,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(marketplace: Marketplace, sessions: Arc<dyn SessionStore>, config: Arc<Config>) -> Self {
        Self {
            marketplace,
            sessions,
            config,
        }
    }
}
