//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::jobs::JobRegistry;
use humanizer_core::ports::{ChangeFeed, DatabaseService, HumanizerService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub humanizer: Arc<dyn HumanizerService>,
    pub change_feed: Arc<dyn ChangeFeed>,
    pub jobs: Arc<JobRegistry>,
    /// Cancelled on server shutdown; every poller runs on a child of this token.
    pub shutdown: CancellationToken,
}
