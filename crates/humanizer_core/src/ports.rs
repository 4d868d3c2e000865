//! crates/humanizer_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    HumanizeParams, NewProject, Profile, Project, RowChange, Table, User, UserCredentials,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The remote service refused the request for lack of credits (HTTP 402).
    #[error("Insufficient credits on the remote service")]
    InsufficientCredits,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
        confirmation_token: &str,
    ) -> PortResult<User>;

    async fn confirm_email(&self, confirmation_token: &str) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Profiles ---
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    /// Inserts the profile unless one already exists, returning the stored row.
    async fn create_profile(&self, profile: Profile) -> PortResult<Profile>;

    /// Atomically adds one to `credits_used` and returns the updated profile.
    async fn increment_credits_used(&self, user_id: Uuid) -> PortResult<Profile>;

    // --- Projects ---
    async fn insert_project(&self, project: NewProject) -> PortResult<Project>;

    /// All projects of a user, newest first.
    async fn list_projects(&self, user_id: Uuid) -> PortResult<Vec<Project>>;

    async fn get_project(&self, user_id: Uuid, project_id: Uuid) -> PortResult<Project>;

    async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> PortResult<()>;

    async fn toggle_favorite(&self, user_id: Uuid, project_id: Uuid) -> PortResult<Project>;
}

#[async_trait]
pub trait HumanizerService: Send + Sync {
    /// Submits text for humanization and returns the remote job id.
    async fn submit(&self, text: &str, params: &HumanizeParams) -> PortResult<String>;

    /// Fetches the job's output, `None` while the remote side is still working.
    async fn status(&self, job_id: &str) -> PortResult<Option<String>>;
}

//=========================================================================================
// Change Feed
//=========================================================================================

/// Selects which row changes a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub user_id: Uuid,
}

impl ChangeFilter {
    pub fn matches(&self, change: &RowChange) -> bool {
        self.table == change.table && self.user_id == change.user_id
    }
}

pub type ChangeCallback = Arc<dyn Fn(&RowChange) + Send + Sync>;

pub trait ChangeFeed: Send + Sync {
    /// Registers `callback` for changes matching `filter`.
    fn subscribe(&self, filter: ChangeFilter, callback: ChangeCallback) -> Subscription;

    /// Delivers `change` to every matching subscriber.
    fn publish(&self, change: &RowChange);
}

/// Handle to an active change feed subscription.
///
/// The teardown runs exactly once: on `unsubscribe` or on drop, whichever comes first.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.teardown_once();
    }

    fn teardown_once(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown_once();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}
