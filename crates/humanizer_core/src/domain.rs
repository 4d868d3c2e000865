//! crates/humanizer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub email_confirmed: bool,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The subscription tier of a profile. Stored as its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Pro => "Pro",
            Plan::Enterprise => "Enterprise",
        }
    }

    /// Parses a stored plan name. Anything unrecognised falls back to `Free`.
    pub fn from_stored(value: &str) -> Self {
        match value.trim() {
            "Pro" => Plan::Pro,
            "Enterprise" => Plan::Enterprise,
            _ => Plan::Free,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credit allowance per plan. Resolved from configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanAllowances {
    pub free: u32,
    pub pro: u32,
    pub enterprise: u32,
}

impl PlanAllowances {
    pub fn total_for(&self, plan: Plan) -> u32 {
        match plan {
            Plan::Free => self.free,
            Plan::Pro => self.pro,
            Plan::Enterprise => self.enterprise,
        }
    }
}

/// The application's extension of a user with plan and credit state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub credits: i32,
    pub credits_used: i32,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Builds the default profile for a user that has none yet.
    pub fn new_free(user: &User, allowances: &PlanAllowances, now: DateTime<Utc>) -> Self {
        let name = user
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| user.email.split('@').next().unwrap_or_default().to_string());
        Self {
            id: user.user_id,
            email: user.email.clone(),
            name,
            credits: i32::try_from(allowances.free).unwrap_or(i32::MAX),
            credits_used: 0,
            plan: Plan::Free,
            created_at: now,
        }
    }

    pub fn total_credits(&self, allowances: &PlanAllowances) -> u32 {
        allowances.total_for(self.plan)
    }

    /// Credits left under the current plan, never negative.
    pub fn remaining_credits(&self, allowances: &PlanAllowances) -> u32 {
        let used = u32::try_from(self.credits_used).unwrap_or(0);
        self.total_credits(allowances).saturating_sub(used)
    }
}

/// A persisted input/output pair from one completed humanization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub input_text: String,
    pub output_text: String,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to record a new project.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub user_id: Uuid,
    pub input_text: String,
    pub output_text: String,
    pub created_at: DateTime<Utc>,
}

/// Fixed transformation parameters sent with every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanizeParams {
    pub readability: String,
    pub purpose: String,
    pub strength: String,
    pub model: String,
}

/// Tables that publish row change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    Profiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change, scoped to the owning user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: Uuid,
    pub user_id: Uuid,
}
