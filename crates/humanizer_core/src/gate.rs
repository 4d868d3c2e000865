//! crates/humanizer_core/src/gate.rs
//!
//! The session/quota gate run before any text is sent to the remote service.
//! It is pure: the caller supplies the current user, profile and limits.

use crate::domain::{Plan, PlanAllowances, Profile, User};

/// Character bounds for submitted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    pub min_chars: usize,
    pub max_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRejection {
    TooShort { min: usize, len: usize },
    TooLong { max: usize, len: usize },
}

/// What to do with a humanize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// No signed-in user; the client should show the sign-in prompt.
    RequireAuth,
    /// The plan allowance is used up; the client should offer an upgrade.
    RequireUpgrade { used: u32, total: u32 },
    RejectInput(InputRejection),
}

/// Decides whether `text` may be submitted. Checks run auth, then quota, then input.
///
/// A user without a profile row yet is treated as a fresh `Free` profile.
pub fn evaluate(
    user: Option<&User>,
    profile: Option<&Profile>,
    text: &str,
    allowances: &PlanAllowances,
    limits: &InputLimits,
) -> GateDecision {
    if user.is_none() {
        return GateDecision::RequireAuth;
    }

    let (plan, used) = profile
        .map(|p| (p.plan, u32::try_from(p.credits_used).unwrap_or(0)))
        .unwrap_or((Plan::Free, 0));
    let total = allowances.total_for(plan);
    if used >= total {
        return GateDecision::RequireUpgrade { used, total };
    }

    let len = text.trim().chars().count();
    if len < limits.min_chars {
        return GateDecision::RejectInput(InputRejection::TooShort {
            min: limits.min_chars,
            len,
        });
    }
    if len > limits.max_chars {
        return GateDecision::RejectInput(InputRejection::TooLong {
            max: limits.max_chars,
            len,
        });
    }

    GateDecision::Allow
}
