//! services/api/src/web/context.rs
//!
//! The per-request user context: the signed-in user and their profile,
//! loaded fresh for every request that passed `require_auth`.

use crate::web::{middleware::session_id_from_headers, state::AppState};
use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode};
use chrono::Utc;
use humanizer_core::domain::{Profile, User};
use humanizer_core::ports::{PortError, PortResult};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Returns the user's profile, creating the default one on first access.
pub async fn ensure_profile(state: &AppState, user: &User) -> PortResult<Profile> {
    match state.db.get_profile(user.user_id).await {
        Ok(profile) => Ok(profile),
        Err(PortError::NotFound(_)) => {
            info!("Creating default profile for user {}", user.user_id);
            let profile = Profile::new_free(user, &state.config.plan_allowances, Utc::now());
            state.db.create_profile(profile).await
        }
        Err(e) => Err(e),
    }
}

pub struct UserContext {
    state: Arc<AppState>,
    user: User,
    profile: Profile,
    auth_session_id: Option<String>,
}

impl UserContext {
    pub async fn load(
        state: Arc<AppState>,
        user_id: Uuid,
        auth_session_id: Option<String>,
    ) -> PortResult<Self> {
        let user = state.db.get_user_by_id(user_id).await?;
        let profile = ensure_profile(&state, &user).await?;
        Ok(Self {
            state,
            user,
            profile,
            auth_session_id,
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Re-reads the profile from the store.
    pub async fn refresh(&mut self) -> PortResult<&Profile> {
        self.profile = self.state.db.get_profile(self.user.user_id).await?;
        Ok(&self.profile)
    }

    /// Ends the login session this request was made with.
    pub async fn sign_out(self) -> PortResult<()> {
        match self.auth_session_id {
            Some(id) => self.state.db.delete_auth_session(&id).await,
            None => Ok(()),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for UserContext {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .ok_or((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))?;
        let auth_session_id = session_id_from_headers(&parts.headers).map(str::to_string);

        UserContext::load(state.clone(), user_id, auth_session_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => {
                    (StatusCode::UNAUTHORIZED, "Unknown user".to_string())
                }
                other => {
                    error!("Failed to load user context: {:?}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to load user".to_string(),
                    )
                }
            })
    }
}
