//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for signup, email confirmation, login, and logout.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use humanizer_core::ports::PortError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{error, info};
use uuid::Uuid;
use utoipa::ToSchema;
use crate::web::{
    context::{ensure_profile, UserContext},
    state::AppState,
};

const SESSION_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: usize = 6;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub email: String,
    pub confirmation_required: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// `None` if the email pattern failed to compile.
pub fn is_valid_email(email: &str) -> Option<bool> {
    EMAIL_PATTERN.as_ref().map(|re| re.is_match(email))
}

/// Creates an auth session for `user_id` and returns the cookie to set.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, (StatusCode, String)> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);

    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    Ok(format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new, unconfirmed user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created; email confirmation pending", body = SignupResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let email = req.email.trim().to_lowercase();
    match is_valid_email(&email) {
        Some(true) => {}
        Some(false) => {
            return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()))
        }
        None => {
            error!("Email pattern failed to compile");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to validate email".to_string(),
            ));
        }
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create the unconfirmed user
    let confirmation_token = Uuid::new_v4().simple().to_string();
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let user = state
        .db
        .create_user_with_email(&email, name, &password_hash, &confirmation_token)
        .await
        .map_err(|e| match e {
            PortError::Conflict(message) => (StatusCode::CONFLICT, message),
            other => {
                error!("Failed to create user: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
            }
        })?;

    // 3. Hand out the confirmation link
    info!(
        "Confirmation link for {}: {}/auth/confirm?token={}",
        user.email,
        state.config.public_base_url.trim_end_matches('/'),
        confirmation_token
    );

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user.user_id,
            email: user.email,
            confirmation_required: true,
        }),
    ))
}

/// GET /auth/confirm - Confirm an email address
#[utoipa::path(
    get,
    path = "/auth/confirm",
    params(("token" = String, Query, description = "Token from the confirmation link")),
    responses(
        (status = 200, description = "Email confirmed", body = AuthResponse),
        (status = 404, description = "Unknown or already used token")
    )
)]
pub async fn confirm_email_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let user = state
        .db
        .confirm_email(&query.token)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "Invalid confirmation link".to_string())
            }
            other => {
                error!("Failed to confirm email: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to confirm email".to_string())
            }
        })?;

    if let Err(e) = ensure_profile(&state, &user).await {
        error!("Failed to create profile for {}: {:?}", user.user_id, e);
    }

    Ok(Json(AuthResponse {
        user_id: user.user_id,
        email: user.email,
    }))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not confirmed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Get user by email
    let user_creds = state
        .db
        .get_user_by_email(&req.email.trim().to_lowercase())
        .await
        .map_err(|e| {
            error!("Failed to get user: {:?}", e);
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err((StatusCode::UNAUTHORIZED, "Invalid email or password".to_string()));
    }

    // 3. Require a confirmed email
    if !user_creds.email_confirmed {
        return Err((StatusCode::FORBIDDEN, "Email not confirmed".to_string()));
    }

    // 4. Create the session cookie
    let cookie = start_session(&state, user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(ctx: UserContext) -> Result<impl IntoResponse, (StatusCode, String)> {
    ctx.sign_out().await.map_err(|e| {
        error!("Failed to delete auth session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
