pub mod auth;
pub mod context;
pub mod humanize;
pub mod humanize_task;
pub mod jobs;
pub mod middleware;
pub mod poll_task;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::{optional_auth, require_auth};
pub use state::AppState;
pub use ws_handler::projects_ws_handler;

/// Builds the API router. CORS and Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/confirm", get(auth::confirm_email_handler))
        .route("/auth/login", post(auth::login_handler));

    // Humanize answers anonymous callers itself, through the gate
    let gated_routes = Router::new()
        .route("/humanize", post(humanize::humanize_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/jobs/{job_id}", get(humanize::job_status_handler))
        .route("/profile", get(rest::get_profile_handler))
        .route("/projects", get(rest::list_projects_handler))
        .route("/projects/{id}", delete(rest::delete_project_handler))
        .route("/projects/{id}/favorite", post(rest::toggle_favorite_handler))
        .route("/projects/{id}/download", get(rest::download_project_handler))
        .route("/ws/projects", get(projects_ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(gated_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
