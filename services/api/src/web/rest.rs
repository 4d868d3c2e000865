//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the dashboard REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ErrorBody;
use crate::web::{auth, context::UserContext, humanize, state::AppState};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, SecondsFormat, Utc};
use humanizer_core::domain::{PlanAllowances, Profile, Project};
use humanizer_core::ports::PortError;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::confirm_email_handler,
        auth::login_handler,
        auth::logout_handler,
        humanize::humanize_handler,
        humanize::job_status_handler,
        get_profile_handler,
        list_projects_handler,
        delete_project_handler,
        toggle_favorite_handler,
        download_project_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::SignupResponse,
            auth::LoginRequest,
            auth::AuthResponse,
            humanize::HumanizeRequest,
            humanize::HumanizeAccepted,
            humanize::JobStatusResponse,
            ErrorBody,
            ProfileResponse,
            ProjectResponse,
        )
    ),
    tags(
        (name = "Humanizer API", description = "Text humanization, credits and past projects.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub plan: String,
    pub credits: i32,
    pub credits_used: i32,
    pub total_credits: u32,
    pub remaining_credits: u32,
    pub created_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn from_domain(profile: &Profile, allowances: &PlanAllowances) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
            name: profile.name.clone(),
            plan: profile.plan.to_string(),
            credits: profile.credits,
            credits_used: profile.credits_used,
            total_credits: profile.total_credits(allowances),
            remaining_credits: profile.remaining_credits(allowances),
            created_at: profile.created_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub input_text: String,
    pub output_text: String,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            input_text: project.input_text,
            output_text: project.output_text,
            is_favorite: project.is_favorite,
            created_at: project.created_at,
        }
    }
}

/// Body of the plain-text download for one project.
pub fn download_body(project: &Project) -> String {
    format!(
        "Input: {}\n\nOutput: {}\n\nTimestamp: {}",
        project.input_text,
        project.output_text,
        project
            .created_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

pub fn download_file_name(project_id: Uuid) -> String {
    format!("humanized-text-{}.txt", project_id)
}

fn port_error_response(e: PortError, action: &str) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        other => {
            error!("Failed to {}: {:?}", action, other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", action),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Current profile with credit totals derived from the plan.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The signed-in user's profile", body = ProfileResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    ctx: UserContext,
) -> Json<ProfileResponse> {
    Json(ProfileResponse::from_domain(
        ctx.profile(),
        &app_state.config.plan_allowances,
    ))
}

/// All projects of the signed-in user, newest first.
#[utoipa::path(
    get,
    path = "/projects",
    responses(
        (status = 200, description = "Past projects", body = [ProjectResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_projects_handler(
    State(app_state): State<Arc<AppState>>,
    ctx: UserContext,
) -> Result<Json<Vec<ProjectResponse>>, (StatusCode, String)> {
    let projects = app_state
        .db
        .list_projects(ctx.user().user_id)
        .await
        .map_err(|e| port_error_response(e, "load projects"))?;
    Ok(Json(projects.into_iter().map(ProjectResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "No such project")
    )
)]
pub async fn delete_project_handler(
    State(app_state): State<Arc<AppState>>,
    ctx: UserContext,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    app_state
        .db
        .delete_project(ctx.user().user_id, project_id)
        .await
        .map_err(|e| port_error_response(e, "delete project"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/projects/{id}/favorite",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Updated project", body = ProjectResponse),
        (status = 404, description = "No such project")
    )
)]
pub async fn toggle_favorite_handler(
    State(app_state): State<Arc<AppState>>,
    ctx: UserContext,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectResponse>, (StatusCode, String)> {
    let project = app_state
        .db
        .toggle_favorite(ctx.user().user_id, project_id)
        .await
        .map_err(|e| port_error_response(e, "update project"))?;
    Ok(Json(project.into()))
}

/// Download one project as a plain-text file.
#[utoipa::path(
    get,
    path = "/projects/{id}/download",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Plain-text attachment", content_type = "text/plain"),
        (status = 404, description = "No such project")
    )
)]
pub async fn download_project_handler(
    State(app_state): State<Arc<AppState>>,
    ctx: UserContext,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = app_state
        .db
        .get_project(ctx.user().user_id, project_id)
        .await
        .map_err(|e| port_error_response(e, "load project"))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_file_name(project.id)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download_body(&project),
    ))
}
