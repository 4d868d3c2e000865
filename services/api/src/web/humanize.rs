//! services/api/src/web/humanize.rs
//!
//! Handlers for submitting text and reading back the job result.

use crate::error::{ErrorBody, HumanizeError};
use crate::web::{
    context::ensure_profile,
    humanize_task::spawn_humanize_job,
    jobs::{Job, JobStatus},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use humanizer_core::domain::Profile;
use humanizer_core::gate::{evaluate, GateDecision};
use humanizer_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct HumanizeRequest {
    pub text: String,
}

/// Returned once the remote service has accepted the text.
#[derive(Serialize, ToSchema)]
pub struct HumanizeAccepted {
    pub job_id: String,
}

#[derive(Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatusResponse {
    Pending,
    Complete { output: String },
    Failed { error: ErrorBody },
}

impl From<JobStatus> for JobStatusResponse {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => JobStatusResponse::Pending,
            JobStatus::Complete { output } => JobStatusResponse::Complete { output },
            JobStatus::Failed(e) => JobStatusResponse::Failed { error: e.body() },
        }
    }
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "internal".to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /humanize - Gate the request, submit the text, start polling
#[utoipa::path(
    post,
    path = "/humanize",
    request_body = HumanizeRequest,
    responses(
        (status = 202, description = "Text accepted by the remote service", body = HumanizeAccepted),
        (status = 401, description = "Sign-in required", body = ErrorBody),
        (status = 402, description = "Remote service is out of credits", body = ErrorBody),
        (status = 403, description = "Plan allowance used up", body = ErrorBody),
        (status = 422, description = "Text too short or too long", body = ErrorBody),
        (status = 502, description = "Remote submit failed", body = ErrorBody)
    )
)]
pub async fn humanize_handler(
    State(state): State<Arc<AppState>>,
    user_id: Option<Extension<Uuid>>,
    Json(req): Json<HumanizeRequest>,
) -> Result<impl IntoResponse, Response> {
    // 1. Load the signed-in user, if any
    let (user, profile) = match user_id {
        Some(Extension(user_id)) => {
            let user = state.db.get_user_by_id(user_id).await.map_err(|e| match e {
                PortError::NotFound(_) => {
                    warn!("Session refers to unknown user {}", user_id);
                    HumanizeError::AuthRequired.into_response()
                }
                e => {
                    error!("Failed to load user {}: {:?}", user_id, e);
                    internal_error("Failed to load user")
                }
            })?;
            let profile = ensure_profile(&state, &user).await.map_err(|e| {
                error!("Failed to load profile for {}: {:?}", user_id, e);
                internal_error("Failed to load profile")
            })?;
            (Some(user), Some(profile))
        }
        None => (None, None),
    };

    // 2. Gate: auth, quota, input length. Jobs still in flight count as spent.
    let in_flight = match &user {
        Some(user) => state.jobs.in_flight_for(user.user_id).await,
        None => 0,
    };
    let charged = profile.as_ref().map(|p| Profile {
        credits_used: p
            .credits_used
            .saturating_add(i32::try_from(in_flight).unwrap_or(i32::MAX)),
        ..p.clone()
    });
    let allowances = &state.config.plan_allowances;
    let decision = evaluate(
        user.as_ref(),
        charged.as_ref(),
        &req.text,
        allowances,
        &state.config.input_limits,
    );
    let (user, profile) = match (decision, user, profile) {
        (GateDecision::Allow, Some(user), Some(profile)) => (user, profile),
        (GateDecision::RequireUpgrade { used, total }, _, _) => {
            return Err(HumanizeError::QuotaExceeded { used, total }.into_response())
        }
        (GateDecision::RejectInput(rejection), _, _) => {
            return Err(HumanizeError::from(rejection).into_response())
        }
        _ => return Err(HumanizeError::AuthRequired.into_response()),
    };

    // 3. Hold a credit while the job runs; another request may have taken the last one
    if let Err(in_flight) = state
        .jobs
        .try_reserve(user.user_id, profile.remaining_credits(allowances))
        .await
    {
        let used = u32::try_from(profile.credits_used)
            .unwrap_or(0)
            .saturating_add(in_flight);
        return Err(HumanizeError::QuotaExceeded {
            used,
            total: profile.total_credits(allowances),
        }
        .into_response());
    }

    // 4. Submit once; no retry
    let job_id = match state
        .humanizer
        .submit(&req.text, &state.config.humanize_params)
        .await
    {
        Ok(job_id) => job_id,
        Err(e) => {
            warn!("Submit failed for user {}: {}", user.user_id, e);
            state.jobs.release(user.user_id).await;
            return Err(HumanizeError::from_submit(e).into_response());
        }
    };
    info!("Submitted job {} for user {}", job_id, user.user_id);

    // 5. Poll in the background
    let job = Job::pending(job_id.clone(), user.user_id, req.text);
    spawn_humanize_job(state.clone(), job).await;

    Ok((StatusCode::ACCEPTED, Json(HumanizeAccepted { job_id })))
}

/// GET /jobs/{job_id} - Current state of a submitted job
///
/// A finished job is discarded after it has been read once.
#[utoipa::path(
    get,
    path = "/jobs/{job_id}",
    params(("job_id" = String, Path, description = "Id returned by POST /humanize")),
    responses(
        (status = 200, description = "Job state", body = JobStatusResponse),
        (status = 404, description = "Unknown job")
    )
)]
pub async fn job_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, (StatusCode, String)> {
    state
        .jobs
        .take_for_owner(&job_id, user_id)
        .await
        .map(|status| Json(status.into()))
        .ok_or((StatusCode::NOT_FOUND, format!("Job {} not found", job_id)))
}
