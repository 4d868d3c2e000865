//! services/api/src/web/humanize_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for one
//! submitted job: poll until done, then record the project and charge a credit.

use crate::error::HumanizeError;
use crate::web::{
    jobs::{Job, JobStatus},
    poll_task::{PollState, Poller},
    state::AppState,
};
use chrono::Utc;
use humanizer_core::domain::NewProject;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Registers `job` and spawns its worker on a child of the shutdown token.
pub async fn spawn_humanize_job(app_state: Arc<AppState>, job: Job) -> JoinHandle<JobStatus> {
    app_state.jobs.insert(job.clone()).await;
    let token = app_state.shutdown.child_token();
    tokio::spawn(humanize_process(app_state, job, token))
}

/// The main asynchronous task for a single humanization job.
///
/// The project is recorded before the credit is charged. Failures of either
/// step are logged only; the job still counts as complete.
pub async fn humanize_process(
    app_state: Arc<AppState>,
    job: Job,
    cancellation_token: CancellationToken,
) -> JobStatus {
    let poller = Poller::new(
        app_state.humanizer.clone(),
        job.id.clone(),
        app_state.config.poll_interval,
        app_state.config.poll_timeout,
        cancellation_token,
    );

    let status = match poller.run().await {
        PollState::Complete(output) => {
            record_project(&app_state, &job, &output).await;
            charge_credit(&app_state, &job).await;
            JobStatus::Complete { output }
        }
        PollState::TimedOut => JobStatus::Failed(HumanizeError::TimedOut),
        PollState::Errored(message) => JobStatus::Failed(HumanizeError::PollFailed(message)),
        PollState::Polling => JobStatus::Failed(HumanizeError::PollFailed(
            "Poller stopped before reaching a result".to_string(),
        )),
    };

    app_state.jobs.resolve(&job.id, status.clone()).await;
    status
}

async fn record_project(app_state: &AppState, job: &Job, output: &str) {
    let project = NewProject {
        user_id: job.user_id,
        input_text: job.submitted_text.clone(),
        output_text: output.to_string(),
        created_at: Utc::now(),
    };
    match app_state.db.insert_project(project).await {
        Ok(saved) => info!("Saved project {} for job {}", saved.id, job.id),
        Err(e) => error!(
            "Failed to save project for job {} (user {}): {}",
            job.id, job.user_id, e
        ),
    }
}

async fn charge_credit(app_state: &AppState, job: &Job) {
    match app_state.db.increment_credits_used(job.user_id).await {
        Ok(profile) => info!(
            "User {} has now used {} credits",
            job.user_id, profile.credits_used
        ),
        Err(e) => error!(
            "Failed to charge credit for job {} (user {}): {}",
            job.id, job.user_id, e
        ),
    }
}
