//! services/api/src/web/jobs.rs
//!
//! In-memory registry of in-flight humanization jobs. A job lives here only
//! for the duration of one submission and is discarded once its owner has
//! read the terminal state.
//!
//! The registry also holds credit reservations: a request takes one before
//! submitting, so concurrent requests cannot spend more credits than the
//! user has left. The reservation turns into the pending job on `insert`.

use crate::error::HumanizeError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Terminal jobs nobody collected are pruned after this long.
const UNCLAIMED_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Added to the poll timeout to get the age at which a still-pending job is
/// considered abandoned.
pub const STALE_JOB_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Complete { output: String },
    Failed(HumanizeError),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// One request to the remote humanization service.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub user_id: Uuid,
    pub submitted_text: String,
    pub status: JobStatus,
    submitted_at: Instant,
    resolved_at: Option<Instant>,
}

impl Job {
    pub fn pending(id: String, user_id: Uuid, submitted_text: String) -> Self {
        Self {
            id,
            user_id,
            submitted_text,
            status: JobStatus::Pending,
            submitted_at: Instant::now(),
            resolved_at: None,
        }
    }
}

#[derive(Default)]
struct Slots {
    jobs: HashMap<String, Job>,
    /// Reservation times per user, oldest first.
    reservations: HashMap<Uuid, Vec<Instant>>,
}

impl Slots {
    fn prune(&mut self, pending_ttl: Duration) {
        self.jobs.retain(|_, j| match j.resolved_at {
            Some(at) => at.elapsed() < UNCLAIMED_JOB_RETENTION,
            None => j.submitted_at.elapsed() < pending_ttl,
        });
        self.reservations.retain(|_, taken| {
            taken.retain(|at| at.elapsed() < pending_ttl);
            !taken.is_empty()
        });
    }

    fn in_flight_for(&self, user_id: Uuid) -> u32 {
        let pending = self
            .jobs
            .values()
            .filter(|j| j.user_id == user_id && !j.status.is_terminal())
            .count();
        let reserved = self.reservations.get(&user_id).map_or(0, Vec::len);
        u32::try_from(pending + reserved).unwrap_or(u32::MAX)
    }

    fn release_one(&mut self, user_id: Uuid) {
        if let Some(taken) = self.reservations.get_mut(&user_id) {
            if !taken.is_empty() {
                taken.remove(0);
            }
            if taken.is_empty() {
                self.reservations.remove(&user_id);
            }
        }
    }
}

pub struct JobRegistry {
    slots: Mutex<Slots>,
    pending_ttl: Duration,
}

impl JobRegistry {
    /// A registry that gives up on pending jobs and reservations older than `pending_ttl`.
    pub fn new(pending_ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            pending_ttl,
        }
    }

    /// A registry sized for pollers that give up after `poll_timeout`.
    pub fn for_poll_timeout(poll_timeout: Duration) -> Self {
        Self::new(poll_timeout + STALE_JOB_MARGIN)
    }

    /// Registers a pending job, consuming one reservation of its owner if any.
    pub async fn insert(&self, job: Job) {
        let mut slots = self.slots.lock().await;
        slots.prune(self.pending_ttl);
        slots.release_one(job.user_id);
        slots.jobs.insert(job.id.clone(), job);
    }

    /// Reserves a credit for `user_id` unless pending jobs and reservations
    /// already cover `available`. On refusal returns the number in flight.
    pub async fn try_reserve(&self, user_id: Uuid, available: u32) -> Result<(), u32> {
        let mut slots = self.slots.lock().await;
        slots.prune(self.pending_ttl);
        let in_flight = slots.in_flight_for(user_id);
        if in_flight >= available {
            return Err(in_flight);
        }
        slots
            .reservations
            .entry(user_id)
            .or_default()
            .push(Instant::now());
        Ok(())
    }

    /// Gives back a reservation whose submission never started a job.
    pub async fn release(&self, user_id: Uuid) {
        self.slots.lock().await.release_one(user_id);
    }

    /// Pending jobs plus open reservations of `user_id`.
    pub async fn in_flight_for(&self, user_id: Uuid) -> u32 {
        let mut slots = self.slots.lock().await;
        slots.prune(self.pending_ttl);
        slots.in_flight_for(user_id)
    }

    /// Records the terminal status of a pending job. Returns `false` if the job
    /// is unknown or already resolved.
    pub async fn resolve(&self, job_id: &str, status: JobStatus) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.jobs.get_mut(job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = status;
                job.resolved_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// Reads a job's status on behalf of `user_id`. Jobs owned by someone else
    /// are reported as absent. A terminal job is removed by this read.
    pub async fn take_for_owner(&self, job_id: &str, user_id: Uuid) -> Option<JobStatus> {
        let mut slots = self.slots.lock().await;
        let job = slots.jobs.get(job_id).filter(|j| j.user_id == user_id)?;
        if job.status.is_terminal() {
            slots.jobs.remove(job_id).map(|j| j.status)
        } else {
            Some(JobStatus::Pending)
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.jobs.is_empty()
    }
}
