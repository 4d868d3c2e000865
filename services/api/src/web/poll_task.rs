//! services/api/src/web/poll_task.rs
//!
//! The poller: a small state machine that checks a remote job at a fixed
//! interval until it yields output, the status check fails, or the overall
//! deadline passes.
//!
//! The repeating check and the deadline share one `CancellationToken`. The
//! first terminal transition cancels it; every later event is ignored.

use humanizer_core::ports::{HumanizerService, PortResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Complete(String),
    TimedOut,
    Errored(String),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

/// Something that happened while polling.
#[derive(Debug)]
pub enum PollEvent {
    /// A status check returned.
    Checked(PortResult<Option<String>>),
    Deadline,
    /// The token was cancelled from outside (server shutdown).
    Cancelled,
}

pub struct Poller {
    humanizer: Arc<dyn HumanizerService>,
    job_id: String,
    interval: Duration,
    timeout: Duration,
    token: CancellationToken,
    state: PollState,
}

impl Poller {
    pub fn new(
        humanizer: Arc<dyn HumanizerService>,
        job_id: String,
        interval: Duration,
        timeout: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            humanizer,
            job_id,
            interval,
            timeout,
            token,
            state: PollState::Polling,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Feeds one event into the state machine. Returns `true` if it caused a
    /// terminal transition.
    pub fn apply(&mut self, event: PollEvent) -> bool {
        if self.state.is_terminal() {
            debug!(
                "Job {}: ignoring {:?} after reaching {:?}",
                self.job_id, event, self.state
            );
            return false;
        }

        let next = match event {
            PollEvent::Checked(Ok(Some(output))) if !output.trim().is_empty() => {
                PollState::Complete(output)
            }
            PollEvent::Checked(Ok(_)) => {
                debug!("Job {}: no output yet", self.job_id);
                return false;
            }
            PollEvent::Checked(Err(e)) => PollState::Errored(e.to_string()),
            PollEvent::Deadline => PollState::TimedOut,
            PollEvent::Cancelled => PollState::Errored("Polling was cancelled".to_string()),
        };

        self.state = next;
        self.token.cancel();
        true
    }

    /// Polls until a terminal state is reached and returns it.
    ///
    /// The first check happens one interval after start. A status response
    /// still in flight when the deadline passes is dropped.
    pub async fn run(mut self) -> PollState {
        let start = Instant::now();
        let deadline = sleep_until(start + self.timeout);
        tokio::pin!(deadline);
        let mut ticker = interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let token = self.token.clone();
        let humanizer = self.humanizer.clone();
        let job_id = self.job_id.clone();
        info!("Polling job {} every {:?}", job_id, self.interval);

        while !self.state.is_terminal() {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => PollEvent::Cancelled,
                _ = &mut deadline => PollEvent::Deadline,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => PollEvent::Cancelled,
                        _ = &mut deadline => PollEvent::Deadline,
                        result = humanizer.status(&job_id) => PollEvent::Checked(result),
                    }
                }
            };
            self.apply(event);
        }

        match &self.state {
            PollState::Complete(_) => info!("Job {} complete", job_id),
            PollState::TimedOut => warn!("Job {} timed out after {:?}", job_id, self.timeout),
            PollState::Errored(e) => warn!("Job {} failed: {}", job_id, e),
            PollState::Polling => {}
        }
        self.state
    }
}
