use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::aggregator::ResultAggregator;
use crate::error::SessionError;
use crate::policy::PollPolicy;
use crate::session::ReportSession;
use crate::state_machine::{
    AccountFailure, FailureReason, JobAudit, JobRecord, JobState, Observation, StateMachine,
    Transition,
};

/// Progress notifications emitted while polling.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent<'e> {
    RoundStarted {
        round: u32,
        active: usize,
        delay: Duration,
    },
    JobFinished {
        account: &'e str,
        state: JobState,
        /// Rows collected, for completed jobs that were fetched.
        rows: Option<usize>,
    },
    PolicyExhausted {
        remaining: usize,
    },
}

/// Callback receiving [`PollEvent`]s.
pub type PollObserver<'a> = &'a dyn for<'e> Fn(&PollEvent<'e>);

/// Pins a closure to the observer signature.
pub fn observer<F>(f: F) -> F
where
    F: for<'e> Fn(&PollEvent<'e>),
{
    f
}

/// What the polling phase produced besides the collected rows.
#[derive(Debug, Default)]
pub struct PollSummary {
    pub rounds: u32,
    pub failures: Vec<AccountFailure>,
    pub audits: Vec<JobAudit>,
}

/// Drives the active set of jobs to terminal states in rounds.
pub struct Poller<'a, S> {
    session: &'a S,
    policy: &'a PollPolicy,
    observer: Option<PollObserver<'a>>,
}

impl<'a, S: ReportSession> Poller<'a, S> {
    pub fn new(session: &'a S, policy: &'a PollPolicy) -> Self {
        Self {
            session,
            policy,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: PollObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Poll until every job is terminal or the policy runs out.
    ///
    /// Each round waits once, refreshes every active job concurrently, then
    /// rebuilds the active set. Completed jobs are handed to `aggregator`
    /// as soon as they finish; jobs still active when the policy is exhausted
    /// are skipped and reported as timed out.
    pub async fn run(
        &self,
        mut active: Vec<JobRecord<S::Handle>>,
        aggregator: &mut ResultAggregator,
    ) -> PollSummary {
        let started = Instant::now();
        let mut summary = PollSummary::default();
        let mut throttled = false;

        while !active.is_empty() {
            if !self.policy.allows_round(summary.rounds, started.elapsed()) {
                warn!(
                    remaining = active.len(),
                    rounds = summary.rounds,
                    "poll policy exhausted, giving up on remaining jobs"
                );
                self.emit(&PollEvent::PolicyExhausted {
                    remaining: active.len(),
                });
                for mut job in active.drain(..) {
                    if let Err(e) = StateMachine::next(&mut job, Observation::DeadlineExpired) {
                        error!(error = %e, "could not expire job");
                    }
                    self.record_failure(&job, FailureReason::TimedOut, &mut summary);
                }
                break;
            }

            summary.rounds += 1;
            let round = summary.rounds;
            let mut delay = if throttled {
                warn!(round, "rate limited by the platform, backing off to the maximum delay");
                self.policy.throttled_delay()
            } else {
                self.policy.delay_for_round(round)
            };
            if let Some(limit) = self.policy.timeout() {
                delay = delay.min(limit.saturating_sub(started.elapsed()));
            }
            self.emit(&PollEvent::RoundStarted {
                round,
                active: active.len(),
                delay,
            });
            debug!(round, active = active.len(), delay_ms = delay.as_millis() as u64, "waiting for next poll round");
            sleep(delay).await;

            throttled = self.poll_round(&mut active, round).await;

            let (terminal, still_active): (Vec<_>, Vec<_>) =
                active.into_iter().partition(|job| job.state.is_terminal());
            active = still_active;

            for job in terminal {
                self.settle(job, aggregator, &mut summary).await;
            }
        }

        info!(rounds = summary.rounds, "polling finished");
        summary
    }

    /// Refresh every job once. Returns whether any refresh was rate limited.
    async fn poll_round(&self, active: &mut [JobRecord<S::Handle>], round: u32) -> bool {
        let session = self.session;
        let outcomes = join_all(active.iter_mut().map(|job| async move {
            let mut rate_limited = false;
            let observation = match session.refresh_status(&job.handle).await {
                Ok(snapshot) => {
                    debug!(
                        account = %job.account.name,
                        round,
                        remote_status = %snapshot.status,
                        percent_complete = ?snapshot.percent_complete,
                        "status refreshed"
                    );
                    Observation::Status(snapshot)
                }
                Err(e) => {
                    rate_limited = matches!(e, SessionError::RateLimited(_));
                    warn!(
                        account = %job.account.name,
                        job_id = %job.id,
                        round,
                        error = %e,
                        "status check failed, retrying next round"
                    );
                    Observation::TransportError(e.to_string())
                }
            };
            match StateMachine::next(job, observation) {
                Ok(Transition::Advanced { from, to }) => {
                    debug!(account = %job.account.name, round, %from, %to, "job state changed");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "observation rejected"),
            }
            rate_limited
        }))
        .await;
        outcomes.into_iter().any(|limited| limited)
    }

    async fn settle(
        &self,
        job: JobRecord<S::Handle>,
        aggregator: &mut ResultAggregator,
        summary: &mut PollSummary,
    ) {
        let reason = match job.state {
            JobState::Completed => match aggregator.collect(self.session, &job).await {
                Ok(rows) => {
                    self.emit(&PollEvent::JobFinished {
                        account: job.account_name(),
                        state: job.state,
                        rows: Some(rows),
                    });
                    summary.audits.push(JobAudit::from_job(&job, rows));
                    return;
                }
                Err(reason) => reason,
            },
            JobState::Failed => FailureReason::RemoteFailed,
            JobState::Skipped => FailureReason::RemoteSkipped,
            JobState::Submitted | JobState::InProgress => return,
        };

        if matches!(reason, FailureReason::RemoteFailed | FailureReason::RemoteSkipped) {
            error!(
                account = %job.account.name,
                job_id = %job.id,
                state = %job.state,
                percent_complete = ?job.percent_complete,
                "job finished unsuccessfully"
            );
        }
        self.record_failure(&job, reason, summary);
    }

    fn record_failure(
        &self,
        job: &JobRecord<S::Handle>,
        reason: FailureReason,
        summary: &mut PollSummary,
    ) {
        self.emit(&PollEvent::JobFinished {
            account: job.account_name(),
            state: job.state,
            rows: None,
        });
        summary.audits.push(JobAudit::from_job(job, 0));
        summary
            .failures
            .push(AccountFailure::new(job.account_name(), reason));
    }

    fn emit(&self, event: &PollEvent<'_>) {
        if let Some(observer) = self.observer {
            observer(event);
        }
    }
}
