use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobState;

/// Account name to remote account reference (e.g. `"ClientA" -> "act_123"`).
pub type AccountMap = BTreeMap<String, String>;

/// The logical owner of a job: a readable name and the remote account ref.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub name: String,
    pub account_ref: String,
}

impl AccountIdentity {
    pub fn new(name: impl Into<String>, account_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_ref: account_ref.into(),
        }
    }
}

/// Why an account contributed no rows to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The job could not be created.
    SubmissionRejected(String),
    /// The platform finished the job unsuccessfully.
    RemoteFailed,
    /// The platform bypassed the job.
    RemoteSkipped,
    /// The poll policy ran out before the job finished.
    TimedOut,
    /// The job completed but its rows could not be downloaded.
    FetchFailed(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::SubmissionRejected(msg) => write!(f, "Submission rejected: {msg}"),
            FailureReason::RemoteFailed => write!(f, "Failed"),
            FailureReason::RemoteSkipped => write!(f, "Skipped"),
            FailureReason::TimedOut => write!(f, "Timed out"),
            FailureReason::FetchFailed(msg) => write!(f, "Fetch failed: {msg}"),
        }
    }
}

/// One entry of the side-channel report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFailure {
    pub account_name: String,
    pub reason: FailureReason,
}

impl AccountFailure {
    pub fn new(account_name: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            account_name: account_name.into(),
            reason,
        }
    }
}

/// A submitted remote job bound to the account it was submitted for.
#[derive(Debug)]
pub struct JobRecord<H> {
    pub id: Uuid,
    pub account: AccountIdentity,
    pub handle: H,
    pub state: JobState,
    pub state_history: Vec<JobState>,
    /// Successful status refreshes.
    pub polls: u32,
    /// Status refreshes that failed in transport.
    pub transport_errors: u32,
    pub percent_complete: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<H> JobRecord<H> {
    pub fn new(account: AccountIdentity, handle: H) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account,
            handle,
            state: JobState::Submitted,
            state_history: Vec::new(),
            polls: 0,
            transport_errors: 0,
            percent_complete: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn account_name(&self) -> &str {
        &self.account.name
    }
}

/// Structured record produced when a job leaves the active set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAudit {
    pub job_id: String,
    pub account_name: String,
    pub account_ref: String,
    pub final_state: JobState,
    pub state_transitions: Vec<JobState>,
    pub polls: u32,
    pub transport_errors: u32,
    pub percent_complete: Option<u32>,
    pub rows: usize,
    pub started_at: DateTime<Utc>,
    /// When the job reached its final state; results are fetched after this.
    pub last_transition_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobAudit {
    /// Generate an audit record from a terminated job.
    pub fn from_job<H>(job: &JobRecord<H>, rows: usize) -> Self {
        let now = Utc::now();
        let duration = now - job.created_at;
        let mut transitions = job.state_history.clone();
        transitions.push(job.state);

        Self {
            job_id: job.id.to_string(),
            account_name: job.account.name.clone(),
            account_ref: job.account.account_ref.clone(),
            final_state: job.state,
            state_transitions: transitions,
            polls: job.polls,
            transport_errors: job.transport_errors,
            percent_complete: job.percent_complete,
            rows,
            started_at: job.created_at,
            last_transition_at: job.updated_at,
            finished_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
