use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::job::JobRecord;
use crate::error::TransitionError;
use crate::session::{RemoteStatus, StatusSnapshot};

/// Lifecycle of one remote report job.
///
/// Each job flows through: SUBMITTED → IN_PROGRESS → COMPLETED | FAILED | SKIPPED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Submitted,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Skipped
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Submitted => write!(f, "SUBMITTED"),
            JobState::InProgress => write!(f, "IN_PROGRESS"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// What one poll attempt learned about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Status(StatusSnapshot),
    /// The status query itself failed; nothing is known about the job.
    TransportError(String),
    /// The poll policy expired while the job was still active.
    DeadlineExpired,
}

/// The result of applying an observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The job moved to a new state.
    Advanced { from: JobState, to: JobState },
    /// The job was already in progress and still is.
    Stayed,
    /// Nothing was learned; the state is untouched.
    Unchanged,
}

/// Drives a [`JobRecord`] through the state machine.
pub struct StateMachine;

impl StateMachine {
    /// Apply `observation` to `job` and return the resulting transition.
    ///
    /// - Remote `Completed`, `Failed` and `Skipped` map to the terminal state
    ///   of the same name; `Queued` and `Running` map to `InProgress`.
    /// - A transport error leaves the state alone and only bumps the error
    ///   counter.
    /// - An expired deadline moves the job to `Skipped`.
    /// - Terminal jobs reject every observation.
    pub fn next<H>(
        job: &mut JobRecord<H>,
        observation: Observation,
    ) -> Result<Transition, TransitionError> {
        if job.state.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                account: job.account.name.clone(),
                state: job.state,
            });
        }

        let target = match observation {
            Observation::Status(snapshot) => {
                job.polls += 1;
                if snapshot.percent_complete.is_some() {
                    job.percent_complete = snapshot.percent_complete;
                }
                match snapshot.status {
                    RemoteStatus::Completed => JobState::Completed,
                    RemoteStatus::Failed => JobState::Failed,
                    RemoteStatus::Skipped => JobState::Skipped,
                    RemoteStatus::Queued | RemoteStatus::Running => JobState::InProgress,
                }
            }
            Observation::TransportError(_) => {
                job.transport_errors += 1;
                return Ok(Transition::Unchanged);
            }
            Observation::DeadlineExpired => JobState::Skipped,
        };

        if target == job.state {
            return Ok(Transition::Stayed);
        }

        let from = job.state;
        job.state_history.push(from);
        job.state = target;
        job.updated_at = Utc::now();

        Ok(Transition::Advanced { from, to: target })
    }
}
