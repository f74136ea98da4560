//! The remote reporting capability the orchestrator drives.
//!
//! A [`ReportSession`] is an already-authenticated API session. It is passed
//! explicitly to the submitter and poller so several sessions (or scripted
//! test sessions) can coexist in one process.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::report::{Record, ReportRequest};

/// Status reported by the remote platform for one async job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStatus::Queued => write!(f, "Queued"),
            RemoteStatus::Running => write!(f, "Running"),
            RemoteStatus::Completed => write!(f, "Completed"),
            RemoteStatus::Failed => write!(f, "Failed"),
            RemoteStatus::Skipped => write!(f, "Skipped"),
        }
    }
}

/// One status refresh: the status plus remote progress when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: RemoteStatus,
    pub percent_complete: Option<u32>,
}

impl StatusSnapshot {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            percent_complete: None,
        }
    }

    pub fn with_percent(mut self, percent: u32) -> Self {
        self.percent_complete = Some(percent);
        self
    }
}

/// Submit, poll and fetch async report jobs.
///
/// `Handle` is the opaque reference to one remote job. Handles are owned by
/// the job record they were created for and never shared between runs.
#[allow(async_fn_in_trait)]
pub trait ReportSession {
    type Handle: fmt::Debug;

    /// Starts one async report job for `account_ref`.
    async fn submit(
        &self,
        account_ref: &str,
        request: &ReportRequest,
    ) -> Result<Self::Handle, SessionError>;

    /// Queries the current remote status. Errors here are transient.
    async fn refresh_status(&self, handle: &Self::Handle) -> Result<StatusSnapshot, SessionError>;

    /// Downloads every row of a completed job.
    async fn fetch_result(&self, handle: &Self::Handle) -> Result<Vec<Record>, SessionError>;
}
