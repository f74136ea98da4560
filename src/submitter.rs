use tracing::{error, info};

use crate::report::ReportRequest;
use crate::session::ReportSession;
use crate::state_machine::{AccountFailure, AccountIdentity, AccountMap, FailureReason, JobRecord};

/// Outcome of submitting one job per account.
#[derive(Debug)]
pub struct Submission<H> {
    /// Jobs created successfully; the poller's starting active set.
    pub active: Vec<JobRecord<H>>,
    /// Accounts excluded from the rest of the run.
    pub failures: Vec<AccountFailure>,
}

/// Issues one report job per account with a shared request.
pub struct Submitter<'a, S> {
    session: &'a S,
    request: &'a ReportRequest,
}

impl<'a, S: ReportSession> Submitter<'a, S> {
    pub fn new(session: &'a S, request: &'a ReportRequest) -> Self {
        Self { session, request }
    }

    /// Submit a job for every account. A rejected submission is logged and
    /// recorded; it never stops the remaining accounts.
    pub async fn submit_all(&self, accounts: &AccountMap) -> Submission<S::Handle> {
        info!(accounts = accounts.len(), "starting async extraction jobs");

        let mut active = Vec::with_capacity(accounts.len());
        let mut failures = Vec::new();

        for (name, account_ref) in accounts {
            match self.session.submit(account_ref, self.request).await {
                Ok(handle) => {
                    let job = JobRecord::new(AccountIdentity::new(name, account_ref), handle);
                    info!(account = %name, job_id = %job.id, handle = ?job.handle, "job submitted");
                    active.push(job);
                }
                Err(e) => {
                    error!(account = %name, error = %e, "failed to submit job");
                    failures.push(AccountFailure::new(
                        name.clone(),
                        FailureReason::SubmissionRejected(e.to_string()),
                    ));
                }
            }
        }

        Submission { active, failures }
    }
}
