use tracing::{info, warn};

use crate::aggregator::{Extraction, ResultAggregator};
use crate::poller::{PollObserver, Poller};
use crate::policy::PollPolicy;
use crate::report::ReportRequest;
use crate::session::ReportSession;
use crate::state_machine::{AccountFailure, AccountMap, JobAudit};
use crate::submitter::Submitter;

/// Everything one extraction run produced.
#[derive(Debug)]
pub struct ExtractionReport {
    pub outcome: Extraction,
    /// Side channel: accounts that contributed nothing, and why.
    pub failures: Vec<AccountFailure>,
    pub audits: Vec<JobAudit>,
    pub rounds: u32,
}

/// Fans a report request out to many accounts and consolidates the results.
pub struct Orchestrator<S> {
    session: S,
    request: ReportRequest,
    policy: PollPolicy,
}

impl<S: ReportSession> Orchestrator<S> {
    pub fn new(session: S, request: ReportRequest, policy: PollPolicy) -> Self {
        Self {
            session,
            request,
            policy,
        }
    }

    /// Submit, poll and aggregate for every account in `accounts`, reporting
    /// poll progress to `observer` when given.
    ///
    /// Per-account failures never fail the run; they are returned in
    /// [`ExtractionReport::failures`]. `outcome` is `NoData` when no account
    /// produced a row.
    pub async fn extract(
        &self,
        accounts: &AccountMap,
        observer: Option<PollObserver<'_>>,
    ) -> ExtractionReport {
        let submission = Submitter::new(&self.session, &self.request)
            .submit_all(accounts)
            .await;
        let mut failures = submission.failures;

        let mut poller = Poller::new(&self.session, &self.policy);
        if let Some(observer) = observer {
            poller = poller.with_observer(observer);
        }
        let mut aggregator = ResultAggregator::new();
        let summary = poller.run(submission.active, &mut aggregator).await;
        failures.extend(summary.failures);

        for failure in &failures {
            warn!(account = %failure.account_name, reason = %failure.reason, "account excluded from results");
        }

        let outcome = aggregator.finish();
        info!(
            accounts = accounts.len(),
            failed = failures.len(),
            rounds = summary.rounds,
            "extraction finished"
        );

        ExtractionReport {
            outcome,
            failures,
            audits: summary.audits,
            rounds: summary.rounds,
        }
    }
}

#[cfg(test)]
impl<S> Orchestrator<S> {
    fn session(&self) -> &S {
        &self.session
    }
}
