//! Merges per-account result sets into one account-tagged dataset.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::report::Record;
use crate::session::ReportSession;
use crate::state_machine::{FailureReason, JobRecord, JobState};

/// Column every consolidated row carries, holding the owning account name.
pub const ACCOUNT_COLUMN: &str = "account_name";

/// The merged, account-tagged rows of every completed job in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedDataset {
    /// Superset of every row's keys, first-seen order, account column first.
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl ConsolidatedDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
impl ConsolidatedDataset {
    /// Rows contributed by `account`.
    pub fn rows_for<'a>(&'a self, account: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.get(ACCOUNT_COLUMN).and_then(|v| v.as_str()) == Some(account))
    }
}

/// Final result of an extraction: data, or the explicit absence of it.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Data(ConsolidatedDataset),
    NoData,
}

impl Extraction {
    pub fn dataset(&self) -> Option<&ConsolidatedDataset> {
        match self {
            Extraction::Data(ds) => Some(ds),
            Extraction::NoData => None,
        }
    }
}

#[cfg(test)]
impl Extraction {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Extraction::NoData)
    }
}

/// Collects the results of completed jobs as the poller hands them over.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    columns: Vec<String>,
    seen: HashSet<String>,
    rows: Vec<Record>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        let mut aggregator = Self::default();
        aggregator.track_column(ACCOUNT_COLUMN);
        aggregator
    }

    /// Download the rows of a completed job and append them, tagged with the
    /// job's account. Returns the number of rows added.
    pub async fn collect<S: ReportSession>(
        &mut self,
        session: &S,
        job: &JobRecord<S::Handle>,
    ) -> Result<usize, FailureReason> {
        debug_assert_eq!(job.state, JobState::Completed);
        let account = job.account_name();

        let records = match session.fetch_result(&job.handle).await {
            Ok(records) => records,
            Err(e) => {
                error!(account, job_id = %job.id, error = %e, "failed to fetch job result");
                return Err(FailureReason::FetchFailed(e.to_string()));
            }
        };

        if records.is_empty() {
            warn!(account, job_id = %job.id, "job completed without data");
            return Ok(0);
        }

        let added = self.ingest(account, records);
        info!(account, job_id = %job.id, rows = added, "job completed");
        Ok(added)
    }

    /// Tag and append already-fetched rows.
    pub fn ingest(&mut self, account: &str, records: Vec<Record>) -> usize {
        let added = records.len();
        for mut record in records {
            for key in record.keys() {
                self.track_column(key);
            }
            record.insert(ACCOUNT_COLUMN, account);
            self.rows.push(record);
        }
        added
    }

    /// The consolidated dataset, or `NoData` if nothing was collected.
    pub fn finish(self) -> Extraction {
        if self.rows.is_empty() {
            warn!("no data was extracted from any account");
            return Extraction::NoData;
        }
        info!(rows = self.rows.len(), columns = self.columns.len(), "results consolidated");
        Extraction::Data(ConsolidatedDataset {
            columns: self.columns,
            rows: self.rows,
        })
    }

    fn track_column(&mut self, name: &str) {
        if self.seen.insert(name.to_string()) {
            self.columns.push(name.to_string());
        }
    }
}

#[cfg(test)]
impl ResultAggregator {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{Script, ScriptedSession, row};
    use crate::session::{ReportSession, RemoteStatus, StatusSnapshot};
    use crate::state_machine::{AccountIdentity, Observation, StateMachine};
    use serde_json::json;

    async fn completed_job(
        session: &ScriptedSession,
        name: &str,
        account_ref: &str,
    ) -> JobRecord<String> {
        let handle = session
            .submit(account_ref, &Default::default())
            .await
            .unwrap();
        let mut job = JobRecord::new(AccountIdentity::new(name, account_ref), handle);
        StateMachine::next(
            &mut job,
            Observation::Status(StatusSnapshot::new(RemoteStatus::Completed)),
        )
        .unwrap();
        job
    }

    #[test]
    fn ingest_unions_columns_and_tags_rows() {
        let mut agg = ResultAggregator::new();
        agg.ingest(
            "ClientA",
            vec![row(&[("campaign_name", "Spring"), ("spend", "10")])],
        );
        agg.ingest(
            "ClientB",
            vec![
                row(&[("campaign_name", "Launch"), ("reach", "300")]),
                row(&[("campaign_name", "Launch 2")]),
            ],
        );

        let ds = match agg.finish() {
            Extraction::Data(ds) => ds,
            Extraction::NoData => panic!("expected data"),
        };
        assert_eq!(ds.len(), 3);
        assert_eq!(
            ds.columns,
            vec!["account_name", "campaign_name", "spend", "reach"]
        );
        assert_eq!(ds.rows_for("ClientA").count(), 1);
        assert_eq!(ds.rows_for("ClientB").count(), 2);
        let b = ds.rows_for("ClientB").next().unwrap();
        assert!(b.get("spend").is_none());
        assert_eq!(b.get("reach"), Some(&json!("300")));
    }

    #[test]
    fn account_tag_overrides_remote_field() {
        let mut agg = ResultAggregator::new();
        agg.ingest("ClientA", vec![row(&[("account_name", "Remote name")])]);
        let ds = agg.finish();
        let ds = ds.dataset().unwrap();
        assert_eq!(ds.rows[0].get(ACCOUNT_COLUMN), Some(&json!("ClientA")));
        assert_eq!(ds.columns, vec!["account_name"]);
    }

    #[test]
    fn nothing_collected_is_no_data() {
        assert!(ResultAggregator::new().finish().is_no_data());
    }

    #[tokio::test]
    async fn collect_fetches_and_tags() {
        let session = ScriptedSession::new().with(
            "act_1",
            Script::completes_after(0, vec![row(&[("spend", "1")]), row(&[("spend", "2")])]),
        );
        let job = completed_job(&session, "ClientA", "act_1").await;

        let mut agg = ResultAggregator::new();
        assert_eq!(agg.collect(&session, &job).await, Ok(2));
        assert_eq!(agg.row_count(), 2);
        assert_eq!(session.fetches("act_1"), 1);
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let session = ScriptedSession::new().with("act_1", Script::completes_after(0, vec![]));
        let job = completed_job(&session, "ClientA", "act_1").await;

        let mut agg = ResultAggregator::new();
        assert_eq!(agg.collect(&session, &job).await, Ok(0));
        assert!(agg.finish().is_no_data());
    }

    #[tokio::test]
    async fn fetch_error_is_reported() {
        let session = ScriptedSession::new().with(
            "act_1",
            Script::completes_after(0, vec![row(&[("spend", "1")])]).fetch_fails("reset"),
        );
        let job = completed_job(&session, "ClientA", "act_1").await;

        let mut agg = ResultAggregator::new();
        let err = agg.collect(&session, &job).await.unwrap_err();
        assert!(matches!(err, FailureReason::FetchFailed(ref m) if m.contains("reset")));
        assert_eq!(agg.row_count(), 0);
    }
}
