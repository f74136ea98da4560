use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::GraphError;
use super::types::{AsyncJobStatus, AsyncReportCreated, ErrorEnvelope, InsightsPage, ReportRunId};
use crate::error::SessionError;
use crate::report::{DateRange, Record, ReportRequest};
use crate::session::{ReportSession, StatusSnapshot};

/// Authenticated Graph API session for async insights reports.
pub struct GraphClient {
    access_token: String,
    api_version: String,
    client: Client,
    base_url: String,
    page_limit: u32,
}

impl GraphClient {
    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        access_token: String,
        base_url: String,
        api_version: String,
    ) -> Result<Self, GraphError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            access_token,
            api_version,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_limit: 2000,
        })
    }

    /// Page size used when downloading results.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, path)
    }

    /// Start an async insights job for one ad account.
    pub async fn create_report(
        &self,
        account_ref: &str,
        request: &ReportRequest,
    ) -> Result<ReportRunId, GraphError> {
        let params = &request.params;
        let mut form: Vec<(&str, String)> = vec![
            ("fields", request.fields.join(",")),
            ("level", params.level.clone()),
            ("time_increment", params.time_increment.clone()),
            ("limit", params.limit.to_string()),
            ("access_token", self.access_token.clone()),
        ];
        match &params.date_range {
            DateRange::Preset(preset) => form.push(("date_preset", preset.clone())),
            DateRange::Window { since, until } => {
                let range = serde_json::json!({
                    "since": since.format("%Y-%m-%d").to_string(),
                    "until": until.format("%Y-%m-%d").to_string(),
                });
                form.push(("time_range", range.to_string()));
            }
        }

        let req = self
            .client
            .post(self.url(&format!("{account_ref}/insights")))
            .form(&form);
        let created: AsyncReportCreated = self.send(req).await?;
        debug!(account = account_ref, report_run_id = %created.report_run_id, "async report created");
        Ok(created.report_run_id)
    }

    /// Fetch the current status of an async job.
    pub async fn job_status(&self, run_id: &ReportRunId) -> Result<AsyncJobStatus, GraphError> {
        let req = self.client.get(self.url(&run_id.0)).query(&[
            ("fields", "async_status,async_percent_completion"),
            ("access_token", self.access_token.as_str()),
        ]);
        self.send(req).await
    }

    /// Download every result row, following `paging.next` links.
    pub async fn job_results(&self, run_id: &ReportRunId) -> Result<Vec<Record>, GraphError> {
        let limit = self.page_limit.to_string();
        let first = self
            .client
            .get(self.url(&format!("{}/insights", run_id.0)))
            .query(&[
                ("limit", limit.as_str()),
                ("access_token", self.access_token.as_str()),
            ]);

        let mut page: InsightsPage = self.send(first).await?;
        let mut rows = std::mem::take(&mut page.data);
        while let Some(next) = page.paging.and_then(|p| p.next) {
            page = self.send(self.client.get(&next)).await?;
            rows.append(&mut page.data);
        }
        debug!(report_run_id = %run_id, rows = rows.len(), "results downloaded");
        Ok(rows)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GraphError> {
        let response = req.send().await?;
        let response = Self::check(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| GraphError::Parse(e.to_string()))
    }

    async fn check(response: Response) -> Result<Response, GraphError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(env) => match env.error.error_type {
                Some(kind) => (env.error.code, format!("{kind}: {}", env.error.message)),
                None => (env.error.code, env.error.message),
            },
            Err(_) => (0, body),
        };
        Err(GraphError::from_api(status.as_u16(), code, message))
    }
}

impl ReportSession for GraphClient {
    type Handle = ReportRunId;

    async fn submit(
        &self,
        account_ref: &str,
        request: &ReportRequest,
    ) -> Result<ReportRunId, SessionError> {
        self.create_report(account_ref, request)
            .await
            .map_err(GraphError::into_submission)
    }

    async fn refresh_status(&self, handle: &ReportRunId) -> Result<StatusSnapshot, SessionError> {
        let status = self
            .job_status(handle)
            .await
            .map_err(GraphError::into_transport)?;
        let snapshot = StatusSnapshot::new(status.remote_status());
        Ok(match status.async_percent_completion {
            Some(percent) => snapshot.with_percent(percent),
            None => snapshot,
        })
    }

    async fn fetch_result(&self, handle: &ReportRunId) -> Result<Vec<Record>, SessionError> {
        self.job_results(handle)
            .await
            .map_err(GraphError::into_transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RemoteStatus;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GraphClient {
        GraphClient::with_base_url("tok".into(), server.uri(), "v19.0".into()).unwrap()
    }

    #[tokio::test]
    async fn submit_posts_fields_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/act_1/insights"))
            .and(body_string_contains("level=adset"))
            .and(body_string_contains("date_preset=last_90d"))
            .and(body_string_contains("access_token=tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"report_run_id": "900"})))
            .expect(1)
            .mount(&server)
            .await;

        let handle = client(&server)
            .submit("act_1", &ReportRequest::default())
            .await
            .unwrap();
        assert_eq!(handle, ReportRunId("900".into()));
    }

    #[tokio::test]
    async fn submit_sends_time_range_for_windows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/act_1/insights"))
            .and(body_string_contains("time_range="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"report_run_id": "901"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = ReportRequest::default();
        request.params.date_range = DateRange::Window {
            since: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            until: chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        let handle = client(&server).submit("act_1", &request).await.unwrap();
        assert_eq!(handle.0, "901");
    }

    #[tokio::test]
    async fn submit_error_is_submission_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "(#100) Invalid parameter", "type": "OAuthException", "code": 100}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .submit("act_1", &ReportRequest::default())
            .await
            .unwrap_err();
        match err {
            SessionError::Submission(msg) => assert!(msg.contains("Invalid parameter")),
            other => panic!("expected submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_status_maps_async_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v19.0/900"))
            .and(query_param("fields", "async_status,async_percent_completion"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "900",
                "async_status": "Job Running",
                "async_percent_completion": 35
            })))
            .mount(&server)
            .await;

        let snapshot = client(&server)
            .refresh_status(&ReportRunId("900".into()))
            .await
            .unwrap();
        assert_eq!(snapshot.status, RemoteStatus::Running);
        assert_eq!(snapshot.percent_complete, Some(35));
    }

    #[tokio::test]
    async fn refresh_status_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = client(&server)
            .refresh_status(&ReportRunId("900".into()))
            .await
            .unwrap_err();
        match err {
            SessionError::Transport(msg) => assert!(msg.contains("upstream unavailable")),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn throttled_status_check_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "User request limit reached", "type": "OAuthException", "code": 17}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .refresh_status(&ReportRunId("900".into()))
            .await
            .unwrap_err();
        match err {
            SessionError::RateLimited(msg) => assert!(msg.contains("code 17")),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_result_follows_paging() {
        let server = MockServer::start().await;
        let next = format!("{}/v19.0/900/insights/page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/v19.0/900/insights"))
            .and(query_param("limit", "2000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"campaign_name": "A", "spend": "1"}, {"campaign_name": "B", "spend": "2"}],
                "paging": {"cursors": {"after": "x"}, "next": next}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v19.0/900/insights/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"campaign_name": "C", "reach": "10"}],
                "paging": {"cursors": {"before": "x"}}
            })))
            .mount(&server)
            .await;

        let rows = client(&server)
            .fetch_result(&ReportRunId("900".into()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].get("reach"), Some(&json!("10")));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .job_status(&ReportRunId("900".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }
}
