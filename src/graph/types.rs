//! Tipos de dados das requisições e respostas da Graph API (insights assíncronos).
//!
//! Todas as structs derivam `Deserialize` para conversão do JSON retornado
//! pelos endpoints `/{account}/insights` e `/{report_run_id}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::report::Record;
use crate::session::RemoteStatus;

/// Identificador de um relatório assíncrono (`report_run_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportRunId(pub String);

impl fmt::Display for ReportRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resposta do `POST /{account}/insights` com `is_async`.
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncReportCreated {
    pub report_run_id: ReportRunId,
}

/// Resposta do `GET /{report_run_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncJobStatus {
    /// Texto de status, ex.: `"Job Running"`, `"Job Completed"`.
    pub async_status: String,
    /// Percentual concluído (0–100).
    #[serde(default)]
    pub async_percent_completion: Option<u32>,
}

impl AsyncJobStatus {
    /// Converte o texto de status da API para [`RemoteStatus`].
    ///
    /// Status desconhecidos são tratados como em andamento.
    pub fn remote_status(&self) -> RemoteStatus {
        match self.async_status.as_str() {
            "Job Completed" => RemoteStatus::Completed,
            "Job Failed" => RemoteStatus::Failed,
            "Job Skipped" => RemoteStatus::Skipped,
            "Job Not Started" => RemoteStatus::Queued,
            _ => RemoteStatus::Running,
        }
    }
}

/// Uma página de resultados de `GET /{report_run_id}/insights`.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightsPage {
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Links de paginação; `next` ausente indica a última página.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

/// Envelope de erro da Graph API: `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}
