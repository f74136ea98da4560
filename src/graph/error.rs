//! Tipos de erro para o cliente da Graph API.
//!
//! Define [`GraphError`] com variantes para rate limiting, erros da API
//! e erros de rede, e a conversão para [`SessionError`] usada pelo orquestrador.

use thiserror::Error;

use crate::error::SessionError;

/// Códigos de erro da Graph API que indicam limite de chamadas atingido.
const RATE_LIMIT_CODES: [i64; 4] = [4, 17, 32, 613];

/// Erros que podem ocorrer ao interagir com a Graph API.
///
/// - [`RateLimited`](GraphError::RateLimited) — HTTP 429 ou código de throttling
/// - [`Api`](GraphError::Api) — qualquer outro erro retornado pela API
/// - [`Network`](GraphError::Network) — falha na camada de rede
/// - [`Parse`](GraphError::Parse) — corpo de resposta inesperado
#[derive(Debug, Error)]
pub enum GraphError {
    /// A API pediu para reduzir o ritmo de chamadas.
    #[error("rate limited (code {code}): {message}")]
    RateLimited { code: i64, message: String },

    /// Erro retornado pela API (ex.: 400 parâmetro inválido, 190 token expirado).
    #[error("API error (status {status}, code {code}): {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A resposta não tinha o formato esperado.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl GraphError {
    /// Classifica um erro da API pelo código retornado no corpo.
    pub fn from_api(status: u16, code: i64, message: String) -> Self {
        if status == 429 || RATE_LIMIT_CODES.contains(&code) {
            GraphError::RateLimited { code, message }
        } else {
            GraphError::Api {
                status,
                code,
                message,
            }
        }
    }

    pub fn into_submission(self) -> SessionError {
        SessionError::Submission(self.to_string())
    }

    /// Erros durante o polling; limites de chamadas continuam distinguíveis
    /// para que o poller espere mais antes da próxima rodada.
    pub fn into_transport(self) -> SessionError {
        match self {
            GraphError::RateLimited { .. } => SessionError::RateLimited(self.to_string()),
            _ => SessionError::Transport(self.to_string()),
        }
    }
}
