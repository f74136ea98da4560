use thiserror::Error;

use crate::graph::GraphError;
use crate::state_machine::JobState;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No accounts configured. Add an [accounts] table to harvest.toml.")]
    NoAccounts,

    #[error("Missing access token. Set META_ACCESS_TOKEN or `access_token` in the config.")]
    MissingToken,

    #[error("Graph API error: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors reported by a [`ReportSession`](crate::session::ReportSession).
///
/// Submission failures exclude the account from the run. Transport failures
/// while polling are transient and leave the job's state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("submission rejected: {0}")]
    Submission(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The platform asked the caller to slow down. Transient, like `Transport`.
    #[error("rate limited: {0}")]
    RateLimited(String),
}

/// Raised when an observation is applied to a job that can no longer move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job for '{account}' is already terminal ({state})")]
    AlreadyTerminal { account: String, state: JobState },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_display() {
        let err = SessionError::Submission("(#100) Invalid parameter".into());
        assert_eq!(err.to_string(), "submission rejected: (#100) Invalid parameter");

        let err = SessionError::Transport("connection reset".into());
        assert_eq!(err.to_string(), "transport error: connection reset");

        let err = SessionError::RateLimited("code 17".into());
        assert_eq!(err.to_string(), "rate limited: code 17");
    }

    #[test]
    fn transition_error_display() {
        let err = TransitionError::AlreadyTerminal {
            account: "ClientA".into(),
            state: JobState::Completed,
        };
        assert_eq!(
            err.to_string(),
            "job for 'ClientA' is already terminal (COMPLETED)"
        );
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HarvestError>();
        assert_send_sync::<SessionError>();
    }
}
