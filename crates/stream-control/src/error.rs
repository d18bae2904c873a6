use thiserror::Error;

/// Failure reported by the remote streaming service or its transport.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Non-2xx response; carries the remote status code and body.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ServiceError {
    /// Remote status code, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
        }
    }
}

/// Errors surfaced by [`SessionController`](crate::SessionController)
/// operations.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Trimmed prompt text was empty. Local, needs new input.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// Another submission is in flight; the busy flag is authoritative.
    #[error("a submission is already in flight")]
    Busy,

    /// `return_to_live` called with no session to clear.
    #[error("no active session")]
    NoActiveSession,

    /// Remote session creation failed; the store is left empty and the
    /// caller may retry.
    #[error("failed to create stream session: {0}")]
    SessionCreate(#[source] ServiceError),

    /// Remote patch/clear failed; the session was rotated and the
    /// failure is recoverable from the caller's perspective.
    #[error("failed to update stream: {0}")]
    Dispatch(#[source] ServiceError),
}

/// Configuration errors, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing API credential (set {0})")]
    MissingCredential(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status() {
        let err = ServiceError::Status {
            status: 422,
            body: "bad params".to_string(),
        };
        assert_eq!(err.status(), Some(422));
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("bad params"));
    }

    #[test]
    fn test_submit_error_source_is_preserved() {
        use std::error::Error;

        let err = SubmitError::Dispatch(ServiceError::Status {
            status: 500,
            body: "oops".to_string(),
        });
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("500"));
    }
}
