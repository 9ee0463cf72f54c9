//! Failure taxonomy for coordinator handlers and its user-facing rendering.

use shared::error::ApiException;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// A role or authentication precondition failed; no request was sent.
    #[error("{0}")]
    Guard(String),
    /// The server answered with a non-2xx status.
    #[error(transparent)]
    ServerRejected(#[from] ApiException),
    /// The request never produced a usable response (network or decode).
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    NotFound(String),
}

impl ClientError {
    pub fn guard(message: impl Into<String>) -> Self {
        Self::Guard(message.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::ServerRejected(ApiException::new(status, message))
    }

    /// Text shown to the user: server messages verbatim, transport failures
    /// with a generic prefix.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Guard(message) | ClientError::NotFound(message) => message.clone(),
            ClientError::ServerRejected(rejection) => rejection.message.clone(),
            ClientError::Transport(err) => format!("Error: {err}"),
        }
    }

    pub fn is_guard(&self) -> bool {
        matches!(self, ClientError::Guard(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A dismissible message surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }

    /// Builds the notice for a failed handler. `context` prefixes server
    /// rejections and transport failures, e.g. `Login failed: Invalid credentials`.
    pub fn from_error(context: Option<&str>, err: &ClientError) -> Self {
        let text = match (context, err) {
            (Some(context), ClientError::ServerRejected(rejection)) => {
                format!("{context}: {}", rejection.message)
            }
            (Some(context), ClientError::Transport(err)) => format!("{context}: {err}"),
            _ => err.user_message(),
        };
        Self::error(text)
    }
}
