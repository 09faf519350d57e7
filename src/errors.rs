//! Error type shared by every endpoint, and the normalizer that turns any
//! failed request into the single line shown to a user.
//!
//! The normalizer applies one decision order everywhere:
//!
//! 1. The registry answered with a non-success status: `Error {status}: {message}`,
//!    where `message` is the `error` field of a JSON object body if present,
//!    otherwise the transport message.
//! 2. No response arrived at all: `Error Unknown status code: {transport message}`.
//! 3. Anything else: `An unexpected error occurred.`
//!
//! Local validation failures are shown verbatim, since they never reached the network.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Placeholder used where a status code is unavailable.
pub const UNKNOWN_STATUS_CODE: &str = "Unknown status code";

/// Fixed text for failures that aren't transport related.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred.";

#[derive(Error, Debug)]
pub enum ClientError {
    /// The registry answered with a non-2xx status code.
    #[error("{message}")]
    Status {
        status: StatusCode,
        message: String,
        /// The response body, if it was valid JSON.
        body: Option<Value>,
    },

    /// The request never produced a response: connection failures, timeouts,
    /// and interrupted bodies.
    #[error("{message}")]
    Transport { message: String },

    /// Input rejected locally, before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Failed to deserialize response: {raw}. The error was {source}.")]
    Decode {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to construct URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Build a status error from a failed response's code and raw body.
    pub fn from_status(status: StatusCode, raw_body: &str) -> Self {
        Self::Status {
            status,
            message: status_message(status),
            body: serde_json::from_str(raw_body).ok(),
        }
    }

    /// The HTTP status, when the registry responded.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the registry reported the resource as absent.
    ///
    /// Searches signal "no results" either with an empty list or with a 404,
    /// and callers need to tell the two apart.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Render this error as the one line shown to a user.
    pub fn normalize(&self) -> String {
        match self {
            Self::Status { status, message, body } => {
                let detail = body
                    .as_ref()
                    .and_then(server_error_message)
                    .unwrap_or_else(|| message.clone());
                format!("Error {}: {detail}", status.as_u16())
            }
            Self::Transport { message } => format!("Error {UNKNOWN_STATUS_CODE}: {message}"),
            Self::Validation(message) => message.clone(),
            // Fixable by whoever set the client up, so worth showing
            Self::Config(_) => self.to_string(),
            Self::Decode { .. } | Self::Encode(_) | Self::Url(_) | Self::InvalidHeader(_) => UNEXPECTED_ERROR.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status {
                status,
                message: status_message(status),
                body: None,
            },
            None => Self::Transport { message: e.to_string() },
        }
    }
}

/// Free-function form of [`ClientError::normalize`].
pub fn normalize_error(error: &ClientError) -> String {
    error.normalize()
}

fn status_message(status: StatusCode) -> String {
    format!("Request failed with status code {}", status.as_u16())
}

/// Pull a displayable message out of an `error` field on a JSON object body.
///
/// Falsy values (null, false, 0, "") don't count as a message.
fn server_error_message(body: &Value) -> Option<String> {
    match body.as_object()?.get("error")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Null | Value::Bool(false) | Value::String(_) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
