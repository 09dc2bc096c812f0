//! Uniform error report
//!
//! Local input errors, transport failures and remote API errors all end up as
//! an [`ErrorReport`]. Local and transport errors never carry an HTTP status;
//! remote errors always do.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::api::http::TransportError;

/// Description used when the backend gives nothing better
const DEFAULT_HINT: &str = "Check the error details above for more information";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Local JSON or parameter error, detected before any request
    MalformedInput,
    /// Referenced upload buffer is absent from the input record
    MissingBinaryData,
    /// Structured field-level errors returned by the service
    RemoteValidationError,
    /// Any other non-success response from the service
    RemoteApiError,
    /// Network or connection failure below the HTTP layer
    TransportError,
}

impl ErrorKind {
    pub fn is_local(&self) -> bool {
        matches!(self, ErrorKind::MalformedInput | ErrorKind::MissingBinaryData)
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g., "recipients.0.email")
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors raised while resolving a record's inputs
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No binary data found for property '{0}'")]
    MissingBinaryData(String),
}

/// Immutable, human-readable description of a failed request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<Value>,
}

impl ErrorReport {
    /// Report for an error detected before any network call
    pub fn local(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            http_status: None,
            field_errors: None,
            response: None,
        }
    }

    /// Report for a non-success HTTP response.
    ///
    /// `message` already includes the bracketed code, if any.
    pub(crate) fn remote(
        status: u16,
        message: String,
        code: Option<String>,
        field_errors: Option<Vec<FieldError>>,
        response: Option<Value>,
    ) -> Self {
        let kind = if field_errors.is_some() {
            ErrorKind::RemoteValidationError
        } else {
            ErrorKind::RemoteApiError
        };
        Self {
            kind,
            message,
            code,
            http_status: Some(status),
            field_errors,
            response,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    pub fn field_errors(&self) -> Option<&[FieldError]> {
        self.field_errors.as_deref()
    }

    /// Backend response body, when the service sent one
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    /// Short hint for the caller: the backend's own `message`, if present
    pub fn hint(&self) -> &str {
        self.response
            .as_ref()
            .and_then(|r| r.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or(DEFAULT_HINT)
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(status) = self.http_status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorReport {}

impl From<InputError> for ErrorReport {
    fn from(err: InputError) -> Self {
        let kind = match err {
            InputError::MalformedInput(_) => ErrorKind::MalformedInput,
            InputError::MissingBinaryData(_) => ErrorKind::MissingBinaryData,
        };
        ErrorReport::local(kind, err.to_string())
    }
}

impl From<TransportError> for ErrorReport {
    fn from(err: TransportError) -> Self {
        ErrorReport::local(ErrorKind::TransportError, err.to_string())
    }
}
