//! Operation definitions and request/response description types
//!
//! This module defines the six TurboSign operations, the file input strategies
//! of the prepare operations, and the transport-neutral request and response
//! shapes passed between the builder, the transport and the normalizer.

use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// TurboSign operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Upload a document with fields and recipients, returns a preview URL (no emails sent)
    PrepareForReview,
    /// Upload a document with fields and recipients and send signature request emails
    PrepareForSigning,
    /// Current status of a signature document
    GetStatus,
    /// Download the signed PDF
    DownloadDocument,
    /// Cancel a signature request
    VoidDocument,
    /// Resend signature request emails to specific recipients
    ResendEmail,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::PrepareForReview,
        Operation::PrepareForSigning,
        Operation::GetStatus,
        Operation::DownloadDocument,
        Operation::VoidDocument,
        Operation::ResendEmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::PrepareForReview => "prepareForReview",
            Operation::PrepareForSigning => "prepareForSigning",
            Operation::GetStatus => "getStatus",
            Operation::DownloadDocument => "downloadDocument",
            Operation::VoidDocument => "voidDocument",
            Operation::ResendEmail => "resendEmail",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    /// Accepts both the camelCase wire name ("getStatus") and kebab-case ("get-status")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| *c != '-' && *c != '_').collect();
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// How the document of a prepare operation is provided
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileInputMethod {
    /// Binary data attached to the input record
    #[default]
    Upload,
    /// URL to a hosted file
    #[serde(rename = "url")]
    UrlLink,
    /// Existing TurboDocx deliverable
    Deliverable,
    /// TurboDocx template, converted to PDF by the service
    Template,
}

/// Document bytes taken from an input record's binary attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// The single document source of a prepare request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileInput {
    Upload(UploadedFile),
    UrlLink(String),
    Deliverable(String),
    Template(String),
}

impl FileInput {
    /// Multipart field name carrying this input
    pub fn field_name(&self) -> &'static str {
        match self {
            FileInput::Upload(_) => "file",
            FileInput::UrlLink(_) => "fileLink",
            FileInput::Deliverable(_) => "deliverableId",
            FileInput::Template(_) => "templateId",
        }
    }

    pub fn method(&self) -> FileInputMethod {
        match self {
            FileInput::Upload(_) => FileInputMethod::Upload,
            FileInput::UrlLink(_) => FileInputMethod::UrlLink,
            FileInput::Deliverable(_) => FileInputMethod::Deliverable,
            FileInput::Template(_) => FileInputMethod::Template,
        }
    }
}

/// Optional document settings of a prepare request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOptions {
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub document_description: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_email: Option<String>,
    /// JSON array of CC addresses (max 10, enforced by the service)
    #[serde(default, deserialize_with = "raw_json_text")]
    pub cc_emails: Option<String>,
}

impl DocumentOptions {
    /// Non-empty options as (multipart field, value) pairs, in wire order
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("documentName", &self.document_name),
            ("documentDescription", &self.document_description),
            ("senderName", &self.sender_name),
            ("senderEmail", &self.sender_email),
            ("ccEmails", &self.cc_emails),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }
}

/// Body of a prepare-for-review / prepare-for-signing call.
///
/// Recipients and fields stay raw JSON text; the service validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRequestPayload {
    pub recipients: String,
    pub fields: String,
    pub options: DocumentOptions,
    pub file: FileInput,
}

/// Fully resolved inputs of one record, ready for request building
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRequest {
    PrepareForReview(SignatureRequestPayload),
    PrepareForSigning(SignatureRequestPayload),
    GetStatus { document_id: String },
    DownloadDocument { document_id: String },
    VoidDocument { document_id: String, reason: String },
    ResendEmail { document_id: String, recipient_ids: Vec<String> },
}

impl ResolvedRequest {
    pub fn operation(&self) -> Operation {
        match self {
            ResolvedRequest::PrepareForReview(_) => Operation::PrepareForReview,
            ResolvedRequest::PrepareForSigning(_) => Operation::PrepareForSigning,
            ResolvedRequest::GetStatus { .. } => Operation::GetStatus,
            ResolvedRequest::DownloadDocument { .. } => Operation::DownloadDocument,
            ResolvedRequest::VoidDocument { .. } => Operation::VoidDocument,
            ResolvedRequest::ResendEmail { .. } => Operation::ResendEmail,
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        match self {
            ResolvedRequest::PrepareForReview(_) | ResolvedRequest::PrepareForSigning(_) => None,
            ResolvedRequest::GetStatus { document_id }
            | ResolvedRequest::DownloadDocument { document_id }
            | ResolvedRequest::VoidDocument { document_id, .. }
            | ResolvedRequest::ResendEmail { document_id, .. } => Some(document_id),
        }
    }
}

/// One multipart form part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text { name: &'static str, value: String },
    File { name: &'static str, file: UploadedFile },
}

impl FormPart {
    pub fn name(&self) -> &'static str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Request body encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// How the transport should read the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Binary,
}

/// Outbound HTTP request, relative to the configured base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path and query (e.g., "/turbosign/documents/{id}/status")
    pub path: String,
    pub body: RequestBody,
    pub response_kind: ResponseKind,
}

/// Raw response body as read by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Vec<u8>),
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl RawResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Text(body.into()),
        }
    }

    pub fn bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: ResponseBody::Bytes(body.into()),
        }
    }
}

/// Accept a JSON-text parameter either as a string or as inline JSON.
///
/// Inline values are re-serialized so the text reaches the service as-is.
pub(crate) fn raw_json_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
