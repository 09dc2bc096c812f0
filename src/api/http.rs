//! TurboSign HTTP transport
//!
//! Sends [`ApiRequest`]s with bearer authentication and the organization
//! header. Non-success statuses are returned as ordinary responses and left
//! to the normalizer; only failures below the HTTP layer become errors.

use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::credentials::Credentials;
use crate::sign::protocol::{
    ApiRequest, FormPart, RawResponse, RequestBody, ResponseBody, ResponseKind,
};

/// Organization header expected by the TurboDocx API
pub const ORG_ID_HEADER: &str = "x-rapiddocx-org-id";
/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const JSON_ACCEPT: &str = "application/json";
const BINARY_ACCEPT: &str = "application/pdf, application/octet-stream, */*";

/// Network or connection failure (no HTTP status available)
#[derive(Debug, Error)]
#[error("Transport error: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        Self { message }
    }
}

/// Sends one request and returns the raw status and body
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

/// Mask sensitive credential values for logging
pub fn mask_credential(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// First `max` characters of a body, for logs
fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Options for building the HTTP client
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// TurboSign HTTP client.
///
/// Holds the credential bundle and base URL for the lifetime of a batch and is
/// never mutated while requests are in flight.
pub struct TurboSignHttpClient {
    http_client: Client,
    credentials: Credentials,
}

impl TurboSignHttpClient {
    /// Create a new TurboSign HTTP client
    pub fn new(credentials: Credentials, options: &HttpOptions) -> Result<Self> {
        debug!(
            "Creating TurboSign HTTP client for base_url: {}, api_key: {}, org_id: {}",
            credentials.base_url,
            mask_credential(&credentials.api_key),
            credentials.org_id
        );
        let http_client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.base_url, path)
    }
}

impl Transport for TurboSignHttpClient {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let url = self.url(&request.path);
        debug!("TurboSign request: method={}, url={}", request.method, url);

        let accept = match request.response_kind {
            ResponseKind::Json => JSON_ACCEPT,
            ResponseKind::Binary => BINARY_ACCEPT,
        };

        let mut builder = self
            .http_client
            .request(request.method.clone(), &url)
            .bearer_auth(&self.credentials.api_key)
            .header(ORG_ID_HEADER, &self.credentials.org_id)
            .header(ACCEPT, accept);

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => {
                trace!("JSON body: {}", body);
                builder.json(body)
            }
            RequestBody::Multipart(parts) => {
                trace!(
                    "Multipart fields: {:?}",
                    parts.iter().map(FormPart::name).collect::<Vec<_>>()
                );
                builder.multipart(multipart_form(parts)?)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        debug!("Response status: {}", status);

        let body = match request.response_kind {
            ResponseKind::Json => {
                let text = response.text().await?;
                trace!(
                    "Response body (first 2000 chars): {}",
                    preview(&text, 2000)
                );
                if !status.is_success() {
                    warn!(
                        "TurboSign request failed: status={}, body={}",
                        status,
                        preview(&text, 500)
                    );
                }
                ResponseBody::Text(text)
            }
            ResponseKind::Binary => {
                let bytes = response.bytes().await?;
                trace!("Response body: {} bytes", bytes.len());
                if !status.is_success() {
                    warn!(
                        "TurboSign download failed: status={}, body={}",
                        status,
                        preview(&String::from_utf8_lossy(&bytes), 500)
                    );
                }
                ResponseBody::Bytes(bytes.to_vec())
            }
        };

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn multipart_form(parts: &[FormPart]) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(*name, value.clone()),
            FormPart::File { name, file } => {
                let file_part = Part::bytes(file.data.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.content_type)?;
                form.part(*name, file_part)
            }
        };
    }
    Ok(form)
}
