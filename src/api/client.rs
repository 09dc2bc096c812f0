//! TurboSign client
//!
//! Immutable per-batch context: credentials and HTTP transport are resolved
//! once and shared read-only by every record of the batch.

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use super::credentials::{load_credentials, Credentials};
use super::http::{HttpOptions, Transport, TurboSignHttpClient};
use crate::sign::builder::credential_test_request;
use crate::sign::normalizer::{normalize_json, SuccessBody};
use crate::sign::{BatchError, DispatchOptions, Dispatcher, ErrorReport, InputRecord, Operation, OutputRecord};

pub struct TurboSignClient {
    pub http: TurboSignHttpClient,
}

impl TurboSignClient {
    /// Create a client from an explicit credential bundle
    pub fn new(credentials: Credentials, options: &HttpOptions) -> Result<Self> {
        let http = TurboSignHttpClient::new(credentials, options)?;
        Ok(Self { http })
    }

    /// Create a client from a stored profile, optionally overriding its base URL
    pub fn from_profile(
        profile: &str,
        base_url: Option<&str>,
        options: &HttpOptions,
    ) -> Result<Self> {
        let mut credentials = load_credentials(profile)?;
        if let Some(url) = base_url {
            credentials = credentials.with_base_url(url);
        }
        Self::new(credentials, options)
    }

    /// Validate the stored credentials with a one-item document listing
    pub async fn verify_credentials(&self) -> Result<Value, ErrorReport> {
        debug!("Verifying credentials against {}", self.http.base_url());
        let response = self.http.send(&credential_test_request()).await?;
        match normalize_json(response).into_result()? {
            SuccessBody::Json(json) | SuccessBody::Binary { json, .. } => Ok(json),
        }
    }

    /// Run `operation` over a batch of records
    pub async fn run_batch(
        &self,
        operation: Operation,
        records: &[InputRecord],
        options: DispatchOptions,
    ) -> Result<Vec<OutputRecord>, BatchError> {
        Dispatcher::new(&self.http, operation, options)
            .run(records)
            .await
    }
}
