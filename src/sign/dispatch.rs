//! Operation dispatcher
//!
//! Runs Resolver -> Builder -> transport -> Normalizer once per input record,
//! strictly in order. With `continue_on_fail` a failing record becomes an
//! error-shaped output record; otherwise the first failure ends the batch.

use thiserror::Error;
use tracing::{debug, warn};

use super::builder::build_request;
use super::normalizer::{normalize, SuccessBody};
use super::protocol::Operation;
use super::record::{InputRecord, OutputRecord};
use super::report::ErrorReport;
use super::resolver::resolve;
use crate::api::http::Transport;

/// Batch-level dispatch settings
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Emit an error record and keep going instead of aborting the batch
    pub continue_on_fail: bool,
}

/// Terminal failure of a batch, tagged with the failing record's index
#[derive(Debug, Error)]
#[error("Record {index} failed: {report}")]
pub struct BatchError {
    pub index: usize,
    pub report: ErrorReport,
}

impl BatchError {
    pub fn hint(&self) -> &str {
        self.report.hint()
    }
}

pub struct Dispatcher<'a, T> {
    transport: &'a T,
    operation: Operation,
    options: DispatchOptions,
}

impl<'a, T: Transport> Dispatcher<'a, T> {
    pub fn new(transport: &'a T, operation: Operation, options: DispatchOptions) -> Self {
        Self {
            transport,
            operation,
            options,
        }
    }

    /// Process every record; output order matches input order
    pub async fn run(&self, records: &[InputRecord]) -> Result<Vec<OutputRecord>, BatchError> {
        debug!(
            "Dispatching {} record(s) for operation {}",
            records.len(),
            self.operation
        );
        let mut output = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            match self.process(record).await {
                Ok(SuccessBody::Json(json)) => output.push(OutputRecord::json(json, index)),
                Ok(SuccessBody::Binary { json, file }) => {
                    output.push(OutputRecord::binary(json, file, index))
                }
                Err(report) => {
                    let stage = if report.kind().is_local() {
                        "rejected before sending"
                    } else {
                        "failed"
                    };
                    if !self.options.continue_on_fail {
                        warn!("Record {} {}, aborting batch: {}", index, stage, report);
                        return Err(BatchError { index, report });
                    }
                    warn!("Record {} {}, continuing: {}", index, stage, report);
                    output.push(OutputRecord::failure(&report, index));
                }
            }
        }

        Ok(output)
    }

    /// Run the pipeline for a single record
    pub async fn process(&self, record: &InputRecord) -> Result<SuccessBody, ErrorReport> {
        let resolved = resolve(self.operation, record)?;
        debug!(
            "Resolved {} (document_id={:?})",
            resolved.operation(),
            resolved.document_id()
        );
        let request = build_request(&resolved);
        let response = self.transport.send(&request).await?;
        normalize(&resolved, response).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::http::TransportError;
    use crate::sign::protocol::{ApiRequest, RawResponse};
    use crate::sign::record::BinaryData;
    use crate::sign::report::ErrorKind;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request it receives
    #[derive(Default)]
    struct StubTransport {
        responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl StubTransport {
        fn with(responses: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request")
        }
    }

    fn status_record(document_id: &str) -> InputRecord {
        InputRecord::new(json!({ "documentId": document_id }))
    }

    #[tokio::test]
    async fn test_continue_on_fail_keeps_order() {
        let transport = StubTransport::with(vec![
            Ok(RawResponse::text(404, r#"{"message":"Document not found"}"#)),
            Ok(RawResponse::text(200, r#"{"data":{"status":"completed"}}"#)),
        ]);
        let dispatcher = Dispatcher::new(
            &transport,
            Operation::GetStatus,
            DispatchOptions {
                continue_on_fail: true,
            },
        );

        let output = dispatcher
            .run(&[status_record("missing"), status_record("doc-2")])
            .await
            .unwrap();

        assert_eq!(output.len(), 2);
        assert!(output[0].is_error());
        assert_eq!(output[0].json["error"], "Document not found (HTTP 404)");
        assert_eq!(output[0].json["statusCode"], 404);
        assert_eq!(output[0].paired_item, 0);
        assert_eq!(output[1].json, json!({"data": {"status": "completed"}}));
        assert_eq!(output[1].paired_item, 1);
    }

    #[tokio::test]
    async fn test_abort_stops_before_next_request() {
        let transport = StubTransport::with(vec![Ok(RawResponse::text(
            404,
            r#"{"message":"Document not found"}"#,
        ))]);
        let dispatcher = Dispatcher::new(&transport, Operation::GetStatus, DispatchOptions::default());

        let err = dispatcher
            .run(&[status_record("missing"), status_record("doc-2")])
            .await
            .unwrap_err();

        assert_eq!(err.index, 0);
        assert_eq!(err.report.http_status(), Some(404));
        assert_eq!(err.hint(), "Document not found");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_input_makes_no_request() {
        let transport = StubTransport::default();
        let dispatcher = Dispatcher::new(&transport, Operation::ResendEmail, DispatchOptions::default());
        let record = InputRecord::new(json!({"documentId": "doc-1", "recipientIds": "[a,b]"}));

        let err = dispatcher.run(&[record]).await.unwrap_err();

        assert_eq!(err.report.kind(), ErrorKind::MalformedInput);
        assert_eq!(err.report.http_status(), None);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_upload_content_type_makes_no_request() {
        let transport = StubTransport::default();
        let dispatcher = Dispatcher::new(&transport, Operation::PrepareForReview, DispatchOptions::default());
        let record = InputRecord::new(json!({})).with_binary(
            "data",
            BinaryData::new(b"%PDF".to_vec(), None, Some("not a mime".to_string())),
        );

        let err = dispatcher.run(&[record]).await.unwrap_err();

        assert_eq!(err.report.kind(), ErrorKind::MalformedInput);
        assert_eq!(
            err.report.message(),
            "Malformed input: invalid content type for binary 'data'"
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_local_error_isolated_per_record() {
        let transport = StubTransport::with(vec![Ok(RawResponse::text(
            200,
            r#"{"success":true}"#,
        ))]);
        let dispatcher = Dispatcher::new(
            &transport,
            Operation::VoidDocument,
            DispatchOptions {
                continue_on_fail: true,
            },
        );
        let records = [
            InputRecord::new(json!({"documentId": "doc-1"})),
            InputRecord::new(json!({"documentId": "doc-2", "voidReason": "Duplicate"})),
        ];

        let output = dispatcher.run(&records).await.unwrap();

        assert!(output[0].is_error());
        assert!(output[0].json.get("statusCode").is_none());
        assert_eq!(output[1].json, json!({"success": true}));
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(
            transport.requests()[0].path,
            "/turbosign/documents/doc-2/void"
        );
    }

    #[tokio::test]
    async fn test_transport_error_has_no_status() {
        let transport = StubTransport::with(vec![Err(TransportError::new("connection reset"))]);
        let dispatcher = Dispatcher::new(&transport, Operation::GetStatus, DispatchOptions::default());

        let err = dispatcher.run(&[status_record("doc-1")]).await.unwrap_err();

        assert_eq!(err.report.kind(), ErrorKind::TransportError);
        assert_eq!(err.report.http_status(), None);
    }

    #[tokio::test]
    async fn test_download_produces_binary_record() {
        let transport = StubTransport::with(vec![Ok(RawResponse::bytes(200, b"%PDF-1.7".to_vec()))]);
        let dispatcher = Dispatcher::new(
            &transport,
            Operation::DownloadDocument,
            DispatchOptions::default(),
        );

        let output = dispatcher.run(&[status_record("abc-123")]).await.unwrap();

        assert_eq!(output[0].json, json!({"documentId": "abc-123"}));
        let binary = output[0].binary.as_ref().unwrap();
        assert_eq!(binary.file_name.as_deref(), Some("signed-document-abc-123.pdf"));
        assert_eq!(binary.mime_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_status_is_idempotent() {
        let body = r#"{"data":{"id":"doc-1","status":"pending"}}"#;
        let transport = StubTransport::with(vec![
            Ok(RawResponse::text(200, body)),
            Ok(RawResponse::text(200, body)),
        ]);
        let dispatcher = Dispatcher::new(&transport, Operation::GetStatus, DispatchOptions::default());

        let first = dispatcher.process(&status_record("doc-1")).await.unwrap();
        let second = dispatcher.process(&status_record("doc-1")).await.unwrap();

        assert_eq!(first, second);
    }
}
