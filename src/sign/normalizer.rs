//! Response normalization
//!
//! Turns a raw (status, body) pair into a [`RequestOutcome`]. Failed responses
//! are run through an ordered chain of error-shape matchers; the first shape
//! that matches provides the message:
//!
//! 1. structured validation errors (`data.errors` or `errors`)
//! 2. string `error` field
//! 3. string `message` field
//!
//! and "Request failed" is used when none match.

use serde_json::{json, Value};

use super::protocol::{RawResponse, ResolvedRequest, ResponseBody};
use super::record::BinaryData;
use super::report::{ErrorReport, FieldError};

const GENERIC_FAILURE: &str = "Request failed";
const SIGNED_DOCUMENT_MIME: &str = "application/pdf";
/// Locations of a validation-error list in a failure body (JSON pointers)
const VALIDATION_ERROR_PATHS: [&str; 2] = ["/data/errors", "/errors"];
const UNKNOWN_FIELD_PATH: &str = "unknown";

/// Successful response payload
#[derive(Debug, Clone, PartialEq)]
pub enum SuccessBody {
    /// Parsed JSON body, passed through unchanged
    Json(Value),
    /// Downloaded file plus the JSON that accompanies it
    Binary { json: Value, file: BinaryData },
}

/// Result of a single request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Success(SuccessBody),
    Failure(ErrorReport),
}

impl RequestOutcome {
    pub fn into_result(self) -> Result<SuccessBody, ErrorReport> {
        match self {
            RequestOutcome::Success(body) => Ok(body),
            RequestOutcome::Failure(report) => Err(report),
        }
    }
}

/// Normalize the response to a resolved request
pub fn normalize(request: &ResolvedRequest, response: RawResponse) -> RequestOutcome {
    match request {
        ResolvedRequest::DownloadDocument { document_id } => {
            normalize_download(document_id, response)
        }
        _ => normalize_json(response),
    }
}

/// Normalize a JSON endpoint response
pub fn normalize_json(response: RawResponse) -> RequestOutcome {
    if is_failure(response.status) {
        return RequestOutcome::Failure(error_report(response));
    }

    let body = match parse_body(response.body) {
        Value::Null => json!({}),
        value => value,
    };
    RequestOutcome::Success(SuccessBody::Json(body))
}

/// Normalize a signed-document download.
///
/// The success body is opaque bytes; failures are decoded as text and
/// normalized like any JSON error.
pub fn normalize_download(document_id: &str, response: RawResponse) -> RequestOutcome {
    if is_failure(response.status) {
        return RequestOutcome::Failure(error_report(response));
    }

    let data = match response.body {
        ResponseBody::Bytes(bytes) => bytes,
        ResponseBody::Text(text) => text.into_bytes(),
    };
    let file = BinaryData::new(
        data,
        Some(signed_document_file_name(document_id)),
        Some(SIGNED_DOCUMENT_MIME.to_string()),
    );

    RequestOutcome::Success(SuccessBody::Binary {
        json: json!({ "documentId": document_id }),
        file,
    })
}

/// File name of a downloaded document; path separators in the id become `_`
pub fn signed_document_file_name(document_id: &str) -> String {
    let safe_id: String = document_id
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("signed-document-{}.pdf", safe_id)
}

fn is_failure(status: u16) -> bool {
    status >= 400
}

/// Parse a body as JSON, keeping the original text when it isn't JSON.
///
/// Binary bodies are decoded as UTF-8 first. An empty body is `Null`.
fn parse_body(body: ResponseBody) -> Value {
    let text = match body {
        ResponseBody::Text(text) => text,
        ResponseBody::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    };
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

// =============================================================================
// Error shapes
// =============================================================================

/// A recognised failure body
#[derive(Debug, Clone, PartialEq)]
enum ErrorShape {
    Validation(Vec<FieldError>),
    Message(String),
}

type ShapeMatcher = fn(&Value) -> Option<ErrorShape>;

/// Matchers in precedence order
const ERROR_SHAPES: [ShapeMatcher; 3] = [validation_errors, error_field, message_field];

fn match_error_shape(body: &Value) -> Option<ErrorShape> {
    ERROR_SHAPES.iter().find_map(|matcher| matcher(body))
}

fn validation_errors(body: &Value) -> Option<ErrorShape> {
    VALIDATION_ERROR_PATHS
        .iter()
        .filter_map(|path| body.pointer(path).and_then(Value::as_array))
        .map(|entries| field_errors(entries))
        .find(|errors| !errors.is_empty())
        .map(ErrorShape::Validation)
}

/// Entries without a string `message` are skipped
fn field_errors(entries: &[Value]) -> Vec<FieldError> {
    entries
        .iter()
        .filter_map(|entry| {
            let message = entry.get("message")?.as_str()?;
            Some(FieldError {
                path: field_path(entry.get("path")),
                message: message.to_string(),
            })
        })
        .collect()
}

fn error_field(body: &Value) -> Option<ErrorShape> {
    string_field(body, "error").map(ErrorShape::Message)
}

fn message_field(body: &Value) -> Option<ErrorShape> {
    string_field(body, "message").map(ErrorShape::Message)
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Join a validation path (`["recipients", 0, "email"]`) with dots
fn field_path(path: Option<&Value>) -> String {
    let joined = match path {
        Some(Value::Array(segments)) => segments
            .iter()
            .map(|segment| match segment {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("."),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    if joined.is_empty() {
        UNKNOWN_FIELD_PATH.to_string()
    } else {
        joined
    }
}

/// Short error code: `type`, else `code`
fn error_code(body: &Value) -> Option<String> {
    string_field(body, "type").or_else(|| string_field(body, "code"))
}

fn error_report(response: RawResponse) -> ErrorReport {
    let status = response.status;
    let body = parse_body(response.body);

    let (base, field_errors) = match match_error_shape(&body) {
        Some(ErrorShape::Validation(errors)) => {
            let joined = errors
                .iter()
                .map(FieldError::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            (joined, Some(errors))
        }
        Some(ErrorShape::Message(message)) => (message, None),
        None => (GENERIC_FAILURE.to_string(), None),
    };

    let code = error_code(&body);
    let message = match &code {
        Some(code) => format!("{} [{}]", base, code),
        None => base,
    };

    let response = match body {
        Value::Null => None,
        value => Some(value),
    };

    ErrorReport::remote(status, message, code, field_errors, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::report::ErrorKind;

    fn failure(response: RawResponse) -> ErrorReport {
        match normalize_json(response) {
            RequestOutcome::Failure(report) => report,
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors_take_precedence() {
        let body = json!({
            "type": "ValidationError",
            "message": "Validation failed",
            "data": {
                "errors": [
                    {"path": ["recipients", 0, "email"], "message": "invalid email"}
                ]
            }
        });
        let report = failure(RawResponse::text(422, body.to_string()));

        assert_eq!(
            report.message(),
            "recipients.0.email: invalid email [ValidationError]"
        );
        assert_eq!(report.http_status(), Some(422));
        assert_eq!(report.kind(), ErrorKind::RemoteValidationError);
        assert_eq!(report.code(), Some("ValidationError"));
        assert_eq!(report.field_errors().unwrap().len(), 1);
    }

    #[test]
    fn test_multiple_validation_errors_joined() {
        let body = json!({
            "errors": [
                {"path": ["fields", 1, "page"], "message": "must be >= 1"},
                {"message": "documentName is too long"}
            ]
        });
        let report = failure(RawResponse::text(400, body.to_string()));

        assert_eq!(
            report.message(),
            "fields.1.page: must be >= 1; unknown: documentName is too long"
        );
    }

    #[test]
    fn test_error_field_before_message() {
        let body = json!({"error": "Forbidden", "message": "Token lacks scope", "code": "E403"});
        let report = failure(RawResponse::text(403, body.to_string()));

        assert_eq!(report.message(), "Forbidden [E403]");
        assert_eq!(report.kind(), ErrorKind::RemoteApiError);
        assert_eq!(report.to_string(), "Forbidden [E403] (HTTP 403)");
    }

    #[test]
    fn test_message_field() {
        let report = failure(RawResponse::text(404, r#"{"message":"Document not found"}"#));
        assert_eq!(report.message(), "Document not found");
        assert_eq!(report.code(), None);
    }

    #[test]
    fn test_type_preferred_over_code() {
        let body = json!({"message": "Nope", "type": "NotFound", "code": "E404"});
        let report = failure(RawResponse::text(404, body.to_string()));
        assert_eq!(report.message(), "Nope [NotFound]");
    }

    #[test]
    fn test_non_json_body_is_kept_as_string() {
        let report = failure(RawResponse::text(502, "<html>Bad Gateway</html>"));

        assert_eq!(report.message(), "Request failed");
        assert_eq!(report.http_status(), Some(502));
        assert_eq!(
            report.response(),
            Some(&Value::String("<html>Bad Gateway</html>".to_string()))
        );
    }

    #[test]
    fn test_empty_failure_body() {
        let report = failure(RawResponse::text(500, ""));
        assert_eq!(report.to_string(), "Request failed (HTTP 500)");
        assert_eq!(report.response(), None);
    }

    #[test]
    fn test_empty_validation_list_falls_through() {
        let body = json!({"data": {"errors": []}, "message": "Invalid request"});
        let report = failure(RawResponse::text(400, body.to_string()));
        assert_eq!(report.message(), "Invalid request");
        assert_eq!(report.kind(), ErrorKind::RemoteApiError);
    }

    #[test]
    fn test_unusable_data_errors_fall_back_to_top_level_errors() {
        let body = json!({
            "data": {"errors": [{"path": ["recipients"]}]},
            "errors": [{"path": ["fields", 0, "type"], "message": "unknown field type"}]
        });
        let report = failure(RawResponse::text(422, body.to_string()));

        assert_eq!(report.message(), "fields.0.type: unknown field type");
        assert_eq!(report.kind(), ErrorKind::RemoteValidationError);
    }

    #[test]
    fn test_failed_download_with_invalid_utf8() {
        let request = ResolvedRequest::DownloadDocument {
            document_id: "abc-123".to_string(),
        };
        let outcome = normalize(
            &request,
            RawResponse::bytes(502, b"gateway \xff\xfe timeout".to_vec()),
        );

        let RequestOutcome::Failure(report) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(report.message(), "Request failed");
        assert_eq!(report.http_status(), Some(502));
        let raw = report.response().and_then(Value::as_str).unwrap();
        assert!(raw.starts_with("gateway "));
        assert!(raw.contains('\u{FFFD}'));
    }

    #[test]
    fn test_signed_document_file_name_strips_separators() {
        assert_eq!(signed_document_file_name("abc-123"), "signed-document-abc-123.pdf");
        assert_eq!(signed_document_file_name("a/b"), "signed-document-a_b.pdf");
        assert_eq!(
            signed_document_file_name("x/../..\\escape"),
            "signed-document-x_.._.._escape.pdf"
        );
    }

    #[test]
    fn test_failed_download_bytes_are_decoded() {
        let request = ResolvedRequest::DownloadDocument {
            document_id: "abc-123".to_string(),
        };
        let outcome = normalize(
            &request,
            RawResponse::bytes(409, br#"{"message":"Document is not completed"}"#.to_vec()),
        );

        let RequestOutcome::Failure(report) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(report.message(), "Document is not completed");
        assert_eq!(report.http_status(), Some(409));
    }

    #[test]
    fn test_download_success() {
        let request = ResolvedRequest::DownloadDocument {
            document_id: "abc-123".to_string(),
        };
        let outcome = normalize(&request, RawResponse::bytes(200, b"%PDF-1.7".to_vec()));

        let RequestOutcome::Success(SuccessBody::Binary { json, file }) = outcome else {
            panic!("expected binary success");
        };
        assert_eq!(json, json!({"documentId": "abc-123"}));
        assert_eq!(file.file_name.as_deref(), Some("signed-document-abc-123.pdf"));
        assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(file.data, b"%PDF-1.7".to_vec());
    }

    #[test]
    fn test_json_success_passes_body_through() {
        let body = json!({"data": {"id": "doc-1", "status": "under_review"}});
        let outcome = normalize_json(RawResponse::text(200, body.to_string()));
        assert_eq!(outcome, RequestOutcome::Success(SuccessBody::Json(body)));
    }

    #[test]
    fn test_redirect_status_is_success() {
        let outcome = normalize_json(RawResponse::text(304, ""));
        assert_eq!(outcome, RequestOutcome::Success(SuccessBody::Json(json!({}))));
    }

    #[test]
    fn test_field_path_variants() {
        assert_eq!(field_path(Some(&json!("recipients.0"))), "recipients.0");
        assert_eq!(field_path(Some(&json!([]))), "unknown");
        assert_eq!(field_path(None), "unknown");
    }
}
