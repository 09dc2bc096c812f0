//! Request building
//!
//! Maps a [`ResolvedRequest`] to the single [`ApiRequest`] the service expects:
//! - prepare operations: POST multipart with recipients, fields, document
//!   options and exactly one file input part
//! - document operations: GET or POST on `/turbosign/documents/{id}/...`,
//!   with a JSON body where the endpoint takes one

use reqwest::Method;
use serde_json::json;

use super::protocol::{
    ApiRequest, FileInput, FormPart, RequestBody, ResolvedRequest, ResponseKind,
    SignatureRequestPayload,
};

const PREPARE_FOR_REVIEW_PATH: &str = "/turbosign/single/prepare-for-review";
const PREPARE_FOR_SIGNING_PATH: &str = "/turbosign/single/prepare-for-signing";
const CREDENTIAL_TEST_PATH: &str = "/turbosign/documents/signature-documents?limit=1";

/// Build the outbound request for one resolved record
pub fn build_request(resolved: &ResolvedRequest) -> ApiRequest {
    match resolved {
        ResolvedRequest::PrepareForReview(payload) => {
            prepare_request(PREPARE_FOR_REVIEW_PATH, payload)
        }
        ResolvedRequest::PrepareForSigning(payload) => {
            prepare_request(PREPARE_FOR_SIGNING_PATH, payload)
        }
        ResolvedRequest::GetStatus { document_id } => ApiRequest {
            method: Method::GET,
            path: document_path(document_id, "status"),
            body: RequestBody::Empty,
            response_kind: ResponseKind::Json,
        },
        ResolvedRequest::DownloadDocument { document_id } => ApiRequest {
            method: Method::GET,
            path: document_path(document_id, "download"),
            body: RequestBody::Empty,
            response_kind: ResponseKind::Binary,
        },
        ResolvedRequest::VoidDocument {
            document_id,
            reason,
        } => ApiRequest {
            method: Method::POST,
            path: document_path(document_id, "void"),
            body: RequestBody::Json(json!({ "reason": reason })),
            response_kind: ResponseKind::Json,
        },
        ResolvedRequest::ResendEmail {
            document_id,
            recipient_ids,
        } => ApiRequest {
            method: Method::POST,
            path: document_path(document_id, "resend-email"),
            body: RequestBody::Json(json!({ "recipientIds": recipient_ids })),
            response_kind: ResponseKind::Json,
        },
    }
}

/// Lightweight authenticated call used to validate stored credentials
pub fn credential_test_request() -> ApiRequest {
    ApiRequest {
        method: Method::GET,
        path: CREDENTIAL_TEST_PATH.to_string(),
        body: RequestBody::Empty,
        response_kind: ResponseKind::Json,
    }
}

fn prepare_request(path: &str, payload: &SignatureRequestPayload) -> ApiRequest {
    ApiRequest {
        method: Method::POST,
        path: path.to_string(),
        body: RequestBody::Multipart(form_parts(payload)),
        response_kind: ResponseKind::Json,
    }
}

fn form_parts(payload: &SignatureRequestPayload) -> Vec<FormPart> {
    let mut parts = vec![
        FormPart::Text {
            name: "recipients",
            value: payload.recipients.clone(),
        },
        FormPart::Text {
            name: "fields",
            value: payload.fields.clone(),
        },
    ];

    for (name, value) in payload.options.fields() {
        parts.push(FormPart::Text {
            name,
            value: value.to_string(),
        });
    }

    let name = payload.file.field_name();
    parts.push(match &payload.file {
        FileInput::Upload(file) => FormPart::File {
            name,
            file: file.clone(),
        },
        FileInput::UrlLink(value) | FileInput::Deliverable(value) | FileInput::Template(value) => {
            FormPart::Text {
                name,
                value: value.clone(),
            }
        }
    });

    parts
}

fn document_path(document_id: &str, action: &str) -> String {
    format!(
        "/turbosign/documents/{}/{}",
        urlencoding::encode(document_id),
        action
    )
}
