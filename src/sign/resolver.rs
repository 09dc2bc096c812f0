//! Input resolution
//!
//! Turns an input record into a [`ResolvedRequest`] for the selected operation.
//! Nothing here touches the network; recipients and fields are passed through
//! as raw JSON text and only `recipientIds` is parsed locally, because the
//! request body depends on it.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::protocol::{
    raw_json_text, DocumentOptions, FileInput, FileInputMethod, Operation, ResolvedRequest,
    SignatureRequestPayload, UploadedFile,
};
use super::record::InputRecord;
use super::report::InputError;

const DEFAULT_BINARY_PROPERTY: &str = "data";
const DEFAULT_FILE_NAME: &str = "document.pdf";
const DEFAULT_CONTENT_TYPE: &str = "application/pdf";
const EMPTY_JSON_ARRAY: &str = "[]";

fn default_binary_property() -> String {
    DEFAULT_BINARY_PROPERTY.to_string()
}

/// Parameters of one record, as supplied by the host
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordParams {
    #[serde(default)]
    file_input_method: FileInputMethod,
    /// Name of the binary property holding the upload
    #[serde(default = "default_binary_property")]
    pdf_file: String,
    #[serde(default)]
    file_link: Option<String>,
    #[serde(default)]
    deliverable_id: Option<String>,
    #[serde(default)]
    template_id: Option<String>,
    #[serde(default, deserialize_with = "raw_json_text")]
    recipients: Option<String>,
    #[serde(default, deserialize_with = "raw_json_text")]
    fields: Option<String>,
    #[serde(default)]
    additional_fields: DocumentOptions,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    void_reason: Option<String>,
    #[serde(default, deserialize_with = "raw_json_text")]
    recipient_ids: Option<String>,
}

/// Resolve the inputs of one record for `operation`
pub fn resolve(operation: Operation, record: &InputRecord) -> Result<ResolvedRequest, InputError> {
    let json = match &record.json {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    let params: RecordParams = serde_json::from_value(json)
        .map_err(|e| InputError::MalformedInput(format!("invalid parameters: {}", e)))?;
    trace!("Resolving {} with params: {:?}", operation, params);

    match operation {
        Operation::PrepareForReview => Ok(ResolvedRequest::PrepareForReview(resolve_payload(
            params, record,
        )?)),
        Operation::PrepareForSigning => Ok(ResolvedRequest::PrepareForSigning(resolve_payload(
            params, record,
        )?)),
        Operation::GetStatus => Ok(ResolvedRequest::GetStatus {
            document_id: required(params.document_id, "documentId")?,
        }),
        Operation::DownloadDocument => Ok(ResolvedRequest::DownloadDocument {
            document_id: required(params.document_id, "documentId")?,
        }),
        Operation::VoidDocument => Ok(ResolvedRequest::VoidDocument {
            document_id: required(params.document_id, "documentId")?,
            reason: required(params.void_reason, "voidReason")?,
        }),
        Operation::ResendEmail => {
            let document_id = required(params.document_id, "documentId")?;
            let raw = params
                .recipient_ids
                .unwrap_or_else(|| EMPTY_JSON_ARRAY.to_string());
            Ok(ResolvedRequest::ResendEmail {
                document_id,
                recipient_ids: parse_recipient_ids(&raw)?,
            })
        }
    }
}

fn resolve_payload(
    params: RecordParams,
    record: &InputRecord,
) -> Result<SignatureRequestPayload, InputError> {
    let file = match params.file_input_method {
        FileInputMethod::Upload => {
            let binary = record
                .binary
                .get(&params.pdf_file)
                .ok_or_else(|| InputError::MissingBinaryData(params.pdf_file.clone()))?;
            let content_type = non_empty(binary.mime_type.clone())
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
            if content_type.parse::<mime::Mime>().is_err() {
                return Err(InputError::MalformedInput(format!(
                    "invalid content type for binary '{}'",
                    params.pdf_file
                )));
            }
            FileInput::Upload(UploadedFile {
                data: binary.data.clone(),
                file_name: non_empty(binary.file_name.clone())
                    .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
                content_type,
            })
        }
        FileInputMethod::UrlLink => FileInput::UrlLink(required(params.file_link, "fileLink")?),
        FileInputMethod::Deliverable => {
            FileInput::Deliverable(required(params.deliverable_id, "deliverableId")?)
        }
        FileInputMethod::Template => {
            FileInput::Template(required(params.template_id, "templateId")?)
        }
    };
    debug!("Resolved file input: method={:?}", file.method());

    Ok(SignatureRequestPayload {
        recipients: params
            .recipients
            .unwrap_or_else(|| EMPTY_JSON_ARRAY.to_string()),
        fields: params
            .fields
            .unwrap_or_else(|| EMPTY_JSON_ARRAY.to_string()),
        options: params.additional_fields,
        file,
    })
}

/// Parse `recipientIds` into a list of strings
pub fn parse_recipient_ids(raw: &str) -> Result<Vec<String>, InputError> {
    serde_json::from_str::<Vec<String>>(raw).map_err(|e| {
        InputError::MalformedInput(format!(
            "recipientIds must be a JSON array of strings: {}",
            e
        ))
    })
}

fn required(value: Option<String>, name: &str) -> Result<String, InputError> {
    non_empty(value)
        .map(|v| v.trim().to_string())
        .ok_or_else(|| InputError::MalformedInput(format!("missing required parameter '{}'", name)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
