//! Input and output records exchanged with the hosting workflow engine

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::report::ErrorReport;

/// Binary payload attached to a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    #[serde(skip)]
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub file_size: usize,
}

impl BinaryData {
    pub fn new(data: Vec<u8>, file_name: Option<String>, mime_type: Option<String>) -> Self {
        let file_size = data.len();
        Self {
            data,
            file_name,
            mime_type,
            file_size,
        }
    }
}

/// One input item: operation parameters plus named binary attachments
#[derive(Debug, Clone, Default)]
pub struct InputRecord {
    pub json: Value,
    pub binary: HashMap<String, BinaryData>,
}

impl InputRecord {
    pub fn new(json: Value) -> Self {
        Self {
            json,
            binary: HashMap::new(),
        }
    }

    pub fn with_binary(mut self, property: impl Into<String>, data: BinaryData) -> Self {
        self.binary.insert(property.into(), data);
        self
    }
}

/// One output item, paired with the index of the input record that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub json: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinaryData>,
    pub paired_item: usize,
}

impl OutputRecord {
    pub fn json(json: Value, paired_item: usize) -> Self {
        Self {
            json,
            binary: None,
            paired_item,
        }
    }

    pub fn binary(json: Value, binary: BinaryData, paired_item: usize) -> Self {
        Self {
            json,
            binary: Some(binary),
            paired_item,
        }
    }

    /// Error-shaped record emitted when failures are isolated per record
    pub fn failure(report: &ErrorReport, paired_item: usize) -> Self {
        let mut json = Map::new();
        json.insert("error".to_string(), json!(report.to_string()));
        if let Some(status) = report.http_status() {
            json.insert("statusCode".to_string(), json!(status));
        }
        if let Some(code) = report.code() {
            json.insert("code".to_string(), json!(code));
        }
        if let Some(response) = report.response() {
            json.insert("response".to_string(), response.clone());
        }
        Self::json(Value::Object(json), paired_item)
    }

    pub fn is_error(&self) -> bool {
        self.json.get("error").is_some()
    }
}
