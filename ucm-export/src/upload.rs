//! Upload to the study web server, posing as a Dash upload component update.

use crate::error::{ExportError, Result};
use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use ucm_data::ExportRecord;

pub const DATA_URI_PREFIX: &str = "data:application/octet-stream;base64,";
pub const UNEXPECTED_UPLOAD_ERROR: &str = "ERROR: There was an unexpected error during upload.";
pub const PROCESSING_ERROR: &str = "ERROR: There was an error processing the upload.";
/// Non-JSON replies longer than this are not shown to the participant.
pub const MAX_PLAIN_REPLY: usize = 150;
const USER_AGENT: &str = concat!("ucm/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashProp {
    pub id: String,
    pub property: String,
    pub value: Value,
}

impl DashProp {
    fn upload_data(property: &str, value: Value) -> Self {
        Self {
            id: "upload-data".to_string(),
            property: property.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashPayload {
    pub output: String,
    pub changed_prop_ids: Vec<String>,
    pub inputs: Vec<DashProp>,
    pub state: Vec<DashProp>,
}

/// Builds the request body. Records without a timestamp are left out.
pub fn build_payload(records: &[ExportRecord]) -> DashPayload {
    let mut contents = Vec::with_capacity(records.len());
    let mut filenames = Vec::with_capacity(records.len());
    let mut last_modified = Vec::with_capacity(records.len());
    for record in records {
        let Some(time) = record.meta.time else {
            warn!(table = %record.table, "data set without timestamp not uploaded");
            continue;
        };
        contents.push(format!(
            "{DATA_URI_PREFIX}{}",
            general_purpose::STANDARD.encode(&record.payload)
        ));
        filenames.push(record.filename());
        last_modified.push(time);
    }
    DashPayload {
        output: "output-data-upload.children".to_string(),
        changed_prop_ids: vec!["upload-data.contents".to_string()],
        inputs: vec![DashProp::upload_data("contents", json!(contents))],
        state: vec![
            DashProp::upload_data("filename", json!(filenames)),
            DashProp::upload_data("last_modified", json!(last_modified)),
        ],
    }
}

/// Server route of the upload component of a task.
pub fn upload_route(task: &str) -> &'static str {
    match task {
        "Circle Task" => "/circletask/_dash-update-component",
        _ => "",
    }
}

pub fn upload_url(server_uri: &str, task: &str) -> String {
    format!("{}{}", server_uri.trim_matches('/'), upload_route(task))
}

/// Message extracted from a server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReply {
    pub message: String,
    /// Whether the reply was a JSON component update.
    pub structured: bool,
}

pub fn parse_response(text: &str) -> UploadReply {
    let Ok(json) = serde_json::from_str::<Value>(text) else {
        let message = if text.chars().count() > MAX_PLAIN_REPLY {
            UNEXPECTED_UPLOAD_ERROR.to_string()
        } else {
            text.to_string()
        };
        return UploadReply {
            message,
            structured: false,
        };
    };
    let response = &json["response"];
    // The second layout wins when both are present.
    let message = [
        &response["props"]["children"][0]["props"]["children"],
        &response["output-data-upload"]["children"][0]["props"]["children"],
    ]
    .into_iter()
    .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
    .unwrap_or(UNEXPECTED_UPLOAD_ERROR)
    .to_string();
    UploadReply {
        message,
        structured: true,
    }
}

/// Any mention of an error marks the upload as failed.
pub fn is_upload_success(message: &str) -> bool {
    !message.to_lowercase().contains("error")
}

/// Sends a request body and returns the raw reply text.
pub trait Transport: Send + Sync + 'static {
    fn post(
        &self,
        url: &str,
        payload: &DashPayload,
    ) -> impl Future<Output = Result<String>> + Send;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExportError::Response(format!("{PROCESSING_ERROR} ({e})")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn post(&self, url: &str, payload: &DashPayload) -> Result<String> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                debug!(error = %e, "upload request failed");
                ExportError::Network(url.to_string())
            })?;
        response
            .text()
            .await
            .map_err(|_| ExportError::Response(PROCESSING_ERROR.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
}

pub struct Uploader<T: Transport> {
    transport: T,
    url: String,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn upload(&self, records: &[ExportRecord]) -> UploadOutcome {
        let payload = build_payload(records);
        debug!(url = %self.url, files = payload.state[0].value.as_array().map_or(0, Vec::len), "uploading");
        let outcome = match self.transport.post(&self.url, &payload).await {
            Ok(text) => {
                let reply = parse_response(&text);
                UploadOutcome {
                    success: reply.structured && is_upload_success(&reply.message),
                    message: reply.message,
                }
            }
            Err(e) => UploadOutcome {
                success: false,
                message: e.to_string(),
            },
        };
        info!(success = outcome.success, message = %outcome.message, "upload finished");
        outcome
    }
}
