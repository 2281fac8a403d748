//! Provider request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadIntentRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
}

/// Ephemeral upload slot granted by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadIntent {
    pub upload_url: String,
    /// Form fields to post alongside the file
    pub fields: BTreeMap<String, String>,
    /// URI to reference the uploaded image in a generation request
    pub runway_uri: String,
}

/// Partially-typed view used to report which field is missing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawUploadIntent {
    pub upload_url: Option<String>,
    pub fields: Option<BTreeMap<String, String>>,
    pub runway_uri: Option<String>,
}

impl RawUploadIntent {
    pub fn into_intent(self) -> GenerationResult<UploadIntent> {
        match (self.upload_url, self.fields, self.runway_uri) {
            (Some(upload_url), Some(fields), Some(runway_uri)) => Ok(UploadIntent {
                upload_url,
                fields,
                runway_uri,
            }),
            _ => Err(GenerationError::provider(
                "Upload intent missing uploadUrl/fields/runwayUri",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageToVideoRequest<'a> {
    pub model: &'a str,
    pub prompt_image: &'a str,
    pub prompt_text: &'a str,
    pub duration: u32,
    pub ratio: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTaskResponse {
    pub id: Option<String>,
}

/// Where a task stands, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Succeeded,
    Failed,
    /// Anything else, e.g. `PENDING`, `RUNNING`, `THROTTLED`
    Pending(String),
}

impl TaskState {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "succeeded" => TaskState::Succeeded,
            "failed" => TaskState::Failed,
            other => TaskState::Pending(other.to_string()),
        }
    }
}

/// One entry of a task's `output` array.
///
/// Providers have returned both bare URL strings and `{ "url": … }` objects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TaskOutput {
    Inline(String),
    Wrapped { url: String },
}

impl TaskOutput {
    pub fn url(&self) -> &str {
        match self {
            TaskOutput::Inline(url) => url,
            TaskOutput::Wrapped { url } => url,
        }
    }
}

/// A polled task with its raw payload kept for error reporting.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub id: String,
    pub state: TaskState,
    pub payload: serde_json::Value,
}

impl TaskStatus {
    pub fn from_payload(id: impl Into<String>, payload: serde_json::Value) -> Self {
        let state = TaskState::parse(
            payload
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or_default(),
        );
        Self {
            id: id.into(),
            state,
            payload,
        }
    }

    /// URL of the first output artifact.
    pub fn output_url(&self) -> GenerationResult<String> {
        let output = self
            .payload
            .get("output")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let entries: Vec<TaskOutput> = serde_json::from_value(output.clone())
            .map_err(|_| GenerationError::malformed(format!("unexpected output: {}", output)))?;

        entries
            .into_iter()
            .next()
            .map(|o| o.url().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                GenerationError::malformed(format!("No output URL in payload: {}", output))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_state_is_case_insensitive() {
        assert_eq!(TaskState::parse("SUCCEEDED"), TaskState::Succeeded);
        assert_eq!(TaskState::parse("failed"), TaskState::Failed);
        assert_eq!(TaskState::parse("RUNNING"), TaskState::Pending("running".into()));
        assert_eq!(TaskState::parse(""), TaskState::Pending(String::new()));
    }

    #[test]
    fn test_output_url_accepts_both_shapes() {
        let inline = TaskStatus::from_payload(
            "t",
            json!({"status": "SUCCEEDED", "output": ["https://cdn.example.com/v.mp4"]}),
        );
        assert_eq!(inline.output_url().unwrap(), "https://cdn.example.com/v.mp4");

        let wrapped = TaskStatus::from_payload(
            "t",
            json!({"status": "SUCCEEDED", "output": [{"url": "https://cdn.example.com/w.mp4"}]}),
        );
        assert_eq!(wrapped.output_url().unwrap(), "https://cdn.example.com/w.mp4");
    }

    #[test]
    fn test_output_url_malformed() {
        for payload in [
            json!({"status": "SUCCEEDED"}),
            json!({"status": "SUCCEEDED", "output": []}),
            json!({"status": "SUCCEEDED", "output": [42]}),
            json!({"status": "SUCCEEDED", "output": "https://not-an-array"}),
        ] {
            let status = TaskStatus::from_payload("t", payload);
            assert!(matches!(status.output_url(), Err(GenerationError::MalformedResponse(_))));
        }
    }

    #[test]
    fn test_upload_intent_requires_all_fields() {
        let raw: RawUploadIntent = serde_json::from_value(json!({
            "uploadUrl": "https://bucket.example.com",
            "fields": {"key": "abc"}
        }))
        .unwrap();
        assert!(matches!(raw.into_intent(), Err(GenerationError::Provider(_))));
    }

    #[test]
    fn test_image_to_video_request_wire_format() {
        let body = serde_json::to_value(ImageToVideoRequest {
            model: "gen4_turbo",
            prompt_image: "runway://upload/1",
            prompt_text: "wave",
            duration: 4,
            ratio: "9:16",
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gen4_turbo",
                "promptImage": "runway://upload/1",
                "promptText": "wave",
                "duration": 4,
                "ratio": "9:16"
            })
        );
    }
}
