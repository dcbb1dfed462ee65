use std::collections::HashMap;

use async_trait::async_trait;
use lambda_runtime::tracing;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, ExecutionContext};

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Where and as whom a status report is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseTarget {
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub physical_resource_id: String,
    pub log_stream_name: String,
}

// Only what a report needs, so a payload the handler rejects can still be
// answered.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseFields {
    #[serde(rename = "ResponseURL")]
    response_url: String,
    #[serde(default)]
    stack_id: String,
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    logical_resource_id: String,
    #[serde(default)]
    physical_resource_id: Option<String>,
}

impl ResponseTarget {
    /// Returns `None` for invocations that did not come from CloudFormation.
    pub fn from_payload(payload: &Value, ctx: &impl ExecutionContext) -> Option<Self> {
        let fields = ResponseFields::deserialize(payload).ok()?;
        let log_stream_name = ctx.log_stream_name().to_owned();

        Some(Self {
            response_url: fields.response_url,
            stack_id: fields.stack_id,
            request_id: fields.request_id,
            logical_resource_id: fields.logical_resource_id,
            physical_resource_id: fields
                .physical_resource_id
                .unwrap_or_else(|| log_stream_name.clone()),
            log_stream_name,
        })
    }

    fn body(&self, status: ResponseStatus) -> ResponseBody<'_> {
        ResponseBody {
            status,
            reason: format!(
                "See the details in CloudWatch Log Stream: {}",
                self.log_stream_name
            ),
            physical_resource_id: &self.physical_resource_id,
            stack_id: &self.stack_id,
            request_id: &self.request_id,
            logical_resource_id: &self.logical_resource_id,
            no_echo: false,
            data: HashMap::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseBody<'a> {
    status: ResponseStatus,
    reason: String,
    physical_resource_id: &'a str,
    stack_id: &'a str,
    request_id: &'a str,
    logical_resource_id: &'a str,
    no_echo: bool,
    data: HashMap<String, String>,
}

#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, target: &ResponseTarget, status: ResponseStatus) -> Result<(), Error>;
}

/// Reports custom-resource status by uploading the response document to the
/// pre-signed `ResponseURL`.
#[derive(Clone, Default)]
pub struct CfnResponder {
    http: HttpClient,
}

impl CfnResponder {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl StatusReporter for CfnResponder {
    async fn report(&self, target: &ResponseTarget, status: ResponseStatus) -> Result<(), Error> {
        let body = serde_json::to_vec(&target.body(status))
            .map_err(|e| Error::io("serializing custom resource response", e))?;

        // The pre-signed URL is signed with an empty content type.
        let resp = self
            .http
            .put(&target.response_url)
            .header("content-type", "")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::io("sending custom resource response", e))?;

        if let Err(e) = resp.error_for_status_ref() {
            return Err(Error::io("custom resource response rejected", e));
        }

        tracing::info!("reported {status} for {}", target.logical_resource_id);
        Ok(())
    }
}
