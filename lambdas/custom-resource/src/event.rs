use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lambda_runtime::Context;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// A CloudFormation custom-resource request.
///
/// `ResponseURL` is optional so that the same handler can also be driven by
/// plain invocations (schedules, manual test events) which expect no report.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent<P> {
    pub request_type: RequestType,
    pub resource_properties: P,
    #[serde(rename = "ResponseURL", default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
}

/// What a handler needs to know about the running invocation.
pub trait ExecutionContext {
    /// Time left before the platform forcibly terminates the invocation.
    fn remaining_time(&self) -> Duration;

    /// Identity reported back to CloudFormation.
    fn log_stream_name(&self) -> &str;
}

impl ExecutionContext for Context {
    fn remaining_time(&self) -> Duration {
        let deadline = UNIX_EPOCH + Duration::from_millis(self.deadline);
        deadline
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    fn log_stream_name(&self) -> &str {
        &self.env_config.log_stream
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_cloudformation_request() {
        let event: CustomResourceEvent<serde_json::Value> = serde_json::from_value(json!({
            "RequestType": "Delete",
            "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:copy",
            "ResponseURL": "https://cloudformation-custom-resource-response.example/abc",
            "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/demo/1",
            "RequestId": "req-1",
            "LogicalResourceId": "CopyZips",
            "PhysicalResourceId": "phys-1",
            "ResourceType": "Custom::CopyZips",
            "ResourceProperties": { "DestBucket": "bucket" }
        }))
        .unwrap();

        assert_eq!(event.request_type, RequestType::Delete);
        assert_eq!(
            event.response_url.as_deref(),
            Some("https://cloudformation-custom-resource-response.example/abc")
        );
        assert_eq!(event.logical_resource_id, "CopyZips");
        assert_eq!(event.physical_resource_id.as_deref(), Some("phys-1"));
        assert_eq!(event.resource_properties["DestBucket"], "bucket");
    }

    #[test]
    fn response_url_is_optional() {
        let event: CustomResourceEvent<serde_json::Value> = serde_json::from_value(json!({
            "RequestType": "Create",
            "ResourceProperties": {}
        }))
        .unwrap();

        assert!(event.response_url.is_none());
        assert!(event.physical_resource_id.is_none());
    }

    #[test]
    fn rejects_unknown_request_type() {
        let parsed = serde_json::from_value::<CustomResourceEvent<serde_json::Value>>(json!({
            "RequestType": "Rollback",
            "ResourceProperties": {}
        }));

        assert!(parsed.is_err());
    }
}
