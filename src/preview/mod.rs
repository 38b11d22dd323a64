//! Live aggregation preview.
//!
//! The preview runs the stages marked `preview: true` against the backend
//! and shows the result as pretty-printed JSON. The request itself is
//! delegated to a [`PreviewSource`]; this module only builds requests,
//! debounces them and renders replies.

pub mod coordinator;

pub use coordinator::{
    spawn_preview_worker, PreviewCoordinator, PreviewJob, PreviewReply, PreviewWorker,
};

use crate::error::Result;
use crate::pipeline::PipelineStage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of an aggregation preview request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequest {
    /// Stages taking part in the preview, in pipeline order
    pub pipeline: Vec<PipelineStage>,
    /// Top-level names of the initial fields
    pub source_fields: Vec<String>,
}

impl AggregationRequest {
    /// Build a request from the stages flagged for preview. CUSTOM stages
    /// send their last valid payload.
    pub fn from_stages(stages: &[PipelineStage], source_fields: Vec<String>) -> Self {
        Self {
            pipeline: stages
                .iter()
                .filter(|s| s.preview)
                .map(PipelineStage::committed)
                .collect(),
            source_fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewError {
    pub message: String,
}

/// Result of an aggregation preview request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregationResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<PreviewError>,
}

/// Executes aggregation previews.
#[cfg_attr(test, mockall::automock)]
pub trait PreviewSource: Send + Sync {
    fn run_aggregation(
        &self,
        resource_id: &str,
        request: &AggregationRequest,
    ) -> Result<AggregationResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CustomForm, StageForm, StageId, StageType};
    use serde_json::json;

    #[test]
    fn test_request_keeps_preview_stages_only() {
        let mut sort = PipelineStage::with_defaults(StageId(0), StageType::Sort);
        sort.preview = true;
        let filter = PipelineStage::with_defaults(StageId(1), StageType::Filter);
        let mut group = PipelineStage::with_defaults(StageId(2), StageType::Group);
        group.preview = true;

        let request =
            AggregationRequest::from_stages(&[sort, filter, group], vec!["status".into()]);
        let ids: Vec<_> = request.pipeline.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![StageId(0), StageId(2)]);
    }

    #[test]
    fn test_request_sends_last_valid_custom_payload() {
        let mut custom = CustomForm::new(r#"{"$limit":5}"#);
        custom.format().unwrap();
        let mut edited = CustomForm::new("{\"$limit\": ");
        edited.inherit_payload(&custom);

        let mut stage = PipelineStage::new(StageId(0), StageForm::Custom(edited));
        stage.preview = true;
        let request = AggregationRequest::from_stages(&[stage], vec![]);

        let StageForm::Custom(sent) = &request.pipeline[0].form else {
            panic!("expected custom stage");
        };
        assert_eq!(sent.raw, "{\n  \"$limit\": 5\n}");
    }

    #[test]
    fn test_request_wire_shape() {
        let request = AggregationRequest {
            pipeline: vec![PipelineStage::new(
                StageId(1),
                StageForm::default_for(StageType::Unwind),
            )],
            source_fields: vec!["tags".into()],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["sourceFields"], json!(["tags"]));
        assert_eq!(value["pipeline"][0]["type"], "UNWIND");
    }

    #[test]
    fn test_response_defaults() {
        let response: AggregationResponse = serde_json::from_str(r#"{"items": [1]}"#).unwrap();
        assert_eq!(response.items, vec![json!(1)]);
        assert!(response.errors.is_empty());
    }
}
