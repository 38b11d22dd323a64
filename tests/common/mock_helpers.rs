//! In-memory collaborators for integration tests

use super::builders::{scalar, FieldBuilder};
use aggregation_builder::error::{BuilderError, Result};
use aggregation_builder::preview::{AggregationRequest, AggregationResponse, PreviewSource};
use aggregation_builder::schema::{IntrospectionSource, MetadataEntry, SchemaSource};
use aggregation_builder::{FieldDescriptor, FieldMeta};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Task/User/Comment schema where User and Task reference each other.
pub fn task_schema() -> IntrospectionSource {
    IntrospectionSource::new()
        .with_type(
            "Task",
            vec![
                FieldBuilder::scalar("id").type_name("ID").build(),
                FieldBuilder::scalar("project_id").type_name("ID").build(),
                scalar("status"),
                FieldBuilder::scalar("amount").type_name("Float").build(),
                FieldBuilder::object("assignee", "User").build(),
                FieldBuilder::list_of_objects("comments", "Comment").build(),
            ],
        )
        .with_type(
            "User",
            vec![
                scalar("name"),
                scalar("email"),
                FieldBuilder::list_of_objects("tasks", "Task").build(),
            ],
        )
        .with_type(
            "Comment",
            vec![scalar("body"), FieldBuilder::object("author", "User").build()],
        )
        .with_metadata(
            "Task",
            vec![MetadataEntry::new(
                "status",
                FieldMeta {
                    label: Some("Status".into()),
                    ..Default::default()
                },
            )],
        )
}

/// Schema source wrapper that counts fetches and fails for chosen types.
pub struct FlakySchemaSource<S> {
    inner: S,
    failing: HashSet<String>,
    failing_metadata: HashSet<String>,
    fetches: AtomicUsize,
}

impl<S: SchemaSource> FlakySchemaSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
            failing_metadata: HashSet::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, type_name: &str) -> Self {
        self.failing.insert(type_name.to_string());
        self
    }

    pub fn failing_metadata(mut self, resource_id: &str) -> Self {
        self.failing_metadata.insert(resource_id.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl<S: SchemaSource> SchemaSource for FlakySchemaSource<S> {
    fn get_fields(&self, type_name: &str) -> Result<Vec<FieldDescriptor>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(type_name) {
            return Err(BuilderError::schema_fetch(type_name, "connection reset"));
        }
        self.inner.get_fields(type_name)
    }

    fn get_metadata(&self, resource_id: &str) -> Result<Vec<MetadataEntry>> {
        if self.failing_metadata.contains(resource_id) {
            return Err(BuilderError::schema_fetch(resource_id, "metadata unavailable"));
        }
        self.inner.get_metadata(resource_id)
    }
}

/// Preview source returning a canned response and recording requests.
#[derive(Default)]
pub struct RecordingPreviewSource {
    response: Mutex<Option<Result<AggregationResponse>>>,
    requests: Mutex<Vec<(String, AggregationRequest)>>,
}

impl RecordingPreviewSource {
    pub fn responding(response: AggregationResponse) -> Self {
        let source = Self::default();
        *source.response.lock().unwrap() = Some(Ok(response));
        source
    }

    pub fn failing(message: &str) -> Self {
        let source = Self::default();
        *source.response.lock().unwrap() =
            Some(Err(BuilderError::PreviewExecution(message.to_string())));
        source
    }

    pub fn requests(&self) -> Vec<(String, AggregationRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

impl PreviewSource for RecordingPreviewSource {
    fn run_aggregation(
        &self,
        resource_id: &str,
        request: &AggregationRequest,
    ) -> Result<AggregationResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((resource_id.to_string(), request.clone()));
        match self.response.lock().unwrap().as_ref() {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(e)) => Err(BuilderError::PreviewExecution(e.root_message())),
            None => Ok(AggregationResponse::default()),
        }
    }
}
