use super::{AggregationRequest, AggregationResponse, PreviewSource};
use crate::backend::FetchWorker;
use crate::config::{DebounceSettings, PreviewSettings};
use crate::error::Result;
use crate::pipeline::{
    ControllerBridge, ControllerEvent, Debouncer, Generation, PipelineStage, Subscribers,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// A preview request ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewJob {
    pub generation: Generation,
    pub resource: String,
    pub request: AggregationRequest,
}

/// Outcome of a [`PreviewJob`].
#[derive(Debug)]
pub struct PreviewReply {
    pub generation: Generation,
    pub result: Result<AggregationResponse>,
}

pub type PreviewWorker = FetchWorker<PreviewJob, PreviewReply>;

/// Spawn a worker executing preview jobs against `source`.
pub fn spawn_preview_worker(source: Arc<dyn PreviewSource>) -> Result<PreviewWorker> {
    FetchWorker::spawn("preview-fetch", move |job: PreviewJob| {
        PreviewCoordinator::execute(&job, source.as_ref())
    })
}

/// Debounces preview requests and renders the latest reply.
///
/// Only the reply to the most recently issued job is shown; replies to
/// earlier jobs are dropped when they arrive.
pub struct PreviewCoordinator {
    settings: PreviewSettings,
    debouncer: Debouncer,
    pending: Option<(String, AggregationRequest)>,
    generation: Generation,
    text: String,
    subscribers: Subscribers,
}

impl PreviewCoordinator {
    pub fn new(settings: PreviewSettings, debounce: &DebounceSettings) -> Self {
        Self {
            settings,
            debouncer: Debouncer::new(debounce.window()),
            pending: None,
            generation: Generation::default(),
            text: String::new(),
            subscribers: Subscribers::new(),
        }
    }

    /// Register for `PreviewUpdated` events.
    pub fn subscribe(&mut self) -> ControllerBridge {
        self.subscribers.subscribe()
    }

    /// Current preview text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Generation of the last issued job.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Queue a preview of `stages`, replacing any queued one.
    pub fn schedule(&mut self, resource: &str, stages: &[PipelineStage], source_fields: Vec<String>) {
        self.schedule_at(Instant::now(), resource, stages, source_fields);
    }

    pub fn schedule_at(
        &mut self,
        now: Instant,
        resource: &str,
        stages: &[PipelineStage],
        source_fields: Vec<String>,
    ) {
        if !self.settings.enabled {
            return;
        }
        let request = AggregationRequest::from_stages(stages, source_fields);
        self.pending = Some((resource.to_string(), request));
        self.debouncer.touch(now);
    }

    pub fn poll(&mut self) -> Option<PreviewJob> {
        self.poll_at(Instant::now())
    }

    /// Issue the queued request once the debounce window has elapsed.
    pub fn poll_at(&mut self, now: Instant) -> Option<PreviewJob> {
        if !self.debouncer.fire(now) {
            return None;
        }
        self.issue()
    }

    /// Issue the queued request right away.
    pub fn flush(&mut self) -> Option<PreviewJob> {
        if !self.debouncer.cancel() {
            return None;
        }
        self.issue()
    }

    fn issue(&mut self) -> Option<PreviewJob> {
        let (resource, request) = self.pending.take()?;
        let generation = self.generation.bump();
        tracing::debug!(
            "Issuing preview for '{}' with {} stages ({})",
            resource,
            request.pipeline.len(),
            generation
        );
        Some(PreviewJob {
            generation,
            resource,
            request,
        })
    }

    /// Run a job. Blocking; call from a worker.
    pub fn execute(job: &PreviewJob, source: &dyn PreviewSource) -> PreviewReply {
        PreviewReply {
            generation: job.generation,
            result: source.run_aggregation(&job.resource, &job.request),
        }
    }

    /// Render a reply if it answers the latest job. Returns whether the
    /// text was updated.
    pub fn apply(&mut self, reply: PreviewReply) -> bool {
        if reply.generation != self.generation {
            tracing::debug!(
                "Ignoring stale preview reply ({}, latest {})",
                reply.generation,
                self.generation
            );
            return false;
        }
        let text = render(reply.result, self.settings.max_items);
        if text != self.text {
            self.text = text;
            self.subscribers.publish(ControllerEvent::PreviewUpdated {
                text: self.text.clone(),
            });
        }
        true
    }
}

fn render(result: Result<AggregationResponse>, max_items: usize) -> String {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Preview request failed: {}", e);
            return e.root_message();
        }
    };
    if let Some(error) = response.errors.first() {
        return error.message.clone();
    }
    let items: Vec<Value> = response.items.into_iter().take(max_items).collect();
    serde_json::to_string_pretty(&items).unwrap_or_else(|e| e.to_string())
}
