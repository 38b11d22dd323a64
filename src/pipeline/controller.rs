//! Pipeline mutation controller.
//!
//! Owns the ordered stage list and the resource's field schema, and keeps the
//! resolved field sets in step with them.
//!
//! # Recomputation
//!
//! Structural operations (add, remove, move, replace) and schema installs
//! recompute immediately. Edits that arrive in bursts (form edits, preview
//! toggles, field selection) only restart the debounce window; the
//! recomputation runs once when [`PipelineController::poll_at`] sees the
//! window elapse, or on [`PipelineController::flush`].
//!
//! Every mutation swaps in a fresh `Arc` snapshot of the stage list, so
//! readers holding an older snapshot keep a consistent view.

use super::bridge::{ControllerBridge, ControllerEvent, Subscribers};
use super::debounce::Debouncer;
use super::engine::StageTransformEngine;
use super::id::{Generation, StageId};
use super::resolved::{ResolvedFieldSet, ResolvedPipeline};
use super::stage::{PipelineStage, StageForm};
use super::stage_type::StageType;
use crate::backend::{SchemaJob, SchemaReply, SchemaWorker};
use crate::config::BuilderConfig;
use crate::error::{BuilderError, Result};
use crate::schema::FieldTree;
use crate::types::FieldDescriptor;
use std::sync::Arc;
use std::time::Instant;

pub struct PipelineController {
    config: BuilderConfig,

    /// Resource whose schema is installed
    resource: Option<String>,
    /// Canonical expanded fields of the resource
    schema: Arc<Vec<FieldDescriptor>>,
    /// Selected top-level field names; `None` selects everything
    selection: Option<Vec<String>>,
    /// Fields feeding stage 0, with `used` flags
    initial: Arc<Vec<FieldDescriptor>>,

    stages: Arc<Vec<PipelineStage>>,
    resolved: Arc<ResolvedPipeline>,

    /// Bumped on every stage or field-set mutation
    generation: Generation,
    /// Bumped on every schema load request
    schema_generation: Generation,
    debouncer: Debouncer,
    next_stage_id: u32,
    subscribers: Subscribers,
}

impl PipelineController {
    pub fn new(config: BuilderConfig) -> Self {
        let debouncer = Debouncer::new(config.debounce.window());
        Self {
            config,
            resource: None,
            schema: Arc::new(Vec::new()),
            selection: None,
            initial: Arc::new(Vec::new()),
            stages: Arc::new(Vec::new()),
            resolved: Arc::new(ResolvedPipeline::new()),
            generation: Generation::default(),
            schema_generation: Generation::default(),
            debouncer,
            next_stage_id: 0,
            subscribers: Subscribers::new(),
        }
    }

    /// Register for change notifications.
    pub fn subscribe(&mut self) -> ControllerBridge {
        self.subscribers.subscribe()
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Current stage snapshot.
    pub fn stages(&self) -> Arc<Vec<PipelineStage>> {
        Arc::clone(&self.stages)
    }

    pub fn stage(&self, index: usize) -> Option<&PipelineStage> {
        self.stages.get(index)
    }

    pub fn stage_index(&self, id: StageId) -> Option<usize> {
        self.stages.iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The canonical field schema of the resource.
    pub fn schema(&self) -> Arc<Vec<FieldDescriptor>> {
        Arc::clone(&self.schema)
    }

    /// Fields feeding the first stage, as of the last recomputation.
    pub fn initial_fields(&self) -> Arc<Vec<FieldDescriptor>> {
        Arc::clone(&self.initial)
    }

    /// Top-level names of the initial fields.
    pub fn source_field_names(&self) -> Vec<String> {
        self.initial.iter().map(|f| f.name.clone()).collect()
    }

    /// Latest resolved field sets.
    pub fn resolved(&self) -> Arc<ResolvedPipeline> {
        Arc::clone(&self.resolved)
    }

    /// Fields available to the stage at `index`; `index == len()` is the
    /// pipeline output.
    pub fn fields_for(&self, index: usize) -> Result<&ResolvedFieldSet> {
        self.resolved.get(index).ok_or(BuilderError::StageIndex {
            index,
            len: self.stages.len(),
        })
    }

    pub fn output_fields(&self) -> &ResolvedFieldSet {
        self.resolved.output()
    }

    /// Path-indexed view of the fields available at `index`.
    pub fn field_tree(&self, index: usize) -> Result<FieldTree> {
        self.fields_for(index).map(ResolvedFieldSet::tree)
    }

    /// Whether a top-level initial field can be deselected: it exists and
    /// no stage references it or one of its nested fields.
    pub fn can_remove_field(&self, name: &str) -> bool {
        self.initial
            .iter()
            .find(|f| f.name == name)
            .is_some_and(|f| !f.used)
    }

    /// Whether a debounced recomputation is waiting.
    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    // ==================== Structural operations ====================

    /// Append a default-configured stage.
    pub fn add_stage(&mut self, stage_type: StageType) -> StageId {
        self.add_stage_with(StageForm::default_for(stage_type))
    }

    /// Append a stage with the given configuration.
    pub fn add_stage_with(&mut self, form: StageForm) -> StageId {
        let id = StageId(self.next_stage_id);
        self.next_stage_id += 1;

        let mut stage = PipelineStage::new(id, form);
        let index = self.stages.len();
        self.normalize(index, &mut stage.form, None);

        let mut stages = self.stages.as_ref().clone();
        stages.push(stage);
        tracing::debug!("Added {} stage {} at {}", stages[index].stage_type(), id, index);
        self.commit(stages);
        id
    }

    pub fn remove_stage(&mut self, index: usize) -> Result<PipelineStage> {
        self.check_index(index)?;
        let mut stages = self.stages.as_ref().clone();
        let removed = stages.remove(index);
        tracing::debug!("Removed {} stage {}", removed.stage_type(), removed.id);
        self.commit(stages);
        Ok(removed)
    }

    /// Move a stage; the relative order of all other stages is kept.
    pub fn move_stage(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }
        let mut stages = self.stages.as_ref().clone();
        let stage = stages.remove(from);
        stages.insert(to, stage);
        self.commit(stages);
        Ok(())
    }

    /// Replace a stage's configuration (and possibly its type), keeping its
    /// id and preview flag.
    pub fn replace_stage(&mut self, index: usize, form: StageForm) -> Result<()> {
        self.swap_form(index, form)?;
        self.generation.bump();
        self.recompute_now();
        Ok(())
    }

    // ==================== Debounced operations ====================

    /// Update a stage's configuration as the user types.
    pub fn edit_stage(&mut self, index: usize, form: StageForm) -> Result<()> {
        self.swap_form(index, form)?;
        self.schedule(Instant::now());
        Ok(())
    }

    pub fn set_preview(&mut self, index: usize, preview: bool) -> Result<()> {
        self.check_index(index)?;
        let mut stages = self.stages.as_ref().clone();
        stages[index].preview = preview;
        self.stages = Arc::new(stages);
        self.schedule(Instant::now());
        Ok(())
    }

    /// Replace the field schema directly, clearing the selection.
    pub fn set_initial_fields(&mut self, fields: Vec<FieldDescriptor>) {
        self.schema = Arc::new(fields);
        self.selection = None;
        self.schedule(Instant::now());
    }

    /// Restrict the initial fields to the named top-level fields.
    pub fn select_fields<S: AsRef<str>>(&mut self, names: &[S]) {
        self.selection = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self.schedule(Instant::now());
    }

    /// Select every schema field again.
    pub fn select_all_fields(&mut self) {
        self.selection = None;
        self.schedule(Instant::now());
    }

    /// Run a due debounced recomputation. Returns whether one ran.
    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> bool {
        if self.debouncer.fire(now) {
            self.recompute();
            true
        } else {
            false
        }
    }

    /// Run a pending debounced recomputation right away.
    pub fn flush(&mut self) -> bool {
        if self.debouncer.cancel() {
            self.recompute();
            true
        } else {
            false
        }
    }

    // ==================== Schema loading ====================

    /// Install a resolved schema for `resource` and recompute.
    pub fn set_schema(&mut self, resource: impl Into<String>, fields: Vec<FieldDescriptor>) {
        let resource = resource.into();
        tracing::info!("Loaded schema for '{}' ({} fields)", resource, fields.len());
        self.resource = Some(resource.clone());
        self.schema = Arc::new(fields);
        self.selection = None;
        self.recompute_now();
        self.subscribers
            .publish(ControllerEvent::SchemaLoaded { resource });
    }

    /// Request the schema of `resource` from a background worker.
    ///
    /// Any reply for an earlier request becomes stale.
    pub fn load_resource(&mut self, resource: &str, worker: &SchemaWorker) -> Result<Generation> {
        let generation = self.schema_generation.bump();
        worker.submit(SchemaJob {
            generation,
            resource: resource.to_string(),
        })?;
        tracing::debug!("Requested schema for '{}' ({})", resource, generation);
        Ok(generation)
    }

    /// Install a worker reply. Returns whether the schema changed.
    pub fn apply_schema_reply(&mut self, reply: SchemaReply) -> bool {
        if reply.generation != self.schema_generation {
            tracing::debug!(
                "Ignoring stale schema reply for '{}' ({}, latest {})",
                reply.resource,
                reply.generation,
                self.schema_generation
            );
            return false;
        }
        match reply.result {
            Ok(fields) => {
                self.set_schema(reply.resource, fields);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to load schema for '{}': {}", reply.resource, e);
                self.subscribers.publish(ControllerEvent::SchemaFailed {
                    resource: reply.resource,
                    message: e.root_message(),
                });
                false
            }
        }
    }

    // ==================== Internals ====================

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.stages.len() {
            Ok(())
        } else {
            Err(BuilderError::StageIndex {
                index,
                len: self.stages.len(),
            })
        }
    }

    fn swap_form(&mut self, index: usize, mut form: StageForm) -> Result<()> {
        self.check_index(index)?;
        let prior = self.stages[index].form.clone();
        self.normalize(index, &mut form, Some(&prior));
        let mut stages = self.stages.as_ref().clone();
        stages[index].form = form;
        self.stages = Arc::new(stages);
        Ok(())
    }

    /// Pretty-print CUSTOM payloads. Runs only for the stage being edited.
    /// A malformed edit keeps the typed text and the prior valid payload.
    fn normalize(&mut self, index: usize, form: &mut StageForm, prior: Option<&StageForm>) {
        let StageForm::Custom(custom) = form else {
            return;
        };
        if let Err(e) = custom.format() {
            if let Some(StageForm::Custom(prior)) = prior {
                custom.inherit_payload(prior);
            }
            tracing::warn!("Custom stage {} left unformatted: {}", index, e);
            self.subscribers.publish(ControllerEvent::StageFormatFailed {
                index,
                message: e.root_message(),
            });
        }
    }

    fn commit(&mut self, stages: Vec<PipelineStage>) {
        self.stages = Arc::new(stages);
        self.generation.bump();
        self.recompute_now();
    }

    fn schedule(&mut self, now: Instant) {
        self.generation.bump();
        self.debouncer.touch(now);
    }

    fn recompute_now(&mut self) {
        // Covers anything the debounce window was holding back
        self.debouncer.cancel();
        self.recompute();
    }

    fn derive_initial(&self) -> Vec<FieldDescriptor> {
        match &self.selection {
            None => self.schema.as_ref().clone(),
            Some(names) => self
                .schema
                .iter()
                .filter(|f| names.iter().any(|n| n == &f.name))
                .cloned()
                .collect(),
        }
    }

    fn recompute(&mut self) {
        let mut initial = self.derive_initial();
        StageTransformEngine::mark_used(&mut initial, &self.stages);
        let resolved = StageTransformEngine::resolve_all(&initial, &self.stages, self.generation);

        let changed = resolved.fields_differ(&self.resolved);
        self.initial = Arc::new(initial);
        self.resolved = Arc::new(resolved);

        if changed {
            self.subscribers.publish(ControllerEvent::FieldsChanged {
                generation: self.generation,
            });
        } else {
            tracing::debug!("Recomputed {} with no field changes", self.generation);
        }
    }
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}
