//! # Aggregation Builder: pipeline field resolution
//!
//! The core of an aggregation-pipeline editor. Given a resource's GraphQL
//! field schema and a user-edited list of stages (filter, sort, group,
//! unwind, add-field, label, custom, user-lookup), it works out after every
//! edit which fields, with which shapes, each stage can see.
//!
//! ## Architecture
//!
//! - **Schema**: recursive, cycle-guarded expansion of a resource's fields
//!   through a [`schema::SchemaSource`]
//! - **Pipeline**: typed stages, the transform engine folding fields through
//!   them, and the controller applying edits
//! - **Preview**: debounced aggregation preview through a
//!   [`preview::PreviewSource`]
//! - **Backend**: worker threads for blocking fetches, talking over
//!   crossbeam channels
//!
//! ## Configuration
//!
//! Settings live in `builder.toml` in the platform data directory under
//! `dev.hxyulin.aggregation-builder`; see [`config`].
//!
//! ## Example
//!
//! ```ignore
//! use aggregation_builder::{
//!     backend::spawn_schema_worker,
//!     config::BuilderConfig,
//!     pipeline::{PipelineController, StageType},
//!     schema::IntrospectionSource,
//! };
//! use std::sync::Arc;
//!
//! let config = BuilderConfig::load_or_default();
//! let source = IntrospectionSource::from_json(&introspection_json)?;
//! let worker = spawn_schema_worker(Arc::new(source), config.resolver.clone())?;
//!
//! let mut controller = PipelineController::new(config);
//! let events = controller.subscribe();
//! controller.load_resource("Task", &worker)?;
//!
//! // Event loop
//! for reply in worker.drain() {
//!     controller.apply_schema_reply(reply);
//! }
//! controller.add_stage(StageType::Group);
//! controller.poll();
//! for event in events.drain() {
//!     // Refresh field pickers
//! }
//! let fields = controller.fields_for(1)?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod preview;
pub mod schema;
pub mod types;

// Re-export commonly used types
pub use config::BuilderConfig;
pub use error::{BuilderError, Result};
pub use pipeline::{
    ControllerEvent, PipelineController, PipelineStage, ResolvedFieldSet, StageForm,
    StageTransformEngine, StageType,
};
pub use preview::{PreviewCoordinator, PreviewSource};
pub use schema::{FieldResolver, IntrospectionSource, SchemaSource};
pub use types::{FieldDescriptor, FieldKind, FieldMeta};
