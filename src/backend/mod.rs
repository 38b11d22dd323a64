//! Background fetches for schema resolution and previews.
//!
//! Resolving a resource fans out into many [`SchemaSource::get_fields`] calls,
//! so it runs off the editing thread on a [`FetchWorker`]. Replies carry the
//! [`Generation`] of the request that produced them; the controller installs
//! only the reply for its latest request.
//!
//! # Example
//!
//! ```ignore
//! use aggregation_builder::backend::spawn_schema_worker;
//!
//! let worker = spawn_schema_worker(source, config.resolver.clone())?;
//! controller.load_resource("Task", &worker)?;
//!
//! // From the event loop
//! for reply in worker.drain() {
//!     controller.apply_schema_reply(reply);
//! }
//! ```

pub mod worker;

pub use worker::FetchWorker;

use crate::config::ResolverSettings;
use crate::error::Result;
use crate::pipeline::id::Generation;
use crate::schema::{FieldResolver, SchemaSource};
use crate::types::FieldDescriptor;
use std::sync::Arc;

/// Request to resolve one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaJob {
    pub generation: Generation,
    pub resource: String,
}

/// Fully expanded fields of a resource, or the root fetch failure.
#[derive(Debug)]
pub struct SchemaReply {
    pub generation: Generation,
    pub resource: String,
    pub result: Result<Vec<FieldDescriptor>>,
}

pub type SchemaWorker = FetchWorker<SchemaJob, SchemaReply>;

/// Spawn a worker resolving resources against `source`.
pub fn spawn_schema_worker(
    source: Arc<dyn SchemaSource>,
    settings: ResolverSettings,
) -> Result<SchemaWorker> {
    FetchWorker::spawn("schema-fetch", move |job: SchemaJob| {
        let resolver = FieldResolver::new(source.as_ref(), &settings);
        let result = resolver.resolve_resource(&job.resource);
        SchemaReply {
            generation: job.generation,
            resource: job.resource,
            result,
        }
    })
}
