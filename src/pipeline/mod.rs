//! Aggregation pipeline model and field propagation.
//!
//! A pipeline is an ordered list of stages. Each stage sees the fields the
//! previous stage produced, starting from the resource's initial fields:
//!
//! ```text
//! initial ──► [FILTER] ──► [GROUP] ──► [SORT] ──► output
//!  sets[0]      sets[1]     sets[2]    sets[3]
//! ```
//!
//! # Design
//!
//! - **Closed stage set**: `StageForm` is an enum keyed by stage type, so a
//!   stage can't carry another type's configuration.
//! - **Full refold**: every recomputation folds from the initial fields; there
//!   is no per-edit patching.
//! - **Snapshots**: stage lists and resolved sets are `Arc` snapshots swapped
//!   on mutation.
//! - **Debounced edits**: form edits and field selection restart a
//!   `Debouncer`; structural operations recompute immediately.

pub mod bridge;
pub mod controller;
pub mod debounce;
pub mod engine;
pub mod id;
pub mod resolved;
pub mod stage;
pub mod stage_type;

pub use bridge::{ControllerBridge, ControllerEvent, Subscribers};
pub use controller::PipelineController;
pub use debounce::Debouncer;
pub use engine::StageTransformEngine;
pub use id::{Generation, StageId};
pub use resolved::{ResolutionStats, ResolvedFieldSet, ResolvedPipeline};
pub use stage::{
    Accumulator, AccumulatorOp, AddFieldForm, AddedField, CustomForm, FilterCondition, FilterForm,
    FilterLogic, FilterNode, FilterOperator, FilterTree, GroupForm, LabelForm, LabelMapping,
    PipelineStage, SortForm, SortOrder, StageForm, UnwindForm, UserAttribute, UserLookupForm,
};
pub use stage_type::StageType;
