use crate::pipeline::id::Generation;
use crate::schema::FieldTree;
use crate::types::{find_field, FieldDescriptor};

/// Fields valid as input to the stage at one pipeline index.
///
/// Never mutated after construction; every recomputation produces fresh sets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedFieldSet {
    fields: Vec<FieldDescriptor>,
}

impl ResolvedFieldSet {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Top-level field names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Look up by name or dotted path
    pub fn find(&self, path: &str) -> Option<&FieldDescriptor> {
        find_field(&self.fields, path)
    }

    /// Path-indexed view for field pickers
    pub fn tree(&self) -> FieldTree {
        FieldTree::from_fields(&self.fields)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        self.fields
    }
}

impl From<Vec<FieldDescriptor>> for ResolvedFieldSet {
    fn from(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(fields)
    }
}

/// Statistics about one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Number of stages folded
    pub stage_count: usize,

    /// Number of top-level fields in the pipeline output
    pub output_fields: usize,

    /// Resolution time in microseconds
    pub resolve_time_us: u64,
}

/// Field sets for every index of a pipeline.
///
/// For `N` stages there are `N + 1` sets: `sets[i]` is the input of stage
/// `i` and `sets[N]` is the pipeline output.
#[derive(Debug, Clone)]
pub struct ResolvedPipeline {
    pub sets: Vec<ResolvedFieldSet>,

    /// Generation of the stage snapshot this was computed from
    pub generation: Generation,

    pub stats: ResolutionStats,
}

impl ResolvedPipeline {
    /// A pipeline with no stages and no fields
    pub fn new() -> Self {
        Self {
            sets: vec![ResolvedFieldSet::default()],
            generation: Generation::default(),
            stats: ResolutionStats::default(),
        }
    }

    /// Input of stage `index`, or the output when `index` equals the stage count
    pub fn get(&self, index: usize) -> Option<&ResolvedFieldSet> {
        self.sets.get(index)
    }

    pub fn output(&self) -> &ResolvedFieldSet {
        static EMPTY: ResolvedFieldSet = ResolvedFieldSet { fields: Vec::new() };
        self.sets.last().unwrap_or(&EMPTY)
    }

    pub fn stage_count(&self) -> usize {
        self.sets.len().saturating_sub(1)
    }

    /// Whether the field sets differ, ignoring generation and timing
    pub fn fields_differ(&self, other: &ResolvedPipeline) -> bool {
        self.sets != other.sets
    }
}

impl Default for ResolvedPipeline {
    fn default() -> Self {
        Self::new()
    }
}
