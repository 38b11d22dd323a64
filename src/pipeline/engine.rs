//! Stage transform engine.
//!
//! Folds an initial field set through the stage list, left to right, and
//! records the field set visible at every pipeline index. There is no
//! incremental patching: every call recomputes the whole fold from the
//! initial fields, so the result depends only on its inputs.

use super::id::Generation;
use super::resolved::{ResolutionStats, ResolvedFieldSet, ResolvedPipeline};
use super::stage::{
    AccumulatorOp, AddFieldForm, FilterForm, GroupForm, LabelForm, PipelineStage, StageForm,
    UnwindForm, UserLookupForm,
};
use crate::types::{
    find_field, find_field_mut, FieldDescriptor, FieldKind, FLOAT_TYPE_NAME, INT_TYPE_NAME,
    SYNTHESIZED_TYPE_NAME,
};
use std::collections::{HashMap, HashSet};

/// Computes per-index field sets for a pipeline
pub struct StageTransformEngine;

impl StageTransformEngine {
    /// Field set produced by folding `initial` through `stages`.
    ///
    /// Pass the stages *before* the target index to get that stage's input.
    /// An empty prefix returns `initial` unchanged.
    pub fn fields_after(initial: &[FieldDescriptor], stages: &[PipelineStage]) -> ResolvedFieldSet {
        let fields = stages
            .iter()
            .fold(initial.to_vec(), |fields, stage| Self::apply_stage(fields, &stage.form));
        ResolvedFieldSet::new(fields)
    }

    /// Resolve every index `0..=N` in a single pass.
    ///
    /// `sets[i]` equals `fields_after(initial, &stages[..i])`.
    pub fn resolve_all(
        initial: &[FieldDescriptor],
        stages: &[PipelineStage],
        generation: Generation,
    ) -> ResolvedPipeline {
        let start_time = std::time::Instant::now();

        let mut sets = Vec::with_capacity(stages.len() + 1);
        let mut current = initial.to_vec();
        for stage in stages {
            let next = Self::apply_stage(current.clone(), &stage.form);
            sets.push(ResolvedFieldSet::new(current));
            current = next;
        }
        let output_fields = current.len();
        sets.push(ResolvedFieldSet::new(current));

        let stats = ResolutionStats {
            stage_count: stages.len(),
            output_fields,
            resolve_time_us: start_time.elapsed().as_micros() as u64,
        };

        tracing::debug!(
            "Resolved {} stages ({}): {} output fields in {}us",
            stats.stage_count,
            generation,
            stats.output_fields,
            stats.resolve_time_us
        );

        ResolvedPipeline {
            sets,
            generation,
            stats,
        }
    }

    /// Apply one stage to a field set
    pub fn apply_stage(fields: Vec<FieldDescriptor>, form: &StageForm) -> Vec<FieldDescriptor> {
        match form {
            StageForm::Filter(filter) => Self::apply_filter(fields, filter),
            StageForm::Sort(_) => {
                let mut fields = fields;
                fields.retain(|f| f.kind.is_scalar());
                fields
            }
            StageForm::Group(group) => Self::apply_group(fields, group),
            StageForm::Unwind(unwind) => Self::apply_unwind(fields, unwind),
            StageForm::AddField(add) => Self::apply_add_field(fields, add),
            StageForm::Label(label) => Self::apply_label(fields, label),
            // Opaque to field resolution
            StageForm::Custom(_) => fields,
            StageForm::UserLookup(lookup) => Self::apply_user_lookup(fields, lookup),
        }
    }

    /// Re-derive the `used` flags of `fields` from the stages' references.
    ///
    /// A reference is resolved against the input of the stage making it and
    /// traced back through earlier stages, so a name an earlier stage
    /// synthesized (a GROUP alias, an added field) never marks an initial
    /// field of the same name. Every field on a traced path is marked, so a
    /// parent object counts as used when one of its nested fields is.
    /// Returns the number of references that matched an initial field.
    pub fn mark_used(fields: &mut [FieldDescriptor], stages: &[PipelineStage]) -> usize {
        clear_used(fields);
        let mut lineage = Lineage::new(fields);
        let mut current = fields.to_vec();
        let mut matched = 0;
        for stage in stages {
            for path in stage.form.referenced_fields() {
                let Some(source) = lineage.trace(&current, &path) else {
                    continue;
                };
                if mark_path(fields, &source) {
                    matched += 1;
                }
            }
            let next = Self::apply_stage(current.clone(), &stage.form);
            lineage.advance(&current, &next, &stage.form);
            current = next;
        }
        matched
    }

    fn apply_filter(mut fields: Vec<FieldDescriptor>, form: &FilterForm) -> Vec<FieldDescriptor> {
        for path in form.filter.fields() {
            if let Some(field) = find_field_mut(&mut fields, &path) {
                field.meta_mut().filtered = true;
            }
        }
        fields
    }

    fn apply_group(fields: Vec<FieldDescriptor>, form: &GroupForm) -> Vec<FieldDescriptor> {
        let mut out: Vec<FieldDescriptor> =
            Vec::with_capacity(form.group_by.len() + form.accumulators.len());

        for key in form.group_by.iter().filter(|k| !k.is_empty()) {
            let Some(source) = find_field(&fields, key) else {
                tracing::debug!("Group key '{}' not found, stage ignored", key);
                return fields;
            };
            if !out.iter().any(|f| &f.name == key) {
                out.push(source.renamed(key.as_str()));
            }
        }

        for accumulator in &form.accumulators {
            let alias = accumulator.alias.as_str();
            if alias.is_empty() || out.iter().any(|f| f.name == alias) {
                continue;
            }
            let source = accumulator
                .field
                .as_deref()
                .and_then(|path| find_field(&fields, path));

            let field = match accumulator.operator {
                AccumulatorOp::Count => FieldDescriptor::scalar(alias, INT_TYPE_NAME),
                AccumulatorOp::Sum | AccumulatorOp::Avg => {
                    FieldDescriptor::scalar(alias, FLOAT_TYPE_NAME)
                }
                AccumulatorOp::Min
                | AccumulatorOp::Max
                | AccumulatorOp::First
                | AccumulatorOp::Last => source
                    .map(|s| s.renamed(alias))
                    .unwrap_or_else(|| FieldDescriptor::scalar(alias, SYNTHESIZED_TYPE_NAME)),
                AccumulatorOp::Push | AccumulatorOp::AddToSet => match source {
                    Some(s) => {
                        let mut list = s.renamed(alias);
                        list.kind = s.kind.as_list();
                        list
                    }
                    None => FieldDescriptor::list_of_scalars(alias, SYNTHESIZED_TYPE_NAME),
                },
            };
            out.push(field);
        }

        out
    }

    fn apply_unwind(mut fields: Vec<FieldDescriptor>, form: &UnwindForm) -> Vec<FieldDescriptor> {
        let Some(pos) = fields.iter().position(|f| f.name == form.field) else {
            tracing::debug!("Unwind target '{}' not found, stage ignored", form.field);
            return fields;
        };

        match fields[pos].kind {
            FieldKind::ListOfScalar => {
                fields[pos].kind = FieldKind::Scalar;
                fields
            }
            FieldKind::ListOfObject if !fields[pos].is_expanded() => {
                fields[pos].kind = FieldKind::Object;
                fields
            }
            FieldKind::ListOfObject => {
                let mut after = fields.split_off(pos);
                let target = after.remove(0);
                let element_names: HashSet<&str> =
                    target.fields.iter().map(|f| f.name.as_str()).collect();

                // Element fields replace the list in place and win collisions
                let mut out: Vec<FieldDescriptor> = fields
                    .into_iter()
                    .filter(|f| !element_names.contains(f.name.as_str()))
                    .collect();
                let rest: Vec<FieldDescriptor> = after
                    .into_iter()
                    .filter(|f| !element_names.contains(f.name.as_str()))
                    .collect();
                out.extend(target.fields.iter().cloned());
                out.extend(rest);
                out
            }
            kind => {
                tracing::debug!("Unwind target '{}' is a {}, stage ignored", form.field, kind);
                fields
            }
        }
    }

    fn apply_add_field(mut fields: Vec<FieldDescriptor>, form: &AddFieldForm) -> Vec<FieldDescriptor> {
        for added in form.fields.iter().filter(|a| !a.name.is_empty()) {
            upsert(
                &mut fields,
                FieldDescriptor::scalar(added.name.as_str(), SYNTHESIZED_TYPE_NAME),
            );
        }
        fields
    }

    fn apply_label(mut fields: Vec<FieldDescriptor>, form: &LabelForm) -> Vec<FieldDescriptor> {
        if !form.name.is_empty() {
            upsert(
                &mut fields,
                FieldDescriptor::scalar(form.name.as_str(), SYNTHESIZED_TYPE_NAME),
            );
        }
        fields
    }

    fn apply_user_lookup(
        mut fields: Vec<FieldDescriptor>,
        form: &UserLookupForm,
    ) -> Vec<FieldDescriptor> {
        if form.field.is_empty() {
            return fields;
        }
        for attribute in form.attributes.iter().filter(|a| !a.attribute.is_empty()) {
            let name = attribute.output_name(&form.field);
            upsert(&mut fields, FieldDescriptor::scalar(name, SYNTHESIZED_TYPE_NAME));
        }
        fields
    }
}

/// Maps the top-level names of a stage's input to the initial-field paths
/// they carry. Synthesized names have no entry.
struct Lineage {
    origins: HashMap<String, String>,
}

impl Lineage {
    fn new(initial: &[FieldDescriptor]) -> Self {
        Self {
            origins: initial
                .iter()
                .map(|f| (f.name.clone(), f.name.clone()))
                .collect(),
        }
    }

    /// Initial-field path behind `path`, as seen in `input`.
    fn trace(&self, input: &[FieldDescriptor], path: &str) -> Option<String> {
        let (top, rest) = split_top(input, path)?;
        let base = self.origins.get(top)?;
        Some(match rest {
            Some(rest) => format!("{base}.{rest}"),
            None => base.clone(),
        })
    }

    /// Follow the names through one stage.
    fn advance(&mut self, input: &[FieldDescriptor], output: &[FieldDescriptor], form: &StageForm) {
        match form {
            StageForm::Group(group) => {
                let applies = group
                    .group_by
                    .iter()
                    .filter(|k| !k.is_empty())
                    .all(|k| find_field(input, k).is_some());
                if applies {
                    self.origins = self.through_group(input, group);
                }
            }
            StageForm::Unwind(unwind) => {
                let Some(target) = input.iter().find(|f| f.name == unwind.field) else {
                    return;
                };
                if target.kind == FieldKind::ListOfObject && target.is_expanded() {
                    let base = self.origins.remove(&target.name);
                    for element in &target.fields {
                        match &base {
                            Some(base) => {
                                self.origins
                                    .insert(element.name.clone(), format!("{base}.{}", element.name));
                            }
                            None => {
                                self.origins.remove(&element.name);
                            }
                        }
                    }
                }
            }
            StageForm::AddField(add) => {
                for added in &add.fields {
                    self.origins.remove(&added.name);
                }
            }
            StageForm::Label(label) => {
                self.origins.remove(&label.name);
            }
            StageForm::UserLookup(lookup) if !lookup.field.is_empty() => {
                for attribute in &lookup.attributes {
                    self.origins.remove(&attribute.output_name(&lookup.field));
                }
            }
            StageForm::Filter(_)
            | StageForm::Sort(_)
            | StageForm::Custom(_)
            | StageForm::UserLookup(_) => {}
        }
        self.origins
            .retain(|name, _| output.iter().any(|f| &f.name == name));
    }

    fn through_group(&self, input: &[FieldDescriptor], group: &GroupForm) -> HashMap<String, String> {
        let mut origins = HashMap::new();
        let mut taken: HashSet<&str> = HashSet::new();

        for key in group.group_by.iter().filter(|k| !k.is_empty()) {
            if !taken.insert(key.as_str()) {
                continue;
            }
            if let Some(source) = self.trace(input, key) {
                origins.insert(key.clone(), source);
            }
        }
        for accumulator in &group.accumulators {
            let alias = accumulator.alias.as_str();
            if alias.is_empty() || !taken.insert(alias) {
                continue;
            }
            // Computed values (count, sum, avg) are new data
            if !(accumulator.operator.is_type_preserving() || accumulator.operator.collects()) {
                continue;
            }
            if let Some(source) = accumulator
                .field
                .as_deref()
                .and_then(|path| self.trace(input, path))
            {
                origins.insert(alias.to_string(), source);
            }
        }
        origins
    }
}

/// Split `path` into the top-level field of `input` it starts at and the
/// nested remainder. An exact dotted name wins over traversal.
fn split_top<'p>(input: &[FieldDescriptor], path: &'p str) -> Option<(&'p str, Option<&'p str>)> {
    if input.iter().any(|f| f.name == path) {
        return Some((path, None));
    }
    let (head, rest) = path.split_once('.')?;
    input
        .iter()
        .any(|f| f.name == head)
        .then_some((head, Some(rest)))
}

/// Replace a same-named field in place, or append.
fn upsert(fields: &mut Vec<FieldDescriptor>, field: FieldDescriptor) {
    match fields.iter_mut().find(|f| f.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

fn clear_used(fields: &mut [FieldDescriptor]) {
    for field in fields {
        field.used = false;
        clear_used(&mut field.fields);
    }
}

fn mark_path(fields: &mut [FieldDescriptor], path: &str) -> bool {
    if let Some(field) = fields.iter_mut().find(|f| f.name == path) {
        field.used = true;
        return true;
    }
    let Some((head, rest)) = path.split_once('.') else {
        return false;
    };
    let Some(field) = fields.iter_mut().find(|f| f.name == head) else {
        return false;
    };
    if mark_path(&mut field.fields, rest) {
        field.used = true;
        true
    } else {
        false
    }
}
