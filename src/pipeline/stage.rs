//! Pipeline stages and their typed configuration.
//!
//! A stage's configuration shape is fully determined by its type, so the
//! configuration is a closed enum: [`StageForm`] carries one strongly-typed
//! form struct per stage type. On the wire a stage looks like:
//!
//! ```json
//! {
//!   "id": 3,
//!   "type": "GROUP",
//!   "form": { "group_by": ["status"], "accumulators": [{"operator": "count", "alias": "count"}] },
//!   "preview": true
//! }
//! ```

use crate::error::{BuilderError, Result};
use crate::pipeline::id::StageId;
use crate::pipeline::stage_type::StageType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub id: StageId,
    #[serde(flatten)]
    pub form: StageForm,
    /// Whether this stage takes part in the live preview.
    #[serde(default)]
    pub preview: bool,
}

impl PipelineStage {
    pub fn new(id: StageId, form: StageForm) -> Self {
        Self {
            id,
            form,
            preview: false,
        }
    }

    /// A default-configured stage of the given type.
    pub fn with_defaults(id: StageId, stage_type: StageType) -> Self {
        Self::new(id, StageForm::default_for(stage_type))
    }

    pub fn stage_type(&self) -> StageType {
        self.form.stage_type()
    }

    /// Copy of this stage as it should be executed. CUSTOM stages carry
    /// their last valid payload instead of in-progress editor text.
    pub fn committed(&self) -> PipelineStage {
        match &self.form {
            StageForm::Custom(custom) => PipelineStage {
                form: StageForm::Custom(custom.committed()),
                ..self.clone()
            },
            _ => self.clone(),
        }
    }
}

/// Stage configuration, keyed by stage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "form", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageForm {
    Filter(FilterForm),
    Sort(SortForm),
    Group(GroupForm),
    Unwind(UnwindForm),
    AddField(AddFieldForm),
    Label(LabelForm),
    Custom(CustomForm),
    UserLookup(UserLookupForm),
}

impl StageForm {
    /// The empty configuration a newly added stage starts with.
    pub fn default_for(stage_type: StageType) -> Self {
        match stage_type {
            StageType::Filter => StageForm::Filter(FilterForm::default()),
            StageType::Sort => StageForm::Sort(SortForm::default()),
            StageType::Group => StageForm::Group(GroupForm::default()),
            StageType::Unwind => StageForm::Unwind(UnwindForm::default()),
            StageType::AddField => StageForm::AddField(AddFieldForm::default()),
            StageType::Label => StageForm::Label(LabelForm::default()),
            StageType::Custom => StageForm::Custom(CustomForm::default()),
            StageType::UserLookup => StageForm::UserLookup(UserLookupForm::default()),
        }
    }

    pub fn stage_type(&self) -> StageType {
        match self {
            StageForm::Filter(_) => StageType::Filter,
            StageForm::Sort(_) => StageType::Sort,
            StageForm::Group(_) => StageType::Group,
            StageForm::Unwind(_) => StageType::Unwind,
            StageForm::AddField(_) => StageType::AddField,
            StageForm::Label(_) => StageType::Label,
            StageForm::Custom(_) => StageType::Custom,
            StageForm::UserLookup(_) => StageType::UserLookup,
        }
    }

    /// Field paths this stage's configuration refers to.
    ///
    /// Expressions (`ADD_FIELD` values, `CUSTOM` JSON) contribute their
    /// `"$field"` references.
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        match self {
            StageForm::Filter(form) => form.filter.collect_fields(&mut out),
            StageForm::Sort(form) => out.push(form.field.clone()),
            StageForm::Group(form) => {
                out.extend(form.group_by.iter().cloned());
                out.extend(form.accumulators.iter().filter_map(|a| a.field.clone()));
            }
            StageForm::Unwind(form) => out.push(form.field.clone()),
            StageForm::AddField(form) => {
                for added in &form.fields {
                    collect_expression_refs(&added.expression, &mut out);
                }
            }
            StageForm::Label(form) => out.push(form.field.clone()),
            StageForm::Custom(form) => {
                if let Some(value) = form.parsed() {
                    collect_expression_refs(&value, &mut out);
                }
            }
            StageForm::UserLookup(form) => out.push(form.field.clone()),
        }
        out.retain(|f| !f.is_empty());
        out
    }
}

/// `"$status"` → `status`; `"$$ROOT"` variables and plain strings are ignored.
fn collect_expression_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(path) = s.strip_prefix('$') {
                if !path.starts_with('$') && !path.is_empty() {
                    out.push(path.to_string());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_expression_refs(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_expression_refs(v, out)),
        _ => {}
    }
}

// ==================== Filter ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterForm {
    #[serde(default)]
    pub filter: FilterTree,
}

/// How the children of a filter group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

/// A group of filter conditions and nested groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterTree {
    #[serde(default)]
    pub logic: FilterLogic,
    #[serde(default)]
    pub filters: Vec<FilterNode>,
}

impl FilterTree {
    fn collect_fields(&self, out: &mut Vec<String>) {
        for node in &self.filters {
            match node {
                FilterNode::Condition(condition) => out.push(condition.field.clone()),
                FilterNode::Group(group) => group.collect_fields(out),
            }
        }
    }

    /// All field paths referenced by conditions, in tree order.
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }
}

/// A filter condition or a nested group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Condition(FilterCondition),
    Group(FilterTree),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

// ==================== Sort ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SortForm {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

// ==================== Group ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GroupForm {
    /// Key field names or dotted paths.
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub accumulators: Vec<Accumulator>,
}

/// A named aggregate computed per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    pub operator: AccumulatorOp,
    /// Source field; unused by `count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Output field name.
    pub alias: String,
}

impl Accumulator {
    pub fn new(operator: AccumulatorOp, field: Option<&str>, alias: impl Into<String>) -> Self {
        Self {
            operator,
            field: field.map(str::to_string),
            alias: alias.into(),
        }
    }

    pub fn count(alias: impl Into<String>) -> Self {
        Self::new(AccumulatorOp::Count, None, alias)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Push,
    AddToSet,
}

impl AccumulatorOp {
    /// Output has the same shape as the source field.
    pub fn is_type_preserving(&self) -> bool {
        matches!(
            self,
            AccumulatorOp::Min | AccumulatorOp::Max | AccumulatorOp::First | AccumulatorOp::Last
        )
    }

    /// Output is a list of source values.
    pub fn collects(&self) -> bool {
        matches!(self, AccumulatorOp::Push | AccumulatorOp::AddToSet)
    }
}

// ==================== Unwind ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UnwindForm {
    #[serde(default)]
    pub field: String,
}

// ==================== Add field ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AddFieldForm {
    #[serde(default)]
    pub fields: Vec<AddedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedField {
    pub name: String,
    #[serde(default)]
    pub expression: Value,
}

impl AddedField {
    pub fn new(name: impl Into<String>, expression: Value) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }
}

// ==================== Label ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LabelForm {
    /// Field whose values are mapped.
    #[serde(default)]
    pub field: String,
    /// Output field receiving the labels.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: Vec<LabelMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub value: Value,
    pub label: String,
}

// ==================== Custom ====================

/// Raw aggregation stage JSON as typed by the user.
///
/// `raw` is the editor text and may be malformed mid-edit. `formatted`
/// holds the last text that parsed, so a bad edit never loses the stage's
/// previous payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomForm {
    #[serde(default)]
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl Default for CustomForm {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl CustomForm {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            formatted: None,
        }
    }

    /// Re-serialize `raw` with 2-space indentation, keeping key order.
    ///
    /// Returns whether the text changed. On malformed JSON both `raw` and
    /// `formatted` are left as they were. Formatting an already formatted
    /// payload is a no-op.
    pub fn format(&mut self) -> Result<bool> {
        let value: Value = serde_json::from_str(&self.raw)
            .map_err(|e| BuilderError::MalformedStage(e.to_string()))?;
        let formatted = serde_json::to_string_pretty(&value)?;
        let changed = formatted != self.raw;
        self.raw = formatted.clone();
        self.formatted = Some(formatted);
        Ok(changed)
    }

    /// Take over `prior`'s last valid payload if this form has none.
    pub fn inherit_payload(&mut self, prior: &CustomForm) {
        if self.formatted.is_some() {
            return;
        }
        self.formatted = prior.formatted.clone().or_else(|| {
            prior
                .parsed()
                .and_then(|value| serde_json::to_string_pretty(&value).ok())
        });
    }

    /// The last text that parsed: `formatted`, else `raw` if it is valid.
    pub fn payload(&self) -> Option<&str> {
        match &self.formatted {
            Some(text) => Some(text),
            None if serde_json::from_str::<Value>(&self.raw).is_ok() => Some(&self.raw),
            None => None,
        }
    }

    /// Parsed [`payload`](Self::payload).
    pub fn parsed(&self) -> Option<Value> {
        self.payload().and_then(|text| serde_json::from_str(text).ok())
    }

    /// The form to send for execution: the editor text replaced by the last
    /// valid payload, when there is one.
    pub fn committed(&self) -> CustomForm {
        match self.payload() {
            Some(text) => CustomForm {
                raw: text.to_string(),
                formatted: self.formatted.clone(),
            },
            None => self.clone(),
        }
    }
}

// ==================== User lookup ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserLookupForm {
    /// Field holding the user reference.
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub attributes: Vec<UserAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttribute {
    /// User attribute to resolve (`name`, `username`, ...).
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl UserAttribute {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            alias: None,
        }
    }

    /// Name of the synthesized field for a lookup on `field`.
    pub fn output_name(&self, field: &str) -> String {
        match self.alias.as_deref().filter(|a| !a.is_empty()) {
            Some(alias) => alias.to_string(),
            None => format!("{}_{}", field, self.attribute),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_forms_match_type() {
        for &stage_type in StageType::all() {
            assert_eq!(StageForm::default_for(stage_type).stage_type(), stage_type);
        }
    }

    #[test]
    fn test_stage_wire_shape() {
        let mut stage = PipelineStage::new(
            StageId(3),
            StageForm::Group(GroupForm {
                group_by: vec!["status".into()],
                accumulators: vec![Accumulator::count("count")],
            }),
        );
        stage.preview = true;

        let value = serde_json::to_value(&stage).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "type": "GROUP",
                "form": {
                    "group_by": ["status"],
                    "accumulators": [{"operator": "count", "alias": "count"}]
                },
                "preview": true
            })
        );
    }

    #[test]
    fn test_stage_from_json() {
        let stage: PipelineStage = serde_json::from_value(json!({
            "id": 1,
            "type": "SORT",
            "form": {"field": "count", "order": "desc"}
        }))
        .unwrap();
        assert_eq!(stage.stage_type(), StageType::Sort);
        assert!(!stage.preview);
        assert_eq!(
            stage.form,
            StageForm::Sort(SortForm {
                field: "count".into(),
                order: SortOrder::Desc
            })
        );
    }

    #[test]
    fn test_filter_tree_nodes() {
        let form: FilterForm = serde_json::from_value(json!({
            "filter": {
                "logic": "or",
                "filters": [
                    {"field": "status", "operator": "eq", "value": "open"},
                    {"logic": "and", "filters": [
                        {"field": "assignee.name", "operator": "is_not_null"}
                    ]}
                ]
            }
        }))
        .unwrap();

        assert_eq!(form.filter.logic, FilterLogic::Or);
        assert!(matches!(form.filter.filters[0], FilterNode::Condition(_)));
        assert!(matches!(form.filter.filters[1], FilterNode::Group(_)));
        assert_eq!(form.filter.fields(), vec!["status", "assignee.name"]);
    }

    #[test]
    fn test_custom_format() {
        let mut form = CustomForm::new(r#"{"$match":{"b":1,"a":[1,2]}}"#);
        assert!(form.format().unwrap());
        assert_eq!(
            form.raw,
            "{\n  \"$match\": {\n    \"b\": 1,\n    \"a\": [\n      1,\n      2\n    ]\n  }\n}"
        );
        assert_eq!(form.formatted.as_deref(), Some(form.raw.as_str()));
        // Idempotent
        assert!(!form.format().unwrap());
    }

    #[test]
    fn test_custom_format_malformed_keeps_text() {
        let mut form = CustomForm::new("{\"$match\": ");
        let err = form.format().unwrap_err();
        assert!(matches!(err, BuilderError::MalformedStage(_)));
        assert_eq!(form.raw, "{\"$match\": ");
        assert!(form.formatted.is_none());
        assert!(form.parsed().is_none());
        assert_eq!(form.committed(), form);
    }

    #[test]
    fn test_custom_inherits_last_valid_payload() {
        let mut prior = CustomForm::new(r#"{"$limit":5}"#);
        prior.format().unwrap();

        let mut edited = CustomForm::new("{\"$limit\": ");
        assert!(edited.format().is_err());
        edited.inherit_payload(&prior);

        assert_eq!(edited.raw, "{\"$limit\": ");
        assert_eq!(edited.payload(), Some("{\n  \"$limit\": 5\n}"));
        assert_eq!(edited.parsed(), Some(json!({"$limit": 5})));
        assert_eq!(edited.committed().raw, "{\n  \"$limit\": 5\n}");

        // An unformatted but valid prior is formatted on the way over
        let mut other = CustomForm::new("nope");
        other.inherit_payload(&CustomForm::new(r#"{"$skip":1}"#));
        assert_eq!(other.formatted.as_deref(), Some("{\n  \"$skip\": 1\n}"));
    }

    #[test]
    fn test_referenced_fields() {
        let group = StageForm::Group(GroupForm {
            group_by: vec!["status".into()],
            accumulators: vec![
                Accumulator::count("count"),
                Accumulator::new(AccumulatorOp::Sum, Some("amount"), "total"),
            ],
        });
        assert_eq!(group.referenced_fields(), vec!["status", "amount"]);

        let add = StageForm::AddField(AddFieldForm {
            fields: vec![AddedField::new(
                "net",
                json!({"$subtract": ["$amount", "$tax", "$$NOW"]}),
            )],
        });
        assert_eq!(add.referenced_fields(), vec!["amount", "tax"]);

        let custom = StageForm::Custom(CustomForm::new(r#"{"$project": {"x": "$owner.name"}}"#));
        assert_eq!(custom.referenced_fields(), vec!["owner.name"]);

        assert!(StageForm::default_for(StageType::Sort)
            .referenced_fields()
            .is_empty());
    }

    #[test]
    fn test_user_attribute_output_name() {
        let plain = UserAttribute::new("username");
        assert_eq!(plain.output_name("createdBy"), "createdBy_username");

        let aliased = UserAttribute {
            attribute: "name".into(),
            alias: Some("author".into()),
        };
        assert_eq!(aliased.output_name("createdBy"), "author");
    }

    #[test]
    fn test_accumulator_classes() {
        assert!(AccumulatorOp::Max.is_type_preserving());
        assert!(!AccumulatorOp::Count.is_type_preserving());
        assert!(AccumulatorOp::AddToSet.collects());
        assert!(!AccumulatorOp::Sum.collects());
    }
}
