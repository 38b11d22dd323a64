//! Test data builders for fields and stages

use aggregation_builder::pipeline::{
    Accumulator, FilterCondition, FilterForm, FilterNode, FilterOperator, FilterTree, GroupForm,
    SortForm, StageForm, UnwindForm,
};
use aggregation_builder::{FieldDescriptor, FieldKind};

/// Builder for creating test FieldDescriptors
pub struct FieldBuilder {
    name: String,
    kind: FieldKind,
    type_name: String,
    fields: Vec<FieldDescriptor>,
}

impl FieldBuilder {
    pub fn scalar(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Scalar,
            type_name: "String".to_string(),
            fields: Vec::new(),
        }
    }

    pub fn object(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Object,
            type_name: type_name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn list_of_objects(name: &str, type_name: &str) -> Self {
        Self {
            kind: FieldKind::ListOfObject,
            ..Self::object(name, type_name)
        }
    }

    pub fn type_name(mut self, type_name: &str) -> Self {
        self.type_name = type_name.to_string();
        self
    }

    pub fn child(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> FieldDescriptor {
        FieldDescriptor::new(self.name, self.kind, self.type_name)
            .and_then(|f| f.with_fields(self.fields))
            .expect("valid test field")
    }
}

pub fn scalar(name: &str) -> FieldDescriptor {
    FieldBuilder::scalar(name).build()
}

pub fn group(keys: &[&str], aliases: &[&str]) -> StageForm {
    StageForm::Group(GroupForm {
        group_by: keys.iter().map(|k| k.to_string()).collect(),
        accumulators: aliases.iter().map(|a| Accumulator::count(*a)).collect(),
    })
}

pub fn sort(field: &str) -> StageForm {
    StageForm::Sort(SortForm {
        field: field.to_string(),
        ..Default::default()
    })
}

pub fn unwind(field: &str) -> StageForm {
    StageForm::Unwind(UnwindForm {
        field: field.to_string(),
    })
}

pub fn filter_eq(field: &str, value: serde_json::Value) -> StageForm {
    StageForm::Filter(FilterForm {
        filter: FilterTree {
            filters: vec![FilterNode::Condition(FilterCondition {
                field: field.to_string(),
                operator: FilterOperator::Eq,
                value: Some(value),
            })],
            ..Default::default()
        },
    })
}

/// Top-level names of a field list
pub fn names(fields: &[FieldDescriptor]) -> Vec<&str> {
    fields.iter().map(|f| f.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_builder() {
        let field = FieldBuilder::object("assignee", "User")
            .child(scalar("name"))
            .build();

        assert_eq!(field.kind, FieldKind::Object);
        assert_eq!(field.type_name, "User");
        assert_eq!(names(&field.fields), vec!["name"]);
    }
}
