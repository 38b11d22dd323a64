//! Core data types for the aggregation builder
//!
//! This module contains the schema field model: the descriptor of one field of
//! a resource or of a nested type, as seen by the resolver, the transform
//! engine and the field pickers.
//!
//! # Main Types
//!
//! - [`FieldKind`] - Scalar, object, or list of either
//! - [`FieldDescriptor`] - A named, typed field with optional nested fields
//! - [`FieldMeta`] - Display/calculated metadata attached after the fetch
//!
//! # Invariants
//!
//! - Non-scalar kinds carry a non-empty `type_name`
//! - `fields` is populated only for non-scalar kinds, and only once expanded
//! - Names are unique among siblings

use crate::error::{BuilderError, Result};
use serde::{Deserialize, Serialize};

/// Scalar type name given to fields synthesized by pipeline stages
pub const SYNTHESIZED_TYPE_NAME: &str = "String";

/// Scalar type name for integer-valued synthesized fields
pub const INT_TYPE_NAME: &str = "Int";

/// Scalar type name for float-valued synthesized fields
pub const FLOAT_TYPE_NAME: &str = "Float";

/// The shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain value (string, number, date, enum, ...)
    #[default]
    Scalar,
    /// Nested object of another type
    Object,
    /// List of plain values
    ListOfScalar,
    /// List of nested objects of another type
    ListOfObject,
}

impl FieldKind {
    /// Whether this kind is a plain scalar
    pub fn is_scalar(&self) -> bool {
        matches!(self, FieldKind::Scalar)
    }

    /// Whether this kind refers to a nested type that can be expanded
    pub fn is_expandable(&self) -> bool {
        matches!(self, FieldKind::Object | FieldKind::ListOfObject)
    }

    /// Whether this kind is a list
    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::ListOfScalar | FieldKind::ListOfObject)
    }

    /// The kind of a single element of this kind
    pub fn element(&self) -> FieldKind {
        match self {
            FieldKind::ListOfScalar => FieldKind::Scalar,
            FieldKind::ListOfObject => FieldKind::Object,
            other => *other,
        }
    }

    /// The list kind wrapping this kind
    pub fn as_list(&self) -> FieldKind {
        match self {
            FieldKind::Scalar | FieldKind::ListOfScalar => FieldKind::ListOfScalar,
            FieldKind::Object | FieldKind::ListOfObject => FieldKind::ListOfObject,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Object => "object",
            FieldKind::ListOfScalar => "list of scalars",
            FieldKind::ListOfObject => "list of objects",
        };
        write!(f, "{}", name)
    }
}

/// Binding of a field to a reference data set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDataBinding {
    /// Name of the reference data set
    pub name: String,
    /// Field of the reference data used as the stored value
    #[serde(default)]
    pub value_field: Option<String>,
    /// Field of the reference data shown to the user
    #[serde(default)]
    pub display_field: Option<String>,
}

/// Metadata attached to a field after the schema fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldMeta {
    /// Display label
    #[serde(default)]
    pub label: Option<String>,
    /// Whether the field is computed by the backend
    #[serde(default)]
    pub calculated: bool,
    /// Reference data binding, if any
    #[serde(default)]
    pub reference_data: Option<ReferenceDataBinding>,
    /// Set by filter stages on the fields their conditions reference
    #[serde(default)]
    pub filtered: bool,
}

/// A named, typed field of a resource or nested type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique among siblings
    pub name: String,
    /// Field shape
    pub kind: FieldKind,
    /// Nested type name (object kinds) or scalar type name
    #[serde(default)]
    pub type_name: String,
    /// Nested fields, populated by the resolver for object kinds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDescriptor>,
    /// Display and calculated-field metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FieldMeta>,
    /// Whether a current stage references this field
    #[serde(default, skip_serializing)]
    pub used: bool,
}

impl FieldDescriptor {
    /// Create and validate a descriptor without nested fields
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        type_name: impl Into<String>,
    ) -> Result<Self> {
        let field = Self::unchecked(name.into(), kind, type_name.into());
        field.validate()?;
        Ok(field)
    }

    fn unchecked(name: String, kind: FieldKind, type_name: String) -> Self {
        Self {
            name,
            kind,
            type_name,
            fields: Vec::new(),
            meta: None,
            used: false,
        }
    }

    /// Create a scalar field of the given scalar type
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::unchecked(name.into(), FieldKind::Scalar, type_name.into())
    }

    /// Create a list-of-scalars field
    pub fn list_of_scalars(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::unchecked(name.into(), FieldKind::ListOfScalar, type_name.into())
    }

    /// Create an object field referencing `type_name`
    pub fn object(name: impl Into<String>, type_name: impl Into<String>) -> Result<Self> {
        Self::new(name, FieldKind::Object, type_name)
    }

    /// Create a list-of-objects field referencing `type_name`
    pub fn list_of_objects(name: impl Into<String>, type_name: impl Into<String>) -> Result<Self> {
        Self::new(name, FieldKind::ListOfObject, type_name)
    }

    /// Attach nested fields. Rejected for scalar kinds.
    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Result<Self> {
        self.fields = fields;
        self.validate()?;
        Ok(self)
    }

    /// Attach metadata
    pub fn with_meta(mut self, meta: FieldMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Check the kind/type invariants and that direct children have
    /// distinct names (not recursive).
    pub fn validate(&self) -> Result<()> {
        self.validate_shape()?;
        let mut seen = std::collections::HashSet::new();
        for child in &self.fields {
            if !seen.insert(child.name.as_str()) {
                return Err(BuilderError::invalid_descriptor(
                    &self.name,
                    format!("duplicate nested field '{}'", child.name),
                ));
            }
        }
        Ok(())
    }

    /// Check only the name and kind/type invariants, ignoring the children.
    pub fn validate_shape(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BuilderError::invalid_descriptor(
                &self.name,
                "field name is empty",
            ));
        }
        if self.kind.is_expandable() && self.type_name.trim().is_empty() {
            return Err(BuilderError::invalid_descriptor(
                &self.name,
                format!("{} field requires a type name", self.kind),
            ));
        }
        if !self.kind.is_expandable() && !self.fields.is_empty() {
            return Err(BuilderError::invalid_descriptor(
                &self.name,
                format!("{} field cannot have nested fields", self.kind),
            ));
        }
        Ok(())
    }

    /// Whether this field has been expanded into nested fields
    pub fn is_expanded(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Look up a direct child by name
    pub fn child(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Display label from metadata, falling back to the name
    pub fn label(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|m| m.label.as_deref())
            .unwrap_or(&self.name)
    }

    /// Same field under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut field = self.clone();
        field.name = name.into();
        field.used = false;
        field
    }

    /// Mutable metadata, created on first access
    pub fn meta_mut(&mut self) -> &mut FieldMeta {
        self.meta.get_or_insert_with(FieldMeta::default)
    }
}

/// Find a field in a list by name or dotted path (`assignee.name`).
///
/// An exact top-level name match wins over path traversal, so fields whose
/// names contain dots (e.g. group keys) stay addressable.
pub fn find_field<'a>(fields: &'a [FieldDescriptor], path: &str) -> Option<&'a FieldDescriptor> {
    if let Some(field) = fields.iter().find(|f| f.name == path) {
        return Some(field);
    }
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.iter().find(|f| f.name == first)?;
    for segment in segments {
        current = current.child(segment)?;
    }
    Some(current)
}

/// Mutable counterpart of [`find_field`].
pub fn find_field_mut<'a>(
    fields: &'a mut [FieldDescriptor],
    path: &str,
) -> Option<&'a mut FieldDescriptor> {
    if let Some(index) = fields.iter().position(|f| f.name == path) {
        return fields.get_mut(index);
    }
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.iter_mut().find(|f| f.name == first)?;
    for segment in segments {
        current = current.fields.iter_mut().find(|f| f.name == segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_field() {
        let field = FieldDescriptor::scalar("status", "String");
        assert!(field.validate().is_ok());
        assert!(field.kind.is_scalar());
        assert!(!field.is_expanded());
    }

    #[test]
    fn test_object_requires_type_name() {
        let err = FieldDescriptor::object("assignee", "").unwrap_err();
        assert!(matches!(err, BuilderError::InvalidDescriptor { .. }));
        assert!(FieldDescriptor::list_of_objects("tasks", "  ").is_err());
        assert!(FieldDescriptor::object("assignee", "User").is_ok());
    }

    #[test]
    fn test_scalar_rejects_nested_fields() {
        let nested = vec![FieldDescriptor::scalar("x", "Int")];
        let err = FieldDescriptor::scalar("status", "String")
            .with_fields(nested)
            .unwrap_err();
        assert!(err.to_string().contains("cannot have nested fields"));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(FieldDescriptor::new("", FieldKind::Scalar, "String").is_err());
    }

    #[test]
    fn test_duplicate_children_rejected() {
        let children = vec![
            FieldDescriptor::scalar("name", "String"),
            FieldDescriptor::scalar("name", "String"),
        ];
        let result = FieldDescriptor::object("user", "User")
            .unwrap()
            .with_fields(children);
        assert!(result.is_err());

        let mut user = FieldDescriptor::object("user", "User").unwrap();
        user.fields = vec![
            FieldDescriptor::scalar("name", "String"),
            FieldDescriptor::scalar("name", "String"),
        ];
        assert!(user.validate_shape().is_ok());
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_kind_helpers() {
        assert_eq!(FieldKind::ListOfObject.element(), FieldKind::Object);
        assert_eq!(FieldKind::ListOfScalar.element(), FieldKind::Scalar);
        assert_eq!(FieldKind::Object.as_list(), FieldKind::ListOfObject);
        assert!(FieldKind::ListOfObject.is_expandable());
        assert!(!FieldKind::ListOfScalar.is_expandable());
        assert!(FieldKind::ListOfScalar.is_list());
    }

    #[test]
    fn test_find_field_by_path() {
        let user = FieldDescriptor::object("assignee", "User")
            .unwrap()
            .with_fields(vec![
                FieldDescriptor::scalar("name", "String"),
                FieldDescriptor::scalar("email", "String"),
            ])
            .unwrap();
        let fields = vec![FieldDescriptor::scalar("status", "String"), user];

        assert_eq!(find_field(&fields, "status").unwrap().name, "status");
        assert_eq!(find_field(&fields, "assignee.email").unwrap().name, "email");
        assert!(find_field(&fields, "assignee.phone").is_none());
        assert!(find_field(&fields, "owner").is_none());
    }

    #[test]
    fn test_find_field_prefers_exact_dotted_name() {
        let fields = vec![FieldDescriptor::scalar("assignee.name", "String")];
        assert!(find_field(&fields, "assignee.name").is_some());
    }

    #[test]
    fn test_label_falls_back_to_name() {
        let plain = FieldDescriptor::scalar("status", "String");
        assert_eq!(plain.label(), "status");

        let labelled = plain.with_meta(FieldMeta {
            label: Some("Status".into()),
            ..Default::default()
        });
        assert_eq!(labelled.label(), "Status");
    }

    #[test]
    fn test_used_flag_not_serialized() {
        let mut field = FieldDescriptor::scalar("status", "String");
        field.used = true;
        let json = serde_json::to_value(&field).unwrap();
        assert!(json.get("used").is_none());
        assert_eq!(json["kind"], "scalar");
    }
}
