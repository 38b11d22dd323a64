//! In-memory schema source built from a GraphQL introspection document.
//!
//! Accepts the result of the standard introspection query, either as the
//! full response (`{"data": {"__schema": ...}}`) or the bare `__schema`
//! object. Type references are unwrapped through `NON_NULL` and `LIST`:
//!
//! | Introspection type ref            | FieldKind      |
//! |-----------------------------------|----------------|
//! | `SCALAR` / `ENUM`                 | `Scalar`       |
//! | `OBJECT` / `INTERFACE` / `UNION`  | `Object`       |
//! | `LIST` of scalar                  | `ListOfScalar` |
//! | `LIST` of object                  | `ListOfObject` |

use crate::error::{BuilderError, Result};
use crate::schema::{MetadataEntry, SchemaSource};
use crate::types::{FieldDescriptor, FieldKind};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    data: Option<SchemaEnvelope>,
    #[serde(rename = "__schema")]
    schema: Option<IntrospectionSchema>,
}

#[derive(Debug, Deserialize)]
struct SchemaEnvelope {
    #[serde(rename = "__schema")]
    schema: IntrospectionSchema,
}

#[derive(Debug, Deserialize)]
struct IntrospectionSchema {
    #[serde(default)]
    types: Vec<IntrospectionType>,
}

#[derive(Debug, Deserialize)]
struct IntrospectionType {
    name: String,
    #[serde(default)]
    fields: Option<Vec<IntrospectionField>>,
}

#[derive(Debug, Deserialize)]
struct IntrospectionField {
    name: String,
    #[serde(rename = "type")]
    type_ref: TypeRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeRef {
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    /// Strip wrappers down to `(is_list, base kind, base name)`.
    fn base(&self) -> Option<(bool, &str, &str)> {
        let mut current = self;
        let mut is_list = false;
        loop {
            match current.kind.as_str() {
                "NON_NULL" => current = current.of_type.as_deref()?,
                "LIST" => {
                    is_list = true;
                    current = current.of_type.as_deref()?;
                }
                kind => return Some((is_list, kind, current.name.as_deref()?)),
            }
        }
    }
}

impl IntrospectionField {
    fn to_descriptor(&self) -> Option<FieldDescriptor> {
        let (is_list, base_kind, base_name) = self.type_ref.base()?;
        let object_like = matches!(base_kind, "OBJECT" | "INTERFACE" | "UNION");
        let kind = match (is_list, object_like) {
            (false, false) => FieldKind::Scalar,
            (false, true) => FieldKind::Object,
            (true, false) => FieldKind::ListOfScalar,
            (true, true) => FieldKind::ListOfObject,
        };
        FieldDescriptor::new(&self.name, kind, base_name).ok()
    }
}

/// Schema source backed by parsed introspection data and registered
/// metadata.
#[derive(Debug, Clone, Default)]
pub struct IntrospectionSource {
    types: HashMap<String, Vec<FieldDescriptor>>,
    metadata: HashMap<String, Vec<MetadataEntry>>,
}

impl IntrospectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an introspection document.
    pub fn from_json(content: &str) -> Result<Self> {
        let response: IntrospectionResponse = serde_json::from_str(content)?;
        let schema = response
            .data
            .map(|d| d.schema)
            .or(response.schema)
            .ok_or_else(|| {
                BuilderError::Serialization("introspection document has no __schema".to_string())
            })?;

        let mut source = Self::new();
        for ty in schema.types {
            // Introspection meta types (__Type, __Field, ...) are not resources.
            if ty.name.starts_with("__") {
                continue;
            }
            let Some(fields) = ty.fields else {
                continue;
            };
            let descriptors = fields
                .iter()
                .filter_map(|f| {
                    let descriptor = f.to_descriptor();
                    if descriptor.is_none() {
                        tracing::warn!("Skipping unreadable field {}.{}", ty.name, f.name);
                    }
                    descriptor
                })
                .collect();
            source.types.insert(ty.name, descriptors);
        }

        tracing::debug!("Parsed introspection schema with {} types", source.types.len());
        Ok(source)
    }

    /// Register (or replace) the fields of a type.
    pub fn with_type(mut self, type_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        self.types.insert(type_name.into(), fields);
        self
    }

    /// Register (or replace) the metadata of a resource.
    pub fn with_metadata(mut self, resource: impl Into<String>, entries: Vec<MetadataEntry>) -> Self {
        self.metadata.insert(resource.into(), entries);
        self
    }

    /// Names of all known types, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl SchemaSource for IntrospectionSource {
    fn get_fields(&self, type_name: &str) -> Result<Vec<FieldDescriptor>> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| BuilderError::schema_fetch(type_name, "type not found in schema"))
    }

    fn get_metadata(&self, resource_id: &str) -> Result<Vec<MetadataEntry>> {
        Ok(self.metadata.get(resource_id).cloned().unwrap_or_default())
    }
}
