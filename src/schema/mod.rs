//! Schema access and field expansion.
//!
//! The builder never talks to a GraphQL server itself. It consumes a
//! [`SchemaSource`] that returns one level of fields for a type name and the
//! display metadata of a resource, and turns those into a fully expanded,
//! dotted-path addressable field tree.
//!
//! ```text
//! SchemaSource::get_fields("Task")      (shallow)
//!        │
//!        ▼
//! FieldResolver::expand                 (recursive, cycle-guarded)
//!        │
//!        ▼
//! apply_metadata                        (labels, calculated flags)
//!        │
//!        ▼
//! FieldTree                             (dotted paths for pickers)
//! ```

pub mod field_tree;
pub mod introspection;
pub mod resolver;

pub use field_tree::{FieldId, FieldNode, FieldTree};
pub use introspection::IntrospectionSource;
pub use resolver::FieldResolver;

use crate::error::Result;
use crate::types::{FieldDescriptor, FieldMeta};
use serde::{Deserialize, Serialize};

/// Metadata for one top-level field of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub name: String,
    #[serde(flatten)]
    pub meta: FieldMeta,
}

impl MetadataEntry {
    pub fn new(name: impl Into<String>, meta: FieldMeta) -> Self {
        Self {
            name: name.into(),
            meta,
        }
    }
}

/// Source of field definitions and field metadata.
///
/// Both calls are single-shot request/response operations. Implementations
/// are free to block; the builder calls them from worker threads.
#[cfg_attr(test, mockall::automock)]
pub trait SchemaSource: Send + Sync {
    /// One level of fields of a resource or nested type.
    fn get_fields(&self, type_name: &str) -> Result<Vec<FieldDescriptor>>;

    /// Display/calculated metadata of a resource's top-level fields.
    fn get_metadata(&self, resource_id: &str) -> Result<Vec<MetadataEntry>>;
}

/// Attach metadata to top-level fields by name.
///
/// Structural identity is untouched; a field's filter overlay survives.
/// Entries naming unknown fields are ignored.
pub fn apply_metadata(fields: &mut [FieldDescriptor], entries: &[MetadataEntry]) {
    for entry in entries {
        if let Some(field) = fields.iter_mut().find(|f| f.name == entry.name) {
            let filtered = field.meta.as_ref().is_some_and(|m| m.filtered);
            let mut meta = entry.meta.clone();
            meta.filtered |= filtered;
            field.meta = Some(meta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_metadata() {
        let mut fields = vec![
            FieldDescriptor::scalar("status", "String"),
            FieldDescriptor::scalar("total", "Float"),
        ];
        let entries = vec![
            MetadataEntry::new(
                "total",
                FieldMeta {
                    label: Some("Total amount".into()),
                    calculated: true,
                    ..Default::default()
                },
            ),
            MetadataEntry::new("missing", FieldMeta::default()),
        ];

        apply_metadata(&mut fields, &entries);

        assert!(fields[0].meta.is_none());
        let meta = fields[1].meta.as_ref().unwrap();
        assert!(meta.calculated);
        assert_eq!(fields[1].label(), "Total amount");
    }

    #[test]
    fn test_metadata_entry_flattened_json() {
        let entry: MetadataEntry =
            serde_json::from_str(r#"{"name": "total", "label": "Total", "calculated": true}"#)
                .unwrap();
        assert_eq!(entry.name, "total");
        assert_eq!(entry.meta.label.as_deref(), Some("Total"));
        assert!(entry.meta.calculated);
    }
}
