//! Recursive field expansion.
//!
//! Object and list-of-object fields are expanded by fetching their type's
//! fields from the [`SchemaSource`] and recursing. Recursion carries the chain
//! of types currently being expanded; a field whose type is already on that
//! chain is left unexpanded, which cuts self- and mutually-referential
//! schemas:
//!
//! ```text
//! Task                 ancestors: [Task]
//! +-- assignee: User   ancestors: [Task, User]
//! |   +-- tasks: [Task]   (Task is an ancestor, left unexpanded)
//! +-- reviewer: User   expanded again, siblings are independent
//! ```

use crate::config::ResolverSettings;
use crate::error::Result;
use crate::schema::{apply_metadata, SchemaSource};
use crate::types::{FieldDescriptor, FieldKind};

/// Chain of type names from the root to the current expansion point.
///
/// Each recursive call gets its own link on the stack, so siblings never see
/// each other's descendants.
#[derive(Debug, Clone, Copy)]
struct Ancestors<'a> {
    type_name: &'a str,
    parent: Option<&'a Ancestors<'a>>,
    depth: usize,
}

impl<'a> Ancestors<'a> {
    fn root(type_name: &'a str) -> Self {
        Self {
            type_name,
            parent: None,
            depth: 0,
        }
    }

    fn push<'b>(&'b self, type_name: &'b str) -> Ancestors<'b> {
        Ancestors {
            type_name,
            parent: Some(self),
            depth: self.depth + 1,
        }
    }

    fn contains(&self, type_name: &str) -> bool {
        let mut current = Some(self);
        while let Some(link) = current {
            if link.type_name == type_name {
                return true;
            }
            current = link.parent;
        }
        false
    }
}

/// Expands a resource's shallow field list into a nested field tree.
pub struct FieldResolver<'a, S: SchemaSource + ?Sized> {
    source: &'a S,
    settings: &'a ResolverSettings,
}

impl<'a, S: SchemaSource + ?Sized> FieldResolver<'a, S> {
    pub fn new(source: &'a S, settings: &'a ResolverSettings) -> Self {
        Self { source, settings }
    }

    /// Fetch, expand and annotate the fields of a resource.
    ///
    /// Only the root fetch can fail. Nested fetch failures and metadata
    /// failures degrade to unexpanded fields and missing metadata.
    pub fn resolve_resource(&self, resource: &str) -> Result<Vec<FieldDescriptor>> {
        let raw = self.source.get_fields(resource)?;
        let mut fields = self.expand(resource, raw);

        match self.source.get_metadata(resource) {
            Ok(entries) => apply_metadata(&mut fields, &entries),
            Err(e) => tracing::warn!("Metadata for '{}' unavailable: {}", resource, e),
        }

        tracing::debug!(
            "Resolved {} top-level fields for '{}'",
            fields.len(),
            resource
        );
        Ok(fields)
    }

    /// Expand every object/list-of-object field of `fields`, a field list of
    /// type `root_type`.
    pub fn expand(&self, root_type: &str, fields: Vec<FieldDescriptor>) -> Vec<FieldDescriptor> {
        let ancestors = Ancestors::root(root_type);
        self.expand_level(fields, &ancestors)
    }

    fn expand_level(
        &self,
        fields: Vec<FieldDescriptor>,
        ancestors: &Ancestors<'_>,
    ) -> Vec<FieldDescriptor> {
        let mut out: Vec<FieldDescriptor> = Vec::with_capacity(fields.len());

        for mut field in fields {
            if self.is_linkage_field(&field) {
                continue;
            }
            // Children are deduplicated one level down
            if let Err(e) = field.validate_shape() {
                tracing::warn!("Dropping field under '{}': {}", ancestors.type_name, e);
                continue;
            }
            if out.iter().any(|f| f.name == field.name) {
                tracing::warn!(
                    "Dropping duplicate field '{}' under '{}'",
                    field.name,
                    ancestors.type_name
                );
                continue;
            }

            if field.kind.is_expandable() {
                field.fields = self.expand_field(&field, ancestors);
            }
            out.push(field);
        }

        out
    }

    fn expand_field(
        &self,
        field: &FieldDescriptor,
        ancestors: &Ancestors<'_>,
    ) -> Vec<FieldDescriptor> {
        let type_name = field.type_name.as_str();

        if ancestors.contains(type_name) {
            tracing::debug!(
                "Not expanding '{}': type '{}' is already being expanded",
                field.name,
                type_name
            );
            return Vec::new();
        }
        if ancestors.depth + 1 >= self.settings.max_depth {
            tracing::debug!(
                "Not expanding '{}': depth limit {} reached",
                field.name,
                self.settings.max_depth
            );
            return Vec::new();
        }

        let children = if field.is_expanded() {
            field.fields.clone()
        } else {
            match self.source.get_fields(type_name) {
                Ok(children) => children,
                Err(e) => {
                    tracing::warn!("Leaving '{}' unexpanded: {}", field.name, e);
                    return Vec::new();
                }
            }
        };

        let next = ancestors.push(type_name);
        self.expand_level(children, &next)
    }

    /// Internal linkage fields (`owner_id: ID`, `tag_ids: [ID]`) are not
    /// user-addressable. Lists also match the plural suffix.
    fn is_linkage_field(&self, field: &FieldDescriptor) -> bool {
        if field.type_name != self.settings.id_type_name {
            return false;
        }
        let suffix = self.settings.id_suffix.as_str();
        match field.kind {
            FieldKind::Scalar => field.name.ends_with(suffix),
            FieldKind::ListOfScalar => {
                field.name.ends_with(suffix) || field.name.ends_with(&format!("{suffix}s"))
            }
            _ => false,
        }
    }
}
