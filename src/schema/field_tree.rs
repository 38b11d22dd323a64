//! Flat, dotted-path addressable view of a field list.
//!
//! Field pickers address nested fields by dotted path (`assignee.name`). The
//! tree stores every descriptor in a flat `Vec` indexed by [`FieldId`], with
//! parent/child/sibling links and a path index:
//!
//! ```text
//! status               (leaf, depth 0)
//! assignee             (branch, depth 0)
//! +-- assignee.name    (leaf, depth 1)
//! +-- assignee.email   (leaf, depth 1)
//! ```
//!
//! Paths are unique within one tree because names are unique among siblings.

use crate::types::{FieldDescriptor, FieldKind};
use std::collections::HashMap;
use std::fmt;

/// Index into `FieldTree::nodes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldId(pub u32);

impl FieldId {
    pub const INVALID: FieldId = FieldId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "FieldId(INVALID)")
        } else {
            write!(f, "FieldId({})", self.0)
        }
    }
}

/// A single node in the field tree.
#[derive(Debug, Clone)]
pub struct FieldNode {
    pub id: FieldId,
    /// Full dotted path, e.g. `"assignee.name"`.
    pub path: String,
    /// Leaf segment only, e.g. `"name"`.
    pub name: String,
    pub kind: FieldKind,
    pub type_name: String,
    /// Display label (metadata label or name).
    pub label: String,
    /// Parent node (FieldId::INVALID for roots).
    pub parent: FieldId,
    /// First child (intrusive linked list).
    pub first_child: FieldId,
    /// Next sibling (intrusive linked list).
    pub next_sibling: FieldId,
    /// Depth in the tree (0 for roots).
    pub depth: u16,
    /// True if the field has no expanded children.
    pub is_leaf: bool,
    pub used: bool,
}

/// Flat-storage hierarchical field tree.
#[derive(Debug, Default)]
pub struct FieldTree {
    nodes: Vec<FieldNode>,
    path_index: HashMap<String, FieldId>,
}

impl FieldTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a (possibly nested) field list.
    pub fn from_fields(fields: &[FieldDescriptor]) -> Self {
        let mut tree = Self::new();
        for field in fields {
            tree.insert(FieldId::INVALID, field);
        }
        tree
    }

    fn insert(&mut self, parent: FieldId, field: &FieldDescriptor) -> FieldId {
        let id = FieldId(self.nodes.len() as u32);
        let (path, depth) = match self.get(parent) {
            Some(p) => (format!("{}.{}", p.path, field.name), p.depth + 1),
            None => (field.name.clone(), 0),
        };

        self.path_index.insert(path.clone(), id);
        self.nodes.push(FieldNode {
            id,
            path,
            name: field.name.clone(),
            kind: field.kind,
            type_name: field.type_name.clone(),
            label: field.label().to_string(),
            parent,
            first_child: FieldId::INVALID,
            next_sibling: FieldId::INVALID,
            depth,
            is_leaf: true,
            used: field.used,
        });

        if parent.is_valid() {
            self.link_child(parent, id);
        }

        for child in &field.fields {
            self.insert(id, child);
        }

        id
    }

    fn link_child(&mut self, parent: FieldId, id: FieldId) {
        let first = self.nodes[parent.index()].first_child;
        if !first.is_valid() {
            self.nodes[parent.index()].first_child = id;
        } else {
            // Walk to end of sibling chain
            let mut cur = first;
            loop {
                let next = self.nodes[cur.index()].next_sibling;
                if !next.is_valid() {
                    self.nodes[cur.index()].next_sibling = id;
                    break;
                }
                cur = next;
            }
        }
        self.nodes[parent.index()].is_leaf = false;
    }

    /// Total number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by FieldId (O(1) array index).
    #[inline]
    pub fn get(&self, id: FieldId) -> Option<&FieldNode> {
        if id.is_valid() {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    /// Look up by full dotted path (O(1) HashMap).
    pub fn find_by_path(&self, path: &str) -> Option<FieldId> {
        self.path_index.get(path).copied()
    }

    /// Iterate over all nodes in depth-first order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldNode> {
        self.nodes.iter()
    }

    /// Iterate over children of a given node.
    pub fn children(&self, parent: FieldId) -> ChildIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(FieldId::INVALID);
        ChildIter {
            tree: self,
            current: first,
        }
    }

    /// Iterate over root nodes (depth == 0).
    pub fn roots(&self) -> impl Iterator<Item = &FieldNode> {
        self.nodes.iter().filter(|n| !n.parent.is_valid())
    }

    /// Iterate over leaf nodes.
    pub fn leaves(&self) -> impl Iterator<Item = &FieldNode> {
        self.nodes.iter().filter(|n| n.is_leaf)
    }

    /// Dotted paths of all scalar leaves, the selectable values of a picker.
    pub fn scalar_paths(&self) -> Vec<&str> {
        self.leaves()
            .filter(|n| n.kind.is_scalar())
            .map(|n| n.path.as_str())
            .collect()
    }
}

/// Iterator over the children of a node.
pub struct ChildIter<'a> {
    tree: &'a FieldTree,
    current: FieldId,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = &'a FieldNode;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.current.is_valid() {
            return None;
        }
        let node = &self.tree.nodes[self.current.index()];
        self.current = node.next_sibling;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Vec<FieldDescriptor> {
        let assignee = FieldDescriptor::object("assignee", "User")
            .unwrap()
            .with_fields(vec![
                FieldDescriptor::scalar("name", "String"),
                FieldDescriptor::scalar("email", "String"),
            ])
            .unwrap();
        vec![
            FieldDescriptor::scalar("status", "String"),
            assignee,
            FieldDescriptor::list_of_scalars("tags", "String"),
        ]
    }

    #[test]
    fn test_field_id() {
        let id = FieldId(42);
        assert!(id.is_valid());
        assert_eq!(id.index(), 42);
        assert!(!FieldId::INVALID.is_valid());
    }

    #[test]
    fn test_build_tree() {
        let tree = FieldTree::from_fields(&sample_fields());
        assert_eq!(tree.len(), 5);

        let assignee = tree.find_by_path("assignee").unwrap();
        assert!(!tree.get(assignee).unwrap().is_leaf);

        let children: Vec<_> = tree.children(assignee).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].path, "assignee.name");
        assert_eq!(children[1].path, "assignee.email");
        assert_eq!(children[1].depth, 1);
        assert_eq!(children[1].parent, assignee);
    }

    #[test]
    fn test_find_by_path() {
        let tree = FieldTree::from_fields(&sample_fields());
        assert!(tree.find_by_path("assignee.email").is_some());
        assert!(tree.find_by_path("email").is_none());
        assert!(tree.find_by_path("assignee.phone").is_none());
    }

    #[test]
    fn test_roots_and_scalar_paths() {
        let tree = FieldTree::from_fields(&sample_fields());
        let roots: Vec<_> = tree.roots().map(|n| n.name.as_str()).collect();
        assert_eq!(roots, vec!["status", "assignee", "tags"]);

        assert_eq!(
            tree.scalar_paths(),
            vec!["status", "assignee.name", "assignee.email"]
        );
    }

    #[test]
    fn test_unexpanded_object_is_leaf() {
        let fields = vec![FieldDescriptor::object("owner", "User").unwrap()];
        let tree = FieldTree::from_fields(&fields);
        let owner = tree.get(FieldId(0)).unwrap();
        assert!(owner.is_leaf);
        assert!(tree.scalar_paths().is_empty());
    }

    #[test]
    fn test_empty_tree() {
        let tree = FieldTree::from_fields(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.children(FieldId::INVALID).count(), 0);
    }
}
