//! Stage type enumeration for the stage catalogue.
//!
//! This module defines the kinds of stages a user can add to a pipeline
//! through the editor.

use serde::{Deserialize, Serialize};

/// Types of stages that can be added to a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    /// Restricts rows with a filter tree.
    Filter,
    /// Orders rows by one field.
    Sort,
    /// Groups rows by key fields and computes accumulators.
    Group,
    /// Emits one row per element of a list field.
    Unwind,
    /// Adds computed fields.
    AddField,
    /// Maps the values of a field to display labels in a new field.
    Label,
    /// Raw aggregation stage JSON.
    Custom,
    /// Resolves user references to user attributes.
    UserLookup,
}

impl StageType {
    /// Get the display name for this stage type.
    pub fn display_name(&self) -> &'static str {
        match self {
            StageType::Filter => "Filter",
            StageType::Sort => "Sort",
            StageType::Group => "Group",
            StageType::Unwind => "Unwind",
            StageType::AddField => "Add Field",
            StageType::Label => "Label",
            StageType::Custom => "Custom",
            StageType::UserLookup => "User Lookup",
        }
    }

    /// Get all available stage types.
    pub fn all() -> &'static [StageType] {
        &[
            StageType::Filter,
            StageType::Sort,
            StageType::Group,
            StageType::Unwind,
            StageType::AddField,
            StageType::Label,
            StageType::Custom,
            StageType::UserLookup,
        ]
    }

    /// Whether this stage can change which fields are visible downstream.
    pub fn reshapes_fields(&self) -> bool {
        !matches!(self, StageType::Filter | StageType::Custom)
    }

    /// Get a detailed description of what this stage does.
    pub fn description(&self) -> &'static str {
        match self {
            StageType::Filter =>
                "Keeps only the rows matching a filter.\n\
                 Fields pass through unchanged.",

            StageType::Sort =>
                "Orders rows by a single field.\n\
                 Only scalar fields are available afterwards.",

            StageType::Group =>
                "Groups rows by one or more key fields.\n\
                 Output holds the keys plus one field per accumulator.",

            StageType::Unwind =>
                "Emits one row per element of a list field.\n\
                 Object elements are flattened to the top level.",

            StageType::AddField =>
                "Adds fields computed from an expression.\n\
                 Existing fields are kept.",

            StageType::Label =>
                "Maps the values of a field to display labels.\n\
                 The labels are written to a new field.",

            StageType::Custom =>
                "Raw aggregation stage written as JSON.\n\
                 Its effect on fields is not tracked.",

            StageType::UserLookup =>
                "Resolves a user reference field.\n\
                 Adds one field per requested user attribute.",
        }
    }
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
