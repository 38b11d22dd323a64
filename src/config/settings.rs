//! Tunable settings for the resolver, the edit debouncer and the preview
//!
//! These are plain data with serde defaults, so a partial config file only
//! overrides what it names.
//!
//! # Main Types
//!
//! - [`ResolverSettings`] - Linkage-field exclusion and expansion depth cap
//! - [`DebounceSettings`] - Coalescing window for edits and field selection
//! - [`PreviewSettings`] - Live preview behaviour

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default name suffix of internal linkage fields
pub const DEFAULT_ID_SUFFIX: &str = "_id";

/// Default GraphQL type name of identifier fields
pub const DEFAULT_ID_TYPE_NAME: &str = "ID";

/// Default maximum nesting depth the resolver will expand
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Default debounce window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Default number of preview items rendered
pub const DEFAULT_PREVIEW_ITEMS: usize = 10;

/// Settings for the field expansion resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Name suffix marking linkage fields (e.g. `owner_id`)
    pub id_suffix: String,

    /// Type name of identifier scalars
    pub id_type_name: String,

    /// Hard cap on nesting depth, on top of the cycle guard
    pub max_depth: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            id_suffix: DEFAULT_ID_SUFFIX.to_string(),
            id_type_name: DEFAULT_ID_TYPE_NAME.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Settings for coalescing rapid edits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceSettings {
    /// Quiet period before a debounced recomputation fires
    pub window_ms: u64,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl DebounceSettings {
    /// Create settings with a given window
    pub fn new(window_ms: u64) -> Self {
        Self { window_ms }
    }

    /// The window as a `Duration`
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Settings for the live preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Whether previews are requested at all
    pub enabled: bool,

    /// Maximum number of result items rendered
    pub max_items: usize,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: DEFAULT_PREVIEW_ITEMS,
        }
    }
}
