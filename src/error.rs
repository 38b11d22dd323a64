//! Error handling for the aggregation builder
//!
//! This module defines the crate error type and a Result alias. Most of these
//! errors never reach the user: schema fetch failures and malformed stage
//! payloads are absorbed where they happen, and preview failures become the
//! preview text. They still travel as values so callers can log them.

use thiserror::Error;

/// Main error type for aggregation builder operations
#[derive(Error, Debug)]
pub enum BuilderError {
    /// A schema or metadata fetch did not complete
    #[error("Schema fetch error for '{type_name}': {message}")]
    SchemaFetch { type_name: String, message: String },

    /// A stage configuration could not be parsed
    #[error("Malformed stage: {0}")]
    MalformedStage(String),

    /// The aggregation preview request failed
    #[error("Preview error: {0}")]
    PreviewExecution(String),

    /// A field descriptor violates the kind/type invariants
    #[error("Invalid field descriptor '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// A stage index outside the current pipeline
    #[error("Stage index {index} out of range (pipeline has {len} stages)")]
    StageIndex { index: usize, len: usize },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BuilderError>,
    },
}

impl BuilderError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BuilderError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a schema fetch error
    pub fn schema_fetch(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        BuilderError::SchemaFetch {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid descriptor error
    pub fn invalid_descriptor(name: impl Into<String>, reason: impl Into<String>) -> Self {
        BuilderError::InvalidDescriptor {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The innermost error message, without any context prefixes.
    pub fn root_message(&self) -> String {
        match self {
            BuilderError::WithContext { source, .. } => source.root_message(),
            BuilderError::PreviewExecution(message) | BuilderError::MalformedStage(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for BuilderError {
    fn from(err: serde_json::Error) -> Self {
        BuilderError::Serialization(err.to_string())
    }
}

/// Result type alias for aggregation builder operations
pub type Result<T> = std::result::Result<T, BuilderError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuilderError::MalformedStage("expected value at line 1".to_string());
        assert_eq!(err.to_string(), "Malformed stage: expected value at line 1");
    }

    #[test]
    fn test_error_with_context() {
        let err = BuilderError::Config("missing file".to_string());
        let with_ctx = err.with_context("Failed to load builder config");
        assert!(with_ctx.to_string().contains("Failed to load builder config"));
        assert!(with_ctx.to_string().contains("missing file"));
    }

    #[test]
    fn test_stage_index_error() {
        let err = BuilderError::StageIndex { index: 4, len: 2 };
        assert!(err.to_string().contains("4"));
        assert!(err.to_string().contains("2 stages"));
    }

    #[test]
    fn test_root_message_strips_context() {
        let err = BuilderError::PreviewExecution("Resource not found".to_string())
            .with_context("Preview request");
        assert_eq!(err.root_message(), "Resource not found");
    }

    #[test]
    fn test_result_ext_lazy_context() {
        let result: Result<()> = Err(BuilderError::Channel("closed".to_string()));
        let err = result.with_context(|| format!("worker {}", 3)).unwrap_err();
        assert!(err.to_string().starts_with("worker 3"));
    }
}
