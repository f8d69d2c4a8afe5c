//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Document not found: {0}")]
    DocumentNotFound(u32),

    #[error("Missing field in DOM snapshot: {0}")]
    MissingField(String),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid DOM structure: {0}")]
    InvalidStructure(String),

    #[error("Element {0} already has a content document")]
    ContentDocumentAlreadyBound(u32),

    #[error("Maximum iframe depth exceeded: {current} > {max}")]
    MaxIframeDepthExceeded { current: usize, max: usize },

    #[error("Maximum iframe count exceeded: {current} > {max}")]
    MaxIframeCountExceeded { current: usize, max: usize },
}
