//! Core type definitions for the DOM forest
//!
//! Key design principles:
//! 1. Use u32 for indices (4 bytes vs 8 bytes pointer)
//! 2. Documents and elements live in the same arena, linked by index
//! 3. Use SmallVec for small arrays (most elements have few attributes)
//! 4. An iframe points at its content document, it never owns a subtree

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Element identifier (index into arena)
/// u32 allows 4 billion nodes, enough for any webpage
pub type NodeId = u32;

/// Document identifier (index into the arena's document table)
pub type DocumentId = u32;

/// A single `name="value"` pair on an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One element of a captured document
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Use indices instead of pointers
/// - Tag names are stored upper-cased, the way browsers report `tagName`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomElement {
    // IDs
    pub node_id: NodeId,
    pub document_id: DocumentId,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>,

    pub tag_name: String,
    pub attributes: SmallVec<[Attribute; 4]>,

    // Rendered size, when the snapshot recorded one
    pub actual_width: Option<i32>,
    pub actual_height: Option<i32>,

    // Iframe binding (set at most once)
    pub content_document_id: Option<DocumentId>,
}

impl DomElement {
    /// Create a new element with required fields
    pub fn new(document_id: DocumentId, tag_name: &str) -> Self {
        Self {
            node_id: 0,
            document_id,
            parent_id: None,
            children_ids: SmallVec::new(),
            tag_name: tag_name.to_ascii_uppercase(),
            attributes: SmallVec::new(),
            actual_width: None,
            actual_height: None,
            content_document_id: None,
        }
    }

    /// Builder-style attribute setter, mostly for tests and parsers
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Set an attribute, replacing any existing one with the same
    /// (case-insensitive) name
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value.to_string(),
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    /// Get attribute value. Attribute names are case-insensitive.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Check tag name, ignoring case
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// True when the markup carries a non-empty `width` attribute
    pub fn has_width_specified(&self) -> bool {
        self.attr("width").is_some_and(|v| !v.is_empty())
    }

    /// True when the markup carries a non-empty `height` attribute
    pub fn has_height_specified(&self) -> bool {
        self.attr("height").is_some_and(|v| !v.is_empty())
    }
}

/// A document in the forest: the top-level page or one iframe's content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomDocument {
    pub document_id: DocumentId,
    pub document_url: String,
    pub base_url: String,
    pub root_id: Option<NodeId>,
    /// The iframe element this document is bound to, if any
    pub owner_element_id: Option<NodeId>,
}

impl DomDocument {
    pub fn new(document_id: DocumentId, document_url: &str, base_url: &str) -> Self {
        Self {
            document_id,
            document_url: document_url.to_string(),
            base_url: base_url.to_string(),
            root_id: None,
            owner_element_id: None,
        }
    }

    /// Resolve a (possibly relative) URI against this document's base URL
    pub fn resolve_uri(&self, uri: &str) -> Option<String> {
        crate::utils::resolve_uri(&self.base_url, uri)
    }
}
