//! DOM Service - builds the DOM forest from a JSON DOM snapshot
//!
//! This handles:
//! - Parsing the snapshot format produced by the capturing host
//! - Linking the flat element list into a tree
//! - Recursing into iframe content documents (bounded by config)
//!
//! Input format:
//! ```json
//! {
//!   "documentUrl": "http://example.com/",
//!   "baseUrl": "http://example.com/",
//!   "elements": [
//!     {"tag": "HTML", "attrs": {}, "children": [1]},
//!     {"tag": "IFRAME", "attrs": {"src": "f.html"}, "width": 10, "height": 10,
//!      "contentDocument": {"documentUrl": "...", "baseUrl": "...", "elements": []}}
//!   ]
//! }
//! ```
//!
//! `elements` is flat; `children` holds indices into the same list.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::*;
use serde_json::Value;

/// Configuration for DOM service
#[derive(Debug, Clone)]
pub struct DomServiceConfig {
    /// Total number of nested documents accepted per snapshot
    pub max_iframes: usize,
    /// Maximum nesting of content documents
    pub max_iframe_depth: usize,
}

impl Default for DomServiceConfig {
    fn default() -> Self {
        Self {
            max_iframes: 100,
            max_iframe_depth: 5,
        }
    }
}

/// Main DOM service
pub struct DomService {
    config: DomServiceConfig,
    arena: DomArena,
    iframe_count: usize,
}

impl DomService {
    /// Create new DOM service with default config
    pub fn new() -> Self {
        Self::with_config(DomServiceConfig::default())
    }

    /// Create DOM service with custom config
    pub fn with_config(config: DomServiceConfig) -> Self {
        Self {
            config,
            arena: DomArena::new(),
            iframe_count: 0,
        }
    }

    /// Get reference to internal arena
    pub fn arena(&self) -> &DomArena {
        &self.arena
    }

    /// Take the built forest out of the service
    pub fn into_arena(self) -> DomArena {
        self.arena
    }

    /// Parse a top-level snapshot and build the forest
    ///
    /// Clears whatever the arena held before. Returns the top-level
    /// document.
    pub fn parse_document(&mut self, snapshot: &Value) -> Result<DocumentId> {
        if !snapshot.is_object() {
            return Err(DomError::InvalidStructure(
                "DOM snapshot must be a JSON object".to_string(),
            ));
        }

        self.arena.clear();
        self.iframe_count = 0;
        self.parse_document_at(snapshot, 0)
    }

    fn parse_document_at(&mut self, snapshot: &Value, depth: usize) -> Result<DocumentId> {
        let document_url = demand_str(snapshot, "documentUrl")?;
        let base_url = demand_str(snapshot, "baseUrl")?;
        let elements = snapshot
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| DomError::MissingField("elements".to_string()))?;

        let document_id = self.arena.add_document(document_url, base_url);

        // First pass: one arena node per list entry, same order
        let mut node_ids = Vec::with_capacity(elements.len());
        for (index, raw) in elements.iter().enumerate() {
            let element = parse_element(raw, document_id, index)?;
            node_ids.push(self.arena.add_element(document_id, element)?);
        }

        // Second pass: link children by index
        for (index, raw) in elements.iter().enumerate() {
            let Some(children) = raw.get("children").and_then(Value::as_array) else {
                continue;
            };
            for child in children {
                let child_index = child
                    .as_u64()
                    .map(|c| c as usize)
                    .filter(|&c| c < node_ids.len())
                    .ok_or_else(|| {
                        DomError::InvalidStructure(format!(
                            "element {} has an invalid child index {}",
                            index, child
                        ))
                    })?;
                self.arena
                    .append_child(node_ids[index], node_ids[child_index])?;
            }
        }

        // The first parentless element is the root
        let mut root = None;
        for &node_id in &node_ids {
            if self.arena.get(node_id)?.parent_id.is_none() {
                if root.is_none() {
                    root = Some(node_id);
                } else {
                    tracing::warn!(
                        "Skipping orphaned element {} in {}",
                        node_id,
                        document_url
                    );
                }
            }
        }
        if let Some(root_id) = root {
            self.arena.set_root(document_id, root_id)?;
        }

        // Third pass: nested documents
        for (index, raw) in elements.iter().enumerate() {
            let Some(content) = raw.get("contentDocument") else {
                continue;
            };
            if content.is_null() {
                continue;
            }

            if depth + 1 > self.config.max_iframe_depth {
                return Err(DomError::MaxIframeDepthExceeded {
                    current: depth + 1,
                    max: self.config.max_iframe_depth,
                });
            }
            self.iframe_count += 1;
            if self.iframe_count > self.config.max_iframes {
                return Err(DomError::MaxIframeCountExceeded {
                    current: self.iframe_count,
                    max: self.config.max_iframes,
                });
            }

            let nested_id = self.parse_document_at(content, depth + 1)?;
            self.arena.set_content_document(node_ids[index], nested_id)?;
        }

        tracing::debug!(
            "Parsed DOM document {} with {} elements",
            document_url,
            node_ids.len()
        );
        Ok(document_id)
    }
}

impl Default for DomService {
    fn default() -> Self {
        Self::new()
    }
}

fn demand_str<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DomError::MissingField(key.to_string()))
}

fn parse_element(raw: &Value, document_id: DocumentId, index: usize) -> Result<DomElement> {
    if !raw.is_object() {
        return Err(DomError::InvalidStructure(format!(
            "element {} is not an object",
            index
        )));
    }

    let tag = demand_str(raw, "tag")?;
    let mut element = DomElement::new(document_id, tag);

    match raw.get("attrs") {
        None | Some(Value::Null) => {}
        Some(Value::Object(attrs)) => {
            for (name, value) in attrs {
                match value {
                    Value::String(s) => element.set_attr(name, s),
                    other => element.set_attr(name, &other.to_string()),
                }
            }
        }
        Some(_) => {
            return Err(DomError::InvalidField {
                field: "attrs".to_string(),
                reason: format!("element {} attrs must be an object", index),
            })
        }
    }

    element.actual_width = read_dimension(raw, "width")?;
    element.actual_height = read_dimension(raw, "height")?;
    Ok(element)
}

fn read_dimension(raw: &Value, key: &str) -> Result<Option<i32>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(|n| Some(n as i32))
            .ok_or_else(|| DomError::InvalidField {
                field: key.to_string(),
                reason: format!("expected an integer, got {}", v),
            }),
    }
}
