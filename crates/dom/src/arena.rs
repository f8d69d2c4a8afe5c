//! Arena-based DOM forest storage
//!
//! A page is not one tree: every iframe with a navigated document adds
//! another document to the forest. Both elements and documents live in
//! flat vectors and refer to each other by index.
//!
//! This arena eliminates:
//! - Rc/Arc overhead and parent/child reference cycles
//! - Recursive function calls (stack overflow risk on deep markup)
//! - Ownership puzzles between an iframe and its content document
//!
//! ## Memory Layout
//!
//! ```text
//! nodes:     [Elem0][Elem1][Elem2]...      (all documents)
//! documents: [Doc0 ][Doc1 ]...
//!             ↑ Doc1.owner_element_id = 2, Elem2.content_document_id = 1
//! ```

use crate::error::{DomError, Result};
use crate::types::{DocumentId, DomDocument, DomElement, NodeId};
use crate::visitor::DomElementVisitor;
use ahash::AHashMap;

/// Arena allocator for the DOM forest
///
/// Design:
/// - Single Vec<DomElement> for sequential allocation
/// - Single Vec<DomDocument>, one entry per document in the forest
/// - HashMap for document URL → DocumentId lookup
#[derive(Debug)]
pub struct DomArena {
    /// All elements of all documents, stored sequentially
    nodes: Vec<DomElement>,

    /// Every document of the forest
    documents: Vec<DomDocument>,

    /// Document URL → DocumentId (first document wins on duplicates)
    url_map: AHashMap<String, DocumentId>,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical page
    }

    /// Create arena with specific element capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            documents: Vec::new(),
            url_map: AHashMap::new(),
        }
    }

    /// Add an empty document, returns its ID
    pub fn add_document(&mut self, document_url: &str, base_url: &str) -> DocumentId {
        let document_id = self.documents.len() as DocumentId;
        self.documents
            .push(DomDocument::new(document_id, document_url, base_url));
        self.url_map
            .entry(document_url.to_string())
            .or_insert(document_id);
        document_id
    }

    /// Add an element to a document, returns its ID
    ///
    /// The element starts detached; link it with `append_child` or
    /// `set_root`.
    pub fn add_element(&mut self, document_id: DocumentId, mut element: DomElement) -> Result<NodeId> {
        self.document(document_id)?;
        let node_id = self.nodes.len() as NodeId;
        element.node_id = node_id;
        element.document_id = document_id;
        element.parent_id = None;
        element.children_ids.clear();
        self.nodes.push(element);
        Ok(node_id)
    }

    /// Link `child` as the last child of `parent`
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        if parent_id == child_id {
            return Err(DomError::InvalidStructure(format!(
                "element {} cannot be its own child",
                parent_id
            )));
        }
        let parent_doc = self.get(parent_id)?.document_id;
        let child = self.get(child_id)?;
        if child.document_id != parent_doc {
            return Err(DomError::InvalidStructure(format!(
                "element {} belongs to another document",
                child_id
            )));
        }
        if child.parent_id.is_some() || self.is_root(child_id) {
            return Err(DomError::InvalidStructure(format!(
                "element {} already has a parent",
                child_id
            )));
        }

        self.get_mut(child_id)?.parent_id = Some(parent_id);
        self.get_mut(parent_id)?.children_ids.push(child_id);
        Ok(())
    }

    /// Get element by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomElement> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get element by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomElement> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get document by ID
    pub fn document(&self, document_id: DocumentId) -> Result<&DomDocument> {
        self.documents
            .get(document_id as usize)
            .ok_or(DomError::DocumentNotFound(document_id))
    }

    fn document_mut(&mut self, document_id: DocumentId) -> Result<&mut DomDocument> {
        self.documents
            .get_mut(document_id as usize)
            .ok_or(DomError::DocumentNotFound(document_id))
    }

    /// Find a document by its URL
    pub fn document_by_url(&self, url: &str) -> Option<&DomDocument> {
        self.url_map
            .get(url)
            .and_then(|&id| self.documents.get(id as usize))
    }

    /// Set the root element of a document
    pub fn set_root(&mut self, document_id: DocumentId, node_id: NodeId) -> Result<()> {
        let node = self.get(node_id)?;
        if node.document_id != document_id || node.parent_id.is_some() {
            return Err(DomError::InvalidStructure(format!(
                "element {} cannot be the root of document {}",
                node_id, document_id
            )));
        }
        self.document_mut(document_id)?.root_id = Some(node_id);
        Ok(())
    }

    fn is_root(&self, node_id: NodeId) -> bool {
        self.nodes
            .get(node_id as usize)
            .and_then(|n| self.documents.get(n.document_id as usize))
            .is_some_and(|d| d.root_id == Some(node_id))
    }

    /// Get the root element of a document, if it has one
    pub fn root(&self, document_id: DocumentId) -> Result<Option<&DomElement>> {
        match self.document(document_id)?.root_id {
            Some(root_id) => Ok(Some(self.get(root_id)?)),
            None => Ok(None),
        }
    }

    /// Bind an iframe element to its content document
    ///
    /// Each iframe owns at most one content document: rebinding fails.
    pub fn set_content_document(&mut self, node_id: NodeId, document_id: DocumentId) -> Result<()> {
        if self.get(node_id)?.content_document_id.is_some() {
            return Err(DomError::ContentDocumentAlreadyBound(node_id));
        }
        let document = self.document(document_id)?;
        if document.owner_element_id.is_some() || document_id == self.get(node_id)?.document_id {
            return Err(DomError::InvalidStructure(format!(
                "document {} cannot be bound to element {}",
                document_id, node_id
            )));
        }

        self.document_mut(document_id)?.owner_element_id = Some(node_id);
        self.get_mut(node_id)?.content_document_id = Some(document_id);
        Ok(())
    }

    /// The nested document of an iframe element
    pub fn content_document(&self, node_id: NodeId) -> Result<Option<&DomDocument>> {
        match self.get(node_id)?.content_document_id {
            Some(doc_id) => Ok(Some(self.document(doc_id)?)),
            None => Ok(None),
        }
    }

    /// Total number of elements across all documents
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterator over all documents
    pub fn documents(&self) -> impl Iterator<Item = &DomDocument> {
        self.documents.iter()
    }

    /// Get children of an element
    pub fn children(&self, node_id: NodeId) -> Result<Vec<&DomElement>> {
        let node = self.get(node_id)?;
        node.children_ids
            .iter()
            .map(|&child_id| self.get(child_id))
            .collect()
    }

    /// Get parent of an element
    pub fn parent(&self, node_id: NodeId) -> Result<Option<&DomElement>> {
        let node = self.get(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.get(parent_id)?)),
            None => Ok(None),
        }
    }

    /// Traverse one document depth-first, pre-order (iterative, no recursion)
    ///
    /// Traversal is document-local: an iframe is visited, its content
    /// document is not. Fetch it with `content_document` and traverse it
    /// separately.
    pub fn traverse_df<F>(&self, document_id: DocumentId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomElement) -> Result<()>,
    {
        let Some(root_id) = self.document(document_id)?.root_id else {
            return Ok(());
        };
        let mut stack = vec![root_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Run a visitor over one document, in the same order as `traverse_df`
    pub fn accept(&self, document_id: DocumentId, visitor: &mut dyn DomElementVisitor) -> Result<()> {
        self.traverse_df(document_id, |element| {
            visitor.visit(self, element);
            Ok(())
        })
    }

    /// Find all elements of a document by tag name
    pub fn find_by_tag(&self, document_id: DocumentId, tag: &str) -> Result<Vec<NodeId>> {
        let mut found = Vec::new();
        self.traverse_df(document_id, |element| {
            if element.is_tag(tag) {
                found.push(element.node_id);
            }
            Ok(())
        })?;
        Ok(found)
    }

    /// Clear arena (reuse allocation)
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.documents.clear();
        self.url_map.clear();
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}
