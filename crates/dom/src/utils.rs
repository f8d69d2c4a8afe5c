//! Utility functions for DOM processing

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::DocumentId;
use std::collections::VecDeque;

/// Resolve `uri` against `base`. Returns None when neither parses.
pub fn resolve_uri(base: &str, uri: &str) -> Option<String> {
    match url::Url::parse(base) {
        Ok(base_url) => base_url.join(uri).ok().map(String::from),
        Err(_) => url::Url::parse(uri).ok().map(String::from),
    }
}

/// All documents reachable from `top` through iframe content documents,
/// breadth-first, `top` first
///
/// This is the explicit cross-document walk: plain traversal never
/// leaves the document it started in.
pub fn collect_frame_documents(arena: &DomArena, top: DocumentId) -> Result<Vec<DocumentId>> {
    let mut ordered = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(top);

    while let Some(document_id) = queue.pop_front() {
        if ordered.contains(&document_id) {
            continue;
        }
        ordered.push(document_id);

        arena.traverse_df(document_id, |element| {
            if let Some(nested) = element.content_document_id {
                queue.push_back(nested);
            }
            Ok(())
        })?;
    }

    Ok(ordered)
}
