//! Building the graph from a DOM snapshot
//!
//! The top-level context gets the primary resource and the top DOM
//! document. Each element that fetches a captured resource gets a fetch
//! in the context of its document, one per redirect hop, and scripts and
//! stylesheets also get an evaluation. Stylesheets or HTML documents
//! reached that way fetch what they reference in turn, requested by
//! their evaluation. An iframe with a content document becomes a nested
//! context.

use super::{
    BrowsingContextGraph, ConstraintType, ContextId, DiscoveryType, EvaluationId, EvaluationType,
    FetchId, ResourceEvaluationConstraint,
};
use crate::contract_violation;
use crate::error::Result;
use crate::external_resources;
use crate::resource::ResourceType;
use crate::resource_collection::{ResourceCollection, ResourceId};
use crate::resource_util;
use ahash::AHashSet;
use dom::{DocumentId, DomArena};
use std::collections::{BTreeSet, VecDeque};

/// Graph rooted at `primary`, populated from `dom` when there is one
pub fn build_browsing_context(
    resources: &ResourceCollection,
    primary: ResourceId,
    dom: Option<(&DomArena, DocumentId)>,
) -> Result<BrowsingContextGraph> {
    let mut graph = BrowsingContextGraph::new(resources, primary)?;
    if let Some((arena, top)) = dom {
        let top_context = graph.top_level();
        let mut factory = ContextFactory {
            resources,
            arena,
            graph: &mut graph,
            seen_documents: AHashSet::new(),
        };
        factory.populate(top_context, top)?;
    }
    tracing::debug!("Built {} browsing context(s)", graph.contexts().count());
    Ok(graph)
}

/// A URL waiting to be fetched in some context
struct PendingFetch {
    url: String,
    requestor: Option<EvaluationId>,
    /// `async` / `defer` of a `<script>` element
    script_attributes: Option<(bool, bool)>,
}

struct ContextFactory<'a> {
    resources: &'a ResourceCollection,
    arena: &'a DomArena,
    graph: &'a mut BrowsingContextGraph,
    seen_documents: AHashSet<DocumentId>,
}

impl ContextFactory<'_> {
    fn populate(&mut self, context: ContextId, document: DocumentId) -> Result<()> {
        if !self.seen_documents.insert(document) {
            tracing::warn!("DOM document {} is bound to more than one frame", document);
            return Ok(());
        }
        self.graph.set_dom_document(context, document)?;
        if let Some(document_resource) = self.graph.context(context).and_then(|c| c.document_resource()) {
            let fetch = self.graph.add_resource_fetch(self.resources, context, document_resource)?;
            self.set_discovery_type(fetch, DiscoveryType::Parser)?;
        }

        let doc = self.arena.document(document)?;
        let base = if doc.base_url.is_empty() {
            doc.document_url.as_str()
        } else {
            doc.base_url.as_str()
        };

        let mut pending = VecDeque::new();
        let mut frames = Vec::new();
        self.arena.traverse_df(document, |element| {
            if let Some(nested) = element.content_document_id {
                // the nested context fetches its own document
                frames.push(nested);
                return Ok(());
            }
            if let Some(url) = external_resources::element_url(element, base) {
                let script_attributes = element
                    .is_tag("SCRIPT")
                    .then(|| (element.attr("async").is_some(), element.attr("defer").is_some()));
                pending.push_back(PendingFetch {
                    url,
                    requestor: None,
                    script_attributes,
                });
            }
            Ok(())
        })?;

        let mut fetched = AHashSet::new();
        let mut last_blocking_script: Option<EvaluationId> = None;
        while let Some(next) = pending.pop_front() {
            let Some(id) = self.resources.id_for_url(&next.url) else {
                tracing::debug!("No captured resource for {}", next.url);
                continue;
            };
            if !fetched.insert(id) {
                continue;
            }
            let fetch = self.fetch_chain(context, id, next.requestor)?;
            let evaluation = self.evaluate(context, fetch)?;

            if let (Some(evaluation), Some((is_async, is_defer))) = (evaluation, next.script_attributes) {
                let graph = &mut *self.graph;
                let predecessor = last_blocking_script
                    .and_then(|id| graph.evaluation(id))
                    .map(|e| e.uri().to_string());
                let current = graph
                    .evaluation_mut(evaluation)
                    .ok_or_else(|| contract_violation!("Unknown evaluation {:?}", evaluation))?;
                current.set_is_async(is_async)?;
                current.set_is_defer(is_defer)?;
                if !is_async && !is_defer {
                    // parser-inserted scripts run in document order
                    if let Some(uri) = predecessor {
                        current.add_constraint(ResourceEvaluationConstraint::new(ConstraintType::Blocking, &uri))?;
                    }
                    last_blocking_script = Some(evaluation);
                }
            }

            let landed = self.graph.fetch(fetch).map(|f| f.resource());
            for url in landed.map(|id| self.referenced_urls(id)).unwrap_or_default() {
                pending.push_back(PendingFetch {
                    url,
                    requestor: evaluation,
                    script_attributes: None,
                });
            }
        }

        for nested in frames {
            let document_resource = self
                .resources
                .id_for_url(&self.arena.document(nested)?.document_url);
            let child = self
                .graph
                .add_nested_context(self.resources, context, document_resource)?;
            self.populate(child, nested)?;
        }
        Ok(())
    }

    fn set_discovery_type(&mut self, fetch: FetchId, discovery_type: DiscoveryType) -> Result<()> {
        self.graph
            .fetch_mut(fetch)
            .ok_or_else(|| contract_violation!("Unknown fetch {:?}", fetch))?
            .set_discovery_type(discovery_type)
    }

    /// One fetch per redirect hop starting at `resource`, each hop
    /// requested by the previous hop's evaluation. Returns the last fetch.
    fn fetch_chain(
        &mut self,
        context: ContextId,
        resource: ResourceId,
        requestor: Option<EvaluationId>,
    ) -> Result<FetchId> {
        let fetch = self.graph.add_resource_fetch(self.resources, context, resource)?;
        self.graph.set_fetch_requestor(fetch, requestor)?;
        // only the head is discovered; finalize gives the tail its type
        self.set_discovery_type(fetch, DiscoveryType::Parser)?;

        let mut visited = AHashSet::new();
        let (mut current, mut current_fetch) = (resource, fetch);
        while let Some(hop) = self.resources.get(current) {
            if hop.resource_type() != ResourceType::Redirect || !visited.insert(current) {
                break;
            }
            let Some(next) = resource_util::redirected_url(hop).and_then(|target| self.resources.id_for_url(&target))
            else {
                break;
            };
            if visited.contains(&next) {
                tracing::info!("Encountered redirect loop at {}", hop.request_url());
                break;
            }
            let redirect = self.graph.add_resource_evaluation(self.resources, context, current)?;
            self.graph.set_evaluation_fetch(redirect, current_fetch)?;
            let next_fetch = self.graph.add_resource_fetch(self.resources, context, next)?;
            self.graph.set_fetch_requestor(next_fetch, Some(redirect))?;
            current = next;
            current_fetch = next_fetch;
        }
        Ok(current_fetch)
    }

    /// Evaluation of the content `fetch` delivered, for scripts and
    /// stylesheets
    fn evaluate(&mut self, context: ContextId, fetch: FetchId) -> Result<Option<EvaluationId>> {
        let Some(resource) = self.graph.fetch(fetch).map(|f| f.resource()) else {
            return Err(contract_violation!("Unknown fetch {:?}", fetch));
        };
        let evaluation_type = match self.resources.get(resource).map(|r| r.resource_type()) {
            Some(ResourceType::Js) => EvaluationType::Script,
            Some(ResourceType::Css) => EvaluationType::Css,
            _ => return Ok(None),
        };
        let evaluation = self.graph.add_resource_evaluation(self.resources, context, resource)?;
        self.graph.set_evaluation_fetch(evaluation, fetch)?;
        self.graph
            .evaluation_mut(evaluation)
            .ok_or_else(|| contract_violation!("Unknown evaluation {:?}", evaluation))?
            .set_evaluation_type(evaluation_type)?;
        Ok(Some(evaluation))
    }

    /// URLs a stylesheet or HTML resource fetches from its own body
    fn referenced_urls(&self, id: ResourceId) -> BTreeSet<String> {
        let Some(resource) = self.resources.get(id) else {
            return BTreeSet::new();
        };
        let body = resource.response_body_text();
        match resource.resource_type() {
            ResourceType::Css => external_resources::css_urls(&body, resource.request_url()),
            ResourceType::Html => external_resources::html_urls(&body, resource.request_url()),
            _ => BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use dom::DomElement;

    fn resource(url: &str, content_type: &str, body: &str) -> Resource {
        let mut r = Resource::new();
        r.set_request_url(url);
        r.set_response_status_code(200);
        r.add_response_header("Content-Type", content_type);
        r.set_response_body(body);
        r
    }

    fn collection() -> ResourceCollection {
        let mut c = ResourceCollection::new();
        for r in [
            resource("http://a.com/", "text/html", ""),
            resource("http://a.com/main.css", "text/css", "@import 'more.css'; a { background: url(bg.png) }"),
            resource("http://a.com/more.css", "text/css", "b { }"),
            resource("http://a.com/bg.png", "image/png", "PNG"),
            resource("http://a.com/logo.png", "image/png", "PNG"),
            resource("http://b.com/frame.html", "text/html", ""),
            resource("http://b.com/f.js", "application/javascript", "f()"),
            resource("http://a.com/unused.js", "application/javascript", "u()"),
            resource("http://a.com/a.js", "application/javascript", "a()"),
            resource("http://a.com/b.js", "application/javascript", "b()"),
            resource("http://a.com/c.js", "application/javascript", "c()"),
        ] {
            assert!(c.add_resource(r));
        }
        let mut redirect = Resource::new();
        redirect.set_request_url("http://a.com/old-logo.png");
        redirect.set_response_status_code(302);
        redirect.add_response_header("Location", "http://a.com/logo.png");
        assert!(c.add_resource(redirect));
        c
    }

    fn dom() -> (DomArena, DocumentId) {
        let mut arena = DomArena::new();
        let top = arena.add_document("http://a.com/", "http://a.com/");
        let html = arena.add_element(top, DomElement::new(top, "html")).unwrap();
        arena.set_root(top, html).unwrap();
        let children = [
            DomElement::new(top, "link").with_attr("rel", "stylesheet").with_attr("href", "main.css"),
            DomElement::new(top, "img").with_attr("src", "/old-logo.png"),
            DomElement::new(top, "img").with_attr("src", "missing.png"),
            DomElement::new(top, "script").with_attr("src", "a.js"),
            DomElement::new(top, "script").with_attr("src", "b.js").with_attr("async", ""),
            DomElement::new(top, "script").with_attr("src", "c.js"),
        ];
        for element in children {
            let node = arena.add_element(top, element).unwrap();
            arena.append_child(html, node).unwrap();
        }
        let iframe = arena
            .add_element(top, DomElement::new(top, "iframe").with_attr("src", "http://b.com/frame.html"))
            .unwrap();
        arena.append_child(html, iframe).unwrap();

        let frame = arena.add_document("http://b.com/frame.html", "http://b.com/frame.html");
        let frame_root = arena.add_element(frame, DomElement::new(frame, "html")).unwrap();
        arena.set_root(frame, frame_root).unwrap();
        let script = arena
            .add_element(frame, DomElement::new(frame, "script").with_attr("src", "f.js"))
            .unwrap();
        arena.append_child(frame_root, script).unwrap();
        arena.set_content_document(iframe, frame).unwrap();
        (arena, top)
    }

    fn urls(c: &ResourceCollection, ids: impl Iterator<Item = ResourceId>) -> Vec<String> {
        let mut out: Vec<String> = ids
            .filter_map(|id| c.get(id))
            .map(|r| r.request_url().to_string())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_contexts_from_dom() {
        let c = collection();
        let (arena, top) = dom();
        let primary = c.id_for_url("http://a.com/").unwrap();
        let graph = build_browsing_context(&c, primary, Some((&arena, top))).unwrap();

        let top_context = graph.context(graph.top_level()).unwrap();
        assert_eq!(top_context.dom_document(), Some(top));
        assert_eq!(
            urls(&c, top_context.resources()),
            vec![
                "http://a.com/",
                "http://a.com/a.js",
                "http://a.com/b.js",
                "http://a.com/bg.png",
                "http://a.com/c.js",
                "http://a.com/logo.png",
                "http://a.com/main.css",
                "http://a.com/more.css",
                "http://a.com/old-logo.png",
            ]
        );

        assert_eq!(top_context.nested_contexts().len(), 1);
        let nested = graph.context(top_context.nested_contexts()[0]).unwrap();
        assert_eq!(nested.parent(), Some(graph.top_level()));
        assert_eq!(nested.document_resource(), c.id_for_url("http://b.com/frame.html"));
        assert_eq!(
            urls(&c, nested.resources()),
            vec!["http://b.com/f.js", "http://b.com/frame.html"]
        );
    }

    #[test]
    fn test_fetches_and_evaluations() {
        let c = collection();
        let (arena, top) = dom();
        let id = |url: &str| c.id_for_url(url).unwrap();
        let mut graph = build_browsing_context(&c, id("http://a.com/"), Some((&arena, top))).unwrap();
        let top_context = graph.context(graph.top_level()).unwrap();

        // one fetch per redirect hop, the target requested by the hop
        let old_logo = top_context.fetches_for(id("http://a.com/old-logo.png"))[0];
        let logo = top_context.fetches_for(id("http://a.com/logo.png"))[0];
        let hop = graph.requestor_of(logo).unwrap();
        assert_eq!(graph.fetch_of(hop), Some(old_logo));
        assert_eq!(graph.fetch(old_logo).unwrap().discovery_type(), DiscoveryType::Parser);
        assert_eq!(graph.fetch(logo).unwrap().discovery_type(), DiscoveryType::Unknown);
        assert!(top_context.evaluations_for(id("http://a.com/logo.png")).is_empty());

        // stylesheet references are requested by the stylesheet
        let main = top_context.evaluations_for(id("http://a.com/main.css"))[0];
        assert_eq!(graph.evaluation(main).unwrap().evaluation_type(), EvaluationType::Css);
        let more = top_context.fetches_for(id("http://a.com/more.css"))[0];
        assert_eq!(graph.requestor_of(more), Some(main));

        // c.js waits for a.js; async b.js waits for nothing
        let a = top_context.evaluations_for(id("http://a.com/a.js"))[0];
        let b = top_context.evaluations_for(id("http://a.com/b.js"))[0];
        let c_js = top_context.evaluations_for(id("http://a.com/c.js"))[0];
        assert_eq!(graph.predecessors_of(c_js), vec![a]);
        assert!(graph.predecessors_of(a).is_empty());
        assert!(graph.predecessors_of(b).is_empty());
        assert!(graph.evaluation(b).unwrap().is_async());
        assert_eq!(graph.evaluation(a).unwrap().evaluation_type(), EvaluationType::Script);

        let nested = graph.context(top_context.nested_contexts()[0]).unwrap();
        assert_eq!(nested.fetches_for(id("http://b.com/frame.html")).len(), 1);
        assert_eq!(nested.evaluations_for(id("http://b.com/f.js")).len(), 1);

        graph.finalize(&c).unwrap();
        // the redirect target now stands for the whole chain
        let logo_fetch = graph.fetch(logo).unwrap();
        assert_eq!(logo_fetch.discovery_type(), DiscoveryType::Parser);
        assert!(logo_fetch.redirect_download().is_some());
        assert!(graph.fetch(main_fetch(&graph, &c)).unwrap().redirect_download().is_none());
    }

    fn main_fetch(graph: &BrowsingContextGraph, c: &ResourceCollection) -> FetchId {
        let top_context = graph.context(graph.top_level()).unwrap();
        top_context.fetches_for(c.id_for_url("http://a.com/main.css").unwrap())[0]
    }

    #[test]
    fn test_without_dom() {
        let c = collection();
        let primary = c.id_for_url("http://a.com/").unwrap();
        let graph = build_browsing_context(&c, primary, None).unwrap();
        assert_eq!(graph.contexts().count(), 1);
        let top_context = graph.context(graph.top_level()).unwrap();
        assert_eq!(top_context.dom_document(), None);
        assert_eq!(urls(&c, top_context.resources()), vec!["http://a.com/"]);
    }
}
