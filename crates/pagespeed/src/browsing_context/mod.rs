//! Browsing-context graph
//!
//! The top-level page and each navigated iframe is a `BrowsingContext`.
//! Contexts, fetches and evaluations all live in one `BrowsingContextGraph`
//! arena and point at each other by id or by action URI, never by
//! reference, so the graph is torn down as a unit.
//!
//! Action URIs (`fetch://http/www.example.com/a.js#2`) give every node a
//! stable, serializable name. Cross-links that the capturing host sets up
//! (requestor, fetch, constraint predecessor) are stored as URIs and
//! resolved through the graph's indices.

mod evaluation;
mod factory;
mod fetch;

pub use evaluation::{
    ConstraintType, EvaluationType, ResourceEvaluation, ResourceEvaluationConstraint,
};
pub use factory::build_browsing_context;
pub use fetch::{
    CodeLocation, DelayKind, DiscoveryType, ResourceFetch, ResourceFetchDelay,
    ResourceFetchDownload, Timestamp,
};

use crate::contract_violation;
use crate::error::Result;
use crate::resource::ResourceType;
use crate::resource_collection::{ResourceCollection, ResourceId};
use crate::resource_util;
use crate::uri_util::{self, ActionKind};
use ahash::{AHashMap, AHashSet};
use dom::DocumentId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvaluationId(pub u32);

/// Hands out `#1`, `#2`, ... per (kind, resource URL)
#[derive(Debug, Default)]
struct ActionUriGenerator {
    sequence: AHashMap<(ActionKind, String), u32>,
}

impl ActionUriGenerator {
    fn generate(&mut self, kind: ActionKind, url: &str) -> Option<String> {
        let next = self.sequence.entry((kind, url.to_string())).or_insert(1);
        let sequence = *next;
        *next += 1;
        uri_util::action_uri(kind, url, sequence)
    }
}

#[derive(Debug, Clone)]
pub struct BrowsingContext {
    uri: String,
    parent: Option<ContextId>,
    document_resource: Option<ResourceId>,
    dom_document: Option<DocumentId>,
    nested: Vec<ContextId>,
    resources: BTreeSet<ResourceId>,
    fetches: BTreeMap<ResourceId, Vec<FetchId>>,
    evaluations: BTreeMap<ResourceId, Vec<EvaluationId>>,
    event_dom_content: Option<Timestamp>,
    event_load: Option<Timestamp>,
    finalized: bool,
}

impl BrowsingContext {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    pub fn document_resource(&self) -> Option<ResourceId> {
        self.document_resource
    }

    pub fn dom_document(&self) -> Option<DocumentId> {
        self.dom_document
    }

    pub fn nested_contexts(&self) -> &[ContextId] {
        &self.nested
    }

    /// Every resource registered here, including followed redirect targets
    pub fn resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.iter().copied()
    }

    pub fn fetches_for(&self, resource: ResourceId) -> &[FetchId] {
        self.fetches.get(&resource).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn evaluations_for(&self, resource: ResourceId) -> &[EvaluationId] {
        self.evaluations
            .get(&resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn event_dom_content(&self) -> Option<Timestamp> {
        self.event_dom_content
    }

    pub fn event_load(&self) -> Option<Timestamp> {
        self.event_load
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn check_mutable(&self) -> Result<()> {
        if self.finalized {
            return Err(contract_violation!(
                "Attempting to modify finalized BrowsingContext {}",
                self.uri
            ));
        }
        Ok(())
    }
}

pub struct BrowsingContextGraph {
    contexts: Vec<BrowsingContext>,
    fetches: Vec<ResourceFetch>,
    evaluations: Vec<ResourceEvaluation>,
    uri_generator: ActionUriGenerator,
    context_by_uri: AHashMap<String, ContextId>,
    fetch_by_uri: AHashMap<String, FetchId>,
    evaluation_by_uri: AHashMap<String, EvaluationId>,
    finalized: bool,
}

impl BrowsingContextGraph {
    /// Top-level context of the page whose document is `document_resource`
    pub fn new(resources: &ResourceCollection, document_resource: ResourceId) -> Result<Self> {
        let mut graph = Self {
            contexts: Vec::new(),
            fetches: Vec::new(),
            evaluations: Vec::new(),
            uri_generator: ActionUriGenerator::default(),
            context_by_uri: AHashMap::new(),
            fetch_by_uri: AHashMap::new(),
            evaluation_by_uri: AHashMap::new(),
            finalized: false,
        };
        graph.create_context(resources, None, Some(document_resource))?;
        Ok(graph)
    }

    pub fn top_level(&self) -> ContextId {
        ContextId(0)
    }

    pub fn context(&self, id: ContextId) -> Option<&BrowsingContext> {
        self.contexts.get(id.0 as usize)
    }

    pub fn fetch(&self, id: FetchId) -> Option<&ResourceFetch> {
        self.fetches.get(id.0 as usize)
    }

    pub fn evaluation(&self, id: EvaluationId) -> Option<&ResourceEvaluation> {
        self.evaluations.get(id.0 as usize)
    }

    /// Mutable fetch for the capturing host to fill in
    pub fn fetch_mut(&mut self, id: FetchId) -> Option<&mut ResourceFetch> {
        self.fetches.get_mut(id.0 as usize)
    }

    pub fn evaluation_mut(&mut self, id: EvaluationId) -> Option<&mut ResourceEvaluation> {
        self.evaluations.get_mut(id.0 as usize)
    }

    pub fn contexts(&self) -> impl Iterator<Item = (ContextId, &BrowsingContext)> {
        self.contexts
            .iter()
            .enumerate()
            .map(|(i, c)| (ContextId(i as u32), c))
    }

    pub fn find_context(&self, uri: &str) -> Option<ContextId> {
        self.context_by_uri.get(uri).copied()
    }

    pub fn find_fetch(&self, uri: &str) -> Option<FetchId> {
        self.fetch_by_uri.get(uri).copied()
    }

    pub fn find_evaluation(&self, uri: &str) -> Option<EvaluationId> {
        self.evaluation_by_uri.get(uri).copied()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn context_mut(&mut self, id: ContextId) -> Result<&mut BrowsingContext> {
        let context = self
            .contexts
            .get_mut(id.0 as usize)
            .ok_or_else(|| contract_violation!("Unknown browsing context {:?}", id))?;
        context.check_mutable()?;
        Ok(context)
    }

    fn create_context(
        &mut self,
        resources: &ResourceCollection,
        parent: Option<ContextId>,
        document_resource: Option<ResourceId>,
    ) -> Result<ContextId> {
        // Name the context after the nearest document resource up the tree
        let mut named_by = document_resource;
        let mut cursor = parent;
        while named_by.is_none() {
            let Some(id) = cursor else { break };
            let ancestor = &self.contexts[id.0 as usize];
            named_by = ancestor.document_resource;
            cursor = ancestor.parent;
        }
        let url = named_by
            .and_then(|id| resources.get(id))
            .map(|r| r.request_url().to_string())
            .ok_or_else(|| {
                contract_violation!("No browsing context with an associated document resource")
            })?;
        let uri = self
            .uri_generator
            .generate(ActionKind::Context, &url)
            .ok_or_else(|| contract_violation!("Cannot build a context URI for {}", url))?;

        let id = ContextId(self.contexts.len() as u32);
        self.contexts.push(BrowsingContext {
            uri: uri.clone(),
            parent,
            document_resource,
            dom_document: None,
            nested: Vec::new(),
            resources: BTreeSet::new(),
            fetches: BTreeMap::new(),
            evaluations: BTreeMap::new(),
            event_dom_content: None,
            event_load: None,
            finalized: false,
        });
        self.context_by_uri.insert(uri, id);

        if let Some(resource) = document_resource {
            self.register_resource(resources, id, resource)?;
        }
        Ok(id)
    }

    /// Record that `resource` belongs to `context`, following redirects
    /// to the resources they land on.
    pub fn register_resource(
        &mut self,
        resources: &ResourceCollection,
        context: ContextId,
        resource: ResourceId,
    ) -> Result<()> {
        if resources.get(resource).is_none() {
            return Err(contract_violation!(
                "Cannot register resource {:?} which is not in the input",
                resource
            ));
        }

        let context = self.context_mut(context)?;
        context.resources.insert(resource);

        let mut visited = AHashSet::new();
        let mut candidate = resource;
        while let Some(current) = resources.get(candidate) {
            if current.resource_type() != ResourceType::Redirect {
                break;
            }
            if !visited.insert(candidate) {
                tracing::info!("Encountered redirect loop at {}", current.request_url());
                break;
            }
            let Some(next) = resource_util::redirected_url(current)
                .and_then(|target| resources.id_for_url(&target))
            else {
                break;
            };
            context.resources.insert(next);
            candidate = next;
        }
        Ok(())
    }

    /// Nested context for an iframe; `document_resource` is None for an
    /// iframe without a navigated document
    pub fn add_nested_context(
        &mut self,
        resources: &ResourceCollection,
        parent: ContextId,
        document_resource: Option<ResourceId>,
    ) -> Result<ContextId> {
        self.context_mut(parent)?;
        let id = self.create_context(resources, Some(parent), document_resource)?;
        self.contexts[parent.0 as usize].nested.push(id);
        Ok(id)
    }

    pub fn add_resource_fetch(
        &mut self,
        resources: &ResourceCollection,
        context: ContextId,
        resource: ResourceId,
    ) -> Result<FetchId> {
        self.register_resource(resources, context, resource)?;
        let url = resources
            .get(resource)
            .map(|r| r.request_url().to_string())
            .unwrap_or_default();
        let uri = self
            .uri_generator
            .generate(ActionKind::Fetch, &url)
            .ok_or_else(|| contract_violation!("Cannot build a fetch URI for {}", url))?;

        let id = FetchId(self.fetches.len() as u32);
        self.fetches.push(ResourceFetch::new(uri.clone(), resource));
        self.fetch_by_uri.insert(uri, id);
        self.context_mut(context)?
            .fetches
            .entry(resource)
            .or_default()
            .push(id);
        Ok(id)
    }

    pub fn add_resource_evaluation(
        &mut self,
        resources: &ResourceCollection,
        context: ContextId,
        resource: ResourceId,
    ) -> Result<EvaluationId> {
        self.register_resource(resources, context, resource)?;
        let url = resources
            .get(resource)
            .map(|r| r.request_url().to_string())
            .unwrap_or_default();
        let uri = self
            .uri_generator
            .generate(ActionKind::Eval, &url)
            .ok_or_else(|| contract_violation!("Cannot build an evaluation URI for {}", url))?;

        let id = EvaluationId(self.evaluations.len() as u32);
        self.evaluations.push(ResourceEvaluation::new(uri.clone(), resource));
        self.evaluation_by_uri.insert(uri, id);
        self.context_mut(context)?
            .evaluations
            .entry(resource)
            .or_default()
            .push(id);
        Ok(id)
    }

    pub fn set_event_dom_content_timing(&mut self, context: ContextId, tick: i64, msec: i64) -> Result<()> {
        self.context_mut(context)?.event_dom_content = Some(Timestamp::new(tick, msec));
        Ok(())
    }

    pub fn set_event_load_timing(&mut self, context: ContextId, tick: i64, msec: i64) -> Result<()> {
        self.context_mut(context)?.event_load = Some(Timestamp::new(tick, msec));
        Ok(())
    }

    pub fn set_dom_document(&mut self, context: ContextId, document: DocumentId) -> Result<()> {
        self.context_mut(context)?.dom_document = Some(document);
        Ok(())
    }

    /// Point `evaluation` at the fetch that delivered its content
    pub fn set_evaluation_fetch(&mut self, evaluation: EvaluationId, fetch: FetchId) -> Result<()> {
        let uri = self
            .fetch(fetch)
            .map(|f| f.uri().to_string())
            .ok_or_else(|| contract_violation!("Unknown fetch {:?}", fetch))?;
        self.evaluations
            .get_mut(evaluation.0 as usize)
            .ok_or_else(|| contract_violation!("Unknown evaluation {:?}", evaluation))?
            .set_fetch_uri(&uri)
    }

    /// Record which evaluation caused `fetch`
    pub fn set_fetch_requestor(&mut self, fetch: FetchId, requestor: Option<EvaluationId>) -> Result<()> {
        let uri = match requestor {
            Some(id) => Some(
                self.evaluation(id)
                    .map(|e| e.uri().to_string())
                    .ok_or_else(|| contract_violation!("Unknown evaluation {:?}", id))?,
            ),
            None => None,
        };
        self.fetches
            .get_mut(fetch.0 as usize)
            .ok_or_else(|| contract_violation!("Unknown fetch {:?}", fetch))?
            .download_mut()?
            .requestor_uri = uri;
        Ok(())
    }

    /// Evaluation that requested `fetch`, if any
    pub fn requestor_of(&self, fetch: FetchId) -> Option<EvaluationId> {
        self.fetch(fetch)
            .and_then(|f| f.requestor_uri())
            .and_then(|uri| self.find_evaluation(uri))
    }

    /// Fetch that delivered the content `evaluation` evaluated
    pub fn fetch_of(&self, evaluation: EvaluationId) -> Option<FetchId> {
        self.evaluation(evaluation)
            .and_then(|e| e.fetch_uri())
            .and_then(|uri| self.find_fetch(uri))
    }

    /// Predecessors named by the constraints of `evaluation`
    pub fn predecessors_of(&self, evaluation: EvaluationId) -> Vec<EvaluationId> {
        self.evaluation(evaluation)
            .map(|e| {
                e.constraints()
                    .iter()
                    .filter_map(|c| c.predecessor_uri.as_deref())
                    .filter_map(|uri| self.find_evaluation(uri))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Head of the redirect chain that ends in `fetch`
    ///
    /// Walks requestor evaluation to its fetch while that fetch is a
    /// redirect. A loop stops the walk at the fetch reached last.
    pub fn redirect_head(&self, resources: &ResourceCollection, fetch: FetchId) -> FetchId {
        let mut visited = AHashSet::new();
        let mut head = fetch;
        loop {
            if !visited.insert(head) {
                tracing::info!("Encountered redirect loop");
                break;
            }
            let Some(previous) = self.requestor_of(head).and_then(|e| self.fetch_of(e)) else {
                break;
            };
            let is_redirect = self
                .fetch(previous)
                .and_then(|f| resources.get(f.resource()))
                .map(|r| r.resource_type() == ResourceType::Redirect)
                .unwrap_or(false);
            if !is_redirect {
                break;
            }
            head = previous;
        }
        head
    }

    /// Finalize one fetch
    ///
    /// A fetch whose discovery type is still unknown and that ends a
    /// redirect chain takes over the chain head's start, requestor,
    /// discovery type, code locations and delays, keeping its own finish.
    pub fn finalize_fetch(&mut self, resources: &ResourceCollection, fetch: FetchId) -> Result<()> {
        let current = self
            .fetch(fetch)
            .ok_or_else(|| contract_violation!("Unknown fetch {:?}", fetch))?;
        if current.is_finalized() {
            return Err(contract_violation!(
                "Attempting to finalize ResourceFetch twice {}",
                current.uri()
            ));
        }

        if current.discovery_type() == DiscoveryType::Unknown {
            let head = self.redirect_head(resources, fetch);
            if head != fetch {
                let head = self.fetches[head.0 as usize].clone();
                self.fetches[fetch.0 as usize].splice_redirect_head(&head)?;
            }
        }
        self.fetches[fetch.0 as usize].mark_finalized()
    }

    fn finalize_context(&mut self, resources: &ResourceCollection, id: ContextId) -> Result<()> {
        let context = &self.contexts[id.0 as usize];
        if context.finalized {
            return Err(contract_violation!(
                "Attempting to finalize BrowsingContext twice {}",
                context.uri
            ));
        }
        let fetches: Vec<FetchId> = context.fetches.values().flatten().copied().collect();
        let evaluations: Vec<EvaluationId> =
            context.evaluations.values().flatten().copied().collect();
        let nested = context.nested.clone();

        for fetch in fetches {
            if !self.fetches[fetch.0 as usize].is_finalized() {
                self.finalize_fetch(resources, fetch)?;
            }
        }
        for evaluation in evaluations {
            let evaluation = &mut self.evaluations[evaluation.0 as usize];
            if !evaluation.is_finalized() {
                evaluation.mark_finalized()?;
            }
        }
        for child in nested {
            self.finalize_context(resources, child)?;
        }

        self.contexts[id.0 as usize].finalized = true;
        Ok(())
    }

    /// Finalize every context, fetch and evaluation. Runs once.
    pub fn finalize(&mut self, resources: &ResourceCollection) -> Result<()> {
        if self.finalized {
            return Err(contract_violation!("BrowsingContextGraph finalized twice"));
        }
        self.finalize_context(resources, self.top_level())?;
        self.finalized = true;
        tracing::debug!(
            "Finalized browsing contexts: {} contexts, {} fetches, {} evaluations",
            self.contexts.len(),
            self.fetches.len(),
            self.evaluations.len()
        );
        Ok(())
    }
}
