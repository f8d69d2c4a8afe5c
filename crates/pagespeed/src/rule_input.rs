//! Derived, cached view of a frozen input shared by every rule
//!
//! Redirect chains are computed once by `init()`. Compressed body sizes
//! are computed on first request and memoized for the lifetime of the
//! `RuleInput`; the cache never looks at the resource again, so it keeps
//! reporting the size of the body it first saw.

use crate::contract_violation;
use crate::error::Result;
use crate::pagespeed_input::PagespeedInput;
use crate::resource::Resource;
use crate::resource_collection::{ResourceCollection, ResourceId};
use crate::resource_util;
use ahash::{AHashMap, AHashSet};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};

/// Resources linked by redirects, source first
pub type RedirectChain = Vec<ResourceId>;

pub struct RuleInput<'a> {
    input: &'a PagespeedInput,
    redirect_chains: Vec<RedirectChain>,
    chain_of: AHashMap<ResourceId, usize>,
    compressed_sizes: DashMap<ResourceId, usize>,
    initialized: bool,
}

impl<'a> RuleInput<'a> {
    pub fn new(input: &'a PagespeedInput) -> Self {
        if !input.is_frozen() {
            contract_violation!("Passed non-frozen PagespeedInput to RuleInput");
        }
        Self {
            input,
            redirect_chains: Vec::new(),
            chain_of: AHashMap::new(),
            compressed_sizes: DashMap::new(),
            initialized: false,
        }
    }

    /// Build the redirect chains. Must run once before rules read them.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(contract_violation!("RuleInput initialized twice"));
        }
        self.redirect_chains = RedirectGraph::build(self.input.resources()).into_chains();
        for (index, chain) in self.redirect_chains.iter().enumerate() {
            for id in chain {
                self.chain_of.insert(*id, index);
            }
        }
        self.initialized = true;
        tracing::debug!("Found {} redirect chains", self.redirect_chains.len());
        Ok(())
    }

    fn check_initialized(&self) -> bool {
        if !self.initialized {
            contract_violation!("RuleInput used before init()");
            return false;
        }
        true
    }

    pub fn pagespeed_input(&self) -> &'a PagespeedInput {
        self.input
    }

    pub fn resources(&self) -> &'a ResourceCollection {
        self.input.resources()
    }

    pub fn resource(&self, id: ResourceId) -> Option<&'a Resource> {
        self.input.resources().get(id)
    }

    pub fn redirect_chains(&self) -> &[RedirectChain] {
        if !self.check_initialized() {
            return &[];
        }
        &self.redirect_chains
    }

    /// The chain `id` takes part in, if any
    pub fn redirect_chain_of(&self, id: ResourceId) -> Option<&[ResourceId]> {
        if !self.check_initialized() {
            return None;
        }
        self.chain_of
            .get(&id)
            .map(|&index| self.redirect_chains[index].as_slice())
    }

    /// Where following redirects from `id` ends up; `id` itself when it
    /// is not part of a chain
    pub fn final_redirect_target(&self, id: ResourceId) -> ResourceId {
        self.redirect_chain_of(id)
            .and_then(|chain| chain.last().copied())
            .unwrap_or(id)
    }

    /// Body size after gzip for compressible or already-compressed
    /// resources, raw size otherwise. Memoized per resource.
    pub fn compressed_response_body_size(&self, id: ResourceId) -> Result<usize> {
        if let Some(size) = self.compressed_sizes.get(&id) {
            return Ok(*size);
        }
        let resource = self
            .resource(id)
            .ok_or_else(|| contract_violation!("Unknown resource {:?}", id))?;
        let body = resource.response_body();
        let size = if resource_util::is_compressible_resource(resource)
            || resource_util::is_compressed_resource(resource)
        {
            resource_util::gzip_size(body)?
        } else {
            body.len()
        };
        Ok(*self.compressed_sizes.entry(id).or_insert(size))
    }
}

/// Redirect edges keyed by source URL
struct RedirectGraph<'c> {
    resources: &'c ResourceCollection,
    targets: BTreeMap<String, Vec<String>>,
    destinations: BTreeSet<String>,
    processed: AHashSet<String>,
}

impl<'c> RedirectGraph<'c> {
    fn build(resources: &'c ResourceCollection) -> Self {
        let mut graph = Self {
            resources,
            targets: BTreeMap::new(),
            destinations: BTreeSet::new(),
            processed: AHashSet::new(),
        };
        for (_, resource) in resources.iter() {
            if let Some(destination) = resource_util::redirected_url(resource) {
                graph
                    .targets
                    .entry(resource.request_url().to_string())
                    .or_default()
                    .push(destination.clone());
                graph.destinations.insert(destination);
            }
        }
        graph
    }

    /// Sources that nothing redirects to come first; the rest are only
    /// roots for pure loops
    fn prioritized_roots(&self) -> Vec<String> {
        let (primary, secondary): (Vec<&String>, Vec<&String>) = self
            .targets
            .keys()
            .partition(|source| !self.destinations.contains(*source));
        primary.into_iter().chain(secondary).cloned().collect()
    }

    fn into_chains(mut self) -> Vec<RedirectChain> {
        let mut chains = Vec::new();
        for root in self.prioritized_roots() {
            if self.processed.contains(&root) {
                continue;
            }
            chains.push(self.chain_from(root));
        }
        chains
    }

    /// Depth-first walk; a revisited URL is appended once more so loops
    /// show up as `a, b, a`
    fn chain_from(&mut self, root: String) -> RedirectChain {
        let mut chain = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let Some(id) = self.resources.id_for_url(&current) else {
                tracing::info!("Unable to find resource with URL {}", current);
                continue;
            };
            chain.push(id);

            if !self.processed.insert(current.clone()) {
                continue;
            }
            if let Some(targets) = self.targets.get(&current) {
                stack.extend(targets.iter().rev().cloned());
            }
        }
        chain
    }
}
