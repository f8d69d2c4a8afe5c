//! Resource collection - owns every captured resource
//!
//! Resources live in a `Vec` addressed by `ResourceId`, with side indices
//! by canonical URL and by host, the same arena layout the DOM uses.
//! `freeze()` is one-way: afterwards the collection hands out shared
//! references only.

use crate::contract_violation;
use crate::error::Result;
use crate::filters::{AllowAllResourceFilter, ResourceFilter};
use crate::resource::Resource;
use crate::uri_util;
use ahash::AHashMap;

/// Index of a resource in its collection (insertion order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub struct ResourceCollection {
    resources: Vec<Resource>,
    url_index: AHashMap<String, ResourceId>,
    host_index: AHashMap<String, Vec<ResourceId>>,
    filter: Box<dyn ResourceFilter>,
    allow_duplicates: bool,
    request_order: Option<Vec<ResourceId>>,
    frozen: bool,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::with_filter(Box::new(AllowAllResourceFilter))
    }

    pub fn with_filter(filter: Box<dyn ResourceFilter>) -> Self {
        Self {
            resources: Vec::new(),
            url_index: AHashMap::new(),
            host_index: AHashMap::new(),
            filter,
            allow_duplicates: false,
            request_order: None,
            frozen: false,
        }
    }

    /// Accept several resources with the same URL. URL lookup then
    /// returns the first one added.
    pub fn set_allow_duplicate_resources(&mut self, allow: bool) {
        if self.frozen {
            contract_violation!("Can't change duplicate policy of a frozen ResourceCollection");
            return;
        }
        self.allow_duplicates = allow;
    }

    fn is_valid_resource(&self, resource: &Resource) -> bool {
        let url = resource.request_url();
        if url.is_empty() {
            tracing::warn!("Refusing resource with empty URL");
            return false;
        }
        if !self.allow_duplicates && self.has_resource_with_url(url) {
            tracing::info!("Ignoring duplicate resource at \"{}\"", url);
            return false;
        }
        if resource.response_status_code() <= 0 {
            tracing::warn!(
                "Refusing resource with invalid status code {}: {}",
                resource.response_status_code(),
                url
            );
            return false;
        }
        if !self.filter.is_accepted(resource) {
            tracing::debug!("Resource filter rejected {}", url);
            return false;
        }
        true
    }

    /// Take ownership of `resource`. Returns false (and drops it) when
    /// it is rejected.
    pub fn add_resource(&mut self, resource: Resource) -> bool {
        if self.frozen {
            contract_violation!(
                "Can't add resource {} to frozen ResourceCollection",
                resource.request_url()
            );
            return false;
        }
        if !self.is_valid_resource(&resource) {
            return false;
        }

        let id = ResourceId(self.resources.len() as u32);
        self.url_index
            .entry(resource.request_url().to_string())
            .or_insert(id);
        self.host_index
            .entry(resource.host().unwrap_or_default())
            .or_default()
            .push(id);
        self.resources.push(resource);
        true
    }

    /// Make the collection read-only and compute the request order
    ///
    /// The request order exists only when every resource has a start time.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Err(contract_violation!("ResourceCollection frozen twice"));
        }

        let all_timed = self
            .resources
            .iter()
            .all(|r| r.request_start_time_millis().is_some());
        if all_timed && !self.resources.is_empty() {
            let mut order: Vec<ResourceId> = (0..self.resources.len() as u32).map(ResourceId).collect();
            // stable: ties keep insertion order
            order.sort_by_key(|id| self.resources[id.index()].request_start_time_millis());
            self.request_order = Some(order);
        }

        self.frozen = true;
        tracing::debug!("Froze ResourceCollection with {} resources", self.resources.len());
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.index())
    }

    /// Mutable access, only before freeze
    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        if self.frozen {
            contract_violation!("Can't mutate resource {:?} of a frozen ResourceCollection", id);
            return None;
        }
        self.resources.get_mut(id.index())
    }

    /// Resources in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, r)| (ResourceId(i as u32), r))
    }

    pub fn has_resource_with_url(&self, url: &str) -> bool {
        self.id_for_url(url).is_some()
    }

    /// Lookup by URL; the argument is canonicalized first
    pub fn id_for_url(&self, url: &str) -> Option<ResourceId> {
        self.url_index
            .get(url)
            .or_else(|| self.url_index.get(&uri_util::canonicalize_url(url)))
            .copied()
    }

    pub fn resource_with_url(&self, url: &str) -> Option<&Resource> {
        self.id_for_url(url).and_then(|id| self.get(id))
    }

    pub fn resources_with_host(&self, host: &str) -> &[ResourceId] {
        self.host_index
            .get(&host.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resources sorted by request start time, if every resource has one
    pub fn resources_in_request_order(&self) -> Option<&[ResourceId]> {
        if !self.frozen {
            contract_violation!("Request order requested before freeze");
            return None;
        }
        self.request_order.as_deref()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.host_index.keys().map(String::as_str)
    }
}

impl Default for ResourceCollection {
    fn default() -> Self {
        Self::new()
    }
}
