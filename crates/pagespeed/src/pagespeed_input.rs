//! Everything one analysis run looks at
//!
//! `PagespeedInput` is built up mutably (resources, DOM, browsing
//! contexts, timeline), then frozen. Freezing computes the
//! `InputInformation` summary rules score against.

use crate::browsing_context::{self, BrowsingContextGraph};
use crate::config::ClientCharacteristics;
use crate::contract_violation;
use crate::error::Result;
use crate::filters::ResourceFilter;
use crate::resource::{Resource, ResourceType};
use crate::resource_collection::{ResourceCollection, ResourceId};
use crate::resource_util;
use crate::timeline::InstrumentationData;
use crate::uri_util;
use dom::{DocumentId, DomArena};
use serde::{Deserialize, Serialize};

/// Totals over the frozen input, plus the client they are weighed for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputInformation {
    pub number_resources: i32,
    pub number_hosts: i32,
    pub total_request_bytes: i64,
    pub number_static_resources: i32,
    pub html_response_bytes: i64,
    pub css_response_bytes: i64,
    pub js_response_bytes: i64,
    pub image_response_bytes: i64,
    pub text_response_bytes: i64,
    pub flash_response_bytes: i64,
    pub other_response_bytes: i64,
    pub client_characteristics: ClientCharacteristics,
}

impl InputInformation {
    fn compute(resources: &ResourceCollection, client: &ClientCharacteristics) -> Self {
        let mut info = InputInformation {
            number_resources: resources.len() as i32,
            number_hosts: resources.hosts().count() as i32,
            client_characteristics: client.clone(),
            ..Default::default()
        };
        for (_, resource) in resources.iter() {
            info.total_request_bytes += resource_util::estimate_request_bytes(resource) as i64;
            if resource_util::is_likely_static_resource(resource) {
                info.number_static_resources += 1;
            }
            let bytes = resource.response_body().len() as i64;
            match resource.resource_type() {
                ResourceType::Html => info.html_response_bytes += bytes,
                ResourceType::Css => info.css_response_bytes += bytes,
                ResourceType::Js => info.js_response_bytes += bytes,
                ResourceType::Image => info.image_response_bytes += bytes,
                ResourceType::Text => info.text_response_bytes += bytes,
                ResourceType::Flash => info.flash_response_bytes += bytes,
                ResourceType::Redirect | ResourceType::Other => info.other_response_bytes += bytes,
            }
        }
        info
    }
}

pub struct PagespeedInput {
    resources: ResourceCollection,
    dom: Option<(DomArena, DocumentId)>,
    browsing_context: Option<BrowsingContextGraph>,
    timeline: Vec<InstrumentationData>,
    primary_resource_url: Option<String>,
    onload_millis: Option<i64>,
    client: ClientCharacteristics,
    info: InputInformation,
    frozen: bool,
}

impl PagespeedInput {
    pub fn new() -> Self {
        Self::with_collection(ResourceCollection::new())
    }

    /// Input whose collection only admits what `filter` accepts
    pub fn with_filter(filter: Box<dyn ResourceFilter>) -> Self {
        Self::with_collection(ResourceCollection::with_filter(filter))
    }

    fn with_collection(resources: ResourceCollection) -> Self {
        Self {
            resources,
            dom: None,
            browsing_context: None,
            timeline: Vec::new(),
            primary_resource_url: None,
            onload_millis: None,
            client: ClientCharacteristics::default(),
            info: InputInformation::default(),
            frozen: false,
        }
    }

    fn check_mutable(&self, what: &str) -> bool {
        if self.frozen {
            contract_violation!("Can't {} on a frozen PagespeedInput", what);
            return false;
        }
        true
    }

    /// Returns false when the resource was rejected
    pub fn add_resource(&mut self, resource: Resource) -> bool {
        if !self.check_mutable("add a resource") {
            return false;
        }
        self.resources.add_resource(resource)
    }

    pub fn set_allow_duplicate_resources(&mut self, allow: bool) {
        if self.check_mutable("change the duplicate policy") {
            self.resources.set_allow_duplicate_resources(allow);
        }
    }

    pub fn resources(&self) -> &ResourceCollection {
        &self.resources
    }

    /// The resource the page was loaded from. Stored canonicalized.
    pub fn set_primary_resource_url(&mut self, url: &str) -> bool {
        if !self.check_mutable("set the primary resource") {
            return false;
        }
        self.primary_resource_url = Some(uri_util::canonicalize_url(url));
        true
    }

    pub fn primary_resource_url(&self) -> Option<&str> {
        self.primary_resource_url.as_deref()
    }

    pub fn primary_resource_id(&self) -> Option<ResourceId> {
        self.primary_resource_url
            .as_deref()
            .and_then(|url| self.resources.id_for_url(url))
    }

    pub fn set_dom(&mut self, arena: DomArena, document: DocumentId) -> bool {
        if !self.check_mutable("set the DOM") {
            return false;
        }
        self.dom = Some((arena, document));
        true
    }

    /// DOM arena plus the top-level document
    pub fn dom(&self) -> Option<(&DomArena, DocumentId)> {
        self.dom.as_ref().map(|(arena, doc)| (arena, *doc))
    }

    pub fn set_browsing_context(&mut self, graph: BrowsingContextGraph) -> bool {
        if !self.check_mutable("set the browsing context") {
            return false;
        }
        self.browsing_context = Some(graph);
        true
    }

    /// Build the browsing-context graph from the primary resource and the
    /// DOM, when no graph was set. Returns whether a graph was built.
    pub fn build_browsing_context(&mut self) -> Result<bool> {
        if !self.check_mutable("build the browsing context") || self.browsing_context.is_some() {
            return Ok(false);
        }
        let Some(primary) = self.primary_resource_id() else {
            tracing::debug!("No primary resource, skipping browsing context");
            return Ok(false);
        };
        let graph = browsing_context::build_browsing_context(&self.resources, primary, self.dom())?;
        self.browsing_context = Some(graph);
        Ok(true)
    }

    pub fn browsing_context(&self) -> Option<&BrowsingContextGraph> {
        self.browsing_context.as_ref()
    }

    pub fn set_timeline(&mut self, timeline: Vec<InstrumentationData>) -> bool {
        if !self.check_mutable("set the timeline") {
            return false;
        }
        self.timeline = timeline;
        true
    }

    pub fn timeline(&self) -> &[InstrumentationData] {
        &self.timeline
    }

    /// When the page's onload event fired, on the request start clock
    pub fn set_onload_time_millis(&mut self, millis: i64) -> bool {
        if !self.check_mutable("set the onload time") {
            return false;
        }
        if millis < 0 {
            tracing::warn!("Ignoring negative onload time {}", millis);
            return false;
        }
        self.onload_millis = Some(millis);
        true
    }

    pub fn onload_time_millis(&self) -> Option<i64> {
        self.onload_millis
    }

    /// Marked lazy-loaded, or requested after onload when both times are known
    pub fn is_resource_loaded_after_onload(&self, resource: &Resource) -> bool {
        if resource.is_lazy_loaded() {
            return true;
        }
        match (self.onload_millis, resource.request_start_time_millis()) {
            (Some(onload), Some(start)) => start > onload,
            _ => false,
        }
    }

    pub fn set_client_characteristics(&mut self, client: ClientCharacteristics) -> bool {
        if !self.check_mutable("set client characteristics") {
            return false;
        }
        self.client = client;
        true
    }

    pub fn client_characteristics(&self) -> &ClientCharacteristics {
        &self.client
    }

    /// Freeze resources, finalize the browsing-context graph and compute
    /// the input summary. Runs once.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Err(contract_violation!("PagespeedInput frozen twice"));
        }
        self.resources.freeze()?;
        if let Some(graph) = self.browsing_context.as_mut() {
            graph.finalize(&self.resources)?;
        }
        self.info = InputInformation::compute(&self.resources, &self.client);
        self.frozen = true;
        tracing::debug!(
            "Froze PagespeedInput: {} resources on {} hosts",
            self.info.number_resources,
            self.info.number_hosts
        );
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Totals, valid once frozen
    pub fn input_information(&self) -> &InputInformation {
        if !self.frozen {
            contract_violation!("InputInformation requested before freeze");
        }
        &self.info
    }

    pub fn resource_with_url(&self, url: &str) -> Option<&Resource> {
        self.resources.resource_with_url(url)
    }

    pub fn resources_with_host(&self, host: &str) -> &[ResourceId] {
        self.resources.resources_with_host(host)
    }
}

impl Default for PagespeedInput {
    fn default() -> Self {
        Self::new()
    }
}
