//! Filter algebra
//!
//! Small predicates deciding which resources enter the input and which
//! results reach the report. Composites own their children, so a whole
//! filter tree is one `Box<dyn ResourceFilter>`.

mod ad;
mod landing_page;
mod protocol;
mod response_bytes;
mod tracker;
mod url_regex;

pub use ad::AdFilter;
pub use landing_page::LandingPageRedirectionFilter;
pub use protocol::ProtocolResourceFilter;
pub use response_bytes::ResponseByteResultFilter;
pub use tracker::TrackerFilter;
pub use url_regex::UrlRegexResourceFilter;

use crate::resource::Resource;
use crate::results::Finding;

/// Decides whether a resource is in scope
pub trait ResourceFilter: Send + Sync {
    fn is_accepted(&self, resource: &Resource) -> bool;
}

/// Decides whether a finding is reported
pub trait ResultFilter: Send + Sync {
    fn is_accepted(&self, finding: &Finding) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllResourceFilter;

impl ResourceFilter for AllowAllResourceFilter {
    fn is_accepted(&self, _resource: &Resource) -> bool {
        true
    }
}

pub struct NotResourceFilter {
    base: Box<dyn ResourceFilter>,
}

impl NotResourceFilter {
    pub fn new(base: Box<dyn ResourceFilter>) -> Self {
        Self { base }
    }
}

impl ResourceFilter for NotResourceFilter {
    fn is_accepted(&self, resource: &Resource) -> bool {
        !self.base.is_accepted(resource)
    }
}

/// Accepts when both children accept. The second child is not consulted
/// when the first rejects.
pub struct AndResourceFilter {
    first: Box<dyn ResourceFilter>,
    second: Box<dyn ResourceFilter>,
}

impl AndResourceFilter {
    pub fn new(first: Box<dyn ResourceFilter>, second: Box<dyn ResourceFilter>) -> Self {
        Self { first, second }
    }
}

impl ResourceFilter for AndResourceFilter {
    fn is_accepted(&self, resource: &Resource) -> bool {
        self.first.is_accepted(resource) && self.second.is_accepted(resource)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAcceptResultFilter;

impl ResultFilter for AlwaysAcceptResultFilter {
    fn is_accepted(&self, _finding: &Finding) -> bool {
        true
    }
}

pub struct AndResultFilter {
    first: Box<dyn ResultFilter>,
    second: Box<dyn ResultFilter>,
}

impl AndResultFilter {
    pub fn new(first: Box<dyn ResultFilter>, second: Box<dyn ResultFilter>) -> Self {
        Self { first, second }
    }
}

impl ResultFilter for AndResultFilter {
    fn is_accepted(&self, finding: &Finding) -> bool {
        self.first.is_accepted(finding) && self.second.is_accepted(finding)
    }
}

/// Build the resource filter for the part of the page the host wants analyzed
///
/// - `"ads"`: only ads
/// - `"trackers"`: only trackers
/// - `"content"`: everything except ads and trackers
/// - `"all"` (or anything unknown): everything
pub fn resource_filter_from_name(name: &str) -> Box<dyn ResourceFilter> {
    match name {
        "ads" => Box::new(NotResourceFilter::new(Box::new(AdFilter::new()))),
        "trackers" => Box::new(NotResourceFilter::new(Box::new(TrackerFilter::new()))),
        "content" => Box::new(AndResourceFilter::new(
            Box::new(AdFilter::new()),
            Box::new(TrackerFilter::new()),
        )),
        "all" => Box::new(AllowAllResourceFilter),
        other => {
            tracing::warn!("Unknown resource filter name '{}', using 'all'", other);
            Box::new(AllowAllResourceFilter)
        }
    }
}
