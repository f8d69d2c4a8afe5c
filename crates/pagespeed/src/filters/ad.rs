use super::ResourceFilter;
use crate::resource::Resource;
use regex::RegexSet;

/// URL patterns of well-known ad networks and ad servers
const AD_PATTERNS: &[&str] = &[
    r"^https?://([^/]+\.)?doubleclick\.net/",
    r"^https?://([^/]+\.)?googlesyndication\.com/",
    r"^https?://([^/]+\.)?googleadservices\.com/",
    r"^https?://([^/]+\.)?2mdn\.net/",
    r"^https?://([^/]+\.)?adnxs\.com/",
    r"^https?://([^/]+\.)?advertising\.com/",
    r"^https?://([^/]+\.)?amazon-adsystem\.com/",
    r"^https?://([^/]+\.)?atdmt\.com/",
    r"^https?://([^/]+\.)?yieldmanager\.com/",
    r"^https?://([^/]+\.)?serving-sys\.com/",
    r"^https?://([^/]+\.)?adform\.net/",
    r"^https?://([^/]+\.)?criteo\.(com|net)/",
    r"^https?://([^/]+\.)?adbrite\.com/",
    r"^https?://([^/]+\.)?admob\.com/",
    r"^https?://ads?\.[^/]+/",
    r"^https?://[^/]+/(pagead|adserver|adframe)/",
];

/// Accepts resources that are NOT served by a known ad network
pub struct AdFilter {
    patterns: Option<RegexSet>,
}

impl AdFilter {
    pub fn new() -> Self {
        let patterns = match RegexSet::new(AD_PATTERNS) {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::error!("Ad patterns failed to compile: {}", e);
                None
            }
        };
        Self { patterns }
    }

    pub fn is_ad(&self, url: &str) -> bool {
        self.patterns
            .as_ref()
            .map(|set| set.is_match(&url.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

impl Default for AdFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFilter for AdFilter {
    fn is_accepted(&self, resource: &Resource) -> bool {
        !self.is_ad(resource.request_url())
    }
}
