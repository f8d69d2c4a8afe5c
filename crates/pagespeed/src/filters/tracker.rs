use super::ResourceFilter;
use crate::resource::Resource;
use regex::RegexSet;

/// URL patterns of well-known analytics and tracking services
const TRACKER_PATTERNS: &[&str] = &[
    r"^https?://([^/]+\.)?google-analytics\.com/",
    r"^https?://stats\.g\.doubleclick\.net/",
    r"^https?://([^/]+\.)?quantserve\.com/",
    r"^https?://([^/]+\.)?scorecardresearch\.com/",
    r"^https?://([^/]+\.)?2o7\.net/",
    r"^https?://([^/]+\.)?omtrdc\.net/",
    r"^https?://([^/]+\.)?chartbeat\.(com|net)/",
    r"^https?://([^/]+\.)?hotjar\.com/",
    r"^https?://([^/]+\.)?statcounter\.com/",
    r"^https?://([^/]+\.)?imrworldwide\.com/",
    r"^https?://([^/]+\.)?nr-data\.net/",
    r"^https?://([^/]+\.)?facebook\.com/tr[/?]",
    r"^https?://[^/]+/(urchin|ga)\.js",
];

/// Accepts resources that are NOT served by a known tracker
pub struct TrackerFilter {
    patterns: Option<RegexSet>,
}

impl TrackerFilter {
    pub fn new() -> Self {
        let patterns = match RegexSet::new(TRACKER_PATTERNS) {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::error!("Tracker patterns failed to compile: {}", e);
                None
            }
        };
        Self { patterns }
    }

    pub fn is_tracker(&self, url: &str) -> bool {
        self.patterns
            .as_ref()
            .map(|set| set.is_match(&url.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

impl Default for TrackerFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFilter for TrackerFilter {
    fn is_accepted(&self, resource: &Resource) -> bool {
        !self.is_tracker(resource.request_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(TrackerFilter::new().patterns.is_some());
    }

    #[test]
    fn test_is_tracker() {
        let filter = TrackerFilter::new();
        assert!(filter.is_tracker("http://www.google-analytics.com/ga.js"));
        assert!(filter.is_tracker("http://b.scorecardresearch.com/beacon.js"));
        assert!(filter.is_tracker("https://www.facebook.com/tr?id=1"));
        assert!(filter.is_tracker("http://www.example.com/urchin.js"));
        assert!(!filter.is_tracker("http://www.facebook.com/"));
        assert!(!filter.is_tracker("http://www.example.com/app.js"));
    }
}
