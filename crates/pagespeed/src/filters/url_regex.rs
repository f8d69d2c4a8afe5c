use super::ResourceFilter;
use crate::resource::Resource;
use regex::Regex;

/// Accepts resources whose URL does not contain a match of the pattern
///
/// An empty or invalid pattern rejects everything, so a typo never
/// silently lets every resource through.
pub struct UrlRegexResourceFilter {
    regex: Option<Regex>,
}

impl UrlRegexResourceFilter {
    pub fn new(pattern: &str) -> Self {
        if pattern.is_empty() {
            tracing::warn!("Empty URL filter pattern, rejecting all resources");
            return Self { regex: None };
        }
        match Regex::new(pattern) {
            Ok(regex) => Self { regex: Some(regex) },
            Err(e) => {
                tracing::warn!("Invalid URL filter pattern '{}': {}", pattern, e);
                Self { regex: None }
            }
        }
    }
}

impl ResourceFilter for UrlRegexResourceFilter {
    fn is_accepted(&self, resource: &Resource) -> bool {
        match &self.regex {
            Some(regex) => !regex.is_match(resource.request_url()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(url: &str) -> Resource {
        let mut r = Resource::new();
        r.set_request_url(url);
        r
    }

    #[test]
    fn test_partial_match_rejects() {
        let filter = UrlRegexResourceFilter::new(r"\.gif$");
        assert!(!filter.is_accepted(&resource("http://a.com/x.gif")));
        assert!(filter.is_accepted(&resource("http://a.com/x.gifs")));

        let filter = UrlRegexResourceFilter::new("doubleclick");
        assert!(!filter.is_accepted(&resource("http://ad.doubleclick.net/x")));
    }

    #[test]
    fn test_empty_or_invalid_pattern_rejects_all() {
        for pattern in ["", "(unclosed"] {
            let filter = UrlRegexResourceFilter::new(pattern);
            assert!(!filter.is_accepted(&resource("http://a.com/")));
        }
    }
}
