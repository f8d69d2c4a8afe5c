use super::ResourceFilter;
use crate::resource::Resource;
use ahash::AHashSet;

/// Accepts resources whose URL scheme is in an explicit allow-list
pub struct ProtocolResourceFilter {
    allowed: AHashSet<String>,
}

impl ProtocolResourceFilter {
    pub fn new<I, S>(protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: protocols
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl ResourceFilter for ProtocolResourceFilter {
    fn is_accepted(&self, resource: &Resource) -> bool {
        resource
            .protocol()
            .map(|scheme| self.allowed.contains(&scheme))
            .unwrap_or(false)
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
    fn test_allow_list() {
        let filter = ProtocolResourceFilter::new(["http", "HTTPS"]);
        assert!(filter.is_accepted(&resource("http://a.com/")));
        assert!(filter.is_accepted(&resource("https://a.com/")));
        assert!(!filter.is_accepted(&resource("data:image/png;base64,AAAA")));
        assert!(!filter.is_accepted(&resource("ftp://a.com/f")));
    }

    #[test]
    fn test_empty_set_rejects_all() {
        let filter = ProtocolResourceFilter::new(Vec::<String>::new());
        assert!(!filter.is_accepted(&resource("http://a.com/")));
    }
}
