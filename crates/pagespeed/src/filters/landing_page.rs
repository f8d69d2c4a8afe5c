use super::ResultFilter;
use crate::results::{Finding, FindingDetails};
use url::Url;

/// Drops landing-page redirect chains a site cannot reasonably avoid
///
/// A hop is benign when source and target are the same page modulo a
/// leading `www.`, an http to https upgrade, or a trailing slash. For
/// example a user typing `foo.com` and landing on `https://www.foo.com/`.
/// Non-landing chains and other findings pass through.
#[derive(Debug, Default, Clone, Copy)]
pub struct LandingPageRedirectionFilter;

impl LandingPageRedirectionFilter {
    pub fn new() -> Self {
        Self
    }

    pub fn is_benign_hop(from: &str, to: &str) -> bool {
        let (Ok(from), Ok(to)) = (Url::parse(from), Url::parse(to)) else {
            return false;
        };

        let scheme_ok = from.scheme() == to.scheme()
            || (from.scheme() == "http" && to.scheme() == "https");
        if !scheme_ok {
            return false;
        }

        let (Some(from_host), Some(to_host)) = (from.host_str(), to.host_str()) else {
            return false;
        };
        if strip_www(from_host) != strip_www(to_host) {
            return false;
        }

        from.path().trim_end_matches('/') == to.path().trim_end_matches('/')
            && from.query() == to.query()
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

impl ResultFilter for LandingPageRedirectionFilter {
    fn is_accepted(&self, finding: &Finding) -> bool {
        if finding.details != Some(FindingDetails::RedirectChain { is_landing_page: true }) {
            return true;
        }
        let all_benign = finding
            .resource_urls
            .windows(2)
            .all(|hop| Self::is_benign_hop(&hop[0], &hop[1]));
        if all_benign {
            tracing::debug!(
                "Dropping benign landing page redirect chain starting at {:?}",
                finding.first_url()
            );
        }
        !all_benign
    }
}
