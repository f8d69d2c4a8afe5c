use crate::formatter::RuleFormatter;
use crate::l10n::UserFacingString;
use crate::pagespeed_input::InputInformation;
use crate::resource_collection::ResourceId;
use crate::result_provider::ResultProvider;
use crate::results::{Finding, RuleResults};
use crate::rule::Rule;
use crate::rule_input::RuleInput;
use crate::uri_util;
use std::collections::BTreeMap;

/// Hostnames that serve a single resource, within a registrable domain
/// that has other hostnames it could be served from
///
/// Only resources requested before onload count. The primary resource,
/// and the redirect chain leading to it, are never reported.
#[derive(Debug, Default)]
pub struct MinimizeDnsLookups;

impl MinimizeDnsLookups {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for MinimizeDnsLookups {
    fn name(&self) -> &str {
        "MinimizeDnsLookups"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Minimize DNS lookups")
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        let pagespeed_input = input.pagespeed_input();

        // domain -> host -> resources
        let mut domains: BTreeMap<String, BTreeMap<String, Vec<ResourceId>>> = BTreeMap::new();
        for (id, resource) in input.resources().iter() {
            if !matches!(resource.protocol().as_deref(), Some("http" | "https"))
                || pagespeed_input.is_resource_loaded_after_onload(resource)
            {
                continue;
            }
            let Some(host) = resource.host() else { continue };
            let Some(domain) = uri_util::registrable_domain(&host) else {
                tracing::info!("Got empty domain for {}", resource.request_url());
                continue;
            };
            domains.entry(domain).or_default().entry(host).or_default().push(id);
        }

        let primary = pagespeed_input.primary_resource_id();
        let primary_chain = primary.and_then(|id| input.redirect_chain_of(id));
        for hosts in domains.values() {
            if hosts.len() <= 1 {
                continue;
            }
            let lone: Vec<ResourceId> = hosts
                .values()
                .filter(|ids| ids.len() == 1)
                .map(|ids| ids[0])
                .filter(|&id| Some(id) != primary)
                .filter(|&id| primary_chain.is_none() || input.redirect_chain_of(id) != primary_chain)
                .collect();
            if lone.is_empty() {
                continue;
            }

            let finding = provider.new_result();
            finding.resource_urls = lone
                .iter()
                .filter_map(|&id| input.resource(id))
                .map(|r| r.request_url().to_string())
                .collect();
            // with no other hostname left in the domain one lookup stays
            let additional_host_available = hosts.len() > lone.len();
            finding.savings.dns_requests_saved =
                lone.len() as i32 - if additional_host_available { 0 } else { 1 };
        }
        true
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        let urls: Vec<&String> = results.iter().flat_map(|f| &f.resource_urls).collect();
        if urls.is_empty() {
            return;
        }
        let mut block = formatter.add_url_block(
            &UserFacingString::new(
                "The hostnames of the following urls only serve one resource each. Avoid the \
                 extra DNS lookups by serving these resources from existing hostnames.",
            ),
            &[],
        );
        for url in urls {
            block.add_url(url);
        }
    }

    /// Share of hostnames that are not a saved lookup
    fn compute_score(&self, info: &InputInformation, results: &RuleResults) -> i32 {
        let violations: i32 = results.results.iter().map(|f| f.savings.dns_requests_saved).sum();
        let hosts = info.number_hosts;
        if hosts <= 0 || hosts < violations {
            tracing::error!("Bad number of hosts {} compared to {} violations", hosts, violations);
            return -1;
        }
        100 * (hosts - violations) / hosts
    }
}
