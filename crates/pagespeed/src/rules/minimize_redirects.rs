use crate::formatter::RuleFormatter;
use crate::l10n::UserFacingString;
use crate::result_provider::ResultProvider;
use crate::results::{Finding, FindingDetails};
use crate::rule::Rule;
use crate::rule_input::RuleInput;

/// One finding per chain of two or more redirecting resources
///
/// The chain the primary resource belongs to is reported too, flagged as
/// the landing chain so a result filter can drop the unavoidable ones.
#[derive(Debug, Default)]
pub struct MinimizeRedirects;

impl MinimizeRedirects {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for MinimizeRedirects {
    fn name(&self) -> &str {
        "MinimizeRedirects"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Minimize redirects")
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        let landing = input.pagespeed_input().primary_resource_id();
        for chain in input.redirect_chains() {
            if chain.len() <= 1 {
                tracing::info!("Skipping redirect chain with one resource");
                continue;
            }
            let is_landing_page = landing.is_some_and(|id| chain.contains(&id));

            let finding = provider.new_result();
            finding.resource_urls = chain
                .iter()
                .filter_map(|&id| input.resource(id))
                .map(|r| r.request_url().to_string())
                .collect();
            finding.savings.requests_saved = finding.resource_urls.len() as i32 - 1;
            finding.details = Some(FindingDetails::RedirectChain { is_landing_page });
        }
        true
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        for result in results {
            let mut block = formatter.add_url_block(
                &UserFacingString::new("Remove the following redirect chain if possible:"),
                &[],
            );
            for url in &result.resource_urls {
                block.add_url(url);
            }
        }
    }
}
