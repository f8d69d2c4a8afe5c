use crate::external_resources;
use crate::formatter::{Argument, RuleFormatter};
use crate::l10n::UserFacingString;
use crate::resource::ResourceType;
use crate::result_provider::ResultProvider;
use crate::results::{Finding, FindingDetails};
use crate::rule::Rule;
use crate::rule_input::RuleInput;
use std::collections::BTreeSet;

/// Stylesheets that `@import` other captured stylesheets, each import
/// adding a step to the critical path
#[derive(Debug, Default)]
pub struct AvoidCssImport;

impl AvoidCssImport {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for AvoidCssImport {
    fn name(&self) -> &str {
        "AvoidCssImport"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Avoid CSS @import")
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        let pagespeed_input = input.pagespeed_input();
        for (_, resource) in input.resources().iter() {
            if resource.resource_type() != ResourceType::Css {
                continue;
            }
            let imported: BTreeSet<String> =
                external_resources::css_imports(&resource.response_body_text(), resource.request_url())
                    .into_iter()
                    .filter_map(|url| pagespeed_input.resource_with_url(&url))
                    .filter(|r| r.resource_type() == ResourceType::Css)
                    .map(|r| r.request_url().to_string())
                    .collect();
            if imported.is_empty() {
                continue;
            }

            let finding = provider.new_result();
            finding.resource_urls.push(resource.request_url().to_string());
            finding.savings.critical_path_length_saved = 1;
            finding.details = Some(FindingDetails::CssImports {
                imported_stylesheets: imported.into_iter().collect(),
            });
        }
        true
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        for result in results {
            let Some(url) = result.first_url() else {
                tracing::error!("AvoidCssImport result without a URL");
                continue;
            };
            let Some(FindingDetails::CssImports { imported_stylesheets }) = &result.details else {
                continue;
            };
            let mut block = formatter.add_url_block(
                &UserFacingString::new(
                    "The following external stylesheets were included in %(URL)s using @import.",
                ),
                &[Argument::url("URL", url)],
            );
            for imported in imported_stylesheets {
                block.add_url(imported);
            }
        }
    }
}
