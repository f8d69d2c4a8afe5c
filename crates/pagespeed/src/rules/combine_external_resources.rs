use crate::formatter::{Argument, RuleFormatter};
use crate::l10n::UserFacingString;
use crate::resource::ResourceType;
use crate::resource_collection::ResourceId;
use crate::result_provider::ResultProvider;
use crate::results::Finding;
use crate::rule::Rule;
use crate::rule_input::RuleInput;
use crate::uri_util;
use std::collections::BTreeMap;

/// More than one stylesheet or script served from the same host before
/// onload. One finding per host; each extra file is one request to save.
#[derive(Debug)]
pub struct CombineExternalResources {
    resource_type: ResourceType,
    name: &'static str,
    header: &'static str,
    body_format: &'static str,
}

impl CombineExternalResources {
    pub fn css() -> Self {
        Self {
            resource_type: ResourceType::Css,
            name: "CombineExternalCss",
            header: "Combine external CSS",
            body_format: "There are %(NUM_FILES)s CSS files served from %(HOST)s. \
                          They should be combined into as few files as possible.",
        }
    }

    pub fn javascript() -> Self {
        Self {
            resource_type: ResourceType::Js,
            name: "CombineExternalJavaScript",
            header: "Combine external JavaScript",
            body_format: "There are %(NUM_FILES)s JavaScript files served from %(HOST)s. \
                          They should be combined into as few files as possible.",
        }
    }
}

impl Rule for CombineExternalResources {
    fn name(&self) -> &str {
        self.name
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new(self.header)
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        let pagespeed_input = input.pagespeed_input();
        let collection = input.resources();
        // request order when every resource has a start time, else by URL
        let request_order = collection.resources_in_request_order();
        let ordered: Vec<ResourceId> = match request_order {
            Some(order) => order.to_vec(),
            None => collection.iter().map(|(id, _)| id).collect(),
        };

        let mut by_host: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for resource in ordered.into_iter().filter_map(|id| collection.get(id)) {
            if resource.resource_type() != self.resource_type
                || !matches!(resource.protocol().as_deref(), Some("http" | "https"))
                || pagespeed_input.is_resource_loaded_after_onload(resource)
            {
                continue;
            }
            let Some(host) = resource.host().filter(|h| !h.is_empty()) else {
                tracing::warn!("Empty host while processing {}", resource.request_url());
                continue;
            };
            by_host.entry(host).or_default().push(resource.request_url());
        }

        for (_, mut urls) in by_host {
            if urls.len() <= 1 {
                continue;
            }
            if request_order.is_none() {
                urls.sort_unstable();
            }
            let finding = provider.new_result();
            finding.savings.requests_saved = urls.len() as i32 - 1;
            finding.resource_urls = urls.into_iter().map(str::to_string).collect();
        }
        true
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        for result in results {
            let host = result
                .first_url()
                .and_then(uri_util::host)
                .unwrap_or_default();
            let mut block = formatter.add_url_block(
                &UserFacingString::new(self.body_format),
                &[
                    Argument::integer("NUM_FILES", result.resource_urls.len() as i64),
                    Argument::string("HOST", &host),
                ],
            );
            for url in &result.resource_urls {
                block.add_url(url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::Formatter;
    use crate::l10n::BasicLocalizer;
    use crate::pagespeed_input::PagespeedInput;
    use crate::resource::Resource;
    use crate::results::RuleResults;
    use crate::rules::test_util::resource;

    fn timed(url: &str, content_type: &str, start: i64) -> Resource {
        let mut r = resource(url, content_type, "x");
        r.set_request_start_time_millis(start);
        r
    }

    fn run(rule: &CombineExternalResources) -> RuleResults {
        let mut input = PagespeedInput::new();
        for r in [
            timed("http://a.com/", "text/html", 0),
            timed("http://a.com/b.css", "text/css", 10),
            timed("http://a.com/a.css", "text/css", 20),
            timed("http://a.com/late.css", "text/css", 900),
            timed("http://b.com/b.css", "text/css", 30),
            timed("http://a.com/1.js", "application/javascript", 40),
            timed("http://a.com/2.js", "application/javascript", 50),
            timed("http://a.com/3.js", "text/javascript", 60),
            timed("http://b.com/4.js", "application/javascript", 70),
        ] {
            assert!(input.add_resource(r));
        }
        assert!(input.set_onload_time_millis(500));
        input.freeze().unwrap();
        let mut rule_input = RuleInput::new(&input);
        rule_input.init().unwrap();
        let mut results = RuleResults::new(rule.name());
        assert!(rule.append_results(&rule_input, &mut ResultProvider::new(&mut results)));
        results
    }

    #[test]
    fn test_combine_css() {
        let results = run(&CombineExternalResources::css());
        // b.com serves one file; the post-onload stylesheet does not count
        assert_eq!(results.results.len(), 1);
        let finding = &results.results[0];
        // b.css was requested first
        assert_eq!(finding.resource_urls, vec!["http://a.com/b.css", "http://a.com/a.css"]);
        assert_eq!(finding.savings.requests_saved, 1);
    }

    #[test]
    fn test_untimed_resources_sorted_by_url() {
        let mut input = PagespeedInput::new();
        for url in ["http://a.com/z.css", "http://a.com/m.css"] {
            assert!(input.add_resource(resource(url, "text/css", "x")));
        }
        input.freeze().unwrap();
        let mut rule_input = RuleInput::new(&input);
        rule_input.init().unwrap();
        let mut results = RuleResults::new("CombineExternalCss");
        let rule = CombineExternalResources::css();
        assert!(rule.append_results(&rule_input, &mut ResultProvider::new(&mut results)));
        assert_eq!(results.results[0].resource_urls, vec!["http://a.com/m.css", "http://a.com/z.css"]);
    }

    #[test]
    fn test_combine_javascript_and_format() {
        let rule = CombineExternalResources::javascript();
        let results = run(&rule);
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].savings.requests_saved, 2);

        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        {
            let findings: Vec<_> = results.results.iter().collect();
            let mut rule_formatter = formatter.add_rule(&rule, Some(90), 1.0);
            rule.format_results(&findings, &mut rule_formatter);
        }
        let rule_results = &formatter.results().rule_results[0];
        assert_eq!(rule_results.rule_name, "CombineExternalJavaScript");
        let block = &rule_results.url_blocks[0];
        assert_eq!(
            block.header.as_ref().unwrap().render_plain(),
            "There are 3 JavaScript files served from a.com. \
             They should be combined into as few files as possible."
        );
        assert_eq!(block.urls.len(), 3);
        assert_eq!(block.urls[0].result.render_plain(), "http://a.com/1.js");
    }
}
