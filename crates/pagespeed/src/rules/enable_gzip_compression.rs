use crate::formatter::{Argument, RuleFormatter};
use crate::l10n::UserFacingString;
use crate::resource::Resource;
use crate::resource_util;
use crate::result_provider::ResultProvider;
use crate::results::Finding;
use crate::rule::Rule;
use crate::rule_input::RuleInput;

/// Bodies smaller than this gain too little from gzip to report
const MINIMUM_BODY_SIZE: usize = 150;

/// Text resources served without transfer compression
#[derive(Debug, Default)]
pub struct EnableGzipCompression;

impl EnableGzipCompression {
    pub fn new() -> Self {
        Self
    }

    fn is_violation(resource: &Resource) -> bool {
        !resource_util::is_compressed_resource(resource)
            && resource_util::is_compressible_resource(resource)
            && resource.response_body().len() >= MINIMUM_BODY_SIZE
    }
}

impl Rule for EnableGzipCompression {
    fn name(&self) -> &str {
        "EnableGzipCompression"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Enable compression")
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        let mut success = true;
        for (id, resource) in input.resources().iter() {
            if !Self::is_violation(resource) {
                continue;
            }
            let compressed = match input.compressed_response_body_size(id) {
                Ok(size) => size,
                Err(e) => {
                    tracing::warn!("Could not gzip {}: {}", resource.request_url(), e);
                    success = false;
                    continue;
                }
            };
            let original = resource.response_body().len();
            let saved = original as i64 - compressed as i64;
            if saved <= 0 {
                continue;
            }
            let finding = provider.new_result();
            finding.resource_urls.push(resource.request_url().to_string());
            finding.original_response_bytes = original as i64;
            finding.savings.response_bytes_saved = saved;
        }
        success
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        if results.is_empty() {
            return;
        }
        let total_original: i64 = results.iter().map(|f| f.original_response_bytes).sum();
        let total_saved: i64 = results.iter().map(|f| f.savings.response_bytes_saved).sum();

        let mut body = formatter.add_url_block(
            &UserFacingString::new(
                "Compressing the following resources with gzip could reduce their transfer \
                 size by %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction).",
            ),
            &[
                Argument::bytes("SIZE_IN_BYTES", total_saved),
                Argument::percentage("PERCENTAGE", total_saved, total_original),
            ],
        );
        for result in results {
            let Some(url) = result.first_url() else {
                continue;
            };
            let saved = result.savings.response_bytes_saved;
            body.add_url_result(
                &UserFacingString::new(
                    "Compressing %(URL)s could save %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction).",
                ),
                &[
                    Argument::url("URL", url),
                    Argument::bytes("SIZE_IN_BYTES", saved),
                    Argument::percentage("PERCENTAGE", saved, result.original_response_bytes),
                ],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::Formatter;
    use crate::l10n::BasicLocalizer;
    use crate::results::RuleResults;
    use crate::rules::test_util::{frozen_input, resource};

    #[test]
    fn test_violations() {
        let text = "body { color: red; } ".repeat(20);
        let mut compressed = resource("http://a.com/gz.css", "text/css", &text);
        compressed.add_response_header("Content-Encoding", "gzip");
        let input = frozen_input(vec![
            resource("http://a.com/a.css", "text/css", &text),
            resource("http://a.com/small.js", "application/javascript", "var a = 1;"),
            resource("http://a.com/i.png", "image/png", &text),
            compressed,
        ]);
        let mut rule_input = RuleInput::new(&input);
        rule_input.init().unwrap();

        let rule = EnableGzipCompression::new();
        let mut results = RuleResults::new(rule.name());
        assert!(rule.append_results(&rule_input, &mut ResultProvider::new(&mut results)));

        assert_eq!(results.results.len(), 1);
        let finding = &results.results[0];
        assert_eq!(finding.first_url(), Some("http://a.com/a.css"));
        // 420 bytes gzip to 46
        assert_eq!(finding.original_response_bytes, 420);
        assert_eq!(finding.savings.response_bytes_saved, 374);

        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        {
            let findings: Vec<_> = results.results.iter().collect();
            let mut rule_formatter = formatter.add_rule(&rule, Some(90), 1.0);
            rule.format_results(&findings, &mut rule_formatter);
        }
        let block = &formatter.results().rule_results[0].url_blocks[0];
        assert!(block
            .header
            .as_ref()
            .unwrap()
            .render_plain()
            .starts_with("Compressing the following resources with gzip"));
        assert!(block.urls[0]
            .result
            .render_plain()
            .starts_with("Compressing http://a.com/a.css could save"));
    }
}
