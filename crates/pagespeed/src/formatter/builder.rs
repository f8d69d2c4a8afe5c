//! Tree builder rules write their explanations through
//!
//! Each level hands out a child formatter that mutably borrows the node it
//! fills in, so a child can't outlive its parent or be used after the
//! parent moves on.

use super::argument::Argument;
use super::formatted::{
    FormatString, FormattedResults, FormattedRuleResults, FormattedUrlBlockResults, FormattedUrlResult,
};
use crate::contract_violation;
use crate::l10n::{Localizer, UserFacingString};
use crate::rule::Rule;

const URL_FORMAT: UserFacingString = UserFacingString::not_localized("%(URL)s");

pub struct Formatter<'l> {
    localizer: &'l dyn Localizer,
    results: FormattedResults,
    finalized: bool,
}

impl<'l> Formatter<'l> {
    pub fn new(localizer: &'l dyn Localizer) -> Self {
        Self {
            localizer,
            results: FormattedResults {
                locale: localizer.locale().to_string(),
                ..Default::default()
            },
            finalized: false,
        }
    }

    pub fn localizer(&self) -> &'l dyn Localizer {
        self.localizer
    }

    pub fn add_rule(&mut self, rule: &dyn Rule, score: Option<i32>, impact: f64) -> RuleFormatter<'_> {
        if self.finalized {
            contract_violation!("Adding rule {} to a finalized Formatter", rule.name());
        }
        self.results.rule_results.push(FormattedRuleResults {
            rule_name: rule.name().to_string(),
            localized_rule_name: self.localizer.localize_string(&rule.header()),
            rule_score: score,
            rule_impact: Some(impact),
            experimental: rule.is_experimental(),
            url_blocks: Vec::new(),
        });
        let index = self.results.rule_results.len() - 1;
        RuleFormatter {
            localizer: self.localizer,
            rule: &mut self.results.rule_results[index],
        }
    }

    pub fn set_overall_score(&mut self, score: i32) {
        if !(0..=100).contains(&score) {
            contract_violation!("Overall score {} out of range", score);
            return;
        }
        self.results.score = Some(score);
    }

    /// Settle scores of rules that found nothing. Runs once.
    pub fn finalize(&mut self) {
        if self.finalized {
            contract_violation!("Formatter finalized twice");
            return;
        }
        let mut any_blocks = false;
        for rule in &mut self.results.rule_results {
            if rule.url_blocks.is_empty() {
                rule.rule_score = Some(100);
                rule.rule_impact = Some(0.0);
            } else {
                any_blocks = true;
            }
        }
        if !any_blocks {
            self.results.score = Some(100);
        }
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn results(&self) -> &FormattedResults {
        &self.results
    }

    pub fn into_results(self) -> FormattedResults {
        if !self.finalized {
            tracing::warn!("Taking results from a Formatter that was never finalized");
        }
        self.results
    }
}

pub struct RuleFormatter<'f> {
    localizer: &'f dyn Localizer,
    rule: &'f mut FormattedRuleResults,
}

impl<'f> RuleFormatter<'f> {
    pub fn add_url_block(&mut self, header: &UserFacingString, args: &[Argument]) -> UrlBlockFormatter<'_> {
        let header = FormatString::new(self.localizer, header, args);
        self.push_block(Some(header))
    }

    /// A block with no header of its own
    pub fn add_headerless_url_block(&mut self) -> UrlBlockFormatter<'_> {
        self.push_block(None)
    }

    fn push_block(&mut self, header: Option<FormatString>) -> UrlBlockFormatter<'_> {
        self.rule.url_blocks.push(FormattedUrlBlockResults {
            header,
            ..Default::default()
        });
        let index = self.rule.url_blocks.len() - 1;
        UrlBlockFormatter {
            localizer: self.localizer,
            block: &mut self.rule.url_blocks[index],
        }
    }
}

pub struct UrlBlockFormatter<'f> {
    localizer: &'f dyn Localizer,
    block: &'f mut FormattedUrlBlockResults,
}

impl<'f> UrlBlockFormatter<'f> {
    pub fn add_url_result(&mut self, format: &UserFacingString, args: &[Argument]) -> UrlFormatter<'_> {
        let result = FormatString::new(self.localizer, format, args);
        self.block.urls.push(FormattedUrlResult {
            result,
            ..Default::default()
        });
        let index = self.block.urls.len() - 1;
        UrlFormatter {
            localizer: self.localizer,
            url: &mut self.block.urls[index],
        }
    }

    /// Shorthand for a result that is just the URL
    pub fn add_url(&mut self, url: &str) -> UrlFormatter<'_> {
        self.add_url_result(&URL_FORMAT, &[Argument::url("URL", url)])
    }

    pub fn set_associated_result_id(&mut self, id: u32) {
        self.block.associated_result_id = Some(id);
    }
}

pub struct UrlFormatter<'f> {
    localizer: &'f dyn Localizer,
    url: &'f mut FormattedUrlResult,
}

impl<'f> UrlFormatter<'f> {
    pub fn add_detail(&mut self, format: &UserFacingString, args: &[Argument]) {
        let detail = FormatString::new(self.localizer, format, args);
        self.url.details.push(detail);
    }

    pub fn set_associated_result_id(&mut self, id: u32) {
        self.url.associated_result_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l10n::BasicLocalizer;
    use crate::pagespeed_input::InputInformation;
    use crate::result_provider::ResultProvider;
    use crate::results::{Finding, RuleResults};
    use crate::rule_input::RuleInput;

    struct Dummy(&'static str);

    impl Rule for Dummy {
        fn name(&self) -> &str {
            self.0
        }

        fn header(&self) -> UserFacingString {
            UserFacingString::new("Do the dummy thing")
        }

        fn append_results(&self, _input: &RuleInput<'_>, _provider: &mut ResultProvider<'_>) -> bool {
            true
        }

        fn format_results(&self, _results: &[&Finding], _formatter: &mut RuleFormatter<'_>) {}

        fn compute_score(&self, _info: &InputInformation, _results: &RuleResults) -> i32 {
            100
        }
    }

    const BODY: UserFacingString = UserFacingString::new("Fix %(COUNT)s things:");

    #[test]
    fn test_build_tree() {
        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        {
            let mut rule = formatter.add_rule(&Dummy("Dummy"), Some(80), 2.5);
            let mut block = rule.add_url_block(&BODY, &[Argument::integer("COUNT", 2)]);
            block.set_associated_result_id(7);
            let mut url = block.add_url("http://a.com/");
            url.add_detail(&UserFacingString::new("Saves %(SIZE)s"), &[Argument::bytes("SIZE", 20)]);
            url.set_associated_result_id(3);
            block.add_url("http://b.com/");
        }
        formatter.add_rule(&Dummy("Clean"), Some(40), 1.0);
        formatter.set_overall_score(90);
        formatter.finalize();

        let results = formatter.into_results();
        assert_eq!(results.locale, "en_US");
        assert_eq!(results.score, Some(90));
        let dummy = &results.rule_results[0];
        assert_eq!(dummy.localized_rule_name, "Do the dummy thing");
        assert_eq!(dummy.rule_score, Some(80));
        let block = &dummy.url_blocks[0];
        assert_eq!(block.header.as_ref().unwrap().render_plain(), "Fix 2 things:");
        assert_eq!(block.associated_result_id, Some(7));
        assert_eq!(block.urls.len(), 2);
        assert_eq!(block.urls[0].result.render_plain(), "http://a.com/");
        assert_eq!(block.urls[0].details[0].render_plain(), "Saves 20B");
        assert_eq!(block.urls[0].associated_result_id, Some(3));

        // nothing reported: perfect score, no impact
        let clean = &results.rule_results[1];
        assert_eq!(clean.rule_score, Some(100));
        assert_eq!(clean.rule_impact, Some(0.0));
    }

    #[test]
    fn test_finalize_without_blocks_scores_100() {
        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        formatter.add_rule(&Dummy("Clean"), Some(10), 4.0);
        formatter.finalize();
        assert_eq!(formatter.results().score, Some(100));
        assert!(formatter.is_finalized());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "out of range"))]
    fn test_overall_score_range() {
        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        formatter.set_overall_score(101);
        assert_eq!(formatter.results().score, None);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "finalized twice"))]
    fn test_finalize_twice() {
        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        formatter.finalize();
        formatter.finalize();
    }
}
