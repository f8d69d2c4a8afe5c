//! Runs rules over a frozen input, scores them and drives formatting

use crate::contract_violation;
use crate::filters::ResultFilter;
use crate::formatter::Formatter;
use crate::pagespeed_input::PagespeedInput;
use crate::result_provider::ResultProvider;
use crate::results::{Results, RuleResults};
use crate::rule::Rule;
use crate::rule_input::RuleInput;
use ahash::AHashMap;

/// Impact worth three mobile round trips maps to a score of 80
const IMPACT_SCALE: f64 = 24.0;

pub struct Engine {
    rules: Vec<Box<dyn Rule>>,
    name_to_rule: AHashMap<String, usize>,
    initialized: bool,
}

impl Engine {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules,
            name_to_rule: AHashMap::new(),
            initialized: false,
        }
    }

    /// Index rules by name. Must run once before anything else.
    pub fn init(&mut self) {
        if self.initialized {
            contract_violation!("Engine initialized twice");
            return;
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if self.name_to_rule.insert(rule.name().to_string(), index).is_some() {
                contract_violation!("Found duplicate rule {}", rule.name());
            }
        }
        self.initialized = true;
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    fn rule_named(&self, name: &str) -> Option<&dyn Rule> {
        self.name_to_rule.get(name).map(|&index| self.rules[index].as_ref())
    }

    fn check_initialized(&self) -> bool {
        if !self.initialized {
            contract_violation!("Engine used before init");
            return false;
        }
        true
    }

    /// Run every rule over `input`. The flag is false when the input was
    /// not frozen or a rule reported an error; partial results are still
    /// returned in that case.
    pub fn compute_results(&self, input: &PagespeedInput) -> (Results, bool) {
        let mut results = Results::new();
        if !self.check_initialized() {
            return (results, false);
        }
        if !input.is_frozen() {
            contract_violation!("Attempting to compute results with non-frozen input");
            return (results, false);
        }
        results.input_info = input.input_information().clone();

        let mut rule_input = RuleInput::new(input);
        if rule_input.init().is_err() {
            return (results, false);
        }

        let mut success = true;
        for rule in &self.rules {
            let mut rule_results = RuleResults::new(rule.name());
            rule_results.experimental = rule.is_experimental();
            let mut provider = ResultProvider::new(&mut rule_results);
            let rule_success = rule.append_results(&rule_input, &mut provider);
            tracing::debug!("{} produced {} results", rule.name(), provider.num_new_results());
            if !rule_success {
                tracing::warn!("Rule {} reported an error", rule.name());
                results.error_rules.push(rule.name().to_string());
                success = false;
            }
            results.rule_results.push(rule_results);
        }

        if results.populate_result_ids().is_err() {
            success = false;
        }
        if !self.compute_score_and_impact(&mut results) {
            success = false;
        }
        (results, success)
    }

    /// A copy of `results` holding only accepted findings, rescored
    pub fn filter_results(&self, results: &Results, filter: &dyn ResultFilter) -> Results {
        let mut filtered = results.clone();
        if !self.check_initialized() {
            return filtered;
        }
        for rule_results in &mut filtered.rule_results {
            rule_results.results.retain(|finding| filter.is_accepted(finding));
        }
        self.compute_score_and_impact(&mut filtered);
        filtered
    }

    /// Render accepted findings of every known rule, then finalize
    pub fn format_results(
        &self,
        results: &Results,
        filter: &dyn ResultFilter,
        formatter: &mut Formatter<'_>,
    ) -> bool {
        if !self.check_initialized() {
            return false;
        }
        let mut success = true;
        for rule_results in &results.rule_results {
            let Some(rule) = self.rule_named(&rule_results.rule_name) else {
                tracing::warn!("Unable to find rule instance with name {}", rule_results.rule_name);
                success = false;
                continue;
            };
            let mut accepted: Vec<_> = rule_results
                .results
                .iter()
                .filter(|finding| filter.is_accepted(finding))
                .collect();
            rule.sort_results_in_presentation_order(&mut accepted);

            let mut rule_formatter =
                formatter.add_rule(rule, rule_results.rule_score, rule_results.rule_impact);
            rule.format_results(&accepted, &mut rule_formatter);
        }
        if let Some(score) = results.score {
            formatter.set_overall_score(score);
        }
        formatter.finalize();
        success
    }

    /// Set each rule's score and impact, and the overall score
    ///
    /// Returns false when some rule results name an unknown rule.
    pub fn compute_score_and_impact(&self, results: &mut Results) -> bool {
        if !self.check_initialized() {
            return false;
        }
        let mut success = true;
        let mut total_impact = 0.0;
        let mut any_scored = false;

        for rule_results in &mut results.rule_results {
            rule_results.rule_score = None;
            rule_results.rule_impact = 0.0;
            let Some(rule) = self.rule_named(&rule_results.rule_name) else {
                tracing::warn!("Unable to find rule instance with name {}", rule_results.rule_name);
                success = false;
                continue;
            };

            let mut impact = 0.0;
            let mut score = 100;
            if !rule_results.results.is_empty() {
                impact = rule.compute_rule_impact(&results.input_info, rule_results);
                if impact < 0.0 {
                    tracing::error!("Impact for {} out of bounds: {}", rule.name(), impact);
                    impact = 0.0;
                }
                score = rule.compute_score(&results.input_info, rule_results);
                if !(-1..=100).contains(&score) {
                    tracing::error!("Score for {} out of bounds: {}", rule.name(), score);
                    score = score.clamp(-1, 100);
                }
            }
            rule_results.rule_impact = impact;
            if !rule.is_experimental() {
                total_impact += impact;
            }
            // -1 means no meaningful score
            if score >= 0 {
                any_scored = true;
                rule_results.rule_score = Some(score);
            }
        }

        results.score = any_scored.then(|| overall_score(total_impact));
        success
    }
}

/// Map total impact onto 0..=100 on a log scale: each doubling of
/// `impact / 24 + 1` costs 20 points
fn overall_score(total_impact: f64) -> i32 {
    let ranking_cost = 20.0 * (total_impact / IMPACT_SCALE + 1.0).log2();
    100 - (ranking_cost as i32).clamp(0, 100)
}
