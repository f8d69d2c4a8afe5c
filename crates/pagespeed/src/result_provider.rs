//! Where a rule puts what it finds

use crate::results::{Finding, RuleResults};

/// Appends findings to one rule's results, stamping the rule name
pub struct ResultProvider<'r> {
    rule_results: &'r mut RuleResults,
    added: usize,
}

impl<'r> ResultProvider<'r> {
    pub fn new(rule_results: &'r mut RuleResults) -> Self {
        Self {
            rule_results,
            added: 0,
        }
    }

    /// A fresh finding for the caller to fill in
    pub fn new_result(&mut self) -> &mut Finding {
        let finding = Finding::new(&self.rule_results.rule_name);
        self.rule_results.results.push(finding);
        self.added += 1;
        let last = self.rule_results.results.len() - 1;
        &mut self.rule_results.results[last]
    }

    pub fn num_new_results(&self) -> usize {
        self.added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_names_rule() {
        let mut rule_results = RuleResults::new("MinifyCss");
        {
            let mut provider = ResultProvider::new(&mut rule_results);
            provider.new_result().resource_urls.push("http://a.com/a.css".into());
            provider.new_result().savings.requests_saved = 1;
            assert_eq!(provider.num_new_results(), 2);
        }
        assert_eq!(rule_results.results.len(), 2);
        assert!(rule_results.results.iter().all(|f| f.rule_name == "MinifyCss"));
        assert_eq!(rule_results.results[0].first_url(), Some("http://a.com/a.css"));
    }
}
