//! Cost-based rule scores
//!
//! Score = 100 · (max − cost) / max, floored at 0, where cost is the
//! response bytes a rule could save scaled by a rule-specific weight.

use crate::results::RuleResults;

pub struct WeightedCostBasedScoreComputer<'r> {
    results: &'r RuleResults,
    max_possible_cost: i64,
    cost_weight: f64,
}

impl<'r> WeightedCostBasedScoreComputer<'r> {
    pub fn new(results: &'r RuleResults, max_possible_cost: i64, cost_weight: f64) -> Self {
        Self {
            results,
            max_possible_cost,
            cost_weight,
        }
    }

    pub fn compute_cost(&self) -> i64 {
        let saved: i64 = self
            .results
            .results
            .iter()
            .map(|f| f.savings.response_bytes_saved)
            .sum();
        (saved as f64 * self.cost_weight) as i64
    }

    /// 0..=100. Nothing to weigh against (no bytes of the kind) scores 100.
    pub fn compute_score(&self) -> i32 {
        if self.max_possible_cost <= 0 {
            tracing::debug!("No bytes to score against, scoring 100");
            return 100;
        }
        let cost = self.compute_cost();
        let score = 100 * (self.max_possible_cost - cost) / self.max_possible_cost;
        score.clamp(0, 100) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Finding;

    fn rule_results(saved: &[i64]) -> RuleResults {
        let mut results = RuleResults::new("MinifyCss");
        for &bytes in saved {
            let mut finding = Finding::new("MinifyCss");
            finding.savings.response_bytes_saved = bytes;
            results.results.push(finding);
        }
        results
    }

    #[test]
    fn test_weighted_score() {
        let results = rule_results(&[10, 10]);
        // cost 20 * 2.0 = 40 of 100
        assert_eq!(WeightedCostBasedScoreComputer::new(&results, 100, 2.0).compute_score(), 60);
        // heavier weight, lower score
        assert_eq!(WeightedCostBasedScoreComputer::new(&results, 100, 3.5).compute_score(), 30);
    }

    #[test]
    fn test_score_bounds() {
        let none = rule_results(&[]);
        assert_eq!(WeightedCostBasedScoreComputer::new(&none, 500, 1.5).compute_score(), 100);
        assert_eq!(WeightedCostBasedScoreComputer::new(&none, 0, 1.5).compute_score(), 100);

        let huge = rule_results(&[1000]);
        assert_eq!(WeightedCostBasedScoreComputer::new(&huge, 100, 3.5).compute_score(), 0);
    }
}
