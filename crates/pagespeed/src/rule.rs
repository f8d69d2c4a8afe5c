//! The `Rule` trait
//!
//! A rule inspects the frozen input through a `RuleInput`, appends
//! findings, and later renders them through a `RuleFormatter`. Impact,
//! score and presentation order have shared defaults built on `Savings`.

use crate::formatter::RuleFormatter;
use crate::l10n::UserFacingString;
use crate::pagespeed_input::InputInformation;
use crate::result_provider::ResultProvider;
use crate::resource_util;
use crate::results::{Finding, RuleResults};
use crate::rule_input::RuleInput;
use std::cmp::Ordering;

// Normalisation weights for the default score
const REQUEST_BYTES_IMPACT: f64 = 3.0;
const RESPONSE_BYTES_IMPACT: f64 = 3.0;
const REQUEST_IMPACT: f64 = 5.0;
const DNS_LOOKUP_IMPACT: f64 = 1.5 * REQUEST_IMPACT;
const REFLOW_PENALTY: f64 = 0.05;
const CRITICAL_PATH_PENALTY: f64 = 0.15;
const CONNECTIONS_PENALTY: f64 = 0.5;

pub trait Rule: Send + Sync {
    /// Stable identifier, e.g. `MinifyCss`
    fn name(&self) -> &str;

    /// Localizable title
    fn header(&self) -> UserFacingString;

    /// Append findings. Returns false only on an internal error; finding
    /// nothing is success.
    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool;

    /// Describe `results`, already filtered and sorted
    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>);

    /// 0..=100, or -1 when the input lacks the totals needed
    fn compute_score(&self, info: &InputInformation, results: &RuleResults) -> i32 {
        default_score(info, results)
    }

    fn compute_result_impact(&self, info: &InputInformation, result: &Finding) -> f64 {
        let client = &info.client_characteristics;
        let s = &result.savings;
        let impact = client.dns_requests_weight * s.dns_requests_saved as f64
            + client.requests_weight * s.requests_saved as f64
            + client.response_bytes_weight * s.response_bytes_saved as f64
            + client.page_reflows_weight * s.page_reflows_saved as f64
            + client.request_bytes_weight * s.request_bytes_saved as f64
            + client.critical_path_length_weight * s.critical_path_length_saved as f64
            + client.connections_weight * s.connections_saved as f64;
        if impact == 0.0 {
            tracing::warn!("Computed zero impact for a result of {}", self.name());
        }
        impact
    }

    /// Sum of result impacts; negative ones are logged and left out
    fn compute_rule_impact(&self, info: &InputInformation, results: &RuleResults) -> f64 {
        let mut total = 0.0;
        for result in &results.results {
            let impact = self.compute_result_impact(info, result);
            if impact < 0.0 {
                tracing::error!("Result impact for {} out of bounds: {}", self.name(), impact);
            } else {
                total += impact;
            }
        }
        total
    }

    fn sort_results_in_presentation_order(&self, results: &mut [&Finding]) {
        // stable
        results.sort_by(|a, b| compare_presentation(a, b));
    }

    fn is_experimental(&self) -> bool {
        false
    }
}

/// Bigger savings first, then more URLs, then first URL ascending
fn compare_presentation(a: &Finding, b: &Finding) -> Ordering {
    let (sa, sb) = (&a.savings, &b.savings);
    sb.dns_requests_saved
        .cmp(&sa.dns_requests_saved)
        .then(sb.requests_saved.cmp(&sa.requests_saved))
        .then(sb.request_bytes_saved.cmp(&sa.request_bytes_saved))
        .then(sb.response_bytes_saved.cmp(&sa.response_bytes_saved))
        .then(sb.connections_saved.cmp(&sa.connections_saved))
        .then(sb.page_reflows_saved.cmp(&sa.page_reflows_saved))
        .then(b.resource_urls.len().cmp(&a.resource_urls.len()))
        .then_with(|| a.first_url().cmp(&b.first_url()))
}

fn default_score(info: &InputInformation, results: &RuleResults) -> i32 {
    let mut request_bytes = 0i64;
    let mut response_bytes = 0i64;
    let mut dns = 0i64;
    let mut requests = 0i64;
    let mut reflows = 0i64;
    let mut critical_path = 0i64;
    let mut connections = 0i64;
    for result in &results.results {
        let s = &result.savings;
        request_bytes += s.request_bytes_saved;
        response_bytes += s.response_bytes_saved;
        dns += s.dns_requests_saved as i64;
        requests += s.requests_saved as i64;
        reflows += s.page_reflows_saved as i64;
        critical_path += s.critical_path_length_saved as i64;
        connections += s.connections_saved as i64;
    }

    let mut normalized = 0.0;
    if request_bytes > 0 {
        if info.total_request_bytes == 0 {
            return -1;
        }
        normalized += REQUEST_BYTES_IMPACT * request_bytes as f64 / info.total_request_bytes as f64;
    }
    if response_bytes > 0 {
        let total = resource_util::total_response_bytes(info);
        if total == 0 {
            return -1;
        }
        normalized += RESPONSE_BYTES_IMPACT * response_bytes as f64 / total as f64;
    }
    if dns > 0 {
        if info.number_hosts == 0 {
            return -1;
        }
        normalized += DNS_LOOKUP_IMPACT * dns as f64 / info.number_hosts as f64;
    }
    if requests > 0 {
        if info.number_resources == 0 {
            return -1;
        }
        normalized += REQUEST_IMPACT * requests as f64 / info.number_resources as f64;
    }
    if reflows > 0 {
        normalized += REFLOW_PENALTY * reflows as f64;
    }
    if critical_path > 0 {
        normalized += CRITICAL_PATH_PENALTY * critical_path as f64;
    }
    if connections > 0 {
        if info.number_resources == 0 {
            return -1;
        }
        normalized += CONNECTIONS_PENALTY * connections as f64 / info.number_resources as f64;
    }

    ((100.0 * (1.0 - normalized)) as i32).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientCharacteristics;

    struct Plain;

    impl Rule for Plain {
        fn name(&self) -> &str {
            "Plain"
        }

        fn header(&self) -> UserFacingString {
            UserFacingString::new("Plain")
        }

        fn append_results(&self, _input: &RuleInput<'_>, _provider: &mut ResultProvider<'_>) -> bool {
            true
        }

        fn format_results(&self, _results: &[&Finding], _formatter: &mut RuleFormatter<'_>) {}
    }

    fn finding(url: &str, requests: i32, bytes: i64) -> Finding {
        let mut f = Finding::new("Plain");
        f.resource_urls.push(url.to_string());
        f.savings.requests_saved = requests;
        f.savings.response_bytes_saved = bytes;
        f
    }

    #[test]
    fn test_default_score() {
        let info = InputInformation {
            number_resources: 10,
            html_response_bytes: 1500,
            ..Default::default()
        };
        let mut results = RuleResults::new("Plain");
        results.results.push(finding("http://a.com/", 1, 0));
        // 1 - 5 * 1/10
        assert_eq!(Plain.compute_score(&info, &results), 50);

        results.results.push(finding("http://b.com/", 0, 125));
        // 1 - 0.5 - 3 * 125/1500
        assert_eq!(Plain.compute_score(&info, &results), 25);

        results.results.push(finding("http://c.com/", 10, 0));
        assert_eq!(Plain.compute_score(&info, &results), 0);
    }

    #[test]
    fn test_score_unavailable() {
        let mut results = RuleResults::new("Plain");
        results.results.push(finding("http://a.com/", 0, 100));
        assert_eq!(Plain.compute_score(&InputInformation::default(), &results), -1);
    }

    #[test]
    fn test_rule_impact() {
        let info = InputInformation {
            client_characteristics: ClientCharacteristics {
                requests_weight: 2.0,
                response_bytes_weight: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut results = RuleResults::new("Plain");
        results.results.push(finding("http://a.com/", 1, 10));
        results.results.push(finding("http://b.com/", 2, 0));
        assert_eq!(Plain.compute_rule_impact(&info, &results), 7.0 + 4.0);
    }

    #[test]
    fn test_presentation_order() {
        let a = finding("http://a.com/", 0, 50);
        let b = finding("http://b.com/", 1, 0);
        let c = finding("http://c.com/", 0, 50);
        let d = finding("http://0.com/", 0, 50);
        let mut sorted = vec![&a, &c, &b, &d];
        Plain.sort_results_in_presentation_order(&mut sorted);
        let urls: Vec<_> = sorted.iter().map(|f| f.first_url().unwrap()).collect();
        assert_eq!(urls, vec!["http://b.com/", "http://0.com/", "http://a.com/", "http://c.com/"]);
    }
}
