use super::ResultFilter;
use crate::results::Finding;

pub const DEFAULT_RESPONSE_BYTES_THRESHOLD: i64 = 100;

/// Drops findings whose only benefit is a handful of response bytes
///
/// A finding that saves requests, round trips, reflows or request bytes
/// is always kept.
#[derive(Debug, Clone, Copy)]
pub struct ResponseByteResultFilter {
    threshold: i64,
}

impl ResponseByteResultFilter {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_RESPONSE_BYTES_THRESHOLD)
    }

    pub fn with_threshold(threshold: i64) -> Self {
        Self { threshold }
    }
}

impl Default for ResponseByteResultFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFilter for ResponseByteResultFilter {
    fn is_accepted(&self, finding: &Finding) -> bool {
        let s = &finding.savings;
        if s.dns_requests_saved != 0
            || s.requests_saved != 0
            || s.request_bytes_saved != 0
            || s.critical_path_length_saved != 0
            || s.connections_saved != 0
            || s.page_reflows_saved != 0
        {
            return true;
        }
        s.response_bytes_saved >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(response_bytes: i64, requests: i32) -> Finding {
        let mut f = Finding::new("Rule");
        f.savings.response_bytes_saved = response_bytes;
        f.savings.requests_saved = requests;
        f
    }

    #[test]
    fn test_threshold() {
        let filter = ResponseByteResultFilter::new();
        assert!(!filter.is_accepted(&finding(99, 0)));
        assert!(filter.is_accepted(&finding(100, 0)));
        assert!(filter.is_accepted(&finding(0, 1)));
        assert!(!filter.is_accepted(&finding(0, 0)));
        assert!(ResponseByteResultFilter::with_threshold(10).is_accepted(&finding(10, 0)));
    }
}
