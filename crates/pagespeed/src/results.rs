//! Findings and their aggregation
//!
//! `Finding` is one problem a rule found, `RuleResults` everything one
//! rule found plus its score and impact, `Results` the whole run.
//! These are plain data; scoring and formatting live elsewhere.

use crate::contract_violation;
use crate::error::Result;
use crate::pagespeed_input::InputInformation;
use crate::timeline::StackFrame;
use serde::{Deserialize, Serialize};

/// What fixing a finding would save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Savings {
    pub dns_requests_saved: i32,
    pub requests_saved: i32,
    pub response_bytes_saved: i64,
    pub request_bytes_saved: i64,
    pub critical_path_length_saved: i32,
    pub connections_saved: i32,
    pub page_reflows_saved: i32,
}

impl Savings {
    pub fn is_empty(&self) -> bool {
        *self == Savings::default()
    }
}

/// Rule-specific payload attached to a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FindingDetails {
    /// Savings were measured after gzip on both sides
    Minification { post_gzip: bool },
    /// The chain starts at the primary resource
    RedirectChain { is_landing_page: bool },
    /// Natural size of an image the page left unsized
    ImageDimensions { expected_width: u32, expected_height: u32 },
    /// Distinct call stacks that forced a layout
    Reflows { stack_traces: Vec<ReflowStackTrace> },
    /// Stylesheets pulled in with `@import`
    CssImports { imported_stylesheets: Vec<String> },
}

/// One call stack that forced reflows, with how often and how long
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowStackTrace {
    pub frames: Vec<StackFrame>,
    pub count: i32,
    pub duration_millis: f64,
}

/// Rewritten content a host can offer as a replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizedContent {
    pub content: Vec<u8>,
    pub mime_type: String,
}

/// One finding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_name: String,
    pub resource_urls: Vec<String>,
    pub savings: Savings,
    /// Size the savings are measured against (compressed when post-gzip)
    pub original_response_bytes: i64,
    pub details: Option<FindingDetails>,
    pub optimized_content: Option<OptimizedContent>,
    id: Option<u32>,
}

impl Finding {
    pub fn new(rule_name: &str) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Ids are write-once
    pub fn set_id(&mut self, id: u32) -> Result<()> {
        if let Some(existing) = self.id {
            return Err(contract_violation!(
                "Result id already set to {} (attempted {})",
                existing,
                id
            ));
        }
        self.id = Some(id);
        Ok(())
    }

    pub fn first_url(&self) -> Option<&str> {
        self.resource_urls.first().map(String::as_str)
    }

    pub fn is_post_gzip(&self) -> bool {
        matches!(
            self.details,
            Some(FindingDetails::Minification { post_gzip: true })
        )
    }
}

/// Everything one rule found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleResults {
    pub rule_name: String,
    pub results: Vec<Finding>,
    /// 0..=100, None when the rule could not be scored
    pub rule_score: Option<i32>,
    pub rule_impact: f64,
    pub experimental: bool,
}

impl RuleResults {
    pub fn new(rule_name: &str) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            ..Default::default()
        }
    }
}

/// Output of one engine run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub rule_results: Vec<RuleResults>,
    /// Overall 0..=100 score, None when no rule produced one
    pub score: Option<i32>,
    /// Rules whose `append_results` reported failure
    pub error_rules: Vec<String>,
    /// Summary of the input the findings were computed from
    pub input_info: InputInformation,
    ids_populated: bool,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.rule_results.iter().flat_map(|r| r.results.iter())
    }

    pub fn ids_populated(&self) -> bool {
        self.ids_populated
    }

    /// Number every finding 0, 1, 2, ... in rule order
    ///
    /// May run once. Copies made with `Clone` keep the ids.
    pub fn populate_result_ids(&mut self) -> Result<()> {
        if self.ids_populated {
            return Err(contract_violation!("Result ids populated twice"));
        }
        let mut next = 0u32;
        for rule_results in &mut self.rule_results {
            for finding in &mut rule_results.results {
                finding.set_id(next)?;
                next += 1;
            }
        }
        self.ids_populated = true;
        Ok(())
    }
}
