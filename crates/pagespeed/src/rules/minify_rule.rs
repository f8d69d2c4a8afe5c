//! Shared machinery for rules that shrink resource bodies
//!
//! A `Minifier` knows how to minify one kind of content and what to call
//! it. `MinifyRule` does the rest: walks every resource, compares sizes
//! (after gzip when the resource is served compressed), emits findings,
//! formats them and scores them.

use crate::formatter::{Argument, RuleFormatter};
use crate::l10n::UserFacingString;
use crate::pagespeed_input::InputInformation;
use crate::resource::Resource;
use crate::resource_collection::ResourceId;
use crate::resource_util;
use crate::result_provider::ResultProvider;
use crate::results::{Finding, FindingDetails, OptimizedContent, RuleResults};
use crate::rule::Rule;
use crate::rule_input::RuleInput;
use crate::score::WeightedCostBasedScoreComputer;

/// What a minifier made of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinifierOutput {
    /// Not this minifier's kind of content
    CannotBeMinified,
    /// Minification was attempted and failed
    Error(String),
    /// Only the size of the minified content is known
    PlainMinifiedSize(usize),
    DoNotSaveMinifiedContent(Vec<u8>),
    /// Minified content a host may offer as a replacement
    SaveMinifiedContent { content: Vec<u8>, mime_type: String },
}

impl MinifierOutput {
    pub fn minified_size(&self) -> Option<usize> {
        match self {
            MinifierOutput::PlainMinifiedSize(size) => Some(*size),
            MinifierOutput::DoNotSaveMinifiedContent(content)
            | MinifierOutput::SaveMinifiedContent { content, .. } => Some(content.len()),
            MinifierOutput::CannotBeMinified | MinifierOutput::Error(_) => None,
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        match self {
            MinifierOutput::DoNotSaveMinifiedContent(content)
            | MinifierOutput::SaveMinifiedContent { content, .. } => Some(content),
            _ => None,
        }
    }
}

pub trait Minifier: Send + Sync {
    fn name(&self) -> &str;
    fn header_format(&self) -> UserFacingString;
    /// Block header; takes `LINK`, `SIZE_IN_BYTES` and `PERCENTAGE`
    fn body_format(&self) -> UserFacingString;
    /// Per resource; takes `URL`, `SIZE_IN_BYTES` and `PERCENTAGE`
    fn child_format(&self) -> UserFacingString;
    fn child_format_post_gzip(&self) -> UserFacingString;
    fn additional_info_url(&self) -> &str;

    /// Weight applied to saved bytes when scoring
    fn cost_weight(&self) -> f64;
    /// Total bytes of the content kind this minifier handles
    fn relevant_bytes(&self, info: &InputInformation) -> i64;

    fn minify(&self, resource: &Resource, input: &RuleInput<'_>) -> MinifierOutput;
}

pub struct MinifyRule<M> {
    minifier: M,
}

impl<M: Minifier> MinifyRule<M> {
    pub fn with_minifier(minifier: M) -> Self {
        Self { minifier }
    }

    pub fn minifier(&self) -> &M {
        &self.minifier
    }

    fn measure(
        &self,
        id: ResourceId,
        resource: &Resource,
        output: &MinifierOutput,
        input: &RuleInput<'_>,
    ) -> Measurement {
        match output {
            MinifierOutput::CannotBeMinified => return Measurement::Skipped,
            MinifierOutput::Error(message) => {
                tracing::warn!(
                    "{} could not minify {}: {}",
                    self.minifier.name(),
                    resource.request_url(),
                    message
                );
                return Measurement::Skipped;
            }
            _ => {}
        }

        if !resource_util::is_compressed_resource(resource) {
            return match output.minified_size() {
                Some(minified) => Measurement::Sizes {
                    original: resource.response_body().len(),
                    minified,
                    post_gzip: false,
                },
                None => Measurement::Skipped,
            };
        }

        // compare what actually goes over the wire
        let Some(content) = output.content() else {
            tracing::error!(
                "Unable to compare compressed sizes for {}: minified content not retained",
                resource.request_url()
            );
            return Measurement::Failed;
        };
        let sizes = input
            .compressed_response_body_size(id)
            .and_then(|original| Ok((original, resource_util::gzip_size(content)?)));
        match sizes {
            Ok((original, minified)) => Measurement::Sizes {
                original,
                minified,
                post_gzip: true,
            },
            Err(e) => {
                tracing::error!(
                    "Unable to compare compressed sizes for {}: {}",
                    resource.request_url(),
                    e
                );
                Measurement::Failed
            }
        }
    }
}

/// How one resource compares after minification
enum Measurement {
    Skipped,
    /// Sizes could not be compared; the resource is skipped and the rule
    /// reports an error
    Failed,
    Sizes {
        original: usize,
        minified: usize,
        post_gzip: bool,
    },
}

impl<M: Minifier> Rule for MinifyRule<M> {
    fn name(&self) -> &str {
        self.minifier.name()
    }

    fn header(&self) -> UserFacingString {
        self.minifier.header_format()
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        let mut success = true;
        for (id, resource) in input.resources().iter() {
            let output = self.minifier.minify(resource, input);
            let (original, minified, post_gzip) = match self.measure(id, resource, &output, input) {
                Measurement::Sizes {
                    original,
                    minified,
                    post_gzip,
                } => (original, minified, post_gzip),
                Measurement::Skipped => continue,
                Measurement::Failed => {
                    success = false;
                    continue;
                }
            };
            let saved = original as i64 - minified as i64;
            if saved <= 0 {
                continue;
            }

            let finding = provider.new_result();
            finding.original_response_bytes = original as i64;
            finding.resource_urls.push(resource.request_url().to_string());
            finding.savings.response_bytes_saved = saved;
            finding.details = Some(FindingDetails::Minification { post_gzip });
            if let MinifierOutput::SaveMinifiedContent { content, mime_type } = output {
                if !resource.is_response_body_modified() {
                    finding.optimized_content = Some(OptimizedContent { content, mime_type });
                }
            }
        }
        success
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        let total_original: i64 = results.iter().map(|f| f.original_response_bytes).sum();
        let total_saved: i64 = results.iter().map(|f| f.savings.response_bytes_saved).sum();
        if total_saved == 0 {
            return;
        }

        let mut body = formatter.add_url_block(
            &self.minifier.body_format(),
            &[
                Argument::hyperlink("LINK", self.minifier.additional_info_url()),
                Argument::bytes("SIZE_IN_BYTES", total_saved),
                Argument::percentage("PERCENTAGE", total_saved, total_original),
            ],
        );

        for result in results {
            if result.resource_urls.len() != 1 {
                crate::contract_violation!(
                    "Expected 1 resource URL, got {}",
                    result.resource_urls.len()
                );
                continue;
            }
            let saved = result.savings.response_bytes_saved;
            let format = if result.is_post_gzip() {
                self.minifier.child_format_post_gzip()
            } else {
                self.minifier.child_format()
            };
            let mut url = body.add_url_result(
                &format,
                &[
                    Argument::url("URL", &result.resource_urls[0]),
                    Argument::bytes("SIZE_IN_BYTES", saved),
                    Argument::percentage("PERCENTAGE", saved, result.original_response_bytes),
                ],
            );
            if let (Some(id), Some(_)) = (result.id(), &result.optimized_content) {
                url.set_associated_result_id(id);
            }
        }
    }

    fn compute_score(&self, info: &InputInformation, results: &RuleResults) -> i32 {
        WeightedCostBasedScoreComputer::new(
            results,
            self.minifier.relevant_bytes(info),
            self.minifier.cost_weight(),
        )
        .compute_score()
    }
}
