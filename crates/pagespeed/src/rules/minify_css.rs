use super::minify_rule::{Minifier, MinifierOutput, MinifyRule};
use crate::l10n::UserFacingString;
use crate::minify;
use crate::pagespeed_input::InputInformation;
use crate::resource::{Resource, ResourceType};
use crate::resource_util;
use crate::rule_input::RuleInput;

const COST_WEIGHT: f64 = 3.5;

pub struct CssMinifier {
    save_optimized_content: bool,
}

impl Minifier for CssMinifier {
    fn name(&self) -> &str {
        "MinifyCss"
    }

    fn header_format(&self) -> UserFacingString {
        UserFacingString::new("Minify CSS")
    }

    fn body_format(&self) -> UserFacingString {
        UserFacingString::new(
            "%(BEGIN_LINK)sMinify CSS%(END_LINK)s for the following resources to reduce \
             their size by %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction).",
        )
    }

    fn child_format(&self) -> UserFacingString {
        UserFacingString::new("Minifying %(URL)s could save %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction).")
    }

    fn child_format_post_gzip(&self) -> UserFacingString {
        UserFacingString::new(
            "Minifying %(URL)s could save %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction) after compression.",
        )
    }

    fn additional_info_url(&self) -> &str {
        "https://developers.google.com/speed/docs/insights/MinifyResources"
    }

    fn cost_weight(&self) -> f64 {
        COST_WEIGHT
    }

    fn relevant_bytes(&self, info: &InputInformation) -> i64 {
        info.css_response_bytes
    }

    fn minify(&self, resource: &Resource, _input: &RuleInput<'_>) -> MinifierOutput {
        if resource.resource_type() != ResourceType::Css {
            return MinifierOutput::CannotBeMinified;
        }
        let body = resource.response_body();
        // content is needed for the post-gzip comparison too
        if !self.save_optimized_content && !resource_util::is_compressed_resource(resource) {
            return MinifierOutput::PlainMinifiedSize(minify::minified_css_size(body));
        }
        let content = minify::minify_css(body);
        if self.save_optimized_content {
            MinifierOutput::SaveMinifiedContent {
                content,
                mime_type: "text/css".to_string(),
            }
        } else {
            MinifierOutput::DoNotSaveMinifiedContent(content)
        }
    }
}

pub type MinifyCss = MinifyRule<CssMinifier>;

impl MinifyRule<CssMinifier> {
    pub fn new(save_optimized_content: bool) -> Self {
        MinifyRule::with_minifier(CssMinifier { save_optimized_content })
    }
}
