use super::minify_rule::{Minifier, MinifierOutput, MinifyRule};
use crate::l10n::UserFacingString;
use crate::minify;
use crate::pagespeed_input::InputInformation;
use crate::resource::{Resource, ResourceType};
use crate::rule_input::RuleInput;

const COST_WEIGHT: f64 = 3.5;

pub struct JsMinifier {
    save_optimized_content: bool,
}

impl Minifier for JsMinifier {
    fn name(&self) -> &str {
        "MinifyJavaScript"
    }

    fn header_format(&self) -> UserFacingString {
        UserFacingString::new("Minify JavaScript")
    }

    fn body_format(&self) -> UserFacingString {
        UserFacingString::new(
            "%(BEGIN_LINK)sMinify JavaScript%(END_LINK)s for the following resources to reduce \
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
        info.js_response_bytes
    }

    fn minify(&self, resource: &Resource, _input: &RuleInput<'_>) -> MinifierOutput {
        if resource.resource_type() != ResourceType::Js {
            return MinifierOutput::CannotBeMinified;
        }
        let content = match minify::minify_js(resource.response_body()) {
            Ok(content) => content,
            Err(err) => return MinifierOutput::Error(err.to_string()),
        };
        if self.save_optimized_content {
            MinifierOutput::SaveMinifiedContent {
                content,
                mime_type: "application/javascript".to_string(),
            }
        } else {
            MinifierOutput::DoNotSaveMinifiedContent(content)
        }
    }
}

pub type MinifyJavaScript = MinifyRule<JsMinifier>;

impl MinifyRule<JsMinifier> {
    pub fn new(save_optimized_content: bool) -> Self {
        MinifyRule::with_minifier(JsMinifier { save_optimized_content })
    }
}
