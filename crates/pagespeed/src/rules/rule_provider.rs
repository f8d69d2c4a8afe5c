//! The fixed rule set, in the order results are reported

use super::{
    AvoidCssImport, CombineExternalResources, EliminateUnnecessaryReflows, EnableGzipCompression, MinifyCss,
    MinifyHtml, MinifyJavaScript, MinimizeDnsLookups, MinimizeRedirects, SpecifyImageDimensions,
};
use crate::rule::Rule;

/// Every rule the engine knows, keyed for lookup by `Rule::name`
pub fn page_speed_rules(save_optimized_content: bool) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(MinifyCss::new(save_optimized_content)),
        Box::new(MinifyHtml::new(save_optimized_content)),
        Box::new(MinifyJavaScript::new(save_optimized_content)),
        Box::new(EnableGzipCompression::new()),
        Box::new(MinimizeRedirects::new()),
        Box::new(MinimizeDnsLookups::new()),
        Box::new(CombineExternalResources::css()),
        Box::new(CombineExternalResources::javascript()),
        Box::new(AvoidCssImport::new()),
        Box::new(SpecifyImageDimensions::new()),
        Box::new(EliminateUnnecessaryReflows::new()),
    ]
}

/// Rules whose name appears in `names`; unknown names are logged and skipped
pub fn rules_by_name(names: &[&str], save_optimized_content: bool) -> Vec<Box<dyn Rule>> {
    let all = page_speed_rules(save_optimized_content);
    for name in names {
        if !all.iter().any(|rule| rule.name() == *name) {
            tracing::warn!("Unknown rule {}", name);
        }
    }
    all.into_iter()
        .filter(|rule| names.contains(&rule.name()))
        .collect()
}
