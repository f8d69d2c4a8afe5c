//! Concrete rules
//!
//! Each rule scans the frozen input for one kind of problem, records what
//! fixing it would save and knows how to present its own findings.

mod avoid_css_import;
mod combine_external_resources;
mod eliminate_unnecessary_reflows;
mod enable_gzip_compression;
mod minify_css;
mod minify_html;
mod minify_javascript;
pub mod minify_rule;
mod minimize_dns_lookups;
mod minimize_redirects;
pub mod rule_provider;
mod specify_image_dimensions;

pub use avoid_css_import::AvoidCssImport;
pub use combine_external_resources::CombineExternalResources;
pub use eliminate_unnecessary_reflows::EliminateUnnecessaryReflows;
pub use enable_gzip_compression::EnableGzipCompression;
pub use minify_css::{CssMinifier, MinifyCss};
pub use minify_html::{HtmlMinifier, MinifyHtml};
pub use minify_javascript::{JsMinifier, MinifyJavaScript};
pub use minify_rule::{Minifier, MinifierOutput, MinifyRule};
pub use minimize_dns_lookups::MinimizeDnsLookups;
pub use minimize_redirects::MinimizeRedirects;
pub use specify_image_dimensions::SpecifyImageDimensions;
pub use rule_provider::{page_speed_rules, rules_by_name};
