//! Content minifiers used by the minification rules

pub mod css;
pub mod html;
pub mod js;

pub use css::{minified_css_size, minify_css};
pub use html::compact_html;
pub use js::{minify_js, JsMinifyError};
