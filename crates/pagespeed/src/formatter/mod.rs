//! Formatting layer
//!
//! Rules describe their findings through the `Formatter` tree builder
//! using typed `Argument`s. The finished `FormattedResults` tree is
//! rendered by the JSON or text converter.

pub mod argument;
mod builder;
mod formatted;
pub mod json_converter;
pub mod text_converter;
pub mod util;

pub use argument::{Argument, ArgumentType, FormatArgument};
pub use builder::{Formatter, RuleFormatter, UrlBlockFormatter, UrlFormatter};
pub use formatted::{
    FormatString, FormattedResults, FormattedRuleResults, FormattedUrlBlockResults, FormattedUrlResult,
};
