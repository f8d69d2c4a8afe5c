//! The finished, localized result tree that converters walk

use super::argument::{tokenize, Argument, ArgumentType, FormatArgument, Token};
use crate::contract_violation;
use crate::l10n::{Localizer, UserFacingString};

/// A localized format string with its arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatString {
    pub format: String,
    pub args: Vec<FormatArgument>,
}

impl FormatString {
    /// Localize `format` and `args`
    ///
    /// A placeholder without an argument, or an argument without a
    /// placeholder, is a contract violation; the string is still built.
    pub fn new(localizer: &dyn Localizer, format: &UserFacingString, args: &[Argument]) -> Self {
        if let Err(problem) = super::argument::validate_placeholders(format.text(), args) {
            contract_violation!("Bad format string {:?}: {}", format.text(), problem);
        }
        Self {
            format: localizer.localize_string(format),
            args: args.iter().map(|a| a.localize(localizer)).collect(),
        }
    }

    fn named(&self, key: &str) -> Option<&FormatArgument> {
        self.args.iter().find(|a| a.placeholder_key == key)
    }

    /// The hyperlink argument a `BEGIN_x`/`END_x` placeholder refers to
    fn link(&self, key: &str, prefix: &str) -> Option<&FormatArgument> {
        let base = key.strip_prefix(prefix)?;
        self.args
            .iter()
            .find(|a| a.arg_type == ArgumentType::Hyperlink && a.placeholder_key == base)
    }

    /// Render with every placeholder replaced; link tags are dropped
    pub fn render_plain(&self) -> String {
        self.render_with_links(|_, text| text.to_string())
    }

    /// Render, passing the text between each link's tags through
    /// `wrap(href, text)`
    pub fn render_with_links(&self, wrap: impl Fn(&str, &str) -> String) -> String {
        let mut out = String::new();
        // (href, text so far) while inside a link
        let mut open: Option<(String, String)> = None;

        for token in tokenize(&self.format) {
            let piece = match token {
                Token::Literal(text) => text.to_string(),
                Token::Escaped(c) => c.to_string(),
                Token::Positional(index) => match self.args.get(index) {
                    Some(arg) => arg.localized_value.clone(),
                    None => String::new(),
                },
                Token::Named(key) => {
                    if let Some(link) = self.link(key, "BEGIN_") {
                        open = Some((link.localized_value.clone(), String::new()));
                        continue;
                    }
                    if self.link(key, "END_").is_some() {
                        if let Some((href, text)) = open.take() {
                            out.push_str(&wrap(&href, &text));
                        }
                        continue;
                    }
                    match self.named(key) {
                        Some(arg) => arg.localized_value.clone(),
                        None => String::new(),
                    }
                }
            };
            match open.as_mut() {
                Some((_, text)) => text.push_str(&piece),
                None => out.push_str(&piece),
            }
        }
        // unterminated link: keep its text
        if let Some((_, text)) = open {
            out.push_str(&text);
        }
        out
    }

    /// The format with each placeholder rewritten to `{{KEY}}`
    pub fn format_with_braces(&self) -> String {
        let mut out = String::new();
        for token in tokenize(&self.format) {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Escaped(c) => out.push(c),
                Token::Named(key) => {
                    out.push_str("{{");
                    out.push_str(key);
                    out.push_str("}}");
                }
                Token::Positional(index) => match self.args.get(index) {
                    Some(arg) => {
                        out.push_str("{{");
                        out.push_str(&arg.placeholder_key);
                        out.push_str("}}");
                    }
                    None => {}
                },
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedUrlResult {
    pub result: FormatString,
    pub details: Vec<FormatString>,
    pub associated_result_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedUrlBlockResults {
    pub header: Option<FormatString>,
    pub urls: Vec<FormattedUrlResult>,
    pub associated_result_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedRuleResults {
    pub rule_name: String,
    pub localized_rule_name: String,
    pub rule_score: Option<i32>,
    pub rule_impact: Option<f64>,
    pub experimental: bool,
    pub url_blocks: Vec<FormattedUrlBlockResults>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedResults {
    pub locale: String,
    pub score: Option<i32>,
    pub rule_results: Vec<FormattedRuleResults>,
}
