//! `FormattedResults` → plain text, one line per node

use super::formatted::FormattedResults;
use std::fmt;

/// Plain-text rendering of formatted results
pub struct TextReport<'r>(pub &'r FormattedResults);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.0.rule_results {
            match rule.rule_score {
                Some(score) => writeln!(f, "_{}_ ({}/100)", rule.localized_rule_name, score)?,
                None => writeln!(f, "_{}_", rule.localized_rule_name)?,
            }
            for block in &rule.url_blocks {
                if let Some(header) = &block.header {
                    writeln!(f, "  {}", header.render_plain())?;
                }
                for url in &block.urls {
                    writeln!(f, "    * {}", url.result.render_plain())?;
                    for detail in &url.details {
                        writeln!(f, "      - {}", detail.render_plain())?;
                    }
                }
            }
        }
        if let Some(score) = self.0.score {
            writeln!(f, "**[{}/100]**", score)?;
        }
        Ok(())
    }
}

pub fn convert(results: &FormattedResults) -> String {
    TextReport(results).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{Argument, Formatter};
    use crate::l10n::{BasicLocalizer, UserFacingString};
    use crate::rules::MinimizeRedirects;

    #[test]
    fn test_convert() {
        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        {
            let rule = MinimizeRedirects::new();
            let mut rule_formatter = formatter.add_rule(&rule, Some(50), 3.0);
            let mut block = rule_formatter.add_url_block(
                &UserFacingString::new("Remove the following redirect chain if possible:"),
                &[],
            );
            let mut url = block.add_url("http://a.com/");
            url.add_detail(&UserFacingString::new("Saves %(N)s requests"), &[Argument::integer("N", 1)]);
            block.add_url("http://www.a.com/");
        }
        formatter.set_overall_score(85);
        formatter.finalize();

        let text = convert(formatter.results());
        assert_eq!(
            text,
            "_Minimize redirects_ (50/100)\n\
             \x20 Remove the following redirect chain if possible:\n\
             \x20   * http://a.com/\n\
             \x20     - Saves 1 requests\n\
             \x20   * http://www.a.com/\n\
             **[85/100]**\n"
        );
    }

    #[test]
    fn test_unscored_rule_without_overall_score() {
        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        {
            let rule = MinimizeRedirects::new();
            let mut rule_formatter = formatter.add_rule(&rule, None, 0.0);
            rule_formatter.add_headerless_url_block().add_url("http://a.com/");
        }
        formatter.finalize();

        let report = TextReport(formatter.results());
        assert_eq!(report.to_string(), "_Minimize redirects_\n    * http://a.com/\n");
        assert_eq!(convert(formatter.results()), format!("{}", report));
    }
}
