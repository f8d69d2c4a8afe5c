//! `FormattedResults` → JSON
//!
//! Format strings come out with placeholders rewritten to `{{KEY}}` next
//! to their argument list, so a host can render them with its own markup.
//! Optional fields are left out rather than written as null.

use super::formatted::{FormatString, FormattedResults, FormattedRuleResults, FormattedUrlBlockResults, FormattedUrlResult};
use crate::error::Result;
use serde_json::{json, Map, Value};

pub fn convert(results: &FormattedResults) -> Value {
    let mut root = Map::new();
    root.insert("locale".into(), json!(results.locale));
    if let Some(score) = results.score {
        root.insert("score".into(), json!(score));
    }
    if !results.rule_results.is_empty() {
        let rules: Vec<Value> = results.rule_results.iter().map(convert_rule).collect();
        root.insert("rule_results".into(), Value::Array(rules));
    }
    Value::Object(root)
}

pub fn convert_to_string(results: &FormattedResults, pretty: bool) -> Result<String> {
    let value = convert(results);
    let text = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(text)
}

fn convert_rule(rule: &FormattedRuleResults) -> Value {
    let mut out = Map::new();
    out.insert("rule_name".into(), json!(rule.rule_name));
    if let Some(score) = rule.rule_score {
        out.insert("rule_score".into(), json!(score));
    }
    if let Some(impact) = rule.rule_impact {
        out.insert("rule_impact".into(), json!(impact));
    }
    if rule.experimental {
        out.insert("experimental".into(), json!(true));
    }
    out.insert("localized_rule_name".into(), json!(rule.localized_rule_name));
    if !rule.url_blocks.is_empty() {
        let blocks: Vec<Value> = rule.url_blocks.iter().map(convert_block).collect();
        out.insert("url_blocks".into(), Value::Array(blocks));
    }
    Value::Object(out)
}

fn convert_block(block: &FormattedUrlBlockResults) -> Value {
    let mut out = Map::new();
    if let Some(header) = &block.header {
        out.insert("header".into(), convert_format_string(header));
    }
    if !block.urls.is_empty() {
        let urls: Vec<Value> = block.urls.iter().map(convert_url).collect();
        out.insert("urls".into(), Value::Array(urls));
    }
    if let Some(id) = block.associated_result_id {
        out.insert("associated_result_id".into(), json!(id));
    }
    Value::Object(out)
}

fn convert_url(url: &FormattedUrlResult) -> Value {
    let mut out = Map::new();
    out.insert("result".into(), convert_format_string(&url.result));
    if !url.details.is_empty() {
        let details: Vec<Value> = url.details.iter().map(convert_format_string).collect();
        out.insert("details".into(), Value::Array(details));
    }
    if let Some(id) = url.associated_result_id {
        out.insert("associated_result_id".into(), json!(id));
    }
    Value::Object(out)
}

fn convert_format_string(format: &FormatString) -> Value {
    let mut out = Map::new();
    out.insert("format".into(), json!(format.format_with_braces()));
    if !format.args.is_empty() {
        // FormatArgument's serde shape is the wire shape
        out.insert("args".into(), json!(format.args));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::argument::{ArgumentType, FormatArgument};

    fn sample() -> FormattedResults {
        let header = FormatString {
            format: "Minifying the following could save %(SIZE)s.".into(),
            args: vec![FormatArgument {
                arg_type: ArgumentType::Bytes,
                placeholder_key: "SIZE".into(),
                localized_value: "1.5KiB".into(),
                string_value: None,
                int_value: Some(1536),
            }],
        };
        let url = FormatString {
            format: "%(URL)s".into(),
            args: vec![FormatArgument {
                arg_type: ArgumentType::Url,
                placeholder_key: "URL".into(),
                localized_value: "http://a.com/a.css".into(),
                string_value: Some("http://a.com/a.css".into()),
                int_value: None,
            }],
        };
        FormattedResults {
            locale: "en_US".into(),
            score: Some(88),
            rule_results: vec![
                FormattedRuleResults {
                    rule_name: "MinifyCss".into(),
                    localized_rule_name: "Minify CSS".into(),
                    rule_score: Some(75),
                    rule_impact: Some(1.5),
                    experimental: false,
                    url_blocks: vec![FormattedUrlBlockResults {
                        header: Some(header),
                        urls: vec![FormattedUrlResult {
                            result: url,
                            details: vec![],
                            associated_result_id: Some(0),
                        }],
                        associated_result_id: None,
                    }],
                },
                FormattedRuleResults {
                    rule_name: "MinimizeRedirects".into(),
                    localized_rule_name: "Minimize redirects".into(),
                    rule_score: Some(100),
                    rule_impact: Some(0.0),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_convert() {
        let value = convert(&sample());
        assert_eq!(value["locale"], "en_US");
        assert_eq!(value["score"], 88);

        let rule = &value["rule_results"][0];
        assert_eq!(rule["rule_name"], "MinifyCss");
        assert_eq!(rule["localized_rule_name"], "Minify CSS");
        assert!(rule.get("experimental").is_none());

        let header = &rule["url_blocks"][0]["header"];
        assert_eq!(header["format"], "Minifying the following could save {{SIZE}}.");
        assert_eq!(
            header["args"][0],
            json!({"type": "BYTES", "placeholder_key": "SIZE", "localized_value": "1.5KiB", "int_value": 1536})
        );

        let url = &rule["url_blocks"][0]["urls"][0];
        assert_eq!(url["result"]["args"][0]["string_value"], "http://a.com/a.css");
        assert_eq!(url["associated_result_id"], 0);
        assert!(url.get("details").is_none());

        let clean = &value["rule_results"][1];
        assert!(clean.get("url_blocks").is_none());
        assert_eq!(clean["rule_score"], 100);
    }

    #[test]
    fn test_empty_results() {
        let value = convert(&FormattedResults {
            locale: "fr".into(),
            ..Default::default()
        });
        assert_eq!(value, json!({"locale": "fr"}));
        assert_eq!(
            convert_to_string(&FormattedResults::default(), false).unwrap(),
            r#"{"locale":""}"#
        );
    }
}
