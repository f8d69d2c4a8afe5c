use pagespeed::formatter::text_converter;
use pagespeed::{analyze, run_pagespeed_rules, run_pagespeed_rules_json, EngineConfig, RunRequest};
use serde_json::{json, Value};

const AD_URL: &str = "http://ad.doubleclick.net/slot.js";

fn entry(url: &str, status: i64, headers: Value, body: &str) -> Value {
    json!({
        "startedDateTime": "2026-01-01T00:00:00.000Z",
        "request": {"method": "GET", "url": url, "httpVersion": "HTTP/1.1", "headers": []},
        "response": {
            "status": status,
            "httpVersion": "HTTP/1.1",
            "headers": headers,
            "content": {"text": body}
        }
    })
}

fn typed(content_type: &str) -> Value {
    json!([{"name": "Content-Type", "value": content_type}])
}

fn located(location: &str) -> Value {
    json!([{"name": "Location", "value": location}])
}

fn html() -> String {
    let mut html = String::from("<html>\n  <head>\n    <title>Example</title>\n  </head>\n  <body>\n");
    for i in 0..30 {
        html.push_str(&format!(
            "    <!-- item {} -->\n    <div class=\"item\">\n      <p>Item   number   {}</p>\n    </div>\n",
            i, i
        ));
    }
    html.push_str("  </body>\n</html>\n");
    html
}

fn css() -> String {
    (0..40)
        .map(|i| format!("/* block {} */\n.item-{}  {{\n    color : red ;\n    margin : 0 ;\n}}\n\n", i, i))
        .collect()
}

fn page_har() -> String {
    let ad = "var adSlot = document.createElement('div');\n".repeat(40);
    let script = "function track(event) { return event; }\n".repeat(20);
    json!({"log": {"entries": [
        entry("http://example.com/", 301, located("http://www.example.com/"), ""),
        entry("http://www.example.com/", 200, typed("text/html"), &html()),
        entry("http://www.example.com/site.css", 200, typed("text/css"), &css()),
        entry("http://cdn.example.com/old.js", 302, located("http://static.other.com/new.js"), ""),
        entry("http://static.other.com/new.js", 200, typed("application/javascript"), &script),
        entry(AD_URL, 200, typed("application/javascript"), &ad),
    ]}})
    .to_string()
}

fn document() -> String {
    json!({
        "documentUrl": "http://example.com/",
        "baseUrl": "http://example.com/",
        "elements": [
            {"tag": "HTML", "children": [1]},
            {"tag": "BODY", "children": [2, 3]},
            {"tag": "LINK", "attrs": {"rel": "stylesheet", "href": "site.css"}},
            {"tag": "IMG", "attrs": {"src": "logo.png", "width": "10"}}
        ]
    })
    .to_string()
}

fn request(filter: &str) -> RunRequest {
    let mut request = RunRequest::new("page-1", &page_har()).with_config(EngineConfig {
        resource_filter: filter.to_string(),
        ..Default::default()
    });
    request.document = document();
    request
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn run(request: &RunRequest) -> Value {
    init_logging();
    let output = run_pagespeed_rules(request);
    assert!(output.success, "{}", output.error);
    assert!(output.error.is_empty());
    serde_json::from_str(&output.output).unwrap()
}

fn rule<'a>(root: &'a Value, name: &str) -> &'a Value {
    root["results"]["rule_results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["rule_name"] == name)
        .unwrap_or_else(|| panic!("no results for {}", name))
}

#[test]
fn test_full_run() {
    let root = run(&request("all"));
    assert_eq!(root["id"], "page-1");
    assert_eq!(root["resourceFilterName"], "all");

    let score = root["results"]["score"].as_i64().unwrap();
    assert!((0..=100).contains(&score));

    let names: Vec<_> = root["results"]["rule_results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["rule_name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "MinifyCss",
            "MinifyHTML",
            "MinifyJavaScript",
            "EnableGzipCompression",
            "MinimizeRedirects",
            "MinimizeDnsLookups",
            "CombineExternalCss",
            "CombineExternalJavaScript",
            "AvoidCssImport",
            "SpecifyImageDimensions",
            "EliminateUnnecessaryReflows",
        ]
    );

    // the benign example.com → www.example.com hop is filtered out
    let redirects = rule(&root, "MinimizeRedirects");
    let blocks = redirects["url_blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    let urls = blocks[0]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0]["result"]["args"][0]["string_value"], "http://cdn.example.com/old.js");

    let gzip = rule(&root, "EnableGzipCompression");
    assert!(gzip["rule_impact"].as_f64().unwrap() > 0.0);
    assert!(gzip["url_blocks"][0]["urls"].as_array().unwrap().len() >= 3);

    // the lone cdn.example.com lookup; example.com leads to the page itself
    let dns = rule(&root, "MinimizeDnsLookups");
    let dns_urls = dns["url_blocks"][0]["urls"].as_array().unwrap();
    assert_eq!(dns_urls.len(), 1);
    assert_eq!(dns_urls[0]["result"]["args"][0]["string_value"], "http://cdn.example.com/old.js");

    let images = rule(&root, "SpecifyImageDimensions");
    assert_eq!(
        images["url_blocks"][0]["urls"][0]["result"]["args"][0]["string_value"],
        "http://example.com/logo.png"
    );

    let reflows = rule(&root, "EliminateUnnecessaryReflows");
    assert_eq!(reflows["experimental"], true);
    assert!(reflows.get("url_blocks").is_none());

    assert!(rule(&root, "MinifyJavaScript")["url_blocks"].as_array().is_some());
    assert!(rule(&root, "MinifyCss")["url_blocks"].as_array().is_some());
    assert!(rule(&root, "MinifyHTML")["url_blocks"].as_array().is_some());
    assert!(root["optimizedContent"].as_object().unwrap().is_empty());
}

#[test]
fn test_content_filter_drops_ads() {
    let all = run(&request("all")).to_string();
    assert!(all.contains(AD_URL));

    let content = run(&request("content"));
    assert_eq!(content["resourceFilterName"], "content");
    assert!(!content.to_string().contains(AD_URL));
}

#[test]
fn test_mobile_weighs_more() {
    let desktop = run(&request("all"));
    let mut mobile_request = request("all");
    mobile_request.config.mobile = true;
    let mobile = run(&mobile_request);

    let impact = |root: &Value| rule(root, "EnableGzipCompression")["rule_impact"].as_f64().unwrap();
    assert!(impact(&mobile) > impact(&desktop));
    assert!(mobile["results"]["score"].as_i64() <= desktop["results"]["score"].as_i64());
}

#[test]
fn test_optimized_content() {
    let mut request = request("all");
    request.config.save_optimized_content = true;
    let root = run(&request);

    let optimized = root["optimizedContent"].as_object().unwrap();
    let mimetypes: Vec<_> = optimized.values().map(|v| v["mimetype"].as_str().unwrap()).collect();
    assert!(mimetypes.contains(&"text/css"));
    assert!(mimetypes.contains(&"text/html"));
    for (id, content) in optimized {
        assert!(id.parse::<u32>().is_ok());
        assert!(!content["filename"].as_str().unwrap().is_empty());
        assert!(!content["content"].as_str().unwrap().is_empty());
    }
}

#[test]
fn test_text_output() {
    let analysis = analyze(&request("all")).unwrap();
    let text = text_converter::convert(&analysis.formatted);
    assert!(text.contains("_Minimize redirects_"));
    assert!(text.contains("    * http://cdn.example.com/old.js\n"));
    assert!(text.contains("Compressing the following resources with gzip"));
    assert!(text.ends_with("/100]**\n"));
}

#[test]
fn test_json_entry_point() {
    let data = json!({
        "id": "json-1",
        "har": page_har(),
        "document": document(),
        "timeline": "[]",
        "resource_filter": "all",
        "locale": "en_US",
        "save_optimized_content": false,
        "mobile": false
    })
    .to_string();
    let output = run_pagespeed_rules_json(&data);
    assert!(output.success, "{}", output.error);
    let root: Value = serde_json::from_str(&output.output).unwrap();
    assert_eq!(root["id"], "json-1");
    assert_eq!(root["results"]["locale"], "en_US");
}

#[test]
fn test_empty_har() {
    let request = RunRequest::new("empty", r#"{"log": {"entries": []}}"#);
    let root = run(&request);
    // nothing found anywhere
    assert_eq!(root["results"]["score"], 100);
    for rule in root["results"]["rule_results"].as_array().unwrap() {
        assert_eq!(rule["rule_score"], 100);
        assert!(rule.get("url_blocks").is_none());
    }
}
