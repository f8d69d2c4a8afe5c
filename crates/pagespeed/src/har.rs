//! HTTP Archive (HAR) import
//!
//! Fills a `PagespeedInput` from `log.entries`. Every structural problem
//! is logged; if there was any, the whole archive is rejected so callers
//! never analyze a partial page.

use crate::error::{PagespeedError, Result};
use crate::filters::{AllowAllResourceFilter, ResourceFilter};
use crate::pagespeed_input::PagespeedInput;
use crate::resource::Resource;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

/// Parse HAR text, admitting every resource
pub fn parse_har_str(text: &str) -> Result<PagespeedInput> {
    parse_har(text, Box::new(AllowAllResourceFilter))
}

/// Parse HAR text into an unfrozen input whose collection uses `filter`
pub fn parse_har(text: &str, filter: Box<dyn ResourceFilter>) -> Result<PagespeedInput> {
    let value: Value = serde_json::from_str(text).map_err(|e| PagespeedError::Har(e.to_string()))?;
    parse_har_value(&value, filter)
}

pub fn parse_har_value(value: &Value, filter: Box<dyn ResourceFilter>) -> Result<PagespeedInput> {
    let mut input = PagespeedInput::with_filter(filter);
    populate_input(value, &mut input)?;
    Ok(input)
}

/// Add the archive's entries to an input the caller has configured
///
/// Nothing is added when the archive has any structural problem.
pub fn populate_input(value: &Value, input: &mut PagespeedInput) -> Result<()> {
    let mut populator = HarPopulator::default();
    let entries = populator.entries(value);

    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        let before = populator.errors.len();
        let resource = populator.resource(entry);
        if populator.errors.len() == before {
            parsed.push(resource);
        }
    }

    if let Some(first) = populator.errors.first() {
        return Err(PagespeedError::Har(format!(
            "{} ({} problem(s))",
            first,
            populator.errors.len()
        )));
    }

    // Start times are relative to the earliest entry that has one
    let earliest = parsed.iter().filter_map(|(_, started)| *started).min();
    for (mut resource, started) in parsed {
        if let (Some(started), Some(earliest)) = (started, earliest) {
            resource.set_request_start_time_millis((started - earliest).num_milliseconds());
        }
        let url = resource.request_url().to_string();
        if !input.add_resource(resource) {
            tracing::info!("Skipping HAR entry for {}", url);
        }
    }
    if let Some(onload) = page_onload_millis(value, earliest) {
        input.set_onload_time_millis(onload);
    }
    tracing::debug!("Imported {} resources from HAR", input.resources().len());
    Ok(())
}

/// Onload of the first page, moved onto the entries' clock
///
/// `pageTimings.onLoad` counts from the page's `startedDateTime`; a
/// missing or negative value means the time is unknown.
fn page_onload_millis(har: &Value, earliest: Option<DateTime<FixedOffset>>) -> Option<i64> {
    let page = har.pointer("/log/pages/0")?;
    let onload = page.pointer("/pageTimings/onLoad").and_then(Value::as_f64)?;
    if onload < 0.0 {
        return None;
    }
    let page_started = page
        .get("startedDateTime")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());
    let offset = match (page_started, earliest) {
        (Some(page_started), Some(earliest)) => (page_started - earliest).num_milliseconds(),
        _ => 0,
    };
    Some((offset + onload as i64).max(0))
}

#[derive(Default)]
struct HarPopulator {
    errors: Vec<String>,
}

impl HarPopulator {
    fn error(&mut self, message: String) {
        tracing::error!("{}", message);
        self.errors.push(message);
    }

    fn entries<'a>(&mut self, har: &'a Value) -> &'a [Value] {
        let Some(har) = har.as_object() else {
            self.error("Top-level JSON value must be an object.".to_string());
            return &[];
        };
        let Some(log) = har.get("log").and_then(Value::as_object) else {
            self.error("\"log\" field must be an object.".to_string());
            return &[];
        };
        match log.get("entries").and_then(Value::as_array) {
            Some(entries) => entries,
            None => {
                self.error("\"entries\" field must be an array.".to_string());
                &[]
            }
        }
    }

    fn string(&mut self, object: &Map<String, Value>, key: &str) -> String {
        match object.get(key).and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => {
                self.error(format!("\"{}\" field must be a string.", key));
                String::new()
            }
        }
    }

    fn int(&mut self, object: &Map<String, Value>, key: &str) -> i64 {
        match object.get(key).and_then(Value::as_i64) {
            Some(n) => n,
            None => {
                self.error(format!("\"{}\" field must be a number.", key));
                0
            }
        }
    }

    fn resource(&mut self, entry: &Value) -> (Resource, Option<DateTime<FixedOffset>>) {
        let mut resource = Resource::new();
        let Some(entry) = entry.as_object() else {
            self.error("Entry item must be an object.".to_string());
            return (resource, None);
        };

        let started = match entry.get("startedDateTime").and_then(Value::as_str) {
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!("Ignoring bad startedDateTime {:?}: {}", raw, e);
                    None
                }
            },
            None => None,
        };

        match entry.get("request").and_then(Value::as_object) {
            Some(request) => self.request(request, &mut resource),
            None => self.error("\"request\" field must be an object.".to_string()),
        }
        match entry.get("response").and_then(Value::as_object) {
            Some(response) => self.response(response, &mut resource),
            None => self.error("\"response\" field must be an object.".to_string()),
        }
        (resource, started)
    }

    fn request(&mut self, request: &Map<String, Value>, resource: &mut Resource) {
        resource.set_request_method(&self.string(request, "method"));
        resource.set_request_url(&self.string(request, "url"));
        resource.set_request_protocol(&self.string(request, "httpVersion"));
        for (name, value) in self.headers(request) {
            resource.add_request_header(&name, &value);
        }
        match request.get("postData") {
            None => {}
            Some(Value::Object(post)) => resource.set_request_body(&self.string(post, "text")),
            Some(_) => self.error("\"postData\" field must be an object.".to_string()),
        }
    }

    fn response(&mut self, response: &Map<String, Value>, resource: &mut Resource) {
        let status = self.int(response, "status");
        resource.set_response_status_code(i32::try_from(status).unwrap_or(0));
        resource.set_response_protocol(&self.string(response, "httpVersion"));
        for (name, value) in self.headers(response) {
            resource.add_response_header(&name, &value);
        }

        let Some(content) = response.get("content").and_then(Value::as_object) else {
            self.error("\"content\" field must be an object.".to_string());
            return;
        };
        let text = match content.get("text") {
            None => return,
            Some(Value::String(text)) => text,
            Some(_) => {
                self.error("\"text\" field must be a string.".to_string());
                return;
            }
        };
        match content.get("encoding") {
            None => resource.set_response_body(text.as_bytes()),
            Some(Value::String(encoding)) if encoding == "base64" => match BASE64.decode(text) {
                Ok(body) => resource.set_response_body(body),
                Err(e) => self.error(format!("Failed to base64-decode response content: {}", e)),
            },
            Some(Value::String(encoding)) => {
                self.error(format!("Received unexpected encoding: {}", encoding))
            }
            Some(_) => self.error("\"encoding\" field must be a string.".to_string()),
        }
    }

    fn headers(&mut self, object: &Map<String, Value>) -> Vec<(String, String)> {
        let Some(headers) = object.get("headers").and_then(Value::as_array) else {
            self.error("\"headers\" field must be an array.".to_string());
            return Vec::new();
        };
        let mut out = Vec::with_capacity(headers.len());
        for header in headers {
            match header.as_object() {
                Some(header) => {
                    let name = self.string(header, "name");
                    let value = self.string(header, "value");
                    out.push((name, value));
                }
                None => self.error("Header item must be an object.".to_string()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::resource_filter_from_name;
    use serde_json::json;

    fn entry(url: &str, status: i64, content: Value) -> Value {
        json!({
            "startedDateTime": "2011-01-01T00:00:00.000Z",
            "request": {"method": "GET", "url": url, "httpVersion": "HTTP/1.1",
                        "headers": [{"name": "Host", "value": "www.example.com"}]},
            "response": {"status": status, "httpVersion": "HTTP/1.1",
                         "headers": [{"name": "Content-Type", "value": "text/html"}],
                         "content": content}
        })
    }

    fn har(entries: Vec<Value>) -> String {
        json!({"log": {"version": "1.2", "entries": entries}}).to_string()
    }

    #[test]
    fn test_parse_basic() {
        let text = har(vec![
            entry("http://www.example.com/", 200, json!({"text": "<html>hi</html>"})),
            entry("http://www.example.com/a", 302, json!({})),
        ]);
        let input = parse_har_str(&text).unwrap();
        assert_eq!(input.resources().len(), 2);
        let r = input.resource_with_url("http://www.example.com/").unwrap();
        assert_eq!(r.request_method(), "GET");
        assert_eq!(r.request_header("host"), Some("www.example.com"));
        assert_eq!(r.response_body(), b"<html>hi</html>");
        assert_eq!(r.request_start_time_millis(), Some(0));
    }

    #[test]
    fn test_base64_content() {
        let text = har(vec![entry(
            "http://www.example.com/",
            200,
            json!({"text": "aGVsbG8=", "encoding": "base64"}),
        )]);
        let input = parse_har_str(&text).unwrap();
        assert_eq!(input.resource_with_url("http://www.example.com/").unwrap().response_body(), b"hello");
    }

    #[test]
    fn test_relative_start_times() {
        let mut late = entry("http://www.example.com/late", 200, json!({}));
        late["startedDateTime"] = json!("2011-01-01T00:00:01.250Z");
        let text = har(vec![late, entry("http://www.example.com/", 200, json!({}))]);
        let mut input = parse_har_str(&text).unwrap();
        input.freeze().unwrap();
        let late = input.resource_with_url("http://www.example.com/late").unwrap();
        assert_eq!(late.request_start_time_millis(), Some(1250));
    }

    #[test]
    fn test_onload_from_page_timings() {
        let mut late = entry("http://www.example.com/postonload.js", 200, json!({}));
        late["startedDateTime"] = json!("2011-01-01T00:00:02.000Z");
        let mut first = entry("http://www.example.com/", 200, json!({}));
        first["startedDateTime"] = json!("2011-01-01T00:00:00.250Z");
        let text = json!({"log": {
            "version": "1.2",
            "pages": [{"startedDateTime": "2011-01-01T00:00:00.000Z", "id": "page_0",
                       "pageTimings": {"onLoad": 1500}}],
            "entries": [first, late]
        }})
        .to_string();
        let input = parse_har_str(&text).unwrap();
        // page started 250ms before the first entry
        assert_eq!(input.onload_time_millis(), Some(1250));
        let first = input.resource_with_url("http://www.example.com/").unwrap();
        let late = input.resource_with_url("http://www.example.com/postonload.js").unwrap();
        assert!(!input.is_resource_loaded_after_onload(first));
        assert!(input.is_resource_loaded_after_onload(late));

        let unknown = json!({"log": {"pages": [{"pageTimings": {"onLoad": -1}}], "entries": []}});
        assert_eq!(parse_har_str(&unknown.to_string()).unwrap().onload_time_millis(), None);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_har_str("not json"), Err(PagespeedError::Har(_))));
        assert!(parse_har_str("[]").is_err());
        assert!(parse_har_str(r#"{"log": {}}"#).is_err());
        let bad_encoding = har(vec![entry(
            "http://www.example.com/",
            200,
            json!({"text": "x", "encoding": "rot13"}),
        )]);
        assert!(parse_har_str(&bad_encoding).is_err());
        let missing_status = json!({"log": {"entries": [{
            "request": {"method": "GET", "url": "http://a.com/", "httpVersion": "1.1", "headers": []},
            "response": {"httpVersion": "1.1", "headers": [], "content": {}}
        }]}});
        assert!(parse_har_str(&missing_status.to_string()).is_err());
    }

    #[test]
    fn test_filter_applies() {
        let text = har(vec![
            entry("http://www.example.com/", 200, json!({})),
            entry("http://pagead2.googlesyndication.com/pagead/show_ads.js", 200, json!({})),
        ]);
        let input = parse_har(&text, resource_filter_from_name("content")).unwrap();
        assert_eq!(input.resources().len(), 1);
    }
}
