//! One captured HTTP request/response pair
//!
//! A `Resource` is freely mutable while it is being built. Once it is
//! handed to a `ResourceCollection` and the collection is frozen, only
//! shared references remain, so the record is read-only from then on.

use crate::uri_util;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// What kind of content a resource carries, derived from status and headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Other,
    Html,
    Text,
    Css,
    Image,
    Js,
    Redirect,
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    Unknown,
    Jpeg,
    Png,
    Gif,
    Svg,
}

/// Ordered header list with case-insensitive names
///
/// Adding a header that already exists appends the value with `","`,
/// which is how HTTP treats repeated headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(value);
            }
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resource {
    request_url: String,
    request_method: String,
    request_protocol: String,
    request_headers: Headers,
    request_body: String,
    request_start_time_millis: Option<i64>,

    response_status_code: i32,
    response_protocol: String,
    response_headers: Headers,
    response_body: Vec<u8>,
    response_body_modified: bool,

    cookies: Option<String>,
    explicit_type: Option<ResourceType>,
    lazy_loaded: bool,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request URL. The fragment is dropped and the URL canonicalized.
    pub fn set_request_url(&mut self, url: &str) {
        self.request_url = uri_util::canonicalize_url(url);
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn set_request_method(&mut self, method: &str) {
        self.request_method = method.to_string();
    }

    pub fn request_method(&self) -> &str {
        &self.request_method
    }

    pub fn set_request_protocol(&mut self, protocol: &str) {
        self.request_protocol = protocol.to_string();
    }

    pub fn request_protocol(&self) -> &str {
        &self.request_protocol
    }

    pub fn add_request_header(&mut self, name: &str, value: &str) {
        self.request_headers.add(name, value);
    }

    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers.get(name)
    }

    pub fn request_headers(&self) -> &Headers {
        &self.request_headers
    }

    pub fn set_request_body(&mut self, body: &str) {
        self.request_body = body.to_string();
    }

    pub fn request_body(&self) -> &str {
        &self.request_body
    }

    /// Negative start times are clamped to zero.
    pub fn set_request_start_time_millis(&mut self, millis: i64) {
        if millis < 0 {
            tracing::warn!(
                "Negative request start time {} for {}, clamping to 0",
                millis,
                self.request_url
            );
        }
        self.request_start_time_millis = Some(millis.max(0));
    }

    pub fn request_start_time_millis(&self) -> Option<i64> {
        self.request_start_time_millis
    }

    pub fn set_response_status_code(&mut self, code: i32) {
        self.response_status_code = code;
    }

    pub fn response_status_code(&self) -> i32 {
        self.response_status_code
    }

    pub fn set_response_protocol(&mut self, protocol: &str) {
        self.response_protocol = protocol.to_string();
    }

    pub fn response_protocol(&self) -> &str {
        &self.response_protocol
    }

    pub fn add_response_header(&mut self, name: &str, value: &str) {
        self.response_headers.add(name, value);
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers.get(name)
    }

    pub fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    pub fn set_response_body(&mut self, body: impl Into<Vec<u8>>) {
        self.response_body = body.into();
    }

    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    /// Body as text, replacing invalid UTF-8 sequences
    pub fn response_body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.response_body)
    }

    /// Mark the body as not being byte-for-byte what the server sent
    /// (e.g. the host re-serialized it)
    pub fn set_response_body_modified(&mut self, modified: bool) {
        self.response_body_modified = modified;
    }

    pub fn is_response_body_modified(&self) -> bool {
        self.response_body_modified
    }

    pub fn set_cookies(&mut self, cookies: &str) {
        self.cookies = Some(cookies.to_string());
    }

    /// Explicit cookies, else the `Cookie` request header, else `Set-Cookie`
    pub fn cookies(&self) -> &str {
        if let Some(cookies) = &self.cookies {
            return cookies;
        }
        self.request_header("Cookie")
            .or_else(|| self.response_header("Set-Cookie"))
            .unwrap_or("")
    }

    pub fn set_lazy_loaded(&mut self) {
        self.lazy_loaded = true;
    }

    pub fn is_lazy_loaded(&self) -> bool {
        self.lazy_loaded
    }

    /// Override the derived type
    pub fn set_resource_type(&mut self, resource_type: ResourceType) {
        self.explicit_type = Some(resource_type);
    }

    pub fn host(&self) -> Option<String> {
        uri_util::host(&self.request_url)
    }

    /// URL scheme, e.g. `http`
    pub fn protocol(&self) -> Option<String> {
        uri_util::scheme(&self.request_url)
    }

    /// `Content-Type` without parameters, lower-cased
    pub fn mime_type(&self) -> Option<String> {
        self.response_header("Content-Type").map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase()
        })
    }

    pub fn resource_type(&self) -> ResourceType {
        if let Some(explicit) = self.explicit_type {
            return explicit;
        }

        match self.response_status_code {
            301 | 302 | 303 | 307 => return ResourceType::Redirect,
            200 | 203 | 206 | 304 => {}
            _ => return ResourceType::Other,
        }

        let Some(mime) = self.mime_type() else {
            return ResourceType::Other;
        };
        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => ResourceType::Html,
            "text/css" => ResourceType::Css,
            m if m.contains("javascript") || m.contains("ecmascript") => ResourceType::Js,
            m if m.starts_with("image/") => ResourceType::Image,
            "application/x-shockwave-flash" => ResourceType::Flash,
            m if m.starts_with("text/") => ResourceType::Text,
            "application/xml" | "application/json" => ResourceType::Text,
            _ => ResourceType::Other,
        }
    }

    /// Image format, from `Content-Type` or else the URL path extension.
    /// `Unknown` for resources that are not images.
    pub fn image_type(&self) -> ImageType {
        if self.resource_type() != ResourceType::Image {
            return ImageType::Unknown;
        }

        let by_mime = match self.mime_type().as_deref() {
            Some("image/png") => ImageType::Png,
            Some("image/gif") => ImageType::Gif,
            Some("image/jpeg" | "image/jpg" | "image/pjpeg") => ImageType::Jpeg,
            Some("image/svg+xml") => ImageType::Svg,
            _ => ImageType::Unknown,
        };
        if by_mime != ImageType::Unknown {
            return by_mime;
        }

        let path = url::Url::parse(&self.request_url)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_default();
        match path.rsplit('.').next() {
            Some("png") => ImageType::Png,
            Some("gif") => ImageType::Gif,
            Some("jpg" | "jpeg") => ImageType::Jpeg,
            Some("svg") => ImageType::Svg,
            _ => ImageType::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(status: i32, content_type: Option<&str>) -> Resource {
        let mut r = Resource::new();
        r.set_request_url("http://www.example.com/path/file.png#frag");
        r.set_response_status_code(status);
        if let Some(ct) = content_type {
            r.add_response_header("Content-Type", ct);
        }
        r
    }

    #[test]
    fn test_request_url_drops_fragment() {
        let r = resource(200, None);
        assert_eq!(r.request_url(), "http://www.example.com/path/file.png");
        assert_eq!(r.host().as_deref(), Some("www.example.com"));
        assert_eq!(r.protocol().as_deref(), Some("http"));
    }

    #[test]
    fn test_duplicate_headers_merge() {
        let mut r = Resource::new();
        r.add_response_header("Cache-Control", "public");
        r.add_response_header("cache-control", "max-age=60");
        assert_eq!(r.response_header("CACHE-CONTROL"), Some("public,max-age=60"));
        assert_eq!(r.response_headers().len(), 1);
    }

    #[test]
    fn test_resource_type_from_status_and_content_type() {
        assert_eq!(resource(301, None).resource_type(), ResourceType::Redirect);
        assert_eq!(resource(307, Some("text/html")).resource_type(), ResourceType::Redirect);
        assert_eq!(resource(404, Some("text/html")).resource_type(), ResourceType::Other);
        assert_eq!(
            resource(200, Some("text/html; charset=utf-8")).resource_type(),
            ResourceType::Html
        );
        assert_eq!(resource(304, Some("text/css")).resource_type(), ResourceType::Css);
        assert_eq!(
            resource(200, Some("application/x-javascript")).resource_type(),
            ResourceType::Js
        );
        assert_eq!(resource(200, Some("text/plain")).resource_type(), ResourceType::Text);
        assert_eq!(resource(200, Some("application/xml")).resource_type(), ResourceType::Text);
        assert_eq!(
            resource(200, Some("application/x-shockwave-flash")).resource_type(),
            ResourceType::Flash
        );
        assert_eq!(resource(200, Some("application/pdf")).resource_type(), ResourceType::Other);
        assert_eq!(resource(200, None).resource_type(), ResourceType::Other);
    }

    #[test]
    fn test_explicit_type_wins() {
        let mut r = resource(404, None);
        r.set_resource_type(ResourceType::Js);
        assert_eq!(r.resource_type(), ResourceType::Js);
    }

    #[test]
    fn test_image_type() {
        assert_eq!(resource(200, Some("image/gif")).image_type(), ImageType::Gif);
        // Mime says image, subtype unknown: fall back to the extension
        assert_eq!(resource(200, Some("image/x-unknown")).image_type(), ImageType::Png);
        assert_eq!(resource(200, Some("text/html")).image_type(), ImageType::Unknown);
    }

    #[test]
    fn test_cookie_fallbacks() {
        let mut r = Resource::new();
        assert_eq!(r.cookies(), "");
        r.add_response_header("Set-Cookie", "b=2");
        assert_eq!(r.cookies(), "b=2");
        r.add_request_header("Cookie", "a=1");
        assert_eq!(r.cookies(), "a=1");
        r.set_cookies("c=3");
        assert_eq!(r.cookies(), "c=3");
    }

    #[test]
    fn test_negative_start_time_clamps() {
        let mut r = Resource::new();
        assert_eq!(r.request_start_time_millis(), None);
        r.set_request_start_time_millis(-5);
        assert_eq!(r.request_start_time_millis(), Some(0));
    }
}
