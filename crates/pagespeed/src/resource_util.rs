//! Helpers over single resources: compression, redirects, byte totals

use crate::error::Result;
use crate::pagespeed_input::InputInformation;
use crate::resource::{Resource, ResourceType};
use crate::uri_util;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// Served with a transfer compression the browser undoes
pub fn is_compressed_resource(resource: &Resource) -> bool {
    let Some(encoding) = resource.response_header("Content-Encoding") else {
        return false;
    };
    encoding.split(',').any(|e| {
        matches!(
            e.trim().to_ascii_lowercase().as_str(),
            "gzip" | "x-gzip" | "deflate" | "br" | "compress"
        )
    })
}

/// Textual content that benefits from gzip
pub fn is_compressible_resource(resource: &Resource) -> bool {
    matches!(
        resource.resource_type(),
        ResourceType::Html | ResourceType::Text | ResourceType::Css | ResourceType::Js
    )
}

/// Gzip `data` at the default level
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Size of `data` after gzip at the default level
pub fn gzip_size(data: &[u8]) -> Result<usize> {
    gzip(data).map(|out| out.len())
}

/// Target of a redirect, resolved against the request URL
///
/// None unless the resource is a redirect with a usable `Location`.
pub fn redirected_url(resource: &Resource) -> Option<String> {
    if resource.resource_type() != ResourceType::Redirect {
        return None;
    }
    let location = resource.response_header("Location")?.trim();
    if location.is_empty() {
        return None;
    }
    uri_util::resolve(resource.request_url(), location)
}

/// Approximate bytes on the wire for the request line, headers and body
pub fn estimate_request_bytes(resource: &Resource) -> usize {
    // "<METHOD> <URL> HTTP/1.1\r\n"
    let mut total = resource.request_method().len() + resource.request_url().len() + 12;
    for (name, value) in resource.request_headers().iter() {
        // "name: value\r\n"
        total += name.len() + value.len() + 4;
    }
    total += 2;
    total + resource.request_body().len()
}

/// Content a browser could cache across page loads: images, styles,
/// scripts and flash served successfully without a no-cache directive
pub fn is_likely_static_resource(resource: &Resource) -> bool {
    if !matches!(
        resource.resource_type(),
        ResourceType::Image | ResourceType::Css | ResourceType::Js | ResourceType::Flash
    ) {
        return false;
    }
    if !matches!(resource.response_status_code(), 200 | 203 | 206 | 304) {
        return false;
    }
    let no_cache = resource
        .response_header("Cache-Control")
        .map(|cc| {
            let cc = cc.to_ascii_lowercase();
            cc.contains("no-cache") || cc.contains("no-store") || cc.contains("private")
        })
        .unwrap_or(false);
    !no_cache && resource.response_header("Pragma").map_or(true, |p| !p.eq_ignore_ascii_case("no-cache"))
}

/// Response bytes of every type in the input
pub fn total_response_bytes(info: &InputInformation) -> i64 {
    info.html_response_bytes
        + info.css_response_bytes
        + info.js_response_bytes
        + info.image_response_bytes
        + info.text_response_bytes
        + info.flash_response_bytes
        + info.other_response_bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(content_type: &str, body: &str) -> Resource {
        let mut r = Resource::new();
        r.set_request_url("http://www.example.com/a");
        r.set_response_status_code(200);
        r.add_response_header("Content-Type", content_type);
        r.set_response_body(body);
        r
    }

    #[test]
    fn test_compression_flags() {
        let mut r = resource("text/css", "body{}");
        assert!(is_compressible_resource(&r));
        assert!(!is_compressed_resource(&r));
        r.add_response_header("Content-Encoding", "GZIP");
        assert!(is_compressed_resource(&r));

        assert!(!is_compressible_resource(&resource("image/png", "")));
    }

    #[test]
    fn test_gzip_size_shrinks_repetitive_input() {
        let data = "a".repeat(1000);
        let size = gzip_size(data.as_bytes()).unwrap();
        assert!(size < 100, "{}", size);
        assert!(gzip_size(b"").unwrap() > 0);
    }

    #[test]
    fn test_redirected_url() {
        let mut r = Resource::new();
        r.set_request_url("http://www.example.com/dir/page");
        r.set_response_status_code(302);
        r.add_response_header("Location", "../other#x");
        assert_eq!(
            redirected_url(&r).as_deref(),
            Some("http://www.example.com/other")
        );

        r.set_response_status_code(200);
        assert_eq!(redirected_url(&r), None);
    }

    #[test]
    fn test_estimate_request_bytes() {
        let mut r = Resource::new();
        r.set_request_method("GET");
        r.set_request_url("http://a.com/");
        r.add_request_header("Host", "a.com");
        assert_eq!(estimate_request_bytes(&r), 3 + 13 + 12 + 11 + 2);
    }

    #[test]
    fn test_likely_static() {
        assert!(is_likely_static_resource(&resource("text/css", "a{}")));
        assert!(!is_likely_static_resource(&resource("text/html", "<p>")));

        let mut r = resource("image/png", "");
        r.add_response_header("Cache-Control", "private, max-age=0");
        assert!(!is_likely_static_resource(&r));

        let mut r = resource("application/javascript", "");
        r.add_response_header("Pragma", "no-cache");
        assert!(!is_likely_static_resource(&r));
    }

    #[test]
    fn test_total_response_bytes() {
        let info = InputInformation {
            html_response_bytes: 10,
            css_response_bytes: 20,
            image_response_bytes: 5,
            ..Default::default()
        };
        assert_eq!(total_response_bytes(&info), 35);
    }
}
