//! Finding the URLs a document or stylesheet pulls in
//!
//! Elements are matched on the attribute the browser fetches for them
//! (`<img src>`, `<link rel=stylesheet href>`, `<object data>`, ...).
//! Stylesheets contribute `url(...)` references and `@import` targets.
//! Results are resolved, fragment-free and limited to http(s).

use crate::uri_util;
use dom::DomElement;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::OnceLock;

const SRC_TAGS: &[&str] = &[
    "script", "img", "iframe", "frame", "embed", "source", "audio", "video", "track",
];
const BACKGROUND_TAGS: &[&str] = &["body", "td", "th", "table", "tbody", "tfoot", "thead"];

/// The raw URL attribute an element fetches, before resolution
///
/// `attr` looks an attribute up by (case-insensitive) name.
fn fetched_attribute<'a>(tag: &str, attr: impl Fn(&str) -> Option<&'a str>) -> Option<&'a str> {
    let tag = tag.to_ascii_lowercase();
    let tag = tag.as_str();
    if SRC_TAGS.contains(&tag) {
        return attr("src");
    }
    if BACKGROUND_TAGS.contains(&tag) {
        return attr("background");
    }
    match tag {
        "link" => {
            let is_stylesheet = attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")));
            if is_stylesheet {
                attr("href")
            } else {
                None
            }
        }
        "input" if attr("type").is_some_and(|t| t.eq_ignore_ascii_case("image")) => attr("src"),
        "object" => attr("data"),
        _ => None,
    }
}

/// http(s) URLs only, fragment stripped
fn external(resolved: Option<String>) -> Option<String> {
    let url = resolved?;
    match uri_util::scheme(&url).as_deref() {
        Some("http" | "https") => Some(uri_util::canonicalize_url(&url)),
        _ => None,
    }
}

/// The resolved URL a DOM element fetches, if any
pub fn element_url(element: &DomElement, base_url: &str) -> Option<String> {
    let raw = fetched_attribute(&element.tag_name, |name| element.attr(name))?;
    if raw.trim().is_empty() {
        return None;
    }
    external(uri_util::resolve(base_url, raw.trim()))
}

fn compiled(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(source) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("Invalid resource pattern {:?}: {}", source, e);
            None
        }
    })
    .as_ref()
}

fn first_group<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.iter().skip(1).flatten().next().map(|m| m.as_str())
}

fn strip_css_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            // unterminated: the comment runs to the end
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// `@import` targets of a stylesheet, resolved against `base_url`
pub fn css_imports(css: &str, base_url: &str) -> BTreeSet<String> {
    static IMPORT: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(import) = compiled(
        &IMPORT,
        r#"(?i)@import\s*(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)\s]*))\s*\)|"([^"]*)"|'([^']*)')"#,
    ) else {
        return BTreeSet::new();
    };
    let css = strip_css_comments(css);
    import
        .captures_iter(&css)
        .filter_map(|caps| first_group(&caps).map(str::trim))
        .filter(|raw| !raw.is_empty())
        .filter_map(|raw| external(uri_util::resolve(base_url, raw)))
        .collect()
}

/// Every URL a stylesheet references: `url(...)` values plus `@import`
/// targets
pub fn css_urls(css: &str, base_url: &str) -> BTreeSet<String> {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    let mut found = css_imports(css, base_url);
    let Some(url) = compiled(&URL, r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)\s]*))\s*\)"#) else {
        return found;
    };
    let css = strip_css_comments(css);
    found.extend(
        url.captures_iter(&css)
            .filter_map(|caps| first_group(&caps).map(str::trim))
            .filter(|raw| !raw.is_empty())
            .filter_map(|raw| external(uri_util::resolve(base_url, raw))),
    );
    found
}

/// URLs fetched by an HTML document's markup, including `url(...)`
/// references in inline `<style>` blocks
pub fn html_urls(html: &str, base_url: &str) -> BTreeSet<String> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    static ATTR: OnceLock<Option<Regex>> = OnceLock::new();
    static STYLE: OnceLock<Option<Regex>> = OnceLock::new();
    let (Some(tag), Some(attr), Some(style)) = (
        compiled(&TAG, r"(?is)<([a-z][a-z0-9]*)\b([^>]*)>"),
        compiled(&ATTR, r#"(?is)([a-z][a-z0-9-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#),
        compiled(&STYLE, r"(?is)<style\b[^>]*>(.*?)</style>"),
    ) else {
        return BTreeSet::new();
    };

    let mut found = BTreeSet::new();
    for caps in tag.captures_iter(html) {
        let name = &caps[1];
        let attributes: Vec<(&str, &str)> = attr
            .captures_iter(caps.get(2).map_or("", |m| m.as_str()))
            .filter_map(|a| {
                let key = a.get(1)?.as_str();
                let value = a.iter().skip(2).flatten().next().map_or("", |m| m.as_str());
                Some((key, value))
            })
            .collect();
        let lookup = |key: &str| {
            attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| *v)
        };
        if let Some(raw) = fetched_attribute(name, lookup).map(str::trim).filter(|r| !r.is_empty()) {
            if let Some(url) = external(uri_util::resolve(base_url, raw)) {
                found.insert(url);
            }
        }
    }
    for block in style.captures_iter(html) {
        found.extend(css_urls(&block[1], base_url));
    }
    found
}
