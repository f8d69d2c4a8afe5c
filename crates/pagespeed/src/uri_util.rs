//! URL helpers shared by resources, filters and the browsing-context graph

use psl::Psl;
use url::Url;

/// Canonical form of a URL with its fragment removed
///
/// Unparseable input is returned with only the fragment stripped, so a
/// resource with an odd URL still has a stable identity.
pub fn canonicalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.into()
        }
        Err(_) => strip_fragment(raw).to_string(),
    }
}

/// `raw` up to (not including) the first `#`
pub fn strip_fragment(raw: &str) -> &str {
    raw.split('#').next().unwrap_or(raw)
}

/// Lower-cased host of a URL, if it has one
pub fn host(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// URL scheme (`http`, `https`, `data`, ...)
pub fn scheme(raw: &str) -> Option<String> {
    Url::parse(raw).ok().map(|u| u.scheme().to_string())
}

/// Registrable domain of a host (`example.co.uk` for `www.example.co.uk`)
///
/// IP addresses and hosts that are themselves a public suffix have none.
pub fn registrable_domain(host: &str) -> Option<String> {
    if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return None;
    }
    psl::List
        .domain(host.as_bytes())
        .map(|d| String::from_utf8_lossy(d.as_bytes()).into_owned())
}

/// Resolve a possibly relative URL against `base`
pub fn resolve(base: &str, relative: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(relative).ok().map(|mut u| {
        u.set_fragment(None);
        u.into()
    })
}

/// Kinds of objects in the browsing-context graph that get an action URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Context,
    Fetch,
    Eval,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Context => "context",
            ActionKind::Fetch => "fetch",
            ActionKind::Eval => "eval",
        }
    }
}

/// Build `"<kind>://<scheme>/<user@><host>[:port]<path?query>#<sequence>"`
///
/// Returns None for URLs that do not parse or have no host.
pub fn action_uri(kind: ActionKind, resource_url: &str, sequence: u32) -> Option<String> {
    let url = Url::parse(resource_url).ok()?;
    let host = url.host_str()?;

    let mut out = format!("{}://{}/", kind.as_str(), url.scheme());
    if !url.username().is_empty() {
        out.push_str(url.username());
        if let Some(password) = url.password() {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }
    out.push_str(host);
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(url.path());
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    out.push('#');
    out.push_str(&sequence.to_string());
    Some(out)
}
