//! One-call entry point: captured page data in, scored and formatted
//! results out
//!
//! Every failure a host can cause with bad data maps to a fixed message in
//! `RunError`; the host shows that message and nothing else.

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::PagespeedError;
use crate::filters::{self, LandingPageRedirectionFilter, ResponseByteResultFilter};
use crate::formatter::{json_converter, FormattedResults, Formatter};
use crate::har;
use crate::l10n::{BasicLocalizer, CatalogLocalizer, LocaleCatalog, Localizer};
use crate::pagespeed_input::PagespeedInput;
use crate::resource_util;
use crate::results::Results;
use crate::rules::page_speed_rules;
use crate::timeline;
use ahash::AHashSet;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dom::DomService;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Request(PagespeedError),

    #[error("could not parse HAR")]
    Har(#[source] PagespeedError),

    #[error("error in timeline data")]
    Timeline(#[source] PagespeedError),

    #[error("could not parse DOM: {0}")]
    Dom(String),

    #[error("DOM must be a JSON dictionary")]
    DomNotDictionary,

    #[error("error during FormatResults")]
    Format,

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What to analyze and how
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Echoed back so a host can match replies to requests
    pub id: String,
    pub har: String,
    /// DOM snapshot JSON; empty when none was captured
    pub document: String,
    /// Timeline JSON; empty when none was captured
    pub timeline: String,
    pub config: EngineConfig,
    /// Translations for `config.locale`; English source strings without it
    pub catalog: Option<Arc<LocaleCatalog>>,
}

impl RunRequest {
    pub fn new(id: &str, har: &str) -> Self {
        Self {
            id: id.to_string(),
            har: har.to_string(),
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Read a request from one JSON dictionary
    ///
    /// `id`, `har`, `resource_filter`, `locale` and
    /// `save_optimized_content` are required. `document`, `timeline`,
    /// `mobile` and `follow_redirects` may be left out.
    pub fn from_json(text: &str) -> Result<Self, PagespeedError> {
        let value: Value = serde_json::from_str(text)?;
        let root = value.as_object().ok_or(PagespeedError::InputNotDictionary)?;

        let string = |key: &str| root.get(key).and_then(Value::as_str).map(str::to_string);
        let (Some(id), Some(har), Some(resource_filter), Some(locale), Some(save_optimized_content)) = (
            string("id"),
            string("har"),
            string("resource_filter"),
            string("locale"),
            root.get("save_optimized_content").and_then(Value::as_bool),
        ) else {
            return Err(PagespeedError::MissingFields);
        };

        let mut config = EngineConfig {
            locale,
            resource_filter,
            save_optimized_content,
            ..Default::default()
        };
        match root.get("mobile").and_then(Value::as_bool) {
            Some(mobile) => config.mobile = mobile,
            None => tracing::info!("Input JSON does not have mobile info"),
        }
        if let Some(follow) = root.get("follow_redirects").and_then(Value::as_bool) {
            config.follow_redirects = follow;
        }

        Ok(Self {
            id,
            har,
            document: string("document").unwrap_or_default(),
            timeline: string("timeline").unwrap_or_default(),
            config,
            catalog: None,
        })
    }
}

/// Results of one run, before serialization
pub struct Analysis {
    /// Findings after landing-page redirects were filtered out
    pub results: Results,
    pub formatted: FormattedResults,
}

/// Reply handed back to the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    pub output: String,
    pub error: String,
    pub success: bool,
}

impl RunOutput {
    fn failure(error: impl ToString) -> Self {
        Self {
            output: String::new(),
            error: error.to_string(),
            success: false,
        }
    }
}

/// Build the input, run every rule and format what survives the filters
pub fn analyze(request: &RunRequest) -> Result<Analysis, RunError> {
    let config = &request.config;
    let input = build_input(request)?;

    let mut engine = Engine::new(page_speed_rules(config.save_optimized_content));
    engine.init();

    let (unfiltered, success) = engine.compute_results(&input);
    if !success {
        tracing::warn!(
            "Errors during compute_results in rules: {}",
            unfiltered.error_rules.join(" ")
        );
    }

    // A user typing foo.com and landing on www.foo.com is not a problem
    let results = engine.filter_results(&unfiltered, &LandingPageRedirectionFilter::new());

    let localizer: Box<dyn Localizer> = match &request.catalog {
        Some(catalog) => Box::new(CatalogLocalizer::new(Arc::clone(catalog), &config.locale)),
        None => {
            if config.locale != BasicLocalizer.locale() {
                tracing::warn!("No catalog for locale {}, using English", config.locale);
            }
            Box::new(BasicLocalizer)
        }
    };
    let mut formatter = Formatter::new(localizer.as_ref());
    if !engine.format_results(&results, &ResponseByteResultFilter::new(), &mut formatter) {
        return Err(RunError::Format);
    }

    Ok(Analysis {
        results,
        formatted: formatter.into_results(),
    })
}

fn build_input(request: &RunRequest) -> Result<PagespeedInput, RunError> {
    let config = &request.config;
    let har: Value =
        serde_json::from_str(&request.har).map_err(|e| RunError::Har(PagespeedError::Har(e.to_string())))?;
    let mut input = PagespeedInput::with_filter(filters::resource_filter_from_name(&config.resource_filter));
    input.set_allow_duplicate_resources(config.allow_duplicate_resources);
    har::populate_input(&har, &mut input).map_err(RunError::Har)?;

    let records = timeline::parse_timeline_str(&request.timeline).map_err(RunError::Timeline)?;
    input.set_timeline(records);

    if !request.document.trim().is_empty() {
        let document: Value =
            serde_json::from_str(&request.document).map_err(|e| RunError::Dom(e.to_string()))?;
        if !document.is_object() {
            return Err(RunError::DomNotDictionary);
        }
        let mut service = DomService::new();
        let top = service
            .parse_document(&document)
            .map_err(|e| RunError::Dom(e.to_string()))?;
        let arena = service.into_arena();
        let document_url = arena
            .document(top)
            .map(|doc| doc.document_url.clone())
            .map_err(|e| RunError::Dom(e.to_string()))?;

        let primary = if config.follow_redirects {
            follow_redirects(&input, &document_url)
        } else {
            document_url
        };
        input.set_primary_resource_url(&primary);
        input.set_dom(arena, top);
        // the graph is optional; an inconsistent DOM only loses it
        if let Err(e) = input.build_browsing_context() {
            tracing::warn!("Unable to build browsing context: {}", e);
        }
    }

    input.set_client_characteristics(config.client_characteristics());
    input.freeze().map_err(RunError::Request)?;
    Ok(input)
}

/// Where `url` ends up after the redirects captured in `input`
fn follow_redirects(input: &PagespeedInput, url: &str) -> String {
    let mut current = url.to_string();
    let mut seen = AHashSet::new();
    seen.insert(current.clone());
    while let Some(next) = input
        .resource_with_url(&current)
        .and_then(resource_util::redirected_url)
    {
        if !seen.insert(next.clone()) {
            tracing::info!("Redirect loop through {}", next);
            break;
        }
        if input.resource_with_url(&next).is_none() {
            tracing::info!("Redirect target {} was not captured", next);
            break;
        }
        current = next;
    }
    if current != url {
        tracing::debug!("Primary resource {} redirects to {}", url, current);
    }
    current
}

/// Run the rules and serialize everything the host needs
pub fn run_pagespeed_rules(request: &RunRequest) -> RunOutput {
    match run(request) {
        Ok(output) => RunOutput {
            output,
            error: String::new(),
            success: true,
        },
        Err(e) => {
            tracing::warn!("Page Speed run {} failed: {}", request.id, e);
            RunOutput::failure(e)
        }
    }
}

/// `run_pagespeed_rules` for a request given as one JSON dictionary
pub fn run_pagespeed_rules_json(data: &str) -> RunOutput {
    match RunRequest::from_json(data) {
        Ok(request) => run_pagespeed_rules(&request),
        Err(PagespeedError::Json(e)) => RunOutput::failure(e),
        Err(e) => RunOutput::failure(RunError::Request(e)),
    }
}

fn run(request: &RunRequest) -> Result<String, RunError> {
    let analysis = analyze(request)?;

    let mut root = Map::new();
    root.insert("id".into(), json!(request.id));
    root.insert("resourceFilterName".into(), json!(request.config.resource_filter));
    root.insert("locale".into(), json!(request.config.locale));
    root.insert("results".into(), json_converter::convert(&analysis.formatted));
    let optimized = if request.config.save_optimized_content {
        serialize_optimized_content(&analysis.results)
    } else {
        Map::new()
    };
    root.insert("optimizedContent".into(), Value::Object(optimized));

    Ok(serde_json::to_string(&Value::Object(root))?)
}

/// Optimized bodies keyed by result id
pub fn serialize_optimized_content(results: &Results) -> Map<String, Value> {
    let mut out = Map::new();
    for finding in results.findings() {
        let Some(optimized) = &finding.optimized_content else {
            continue;
        };
        let Some(id) = finding.id() else {
            tracing::error!("Optimized content for a result without an id");
            continue;
        };
        let key = id.to_string();
        if out.contains_key(&key) {
            tracing::error!("Duplicate result id: {}", key);
            continue;
        }
        let Some(url) = finding.first_url() else {
            tracing::error!("Result id {} has optimized content, but no resource URLs", key);
            continue;
        };
        let Ok(parsed) = Url::parse(url) else {
            tracing::error!("Invalid url: {}", url);
            continue;
        };

        out.insert(
            key,
            json!({
                "url": url,
                "filename": choose_output_filename(&parsed, &optimized.mime_type, &optimized.content),
                "mimetype": optimized.mime_type,
                "content": BASE64.encode(&optimized.content),
            }),
        );
    }
    out
}

/// `<name>_<crc32>.<ext>`: the URL's file stem, a checksum of the content
/// so two optimized versions never collide, and an extension matching
/// the MIME type
pub fn choose_output_filename(url: &Url, mime_type: &str, content: &[u8]) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let (stem, original_ext) = match last.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (last, None),
    };
    let mut stem: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if stem.is_empty() {
        stem = "index".to_string();
    }

    let ext = match mime_type {
        "text/css" => "css",
        "text/html" => "html",
        "text/javascript" | "application/javascript" | "application/x-javascript" => "js",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        _ => original_ext.filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric())).unwrap_or("bin"),
    };

    let mut crc = flate2::Crc::new();
    crc.update(content);
    format!("{}_{:08x}.{}", stem, crc.sum(), ext)
}
