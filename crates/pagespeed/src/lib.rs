//! Page Speed analysis engine
//!
//! Turns a captured page load (HTTP archive, DOM snapshot, timeline) into
//! scored, human-readable suggestions.
//!
//! ## Core Design
//!
//! ```text
//! HAR / DOM / timeline → PagespeedInput ──freeze──→ RuleInput
//!                                                      ↓
//!                        Engine: rules → Results → filters → Formatter
//!                                                      ↓
//!                                        JSON / text converters
//! ```
//!
//! Inputs are mutable until frozen and read-only after; every rule sees
//! the same frozen data.

pub mod browsing_context;
pub mod config;
pub mod engine;
pub mod error;
pub mod external_resources;
pub mod filters;
pub mod formatter;
pub mod har;
pub mod l10n;
pub mod minify;
pub mod pagespeed_input;
pub mod resource;
pub mod resource_collection;
pub mod resource_util;
pub mod result_provider;
pub mod results;
pub mod rule;
pub mod rule_input;
pub mod rules;
pub mod runner;
pub mod score;
pub mod timeline;
pub mod uri_util;

pub use config::{ClientCharacteristics, EngineConfig};
pub use engine::Engine;
pub use error::{PagespeedError, Result};
pub use pagespeed_input::{InputInformation, PagespeedInput};
pub use resource::{Resource, ResourceType};
pub use results::{Finding, Results, RuleResults};
pub use rule::Rule;
pub use runner::{analyze, run_pagespeed_rules, run_pagespeed_rules_json, RunOutput, RunRequest};
