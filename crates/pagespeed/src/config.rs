//! Engine configuration
//!
//! `EngineConfig` carries the knobs a host passes per run. `ClientCharacteristics`
//! turns savings into impact: how much one saved request, byte or round
//! trip costs the kind of client the page is analyzed for.

use serde::{Deserialize, Serialize};

/// Cost of each savings kind for a class of client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCharacteristics {
    pub dns_requests_weight: f64,
    pub requests_weight: f64,
    pub response_bytes_weight: f64,
    pub request_bytes_weight: f64,
    pub critical_path_length_weight: f64,
    pub connections_weight: f64,
    pub page_reflows_weight: f64,
}

impl Default for ClientCharacteristics {
    /// Desktop on broadband
    fn default() -> Self {
        Self {
            dns_requests_weight: 8.0,
            requests_weight: 8.0,
            // downstream ~ 4 Mbit/s, upstream ten times slower
            response_bytes_weight: 0.00026,
            request_bytes_weight: 0.0026,
            critical_path_length_weight: 8.0,
            connections_weight: 8.0,
            page_reflows_weight: 0.5,
        }
    }
}

impl ClientCharacteristics {
    /// Mobile on a cellular network: round trips cost far more, bytes
    /// somewhat more, and reflows hurt on slow CPUs
    pub fn mobile() -> Self {
        Self {
            dns_requests_weight: 30.0,
            requests_weight: 30.0,
            response_bytes_weight: 0.0013,
            request_bytes_weight: 0.013,
            critical_path_length_weight: 30.0,
            connections_weight: 30.0,
            page_reflows_weight: 2.0,
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub locale: String,
    pub save_optimized_content: bool,
    /// `all`, `ads`, `trackers` or `content`
    pub resource_filter: String,
    pub mobile: bool,
    /// Treat the end of the landing redirect chain as the primary resource
    pub follow_redirects: bool,
    pub allow_duplicate_resources: bool,
    pub client: ClientCharacteristics,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locale: "en_US".to_string(),
            save_optimized_content: false,
            resource_filter: "all".to_string(),
            mobile: false,
            follow_redirects: true,
            allow_duplicate_resources: false,
            client: ClientCharacteristics::default(),
        }
    }
}

impl EngineConfig {
    /// Client characteristics for this run; `mobile` overrides `client`
    pub fn client_characteristics(&self) -> ClientCharacteristics {
        if self.mobile {
            ClientCharacteristics::mobile()
        } else {
            self.client.clone()
        }
    }
}
