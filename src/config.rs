//! TraceZ configuration.
//!
//! One option is recognised, in property form and environment form; sources
//! applied later override earlier ones. Everything else in a source is
//! ignored.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Property key controlling whether only sampled spans are collected.
const OTEL_SSP_EXPORT_SAMPLED_PROPERTY: &str = "otel.ssp.export.sampled";
/// Environment variable controlling whether only sampled spans are collected.
const OTEL_SSP_EXPORT_SAMPLED: &str = "OTEL_SSP_EXPORT_SAMPLED";
/// Default for `otel.ssp.export.sampled`.
const OTEL_SSP_EXPORT_SAMPLED_DEFAULT: bool = true;

/// Effective TraceZ configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TracezConfig {
    /// When `true`, spans the sampler dropped are invisible to the page.
    pub only_sampled: bool,
}

impl Default for TracezConfig {
    fn default() -> Self {
        TracezConfig {
            only_sampled: OTEL_SSP_EXPORT_SAMPLED_DEFAULT,
        }
    }
}

impl TracezConfig {
    /// Apply recognised options from a key/value property source. Unknown
    /// keys and unparseable values are ignored.
    pub fn with_properties(mut self, properties: &HashMap<String, String>) -> Self {
        self.only_sampled = properties
            .get(OTEL_SSP_EXPORT_SAMPLED_PROPERTY)
            .and_then(|value| parse_bool(value))
            .unwrap_or(self.only_sampled);
        self
    }

    /// Apply recognised options from the process environment. Unparseable
    /// values are ignored.
    pub fn with_env(mut self) -> Self {
        self.only_sampled = env::var(OTEL_SSP_EXPORT_SAMPLED)
            .ok()
            .and_then(|value| parse_bool(&value))
            .unwrap_or(self.only_sampled);
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    bool::from_str(value.trim().to_ascii_lowercase().as_str()).ok()
}
