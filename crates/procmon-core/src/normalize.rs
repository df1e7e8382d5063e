//! Conversion of raw metrics into sink events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stats::{PlatformInfo, RawMetrics};

/// Default `source` field of emitted events.
pub const DEFAULT_SOURCE: &str = "proc_monitor";
/// Default `sourcetype` field of emitted events.
pub const DEFAULT_SOURCETYPE: &str = "metric";

/// Sink-ready event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub host: String,
    pub source: String,
    pub sourcetype: String,
    pub event: Value,
}

/// Error type for normalization failures.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// Platform info carries no hostname to tag events with.
    MissingHostname,
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::MissingHostname => write!(f, "platform info has no hostname"),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Maps raw provider output into events.
///
/// Implementations must treat a single record and a one-element list the same.
pub trait Normalizer {
    fn normalize(
        &self,
        platform: &PlatformInfo,
        metrics: RawMetrics,
    ) -> Result<Vec<NormalizedEvent>, NormalizeError>;
}

impl<F> Normalizer for F
where
    F: Fn(&PlatformInfo, RawMetrics) -> Result<Vec<NormalizedEvent>, NormalizeError>,
{
    fn normalize(
        &self,
        platform: &PlatformInfo,
        metrics: RawMetrics,
    ) -> Result<Vec<NormalizedEvent>, NormalizeError> {
        self(platform, metrics)
    }
}

/// Wraps every raw record in a `{host, source, sourcetype, event}` envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeNormalizer {
    source: String,
    sourcetype: String,
}

impl Default for EnvelopeNormalizer {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            sourcetype: DEFAULT_SOURCETYPE.to_string(),
        }
    }
}

impl EnvelopeNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_sourcetype(mut self, sourcetype: impl Into<String>) -> Self {
        self.sourcetype = sourcetype.into();
        self
    }
}

impl Normalizer for EnvelopeNormalizer {
    fn normalize(
        &self,
        platform: &PlatformInfo,
        metrics: RawMetrics,
    ) -> Result<Vec<NormalizedEvent>, NormalizeError> {
        if platform.hostname.is_empty() {
            return Err(NormalizeError::MissingHostname);
        }

        Ok(metrics
            .into_records()
            .into_iter()
            .map(|event| NormalizedEvent {
                host: platform.hostname.clone(),
                source: self.source.clone(),
                sourcetype: self.sourcetype.clone(),
                event,
            })
            .collect())
    }
}
