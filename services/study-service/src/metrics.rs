//! Service metrics
//!
//! Each app instance owns its registry so several apps can coexist in one
//! process (tests build one per case).

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use studyforge_utils::{StudyError, StudyResult};

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    pub uploads: IntCounterVec,
    pub extraction_failures: IntCounterVec,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_entries: IntGauge,
    pub generation_requests: IntCounterVec,
    pub generation_failures: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> StudyResult<Self> {
        let registry = Registry::new_custom(Some("studyforge".to_string()), None).map_err(metrics_error)?;

        let uploads = IntCounterVec::new(
            Opts::new("uploads_total", "Documents received by the upload endpoint"),
            &["format"],
        )
        .map_err(metrics_error)?;
        let extraction_failures = IntCounterVec::new(
            Opts::new("extraction_failures_total", "Extractions that ended in an error"),
            &["format"],
        )
        .map_err(metrics_error)?;
        let cache_hits = IntCounter::new("cache_hits_total", "Artifacts served from cache").map_err(metrics_error)?;
        let cache_misses =
            IntCounter::new("cache_misses_total", "Artifact lookups that missed the cache").map_err(metrics_error)?;
        let cache_entries = IntGauge::new("cache_entries", "Artifacts currently cached").map_err(metrics_error)?;
        let generation_requests = IntCounterVec::new(
            Opts::new("generation_requests_total", "Calls made to the generation backend"),
            &["kind"],
        )
        .map_err(metrics_error)?;
        let generation_failures = IntCounterVec::new(
            Opts::new("generation_failures_total", "Generation calls that failed"),
            &["kind"],
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(uploads.clone())).map_err(metrics_error)?;
        registry.register(Box::new(extraction_failures.clone())).map_err(metrics_error)?;
        registry.register(Box::new(cache_hits.clone())).map_err(metrics_error)?;
        registry.register(Box::new(cache_misses.clone())).map_err(metrics_error)?;
        registry.register(Box::new(cache_entries.clone())).map_err(metrics_error)?;
        registry.register(Box::new(generation_requests.clone())).map_err(metrics_error)?;
        registry.register(Box::new(generation_failures.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            uploads,
            extraction_failures,
            cache_hits,
            cache_misses,
            cache_entries,
            generation_requests,
            generation_failures,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .unwrap_or_else(|_| "Error encoding metrics".to_string())
    }
}

fn metrics_error(error: prometheus::Error) -> StudyError {
    StudyError::internal(format!("metrics registration failed: {}", error))
}
