//! CDN metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Total flush requests by CDN and outcome.
    pub const FLUSH_TOTAL: &str = "cdn_flush_total";

    /// Total paths submitted for invalidation by CDN.
    pub const FLUSHED_PATHS_TOTAL: &str = "cdn_flushed_paths_total";
}

/// Record a completed flush request.
pub fn record_flush(cdn: &'static str, outcome: &'static str, paths: usize) {
    counter!(names::FLUSH_TOTAL, "cdn" => cdn, "outcome" => outcome).increment(1);

    if outcome == "ok" {
        counter!(names::FLUSHED_PATHS_TOTAL, "cdn" => cdn).increment(paths as u64);
    }
}
