//! Provider metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Derived files written, by provider.
    pub const THUMBNAILS_GENERATED_TOTAL: &str = "media_thumbnails_generated_total";

    /// Derived files that failed to render or store, by provider.
    pub const THUMBNAILS_FAILED_TOTAL: &str = "media_thumbnails_failed_total";

    /// Remote fetches by kind (metadata, image) and outcome.
    pub const FETCH_TOTAL: &str = "media_fetch_total";

    /// Lifecycle hook runs by provider, hook and outcome.
    pub const LIFECYCLE_TOTAL: &str = "media_lifecycle_total";
}

pub fn record_thumbnail(provider: &str, success: bool) {
    let name = if success {
        names::THUMBNAILS_GENERATED_TOTAL
    } else {
        names::THUMBNAILS_FAILED_TOTAL
    };
    counter!(name, "provider" => provider.to_string()).increment(1);
}

pub fn record_fetch(kind: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!(names::FETCH_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_lifecycle(provider: &str, hook: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!(
        names::LIFECYCLE_TOTAL,
        "provider" => provider.to_string(),
        "hook" => hook,
        "outcome" => outcome
    )
    .increment(1);
}
