//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, HistogramVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Upstream calls (jira, github, iam, granite)
    pub upstream_requests: CounterVec,
    pub upstream_request_duration: HistogramVec,

    // IAM token cache
    pub iam_token_refreshes: Counter,

    // GitHub response cache
    pub github_cache_lookups: CounterVec,

    // Plan generation
    pub plan_generations: CounterVec,
    pub plan_retries: Counter,

    // Pull request review
    pub pr_reviews: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let upstream_requests = register_counter_vec_with_registry!(
            Opts::new("upstream_requests_total", "Total requests sent to upstream services"),
            &["service", "outcome"],
            registry
        )?;

        let upstream_request_duration = register_histogram_vec_with_registry!(
            "upstream_request_duration_seconds",
            "Upstream request duration in seconds",
            &["service"],
            registry
        )?;

        let iam_token_refreshes = register_counter_with_registry!(
            Opts::new("iam_token_refreshes_total", "Total IAM bearer token exchanges"),
            registry
        )?;

        let github_cache_lookups = register_counter_vec_with_registry!(
            Opts::new("github_cache_lookups_total", "GitHub response cache lookups"),
            &["result"],
            registry
        )?;

        let plan_generations = register_counter_vec_with_registry!(
            Opts::new("plan_generations_total", "Implementation plan generations"),
            &["outcome"],
            registry
        )?;

        let plan_retries = register_counter_with_registry!(
            Opts::new("plan_retries_total", "Plan generations retried with the simplified prompt"),
            registry
        )?;

        let pr_reviews = register_counter_vec_with_registry!(
            Opts::new("pr_reviews_total", "Pull request reviews by result source"),
            &["source"],
            registry
        )?;

        Ok(Self {
            registry,
            upstream_requests,
            upstream_request_duration,
            iam_token_refreshes,
            github_cache_lookups,
            plan_generations,
            plan_retries,
            pr_reviews,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one upstream call and its latency
    pub fn record_upstream(&self, service: &str, success: bool, elapsed: Duration) {
        let outcome = if success { "success" } else { "error" };
        self.upstream_requests
            .with_label_values(&[service, outcome])
            .inc();
        self.upstream_request_duration
            .with_label_values(&[service])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_token_refresh(&self) {
        self.iam_token_refreshes.inc();
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.github_cache_lookups.with_label_values(&[result]).inc();
    }

    /// Record a finished plan generation
    pub fn record_plan(&self, outcome: &str) {
        self.plan_generations.with_label_values(&[outcome]).inc();
    }

    pub fn record_plan_retry(&self) {
        self.plan_retries.inc();
    }

    pub fn record_pr_review(&self, source: &str) {
        self.pr_reviews.with_label_values(&[source]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_upstream() {
        let metrics = Metrics::new().unwrap();
        metrics.record_upstream("jira", true, Duration::from_millis(20));
        metrics.record_upstream("jira", false, Duration::from_millis(5));
        assert_eq!(
            metrics
                .upstream_requests
                .with_label_values(&["jira", "success"])
                .get(),
            1.0
        );
    }

    #[test]
    fn test_export_contains_registered_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_token_refresh();
        metrics.record_plan("success");
        let text = metrics.export_prometheus();
        assert!(text.contains("iam_token_refreshes_total 1"));
        assert!(text.contains("plan_generations_total"));
    }
}
