//! Feed Assembly Metrics
//!
//! Prometheus metrics for feed requests, recall sources and media resolution

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_assembly_requests_total",
        "Total feed assembly requests (success/degraded/error)",
        &["outcome"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_ASSEMBLY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_assembly_duration_seconds",
        "Wall-clock duration of feed assembly",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0]
    )
    .expect("Failed to register feed assembly duration metric")
});

static RECALL_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_recall_failures_total",
        "Recall strategy failures absorbed by the blender",
        &["source"]
    )
    .expect("Failed to register recall failures metric")
});

static POSTS_SERVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_posts_served_total",
        "Posts served by recall source",
        &["source"]
    )
    .expect("Failed to register posts served metric")
});

static MEDIA_CHUNK_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "feed_media_chunk_failures_total",
        "Temp URL chunks that failed and were passed through unresolved"
    )
    .expect("Failed to register media chunk failures metric")
});

/// Record feed request outcome (success/degraded/error)
pub fn record_feed_request(outcome: &str) {
    FEED_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_assembly_duration(duration: Duration) {
    FEED_ASSEMBLY_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_recall_failure(source: &str) {
    RECALL_FAILURES_TOTAL.with_label_values(&[source]).inc();
}

pub fn record_posts_served(source: &str, count: usize) {
    POSTS_SERVED_TOTAL
        .with_label_values(&[source])
        .inc_by(count as u64);
}

pub fn record_media_chunk_failure() {
    MEDIA_CHUNK_FAILURES_TOTAL.inc();
}

/// Text exposition of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
