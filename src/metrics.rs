//! Lightweight in-memory request metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

#[derive(Default)]
struct RequestMetrics {
    queries: AtomicU64,
    query_failures: AtomicU64,
    query_duration_total_ms: AtomicU64,
    query_duration_max_ms: AtomicU64,
    ingests: AtomicU64,
    ingest_failures: AtomicU64,
}

static REQUEST_METRICS: OnceLock<RequestMetrics> = OnceLock::new();

fn metrics() -> &'static RequestMetrics {
    REQUEST_METRICS.get_or_init(RequestMetrics::default)
}

pub fn record_query(duration_ms: f64, success: bool) {
    let duration_ms = duration_ms.max(0.0) as u64;
    let metrics = metrics();
    metrics.queries.fetch_add(1, Ordering::Relaxed);
    if !success {
        metrics.query_failures.fetch_add(1, Ordering::Relaxed);
    }
    metrics
        .query_duration_total_ms
        .fetch_add(duration_ms, Ordering::Relaxed);

    let mut current = metrics.query_duration_max_ms.load(Ordering::Relaxed);
    while duration_ms > current {
        match metrics.query_duration_max_ms.compare_exchange(
            current,
            duration_ms,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(next) => current = next,
        }
    }
}

pub fn record_ingest(success: bool) {
    let metrics = metrics();
    metrics.ingests.fetch_add(1, Ordering::Relaxed);
    if !success {
        metrics.ingest_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub query_failures: u64,
    pub query_avg_ms: Option<f64>,
    pub query_max_ms: Option<u64>,
    pub ingests: u64,
    pub ingest_failures: u64,
}

pub fn snapshot() -> MetricsSnapshot {
    let metrics = metrics();
    let queries = metrics.queries.load(Ordering::Relaxed);
    let duration_total = metrics.query_duration_total_ms.load(Ordering::Relaxed);
    let max_ms = metrics.query_duration_max_ms.load(Ordering::Relaxed);

    MetricsSnapshot {
        queries,
        query_failures: metrics.query_failures.load(Ordering::Relaxed),
        query_avg_ms: if queries > 0 {
            Some(duration_total as f64 / queries as f64)
        } else {
            None
        },
        query_max_ms: if queries > 0 { Some(max_ms) } else { None },
        ingests: metrics.ingests.load(Ordering::Relaxed),
        ingest_failures: metrics.ingest_failures.load(Ordering::Relaxed),
    }
}
