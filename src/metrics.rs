//! Service metrics: request counts per endpoint and query latency.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Latency statistics cover at most this many of the most recent queries.
pub const LATENCY_WINDOW: usize = 4096;

/// The kinds of request the service answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Predict,
    BreedSearch,
    Similar,
}

/// Collects runtime metrics for the breed search service.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Most recent latencies, oldest first, bounded by `LATENCY_WINDOW`.
    query_latencies_us: VecDeque<f64>,
    total_queries: u64,
    predictions: u64,
    breed_searches: u64,
    breed_misses: u64,
    similar_queries: u64,
    errors: u64,
}

/// Point-in-time copy of the collected metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub predictions: u64,
    pub breed_searches: u64,
    pub breed_misses: u64,
    pub similar_queries: u64,
    pub errors: u64,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p95_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed query with its duration.
    pub fn record_query(&mut self, kind: QueryKind, duration: Duration) {
        match kind {
            QueryKind::Predict => self.predictions += 1,
            QueryKind::BreedSearch => self.breed_searches += 1,
            QueryKind::Similar => self.similar_queries += 1,
        }
        if self.query_latencies_us.len() == LATENCY_WINDOW {
            self.query_latencies_us.pop_front();
        }
        self.query_latencies_us.push_back(duration.as_micros() as f64);
        self.total_queries += 1;
    }

    /// A breed search that matched no image.
    pub fn record_breed_miss(&mut self) {
        self.breed_misses += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    /// Average latency in microseconds over the recent window.
    pub fn avg_query_latency_us(&self) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.query_latencies_us.iter().sum();
        sum / self.query_latencies_us.len() as f64
    }

    /// Get a percentile of query latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.query_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_queries: self.total_queries(),
            predictions: self.predictions,
            breed_searches: self.breed_searches,
            breed_misses: self.breed_misses,
            similar_queries: self.similar_queries,
            errors: self.errors,
            avg_query_latency_us: self.avg_query_latency_us(),
            p50_query_latency_us: self.percentile_query_latency_us(50.0),
            p95_query_latency_us: self.percentile_query_latency_us(95.0),
            p99_query_latency_us: self.percentile_query_latency_us(99.0),
        }
    }
}
