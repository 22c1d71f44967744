//! Metrics: counters, gauges, and histograms.
//!
//! Every recording is forwarded to the `metrics` facade, so any installed
//! recorder (for example a Prometheus exporter) sees it. The collector also
//! keeps a bounded in-process view for snapshots and tests.
//!
//! Keys of the in-process view follow the Prometheus text convention,
//! `name{label="value",...}` with labels sorted by name.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use metrics::Label;
use serde::Serialize;
use tracing::{debug, info};

/// Samples kept per histogram; older ones are dropped first.
pub const MAX_HISTOGRAM_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramStats>,
}

#[derive(Default)]
struct Registry {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, VecDeque<f64>>,
}

pub struct MetricsCollector {
    enabled: bool,
    inner: Mutex<Registry>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MetricsCollector {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            inner: Mutex::new(Registry::default()),
        }
    }

    #[must_use]
    pub fn shared(enabled: bool) -> Arc<Self> {
        Arc::new(Self::new(enabled))
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panic while holding the lock leaves plain maps behind; keep using them.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1, &[]);
    }

    pub fn increment_labeled(&self, name: &str, labels: &[(&str, &str)]) {
        self.increment_by(name, 1, labels);
    }

    pub fn increment_by(&self, name: &str, value: u64, labels: &[(&str, &str)]) {
        if !self.enabled {
            return;
        }
        metrics::counter!(name.to_string(), facade_labels(labels)).increment(value);
        let key = metric_key(name, labels);
        debug!("Counter incremented: {key} (+{value})");
        *self.registry().counters.entry(key).or_insert(0) += value;
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        if !self.enabled {
            return;
        }
        metrics::gauge!(name.to_string()).set(value);
        self.registry().gauges.insert(name.to_string(), value);
    }

    pub fn observe(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        if !self.enabled {
            return;
        }
        metrics::histogram!(name.to_string(), facade_labels(labels)).record(value);
        let key = metric_key(name, labels);
        let mut reg = self.registry();
        let samples = reg.histograms.entry(key).or_default();
        if samples.len() >= MAX_HISTOGRAM_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    /// Start timing `name`; the duration lands in
    /// `<name>_duration_seconds` when the guard drops.
    #[must_use]
    pub fn start_timer(self: &Arc<Self>, name: impl Into<String>) -> TimerGuard {
        TimerGuard {
            metrics: Arc::clone(self),
            name: name.into(),
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = metric_key(name, labels);
        self.registry().counters.get(&key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.registry().gauges.get(name).copied()
    }

    #[must_use]
    pub fn histogram_stats(&self, name: &str, labels: &[(&str, &str)]) -> Option<HistogramStats> {
        let key = metric_key(name, labels);
        self.registry().histograms.get(&key).and_then(|v| stats(v))
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let reg = self.registry();
        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            counters: reg.counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            gauges: reg.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            histograms: reg
                .histograms
                .iter()
                .filter_map(|(k, v)| stats(v).map(|s| (k.clone(), s)))
                .collect(),
        }
    }

    pub fn reset(&self) {
        let mut reg = self.registry();
        reg.counters.clear();
        reg.gauges.clear();
        reg.histograms.clear();
    }

    /// Log a summary of everything collected and return it.
    pub fn flush(&self) -> MetricsSnapshot {
        let snapshot = self.snapshot();
        info!(
            "Metrics flushed: {} counters, {} gauges, {} histograms",
            snapshot.counters.len(),
            snapshot.gauges.len(),
            snapshot.histograms.len()
        );
        snapshot
    }
}

/// Records elapsed time into its collector when dropped.
pub struct TimerGuard {
    metrics: Arc<MetricsCollector>,
    name: String,
    started: Instant,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let secs = self.started.elapsed().as_secs_f64();
        self.metrics
            .observe(&format!("{}_duration_seconds", self.name), secs, &[]);
    }
}

fn facade_labels(labels: &[(&str, &str)]) -> Vec<Label> {
    labels
        .iter()
        .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
        .collect()
}

fn metric_key(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let mut sorted = labels.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let rendered: Vec<String> = sorted
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect();
    format!("{name}{{{}}}", rendered.join(","))
}

fn stats(values: &VecDeque<f64>) -> Option<HistogramStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let count = sorted.len();
    let pick = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
    Some(HistogramStats {
        count,
        min: sorted[0],
        max: sorted[count - 1],
        mean: sorted.iter().sum::<f64>() / count as f64,
        median: sorted[count / 2],
        p95: pick(0.95),
        p99: pick(0.99),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_with_labels() {
        let m = MetricsCollector::new(true);
        m.increment("requests_total");
        m.increment("requests_total");
        m.increment_labeled("queries", &[("mode", "hybrid")]);
        assert_eq!(m.counter("requests_total", &[]), 2);
        assert_eq!(m.counter("queries", &[("mode", "hybrid")]), 1);
        assert_eq!(m.counter("queries", &[("mode", "local")]), 0);
    }

    #[test]
    fn test_label_order_does_not_matter() {
        assert_eq!(
            metric_key("x", &[("b", "2"), ("a", "1")]),
            r#"x{a="1",b="2"}"#
        );
    }

    #[test]
    fn test_gauge_and_histogram() {
        let m = MetricsCollector::new(true);
        m.set_gauge("instances", 3.0);
        assert_eq!(m.gauge("instances"), Some(3.0));

        for v in 1..=100 {
            m.observe("latency", f64::from(v), &[]);
        }
        let s = m.histogram_stats("latency", &[]).unwrap();
        assert_eq!(s.count, 100);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 100.0);
        assert_eq!(s.median, 51.0);
        assert_eq!(s.p95, 96.0);
        assert!((s.mean - 50.5).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_keeps_most_recent_samples() {
        let m = MetricsCollector::shared(true);
        for _ in 0..(MAX_HISTOGRAM_SAMPLES * 3) {
            drop(m.start_timer("tools.query_directory"));
        }
        let s = m
            .histogram_stats("tools.query_directory_duration_seconds", &[])
            .unwrap();
        assert_eq!(s.count, MAX_HISTOGRAM_SAMPLES);

        let n = MetricsCollector::new(true);
        for v in 0..(MAX_HISTOGRAM_SAMPLES + 10) {
            n.observe("size", v as f64, &[]);
        }
        let s = n.histogram_stats("size", &[]).unwrap();
        assert_eq!(s.count, MAX_HISTOGRAM_SAMPLES);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, (MAX_HISTOGRAM_SAMPLES + 9) as f64);
    }

    #[test]
    fn test_timer_guard_records_duration() {
        let m = MetricsCollector::shared(true);
        {
            let _t = m.start_timer("work");
        }
        let s = m.histogram_stats("work_duration_seconds", &[]).unwrap();
        assert_eq!(s.count, 1);
    }

    #[test]
    fn test_disabled_collector_records_nothing() {
        let m = MetricsCollector::shared(false);
        m.increment("a");
        m.set_gauge("b", 1.0);
        drop(m.start_timer("c"));
        let snap = m.snapshot();
        assert!(snap.counters.is_empty());
        assert!(snap.gauges.is_empty());
        assert!(snap.histograms.is_empty());
    }

    #[test]
    fn test_reset_and_flush() {
        let m = MetricsCollector::new(true);
        m.increment("a");
        assert_eq!(m.flush().counters.len(), 1);
        m.reset();
        assert!(m.snapshot().counters.is_empty());
    }
}
