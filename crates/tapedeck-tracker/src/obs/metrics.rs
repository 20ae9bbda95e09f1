//! Minimal metrics registry for the uploader.
//!
//! Counter/gauge/histogram types with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histogram buckets are fixed in microseconds.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| {
            let v = v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
            format!("{k}=\"{v}\"")
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for one label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for r in self.map.iter() {
            let _ = writeln!(
                out,
                "{name}{{{}}} {}",
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn set(&self, labels: &[(&str, &str)], v: i64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0))
            .store(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |g| g.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        for r in self.map.iter() {
            let _ = writeln!(
                out,
                "{name}{{{}}} {}",
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

// 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s, 5s, 30s
const BUCKETS_MICROS: [u64; 9] = [
    1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000, 30_000_000,
];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration into cumulative buckets (microsecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);
        for (bucket, &le) in hist.buckets.iter().zip(BUCKETS_MICROS.iter()) {
            if micros <= le {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for r in self.map.iter() {
            let labels = render_labels(r.key());
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{labels},")
            };
            let hist = r.value();
            for (bucket, le) in hist.buckets.iter().zip(BUCKETS_MICROS) {
                let _ = writeln!(
                    out,
                    "{name}_bucket{{{prefix}le=\"{le}\"}} {}",
                    bucket.load(Ordering::Relaxed)
                );
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {count}");
            let _ = writeln!(
                out,
                "{name}_sum{{{labels}}} {}",
                hist.sum.load(Ordering::Relaxed)
            );
            let _ = writeln!(out, "{name}_count{{{labels}}} {count}");
        }
    }
}

/// Uploader metrics.
#[derive(Default)]
pub struct SenderMetrics {
    /// POST results by `outcome` (`ok`, `unauthorized`, `http_error`, `transport_error`).
    pub deliveries: CounterVec,
    pub bytes_delivered: CounterVec,
    pub retries_scheduled: CounterVec,
    pub permanent_failures: CounterVec,
    pub queue_depth: GaugeVec,
    pub delivery_duration: HistogramVec,
    halted: AtomicBool,
}

impl SenderMetrics {
    /// Mark the uploader as stuck after exhausting retries.
    pub fn set_halted(&self) {
        self.halted.store(true, Ordering::Relaxed);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.deliveries.render("tapedeck_deliveries_total", &mut out);
        self.bytes_delivered
            .render("tapedeck_delivered_bytes_total", &mut out);
        self.retries_scheduled
            .render("tapedeck_retries_scheduled_total", &mut out);
        self.permanent_failures
            .render("tapedeck_permanent_failures_total", &mut out);
        self.queue_depth.render("tapedeck_queue_depth", &mut out);
        self.delivery_duration
            .render("tapedeck_delivery_duration_micros", &mut out);
        let _ = writeln!(
            out,
            "# TYPE tapedeck_sender_halted gauge\ntapedeck_sender_halted {}",
            u8::from(self.is_halted())
        );
        out
    }
}
