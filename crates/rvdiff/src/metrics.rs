//! Metrics collection and reporting using metrics-rs.
//!
//! Counters track test outcomes and trace volume; a histogram tracks how
//! long each pipeline stage takes. `CliRecorder` keeps everything in memory
//! for the `--metrics` summary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_histogram, histogram,
};
use parking_lot::RwLock;
use rvdiff_trace::{MergeOutcome, Verdict};

use crate::pipeline::TestStage;
use crate::scheduler::TestStatus;

// ============================================================================
// Metric descriptions
// ============================================================================

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "rvdiff_tests_passed_total",
        Unit::Count,
        "Total tests passed"
    );
    describe_counter!(
        "rvdiff_tests_failed_total",
        Unit::Count,
        "Total tests failed"
    );
    describe_counter!(
        "rvdiff_events_compared_total",
        Unit::Count,
        "Comparable commit events, both sides"
    );
    describe_counter!(
        "rvdiff_split_writes_merged_total",
        Unit::Count,
        "RTL split stores folded into one write"
    );
    describe_histogram!(
        "rvdiff_stage_duration_seconds",
        Unit::Seconds,
        "Pipeline stage duration distribution"
    );
}

// ============================================================================
// Metric recording functions
// ============================================================================

/// Record a single test result.
pub fn record_test(status: TestStatus) {
    match status {
        TestStatus::Passed => counter!("rvdiff_tests_passed_total").increment(1),
        TestStatus::Failed => counter!("rvdiff_tests_failed_total").increment(1),
    }
}

/// Record how long a stage took.
pub fn record_stage(stage: TestStage, elapsed: Duration) {
    let labels = [("stage", stage.as_str())];
    histogram!("rvdiff_stage_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

/// Record trace volume for one comparison.
pub fn record_comparison(verdict: &Verdict, merge: &MergeOutcome) {
    counter!("rvdiff_events_compared_total")
        .increment((verdict.iss_count + verdict.rtl_count) as u64);
    counter!("rvdiff_split_writes_merged_total").increment(merge.merged as u64);
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

/// Everything recorded during one run, keyed by `name{label=value,..}`.
#[derive(Default)]
struct Store {
    counters: BTreeMap<String, u64>,
    samples: BTreeMap<String, Vec<f64>>,
}

type SharedStore = Arc<RwLock<Store>>;

/// One registered metric. Counters and histograms share the slot type and
/// differ only in which map they write to.
struct Slot {
    key: String,
    store: SharedStore,
}

impl metrics::CounterFn for Slot {
    fn increment(&self, value: u64) {
        *self.store.write().counters.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.store.write().counters.insert(self.key.clone(), value);
    }
}

impl metrics::HistogramFn for Slot {
    fn record(&self, value: f64) {
        self.store
            .write()
            .samples
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// In-memory recorder behind `--metrics`. Gauges are dropped.
#[derive(Default)]
pub struct CliRecorder {
    store: SharedStore,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder.
    ///
    /// Returns `None` if another recorder is already installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let handle = self.handle();
        metrics::set_global_recorder(self).ok()?;
        Some(handle)
    }

    pub fn handle(&self) -> CliRecorderHandle {
        CliRecorderHandle {
            store: Arc::clone(&self.store),
        }
    }

    fn slot(&self, key: &Key) -> Arc<Slot> {
        Arc::new(Slot {
            key: key_to_string(key),
            store: Arc::clone(&self.store),
        })
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.slot(key))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.slot(key))
    }
}

/// Read access to metrics recorded by a [`CliRecorder`].
pub struct CliRecorderHandle {
    store: SharedStore,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.store.read().counters.get(key).copied()
    }

    pub fn get_histogram(&self, key: &str) -> Option<Vec<f64>> {
        self.store.read().samples.get(key).cloned()
    }

    /// Render counters, then per-stage wall time.
    #[allow(clippy::cast_precision_loss)]
    pub fn render(&self) -> String {
        use std::fmt::Write;

        let store = self.store.read();
        let mut out = String::from("\n## Metrics\n");
        for (key, value) in &store.counters {
            let _ = writeln!(out, "  {key}: {value}");
        }
        let stages = store
            .samples
            .iter()
            .filter_map(|(key, samples)| Some((stage_label(key)?, samples)));
        for (stage, samples) in stages {
            let total: f64 = samples.iter().sum();
            let _ = writeln!(
                out,
                "  stage {stage:<22} runs={:<5} total={total:.3}s mean={:.3}s",
                samples.len(),
                total / samples.len().max(1) as f64
            );
        }
        out
    }

    pub fn print_summary(&self) {
        println!("{}", self.render());
    }
}

/// `stage` label of a stage-duration key.
fn stage_label(key: &str) -> Option<&str> {
    key.strip_prefix("rvdiff_stage_duration_seconds{stage=")?
        .strip_suffix('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::Label;

    #[test]
    fn test_key_to_string() {
        let key = Key::from_name("rvdiff_tests_passed_total");
        assert_eq!(key_to_string(&key), "rvdiff_tests_passed_total");

        let key = Key::from_parts(
            "rvdiff_stage_duration_seconds",
            vec![Label::new("stage", "compiling")],
        );
        assert_eq!(
            key_to_string(&key),
            "rvdiff_stage_duration_seconds{stage=compiling}"
        );
    }

    #[test]
    fn test_recorder_collects_locally() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_test(TestStatus::Passed);
            record_test(TestStatus::Passed);
            record_test(TestStatus::Failed);
            record_stage(TestStage::Compiling, Duration::from_millis(250));
        });

        assert_eq!(handle.get_counter("rvdiff_tests_passed_total"), Some(2));
        assert_eq!(handle.get_counter("rvdiff_tests_failed_total"), Some(1));
        assert_eq!(
            handle.get_histogram("rvdiff_stage_duration_seconds{stage=compiling}"),
            Some(vec![0.25])
        );
    }

    #[test]
    fn test_render_lists_counters_and_stages() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_test(TestStatus::Failed);
            record_stage(TestStage::Merging, Duration::from_millis(500));
            record_stage(TestStage::Merging, Duration::from_millis(1500));
        });

        let text = handle.render();
        assert!(text.contains("  rvdiff_tests_failed_total: 1\n"));
        let stage = text.lines().find(|l| l.contains("stage merging")).unwrap();
        assert!(stage.contains("runs=2"));
        assert!(stage.contains("total=2.000s"));
        assert!(stage.contains("mean=1.000s"));
    }
}
