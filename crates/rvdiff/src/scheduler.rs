//! Parallel test scheduler.
//!
//! Runs one pipeline per test on a bounded rayon pool. Results come back
//! over a channel in completion order; a failing or panicking pipeline only
//! affects its own result.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use rvdiff_trace::Verdict;
use tracing::debug;

use crate::config::RunConfig;
use crate::pipeline::{TestStage, run_pipeline};
use crate::steps::TestSteps;
use crate::{Error, Result};

/// Width of the dotted leader in result lines.
const RESULT_COLUMN: usize = 50;

/// Final status of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub const fn of(verdict: &Verdict) -> Self {
        if verdict.passed() {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a single test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test name (e.g., "asm.add").
    pub name: String,
    pub status: TestStatus,
    /// Stage that failed. `Comparing` for trace mismatches.
    pub failed_stage: Option<TestStage>,
    /// Present when the test got as far as comparing traces.
    pub verdict: Option<Verdict>,
    /// Cause of a failed stage.
    pub error: Option<String>,
    pub duration: Duration,
}

impl TestResult {
    /// Result of a completed comparison.
    pub fn compared(name: impl Into<String>, verdict: Verdict, duration: Duration) -> Self {
        let status = TestStatus::of(&verdict);
        Self {
            name: name.into(),
            status,
            failed_stage: (status == TestStatus::Failed).then_some(TestStage::Comparing),
            verdict: Some(verdict),
            error: None,
            duration,
        }
    }

    /// Result of a stage error.
    pub fn failed(
        name: impl Into<String>,
        stage: TestStage,
        error: impl fmt::Display,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            failed_stage: Some(stage),
            verdict: None,
            error: Some(error.to_string()),
            duration,
        }
    }

    /// Result of a pipeline that panicked outside any stage.
    pub fn panicked(name: impl Into<String>, message: String) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            failed_stage: None,
            verdict: None,
            error: Some(Error::Panicked(message).to_string()),
            duration: Duration::ZERO,
        }
    }

    /// Terminal stage.
    pub const fn stage(&self) -> TestStage {
        match self.status {
            TestStatus::Passed => TestStage::Passed,
            TestStatus::Failed => TestStage::Failed,
        }
    }

    pub const fn passed(&self) -> bool {
        matches!(self.status, TestStatus::Passed)
    }

    /// Passed with nothing to compare on either side.
    pub fn is_suspicious(&self) -> bool {
        self.verdict.as_ref().is_some_and(Verdict::is_suspicious)
    }

    /// One-line failure cause for summaries.
    pub fn cause(&self) -> String {
        match (&self.error, &self.verdict, self.failed_stage) {
            (Some(error), _, Some(stage)) => format!("{stage}: {error}"),
            (Some(error), _, None) => error.clone(),
            (None, Some(verdict), _) => match &verdict.mismatch {
                Some(m) => format!("trace mismatch at index {}", m.index),
                None => "passed".to_string(),
            },
            (None, None, _) => "unknown".to_string(),
        }
    }

    /// The console line: `name ........ PASSED`.
    pub fn line(&self) -> String {
        summary_line(&self.name, self.status)
    }
}

/// Format a result line, padding the name with dots to a fixed column.
pub fn summary_line(name: &str, status: TestStatus) -> String {
    let dots = ".".repeat(RESULT_COLUMN.saturating_sub(name.len()));
    format!("{name} {dots}. {status}")
}

/// Summary of test run results.
#[derive(Debug, Clone, Default)]
pub struct TestSummary {
    pub passed: usize,
    pub failed: usize,
    /// Passed tests whose traces had no comparable events.
    pub suspicious: usize,
    pub failures: Vec<TestResult>,
}

impl TestSummary {
    pub const fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Add a result to the summary.
    pub fn add(&mut self, result: TestResult) {
        crate::metrics::record_test(result.status);
        if result.is_suspicious() {
            self.suspicious += 1;
        }
        match result.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => {
                self.failed += 1;
                self.failures.push(result);
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs test pipelines on a bounded worker pool.
pub struct Scheduler<S> {
    steps: Arc<S>,
    config: Arc<RunConfig>,
}

impl<S: TestSteps + 'static> Scheduler<S> {
    pub fn new(steps: S, config: RunConfig) -> Self {
        Self {
            steps: Arc::new(steps),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every test, calling `on_result` as each one finishes.
    ///
    /// Only pool construction can fail; test failures are results.
    pub fn run<F>(&self, tests: &[String], mut on_result: F) -> Result<TestSummary>
    where
        F: FnMut(&TestResult),
    {
        let jobs = self.config.effective_jobs();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("rvdiff-worker-{i}"))
            .build()?;
        debug!(jobs, tests = tests.len(), "starting pool");

        let (tx, rx) = mpsc::channel();
        for name in tests {
            let tx = tx.clone();
            let name = name.clone();
            let steps = Arc::clone(&self.steps);
            let config = Arc::clone(&self.config);
            pool.spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_pipeline(&name, steps.as_ref(), &config)
                }))
                .unwrap_or_else(|payload| {
                    TestResult::panicked(name.as_str(), panic_message(payload.as_ref()))
                });
                // The receiver outlives every job.
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let mut summary = TestSummary::default();
        for result in rx {
            on_result(&result);
            summary.add(result);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        assert_eq!(
            summary_line("asm.add", TestStatus::Passed),
            format!("asm.add {}. PASSED", ".".repeat(43))
        );
        let long = "c.".repeat(30);
        assert_eq!(
            summary_line(&long, TestStatus::Failed),
            format!("{long} . FAILED")
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = TestSummary::default();
        summary.add(TestResult::compared(
            "asm.add",
            Verdict {
                iss_count: 3,
                rtl_count: 3,
                mismatch: None,
                warnings: Vec::new(),
            },
            Duration::ZERO,
        ));
        summary.add(TestResult::failed(
            "asm.sub",
            TestStage::Compiling,
            "gcc failed",
            Duration::ZERO,
        ));
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
        assert_eq!(summary.failures[0].cause(), "compiling: gcc failed");
        assert_eq!(summary.failures[0].stage(), TestStage::Failed);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_panicked_result_has_no_stage() {
        let result = TestResult::panicked("asm.add", "boom".to_string());
        assert_eq!(result.status, TestStatus::Failed);
        assert!(result.failed_stage.is_none());
        assert_eq!(result.cause(), "pipeline panicked: boom");
    }
}
