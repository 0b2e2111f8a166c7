//! Per-test pipeline state machine.
//!
//! ```text
//! Pending → Compiling → SimulatingIss → BuildingMemoryImage
//!         → SimulatingRtl → Merging → Comparing → Passed | Failed
//! ```
//!
//! Any stage error moves the test straight to `Failed`, recording the stage
//! that failed and why.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::{Duration, Instant};

use rvdiff_trace::{
    AddressSpace, MergeOutcome, TraceFormat, TraceLog, Verdict, compare, merge_split_writes,
    normalize_file,
};
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::scheduler::{TestResult, panic_message};
use crate::steps::{TestSteps, artifacts};
use crate::task::TestCase;
use crate::{Error, Result};

/// Where a test is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestStage {
    Pending,
    Compiling,
    SimulatingIss,
    BuildingMemoryImage,
    SimulatingRtl,
    Merging,
    Comparing,
    Passed,
    Failed,
}

impl TestStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Compiling => "compiling",
            Self::SimulatingIss => "simulating-iss",
            Self::BuildingMemoryImage => "building-memory-image",
            Self::SimulatingRtl => "simulating-rtl",
            Self::Merging => "merging",
            Self::Comparing => "comparing",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }

    /// The stage that follows on success. Terminal stages have none.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Compiling),
            Self::Compiling => Some(Self::SimulatingIss),
            Self::SimulatingIss => Some(Self::BuildingMemoryImage),
            Self::BuildingMemoryImage => Some(Self::SimulatingRtl),
            Self::SimulatingRtl => Some(Self::Merging),
            Self::Merging => Some(Self::Comparing),
            Self::Comparing => Some(Self::Passed),
            Self::Passed | Self::Failed => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }
}

impl fmt::Display for TestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the merge and compare stages.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub verdict: Verdict,
    pub merge: MergeOutcome,
}

fn require_log(what: &'static str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingArtifact {
            what,
            path: path.to_path_buf(),
        })
    }
}

/// Normalize the RTL trace and merge its split writes.
///
/// When `merged_out` is set the merged trace is written there.
pub fn merge_rtl_log(
    rtl_log: &Path,
    space: &AddressSpace,
    merged_out: Option<&Path>,
) -> Result<MergeOutcome> {
    require_log("RTL trace", rtl_log)?;
    let rtl = normalize_file(rtl_log, TraceFormat::Rtl, space)?;
    let merge = merge_split_writes(&rtl, space);
    if let Some(path) = merged_out {
        fs::write(path, merge.log.to_rtl_text())?;
    }
    Ok(merge)
}

/// Normalize the ISS trace and compare it against a merged RTL trace.
pub fn compare_with_iss(iss_log: &Path, rtl: &TraceLog, space: &AddressSpace) -> Result<Verdict> {
    require_log("ISS trace", iss_log)?;
    let iss = normalize_file(iss_log, TraceFormat::Iss, space)?;
    Ok(compare(&iss, rtl, space))
}

/// Merge and compare two trace files.
pub fn compare_logs(
    iss_log: &Path,
    rtl_log: &Path,
    space: &AddressSpace,
    merged_out: Option<&Path>,
) -> Result<Comparison> {
    let merge = merge_rtl_log(rtl_log, space, merged_out)?;
    let verdict = compare_with_iss(iss_log, &merge.log, space)?;
    Ok(Comparison { verdict, merge })
}

/// Append the comparison report to a test's `sim.log`.
fn append_report(dir: &Path, verdict: &Verdict) -> Result<()> {
    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(artifacts::SIM_LOG))?;
    verdict.write_report(&mut log)?;
    Ok(())
}

/// Drives one test through its stages.
struct Pipeline<'a, S: TestSteps + ?Sized> {
    steps: &'a S,
    config: &'a RunConfig,
    stage: TestStage,
}

impl<S: TestSteps + ?Sized> Pipeline<'_, S> {
    /// Move to the next stage, timing the work done for it.
    ///
    /// A panic in `work` becomes an error of the stage it happened in.
    fn advance<T>(&mut self, test: &TestCase, work: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(next) = self.stage.next() {
            debug!(test = test.name(), from = %self.stage, to = %next, "stage");
            self.stage = next;
        }
        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(work))
            .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))));
        crate::metrics::record_stage(self.stage, start.elapsed());
        result
    }

    fn run(&mut self, test: &TestCase) -> Result<Comparison> {
        let dir = test.work_dir(&self.config.project_path(&self.config.work_dir));
        fs::create_dir_all(&dir)?;
        let steps = self.steps;

        self.advance(test, || steps.compile(test, &dir))?;
        let iss_log = self.advance(test, || steps.run_iss(test, &dir))?;
        self.advance(test, || steps.build_memory_image(test, &dir))?;
        let rtl_log = self.advance(test, || steps.run_rtl(test, &dir))?;

        let merged = dir.join(artifacts::RTL_MERGED_LOG);
        let merge = self.advance(test, || merge_rtl_log(&rtl_log, test.space(), Some(&merged)))?;
        let verdict = self.advance(test, || compare_with_iss(&iss_log, &merge.log, test.space()))?;

        if verdict.is_suspicious() {
            warn!(test = test.name(), "both traces have no comparable events");
        }
        if !verdict.passed() || verdict.is_suspicious() || self.config.verbose {
            append_report(&dir, &verdict)?;
        }
        Ok(Comparison { verdict, merge })
    }
}

/// Run one test end to end.
///
/// Never fails: every error is folded into a `Failed` result.
pub fn run_pipeline<S: TestSteps + ?Sized>(name: &str, steps: &S, config: &RunConfig) -> TestResult {
    let start = Instant::now();
    let test = match TestCase::parse(name) {
        Ok(test) => test,
        Err(e) => return TestResult::failed(name, TestStage::Pending, e, Duration::ZERO),
    };

    let mut pipeline = Pipeline {
        steps,
        config,
        stage: TestStage::Pending,
    };
    let result = match pipeline.run(&test) {
        Ok(comparison) => {
            crate::metrics::record_comparison(&comparison.verdict, &comparison.merge);
            TestResult::compared(name, comparison.verdict, start.elapsed())
        }
        Err(e) => TestResult::failed(name, pipeline.stage, e, start.elapsed()),
    };
    debug!(
        test = name,
        stage = %result.stage(),
        elapsed_ms = result.duration.as_millis(),
        "finished"
    );
    result
}
