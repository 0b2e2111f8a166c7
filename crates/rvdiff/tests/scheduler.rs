//! Scheduler and pipeline behavior over scripted steps.

mod common;

use std::fs;

use common::{FakeSteps, LEGACY_ISS, LEGACY_RTL, LEGACY_RTL_BAD, Script};
use rvdiff::steps::artifacts;
use rvdiff::{RunConfig, Scheduler, TestResult, TestStage, TestStatus, run_pipeline};
use tempfile::TempDir;

fn config(dir: &TempDir) -> RunConfig {
    RunConfig::default()
        .with_project_dir(dir.path())
        .with_jobs(4)
}

fn run(steps: FakeSteps, config: RunConfig, tests: &[&str]) -> Vec<TestResult> {
    let tests: Vec<String> = tests.iter().map(ToString::to_string).collect();
    let scheduler = Scheduler::new(steps, config);
    let mut results = Vec::new();
    let summary = scheduler
        .run(&tests, |r| results.push(r.clone()))
        .unwrap();
    assert_eq!(summary.total(), tests.len());
    results.sort_by(|a, b| a.name.cmp(&b.name));
    results
}

#[test]
fn matching_traces_pass() {
    let dir = tempfile::tempdir().unwrap();
    let steps = FakeSteps::default().with("asm.add", Script::traces(LEGACY_ISS, LEGACY_RTL));
    let result = run_pipeline("asm.add", &steps, &config(&dir));

    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(result.stage(), TestStage::Passed);
    assert!(result.failed_stage.is_none());
    assert_eq!(result.verdict.as_ref().unwrap().iss_count, 2);

    // Passing tests leave sim.log alone unless verbose.
    let work = dir.path().join("work/asm.add");
    let sim = fs::read_to_string(work.join(artifacts::SIM_LOG)).unwrap();
    assert!(!sim.contains("LOG MISMATCH DETAILS"));
    assert!(work.join(artifacts::RTL_MERGED_LOG).is_file());
}

#[test]
fn verbose_pass_appends_report() {
    let dir = tempfile::tempdir().unwrap();
    let steps = FakeSteps::default().with("asm.add", Script::traces(LEGACY_ISS, LEGACY_RTL));
    let result = run_pipeline("asm.add", &steps, &config(&dir).with_verbose(true));
    assert!(result.passed());

    let sim = fs::read_to_string(dir.path().join("work/asm.add/sim.log")).unwrap();
    assert!(sim.starts_with("simulation done\n"));
    assert!(sim.contains("--- LOG MISMATCH DETAILS ---"));
    assert!(sim.contains("No mismatch."));
}

#[test]
fn mismatch_fails_and_reports_to_sim_log() {
    let dir = tempfile::tempdir().unwrap();
    let steps = FakeSteps::default().with("asm.add", Script::traces(LEGACY_ISS, LEGACY_RTL_BAD));
    let result = run_pipeline("asm.add", &steps, &config(&dir));

    assert_eq!(result.status, TestStatus::Failed);
    assert_eq!(result.failed_stage, Some(TestStage::Comparing));
    assert_eq!(result.cause(), "trace mismatch at index 1");
    assert!(result.error.is_none());

    let sim = fs::read_to_string(dir.path().join("work/asm.add/sim.log")).unwrap();
    assert!(sim.contains("First mismatch at index 1:"));
    assert!(sim.contains("  - ISS event: PC=00100004, INSTR=00150513, MOD=x10=0000000B"));
    assert!(sim.contains("  - RTL event: PC=00100004, INSTR=00150513, MOD=x10=0000000C"));
}

#[test]
fn step_error_records_failing_stage() {
    let dir = tempfile::tempdir().unwrap();
    for stage in [
        TestStage::Compiling,
        TestStage::SimulatingIss,
        TestStage::BuildingMemoryImage,
        TestStage::SimulatingRtl,
    ] {
        let steps = FakeSteps::default().with("asm.add", Script::failing_at(stage));
        let result = run_pipeline("asm.add", &steps, &config(&dir));
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.failed_stage, Some(stage));
        assert!(result.verdict.is_none());
        assert!(result.cause().starts_with(stage.as_str()));
    }
}

#[test]
fn missing_rtl_trace_fails_while_merging() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        no_rtl_log: true,
        ..Script::traces(LEGACY_ISS, LEGACY_RTL)
    };
    let steps = FakeSteps::default().with("asm.add", script);
    let result = run_pipeline("asm.add", &steps, &config(&dir));
    assert_eq!(result.failed_stage, Some(TestStage::Merging));
    assert!(result.error.unwrap().contains("missing RTL trace"));
}

#[test]
fn empty_iss_trace_fails_while_comparing() {
    let dir = tempfile::tempdir().unwrap();
    let steps = FakeSteps::default().with("asm.add", Script::traces("", LEGACY_RTL));
    let result = run_pipeline("asm.add", &steps, &config(&dir));
    assert_eq!(result.failed_stage, Some(TestStage::Comparing));
    assert!(result.verdict.is_none());
}

#[test]
fn invalid_name_fails_before_any_step() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_pipeline("nodot", &FakeSteps::default(), &config(&dir));
    assert_eq!(result.failed_stage, Some(TestStage::Pending));
    assert!(!dir.path().join("work/nodot").exists());
}

#[test]
fn effectless_traces_pass_as_suspicious() {
    let dir = tempfile::tempdir().unwrap();
    let steps = FakeSteps::default().with(
        "asm.nop",
        Script::traces(
            "0x00100000;0x00000013;nop;\n",
            "0;0x00100000;0x00000013;\n",
        ),
    );
    let result = run_pipeline("asm.nop", &steps, &config(&dir));
    assert!(result.passed());
    assert!(result.is_suspicious());

    // Suspicious passes still get a report.
    let sim = fs::read_to_string(dir.path().join("work/asm.nop/sim.log")).unwrap();
    assert!(sim.contains("ISS trace has no comparable events"));
}

#[test]
fn batch_isolates_failures_and_panics() {
    let dir = tempfile::tempdir().unwrap();
    let steps = FakeSteps::default()
        .with("asm.a", Script::traces(LEGACY_ISS, LEGACY_RTL))
        .with("asm.b", Script::traces(LEGACY_ISS, LEGACY_RTL_BAD))
        .with("asm.c", Script::failing_at(TestStage::Compiling))
        .with("asm.d", Script::panicking_at(TestStage::SimulatingRtl))
        .with("asm.e", Script::traces(LEGACY_ISS, LEGACY_RTL));

    let results = run(
        steps,
        config(&dir),
        &["asm.a", "asm.b", "asm.c", "asm.d", "asm.e"],
    );
    let statuses: Vec<_> = results.iter().map(|r| (r.name.as_str(), r.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("asm.a", TestStatus::Passed),
            ("asm.b", TestStatus::Failed),
            ("asm.c", TestStatus::Failed),
            ("asm.d", TestStatus::Failed),
            ("asm.e", TestStatus::Passed),
        ]
    );
    assert_eq!(results[3].failed_stage, Some(TestStage::SimulatingRtl));
    assert_eq!(
        results[3].cause(),
        "simulating-rtl: pipeline panicked: scripted panic in simulating-rtl"
    );
}

#[test]
fn panic_records_the_stage_it_happened_in() {
    let dir = tempfile::tempdir().unwrap();
    let steps =
        FakeSteps::default().with("asm.add", Script::panicking_at(TestStage::BuildingMemoryImage));
    let result = run_pipeline("asm.add", &steps, &config(&dir));
    assert_eq!(result.status, TestStatus::Failed);
    assert_eq!(result.failed_stage, Some(TestStage::BuildingMemoryImage));
    assert!(result.verdict.is_none());
}

#[test]
fn summary_counts_match_results() {
    let dir = tempfile::tempdir().unwrap();
    let steps = FakeSteps::default()
        .with("asm.a", Script::traces(LEGACY_ISS, LEGACY_RTL))
        .with("c.b", Script::failing_at(TestStage::SimulatingIss));
    let tests = vec!["asm.a".to_string(), "c.b".to_string(), "bad".to_string()];

    let scheduler = Scheduler::new(steps, config(&dir).with_jobs(1));
    let mut lines = Vec::new();
    let summary = scheduler.run(&tests, |r| lines.push(r.line())).unwrap();

    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 2);
    assert!(!summary.all_passed());
    let mut failed: Vec<_> = summary.failures.iter().map(|r| r.name.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["bad", "c.b"]);
    assert!(lines.iter().any(|l| l.starts_with("asm.a ...") && l.ends_with(". PASSED")));
}
