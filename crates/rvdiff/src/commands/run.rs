//! `rvdiff run`: the full regression pipeline.

use rvdiff::{ExternalTools, RunConfig, Scheduler, TestCase, read_task_list};
use tracing::debug;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, RunArgs};
use crate::terminal::{self, Progress};

fn build_config(args: &RunArgs, verbose: bool) -> RunConfig {
    let mut config = RunConfig::default()
        .with_work_dir(&args.work_dir)
        .with_tests_dir(&args.tests_dir)
        .with_simulator(args.simulator.into())
        .with_toolchain(&args.toolchain)
        .with_jobs(args.jobs)
        .with_verbose(verbose);
    if let Some(objdump) = &args.objdump {
        config = config.with_objdump(objdump);
    }
    config
}

/// Run the selected tests.
///
/// Setup errors exit with failure; failing tests are reported but leave the
/// exit status alone.
pub fn cmd_run(args: &RunArgs, verbose: bool) -> i32 {
    let tests = match (&args.name, &args.tasks) {
        (Some(name), _) => vec![name.clone()],
        (None, Some(path)) => match read_task_list(path) {
            Ok(tests) => tests,
            Err(e) => {
                terminal::error(&e.to_string());
                return EXIT_FAILURE;
            }
        },
        (None, None) => {
            terminal::error("no tests selected");
            return EXIT_FAILURE;
        }
    };

    let config = build_config(args, verbose);

    // Invalid names fail as tests; only the parsed ones decide which tools
    // are required.
    let cases: Vec<TestCase> = tests
        .iter()
        .filter_map(|name| TestCase::parse(name).ok())
        .collect();
    let tools = ExternalTools::new(config.clone());
    if let Err(e) = tools.check_tools(&cases) {
        terminal::error(&e.to_string());
        return EXIT_FAILURE;
    }

    debug!(
        tests = tests.len(),
        simulator = %config.simulator,
        jobs = config.effective_jobs(),
        "run"
    );
    terminal::info(&format!(
        "Running {} test(s) on {} with {} worker(s)",
        tests.len(),
        config.simulator,
        config.effective_jobs()
    ));

    let work_dir = config.project_path(&config.work_dir);
    let scheduler = Scheduler::new(tools, config);
    let progress = Progress::new(tests.len() as u64);
    let summary = match scheduler.run(&tests, |result| progress.report(result)) {
        Ok(summary) => summary,
        Err(e) => {
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };
    progress.finish();

    terminal::print_summary(&summary, &work_dir);
    EXIT_SUCCESS
}
