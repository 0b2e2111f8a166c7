//! rvdiff - lock-step regression runner for a RISC-V core.
//!
//! Each test is compiled, run on a reference instruction set simulator and
//! on the RTL testbench, and the two commit traces are compared event by
//! event. Trace handling lives in `rvdiff-trace`; this crate drives the
//! external tools and runs many tests in parallel.
//!
//! # Example
//!
//! ```ignore
//! use rvdiff::{ExternalTools, RunConfig, Scheduler};
//!
//! let config = RunConfig::default().with_jobs(8);
//! let scheduler = Scheduler::new(ExternalTools::new(config.clone()), config);
//! let summary = scheduler.run(&["asm.add".to_string()], |r| println!("{}", r.line()))?;
//! ```

pub mod config;
mod error;
pub mod image;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod steps;
pub mod task;

pub use config::{RunConfig, Simulator};
pub use error::{Error, Result};
pub use pipeline::{Comparison, TestStage, compare_logs, run_pipeline};
pub use scheduler::{Scheduler, TestResult, TestStatus, TestSummary, summary_line};
pub use steps::{ExternalTools, TestSteps};
pub use task::{TestCase, read_task_list};
