//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rvdiff::Simulator;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "rvdiff")]
#[command(about = "Compare RTL commit traces against a reference ISS")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Debug logging; also keeps mismatch reports for passing tests
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run tests end to end
    Run(RunArgs),
    /// Merge and compare two existing trace files
    Compare {
        /// ISS trace (Spike commit log or column format)
        #[arg(long, value_name = "FILE")]
        iss: PathBuf,

        /// RTL testbench trace
        #[arg(long, value_name = "FILE")]
        rtl: PathBuf,

        /// Test name, used to pick the memory layout
        #[arg(long, default_value = "asm.test")]
        name: String,

        /// Write the merged RTL trace here
        #[arg(long, value_name = "FILE")]
        merged: Option<PathBuf>,
    },
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("tests").required(true).args(["name", "tasks"])))]
pub struct RunArgs {
    /// Single test to run (e.g. asm.add)
    #[arg(short = 'n', long = "name", value_name = "TEST")]
    pub name: Option<String>,

    /// File with one test name per line
    #[arg(short = 't', long = "tasks", value_name = "FILE")]
    pub tasks: Option<PathBuf>,

    /// RTL simulator
    #[arg(short, long, value_enum, default_value = "verilator")]
    pub simulator: SimulatorArg,

    /// objdump used to size the Spike run
    #[arg(long)]
    pub objdump: Option<PathBuf>,

    /// Cross toolchain prefix
    #[arg(long, default_value = rvdiff::config::DEFAULT_TOOLCHAIN)]
    pub toolchain: String,

    /// Root of the per-test work directories
    #[arg(long, default_value = "work")]
    pub work_dir: PathBuf,

    /// Root of the test sources
    #[arg(long, default_value = "tests")]
    pub tests_dir: PathBuf,

    /// Number of parallel tests (0 = auto)
    #[arg(short = 'j', long, default_value = "0")]
    pub jobs: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SimulatorArg {
    Verilator,
    Xsim,
}

impl From<SimulatorArg> for Simulator {
    fn from(arg: SimulatorArg) -> Self {
        match arg {
            SimulatorArg::Verilator => Self::Verilator,
            SimulatorArg::Xsim => Self::Xsim,
        }
    }
}
