//! Run configuration.

use std::fmt;
use std::path::PathBuf;

/// Instruction memory image size in bytes.
pub const IMEM_DEPTH: usize = 1024;
/// Data memory image size in bytes.
pub const DMEM_DEPTH: usize = 1024;
/// Initial stack pointer handed to the RTL testbench.
pub const STACK_POINTER_INIT: u32 = 0x8000_0000;
/// Spike runs this many instructions past the static instruction count.
pub const SPIKE_EXTRA_INSTRUCTIONS: usize = 50;
/// Static instruction count used when objdump output cannot be counted.
pub const DEFAULT_INSTRUCTION_COUNT: usize = 500;

/// Default cross-compiler prefix.
pub const DEFAULT_TOOLCHAIN: &str = "riscv64-unknown-elf-";

/// RTL simulator used for the device under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Simulator {
    #[default]
    Verilator,
    Xsim,
}

impl Simulator {
    /// Executable probed for at startup.
    pub const fn executable(self) -> &'static str {
        match self {
            Self::Verilator => "verilator",
            Self::Xsim => "xvlog",
        }
    }
}

impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Verilator => "verilator",
            Self::Xsim => "xsim",
        })
    }
}

/// Configuration for a regression run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Project root holding `rtl/`, `dv/` and `tools/`.
    pub project_dir: PathBuf,
    /// Root of the per-test work directories.
    pub work_dir: PathBuf,
    /// Root of the test sources, one subdirectory per suite.
    pub tests_dir: PathBuf,
    pub simulator: Simulator,
    /// Cross toolchain prefix (e.g. "riscv64-unknown-elf-").
    pub toolchain: String,
    /// Explicit objdump; derived from the toolchain prefix when unset.
    pub objdump: Option<PathBuf>,
    pub spike: PathBuf,
    /// Legacy instruction set simulator.
    pub legacy_iss: PathBuf,
    /// Worker threads (0 = logical CPUs).
    pub jobs: usize,
    /// Append the comparison report to `sim.log` for passing tests too.
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            work_dir: PathBuf::from("work"),
            tests_dir: PathBuf::from("tests"),
            simulator: Simulator::default(),
            toolchain: DEFAULT_TOOLCHAIN.to_string(),
            objdump: None,
            spike: PathBuf::from("spike"),
            legacy_iss: PathBuf::from("tools/riscv_sim"),
            jobs: 0,
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Set the project root. Relative tool and test paths resolve against it.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_tests_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tests_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn with_simulator(mut self, simulator: Simulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn with_toolchain(mut self, prefix: impl Into<String>) -> Self {
        self.toolchain = prefix.into();
        self
    }

    pub fn with_objdump(mut self, objdump: impl Into<PathBuf>) -> Self {
        self.objdump = Some(objdump.into());
        self
    }

    pub fn with_spike(mut self, spike: impl Into<PathBuf>) -> Self {
        self.spike = spike.into();
        self
    }

    pub fn with_legacy_iss(mut self, iss: impl Into<PathBuf>) -> Self {
        self.legacy_iss = iss.into();
        self
    }

    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Number of worker threads to use.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    /// Toolchain binary with the configured prefix (e.g. `gcc`, `objcopy`).
    pub fn tool(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("{}{name}", self.toolchain))
    }

    pub fn objdump(&self) -> PathBuf {
        self.objdump.clone().unwrap_or_else(|| self.tool("objdump"))
    }

    /// Resolve a path against the project root.
    pub fn project_path(&self, path: impl AsRef<std::path::Path>) -> PathBuf {
        self.project_dir.join(path)
    }
}
