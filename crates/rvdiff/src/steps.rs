//! External pipeline steps: cross compiler, ISS and RTL simulator.
//!
//! Each step writes its artifacts into the test's work directory. Tool
//! output goes to a per-step log there, never to the console.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use rvdiff_trace::{LEGACY_BASE, MemoryRegime};
use tracing::debug;

use crate::config::{
    DEFAULT_INSTRUCTION_COUNT, DMEM_DEPTH, IMEM_DEPTH, RunConfig, SPIKE_EXTRA_INSTRUCTIONS,
    STACK_POINTER_INIT, Simulator,
};
use crate::image::{self, SectionHeader};
use crate::task::{SourceLanguage, TestCase};
use crate::{Error, Result};

/// Artifact names inside a test's work directory.
pub mod artifacts {
    pub const ELF: &str = "test.elf";
    pub const COMPILE_LOG: &str = "compile.log";
    pub const LINKER_SCRIPT: &str = "linker.ld";
    pub const SPIKE_LOG: &str = "spike.log";
    pub const ISS_LOG: &str = "iss.log";
    pub const TEXT_BIN: &str = "text.bin";
    pub const RODATA_BIN: &str = "rodata.bin";
    pub const IMEM_HEX: &str = "imem.hex";
    pub const DMEM_HEX: &str = "dmem.hex";
    pub const SIM_LOG: &str = "sim.log";
    pub const RTL_LOG: &str = "rtl.log";
    pub const RTL_MERGED_LOG: &str = "rtl.merged.log";
}

/// The externally executed steps of a test pipeline.
///
/// The pipeline owns merging and comparison; everything that needs a
/// collaborator process goes through this trait.
pub trait TestSteps: Send + Sync {
    /// Build `test.elf` from the test's sources.
    fn compile(&self, test: &TestCase, dir: &Path) -> Result<()>;

    /// Run the reference simulator. Returns the ISS trace path.
    fn run_iss(&self, test: &TestCase, dir: &Path) -> Result<PathBuf>;

    /// Write `imem.hex` and, when the ELF has read-only data, `dmem.hex`.
    fn build_memory_image(&self, test: &TestCase, dir: &Path) -> Result<()>;

    /// Run the RTL testbench. Returns the RTL trace path.
    fn run_rtl(&self, test: &TestCase, dir: &Path) -> Result<PathBuf>;
}

/// Linker script placing every section from `base` on.
pub fn linker_script(base: u32) -> String {
    format!(
        "ENTRY(_start)\nSECTIONS {{\n  . = 0x{base:x};\n  .text : {{ *(.text) }}\n  .rodata : {{ *(.rodata) }}\n  .data : {{ *(.data) }}\n  .bss : {{ *(.bss COMMON) }}\n}}"
    )
}

/// Find an executable.
///
/// Bare names are searched in `PATH`; anything with a directory part is
/// checked as a file.
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    })
}

fn tool_name(program: &OsStr) -> String {
    Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned()
}

fn invocation_error(tool: String, source: std::io::Error) -> Error {
    if source.kind() == std::io::ErrorKind::NotFound {
        Error::ToolNotFound(tool)
    } else {
        Error::ToolInvocation { tool, source }
    }
}

/// Run `cmd` with stdout and stderr appended to `log`.
fn run_logged(cmd: &mut Command, log: &File) -> Result<()> {
    let tool = tool_name(cmd.get_program());
    debug!(?cmd, "running {tool}");
    let status = cmd
        .stdin(Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log.try_clone()?)
        .status()
        .map_err(|source| invocation_error(tool.clone(), source))?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::ToolFailed { tool, status })
    }
}

/// Run `cmd` and return its stdout.
fn capture(cmd: &mut Command) -> Result<String> {
    let tool = tool_name(cmd.get_program());
    debug!(?cmd, "running {tool}");
    let output = cmd
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|source| invocation_error(tool.clone(), source))?;
    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool,
            status: output.status,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn require(what: &'static str, path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingArtifact { what, path })
    }
}

/// Production steps backed by the RISC-V toolchain and simulators.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    config: RunConfig,
}

impl ExternalTools {
    pub const fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    fn resolve(&self, program: &Path) -> PathBuf {
        if program.components().count() > 1 {
            self.config.project_path(program)
        } else {
            program.to_path_buf()
        }
    }

    /// Check that every tool the given tests need can be found.
    pub fn check_tools<'a>(&self, tests: impl IntoIterator<Item = &'a TestCase>) -> Result<()> {
        let mut required = vec![
            self.config.tool("gcc"),
            self.config.tool("objcopy"),
            self.config.objdump(),
            PathBuf::from(self.config.simulator.executable()),
        ];
        let (mut extended, mut legacy) = (false, false);
        for test in tests {
            match test.regime() {
                MemoryRegime::Extended => extended = true,
                MemoryRegime::Legacy => legacy = true,
            }
        }
        if extended {
            required.push(self.config.spike.clone());
        }
        if legacy {
            required.push(self.config.legacy_iss.clone());
        }

        for program in required {
            let resolved = self.resolve(&program);
            if find_executable(&resolved).is_none() {
                return Err(Error::ToolNotFound(program.display().to_string()));
            }
            debug!(tool = %resolved.display(), "found");
        }
        Ok(())
    }

    fn section_headers(&self, elf: &Path) -> Result<Vec<SectionHeader>> {
        let output = capture(Command::new(self.config.objdump()).arg("-h").arg(elf))?;
        Ok(image::parse_section_headers(&output))
    }

    fn extract_section(&self, elf: &Path, section: &str, out: &Path) -> Result<Vec<u8>> {
        capture(
            Command::new(self.config.tool("objcopy"))
                .args(["-O", "binary"])
                .arg(format!("--only-section={section}"))
                .arg(elf)
                .arg(out),
        )?;
        Ok(fs::read(out)?)
    }

    /// Static `.text` instruction count, used to bound the Spike run.
    fn static_instruction_count(&self, elf: &Path) -> usize {
        let count = capture(Command::new(self.config.objdump()).arg("-d").arg(elf))
            .map(|output| image::count_text_instructions(&output));
        match count {
            Ok(0) => DEFAULT_INSTRUCTION_COUNT,
            Ok(n) => n,
            Err(e) => {
                debug!("cannot count instructions: {e}");
                DEFAULT_INSTRUCTION_COUNT
            }
        }
    }

    fn run_spike(&self, dir: &Path, elf: &Path) -> Result<PathBuf> {
        let instructions = self.static_instruction_count(elf) + SPIKE_EXTRA_INSTRUCTIONS;
        debug!(instructions, "running spike");

        // Spike prints its commit log on stderr.
        let log = dir.join(artifacts::SPIKE_LOG);
        let file = File::create(&log)?;
        let mut cmd = Command::new(self.resolve(&self.config.spike));
        cmd.arg("--log-commits")
            .arg(format!("--instructions={instructions}"))
            .arg("--isa=rv32im")
            .arg(elf);
        let tool = tool_name(cmd.get_program());
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(file)
            .status()
            .map_err(|source| invocation_error(tool.clone(), source))?;
        if !status.success() {
            return Err(Error::ToolFailed { tool, status });
        }
        require("ISS trace", log)
    }

    fn run_legacy_iss(&self, test: &TestCase, dir: &Path, elf: &Path) -> Result<PathBuf> {
        let tests_dir = self.config.project_path(&self.config.tests_dir);
        let data = test.data_file(&tests_dir);
        let dmem = dir.join(artifacts::DMEM_HEX);
        let has_data = data.is_file();
        if has_data {
            fs::copy(&data, &dmem)?;
        }

        let log = dir.join(artifacts::ISS_LOG);
        let mut cmd = Command::new(self.resolve(&self.config.legacy_iss));
        cmd.arg(elf).arg("-o").arg(&log);
        if has_data {
            cmd.arg("-m").arg(&dmem);
        }
        let tool = tool_name(cmd.get_program());
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| invocation_error(tool.clone(), source))?;
        if !status.success() {
            return Err(Error::ToolFailed { tool, status });
        }
        require("ISS trace", log)
    }

    /// `(define, value)` pairs handed to the testbench build.
    fn testbench_defines(test: &TestCase, imem: &Path, dmem: Option<&Path>) -> Vec<(&'static str, String)> {
        let quoted = |path: Option<&Path>| match path {
            Some(p) => format!("\"{}\"", p.display()),
            None => "\"\"".to_string(),
        };
        vec![
            ("ICCM_INIT_FILE", quoted(Some(imem))),
            ("RESET_VECTOR", format!("32'h{:x}", test.space().base)),
            (
                "STACK_POINTER_INIT_VALUE",
                format!("32'h{STACK_POINTER_INIT:x}"),
            ),
            ("DCCM_INIT_FILE", quoted(dmem)),
        ]
    }

    fn run_verilator(&self, test: &TestCase, dir: &Path, log: &File) -> Result<()> {
        let project = std::path::absolute(&self.config.project_dir)?;
        let dir = std::path::absolute(dir)?;
        let imem = dir.join(artifacts::IMEM_HEX);
        let dmem = Some(dir.join(artifacts::DMEM_HEX)).filter(|p| p.is_file());

        let mut build = Command::new("verilator");
        build
            .args(["--cc", "--trace", "--trace-structs", "--build", "--timing"])
            .args(["--top-module", "core_top_tb", "--exe"])
            .arg(project.join("dv/verilator/core_top_tb.cpp"))
            .arg("-f")
            .arg(project.join("rtl/core_top.flist"));
        for (name, value) in Self::testbench_defines(test, &imem, dmem.as_deref()) {
            build.arg(format!("-D{name}={value}"));
        }
        run_logged(build.current_dir(&dir).env("PROJ", &project), log)?;

        run_logged(
            Command::new("make")
                .args(["-j", "-C", "obj_dir", "-f", "Vcore_top_tb.mk", "Vcore_top_tb"])
                .current_dir(&dir)
                .env("PROJ", &project),
            log,
        )?;
        run_logged(
            Command::new(dir.join("obj_dir/Vcore_top_tb"))
                .current_dir(&dir)
                .env("PROJ", &project),
            log,
        )
    }

    fn run_xsim(&self, test: &TestCase, dir: &Path, log: &File) -> Result<()> {
        let project = std::path::absolute(&self.config.project_dir)?;
        let dmem = dir
            .join(artifacts::DMEM_HEX)
            .is_file()
            .then_some(Path::new(artifacts::DMEM_HEX));

        let mut elaborate = Command::new("xvlog");
        elaborate
            .arg("-sv")
            .arg("-f")
            .arg(project.join("rtl/core_top.flist"));
        for (name, value) in
            Self::testbench_defines(test, Path::new(artifacts::IMEM_HEX), dmem)
        {
            elaborate.arg("--define").arg(format!("{name}={value}"));
        }
        run_logged(elaborate.current_dir(dir).env("PROJ", &project), log)?;

        run_logged(
            Command::new("xelab")
                .args(["-top", "core_top_tb", "-snapshot", "sim", "--debug", "wave"])
                .current_dir(dir)
                .env("PROJ", &project),
            log,
        )?;
        run_logged(
            Command::new("xsim")
                .args(["sim", "--runall"])
                .current_dir(dir)
                .env("PROJ", &project),
            log,
        )
    }
}

impl TestSteps for ExternalTools {
    fn compile(&self, test: &TestCase, dir: &Path) -> Result<()> {
        let tests_dir = self.config.project_path(&self.config.tests_dir);
        let source = require("test source", test.source(&tests_dir))?;
        let suite_dir = test.suite_dir(&tests_dir);
        let elf = dir.join(artifacts::ELF);

        let mut cmd = Command::new(self.config.tool("gcc"));
        cmd.arg(format!("-I{}", suite_dir.display()))
            .args(["-march=rv32im", "-mabi=ilp32", "-nostdlib", "-o"])
            .arg(&elf);

        match test.regime() {
            MemoryRegime::Extended => {
                let script = dir.join(artifacts::LINKER_SCRIPT);
                fs::write(&script, linker_script(test.space().base))?;
                cmd.arg("-T").arg(script);
            }
            MemoryRegime::Legacy => {
                cmd.arg(format!("-Wl,-Ttext=0x{LEGACY_BASE:x}"));
            }
        }

        match test.language() {
            SourceLanguage::Assembly => {
                cmd.arg(source);
            }
            SourceLanguage::C => {
                let runtime = suite_dir.join("asm_functions");
                cmd.args(["-fno-builtin-printf", "-fno-common", "-falign-functions=4"])
                    .arg(source)
                    .arg(runtime.join("printf.s"))
                    .arg(runtime.join("eot_sequence.s"));
            }
        }

        let log = File::create(dir.join(artifacts::COMPILE_LOG))?;
        run_logged(&mut cmd, &log)?;
        require("ELF", elf)?;
        Ok(())
    }

    fn run_iss(&self, test: &TestCase, dir: &Path) -> Result<PathBuf> {
        let elf = require("ELF", dir.join(artifacts::ELF))?;
        match test.regime() {
            MemoryRegime::Extended => self.run_spike(dir, &elf),
            MemoryRegime::Legacy => self.run_legacy_iss(test, dir, &elf),
        }
    }

    fn build_memory_image(&self, test: &TestCase, dir: &Path) -> Result<()> {
        let elf = require("ELF", dir.join(artifacts::ELF))?;
        let headers = self.section_headers(&elf)?;

        if image::find_section(&headers, ".text").is_none() {
            return Err(Error::MissingArtifact {
                what: ".text section",
                path: elf,
            });
        }
        let text = self.extract_section(&elf, ".text", &dir.join(artifacts::TEXT_BIN))?;
        fs::write(
            dir.join(artifacts::IMEM_HEX),
            image::word_image(&text, IMEM_DEPTH),
        )?;

        if let Some(rodata) = image::find_section(&headers, ".rodata") {
            let bytes = self.extract_section(&elf, ".rodata", &dir.join(artifacts::RODATA_BIN))?;
            let offset = rodata.vma.saturating_sub(test.space().base) as usize;
            fs::write(
                dir.join(artifacts::DMEM_HEX),
                image::data_image(&bytes, offset, DMEM_DEPTH),
            )?;
            debug!(offset, len = bytes.len(), "placed .rodata");
        }
        Ok(())
    }

    fn run_rtl(&self, test: &TestCase, dir: &Path) -> Result<PathBuf> {
        let log = File::create(dir.join(artifacts::SIM_LOG))?;
        match self.config.simulator {
            Simulator::Verilator => self.run_verilator(test, dir, &log)?,
            Simulator::Xsim => self.run_xsim(test, dir, &log)?,
        }
        require("RTL trace", dir.join(artifacts::RTL_LOG))
    }
}
