//! Scripted pipeline steps for scheduler tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rvdiff::steps::artifacts;
use rvdiff::{Error, Result, TestCase, TestStage, TestSteps};

/// What one fake test produces.
#[derive(Clone, Default)]
pub struct Script {
    pub iss: String,
    pub rtl: String,
    /// Stage whose step returns an error.
    pub fail_at: Option<TestStage>,
    /// Stage whose step panics.
    pub panic_at: Option<TestStage>,
    /// Skip writing the RTL trace.
    pub no_rtl_log: bool,
}

impl Script {
    pub fn traces(iss: &str, rtl: &str) -> Self {
        Self {
            iss: iss.to_string(),
            rtl: rtl.to_string(),
            ..Self::default()
        }
    }

    pub fn failing_at(stage: TestStage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn panicking_at(stage: TestStage) -> Self {
        Self {
            panic_at: Some(stage),
            ..Self::default()
        }
    }
}

/// `TestSteps` that writes scripted traces instead of running tools.
#[derive(Default)]
pub struct FakeSteps {
    scripts: HashMap<String, Script>,
}

impl FakeSteps {
    pub fn with(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    fn script(&self, test: &TestCase) -> Script {
        self.scripts.get(test.name()).cloned().unwrap_or_default()
    }

    fn step(&self, test: &TestCase, stage: TestStage) -> Result<Script> {
        let script = self.script(test);
        if script.panic_at == Some(stage) {
            panic!("scripted panic in {stage}");
        }
        if script.fail_at == Some(stage) {
            return Err(Error::ToolNotFound(format!("fake-{stage}")));
        }
        Ok(script)
    }
}

impl TestSteps for FakeSteps {
    fn compile(&self, test: &TestCase, dir: &Path) -> Result<()> {
        self.step(test, TestStage::Compiling)?;
        fs::write(dir.join(artifacts::ELF), b"\x7fELF")?;
        Ok(())
    }

    fn run_iss(&self, test: &TestCase, dir: &Path) -> Result<PathBuf> {
        let script = self.step(test, TestStage::SimulatingIss)?;
        let log = dir.join(artifacts::ISS_LOG);
        fs::write(&log, script.iss)?;
        Ok(log)
    }

    fn build_memory_image(&self, test: &TestCase, dir: &Path) -> Result<()> {
        self.step(test, TestStage::BuildingMemoryImage)?;
        fs::write(dir.join(artifacts::IMEM_HEX), "00000013\n")?;
        Ok(())
    }

    fn run_rtl(&self, test: &TestCase, dir: &Path) -> Result<PathBuf> {
        let script = self.step(test, TestStage::SimulatingRtl)?;
        fs::write(dir.join(artifacts::SIM_LOG), "simulation done\n")?;
        let log = dir.join(artifacts::RTL_LOG);
        if !script.no_rtl_log {
            fs::write(&log, script.rtl)?;
        }
        Ok(log)
    }
}

pub const LEGACY_ISS: &str = "\
0x00100000;0x00a00513;li a0,10;x10=0x0000000a
0x00100004;0x00150513;addi a0,a0,1;x10=0x0000000b
0x00100008;0x00a12023;sw a0,0(sp);
";

pub const LEGACY_RTL: &str = "\
0;0x00100000;0x00a00513;x10=0x0000000a
1;0x00100004;0x00150513;x10=0x0000000b
2;0x00100008;0x00a12023;
";

pub const LEGACY_RTL_BAD: &str = "\
0;0x00100000;0x00a00513;x10=0x0000000a
1;0x00100004;0x00150513;x10=0x0000000c
";
