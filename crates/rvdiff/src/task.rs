//! Test identities and task lists.

use std::fs;
use std::path::{Path, PathBuf};

use rvdiff_trace::{AddressSpace, MemoryRegime};

use crate::{Error, Result};

/// Source language of a test, chosen by its suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Assembly,
    C,
}

impl SourceLanguage {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Assembly => "s",
            Self::C => "c",
        }
    }
}

/// A test named `<suite>.<stem>`, e.g. `asm.add` or `c.mac_dot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    name: String,
    suite: String,
    stem: String,
    space: AddressSpace,
}

impl TestCase {
    /// Parse a dotted test name.
    ///
    /// Extra dots stay in the stem.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        let Some((suite, stem)) = name.split_once('.') else {
            return Err(Error::InvalidTestName(name.to_string()));
        };
        if suite.is_empty() || stem.is_empty() {
            return Err(Error::InvalidTestName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            suite: suite.to_string(),
            stem: stem.to_string(),
            space: AddressSpace::for_test(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub const fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub const fn regime(&self) -> MemoryRegime {
        self.space.regime
    }

    pub fn language(&self) -> SourceLanguage {
        if self.suite == "asm" {
            SourceLanguage::Assembly
        } else {
            SourceLanguage::C
        }
    }

    /// Directory holding the suite's sources.
    pub fn suite_dir(&self, tests_dir: &Path) -> PathBuf {
        tests_dir.join(&self.suite)
    }

    /// The test's main source file.
    pub fn source(&self, tests_dir: &Path) -> PathBuf {
        self.suite_dir(tests_dir)
            .join(format!("{}.{}", self.stem, self.language().extension()))
    }

    /// Optional initial data memory contents for the legacy simulator.
    pub fn data_file(&self, tests_dir: &Path) -> PathBuf {
        self.suite_dir(tests_dir).join(format!("{}.mem", self.stem))
    }

    /// Per-test work directory.
    pub fn work_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}

/// Parse a task list: one test name per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_task_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a task list file.
pub fn read_task_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|source| Error::TaskList {
        path: path.to_path_buf(),
        source,
    })?;
    let tests = parse_task_list(&text);
    if tests.is_empty() {
        return Err(Error::EmptyTaskList);
    }
    Ok(tests)
}
