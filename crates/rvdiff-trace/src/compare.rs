//! Exact comparison of ISS and RTL commit sequences.

use std::fmt;
use std::io::{self, Write};

use tracing::debug;

use crate::{AddressSpace, Effect, TraceLog};

/// The comparable projection of an event: what committed, where, and its effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commit {
    pub pc: u32,
    pub instr: u32,
    pub effect: Effect,
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC={:08X}, INSTR={:08X}, MOD={}",
            self.pc, self.instr, self.effect
        )
    }
}

/// Which trace a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Iss,
    Rtl,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Iss => "ISS",
            Self::Rtl => "RTL",
        })
    }
}

/// First position where the two comparable sequences differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub index: usize,
    /// `None` when the ISS sequence ended before `index`.
    pub iss: Option<Commit>,
    /// `None` when the RTL sequence ended before `index`.
    pub rtl: Option<Commit>,
}

/// Conditions that do not fail a comparison but usually mean an upstream
/// tool produced nothing useful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictWarning {
    EmptyComparable(Side),
}

impl fmt::Display for VerdictWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyComparable(side) => {
                write!(f, "{side} trace has no comparable events")
            }
        }
    }
}

/// Result of comparing an ISS trace against an RTL trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Length of the ISS comparable sequence.
    pub iss_count: usize,
    /// Length of the RTL comparable sequence.
    pub rtl_count: usize,
    pub mismatch: Option<Mismatch>,
    pub warnings: Vec<VerdictWarning>,
}

impl Verdict {
    /// Both comparable sequences are exactly equal.
    pub const fn passed(&self) -> bool {
        self.mismatch.is_none()
    }

    /// Passed only because both sides were empty.
    pub fn is_suspicious(&self) -> bool {
        self.passed() && !self.warnings.is_empty()
    }

    /// Write the mismatch report appended to a test's simulation log.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "--- LOG MISMATCH DETAILS ---")?;
        writeln!(out, "ISS generated {} events.", self.iss_count)?;
        writeln!(out, "RTL generated {} events.", self.rtl_count)?;
        for warning in &self.warnings {
            writeln!(out, "Warning: {warning}.")?;
        }
        match &self.mismatch {
            Some(m) => {
                writeln!(out, "First mismatch at index {}:", m.index)?;
                writeln!(out, "  - ISS event: {}", DisplayCommit(m.iss.as_ref()))?;
                writeln!(out, "  - RTL event: {}", DisplayCommit(m.rtl.as_ref()))?;
            }
            None => writeln!(out, "No mismatch.")?,
        }
        Ok(())
    }
}

/// A commit, or `MISSING` for the side that ran out.
struct DisplayCommit<'a>(Option<&'a Commit>);

impl fmt::Display for DisplayCommit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(commit) => fmt::Display::fmt(commit, f),
            None => f.write_str("MISSING"),
        }
    }
}

/// Project a trace onto its comparable sequence.
///
/// Keeps events that have an effect and commit at or above the base.
pub fn comparable(log: &TraceLog, space: &AddressSpace) -> Vec<Commit> {
    log.iter()
        .filter(|e| e.effect.is_present() && space.is_program_pc(e.pc))
        .map(|e| Commit {
            pc: e.pc,
            instr: e.instr,
            effect: e.effect,
        })
        .collect()
}

/// Compare the comparable sequences of two traces.
///
/// Order- and length-sensitive: a shorter sequence that is a prefix of the
/// longer one still fails, at the index where the shorter one ends.
pub fn compare(iss: &TraceLog, rtl: &TraceLog, space: &AddressSpace) -> Verdict {
    let iss = comparable(iss, space);
    let rtl = comparable(rtl, space);

    let len = iss.len().max(rtl.len());
    let mismatch = (0..len)
        .map(|index| Mismatch {
            index,
            iss: iss.get(index).copied(),
            rtl: rtl.get(index).copied(),
        })
        .find(|m| m.iss != m.rtl);

    let mut warnings = Vec::new();
    if iss.is_empty() {
        warnings.push(VerdictWarning::EmptyComparable(Side::Iss));
    }
    if rtl.is_empty() {
        warnings.push(VerdictWarning::EmptyComparable(Side::Rtl));
    }

    debug!(
        iss = iss.len(),
        rtl = rtl.len(),
        mismatch = ?mismatch.map(|m| m.index),
        "compared traces"
    );
    Verdict {
        iss_count: iss.len(),
        rtl_count: rtl.len(),
        mismatch,
        warnings,
    }
}
