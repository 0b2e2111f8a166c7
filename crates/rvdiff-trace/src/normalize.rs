//! Raw commit log text to canonical event sequences.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::{AddressSpace, Effect, Event, IssLine, Result, RtlLine, TraceError, TraceFormat, TraceLog};

/// Normalize a raw commit log into an ordered event sequence.
///
/// Lines that do not tokenize as a commit record are skipped. ISS records
/// below the address-space base are bootstrap code and dropped here; ISS
/// records without a register write are kept with `Effect::None`.
///
/// Fails with [`TraceError::EmptyTrace`] only when no line of the input is a
/// commit record at all.
pub fn normalize(text: &str, format: TraceFormat, space: &AddressSpace) -> Result<TraceLog> {
    let mut events = Vec::new();
    let mut records = 0usize;
    let mut skipped = 0usize;
    let mut bootstrap = 0usize;

    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((pc, instr, effect)) = tokenize(line, format) else {
            skipped += 1;
            trace!(format = %format, line = lineno + 1, "skipping unparsable line");
            continue;
        };
        records += 1;

        if format == TraceFormat::Iss && !space.is_program_pc(pc) {
            bootstrap += 1;
            continue;
        }
        events.push(Event::new(events.len(), pc, instr, effect));
    }

    if records == 0 {
        return Err(TraceError::EmptyTrace { format });
    }

    debug!(
        format = %format,
        events = events.len(),
        skipped,
        bootstrap,
        "normalized trace"
    );
    Ok(TraceLog::new(format, events))
}

/// Read and normalize a commit log file.
///
/// Invalid UTF-8 (simulators occasionally dump raw bytes to the same
/// stream) is replaced rather than rejected.
pub fn normalize_file(path: &Path, format: TraceFormat, space: &AddressSpace) -> Result<TraceLog> {
    let bytes = fs::read(path)?;
    normalize(&String::from_utf8_lossy(&bytes), format, space)
}

fn tokenize(line: &str, format: TraceFormat) -> Option<(u32, u32, Effect)> {
    match format {
        TraceFormat::Iss => IssLine::parse(line).map(|rec| (rec.pc, rec.instr, rec.effect())),
        TraceFormat::Rtl => RtlLine::parse(line).map(|rec| (rec.pc, rec.instr, rec.effect)),
    }
}
