//! Reconstruction of stores the RTL testbench logs as two partial writes.
//!
//! A misaligned word store crosses a word boundary, and the testbench
//! observes it as two consecutive commit lines with the same `pc` and
//! `instr`, each carrying the part of the value that landed in one word.

use thiserror::Error;
use tracing::debug;

use crate::{AddressSpace, Effect, Event, TraceLog};

/// Why a candidate pair could not be merged. The pair is kept as-is.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAmbiguity {
    #[error("both events must be memory writes")]
    NotMemoryWrite,
    #[error("events belong to different commits")]
    DifferentCommit,
    #[error("word-aligned store at 0x{0:08x} cannot be split")]
    Aligned(u32),
    #[error("second write at 0x{second:08x} is not adjacent to 0x{first:08x}")]
    NotAdjacent { first: u32, second: u32 },
    #[error("{0} same-commit writes in a row, expected two")]
    RunTooLong(usize),
}

/// Result of a merge pass.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged trace (a new sequence; the input is untouched).
    pub log: TraceLog,
    /// Pairs folded into a single word write.
    pub merged: usize,
    /// Candidate pairs left unmerged.
    pub unmerged: usize,
    /// Termination sentinel writes removed.
    pub sentinels_removed: usize,
}

/// Merge two halves of a split store into one word write.
///
/// With `alignment = first.address % 4`, the low `4 - alignment` bytes of the
/// result come from `first` and the remaining high bytes from the low bytes
/// of `second`. Address and position are taken from `first`.
pub fn merge_pair(first: &Event, second: &Event) -> Result<Event, MergeAmbiguity> {
    let (Some((address, low_half)), Some((second_address, high_half))) =
        (first.effect.memory_write(), second.effect.memory_write())
    else {
        return Err(MergeAmbiguity::NotMemoryWrite);
    };
    if first.pc != second.pc || first.instr != second.instr {
        return Err(MergeAmbiguity::DifferentCommit);
    }

    let alignment = address % 4;
    if alignment == 0 {
        return Err(MergeAmbiguity::Aligned(address));
    }
    let next_word = (address & !3).wrapping_add(4);
    if second_address != address && second_address & !3 != next_word {
        return Err(MergeAmbiguity::NotAdjacent {
            first: address,
            second: second_address,
        });
    }

    // alignment is 1..=3, so both shifts stay within 8..=24 bits.
    let low_bits = (4 - alignment) * 8;
    let high_bits = alignment * 8;
    let low = low_half & ((1u32 << low_bits) - 1);
    let high = high_half & ((1u32 << high_bits) - 1);

    Ok(Event::new(
        first.seq,
        first.pc,
        first.instr,
        Effect::MemoryWrite {
            address,
            value: (high << low_bits) | low,
        },
    ))
}

/// Whether two adjacent events are memory writes from the same commit.
fn same_commit_write(a: &Event, b: &Event) -> bool {
    matches!(a.effect, Effect::MemoryWrite { .. })
        && matches!(b.effect, Effect::MemoryWrite { .. })
        && a.pc == b.pc
        && a.instr == b.instr
}

/// Length of the run of same-commit memory writes starting at `events[0]`.
fn run_length(events: &[Event]) -> usize {
    events
        .windows(2)
        .take_while(|w| same_commit_write(&w[0], &w[1]))
        .count()
        + 1
}

/// Drop termination sentinels, then merge split stores left to right.
///
/// Only a run of exactly two same-commit writes is a candidate. Longer runs
/// and pairs that fail [`merge_pair`] are emitted unchanged, so running the
/// pass on its own output changes nothing.
pub fn merge_split_writes(log: &TraceLog, space: &AddressSpace) -> MergeOutcome {
    let events: Vec<Event> = log
        .iter()
        .filter(|e| !space.is_sentinel(&e.effect))
        .copied()
        .collect();
    let sentinels_removed = log.len() - events.len();

    let mut out = Vec::with_capacity(events.len());
    let mut merged = 0usize;
    let mut unmerged = 0usize;
    let mut i = 0;

    while i < events.len() {
        let run = &events[i..i + run_length(&events[i..])];
        let result = match run {
            [single] => {
                out.push(*single);
                i += 1;
                continue;
            }
            [first, second] => merge_pair(first, second),
            _ => Err(MergeAmbiguity::RunTooLong(run.len())),
        };
        match result {
            Ok(event) => {
                out.push(event);
                merged += 1;
            }
            Err(reason) => {
                unmerged += 1;
                debug!(pc = format_args!("0x{:08x}", run[0].pc), %reason, "split write left unmerged");
                out.extend_from_slice(run);
            }
        }
        i += run.len();
    }

    debug!(merged, unmerged, sentinels_removed, "merged split writes");
    MergeOutcome {
        log: TraceLog::new(log.format(), out),
        merged,
        unmerged,
        sentinels_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reg, TraceFormat};

    fn store(seq: usize, pc: u32, instr: u32, address: u32, value: u32) -> Event {
        Event::new(seq, pc, instr, Effect::MemoryWrite { address, value })
    }

    fn reg_write(seq: usize, pc: u32, value: u32) -> Event {
        Event::new(
            seq,
            pc,
            0x0000_0513,
            Effect::RegisterWrite {
                reg: Reg::new(10).unwrap(),
                value,
            },
        )
    }

    fn rtl(events: Vec<Event>) -> TraceLog {
        TraceLog::new(TraceFormat::Rtl, events)
    }

    #[test]
    fn test_merge_pair_halfword_aligned() {
        let a = store(4, 0x1000, 0xabcd, 0x1002, 0x0000_cafe);
        let b = store(5, 0x1000, 0xabcd, 0x1002, 0x0000_beef);
        let merged = merge_pair(&a, &b).unwrap();
        assert_eq!(merged.seq, 4);
        assert_eq!(
            merged.effect,
            Effect::MemoryWrite {
                address: 0x1002,
                value: 0xbeef_cafe
            }
        );
    }

    #[test]
    fn test_merge_pair_byte_offsets() {
        // Offset 1: three low bytes from the first write, one from the second.
        let a = store(0, 0x100, 0x1, 0x2001, 0x00aa_bbcc);
        let b = store(1, 0x100, 0x1, 0x2004, 0x0000_00dd);
        assert_eq!(
            merge_pair(&a, &b).unwrap().effect.memory_write(),
            Some((0x2001, 0xddaa_bbcc))
        );

        // Offset 3: one low byte from the first write, three from the second.
        let a = store(0, 0x100, 0x1, 0x2003, 0x0000_00cc);
        let b = store(1, 0x100, 0x1, 0x2004, 0x00dd_eeff);
        assert_eq!(
            merge_pair(&a, &b).unwrap().effect.memory_write(),
            Some((0x2003, 0xddee_ffcc))
        );
    }

    #[test]
    fn test_merge_pair_rejections() {
        let a = store(0, 0x100, 0x1, 0x2000, 0x1);
        let b = store(1, 0x100, 0x1, 0x2000, 0x2);
        assert_eq!(merge_pair(&a, &b), Err(MergeAmbiguity::Aligned(0x2000)));

        let a = store(0, 0x100, 0x1, 0x2002, 0x1);
        let b = store(1, 0x100, 0x1, 0x3000, 0x2);
        assert_eq!(
            merge_pair(&a, &b),
            Err(MergeAmbiguity::NotAdjacent {
                first: 0x2002,
                second: 0x3000
            })
        );

        let b = store(1, 0x104, 0x1, 0x2002, 0x2);
        assert_eq!(merge_pair(&a, &b), Err(MergeAmbiguity::DifferentCommit));

        let r = reg_write(1, 0x100, 0x2);
        assert_eq!(merge_pair(&a, &r), Err(MergeAmbiguity::NotMemoryWrite));
    }

    #[test]
    fn test_merge_split_writes_folds_pair() {
        let log = rtl(vec![
            reg_write(0, 0x0ffc, 1),
            store(1, 0x1000, 0xabcd, 0x1002, 0x0000_cafe),
            store(2, 0x1000, 0xabcd, 0x1002, 0x0000_beef),
            reg_write(3, 0x1004, 2),
        ]);
        let outcome = merge_split_writes(&log, &AddressSpace::default());
        assert_eq!(outcome.merged, 1);
        assert_eq!(outcome.unmerged, 0);
        assert_eq!(outcome.log.len(), 3);
        assert_eq!(
            outcome.log.events()[1].effect.memory_write(),
            Some((0x1002, 0xbeef_cafe))
        );
        // Input untouched.
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_merge_split_writes_leaves_ambiguous_pair() {
        let log = rtl(vec![
            store(0, 0x1000, 0xabcd, 0x1000, 0x1111_1111),
            store(1, 0x1000, 0xabcd, 0x1000, 0x2222_2222),
        ]);
        let outcome = merge_split_writes(&log, &AddressSpace::default());
        assert_eq!(outcome.merged, 0);
        assert_eq!(outcome.unmerged, 1);
        assert_eq!(outcome.log, log);
    }

    #[test]
    fn test_merge_split_writes_ignores_distinct_commits() {
        let log = rtl(vec![
            store(0, 0x1000, 0xabcd, 0x1002, 0x1),
            store(1, 0x1004, 0xabcd, 0x1002, 0x2),
        ]);
        let outcome = merge_split_writes(&log, &AddressSpace::default());
        assert_eq!(outcome.merged, 0);
        assert_eq!(outcome.unmerged, 0);
        assert_eq!(outcome.log, log);
    }

    #[test]
    fn test_merge_split_writes_is_idempotent() {
        let log = rtl(vec![
            store(0, 0x1000, 0xabcd, 0x1002, 0x0000_cafe),
            store(1, 0x1000, 0xabcd, 0x1002, 0x0000_beef),
            store(2, 0x1008, 0x1234, 0x2001, 0x00aa_bbcc),
            store(3, 0x1008, 0x1234, 0x2004, 0x0000_00dd),
            store(4, 0x100c, 0x1234, 0x2000, 0x1),
            store(5, 0x100c, 0x1234, 0x2000, 0x2),
            reg_write(6, 0x1010, 3),
            store(7, 0x1014, 0xabcd, 0x1002, 0x0000_cafe),
            store(8, 0x1014, 0xabcd, 0x1002, 0x0000_beef),
            store(9, 0x1014, 0xabcd, 0x1002, 0x0000_1234),
        ]);
        let space = AddressSpace::default();
        let first = merge_split_writes(&log, &space);
        assert_eq!(first.merged, 2);
        assert_eq!(first.unmerged, 2);
        let once = first.log;
        let twice = merge_split_writes(&once, &space);
        assert_eq!(twice.merged, 0);
        assert_eq!(twice.log, once);
    }

    #[test]
    fn test_merge_split_writes_keeps_long_run() {
        let log = rtl(vec![
            store(0, 0x1000, 0xabcd, 0x1002, 0x0000_cafe),
            store(1, 0x1000, 0xabcd, 0x1002, 0x0000_beef),
            store(2, 0x1000, 0xabcd, 0x1002, 0x0000_1234),
            reg_write(3, 0x1004, 1),
        ]);
        let outcome = merge_split_writes(&log, &AddressSpace::default());
        assert_eq!(outcome.merged, 0);
        assert_eq!(outcome.unmerged, 1);
        assert_eq!(outcome.log, log);
    }

    #[test]
    fn test_merge_split_writes_removes_sentinels() {
        let sentinel = |seq| store(seq, 0x8000_0100, 0x00f5_2023, 0x1000_0000, 0xdead_beef);
        let log = rtl(vec![
            reg_write(0, 0x8000_0000, 1),
            sentinel(1),
            reg_write(2, 0x8000_0004, 2),
            sentinel(3),
        ]);

        let extended = merge_split_writes(&log, &AddressSpace::for_test("asm.mac_dot"));
        assert_eq!(extended.sentinels_removed, 2);
        assert_eq!(extended.log.len(), 2);
        assert!(extended.log.iter().all(|e| e.effect.memory_write().is_none()));

        let legacy = merge_split_writes(&log, &AddressSpace::for_test("asm.add"));
        assert_eq!(legacy.sentinels_removed, 0);
        assert_eq!(legacy.log.len(), 4);
    }
}
