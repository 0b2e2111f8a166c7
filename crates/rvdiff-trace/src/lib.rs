//! Commit-trace equivalence checking between an ISS and an RTL testbench.
//!
//! The reference simulator and the RTL testbench each write a commit log in
//! their own textual format. This crate turns both into one canonical event
//! model, stitches RTL stores that the testbench split across two lines back
//! into word writes, and compares the two event streams exactly.
//!
//! # Example
//!
//! ```ignore
//! use rvdiff_trace::{AddressSpace, TraceFormat, compare, merge_split_writes, normalize};
//!
//! let space = AddressSpace::for_test("asm.mac_dot");
//! let iss = normalize(&iss_text, TraceFormat::Iss, &space)?;
//! let rtl = normalize(&rtl_text, TraceFormat::Rtl, &space)?;
//! let rtl = merge_split_writes(&rtl, &space).log;
//! let verdict = compare(&iss, &rtl, &space);
//! assert!(verdict.passed());
//! ```

mod compare;
mod error;
mod event;
mod layout;
mod line;
mod merge;
mod normalize;

pub use compare::{Commit, Mismatch, Side, Verdict, VerdictWarning, compare, comparable};
pub use error::{Result, TraceError};
pub use event::{Effect, Event, Reg, TraceFormat, TraceLog};
pub use layout::{AddressSpace, EXTENDED_BASE, EXTENDED_PREFIX, LEGACY_BASE, MemoryRegime, Sentinel};
pub use line::{IssLine, RtlLine, parse_hex};
pub use merge::{MergeAmbiguity, MergeOutcome, merge_pair, merge_split_writes};
pub use normalize::{normalize, normalize_file};
