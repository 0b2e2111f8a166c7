//! Line tokenizers for the two commit-log formats.
//!
//! Each raw line is turned into a typed record exactly once; everything
//! downstream works on the records.

use std::sync::OnceLock;

use regex::Regex;

use crate::{Effect, Reg};

/// Parse a hex number with optional `0x` prefix into 32 bits.
///
/// Sign-extended 64-bit values (as printed by RV64 builds of Spike for
/// 32-bit quantities) are narrowed; anything else wider than 32 bits is
/// rejected.
pub fn parse_hex(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.len() > 16 {
        return None;
    }
    let wide = u64::from_str_radix(digits, 16).ok()?;
    let high = wide >> 32;
    let low = u32::try_from(wide & 0xffff_ffff).ok()?;
    match high {
        0 => Some(low),
        0xffff_ffff if low & 0x8000_0000 != 0 => Some(low),
        _ => None,
    }
}

/// Parse an effect column such as `x10=0x0000000a` or `mem[0x1002]=0xcafe`.
///
/// An empty column is `Effect::None`; unrecognised text is `None`.
fn parse_effect_column(text: &str) -> Option<Effect> {
    let text = text.trim();
    if text.is_empty() {
        return Some(Effect::None);
    }
    if let Some(rest) = text.strip_prefix("mem[") {
        let (address, value) = rest.split_once("]=")?;
        return Some(Effect::MemoryWrite {
            address: parse_hex(address)?,
            value: parse_hex(value)?,
        });
    }
    let (name, value) = text.split_once('=')?;
    Some(Effect::RegisterWrite {
        reg: Reg::parse(name)?,
        value: parse_hex(value)?,
    })
}

/// One commit record of the reference simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssLine<'a> {
    pub pc: u32,
    pub instr: u32,
    /// Register write found in the record, if any.
    pub write: Option<(Reg, u32)>,
    /// Remaining free text with the register write stripped.
    pub mnemonic: &'a str,
}

impl<'a> IssLine<'a> {
    /// Tokenize an ISS line.
    ///
    /// Accepts Spike's `--log-commits` output:
    /// - `core   0: 3 0x<PC> (0x<INSTR>) [<reg> 0x<VALUE>] [mem 0x<ADDR> [0x<VAL>]]`
    ///
    /// and the pre-normalized log written by the legacy ISS:
    /// - `0x<PC>;0x<INSTR>;<mnemonic>[;<reg>=0x<VALUE>]`
    ///
    /// Memory accesses are never extracted; the reference log only records
    /// register-file mutations.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.starts_with("core") {
            Self::parse_spike(line)
        } else if line.starts_with("0x") && line.contains(';') {
            Self::parse_columns(line)
        } else {
            None
        }
    }

    fn parse_spike(line: &'a str) -> Option<Self> {
        let commit = COMMIT_PATTERN.get_or_init(|| {
            Regex::new(r"^core\s+\d+:\s+(?:\d+\s+)?0x([0-9a-fA-F]+)\s+\(0x([0-9a-fA-F]+)\)(.*)$")
                .unwrap()
        });
        let caps = commit.captures(line)?;
        let pc = parse_hex(caps.get(1)?.as_str())?;
        let instr = parse_hex(caps.get(2)?.as_str())?;
        let remainder = caps.get(3)?.as_str();

        // First `<name> 0x<value>` pair whose name is a register.
        // CSR writes (`c773_mtvec 0x...`) and `mem 0x...` are not.
        let write_pattern = WRITE_PATTERN.get_or_init(|| {
            Regex::new(r"(?:^|\s)([A-Za-z][A-Za-z0-9]*)\s+0x([0-9a-fA-F]+)").unwrap()
        });
        for caps in write_pattern.captures_iter(remainder) {
            let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(reg) = Reg::parse(name.as_str()) else {
                continue;
            };
            let Some(value) = parse_hex(value.as_str()) else {
                continue;
            };
            return Some(Self {
                pc,
                instr,
                write: Some((reg, value)),
                mnemonic: remainder[..name.start()].trim(),
            });
        }

        Some(Self {
            pc,
            instr,
            write: None,
            mnemonic: remainder.trim(),
        })
    }

    fn parse_columns(line: &'a str) -> Option<Self> {
        let mut fields = line.split(';');
        let pc = parse_hex(fields.next()?)?;
        let instr = parse_hex(fields.next()?)?;
        let mnemonic = fields.next().unwrap_or("").trim();
        let write = match fields.next().map(parse_effect_column) {
            None | Some(Some(Effect::None | Effect::MemoryWrite { .. })) => None,
            Some(Some(Effect::RegisterWrite { reg, value })) => Some((reg, value)),
            Some(None) => return None,
        };
        Some(Self {
            pc,
            instr,
            write,
            mnemonic,
        })
    }

    pub fn effect(&self) -> Effect {
        self.write
            .map_or(Effect::None, |(reg, value)| Effect::RegisterWrite { reg, value })
    }
}

/// One commit record of the RTL testbench: `<index>;<pc>;<instr>;<effect>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtlLine<'a> {
    /// Index column as printed by the testbench. Its radix varies between
    /// testbenches and it never decides whether a line parses.
    pub index: &'a str,
    pub pc: u32,
    pub instr: u32,
    pub effect: Effect,
}

impl<'a> RtlLine<'a> {
    /// Tokenize an RTL line. The effect column is classified by its
    /// leading token: `mem[` is a store, anything else must be `<reg>=<hex>`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut fields = line.trim().split(';');
        let index = fields.next()?.trim();
        let pc = parse_hex(fields.next()?)?;
        let instr = parse_hex(fields.next()?)?;
        let effect = parse_effect_column(fields.next().unwrap_or(""))?;
        Some(Self {
            index,
            pc,
            instr,
            effect,
        })
    }
}

static COMMIT_PATTERN: OnceLock<Regex> = OnceLock::new();
static WRITE_PATTERN: OnceLock<Regex> = OnceLock::new();
