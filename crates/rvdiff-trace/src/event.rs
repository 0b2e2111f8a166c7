//! Canonical commit event model.

use std::fmt;

/// ABI mnemonics indexed by register number.
const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// Integer register, identified by its index.
///
/// Parses both `xN` and ABI mnemonics, always displays as `xN` so that
/// traces naming registers differently still compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(u8);

impl Reg {
    /// Create a register from its index (0..=31).
    pub const fn new(index: u8) -> Option<Self> {
        if index < 32 { Some(Self(index)) } else { None }
    }

    /// Register index.
    pub const fn index(self) -> u8 {
        self.0
    }

    /// ABI mnemonic (e.g. `a0` for x10).
    pub const fn abi_name(self) -> &'static str {
        ABI_NAMES[self.0 as usize]
    }

    /// Parse `xN`, `fp`, or an ABI mnemonic, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(digits) = name.strip_prefix(['x', 'X']) {
            if (1..=2).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
                return digits.parse::<u8>().ok().and_then(Self::new);
            }
        }
        if name.eq_ignore_ascii_case("fp") {
            return Some(Self(8));
        }
        ABI_NAMES
            .iter()
            .position(|abi| abi.eq_ignore_ascii_case(name))
            .and_then(|i| u8::try_from(i).ok())
            .map(Self)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Architectural effect of one committed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Effect {
    RegisterWrite { reg: Reg, value: u32 },
    MemoryWrite { address: u32, value: u32 },
    /// No observable architectural effect.
    #[default]
    None,
}

impl Effect {
    /// Whether the effect is observable (anything but `None`).
    pub const fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Memory write target and value, if this is a store.
    pub const fn memory_write(&self) -> Option<(u32, u32)> {
        match *self {
            Self::MemoryWrite { address, value } => Some((address, value)),
            _ => None,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegisterWrite { reg, value } => write!(f, "{reg}={value:08X}"),
            Self::MemoryWrite { address, value } => write!(f, "mem[{address:08X}]={value:08X}"),
            Self::None => Ok(()),
        }
    }
}

/// One committed instruction.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// Position in the trace (retirement order).
    pub seq: usize,
    /// Program counter of the committed instruction.
    pub pc: u32,
    /// Raw instruction encoding.
    pub instr: u32,
    pub effect: Effect,
}

impl Event {
    pub const fn new(seq: usize, pc: u32, instr: u32, effect: Effect) -> Self {
        Self { seq, pc, instr, effect }
    }
}

// `seq` is a per-trace position and never part of identity.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.pc == other.pc && self.instr == other.instr && self.effect == other.effect
    }
}

impl Eq for Event {}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} pc={:08X} instr={:08X}", self.seq, self.pc, self.instr)?;
        if self.effect.is_present() {
            write!(f, " {}", self.effect)?;
        }
        Ok(())
    }
}

/// Source format of a commit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceFormat {
    /// Reference instruction-set simulator.
    Iss,
    /// RTL testbench.
    Rtl,
}

impl TraceFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iss => "ISS",
            Self::Rtl => "RTL",
        }
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered events from one source for one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLog {
    format: TraceFormat,
    events: Vec<Event>,
}

impl TraceLog {
    pub const fn new(format: TraceFormat, events: Vec<Event>) -> Self {
        Self { format, events }
    }

    pub const fn format(&self) -> TraceFormat {
        self.format
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Render in the RTL column layout (`seq;pc;instr;effect`).
    ///
    /// Used to persist the merged RTL trace next to the raw one.
    pub fn to_rtl_text(&self) -> String {
        let mut out = String::with_capacity(self.events.len() * 40);
        for event in &self.events {
            out.push_str(&format!(
                "{};0x{:08x};0x{:08x};{}\n",
                event.seq,
                event.pc,
                event.instr,
                RtlEffect(&event.effect)
            ));
        }
        out
    }
}

impl<'a> IntoIterator for &'a TraceLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Effect in the testbench's own spelling (`mem[0x...]=0x...`, `xN=0x...`).
struct RtlEffect<'a>(&'a Effect);

impl fmt::Display for RtlEffect<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Effect::RegisterWrite { reg, value } => write!(f, "{reg}=0x{value:08x}"),
            Effect::MemoryWrite { address, value } => {
                write!(f, "mem[0x{address:08x}]=0x{value:08x}")
            }
            Effect::None => Ok(()),
        }
    }
}
