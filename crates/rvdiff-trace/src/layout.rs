//! Memory regimes and the address-space rules derived from a test name.

use crate::Effect;

/// Text base of legacy (small-memory) tests.
pub const LEGACY_BASE: u32 = 0x0010_0000;

/// Text base of extended-memory tests (Spike's DRAM base).
pub const EXTENDED_BASE: u32 = 0x8000_0000;

/// Test-name prefix (second dot-separated component) selecting the extended regime.
pub const EXTENDED_PREFIX: &str = "mac_";

/// End-of-test store the extended testbench watches for.
const EXTENDED_SENTINEL: Sentinel = Sentinel {
    address: 0x1000_0000,
    value: 0xdead_beef,
};

/// Memory regime a test is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRegime {
    Legacy,
    Extended,
}

impl MemoryRegime {
    /// Classify a test identifier such as `asm.mac_dot` or `c.fib`.
    pub fn of_test(name: &str) -> Self {
        match name.split('.').nth(1) {
            Some(stem) if stem.starts_with(EXTENDED_PREFIX) => Self::Extended,
            _ => Self::Legacy,
        }
    }

    pub const fn base(self) -> u32 {
        match self {
            Self::Legacy => LEGACY_BASE,
            Self::Extended => EXTENDED_BASE,
        }
    }
}

/// A termination store that is testbench plumbing, not architectural state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sentinel {
    pub address: u32,
    pub value: u32,
}

impl Sentinel {
    pub fn matches(&self, effect: &Effect) -> bool {
        effect.memory_write() == Some((self.address, self.value))
    }
}

/// Address-space rules applied while normalizing, merging and comparing one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    pub regime: MemoryRegime,
    /// Commits below this PC are bootstrap code.
    pub base: u32,
    /// Store filtered out of the RTL trace before merging.
    pub sentinel: Option<Sentinel>,
}

impl AddressSpace {
    pub const fn new(regime: MemoryRegime) -> Self {
        match regime {
            MemoryRegime::Legacy => Self {
                regime,
                base: LEGACY_BASE,
                sentinel: None,
            },
            MemoryRegime::Extended => Self {
                regime,
                base: EXTENDED_BASE,
                sentinel: Some(EXTENDED_SENTINEL),
            },
        }
    }

    /// Address space for a test identifier.
    pub fn for_test(name: &str) -> Self {
        Self::new(MemoryRegime::of_test(name))
    }

    /// Whether a commit at `pc` belongs to the program rather than bootstrap.
    pub const fn is_program_pc(&self, pc: u32) -> bool {
        pc >= self.base
    }

    /// Whether `effect` is the end-of-test sentinel store.
    pub fn is_sentinel(&self, effect: &Effect) -> bool {
        self.sentinel.is_some_and(|s| s.matches(effect))
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new(MemoryRegime::Legacy)
    }
}
