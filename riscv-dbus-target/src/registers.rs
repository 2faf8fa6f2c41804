use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity of a core register which can be accessed through the debug module.
///
/// Chip descriptions list accessible registers by name, the names are resolved
/// into this tag once when the description is loaded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RegisterId {
    /// General purpose register `x0`..`x31`.
    Gpr(u8),
    /// The program counter, backed by the `dpc` CSR while halted.
    Pc,
    /// The privilege level the core will return to, backed by `dcsr.prv`.
    Priv,
    /// A control and status register, by CSR number.
    Csr(u16),
}

impl RegisterId {
    /// Frame pointer / `s0`.
    pub const S0: RegisterId = RegisterId::Gpr(8);
    /// `s1`, used as a scratch register by host programs.
    pub const S1: RegisterId = RegisterId::Gpr(9);

    /// The canonical name of this register.
    pub fn name(&self) -> String {
        if let Some((name, _)) = REGISTER_NAMES.iter().find(|(_, id)| id == self) {
            return (*name).to_string();
        }

        match self {
            RegisterId::Gpr(n) => format!("x{n}"),
            RegisterId::Pc => "pc".to_string(),
            RegisterId::Priv => "priv".to_string(),
            RegisterId::Csr(csr) => format!("csr{csr:#x}"),
        }
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Error returned when a register name is not known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown register name '{0}'")]
pub struct UnknownRegister(pub String);

impl FromStr for RegisterId {
    type Err = UnknownRegister;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((_, id)) = REGISTER_NAMES.iter().find(|(name, _)| *name == s) {
            return Ok(*id);
        }

        if let Some(index) = s.strip_prefix('x').and_then(|n| n.parse::<u8>().ok()) {
            if index < 32 {
                return Ok(RegisterId::Gpr(index));
            }
        }

        if let Some(n) = s.strip_prefix("pmpcfg").and_then(|n| n.parse::<u16>().ok()) {
            if n < 4 {
                return Ok(RegisterId::Csr(csr::PMPCFG0 + n));
            }
        }

        if let Some(n) = s.strip_prefix("pmpaddr").and_then(|n| n.parse::<u16>().ok()) {
            if n < 16 {
                return Ok(RegisterId::Csr(csr::PMPADDR0 + n));
            }
        }

        if let Some(n) = s.strip_prefix("hpmcounter").and_then(|n| n.parse::<u16>().ok()) {
            if (3..32).contains(&n) {
                return Ok(RegisterId::Csr(csr::CYCLE + n));
            }
        }

        Err(UnknownRegister(s.to_string()))
    }
}

impl TryFrom<String> for RegisterId {
    type Error = UnknownRegister;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RegisterId> for String {
    fn from(value: RegisterId) -> Self {
        value.name()
    }
}

/// CSR numbers used by the debug layer.
pub mod csr {
    #![allow(missing_docs)]

    pub const MSTATUS: u16 = 0x300;
    pub const MISA: u16 = 0x301;
    pub const MTVEC: u16 = 0x305;
    pub const MSCRATCH: u16 = 0x340;
    pub const MEPC: u16 = 0x341;
    pub const MCAUSE: u16 = 0x342;
    pub const MTVAL: u16 = 0x343;
    pub const PMPCFG0: u16 = 0x3a0;
    pub const PMPADDR0: u16 = 0x3b0;
    pub const TSELECT: u16 = 0x7a0;
    pub const TDATA1: u16 = 0x7a1;
    pub const TDATA2: u16 = 0x7a2;
    pub const TCONTROL: u16 = 0x7a5;
    pub const DCSR: u16 = 0x7b0;
    pub const DPC: u16 = 0x7b1;
    pub const DSCRATCH0: u16 = 0x7b2;
    pub const DSCRATCH1: u16 = 0x7b3;
    pub const CYCLE: u16 = 0xc00;
}

static REGISTER_NAMES: &[(&str, RegisterId)] = &[
    ("zero", RegisterId::Gpr(0)),
    ("ra", RegisterId::Gpr(1)),
    ("sp", RegisterId::Gpr(2)),
    ("gp", RegisterId::Gpr(3)),
    ("tp", RegisterId::Gpr(4)),
    ("t0", RegisterId::Gpr(5)),
    ("t1", RegisterId::Gpr(6)),
    ("t2", RegisterId::Gpr(7)),
    ("fp", RegisterId::Gpr(8)),
    ("s0", RegisterId::Gpr(8)),
    ("s1", RegisterId::Gpr(9)),
    ("a0", RegisterId::Gpr(10)),
    ("a1", RegisterId::Gpr(11)),
    ("a2", RegisterId::Gpr(12)),
    ("a3", RegisterId::Gpr(13)),
    ("a4", RegisterId::Gpr(14)),
    ("a5", RegisterId::Gpr(15)),
    ("a6", RegisterId::Gpr(16)),
    ("a7", RegisterId::Gpr(17)),
    ("s2", RegisterId::Gpr(18)),
    ("s3", RegisterId::Gpr(19)),
    ("s4", RegisterId::Gpr(20)),
    ("s5", RegisterId::Gpr(21)),
    ("s6", RegisterId::Gpr(22)),
    ("s7", RegisterId::Gpr(23)),
    ("s8", RegisterId::Gpr(24)),
    ("s9", RegisterId::Gpr(25)),
    ("s10", RegisterId::Gpr(26)),
    ("s11", RegisterId::Gpr(27)),
    ("t3", RegisterId::Gpr(28)),
    ("t4", RegisterId::Gpr(29)),
    ("t5", RegisterId::Gpr(30)),
    ("t6", RegisterId::Gpr(31)),
    ("pc", RegisterId::Pc),
    ("priv", RegisterId::Priv),
    ("mstatus", RegisterId::Csr(csr::MSTATUS)),
    ("misa", RegisterId::Csr(csr::MISA)),
    ("mtvec", RegisterId::Csr(csr::MTVEC)),
    ("mscratch", RegisterId::Csr(csr::MSCRATCH)),
    ("mepc", RegisterId::Csr(csr::MEPC)),
    ("mcause", RegisterId::Csr(csr::MCAUSE)),
    ("mtval", RegisterId::Csr(csr::MTVAL)),
    ("tselect", RegisterId::Csr(csr::TSELECT)),
    ("tdata1", RegisterId::Csr(csr::TDATA1)),
    ("tdata2", RegisterId::Csr(csr::TDATA2)),
    ("tcontrol", RegisterId::Csr(csr::TCONTROL)),
    ("dcsr", RegisterId::Csr(csr::DCSR)),
    ("dpc", RegisterId::Csr(csr::DPC)),
    ("dscratch0", RegisterId::Csr(csr::DSCRATCH0)),
    ("dscratch1", RegisterId::Csr(csr::DSCRATCH1)),
];

/// The set of registers which exist on a chip.
///
/// An empty set means every register is assumed to exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisterSet(BTreeSet<RegisterId>);

impl RegisterSet {
    /// Create a register set from a list of registers.
    pub fn new(registers: impl IntoIterator<Item = RegisterId>) -> Self {
        Self(registers.into_iter().collect())
    }

    /// Returns `true` if the register is accessible on this chip.
    pub fn contains(&self, register: RegisterId) -> bool {
        self.0.is_empty() || self.0.contains(&register)
    }

    /// Iterate over all registers in the set.
    pub fn iter(&self) -> impl Iterator<Item = RegisterId> + '_ {
        self.0.iter().copied()
    }

    /// The number of registers in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no register was listed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::{csr, RegisterId, RegisterSet};
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_abi_names() {
        assert_eq!("zero".parse::<RegisterId>().unwrap(), RegisterId::Gpr(0));
        assert_eq!("fp".parse::<RegisterId>().unwrap(), RegisterId::S0);
        assert_eq!("s0".parse::<RegisterId>().unwrap(), RegisterId::S0);
        assert_eq!("t6".parse::<RegisterId>().unwrap(), RegisterId::Gpr(31));
        assert_eq!("x17".parse::<RegisterId>().unwrap(), RegisterId::Gpr(17));
    }

    #[test]
    fn parse_numbered_csrs() {
        assert_eq!(
            "pmpaddr15".parse::<RegisterId>().unwrap(),
            RegisterId::Csr(csr::PMPADDR0 + 15)
        );
        assert_eq!(
            "pmpcfg3".parse::<RegisterId>().unwrap(),
            RegisterId::Csr(0x3a3)
        );
        assert_eq!(
            "hpmcounter16".parse::<RegisterId>().unwrap(),
            RegisterId::Csr(0xc10)
        );
    }

    #[test]
    fn reject_unknown_names() {
        assert!("x32".parse::<RegisterId>().is_err());
        assert!("pmpcfg4".parse::<RegisterId>().is_err());
        assert!("vl".parse::<RegisterId>().is_err());
    }

    #[test]
    fn names_prefer_abi_spelling() {
        assert_eq!(RegisterId::S0.name(), "fp");
        assert_eq!(RegisterId::Csr(csr::DPC).name(), "dpc");
        assert_eq!(RegisterId::Csr(0xc10).name(), "csr0xc10");
    }

    #[test]
    fn empty_set_allows_everything() {
        let all = RegisterSet::default();
        assert!(all.contains(RegisterId::Gpr(5)));

        let some = RegisterSet::new([RegisterId::Pc, RegisterId::Gpr(1)]);
        assert!(some.contains(RegisterId::Pc));
        assert!(!some.contains(RegisterId::Gpr(5)));
    }
}
