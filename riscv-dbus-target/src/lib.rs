//! Target description schema
//!
//! The debug layer of `riscv-dbus` needs a handful of per-chip constants: the
//! watchdogs which have to be disarmed after a reset, the strapping register
//! which tells how the chip booted, the reset cause register and the number of
//! hardware triggers. This crate contains the schema structs for the YAML
//! description files, and a registry with the builtin descriptions.
//!
#![warn(missing_docs)]

mod chip;
mod registers;
mod registry;
pub(crate) mod serialize;

pub use chip::{
    BootModeDescription, ChipDescription, DebugLinkConfig, ResetCause, ResetCauseDescription,
    StrapPattern, WatchdogDescription,
};
pub use registers::{csr, RegisterId, RegisterSet, UnknownRegister};
pub use registry::{add_target_from_yaml, get_chip_by_name, Registry, RegistryError};
