use crate::architecture::riscv::communication_interface::RiscvError;
use crate::architecture::riscv::triggers::SlotId;
use crate::probe::DebugProbeError;
use riscv_dbus_target::{RegisterId, RegistryError};

/// The overarching error type which contains all possible errors as variants.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error with the usage of the probe occurred.
    #[error("An error with the usage of the probe occurred")]
    Probe(#[from] DebugProbeError),
    /// A RISC-V specific error occurred.
    #[error("A RISC-V specific error occurred")]
    Riscv(#[from] RiscvError),
    /// The chip description could not be loaded.
    #[error("Unable to load the description of the chip")]
    ChipNotFound(#[from] RegistryError),
    /// All hardware triggers of the requested kind are in use.
    #[error("Unable to set hardware breakpoint, all available breakpoint units are in use.")]
    BreakpointUnitsExceeded,
    /// The trigger slot does not exist or is not in use.
    #[error("Trigger slot {0:?} is not in use")]
    InvalidTriggerSlot(SlotId),
    /// The register does not exist on this chip.
    #[error("Register {0} is not available on this chip")]
    RegisterNotAvailable(RegisterId),
    /// Any other error occurred.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
