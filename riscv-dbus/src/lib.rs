//! # Debug Bus transport for RISC-V debug 0.11 targets
//!
//! This crate talks to the debug module of a RISC-V hart over a JTAG Debug
//! Transport Module, using the `dbus` register of the version 0.11 debug
//! specification. On top of the transport it provides core control, register
//! and memory access through the Debug RAM, hardware triggers, and the recovery
//! of a target after it was reset.
//!
//! ## Polling a target
//!
//! ```no_run
//! # use riscv_dbus::Error;
//! use riscv_dbus::{Probe, Session};
//!
//! # fn open_probe() -> Probe { unimplemented!() }
//! let probe: Probe = open_probe();
//!
//! // Attach to a chip.
//! let mut session = Session::auto_attach(probe, "esp32h2")?;
//!
//! // Report resets from anywhere, e.g. a probe callback.
//! let notifier = session.reset_notifier();
//! notifier.notify();
//!
//! // The next poll recovers the target and returns its state.
//! let state = session.poll()?;
//! println!("{state:?}");
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Reading from RAM
//!
//! ```no_run
//! # use riscv_dbus::Error;
//! use riscv_dbus::{MemoryInterface, Probe, Session};
//!
//! # fn open_probe() -> Probe { unimplemented!() }
//! let mut session = Session::auto_attach(open_probe(), "esp32h2")?;
//!
//! // Read a block of 50 32 bit words.
//! let mut buff = [0u32; 50];
//! session.read_32(0x4080_0000, &mut buff)?;
//!
//! // Read a single 32 bit word.
//! let word = session.read_word_32(0x4080_0000)?;
//! # Ok::<(), Error>(())
//! ```

/// All the interface bits for the different architectures.
pub mod architecture;
#[warn(missing_docs)]
mod core_status;
#[warn(missing_docs)]
mod error;
#[warn(missing_docs)]
pub mod hooks;
#[warn(missing_docs)]
mod memory;
pub mod probe;
#[warn(missing_docs)]
mod session;
pub mod vendor;

pub use crate::architecture::riscv::communication_interface::{DebugLinkInfo, RiscvError};
pub use crate::architecture::riscv::sequences::{RecoveryReport, RiscvDebugSequence};
pub use crate::architecture::riscv::triggers::{BreakpointBackend, BreakpointKind, SlotId};
pub use crate::architecture::riscv::Riscv32;
pub use crate::core_status::TargetRunState;
pub use crate::error::Error;
pub use crate::memory::MemoryInterface;
pub use crate::probe::{DebugProbeError, JtagAccess, Probe};
pub use crate::session::{ResetFlag, ResetNotifier, Session};

pub use riscv_dbus_target::{ChipDescription, RegisterId};
