//! Probe abstraction.
//!
//! The debug layer only needs a JTAG transport which can select an instruction
//! register, queue data register scans and execute the queue.

#[cfg(any(test, feature = "test"))]
pub mod fake_probe;

use bitvec::prelude::*;

/// This error occurs whenever the debug probe logic encounters an error while operating the relevant debug probe.
#[derive(thiserror::Error, Debug)]
pub enum DebugProbeError {
    /// Something went wrong while shifting bits over the scan chain.
    #[error("JTAG communication error")]
    Jtag(#[source] Option<Box<dyn std::error::Error + Send + Sync>>),
    /// An error which is specific to the debug probe in use occurred.
    #[error("An error specific to a probe type occurred")]
    ProbeSpecific(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The probe returned a different number of captures than scans were queued.
    #[error("Expected {expected} scan results from the probe, but got {actual}")]
    ScanCountMismatch {
        /// Number of queued data register scans.
        expected: usize,
        /// Number of returned captures.
        actual: usize,
    },
    /// The probe does not support the requested command.
    #[error("Command not supported by probe: {0}")]
    CommandNotSupportedByProbe(&'static str),
    /// Some other error occurred.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Low level access to a JTAG scan chain.
///
/// Instruction register selections and data register scans are queued, and only
/// shifted when [`JtagAccess::execute`] is called.
pub trait JtagAccess: std::fmt::Debug {
    /// Queue a write of `instruction` to the instruction register.
    fn select(&mut self, instruction: u32) -> Result<(), DebugProbeError>;

    /// Queue a data register scan. The length of the scan is the length of `data`.
    fn scan(&mut self, data: &BitSlice<u8, Lsb0>) -> Result<(), DebugProbeError>;

    /// Execute all queued operations.
    ///
    /// Returns the bits captured by each queued data register scan, in queue order.
    /// On error, the queue is discarded.
    fn execute(&mut self) -> Result<Vec<BitVec<u8, Lsb0>>, DebugProbeError>;

    /// Assert the target reset line.
    fn target_reset_assert(&mut self) -> Result<(), DebugProbeError>;

    /// Deassert the target reset line.
    fn target_reset_deassert(&mut self) -> Result<(), DebugProbeError>;
}

/// The Probe struct is a generic wrapper over the different JTAG transports.
#[derive(Debug)]
pub struct Probe {
    inner: Box<dyn JtagAccess>,
}

impl Probe {
    /// Create a new probe from a specific transport.
    pub fn from_specific_probe(probe: Box<dyn JtagAccess>) -> Self {
        Self { inner: probe }
    }

    /// Take the transport out of the probe.
    pub fn into_jtag(self) -> Box<dyn JtagAccess> {
        self.inner
    }
}
