//! Debug Module Communication
//!
//! This module implements communication with a
//! Debug Module, as described in the RISCV debug
//! specification v0.11, on top of the JTAG DTM.

use riscv_dbus_target::DebugLinkConfig;

use crate::architecture::riscv::dtm::jtag_dtm::JtagDtm;
use crate::architecture::riscv::dtm::{
    DbusOpKind, DbusOperation, DbusOperationStatus, DbusResponse,
};
use crate::architecture::riscv::registers::Dtminfo;
use crate::probe::{DebugProbeError, JtagAccess};

/// Some error occurred when working with the RISC-V core.
#[derive(thiserror::Error, Debug)]
pub enum RiscvError {
    /// An error occurred during transport
    #[error("Error during transport")]
    DebugProbe(#[from] DebugProbeError),
    /// `dtminfo` read as all zeros or all ones.
    #[error("No RISC-V debug transport was found on the scan chain")]
    NoRiscvTarget,
    /// The version of the debug transport module is not supported.
    #[error("The version '{0}' of the debug transport module is currently not supported.")]
    UnsupportedDebugTransportModuleVersion(u8),
    /// The debug transport reported a `dbus` address width of zero.
    #[error("The debug transport reported a dbus address width of 0")]
    InvalidAddressWidth,
    /// A `dbus` scan was attempted before the address width was read from `dtminfo`.
    #[error("The dbus address width is not known yet")]
    AddressWidthUnknown,
    /// A `dbus` address does not fit into the address field of the transport.
    #[error("dbus address {address:#x} does not fit into {abits} address bits")]
    DbusAddressOutOfRange {
        /// The address which was accessed.
        address: u16,
        /// The `dbus` address width reported by `dtminfo`.
        abits: u32,
    },
    /// The target has not been examined.
    #[error("The target has not been examined yet")]
    NotExamined,
    /// The debug module requires authentication, which is not supported.
    #[error("Authentication (type {authtype}) is required by the debug module, but not supported")]
    AuthenticationRequired {
        /// The `authtype` field of `dminfo`.
        authtype: u8,
    },
    /// The debug module answered `busy` too many times in a row.
    #[error("The debug module stayed busy for {retries} retries while accessing address {address:#x}")]
    LinkUnresponsive {
        /// The address of the scan which was retried.
        address: u16,
        /// The number of retries.
        retries: usize,
    },
    /// The Debug RAM is too small to run host programs.
    #[error("The Debug RAM has only {words} words")]
    DebugRamTooSmall {
        /// Size of the Debug RAM in words.
        words: usize,
    },
    /// A Debug RAM word outside of the Debug RAM was accessed.
    #[error("Debug RAM index {index} is out of range, the Debug RAM has {size} words")]
    DebugRamIndexOutOfRange {
        /// The index which was accessed.
        index: usize,
        /// Size of the Debug RAM in words.
        size: usize,
    },
    /// A host program does not fit into the Debug RAM.
    #[error("A program of {words} words does not fit into the {capacity} words available in the Debug RAM")]
    ProgramTooLarge {
        /// Number of words of the program, including the final jump.
        words: usize,
        /// Number of words available for programs.
        capacity: usize,
    },
    /// A host program did not finish.
    #[error("A program in the Debug RAM did not finish")]
    ProgramTimeout,
    /// A host program caused an exception.
    #[error("A program in the Debug RAM caused an exception (exception word {0:#010x})")]
    ProgramException(u32),
    /// The self test of the Debug RAM failed during examination.
    #[error("The Debug RAM self test failed at index {index}")]
    SelfTestMismatch {
        /// Index of the word which did not read back as written.
        index: usize,
    },
    /// The probe returned fewer bits than were scanned.
    #[error("A scan returned only {bits} bits")]
    MalformedResponse {
        /// Number of captured bits.
        bits: usize,
    },
    /// The core did not halt in time.
    #[error("Timeout while waiting for the core to halt")]
    Timeout,
    /// The address is not reachable with 32 bit loads and stores.
    #[error("Address {0:#x} is out of range of the core")]
    AddressOutOfRange(u64),
    /// A memory access was not aligned to the access size.
    #[error("Memory access to address {address:#x} is not aligned to {alignment} bytes")]
    MemoryNotAligned {
        /// The address of the access.
        address: u64,
        /// The required alignment in bytes.
        alignment: usize,
    },
}

/// A snapshot of the state of the debug link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugLinkInfo {
    /// Number of address bits of `dbus`, 0 before examination.
    pub address_bit_width: u32,
    /// Number of words of the Debug RAM, 0 before examination.
    pub program_buffer_word_count: usize,
    /// The address currently latched in the debug module, if known.
    pub last_addressed_register: Option<u16>,
    /// The kind of the last operation shifted into `dbus`.
    pub last_operation_kind: DbusOpKind,
}

/// A interface that implements controls for RISC-V cores.
#[derive(Debug)]
pub struct RiscvCommunicationInterface {
    dtm: JtagDtm,
    config: DebugLinkConfig,

    /// Address of the last write, until the following scan returned its result.
    unconfirmed_write: Option<u16>,

    /// Address and result of the last write whose result was returned.
    write_result: Option<(u16, DbusOperationStatus)>,
}

impl RiscvCommunicationInterface {
    /// Creates a new RISC-V communication interface with a given probe driver.
    pub fn new(probe: Box<dyn JtagAccess>, config: DebugLinkConfig) -> Self {
        Self {
            dtm: JtagDtm::new(probe),
            config,
            unconfirmed_write: None,
            write_result: None,
        }
    }

    /// Read `dtminfo` and set up the `dbus` address width.
    pub fn init(&mut self) -> Result<Dtminfo, RiscvError> {
        tracing::debug!("Building RISC-V interface");

        self.dtm.init()
    }

    /// The configured limits of the debug link.
    pub fn config(&self) -> &DebugLinkConfig {
        &self.config
    }

    /// Number of address bits of `dbus`, 0 before [`init`](Self::init).
    pub fn abits(&self) -> u32 {
        self.dtm.abits()
    }

    /// The address latched by the last `dbus` scan, if known.
    pub fn last_address(&self) -> Option<u16> {
        self.dtm.last_address()
    }

    /// The kind of the last operation shifted into `dbus`.
    pub fn last_operation(&self) -> DbusOpKind {
        self.dtm.last_operation()
    }

    /// The address of a write whose result has not been returned yet.
    ///
    /// The result of a write arrives with the next scan which is not answered with busy.
    pub fn unconfirmed_write(&self) -> Option<u16> {
        self.unconfirmed_write
    }

    /// The result of the last write to `address`.
    ///
    /// `None` while that write is unconfirmed, if a later write was confirmed
    /// since, or if a transport failure lost the result.
    pub fn write_result(&self, address: u16) -> Option<DbusOperationStatus> {
        match self.write_result {
            Some((confirmed, status))
                if confirmed == address && self.unconfirmed_write != Some(address) =>
            {
                Some(status)
            }
            _ => None,
        }
    }

    /// Book-keeping for a scan which was not answered with busy.
    ///
    /// The response belongs to the previous operation, so it confirms an
    /// outstanding write, and `op` becomes the outstanding one if it is a write.
    fn accepted(&mut self, op: DbusOperation, response: &DbusResponse) {
        if let Some(address) = self.unconfirmed_write.take() {
            if response.status != DbusOperationStatus::Success {
                tracing::error!(
                    "dbus write to {:#x} failed, result={:?}",
                    address,
                    response.status
                );
            }
            self.write_result = Some((address, response.status));
        }

        if let DbusOperation::Write { address, .. }
        | DbusOperation::ConditionalWrite { address, .. } = op
        {
            self.unconfirmed_write = Some(address);
        }
    }

    /// Repeat a scan until the debug module is no longer busy.
    fn scan_until_ready(&mut self, op: DbusOperation) -> Result<DbusResponse, RiscvError> {
        let retries = self.config.busy_retries;

        for _ in 0..=retries {
            let response = match self.dtm.dbus_scan(op) {
                Ok(response) => response,
                Err(error) => {
                    self.forget_writes();
                    return Err(error);
                }
            };

            if response.status != DbusOperationStatus::Busy {
                self.accepted(op, &response);
                return Ok(response);
            }

            tracing::trace!("Debug module busy, repeating {:x?}", op);
        }

        tracing::error!(
            "Debug module still busy after {} retries at address {:#x}",
            retries,
            op.address()
        );
        self.forget_writes();

        Err(RiscvError::LinkUnresponsive {
            address: op.address(),
            retries,
        })
    }

    fn forget_writes(&mut self) {
        self.unconfirmed_write = None;
        self.write_result = None;
    }

    /// Read the `dbus` register at `address`.
    ///
    /// Because every scan returns the result of the previous one, the read is
    /// done in two phases. If `address` is not already latched, a read at
    /// `address` is shifted in first. Then a read at `next_address` is shifted
    /// in, which returns the value at `address` and latches `next_address` for
    /// the next access.
    ///
    /// A `failed` or `no-write` result is logged, and 0 is returned.
    pub fn dbus_read(&mut self, address: u16, next_address: u16) -> Result<u64, RiscvError> {
        if self.dtm.last_address() != Some(address)
            || self.dtm.last_operation() == DbusOpKind::NoOp
        {
            self.scan_until_ready(DbusOperation::Read { address })?;
        }

        let response = self.scan_until_ready(DbusOperation::Read {
            address: next_address,
        })?;

        if response.status != DbusOperationStatus::Success {
            tracing::error!(
                "dbus read failed at {:#x}, result={:?}",
                address,
                response.status
            );
            return Ok(0);
        }

        Ok(response.data)
    }

    /// Write `value` to the `dbus` register at `address`.
    ///
    /// The result of the write is only known after the next scan, see
    /// [`write_result`](Self::write_result). A failed write is logged then.
    pub fn dbus_write(&mut self, address: u16, value: u64) -> Result<(), RiscvError> {
        self.scan_until_ready(DbusOperation::Write { address, value })?;
        Ok(())
    }

    pub fn target_reset_assert(&mut self) -> Result<(), DebugProbeError> {
        self.dtm.target_reset_assert()
    }

    pub fn target_reset_deassert(&mut self) -> Result<(), DebugProbeError> {
        self.dtm.target_reset_deassert()
    }
}
