//! Access to a version 0.11 Debug Transport Module over JTAG.

use bitvec::prelude::*;

use crate::architecture::riscv::communication_interface::RiscvError;
use crate::architecture::riscv::dtm::{
    address_fits, DbusOpKind, DbusOperation, DbusResponse, DBUS_ADDRESS, DTMINFO_ADDRESS,
    DTMINFO_WIDTH,
};
use crate::architecture::riscv::registers::Dtminfo;
use crate::probe::{DebugProbeError, JtagAccess};

/// Access to the Debug Transport Module (DTM),
/// which is used to communicate with the RISC-V debug module.
#[derive(Debug)]
pub struct JtagDtm {
    probe: Box<dyn JtagAccess>,

    /// Number of address bits in the `dbus` register, 0 until the transport is initialized.
    abits: u32,

    /// Address latched by the last `dbus` scan, if known.
    last_address: Option<u16>,

    /// Kind of the last operation shifted into `dbus`.
    last_operation: DbusOpKind,
}

impl JtagDtm {
    pub fn new(probe: Box<dyn JtagAccess>) -> Self {
        Self {
            probe,
            abits: 0,
            last_address: None,
            last_operation: DbusOpKind::NoOp,
        }
    }

    /// Read `dtminfo`, and leave `dbus` selected afterwards.
    pub fn read_dtminfo(&mut self) -> Result<Dtminfo, RiscvError> {
        self.probe.select(DTMINFO_ADDRESS)?;
        self.probe.scan(&bitvec![u8, Lsb0; 0; DTMINFO_WIDTH])?;
        // Always return to dbus.
        self.probe.select(DBUS_ADDRESS)?;

        let captures = self.execute()?;
        let capture = captures
            .first()
            .ok_or(DebugProbeError::ScanCountMismatch {
                expected: 1,
                actual: 0,
            })?;

        if capture.len() < DTMINFO_WIDTH {
            return Err(RiscvError::MalformedResponse {
                bits: capture.len(),
            });
        }

        Ok(Dtminfo(capture[..DTMINFO_WIDTH].load_le::<u32>()))
    }

    /// Read `dtminfo` and check that a supported transport is present.
    ///
    /// Sets the number of address bits used by all following `dbus` scans.
    pub fn init(&mut self) -> Result<Dtminfo, RiscvError> {
        let dtminfo = self.read_dtminfo()?;

        tracing::debug!("{:?}", dtminfo);

        if dtminfo.0 == 0 || dtminfo.0 == u32::MAX {
            return Err(RiscvError::NoRiscvTarget);
        }

        if dtminfo.version() != 0 {
            return Err(RiscvError::UnsupportedDebugTransportModuleVersion(
                dtminfo.version() as u8,
            ));
        }

        if dtminfo.addrbits() == 0 {
            return Err(RiscvError::InvalidAddressWidth);
        }

        self.abits = dtminfo.addrbits();

        Ok(dtminfo)
    }

    /// Number of address bits of the `dbus` register, 0 if unknown.
    pub fn abits(&self) -> u32 {
        self.abits
    }

    /// The address latched by the last `dbus` scan.
    ///
    /// `None` if no scan was done yet, or the last scan failed.
    pub fn last_address(&self) -> Option<u16> {
        self.last_address
    }

    /// The kind of the last operation shifted into `dbus`.
    pub fn last_operation(&self) -> DbusOpKind {
        self.last_operation
    }

    /// Perform a single `dbus` scan.
    ///
    /// The response contains the result of the operation of the previous scan.
    pub fn dbus_scan(&mut self, op: DbusOperation) -> Result<DbusResponse, RiscvError> {
        if self.abits == 0 {
            return Err(RiscvError::AddressWidthUnknown);
        }

        if !address_fits(op.address(), self.abits) {
            return Err(RiscvError::DbusAddressOutOfRange {
                address: op.address(),
                abits: self.abits,
            });
        }

        let bits = op.encode(self.abits);

        self.probe.scan(&bits)?;
        self.last_address = Some(op.address());
        self.last_operation = op.kind();

        let captures = self.execute()?;
        let capture = captures
            .first()
            .ok_or(DebugProbeError::ScanCountMismatch {
                expected: 1,
                actual: 0,
            })?;

        let response = DbusResponse::decode(capture)?;

        tracing::trace!("dbus {:x?} -> {:x?}", op, response);

        Ok(response)
    }

    fn execute(&mut self) -> Result<Vec<BitVec<u8, Lsb0>>, RiscvError> {
        self.probe.execute().map_err(|error| {
            tracing::error!("dbus scan failed: {error}");
            // Whatever was shifted in before the failure is unknown now.
            self.last_address = None;
            RiscvError::from(error)
        })
    }

    pub fn target_reset_assert(&mut self) -> Result<(), DebugProbeError> {
        self.probe.target_reset_assert()
    }

    pub fn target_reset_deassert(&mut self) -> Result<(), DebugProbeError> {
        self.probe.target_reset_deassert()
    }
}
