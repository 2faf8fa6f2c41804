//! Debug Transport Module (DTM) handling
//!
//! The DTM is responsible for access to the debug module. A version 0.11 DTM
//! has two JTAG registers: `dtminfo`, which describes the transport, and
//! `dbus`, through which every register of the debug module is accessed.
//!
//! A `dbus` scan shifts in an operation and shifts out the result of the
//! *previous* operation:
//!
//! | bits              | field   |
//! |-------------------|---------|
//! | `0..2`            | op      |
//! | `2..36`           | data    |
//! | `36..36 + abits`  | address |

pub mod jtag_dtm;

use bitvec::prelude::*;

use super::communication_interface::RiscvError;

/// Instruction register value selecting `dtminfo`.
pub const DTMINFO_ADDRESS: u32 = 0x10;
/// Width of the `dtminfo` register.
pub const DTMINFO_WIDTH: usize = 32;
/// Instruction register value selecting `dbus`.
pub const DBUS_ADDRESS: u32 = 0x11;

const DBUS_OP_BIT_OFFSET: usize = 0;
const DBUS_DATA_BIT_OFFSET: usize = 2;
/// Offset of the address field, which is also the number of bits without the address.
pub const DBUS_ADDRESS_BIT_OFFSET: usize = 36;
const DBUS_DATA_MASK: u64 = (1 << 34) - 1;

/// Returns `true` if `address` can be shifted into a `dbus` address field of `abits` bits.
pub fn address_fits(address: u16, abits: u32) -> bool {
    u32::from(address).checked_shr(abits).unwrap_or(0) == 0
}

/// The kind of an operation on the Debug Bus.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DbusOpKind {
    #[default]
    NoOp = 0,
    Read = 1,
    Write = 2,
    ConditionalWrite = 3,
}

/// A single operation on the Debug Bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DbusOperation {
    NoOp,
    Read { address: u16 },
    Write { address: u16, value: u64 },
    ConditionalWrite { address: u16, value: u64 },
}

impl DbusOperation {
    /// The kind of this operation.
    pub fn kind(&self) -> DbusOpKind {
        match self {
            Self::NoOp => DbusOpKind::NoOp,
            Self::Read { .. } => DbusOpKind::Read,
            Self::Write { .. } => DbusOpKind::Write,
            Self::ConditionalWrite { .. } => DbusOpKind::ConditionalWrite,
        }
    }

    /// The address this operation latches in the debug module.
    pub fn address(&self) -> u16 {
        match self {
            Self::NoOp => 0,
            Self::Read { address }
            | Self::Write { address, .. }
            | Self::ConditionalWrite { address, .. } => *address,
        }
    }

    fn value(&self) -> u64 {
        match self {
            Self::NoOp | Self::Read { .. } => 0,
            Self::Write { value, .. } | Self::ConditionalWrite { value, .. } => {
                *value & DBUS_DATA_MASK
            }
        }
    }

    /// Encode the operation into the bits of a `dbus` scan with `abits` address bits.
    ///
    /// `abits` has to be non-zero, and the address has to fit into it.
    pub fn encode(&self, abits: u32) -> BitVec<u8, Lsb0> {
        let abits = abits as usize;
        let mut bits = bitvec![u8, Lsb0; 0; DBUS_ADDRESS_BIT_OFFSET + abits];

        bits[DBUS_OP_BIT_OFFSET..DBUS_DATA_BIT_OFFSET].store_le(self.kind() as u8);
        bits[DBUS_DATA_BIT_OFFSET..DBUS_ADDRESS_BIT_OFFSET].store_le(self.value());
        bits[DBUS_ADDRESS_BIT_OFFSET..].store_le(self.address());

        bits
    }
}

/// Possible return values in the op field of the `dbus` register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DbusOperationStatus {
    Success = 0,
    NoWrite = 1,
    Failed = 2,
    Busy = 3,
}

impl DbusOperationStatus {
    fn parse(value: u8) -> Option<Self> {
        let status = match value {
            0 => Self::Success,
            1 => Self::NoWrite,
            2 => Self::Failed,
            3 => Self::Busy,
            _ => return None,
        };

        Some(status)
    }
}

/// The decoded result of a `dbus` scan.
///
/// This is the result of the operation shifted in by the previous scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DbusResponse {
    pub status: DbusOperationStatus,
    /// The 34 bit data field.
    pub data: u64,
}

impl DbusResponse {
    /// Decode the captured bits of a `dbus` scan.
    pub fn decode(bits: &BitSlice<u8, Lsb0>) -> Result<Self, RiscvError> {
        if bits.len() < DBUS_ADDRESS_BIT_OFFSET {
            return Err(RiscvError::MalformedResponse { bits: bits.len() });
        }

        let op = bits[DBUS_OP_BIT_OFFSET..DBUS_DATA_BIT_OFFSET].load_le::<u8>();
        let status = DbusOperationStatus::parse(op)
            .ok_or(RiscvError::MalformedResponse { bits: bits.len() })?;

        Ok(Self {
            status,
            data: bits[DBUS_DATA_BIT_OFFSET..DBUS_ADDRESS_BIT_OFFSET].load_le::<u64>(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::{address_fits, DbusOperation, DbusOperationStatus, DbusResponse};
    use crate::architecture::riscv::communication_interface::RiscvError;
    use bitvec::prelude::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn encode_write_layout() {
        let bits = DbusOperation::Write {
            address: 0x11,
            value: 1 << 33 | 0xdead_beef,
        }
        .encode(5);

        assert_eq!(bits.len(), 41);
        assert_eq!(bits[0..2].load_le::<u8>(), 2);
        assert_eq!(bits[2..36].load_le::<u64>(), 1 << 33 | 0xdead_beef);
        assert_eq!(bits[36..41].load_le::<u8>(), 0x11);
    }

    #[test]
    fn encode_truncates_data_to_34_bits() {
        let bits = DbusOperation::Write {
            address: 0,
            value: u64::MAX,
        }
        .encode(5);

        assert_eq!(bits[2..36].load_le::<u64>(), (1 << 34) - 1);
        assert_eq!(bits[36..].load_le::<u8>(), 0);
    }

    #[test_case(0x1f, 5, true)]
    #[test_case(0x20, 5, false)]
    #[test_case(0x4b, 5, false)]
    #[test_case(0x4b, 7, true)]
    #[test_case(0xffff, 16, true)]
    fn address_width(address: u16, abits: u32, fits: bool) {
        assert_eq!(address_fits(address, abits), fits);
    }

    #[test]
    fn encode_read_has_no_data() {
        let bits = DbusOperation::Read { address: 0x4f }.encode(7);

        assert_eq!(bits.len(), 43);
        assert_eq!(bits[0..2].load_le::<u8>(), 1);
        assert_eq!(bits[2..36].load_le::<u64>(), 0);
        assert_eq!(bits[36..].load_le::<u8>(), 0x4f);
    }

    #[test_case(0, DbusOperationStatus::Success)]
    #[test_case(1, DbusOperationStatus::NoWrite)]
    #[test_case(2, DbusOperationStatus::Failed)]
    #[test_case(3, DbusOperationStatus::Busy)]
    fn decode_status(op: u8, expected: DbusOperationStatus) {
        let mut bits = bitvec![u8, Lsb0; 0; 41];
        bits[0..2].store_le(op);
        bits[2..36].store_le(0x2_1234_5678u64);

        let response = DbusResponse::decode(&bits).unwrap();

        assert_eq!(response.status, expected);
        assert_eq!(response.data, 0x2_1234_5678);
    }

    #[test]
    fn decode_short_capture() {
        let bits = bitvec![u8, Lsb0; 0; 32];

        assert!(matches!(
            DbusResponse::decode(&bits),
            Err(RiscvError::MalformedResponse { bits: 32 })
        ));
    }
}
