//! Debug RAM access with a local shadow copy.
//!
//! The Debug RAM is a small window of memory the core executes from while it
//! services a debug interrupt. The host stages instructions there, followed by
//! a jump back into the debug ROM.

use std::ops::Range;

use bitvec::prelude::*;

use super::assembly;
use super::communication_interface::{RiscvCommunicationInterface, RiscvError};
use super::dtm::DbusOperationStatus;
use super::registers::Dmcontrol;

pub const DEBUG_ROM_START: u32 = 0x800;
pub const DEBUG_ROM_RESUME: u32 = DEBUG_ROM_START + 4;
pub const DEBUG_ROM_EXCEPTION: u32 = DEBUG_ROM_START + 8;
pub const DEBUG_RAM_START: u32 = 0x400;

/// `dbus` address of Debug RAM word `index`.
///
/// The first 16 words are at addresses `0x00..0x10`, the rest starts at `0x40`.
pub fn dram_address(index: usize) -> u16 {
    if index < 0x10 {
        index as u16
    } else {
        (0x40 + index - 0x10) as u16
    }
}

/// Address of Debug RAM word `index`, as seen by the core.
pub fn core_address(index: usize) -> u32 {
    DEBUG_RAM_START + 4 * index as u32
}

/// A `jal` from Debug RAM word `index` to the resume entry of the debug ROM.
pub fn jump_to_resume(index: usize) -> u32 {
    assembly::jal(0, DEBUG_ROM_RESUME as i32 - core_address(index) as i32)
}

/// Shadow copy of the Debug RAM.
///
/// Each word has a validity bit, which is set only after the debug module
/// confirmed a write of that word, and cleared whenever the remote word may
/// have changed. The result of a write is returned by the scan following it,
/// so a freshly written word stays invalid until then.
#[derive(Debug)]
pub struct DebugRam {
    shadow: Box<[u32]>,
    valid: BitVec<u32, Lsb0>,
    /// The word of the last write, while its result is outstanding.
    unconfirmed: Option<usize>,
}

impl DebugRam {
    /// Create the shadow for a Debug RAM of `words` words. Nothing is valid yet.
    pub fn new(words: usize) -> Self {
        Self {
            shadow: vec![0; words].into_boxed_slice(),
            valid: bitvec![u32, Lsb0; 0; words],
            unconfirmed: None,
        }
    }

    /// Size of the Debug RAM in words.
    pub fn len(&self) -> usize {
        self.shadow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shadow.is_empty()
    }

    /// Returns `true` if the shadow of word `index` is known to match the target.
    pub fn is_valid(&self, index: usize) -> bool {
        self.valid.get(index).map(|bit| *bit).unwrap_or(false)
    }

    pub fn invalidate(&mut self, index: usize) {
        self.invalidate_range(index..index + 1);
    }

    pub fn invalidate_range(&mut self, range: Range<usize>) {
        if self.unconfirmed.is_some_and(|index| range.contains(&index)) {
            self.unconfirmed = None;
        }

        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.valid[start..end].fill(false);
    }

    pub fn invalidate_all(&mut self) {
        self.unconfirmed = None;
        self.valid.fill(false);
    }

    /// Pick up the result of the outstanding write, if the interface has it by now.
    fn confirm(&mut self, interface: &RiscvCommunicationInterface) {
        let Some(index) = self.unconfirmed else {
            return;
        };

        let address = dram_address(index);
        if interface.unconfirmed_write() == Some(address) {
            return;
        }

        self.unconfirmed = None;
        if interface.write_result(address) == Some(DbusOperationStatus::Success) {
            self.valid.set(index, true);
        }
    }

    fn check_index(&self, index: usize) -> Result<(), RiscvError> {
        if index >= self.len() {
            return Err(RiscvError::DebugRamIndexOutOfRange {
                index,
                size: self.len(),
            });
        }
        Ok(())
    }

    /// Write `value` to word `index`.
    ///
    /// The `haltnot` bit is always set, so the write never clears the halt
    /// notification. With `interrupt`, the core executes the Debug RAM after the
    /// write, so the write is never skipped. Without it, the scan is skipped if the
    /// shadow already holds `value` and the word is valid.
    pub fn write(
        &mut self,
        interface: &mut RiscvCommunicationInterface,
        index: usize,
        value: u32,
        interrupt: bool,
    ) -> Result<(), RiscvError> {
        self.check_index(index)?;
        self.confirm(interface);

        if !interrupt && self.is_valid(index) && self.shadow[index] == value {
            tracing::trace!("Debug RAM[{}] already holds {:#010x}", index, value);
            return Ok(());
        }

        let mut control = Dmcontrol(value as u64);
        control.set_haltnot(true);
        control.set_interrupt(interrupt);

        self.invalidate(index);
        interface.dbus_write(dram_address(index), control.into())?;
        self.confirm(interface);

        self.shadow[index] = value;
        self.unconfirmed = Some(index);

        Ok(())
    }

    /// Write a jump back to the debug ROM into word `index`.
    pub fn write_jump(
        &mut self,
        interface: &mut RiscvCommunicationInterface,
        index: usize,
        interrupt: bool,
    ) -> Result<(), RiscvError> {
        self.write(interface, index, jump_to_resume(index), interrupt)
    }

    /// Read word `index`, from the shadow if it is valid.
    pub fn read(
        &mut self,
        interface: &mut RiscvCommunicationInterface,
        index: usize,
    ) -> Result<u32, RiscvError> {
        self.check_index(index)?;
        self.confirm(interface);

        if self.is_valid(index) {
            return Ok(self.shadow[index]);
        }

        Ok(self.read_control(interface, index)?.0 as u32)
    }

    /// Read word `index` from the target, together with the `haltnot` and
    /// `interrupt` bits. The shadow is not consulted.
    pub fn read_control(
        &mut self,
        interface: &mut RiscvCommunicationInterface,
        index: usize,
    ) -> Result<Dmcontrol, RiscvError> {
        self.check_index(index)?;

        let address = dram_address(index);
        let value = interface.dbus_read(address, address)?;
        self.confirm(interface);

        Ok(Dmcontrol(value))
    }

    /// Read back word `index` from the target and compare it with `expected`.
    ///
    /// A mismatch is logged and invalidates the word.
    pub fn check(
        &mut self,
        interface: &mut RiscvCommunicationInterface,
        index: usize,
        expected: u32,
    ) -> Result<bool, RiscvError> {
        let actual = self.read_control(interface, index)?.0 as u32;

        if actual != expected {
            tracing::error!(
                "Wrote {:#x} to Debug RAM at {}, but read back {:#x}",
                expected,
                index,
                actual
            );
            self.invalidate(index);
            return Ok(false);
        }

        Ok(true)
    }
}
