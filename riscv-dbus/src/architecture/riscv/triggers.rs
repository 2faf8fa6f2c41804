//! Hardware triggers (breakpoints and watchpoints).

use riscv_dbus_target::csr;

use super::communication_interface::RiscvError;
use super::registers::Mcontrol;
use super::Riscv32;
use crate::error::Error;

/// Kind of access a trigger matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    /// Instruction fetch.
    Execute,
    /// Data load.
    Load,
    /// Data store.
    Store,
    /// Data load or store.
    Access,
}

impl BreakpointKind {
    fn is_watchpoint(self) -> bool {
        self != Self::Execute
    }
}

/// Handle to a bound trigger slot, as returned by [`BreakpointBackend::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub usize);

/// The state of a single trigger slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Slot {
    /// The slot is not in use.
    #[default]
    Free,
    /// The slot is bound to an address.
    Bound {
        /// The address the trigger matches.
        address: u64,
        /// The kind of access the trigger matches.
        kind: BreakpointKind,
    },
}

/// A provider of breakpoints and watchpoints.
pub trait BreakpointBackend: std::fmt::Debug + Send {
    /// Bind a free slot to `address`.
    fn add(&mut self, core: &mut Riscv32, address: u64, kind: BreakpointKind)
        -> Result<SlotId, Error>;

    /// Free a slot which was returned by [`BreakpointBackend::add`].
    fn remove(&mut self, core: &mut Riscv32, slot: SlotId) -> Result<(), Error>;

    /// Free every bound slot.
    fn clear_all(&mut self, core: &mut Riscv32) -> Result<(), Error>;
}

/// Breakpoints and watchpoints implemented with the trigger module of the core.
///
/// Breakpoints use the first triggers, watchpoints the ones after them.
#[derive(Debug, Clone)]
pub struct TriggerModule {
    breakpoints: Vec<Slot>,
    watchpoints: Vec<Slot>,
}

impl TriggerModule {
    /// Create a trigger module with the given number of breakpoint and watchpoint triggers.
    pub fn new(breakpoints: usize, watchpoints: usize) -> Self {
        Self {
            breakpoints: vec![Slot::Free; breakpoints],
            watchpoints: vec![Slot::Free; watchpoints],
        }
    }

    /// The state of all slots, breakpoints first.
    pub fn slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        self.breakpoints.iter().chain(self.watchpoints.iter())
    }

    fn slot_mut(&mut self, slot: SlotId) -> Option<&mut Slot> {
        let breakpoints = self.breakpoints.len();
        if slot.0 < breakpoints {
            self.breakpoints.get_mut(slot.0)
        } else {
            self.watchpoints.get_mut(slot.0 - breakpoints)
        }
    }

    fn program(
        core: &mut Riscv32,
        index: usize,
        address: u32,
        tdata1: u32,
    ) -> Result<(), RiscvError> {
        core.write_csr(csr::TSELECT, index as u32)?;
        // Disable the trigger while its address changes.
        core.write_csr(csr::TDATA1, 0)?;
        core.write_csr(csr::TDATA2, address)?;
        core.write_csr(csr::TDATA1, tdata1)
    }
}

/// `tdata1` of an address match trigger which enters debug mode.
pub fn mcontrol(kind: BreakpointKind) -> Mcontrol {
    let mut mcontrol = Mcontrol(0);
    mcontrol.set_type(2);
    mcontrol.set_dmode(true);
    mcontrol.set_action(1);
    mcontrol.set_m(true);
    mcontrol.set_s(true);
    mcontrol.set_u(true);

    match kind {
        BreakpointKind::Execute => mcontrol.set_execute(true),
        BreakpointKind::Load => mcontrol.set_load(true),
        BreakpointKind::Store => mcontrol.set_store(true),
        BreakpointKind::Access => {
            mcontrol.set_load(true);
            mcontrol.set_store(true);
        }
    }

    mcontrol
}

impl BreakpointBackend for TriggerModule {
    fn add(
        &mut self,
        core: &mut Riscv32,
        address: u64,
        kind: BreakpointKind,
    ) -> Result<SlotId, Error> {
        let target = u32::try_from(address).map_err(|_| RiscvError::AddressOutOfRange(address))?;

        let (slots, base) = if kind.is_watchpoint() {
            (&mut self.watchpoints, self.breakpoints.len())
        } else {
            (&mut self.breakpoints, 0)
        };

        let position = slots
            .iter()
            .position(|slot| *slot == Slot::Free)
            .ok_or(Error::BreakpointUnitsExceeded)?;
        let index = base + position;

        tracing::debug!(
            "Setting {:?} trigger #{} at address {:#010x}",
            kind,
            index,
            address
        );

        Self::program(core, index, target, mcontrol(kind).0)?;
        slots[position] = Slot::Bound { address, kind };

        Ok(SlotId(index))
    }

    fn remove(&mut self, core: &mut Riscv32, slot: SlotId) -> Result<(), Error> {
        match self.slot_mut(slot) {
            Some(Slot::Bound { .. }) => {}
            _ => return Err(Error::InvalidTriggerSlot(slot)),
        }

        tracing::debug!("Clearing trigger #{}", slot.0);

        core.write_csr(csr::TSELECT, slot.0 as u32)?;
        core.write_csr(csr::TDATA1, 0)?;

        if let Some(entry) = self.slot_mut(slot) {
            *entry = Slot::Free;
        }

        Ok(())
    }

    fn clear_all(&mut self, core: &mut Riscv32) -> Result<(), Error> {
        let bound: Vec<SlotId> = self
            .slots()
            .enumerate()
            .filter(|(_, slot)| **slot != Slot::Free)
            .map(|(index, _)| SlotId(index))
            .collect();

        for slot in bound {
            self.remove(core, slot)?;
        }

        Ok(())
    }
}
