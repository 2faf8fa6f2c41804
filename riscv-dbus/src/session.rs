//! A debug session on a single RISC-V target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use riscv_dbus_target::{get_chip_by_name, ChipDescription, RegisterId};

use crate::architecture::riscv::sequences::{
    DefaultRiscvSequence, RecoveryReport, RecoveryTarget, RiscvDebugSequence,
};
use crate::architecture::riscv::triggers::{
    BreakpointBackend, BreakpointKind, SlotId, TriggerModule,
};
use crate::architecture::riscv::Riscv32;
use crate::core_status::TargetRunState;
use crate::error::Error;
use crate::hooks::{RtosHooks, SemihostingHooks};
use crate::memory::MemoryInterface;
use crate::probe::Probe;
use crate::vendor;

/// The flag which records that the target was reset.
///
/// The flag has a single consumer: it is only read and cleared from
/// [`Session::poll`], on the thread which owns the session. Any number of
/// [`ResetNotifier`]s may set it concurrently. Setting the flag is the only thing
/// a notifier does, all recovery work happens in the next poll.
#[derive(Debug, Default)]
pub struct ResetFlag(Arc<AtomicBool>);

impl ResetFlag {
    /// Returns `true` if a reset was notified and not recovered from yet.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the reset as handled.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// A handle which can set the flag.
    pub fn notifier(&self) -> ResetNotifier {
        ResetNotifier(self.0.clone())
    }
}

/// A handle to report a reset of the target, e.g. from a probe callback.
#[derive(Debug, Clone)]
pub struct ResetNotifier(Arc<AtomicBool>);

impl ResetNotifier {
    /// Record that the target was reset.
    pub fn notify(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// The `Session` struct represents an active debug session.
///
/// It owns the probe, the description of the chip and all the collaborators
/// which act on the target after a reset.
#[derive(Debug)]
pub struct Session {
    core: Riscv32,
    chip: ChipDescription,
    sequence: Arc<dyn RiscvDebugSequence>,
    reset: ResetFlag,
    last_recovery: Option<RecoveryReport>,
    semihosting: Option<Box<dyn SemihostingHooks>>,
    rtos: Option<Box<dyn RtosHooks>>,
    triggers: Box<dyn BreakpointBackend>,
}

impl Session {
    /// Open a new session with a given chip description.
    ///
    /// The debug sequence and semihosting support are looked up from the known vendors.
    pub fn new(probe: Probe, chip: ChipDescription) -> Self {
        let sequence =
            vendor::try_create_debug_sequence(&chip).unwrap_or_else(DefaultRiscvSequence::create);
        let semihosting = vendor::try_create_semihosting(&chip);
        let triggers = Box::new(TriggerModule::new(chip.breakpoints, chip.watchpoints));

        tracing::debug!("Opening session for {}", chip.name);

        let core = Riscv32::new(probe.into_jtag(), chip.registers.clone(), chip.debug_link);

        Self {
            core,
            chip,
            sequence,
            reset: ResetFlag::default(),
            last_recovery: None,
            semihosting,
            rtos: None,
            triggers,
        }
    }

    /// Open a new session for the chip with the given name, and examine the target.
    pub fn auto_attach(probe: Probe, name: &str) -> Result<Self, Error> {
        let chip = get_chip_by_name(name)?;

        let mut session = Self::new(probe, chip);
        session.examine()?;

        Ok(session)
    }

    /// Replace the semihosting support.
    pub fn set_semihosting(&mut self, semihosting: Option<Box<dyn SemihostingHooks>>) {
        self.semihosting = semihosting;
    }

    /// Attach RTOS awareness.
    pub fn set_rtos(&mut self, rtos: Option<Box<dyn RtosHooks>>) {
        self.rtos = rtos;
    }

    /// Replace the provider of breakpoints and watchpoints.
    ///
    /// Slots bound by the previous provider are not freed.
    pub fn set_breakpoint_backend(&mut self, triggers: Box<dyn BreakpointBackend>) {
        self.triggers = triggers;
    }

    /// Replace the debug sequence.
    pub fn set_debug_sequence(&mut self, sequence: Arc<dyn RiscvDebugSequence>) {
        self.sequence = sequence;
    }

    /// A handle to report resets of the target to this session.
    pub fn reset_notifier(&self) -> ResetNotifier {
        self.reset.notifier()
    }

    /// Returns `true` if a reset was reported and the target was not recovered yet.
    pub fn reset_pending(&self) -> bool {
        self.reset.is_set()
    }

    /// What the last reset recovery did.
    pub fn last_recovery(&self) -> Option<&RecoveryReport> {
        self.last_recovery.as_ref()
    }

    /// The core of the target.
    pub fn core(&mut self) -> &mut Riscv32 {
        &mut self.core
    }

    /// The description of the chip.
    pub fn chip(&self) -> &ChipDescription {
        &self.chip
    }

    /// Discover the debug module of the target. Does nothing if already done.
    pub fn examine(&mut self) -> Result<(), Error> {
        self.core.examine()?;
        Ok(())
    }

    /// Poll the target for state changes.
    ///
    /// If a reset was reported since the last poll, the target is recovered first.
    pub fn poll(&mut self) -> Result<TargetRunState, Error> {
        if self.reset.is_set() && self.core.is_examined() {
            let target = RecoveryTarget {
                core: &mut self.core,
                chip: &self.chip,
                semihosting: self
                    .semihosting
                    .as_mut()
                    .map(|hooks| hooks.as_mut() as &mut dyn SemihostingHooks),
                rtos: self
                    .rtos
                    .as_mut()
                    .map(|hooks| hooks.as_mut() as &mut dyn RtosHooks),
            };

            match self.sequence.reset_recovery(target, &self.reset) {
                Ok(report) => self.last_recovery = Some(report),
                Err(error) => {
                    tracing::error!("Reset recovery aborted, retrying on the next poll: {error}");
                }
            }
        }

        Ok(self.core.poll()?)
    }

    /// Halt the core and wait until it is halted.
    pub fn halt(&mut self) -> Result<(), Error> {
        self.core.halt()?;
        self.core.wait_for_core_halted()?;
        Ok(())
    }

    /// Let the core continue.
    pub fn resume(&mut self) -> Result<(), Error> {
        self.core.resume()?;
        Ok(())
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<(), Error> {
        self.core.step()?;
        Ok(())
    }

    /// Read a register of the core.
    pub fn read_register(&mut self, register: RegisterId) -> Result<u32, Error> {
        self.core.read_register(register)
    }

    /// Write a register of the core.
    pub fn write_register(&mut self, register: RegisterId, value: u32) -> Result<(), Error> {
        self.core.write_register(register, value)
    }

    /// Set an instruction breakpoint.
    pub fn add_breakpoint(&mut self, address: u64) -> Result<SlotId, Error> {
        self.triggers.add(&mut self.core, address, BreakpointKind::Execute)
    }

    /// Set a data watchpoint.
    pub fn add_watchpoint(&mut self, address: u64, kind: BreakpointKind) -> Result<SlotId, Error> {
        self.triggers.add(&mut self.core, address, kind)
    }

    /// Remove a breakpoint or watchpoint.
    pub fn remove_breakpoint(&mut self, slot: SlotId) -> Result<(), Error> {
        self.triggers.remove(&mut self.core, slot)
    }

    /// Prepare the target for semihosting, if semihosting support is attached.
    pub fn prepare_semihosting(&mut self) -> Result<(), Error> {
        match self.semihosting.as_mut() {
            Some(semihosting) => semihosting.prepare(&mut self.core, &self.chip),
            None => Ok(()),
        }
    }

    /// Assert the reset line of the target.
    pub fn assert_reset(&mut self) -> Result<(), Error> {
        self.core.assert_reset()?;
        Ok(())
    }

    /// Deassert the reset line of the target. The target is recovered on the next poll.
    pub fn deassert_reset(&mut self) -> Result<(), Error> {
        self.core.deassert_reset()?;
        self.reset.notifier().notify();
        Ok(())
    }

    /// Free every breakpoint and watchpoint.
    pub fn detach(&mut self) -> Result<(), Error> {
        if self.core.is_examined() {
            self.triggers.clear_all(&mut self.core)?;
        }
        Ok(())
    }
}

impl MemoryInterface for Session {
    fn read_word_32(&mut self, address: u64) -> Result<u32, Error> {
        self.core.read_word_32(address)
    }

    fn write_word_32(&mut self, address: u64, data: u32) -> Result<(), Error> {
        self.core.write_word_32(address, data)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(error) = self.detach() {
            tracing::warn!("Could not clear all hardware breakpoints: {error}");
        }
    }
}
