//! All the interface bits for RISC-V.

use riscv_dbus_target::{csr, DebugLinkConfig, RegisterId, RegisterSet};

use crate::core_status::TargetRunState;
use crate::error::Error;
use crate::memory::MemoryInterface;
use crate::probe::JtagAccess;

use self::assembly::{ZERO, S0, S1};
use self::communication_interface::{DebugLinkInfo, RiscvCommunicationInterface, RiscvError};
use self::debug_ram::{core_address, DebugRam};
use self::registers::{Dcsr, DebugRegister, Dmcontrol, Dminfo, Dtminfo, DCSR_HALT, DCSR_STEP};

pub mod assembly;
pub mod communication_interface;
pub mod debug_ram;
pub mod dtm;
pub mod registers;
pub mod sequences;
pub mod triggers;

/// Words at the top of the Debug RAM which are reserved for data.
///
/// The last word is the exception word, below it are the data slots.
const DATA_WORDS: usize = 4;

/// The longest program staged by this module, without the final jump.
const LONGEST_PROGRAM: usize = 5;

/// Minimum Debug RAM size needed to run every program of this module.
pub const MIN_DEBUG_RAM_WORDS: usize = LONGEST_PROGRAM + 1 + DATA_WORDS;

/// Number of words of the examination self test, including the final jump.
const SELF_TEST_WORDS: usize = 6;

/// A data slot at the top of the Debug RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSlot {
    /// The word right below the exception word.
    Slot0,
    /// The word below [`DataSlot::Slot0`].
    Slot1,
    /// The word below [`DataSlot::Slot1`].
    Slot2,
}

impl DataSlot {
    fn index(self, dram_words: usize) -> usize {
        match self {
            Self::Slot0 => dram_words - 2,
            Self::Slot1 => dram_words - 3,
            Self::Slot2 => dram_words - 4,
        }
    }

    /// Offset of the slot for loads and stores relative to `zero`.
    fn offset(self, dram_words: usize) -> u32 {
        core_address(self.index(dram_words))
    }
}

/// A single RISC-V hart behind a version 0.11 debug module.
#[derive(Debug)]
pub struct Riscv32 {
    interface: RiscvCommunicationInterface,
    /// Allocated by [`Riscv32::examine`], sized to the Debug RAM of the target.
    dram: Option<DebugRam>,
    registers: RegisterSet,
    state: TargetRunState,
}

impl Riscv32 {
    /// Create a new core on top of a JTAG transport. Nothing is scanned until
    /// [`Riscv32::examine`] is called.
    pub fn new(
        probe: Box<dyn JtagAccess>,
        registers: RegisterSet,
        config: DebugLinkConfig,
    ) -> Self {
        Self {
            interface: RiscvCommunicationInterface::new(probe, config),
            dram: None,
            registers,
            state: TargetRunState::Unknown,
        }
    }

    /// Returns `true` once [`Riscv32::examine`] succeeded.
    pub fn is_examined(&self) -> bool {
        self.dram.is_some()
    }

    /// Direct access to the communication interface.
    pub fn interface(&mut self) -> &mut RiscvCommunicationInterface {
        &mut self.interface
    }

    /// A snapshot of the debug link state.
    pub fn link_info(&self) -> DebugLinkInfo {
        DebugLinkInfo {
            address_bit_width: self.interface.abits(),
            program_buffer_word_count: self.dram.as_ref().map(DebugRam::len).unwrap_or(0),
            last_addressed_register: self.interface.last_address(),
            last_operation_kind: self.interface.last_operation(),
        }
    }

    /// Discover the debug transport and the Debug RAM, and check that the Debug RAM
    /// holds what is written to it.
    ///
    /// Does nothing if the core was already examined.
    pub fn examine(&mut self) -> Result<(), RiscvError> {
        if self.is_examined() {
            return Ok(());
        }

        let dtminfo: Dtminfo = self.interface.init()?;
        tracing::debug!(
            "dbus address width: {} bits (dtminfo {:#x})",
            dtminfo.addrbits(),
            dtminfo.0
        );

        let dminfo = Dminfo(self.interface.dbus_read(Dminfo::ADDRESS, 0)?);
        tracing::debug!("{:?}", dminfo);

        if dminfo.authtype() != 0 {
            tracing::error!(
                "Authentication required by RISC-V core but not supported (authtype {})",
                dminfo.authtype()
            );
            return Err(RiscvError::AuthenticationRequired {
                authtype: dminfo.authtype() as u8,
            });
        }

        let words = dminfo.dram_words();
        if words < MIN_DEBUG_RAM_WORDS {
            return Err(RiscvError::DebugRamTooSmall { words });
        }

        let highest = debug_ram::dram_address(words - 1);
        if !dtm::address_fits(highest, dtminfo.addrbits()) {
            tracing::error!(
                "Debug RAM of {} words ends at dbus address {:#x}, beyond {} address bits",
                words,
                highest,
                dtminfo.addrbits()
            );
            return Err(RiscvError::DbusAddressOutOfRange {
                address: highest,
                abits: dtminfo.addrbits(),
            });
        }

        let mut dram = DebugRam::new(words);
        let self_test = self_test_program();

        for (index, word) in self_test.iter().enumerate() {
            dram.write(&mut self.interface, index, *word, false)?;
        }

        for (index, word) in self_test.iter().enumerate() {
            if !dram.check(&mut self.interface, index, *word)? {
                tracing::error!("Debug RAM self test failed at word {}", index);
                return Err(RiscvError::SelfTestMismatch { index });
            }
        }

        tracing::debug!("Examined RISC-V core with {} words of Debug RAM", words);

        self.dram = Some(dram);

        Ok(())
    }

    fn dram(&mut self) -> Result<(&mut DebugRam, &mut RiscvCommunicationInterface), RiscvError> {
        match self.dram.as_mut() {
            Some(dram) => Ok((dram, &mut self.interface)),
            None => Err(RiscvError::NotExamined),
        }
    }

    /// Stage `program` followed by a jump back into the debug ROM, and let the core execute it.
    ///
    /// Returns without waiting for the program to finish.
    pub fn start_program(&mut self, program: &[u32]) -> Result<(), RiscvError> {
        let (dram, interface) = self.dram()?;

        let capacity = dram.len() - DATA_WORDS;
        if program.len() + 1 > capacity {
            return Err(RiscvError::ProgramTooLarge {
                words: program.len() + 1,
                capacity,
            });
        }

        for (index, word) in program.iter().enumerate() {
            dram.write(interface, index, *word, false)?;
        }

        let exception = dram.len() - 1;
        dram.write(interface, exception, 0, false)?;

        dram.write_jump(interface, program.len(), true)
    }

    /// Run `program` in the Debug RAM and wait for it to finish.
    ///
    /// If `result` is given, the data slot is read back after the program finished.
    pub fn run_program(
        &mut self,
        program: &[u32],
        result: Option<DataSlot>,
    ) -> Result<Option<u32>, RiscvError> {
        self.start_program(program)?;

        let polls = self.interface.config().program_polls;
        let (dram, interface) = self.dram()?;
        let exception = dram.len() - 1;

        let mut finished = None;
        for _ in 0..polls {
            let control = dram.read_control(interface, exception)?;
            if !control.interrupt() {
                finished = Some(control.0 as u32);
                break;
            }
        }

        // The program may have written anything to the data region.
        let words = dram.len();
        dram.invalidate_range(words - DATA_WORDS..words);

        let exception_word = finished.ok_or_else(|| {
            tracing::error!("Program in Debug RAM did not finish after {} polls", polls);
            RiscvError::ProgramTimeout
        })?;

        if exception_word != 0 {
            tracing::warn!("Program in Debug RAM raised an exception: {:#x}", exception_word);
            return Err(RiscvError::ProgramException(exception_word));
        }

        match result {
            Some(slot) => {
                let index = slot.index(words);
                Ok(Some(dram.read(interface, index)?))
            }
            None => Ok(None),
        }
    }

    fn slot_offset(&mut self, slot: DataSlot) -> Result<u32, RiscvError> {
        let (dram, _) = self.dram()?;
        Ok(slot.offset(dram.len()))
    }

    fn write_slot(&mut self, slot: DataSlot, value: u32) -> Result<(), RiscvError> {
        let (dram, interface) = self.dram()?;
        let index = slot.index(dram.len());
        dram.write(interface, index, value, false)
    }

    /// Read `dmcontrol`, which carries the `haltnot` and `interrupt` bits.
    pub fn read_dmcontrol(&mut self) -> Result<Dmcontrol, RiscvError> {
        let value = self
            .interface
            .dbus_read(Dmcontrol::ADDRESS, Dmcontrol::ADDRESS)?;
        Ok(Dmcontrol(value))
    }

    /// Read the status bits of the debug module and update the run state.
    pub fn poll(&mut self) -> Result<TargetRunState, RiscvError> {
        if !self.is_examined() {
            return Err(RiscvError::NotExamined);
        }

        // Every Debug RAM word and dmcontrol carry the status bits.
        let address = match self.interface.last_address() {
            Some(address) if address <= Dmcontrol::ADDRESS => address,
            _ => 0,
        };

        let bits = Dmcontrol(self.interface.dbus_read(address, 0)?);
        let observed = TargetRunState::decode(bits.haltnot(), bits.interrupt());

        let state = self.state.update(observed);
        if state != self.state {
            tracing::debug!("Core state changed: {:?} -> {:?}", self.state, state);
        }
        self.state = state;

        Ok(state)
    }

    /// The run state observed by the last [`Riscv32::poll`].
    pub fn status(&self) -> TargetRunState {
        self.state
    }

    /// Request the core to halt. Does not wait for the core to be halted.
    pub fn halt(&mut self) -> Result<(), RiscvError> {
        tracing::debug!("Halting core");
        self.start_program(&[assembly::csrsi(csr::DCSR, DCSR_HALT)])
    }

    /// Let the core continue.
    pub fn resume(&mut self) -> Result<(), RiscvError> {
        tracing::debug!("Resuming core");
        self.start_program(&[assembly::csrci(csr::DCSR, DCSR_HALT | DCSR_STEP)])?;
        self.state = TargetRunState::Running;
        Ok(())
    }

    /// Execute a single instruction and halt again.
    pub fn step(&mut self) -> Result<(), RiscvError> {
        self.start_program(&[
            assembly::csrsi(csr::DCSR, DCSR_STEP),
            assembly::csrci(csr::DCSR, DCSR_HALT),
        ])?;

        self.wait_for_core_halted()?;

        self.run_program(
            &[
                assembly::csrsi(csr::DCSR, DCSR_HALT),
                assembly::csrci(csr::DCSR, DCSR_STEP),
            ],
            None,
        )?;

        Ok(())
    }

    /// Poll the core until it is halted.
    pub fn wait_for_core_halted(&mut self) -> Result<(), RiscvError> {
        let polls = self.interface.config().halt_polls;

        for _ in 0..polls {
            if self.poll()?.is_halted() {
                return Ok(());
            }
        }

        Err(RiscvError::Timeout)
    }

    /// Read a CSR. The allow-set of the chip is not consulted.
    pub fn read_csr(&mut self, address: u16) -> Result<u32, RiscvError> {
        let slot0 = self.slot_offset(DataSlot::Slot0)?;

        let value = self.run_program(
            &[
                assembly::csrr(S0, address),
                assembly::sw(slot0, ZERO as u32, 2, S0 as u32),
            ],
            Some(DataSlot::Slot0),
        )?;

        Ok(value.unwrap_or_default())
    }

    /// Write a CSR. The allow-set of the chip is not consulted.
    pub fn write_csr(&mut self, address: u16, value: u32) -> Result<(), RiscvError> {
        let slot0 = self.slot_offset(DataSlot::Slot0)?;

        self.write_slot(DataSlot::Slot0, value)?;
        self.run_program(
            &[
                assembly::lw(slot0 as u16, ZERO, 2, S0),
                assembly::csrw(address, S0),
            ],
            None,
        )?;

        Ok(())
    }

    fn read_gpr(&mut self, register: u8) -> Result<u32, RiscvError> {
        let slot0 = self.slot_offset(DataSlot::Slot0)?;

        let value = self.run_program(
            &[assembly::sw(slot0, ZERO as u32, 2, register as u32)],
            Some(DataSlot::Slot0),
        )?;

        Ok(value.unwrap_or_default())
    }

    fn write_gpr(&mut self, register: u8, value: u32) -> Result<(), RiscvError> {
        let slot0 = self.slot_offset(DataSlot::Slot0)?;

        self.write_slot(DataSlot::Slot0, value)?;
        self.run_program(&[assembly::lw(slot0 as u16, ZERO, 2, register)], None)?;

        Ok(())
    }

    fn check_register(&self, register: RegisterId) -> Result<(), Error> {
        if self.registers.contains(register) {
            Ok(())
        } else {
            Err(Error::RegisterNotAvailable(register))
        }
    }

    /// Read a register of the core.
    pub fn read_register(&mut self, register: RegisterId) -> Result<u32, Error> {
        self.check_register(register)?;

        let value = match register {
            RegisterId::Gpr(0) => 0,
            // The debug ROM keeps s0 in dscratch while the Debug RAM runs.
            RegisterId::Gpr(S0) => self.read_csr(csr::DSCRATCH0)?,
            RegisterId::Gpr(number) => self.read_gpr(number)?,
            RegisterId::Pc => self.read_csr(csr::DPC)?,
            RegisterId::Priv => Dcsr(self.read_csr(csr::DCSR)?).prv(),
            RegisterId::Csr(address) => self.read_csr(address)?,
        };

        tracing::trace!("Read {} = {:#010x}", register, value);

        Ok(value)
    }

    /// Write a register of the core. Writes to `zero` are ignored.
    pub fn write_register(&mut self, register: RegisterId, value: u32) -> Result<(), Error> {
        self.check_register(register)?;

        tracing::trace!("Write {} = {:#010x}", register, value);

        match register {
            RegisterId::Gpr(0) => {}
            RegisterId::Gpr(S0) => self.write_csr(csr::DSCRATCH0, value)?,
            RegisterId::Gpr(number) => self.write_gpr(number, value)?,
            RegisterId::Pc => self.write_csr(csr::DPC, value)?,
            RegisterId::Priv => {
                let mut dcsr = Dcsr(self.read_csr(csr::DCSR)?);
                dcsr.set_prv(value & 0b11);
                self.write_csr(csr::DCSR, dcsr.0)?;
            }
            RegisterId::Csr(address) => self.write_csr(address, value)?,
        }

        Ok(())
    }

    /// Let `ebreak` instructions enter debug mode in every privilege mode.
    pub fn enable_ebreaks(&mut self) -> Result<(), RiscvError> {
        let mut dcsr = Dcsr(self.read_csr(csr::DCSR)?);
        dcsr.set_ebreakm(true);
        dcsr.set_ebreaks(true);
        dcsr.set_ebreaku(true);

        self.write_csr(csr::DCSR, dcsr.0)
    }

    /// Assert the reset line of the target.
    pub fn assert_reset(&mut self) -> Result<(), RiscvError> {
        self.interface.target_reset_assert()?;
        Ok(())
    }

    /// Deassert the reset line of the target.
    ///
    /// The Debug RAM content is unknown afterwards.
    pub fn deassert_reset(&mut self) -> Result<(), RiscvError> {
        self.interface.target_reset_deassert()?;
        self.invalidate_debug_ram();
        self.state = TargetRunState::Unknown;
        Ok(())
    }

    /// Forget the content of the Debug RAM.
    pub fn invalidate_debug_ram(&mut self) {
        if let Some(dram) = self.dram.as_mut() {
            dram.invalidate_all();
        }
    }

    fn check_address(address: u64) -> Result<u32, RiscvError> {
        if address % 4 != 0 {
            return Err(RiscvError::MemoryNotAligned {
                address,
                alignment: 4,
            });
        }

        u32::try_from(address).map_err(|_| RiscvError::AddressOutOfRange(address))
    }
}

impl MemoryInterface for Riscv32 {
    fn read_word_32(&mut self, address: u64) -> Result<u32, Error> {
        let address = Self::check_address(address)?;
        let slot0 = self.slot_offset(DataSlot::Slot0)?;
        let slot1 = self.slot_offset(DataSlot::Slot1)?;

        self.write_slot(DataSlot::Slot0, address)?;
        let value = self.run_program(
            &[
                assembly::lw(slot0 as u16, ZERO, 2, S0),
                assembly::lw(0, S0, 2, S0),
                assembly::sw(slot1, ZERO as u32, 2, S0 as u32),
            ],
            Some(DataSlot::Slot1),
        )?;

        let value = value.unwrap_or_default();
        tracing::trace!("read_word_32 {:#010x} = {:#010x}", address, value);

        Ok(value)
    }

    fn write_word_32(&mut self, address: u64, data: u32) -> Result<(), Error> {
        let address = Self::check_address(address)?;
        let slot0 = self.slot_offset(DataSlot::Slot0)?;
        let slot1 = self.slot_offset(DataSlot::Slot1)?;
        let slot2 = self.slot_offset(DataSlot::Slot2)?;

        tracing::trace!("write_word_32 {:#010x} = {:#010x}", address, data);

        self.write_slot(DataSlot::Slot0, address)?;
        self.write_slot(DataSlot::Slot1, data)?;
        self.run_program(
            &[
                // s1 is not saved by the debug ROM.
                assembly::sw(slot2, ZERO as u32, 2, S1 as u32),
                assembly::lw(slot0 as u16, ZERO, 2, S0),
                assembly::lw(slot1 as u16, ZERO, 2, S1),
                assembly::sw(0, S0 as u32, 2, S1 as u32),
                assembly::lw(slot2 as u16, ZERO, 2, S1),
            ],
            None,
        )?;

        Ok(())
    }
}

/// A short program which stores 1 and then 0 into the first two Debug RAM
/// words, followed by a jump back into the debug ROM.
fn self_test_program() -> [u32; SELF_TEST_WORDS] {
    let first = core_address(0);
    let second = core_address(1);

    [
        assembly::xori(ZERO, S1, -1),
        assembly::srli(S1, S1, 31),
        assembly::sw(first, ZERO as u32, 2, S1 as u32),
        assembly::srli(S1, S1, 31),
        assembly::sw(second, ZERO as u32, 2, S1 as u32),
        debug_ram::jump_to_resume(SELF_TEST_WORDS - 1),
    ]
}

#[cfg(test)]
mod test {
    use super::{DataSlot, Riscv32, MIN_DEBUG_RAM_WORDS};
    use crate::architecture::riscv::communication_interface::RiscvError;
    use crate::core_status::TargetRunState;
    use crate::error::Error;
    use crate::memory::MemoryInterface;
    use crate::probe::fake_probe::FakeProbe;
    use pretty_assertions::assert_eq;
    use riscv_dbus_target::{csr, DebugLinkConfig, RegisterId, RegisterSet};
    use test_case::test_case;

    fn core(probe: &FakeProbe) -> Riscv32 {
        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::default(),
            DebugLinkConfig::default(),
        );
        core.examine().unwrap();
        core
    }

    #[test]
    fn examine_discovers_debug_ram() {
        let probe = FakeProbe::new();
        let core = core(&probe);

        let info = core.link_info();
        assert_eq!(info.address_bit_width, 5);
        assert_eq!(info.program_buffer_word_count, 16);
        assert!(core.is_examined());
    }

    #[test]
    fn examine_is_idempotent() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);
        let scans = probe.dbus_scans();

        core.examine().unwrap();

        assert_eq!(probe.dbus_scans(), scans);
    }

    #[test]
    fn examine_does_not_run_the_self_test() {
        let probe = FakeProbe::new();
        let _core = core(&probe);

        assert_eq!(probe.programs_run(), 0);
        assert!(probe.is_running());
    }

    #[test]
    fn examine_rejects_authentication() {
        let probe = FakeProbe::new();
        probe.set_authtype(1);

        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::default(),
            DebugLinkConfig::default(),
        );

        assert!(matches!(
            core.examine(),
            Err(RiscvError::AuthenticationRequired { authtype: 1 })
        ));
        assert_eq!(probe.dbus_write_count(), 0);
        assert!(!core.is_examined());
    }

    #[test]
    fn examine_rejects_small_debug_ram() {
        let probe = FakeProbe::new();
        probe.set_dram_words(MIN_DEBUG_RAM_WORDS - 1);

        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::default(),
            DebugLinkConfig::default(),
        );

        assert!(matches!(
            core.examine(),
            Err(RiscvError::DebugRamTooSmall { words }) if words == MIN_DEBUG_RAM_WORDS - 1
        ));
    }

    #[test]
    fn examine_rejects_debug_ram_beyond_address_width() {
        let probe = FakeProbe::new();
        probe.set_dram_words(28);

        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::default(),
            DebugLinkConfig::default(),
        );

        // Word 27 is at 0x4b, which needs 7 address bits.
        assert!(matches!(
            core.examine(),
            Err(RiscvError::DbusAddressOutOfRange {
                address: 0x4b,
                abits: 5
            })
        ));
        assert!(!core.is_examined());
        assert_eq!(probe.dbus_write_count(), 0);
    }

    #[test]
    fn large_debug_ram_uses_high_addresses() {
        let probe = FakeProbe::new();
        probe.set_dtminfo(0x70);
        probe.set_dram_words(28);
        let mut core = core(&probe);

        assert_eq!(core.link_info().program_buffer_word_count, 28);

        core.write_register(RegisterId::Gpr(10), 0x55).unwrap();

        assert_eq!(probe.gpr(10), 0x55);
        assert_eq!(probe.dram_word(26), 0x55);
        assert_eq!(probe.dram_word(10), 0);
    }

    #[test]
    fn examine_fails_self_test() {
        let probe = FakeProbe::new();
        probe.fail_address(2);

        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::default(),
            DebugLinkConfig::default(),
        );

        assert!(matches!(
            core.examine(),
            Err(RiscvError::SelfTestMismatch { index: 2 })
        ));
        assert!(!core.is_examined());
        assert_eq!(probe.programs_run(), 0);
    }

    #[test]
    fn operations_need_examination() {
        let probe = FakeProbe::new();
        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::default(),
            DebugLinkConfig::default(),
        );

        assert!(matches!(core.poll(), Err(RiscvError::NotExamined)));
        assert!(matches!(core.halt(), Err(RiscvError::NotExamined)));
        assert_eq!(probe.dbus_scans(), 0);
    }

    #[test]
    fn halt_and_resume() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);

        assert_eq!(core.poll().unwrap(), TargetRunState::Running);

        core.halt().unwrap();
        core.wait_for_core_halted().unwrap();
        assert_eq!(core.status(), TargetRunState::Halted);
        assert!(probe.is_halted());

        core.resume().unwrap();
        assert_eq!(core.poll().unwrap(), TargetRunState::Running);
        assert!(probe.is_running());
    }

    #[test]
    fn pending_halt_keeps_state() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);
        assert_eq!(core.poll().unwrap(), TargetRunState::Running);

        probe.set_program_latency(2);
        core.halt().unwrap();

        // The interrupt is still pending, and the core has not halted yet.
        assert_eq!(core.poll().unwrap(), TargetRunState::Running);
        assert!(!probe.is_halted());
    }

    #[test]
    fn step_advances_pc() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);

        core.halt().unwrap();
        core.wait_for_core_halted().unwrap();
        let pc = core.read_register(RegisterId::Pc).unwrap();

        core.step().unwrap();

        assert_eq!(core.read_register(RegisterId::Pc).unwrap(), pc + 4);
        assert!(probe.is_halted());
        assert_eq!(probe.csr(csr::DCSR) & 0b1100, 0b1000);
    }

    #[test]
    fn memory_word_access() {
        let probe = FakeProbe::new();
        probe.set_memory_word(0x2000_0000, 0x1234_5678);
        let mut core = core(&probe);

        assert_eq!(core.read_word_32(0x2000_0000).unwrap(), 0x1234_5678);

        core.write_word_32(0x2000_0004, 0xcafe_f00d).unwrap();
        assert_eq!(probe.memory_word(0x2000_0004), 0xcafe_f00d);
        assert_eq!(core.read_word_32(0x2000_0004).unwrap(), 0xcafe_f00d);
    }

    #[test]
    fn memory_write_preserves_s1() {
        let probe = FakeProbe::new();
        probe.set_gpr(9, 0x5151_5151);
        let mut core = core(&probe);

        core.write_word_32(0x2000_0000, 1).unwrap();

        assert_eq!(probe.gpr(9), 0x5151_5151);
    }

    #[test]
    fn block_access() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);

        core.write_32(0x2000_0100, &[1, 2, 3]).unwrap();

        let mut data = [0; 3];
        core.read_32(0x2000_0100, &mut data).unwrap();
        assert_eq!(data, [1, 2, 3]);
    }

    #[test_case(0x2000_0002; "unaligned")]
    #[test_case(0x1_0000_0000; "beyond 32 bits")]
    fn invalid_memory_address(address: u64) {
        let probe = FakeProbe::new();
        let mut core = core(&probe);
        let scans = probe.dbus_scans();

        assert!(core.read_word_32(address).is_err());
        assert_eq!(probe.dbus_scans(), scans);
    }

    #[test]
    fn memory_fault_is_reported() {
        let probe = FakeProbe::new();
        probe.set_fault_address(0x5000_0000);
        let mut core = core(&probe);

        assert!(matches!(
            core.read_word_32(0x5000_0000),
            Err(Error::Riscv(RiscvError::ProgramException(0xffff_ffff)))
        ));

        // The next program runs normally.
        core.write_word_32(0x2000_0000, 7).unwrap();
        assert_eq!(probe.memory_word(0x2000_0000), 7);
    }

    #[test]
    fn program_timeout() {
        let probe = FakeProbe::new();
        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::default(),
            DebugLinkConfig {
                program_polls: 3,
                ..Default::default()
            },
        );
        core.examine().unwrap();

        probe.set_program_latency(10);

        assert!(matches!(
            core.read_csr(csr::MISA),
            Err(RiscvError::ProgramTimeout)
        ));
    }

    #[test]
    fn program_too_large_is_rejected_before_writing() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);
        let writes = probe.dbus_write_count();

        assert!(matches!(
            core.run_program(&[0; 12], None),
            Err(RiscvError::ProgramTooLarge {
                words: 13,
                capacity: 12
            })
        ));
        assert_eq!(probe.dbus_write_count(), writes);
    }

    #[test]
    fn data_slot_result() {
        let probe = FakeProbe::new();
        probe.set_csr(csr::MISA, 0x4010_1104);
        let mut core = core(&probe);

        assert_eq!(core.read_csr(csr::MISA).unwrap(), 0x4010_1104);
        assert_eq!(DataSlot::Slot0.index(16), 14);
        assert_eq!(DataSlot::Slot2.index(16), 12);
    }

    #[test]
    fn gpr_access() {
        let probe = FakeProbe::new();
        probe.set_gpr(10, 0xaaaa_5555);
        let mut core = core(&probe);

        assert_eq!(core.read_register(RegisterId::Gpr(10)).unwrap(), 0xaaaa_5555);

        core.write_register(RegisterId::Gpr(11), 42).unwrap();
        assert_eq!(probe.gpr(11), 42);
    }

    #[test]
    fn s0_is_served_from_dscratch() {
        let probe = FakeProbe::new();
        probe.set_gpr(8, 0x0bad_cafe);
        let mut core = core(&probe);

        assert_eq!(core.read_register(RegisterId::S0).unwrap(), 0x0bad_cafe);

        core.write_register(RegisterId::S0, 0x1111_2222).unwrap();
        assert_eq!(probe.gpr(8), 0x1111_2222);
    }

    #[test]
    fn zero_register() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);
        let scans = probe.dbus_scans();

        core.write_register(RegisterId::Gpr(0), 5).unwrap();
        assert_eq!(core.read_register(RegisterId::Gpr(0)).unwrap(), 0);
        assert_eq!(probe.dbus_scans(), scans);
    }

    #[test]
    fn privilege_level() {
        let probe = FakeProbe::new();
        probe.set_csr(csr::DCSR, 0x4000_0003);
        let mut core = core(&probe);

        assert_eq!(core.read_register(RegisterId::Priv).unwrap(), 3);

        core.write_register(RegisterId::Priv, 0).unwrap();
        assert_eq!(probe.csr(csr::DCSR), 0x4000_0000);
    }

    #[test]
    fn registers_outside_the_allow_set() {
        let probe = FakeProbe::new();
        let mut core = Riscv32::new(
            Box::new(probe.clone()),
            RegisterSet::new([RegisterId::Pc, RegisterId::Gpr(1)]),
            DebugLinkConfig::default(),
        );
        core.examine().unwrap();

        assert!(core.read_register(RegisterId::Gpr(1)).is_ok());
        assert!(matches!(
            core.read_register(RegisterId::Csr(csr::MSTATUS)),
            Err(Error::RegisterNotAvailable(RegisterId::Csr(csr::MSTATUS)))
        ));
        assert!(matches!(
            core.write_register(RegisterId::Gpr(2), 0),
            Err(Error::RegisterNotAvailable(RegisterId::Gpr(2)))
        ));
    }

    #[test]
    fn enable_ebreaks_sets_dcsr_bits() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);

        core.enable_ebreaks().unwrap();

        let dcsr = probe.csr(csr::DCSR);
        assert_eq!(dcsr & (1 << 15 | 1 << 13 | 1 << 12), 1 << 15 | 1 << 13 | 1 << 12);
    }

    #[test]
    fn deassert_reset_invalidates_debug_ram() {
        let probe = FakeProbe::new();
        let mut core = core(&probe);
        core.halt().unwrap();
        core.wait_for_core_halted().unwrap();

        // Only the jump is written, the other words are already in place.
        let writes = probe.dbus_write_count();
        core.halt().unwrap();
        assert_eq!(probe.dbus_write_count(), writes + 1);

        core.assert_reset().unwrap();
        core.deassert_reset().unwrap();

        assert_eq!(core.status(), TargetRunState::Unknown);
        assert_eq!(probe.resets(), 1);

        // Identical words are written again, since the shadow is no longer trusted.
        let writes = probe.dbus_write_count();
        core.halt().unwrap();
        assert_eq!(probe.dbus_write_count(), writes + 3);
    }
}
