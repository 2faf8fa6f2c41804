#![allow(missing_docs)] // Don't require docs for test code
use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap, VecDeque},
    rc::Rc,
};

use bitvec::prelude::*;
use riscv_dbus_target::csr;

use crate::architecture::riscv::{
    debug_ram::{DEBUG_RAM_START, DEBUG_ROM_RESUME},
    dtm::{DBUS_ADDRESS, DBUS_ADDRESS_BIT_OFFSET, DTMINFO_ADDRESS},
    registers::{DCSR_HALT, DCSR_STEP},
};
use crate::probe::{DebugProbeError, JtagAccess};

const DMCONTROL: u16 = 0x10;
const DMINFO: u16 = 0x11;

const STATUS_SUCCESS: u8 = 0;
const STATUS_FAILED: u8 = 2;
const STATUS_BUSY: u8 = 3;

/// Instructions a Debug RAM program may execute before it is considered stuck.
const STEP_LIMIT: usize = 64;

/// Where the simulated core runs from after a reset.
const RESET_VECTOR: u32 = 0x4200_0000;

/// Value the debug ROM leaves in the exception word.
const EXCEPTION: u32 = 0xffff_ffff;

/// This is a mock probe which simulates a version 0.11 debug module and a RV32 hart.
///
/// Clones share the same simulated target, so a test can keep a handle for
/// inspection after boxing another clone into the code under test.
#[derive(Debug, Clone)]
pub struct FakeProbe(Rc<RefCell<SimulatedTarget>>);

#[derive(Debug)]
enum Operation {
    Select(u32),
    Scan(BitVec<u8, Lsb0>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HartState {
    Running,
    Halted,
}

#[derive(Debug)]
struct SimulatedHart {
    state: HartState,
    pc: u32,
    gprs: [u32; 32],
    csrs: HashMap<u16, u32>,
}

impl SimulatedHart {
    fn new() -> Self {
        Self {
            state: HartState::Running,
            pc: RESET_VECTOR,
            gprs: [0; 32],
            csrs: HashMap::new(),
        }
    }

    fn csr(&self, address: u16) -> u32 {
        self.csrs.get(&address).copied().unwrap_or(0)
    }

    fn set_gpr(&mut self, register: u32, value: u32) {
        if register != 0 {
            self.gprs[register as usize] = value;
        }
    }
}

#[derive(Debug)]
struct SimulatedTarget {
    operations: VecDeque<Operation>,
    instruction: u32,
    dtminfo: u32,

    busy: usize,
    failed_addresses: BTreeSet<u16>,
    failing_executes: usize,
    pending: (u8, u64),

    dbus_scans: usize,
    dbus_writes: usize,
    last_dbus_write: Option<(u16, u64)>,

    authtype: u8,
    dram: Vec<u32>,
    haltnot: bool,
    interrupt: bool,
    program_latency: usize,
    program_countdown: usize,
    programs_run: usize,

    hart: SimulatedHart,
    memory: HashMap<u32, u32>,
    memory_writes: Vec<(u32, u32)>,
    fault_addresses: BTreeSet<u32>,

    reset_asserted: bool,
    resets: usize,
}

impl SimulatedTarget {
    fn new() -> Self {
        Self {
            operations: VecDeque::new(),
            instruction: 0,
            // 5 address bits, version 0
            dtminfo: 0x50,
            busy: 0,
            failed_addresses: BTreeSet::new(),
            failing_executes: 0,
            pending: (STATUS_SUCCESS, 0),
            dbus_scans: 0,
            dbus_writes: 0,
            last_dbus_write: None,
            authtype: 0,
            dram: vec![0; 16],
            haltnot: false,
            interrupt: false,
            program_latency: 0,
            program_countdown: 0,
            programs_run: 0,
            hart: SimulatedHart::new(),
            memory: HashMap::new(),
            memory_writes: Vec::new(),
            fault_addresses: BTreeSet::new(),
            reset_asserted: false,
            resets: 0,
        }
    }

    fn dram_index(&self, address: u16) -> Option<usize> {
        let index = match address {
            0x00..=0x0f => address as usize,
            0x40.. => address as usize - 0x40 + 0x10,
            _ => return None,
        };

        (index < self.dram.len()).then_some(index)
    }

    fn status_bits(&self) -> u64 {
        (self.haltnot as u64) << 33 | (self.interrupt as u64) << 32
    }

    fn read_dbus(&self, address: u16) -> u64 {
        if let Some(index) = self.dram_index(address) {
            return self.status_bits() | self.dram[index] as u64;
        }

        match address {
            DMCONTROL => self.status_bits(),
            DMINFO => {
                ((self.dram.len() as u64 - 1) & 0x3f) << 10 | (self.authtype as u64) << 2 | 1
            }
            _ => 0,
        }
    }

    fn write_dbus(&mut self, address: u16, value: u64) {
        let index = self.dram_index(address);
        if index.is_none() && address != DMCONTROL {
            return;
        }

        if let Some(index) = index {
            self.dram[index] = value as u32;
        }

        if value & 1 << 33 == 0 {
            self.haltnot = false;
        }

        if value & 1 << 32 != 0 {
            self.interrupt = true;
            if self.program_latency == 0 {
                self.run_debug_ram();
            } else {
                self.program_countdown = self.program_latency;
            }
        }
    }

    fn tick(&mut self) {
        if self.program_countdown > 0 {
            self.program_countdown -= 1;
            if self.program_countdown == 0 {
                self.run_debug_ram();
            }
        }
    }

    fn dbus_scan(&mut self, bits: &BitSlice<u8, Lsb0>) -> BitVec<u8, Lsb0> {
        self.dbus_scans += 1;

        let op = bits[0..2].load_le::<u8>();
        let data = bits[2..DBUS_ADDRESS_BIT_OFFSET].load_le::<u64>();
        let address = bits[DBUS_ADDRESS_BIT_OFFSET..].load_le::<u16>();

        let (status, result) = if self.busy > 0 {
            self.busy -= 1;
            (STATUS_BUSY, 0)
        } else {
            let captured = self.pending;
            self.tick();

            self.pending = if self.failed_addresses.contains(&address) {
                (STATUS_FAILED, 0)
            } else {
                match op {
                    1 => (STATUS_SUCCESS, self.read_dbus(address)),
                    2 | 3 => {
                        self.dbus_writes += 1;
                        self.last_dbus_write = Some((address, data));
                        self.write_dbus(address, data);
                        (STATUS_SUCCESS, self.read_dbus(address))
                    }
                    _ => (STATUS_SUCCESS, 0),
                }
            };

            captured
        };

        let mut capture = bitvec![u8, Lsb0; 0; bits.len()];
        capture[0..2].store_le(status);
        capture[2..DBUS_ADDRESS_BIT_OFFSET].store_le(result);
        capture
    }

    fn scan(&mut self, bits: &BitSlice<u8, Lsb0>) -> BitVec<u8, Lsb0> {
        match self.instruction {
            DTMINFO_ADDRESS => {
                let mut capture = bitvec![u8, Lsb0; 0; bits.len()];
                let width = bits.len().min(32);
                capture[..width].store_le(self.dtminfo);
                capture
            }
            DBUS_ADDRESS if bits.len() > DBUS_ADDRESS_BIT_OFFSET => self.dbus_scan(bits),
            // Bypass
            _ => bitvec![u8, Lsb0; 0; bits.len()],
        }
    }

    fn load(&mut self, address: u32) -> Option<u32> {
        if address % 4 != 0 || self.fault_addresses.contains(&address) {
            return None;
        }

        match address.checked_sub(DEBUG_RAM_START) {
            Some(offset) if (offset as usize) / 4 < self.dram.len() => {
                Some(self.dram[offset as usize / 4])
            }
            _ => Some(self.memory.get(&address).copied().unwrap_or(0)),
        }
    }

    fn store(&mut self, address: u32, value: u32) -> Option<()> {
        if address % 4 != 0 || self.fault_addresses.contains(&address) {
            return None;
        }

        match address.checked_sub(DEBUG_RAM_START) {
            Some(offset) if (offset as usize) / 4 < self.dram.len() => {
                self.dram[offset as usize / 4] = value;
            }
            _ => {
                self.memory.insert(address, value);
                self.memory_writes.push((address, value));
            }
        }

        Some(())
    }

    /// Execute one instruction at `pc`. Returns the next pc, or `None` on an exception.
    fn execute_instruction(&mut self, pc: u32, instruction: u32) -> Option<u32> {
        let opcode = instruction & 0x7f;
        let rd = instruction >> 7 & 0x1f;
        let funct3 = instruction >> 12 & 0x7;
        let rs1 = instruction >> 15 & 0x1f;
        let rs2 = instruction >> 20 & 0x1f;
        let imm_i = (instruction as i32 >> 20) as u32;
        let imm_s = ((instruction as i32 >> 25) << 5) as u32 | (instruction >> 7 & 0x1f);

        let source1 = self.hart.gprs[rs1 as usize];
        let source2 = self.hart.gprs[rs2 as usize];

        match (opcode, funct3) {
            // lw
            (0x03, 0b010) => {
                let value = self.load(source1.wrapping_add(imm_i))?;
                self.hart.set_gpr(rd, value);
            }
            // sw
            (0x23, 0b010) => {
                self.store(source1.wrapping_add(imm_s), source2)?;
            }
            // xori
            (0x13, 0b100) => self.hart.set_gpr(rd, source1 ^ imm_i),
            // srli
            (0x13, 0b101) if instruction >> 25 == 0 => {
                self.hart.set_gpr(rd, source1 >> (imm_i & 0x1f))
            }
            // csrrw, csrrs, csrrc and their immediate forms
            (0x73, 0b001..=0b011) | (0x73, 0b101..=0b111) => {
                let address = (instruction >> 20) as u16;
                let old = self.hart.csr(address);
                let operand = if funct3 & 0b100 == 0 {
                    source1
                } else {
                    rs1
                };

                let new = match funct3 & 0b011 {
                    0b01 => Some(operand),
                    0b10 if rs1 != 0 => Some(old | operand),
                    0b11 if rs1 != 0 => Some(old & !operand),
                    _ => None,
                };

                if let Some(new) = new {
                    self.hart.csrs.insert(address, new);
                }
                self.hart.set_gpr(rd, old);
            }
            // jal
            (0x6f, _) => {
                let imm = ((instruction as i32 >> 31) << 20) as u32
                    | (instruction >> 21 & 0x3ff) << 1
                    | (instruction >> 20 & 0x1) << 11
                    | (instruction >> 12 & 0xff) << 12;
                self.hart.set_gpr(rd, pc.wrapping_add(4));
                return Some(pc.wrapping_add(imm));
            }
            _ => return None,
        }

        Some(pc.wrapping_add(4))
    }

    /// Let the hart service the debug interrupt: enter the debug ROM, run the
    /// Debug RAM and return through the resume entry.
    fn run_debug_ram(&mut self) {
        self.programs_run += 1;

        if self.hart.state == HartState::Running {
            self.hart.csrs.insert(csr::DPC, self.hart.pc);
        }

        // The debug ROM saves s0.
        self.hart.csrs.insert(csr::DSCRATCH0, self.hart.gprs[8]);

        let mut pc = DEBUG_RAM_START;
        let mut finished = false;

        for _ in 0..STEP_LIMIT {
            if pc == DEBUG_ROM_RESUME {
                finished = true;
                break;
            }

            let Some(instruction) = self.load(pc) else {
                break;
            };

            match self.execute_instruction(pc, instruction) {
                Some(next) => pc = next,
                None => break,
            }
        }

        if !finished {
            if let Some(last) = self.dram.last_mut() {
                *last = EXCEPTION;
            }
        }

        self.hart.gprs[8] = self.hart.csr(csr::DSCRATCH0);
        self.interrupt = false;

        let dcsr = self.hart.csr(csr::DCSR);
        let dpc = self.hart.csr(csr::DPC);

        if dcsr & DCSR_HALT as u32 != 0 {
            self.hart.state = HartState::Halted;
            self.haltnot = true;
        } else if dcsr & DCSR_STEP as u32 != 0 {
            self.hart.csrs.insert(csr::DPC, dpc.wrapping_add(4));
            self.hart.state = HartState::Halted;
            self.haltnot = true;
        } else {
            self.hart.pc = dpc;
            self.hart.state = HartState::Running;
            self.haltnot = false;
        }
    }

    fn execute(&mut self) -> Result<Vec<BitVec<u8, Lsb0>>, DebugProbeError> {
        if self.failing_executes > 0 {
            self.failing_executes -= 1;
            self.operations.clear();
            return Err(DebugProbeError::Other(anyhow::anyhow!(
                "Simulated transport failure"
            )));
        }

        let mut captures = Vec::new();
        while let Some(operation) = self.operations.pop_front() {
            match operation {
                Operation::Select(instruction) => self.instruction = instruction,
                Operation::Scan(bits) => captures.push(self.scan(&bits)),
            }
        }

        Ok(captures)
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.hart = SimulatedHart::new();
        self.haltnot = false;
        self.interrupt = false;
        self.program_countdown = 0;
    }
}

impl FakeProbe {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SimulatedTarget::new())))
    }

    pub fn set_dtminfo(&self, dtminfo: u32) {
        self.0.borrow_mut().dtminfo = dtminfo;
    }

    /// Answer the next `scans` `dbus` scans with busy.
    pub fn set_busy(&self, scans: usize) {
        self.0.borrow_mut().busy = scans;
    }

    /// Answer every operation at `address` with failed.
    pub fn fail_address(&self, address: u16) {
        self.0.borrow_mut().failed_addresses.insert(address);
    }

    /// Let the next `count` calls to execute fail.
    pub fn fail_next_executes(&self, count: usize) {
        self.0.borrow_mut().failing_executes = count;
    }

    /// Number of `dbus` scans, including scans answered with busy.
    pub fn dbus_scans(&self) -> usize {
        self.0.borrow().dbus_scans
    }

    /// Number of executed `dbus` writes.
    pub fn dbus_write_count(&self) -> usize {
        self.0.borrow().dbus_writes
    }

    pub fn last_dbus_write(&self) -> Option<(u16, u64)> {
        self.0.borrow().last_dbus_write
    }

    pub fn set_authtype(&self, authtype: u8) {
        self.0.borrow_mut().authtype = authtype;
    }

    pub fn set_dram_words(&self, words: usize) {
        self.0.borrow_mut().dram.resize(words, 0);
    }

    pub fn set_dram_word(&self, index: usize, value: u32) {
        self.0.borrow_mut().dram[index] = value;
    }

    pub fn dram_word(&self, index: usize) -> u32 {
        self.0.borrow().dram[index]
    }

    /// Keep the interrupt bit set for `operations` `dbus` operations before a
    /// Debug RAM program runs.
    pub fn set_program_latency(&self, operations: usize) {
        self.0.borrow_mut().program_latency = operations;
    }

    pub fn programs_run(&self) -> usize {
        self.0.borrow().programs_run
    }

    pub fn set_memory_word(&self, address: u32, value: u32) {
        self.0.borrow_mut().memory.insert(address, value);
    }

    pub fn memory_word(&self, address: u32) -> u32 {
        self.0.borrow().memory.get(&address).copied().unwrap_or(0)
    }

    /// All stores to system memory done by Debug RAM programs, in order.
    pub fn memory_writes(&self) -> Vec<(u32, u32)> {
        self.0.borrow().memory_writes.clone()
    }

    /// Let every load and store at `address` raise an exception.
    pub fn set_fault_address(&self, address: u32) {
        self.0.borrow_mut().fault_addresses.insert(address);
    }

    pub fn set_gpr(&self, register: usize, value: u32) {
        self.0.borrow_mut().hart.gprs[register] = value;
    }

    pub fn gpr(&self, register: usize) -> u32 {
        self.0.borrow().hart.gprs[register]
    }

    pub fn set_csr(&self, address: u16, value: u32) {
        self.0.borrow_mut().hart.csrs.insert(address, value);
    }

    pub fn csr(&self, address: u16) -> u32 {
        self.0.borrow().hart.csr(address)
    }

    pub fn is_halted(&self) -> bool {
        self.0.borrow().hart.state == HartState::Halted
    }

    pub fn is_running(&self) -> bool {
        self.0.borrow().hart.state == HartState::Running
    }

    /// Simulate a reset of the target, as if caused by a watchdog.
    pub fn reset_target(&self) {
        self.0.borrow_mut().reset();
    }

    /// Number of completed resets.
    pub fn resets(&self) -> usize {
        self.0.borrow().resets
    }
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl JtagAccess for FakeProbe {
    fn select(&mut self, instruction: u32) -> Result<(), DebugProbeError> {
        self.0
            .borrow_mut()
            .operations
            .push_back(Operation::Select(instruction));
        Ok(())
    }

    fn scan(&mut self, data: &BitSlice<u8, Lsb0>) -> Result<(), DebugProbeError> {
        self.0
            .borrow_mut()
            .operations
            .push_back(Operation::Scan(data.to_bitvec()));
        Ok(())
    }

    fn execute(&mut self) -> Result<Vec<BitVec<u8, Lsb0>>, DebugProbeError> {
        self.0.borrow_mut().execute()
    }

    fn target_reset_assert(&mut self) -> Result<(), DebugProbeError> {
        self.0.borrow_mut().reset_asserted = true;
        Ok(())
    }

    fn target_reset_deassert(&mut self) -> Result<(), DebugProbeError> {
        let mut target = self.0.borrow_mut();
        if target.reset_asserted {
            target.reset_asserted = false;
            target.reset();
        }
        Ok(())
    }
}
