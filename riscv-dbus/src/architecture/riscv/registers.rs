//! Registers of a version 0.11 debug module and the debug CSRs of the core.

use bitfield::bitfield;

/// A register on the Debug Bus.
pub trait DebugRegister: Into<u64> + From<u64> {
    /// Debug Bus address of the register.
    const ADDRESS: u16;
    /// Name of the register, used in log messages.
    const NAME: &'static str;
}

macro_rules! debug_register {
    ($i:ident, $addr:expr, $name:expr) => {
        impl DebugRegister for $i {
            const ADDRESS: u16 = $addr;
            const NAME: &'static str = $name;
        }

        impl From<$i> for u64 {
            fn from(register: $i) -> Self {
                register.0
            }
        }

        impl From<u64> for $i {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

bitfield! {
    /// The `dtminfo` JTAG register, selected with IR 0x10.
    #[derive(Copy, Clone)]
    pub struct Dtminfo(u32);
    impl Debug;

    /// Number of address bits of the `dbus` register.
    pub addrbits, _: 7, 4;
    /// Version of the debug transport module. 0 for version 0.11.
    pub version, _: 3, 0;
}

bitfield! {
    /// The `dmcontrol` register, located at address 0x10.
    ///
    /// Bits 33 and 32 are present on every Debug RAM word as well.
    #[derive(Copy, Clone)]
    pub struct Dmcontrol(u64);
    impl Debug;

    /// Set while the hart is halted. Writing 0 clears the notification.
    pub haltnot, set_haltnot: 33;
    /// Writing 1 makes the hart execute the Debug RAM. Cleared by the hart.
    pub interrupt, set_interrupt: 32;
    pub buserror, set_buserror: 21, 19;
    pub serial, set_serial: 17, 16;
    pub autoincrement, set_autoincrement: 15;
    pub access, set_access: 14, 12;
    pub hartid, set_hartid: 11, 2;
    pub ndreset, set_ndreset: 1;
    pub fullreset, set_fullreset: 0;
}

debug_register!(Dmcontrol, 0x10, "dmcontrol");

bitfield! {
    /// The read-only `dminfo` register, located at address 0x11.
    #[derive(Copy, Clone)]
    pub struct Dminfo(u64);
    impl Debug;

    pub abussize, _: 31, 25;
    pub serialcount, _: 24, 21;
    pub access128, _: 20;
    pub access64, _: 19;
    pub access32, _: 18;
    pub access16, _: 17;
    pub access8, _: 16;
    /// Size of the Debug RAM in words, minus one.
    pub dramsize, _: 15, 10;
    pub authenticated, _: 5;
    pub authbusy, _: 4;
    /// Non-zero if the debugger has to authenticate before using the debug module.
    pub authtype, _: 3, 2;
    pub version, _: 1, 0;
}

debug_register!(Dminfo, 0x11, "dminfo");

impl Dminfo {
    /// Number of 32 bit words in the Debug RAM.
    pub fn dram_words(&self) -> usize {
        self.dramsize() as usize + 1
    }
}

bitfield! {
    /// The `dcsr` CSR of a version 0.11 core.
    #[derive(Copy, Clone)]
    pub struct Dcsr(u32);
    impl Debug;

    pub xdebugver, _: 31, 30;
    pub ndreset, set_ndreset: 29;
    pub fullreset, set_fullreset: 28;
    pub ebreakm, set_ebreakm: 15;
    pub ebreakh, set_ebreakh: 14;
    pub ebreaks, set_ebreaks: 13;
    pub ebreaku, set_ebreaku: 12;
    pub stopcycle, set_stopcycle: 10;
    pub stoptime, set_stoptime: 9;
    pub cause, _: 8, 6;
    pub debugint, _: 5;
    pub halt, set_halt: 3;
    pub step, set_step: 2;
    pub prv, set_prv: 1, 0;
}

/// `dcsr.halt`, as an immediate for `csrsi`/`csrci`.
pub const DCSR_HALT: u8 = 1 << 3;
/// `dcsr.step`, as an immediate for `csrsi`/`csrci`.
pub const DCSR_STEP: u8 = 1 << 2;

bitfield! {
    /// `tdata1` of a match control trigger (type 2).
    #[derive(Copy, Clone)]
    pub struct Mcontrol(u32);
    impl Debug;

    pub type_, set_type: 31, 28;
    pub dmode, set_dmode: 27;
    pub maskmax, _: 26, 21;
    pub select, set_select: 19;
    pub timing, set_timing: 18;
    pub action, set_action: 17, 12;
    pub chain, set_chain: 11;
    pub match_, set_match: 10, 7;
    pub m, set_m: 6;
    pub h, set_h: 5;
    pub s, set_s: 4;
    pub u, set_u: 3;
    pub execute, set_execute: 2;
    pub store, set_store: 1;
    pub load, set_load: 0;
}
