use crate::registers::RegisterSet;
use crate::serialize::hex_u_int;
use serde::{Deserialize, Serialize};

/// Description of a single chip variant, as far as the debug layer is concerned.
///
/// All values are plain data. The debug layer looks them up by chip name and
/// never hardcodes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipDescription {
    /// The name of the chip, e.g. `esp32h2`.
    pub name: String,

    /// Number of hardware triggers usable as instruction breakpoints.
    pub breakpoints: usize,

    /// Number of hardware triggers usable as data watchpoints.
    pub watchpoints: usize,

    /// Boot mode configuration, used to decide how invasive reset recovery is.
    pub boot_mode: BootModeDescription,

    /// Hardware reset cause register and the text for each cause code.
    pub reset_cause: ResetCauseDescription,

    /// Watchdogs which have to be disarmed before the core can stay halted.
    #[serde(default)]
    pub watchdogs: Vec<WatchdogDescription>,

    /// Registers which exist on this chip. An empty list allows all registers.
    #[serde(default)]
    pub registers: RegisterSet,

    /// Tuning of the debug link.
    #[serde(default)]
    pub debug_link: DebugLinkConfig,
}

impl ChipDescription {
    /// Returns `true` if the given strapping register value selects booting from flash.
    pub fn is_flash_boot(&self, strap: u32) -> bool {
        self.boot_mode
            .flash_boot
            .iter()
            .any(|pattern| pattern.matches(strap))
    }

    /// The text describing a reset cause code.
    pub fn reset_cause_text(&self, code: u32) -> &str {
        self.reset_cause
            .causes
            .iter()
            .find(|cause| u32::from(cause.code) == code)
            .map(|cause| cause.description.as_str())
            .unwrap_or("Unknown reset cause")
    }
}

/// Where the boot strapping pins are latched and how to interpret them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootModeDescription {
    /// Address of the strapping register.
    #[serde(serialize_with = "hex_u_int")]
    pub strap_register: u64,

    /// Value assumed when the strapping register cannot be read.
    ///
    /// This should select flash boot, since that requires the most thorough recovery.
    #[serde(serialize_with = "hex_u_int")]
    pub fallback_strap: u32,

    /// Any matching pattern means the chip booted from flash.
    pub flash_boot: Vec<StrapPattern>,
}

/// `(strap & mask) == value`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrapPattern {
    /// Bits of the strapping value which are compared.
    #[serde(serialize_with = "hex_u_int")]
    pub mask: u32,
    /// Expected value of the masked bits.
    #[serde(serialize_with = "hex_u_int")]
    pub value: u32,
}

impl StrapPattern {
    /// Check whether the strapping value matches this pattern.
    pub fn matches(&self, strap: u32) -> bool {
        strap & self.mask == self.value
    }
}

/// The reset cause register and its decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCauseDescription {
    /// Address of the reset cause register.
    #[serde(serialize_with = "hex_u_int")]
    pub register: u64,
    /// Bits of the register holding the cause code.
    #[serde(serialize_with = "hex_u_int")]
    pub mask: u32,
    /// Known cause codes. Codes not listed are reported as unknown.
    pub causes: Vec<ResetCause>,
}

/// A reset cause code and its description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCause {
    /// The masked value of the reset cause register.
    #[serde(serialize_with = "hex_u_int")]
    pub code: u8,
    /// Text which is logged for this cause.
    pub description: String,
}

/// A watchdog timer which is disarmed by writing a key to its write protection
/// register, followed by a write to its configuration register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogDescription {
    /// Name used in log messages.
    pub name: String,

    /// Address of the write protection register.
    #[serde(serialize_with = "hex_u_int")]
    pub protect: u64,

    /// Address of the configuration register.
    #[serde(serialize_with = "hex_u_int")]
    pub config: u64,

    /// Key which unlocks the configuration register.
    #[serde(serialize_with = "hex_u_int")]
    pub key: u32,

    /// Value written to the configuration register to disarm the watchdog.
    #[serde(default, serialize_with = "hex_u_int")]
    pub disable_value: u32,
}

/// Limits for the retry loops of the debug link.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugLinkConfig {
    /// How many scans may answer `busy` in a row before the link is considered unresponsive.
    pub busy_retries: usize,

    /// How often the debug RAM is polled for completion of a host program.
    pub program_polls: usize,

    /// How often the core status is polled while waiting for a halt.
    pub halt_polls: usize,
}

impl Default for DebugLinkConfig {
    fn default() -> Self {
        Self {
            busy_retries: 1024,
            program_polls: 1000,
            halt_polls: 1000,
        }
    }
}
