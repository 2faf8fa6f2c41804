//! Debug sequences to operate special requirements RISC-V targets.

use riscv_dbus_target::ChipDescription;

use super::Riscv32;
use crate::error::Error;
use crate::hooks::{RtosHooks, SemihostingHooks};
use crate::session::ResetFlag;

/// Everything a reset recovery may touch.
#[derive(Debug)]
pub struct RecoveryTarget<'a> {
    /// The core which was reset.
    pub core: &'a mut Riscv32,
    /// The description of the chip.
    pub chip: &'a ChipDescription,
    /// Semihosting support, if attached.
    pub semihosting: Option<&'a mut dyn SemihostingHooks>,
    /// RTOS awareness, if attached.
    pub rtos: Option<&'a mut dyn RtosHooks>,
}

impl RecoveryTarget<'_> {
    /// Call the post reset hook of the semihosting support.
    pub fn semihosting_post_reset(&mut self) {
        if let Some(semihosting) = self.semihosting.as_mut() {
            semihosting.post_reset(self.core);
        }
    }

    /// Call the post reset cleanup of the RTOS awareness. A failure is logged.
    pub fn rtos_post_reset_cleanup(&mut self) {
        if let Some(rtos) = self.rtos.as_mut() {
            if let Err(error) = rtos.post_reset_cleanup(self.core) {
                tracing::warn!("Failed to do RTOS post reset cleanup: {error}");
            }
        }
    }
}

/// What a reset recovery did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// The chip booted from flash.
    pub flash_boot: bool,
    /// The reset cause register, if it could be read.
    pub reset_cause: Option<u32>,
    /// The core was halted by the recovery.
    pub halted_for_recovery: bool,
    /// Number of watchdogs which were disabled.
    pub watchdogs_disarmed: usize,
    /// The core was resumed at the end of the recovery.
    pub resumed: bool,
}

/// A interface to operate debug sequences for RISC-V targets.
///
/// Should be implemented on a custom handle for chips that require special sequence code.
pub trait RiscvDebugSequence: Send + Sync + std::fmt::Debug {
    /// Bring the target into a debuggable state after it was reset.
    ///
    /// Called from [`Session::poll`](crate::Session::poll) while the reset flag is set.
    /// An error is returned only if the first status read fails, in which case the
    /// flag stays set and the recovery is repeated on the next poll. Any failure
    /// after that is logged, and the flag is cleared.
    fn reset_recovery(
        &self,
        mut target: RecoveryTarget<'_>,
        flag: &ResetFlag,
    ) -> Result<RecoveryReport, Error> {
        target.core.read_dmcontrol()?;
        flag.clear();

        target.core.invalidate_debug_ram();
        target.semihosting_post_reset();
        target.rtos_post_reset_cleanup();

        Ok(RecoveryReport::default())
    }
}

/// The default sequence, used for chips without special requirements.
#[derive(Debug)]
pub struct DefaultRiscvSequence(());

impl DefaultRiscvSequence {
    /// Creates a new default RISC-V debug sequence.
    pub fn create() -> std::sync::Arc<dyn RiscvDebugSequence> {
        std::sync::Arc::new(Self(()))
    }
}

impl RiscvDebugSequence for DefaultRiscvSequence {}
