//! Collaborators which get a chance to act on the target after a reset.

use riscv_dbus_target::ChipDescription;

use crate::architecture::riscv::Riscv32;
use crate::error::Error;

/// Semihosting support attached to a session.
pub trait SemihostingHooks: std::fmt::Debug + Send {
    /// Prepare the target for semihosting.
    fn prepare(&mut self, _core: &mut Riscv32, _chip: &ChipDescription) -> Result<(), Error> {
        Ok(())
    }

    /// Called after the target was reset. Failures are handled by the implementation.
    fn post_reset(&mut self, core: &mut Riscv32);
}

/// RTOS awareness attached to a session.
pub trait RtosHooks: std::fmt::Debug + Send {
    /// Drop any state which did not survive the reset of the target.
    fn post_reset_cleanup(&mut self, _core: &mut Riscv32) -> Result<(), Error> {
        Ok(())
    }
}
