use crate::error::Error;

/// An interface to be implemented for drivers that allow target memory access.
pub trait MemoryInterface {
    /// Read a 32bit word of at `address`.
    ///
    /// The address where the read should be performed at has to be a multiple of 4.
    fn read_word_32(&mut self, address: u64) -> Result<u32, Error>;

    /// Write a 32bit word at `address`.
    ///
    /// The address where the write should be performed at has to be a multiple of 4.
    fn write_word_32(&mut self, address: u64, data: u32) -> Result<(), Error>;

    /// Read a block of 32bit words at `address`.
    fn read_32(&mut self, address: u64, data: &mut [u32]) -> Result<(), Error> {
        for (offset, word) in (0..).step_by(4).zip(data.iter_mut()) {
            *word = self.read_word_32(address + offset)?;
        }
        Ok(())
    }

    /// Write a block of 32bit words at `address`.
    fn write_32(&mut self, address: u64, data: &[u32]) -> Result<(), Error> {
        for (offset, word) in (0..).step_by(4).zip(data.iter()) {
            self.write_word_32(address + offset, *word)?;
        }
        Ok(())
    }
}
