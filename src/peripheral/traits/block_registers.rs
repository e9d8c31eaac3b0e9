//! Register primitives of a block-oriented storage controller.
use crate::core::{HardwareCode, EXT_CSD_SIZE};
use crate::peripheral::traits::peripheral::Peripheral;
use crate::timing::storage_clock::StorageClock;

/// Polled single-block access of an SD/eMMC host controller.
pub trait BlockRegisters: Peripheral<Timing = StorageClock> {
    /// Card or data line busy (previous command still in progress).
    fn is_busy(&mut self) -> bool;

    /// Negotiate the transfer block length (CMD16).
    fn set_block_size(&mut self, size: usize) -> Result<(), HardwareCode>;

    /// Read the 512-byte extended CSD register (CMD8).
    fn read_ext_csd(&mut self, buffer: &mut [u8; EXT_CSD_SIZE]) -> Result<(), HardwareCode>;

    /// Read block `index` into `buffer` (exactly one block long).
    fn read_block(&mut self, index: u32, buffer: &mut [u8]) -> Result<(), HardwareCode>;

    /// Write `buffer` (exactly one block long) to block `index`.
    fn write_block(&mut self, index: u32, buffer: &[u8]) -> Result<(), HardwareCode>;
}
