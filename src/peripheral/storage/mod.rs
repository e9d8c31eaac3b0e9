//! Block transfer engine for an SD/eMMC controller.
//!
//! Transfers are synchronous: each block waits (bounded) for the card to leave
//! the busy state before the next command, and a write also waits for the last
//! block to be programmed. Arguments are validated before any register access.
use core::task::Poll;

use crate::config::validate_block_size;
use crate::core::{HardwareCode, Mode, Operation, PeripheralId, EXT_CSD_SIZE};
use crate::error::{ArgumentError, ConfigurationError, HarnessError};
use crate::infra::poll::PollContext;
use crate::peripheral::handle::PeripheralHandle;
use crate::peripheral::traits::block_registers::BlockRegisters;
use crate::timing::storage_clock::StorageClock;

/// Byte offset of SEC_COUNT (device size in 512-byte sectors) in the ExtCSD.
pub const EXT_CSD_SEC_COUNT: usize = 212;

/// Sector size SEC_COUNT is expressed in.
pub const SECTOR_SIZE: usize = 512;

//==================================================================================BLOCK_ENGINE
pub struct BlockEngine<D: BlockRegisters> {
    handle: PeripheralHandle<D>,
    block_size: usize,
    /// Device size in blocks, once read from the ExtCSD.
    capacity: Option<u32>,
}

impl<D: BlockRegisters> BlockEngine<D> {
    /// Wrap `handle`; `block_size` must be a power of two.
    pub fn new(handle: PeripheralHandle<D>, block_size: usize) -> Result<Self, HarnessError> {
        validate_block_size(block_size).map_err(|reason| HarnessError::Configuration {
            peripheral: handle.id(),
            reason,
        })?;
        Ok(Self {
            handle,
            block_size,
            capacity: None,
        })
    }

    pub fn handle(&self) -> &PeripheralHandle<D> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut PeripheralHandle<D> {
        &mut self.handle
    }

    pub fn into_handle(self) -> PeripheralHandle<D> {
        self.handle
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Device size in blocks, if known.
    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    /// Configuration phase: identification clock, block length, transfer
    /// clock, transfer state, then capacity discovery from the ExtCSD.
    pub fn configure(&mut self, clock: StorageClock) -> Result<(), HarnessError> {
        self.configure_with(clock, PollContext::none())
    }

    pub fn configure_with(
        &mut self,
        clock: StorageClock,
        ctx: PollContext<'_>,
    ) -> Result<(), HarnessError> {
        let peripheral = self.handle.id();
        let identification =
            StorageClock::identification(clock.input_hz).map_err(|reason| {
                HarnessError::Configuration { peripheral, reason }
            })?;

        self.handle.request_mode_with(Mode::Configuration, ctx)?;
        self.handle.apply_timing(identification)?;

        if let Err(code) = self.handle.driver.set_block_size(self.block_size) {
            self.handle.mode = Mode::Faulted;
            #[cfg(feature = "defmt")]
            defmt::error!("{}: block size {} refused: {}", peripheral, self.block_size, code);
            return Err(HarnessError::Configuration {
                peripheral,
                reason: ConfigurationError::Rejected { code },
            });
        }

        self.handle.apply_timing(clock)?;
        self.handle.request_mode_with(Mode::Operational, ctx)?;

        let mut ext_csd = [0u8; EXT_CSD_SIZE];
        self.read_ext_csd_with(&mut ext_csd, ctx)?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "{}: {} Hz bus clock, {}-byte blocks, capacity {}",
            peripheral,
            clock.clock_frequency_hz,
            self.block_size,
            self.capacity
        );
        Ok(())
    }

    /// Read the extended CSD into `buffer` and record the device capacity.
    /// Returns the capacity in blocks (0 when the card does not report one).
    pub fn read_ext_csd(&mut self, buffer: &mut [u8; EXT_CSD_SIZE]) -> Result<u32, HarnessError> {
        self.read_ext_csd_with(buffer, PollContext::none())
    }

    pub fn read_ext_csd_with(
        &mut self,
        buffer: &mut [u8; EXT_CSD_SIZE],
        ctx: PollContext<'_>,
    ) -> Result<u32, HarnessError> {
        let peripheral = self.handle.id();
        self.handle.ensure_operational(Operation::ReadExtCsd)?;
        self.wait_ready(Operation::ReadExtCsd, ctx)?;

        self.handle
            .driver
            .read_ext_csd(buffer)
            .map_err(|code| HarnessError::Hardware {
                peripheral,
                operation: Operation::ReadExtCsd,
                code,
            })?;

        let mut sec_count = [0u8; 4];
        sec_count.copy_from_slice(&buffer[EXT_CSD_SEC_COUNT..EXT_CSD_SEC_COUNT + 4]);
        let sectors = u32::from_le_bytes(sec_count) as u64;
        let blocks = sectors * SECTOR_SIZE as u64 / self.block_size as u64;
        let blocks = u32::try_from(blocks).unwrap_or(u32::MAX);

        self.capacity = (blocks != 0).then_some(blocks);
        Ok(blocks)
    }

    /// Write `buffer` starting at block `start`. Returns the bytes written.
    pub fn write_blocks(&mut self, start: u32, buffer: &[u8]) -> Result<usize, HarnessError> {
        self.write_blocks_with(start, buffer, PollContext::none())
    }

    pub fn write_blocks_with(
        &mut self,
        start: u32,
        buffer: &[u8],
        ctx: PollContext<'_>,
    ) -> Result<usize, HarnessError> {
        let operation = Operation::WriteBlocks;
        let peripheral = self.handle.id();
        self.check_range(operation, start, buffer.len())?;
        self.handle.ensure_operational(operation)?;

        for (offset, block) in buffer.chunks_exact(self.block_size).enumerate() {
            let index = start + offset as u32;
            self.wait_ready(operation, ctx)?;
            self.handle
                .driver
                .write_block(index, block)
                .map_err(|code| hardware(peripheral, operation, index, code))?;
        }
        // Programming of the last block.
        self.wait_ready(operation, ctx)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("{}: wrote {} bytes at block {}", peripheral, buffer.len(), start);
        Ok(buffer.len())
    }

    /// Read into `buffer` starting at block `start`. Returns the bytes read.
    pub fn read_blocks(&mut self, start: u32, buffer: &mut [u8]) -> Result<usize, HarnessError> {
        self.read_blocks_with(start, buffer, PollContext::none())
    }

    pub fn read_blocks_with(
        &mut self,
        start: u32,
        buffer: &mut [u8],
        ctx: PollContext<'_>,
    ) -> Result<usize, HarnessError> {
        let operation = Operation::ReadBlocks;
        let peripheral = self.handle.id();
        self.check_range(operation, start, buffer.len())?;
        self.handle.ensure_operational(operation)?;

        let len = buffer.len();
        for (offset, block) in buffer.chunks_exact_mut(self.block_size).enumerate() {
            let index = start + offset as u32;
            self.wait_ready(operation, ctx)?;
            self.handle
                .driver
                .read_block(index, block)
                .map_err(|code| hardware(peripheral, operation, index, code))?;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("{}: read {} bytes at block {}", peripheral, len, start);
        Ok(len)
    }

    /// Reject empty, unaligned or out-of-range transfers.
    fn check_range(&self, operation: Operation, start: u32, len: usize) -> Result<(), HarnessError> {
        let invalid = |reason| HarnessError::InvalidArgument {
            peripheral: self.handle.id(),
            operation,
            reason,
        };
        if len == 0 {
            return Err(invalid(ArgumentError::EmptyBuffer));
        }
        if len % self.block_size != 0 {
            return Err(invalid(ArgumentError::UnalignedBuffer {
                len,
                block_size: self.block_size,
            }));
        }

        let end = start as u64 + (len / self.block_size) as u64;
        let limit = self.capacity.map_or(1u64 << 32, u64::from);
        if end > limit {
            return Err(invalid(ArgumentError::BeyondCapacity {
                start,
                end,
                capacity: self.capacity.unwrap_or(u32::MAX),
            }));
        }
        Ok(())
    }

    fn wait_ready(&mut self, operation: Operation, ctx: PollContext<'_>) -> Result<(), HarnessError> {
        let peripheral = self.handle.id();
        let poll = self.handle.poll(ctx);
        let driver = &mut self.handle.driver;
        poll.until(|_| match driver.error_status() {
                Some(code) => Poll::Ready(Err(code)),
                None if driver.is_busy() => Poll::Pending,
                None => Poll::Ready(Ok(())),
            })
            .map_err(|err| {
                #[cfg(feature = "defmt")]
                defmt::warn!("{}: {} ready wait ended: {}", peripheral, operation, err);
                HarnessError::from_poll(peripheral, operation, err)
            })
    }
}

#[cfg_attr(not(feature = "defmt"), allow(unused_variables))]
fn hardware(
    peripheral: PeripheralId,
    operation: Operation,
    index: u32,
    code: HardwareCode,
) -> HarnessError {
    #[cfg(feature = "defmt")]
    defmt::error!("{}: {} failed at block {}: {}", peripheral, operation, index, code);
    HarnessError::Hardware {
        peripheral,
        operation,
        code,
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
