//! Board self-tests built on the engines: CAN loopback and storage
//! write/read-back, plus a bounded receive-only monitor.
//!
//! Each self-test returns a [`SelfTestReport`]; rendering it is left to the
//! caller (console, defmt, test assertion).
use embedded_can::StandardId;

use crate::config::{validate_block_size, CanConfig, StorageConfig};
use crate::core::{Mode, Operation, PeripheralId, TransferOutcome, MAX_FRAME_PAYLOAD};
use crate::error::{ArgumentError, HarnessError};
use crate::infra::poll::PollContext;
use crate::peripheral::can::FrameEngine;
use crate::peripheral::frame::Frame;
use crate::peripheral::handle::PeripheralHandle;
use crate::peripheral::storage::BlockEngine;
use crate::peripheral::traits::block_registers::BlockRegisters;
use crate::peripheral::traits::frame_registers::FrameRegisters;
use crate::verify::verify_prefix;

/// Identifier of the loopback test frame.
pub const TEST_MESSAGE_ID: u16 = 1365;

/// Payload of the loopback test frame.
pub const TEST_PAYLOAD: [u8; MAX_FRAME_PAYLOAD] = [0, 1, 2, 3, 4, 5, 6, 7];

/// First block written by the storage self-test.
pub const STORAGE_TEST_START_BLOCK: u32 = 5;

/// Length of the `1, 2, ..` pattern written at the head of the storage buffer.
pub const STORAGE_TEST_PATTERN_LEN: usize = 20;

const TEST_ID: StandardId = match StandardId::new(TEST_MESSAGE_ID) {
    Some(id) => id,
    None => StandardId::ZERO,
};

//==================================================================================REPORT
/// Outcome of one self-test together with the state it left the peripheral in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelfTestReport {
    pub peripheral: PeripheralId,
    pub outcome: TransferOutcome,
    /// Controller mode after the test.
    pub mode: Mode,
    pub bytes_moved: usize,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.outcome.is_success()
    }

    fn new(peripheral: PeripheralId, mode: Mode, result: Result<usize, HarnessError>) -> Self {
        let bytes_moved = result.unwrap_or(0);
        let report = Self {
            peripheral,
            outcome: TransferOutcome::from(result),
            mode,
            bytes_moved,
        };
        #[cfg(feature = "defmt")]
        {
            if report.passed() {
                defmt::info!("{}: self-test passed, {} bytes", peripheral, bytes_moved);
            } else {
                defmt::error!("{}: self-test failed: {}", peripheral, report.outcome);
            }
        }
        report
    }
}

//==================================================================================CAN
/// Initialize the controller and bring it to Operational at the configured bit rate.
///
/// The bit timing is derived before the driver is touched, so an unreachable
/// rate never reaches the hardware.
pub fn bring_up_can<D: FrameRegisters>(
    driver: D,
    config: &CanConfig,
) -> Result<FrameEngine<D>, HarnessError> {
    bring_up_can_with(driver, config, PollContext::none())
}

pub fn bring_up_can_with<D: FrameRegisters>(
    driver: D,
    config: &CanConfig,
    ctx: PollContext<'_>,
) -> Result<FrameEngine<D>, HarnessError> {
    let peripheral = config.peripheral();
    let timing = config
        .timing()
        .map_err(|reason| HarnessError::Configuration {
            peripheral: peripheral.id,
            reason,
        })?;

    let handle = PeripheralHandle::initialize_with_clock(
        driver,
        peripheral,
        config.poll,
        config.stall,
        config.poll_clock,
    )?;
    let mut engine = FrameEngine::new(handle);
    engine.configure_with(timing, ctx)?;
    Ok(engine)
}

/// The loopback test frame: id 1365, payload `0..8`.
pub fn test_frame() -> Frame {
    Frame::data_frame(TEST_ID, &TEST_PAYLOAD).unwrap_or_default()
}

/// Send the test frame, read it back and verify it. The controller is
/// expected to be in loopback (or to have an echoing peer on the bus).
pub fn can_loopback_self_test<D: FrameRegisters>(engine: &mut FrameEngine<D>) -> SelfTestReport {
    can_loopback_self_test_with(engine, PollContext::none())
}

pub fn can_loopback_self_test_with<D: FrameRegisters>(
    engine: &mut FrameEngine<D>,
    ctx: PollContext<'_>,
) -> SelfTestReport {
    let tx = test_frame();
    let mut rx = Frame::default();
    let result = engine.exchange_with(&tx, &mut rx, ctx);
    let handle = engine.handle();
    SelfTestReport::new(handle.id(), handle.current_mode(), result)
}

/// Receive until every slot of `frames` is filled. Returns the number of
/// frames received; the first error (including a timeout) ends the run.
pub fn monitor<D: FrameRegisters>(
    engine: &mut FrameEngine<D>,
    frames: &mut [Frame],
) -> Result<usize, HarnessError> {
    monitor_with(engine, frames, PollContext::none())
}

pub fn monitor_with<D: FrameRegisters>(
    engine: &mut FrameEngine<D>,
    frames: &mut [Frame],
    ctx: PollContext<'_>,
) -> Result<usize, HarnessError> {
    for slot in frames.iter_mut() {
        engine.receive_with(slot, ctx)?;
    }
    Ok(frames.len())
}

//==================================================================================STORAGE
/// Initialize the storage controller, set the bus clock and block length,
/// enter the transfer state and read the device capacity.
pub fn bring_up_storage<D: BlockRegisters>(
    driver: D,
    config: &StorageConfig,
) -> Result<BlockEngine<D>, HarnessError> {
    bring_up_storage_with(driver, config, PollContext::none())
}

pub fn bring_up_storage_with<D: BlockRegisters>(
    driver: D,
    config: &StorageConfig,
    ctx: PollContext<'_>,
) -> Result<BlockEngine<D>, HarnessError> {
    let peripheral = config.peripheral();
    let configuration = |reason| HarnessError::Configuration {
        peripheral: peripheral.id,
        reason,
    };
    let clock = config.clock().map_err(configuration)?;
    validate_block_size(config.block_size).map_err(configuration)?;

    let handle = PeripheralHandle::initialize_with_clock(
        driver,
        peripheral,
        config.poll,
        config.stall,
        config.poll_clock,
    )?;
    let mut engine = BlockEngine::new(handle, config.block_size)?;
    engine.configure_with(clock, ctx)?;
    Ok(engine)
}

/// Write the `1..=20` pattern at the head of `write_buf` (rest zeroed) to
/// `start_block`, read the same range into `read_buf` and verify the pattern.
///
/// `write_buf` must hold a whole number of blocks; `read_buf` at least as many.
pub fn storage_self_test<D: BlockRegisters>(
    engine: &mut BlockEngine<D>,
    start_block: u32,
    write_buf: &mut [u8],
    read_buf: &mut [u8],
) -> SelfTestReport {
    storage_self_test_with(engine, start_block, write_buf, read_buf, PollContext::none())
}

pub fn storage_self_test_with<D: BlockRegisters>(
    engine: &mut BlockEngine<D>,
    start_block: u32,
    write_buf: &mut [u8],
    read_buf: &mut [u8],
    ctx: PollContext<'_>,
) -> SelfTestReport {
    let result = write_read_back(engine, start_block, write_buf, read_buf, ctx);
    let handle = engine.handle();
    SelfTestReport::new(handle.id(), handle.current_mode(), result)
}

fn write_read_back<D: BlockRegisters>(
    engine: &mut BlockEngine<D>,
    start_block: u32,
    write_buf: &mut [u8],
    read_buf: &mut [u8],
    ctx: PollContext<'_>,
) -> Result<usize, HarnessError> {
    let peripheral = engine.handle().id();
    let too_small = |operation, len, needed| HarnessError::InvalidArgument {
        peripheral,
        operation,
        reason: ArgumentError::BufferTooSmall { len, needed },
    };
    let needed = STORAGE_TEST_PATTERN_LEN;
    if write_buf.len() < needed {
        return Err(too_small(Operation::WriteBlocks, write_buf.len(), needed));
    }
    let read_len = read_buf.len();
    let Some(read_buf) = read_buf.get_mut(..write_buf.len()) else {
        return Err(too_small(Operation::ReadBlocks, read_len, write_buf.len()));
    };

    write_buf.fill(0);
    for (byte, value) in write_buf.iter_mut().zip(1..=STORAGE_TEST_PATTERN_LEN as u8) {
        *byte = value;
    }

    engine.write_blocks_with(start_block, write_buf, ctx)?;
    let read = engine.read_blocks_with(start_block, read_buf, ctx)?;
    verify_prefix(&write_buf[..needed], read_buf)?;
    Ok(read)
}
